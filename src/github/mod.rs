// GitHub API module.
// Provides the conditional request runner, its shared state, endpoints and types.

pub mod client;
pub mod endpoints;
pub mod request_state;
pub mod types;

pub use client::{ApiResponse, DEFAULT_API_HOST, GITHUB_API_BASE, GitHubClient, StaticToken, TokenProvider};
pub use request_state::{CachedResponse, Diagnostics, RequestState};
pub use types::*;
