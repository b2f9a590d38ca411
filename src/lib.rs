// repobar library.
// Rate-limit aware GitHub repository detail sync with ETag and per-field TTL caching.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod sync;

pub use config::Config;
pub use error::{RepoBarError, Result};
pub use sync::{RepoSync, RepositorySnapshot};
