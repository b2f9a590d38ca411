// Repository sync module.
// Coordinates metadata and detail refreshes into repository snapshots.

pub mod coordinator;
pub mod errors;
pub mod inflight;
pub mod service;
pub mod snapshot;

pub use coordinator::RepoDetailCoordinator;
pub use errors::ErrorAccumulator;
pub use inflight::InFlight;
pub use service::RepoSync;
pub use snapshot::RepositorySnapshot;
