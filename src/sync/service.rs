// Repository sync service.
// Entry point for callers: coalesced snapshot requests, cache clearing and diagnostics.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{info, warn};

use crate::cache::{CacheKey, CacheTtls, DetailCacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::github::{Diagnostics, GitHubClient, RequestState};

use super::coordinator::RepoDetailCoordinator;
use super::inflight::InFlight;
use super::snapshot::RepositorySnapshot;

/// Shared handle for fetching repository snapshots.
///
/// Cloning is cheap; clones share request state, the detail cache and in-flight tasks.
#[derive(Debug, Clone)]
pub struct RepoSync {
    coordinator: RepoDetailCoordinator,
    in_flight: Arc<InFlight<CacheKey, RepositorySnapshot>>,
}

impl RepoSync {
    pub fn new(client: GitHubClient, store: Arc<DetailCacheStore>, ttls: CacheTtls) -> Self {
        Self {
            coordinator: RepoDetailCoordinator::new(client, store, ttls),
            in_flight: Arc::new(InFlight::new()),
        }
    }

    /// Build the service from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = GitHubClient::new(
            &config.api.base_url,
            config.token_provider(),
            Arc::new(RequestState::new()),
        )?;
        let store = match config.cache_dir() {
            Some(dir) => DetailCacheStore::new(dir),
            None => {
                warn!("no cache directory available, keeping repository details in memory only");
                DetailCacheStore::in_memory()
            }
        };
        Ok(Self::new(client, Arc::new(store), config.ttls()))
    }

    pub fn coordinator(&self) -> &RepoDetailCoordinator {
        &self.coordinator
    }

    /// Snapshot of one repository. Concurrent calls for the same repository share one refresh.
    pub async fn full_repository(&self, owner: &str, name: &str) -> RepositorySnapshot {
        let key = self.coordinator.cache_key(owner, name);
        let coordinator = self.coordinator.clone();
        let (owner, name) = (owner.to_string(), name.to_string());

        self.in_flight
            .run(key, move || {
                async move { coordinator.full_repository(&owner, &name).await }.boxed()
            })
            .await
    }

    /// Drop cached detail documents and all request state (ETags, cooldowns, rate limits).
    pub async fn clear_cache(&self) {
        let store = Arc::clone(self.coordinator.store());
        if let Err(e) = tokio::task::spawn_blocking(move || store.clear()).await {
            warn!(error = %e, "detail cache clear task failed");
        }
        self.coordinator.client().state().clear();
        info!("cleared repository detail cache");
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.coordinator.client().state().diagnostics(Utc::now())
    }
}
