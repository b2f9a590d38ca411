// Repository detail coordinator.
// Refreshes stale detail fields in parallel and merges them into the cached document.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{
    CacheKey, CacheTtls, Cached, DetailCacheState, DetailCacheStore, DetailField, RepoDetailCache,
};
use crate::error::Result;
use crate::github::{CiStatus, GitHubClient, HeatmapCell, ReleaseSummary, RepoActivity, TrafficStats};

use super::errors::ErrorAccumulator;
use super::snapshot::RepositorySnapshot;

/// Outcome of one refresh pass. `None` means the field was fresh and not fetched.
#[derive(Debug, Default)]
struct FieldResults {
    open_pulls: Option<Result<u64>>,
    ci_status: Option<Result<CiStatus>>,
    activity: Option<Result<RepoActivity>>,
    traffic: Option<Result<Option<TrafficStats>>>,
    commit_heatmap: Option<Result<Vec<HeatmapCell>>>,
    latest_release: Option<Result<Option<ReleaseSummary>>>,
}

impl FieldResults {
    /// Apply successes to `cache`, keeping the previous value of every failed field.
    ///
    /// Returns true when any slot was replaced.
    fn merge_into(
        self,
        cache: &mut RepoDetailCache,
        errors: &mut ErrorAccumulator,
        fetched_at: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        changed |= merge_slot(
            &mut cache.open_pulls,
            self.open_pulls,
            DetailField::OpenPulls,
            errors,
            fetched_at,
        );
        changed |= merge_slot(
            &mut cache.ci_status,
            self.ci_status,
            DetailField::CiStatus,
            errors,
            fetched_at,
        );
        changed |= merge_slot(
            &mut cache.activity,
            self.activity,
            DetailField::Activity,
            errors,
            fetched_at,
        );
        changed |= merge_slot(
            &mut cache.traffic,
            self.traffic,
            DetailField::Traffic,
            errors,
            fetched_at,
        );
        changed |= merge_slot(
            &mut cache.commit_heatmap,
            self.commit_heatmap,
            DetailField::CommitHeatmap,
            errors,
            fetched_at,
        );
        changed |= merge_slot(
            &mut cache.latest_release,
            self.latest_release,
            DetailField::LatestRelease,
            errors,
            fetched_at,
        );
        changed
    }
}

fn merge_slot<T>(
    slot: &mut Option<Cached<T>>,
    outcome: Option<Result<T>>,
    field: DetailField,
    errors: &mut ErrorAccumulator,
    fetched_at: DateTime<Utc>,
) -> bool {
    match outcome {
        None => false,
        Some(Ok(value)) => {
            *slot = Some(Cached::new(value, fetched_at));
            true
        }
        Some(Err(e)) => {
            if e.is_still_computing() {
                debug!(field = field.label(), error = %e, "field still computing");
            } else {
                warn!(field = field.label(), error = %e, "failed to refresh field");
            }
            errors.record(Some(field), &e);
            false
        }
    }
}

async fn fetch_if<T>(needed: bool, fetch: impl Future<Output = Result<T>>) -> Option<Result<T>> {
    if needed { Some(fetch.await) } else { None }
}

/// Builds full repository snapshots from metadata plus cached detail fields.
///
/// Holds no per-call state, so concurrent calls for different repositories are independent.
#[derive(Debug, Clone)]
pub struct RepoDetailCoordinator {
    client: GitHubClient,
    store: Arc<DetailCacheStore>,
    ttls: CacheTtls,
}

impl RepoDetailCoordinator {
    pub fn new(client: GitHubClient, store: Arc<DetailCacheStore>, ttls: CacheTtls) -> Self {
        Self {
            client,
            store,
            ttls,
        }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<DetailCacheStore> {
        &self.store
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    pub fn cache_key(&self, owner: &str, name: &str) -> CacheKey {
        CacheKey::new(self.client.api_host(), owner, name)
    }

    /// Fetch metadata, refresh missing or stale detail fields and compose the snapshot.
    ///
    /// Never fails: errors end up in the snapshot's `error` and `rate_limited_until`.
    pub async fn full_repository(&self, owner: &str, name: &str) -> RepositorySnapshot {
        let mut errors = ErrorAccumulator::new();

        let repo = match self.client.get_repo(owner, name).await {
            Ok(repo) => repo,
            Err(e) => {
                warn!(owner, name, error = %e, "failed to fetch repository metadata");
                errors.record(None, &e);
                return RepositorySnapshot::placeholder(owner, name, &errors);
            }
        };

        let key = self.cache_key(owner, name);
        let mut cache = self.load(&key).await;
        let before = DetailCacheState::evaluate(&cache, &self.ttls, Utc::now());
        let refresh = before.refresh_fields();
        debug!(owner, name, ?refresh, "refreshing detail fields");

        let results = if refresh.is_empty() {
            FieldResults::default()
        } else {
            self.fetch_fields(owner, name, &before).await
        };

        let changed = results.merge_into(&mut cache, &mut errors, Utc::now());
        let after = DetailCacheState::evaluate(&cache, &self.ttls, Utc::now());
        if changed {
            self.save(key, cache.clone()).await;
        }

        RepositorySnapshot::compose(&repo, &cache, after, &errors)
    }

    async fn fetch_fields(&self, owner: &str, name: &str, state: &DetailCacheState) -> FieldResults {
        let client = &self.client;
        let (open_pulls, ci_status, activity, traffic, commit_heatmap, latest_release) = tokio::join!(
            fetch_if(
                state.needs_refresh(DetailField::OpenPulls),
                client.get_open_pull_count(owner, name)
            ),
            fetch_if(
                state.needs_refresh(DetailField::CiStatus),
                client.get_ci_status(owner, name)
            ),
            fetch_if(
                state.needs_refresh(DetailField::Activity),
                client.get_activity(owner, name)
            ),
            fetch_if(
                state.needs_refresh(DetailField::Traffic),
                client.get_traffic(owner, name)
            ),
            fetch_if(
                state.needs_refresh(DetailField::CommitHeatmap),
                client.get_commit_heatmap(owner, name)
            ),
            fetch_if(
                state.needs_refresh(DetailField::LatestRelease),
                client.get_latest_release(owner, name)
            ),
        );

        FieldResults {
            open_pulls,
            ci_status,
            activity,
            traffic,
            commit_heatmap,
            latest_release,
        }
    }

    async fn load(&self, key: &CacheKey) -> RepoDetailCache {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        tokio::task::spawn_blocking(move || store.load(&key))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "detail cache load task failed");
                RepoDetailCache::default()
            })
    }

    async fn save(&self, key: CacheKey, cache: RepoDetailCache) {
        let store = Arc::clone(&self.store);
        if let Err(e) = tokio::task::spawn_blocking(move || store.save(&key, &cache)).await {
            warn!(error = %e, "detail cache save task failed");
        }
    }
}
