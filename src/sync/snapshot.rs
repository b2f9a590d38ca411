// Repository snapshot returned to callers.
// Merges canonical metadata with cached detail fields and the refresh outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{DetailCacheState, RepoDetailCache};
use crate::github::{CiStatus, HeatmapCell, ReleaseSummary, RepoActivity, Repository, TrafficStats};

use super::errors::ErrorAccumulator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySnapshot {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub is_private: bool,
    pub stars: u64,
    pub forks: u64,
    /// Open issues excluding pull requests.
    pub open_issues: u64,
    pub open_pulls: u64,
    pub pushed_at: Option<DateTime<Utc>>,
    pub ci_status: Option<CiStatus>,
    pub activity: Option<RepoActivity>,
    pub traffic: Option<TrafficStats>,
    pub commit_heatmap: Vec<HeatmapCell>,
    pub latest_release: Option<ReleaseSummary>,
    pub error: Option<String>,
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub cache_state: DetailCacheState,
}

impl RepositorySnapshot {
    /// Snapshot for a repository whose metadata could not be fetched.
    pub fn placeholder(owner: &str, name: &str, errors: &ErrorAccumulator) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            description: None,
            html_url: None,
            is_private: false,
            stars: 0,
            forks: 0,
            open_issues: 0,
            open_pulls: 0,
            pushed_at: None,
            ci_status: None,
            activity: None,
            traffic: None,
            commit_heatmap: Vec::new(),
            latest_release: None,
            error: errors.message().map(str::to_string),
            rate_limited_until: errors.rate_limited_until(),
            cache_state: DetailCacheState::default(),
        }
    }

    pub fn compose(
        repo: &Repository,
        cache: &RepoDetailCache,
        cache_state: DetailCacheState,
        errors: &ErrorAccumulator,
    ) -> Self {
        let open_pulls = cache.open_pulls().unwrap_or(0);
        Self {
            owner: repo.owner.login.clone(),
            name: repo.name.clone(),
            full_name: repo.full_name.clone(),
            description: repo.description.clone(),
            html_url: Some(repo.html_url.clone()),
            is_private: repo.private,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            open_issues: repo.open_issues_count.saturating_sub(open_pulls),
            open_pulls,
            pushed_at: repo.pushed_at,
            ci_status: cache.ci_status(),
            activity: cache.activity().cloned(),
            traffic: cache.traffic(),
            commit_heatmap: cache.commit_heatmap().map(<[_]>::to_vec).unwrap_or_default(),
            latest_release: cache.latest_release().cloned(),
            error: errors.message().map(str::to_string),
            rate_limited_until: errors.rate_limited_until(),
            cache_state,
        }
    }
}
