// Per-repository detail cache document.
// Each tracked field carries its own value and fetch timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::{CiStatus, HeatmapCell, ReleaseSummary, RepoActivity, TrafficStats};

/// Identifies one repository's cache document. All parts are case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    api_host: String,
    owner: String,
    name: String,
}

impl CacheKey {
    pub fn new(api_host: &str, owner: &str, name: &str) -> Self {
        Self {
            api_host: api_host.to_lowercase(),
            owner: owner.to_lowercase(),
            name: name.to_lowercase(),
        }
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A value together with the moment it was fetched.
///
/// The pair is only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cached<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    pub fn new(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self { value, fetched_at }
    }
}

/// Cached repository details. A `None` slot has never been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoDetailCache {
    pub open_pulls: Option<Cached<u64>>,
    pub ci_status: Option<Cached<CiStatus>>,
    pub activity: Option<Cached<RepoActivity>>,
    /// `Some(Cached { value: None, .. })` means traffic is unavailable for this repository.
    pub traffic: Option<Cached<Option<TrafficStats>>>,
    pub commit_heatmap: Option<Cached<Vec<HeatmapCell>>>,
    pub latest_release: Option<Cached<Option<ReleaseSummary>>>,
}

impl RepoDetailCache {
    /// True when no slot has ever been fetched.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn open_pulls(&self) -> Option<u64> {
        self.open_pulls.as_ref().map(|c| c.value)
    }

    pub fn ci_status(&self) -> Option<CiStatus> {
        self.ci_status.as_ref().map(|c| c.value)
    }

    pub fn activity(&self) -> Option<&RepoActivity> {
        self.activity.as_ref().map(|c| &c.value)
    }

    pub fn traffic(&self) -> Option<TrafficStats> {
        self.traffic.as_ref().and_then(|c| c.value)
    }

    pub fn commit_heatmap(&self) -> Option<&[HeatmapCell]> {
        self.commit_heatmap.as_ref().map(|c| c.value.as_slice())
    }

    pub fn latest_release(&self) -> Option<&ReleaseSummary> {
        self.latest_release.as_ref().and_then(|c| c.value.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::CiState;
    use chrono::NaiveDate;

    #[test]
    fn test_cache_key_is_case_folded() {
        assert_eq!(
            CacheKey::new("API.GitHub.com", "Acme", "Widgets"),
            CacheKey::new("api.github.com", "acme", "widgets")
        );
    }

    #[test]
    fn test_unavailable_slot_differs_from_missing() {
        let now = Utc::now();
        let unavailable = RepoDetailCache {
            traffic: Some(Cached::new(None, now)),
            ..Default::default()
        };

        assert!(!unavailable.is_empty());
        assert!(unavailable.traffic().is_none());

        let json = serde_json::to_string(&unavailable).unwrap();
        let parsed: RepoDetailCache = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, unavailable);
        assert!(parsed.traffic.is_some());
    }

    #[test]
    fn test_accessors() {
        let now = Utc::now();
        let cache = RepoDetailCache {
            open_pulls: Some(Cached::new(4, now)),
            ci_status: Some(Cached::new(
                CiStatus {
                    state: CiState::Passing,
                    run_count: 9,
                },
                now,
            )),
            commit_heatmap: Some(Cached::new(
                vec![HeatmapCell {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    count: 3,
                }],
                now,
            )),
            ..Default::default()
        };

        assert_eq!(cache.open_pulls(), Some(4));
        assert_eq!(cache.ci_status().unwrap().state, CiState::Passing);
        assert_eq!(cache.commit_heatmap().unwrap().len(), 1);
        assert!(cache.activity().is_none());
        assert!(cache.latest_release().is_none());
    }

    #[test]
    fn test_older_documents_parse_with_missing_slots() {
        let parsed: RepoDetailCache = serde_json::from_str(r#"{"open_pulls": null}"#).unwrap();
        assert!(parsed.is_empty());
    }
}
