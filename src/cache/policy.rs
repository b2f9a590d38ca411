// Field cache policy.
// Decides per field whether a cached value is missing, fresh or stale. Pure, no I/O.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::detail::RepoDetailCache;

/// The independently cached repository detail fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailField {
    OpenPulls,
    CiStatus,
    Activity,
    Traffic,
    CommitHeatmap,
    LatestRelease,
}

impl DetailField {
    pub const ALL: [DetailField; 6] = [
        DetailField::OpenPulls,
        DetailField::CiStatus,
        DetailField::Activity,
        DetailField::Traffic,
        DetailField::CommitHeatmap,
        DetailField::LatestRelease,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DetailField::OpenPulls => "open pull requests",
            DetailField::CiStatus => "CI status",
            DetailField::Activity => "activity",
            DetailField::Traffic => "traffic",
            DetailField::CommitHeatmap => "commit heatmap",
            DetailField::LatestRelease => "latest release",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFreshness {
    Missing,
    Fresh,
    Stale,
}

impl FieldFreshness {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, FieldFreshness::Fresh)
    }
}

/// Time-to-live per detail field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub open_pulls: Duration,
    pub ci_status: Duration,
    pub activity: Duration,
    pub traffic: Duration,
    pub commit_heatmap: Duration,
    pub latest_release: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            open_pulls: Duration::seconds(60),
            ci_status: Duration::seconds(60),
            activity: Duration::minutes(5),
            traffic: Duration::hours(1),
            commit_heatmap: Duration::hours(1),
            latest_release: Duration::minutes(30),
        }
    }
}

impl CacheTtls {
    pub fn ttl(&self, field: DetailField) -> Duration {
        match field {
            DetailField::OpenPulls => self.open_pulls,
            DetailField::CiStatus => self.ci_status,
            DetailField::Activity => self.activity,
            DetailField::Traffic => self.traffic,
            DetailField::CommitHeatmap => self.commit_heatmap,
            DetailField::LatestRelease => self.latest_release,
        }
    }
}

/// Missing without a timestamp, stale once older than `ttl`, fresh otherwise.
pub fn freshness(
    fetched_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> FieldFreshness {
    match fetched_at {
        None => FieldFreshness::Missing,
        Some(at) if now.signed_duration_since(at) > ttl => FieldFreshness::Stale,
        Some(_) => FieldFreshness::Fresh,
    }
}

fn fetched_at(cache: &RepoDetailCache, field: DetailField) -> Option<DateTime<Utc>> {
    match field {
        DetailField::OpenPulls => cache.open_pulls.as_ref().map(|c| c.fetched_at),
        DetailField::CiStatus => cache.ci_status.as_ref().map(|c| c.fetched_at),
        DetailField::Activity => cache.activity.as_ref().map(|c| c.fetched_at),
        DetailField::Traffic => cache.traffic.as_ref().map(|c| c.fetched_at),
        DetailField::CommitHeatmap => cache.commit_heatmap.as_ref().map(|c| c.fetched_at),
        DetailField::LatestRelease => cache.latest_release.as_ref().map(|c| c.fetched_at),
    }
}

/// Freshness of every field of one cache document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailCacheState {
    pub open_pulls: FieldFreshness,
    pub ci_status: FieldFreshness,
    pub activity: FieldFreshness,
    pub traffic: FieldFreshness,
    pub commit_heatmap: FieldFreshness,
    pub latest_release: FieldFreshness,
}

impl Default for DetailCacheState {
    fn default() -> Self {
        Self {
            open_pulls: FieldFreshness::Missing,
            ci_status: FieldFreshness::Missing,
            activity: FieldFreshness::Missing,
            traffic: FieldFreshness::Missing,
            commit_heatmap: FieldFreshness::Missing,
            latest_release: FieldFreshness::Missing,
        }
    }
}

impl DetailCacheState {
    pub fn evaluate(cache: &RepoDetailCache, ttls: &CacheTtls, now: DateTime<Utc>) -> Self {
        let of = |field| freshness(fetched_at(cache, field), now, ttls.ttl(field));
        Self {
            open_pulls: of(DetailField::OpenPulls),
            ci_status: of(DetailField::CiStatus),
            activity: of(DetailField::Activity),
            traffic: of(DetailField::Traffic),
            commit_heatmap: of(DetailField::CommitHeatmap),
            latest_release: of(DetailField::LatestRelease),
        }
    }

    pub fn get(&self, field: DetailField) -> FieldFreshness {
        match field {
            DetailField::OpenPulls => self.open_pulls,
            DetailField::CiStatus => self.ci_status,
            DetailField::Activity => self.activity,
            DetailField::Traffic => self.traffic,
            DetailField::CommitHeatmap => self.commit_heatmap,
            DetailField::LatestRelease => self.latest_release,
        }
    }

    pub fn needs_refresh(&self, field: DetailField) -> bool {
        self.get(field).needs_refresh()
    }

    /// Fields that are missing or stale.
    pub fn refresh_fields(&self) -> Vec<DetailField> {
        DetailField::ALL
            .into_iter()
            .filter(|field| self.needs_refresh(*field))
            .collect()
    }
}
