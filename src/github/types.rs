// GitHub API response types.
// Wire structs for deserializing REST responses and the domain values derived from them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// GitHub user or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Canonical repository metadata from `GET /repos/{owner}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub private: bool,
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    /// Includes open pull requests.
    #[serde(default)]
    pub open_issues_count: u64,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Workflow run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Workflow run conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

/// GitHub Actions workflow run (only the fields CI status needs).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
}

/// Response wrapper for workflow runs list.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsResponse {
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Aggregate CI state for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CiState {
    Passing,
    Failing,
    Pending,
    #[default]
    Unknown,
}

impl CiState {
    /// Derive the CI state from the most recent workflow run.
    pub fn from_run(run: &WorkflowRun) -> Self {
        match run.status {
            RunStatus::Completed => match run.conclusion {
                Some(RunConclusion::Success | RunConclusion::Skipped | RunConclusion::Neutral) => {
                    CiState::Passing
                }
                Some(
                    RunConclusion::Failure
                    | RunConclusion::TimedOut
                    | RunConclusion::StartupFailure
                    | RunConclusion::ActionRequired
                    | RunConclusion::Cancelled,
                ) => CiState::Failing,
                _ => CiState::Unknown,
            },
            RunStatus::Queued
            | RunStatus::InProgress
            | RunStatus::Waiting
            | RunStatus::Requested
            | RunStatus::Pending => CiState::Pending,
            RunStatus::Unknown => CiState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CiStatus {
    pub state: CiState,
    pub run_count: u64,
}

impl From<WorkflowRunsResponse> for CiStatus {
    fn from(response: WorkflowRunsResponse) -> Self {
        Self {
            state: response
                .workflow_runs
                .first()
                .map(CiState::from_run)
                .unwrap_or_default(),
            run_count: response.total_count,
        }
    }
}

/// Raw repository event from `GET /repos/{owner}/{name}/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor: Owner,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A single entry of recent repository activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: String,
    pub actor: String,
    pub title: String,
    pub url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl From<RawEvent> for ActivityEvent {
    fn from(event: RawEvent) -> Self {
        // Prefer the subject title (PR, issue, release) when the payload has one.
        let subject = ["pull_request", "issue", "release"]
            .iter()
            .find_map(|key| event.payload.get(*key));
        let title = subject
            .and_then(|s| s.get("title").or_else(|| s.get("name")))
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| humanize_event_type(&event.event_type));
        let url = subject
            .and_then(|s| s.get("html_url"))
            .and_then(|u| u.as_str())
            .map(str::to_string);

        Self {
            kind: event.event_type,
            actor: event.actor.login,
            title,
            url,
            occurred_at: event.created_at,
        }
    }
}

/// Turn `PullRequestReviewEvent` into `Pull request review`.
fn humanize_event_type(event_type: &str) -> String {
    let base = event_type.strip_suffix("Event").unwrap_or(event_type);
    let mut out = String::with_capacity(base.len() + 4);
    for (i, c) in base.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoActivity {
    pub events: Vec<ActivityEvent>,
    pub most_recent: Option<ActivityEvent>,
}

impl RepoActivity {
    pub fn from_events(events: Vec<ActivityEvent>) -> Self {
        let most_recent = events.iter().max_by_key(|e| e.occurred_at).cloned();
        Self {
            events,
            most_recent,
        }
    }
}

/// Response body of `/traffic/views` and `/traffic/clones`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficSummary {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub uniques: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub unique_visitors: u64,
    pub unique_cloners: u64,
}

/// One week of `stats/commit_activity`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitActivityWeek {
    /// Unix timestamp of the Sunday starting the week.
    pub week: i64,
    #[serde(default)]
    pub days: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub count: u32,
}

/// Expand weekly commit activity into one cell per day.
pub fn heatmap_from_weeks(weeks: &[CommitActivityWeek]) -> Vec<HeatmapCell> {
    weeks
        .iter()
        .filter_map(|w| DateTime::from_timestamp(w.week, 0).map(|start| (start, &w.days)))
        .flat_map(|(start, days)| {
            days.iter().enumerate().map(move |(offset, &count)| HeatmapCell {
                date: (start + Duration::days(offset as i64)).date_naive(),
                count,
            })
        })
        .collect()
}

/// Raw release from `GET /repos/{owner}/{name}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub name: Option<String>,
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    fn effective_date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub name: String,
    pub tag: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// Pick the newest non-draft release by publish date, falling back to creation date.
pub fn latest_release(releases: Vec<Release>) -> Option<ReleaseSummary> {
    releases
        .into_iter()
        .filter(|r| !r.draft)
        .max_by_key(Release::effective_date)
        .map(|r| {
            let published_at = r.effective_date();
            let name = r
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| r.tag_name.clone());
            ReleaseSummary {
                name,
                tag: r.tag_name,
                url: r.html_url,
                published_at,
            }
        })
}

/// Rate limit usage from the most recent REST response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub used: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub resource: Option<String>,
    pub observed_at: DateTime<Utc>,
}
