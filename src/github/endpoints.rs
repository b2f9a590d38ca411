// GitHub API endpoint functions.
// Typed fetches for each repository detail, built on the conditional request runner.

use reqwest::StatusCode;
use reqwest::header::LINK;
use url::Url;

use crate::error::Result;

use super::client::GitHubClient;
use super::types::{
    ActivityEvent, CiStatus, CommitActivityWeek, HeatmapCell, RawEvent, Release, ReleaseSummary,
    RepoActivity, Repository, TrafficStats, TrafficSummary, WorkflowRunsResponse,
    heatmap_from_weeks, latest_release,
};

const CI_BRANCH: &str = "main";

impl GitHubClient {
    /// Get canonical repository metadata.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository> {
        let url = self.endpoint(&["repos", owner, repo], &[]);
        self.get(&url, &[]).await?.json()
    }

    /// Count open pull requests from the `rel="last"` page of a one-per-page listing.
    pub async fn get_open_pull_count(&self, owner: &str, repo: &str) -> Result<u64> {
        let url = self.endpoint(
            &["repos", owner, repo, "pulls"],
            &[("state", "open"), ("per_page", "1")],
        );
        let response = self.get(&url, &[]).await?;

        if let Some(last) = response.header(LINK).and_then(last_page) {
            return Ok(last);
        }
        let pulls: Vec<serde_json::Value> = response.json()?;
        Ok(pulls.len() as u64)
    }

    /// Get CI status from the latest workflow run on the main branch.
    pub async fn get_ci_status(&self, owner: &str, repo: &str) -> Result<CiStatus> {
        let url = self.endpoint(
            &["repos", owner, repo, "actions", "runs"],
            &[("per_page", "1"), ("branch", CI_BRANCH)],
        );
        let runs: WorkflowRunsResponse = self.get(&url, &[]).await?.json()?;
        Ok(runs.into())
    }

    /// Get recent repository events.
    pub async fn get_activity(&self, owner: &str, repo: &str) -> Result<RepoActivity> {
        let url = self.endpoint(&["repos", owner, repo, "events"], &[("per_page", "30")]);
        let events: Vec<RawEvent> = self.get(&url, &[]).await?.json()?;
        Ok(RepoActivity::from_events(
            events.into_iter().map(ActivityEvent::from).collect(),
        ))
    }

    /// Get unique visitors and cloners.
    ///
    /// Traffic needs push access; a 403 means "unsupported here" and yields `None`.
    pub async fn get_traffic(&self, owner: &str, repo: &str) -> Result<Option<TrafficStats>> {
        let views_url = self.endpoint(&["repos", owner, repo, "traffic", "views"], &[]);
        let clones_url = self.endpoint(&["repos", owner, repo, "traffic", "clones"], &[]);

        let (views, clones) = tokio::try_join!(
            self.get(&views_url, &[StatusCode::FORBIDDEN]),
            self.get(&clones_url, &[StatusCode::FORBIDDEN]),
        )?;
        if views.status == StatusCode::FORBIDDEN || clones.status == StatusCode::FORBIDDEN {
            return Ok(None);
        }

        let views: TrafficSummary = views.json()?;
        let clones: TrafficSummary = clones.json()?;
        Ok(Some(TrafficStats {
            unique_visitors: views.uniques,
            unique_cloners: clones.uniques,
        }))
    }

    /// Get the daily commit heatmap for the last year.
    ///
    /// GitHub answers 202 while it computes the statistics; a 403 yields an empty heatmap.
    pub async fn get_commit_heatmap(&self, owner: &str, repo: &str) -> Result<Vec<HeatmapCell>> {
        let url = self.endpoint(&["repos", owner, repo, "stats", "commit_activity"], &[]);
        let response = self.get(&url, &[StatusCode::FORBIDDEN]).await?;
        if response.status == StatusCode::FORBIDDEN || response.body.is_empty() {
            return Ok(Vec::new());
        }

        let weeks: Vec<CommitActivityWeek> = response.json()?;
        Ok(heatmap_from_weeks(&weeks))
    }

    /// Get the newest published release.
    pub async fn get_latest_release(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<ReleaseSummary>> {
        let url = self.endpoint(&["repos", owner, repo, "releases"], &[("per_page", "20")]);
        let releases: Vec<Release> = self.get(&url, &[]).await?.json()?;
        Ok(latest_release(releases))
    }
}

/// Page number of the `rel="last"` entry in a Link header.
pub fn last_page(link: &str) -> Option<u64> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="last""#) {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}
