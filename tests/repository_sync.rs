// Integration tests for the repository sync service.
// Runs the public facade against a local mock GitHub API.

use std::path::Path;

use chrono::{DateTime, Utc};
use mockito::{Matcher, Mock, ServerGuard};
use repobar::cache::FieldFreshness;
use repobar::{Config, RepoSync};
use tempfile::TempDir;

const REPO_JSON: &str = r#"{
    "id": 7,
    "name": "b",
    "full_name": "a/b",
    "owner": {"login": "a"},
    "private": false,
    "description": null,
    "html_url": "https://github.com/a/b",
    "stargazers_count": 1,
    "forks_count": 0,
    "open_issues_count": 2,
    "pushed_at": null
}"#;

fn sync_for(server: &ServerGuard, cache_dir: &Path) -> RepoSync {
    let mut config = Config::default();
    config.api.base_url = server.url();
    config.api.token = Some("test-token".to_string());
    config.cache.dir = Some(cache_dir.to_path_buf());
    RepoSync::from_config(&config).unwrap()
}

async fn mock_get(server: &mut ServerGuard, path: &str, body: &str, hits: usize) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("etag", &format!("\"{}\"", path.len()))
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

/// Mocks for every detail endpoint, each expecting `hits` requests.
async fn mock_details(server: &mut ServerGuard, hits: usize) -> Vec<Mock> {
    vec![
        mock_get(server, "/repos/a/b/pulls", "[{}]", hits).await,
        mock_get(
            server,
            "/repos/a/b/actions/runs",
            r#"{"total_count": 1, "workflow_runs": [{"status": "in_progress", "conclusion": null}]}"#,
            hits,
        )
        .await,
        mock_get(
            server,
            "/repos/a/b/events",
            r#"[{"type": "IssuesEvent", "actor": {"login": "octocat"}, "payload": {"issue": {"title": "Broken widget", "html_url": "https://github.com/a/b/issues/1"}}, "created_at": "2024-05-01T12:00:00Z"}]"#,
            hits,
        )
        .await,
        mock_get(server, "/repos/a/b/traffic/views", r#"{"count": 3, "uniques": 2}"#, hits).await,
        mock_get(server, "/repos/a/b/traffic/clones", r#"{"count": 1, "uniques": 1}"#, hits).await,
        mock_get(
            server,
            "/repos/a/b/stats/commit_activity",
            r#"[{"week": 1714262400, "days": [0, 1, 2, 0, 0, 4, 0], "total": 7}]"#,
            hits,
        )
        .await,
        mock_get(
            server,
            "/repos/a/b/releases",
            r#"[{"name": "", "tag_name": "v0.2.0", "html_url": "https://github.com/a/b/releases/v0.2.0", "draft": false, "created_at": "2024-04-01T00:00:00Z", "published_at": "2024-04-02T00:00:00Z"}]"#,
            hits,
        )
        .await,
    ]
}

#[tokio::test]
async fn test_full_repository_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let _repo = mock_get(&mut server, "/repos/a/b", REPO_JSON, 1).await;
    let _details = mock_details(&mut server, 1).await;

    let snapshot = sync_for(&server, temp_dir.path())
        .full_repository("a", "b")
        .await;

    assert_eq!(snapshot.full_name, "a/b");
    assert_eq!(snapshot.open_pulls, 1);
    assert_eq!(snapshot.open_issues, 1);
    assert_eq!(snapshot.commit_heatmap.len(), 7);
    assert_eq!(snapshot.latest_release.unwrap().name, "v0.2.0");

    let activity = snapshot.activity.unwrap();
    assert_eq!(activity.events[0].title, "Broken widget");
    assert!(activity.most_recent.is_some());
    assert!(snapshot.error.is_none());
    assert!(snapshot.rate_limited_until.is_none());
}

#[tokio::test]
async fn test_concurrent_calls_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let mut mocks = mock_details(&mut server, 1).await;
    mocks.push(mock_get(&mut server, "/repos/a/b", REPO_JSON, 1).await);
    let sync = sync_for(&server, temp_dir.path());

    let (first, second) = tokio::join!(
        sync.full_repository("a", "b"),
        sync.full_repository("A", "B"),
    );

    for mock in &mocks {
        mock.assert_async().await;
    }
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_details_survive_restart() {
    let mut server = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let repo = mock_get(&mut server, "/repos/a/b", REPO_JSON, 2).await;
    let details = mock_details(&mut server, 1).await;

    let first = sync_for(&server, temp_dir.path())
        .full_repository("a", "b")
        .await;
    // A new service has empty memory and request state, so only disk can serve the details.
    let second = sync_for(&server, temp_dir.path())
        .full_repository("a", "b")
        .await;

    repo.assert_async().await;
    for mock in &details {
        mock.assert_async().await;
    }
    assert_eq!(second.open_pulls, first.open_pulls);
    assert_eq!(second.latest_release, first.latest_release);
    assert_eq!(second.cache_state.open_pulls, FieldFreshness::Fresh);
}

#[tokio::test]
async fn test_exhausted_quota_fails_fast() {
    let mut server = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let reset = 4_102_444_800_i64; // 2100-01-01
    let repo = server
        .mock("GET", "/repos/a/b")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .with_header("x-ratelimit-reset", &reset.to_string())
        .with_body(r#"{"message": "API rate limit exceeded"}"#)
        .expect(1)
        .create_async()
        .await;

    let sync = sync_for(&server, temp_dir.path());
    let first = sync.full_repository("a", "b").await;
    let second = sync.full_repository("a", "b").await;

    repo.assert_async().await;
    let until = DateTime::<Utc>::from_timestamp(reset, 0);
    assert_eq!(first.rate_limited_until, until);
    assert_eq!(second.rate_limited_until, until);
    assert!(
        second
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("GitHub rate limit exceeded"))
    );
    assert_eq!(sync.diagnostics().rate_limit_reset, until);
}

#[tokio::test]
async fn test_clear_cache_starts_cold() {
    let mut server = mockito::Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let cache_dir = temp_dir.path().join("details");
    let _repo = mock_get(&mut server, "/repos/a/b", REPO_JSON, 1).await;
    let _details = mock_details(&mut server, 1).await;

    let sync = sync_for(&server, &cache_dir);
    sync.full_repository("a", "b").await;
    assert!(cache_dir.exists());
    assert!(sync.diagnostics().etag_entry_count > 0);

    sync.clear_cache().await;

    assert!(!cache_dir.exists());
    let diagnostics = sync.diagnostics();
    assert_eq!(diagnostics.etag_entry_count, 0);
    assert_eq!(diagnostics.cooldown_entry_count, 0);
    assert!(diagnostics.rate_limit_reset.is_none());
}
