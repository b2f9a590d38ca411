// Cache path utilities.
// Constructs filesystem paths for the per-repository detail documents.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use super::detail::CacheKey;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "repobar")
}

/// Default base directory for detail documents (~/.cache/repobar/repo-details on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().join("repo-details"))
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path to a repository's detail document: `<base>/<api-host>/<owner>/<name>.json`.
pub fn detail_cache_path(base: &Path, key: &CacheKey) -> PathBuf {
    base.join(sanitize_name(key.api_host()))
        .join(sanitize_name(key.owner()))
        .join(format!("{}.json", sanitize_name(key.name())))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores and refuses relative components.
fn sanitize_name(name: &str) -> String {
    if name.is_empty() || name == "." || name == ".." {
        return "_".to_string();
    }
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("simple"), "simple");
        assert_eq!(sanitize_name("with/slash"), "with_slash");
        assert_eq!(sanitize_name("owner:name"), "owner_name");
        assert_eq!(sanitize_name(".."), "_");
        assert_eq!(sanitize_name(""), "_");
        assert_eq!(sanitize_name("repo.rs"), "repo.rs");
    }

    #[test]
    fn test_detail_cache_path() {
        let key = CacheKey::new("api.github.com", "Acme", "Widgets");
        let path = detail_cache_path(Path::new("/tmp/base"), &key);
        assert_eq!(
            path,
            PathBuf::from("/tmp/base/api.github.com/acme/widgets.json")
        );
    }

    #[test]
    fn test_default_paths() {
        if let Some(dir) = default_cache_dir() {
            assert!(dir.ends_with("repo-details"));
        }
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
