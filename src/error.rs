// Error types for repobar.
// Classifies GitHub API failures (rate limits, still-computing, bad status) and local errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoBarError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("{message}")]
    RateLimited {
        until: DateTime<Utc>,
        message: String,
    },

    #[error("{message}")]
    StillComputing {
        retry_after: DateTime<Utc>,
        message: String,
    },

    #[error("HTTP {code}: {message}")]
    BadStatus { code: u16, message: String },

    #[error("Missing GitHub token (set GITHUB_TOKEN or api.token in config)")]
    MissingToken,

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RepoBarError {
    /// Build a rate-limited error with a human readable reset time.
    pub fn rate_limited(until: DateTime<Utc>) -> Self {
        Self::RateLimited {
            until,
            message: format!(
                "GitHub rate limit exceeded, resets at {}",
                until.format("%H:%M:%S UTC")
            ),
        }
    }

    /// Build a still-computing error for a URL the server is preparing.
    pub fn still_computing(retry_after: DateTime<Utc>) -> Self {
        Self::StillComputing {
            retry_after,
            message: format!(
                "GitHub is still computing this data, retry after {}",
                retry_after.format("%H:%M:%S UTC")
            ),
        }
    }

    /// Timestamp before which retrying is pointless, if the server told us one.
    pub fn rate_limit_until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { until, .. } => Some(*until),
            Self::StillComputing { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn is_still_computing(&self) -> bool {
        matches!(self, Self::StillComputing { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepoBarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_until() {
        let at = DateTime::from_timestamp(1_704_067_200, 0).unwrap();

        assert_eq!(RepoBarError::rate_limited(at).rate_limit_until(), Some(at));
        assert_eq!(
            RepoBarError::still_computing(at).rate_limit_until(),
            Some(at)
        );
        assert_eq!(
            RepoBarError::BadStatus {
                code: 500,
                message: "boom".to_string()
            }
            .rate_limit_until(),
            None
        );
    }

    #[test]
    fn test_messages() {
        let at = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        assert_eq!(
            RepoBarError::rate_limited(at).to_string(),
            "GitHub rate limit exceeded, resets at 00:00:00 UTC"
        );
        let bad = RepoBarError::BadStatus {
            code: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(bad.to_string(), "HTTP 404: Not Found");
    }
}
