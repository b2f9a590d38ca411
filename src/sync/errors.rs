// Error accumulation for one repository refresh.
// Folds per-field failures into one user-facing message and the longest applicable wait.

use chrono::{DateTime, Utc};

use crate::cache::DetailField;
use crate::error::RepoBarError;

/// Collects failures from independent field fetches.
#[derive(Debug, Default, Clone)]
pub struct ErrorAccumulator {
    /// Distinct messages in the order they were first seen.
    messages: Vec<String>,
    failed_fields: Vec<DetailField>,
    rate_limited_until: Option<DateTime<Utc>>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. `field` is `None` for the repository metadata call.
    ///
    /// Still-computing responses only contribute their retry time; they are not errors.
    pub fn record(&mut self, field: Option<DetailField>, error: &RepoBarError) {
        if let Some(until) = error.rate_limit_until() {
            self.note_rate_limit(until);
        }
        if error.is_still_computing() {
            return;
        }
        if let Some(field) = field {
            if !self.failed_fields.contains(&field) {
                self.failed_fields.push(field);
            }
        }
        let message = error.to_string();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    /// Keep the latest wait seen so far.
    pub fn note_rate_limit(&mut self, until: DateTime<Utc>) {
        if self.rate_limited_until.is_none_or(|existing| until > existing) {
            self.rate_limited_until = Some(until);
        }
    }

    /// The first distinct error message.
    pub fn message(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn failed_fields(&self) -> &[DetailField] {
        &self.failed_fields
    }

    pub fn rate_limited_until(&self) -> Option<DateTime<Utc>> {
        self.rate_limited_until
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.rate_limited_until.is_none()
    }
}
