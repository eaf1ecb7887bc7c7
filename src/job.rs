//! Per-request conversion record used for logging and telemetry.

use crate::request::{ConversionMode, ConversionRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Tracks one conversion from acceptance to response.
///
/// Lives only as long as the request; nothing is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub job_id: String,
    pub mode: JobMode,
    pub target: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub output_bytes: Option<usize>,
    pub error: Option<String>,
}

/// Serializable mirror of [`ConversionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Url,
    Html,
}

impl From<ConversionMode> for JobMode {
    fn from(mode: ConversionMode) -> Self {
        match mode {
            ConversionMode::Url => JobMode::Url,
            ConversionMode::Html => JobMode::Html,
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Url => write!(f, "url"),
            JobMode::Html => write!(f, "html"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Rendering,
    Complete,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Rendering => write!(f, "rendering"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl ConversionJob {
    pub fn new(request: &ConversionRequest) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            mode: request.mode().into(),
            target: request.target_summary(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            output_bytes: None,
            error: None,
        }
    }

    pub fn start_rendering(&mut self) {
        self.status = JobStatus::Rendering;
        self.updated_at = Utc::now();
    }

    pub fn mark_complete(&mut self, output_bytes: usize) {
        self.status = JobStatus::Complete;
        self.updated_at = Utc::now();
        self.output_bytes = Some(output_bytes);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.is_finished() {
            Some(self.updated_at.signed_duration_since(self.created_at).num_milliseconds())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn url_job() -> ConversionJob {
        ConversionJob::new(&ConversionRequest::Url(Url::parse("https://example.com").unwrap()))
    }

    #[test]
    fn test_job_creation() {
        let job = url_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.mode, JobMode::Url);
        assert_eq!(job.target, "https://example.com/");
        assert!(job.error.is_none());
        assert!(job.processing_duration_ms().is_none());
    }

    #[test]
    fn test_state_transitions() {
        let mut job = url_job();

        job.start_rendering();
        assert_eq!(job.status, JobStatus::Rendering);
        assert!(!job.is_finished());

        job.mark_complete(1024);
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.output_bytes, Some(1024));
        assert!(job.processing_duration_ms().is_some());
    }

    #[test]
    fn test_failure_keeps_error() {
        let mut job = ConversionJob::new(&ConversionRequest::Html("<p>x</p>".into()));
        job.start_rendering();
        job.mark_failed("net::ERR_CONNECTION_REFUSED".into());

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.mode, JobMode::Html);
        assert_eq!(job.error.as_deref(), Some("net::ERR_CONNECTION_REFUSED"));
        assert!(job.processing_duration_ms().is_some());
    }

    #[test]
    fn test_serializes_lowercase() {
        let job = url_job();
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["mode"], "url");
    }
}
