use crate::hls::progress::ProgressSnapshot;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Parsing,
    Downloading,
    Merging,
    Completed,
    /// Non-terminal: the job continues with an incomplete segment set.
    Warning,
    Error,
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Parsing => "parsing",
            JobStatus::Downloading => "downloading",
            JobStatus::Merging => "merging",
            JobStatus::Completed => "completed",
            JobStatus::Warning => "warning",
            JobStatus::Error => "error",
            JobStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Stopped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A state transition or notice, with a human-readable message.
    Status { status: JobStatus, message: String },
    /// Emitted once per segment outcome.
    Progress(ProgressSnapshot),
}

impl ProgressEvent {
    pub fn status(status: JobStatus, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            status,
            message: message.into(),
        }
    }
}

/// Invoked serially by the coordinator; must not block for long.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
