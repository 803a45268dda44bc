// Per-request job state: output location, scratch directory and lifecycle.

use crate::DownloadError;
use crate::hls::config::HlsOutputConfig;
use crate::hls::events::JobStatus;
use crate::utils::{ensure_extension, with_name_suffix};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Parsing,
    Downloading,
    Merging,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Stopped
        )
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Parsing => JobStatus::Parsing,
            JobState::Downloading => JobStatus::Downloading,
            JobState::Merging => JobStatus::Merging,
            JobState::Completed => JobStatus::Completed,
            JobState::Failed => JobStatus::Error,
            JobState::Stopped => JobStatus::Stopped,
        }
    }

    fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Failed) | (_, Stopped) => true,
            (Parsing, Downloading) | (Downloading, Merging) | (Merging, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct DownloadJob {
    output_path: PathBuf,
    scratch_dir: PathBuf,
    scratch_created: bool,
    state: JobState,
}

impl DownloadJob {
    /// The output path gets the default extension when it has none; the
    /// scratch directory is the output path plus the configured suffix.
    pub fn new(output_path: &Path, output_config: &HlsOutputConfig) -> Self {
        let output_path = ensure_extension(output_path, &output_config.default_output_extension);
        let scratch_dir = with_name_suffix(&output_path, &output_config.scratch_dir_suffix);
        Self {
            output_path,
            scratch_dir,
            scratch_created: false,
            state: JobState::Parsing,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Moves to `next`; returns false and keeps the current state when the
    /// transition is not allowed.
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Ignoring invalid job state transition");
            return false;
        }
        debug!(from = ?self.state, to = ?next, "Job state transition");
        self.state = next;
        true
    }

    pub async fn prepare_scratch(&mut self) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        self.scratch_created = true;
        debug!(scratch_dir = %self.scratch_dir.display(), "Scratch directory ready");
        Ok(())
    }

    /// Removes the scratch directory if this job created it. Errors are logged
    /// and otherwise ignored.
    pub async fn cleanup_scratch(&mut self) {
        if !self.scratch_created {
            return;
        }
        match tokio::fs::remove_dir_all(&self.scratch_dir).await {
            Ok(()) => debug!(scratch_dir = %self.scratch_dir.display(), "Scratch directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                scratch_dir = %self.scratch_dir.display(),
                error = %e,
                "Failed to remove scratch directory"
            ),
        }
        self.scratch_created = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = HlsOutputConfig::default();
        let job = DownloadJob::new(Path::new("/data/movie"), &config);
        assert_eq!(job.output_path(), Path::new("/data/movie.mp4"));
        assert_eq!(job.scratch_dir(), Path::new("/data/movie.mp4_temp"));
        assert_eq!(job.state(), JobState::Parsing);
    }

    #[test]
    fn test_transitions() {
        let config = HlsOutputConfig::default();
        let mut job = DownloadJob::new(Path::new("a.ts"), &config);
        assert!(!job.transition(JobState::Merging));
        assert!(job.transition(JobState::Downloading));
        assert!(job.transition(JobState::Stopped));
        assert!(!job.transition(JobState::Failed));
        assert_eq!(job.state().status(), JobStatus::Stopped);
    }

    #[tokio::test]
    async fn test_scratch_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = HlsOutputConfig::default();

        // A pre-existing directory the job did not create is left alone.
        let mut untouched = DownloadJob::new(&dir.path().join("other.mp4"), &config);
        std::fs::create_dir_all(untouched.scratch_dir()).unwrap();
        untouched.cleanup_scratch().await;
        assert!(untouched.scratch_dir().exists());

        let mut job = DownloadJob::new(&dir.path().join("video.mp4"), &config);
        job.prepare_scratch().await.unwrap();
        std::fs::write(job.scratch_dir().join("segment_000000.ts"), b"x").unwrap();
        assert!(job.scratch_dir().is_dir());
        job.cleanup_scratch().await;
        assert!(!job.scratch_dir().exists());
    }
}
