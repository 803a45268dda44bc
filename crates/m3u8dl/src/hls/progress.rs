use serde::Serialize;
use std::time::{Duration, Instant};

/// Point-in-time view of a job's segment counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Bytes written to scratch files so far.
    pub bytes_downloaded: u64,
    pub elapsed_secs: f64,
    /// Finished (successful or failed) segments as a percentage of `total`.
    pub percent: f64,
    /// Successful segments per second.
    pub speed: f64,
    /// Estimated seconds remaining, 0 until the first success.
    pub eta_secs: f64,
}

impl ProgressSnapshot {
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }
}

/// Segment counters for one job, owned and updated by the coordinator only.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
    failed: usize,
    bytes_downloaded: u64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            bytes_downloaded: 0,
            started: Instant::now(),
        }
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.completed += 1;
        self.bytes_downloaded += bytes;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.started.elapsed())
    }

    fn snapshot_at(&self, elapsed: Duration) -> ProgressSnapshot {
        let finished = self.completed + self.failed;
        let elapsed_secs = elapsed.as_secs_f64();
        let percent = if self.total > 0 {
            finished as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
        // The +1 keeps the rate finite right after start.
        let speed = self.completed as f64 / (elapsed_secs + 1.0);
        let eta_secs = if self.completed > 0 {
            self.total.saturating_sub(finished) as f64 / speed
        } else {
            0.0
        };

        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            bytes_downloaded: self.bytes_downloaded,
            elapsed_secs,
            percent,
            speed,
            eta_secs,
        }
    }
}
