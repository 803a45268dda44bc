use indicatif::{ProgressBar, ProgressStyle};
use m3u8dl_engine::{JobStatus, ProgressEvent, ProgressSnapshot};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{format_bytes, format_duration};

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn snapshot_message(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{} | {:.1} seg/s | ETA {}{}",
        format_bytes(snapshot.bytes_downloaded),
        snapshot.speed,
        format_duration(snapshot.eta_secs),
        if snapshot.failed > 0 {
            format!(" | {} failed", snapshot.failed)
        } else {
            String::new()
        }
    )
}

/// Renders engine progress events as a progress bar, or as log lines when the
/// bar is disabled.
#[derive(Clone)]
pub struct ProgressManager {
    bar: Option<ProgressBar>,
}

impl ProgressManager {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(download_style());
        bar.enable_steady_tick(Duration::from_millis(500));
        Self { bar: Some(bar) }
    }

    pub fn new_disabled() -> Self {
        Self { bar: None }
    }

    pub fn handle_event(&self, event: &ProgressEvent) {
        match (event, &self.bar) {
            (ProgressEvent::Status { status, message }, Some(bar)) => {
                if status.is_terminal() {
                    bar.finish_with_message(message.clone());
                } else {
                    bar.set_message(message.clone());
                }
            }
            (ProgressEvent::Status { status, message }, None) => match status {
                JobStatus::Warning | JobStatus::Error => warn!(%status, "{message}"),
                _ => info!(%status, "{message}"),
            },
            (ProgressEvent::Progress(snapshot), Some(bar)) => {
                bar.set_length(snapshot.total as u64);
                bar.set_position(snapshot.finished() as u64);
                bar.set_message(snapshot_message(snapshot));
            }
            (ProgressEvent::Progress(snapshot), None) => {
                debug!(
                    completed = snapshot.completed,
                    failed = snapshot.failed,
                    total = snapshot.total,
                    percent = format!("{:.1}", snapshot.percent),
                    "{}",
                    snapshot_message(snapshot)
                );
            }
        }
    }
}
