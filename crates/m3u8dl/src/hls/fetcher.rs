// HLS Segment Fetcher: downloads one segment with retry and backoff, decrypts it
// when needed and writes it to the job's scratch directory.

use crate::DownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::DecryptionService;
use crate::hls::playlist::Segment;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Final result for one segment.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success { path: PathBuf, bytes: u64 },
    /// Carries the error of the last attempt.
    Failure(DownloadError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Never fails: every error path ends in [`FetchOutcome::Failure`].
    async fn fetch(
        &self,
        segment: &Segment,
        scratch_dir: &Path,
        cancel: &CancellationToken,
    ) -> FetchOutcome;
}

pub struct SegmentFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
    decryption: Arc<DecryptionService>,
}

impl SegmentFetcher {
    pub fn new(
        http_client: Client,
        config: Arc<HlsConfig>,
        decryption: Arc<DecryptionService>,
    ) -> Self {
        Self {
            http_client,
            config,
            decryption,
        }
    }

    /// One attempt: GET, decrypt, persist. Returns the number of bytes written.
    async fn attempt(&self, segment: &Segment, path: &Path) -> Result<u64, DownloadError> {
        let response = self
            .http_client
            .get(&segment.url)
            .timeout(self.config.fetcher_config.segment_download_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                status: response.status(),
                url: segment.url.clone(),
            });
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(DownloadError::EmptyBody(segment.url.clone()));
        }

        let data = match &segment.encryption {
            Some(info) => self.decryption.decrypt(data, info, segment.index).await?,
            None => data,
        };

        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    async fn fetch(
        &self,
        segment: &Segment,
        scratch_dir: &Path,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let fetcher_config = &self.config.fetcher_config;
        let max_attempts = fetcher_config.max_segment_retries.max(1);
        let path = scratch_dir.join(self.config.output_config.segment_file_name(segment.index));
        let mut last_error = DownloadError::Cancelled;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return FetchOutcome::Failure(DownloadError::Cancelled);
            }

            match self.attempt(segment, &path).await {
                Ok(bytes) => {
                    debug!(index = segment.index, bytes, attempt, "Segment downloaded");
                    return FetchOutcome::Success { path, bytes };
                }
                Err(e) => {
                    warn!(
                        index = segment.index,
                        url = %segment.url,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Segment attempt failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = e;
                    if !retryable || attempt + 1 >= max_attempts {
                        break;
                    }

                    let delay = fetcher_config.retry_delay(attempt);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return FetchOutcome::Failure(DownloadError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        FetchOutcome::Failure(last_error)
    }
}
