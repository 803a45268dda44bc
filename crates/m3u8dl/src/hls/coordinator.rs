// HLS Download Coordinator: drives one job from playlist resolution through
// bounded segment downloads to the merged output file.

use crate::downloader::create_client;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::DecryptionService;
use crate::hls::events::{JobStatus, ProgressCallback, ProgressEvent};
use crate::hls::fetcher::{FetchOutcome, SegmentDownloader, SegmentFetcher};
use crate::hls::job::{DownloadJob, JobState};
use crate::hls::merger::Merger;
use crate::hls::playlist::{Playlist, PlaylistResolver};
use crate::hls::progress::ProgressTracker;
use crate::hls::scheduler::SegmentScheduler;
use crate::DownloadError;
use crate::utils::{is_playlist_url, is_valid_url};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Inputs for a single download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub playlist_url: String,
    pub output_path: PathBuf,
    /// Copied over the configured default headers for this job only.
    pub headers: HeaderMap,
    /// Overrides the configured download concurrency.
    pub max_workers: Option<usize>,
    /// Overrides the configured attempts per segment.
    pub max_retries: Option<u32>,
}

impl DownloadRequest {
    pub fn new(playlist_url: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            playlist_url: playlist_url.into(),
            output_path: output_path.into(),
            headers: HeaderMap::new(),
            max_workers: None,
            max_retries: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }
}

/// How a job that did not fail ended.
enum JobEnd {
    Completed { bytes: u64 },
    Stopped,
}

/// Runs download jobs, one at a time, and exposes cooperative cancellation.
pub struct DownloadCoordinator {
    config: Arc<HlsConfig>,
    cancel: Mutex<CancellationToken>,
}

impl DownloadCoordinator {
    pub fn new(config: HlsConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    /// Requests cancellation of the current run. Idempotent and callable from
    /// any thread, including from inside the progress callback. A stop issued
    /// before a run starts is cleared by that run.
    pub fn stop(&self) {
        let token = self.cancel.lock();
        if !token.is_cancelled() {
            info!("Stop requested");
            token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.lock().is_cancelled()
    }

    /// Downloads `request` and returns whether a usable output file was written.
    ///
    /// Errors are never propagated: they end in an `error` status event and a
    /// `false` return.
    pub async fn run(&self, request: DownloadRequest, on_progress: ProgressCallback) -> bool {
        let cancel = {
            let mut token = self.cancel.lock();
            *token = CancellationToken::new();
            token.clone()
        };
        let span = info_span!("download_job", url = %request.playlist_url);

        async move {
            let config = Arc::new(self.job_config(&request));
            let mut job = DownloadJob::new(&request.output_path, &config.output_config);

            let result = self
                .execute(&config, &request, &mut job, &cancel, &on_progress)
                .await;
            job.cleanup_scratch().await;

            match result {
                Ok(JobEnd::Completed { bytes }) => {
                    job.transition(JobState::Completed);
                    info!(output = %job.output_path().display(), bytes, "Download completed");
                    on_progress(ProgressEvent::status(
                        JobStatus::Completed,
                        format!("Download completed: {}", job.output_path().display()),
                    ));
                    true
                }
                Ok(JobEnd::Stopped) => {
                    job.transition(JobState::Stopped);
                    info!("Download stopped");
                    on_progress(ProgressEvent::status(JobStatus::Stopped, "Download stopped"));
                    false
                }
                Err(e) => {
                    job.transition(JobState::Failed);
                    error!(error = %e, category = ?e.category(), "Download failed");
                    on_progress(ProgressEvent::status(
                        JobStatus::Error,
                        format!("Download failed: {e}"),
                    ));
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Configured defaults with the request's overrides applied.
    fn job_config(&self, request: &DownloadRequest) -> HlsConfig {
        let mut config = (*self.config).clone();
        if let Some(workers) = request.max_workers {
            config.scheduler_config.download_concurrency = workers;
        }
        if let Some(retries) = request.max_retries {
            config.fetcher_config.max_segment_retries = retries;
        }
        config
    }

    async fn execute(
        &self,
        config: &Arc<HlsConfig>,
        request: &DownloadRequest,
        job: &mut DownloadJob,
        cancel: &CancellationToken,
        on_progress: &ProgressCallback,
    ) -> Result<JobEnd, DownloadError> {
        on_progress(ProgressEvent::status(JobStatus::Parsing, "Parsing playlist"));

        if !is_valid_url(&request.playlist_url) {
            return Err(DownloadError::InvalidUrl(request.playlist_url.clone()));
        }
        if !is_playlist_url(&request.playlist_url) {
            warn!("URL does not look like an M3U8 playlist, trying anyway");
        }

        let headers = config.base.merged_headers(&request.headers);
        let client = create_client(&config.base, headers)?;

        let playlist = PlaylistResolver::new(client.clone(), Arc::clone(config))
            .resolve(&request.playlist_url)
            .await?;
        self.check_encryption(&playlist, on_progress)?;

        if cancel.is_cancelled() {
            return Ok(JobEnd::Stopped);
        }

        job.prepare_scratch().await?;
        job.transition(JobState::Downloading);
        let total = playlist.segments.len();
        on_progress(ProgressEvent::status(
            JobStatus::Downloading,
            format!("Downloading {total} segments"),
        ));

        let decryption = Arc::new(DecryptionService::new(client.clone(), Arc::clone(config)));
        let fetcher: Arc<dyn SegmentDownloader> =
            Arc::new(SegmentFetcher::new(client, Arc::clone(config), decryption));
        let scheduler = SegmentScheduler::new(
            fetcher,
            config.scheduler_config.effective_concurrency(),
            cancel.clone(),
        );

        let mut tracker = ProgressTracker::new(total);
        let mut files = Vec::with_capacity(total);
        scheduler
            .run(&playlist.segments, job.scratch_dir(), |segment, outcome| {
                match outcome {
                    FetchOutcome::Success { path, bytes } => {
                        tracker.record_success(bytes);
                        files.push(path);
                    }
                    FetchOutcome::Failure(e) => {
                        if !matches!(e, DownloadError::Cancelled) {
                            warn!(index = segment.index, error = %e, "Segment failed");
                        }
                        tracker.record_failure();
                    }
                }
                on_progress(ProgressEvent::Progress(tracker.snapshot()));
            })
            .await;

        if cancel.is_cancelled() {
            return Ok(JobEnd::Stopped);
        }

        let completed = tracker.completed();
        let failed = tracker.failed();
        if completed == 0 {
            return Err(DownloadError::NoSegmentsDownloaded { failed });
        }
        if failed > 0 {
            let message = self.partial_warning(config, completed, total);
            on_progress(ProgressEvent::status(JobStatus::Warning, message));
        }

        job.transition(JobState::Merging);
        on_progress(ProgressEvent::status(
            JobStatus::Merging,
            format!("Merging {completed} segments"),
        ));
        debug!(files = files.len(), "Handing segments to merger");
        let bytes = Merger::merge(&files, job.output_path()).await?;
        Ok(JobEnd::Completed { bytes })
    }

    /// Fails on unrecognized methods and announces supported encryption.
    fn check_encryption(
        &self,
        playlist: &Playlist,
        on_progress: &ProgressCallback,
    ) -> Result<(), DownloadError> {
        if let Some(method) = playlist.unrecognized_method() {
            return Err(DownloadError::UnsupportedEncryption(method.to_string()));
        }
        if let Some(encryption) = &playlist.encryption {
            info!(method = %encryption.method, key_uri = ?encryption.key_uri, "Encrypted playlist");
            on_progress(ProgressEvent::status(
                JobStatus::Parsing,
                format!(
                    "Detected {} encryption, preparing decryption",
                    encryption.method
                ),
            ));
        }
        Ok(())
    }

    fn partial_warning(&self, config: &HlsConfig, completed: usize, total: usize) -> String {
        let ratio = completed as f64 / total as f64;
        let threshold = config.output_config.success_ratio_warning_threshold;
        if ratio < threshold {
            warn!(completed, total, ratio, "Output will be heavily incomplete");
            format!("Only {completed}/{total} segments downloaded, output will be heavily incomplete")
        } else {
            info!(completed, total, "Some segments failed");
            format!(
                "{} of {total} segments failed, some time ranges will be missing",
                total - completed
            )
        }
    }
}
