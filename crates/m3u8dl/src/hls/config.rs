use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::DownloaderConfig;

/// Upper bound for concurrent segment downloads.
pub const MAX_DOWNLOAD_CONCURRENCY: usize = 32;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub decryption_config: HlsDecryptionConfig,
    pub output_config: HlsOutputConfig,
}

impl HlsConfig {
    pub fn builder() -> crate::hls::builder::HlsConfigBuilder {
        crate::hls::builder::HlsConfigBuilder::new()
    }
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    /// Timeout for each playlist request; every master -> variant hop gets its own.
    /// Kept above the segment timeout since one resolve may walk several hops.
    pub playlist_fetch_timeout: Duration,
    /// Maximum number of master -> variant hops before giving up.
    pub max_variant_hops: usize,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(45),
            max_variant_hops: 5,
        }
    }
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    pub download_concurrency: usize, // Max concurrent segment downloads
}

impl HlsSchedulerConfig {
    /// Concurrency clamped to `1..=MAX_DOWNLOAD_CONCURRENCY`.
    pub fn effective_concurrency(&self) -> usize {
        self.download_concurrency.clamp(1, MAX_DOWNLOAD_CONCURRENCY)
    }
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 16,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    pub segment_download_timeout: Duration,
    /// Total attempts per segment, including the first one.
    pub max_segment_retries: u32,
    pub segment_retry_delay_base: Duration, // Base for exponential backoff
    pub segment_retry_delay_max: Duration,
}

impl HlsFetcherConfig {
    /// Delay after the failed attempt `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.segment_retry_delay_base
            .saturating_mul(factor)
            .min(self.segment_retry_delay_max)
    }
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            segment_download_timeout: Duration::from_secs(30),
            max_segment_retries: 3,
            segment_retry_delay_base: Duration::from_secs(1),
            segment_retry_delay_max: Duration::from_secs(10),
        }
    }
}

// --- Decryption Configuration ---
#[derive(Debug, Clone)]
pub struct HlsDecryptionConfig {
    pub key_download_timeout: Duration,
    /// Extra headers sent with key requests only, layered over the job headers.
    pub key_headers: HeaderMap,
    /// Run AES decryption on the blocking thread pool instead of the worker task.
    pub offload_decryption_to_cpu_pool: bool,
}

impl Default for HlsDecryptionConfig {
    fn default() -> Self {
        Self {
            key_download_timeout: Duration::from_secs(10),
            key_headers: HeaderMap::new(),
            offload_decryption_to_cpu_pool: true,
        }
    }
}

// --- Output Configuration ---
#[derive(Debug, Clone)]
pub struct HlsOutputConfig {
    /// Appended to the output path to name the job's scratch directory.
    pub scratch_dir_suffix: String,
    pub segment_file_prefix: String,
    pub segment_file_extension: String,
    /// Zero-padding width of the index in scratch file names.
    pub segment_index_width: usize,
    /// Extension given to output paths that have none.
    pub default_output_extension: String,
    /// Success ratio under which a partial download is reported as heavily incomplete.
    pub success_ratio_warning_threshold: f64,
}

impl HlsOutputConfig {
    /// Scratch file name for the segment at `index`, e.g. `segment_000042.ts`.
    pub fn segment_file_name(&self, index: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            self.segment_file_prefix,
            index,
            self.segment_file_extension,
            width = self.segment_index_width
        )
    }
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            scratch_dir_suffix: "_temp".to_string(),
            segment_file_prefix: "segment_".to_string(),
            segment_file_extension: "ts".to_string(),
            segment_index_width: 6,
            default_output_extension: "mp4".to_string(),
            success_ratio_warning_threshold: 0.8,
        }
    }
}
