//! # m3u8dl-engine
//!
//! Downloads an HLS (M3U8) video-on-demand playlist into a single file.
//!
//! ## Features
//!
//! - Master playlists are followed to their first variant
//! - AES-128 segment decryption with a job-scoped key cache
//! - Bounded concurrent segment downloads with retry and backoff
//! - Progress events through a synchronous callback
//! - Cooperative cancellation via [`DownloadCoordinator::stop`]
//!
//! ```no_run
//! use std::sync::Arc;
//! use m3u8dl_engine::{DownloadRequest, HlsConfig, ProgressEvent};
//!
//! # async fn demo() {
//! let coordinator = HlsConfig::builder().download_concurrency(8).build_coordinator();
//! let request = DownloadRequest::new("https://example.com/vod/index.m3u8", "video.mp4");
//! let ok = coordinator
//!     .run(request, Arc::new(|event: ProgressEvent| println!("{event:?}")))
//!     .await;
//! # let _ = ok;
//! # }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod proxy;
pub mod utils;

pub use config::DownloaderConfig;
pub use downloader::create_client;
pub use error::{DownloadError, ErrorCategory};
pub use hls::{
    DownloadCoordinator, DownloadRequest, HlsConfig, HlsConfigBuilder, JobStatus,
    ProgressCallback, ProgressEvent, ProgressSnapshot,
};
