//! # Job configuration builder
//!
//! Single fluent entry point for everything a [`DownloadCoordinator`] needs:
//! the HTTP client settings shared by every request, playlist resolution,
//! segment scheduling and retry, and key fetching.
//!
//! ```
//! use std::time::Duration;
//! use m3u8dl_engine::HlsConfig;
//!
//! let config = HlsConfig::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .segment_download_timeout(Duration::from_secs(20))
//!     .download_concurrency(8)
//!     .build();
//! assert_eq!(config.scheduler_config.effective_concurrency(), 8);
//! ```

use crate::{
    hls::{DownloadCoordinator, config::HlsConfig},
    proxy::ProxyConfig,
};
use reqwest::header::HeaderMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct HlsConfigBuilder {
    config: HlsConfig,
}

impl HlsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // HTTP client

    /// Replaces the browser user agent sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.base.user_agent = user_agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.connect_timeout = timeout;
        self
    }

    /// Routes every request through `proxy_config`; the system proxy is ignored.
    pub fn proxy(mut self, proxy_config: ProxyConfig) -> Self {
        self.config.base.proxy = Some(proxy_config);
        self.config.base.use_system_proxy = false;
        self
    }

    /// Has no effect once an explicit proxy is set.
    pub fn use_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.base.proxy.is_none() {
            self.config.base.use_system_proxy = use_system_proxy;
        }
        self
    }

    // Playlist

    pub fn playlist_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.playlist_config.playlist_fetch_timeout = timeout;
        self
    }

    pub fn max_variant_hops(mut self, hops: usize) -> Self {
        self.config.playlist_config.max_variant_hops = hops;
        self
    }

    // Segments

    /// Default worker count; a request may override it.
    pub fn download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scheduler_config.download_concurrency = concurrency;
        self
    }

    pub fn segment_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    /// Backoff after the first failed attempt; doubles per attempt up to `max`.
    pub fn segment_retry_delay_base(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay_base = delay;
        self
    }

    pub fn segment_retry_delay_max(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay_max = delay;
        self
    }

    // Keys

    pub fn key_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.decryption_config.key_download_timeout = timeout;
        self
    }

    /// Headers sent with key requests only. A name also present in the job
    /// headers is replaced for the key request.
    pub fn key_headers(mut self, headers: HeaderMap) -> Self {
        self.config.decryption_config.key_headers = headers;
        self
    }

    pub fn build(self) -> HlsConfig {
        self.config
    }

    pub fn build_coordinator(self) -> DownloadCoordinator {
        DownloadCoordinator::new(self.config)
    }
}
