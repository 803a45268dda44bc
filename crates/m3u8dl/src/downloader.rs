use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, info};

use crate::{DownloadError, DownloaderConfig, proxy::build_proxy_from_config};

/// Create a reqwest Client with the provided configuration.
///
/// `headers` are the job headers (configured defaults already merged with the
/// caller's custom headers); they are installed as the client's default headers.
pub fn create_client(config: &DownloaderConfig, headers: HeaderMap) -> Result<Client, DownloadError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(32) // One idle connection per worker
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        // Explicit proxy configuration takes precedence
        let proxy = build_proxy_from_config(proxy_config)?;
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings for downloads");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(DownloadError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyConfig;

    #[test]
    fn test_create_client_with_defaults() {
        let config = DownloaderConfig::default();
        let headers = config.headers.clone();
        assert!(create_client(&config, headers).is_ok());
    }

    #[test]
    fn test_create_client_with_proxy() {
        let config = DownloaderConfig {
            proxy: Some(ProxyConfig::from_url("socks5://127.0.0.1:1080")),
            use_system_proxy: false,
            ..Default::default()
        };
        assert!(create_client(&config, HeaderMap::new()).is_ok());
    }
}
