use reqwest::Proxy;

use crate::DownloadError;

/// Which requests a proxy applies to
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    /// Plain-HTTP requests only
    Http,
    /// HTTPS requests only
    Https,
    /// SOCKS5 proxy for every request
    Socks5,
    /// Every request through the given proxy URL
    All,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Builds a proxy config from a bare URL, picking the type from its scheme.
    /// `socks5://` and `socks5h://` become [`ProxyType::Socks5`], everything else
    /// proxies all traffic.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let proxy_type = if url.starts_with("socks5://") || url.starts_with("socks5h://") {
            ProxyType::Socks5
        } else {
            ProxyType::All
        };
        Self {
            url,
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, DownloadError> {
    let proxy_url = &config.url;
    let invalid = |kind: &str, e: reqwest::Error| {
        DownloadError::Config(format!("Invalid {kind} proxy URL '{proxy_url}': {e}"))
    };

    let mut proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(proxy_url).map_err(|e| invalid("HTTP", e))?,
        ProxyType::Https => Proxy::https(proxy_url).map_err(|e| invalid("HTTPS", e))?,
        ProxyType::Socks5 => {
            let url = if proxy_url.starts_with("socks5://") || proxy_url.starts_with("socks5h://")
            {
                proxy_url.to_string()
            } else {
                format!("socks5://{proxy_url}")
            };
            Proxy::all(&url).map_err(|e| invalid("SOCKS5", e))?
        }
        ProxyType::All => Proxy::all(proxy_url).map_err(|e| invalid("general", e))?,
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
