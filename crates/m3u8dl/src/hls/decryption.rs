// HLS Decryption Service: fetches AES-128 keys once per job and decrypts segments.

use crate::DownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::playlist::{EncryptionInfo, EncryptionMethod};
use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use moka::future::Cache;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, trace};

const AES_BLOCK_SIZE: usize = 16;
const AES_KEY_SIZE: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128-CBC segment decryption.
pub struct SegmentCipher;

impl SegmentCipher {
    /// IV used when a key declaration has none: the segment index as a 128-bit
    /// big-endian integer.
    pub fn default_iv(index: usize) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[8..].copy_from_slice(&(index as u64).to_be_bytes());
        iv
    }

    /// Decrypts without padding validation.
    ///
    /// The trailing padding is stripped when the last byte is in `1..=16`; any
    /// other value leaves the plaintext untouched.
    pub fn decrypt(data: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>, DownloadError> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(DownloadError::Decryption(format!(
                "Ciphertext length {} is not a multiple of {AES_BLOCK_SIZE}",
                data.len()
            )));
        }

        let cipher = Aes128CbcDec::new_from_slices(key, iv).map_err(|e| {
            DownloadError::Decryption(format!("Failed to initialize AES decryptor: {e}"))
        })?;

        let mut buffer = data.to_vec();
        let len = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|e| DownloadError::Decryption(format!("Decryption failed: {e}")))?
            .len();
        buffer.truncate(len);

        if let Some(&pad) = buffer.last() {
            let pad = pad as usize;
            if (1..=AES_BLOCK_SIZE).contains(&pad) && pad <= buffer.len() {
                buffer.truncate(buffer.len() - pad);
            }
        }

        Ok(buffer)
    }
}

// --- KeyStore Struct ---
// Job-scoped key cache. A fetch is a single attempt; retries belong to the segment.
pub struct KeyStore {
    http_client: Client,
    config: Arc<HlsConfig>,
    /// Keys by absolute URI.
    keys: Cache<String, Bytes>,
}

impl KeyStore {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
            keys: Cache::builder().build(),
        }
    }

    /// Returns the key for `key_uri`, fetching it at most once even when many
    /// segments ask concurrently. Failed fetches are not cached.
    pub async fn get_key(&self, key_uri: &str) -> Result<Bytes, DownloadError> {
        self.keys
            .try_get_with(key_uri.to_string(), self.fetch_key(key_uri))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn fetch_key(&self, key_uri: &str) -> Result<Bytes, DownloadError> {
        debug!(key_uri, "Fetching decryption key");
        let response = self
            .http_client
            .get(key_uri)
            .headers(self.config.decryption_config.key_headers.clone())
            .timeout(self.config.decryption_config.key_download_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                status: response.status(),
                url: key_uri.to_string(),
            });
        }

        let key = response.bytes().await?;
        if key.len() != AES_KEY_SIZE {
            return Err(DownloadError::Decryption(format!(
                "Decryption key from {key_uri} has incorrect length: {} bytes (expected {AES_KEY_SIZE})",
                key.len()
            )));
        }
        Ok(key)
    }
}

// --- DecryptionService Struct ---
pub struct DecryptionService {
    config: Arc<HlsConfig>,
    key_store: KeyStore,
}

impl DecryptionService {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            key_store: KeyStore::new(http_client, Arc::clone(&config)),
            config,
        }
    }

    /// Decrypts `data` for the segment at `index` according to `info`.
    pub async fn decrypt(
        &self,
        data: Bytes,
        info: &EncryptionInfo,
        index: usize,
    ) -> Result<Bytes, DownloadError> {
        match &info.method {
            EncryptionMethod::None => return Ok(data),
            EncryptionMethod::Aes128 => {}
            other => return Err(DownloadError::UnsupportedEncryption(other.to_string())),
        }

        let key_uri = info.key_uri.as_deref().ok_or_else(|| {
            DownloadError::Decryption("AES-128 key declaration has no URI".to_string())
        })?;
        let key = self.key_store.get_key(key_uri).await?;
        let iv = info.iv.unwrap_or_else(|| SegmentCipher::default_iv(index));
        trace!(index, explicit_iv = info.iv.is_some(), "Decrypting segment");

        let plain = if self.config.decryption_config.offload_decryption_to_cpu_pool {
            tokio::task::spawn_blocking(move || SegmentCipher::decrypt(&data, &key, &iv))
                .await
                .map_err(|e| DownloadError::Decryption(format!("Decryption task failed: {e}")))??
        } else {
            SegmentCipher::decrypt(&data, &key, &iv)?
        };

        Ok(Bytes::from(plain))
    }
}
