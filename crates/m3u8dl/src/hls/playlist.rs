// HLS Playlist Resolver: fetches playlists, follows master -> variant hops and
// extracts the segment list with its encryption state.

use crate::DownloadError;
use crate::hls::config::HlsConfig;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, trace, warn};
use url::Url;

/// Duration assigned to a segment URI that has no preceding `#EXTINF`.
pub const DEFAULT_SEGMENT_DURATION: f64 = 10.0;

const TAG_HEADER: &str = "#EXTM3U";
const TAG_STREAM_INF: &str = "#EXT-X-STREAM-INF";
const TAG_KEY: &str = "#EXT-X-KEY:";
const TAG_INF: &str = "#EXTINF:";

static METHOD_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"METHOD=([^,\s]+)").expect("valid METHOD regex"));
static URI_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r#"URI="([^"]+)""#).expect("valid URI regex"));
static IV_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"IV=0[xX]([0-9a-fA-F]+)").expect("valid IV regex"));
static DURATION_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"#EXTINF:\s*([\d.]+)").expect("valid EXTINF regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EncryptionMethod {
    None,
    Aes128,
    /// Recognized but not supported: affected segments fail individually.
    SampleAes,
    /// Recognized but not supported: affected segments fail individually.
    SampleAesCtr,
    /// Anything else; a job containing it fails before downloading.
    Unknown(String),
}

impl EncryptionMethod {
    pub fn parse(method: &str) -> Self {
        match method.trim().to_ascii_uppercase().as_str() {
            "NONE" => EncryptionMethod::None,
            "AES-128" => EncryptionMethod::Aes128,
            "SAMPLE-AES" => EncryptionMethod::SampleAes,
            "SAMPLE-AES-CTR" => EncryptionMethod::SampleAesCtr,
            _ => EncryptionMethod::Unknown(method.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EncryptionMethod::None => "NONE",
            EncryptionMethod::Aes128 => "AES-128",
            EncryptionMethod::SampleAes => "SAMPLE-AES",
            EncryptionMethod::SampleAesCtr => "SAMPLE-AES-CTR",
            EncryptionMethod::Unknown(method) => method,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EncryptionMethod::Unknown(_))
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub method: EncryptionMethod,
    /// Absolute key URI.
    pub key_uri: Option<String>,
    /// Explicit IV; when absent the IV is derived from the segment index.
    pub iv: Option<[u8; 16]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the playlist, stable identity of the segment.
    pub index: usize,
    /// Absolute segment URL.
    pub url: String,
    pub duration: f64,
    pub encryption: Option<EncryptionInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    /// Directory of the media playlist, used to resolve relative URIs.
    pub base_url: String,
    pub segments: Vec<Segment>,
    /// Most recent key declaration other than `METHOD=NONE`.
    pub encryption: Option<EncryptionInfo>,
}

impl Playlist {
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// First encryption method in the playlist that is not recognized at all.
    pub fn unrecognized_method(&self) -> Option<&EncryptionMethod> {
        self.segments
            .iter()
            .filter_map(|s| s.encryption.as_ref())
            .chain(self.encryption.as_ref())
            .map(|e| &e.method)
            .find(|m| !m.is_recognized())
    }
}

/// Result of parsing a single playlist document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPlaylist {
    /// A master playlist; only its first variant is followed.
    Master { variant_url: Url },
    Media(Playlist),
}

/// Directory component of a playlist URL: `https://h/a/index.m3u8?t=1` -> `https://h/a/`.
pub fn base_url_of(playlist_url: &Url) -> Result<Url, DownloadError> {
    playlist_url.join(".").map_err(|e| {
        DownloadError::Playlist(format!("Failed to determine base URL of {playlist_url}: {e}"))
    })
}

fn resolve_uri(base_url: &Url, uri: &str) -> Result<Url, DownloadError> {
    base_url.join(uri).map_err(|e| {
        DownloadError::Playlist(format!("Could not join base URL {base_url} with URI {uri}: {e}"))
    })
}

/// Parses an `IV=0x...` value into 16 bytes. Shorter values are treated as a
/// 128-bit number and left-padded with zeros; longer values are rejected.
pub fn parse_iv(hex_digits: &str) -> Option<[u8; 16]> {
    if hex_digits.is_empty() || hex_digits.len() > 32 {
        return None;
    }
    let padded = format!("{hex_digits:0>32}");
    let mut iv = [0u8; 16];
    hex::decode_to_slice(padded, &mut iv).ok()?;
    Some(iv)
}

fn parse_key_line(line: &str, base_url: &Url) -> Result<Option<EncryptionInfo>, DownloadError> {
    let Some(method) = METHOD_RE.captures(line).map(|c| c[1].to_string()) else {
        warn!(line, "Key declaration without METHOD, ignoring");
        return Ok(None);
    };

    let key_uri = match URI_RE.captures(line) {
        Some(c) => Some(resolve_uri(base_url, &c[1])?.to_string()),
        None => None,
    };

    let iv = match IV_RE.captures(line) {
        Some(c) => {
            let iv = parse_iv(&c[1]);
            if iv.is_none() {
                warn!(iv = &c[1], "Malformed IV, deriving it from the segment index");
            }
            iv
        }
        None => None,
    };

    Ok(Some(EncryptionInfo {
        method: EncryptionMethod::parse(&method),
        key_uri,
        iv,
    }))
}

/// Parses playlist text fetched from `playlist_url`.
///
/// The parse is line oriented and tolerant: unknown tags are skipped, a URI
/// line without `#EXTINF` becomes a segment with [`DEFAULT_SEGMENT_DURATION`].
pub fn parse_playlist(content: &str, playlist_url: &Url) -> Result<ParsedPlaylist, DownloadError> {
    if content.trim().is_empty() {
        return Err(DownloadError::Playlist(format!(
            "Playlist {playlist_url} is empty"
        )));
    }

    let base_url = base_url_of(playlist_url)?;
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    if !lines
        .iter()
        .find(|l| !l.is_empty())
        .is_some_and(|l| l.starts_with(TAG_HEADER))
    {
        warn!(url = %playlist_url, "Playlist does not start with #EXTM3U");
    }

    if let Some(marker) = lines.iter().position(|l| l.starts_with(TAG_STREAM_INF)) {
        let variant = lines[marker + 1..]
            .iter()
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .ok_or_else(|| {
                DownloadError::Playlist(format!(
                    "Master playlist {playlist_url} has no variant URI"
                ))
            })?;
        let variant_url = resolve_uri(&base_url, variant)?;
        return Ok(ParsedPlaylist::Master { variant_url });
    }

    let mut segments = Vec::new();
    let mut current_encryption: Option<EncryptionInfo> = None;
    let mut playlist_encryption: Option<EncryptionInfo> = None;
    let mut pending_duration: Option<f64> = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }

        if line.starts_with(TAG_KEY) {
            if let Some(info) = parse_key_line(line, &base_url)? {
                debug!(method = %info.method, key_uri = ?info.key_uri, "Key declaration");
                if info.method == EncryptionMethod::None {
                    current_encryption = None;
                } else {
                    playlist_encryption = Some(info.clone());
                    current_encryption = Some(info);
                }
            }
        } else if line.starts_with(TAG_INF) {
            let duration = DURATION_RE
                .captures(line)
                .and_then(|c| c[1].parse::<f64>().ok())
                .unwrap_or(DEFAULT_SEGMENT_DURATION);
            pending_duration = Some(duration);
        } else if line.starts_with('#') {
            trace!(line, "Skipping tag");
        } else {
            let url = resolve_uri(&base_url, line)?;
            let segment = Segment {
                index: segments.len(),
                url: url.to_string(),
                duration: pending_duration.take().unwrap_or(DEFAULT_SEGMENT_DURATION),
                encryption: current_encryption.clone(),
            };
            trace!(index = segment.index, url = %segment.url, "Segment");
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        return Err(DownloadError::Playlist(format!(
            "No segments found in {playlist_url}"
        )));
    }

    Ok(ParsedPlaylist::Media(Playlist {
        base_url: base_url.to_string(),
        segments,
        encryption: playlist_encryption,
    }))
}

pub struct PlaylistResolver {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl PlaylistResolver {
    /// `http_client` carries the job headers as its default headers.
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Resolves `url` to a media playlist, following master playlists to their
    /// first variant at most `max_variant_hops` times.
    pub async fn resolve(&self, url: &str) -> Result<Playlist, DownloadError> {
        let mut current = Url::parse(url)
            .map_err(|e| DownloadError::InvalidUrl(format!("Invalid playlist URL {url}: {e}")))?;
        let max_hops = self.config.playlist_config.max_variant_hops;

        for hop in 0..=max_hops {
            let content = self.fetch_text(&current).await?;
            match parse_playlist(&content, &current)? {
                ParsedPlaylist::Media(playlist) => {
                    info!(
                        url = %current,
                        segments = playlist.segments.len(),
                        duration = format!("{:.1}", playlist.total_duration()),
                        "Parsed media playlist"
                    );
                    return Ok(playlist);
                }
                ParsedPlaylist::Master { variant_url } => {
                    info!(from = %current, to = %variant_url, hop, "Following master playlist variant");
                    current = variant_url;
                }
            }
        }

        Err(DownloadError::Playlist(format!(
            "Gave up after {max_hops} master playlist hops starting at {url}"
        )))
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, DownloadError> {
        debug!(url = %url, "Fetching playlist");
        let response = self
            .http_client
            .get(url.clone())
            .timeout(self.config.playlist_config.playlist_fetch_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn media(content: &str, playlist_url: &str) -> Playlist {
        match parse_playlist(content, &url(playlist_url)).unwrap() {
            ParsedPlaylist::Media(p) => p,
            other => panic!("expected media playlist, got {other:?}"),
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url_of(&url("https://cdn.example.com/vod/a/index.m3u8?token=1"))
                .unwrap()
                .as_str(),
            "https://cdn.example.com/vod/a/"
        );
        assert_eq!(
            base_url_of(&url("https://cdn.example.com/vod/a/")).unwrap().as_str(),
            "https://cdn.example.com/vod/a/"
        );
    }

    #[test]
    fn test_parse_media_playlist() {
        let content = "#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-TARGETDURATION:10\n\
            #EXTINF:9.009,\n\
            seg0.ts\n\
            #EXTINF:4.5,title\n\
            /abs/seg1.ts\n\
            #EXTINF:10,\n\
            https://other.example.com/seg2.ts?sig=abc\n\
            #EXT-X-ENDLIST\n";
        let playlist = media(content, "https://cdn.example.com/vod/index.m3u8");

        assert_eq!(playlist.base_url, "https://cdn.example.com/vod/");
        assert_eq!(playlist.segments.len(), 3);
        assert_eq!(playlist.segments[0].url, "https://cdn.example.com/vod/seg0.ts");
        assert_eq!(playlist.segments[0].duration, 9.009);
        assert_eq!(playlist.segments[1].url, "https://cdn.example.com/abs/seg1.ts");
        assert_eq!(playlist.segments[1].duration, 4.5);
        assert_eq!(
            playlist.segments[2].url,
            "https://other.example.com/seg2.ts?sig=abc"
        );
        for (i, segment) in playlist.segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert!(segment.encryption.is_none());
        }
        assert!(playlist.encryption.is_none());
        assert!((playlist.total_duration() - 23.509).abs() < 1e-9);
    }

    #[test]
    fn test_bare_uri_lines_get_default_duration() {
        let content = "#EXTM3U\nseg0.ts\n\n#EXTINF:3.0,\nseg1.ts\nseg2.ts\n";
        let playlist = media(content, "http://h/p/list.m3u8");
        let durations: Vec<f64> = playlist.segments.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![DEFAULT_SEGMENT_DURATION, 3.0, DEFAULT_SEGMENT_DURATION]);
    }

    #[test]
    fn test_missing_header_is_tolerated() {
        let playlist = media("#EXTINF:2,\na.ts\n", "http://h/list.m3u8");
        assert_eq!(playlist.segments.len(), 1);
    }

    #[test]
    fn test_key_state_persists_and_changes() {
        let content = "#EXTM3U\n\
            #EXT-X-KEY:METHOD=AES-128,URI=\"key1.bin\"\n\
            #EXTINF:2,\n\
            s0.ts\n\
            #EXTINF:2,\n\
            s1.ts\n\
            #EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/k2\",IV=0x000102030405060708090a0b0c0d0e0f\n\
            #EXTINF:2,\n\
            s2.ts\n\
            #EXT-X-KEY:METHOD=NONE\n\
            #EXTINF:2,\n\
            s3.ts\n";
        let playlist = media(content, "http://h/v/list.m3u8");

        let e0 = playlist.segments[0].encryption.as_ref().unwrap();
        assert_eq!(e0.method, EncryptionMethod::Aes128);
        assert_eq!(e0.key_uri.as_deref(), Some("http://h/v/key1.bin"));
        assert!(e0.iv.is_none());
        assert_eq!(playlist.segments[1].encryption.as_ref(), Some(e0));

        let e2 = playlist.segments[2].encryption.as_ref().unwrap();
        assert_eq!(e2.key_uri.as_deref(), Some("https://keys.example.com/k2"));
        let expected_iv: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(e2.iv, Some(expected_iv));

        assert!(playlist.segments[3].encryption.is_none());
        assert_eq!(playlist.encryption.as_ref(), Some(e2));
    }

    #[test]
    fn test_parse_iv() {
        let mut expected = [0u8; 16];
        expected[15] = 5;
        assert_eq!(parse_iv("5"), Some(expected));
        assert_eq!(parse_iv("00000000000000000000000000000005"), Some(expected));
        assert_eq!(parse_iv(&"f".repeat(33)), None);
        assert_eq!(parse_iv(""), None);
    }

    #[test]
    fn test_malformed_iv_falls_back_to_none() {
        let content = format!(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"k\",IV=0x{}\n#EXTINF:1,\na.ts\n",
            "a".repeat(40)
        );
        let playlist = media(&content, "http://h/list.m3u8");
        assert!(playlist.segments[0].encryption.as_ref().unwrap().iv.is_none());
    }

    #[test]
    fn test_unrecognized_method() {
        let content = "#EXT-X-KEY:METHOD=CHACHA,URI=\"k\"\n#EXTINF:1,\na.ts\n";
        let playlist = media(content, "http://h/list.m3u8");
        assert_eq!(
            playlist.unrecognized_method(),
            Some(&EncryptionMethod::Unknown("CHACHA".to_string()))
        );

        let content = "#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"k\"\n#EXTINF:1,\na.ts\n";
        let playlist = media(content, "http://h/list.m3u8");
        assert!(playlist.unrecognized_method().is_none());
        assert_eq!(
            playlist.segments[0].encryption.as_ref().unwrap().method,
            EncryptionMethod::SampleAes
        );
    }

    #[test]
    fn test_master_playlist_picks_first_variant() {
        let content = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            \n\
            # comment between tag and uri\n\
            low/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
            high/index.m3u8\n";
        let parsed = parse_playlist(content, &url("https://h/master/playlist.m3u8")).unwrap();
        assert_eq!(
            parsed,
            ParsedPlaylist::Master {
                variant_url: url("https://h/master/low/index.m3u8")
            }
        );
    }

    #[test]
    fn test_master_without_variant_uri() {
        let content = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n";
        let err = parse_playlist(content, &url("https://h/m.m3u8")).unwrap_err();
        assert!(matches!(err, DownloadError::Playlist(_)));
    }

    #[test]
    fn test_empty_and_segmentless_playlists() {
        let err = parse_playlist("  \n\n", &url("https://h/m.m3u8")).unwrap_err();
        assert!(matches!(err, DownloadError::Playlist(_)));

        let err = parse_playlist("#EXTM3U\n#EXT-X-ENDLIST\n", &url("https://h/m.m3u8")).unwrap_err();
        assert!(matches!(err, DownloadError::Playlist(_)));
    }
}
