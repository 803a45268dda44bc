//! URL and path helpers shared by the engine and front ends.

use std::path::{Path, PathBuf};

use url::Url;

/// Whether `input` is an absolute http(s) URL with a host.
pub fn is_valid_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Whether `input` is a valid URL that plausibly points at an M3U8 playlist.
pub fn is_playlist_url(input: &str) -> bool {
    is_valid_url(input) && input.to_ascii_lowercase().contains("m3u8")
}

/// Appends `default_ext` (without the dot) when `path` has no extension.
pub fn ensure_extension(path: &Path, default_ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(default_ext)
    }
}

/// Appends `suffix` to the final component of `path`, e.g. `out.mp4` -> `out.mp4_temp`.
pub fn with_name_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
