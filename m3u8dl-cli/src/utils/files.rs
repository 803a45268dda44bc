use std::path::{Path, PathBuf};

use url::Url;

const MAX_FILENAME_LEN: usize = 200;
const FALLBACK_TITLE: &str = "video";

/// Replaces characters that are invalid in file names on common platforms and
/// trims leading/trailing dots and spaces.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    replaced
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// Derives a file name (without extension) from a playlist URL: the last path
/// segment without its extension, else the host, else a fixed fallback.
pub fn extract_title_from_url(url_str: &str) -> String {
    let Ok(url) = Url::parse(url_str) else {
        return FALLBACK_TITLE.to_string();
    };

    let from_path = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(|last| match last.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => last,
        })
        .map(sanitize_filename)
        .filter(|title| !title.is_empty());

    from_path
        .or_else(|| {
            url.host_str()
                .map(|host| sanitize_filename(&host.replace('.', "_")))
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Returns `path` if nothing exists there, otherwise the first free
/// `stem_N.ext` next to it.
pub fn available_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1..)
        .map(|counter| {
            let name = match &extension {
                Some(ext) => format!("{stem}_{counter}.{ext}"),
                None => format!("{stem}_{counter}"),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("  ..title.. "), "title");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_extract_title_from_url() {
        assert_eq!(
            extract_title_from_url("https://cdn.example.com/show/ep01.m3u8?t=1"),
            "ep01"
        );
        assert_eq!(
            extract_title_from_url("https://cdn.example.com/show/playlist/"),
            "playlist"
        );
        assert_eq!(extract_title_from_url("https://cdn.example.com/"), "cdn_example_com");
        assert_eq!(extract_title_from_url("not a url"), FALLBACK_TITLE);
    }

    #[test]
    fn test_available_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("video.mp4");
        assert_eq!(available_path(&target), target);

        std::fs::write(&target, b"").unwrap();
        std::fs::write(dir.path().join("video_1.mp4"), b"").unwrap();
        assert_eq!(available_path(&target), dir.path().join("video_2.mp4"));
    }
}
