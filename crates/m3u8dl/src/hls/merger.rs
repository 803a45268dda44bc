// Merges scratch segment files into the final output, in index order.

use crate::DownloadError;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

pub struct Merger;

impl Merger {
    /// Concatenates `files` into a new file at `output_path` and returns the
    /// number of bytes written.
    ///
    /// Files are ordered by file name, which carries the zero-padded segment
    /// index. Files that do not exist are skipped.
    pub async fn merge(files: &[PathBuf], output_path: &Path) -> Result<u64, DownloadError> {
        let mut ordered: Vec<&PathBuf> = files.iter().collect();
        ordered.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut writer = BufWriter::new(File::create(output_path).await?);
        let mut written = 0u64;

        for path in ordered {
            let mut reader = match File::open(path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Segment file missing, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            written += tokio::io::copy(&mut reader, &mut writer).await?;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        info!(
            output = %output_path.display(),
            files = files.len(),
            bytes = written,
            "Merged segments"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_sorts_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for (index, body) in [(10, "c"), (2, "b"), (0, "a")] {
            let path = dir.path().join(format!("segment_{index:06}.ts"));
            fs::write(&path, body).await.unwrap();
            files.push(path);
        }

        let output = dir.path().join("out/video.mp4");
        let written = Merger::merge(&files, &output).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read_to_string(&output).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("segment_000001.ts");
        fs::write(&present, [1u8, 2, 3]).await.unwrap();
        let files = vec![dir.path().join("segment_000000.ts"), present];

        let output = dir.path().join("video.mp4");
        Merger::merge(&files, &output).await.unwrap();
        assert_eq!(fs::read(&output).await.unwrap(), vec![1, 2, 3]);
    }
}
