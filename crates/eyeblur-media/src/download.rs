//! Acquisition of input videos.
//!
//! YouTube URLs go through yt-dlp, Vimeo file URLs are fetched with a plain
//! HTTP GET, and local paths are used in place. Remote inputs land in a
//! temporary file that [`AcquiredVideo::cleanup`] removes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use eyeblur_models::SourceType;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn, Instrument};

use crate::command::check_ytdlp;
use crate::context::ProcessingContext;
use crate::error::{MediaError, MediaResult};

/// yt-dlp format selector: best single-file mp4, else best of anything.
const YTDLP_FORMAT: &str = "best[ext=mp4]/best";

/// Where to fetch an input video from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub kind: SourceType,
    /// URL for remote sources, filesystem path for local ones.
    pub location: String,
}

impl VideoSource {
    pub fn new(kind: SourceType, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }
}

/// Readable local copy of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredVideo {
    path: PathBuf,
    temporary: bool,
}

impl AcquiredVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was downloaded for this request.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Delete the file if it was downloaded. Local inputs are never touched.
    pub async fn cleanup(&self) -> MediaResult<()> {
        if !self.temporary {
            return Ok(());
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed temporary input");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Make `source` available as a local file.
///
/// Remote sources are written to `target`. Failures are logged through `ctx`
/// before they are returned.
pub async fn acquire(
    source: &VideoSource,
    target: &Path,
    http: &reqwest::Client,
    ctx: &ProcessingContext,
) -> MediaResult<AcquiredVideo> {
    let result: MediaResult<AcquiredVideo> = async {
        let path = match source.kind {
            SourceType::Local => local_input(&source.location)?,
            SourceType::Youtube => {
                download_with_ytdlp(&source.location, target).await?;
                target.to_path_buf()
            }
            SourceType::Vimeo => {
                download_http(http, &source.location, target).await?;
                target.to_path_buf()
            }
        };
        Ok(AcquiredVideo {
            path,
            temporary: source.kind.is_remote(),
        })
    }
    .instrument(ctx.span().clone())
    .await;

    result.map_err(|e| ctx.fail(e))
}

fn local_input(location: &str) -> MediaResult<PathBuf> {
    let path = PathBuf::from(location);
    if !path.is_file() {
        return Err(MediaError::FileNotFound(path));
    }
    Ok(path)
}

/// Download the first mp4 stream of a YouTube video with yt-dlp.
pub async fn download_with_ytdlp(url: &str, target: &Path) -> MediaResult<()> {
    let program = check_ytdlp()?;

    info!(url = %url, output = %target.display(), "Downloading with yt-dlp");

    let output = Command::new(program)
        .args(["--no-playlist", "--force-overwrites", "-f", YTDLP_FORMAT, "-o"])
        .arg(target)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        remove_partial(target).await;

        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error");
        return Err(MediaError::acquisition(
            format!("yt-dlp failed: {}", last_line.trim()),
            None,
        ));
    }

    if !target.exists() {
        return Err(MediaError::acquisition("yt-dlp produced no output file", None));
    }

    info!(output = %target.display(), "Downloaded video");
    Ok(())
}

/// Stream a file from `url` to `target`.
pub async fn download_http(http: &reqwest::Client, url: &str, target: &Path) -> MediaResult<()> {
    info!(url = %url, output = %target.display(), "Downloading over HTTP");

    let mut response = http
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::acquisition(format!("request to {} failed: {}", url, e), None))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(MediaError::acquisition(
            format!("download from {} returned HTTP {}", url, status.as_u16()),
            Some(status.as_u16()),
        ));
    }

    let mut file = tokio::fs::File::create(target).await?;
    let mut written: u64 = 0;
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                remove_partial(target).await;
                return Err(MediaError::acquisition(
                    format!("download from {} interrupted: {}", url, e),
                    Some(status.as_u16()),
                ));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            remove_partial(target).await;
            return Err(e.into());
        }
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!(output = %target.display(), bytes = written, "Downloaded video");
    Ok(())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove partial download: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_source_is_not_temporary() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = VideoSource::new(SourceType::Local, file.path().to_string_lossy());
        let acquired = acquire(
            &source,
            Path::new("unused.mp4"),
            &reqwest::Client::new(),
            &ProcessingContext::detached(),
        )
        .await
        .unwrap();

        assert_eq!(acquired.path(), file.path());
        assert!(!acquired.is_temporary());

        acquired.cleanup().await.unwrap();
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn test_missing_local_source() {
        let source = VideoSource::new(SourceType::Local, "/no/such/input.mp4");
        let err = acquire(
            &source,
            Path::new("unused.mp4"),
            &reqwest::Client::new(),
            &ProcessingContext::detached(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
