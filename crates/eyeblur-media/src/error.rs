//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while acquiring, decoding, processing or encoding a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Acquisition failed: {message}")]
    Acquisition {
        message: String,
        /// Upstream HTTP status, when the failure came from an HTTP response.
        status: Option<u16>,
    },

    #[error("Failed to load eye detector model: {0}")]
    ModelLoad(String),

    #[error("Failed to open video file {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("Cannot encode an empty frame sequence")]
    EmptyEncode,

    #[error("Processing failed on frame {frame_index}: {message}")]
    Processing { frame_index: usize, message: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an acquisition failure error.
    pub fn acquisition(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Acquisition {
            message: message.into(),
            status,
        }
    }

    /// Create a model load error.
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    /// Create a video open error.
    pub fn video_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::VideoOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a per-frame processing error.
    pub fn processing(frame_index: usize, message: impl Into<String>) -> Self {
        Self::Processing {
            frame_index,
            message: message.into(),
        }
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Operation name recorded alongside the error in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            MediaError::Acquisition { .. } | MediaError::YtDlpNotFound => "acquire",
            MediaError::ModelLoad(_) => "load_detector",
            MediaError::VideoOpen { .. } | MediaError::FfprobeNotFound => "decode",
            MediaError::EmptyEncode => "encode",
            MediaError::Processing { .. } | MediaError::InvalidFrame(_) => "process",
            MediaError::InvalidConfig(_) => "configure",
            MediaError::FfmpegNotFound | MediaError::FfmpegFailed { .. } => "ffmpeg",
            MediaError::FileNotFound(_) | MediaError::Io(_) | MediaError::JsonParse(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_error_carries_frame_index() {
        let err = MediaError::processing(7, "detector exploded");
        assert_eq!(err.to_string(), "Processing failed on frame 7: detector exploded");
        assert_eq!(err.operation(), "process");
    }

    #[test]
    fn test_acquisition_status_preserved() {
        let err = MediaError::acquisition("Failed to download Vimeo video", Some(404));
        match err {
            MediaError::Acquisition { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
