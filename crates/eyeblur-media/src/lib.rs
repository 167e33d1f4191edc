//! Eye-region blurring for whole video files.
//!
//! This crate provides:
//! - Frame and frame-sequence types backed by `ndarray`
//! - Haar cascade eye detection and region blur through OpenCV (default `opencv` feature)
//! - In-place Gaussian blur of detected regions
//! - The per-frame detect → blur pipeline
//! - FFmpeg-backed decode/encode of raw BGR frame sequences
//! - Acquisition of remote inputs (yt-dlp, direct HTTP) for the service boundary

pub mod blur;
pub mod command;
pub mod config;
pub mod context;
pub mod detection;
pub mod download;
pub mod error;
pub mod frame;
pub mod job;
pub mod pipeline;
pub mod probe;
pub mod video;

pub use blur::RegionBlur;
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand};
pub use config::{BlurConfig, DetectorConfig, EncodeConfig, PipelineConfig};
pub use context::ProcessingContext;
pub use detection::{BoundingBox, CascadeEyeDetector, EyeDetector};
pub use download::{acquire, AcquiredVideo, VideoSource};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, FrameSequence};
pub use job::{blur_eyes_in_video, blur_eyes_with_detector, BlurOutcome};
pub use pipeline::{FramePipeline, PipelineStats};
pub use probe::{probe_video, VideoInfo};
pub use video::{decode, encode, encode_with_config, VideoArtifact};
