//! End-to-end blur job: load detector, decode, process, encode.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::blur::RegionBlur;
use crate::config::{EncodeConfig, PipelineConfig};
use crate::context::ProcessingContext;
use crate::detection::{CascadeEyeDetector, EyeDetector};
use crate::error::MediaResult;
use crate::pipeline::{FramePipeline, PipelineStats};
use crate::video::{decode, encode_with_config, VideoArtifact};

/// Result of a successful blur job.
#[derive(Debug, Clone, Serialize)]
pub struct BlurOutcome {
    pub artifact: VideoArtifact,
    pub stats: PipelineStats,
}

/// Blur every detected eye in `input` and write the result to `output`.
///
/// The cascade is loaded before the input is opened, so a missing model
/// fails without reading a single frame. Output is encoded at
/// `fps_override`, or the configured rate when `None`.
pub fn blur_eyes_in_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
    fps_override: Option<u32>,
    ctx: &ProcessingContext,
) -> MediaResult<BlurOutcome> {
    let _guard = ctx.span().enter();
    config.validate().map_err(|e| ctx.fail(e))?;

    let detector = CascadeEyeDetector::load(&config.detector).map_err(|e| ctx.fail(e))?;
    blur_eyes_with_detector(detector, input, output, config, fps_override, ctx)
}

/// Same as [`blur_eyes_in_video`] with a caller-supplied detector.
pub fn blur_eyes_with_detector<D: EyeDetector>(
    detector: D,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
    fps_override: Option<u32>,
    ctx: &ProcessingContext,
) -> MediaResult<BlurOutcome> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let _guard = ctx.span().enter();
    let started = Instant::now();

    let blur = RegionBlur::new(config.blur).map_err(|e| ctx.fail(e))?;

    let sequence = decode(input).map_err(|e| ctx.fail(e))?;

    let mut pipeline = FramePipeline::new(detector, blur);
    let processed = pipeline.process(sequence, ctx)?;

    let encode_config = EncodeConfig {
        fps: fps_override.unwrap_or(config.encode.fps),
        fourcc: config.encode.fourcc.clone(),
    };
    let artifact = encode_with_config(&processed, output, &encode_config).map_err(|e| ctx.fail(e))?;
    let stats = pipeline.stats();

    info!(
        input = %input.display(),
        output = %artifact.path.display(),
        frames = artifact.frame_count,
        regions_blurred = stats.regions_blurred,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Blur job complete"
    );

    Ok(BlurOutcome { artifact, stats })
}
