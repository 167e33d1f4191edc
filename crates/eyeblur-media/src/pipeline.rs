//! Per-frame detect → blur pipeline.

use serde::Serialize;
use tracing::{debug, info};

use crate::blur::RegionBlur;
use crate::context::ProcessingContext;
use crate::detection::EyeDetector;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameSequence};

/// Counters collected over one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: usize,
    pub frames_with_detections: usize,
    pub regions_blurred: usize,
}

/// Runs a detector over each frame and blurs every region it reports.
///
/// Frames are independent: nothing found in one frame influences the next.
pub struct FramePipeline<D: EyeDetector> {
    detector: D,
    blur: RegionBlur,
    stats: PipelineStats,
}

impl<D: EyeDetector> FramePipeline<D> {
    pub fn new(detector: D, blur: RegionBlur) -> Self {
        Self {
            detector,
            blur,
            stats: PipelineStats::default(),
        }
    }

    /// Process the whole sequence in order.
    ///
    /// The first failing frame aborts the run with [`MediaError::Processing`]
    /// carrying that frame's index; no partial sequence is returned.
    pub fn process(
        &mut self,
        sequence: FrameSequence,
        ctx: &ProcessingContext,
    ) -> MediaResult<FrameSequence> {
        let _guard = ctx.span().enter();
        let mut frames = sequence.into_frames();

        for frame in frames.iter_mut() {
            let index = frame.index();
            self.process_frame(frame)
                .map_err(|e| ctx.fail(into_processing_error(index, e)))?;
        }

        info!(
            detector = self.detector.name(),
            frames = self.stats.frames,
            frames_with_detections = self.stats.frames_with_detections,
            regions_blurred = self.stats.regions_blurred,
            "Frame pipeline finished"
        );

        FrameSequence::new(frames)
    }

    /// Detect and blur a single frame in place. Returns the number of regions blurred.
    pub fn process_frame(&mut self, frame: &mut Frame) -> MediaResult<usize> {
        let boxes = self.detector.detect(frame)?;

        let mut blurred = 0;
        for bbox in &boxes {
            if self.blur.apply(frame, bbox)? {
                blurred += 1;
            }
        }

        self.stats.frames += 1;
        if !boxes.is_empty() {
            self.stats.frames_with_detections += 1;
            debug!(frame = frame.index(), detected = boxes.len(), blurred, "Blurred eye regions");
        }
        self.stats.regions_blurred += blurred;

        Ok(blurred)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

fn into_processing_error(frame_index: usize, err: MediaError) -> MediaError {
    match err {
        e @ MediaError::Processing { .. } => e,
        other => MediaError::processing(frame_index, other.to_string()),
    }
}
