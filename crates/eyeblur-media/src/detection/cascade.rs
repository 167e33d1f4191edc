//! OpenCV Haar cascade eye detector.
//!
//! Wraps `CascadeClassifier` loaded from OpenCV's `haarcascade_eye.xml`.
//! Frames are converted with `imgproc::cvt_color` to grayscale and scanned at
//! the configured scale step and neighbour threshold.
//!
//! # Requirements
//! - OpenCV 4.x with the objdetect and imgproc modules (`opencv` feature)

use std::path::PathBuf;

use super::{BoundingBox, EyeDetector};
use crate::config::{DetectorConfig, EYE_CASCADE_FILE};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

#[cfg(feature = "opencv")]
use opencv::{
    core::{AlgorithmHint, Mat, Rect, Size, Vector},
    imgproc,
    objdetect::CascadeClassifier,
    prelude::*,
};
#[cfg(feature = "opencv")]
use tracing::{debug, info};

/// Resolve the cascade path and check the file is there.
fn locate_cascade(config: &DetectorConfig) -> MediaResult<PathBuf> {
    let path = config.resolve_cascade_path().ok_or_else(|| {
        MediaError::model_load(format!(
            "{EYE_CASCADE_FILE} not found; set EYEBLUR_CASCADE_PATH"
        ))
    })?;

    if !path.is_file() {
        return Err(MediaError::model_load(format!(
            "cascade file does not exist: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Haar cascade eye detector.
#[cfg(feature = "opencv")]
pub struct CascadeEyeDetector {
    classifier: CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
}

#[cfg(feature = "opencv")]
impl CascadeEyeDetector {
    /// Load the cascade. Fails with [`MediaError::ModelLoad`] when the file is
    /// missing or holds no classifier data.
    pub fn load(config: &DetectorConfig) -> MediaResult<Self> {
        let model_path = locate_cascade(config)?;
        let path_str = model_path.to_str().ok_or_else(|| {
            MediaError::model_load(format!("non UTF-8 cascade path: {}", model_path.display()))
        })?;

        let classifier = CascadeClassifier::new(path_str)
            .map_err(|e| MediaError::model_load(format!("{}: {}", model_path.display(), e)))?;

        let empty = classifier
            .empty()
            .map_err(|e| MediaError::model_load(format!("{}: {}", model_path.display(), e)))?;
        if empty {
            return Err(MediaError::model_load(format!(
                "{} contains no classifier data",
                model_path.display()
            )));
        }

        info!(
            model = %model_path.display(),
            scale_factor = config.scale_factor,
            min_neighbors = config.min_neighbors,
            "Loaded eye cascade"
        );

        Ok(Self {
            classifier,
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
        })
    }
}

/// Single-channel image the cascade scans.
#[cfg(feature = "opencv")]
fn grayscale(frame: &Frame) -> MediaResult<Mat> {
    let bgr = frame.to_mat()?;
    let mut gray = Mat::default();
    imgproc::cvt_color(
        &bgr,
        &mut gray,
        imgproc::COLOR_BGR2GRAY,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::processing(frame.index(), format!("cvtColor: {}", e)))?;
    Ok(gray)
}

#[cfg(feature = "opencv")]
fn to_boxes(rects: &Vector<Rect>) -> Vec<BoundingBox> {
    rects
        .iter()
        .map(|r| BoundingBox::new(r.x, r.y, r.width, r.height))
        .collect()
}

#[cfg(feature = "opencv")]
impl EyeDetector for CascadeEyeDetector {
    fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
        let gray = grayscale(frame)?;

        let mut rects: Vector<Rect> = Vector::new();
        self.classifier
            .detect_multi_scale(
                &gray,
                &mut rects,
                self.scale_factor,
                self.min_neighbors,
                0,
                Size::new(0, 0),
                Size::new(0, 0),
            )
            .map_err(|e| MediaError::processing(frame.index(), format!("detectMultiScale: {}", e)))?;

        let boxes = to_boxes(&rects);
        debug!(frame = frame.index(), eyes = boxes.len(), "Cascade detection");
        Ok(boxes)
    }

    fn name(&self) -> &'static str {
        "haar-cascade"
    }
}

/// Stand-in used when the crate is built with `--no-default-features`:
/// loading always fails, so no instance can exist.
#[cfg(not(feature = "opencv"))]
pub struct CascadeEyeDetector {
    never: Unavailable,
}

#[cfg(not(feature = "opencv"))]
enum Unavailable {}

#[cfg(not(feature = "opencv"))]
impl CascadeEyeDetector {
    pub fn load(config: &DetectorConfig) -> MediaResult<Self> {
        let model_path = locate_cascade(config)?;
        Err(MediaError::model_load(format!(
            "cannot load {}: built without the `opencv` feature",
            model_path.display()
        )))
    }
}

#[cfg(not(feature = "opencv"))]
impl EyeDetector for CascadeEyeDetector {
    fn detect(&mut self, _frame: &Frame) -> MediaResult<Vec<BoundingBox>> {
        match self.never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cascade_is_model_load_error() {
        let config = DetectorConfig {
            cascade_path: Some(PathBuf::from("/definitely/not/here/haarcascade_eye.xml")),
            ..DetectorConfig::default()
        };
        match CascadeEyeDetector::load(&config) {
            Err(MediaError::ModelLoad(msg)) => assert!(msg.contains("does not exist")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_garbage_cascade_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haarcascade_eye.xml");
        std::fs::write(&path, "not a cascade").unwrap();

        let config = DetectorConfig {
            cascade_path: Some(path),
            ..DetectorConfig::default()
        };
        assert!(matches!(
            CascadeEyeDetector::load(&config),
            Err(MediaError::ModelLoad(_))
        ));
    }

    #[cfg(feature = "opencv")]
    mod opencv_tests {
        use super::*;
        use opencv::core::{Point, Scalar};

        fn installed_cascade() -> Option<PathBuf> {
            let path = DetectorConfig::default().resolve_cascade_path()?;
            if path.is_file() {
                Some(path)
            } else {
                eprintln!("skipping: {EYE_CASCADE_FILE} not installed");
                None
            }
        }

        /// Light face-coloured frame with two drawn eyes: sclera, iris, pupil, brow.
        fn eye_pattern_frame() -> Frame {
            let mut mat = Frame::filled(0, 240, 160, [170, 190, 215])
                .unwrap()
                .to_mat()
                .unwrap();
            for cx in [80, 160] {
                let cy = 80;
                imgproc::ellipse(
                    &mut mat,
                    Point::new(cx, cy),
                    Size::new(22, 11),
                    0.0,
                    0.0,
                    360.0,
                    Scalar::all(245.0),
                    -1,
                    imgproc::LINE_8,
                    0,
                )
                .unwrap();
                imgproc::circle(&mut mat, Point::new(cx, cy), 9, Scalar::new(60.0, 80.0, 100.0, 0.0), -1, imgproc::LINE_8, 0)
                    .unwrap();
                imgproc::circle(&mut mat, Point::new(cx, cy), 4, Scalar::all(0.0), -1, imgproc::LINE_8, 0)
                    .unwrap();
                imgproc::line(
                    &mut mat,
                    Point::new(cx - 24, cy - 22),
                    Point::new(cx + 24, cy - 24),
                    Scalar::all(40.0),
                    4,
                    imgproc::LINE_8,
                    0,
                )
                .unwrap();
            }
            Frame::from_bgr_bytes(0, 240, 160, mat.data_bytes().unwrap().to_vec()).unwrap()
        }

        #[test]
        fn test_default_build_loads_installed_cascade() {
            let Some(path) = installed_cascade() else { return };
            let config = DetectorConfig {
                cascade_path: Some(path),
                ..DetectorConfig::default()
            };
            assert!(CascadeEyeDetector::load(&config).is_ok());
        }

        #[test]
        fn test_load_keeps_configured_parameters() {
            let Some(path) = installed_cascade() else { return };
            let config = DetectorConfig {
                cascade_path: Some(path),
                ..DetectorConfig::default()
            };
            let detector = CascadeEyeDetector::load(&config).unwrap();
            assert_eq!(detector.scale_factor, 1.1);
            assert_eq!(detector.min_neighbors, 4);
        }

        #[test]
        fn test_blank_frame_has_no_eyes() {
            let Some(path) = installed_cascade() else { return };
            let config = DetectorConfig {
                cascade_path: Some(path),
                ..DetectorConfig::default()
            };
            let mut detector = CascadeEyeDetector::load(&config).unwrap();
            let frame = Frame::filled(0, 64, 48, [128, 128, 128]).unwrap();
            assert!(detector.detect(&frame).unwrap().is_empty());
        }

        #[test]
        fn test_detect_matches_classifier_on_drawn_eyes() {
            let Some(path) = installed_cascade() else { return };
            let config = DetectorConfig {
                cascade_path: Some(path.clone()),
                ..DetectorConfig::default()
            };
            let mut detector = CascadeEyeDetector::load(&config).unwrap();
            let frame = eye_pattern_frame();

            let boxes = detector.detect(&frame).unwrap();

            // Same image through a fresh classifier at 1.1 / 4.
            let mut reference = CascadeClassifier::new(path.to_str().unwrap()).unwrap();
            let gray = grayscale(&frame).unwrap();
            let mut rects: Vector<Rect> = Vector::new();
            reference
                .detect_multi_scale(&gray, &mut rects, 1.1, 4, 0, Size::new(0, 0), Size::new(0, 0))
                .unwrap();
            assert_eq!(boxes, to_boxes(&rects));

            for bbox in &boxes {
                assert!(bbox.width > 0 && bbox.height > 0);
                assert!(bbox.clamp_to(frame.width(), frame.height()).is_some(), "{bbox:?}");
                assert!(bbox.x + bbox.width <= 240 && bbox.y + bbox.height <= 160, "{bbox:?}");
            }
        }

        #[test]
        fn test_grayscale_uses_bt601_weights() {
            let frame = Frame::filled(0, 4, 2, [0, 0, 255]).unwrap();
            let gray = grayscale(&frame).unwrap();
            assert_eq!(gray.rows(), 2);
            assert_eq!(gray.cols(), 4);
            assert!(gray.data_bytes().unwrap().iter().all(|&v| v == 76));
        }

        #[test]
        fn test_rects_map_to_boxes() {
            let rects: Vector<Rect> =
                Vector::from_iter([Rect::new(10, 12, 20, 18), Rect::new(0, 0, 5, 6)]);
            assert_eq!(
                to_boxes(&rects),
                vec![BoundingBox::new(10, 12, 20, 18), BoundingBox::new(0, 0, 5, 6)]
            );
        }
    }
}
