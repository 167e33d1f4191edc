//! Configuration for the eye blurring pipeline.
//!
//! Defaults reproduce the detector sensitivity and blur strength the service
//! has always used; every knob can be overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Cascade scale step between detection window sizes.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;
/// Neighbouring hits required to keep a candidate box.
pub const DEFAULT_MIN_NEIGHBORS: i32 = 4;
/// Gaussian kernel side length in pixels.
pub const DEFAULT_KERNEL_SIZE: usize = 99;
/// Gaussian standard deviation in pixels.
pub const DEFAULT_SIGMA: f64 = 30.0;
/// Output frame rate. The source frame rate is not read.
pub const DEFAULT_OUTPUT_FPS: u32 = 30;
/// Fourcc tag of the output codec.
pub const DEFAULT_FOURCC: &str = "mp4v";

/// Cascade file name shipped with OpenCV.
pub const EYE_CASCADE_FILE: &str = "haarcascade_eye.xml";

/// Locations searched for the eye cascade when no explicit path is configured.
/// Distro packages first, then a local `models/` directory for development.
pub(crate) const CASCADE_SEARCH_PATHS: &[&str] = &[
    "/usr/share/opencv4/haarcascades/haarcascade_eye.xml",
    "/usr/local/share/opencv4/haarcascades/haarcascade_eye.xml",
    "/usr/share/opencv/haarcascades/haarcascade_eye.xml",
    "/app/models/haarcascade_eye.xml",
    "./models/haarcascade_eye.xml",
];

/// Eye detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Explicit cascade XML path. When `None`, [`CASCADE_SEARCH_PATHS`] is searched.
    pub cascade_path: Option<PathBuf>,

    /// Scale step between pyramid levels (default: 1.1)
    pub scale_factor: f64,

    /// Minimum neighbours per kept detection (default: 4)
    pub min_neighbors: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cascade_path: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

impl DetectorConfig {
    /// Resolve the cascade file to load.
    ///
    /// An explicit path is returned as-is, even if missing, so that loading
    /// reports the path the operator asked for.
    pub fn resolve_cascade_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cascade_path {
            return Some(path.clone());
        }
        CASCADE_SEARCH_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }
}

/// Region blur settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlurConfig {
    /// Kernel side length, odd (default: 99)
    pub kernel_size: usize,

    /// Standard deviation in pixels (default: 30.0)
    pub sigma: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_KERNEL_SIZE,
            sigma: DEFAULT_SIGMA,
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Output frame rate (default: 30)
    pub fps: u32,

    /// Codec fourcc written to the container (default: "mp4v")
    pub fourcc: String,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_OUTPUT_FPS,
            fourcc: DEFAULT_FOURCC.to_string(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub blur: BlurConfig,
    pub encode: EncodeConfig,
}

impl PipelineConfig {
    /// Build config from defaults plus environment overrides.
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detector: DetectorConfig {
                cascade_path: std::env::var("EYEBLUR_CASCADE_PATH").ok().map(PathBuf::from),
                scale_factor: env_parse("EYEBLUR_SCALE_FACTOR")
                    .unwrap_or(defaults.detector.scale_factor),
                min_neighbors: env_parse("EYEBLUR_MIN_NEIGHBORS")
                    .unwrap_or(defaults.detector.min_neighbors),
            },
            blur: defaults.blur,
            encode: EncodeConfig {
                fps: env_parse("EYEBLUR_OUTPUT_FPS").unwrap_or(defaults.encode.fps),
                fourcc: defaults.encode.fourcc,
            },
        }
    }

    /// Reject settings the detector, blur or encoder cannot work with.
    pub fn validate(&self) -> MediaResult<()> {
        if !(self.detector.scale_factor > 1.0) {
            return Err(MediaError::InvalidConfig(format!(
                "scale_factor must be greater than 1.0, got {}",
                self.detector.scale_factor
            )));
        }
        if self.detector.min_neighbors < 0 {
            return Err(MediaError::InvalidConfig(format!(
                "min_neighbors must not be negative, got {}",
                self.detector.min_neighbors
            )));
        }
        if self.blur.kernel_size == 0 || self.blur.kernel_size % 2 == 0 {
            return Err(MediaError::InvalidConfig(format!(
                "kernel_size must be odd and positive, got {}",
                self.blur.kernel_size
            )));
        }
        if !(self.blur.sigma > 0.0) {
            return Err(MediaError::InvalidConfig(format!(
                "sigma must be positive, got {}",
                self.blur.sigma
            )));
        }
        if self.encode.fps == 0 {
            return Err(MediaError::InvalidConfig("fps must be positive".to_string()));
        }
        if self.encode.fourcc.len() != 4 {
            return Err(MediaError::InvalidConfig(format!(
                "fourcc must be four characters, got {:?}",
                self.encode.fourcc
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.detector.scale_factor, 1.1);
        assert_eq!(config.detector.min_neighbors, 4);
        assert_eq!(config.blur.kernel_size, 99);
        assert_eq!(config.blur.sigma, 30.0);
        assert_eq!(config.encode.fps, 30);
        assert_eq!(config.encode.fourcc, "mp4v");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_even_kernel() {
        let mut config = PipelineConfig::default();
        config.blur.kernel_size = 98;
        assert!(matches!(config.validate(), Err(MediaError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_non_growing_scale() {
        let mut config = PipelineConfig::default();
        config.detector.scale_factor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let mut config = PipelineConfig::default();
        config.encode.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_cascade_path_wins() {
        let config = DetectorConfig {
            cascade_path: Some(PathBuf::from("/nope/eyes.xml")),
            ..DetectorConfig::default()
        };
        assert_eq!(
            config.resolve_cascade_path(),
            Some(PathBuf::from("/nope/eyes.xml"))
        );
    }
}
