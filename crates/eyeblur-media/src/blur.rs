//! In-place Gaussian blur of rectangular frame regions.
//!
//! The blur only sees the pixels inside the clamped region. The region is
//! copied out as an isolated ROI, blurred with OpenCV's `GaussianBlur` using
//! `BORDER_REFLECT_101` (`gfedcb|abcdefgh|gfedcba`), and written back, so
//! nothing outside the box leaks in and nothing outside the box is written.
//!
//! Builds without the `opencv` feature use an equivalent separable ndarray
//! convolution.

use ndarray::{s, ArrayViewMut3};
use tracing::trace;

use crate::config::BlurConfig;
use crate::detection::BoundingBox;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

#[cfg(feature = "opencv")]
use crate::frame::bgr_mat;
#[cfg(feature = "opencv")]
use opencv::{
    core::{AlgorithmHint, Mat, Size, BORDER_REFLECT_101},
    imgproc,
    prelude::*,
};

#[cfg(not(feature = "opencv"))]
use crate::frame::CHANNELS;
#[cfg(not(feature = "opencv"))]
use ndarray::Array3;

/// Gaussian blur applied to detected regions.
#[derive(Debug, Clone)]
pub struct RegionBlur {
    config: BlurConfig,
    #[cfg(not(feature = "opencv"))]
    kernel: Vec<f64>,
}

impl RegionBlur {
    pub fn new(config: BlurConfig) -> MediaResult<Self> {
        if config.kernel_size == 0 || config.kernel_size % 2 == 0 {
            return Err(MediaError::InvalidConfig(format!(
                "blur kernel size must be odd and positive, got {}",
                config.kernel_size
            )));
        }
        if !(config.sigma > 0.0) {
            return Err(MediaError::InvalidConfig(format!(
                "blur sigma must be positive, got {}",
                config.sigma
            )));
        }

        Ok(Self::from_config(config))
    }

    fn from_config(config: BlurConfig) -> Self {
        Self {
            #[cfg(not(feature = "opencv"))]
            kernel: gaussian_kernel(config.kernel_size, config.sigma),
            config,
        }
    }

    pub fn config(&self) -> &BlurConfig {
        &self.config
    }

    /// Blur the part of `bbox` that lies inside `frame`.
    ///
    /// Returns `Ok(false)`, leaving the frame untouched, when the box does not
    /// intersect the frame.
    pub fn apply(&self, frame: &mut Frame, bbox: &BoundingBox) -> MediaResult<bool> {
        let (width, height) = frame.dimensions();
        let Some((rows, cols)) = bbox.clamp_to(width, height) else {
            trace!(frame = frame.index(), ?bbox, "Box outside frame, skipped");
            return Ok(false);
        };

        let index = frame.index();
        let region = frame.pixels_mut().slice_mut(s![rows, cols, ..]);
        self.blur_region(index, region)?;
        Ok(true)
    }

    #[cfg(feature = "opencv")]
    fn blur_region(&self, frame_index: usize, mut region: ArrayViewMut3<'_, u8>) -> MediaResult<()> {
        let cv_err = |e: opencv::Error| MediaError::processing(frame_index, format!("GaussianBlur: {e}"));

        let (rh, rw, _) = region.dim();
        let roi: Vec<u8> = region.iter().copied().collect();
        let src = bgr_mat(rw, rh, &roi).map_err(cv_err)?;

        let ksize = self.config.kernel_size as i32;
        let mut dst = Mat::default();
        imgproc::gaussian_blur(
            &src,
            &mut dst,
            Size::new(ksize, ksize),
            self.config.sigma,
            self.config.sigma,
            BORDER_REFLECT_101,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(cv_err)?;

        let blurred = dst.data_bytes().map_err(cv_err)?;
        for (out, value) in region.iter_mut().zip(blurred) {
            *out = *value;
        }
        Ok(())
    }

    #[cfg(not(feature = "opencv"))]
    fn blur_region(&self, _frame_index: usize, mut region: ArrayViewMut3<'_, u8>) -> MediaResult<()> {
        let (rh, rw, _) = region.dim();
        let radius = (self.kernel.len() / 2) as isize;
        let mut horizontal = Array3::<f64>::zeros((rh, rw, CHANNELS));

        for y in 0..rh {
            for x in 0..rw {
                for c in 0..CHANNELS {
                    let mut acc = 0.0;
                    for (k, weight) in self.kernel.iter().enumerate() {
                        let sx = reflect_101(x as isize + k as isize - radius, rw);
                        acc += weight * f64::from(region[[y, sx, c]]);
                    }
                    horizontal[[y, x, c]] = acc;
                }
            }
        }

        for y in 0..rh {
            for x in 0..rw {
                for c in 0..CHANNELS {
                    let mut acc = 0.0;
                    for (k, weight) in self.kernel.iter().enumerate() {
                        let sy = reflect_101(y as isize + k as isize - radius, rh);
                        acc += weight * horizontal[[sy, x, c]];
                    }
                    region[[y, x, c]] = acc.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        Ok(())
    }
}

impl Default for RegionBlur {
    fn default() -> Self {
        Self::from_config(BlurConfig::default())
    }
}

/// Normalised 1-D Gaussian weights, `size` taps centred on `(size - 1) / 2`.
#[cfg(not(feature = "opencv"))]
fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f64> {
    let center = (size as f64 - 1.0) / 2.0;
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| v / sum).collect()
}

/// Map an out-of-range index into `0..len` by mirroring around the edge pixels.
#[cfg(not(feature = "opencv"))]
fn reflect_101(mut p: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    loop {
        if p < 0 {
            p = -p;
        } else if p >= n {
            p = 2 * n - 2 - p;
        } else {
            return p as usize;
        }
    }
}
