//! Raster frames and ordered frame sequences.
//!
//! A [`Frame`] is a `height × width × 3` grid of 8-bit BGR samples, matching
//! FFmpeg's `bgr24` raw layout byte for byte.

use ndarray::Array3;
#[cfg(feature = "opencv")]
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    prelude::*,
};

use crate::error::{MediaError, MediaResult};

/// Colour channels per pixel (B, G, R).
pub const CHANNELS: usize = 3;

/// One decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the source sequence.
    index: usize,
    /// Pixel data, shape `(height, width, 3)`, standard layout.
    pixels: Array3<u8>,
}

impl Frame {
    /// Wrap an existing pixel array.
    pub fn new(index: usize, pixels: Array3<u8>) -> MediaResult<Self> {
        let (height, width, channels) = pixels.dim();
        if channels != CHANNELS {
            return Err(MediaError::InvalidFrame(format!(
                "expected {CHANNELS} channels, got {channels}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidFrame(format!(
                "frame {index} is empty ({width}x{height})"
            )));
        }
        // Blur and encode rely on contiguous row-major storage.
        let pixels = if pixels.is_standard_layout() {
            pixels
        } else {
            pixels.as_standard_layout().into_owned()
        };
        Ok(Self { index, pixels })
    }

    /// Build a frame from packed `bgr24` bytes.
    pub fn from_bgr_bytes(index: usize, width: usize, height: usize, data: Vec<u8>) -> MediaResult<Self> {
        let expected = width * height * CHANNELS;
        if data.len() != expected {
            return Err(MediaError::InvalidFrame(format!(
                "frame {index}: expected {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        let pixels = Array3::from_shape_vec((height, width, CHANNELS), data)
            .map_err(|e| MediaError::InvalidFrame(format!("frame {index}: {e}")))?;
        Self::new(index, pixels)
    }

    /// A frame filled with one colour.
    pub fn filled(index: usize, width: usize, height: usize, bgr: [u8; 3]) -> MediaResult<Self> {
        let pixels = Array3::from_shape_fn((height, width, CHANNELS), |(_, _, c)| bgr[c]);
        Self::new(index, pixels)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    /// Packed `bgr24` bytes, row-major.
    pub fn as_bgr_bytes(&self) -> MediaResult<&[u8]> {
        self.pixels.as_slice().ok_or_else(|| {
            MediaError::InvalidFrame(format!("frame {} is not contiguous", self.index))
        })
    }

    /// Copy of the frame as a 3-channel OpenCV matrix.
    #[cfg(feature = "opencv")]
    pub fn to_mat(&self) -> MediaResult<Mat> {
        let (width, height) = self.dimensions();
        bgr_mat(width, height, self.as_bgr_bytes()?)
            .map_err(|e| MediaError::processing(self.index, format!("Mat from frame: {e}")))
    }
}

/// Copy packed `bgr24` bytes into a new `CV_8UC3` matrix.
#[cfg(feature = "opencv")]
pub(crate) fn bgr_mat(width: usize, height: usize, data: &[u8]) -> opencv::Result<Mat> {
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))?;
    let bytes = mat.data_bytes_mut()?;
    if bytes.len() != data.len() {
        return Err(opencv::Error::new(
            opencv::core::StsUnmatchedSizes,
            format!("{}x{} matrix needs {} bytes, got {}", width, height, bytes.len(), data.len()),
        ));
    }
    bytes.copy_from_slice(data);
    Ok(mat)
}

/// Ordered frames of one video. All frames share the first frame's dimensions
/// and each frame's index equals its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Validate and wrap a list of frames.
    pub fn new(frames: Vec<Frame>) -> MediaResult<Self> {
        if let Some(first) = frames.first() {
            let dims = first.dimensions();
            for (position, frame) in frames.iter().enumerate() {
                if frame.index() != position {
                    return Err(MediaError::InvalidFrame(format!(
                        "frame at position {position} has index {}",
                        frame.index()
                    )));
                }
                if frame.dimensions() != dims {
                    return Err(MediaError::InvalidFrame(format!(
                        "frame {position} is {}x{}, sequence is {}x{}",
                        frame.width(),
                        frame.height(),
                        dims.0,
                        dims.1
                    )));
                }
            }
        }
        Ok(Self { frames })
    }

    /// An empty sequence.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append packed `bgr24` bytes as the next frame.
    pub fn push_bgr_bytes(&mut self, width: usize, height: usize, data: Vec<u8>) -> MediaResult<()> {
        if let Some(dims) = self.dimensions() {
            if dims != (width, height) {
                return Err(MediaError::InvalidFrame(format!(
                    "frame {} is {width}x{height}, sequence is {}x{}",
                    self.frames.len(),
                    dims.0,
                    dims.1
                )));
            }
        }
        let frame = Frame::from_bgr_bytes(self.frames.len(), width, height, data)?;
        self.frames.push(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `(width, height)` of the first frame.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.frames.first().map(Frame::dimensions)
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl IntoIterator for FrameSequence {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bgr_bytes_layout() {
        // 2x1 image: first pixel blue, second red
        let frame = Frame::from_bgr_bytes(0, 2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        assert_eq!(frame.dimensions(), (2, 1));
        assert_eq!(frame.pixels()[[0, 0, 0]], 255);
        assert_eq!(frame.pixels()[[0, 1, 2]], 255);
        assert_eq!(frame.as_bgr_bytes().unwrap(), &[255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_from_bgr_bytes_rejects_wrong_length() {
        assert!(Frame::from_bgr_bytes(0, 4, 4, vec![0; 10]).is_err());
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(Frame::filled(0, 0, 10, [0, 0, 0]).is_err());
    }

    #[test]
    fn test_sequence_rejects_mismatched_dimensions() {
        let frames = vec![
            Frame::filled(0, 4, 4, [0, 0, 0]).unwrap(),
            Frame::filled(1, 4, 2, [0, 0, 0]).unwrap(),
        ];
        assert!(FrameSequence::new(frames).is_err());
    }

    #[test]
    fn test_sequence_rejects_out_of_order_indices() {
        let frames = vec![
            Frame::filled(1, 4, 4, [0, 0, 0]).unwrap(),
            Frame::filled(0, 4, 4, [0, 0, 0]).unwrap(),
        ];
        assert!(FrameSequence::new(frames).is_err());
    }

    #[test]
    fn test_push_assigns_positions() {
        let mut seq = FrameSequence::empty();
        seq.push_bgr_bytes(2, 2, vec![0; 12]).unwrap();
        seq.push_bgr_bytes(2, 2, vec![1; 12]).unwrap();
        assert!(seq.push_bgr_bytes(3, 2, vec![0; 18]).is_err());
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.get(1).unwrap().index(), 1);
        assert_eq!(seq.dimensions(), Some((2, 2)));
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_to_mat_keeps_bgr_layout() {
        let frame = Frame::from_bgr_bytes(0, 2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let mat = frame.to_mat().unwrap();
        assert_eq!((mat.rows(), mat.cols(), mat.channels()), (1, 2, 3));
        assert_eq!(mat.data_bytes().unwrap(), &[255, 0, 0, 0, 0, 255]);
    }
}
