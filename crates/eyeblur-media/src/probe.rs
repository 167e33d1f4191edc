//! FFprobe video information.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video stream information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Source frame rate (fps), informational only
    pub fps: Option<f64>,
    /// Video codec
    pub codec: String,
    /// Duration in seconds, when the container reports it
    pub duration: Option<f64>,
    /// Display rotation in degrees, normalised to `0..360`
    #[serde(default)]
    pub rotation: i32,
}

impl VideoInfo {
    /// `(width, height)` of the frames ffmpeg emits. ffmpeg applies the
    /// display rotation on decode, so quarter turns swap the stored size.
    pub fn display_dimensions(&self) -> (usize, usize) {
        if self.rotation % 180 == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<usize>,
    height: Option<usize>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    tags: Option<FfprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

/// Older muxers report rotation as a stream tag instead of a display matrix.
#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

/// Probe the first video stream of a file.
///
/// Anything that stops ffprobe from describing a video stream is reported
/// as [`MediaError::VideoOpen`].
pub fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(MediaError::video_open(path, "file does not exist"));
    }

    let program = check_ffprobe()?;

    let output = Command::new(program)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("ffprobe failed");
        return Err(MediaError::video_open(path, reason.trim()));
    }

    parse_probe_output(path, &output.stdout)
}

fn parse_probe_output(path: &Path, stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::video_open(path, format!("unreadable ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::video_open(path, "no video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::video_open(path, "video stream has no dimensions")),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    let rotation = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        })
        .map(|deg| (deg.round() as i32).rem_euclid(360))
        .unwrap_or(0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        codec: stream.codec_name.clone().unwrap_or_default(),
        duration,
        rotation,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den > 0.0).then(|| num / den);
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "mpeg4", "width": 64, "height": 48,
                 "avg_frame_rate": "30/1", "r_frame_rate": "30/1"}
            ],
            "format": {"duration": "0.100000"}
        }"#;
        let info = parse_probe_output(Path::new("a.mp4"), json).unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        assert_eq!(info.codec, "mpeg4");
        assert_eq!(info.fps, Some(30.0));
        assert_eq!(info.duration, Some(0.1));
        assert_eq!(info.rotation, 0);
        assert_eq!(info.display_dimensions(), (64, 48));
    }

    #[test]
    fn test_display_matrix_rotation_swaps_dimensions() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1",
                 "side_data_list": [
                    {"side_data_type": "Display Matrix",
                     "displaymatrix": "\n00000000:            0       65536           0\n",
                     "rotation": -90}
                 ]}
            ],
            "format": {"duration": "2.0"}
        }"#;
        let info = parse_probe_output(Path::new("portrait.mp4"), json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.rotation, 270);
        assert_eq!(info.display_dimensions(), (1080, 1920));
    }

    #[test]
    fn test_rotate_tag_rotation() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 640, "height": 360,
                 "tags": {"rotate": "90", "language": "und"}}
            ]
        }"#;
        let info = parse_probe_output(Path::new("old.mp4"), json).unwrap();
        assert_eq!(info.rotation, 90);
        assert_eq!(info.display_dimensions(), (360, 640));

        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 640, "height": 360,
                 "side_data_list": [{"rotation": 180}]}
            ]
        }"#;
        let info = parse_probe_output(Path::new("flipped.mp4"), json).unwrap();
        assert_eq!(info.rotation, 180);
        assert_eq!(info.display_dimensions(), (640, 360));
    }

    #[test]
    fn test_audio_only_is_video_open_error() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output(Path::new("a.m4a"), json).unwrap_err();
        assert!(matches!(err, MediaError::VideoOpen { .. }));
    }

    #[test]
    fn test_missing_file_is_video_open_error() {
        let err = probe_video("/no/such/video.mp4").unwrap_err();
        assert!(matches!(err, MediaError::VideoOpen { .. }));
    }
}
