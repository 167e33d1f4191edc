//! Whole-file video decode and encode through the ffmpeg CLI.
//!
//! Frames cross the process boundary as raw `bgr24`, one
//! `width * height * 3` byte block per frame. The entire sequence is held in
//! memory between decode and encode.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, PIPE_STDIN, PIPE_STDOUT};
use crate::config::{EncodeConfig, DEFAULT_FOURCC};
use crate::error::{MediaError, MediaResult};
use crate::frame::{FrameSequence, CHANNELS};
use crate::probe::probe_video;

/// Quantizer used for the mpeg4 family. Visually lossless at these sizes.
const MPEG4_QUALITY: u8 = 2;

/// Encoded output file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub frame_count: usize,
    pub width: usize,
    pub height: usize,
    pub fps: u32,
}

/// ffmpeg encoder and container tag for a fourcc.
fn codec_for_fourcc(fourcc: &str) -> Option<(&'static str, &'static str)> {
    match fourcc.to_ascii_lowercase().as_str() {
        "mp4v" => Some(("mpeg4", "mp4v")),
        "xvid" => Some(("mpeg4", "xvid")),
        "avc1" | "h264" => Some(("libx264", "avc1")),
        "mjpg" => Some(("mjpeg", "mjpg")),
        _ => None,
    }
}

/// Decode every frame of `path` into memory.
///
/// Fails with [`MediaError::VideoOpen`] when the file cannot be opened as a
/// video or yields no frames. Never writes to the filesystem.
pub fn decode(path: impl AsRef<Path>) -> MediaResult<FrameSequence> {
    let path = path.as_ref();
    let info = probe_video(path)?;
    let (width, height) = info.display_dimensions();
    let frame_size = width * height * CHANNELS;

    debug!(
        input = %path.display(),
        width,
        height,
        codec = %info.codec,
        rotation = info.rotation,
        source_fps = ?info.fps,
        "Decoding video"
    );

    let mut process = FfmpegCommand::new(path, PIPE_STDOUT)
        .video_only()
        .raw_video_output()
        .spawn(false, true)?;

    let Some(mut stdout) = process.take_stdout() else {
        process.abort();
        return Err(MediaError::video_open(path, "ffmpeg stdout not captured"));
    };

    let mut sequence = FrameSequence::empty();
    loop {
        let mut buf = vec![0u8; frame_size];
        match read_frame(&mut stdout, &mut buf) {
            Ok(ReadOutcome::Full) => {
                if let Err(e) = sequence.push_bgr_bytes(width, height, buf) {
                    process.abort();
                    return Err(e);
                }
            }
            Ok(ReadOutcome::Eof) => break,
            Ok(ReadOutcome::Partial(n)) => {
                warn!(bytes = n, expected = frame_size, "Dropping truncated trailing frame");
                break;
            }
            Err(e) => {
                process.abort();
                return Err(MediaError::video_open(path, format!("reading frames: {}", e)));
            }
        }
    }
    drop(stdout);

    if let Err(e) = process.finish() {
        return Err(match e {
            MediaError::FfmpegFailed { message, .. } => MediaError::video_open(path, message),
            other => other,
        });
    }

    if sequence.is_empty() {
        return Err(MediaError::video_open(path, "no frames could be decoded"));
    }

    info!(
        input = %path.display(),
        frames = sequence.len(),
        width,
        height,
        "Decoded video"
    );
    Ok(sequence)
}

enum ReadOutcome {
    Full,
    Partial(usize),
    Eof,
}

fn read_frame(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Partial(filled)
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Full)
}

/// Encode `sequence` to `output` at `fps` with the default `mp4v` profile.
pub fn encode(sequence: &FrameSequence, output: impl AsRef<Path>, fps: u32) -> MediaResult<VideoArtifact> {
    encode_with_config(
        sequence,
        output,
        &EncodeConfig {
            fps,
            fourcc: DEFAULT_FOURCC.to_string(),
        },
    )
}

/// Encode `sequence` to `output` using the codec profile of `config`.
///
/// Dimensions come from the first frame. An empty sequence fails with
/// [`MediaError::EmptyEncode`] before anything touches the filesystem, and a
/// failed encode removes whatever partial output ffmpeg left behind.
pub fn encode_with_config(
    sequence: &FrameSequence,
    output: impl AsRef<Path>,
    config: &EncodeConfig,
) -> MediaResult<VideoArtifact> {
    let output = output.as_ref();
    let Some((width, height)) = sequence.dimensions() else {
        return Err(MediaError::EmptyEncode);
    };
    if config.fps == 0 {
        return Err(MediaError::InvalidConfig("fps must be positive".to_string()));
    }
    let (codec, tag) = codec_for_fourcc(&config.fourcc).ok_or_else(|| {
        MediaError::InvalidConfig(format!("unsupported fourcc {:?}", config.fourcc))
    })?;

    if let Some(frame) = sequence.iter().find(|f| f.dimensions() != (width, height)) {
        return Err(MediaError::InvalidFrame(format!(
            "frame {} is {}x{}, expected {}x{}",
            frame.index(),
            frame.width(),
            frame.height(),
            width,
            height
        )));
    }

    debug!(
        output = %output.display(),
        frames = sequence.len(),
        width,
        height,
        fps = config.fps,
        codec,
        "Encoding video"
    );

    let mut command = FfmpegCommand::new(PIPE_STDIN, output)
        .raw_video_input(width, height, config.fps)
        .video_codec(codec)
        .codec_tag(tag);
    if codec == "mpeg4" {
        command = command.quality(MPEG4_QUALITY);
    }
    let command = command.pixel_format("yuv420p");

    let result = write_frames(&command, sequence);
    if let Err(e) = result {
        remove_partial_output(output);
        return Err(e);
    }

    let artifact = VideoArtifact {
        path: output.to_path_buf(),
        frame_count: sequence.len(),
        width,
        height,
        fps: config.fps,
    };
    info!(
        output = %artifact.path.display(),
        frames = artifact.frame_count,
        fps = artifact.fps,
        "Encoded video"
    );
    Ok(artifact)
}

fn write_frames(command: &FfmpegCommand, sequence: &FrameSequence) -> MediaResult<()> {
    let mut process = command.spawn(true, false)?;
    let Some(mut stdin) = process.take_stdin() else {
        process.abort();
        return Err(MediaError::ffmpeg_failed("ffmpeg stdin not captured", None, None));
    };

    for frame in sequence {
        let bytes = match frame.as_bgr_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                drop(stdin);
                process.abort();
                return Err(e);
            }
        };
        if let Err(e) = stdin.write_all(bytes) {
            // ffmpeg exited early; its stderr says why.
            debug!(frame = frame.index(), "FFmpeg closed stdin: {}", e);
            break;
        }
    }
    drop(stdin);

    process.finish()
}

fn remove_partial_output(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(output = %path.display(), "Removed partial output"),
            Err(e) => warn!(output = %path.display(), "Failed to remove partial output: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_for_fourcc() {
        assert_eq!(codec_for_fourcc("mp4v"), Some(("mpeg4", "mp4v")));
        assert_eq!(codec_for_fourcc("MP4V"), Some(("mpeg4", "mp4v")));
        assert_eq!(codec_for_fourcc("avc1"), Some(("libx264", "avc1")));
        assert_eq!(codec_for_fourcc("zzzz"), None);
    }

    #[test]
    fn test_read_frame_outcomes() {
        let data = vec![1u8; 10];
        let mut reader = &data[..];
        let mut buf = [0u8; 4];
        assert!(matches!(read_frame(&mut reader, &mut buf), Ok(ReadOutcome::Full)));
        assert!(matches!(read_frame(&mut reader, &mut buf), Ok(ReadOutcome::Full)));
        assert!(matches!(read_frame(&mut reader, &mut buf), Ok(ReadOutcome::Partial(2))));
        assert!(matches!(read_frame(&mut reader, &mut buf), Ok(ReadOutcome::Eof)));
    }

    #[test]
    fn test_empty_encode_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let err = encode(&FrameSequence::empty(), &out, 30).unwrap_err();
        assert!(matches!(err, MediaError::EmptyEncode));
        assert!(!out.exists());
    }

    #[test]
    fn test_unknown_fourcc_rejected() {
        let mut seq = FrameSequence::empty();
        seq.push_bgr_bytes(2, 2, vec![0; 12]).unwrap();
        let config = EncodeConfig {
            fps: 30,
            fourcc: "nope".to_string(),
        };
        assert!(matches!(
            encode_with_config(&seq, "unused.mp4", &config),
            Err(MediaError::InvalidConfig(_))
        ));
    }
}
