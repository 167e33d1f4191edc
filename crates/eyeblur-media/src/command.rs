//! FFmpeg command builder and blocking process handle.
//!
//! Frames move through ffmpeg's stdin/stdout as raw BGR bytes, so the runner
//! hands out the pipes and drains stderr on a helper thread to keep ffmpeg
//! from stalling on a full stderr pipe.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Pseudo-path for ffmpeg's standard input.
pub const PIPE_STDIN: &str = "pipe:0";
/// Pseudo-path for ffmpeg's standard output.
pub const PIPE_STDOUT: &str = "pipe:1";

/// Pixel format exchanged with ffmpeg. Matches [`crate::frame::Frame`] layout.
pub const RAW_PIXEL_FORMAT: &str = "bgr24";

/// Only errors reach stderr, which is kept for failure messages.
const FFMPEG_LOG_LEVEL: &str = "error";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path or pipe
    input: PathBuf,
    /// Output file path or pipe
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Read raw BGR frames of the given size and rate from the input.
    pub fn raw_video_input(self, width: usize, height: usize, fps: u32) -> Self {
        self.input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            RAW_PIXEL_FORMAT.to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            fps.to_string(),
        ])
    }

    /// Write raw BGR frames to the output.
    pub fn raw_video_output(self) -> Self {
        self.output_args(["-f", "rawvideo", "-pix_fmt", RAW_PIXEL_FORMAT])
    }

    /// Drop audio and other non-video streams.
    pub fn video_only(self) -> Self {
        self.output_args(["-map", "0:v:0", "-an"])
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the codec tag written to the container.
    pub fn codec_tag(self, tag: impl Into<String>) -> Self {
        self.output_arg("-tag:v").output_arg(tag)
    }

    /// Set fixed quantizer quality (lower is better).
    pub fn quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Set the output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(FFMPEG_LOG_LEVEL.to_string());

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Start ffmpeg with piped stdin/stdout as requested.
    pub fn spawn(&self, pipe_stdin: bool, pipe_stdout: bool) -> MediaResult<FfmpegProcess> {
        let program = check_ffmpeg()?;
        let mut args = self.build_args();
        if pipe_stdin {
            // ffmpeg must read frames from stdin
            args.retain(|a| a != "-nostdin");
        }
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(if pipe_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(if pipe_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                if let Err(e) = stderr.read_to_string(&mut buf) {
                    warn!("Failed to read FFmpeg stderr: {}", e);
                }
                buf
            })
        });

        Ok(FfmpegProcess {
            child,
            stderr_reader,
        })
    }
}

/// Running ffmpeg process.
pub struct FfmpegProcess {
    child: Child,
    stderr_reader: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Take the stdin pipe. Dropping it signals end of input.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the stdout pipe.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Kill the process after a failure on our side of the pipes.
    pub fn abort(mut self) {
        if let Err(e) = self.child.kill() {
            debug!("FFmpeg already exited: {}", e);
        }
        // Reap so no zombie is left behind.
        let _ = self.child.wait();
        if let Some(handle) = self.stderr_reader.take() {
            let _ = handle.join();
        }
    }

    /// Wait for exit. A non-zero status becomes [`MediaError::FfmpegFailed`]
    /// carrying the captured stderr.
    pub fn finish(mut self) -> MediaResult<()> {
        drop(self.child.stdin.take());
        let status = self.child.wait()?;
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("FFmpeg exited with non-zero status")
            .to_string();
        Err(MediaError::ffmpeg_failed(last_line, Some(stderr), status.code()))
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check if yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_input_args() {
        let cmd = FfmpegCommand::new(PIPE_STDIN, "out.mp4")
            .raw_video_input(64, 48, 30)
            .video_codec("mpeg4");

        let args = cmd.build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "pipe:0");
        assert!(args[..i].contains(&"64x48".to_string()));
        assert!(args[..i].contains(&"bgr24".to_string()));
        assert!(args[i..].contains(&"mpeg4".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_raw_output_args() {
        let args = FfmpegCommand::new("in.mp4", PIPE_STDOUT)
            .video_only()
            .raw_video_output()
            .build_args();

        assert_eq!(args[0], "-y");
        assert!(args.contains(&"rawvideo".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }
}
