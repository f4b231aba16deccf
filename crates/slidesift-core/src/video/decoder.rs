use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::error::ExtractError;
use crate::video::{Frame, FrameSource, VideoMetadata};

/// Stream properties parsed from ffprobe output.
#[derive(Debug, PartialEq)]
struct ProbeResult {
    width: u32,
    height: u32,
    fps: f64,
    total_frames: u64,
}

fn open_error(path: &Path, reason: impl Into<String>) -> ExtractError {
    ExtractError::Open {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn probe(path: &Path) -> Result<ProbeResult, ExtractError> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,nb_frames",
            "-show_entries", "format=duration",
            "-of", "csv=p=0",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| open_error(path, format!("failed to run ffprobe ({e}); is ffmpeg installed?")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        return Err(open_error(path, format!("ffprobe failed: {}", stderr.trim())));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_probe_output(&stdout).map_err(|reason| {
        error!(%stdout, reason, "unexpected ffprobe output");
        open_error(path, reason)
    })?;

    if result.fps <= 0.0 {
        warn!(fps = result.fps, ?path, "video has non-positive fps, timestamps will be 0.0");
    }
    if result.total_frames == 0 {
        warn!(?path, "container reports no frame count, progress totals unavailable");
    }

    info!(
        width = result.width,
        height = result.height,
        fps = result.fps,
        total_frames = result.total_frames,
        "probe completed"
    );
    Ok(result)
}

/// Parse ffprobe csv output: the first line is
/// `width,height,num/den[,nb_frames]` from the stream section, the second
/// (when present) the container duration.
fn parse_probe_output(stdout: &str) -> Result<ProbeResult, String> {
    let mut lines = stdout.lines().filter(|line| !line.trim().is_empty());
    let stream_line = lines
        .next()
        .ok_or_else(|| "empty ffprobe output".to_string())?;

    let parts: Vec<&str> = stream_line.trim().split(',').collect();
    if parts.len() < 3 {
        return Err(format!("unexpected ffprobe stream line: {stream_line}"));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("failed to parse width: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("failed to parse height: {}", parts[1]))?;

    let fps = if let Some((num, den)) = parts[2].split_once('/') {
        let num: f64 = num
            .parse()
            .map_err(|_| format!("failed to parse fps numerator: {num}"))?;
        let den: f64 = den
            .parse()
            .map_err(|_| format!("failed to parse fps denominator: {den}"))?;
        if den > 0.0 { num / den } else { 0.0 }
    } else {
        parts[2]
            .parse()
            .map_err(|_| format!("failed to parse fps: {}", parts[2]))?
    };

    // nb_frames and duration are frequently absent or "N/A"; fall back in
    // order: reported count, then duration * fps, then unknown.
    let nb_frames: u64 = parts
        .get(3)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0);
    let duration: f64 = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .unwrap_or(0.0);

    let total_frames = if nb_frames > 0 {
        nb_frames
    } else if fps > 0.0 && duration > 0.0 {
        (duration * fps).round() as u64
    } else {
        0
    };

    Ok(ProbeResult {
        width,
        height,
        fps,
        total_frames,
    })
}

/// Decodes video frames by piping raw RGB24 data from the ffmpeg CLI.
pub struct VideoDecoder {
    child: Child,
    metadata: VideoMetadata,
    frame_count: u64,
    frame_bytes: usize,
}

impl VideoDecoder {
    /// Open a video file for decoding.
    ///
    /// Everything that can go wrong before the first frame (missing file,
    /// unreadable header, zero dimensions, tool spawn failure) surfaces as
    /// [`ExtractError::Open`].
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        if !path.exists() {
            return Err(open_error(path, "file does not exist"));
        }

        let info = probe(path)?;
        if info.width == 0 || info.height == 0 {
            return Err(open_error(
                path,
                format!("invalid video dimensions: {}x{}", info.width, info.height),
            ));
        }

        info!(?path, "spawning ffmpeg decoder process");

        let child = Command::new("ffmpeg")
            .args(["-i"])
            .arg(path)
            .args([
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-v", "error",
                "pipe:1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| open_error(path, format!("failed to spawn ffmpeg ({e}); is ffmpeg installed?")))?;

        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;
        let metadata = VideoMetadata {
            width: info.width,
            height: info.height,
            fps: info.fps,
            total_frames: info.total_frames,
        };

        info!(
            width = metadata.width,
            height = metadata.height,
            fps = metadata.fps,
            total_frames = metadata.total_frames,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            child,
            metadata,
            frame_count: 0,
            frame_bytes,
        })
    }

    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    /// Read the next frame from the ffmpeg pipe, or `None` if the video is
    /// finished. Mid-stream failures surface as [`ExtractError::Decode`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ExtractError> {
        let frame_number = self.frame_count;
        let mut buf = vec![0u8; self.frame_bytes];
        let mut read = 0;

        while read < self.frame_bytes {
            let result = match self.child.stdout.as_mut() {
                Some(stdout) => stdout.read(&mut buf[read..]),
                None => {
                    return Err(ExtractError::Decode {
                        frame_number,
                        reason: "ffmpeg stdout not available".to_string(),
                    })
                }
            };

            match result {
                Ok(0) if read == 0 && frame_number == 0 => return self.no_frames_produced(),
                Ok(0) if read == 0 => {
                    info!(total_frames = frame_number, "video stream ended");
                    return Ok(None);
                }
                Ok(0) => {
                    error!(
                        read_bytes = read,
                        expected_bytes = self.frame_bytes,
                        frame = frame_number,
                        "ffmpeg stream ended mid-frame"
                    );
                    return Err(ExtractError::Decode {
                        frame_number,
                        reason: format!(
                            "stream ended mid-frame (read {read}/{} bytes)",
                            self.frame_bytes
                        ),
                    });
                }
                Ok(n) => read += n,
                Err(e) => {
                    error!(frame = frame_number, %e, "failed to read from ffmpeg pipe");
                    return Err(ExtractError::Decode {
                        frame_number,
                        reason: format!("failed to read from ffmpeg pipe: {e}"),
                    });
                }
            }
        }

        let Some(image) = RgbImage::from_raw(self.metadata.width, self.metadata.height, buf) else {
            return Err(ExtractError::Decode {
                frame_number,
                reason: "frame buffer did not match video dimensions".to_string(),
            });
        };

        let timestamp_seconds = if self.metadata.fps > 0.0 {
            frame_number as f64 / self.metadata.fps
        } else {
            0.0
        };
        self.frame_count += 1;

        debug!(frame_number, timestamp_seconds, "decoded frame");

        Ok(Some(Frame {
            image,
            frame_number,
            timestamp_seconds,
        }))
    }

    /// EOF before the first frame: either a genuinely empty video or a valid
    /// header over an undecodable stream. The child's exit status tells the
    /// two apart.
    fn no_frames_produced(&mut self) -> Result<Option<Frame>, ExtractError> {
        match self.child.wait() {
            Ok(status) if status.success() => {
                info!("video stream ended without producing frames");
                Ok(None)
            }
            Ok(status) => {
                let stderr = self.drain_stderr();
                error!(%stderr, %status, "ffmpeg exited without producing frames");
                Err(ExtractError::Decode {
                    frame_number: 0,
                    reason: format!("ffmpeg produced no frames ({status}): {stderr}"),
                })
            }
            Err(e) => Err(ExtractError::Decode {
                frame_number: 0,
                reason: format!("ffmpeg produced no frames: {e}"),
            }),
        }
    }

    fn drain_stderr(&mut self) -> String {
        let mut buf = String::new();
        if let Some(mut stderr) = self.child.stderr.take() {
            let _ = stderr.read_to_string(&mut buf);
        }
        buf.trim().to_string()
    }
}

impl FrameSource for VideoDecoder {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ExtractError> {
        VideoDecoder::next_frame(self)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        info!(total_frames = self.frame_count, "closing video decoder");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
