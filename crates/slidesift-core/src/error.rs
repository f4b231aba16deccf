use std::path::PathBuf;

use thiserror::Error;

/// Failures while opening, scanning, or saving from a video.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The video could not be opened or probed. Fatal: no frames were
    /// produced and no slides exist.
    #[error("failed to open video {}: {}", .path.display(), .reason)]
    Open { path: PathBuf, reason: String },

    /// Decoding failed partway through the stream. The scan pipeline
    /// degrades this to a partial result; it is a hard error only when
    /// driving a frame source directly.
    #[error("decode failed at frame {frame_number}: {reason}")]
    Decode { frame_number: u64, reason: String },

    /// Configuration rejected before any decode work.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An output image could not be written. Affects only that image.
    #[error("failed to write image {}", .path.display())]
    Io {
        path: PathBuf,
        source: image::ImageError,
    },
}
