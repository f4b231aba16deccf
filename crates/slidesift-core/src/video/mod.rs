pub mod decoder;

use image::RgbImage;

use crate::error::ExtractError;

/// A single decoded video frame with metadata.
pub struct Frame {
    /// The frame's image data.
    pub image: RgbImage,
    /// Absolute frame number from the start of the source (0-based).
    pub frame_number: u64,
    /// Elapsed seconds from the start of the source, 0.0 when fps is unknown.
    pub timestamp_seconds: f64,
}

/// Stream properties reported by a frame source.
///
/// `fps` and `total_frames` are best-effort: containers do not always carry
/// them and either may be 0. Consumers must not divide by an unchecked total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
}

/// An ordered stream of decoded frames.
///
/// Implementations deliver frames with strictly increasing, gap-free frame
/// numbers starting at 0. The scan pipeline runs against this trait so that
/// synthetic sources can stand in for a real decoder.
pub trait FrameSource {
    fn metadata(&self) -> VideoMetadata;

    /// The next frame in order, or `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, ExtractError>;
}
