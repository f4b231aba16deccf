//! Slide extraction from presentation recordings.
//!
//! Decodes a video with ffmpeg, samples frames at a fixed stride, and keeps
//! the frames that are structurally dissimilar from every slide retained so
//! far. Comparison runs on downscaled luminance images; saved slides keep
//! their color.

pub mod debug;
pub mod detector;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod slide;
pub mod ssim;
pub mod video;

pub use error::ExtractError;
pub use pipeline::{extract_slides, ExtractionConfig, ScanEvent, SlideExtractor};
pub use slide::{format_timestamp, save_slide, Slide};
pub use video::{Frame, FrameSource, VideoMetadata};
