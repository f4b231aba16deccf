use std::path::Path;

use image::RgbImage;
use tracing::debug;

use crate::error::ExtractError;

/// A retained slide: the normalized full-color image plus where in the
/// source it was first seen.
#[derive(Debug, Clone)]
pub struct Slide {
    /// Normalized image, ready for saving.
    pub image: RgbImage,
    /// Frame number at which this slide was discovered (0-based).
    pub frame_number: u64,
    /// Elapsed seconds from the start of the video, 0.0 when fps is unknown.
    pub timestamp_seconds: f64,
}

/// Write one image to disk, format inferred from the extension.
///
/// A failure affects only this image; callers decide whether to continue
/// with the rest.
pub fn save_slide(image: &RgbImage, path: &Path) -> Result<(), ExtractError> {
    image.save(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, "slide written");
    Ok(())
}

/// Format elapsed seconds as `HH:MM:SS`, truncating fractions.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn timestamps_format_as_wall_clock() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(59.9), "00:00:59");
        assert_eq!(format_timestamp(61.0), "00:01:01");
        assert_eq!(format_timestamp(3661.0), "01:01:01");
        assert_eq!(format_timestamp(7322.9), "02:02:02");
    }

    #[test]
    fn timestamps_clamp_nonsense_to_zero() {
        assert_eq!(format_timestamp(-5.0), "00:00:00");
        assert_eq!(format_timestamp(f64::NAN), "00:00:00");
    }

    #[test]
    fn save_writes_the_file() {
        let image = RgbImage::from_pixel(2, 2, Rgb([120, 40, 200]));
        let path = std::env::temp_dir().join(format!(
            "slidesift_save_test_{}.png",
            std::process::id()
        ));

        save_slide(&image, &path).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_failure_is_a_typed_io_error() {
        let image = RgbImage::from_pixel(2, 2, Rgb([120, 40, 200]));
        let err = save_slide(&image, Path::new("/nonexistent-dir-slidesift/slide.png"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}
