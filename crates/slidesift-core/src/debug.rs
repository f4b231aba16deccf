use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::slide::{format_timestamp, Slide};

/// Common system font locations, tried in order.
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
];

const TEXT_SCALE: f32 = 28.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_LINE_HEIGHT: i32 = 30;

/// Writes annotated copies of discovered slides for eyeballing a scan.
///
/// Annotation is best-effort: without a usable system font the copies are
/// saved without text.
pub struct DebugRenderer {
    font: Option<FontVec>,
}

impl DebugRenderer {
    pub fn new() -> Self {
        Self {
            font: Self::load_font(),
        }
    }

    /// Save an annotated copy of `slide` into `dir`.
    pub fn save_slide(
        &self,
        slide: &Slide,
        slide_index: usize,
        dir: &Path,
    ) -> Result<(), ExtractError> {
        let mut img = slide.image.clone();
        self.draw_text_overlay(&mut img, slide, slide_index);

        let path = dir.join(format!(
            "slide_{:03}_frame_{:08}.png",
            slide_index + 1,
            slide.frame_number
        ));
        img.save(&path).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(?path, "saved debug slide");
        Ok(())
    }

    fn draw_text_overlay(&self, img: &mut RgbImage, slide: &Slide, slide_index: usize) {
        let Some(font) = &self.font else { return };
        let scale = PxScale::from(TEXT_SCALE);
        let x = 10;
        let mut y = 10;

        let header = format!("slide #{:03}", slide_index + 1);
        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &header);
        y += TEXT_LINE_HEIGHT;

        let position = format!(
            "F:{} {}",
            slide.frame_number,
            format_timestamp(slide.timestamp_seconds)
        );
        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &position);
    }

    fn load_font() -> Option<FontVec> {
        for &path in FONT_PATHS {
            let data = match std::fs::read(path) {
                Ok(data) => data,
                Err(_) => continue,
            };
            match FontVec::try_from_vec(data) {
                Ok(font) => {
                    info!(path, "loaded debug font");
                    return Some(font);
                }
                Err(e) => {
                    warn!(path, error = %e, "failed to parse font file");
                }
            }
        }
        warn!("no usable system font found, debug slides will not be annotated");
        None
    }
}

impl Default for DebugRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn saves_a_copy_regardless_of_font_availability() {
        let renderer = DebugRenderer::new();
        let slide = Slide {
            image: RgbImage::from_pixel(64, 48, Rgb([30, 30, 120])),
            frame_number: 42,
            timestamp_seconds: 1.4,
        };

        let dir = std::env::temp_dir().join(format!(
            "slidesift_debug_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        renderer.save_slide(&slide, 0, &dir).unwrap();
        assert!(dir.join("slide_001_frame_00000042.png").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
