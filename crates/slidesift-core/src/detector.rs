use image::GrayImage;
use rayon::prelude::*;
use tracing::debug;

use crate::normalize;
use crate::slide::Slide;
use crate::ssim;

/// Ordered accumulation of accepted slides. Insertion order is discovery
/// order. Each member's luminance image is cached at admission so later
/// comparisons do not re-convert.
#[derive(Default)]
pub struct SlideSet {
    slides: Vec<Slide>,
    lumas: Vec<GrayImage>,
}

impl SlideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn lumas(&self) -> &[GrayImage] {
        &self.lumas
    }

    pub fn push(&mut self, slide: Slide, luma: GrayImage) {
        self.slides.push(slide);
        self.lumas.push(luma);
    }

    pub fn into_slides(self) -> Vec<Slide> {
        self.slides
    }
}

/// Applies the duplicate-rejection rule to candidate frames.
pub struct SlideDetector {
    similarity_threshold: f64,
}

impl SlideDetector {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// True when the candidate is dissimilar from every retained slide.
    ///
    /// A candidate is rejected as soon as any member scores above
    /// `1.0 - similarity_threshold` against it; it must survive every
    /// comparison to be accepted. Comparisons run in parallel: which member
    /// fires first is not deterministic, whether any fires is.
    pub fn is_new_slide(&self, candidate: &GrayImage, slides: &SlideSet) -> bool {
        if slides.is_empty() {
            return true;
        }

        let cutoff = 1.0 - self.similarity_threshold;
        let (width, height) = candidate.dimensions();

        let duplicate = slides.lumas().par_iter().enumerate().any(|(index, existing)| {
            let similarity = if existing.dimensions() == (width, height) {
                ssim::score(candidate, existing)
            } else {
                let resized = normalize::resize_to_match(existing, width, height);
                ssim::score(candidate, &resized)
            };
            let matched = similarity > cutoff;
            if matched {
                debug!(
                    slide_index = index,
                    similarity = format!("{similarity:.4}"),
                    "candidate matches retained slide"
                );
            }
            matched
        });

        !duplicate
    }
}
