use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::debug::DebugRenderer;
use crate::detector::{SlideDetector, SlideSet};
use crate::error::ExtractError;
use crate::normalize;
use crate::slide::{format_timestamp, Slide};
use crate::video::decoder::VideoDecoder;
use crate::video::{FrameSource, VideoMetadata};

/// Emit a progress observation every Nth sampled frame.
const PROGRESS_INTERVAL: u64 = 20;

/// Parameters for a slide scan.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Dissimilarity required to accept a new slide, in (0, 1]. A candidate
    /// is discarded when any retained slide scores above
    /// `1.0 - similarity_threshold` against it.
    pub similarity_threshold: f64,
    /// Consider every Nth decoded frame (1 = every frame).
    pub frame_skip: u64,
    /// Log periodic scan progress at info level.
    pub debug: bool,
    /// Stop after decoding this many frames, or None for the entire video.
    pub max_frames: Option<u64>,
    /// Directory for annotated copies of discovered slides, or None to skip.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.15,
            frame_skip: 5,
            debug: false,
            max_frames: None,
            debug_dir: None,
        }
    }
}

impl ExtractionConfig {
    /// Reject out-of-range parameters before any decode work happens.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.frame_skip < 1 {
            return Err(ExtractError::InvalidConfig(format!(
                "frame_skip must be >= 1, got {}",
                self.frame_skip
            )));
        }
        Ok(())
    }
}

/// Observations emitted during a scan when an event channel is attached.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Periodic heartbeat, every 20th sampled frame.
    Progress {
        frames_processed: u64,
        /// 0 when the container does not report a total.
        total_frames: u64,
        elapsed: Duration,
    },
    /// A new slide was accepted.
    SlideFound {
        slide_index: usize,
        frame_number: u64,
        timestamp_seconds: f64,
    },
}

/// Runs the scan: sample, normalize, score, retain.
///
/// Build one from a validated config, optionally attach an event channel,
/// then extract from a file or from any [`FrameSource`].
#[derive(Debug)]
pub struct SlideExtractor {
    config: ExtractionConfig,
    events: Option<Sender<ScanEvent>>,
}

impl SlideExtractor {
    /// Validates the configuration; no decode work happens yet.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        Ok(Self {
            config,
            events: None,
        })
    }

    /// Stream [`ScanEvent`]s to `sender` during extraction. Events are
    /// best-effort observations; a dropped receiver is ignored.
    pub fn with_events(mut self, sender: Sender<ScanEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Open `video_path` and scan it.
    pub fn extract(&self, video_path: &Path) -> Result<Vec<Slide>, ExtractError> {
        let mut decoder = VideoDecoder::open(video_path)?;
        self.extract_from(&mut decoder)
    }

    /// Scan an already-open frame source.
    ///
    /// A decode failure after at least one frame ends the scan early and
    /// returns the slides accepted so far; a failure before the first frame
    /// propagates as an error.
    pub fn extract_from(&self, source: &mut dyn FrameSource) -> Result<Vec<Slide>, ExtractError> {
        let meta = source.metadata();
        let detector = SlideDetector::new(self.config.similarity_threshold);
        let renderer = self.debug_renderer();

        info!(
            similarity_threshold = self.config.similarity_threshold,
            frame_skip = self.config.frame_skip,
            total_frames = meta.total_frames,
            fps = meta.fps,
            "slide scan starting"
        );

        let start = Instant::now();
        let mut slides = SlideSet::new();
        let mut decoded: u64 = 0;
        let mut sampled: u64 = 0;

        loop {
            if let Some(max) = self.config.max_frames {
                if decoded >= max {
                    info!(decoded_frames = decoded, "frame limit reached");
                    break;
                }
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                // Failing before the first frame means the stream is
                // undecodable, not empty.
                Err(err) if decoded == 0 => return Err(err),
                Err(err) => {
                    warn!(
                        error = %err,
                        slides_found = slides.len(),
                        "decode failed mid-stream, keeping the slides found so far"
                    );
                    break;
                }
            };
            decoded += 1;

            if frame.frame_number % self.config.frame_skip != 0 {
                continue;
            }

            if sampled % PROGRESS_INTERVAL == 0 {
                self.report_progress(frame.frame_number, &meta, start.elapsed());
            }
            sampled += 1;

            let frame_number = frame.frame_number;
            let timestamp_seconds = frame.timestamp_seconds;
            let image = normalize::shrink_to_max(frame.image, normalize::MAX_DIMENSION);
            let luma = normalize::to_luma(&image);

            if !detector.is_new_slide(&luma, &slides) {
                continue;
            }

            let slide = Slide {
                image,
                frame_number,
                timestamp_seconds,
            };
            let slide_index = slides.len();
            info!(
                slide_index,
                frame_number,
                timestamp = %format_timestamp(timestamp_seconds),
                "new slide found"
            );
            self.send(ScanEvent::SlideFound {
                slide_index,
                frame_number,
                timestamp_seconds,
            });

            if let Some((renderer, dir)) = &renderer {
                if let Err(err) = renderer.save_slide(&slide, slide_index, dir) {
                    warn!(error = %err, slide_index, "failed to save debug slide");
                }
            }

            slides.push(slide, luma);
        }

        info!(
            decoded_frames = decoded,
            sampled_frames = sampled,
            slide_count = slides.len(),
            elapsed = ?start.elapsed(),
            "scan complete"
        );

        Ok(slides.into_slides())
    }

    fn report_progress(&self, frame_number: u64, meta: &VideoMetadata, elapsed: Duration) {
        let elapsed_secs = format!("{:.1}", elapsed.as_secs_f64());
        if self.config.debug {
            if meta.total_frames > 0 {
                let percent = 100.0 * frame_number as f64 / meta.total_frames as f64;
                info!(
                    frame_number,
                    total_frames = meta.total_frames,
                    percent = format!("{percent:.1}"),
                    elapsed_secs,
                    "scan progress"
                );
            } else {
                info!(frame_number, elapsed_secs, "scan progress");
            }
        } else {
            debug!(
                frame_number,
                total_frames = meta.total_frames,
                elapsed_secs,
                "scan progress"
            );
        }
        self.send(ScanEvent::Progress {
            frames_processed: frame_number,
            total_frames: meta.total_frames,
            elapsed,
        });
    }

    fn send(&self, event: ScanEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    fn debug_renderer(&self) -> Option<(DebugRenderer, &Path)> {
        let dir = self.config.debug_dir.as_deref()?;
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                info!(?dir, "debug slide directory ready");
                Some((DebugRenderer::new(), dir))
            }
            Err(err) => {
                warn!(?dir, error = %err, "cannot create debug directory, skipping debug output");
                None
            }
        }
    }
}

/// Scan `video_path` and return every distinct slide, in discovery order.
pub fn extract_slides(
    video_path: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<Slide>, ExtractError> {
    SlideExtractor::new(config.clone())?.extract(video_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use image::{Rgb, RgbImage};
    use tracing_test::traced_test;

    use crate::video::Frame;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const GREEN: [u8; 3] = [0, 255, 0];

    /// Synthetic source yielding prebuilt frames, optionally failing after
    /// the last one.
    struct TestSource {
        frames: std::vec::IntoIter<RgbImage>,
        next_number: u64,
        fps: f64,
        total_frames: u64,
        fail_at_end: bool,
    }

    impl TestSource {
        fn new(frames: Vec<RgbImage>) -> Self {
            let total_frames = frames.len() as u64;
            Self {
                frames: frames.into_iter(),
                next_number: 0,
                fps: 30.0,
                total_frames,
                fail_at_end: false,
            }
        }

        fn failing_after(frames: Vec<RgbImage>) -> Self {
            let mut source = Self::new(frames);
            source.fail_at_end = true;
            source
        }
    }

    impl FrameSource for TestSource {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                width: 64,
                height: 48,
                fps: self.fps,
                total_frames: self.total_frames,
            }
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, ExtractError> {
            match self.frames.next() {
                Some(image) => {
                    let frame_number = self.next_number;
                    self.next_number += 1;
                    Ok(Some(Frame {
                        image,
                        frame_number,
                        timestamp_seconds: frame_number as f64 / self.fps,
                    }))
                }
                None if self.fail_at_end => Err(ExtractError::Decode {
                    frame_number: self.next_number,
                    reason: "synthetic decode failure".to_string(),
                }),
                None => Ok(None),
            }
        }
    }

    fn solid(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb(rgb))
    }

    fn frames(colors: &[[u8; 3]]) -> Vec<RgbImage> {
        colors.iter().map(|&c| solid(c)).collect()
    }

    /// Five red frames followed by five blue ones.
    fn red_blue_deck() -> Vec<RgbImage> {
        frames(&[RED, RED, RED, RED, RED, BLUE, BLUE, BLUE, BLUE, BLUE])
    }

    fn config(threshold: f64, skip: u64) -> ExtractionConfig {
        ExtractionConfig {
            similarity_threshold: threshold,
            frame_skip: skip,
            ..ExtractionConfig::default()
        }
    }

    fn run(config: ExtractionConfig, mut source: TestSource) -> Vec<Slide> {
        SlideExtractor::new(config)
            .unwrap()
            .extract_from(&mut source)
            .unwrap()
    }

    #[test]
    #[traced_test]
    fn red_blue_deck_yields_two_slides() {
        let slides = run(config(0.15, 5), TestSource::new(red_blue_deck()));
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].frame_number, 0);
        assert_eq!(slides[1].frame_number, 5);
    }

    #[test]
    fn full_sampling_discovers_slides_at_their_first_frames() {
        // With every frame checked, the duplicates between the two decks
        // must all be rejected and discovery stays at frames 0 and 5.
        let slides = run(config(0.15, 1), TestSource::new(red_blue_deck()));
        let found: Vec<u64> = slides.iter().map(|s| s.frame_number).collect();
        assert_eq!(found, vec![0, 5]);
    }

    #[test]
    fn identical_frames_yield_one_slide() {
        let slides = run(config(0.15, 1), TestSource::new(frames(&[RED; 10])));
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].frame_number, 0);
    }

    #[test]
    fn zero_motion_yields_one_slide_at_any_threshold() {
        for threshold in [0.05, 0.15, 0.5, 1.0] {
            let slides = run(config(threshold, 1), TestSource::new(frames(&[GREEN; 8])));
            assert_eq!(slides.len(), 1, "threshold {threshold}");
        }
    }

    #[test]
    fn maximal_threshold_keeps_only_the_first_slide() {
        // Rejection cutoff is 0.0: even the red-to-blue change scores
        // positive similarity, so only the first slide survives.
        let slides = run(config(1.0, 5), TestSource::new(red_blue_deck()));
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].frame_number, 0);
    }

    #[test]
    fn only_multiples_of_frame_skip_are_candidates() {
        // Blue first appears at frame 5, but with a stride of 4 the first
        // sampled blue frame is 8.
        let slides = run(config(0.15, 4), TestSource::new(red_blue_deck()));
        let found: Vec<u64> = slides.iter().map(|s| s.frame_number).collect();
        assert_eq!(found, vec![0, 8]);
    }

    #[test]
    fn denser_sampling_never_finds_fewer_slides() {
        // Blue only lives at frame 3; a stride of 5 misses it entirely.
        let deck = frames(&[RED, RED, RED, BLUE, RED, RED, RED, RED, RED, RED]);
        let sparse = run(config(0.15, 5), TestSource::new(deck.clone()));
        let dense = run(config(0.15, 1), TestSource::new(deck));
        assert_eq!(sparse.len(), 1);
        assert_eq!(dense.len(), 2);
    }

    #[test]
    fn invalid_configs_are_rejected_before_any_decode() {
        for threshold in [0.0, -0.2, 1.5, f64::NAN] {
            let err = SlideExtractor::new(config(threshold, 5)).unwrap_err();
            assert!(
                matches!(err, ExtractError::InvalidConfig(_)),
                "threshold {threshold}"
            );
        }
        let err = SlideExtractor::new(config(0.15, 0)).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    #[traced_test]
    fn decode_failure_keeps_the_partial_result() {
        let source = TestSource::failing_after(frames(&[RED, BLUE]));
        let slides = run(config(0.15, 1), source);
        assert_eq!(slides.len(), 2);
    }

    #[test]
    fn failure_before_the_first_frame_is_fatal() {
        // An undecodable stream must not present as a valid empty video.
        let mut source = TestSource::failing_after(Vec::new());
        let err = SlideExtractor::new(config(0.15, 1))
            .unwrap()
            .extract_from(&mut source)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Decode { frame_number: 0, .. }));
    }

    #[test]
    fn frame_limit_stops_the_scan_early() {
        let mut limited = config(0.15, 1);
        limited.max_frames = Some(3);
        let slides = run(limited, TestSource::new(red_blue_deck()));
        assert_eq!(slides.len(), 1, "blue at frame 5 is past the limit");
    }

    #[test]
    fn empty_source_yields_no_slides() {
        let slides = run(config(0.15, 5), TestSource::new(Vec::new()));
        assert!(slides.is_empty());
    }

    #[test]
    fn resolution_changes_mid_stream_are_tolerated() {
        let mut deck = frames(&[RED, RED]);
        deck.push(RgbImage::from_pixel(32, 24, Rgb(RED)));
        deck.push(RgbImage::from_pixel(32, 24, Rgb(BLUE)));

        // The smaller red frame is still a duplicate; the blue one is new.
        let slides = run(config(0.15, 1), TestSource::new(deck));
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].frame_number, 3);
    }

    #[test]
    #[traced_test]
    fn events_report_discoveries_in_order() {
        let (sender, receiver) = mpsc::channel();
        let mut source = TestSource::new(red_blue_deck());
        let slides = SlideExtractor::new(config(0.15, 5))
            .unwrap()
            .with_events(sender)
            .extract_from(&mut source)
            .unwrap();
        assert_eq!(slides.len(), 2);

        let events: Vec<ScanEvent> = receiver.try_iter().collect();
        let found: Vec<(usize, u64)> = events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::SlideFound {
                    slide_index,
                    frame_number,
                    ..
                } => Some((*slide_index, *frame_number)),
                _ => None,
            })
            .collect();
        assert_eq!(found, vec![(0, 0), (1, 5)]);
        assert!(events
            .iter()
            .any(|event| matches!(event, ScanEvent::Progress { .. })));
    }
}
