mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use slidesift_core::pipeline::{extract_slides, ExtractionConfig};
use slidesift_core::slide::{format_timestamp, save_slide, Slide};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Extract {
            input,
            output,
            threshold,
            frame_skip,
            debug,
            debug_dir,
            max_frames,
        } => {
            info!(?input, ?output, threshold, frame_skip, "starting extraction");

            let config = ExtractionConfig {
                similarity_threshold: threshold,
                frame_skip,
                debug,
                max_frames,
                debug_dir,
            };

            run_extract(&input, &output, &config)
        }
    }
}

/// Create the output directory before the scan runs; a failed scan leaves
/// it in place.
fn run_extract(input: &Path, output: &Path, config: &ExtractionConfig) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let slides = extract_slides(input, config).context("extraction failed")?;

    if slides.is_empty() {
        warn!("no slides detected in video");
    }

    let saved = write_slides(&slides, output);

    info!(
        slide_count = slides.len(),
        saved,
        ?output,
        "extraction complete"
    );

    Ok(())
}

/// Save each slide as a numbered JPEG; a failed write skips that slide only.
fn write_slides(slides: &[Slide], output: &Path) -> usize {
    let mut saved = 0;
    for (i, slide) in slides.iter().enumerate() {
        let path = output.join(format!("slide_{:03}.jpg", i + 1));
        match save_slide(&slide.image, &path) {
            Ok(()) => {
                info!(
                    ?path,
                    frame_number = slide.frame_number,
                    timestamp = %format_timestamp(slide.timestamp_seconds),
                    "slide saved"
                );
                saved += 1;
            }
            Err(err) => error!(?path, error = %err, "failed to save slide"),
        }
    }
    saved
}
