use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slidesift", about = "Extract distinct slides from presentation videos")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a recorded video and save every distinct slide.
    Extract {
        /// Path to the input video file (MP4, etc.).
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the extracted slide images.
        #[arg(short, long, default_value = "./extracted_slides")]
        output: PathBuf,

        /// Dissimilarity required to keep a new slide; frames scoring above
        /// 1 - threshold against any kept slide are treated as duplicates.
        #[arg(short, long, default_value_t = 0.15)]
        threshold: f64,

        /// Consider every Nth frame (1 = every frame).
        #[arg(short = 's', long = "skip", default_value_t = 5)]
        frame_skip: u64,

        /// Log periodic scan progress at info level.
        #[arg(short, long)]
        debug: bool,

        /// Directory to save annotated copies of each slide as it is found.
        #[arg(long)]
        debug_dir: Option<PathBuf>,

        /// Stop after decoding this many frames.
        #[arg(long)]
        max_frames: Option<u64>,
    },
}
