use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pulsemeter", about = "Estimate tempo (BPM) and energy of audio clips")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (defaults to ./pulsemeter.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Analysis frame length in samples
    #[arg(long)]
    pub frame_length: Option<usize>,

    /// Hop between frames in samples
    #[arg(long)]
    pub hop_length: Option<usize>,

    /// Lower bound of the plausible tempo range
    #[arg(long)]
    pub min_bpm: Option<f64>,

    /// Upper bound of the plausible tempo range
    #[arg(long)]
    pub max_bpm: Option<f64>,

    /// Tempo the octave-error prior is centred on
    #[arg(long)]
    pub prior_center: Option<f64>,

    /// Abort analysis of a file after this many seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Include beat timestamps in the output
    #[arg(long)]
    pub beats: bool,

    /// Emit compact rather than pretty-printed JSON
    #[arg(long)]
    pub compact: bool,
}
