mod audio;
mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use audio::features::{AnalysisResult, TrackReport};
use cli::Cli;
use config::{AnalysisConfig, Config};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config.clone().or_else(find_config) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    apply_overrides(&cli, &mut config);
    config
        .analysis
        .validate()
        .context("Invalid analysis configuration")?;

    let include_beats = cli.beats || config.output.include_beats;
    let compact = cli.compact || config.output.compact;

    let pb = if cli.inputs.len() > 1 {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut reports = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;

    for input in &cli.inputs {
        let name = file_name(input);
        pb.set_message(name.clone());
        match analyze_file(input, &config.analysis) {
            Ok(result) => reports.push(TrackReport::new(name, result, include_beats)),
            Err(err) => {
                log::error!("{}: {:#}", input.display(), err);
                failures += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !reports.is_empty() {
        let json = if cli.inputs.len() == 1 {
            to_json(&reports[0], compact)?
        } else {
            to_json(&reports, compact)?
        };
        match &cli.output {
            Some(path) => {
                std::fs::write(path, json + "\n")
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("Wrote {} report(s) to {}", reports.len(), path.display());
            }
            None => println!("{}", json),
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) could not be analysed", failures, cli.inputs.len());
    }
    Ok(())
}

fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<AnalysisResult> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    log::info!("Decoding {}...", path.display());
    let signal = audio::decode::decode_audio(path)?;
    let result = audio::analysis::analyze(&signal, config)
        .with_context(|| format!("Analysis failed for {}", path.display()))?;
    Ok(result)
}

/// `./pulsemeter.toml`, then `~/.config/pulsemeter/config.toml`, then the
/// platform config dir.
fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("pulsemeter.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pulsemeter").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("pulsemeter").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Flags given on the command line win over the config file.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    let analysis = &mut config.analysis;
    if let Some(frame_length) = cli.frame_length {
        analysis.frame_length = frame_length;
    }
    if let Some(hop_length) = cli.hop_length {
        analysis.hop_length = hop_length;
    }
    if let Some(min_bpm) = cli.min_bpm {
        analysis.bpm_range.0 = min_bpm;
    }
    if let Some(max_bpm) = cli.max_bpm {
        analysis.bpm_range.1 = max_bpm;
    }
    if let Some(center) = cli.prior_center {
        analysis.tempo_prior_center = center;
    }
    if cli.timeout.is_some() {
        analysis.timeout_secs = cli.timeout;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}
