use std::{path::PathBuf, process};

use clap::{Parser, ValueEnum};
use unmix::{
    separate_drums, separate_stems, set_download_progress_callback, SplitOptions,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Separate a stereo mix into stems
    Stems,
    /// Separate a drum stem into components
    Drums,
    /// Separate the mix, then split the resulting drum stem
    Both,
}

#[derive(Parser)]
#[command(name = "unmix")]
#[command(about = "Separate audio into stems and drum components", long_about = None)]
#[command(version)]
struct Cli {
    /// Operation mode
    #[arg(long, value_enum)]
    mode: Mode,

    /// Input audio file path
    #[arg(long = "input-file")]
    input_file: PathBuf,

    /// Output directory for stems
    #[arg(long = "output-stems", default_value = "output_stems")]
    output_stems: PathBuf,

    /// Output directory for drum components
    #[arg(long = "output-drums", default_value = "output_drums")]
    output_drums: PathBuf,

    /// Separation model to use
    #[arg(long, default_value = "htdemucs",
          value_parser = ["htdemucs", "htdemucs_ft", "hdemucs_mmi"])]
    model: String,

    /// Override the model manifest URL (for self-hosted models)
    #[arg(long)]
    manifest_url: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.input_file.exists() {
        eprintln!("Error: Input file '{}' not found", cli.input_file.display());
        process::exit(1);
    }

    match run(cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.quiet {
        setup_progress_callback();
        eprintln!("Audio Source Separation Tool");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let input = cli.input_file.to_string_lossy().to_string();

    match cli.mode {
        Mode::Stems | Mode::Both => {
            if !cli.quiet {
                eprintln!("Separating mix into stems (model: {})...", cli.model);
            }
            let opts = SplitOptions {
                output_dir: cli.output_stems.to_string_lossy().into(),
                model_name: cli.model.clone(),
                manifest_url_override: cli.manifest_url.clone(),
            };
            let result = separate_stems(&input, opts)?;

            if !cli.quiet {
                for (name, path) in &result.stems {
                    eprintln!("  wrote {}: {}", name, path.display());
                }
            }

            if cli.mode == Mode::Both {
                match result.get("drums") {
                    Some(drums) => {
                        if !cli.quiet {
                            eprintln!("Splitting drum stem into components...");
                        }
                        let files = separate_drums(drums.as_path(), cli.output_drums.as_path())?;
                        if !cli.quiet {
                            for (band, path) in &files {
                                eprintln!("  wrote {}: {}", band.label(), path.display());
                            }
                        }
                    }
                    None => {
                        if !cli.quiet {
                            eprintln!("Model produced no drums stem, skipping drum split");
                        }
                    }
                }
            }
        }
        Mode::Drums => {
            if !cli.quiet {
                eprintln!("Splitting drum stem into components...");
            }
            let files = separate_drums(cli.input_file.as_path(), cli.output_drums.as_path())?;
            if !cli.quiet {
                for (band, path) in &files {
                    eprintln!("  wrote {}: {}", band.label(), path.display());
                }
            }
        }
    }

    if !cli.quiet {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("All operations completed successfully");
    }

    Ok(())
}

fn setup_progress_callback() {
    set_download_progress_callback(|model, progress| {
        let received_mb = progress.received as f64 / 1_000_000.0;
        match progress.total {
            Some(total) if total > 0 => {
                let percent = (progress.received as f64 / total as f64 * 100.0).round() as u64;
                let total_mb = total as f64 / 1_000_000.0;
                eprint!(
                    "\rDownloading {}: {:>3}% ({:.2} MB / {:.2} MB)",
                    model, percent, received_mb, total_mb
                );
                if progress.received >= total {
                    eprintln!();
                }
            }
            _ => eprint!("\rDownloading {}: {:.2} MB", model, received_mb),
        }
    });
}
