//! Command-line interface for seqgen
//!
//! Parses arguments with clap, merges them into the layered configuration,
//! sets up logging on stderr and streams FASTA to stdout or a file.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::config::{CliOverrides, SeqgenConfig};
use crate::fasta::{self, LinearCongruential, MIN_SCALE};
use crate::parallel::Scheduler;

const OUTPUT_BUFFER: usize = 1 << 16;

#[derive(Parser, Debug)]
#[command(
    name = "seqgen",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-threaded FASTA generator with deterministic output",
    long_about = "seqgen writes three FASTA sequences (an Alu repeat and two random \
                  sequences) of 2N, 3N and 5N symbols. Output is byte-identical for \
                  every thread count."
)]
pub struct Cli {
    /// Scale N; values below 1000 are raised to 1000
    #[arg(default_value_t = MIN_SCALE)]
    pub scale: usize,

    /// Worker threads (default: available cores, clamped to the configured limits)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Symbols per output line
    #[arg(short = 'w', long)]
    pub line_width: Option<usize>,

    /// Write to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    pub show_config: bool,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let overrides = CliOverrides {
            threads: self.threads,
            line_width: self.line_width,
        };
        let config = SeqgenConfig::load_with_overrides(self.config.as_deref(), &overrides)?;

        if self.show_config {
            print!("{}", config.to_toml()?);
            return Ok(());
        }

        let scale = if self.scale < MIN_SCALE {
            tracing::debug!("Raising scale {} to minimum {}", self.scale, MIN_SCALE);
            MIN_SCALE
        } else {
            self.scale
        };

        let mut scheduler = Scheduler::new(&config)?;
        let mut chain = fasta::chain(&scheduler, scale)?;

        let progress = self.progress.then(|| progress_bar(chain.sequence_len()));
        if let Some(bar) = &progress {
            scheduler = scheduler.with_progress(bar.clone());
        }

        let writer: Box<dyn Write + Send> = match &self.output {
            Some(path) => Box::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            ),
            None => Box::new(io::stdout()),
        };
        let writer = BufWriter::with_capacity(OUTPUT_BUFFER, writer);

        let result = scheduler.run(&mut chain, &mut LinearCongruential::default(), writer);
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        let summary = result?;

        tracing::info!(
            "Wrote {} bytes for scale {} using {} threads",
            summary.bytes,
            scale,
            summary.threads
        );
        Ok(())
    }
}

fn progress_bar(commits: u64) -> ProgressBar {
    let bar = ProgressBar::new(commits);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} chunks {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info"),
        2 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // stdout carries FASTA, so logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
