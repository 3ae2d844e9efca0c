//! # seqgen - multi-threaded FASTA generation with deterministic output
//!
//! seqgen writes large synthetic FASTA files using every available core while
//! producing exactly the bytes a single thread would.
//!
//! - **Ordered commits**: chunks finish in any order but reach the output in
//!   sequence order through an [`OrderedGate`](parallel::OrderedGate).
//! - **Deterministic randomness**: chunk claims and random generation share a
//!   lock, so each chunk always receives the same values.
//! - **Parallel rendering**: the expensive symbol lookup and line wrapping run
//!   with no lock held.
//!
//! ## Quick Start
//!
//! ```bash
//! # 25 million symbols of output on all cores
//! seqgen 25000000 > out.fa
//!
//! # Pin the thread count and show progress
//! seqgen 25000000 --threads 4 --progress -o out.fa
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use seqgen::config::SeqgenConfig;
//! use seqgen::parallel::Scheduler;
//!
//! let config = SeqgenConfig::load(None)?;
//! let scheduler = Scheduler::new(&config)?;
//! let summary = seqgen::fasta::generate(&scheduler, 1_000_000, std::io::stdout())?;
//! eprintln!("{} bytes in {:?}", summary.bytes, summary.elapsed);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod fasta;
pub mod parallel;

pub use config::SeqgenConfig;
pub use parallel::Scheduler;

/// Result type alias for seqgen operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
