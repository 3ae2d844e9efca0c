//! Ordered-output parallel execution
//!
//! This module runs a fixed chain of processes on a fixed pool of threads and
//! produces exactly the bytes a single thread would have produced.
//!
//! # Architecture
//!
//! ```text
//!  worker 0 ─┐      ┌──────────── ProcessSlot k ─────────────┐
//!  worker 1 ─┼────▶ │ claim ─▶ generate ─▶ convert ─▶ commit │ ──▶ slot k+1
//!  worker N ─┘      └──┬───────────┬──────────────────┬──────┘
//!                      │           │                  │
//!               cursor lock   generation lock    OrderedGate
//!               (per slot)      (per run)      (sequence order)
//! ```
//!
//! - **Partition**: each process's units are cut into equal chunks sized from
//!   the thread count and clamped into [`ChunkBounds`].
//! - **Sequence numbers**: when a chain is built every process receives a
//!   contiguous block, one for its header and one per chunk, in chain order.
//!   A single counter in the [`OrderedGate`] therefore orders all output.
//! - **Generation**: claiming a chunk and generating its raw values happen
//!   under one lock, so values are consumed in chunk order regardless of which
//!   thread claims what.
//! - **Conversion** runs with no lock held; this is where threads overlap.
//! - **Commit** waits on the gate for the chunk's sequence number.
//!
//! # Example
//!
//! ```rust
//! use seqgen::config::SeqgenConfig;
//! use seqgen::parallel::{ChunkContext, ChunkWork, Scheduler};
//!
//! struct Digits;
//!
//! impl ChunkWork<u32> for Digits {
//!     fn generate(&self, next: &mut u32, raw: &mut [u32]) {
//!         for value in raw {
//!             *value = *next;
//!             *next += 1;
//!         }
//!     }
//!
//!     fn convert(&self, raw: &[u32], chunk: &ChunkContext, text: &mut Vec<u8>) {
//!         chunk.wrap_into(raw.iter().map(|v| b'0' + (v % 10) as u8), text);
//!     }
//! }
//!
//! let mut config = SeqgenConfig::default();
//! config.scheduler.threads = 4;
//! config.chunks.min_units = 4;
//! config.output.line_width = 5;
//! let scheduler = Scheduler::new(&config)?;
//!
//! let mut chain = scheduler.chain().chunked(">digits\n", 12, Digits).build()?;
//! let mut out = Vec::new();
//! scheduler.run(&mut chain, &mut 0u32, &mut out)?;
//! assert_eq!(out, b">digits\n01234\n56789\n01\n");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod gate;
pub mod partition;
pub mod pool;
pub mod scratch;
pub mod slot;

// Re-export main types for easier access
pub use gate::OrderedGate;
pub use partition::{ChunkBounds, Partition};
pub use pool::{Chain, ChainBuilder, RunSummary, Scheduler};
pub use scratch::Scratch;
pub use slot::{ChunkContext, ChunkWork, ProcessSlot, WholeBody};
