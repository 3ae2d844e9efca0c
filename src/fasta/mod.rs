//! FASTA output built on the ordered scheduler
//!
//! A run writes three sequences for scale `n`:
//!
//! | header                           | body                                 | units |
//! |----------------------------------|--------------------------------------|-------|
//! | `>ONE Homo sapiens alu`          | the Alu repeat, cycled               | `2n`  |
//! | `>TWO IUB ambiguity codes`       | random symbols, IUB frequencies      | `3n`  |
//! | `>THREE Homo sapiens frequency`  | random symbols, Homo sapiens         | `5n`  |
//!
//! Both random sequences draw from one [`LinearCongruential`] stream, so the
//! third picks up where the second stopped.

use anyhow::{Context, Result};
use std::io::Write;

use crate::parallel::{Chain, RunSummary, Scheduler};

pub mod processes;
pub mod random;
pub mod tables;

pub use processes::{RandomBody, RepeatBody};
pub use random::LinearCongruential;

/// Smallest scale the command line accepts; lower requests are raised to it.
pub const MIN_SCALE: usize = 1000;

/// Build the three-sequence chain for `scale`.
pub fn chain(scheduler: &Scheduler, scale: usize) -> Result<Chain<LinearCongruential>> {
    let units = |factor: usize| {
        scale
            .checked_mul(factor)
            .with_context(|| format!("scale {scale} is too large"))
    };

    scheduler
        .chain()
        .whole(
            ">ONE Homo sapiens alu\n",
            units(2)?,
            RepeatBody::new(tables::ALU, scheduler.line_width()),
        )
        .chunked(
            ">TWO IUB ambiguity codes\n",
            units(3)?,
            RandomBody::new(&tables::IUB),
        )
        .chunked(
            ">THREE Homo sapiens frequency\n",
            units(5)?,
            RandomBody::new(&tables::HOMO_SAPIENS),
        )
        .build()
}

/// Write the FASTA output for `scale` to `writer`.
pub fn generate<W>(scheduler: &Scheduler, scale: usize, writer: W) -> Result<RunSummary>
where
    W: Write + Send,
{
    let mut chain = chain(scheduler, scale)?;
    scheduler.run(&mut chain, &mut LinearCongruential::default(), writer)
}
