use std::io::{self, Write};

use super::random::{LinearCongruential, to_probability};
use super::tables::CumulativeTable;
use crate::parallel::{ChunkContext, ChunkWork, WholeBody};

/// A fixed sequence repeated end to end, written in one piece.
#[derive(Debug, Clone)]
pub struct RepeatBody {
    sequence: &'static [u8],
    line_width: usize,
}

impl RepeatBody {
    pub fn new(sequence: &'static [u8], line_width: usize) -> Self {
        debug_assert!(!sequence.is_empty(), "repeat sequence must not be empty");
        debug_assert!(line_width > 0, "line width must be at least 1");
        Self {
            sequence,
            line_width,
        }
    }
}

impl WholeBody for RepeatBody {
    fn emit(&self, total: usize, out: &mut dyn Write) -> io::Result<()> {
        let line_width = self.line_width.max(1);
        let mut line = Vec::with_capacity(line_width + 1);
        let mut position = 0;
        let mut remaining = total;

        while remaining > 0 {
            let width = remaining.min(line_width);
            line.clear();
            for _ in 0..width {
                line.push(self.sequence[position]);
                position = (position + 1) % self.sequence.len();
            }
            line.push(b'\n');
            out.write_all(&line)?;
            remaining -= width;
        }
        Ok(())
    }
}

/// Symbols drawn from a frequency table using the shared generator.
#[derive(Debug, Clone)]
pub struct RandomBody {
    table: CumulativeTable,
}

impl RandomBody {
    pub fn new(frequencies: &[(f32, u8)]) -> Self {
        Self {
            table: CumulativeTable::new(frequencies),
        }
    }
}

impl ChunkWork<LinearCongruential> for RandomBody {
    fn generate(&self, source: &mut LinearCongruential, raw: &mut [u32]) {
        source.fill(raw);
    }

    fn convert(&self, raw: &[u32], chunk: &ChunkContext, text: &mut Vec<u8>) {
        let symbols = raw.iter().map(|&value| self.table.lookup(to_probability(value)));
        chunk.wrap_into(symbols, text);
    }
}
