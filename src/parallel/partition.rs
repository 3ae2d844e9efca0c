use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Inclusive bounds on the number of units a single chunk may hold.
///
/// `max` is also the capacity every worker reserves for its scratch buffers,
/// so no chunk can ever outgrow a buffer allocated up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    pub min: usize,
    pub max: usize,
}

impl ChunkBounds {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min == 0 {
            bail!("chunk size minimum must be at least 1 unit");
        }
        if self.min > self.max {
            bail!(
                "chunk size bounds are inverted: min {} > max {}",
                self.min,
                self.max
            );
        }
        Ok(())
    }
}

/// Division of one process's units into contiguous, equally sized chunks.
///
/// Every chunk holds `chunk_size` units except possibly the last, which holds
/// whatever remains. The mapping from chunk index to unit range depends only
/// on the index, never on which thread handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    total: usize,
    chunk_size: usize,
    chunk_count: usize,
}

impl Partition {
    /// Split `total` units for `threads` workers.
    ///
    /// The nominal chunk size is `total / threads` clamped into `bounds`.
    /// A total smaller than `bounds.min` still yields exactly one chunk, and a
    /// total of zero yields none.
    pub fn compute(total: usize, threads: usize, bounds: ChunkBounds) -> Self {
        let chunk_size = (total / threads.max(1)).clamp(bounds.min, bounds.max);
        Self {
            total,
            chunk_size,
            chunk_count: total.div_ceil(chunk_size),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Number of units preceding chunk `index`.
    pub fn offset(&self, index: usize) -> usize {
        index * self.chunk_size
    }

    /// Actual unit count of chunk `index`; only the last chunk may be short.
    pub fn chunk_len(&self, index: usize) -> usize {
        debug_assert!(index < self.chunk_count, "chunk {index} out of range");
        self.chunk_size.min(self.total - self.offset(index))
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.chunk_count
    }

    /// `(offset, len)` of every chunk in index order.
    pub fn chunks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.chunk_count).map(|index| (self.offset(index), self.chunk_len(index)))
    }
}
