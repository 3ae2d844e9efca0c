use crossbeam::utils::CachePadded;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::partition::Partition;
use super::pool::Shared;
use super::scratch::Scratch;

/// A process body written in one piece, inside the header's commit.
///
/// Suited to output that needs no random input and is cheap enough that
/// splitting it across threads would not pay off.
pub trait WholeBody: Send + Sync {
    fn emit(&self, total: usize, out: &mut dyn Write) -> io::Result<()>;
}

/// The three steps a chunked process runs for every chunk.
///
/// `generate` runs under the run-wide generation lock with exclusive access to
/// the shared source `G`, so values are consumed in chunk order no matter
/// which thread holds the chunk. `convert` runs with no lock held and is where
/// the parallel work happens. `emit` runs inside the ordered gate.
pub trait ChunkWork<G>: Send + Sync {
    /// Fill `raw` (already sized to the chunk length) from `source`.
    fn generate(&self, source: &mut G, raw: &mut [u32]);

    /// Render `raw` into `text`, which starts empty.
    fn convert(&self, raw: &[u32], chunk: &ChunkContext, text: &mut Vec<u8>);

    fn emit(&self, text: &[u8], out: &mut dyn Write) -> io::Result<()> {
        out.write_all(text)
    }
}

/// Where a chunk sits inside its process and in the global commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkContext {
    /// Chunk index within the process, from 0.
    pub index: usize,
    /// Global sequence number this chunk commits under.
    pub sequence: u64,
    /// Units of this process preceding the chunk.
    pub offset: usize,
    /// Actual unit count of the chunk.
    pub len: usize,
    pub line_width: usize,
    /// Whether this is the final chunk of its process.
    pub last: bool,
}

impl ChunkContext {
    /// Column at which the chunk's first unit lands.
    pub fn start_column(&self) -> usize {
        self.offset % self.line_width
    }

    /// Append `symbols` to `text`, breaking lines at `line_width` as if the
    /// whole process had been rendered in one pass.
    ///
    /// A line that completes exactly at the chunk's end gets its line break
    /// here; a partial line is left open for the next chunk.
    pub fn wrap_into<I>(&self, symbols: I, text: &mut Vec<u8>)
    where
        I: IntoIterator<Item = u8>,
    {
        let mut column = self.start_column();
        for symbol in symbols {
            text.push(symbol);
            column += 1;
            if column == self.line_width {
                text.push(b'\n');
                column = 0;
            }
        }
    }
}

pub(crate) enum Body<G> {
    Whole(Box<dyn WholeBody>),
    Chunked {
        work: Box<dyn ChunkWork<G>>,
        partition: Partition,
    },
}

/// One process of a chain together with its per-run state.
///
/// The header latch and chunk cursor are re-armed by [`ProcessSlot::reset`]
/// before every run; everything else is fixed when the chain is built.
pub struct ProcessSlot<G> {
    header: Vec<u8>,
    total: usize,
    body: Body<G>,
    first_sequence: u64,
    line_width: usize,
    header_pending: AtomicBool,
    cursor: CachePadded<Mutex<usize>>,
}

impl<G> ProcessSlot<G> {
    pub(crate) fn new(
        header: Vec<u8>,
        total: usize,
        body: Body<G>,
        first_sequence: u64,
        line_width: usize,
    ) -> Self {
        Self {
            header,
            total,
            body,
            first_sequence,
            line_width,
            header_pending: AtomicBool::new(true),
            cursor: CachePadded::new(Mutex::new(0)),
        }
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Sequence number of the header commit; chunks follow immediately after.
    pub fn first_sequence(&self) -> u64 {
        self.first_sequence
    }

    pub fn partition(&self) -> Option<&Partition> {
        match &self.body {
            Body::Whole(_) => None,
            Body::Chunked { partition, .. } => Some(partition),
        }
    }

    /// Number of sequence numbers this slot consumes: the header plus one per
    /// chunk.
    pub fn sequence_len(&self) -> u64 {
        1 + self.partition().map_or(0, |p| p.chunk_count() as u64)
    }

    pub(crate) fn reset(&mut self) {
        *self.header_pending.get_mut() = true;
        *self.cursor.get_mut().unwrap_or_else(PoisonError::into_inner) = 0;
    }

    /// Work on this slot until every chunk has been claimed.
    ///
    /// Returns `false` if the run was abandoned and the caller should stop.
    pub(crate) fn drain<W: Write>(&self, shared: &Shared<'_, G, W>, scratch: &mut Scratch) -> bool {
        if self.header_pending.swap(false, Ordering::AcqRel) {
            let committed = shared.commit(self.first_sequence, |out| {
                out.write_all(&self.header)?;
                if let Body::Whole(body) = &self.body {
                    body.emit(self.total, out)?;
                }
                Ok(())
            });
            if !committed {
                return false;
            }
        }

        let Body::Chunked { work, partition } = &self.body else {
            return true;
        };

        while let Some(chunk) = self.claim(shared, work.as_ref(), partition, scratch) {
            work.convert(&scratch.raw, &chunk, &mut scratch.text);
            if chunk.last && scratch.text.last() != Some(&b'\n') {
                scratch.text.push(b'\n');
            }

            let text = &scratch.text;
            if !shared.commit(chunk.sequence, |out| work.emit(text, out)) {
                return false;
            }
        }
        true
    }

    /// Claim the next chunk and generate its raw values.
    ///
    /// The cursor is advanced while the generation lock is held, so claim
    /// order and generation order are the same order.
    fn claim<W>(
        &self,
        shared: &Shared<'_, G, W>,
        work: &dyn ChunkWork<G>,
        partition: &Partition,
        scratch: &mut Scratch,
    ) -> Option<ChunkContext> {
        let mut source = shared.generator();
        let index = {
            let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
            if *cursor >= partition.chunk_count() {
                return None;
            }
            *cursor += 1;
            *cursor - 1
        };

        let chunk = ChunkContext {
            index,
            sequence: self.first_sequence + 1 + index as u64,
            offset: partition.offset(index),
            len: partition.chunk_len(index),
            line_width: self.line_width,
            last: partition.is_last(index),
        };
        tracing::trace!(
            "claimed chunk {} (seq {}, {} units)",
            chunk.index,
            chunk.sequence,
            chunk.len
        );
        work.generate(&mut **source, scratch.prepare(chunk.len));
        Some(chunk)
    }
}
