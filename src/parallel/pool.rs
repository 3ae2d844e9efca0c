use anyhow::{Context, Result, anyhow, bail};
use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::gate::OrderedGate;
use super::partition::{ChunkBounds, Partition};
use super::scratch::Scratch;
use super::slot::{Body, ChunkWork, ProcessSlot, WholeBody};
use crate::config::SeqgenConfig;

/// Fixed pool of worker threads that runs process chains with ordered output.
///
/// Thread count, chunk bounds and line width are resolved once from the
/// configuration; chains built through [`Scheduler::chain`] are partitioned
/// for exactly this pool.
#[derive(Clone)]
pub struct Scheduler {
    threads: usize,
    bounds: ChunkBounds,
    line_width: usize,
    max_processes: usize,
    progress: Option<ProgressBar>,
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub threads: usize,
    /// Sequence numbers committed, headers included
    pub commits: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// An ordered list of process slots with contiguous sequence ranges.
pub struct Chain<G> {
    slots: Vec<ProcessSlot<G>>,
    sequence_len: u64,
}

/// Assembles a [`Chain`], handing each process the next free block of
/// sequence numbers in the order the processes are added.
pub struct ChainBuilder<'s, G> {
    scheduler: &'s Scheduler,
    slots: Vec<ProcessSlot<G>>,
    next_sequence: u64,
    error: Option<anyhow::Error>,
}

/// State every worker of one run shares by reference.
pub(crate) struct Shared<'a, G, W> {
    gate: OrderedGate<OutputSink<W>>,
    generator: Mutex<&'a mut G>,
}

/// The output stream as seen from inside the gate.
struct OutputSink<W> {
    writer: W,
    bytes: u64,
    error: Option<io::Error>,
    progress: Option<ProgressBar>,
}

/// Counts bytes on their way to the real writer
struct Counted<'w, W> {
    inner: &'w mut W,
    bytes: u64,
}

/// Abandons the gate if the owning worker unwinds, so no other worker waits
/// for a sequence number that will never be committed.
struct AbandonOnPanic<'g, S>(&'g OrderedGate<S>);

impl Scheduler {
    pub fn new(config: &SeqgenConfig) -> Result<Self> {
        config.validate()?;
        let threads = config.resolved_threads();
        tracing::debug!(
            "Scheduler: {} threads, chunks {}..={} units, line width {}",
            threads,
            config.chunks.min_units,
            config.chunks.max_units,
            config.output.line_width
        );
        Ok(Self {
            threads,
            bounds: config.chunk_bounds(),
            line_width: config.output.line_width,
            max_processes: config.scheduler.max_processes,
            progress: None,
        })
    }

    /// Advance `bar` once per commit during runs.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn chunk_bounds(&self) -> ChunkBounds {
        self.bounds
    }

    pub fn line_width(&self) -> usize {
        self.line_width
    }

    pub fn max_processes(&self) -> usize {
        self.max_processes
    }

    /// Start building a chain partitioned for this scheduler.
    pub fn chain<G>(&self) -> ChainBuilder<'_, G> {
        ChainBuilder {
            scheduler: self,
            slots: Vec::new(),
            next_sequence: 0,
            error: None,
        }
    }

    /// Run `chain` to completion on every worker thread, writing to `writer`.
    ///
    /// `source` is the state consumed by every `generate` step; it is locked
    /// for the duration of each claim-and-generate so the values a chunk
    /// receives depend only on its position, never on thread timing.
    pub fn run<G, W>(&self, chain: &mut Chain<G>, source: &mut G, writer: W) -> Result<RunSummary>
    where
        G: Send,
        W: Write + Send,
    {
        if chain.len() > self.max_processes {
            bail!(
                "process chain has {} processes but the scheduler allows at most {}",
                chain.len(),
                self.max_processes
            );
        }

        chain.reset();
        let start = Instant::now();
        tracing::debug!(
            "Starting run: {} processes, {} sequence numbers, {} threads",
            chain.len(),
            chain.sequence_len(),
            self.threads
        );

        let shared = Shared {
            gate: OrderedGate::new(OutputSink {
                writer,
                bytes: 0,
                error: None,
                progress: self.progress.clone(),
            }),
            generator: Mutex::new(source),
        };

        let slots = chain.slots.as_slice();
        crossbeam::thread::scope(|s| {
            for worker_id in 0..self.threads {
                let shared = &shared;
                s.spawn(move |_| self.worker_thread(worker_id, shared, slots));
            }
        })
        .map_err(|_| anyhow!("worker thread panicked during run"))?;

        let commits = shared.gate.next_sequence();
        let mut sink = shared.gate.into_inner();
        if let Some(err) = sink.error.take() {
            return Err(err).context("failed to write output");
        }
        sink.writer.flush().context("failed to flush output")?;
        debug_assert_eq!(commits, chain.sequence_len());

        let summary = RunSummary {
            threads: self.threads,
            commits,
            bytes: sink.bytes,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            "Run completed in {:.2}s ({} bytes, {} commits, {} threads)",
            summary.elapsed.as_secs_f64(),
            summary.bytes,
            summary.commits,
            summary.threads
        );
        Ok(summary)
    }

    /// Every worker walks the whole chain in order, draining each slot
    /// before moving to the next.
    fn worker_thread<G, W: Write>(&self, worker_id: usize, shared: &Shared<'_, G, W>, slots: &[ProcessSlot<G>]) {
        let _span = tracing::trace_span!("worker", id = worker_id).entered();
        let _guard = AbandonOnPanic(&shared.gate);
        let mut scratch = Scratch::with_capacity(self.bounds.max, self.line_width);

        for slot in slots {
            if !slot.drain(shared, &mut scratch) {
                tracing::debug!("worker-{} stopping: run abandoned", worker_id);
                return;
            }
        }
        tracing::trace!("worker-{} finished chain", worker_id);
    }
}

impl<'s, G> ChainBuilder<'s, G> {
    /// Add a process whose body is written whole, in the header's commit.
    pub fn whole(mut self, header: impl Into<Vec<u8>>, total: usize, body: impl WholeBody + 'static) -> Self {
        let header = header.into();
        self.push(header, total, Body::Whole(Box::new(body)));
        self
    }

    /// Add a chunked process using the scheduler's chunk bounds.
    pub fn chunked(self, header: impl Into<Vec<u8>>, total: usize, work: impl ChunkWork<G> + 'static) -> Self {
        let bounds = self.scheduler.bounds;
        self.chunked_with_bounds(header, total, bounds, work)
    }

    /// Add a chunked process with its own chunk bounds.
    ///
    /// `bounds.max` may not exceed the scheduler's, which sizes the scratch
    /// buffers.
    pub fn chunked_with_bounds(
        mut self,
        header: impl Into<Vec<u8>>,
        total: usize,
        bounds: ChunkBounds,
        work: impl ChunkWork<G> + 'static,
    ) -> Self {
        if let Err(err) = bounds.validate() {
            self.fail(err);
            return self;
        }
        if bounds.max > self.scheduler.bounds.max {
            self.fail(anyhow!(
                "chunk size maximum {} exceeds scratch capacity {}",
                bounds.max,
                self.scheduler.bounds.max
            ));
            return self;
        }

        let partition = Partition::compute(total, self.scheduler.threads, bounds);
        tracing::debug!(
            "Process {}: {} units in {} chunks of {}",
            self.slots.len(),
            total,
            partition.chunk_count(),
            partition.chunk_size()
        );
        let body = Body::Chunked {
            work: Box::new(work),
            partition,
        };
        self.push(header.into(), total, body);
        self
    }

    pub fn build(self) -> Result<Chain<G>> {
        if let Some(err) = self.error {
            return Err(err.context("invalid process chain"));
        }
        if self.slots.len() > self.scheduler.max_processes {
            bail!(
                "process chain has {} processes but the scheduler allows at most {}",
                self.slots.len(),
                self.scheduler.max_processes
            );
        }
        Ok(Chain {
            slots: self.slots,
            sequence_len: self.next_sequence,
        })
    }

    /// Keep the first error; `build` reports it.
    fn fail(&mut self, err: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn push(&mut self, header: Vec<u8>, total: usize, body: Body<G>) {
        let slot = ProcessSlot::new(
            header,
            total,
            body,
            self.next_sequence,
            self.scheduler.line_width,
        );
        self.next_sequence += slot.sequence_len();
        self.slots.push(slot);
    }
}

impl<G> Chain<G> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total sequence numbers a run commits: one per header plus one per chunk.
    pub fn sequence_len(&self) -> u64 {
        self.sequence_len
    }

    pub fn slots(&self) -> &[ProcessSlot<G>] {
        &self.slots
    }

    /// Re-arm every header latch and rewind every chunk cursor.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }
}

impl<'a, G, W> Shared<'a, G, W> {
    pub(crate) fn generator(&self) -> MutexGuard<'_, &'a mut G> {
        self.generator.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G, W: Write> Shared<'_, G, W> {
    /// Write through the gate under sequence number `seq`.
    ///
    /// Returns `false` if the run was abandoned.
    pub(crate) fn commit<F>(&self, seq: u64, write: F) -> bool
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        self.gate
            .commit(seq, |sink| sink.write_with(seq, write))
            .is_some()
    }
}

impl<W: Write> OutputSink<W> {
    /// Run `write` unless an earlier write failed; the sequence still counts
    /// as committed either way.
    fn write_with<F>(&mut self, seq: u64, write: F)
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        if self.error.is_none() {
            let mut counted = Counted {
                inner: &mut self.writer,
                bytes: 0,
            };
            let result = write(&mut counted);
            self.bytes += counted.bytes;
            match result {
                Ok(()) => tracing::trace!("committed seq {} ({} bytes)", seq, counted.bytes),
                Err(err) => {
                    tracing::warn!("Output write failed at seq {}: {}", seq, err);
                    self.error = Some(err);
                }
            }
        }
        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
    }
}

impl<W: Write> Write for Counted<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S> Drop for AbandonOnPanic<'_, S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ChunkContext;

    /// Source that hands out consecutive integers
    struct Counter(u32);

    /// Renders each raw value as a single letter
    struct Letters;

    impl ChunkWork<Counter> for Letters {
        fn generate(&self, source: &mut Counter, raw: &mut [u32]) {
            for value in raw.iter_mut() {
                *value = source.0;
                source.0 += 1;
            }
        }

        fn convert(&self, raw: &[u32], chunk: &ChunkContext, text: &mut Vec<u8>) {
            chunk.wrap_into(raw.iter().map(|v| b'a' + (v % 26) as u8), text);
        }
    }

    struct Fixed(&'static [u8]);

    impl WholeBody for Fixed {
        fn emit(&self, _total: usize, out: &mut dyn Write) -> io::Result<()> {
            out.write_all(self.0)
        }
    }

    struct Exploding;

    impl ChunkWork<Counter> for Exploding {
        fn generate(&self, _source: &mut Counter, _raw: &mut [u32]) {}

        fn convert(&self, _raw: &[u32], chunk: &ChunkContext, _text: &mut Vec<u8>) {
            if chunk.index == 2 {
                panic!("conversion failed");
            }
        }
    }

    struct FailingWriter {
        accepted: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted > 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"));
            }
            self.accepted += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn scheduler(threads: usize, min: usize, max: usize, line_width: usize) -> Scheduler {
        let mut config = SeqgenConfig::default();
        config.scheduler.threads = threads;
        config.scheduler.max_threads = threads.max(1);
        config.chunks.min_units = min;
        config.chunks.max_units = max;
        config.output.line_width = line_width;
        Scheduler::new(&config).unwrap()
    }

    fn letters(start: u32, len: usize, line_width: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, v) in (start..start + len as u32).enumerate() {
            out.push(b'a' + (v % 26) as u8);
            if (i + 1) % line_width == 0 {
                out.push(b'\n');
            }
        }
        if out.last() != Some(&b'\n') {
            out.push(b'\n');
        }
        out
    }

    fn render(threads: usize) -> (Vec<u8>, RunSummary) {
        let scheduler = scheduler(threads, 7, 64, 10);
        let mut chain = scheduler
            .chain()
            .whole(">fixed\n", 3, Fixed(b"xyz\n"))
            .chunked(">first\n", 253, Letters)
            .chunked(">second\n", 100, Letters)
            .build()
            .unwrap();
        let mut out = Vec::new();
        let summary = scheduler
            .run(&mut chain, &mut Counter(0), &mut out)
            .unwrap();
        (out, summary)
    }

    #[test]
    fn test_single_thread_output() {
        let (out, summary) = render(1);
        let mut expected = b">fixed\nxyz\n>first\n".to_vec();
        expected.extend(letters(0, 253, 10));
        expected.extend_from_slice(b">second\n");
        expected.extend(letters(253, 100, 10));
        assert_eq!(out, expected);
        assert_eq!(summary.bytes, expected.len() as u64);
    }

    #[test]
    fn test_output_identical_across_thread_counts() {
        let (reference, _) = render(1);
        for threads in 2..=8 {
            let (out, _) = render(threads);
            assert_eq!(out, reference, "threads={threads}");
        }
    }

    #[test]
    fn test_commit_count_matches_sequence_len() {
        let scheduler = scheduler(4, 7, 64, 10);
        let mut chain = scheduler
            .chain()
            .chunked(">a\n", 253, Letters)
            .chunked(">b\n", 0, Letters)
            .build()
            .unwrap();
        // 253 / 4 = 63 per chunk -> 5 chunks, plus two headers
        assert_eq!(chain.sequence_len(), 7);
        let mut out = Vec::new();
        let summary = scheduler.run(&mut chain, &mut Counter(0), &mut out).unwrap();
        assert_eq!(summary.commits, 7);
        assert!(out.ends_with(b"\n>b\n"));
    }

    #[test]
    fn test_sequence_ranges_are_contiguous() {
        let scheduler = scheduler(2, 10, 50, 60);
        let chain = scheduler
            .chain()
            .chunked(">a\n", 95, Letters)
            .whole(">b\n", 0, Fixed(b""))
            .chunked(">c\n", 5, Letters)
            .build()
            .unwrap();
        let firsts: Vec<u64> = chain.slots().iter().map(|s| s.first_sequence()).collect();
        // a: header + chunks of 47, 47, 1; b: header only; c: header + 1 chunk
        assert_eq!(firsts, vec![0, 4, 5]);
        assert_eq!(chain.sequence_len(), 7);
    }

    #[test]
    fn test_chain_can_run_twice() {
        let scheduler = scheduler(3, 7, 64, 10);
        let mut chain = scheduler.chain().chunked(">x\n", 200, Letters).build().unwrap();

        let mut first = Vec::new();
        scheduler.run(&mut chain, &mut Counter(0), &mut first).unwrap();
        let mut second = Vec::new();
        scheduler.run(&mut chain, &mut Counter(0), &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_chain_longer_than_capacity_rejected() {
        let scheduler = scheduler(2, 7, 64, 10);
        let result = scheduler
            .chain()
            .chunked(">1\n", 10, Letters)
            .chunked(">2\n", 10, Letters)
            .chunked(">3\n", 10, Letters)
            .chunked(">4\n", 10, Letters)
            .chunked(">5\n", 10, Letters)
            .build();
        let err = result.err().unwrap();
        assert!(err.to_string().contains("at most 4"));
    }

    #[test]
    fn test_run_rejects_chain_over_capacity() {
        let scheduler = scheduler(2, 7, 64, 10);
        let mut chain = scheduler
            .chain()
            .chunked(">1\n", 10, Letters)
            .chunked(">2\n", 10, Letters)
            .chunked(">3\n", 10, Letters)
            .build()
            .unwrap();

        let mut smaller = scheduler.clone();
        smaller.max_processes = 2;
        let mut out = Vec::new();
        let err = smaller
            .run(&mut chain, &mut Counter(0), &mut out)
            .unwrap_err();
        assert!(err.to_string().contains("at most 2"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_oversized_process_bounds_rejected() {
        let scheduler = scheduler(2, 7, 64, 10);
        let result = scheduler
            .chain()
            .chunked_with_bounds(">x\n", 10, ChunkBounds { min: 8, max: 128 }, Letters)
            .build();
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("scratch capacity"));
    }

    #[test]
    fn test_write_error_reported_without_hanging() {
        let scheduler = scheduler(4, 7, 64, 10);
        let mut chain = scheduler.chain().chunked(">x\n", 500, Letters).build().unwrap();
        let err = scheduler
            .run(&mut chain, &mut Counter(0), FailingWriter { accepted: 0 })
            .unwrap_err();
        assert!(format!("{err:#}").contains("reader went away"));
    }

    #[test]
    fn test_worker_panic_fails_run() {
        let scheduler = scheduler(4, 7, 64, 10);
        let mut chain = scheduler.chain().chunked(">x\n", 500, Exploding).build().unwrap();
        let err = scheduler
            .run(&mut chain, &mut Counter(0), Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
