//! Chunk reader: the single producer of a counting run.
//!
//! Lines are read in source order and packed into chunks of at most `lines_per_chunk`
//! records. Chunk encoding:
//! - `data`        - every record's bytes, back to back, without line terminators
//! - `ends[i]`     - end offset of record `i` in `data`
//!
//! Once the source is exhausted, fails, or the run is cancelled, exactly one
//! [`Message::Terminate`] per worker is pushed. Markers are pushed from a drop guard, so
//! they are delivered even if reading panics, and they bypass the queue bound so a full
//! queue can never hold them back.

use std::io::BufRead;

use tracing::{trace, warn};

use crate::cancel::CancellationToken;
use crate::counter::Ingestion;
use crate::error::Error;
use crate::queue::HandoffQueue;

/// Batch of consecutive records moved through the queue as one item.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl Chunk {
    pub fn with_capacity(records: usize) -> Self {
        Self {
            data: Vec::new(),
            ends: Vec::with_capacity(records),
        }
    }

    /// Append one record.
    pub fn push(&mut self, record: &[u8]) {
        self.data.extend_from_slice(record);
        self.ends.push(self.data.len());
    }

    /// Number of records in the chunk.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Iterate over the records in source order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts
            .zip(self.ends.iter().copied())
            .map(move |(start, end)| &self.data[start..end])
    }

    /// Read one line from `source` straight into the chunk buffer.
    ///
    /// Returns `Ok(false)` at end of input. On error the partial line is discarded.
    fn read_record<R: BufRead>(&mut self, source: &mut R) -> std::io::Result<bool> {
        let start = self.data.len();
        match source.read_until(b'\n', &mut self.data) {
            Ok(0) => Ok(false),
            Ok(_) => {
                if self.data.last() == Some(&b'\n') {
                    self.data.pop();
                    if self.data.len() > start && self.data.last() == Some(&b'\r') {
                        self.data.pop();
                    }
                }
                self.ends.push(self.data.len());
                Ok(true)
            }
            Err(e) => {
                self.data.truncate(start);
                Err(e)
            }
        }
    }
}

/// Item travelling from the chunk reader to the workers.
#[derive(Debug)]
pub enum Message {
    Chunk(Chunk),
    /// Termination marker: the receiving worker stops for good.
    Terminate,
}

/// Summary of a finished chunk reader.
#[derive(Debug)]
pub(crate) struct ReaderReport {
    pub(crate) records: u64,
    pub(crate) chunks: u64,
    pub(crate) markers: usize,
    pub(crate) ingestion: Ingestion,
}

pub(crate) struct ChunkReader<R> {
    source: R,
    lines_per_chunk: usize,
}

impl<R: BufRead> ChunkReader<R> {
    pub(crate) fn new(source: R, lines_per_chunk: usize) -> Self {
        debug_assert!(lines_per_chunk > 0);
        Self {
            source,
            lines_per_chunk,
        }
    }

    /// Read the whole source into `queue`, then deliver `workers` termination markers.
    pub(crate) fn run(
        mut self,
        queue: &HandoffQueue<Message>,
        workers: usize,
        cancel: &CancellationToken,
    ) -> ReaderReport {
        let guard = MarkerGuard {
            queue,
            pending: workers,
        };
        let mut records = 0;
        let mut chunks = 0;
        let ingestion = self.fill(queue, cancel, &mut records, &mut chunks);
        let markers = guard.finish();
        trace!(records, chunks, markers, "chunk reader finished");
        ReaderReport {
            records,
            chunks,
            markers,
            ingestion,
        }
    }

    fn fill(
        &mut self,
        queue: &HandoffQueue<Message>,
        cancel: &CancellationToken,
        records: &mut u64,
        chunks: &mut u64,
    ) -> Ingestion {
        let mut chunk = Chunk::with_capacity(self.lines_per_chunk);
        loop {
            if cancel.is_cancelled() {
                return Ingestion::Cancelled;
            }
            match chunk.read_record(&mut self.source) {
                Ok(true) => {}
                Ok(false) => break,
                Err(source) => {
                    warn!(
                        records = *records,
                        error = %source,
                        "failed to read source, stopping ingestion"
                    );
                    return Ingestion::Interrupted(Error::io("reading source", source));
                }
            }
            if chunk.len() >= self.lines_per_chunk {
                let next = Chunk::with_capacity(self.lines_per_chunk);
                let full = std::mem::replace(&mut chunk, next);
                if !Self::send(queue, full, cancel, records, chunks) {
                    return Ingestion::Cancelled;
                }
            }
        }
        if !chunk.is_empty() && !Self::send(queue, chunk, cancel, records, chunks) {
            return Ingestion::Cancelled;
        }
        Ingestion::Complete
    }

    /// Push `chunk`, counting it only once accepted.
    fn send(
        queue: &HandoffQueue<Message>,
        chunk: Chunk,
        cancel: &CancellationToken,
        records: &mut u64,
        chunks: &mut u64,
    ) -> bool {
        let len = chunk.len() as u64;
        match queue.push(Message::Chunk(chunk), cancel) {
            Ok(()) => {
                *records += len;
                *chunks += 1;
                true
            }
            Err(_) => false,
        }
    }
}

/// Delivers the pending termination markers when dropped.
struct MarkerGuard<'a> {
    queue: &'a HandoffQueue<Message>,
    pending: usize,
}

impl MarkerGuard<'_> {
    fn finish(mut self) -> usize {
        let markers = self.pending;
        self.deliver();
        markers
    }

    fn deliver(&mut self) {
        while self.pending > 0 {
            self.queue.push_unbounded(Message::Terminate);
            self.pending -= 1;
        }
    }
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        self.deliver();
    }
}
