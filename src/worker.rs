//! Worker pool draining chunk queues into a hash bitmap.
//!
//! The pool owns a fixed set of OS threads created once and reused by every counting
//! run. A run hands the pool one [`DrainJob`] per thread; each job takes chunks from the
//! run's queue, hashes every record into the shared bitmap and stops at the first
//! termination marker. The number of jobs a run dispatches is the number of markers its
//! chunk reader emits, so every job ends even when jobs outnumber idle threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, trace};

use crate::bitmap::{HashBitmap, HashBitmapTrait};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::hash::bitmap_index;
use crate::queue::HandoffQueue;
use crate::reader::{Chunk, Message};

/// Record hash function shared by every job of a run.
pub(crate) type HashFn = fn(&[u8]) -> u32;

/// What one drain job did before it stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerReport {
    pub(crate) chunks: u64,
    pub(crate) records: u64,
    /// False when the job stopped on cancellation instead of a marker.
    pub(crate) terminated: bool,
}

/// One worker's share of a counting run.
pub(crate) struct DrainJob {
    pub(crate) queue: Arc<HandoffQueue<Message>>,
    pub(crate) bitmap: Arc<HashBitmap>,
    pub(crate) hash: HashFn,
    pub(crate) cancel: CancellationToken,
    pub(crate) report: Sender<WorkerReport>,
}

impl DrainJob {
    fn run(self) {
        let mut report = WorkerReport::default();
        while let Some(message) = self.queue.pop(Some(&self.cancel)) {
            match message {
                Message::Chunk(chunk) => {
                    report.records += process_chunk(&chunk, &self.bitmap, self.hash);
                    report.chunks += 1;
                }
                Message::Terminate => {
                    report.terminated = true;
                    break;
                }
            }
        }
        trace!(
            chunks = report.chunks,
            records = report.records,
            terminated = report.terminated,
            "drain job finished"
        );
        // The run may have given up on this job already.
        let _ = self.report.send(report);
    }
}

/// Hash every record of `chunk` into `bitmap`, returning the number of records.
pub(crate) fn process_chunk(chunk: &Chunk, bitmap: &HashBitmap, hash: HashFn) -> u64 {
    let size = bitmap.len();
    let mut records = 0;
    for record in chunk.iter() {
        bitmap.set(bitmap_index(hash(record), size));
        records += 1;
    }
    records
}

/// Fixed-size pool of worker threads.
///
/// Threads are named `distinct-worker-<i>`, live as long as the pool and are joined
/// when it is dropped.
pub(crate) struct WorkerPool {
    jobs: Arc<HandoffQueue<DrainJob>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads.
    pub(crate) fn new(size: usize) -> Result<Self> {
        let jobs = Arc::new(HandoffQueue::new(None));
        let mut pool = Self {
            jobs,
            threads: Vec::with_capacity(size),
        };
        for i in 0..size {
            let name = format!("distinct-worker-{i}");
            let jobs = Arc::clone(&pool.jobs);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::thread_fn(&jobs))
                .map_err(|source| Error::Spawn { name, source })?;
            pool.threads.push(handle);
        }
        Ok(pool)
    }

    /// Number of worker threads.
    pub(crate) fn size(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn dispatch(&self, job: DrainJob) {
        self.jobs.push_unbounded(job);
    }

    fn thread_fn(jobs: &HandoffQueue<DrainJob>) {
        while let Some(job) = jobs.pop(None) {
            // A panicking job drops its report sender, which the run detects.
            if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
                error!("drain job panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.close();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
