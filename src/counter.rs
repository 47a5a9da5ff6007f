//! Counting run orchestration.
//!
//! A run allocates a fresh hash bitmap and chunk queue, starts the chunk reader on its
//! own thread, hands one drain job per pool thread to the worker pool, then joins
//! twice: first every drain job, then the reader. If a job died without reporting, the
//! queue is closed before joining the reader so a bounded push cannot block forever.
//! Only then is the bitmap's population counted and turned into an [`Estimate`].
//!
//! Record and chunk counts in the report are what the workers hashed. A run where some
//! job stopped before its termination marker is labeled [`Ingestion::Cancelled`] even if
//! the reader got through the whole source.

use std::fs::File;
use std::hash::Hasher;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;

use tracing::{debug, info, warn};
use wyhash::WyHash;

use crate::bitmap::{HashBitmap, HashBitmapTrait};
use crate::cancel::CancellationToken;
use crate::config::CounterConfig;
use crate::error::{Error, Result};
use crate::estimate::{linear_counting, Estimate};
use crate::hash::hash_record;
use crate::queue::HandoffQueue;
use crate::reader::{ChunkReader, Message};
use crate::worker::{DrainJob, WorkerPool, WorkerReport};

/// Fill ratio above which linear counting loses accuracy.
const ACCURATE_FILL_RATIO: f64 = 0.5;

/// How ingestion of the source ended.
#[derive(Debug)]
pub enum Ingestion {
    /// The whole source was read.
    Complete,
    /// Reading failed; the estimate covers the records read before the failure.
    Interrupted(Error),
    /// The run was cancelled before every record was hashed; the estimate covers the
    /// records hashed until then.
    Cancelled,
}

/// Outcome of one counting run.
#[derive(Debug)]
pub struct CountReport {
    pub estimate: Estimate,
    /// Records hashed into the bitmap by the workers.
    pub records: u64,
    /// Chunks fully processed by the workers.
    pub chunks: u64,
    /// Bits set in the bitmap at the end of the run.
    pub set_bits: usize,
    pub bitmap_size: usize,
    /// Termination markers emitted by the chunk reader.
    pub markers_delivered: usize,
    /// Workers that stopped on a termination marker.
    pub workers_finished: usize,
    pub ingestion: Ingestion,
}

impl CountReport {
    pub fn fill_ratio(&self) -> f64 {
        self.set_bits as f64 / self.bitmap_size as f64
    }

    /// True when the estimate only covers part of the source.
    pub fn is_partial(&self) -> bool {
        !matches!(self.ingestion, Ingestion::Complete)
    }
}

/// Estimates the number of distinct lines of text sources.
///
/// Each counter owns its configuration and worker pool; counters are independent of
/// each other and a single counter can run any number of counts, one after another
/// or concurrently. Records are hashed with `H` (`WyHash` by default).
pub struct DistinctCounter<H: Hasher + Default = WyHash> {
    config: CounterConfig,
    pool: WorkerPool,
    _hasher: PhantomData<fn() -> H>,
}

impl<H: Hasher + Default> DistinctCounter<H> {
    /// Validate `config` and start the worker pool.
    pub fn new(config: CounterConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.number_of_threads)?;
        Ok(Self {
            config,
            pool,
            _hasher: PhantomData,
        })
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Estimate the number of distinct lines of `source`.
    pub fn count<R: BufRead + Send>(&self, source: R) -> Result<CountReport> {
        self.count_with_cancel(source, &CancellationToken::new())
    }

    /// Estimate the number of distinct lines of the file at `path`.
    ///
    /// Failing to open the file is an error; failing to read it midway is reported
    /// through [`Ingestion::Interrupted`].
    pub fn count_file(&self, path: impl AsRef<Path>) -> Result<CountReport> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        self.count(BufReader::new(file))
    }

    /// Estimate the number of distinct lines of `source`, stopping early once `cancel` fires.
    pub fn count_with_cancel<R: BufRead + Send>(
        &self,
        source: R,
        cancel: &CancellationToken,
    ) -> Result<CountReport> {
        let bitmap_size = self.config.bitmap_size;
        let bitmap = Arc::new(HashBitmap::new(self.config.strategy, bitmap_size)?);
        let queue: Arc<HandoffQueue<Message>> =
            Arc::new(HandoffQueue::new(self.config.queue_capacity));
        // Jobs dispatched and markers emitted both come from this single value.
        let workers = self.pool.size();
        debug!(
            workers,
            bitmap_size,
            lines_per_chunk = self.config.lines_per_chunk,
            strategy = ?self.config.strategy,
            "starting count"
        );

        let reader = ChunkReader::new(source, self.config.lines_per_chunk);
        let (reader, reports) = thread::scope(|scope| {
            let producer = thread::Builder::new()
                .name("chunk-reader".to_string())
                .spawn_scoped(scope, || reader.run(&queue, workers, cancel))
                .map_err(|source| Error::Spawn {
                    name: "chunk-reader".to_string(),
                    source,
                })?;

            let (tx, rx) = mpsc::channel();
            for _ in 0..workers {
                self.pool.dispatch(DrainJob {
                    queue: Arc::clone(&queue),
                    bitmap: Arc::clone(&bitmap),
                    hash: hash_record::<H>,
                    cancel: cancel.clone(),
                    report: tx.clone(),
                });
            }
            drop(tx);

            // Ends once every job has reported or dropped its sender.
            let reports: Vec<WorkerReport> = rx.iter().collect();
            if reports.len() < workers {
                // Nothing pops from the queue anymore, so a blocked push must be released.
                queue.close();
            }
            let reader = producer.join().map_err(|_| Error::ProducerPanicked)?;
            Ok::<_, Error>((reader, reports))
        })?;

        if reports.len() < workers {
            return Err(Error::WorkerLost(workers - reports.len()));
        }

        let records = reports.iter().map(|r| r.records).sum();
        let chunks = reports.iter().map(|r| r.chunks).sum();
        let workers_finished = reports.iter().filter(|r| r.terminated).count();
        // A job that stopped without its marker may have left chunks in the queue.
        let ingestion = match reader.ingestion {
            Ingestion::Complete if workers_finished < workers => Ingestion::Cancelled,
            ingestion => ingestion,
        };
        if records < reader.records {
            debug!(
                read = reader.records,
                hashed = records,
                abandoned_items = queue.len(),
                "records left unhashed"
            );
        }

        let set_bits = bitmap.population_count();
        let estimate = linear_counting(bitmap_size, bitmap_size - set_bits);
        let report = CountReport {
            estimate,
            records,
            chunks,
            set_bits,
            bitmap_size,
            markers_delivered: reader.markers,
            workers_finished,
            ingestion,
        };

        if estimate.is_saturated() {
            warn!(bitmap_size, "bitmap saturated, estimate unavailable");
        } else if report.fill_ratio() > ACCURATE_FILL_RATIO {
            warn!(
                fill_ratio = report.fill_ratio(),
                bitmap_size,
                "bitmap more than half full, estimate is inaccurate"
            );
        }
        info!(
            estimate = %report.estimate,
            records = report.records,
            chunks = report.chunks,
            set_bits,
            partial = report.is_partial(),
            "count finished"
        );
        Ok(report)
    }
}

/// One-shot helper: build a counter for `config` and count `source` with it.
pub fn count_distinct<R: BufRead + Send>(
    source: R,
    config: CounterConfig,
) -> Result<CountReport> {
    DistinctCounter::<WyHash>::new(config)?.count(source)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::config::BitmapStrategy;
    use std::collections::hash_map::DefaultHasher;
    use std::io::Cursor;

    fn config(threads: usize) -> CounterConfig {
        CounterConfig::new()
            .with_threads(threads)
            .with_lines_per_chunk(4)
            .with_bitmap_size(1 << 16)
    }

    #[test]
    fn test_count_small_source() {
        let counter = DistinctCounter::<WyHash>::new(config(2)).unwrap();
        let report = counter.count(Cursor::new("a\nb\na\nc\n")).unwrap();
        assert_eq!(report.estimate, Estimate::Count(3));
        assert_eq!(report.records, 4);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.set_bits, 3);
        assert_eq!(report.markers_delivered, 2);
        assert_eq!(report.workers_finished, 2);
        assert!(!report.is_partial());
    }

    #[test]
    fn test_custom_hasher() {
        let counter = DistinctCounter::<DefaultHasher>::new(config(1)).unwrap();
        let report = counter.count(Cursor::new("x\ny\nx\n")).unwrap();
        assert_eq!(report.estimate.value(), Some(2));
    }

    #[test]
    fn test_invalid_config_fails_before_start() {
        let result = DistinctCounter::<WyHash>::new(config(0));
        assert!(matches!(
            result,
            Err(Error::InvalidConfig {
                name: "number_of_threads",
                ..
            })
        ));
    }

    #[test]
    fn test_saturated_bitmap() {
        let config = config(2).with_bitmap_size(1).with_strategy(BitmapStrategy::Locked);
        let report = count_distinct(Cursor::new("anything\n"), config).unwrap();
        assert_eq!(report.estimate, Estimate::Saturated { bitmap_size: 1 });
        assert_eq!(report.fill_ratio(), 1.0);
    }

    #[test]
    fn test_count_file_missing() {
        let counter = DistinctCounter::<WyHash>::new(config(1)).unwrap();
        let result = counter.count_file("/nonexistent/distinct-counter/input.txt");
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
