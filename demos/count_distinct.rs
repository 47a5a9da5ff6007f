//! Estimate the number of distinct lines of a file.
//!
//! ```text
//! cargo run --release --example count_distinct -- ip_addresses.txt --threads 12 -v
//! ```

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use distinct_counter::config::DEFAULT_LINES_PER_CHUNK;
use distinct_counter::{BitmapStrategy, CounterConfig, DistinctCounter, Ingestion};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Strategy {
    Locked,
    #[default]
    Atomic,
}

impl From<Strategy> for BitmapStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Locked => BitmapStrategy::Locked,
            Strategy::Atomic => BitmapStrategy::Atomic,
        }
    }
}

#[derive(Parser)]
#[clap(name = "count_distinct")]
#[clap(about = "Estimate the number of distinct lines of a file", long_about = None)]
struct Cli {
    /// File to read, one record per line.
    path: PathBuf,

    /// Worker threads; defaults to the available parallelism.
    #[clap(short, long, env = "DISTINCT_THREADS")]
    threads: Option<usize>,

    #[clap(long, default_value_t = DEFAULT_LINES_PER_CHUNK)]
    lines_per_chunk: usize,

    /// Bitmap size as a power of two exponent.
    #[clap(long, conflicts_with = "expected")]
    bitmap_bits: Option<u32>,

    /// Size the bitmap for this many distinct lines.
    #[clap(long)]
    expected: Option<usize>,

    #[clap(long, value_enum, default_value_t)]
    strategy: Strategy,

    /// Maximum number of chunks waiting for a worker; unbounded when omitted.
    #[clap(long)]
    queue_capacity: Option<usize>,

    /// Log verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> CounterConfig {
        let mut config = match (self.expected, self.bitmap_bits) {
            (Some(expected), _) => CounterConfig::for_expected_cardinality(expected),
            (None, Some(bits)) => {
                CounterConfig::new().with_bitmap_size(1usize.checked_shl(bits).unwrap_or(0))
            }
            (None, None) => CounterConfig::new(),
        };
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        config
            .with_lines_per_chunk(self.lines_per_chunk)
            .with_queue_capacity(self.queue_capacity)
            .with_strategy(self.strategy.into())
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), distinct_counter::Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let counter: DistinctCounter = DistinctCounter::new(cli.config())?;
    let start = Instant::now();
    let report = counter.count_file(&cli.path)?;
    let elapsed = start.elapsed();

    println!("distinct lines: {}", report.estimate);
    println!("lines read:     {}", report.records);
    println!("bitmap fill:    {:.4}", report.fill_ratio());
    println!("elapsed:        {} ms", elapsed.as_millis());
    if let Ingestion::Interrupted(err) = &report.ingestion {
        eprintln!("warning: input was only partially read: {err}");
    }
    Ok(())
}
