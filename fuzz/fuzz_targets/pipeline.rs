#![no_main]

use std::io::Cursor;

use distinct_counter::{count_distinct, CounterConfig, Ingestion};
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let (header, input) = data.split_at(2);
    let lines_per_chunk = usize::from(header[0] % 16) + 1;
    let threads = usize::from(header[1] % 4) + 1;
    let bitmap_size = 1 << (wyhash(input, 0) % 17);
    let config = CounterConfig::new()
        .with_threads(threads)
        .with_lines_per_chunk(lines_per_chunk)
        .with_bitmap_size(bitmap_size);

    let report = count_distinct(Cursor::new(input), config).unwrap();

    let newlines = input.iter().filter(|&&b| b == b'\n').count();
    let unterminated = usize::from(input.last().is_some_and(|&b| b != b'\n'));
    assert!(matches!(report.ingestion, Ingestion::Complete));
    assert_eq!(report.records, (newlines + unterminated) as u64);
    assert_eq!(report.markers_delivered, threads);
    assert_eq!(report.workers_finished, threads);
    assert!(report.set_bits <= bitmap_size);
    assert!(report.set_bits as u64 <= report.records);
});
