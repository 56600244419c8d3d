use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use station_stats::{run, run_path, CancelToken, Config, Error, ParsePolicy, Stat, Summary};

fn config(chunk_size: usize, workers: usize) -> Config {
    Config::default().with_chunk_size(chunk_size).with_workers(workers)
}

#[test]
fn scenario_split_mid_line() {
    let input = b"A;1.0\nB;2.0\nA;3.0\n";
    for chunk_size in [1, 3, 5, 7, 11] {
        let result = run(&input[..], &config(chunk_size, 2), &CancelToken::new()).unwrap();
        assert_eq!(
            result.summary(b"A"),
            Some(Summary {
                min: 1.0,
                max: 3.0,
                mean: 2.0,
                count: 2
            })
        );
        assert_eq!(
            result.summary(b"B"),
            Some(Summary {
                min: 2.0,
                max: 2.0,
                mean: 2.0,
                count: 1
            })
        );
        assert_eq!(result.to_string(), "{A=1.0/2.0/3.0, B=2.0/2.0/2.0}");
    }
}

#[test]
fn malformed_line_is_skipped_by_default() {
    let input = b"A;1.0\nC;notanumber\nB;2.0\nA;3.0\n";
    let result = run(&input[..], &config(6, 2), &CancelToken::new()).unwrap();
    assert!(result.get(b"C").is_none());
    assert_eq!(result.skipped_lines(), 1);
    assert_eq!(result.records(), 3);
    assert_eq!(
        result.get(b"A"),
        Some(&Stat {
            min: 10,
            max: 30,
            sum: 40,
            count: 2
        })
    );
    assert_eq!(result.get(b"B"), Some(&Stat::new(20)));
}

#[test]
fn malformed_line_aborts_under_strict_policy() {
    let input = b"A;1.0\nC;notanumber\nB;2.0\n";
    let config = config(64, 2).with_parse_policy(ParsePolicy::Abort);
    let err = run(&input[..], &config, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, Error::Parse { ref line, .. } if line == "C;notanumber"));
}

#[test]
fn empty_input_gives_empty_result() {
    let result = run(io::empty(), &config(16, 4), &CancelToken::new()).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.to_string(), "{}");
}

#[test]
fn crlf_and_missing_trailing_newline() {
    let input = b"A;1.0\r\nB;-2.5\r\nA;3.0";
    let config = config(4, 3);
    let result = run(&input[..], &config, &CancelToken::new()).unwrap();
    assert_eq!(
        result.get(b"A"),
        Some(&Stat {
            min: 10,
            max: 30,
            sum: 40,
            count: 2
        })
    );
    assert_eq!(result.get(b"B"), Some(&Stat::new(-25)));
}

#[test]
fn two_fraction_digits() {
    let input = b"x;1.25\nx;-0.75\n";
    let config = Config {
        fraction_digits: 2,
        ..config(8, 2)
    };
    let result = run(&input[..], &config, &CancelToken::new()).unwrap();
    let summary = result.summary(b"x").unwrap();
    assert_eq!((summary.min, summary.max, summary.mean), (-0.75, 1.25, 0.25));
    assert_eq!(result.to_string(), "{x=-0.75/0.25/1.25}");
}

struct FailingReader {
    served: bool,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "disk went away"));
        }
        self.served = true;
        let data = b"A;1.0\nB;2.0\n";
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

#[test]
fn read_failure_aborts_the_pipeline() {
    let reader = FailingReader { served: false };
    let err = run(reader, &config(64, 2), &CancelToken::new()).unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn oversized_record_is_fatal_when_bounded() {
    let input = format!("{};1.0\nB;2.0\n", "k".repeat(100));
    for chunk_size in [8, 64, 105, 4096] {
        let config = Config {
            max_record_len: Some(32),
            ..config(chunk_size, 2)
        };
        let err = run(input.as_bytes(), &config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::OversizedRecord { limit: 32 }));

        let unbounded = Config {
            max_record_len: None,
            ..config
        };
        let result = run(input.as_bytes(), &unbounded, &CancelToken::new()).unwrap();
        assert_eq!(result.len(), 2);
    }
}

#[test]
fn record_at_the_bound_passes_for_any_chunk_size() {
    // Every line is exactly 32 bytes, the last one without a newline.
    let line = format!("{};1.0", "k".repeat(28));
    let input = format!("{line}\n{line}\n{line}");
    for chunk_size in [1, 7, 32, 33, 4096] {
        let config = Config {
            max_record_len: Some(32),
            ..config(chunk_size, 2)
        };
        let result = run(input.as_bytes(), &config, &CancelToken::new()).unwrap();
        assert_eq!(result.records(), 3);
    }
}

#[test]
fn values_near_i64_max_do_not_overflow_the_sum() {
    let input = b"A;922337203685477580.7\nA;1.0\nA;922337203685477580.7\n";
    for workers in [1, 2] {
        let result = run(&input[..], &config(8, workers), &CancelToken::new()).unwrap();
        assert_eq!(
            result.get(b"A"),
            Some(&Stat {
                min: 10,
                max: i64::MAX,
                sum: 2 * i128::from(i64::MAX) + 10,
                count: 3
            })
        );
        assert!(result.summary(b"A").unwrap().mean > 0.0);
    }
}

/// Serves `A;1.0` lines forever.
struct EndlessReader;

impl Read for EndlessReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let line = b"A;1.0\n";
        for (i, b) in buf.iter_mut().enumerate() {
            *b = line[i % line.len()];
        }
        Ok(buf.len())
    }
}

#[test]
fn cancelling_mid_run_stops_the_pipeline() {
    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        })
    };
    let start = Instant::now();
    let result = run(EndlessReader, &config(64, 4), &cancel);
    canceller.join().unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn rendezvous_queues_still_finish() {
    let input = "A;1.0\nB;2.0\nA;3.0\n".repeat(200);
    let config = Config {
        queue_depth: 0,
        ..config(16, 4)
    };
    let result = run(input.as_bytes(), &config, &CancelToken::new()).unwrap();
    assert_eq!(result.get(b"A").map(|s| s.count), Some(400));
    assert_eq!(result.get(b"B").map(|s| s.count), Some(200));
}

#[test]
fn reads_from_disk_plain_and_mapped() {
    let path = std::env::temp_dir().join(format!("station-stats-it-{}.txt", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        for i in 0..1000 {
            writeln!(file, "k{};{}.{}", i % 7, i % 50 - 25, i % 10).unwrap();
        }
    }
    let config = config(97, 3);
    let plain = run_path(&path, false, &config, &CancelToken::new()).unwrap();
    let mapped = run_path(&path, true, &config, &CancelToken::new()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(plain, mapped);
    assert_eq!(plain.len(), 7);
    assert_eq!(plain.records(), 1000);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = run_path(
        std::path::Path::new("/definitely/not/here.txt"),
        false,
        &Config::default(),
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
