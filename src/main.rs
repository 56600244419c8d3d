use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use station_stats::{run_path, CancelToken, Config, FinalResult, ParsePolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "station-stats")]
#[command(author, version, about = "Per-key min/mean/max over a `key;value` measurements file")]
struct Cli {
    /// Measurements file, one `key;value` record per line
    input: PathBuf,

    /// Bytes read per block
    #[arg(long, default_value_t = station_stats::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Worker threads (defaults to the available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of every chunk queue; 0 hands chunks over directly
    #[arg(long, default_value_t = station_stats::config::DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Field separator between key and value
    #[arg(long, default_value_t = ';')]
    separator: char,

    /// Fractional digits every value carries
    #[arg(long, default_value_t = 1)]
    fraction_digits: u32,

    /// Abort on the first malformed line instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Fail once a record grows past this many bytes without a newline
    #[arg(long)]
    max_record_len: Option<usize>,

    /// Memory-map the input instead of reading it
    #[arg(long)]
    mmap: bool,

    /// Run the aggregation this many times and report the mean wall time
    #[arg(long, default_value_t = 1)]
    repeat: u32,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        if !self.separator.is_ascii() {
            bail!("separator must be a single ASCII character");
        }
        let defaults = Config::default();
        Ok(Config {
            chunk_size: self.chunk_size,
            workers: self.workers.unwrap_or(defaults.workers),
            queue_depth: self.queue_depth,
            separator: self.separator as u8,
            fraction_digits: self.fraction_digits,
            parse_policy: if self.strict {
                ParsePolicy::Abort
            } else {
                ParsePolicy::Skip
            },
            max_record_len: self.max_record_len,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let cancel = CancelToken::new();

    let (result, elapsed) = timeit(cli.repeat.max(1), || {
        run_path(&cli.input, cli.mmap, &config, &cancel)
            .with_context(|| format!("failed to aggregate {}", cli.input.display()))
    })?;
    info!(elapsed = ?elapsed, runs = cli.repeat.max(1), "done");

    println!("{result}");
    Ok(())
}

fn timeit<F: Fn() -> Result<FinalResult>>(count: u32, f: F) -> Result<(FinalResult, Duration)> {
    let start = Instant::now();
    let mut result = f()?;
    for _ in 1..count {
        result = f()?;
    }
    Ok((result, start.elapsed() / count))
}
