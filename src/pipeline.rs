use std::io::Read;
use std::path::Path;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error, info};

use crate::chunk::{ChunkReader, RawChunk};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::merge::{merge, FinalResult};
use crate::pool::{CancelToken, WorkerPool};
use crate::source::Input;
use crate::stat::Scale;

/// Opens `path` (mapped into memory when `mmap` is set) and aggregates it.
pub fn run_path(
    path: &Path,
    mmap: bool,
    config: &Config,
    cancel: &CancelToken,
) -> Result<FinalResult> {
    config.validate()?;
    let input = Input::open(path, mmap)?;
    info!(path = %path.display(), mapped = input.is_mapped(), "opened input");
    run(input, config, cancel)
}

/// Aggregates every `key;value` record readable from `reader`.
///
/// One thread reads chunks into a bounded queue, this thread hands them out
/// round-robin to `config.workers` aggregators, and once every worker has
/// drained its queue the partials are merged. Threads are scoped, so every
/// one of them has been joined by the time this returns, on success or not.
pub fn run<R: Read + Send>(
    reader: R,
    config: &Config,
    cancel: &CancelToken,
) -> Result<FinalResult> {
    config.validate()?;
    info!(
        chunk_size = config.chunk_size,
        workers = config.workers,
        queue_depth = config.queue_depth,
        "starting pipeline"
    );

    let (partials, chunks) = thread::scope(|s| {
        let (tx, rx) = bounded::<RawChunk>(config.queue_depth);
        let chunk_reader =
            ChunkReader::new(reader, config.chunk_size).with_max_record_len(config.max_record_len);
        let producer = s.spawn({
            let cancel = cancel.clone();
            move || produce(chunk_reader, tx, cancel)
        });

        let mut pool = WorkerPool::spawn(
            s,
            config.workers,
            config.queue_depth,
            config.separator,
            config.parse_policy,
            cancel,
        );
        for chunk in rx.iter() {
            if cancel.is_cancelled() {
                break;
            }
            if pool.dispatch(chunk).is_err() {
                break;
            }
        }
        // Unblocks the producer if we stopped early.
        drop(rx);

        let produced = producer.join().unwrap_or_else(|_| {
            cancel.cancel();
            Err(Error::Io(std::io::Error::other("reader thread panicked")))
        });
        let partials = pool.finish();
        // A read failure is the root cause of whatever the workers saw.
        let chunks = produced?;
        Ok::<_, Error>((partials?, chunks))
    })
    .inspect_err(|e| error!(error = %e, "pipeline failed"))?;

    let result = merge(partials, Scale::new(config.fraction_digits));
    info!(
        chunks,
        keys = result.len(),
        records = result.records(),
        skipped = result.skipped_lines(),
        "pipeline finished"
    );
    Ok(result)
}

fn produce<R: Read>(
    mut chunks: ChunkReader<R>,
    tx: Sender<RawChunk>,
    cancel: CancelToken,
) -> Result<u64> {
    let mut produced = 0;
    loop {
        // Before every read.
        if cancel.is_cancelled() {
            debug!("reader cancelled");
            break;
        }
        let chunk = match chunks.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };
        produced += 1;
        if tx.send(chunk).is_err() {
            break;
        }
    }
    Ok(produced)
}
