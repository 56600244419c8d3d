use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{Scope, ScopedJoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error};

use crate::aggregate::{ParsePolicy, PartialAggregator, PartialResult};
use crate::chunk::RawChunk;
use crate::error::{Error, Result};

/// Shared "done" signal. Raising it makes the reader stop producing and every
/// worker drop its partial and exit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type WorkerHandle<'scope> = ScopedJoinHandle<'scope, Result<Option<PartialResult>>>;

/// N workers, each owning one [`PartialAggregator`] and one bounded input
/// queue. Chunks are handed out round-robin.
pub struct WorkerPool<'scope> {
    senders: Vec<Sender<RawChunk>>,
    handles: Vec<WorkerHandle<'scope>>,
    next: usize,
    cancel: CancelToken,
}

impl<'scope> WorkerPool<'scope> {
    pub fn spawn<'env>(
        scope: &'scope Scope<'scope, 'env>,
        workers: usize,
        queue_depth: usize,
        separator: u8,
        policy: ParsePolicy,
        cancel: &CancelToken,
    ) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = bounded(queue_depth);
            let cancel = cancel.clone();
            let aggregator = PartialAggregator::new(separator, policy);
            handles.push(scope.spawn(move || worker(id, rx, aggregator, cancel)));
            senders.push(tx);
        }
        Self {
            senders,
            handles,
            next: 0,
            cancel: cancel.clone(),
        }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Sends `chunk` to the next worker in turn, blocking while its queue is
    /// full. Fails only if that worker has already exited.
    pub fn dispatch(&mut self, chunk: RawChunk) -> Result<()> {
        let id = self.next;
        self.next = (self.next + 1) % self.senders.len();
        debug!(worker = id, bytes = chunk.len(), "dispatch chunk");
        self.senders[id].send(chunk).map_err(|_| {
            self.cancel.cancel();
            Error::Cancelled
        })
    }

    /// Closes every input queue, waits for all workers, and returns their
    /// partials. Nothing is returned unless every worker finished cleanly.
    pub fn finish(self) -> Result<Vec<PartialResult>> {
        let Self {
            senders,
            handles,
            cancel,
            ..
        } = self;
        drop(senders);

        let mut partials = Vec::with_capacity(handles.len());
        let mut failure = None;
        for (id, handle) in handles.into_iter().enumerate() {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(Error::WorkerPanicked(id)));
            match outcome {
                Ok(Some(partial)) => partials.push(partial),
                Ok(None) => {}
                Err(e) => {
                    // A cancellation is the echo of some other failure.
                    if failure.is_none() || matches!(failure, Some(Error::Cancelled)) {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(partials)
    }
}

fn worker(
    id: usize,
    input: Receiver<RawChunk>,
    mut aggregator: PartialAggregator,
    cancel: CancelToken,
) -> Result<Option<PartialResult>> {
    debug!(worker = id, "worker started");
    for chunk in input.iter() {
        if cancel.is_cancelled() {
            debug!(worker = id, "worker cancelled");
            return Ok(None);
        }
        if let Err(e) = aggregator.ingest(&chunk) {
            error!(worker = id, error = %e, "worker failed");
            cancel.cancel();
            return Err(e);
        }
    }
    if cancel.is_cancelled() {
        return Ok(None);
    }
    let partial = aggregator.finalize();
    debug!(worker = id, keys = partial.stats.len(), records = partial.records, "worker finished");
    Ok(Some(partial))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> RawChunk {
        RawChunk::from(text.as_bytes().to_vec())
    }

    #[test]
    fn round_robin_reaches_every_worker() {
        let cancel = CancelToken::new();
        let partials = std::thread::scope(|s| {
            let mut pool = WorkerPool::spawn(s, 3, 1, b';', ParsePolicy::Skip, &cancel);
            assert_eq!(pool.workers(), 3);
            for text in ["A;1.0\n", "A;2.0\n", "A;3.0\n", "B;4.0\n"] {
                pool.dispatch(chunk(text)).unwrap();
            }
            pool.finish().unwrap()
        });
        assert_eq!(partials.len(), 3);
        let records: Vec<u64> = partials.iter().map(|p| p.records).collect();
        assert_eq!(records, vec![2, 1, 1]);
    }

    #[test]
    fn failed_worker_fails_the_pool() {
        let cancel = CancelToken::new();
        let result = std::thread::scope(|s| {
            let mut pool = WorkerPool::spawn(s, 2, 0, b';', ParsePolicy::Abort, &cancel);
            pool.dispatch(chunk("A;oops\n")).unwrap();
            pool.finish()
        });
        assert!(matches!(result, Err(Error::Parse { .. })));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn cancelled_pool_returns_no_partials() {
        let cancel = CancelToken::new();
        let result = std::thread::scope(|s| {
            let mut pool = WorkerPool::spawn(s, 2, 4, b';', ParsePolicy::Skip, &cancel);
            cancel.cancel();
            let _ = pool.dispatch(chunk("A;1.0\n"));
            pool.finish()
        });
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
