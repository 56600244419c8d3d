use crate::aggregate::ParsePolicy;
use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
pub const DEFAULT_QUEUE_DEPTH: usize = 2;
pub const MAX_CHUNK_SIZE: usize = 1 << 30;

/// Knobs for one pipeline run.
///
/// Every queue in the pipeline is bounded by `queue_depth`, so a slow worker
/// pool throttles the reader instead of buffering chunks. In-flight memory is
/// roughly `(queue_depth + 1) * (workers + 1)` chunks plus the reader's
/// carried-over remainder. A `queue_depth` of 0 turns every handoff into a
/// rendezvous.
#[derive(Debug, Clone)]
pub struct Config {
    pub chunk_size: usize,
    pub workers: usize,
    pub queue_depth: usize,
    pub separator: u8,
    pub fraction_digits: u32,
    pub parse_policy: ParsePolicy,
    /// `None` lets a separator-less remainder grow without limit.
    pub max_record_len: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            separator: b';',
            fraction_digits: 1,
            parse_policy: ParsePolicy::Skip,
            max_record_len: None,
        }
    }
}

impl Config {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::Config(format!(
                "chunk_size must be at most {MAX_CHUNK_SIZE} bytes"
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be greater than zero".into()));
        }
        if self.separator == b'\n' || self.separator == b'\r' || self.separator == b'.' {
            return Err(Error::Config(format!(
                "separator {:?} collides with the record format",
                self.separator as char
            )));
        }
        // 10^18 is the largest power of ten an i64 holds.
        if self.fraction_digits > 18 {
            return Err(Error::Config("fraction_digits must be at most 18".into()));
        }
        if self.max_record_len == Some(0) {
            return Err(Error::Config("max_record_len must be greater than zero".into()));
        }
        Ok(())
    }
}
