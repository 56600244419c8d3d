//! Parallel min/max/mean aggregation over `key;value` measurement files.
//!
//! The input is cut into chunks of whole lines, the chunks are dealt
//! round-robin to a fixed set of workers that each keep a private
//! key -> [`Stat`] table, and the worker tables are merged at the end. Values
//! are fixed-point integers, so the merge is exact and order-independent.

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod pool;
pub mod record;
pub mod source;
pub mod stat;

pub use aggregate::{ParsePolicy, PartialAggregator, PartialResult};
pub use chunk::{ChunkReader, RawChunk};
pub use config::Config;
pub use error::{Error, ParseError, Result};
pub use merge::{merge, merge_into, FinalResult};
pub use pipeline::{run, run_path};
pub use pool::{CancelToken, WorkerPool};
pub use record::{parse_record, Record};
pub use source::Input;
pub use stat::{Scale, Stat, StatMap, Summary};
