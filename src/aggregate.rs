use tracing::{debug, warn};

use crate::chunk::RawChunk;
use crate::error::{Error, Result};
use crate::record::{parse_record, Record};
use crate::stat::{stat_map, Stat, StatMap};

/// What a worker does with a line that fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Drop the line, count it, keep going.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

/// One worker's finished aggregate, handed to the merger by value.
#[derive(Debug, Clone, Default)]
pub struct PartialResult {
    pub stats: StatMap,
    pub records: u64,
    pub skipped_lines: u64,
}

/// A worker-private key -> [`Stat`] table.
pub struct PartialAggregator {
    stats: StatMap,
    separator: u8,
    policy: ParsePolicy,
    records: u64,
    skipped_lines: u64,
}

impl PartialAggregator {
    pub fn new(separator: u8, policy: ParsePolicy) -> Self {
        Self {
            stats: stat_map(),
            separator,
            policy,
            records: 0,
            skipped_lines: 0,
        }
    }

    #[inline]
    pub fn update(&mut self, record: Record<'_>) {
        self.records += 1;
        match self.stats.get_mut(record.key) {
            Some(stat) => stat.update(record.value),
            None => {
                self.stats.insert(record.key.into(), Stat::new(record.value));
            }
        }
    }

    /// Parses and folds every line of `chunk`. Blank lines are ignored.
    pub fn ingest(&mut self, chunk: &RawChunk) -> Result<()> {
        for line in chunk.lines() {
            if line.is_empty() || line == b"\r" {
                continue;
            }
            match parse_record(line, self.separator) {
                Ok(record) => self.update(record),
                Err(source) => {
                    let line = String::from_utf8_lossy(line).into_owned();
                    if self.policy == ParsePolicy::Abort {
                        return Err(Error::Parse { line, source });
                    }
                    if self.skipped_lines == 0 {
                        warn!(%line, error = %source, "skipping malformed line");
                    }
                    self.skipped_lines += 1;
                }
            }
        }
        Ok(())
    }

    pub fn finalize(self) -> PartialResult {
        if self.skipped_lines > 0 {
            debug!(skipped = self.skipped_lines, "malformed lines skipped");
        }
        PartialResult {
            stats: self.stats,
            records: self.records,
            skipped_lines: self.skipped_lines,
        }
    }
}
