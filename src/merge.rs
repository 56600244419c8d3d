use std::fmt;

use rayon::prelude::*;

use crate::aggregate::PartialResult;
use crate::stat::{stat_map, Scale, Stat, StatMap, Summary};

/// Folds `partial` into `acc`. Commutative and associative, so the order in
/// which partials arrive never changes the outcome.
pub fn merge_into(acc: &mut PartialResult, partial: PartialResult) {
    if acc.stats.is_empty() && acc.records == 0 && acc.skipped_lines == 0 {
        *acc = partial;
        return;
    }
    for (key, stat) in partial.stats {
        acc.stats
            .entry(key)
            .and_modify(|e| e.merge(&stat))
            .or_insert(stat);
    }
    acc.records += partial.records;
    acc.skipped_lines += partial.skipped_lines;
}

/// Combines every worker's partial into one result.
pub fn merge(partials: Vec<PartialResult>, scale: Scale) -> FinalResult {
    let merged = partials
        .into_par_iter()
        .reduce(PartialResult::default, |mut acc, x| {
            merge_into(&mut acc, x);
            acc
        });
    FinalResult {
        stats: merged.stats,
        records: merged.records,
        skipped_lines: merged.skipped_lines,
        scale,
    }
}

/// The union of all partials, owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResult {
    stats: StatMap,
    records: u64,
    skipped_lines: u64,
    scale: Scale,
}

impl FinalResult {
    pub fn empty(scale: Scale) -> Self {
        Self {
            stats: stat_map(),
            records: 0,
            skipped_lines: 0,
            scale,
        }
    }

    pub fn stats(&self) -> &StatMap {
        &self.stats
    }

    pub fn get(&self, key: &[u8]) -> Option<&Stat> {
        self.stats.get(key)
    }

    pub fn summary(&self, key: &[u8]) -> Option<Summary> {
        self.get(key).map(|stat| self.scale.summarize(stat))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Entries ordered by key bytes.
    pub fn sorted(&self) -> Vec<(&[u8], &Stat)> {
        let mut entries: Vec<(&[u8], &Stat)> = self
            .stats
            .iter()
            .map(|(key, stat)| (&key[..], stat))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// `{key=min/mean/max, ...}` sorted by key.
impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.scale.fraction_digits() as usize;
        write!(f, "{{")?;
        for (i, (key, stat)) in self.sorted().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let summary = self.scale.summarize(stat);
            write!(
                f,
                "{}={:.p$}/{:.p$}/{:.p$}",
                String::from_utf8_lossy(key),
                summary.min,
                summary.mean,
                summary.max,
                p = precision
            )?;
        }
        write!(f, "}}")
    }
}
