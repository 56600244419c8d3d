use hashbrown::HashMap;

/// Running statistics for one key, in fixed-point units.
///
/// The mean is never stored; it is `sum / count` on demand, which keeps
/// [`Stat::merge`] exact, associative and commutative. `sum` is 128 bits wide
/// so no realistic number of `i64` values can overflow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub min: i64,
    pub max: i64,
    pub sum: i128,
    pub count: u64,
}

/// Key bytes to statistics, hashed with ahash.
pub type StatMap = HashMap<Box<[u8]>, Stat, ahash::RandomState>;

pub fn stat_map() -> StatMap {
    StatMap::with_hasher(ahash::RandomState::new())
}

impl Stat {
    /// A key's first observation.
    #[inline]
    pub fn new(value: i64) -> Self {
        Self {
            min: value,
            max: value,
            sum: i128::from(value),
            count: 1,
        }
    }

    #[inline]
    pub fn update(&mut self, value: i64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += i128::from(value);
        self.count += 1;
    }

    #[inline]
    pub fn merge(&mut self, other: &Stat) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean in fixed-point units.
    pub fn mean(&self) -> f64 {
        self.sum as f64 / self.count as f64
    }
}

/// The implied number of fractional digits in every value of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    fraction_digits: u32,
}

impl Scale {
    pub fn new(fraction_digits: u32) -> Self {
        Self { fraction_digits }
    }

    pub fn fraction_digits(&self) -> u32 {
        self.fraction_digits
    }

    fn divisor(&self) -> f64 {
        10f64.powi(self.fraction_digits as i32)
    }

    pub fn to_f64(&self, fixed: i64) -> f64 {
        fixed as f64 / self.divisor()
    }

    pub fn summarize(&self, stat: &Stat) -> Summary {
        Summary {
            min: self.to_f64(stat.min),
            max: self.to_f64(stat.max),
            mean: stat.mean() / self.divisor(),
            count: stat.count,
        }
    }
}

/// A [`Stat`] rendered in the input's decimal units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
}
