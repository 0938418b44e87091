use super::results::{ExtendedStats, FieldStatsResult};
use crate::data::Value;

/// Running count/min/max/sum/sum-of-squares over numeric values.
/// Non-numeric values are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsAccumulator {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    sum_of_squares: f64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sum_of_squares: 0.0,
        }
    }

    pub fn accumulate(&mut self, value: &Value) {
        if let Some(v) = value.as_f64() {
            self.push(v);
        }
    }

    pub fn push(&mut self, v: f64) {
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v;
        self.sum_of_squares += v * v;
    }

    /// Merge another accumulator into this one (for per-partition aggregation)
    pub fn merge(&mut self, other: &StatsAccumulator) {
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// NaN when nothing was accumulated
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }

    /// Population variance, clamped at zero against cancellation on
    /// near-constant data
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        (self.sum_of_squares / self.count as f64 - mean * mean).max(0.0)
    }

    pub fn std_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn into_field_stats(self) -> FieldStatsResult {
        FieldStatsResult {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean(),
            sum: self.sum,
            extended: Some(ExtendedStats {
                sum_of_squares: self.sum_of_squares,
                variance: self.variance(),
                std_deviation: self.std_deviation(),
            }),
            search_hits: Vec::new(),
            took_ms: 0,
        }
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
