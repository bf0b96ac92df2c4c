use std::borrow::Cow;
use std::sync::OnceLock;

use sluice_proto::v0::HistogramRecord;

use crate::SummaryError;

fn build_default_bucket_limits() -> Vec<f64> {
    // Same default layout as the TensorBoard histogram convention:
    // edges grow by 10% from 1e-12 up to 1e20, with a final catch-all edge.
    let mut positive = Vec::new();
    let mut edge = 1e-12f64;
    while edge < 1e20 {
        positive.push(edge);
        edge *= 1.1;
    }
    positive.push(f64::MAX);

    // (-reversed, 0, positive) covers the whole real line.
    let mut limits = Vec::with_capacity(positive.len() * 2 + 1);
    limits.extend(positive.iter().rev().map(|edge| -edge));
    limits.push(0.0);
    limits.extend(positive.iter().copied());
    limits
}

/// The shared default bucket table, computed once per process.
pub fn default_bucket_limits() -> &'static [f64] {
    static LIMITS: OnceLock<Vec<f64>> = OnceLock::new();
    LIMITS.get_or_init(build_default_bucket_limits)
}

/// Streaming histogram over finite `f64` samples.
///
/// Bucket `i` holds values in `(limit[i-1], limit[i]]` (upper-bound
/// placement: a value equal to an edge lands in the bucket *after* it).
/// Callers must reject NaN/Inf before `add`; the aggregator does not check
/// and non-finite input would corrupt `min`/`max`.
#[derive(Debug, Clone)]
pub struct Histogram {
    bucket_limits: Cow<'static, [f64]>,
    buckets: Vec<f64>,
    min: f64,
    max: f64,
    num: f64,
    sum: f64,
    sum_squares: f64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        let limits = default_bucket_limits();
        Self {
            buckets: vec![0.0; limits.len()],
            bucket_limits: Cow::Borrowed(limits),
            min: f64::MAX,
            max: -f64::MAX,
            num: 0.0,
            sum: 0.0,
            sum_squares: 0.0,
        }
    }

    /// Builds a histogram over caller-supplied edges.
    ///
    /// Edges must be non-empty, strictly increasing, and free of NaN.
    pub fn with_limits(limits: Vec<f64>) -> Result<Self, SummaryError> {
        if limits.is_empty() {
            return Err(SummaryError::InvalidBucketLimits("must be non-empty"));
        }
        if limits.iter().any(|limit| limit.is_nan()) {
            return Err(SummaryError::InvalidBucketLimits("must not contain NaN"));
        }
        if limits.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SummaryError::InvalidBucketLimits(
                "must be strictly increasing",
            ));
        }
        Ok(Self {
            buckets: vec![0.0; limits.len()],
            bucket_limits: Cow::Owned(limits),
            min: f64::MAX,
            max: -f64::MAX,
            num: 0.0,
            sum: 0.0,
            sum_squares: 0.0,
        })
    }

    pub fn add(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.num += 1.0;
        self.sum += value;
        self.sum_squares += value * value;

        // Upper-bound search: first edge strictly greater than `value`.
        // A value beyond every edge (only f64::MAX can get here) is clamped
        // into the final bucket.
        let bucket = self
            .bucket_limits
            .partition_point(|&limit| limit <= value)
            .min(self.buckets.len() - 1);
        self.buckets[bucket] += 1.0;
    }

    pub fn count(&self) -> f64 {
        self.num
    }

    /// Exports the accumulated state, collapsing runs of consecutive empty
    /// buckets into a single widened pair so the fixed table does not bloat
    /// the serialized record.
    pub fn to_record(&self) -> HistogramRecord {
        let mut record = HistogramRecord {
            min: self.min,
            max: self.max,
            num: self.num,
            sum: self.sum,
            sum_squares: self.sum_squares,
            bucket_limit: Vec::new(),
            bucket: Vec::new(),
        };

        for (i, &count) in self.buckets.iter().enumerate() {
            let prev_empty = record.bucket.last().is_some_and(|&c| c == 0.0);
            if count == 0.0 && prev_empty {
                if let Some(last_limit) = record.bucket_limit.last_mut() {
                    *last_limit = self.bucket_limits[i];
                }
            } else {
                record.bucket.push(count);
                record.bucket_limit.push(self.bucket_limits[i]);
            }
        }

        // At least one pair, even when nothing was added.
        if record.bucket.is_empty() {
            record.bucket.push(0.0);
            record.bucket_limit.push(f64::MAX);
        }

        record
    }
}
