//! Fixed-width bucketing with gap filling
//!
//! Values are assigned to contiguous, equally wide buckets. Per-bucket
//! aggregates (for example a median) are often missing for sparse buckets,
//! so [`fill_gaps`] turns a sparse series of observations into a dense one,
//! recording how every entry was obtained.
//!
//! # Examples
//!
//! ```
//! use keystone_stats::buckets::{BucketValue, FixedBuckets, fill_gaps};
//!
//! let buckets = FixedBuckets::new(0.10, 0.05, 6).unwrap();
//! assert_eq!(buckets.index_of(0.12), 0);
//! assert_eq!(buckets.index_of(0.27), 3);
//! assert_eq!(buckets.index_of(0.90), 5); // clamped to the last bucket
//!
//! let filled = fill_gaps(&[Some(1.0), None, Some(3.0)]);
//! assert_eq!(filled[1], BucketValue::Interpolated(2.0));
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum BucketLayoutError {
    #[display("bucket layout needs at least one bucket")]
    NoBuckets,
    #[display("bucket width must be positive and finite (got {width})")]
    InvalidWidth { width: f32 },
    #[display("bucket start must be finite (got {start})")]
    InvalidStart { start: f32 },
}

/// Contiguous, equally wide buckets starting at `start`.
///
/// Bucket `i` covers `[start + i * width, start + (i + 1) * width)`. Values below
/// the first bucket or above the last one are clamped to the nearest bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFixedBuckets")]
pub struct FixedBuckets {
    start: f32,
    width: f32,
    count: usize,
}

#[derive(Deserialize)]
struct RawFixedBuckets {
    start: f32,
    width: f32,
    count: usize,
}

impl TryFrom<RawFixedBuckets> for FixedBuckets {
    type Error = BucketLayoutError;

    fn try_from(raw: RawFixedBuckets) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.width, raw.count)
    }
}

impl FixedBuckets {
    pub fn new(start: f32, width: f32, count: usize) -> Result<Self, BucketLayoutError> {
        if count == 0 {
            return Err(BucketLayoutError::NoBuckets);
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(BucketLayoutError::InvalidWidth { width });
        }
        if !start.is_finite() {
            return Err(BucketLayoutError::InvalidStart { start });
        }
        Ok(Self {
            start,
            width,
            count,
        })
    }

    #[must_use]
    pub fn start(&self) -> f32 {
        self.start
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Upper bound of the last bucket.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn end(&self) -> f32 {
        self.start + self.width * self.count as f32
    }

    /// Index of the bucket containing `value`, clamped to the layout.
    ///
    /// A tiny tolerance absorbs floating point noise on bucket edges, so
    /// `0.15` lands in the bucket starting at `0.15` even when computed as
    /// `0.10 + 0.05`.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    #[must_use]
    pub fn index_of(&self, value: f32) -> usize {
        const EDGE_TOLERANCE: f32 = 1e-5;
        let offset = (value - self.start) / self.width + EDGE_TOLERANCE;
        if offset.is_nan() || offset <= 0.0 {
            return 0;
        }
        let idx = offset.floor();
        if idx >= self.count as f32 {
            self.count - 1
        } else {
            idx as usize
        }
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn range(&self, index: usize) -> Range<f32> {
        let lo = self.start + self.width * index as f32;
        lo..lo + self.width
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<f32>> + '_ {
        (0..self.count).map(|i| self.range(i))
    }
}

/// A per-bucket aggregate after gap filling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum BucketValue {
    /// Computed directly from observations in the bucket.
    Observed(f32),
    /// Linearly interpolated between the nearest observed buckets on both sides.
    Interpolated(f32),
    /// Copied from the nearest observed bucket; only one side had data.
    Nearest(f32),
    /// No bucket had any observation.
    Unusable,
}

impl BucketValue {
    #[must_use]
    pub fn value(self) -> Option<f32> {
        match self {
            Self::Observed(v) | Self::Interpolated(v) | Self::Nearest(v) => Some(v),
            Self::Unusable => None,
        }
    }

    /// Whether the value was estimated from neighbors instead of observed or interpolated.
    #[must_use]
    pub fn is_estimated(self) -> bool {
        matches!(self, Self::Nearest(_))
    }
}

/// Fills missing per-bucket aggregates from their neighbors.
///
/// # Algorithm
///
/// For each bucket without an observation:
///
/// 1. If observed buckets exist on both sides, interpolate linearly between the
///    nearest ones.
/// 2. If only one side has an observed bucket, copy the nearest one.
/// 3. If no bucket was observed at all, mark the bucket unusable.
///
/// # Examples
///
/// ```
/// use keystone_stats::buckets::{BucketValue, fill_gaps};
///
/// let filled = fill_gaps(&[None, Some(2.0), None, None, Some(8.0), None]);
/// assert_eq!(filled[0], BucketValue::Nearest(2.0));
/// assert_eq!(filled[2], BucketValue::Interpolated(4.0));
/// assert_eq!(filled[3], BucketValue::Interpolated(6.0));
/// assert_eq!(filled[5], BucketValue::Nearest(8.0));
///
/// assert_eq!(fill_gaps(&[None, None]), vec![BucketValue::Unusable; 2]);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn fill_gaps(observed: &[Option<f32>]) -> Vec<BucketValue> {
    (0..observed.len())
        .map(|i| {
            if let Some(v) = observed[i] {
                return BucketValue::Observed(v);
            }
            let lower = observed[..i]
                .iter()
                .enumerate()
                .rev()
                .find_map(|(j, v)| v.map(|v| (j, v)));
            let upper = observed[i + 1..]
                .iter()
                .enumerate()
                .find_map(|(j, v)| v.map(|v| (i + 1 + j, v)));
            match (lower, upper) {
                (Some((lo_idx, lo_val)), Some((hi_idx, hi_val))) => {
                    let ratio = (i - lo_idx) as f32 / (hi_idx - lo_idx) as f32;
                    BucketValue::Interpolated(lo_val + ratio * (hi_val - lo_val))
                }
                (Some((_, v)), None) | (None, Some((_, v))) => BucketValue::Nearest(v),
                (None, None) => BucketValue::Unusable,
            }
        })
        .collect()
}
