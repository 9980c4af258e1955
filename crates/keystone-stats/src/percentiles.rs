use serde::{Deserialize, Serialize};

/// Percentile points stored for every reference feature.
///
/// The set covers both the tails used by data-driven thresholds (P05, P95, P99)
/// and the tercile/quartile points used by gate rules and risk calibration.
pub const STANDARD_POINTS: [f32; 11] = [
    5.0, 10.0, 25.0, 33.0, 50.0, 66.0, 75.0, 80.0, 90.0, 95.0, 99.0,
];

/// Precomputed percentile values for a dataset.
///
/// This structure stores percentile-value pairs for efficient lookup
/// of commonly used percentile points.
///
/// # Examples
///
/// ```
/// use keystone_stats::percentiles::Percentiles;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
///
/// assert_eq!(percentiles.get(50.0), Some(6.0));
/// assert_eq!(percentiles.get(25.0), Some(3.0));
/// assert_eq!(percentiles.sample_count(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// Percentile-value pairs, sorted by percentile.
    values: Vec<(f32, f32)>,
    /// Number of observations the percentiles were computed from.
    sample_count: usize,
}

impl Percentiles {
    /// Computes percentiles from values sorted in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f32], percentile_points: &[f32]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let mut values = percentile_points
            .iter()
            .map(|&p| (p, compute_percentile(sorted_values, p)))
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            values,
            sample_count: sorted_values.len(),
        }
    }

    /// Computes percentiles from unsorted values.
    ///
    /// NaN values are discarded before sorting; they carry no ordering information.
    ///
    /// # Examples
    ///
    /// ```
    /// use keystone_stats::percentiles::Percentiles;
    ///
    /// let values = vec![5.0, f32::NAN, 2.0, 8.0, 1.0, 9.0];
    /// let percentiles = Percentiles::new(&values, &[50.0]);
    ///
    /// assert_eq!(percentiles.get(50.0), Some(5.0));
    /// assert_eq!(percentiles.sample_count(), 5);
    /// ```
    #[must_use]
    pub fn new(values: &[f32], percentile_points: &[f32]) -> Self {
        let mut sorted = values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect::<Vec<_>>();
        sorted.sort_by(f32::total_cmp);
        Self::from_sorted(&sorted, percentile_points)
    }

    /// Gets the value at a specific percentile.
    ///
    /// Returns `None` if the percentile was not precomputed or the dataset was empty.
    #[must_use]
    pub fn get(&self, percentile: f32) -> Option<f32> {
        self.values.iter().find_map(|(p, value)| {
            ((*p - percentile).abs() < f32::EPSILON && !value.is_nan()).then_some(*value)
        })
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Returns an iterator over all (percentile, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.values.iter().copied()
    }
}

/// Computes a single percentile value from sorted data.
///
/// This function uses the nearest-rank method. For a dataset with n values,
/// the k-th percentile is the value at position `floor(n * k / 100)`.
///
/// Returns `f32::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use keystone_stats::percentiles::compute_percentile;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_percentile(&values, 50.0), 3.0);
/// assert_eq!(compute_percentile(&values, 25.0), 2.0);
/// assert!(compute_percentile(&[], 50.0).is_nan());
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f32], percentile: f32) -> f32 {
    if sorted_values.is_empty() {
        return f32::NAN;
    }
    let idx = ((sorted_values.len() as f32 * percentile) / 100.0) as usize;
    let idx = idx.min(sorted_values.len() - 1);
    sorted_values[idx]
}

/// Computes the median of unsorted values, averaging the two middle values
/// for even-sized datasets.
///
/// NaN values are ignored. Returns `None` when no value remains.
///
/// # Examples
///
/// ```
/// use keystone_stats::percentiles::median;
///
/// assert_eq!(median([3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median([4.0, 1.0, 3.0, 2.0]), Some(2.5));
/// assert_eq!(median(std::iter::empty::<f32>()), None);
/// ```
#[must_use]
pub fn median<I>(values: I) -> Option<f32>
where
    I: IntoIterator<Item = f32>,
{
    let mut sorted = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f32::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}
