use serde::Serialize;

/// Nearest-rank quartiles of an integer sample.
///
/// `q1` and `q3` are taken at the sorted indices `n / 4` and `3 * n / 4`
/// without interpolation; `median` averages the two middle values when `n`
/// is even.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: u64,
    pub median: f64,
    pub q3: u64,
}

impl Quartiles {
    /// Compute the quartiles of an ascending slice.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_sorted(sorted: &[u64]) -> Option<Self> {
        debug_assert!(sorted.is_sorted());
        let n_vals = sorted.len();
        if n_vals == 0 {
            return None;
        }
        let median = if n_vals % 2 == 1 {
            sorted[n_vals / 2] as f64
        } else {
            (sorted[n_vals / 2 - 1] as f64 + sorted[n_vals / 2] as f64) / 2.0
        };
        Some(Self {
            q1: sorted[n_vals / 4],
            median,
            q3: sorted[3 * n_vals / 4],
        })
    }

    pub fn iqr(&self) -> u64 {
        self.q3 - self.q1
    }

    /// Tukey fences `[q1 - k * iqr, q3 + k * iqr]`.
    pub fn fences(&self, k: f64) -> Fences {
        let iqr = self.iqr() as f64;
        Fences {
            lower: self.q1 as f64 - k * iqr,
            upper: self.q3 as f64 + k * iqr,
        }
    }
}

/// Closed interval outside of which a value is an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fences {
    pub lower: f64,
    pub upper: f64,
}

impl Fences {
    /// Boundary values are inside.
    pub fn contains(&self, val: f64) -> bool {
        self.lower <= val && val <= self.upper
    }
}

pub fn compute_mean(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    Some(vals.iter().sum::<f64>() / vals.len() as f64)
}

/// Median of an unsorted sample, NaN-free input expected.
pub fn compute_median(vals: &[f64]) -> Option<f64> {
    let mut sorted = vals.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n_vals = sorted.len();
    match n_vals {
        0 => None,
        _ if n_vals % 2 == 1 => Some(sorted[n_vals / 2]),
        _ => Some((sorted[n_vals / 2 - 1] + sorted[n_vals / 2]) / 2.0),
    }
}

/// Percentile `pct` (0 to 1) of an ascending slice, linearly interpolated
/// between neighbouring ranks.
pub fn percentile_of_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = pct.clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(last);
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Pad a value range by 15%, or by a fixed amount when the range is flat.
pub fn padded_range(min_val: f64, max_val: f64) -> (f64, f64) {
    let (min, max) = if min_val <= max_val {
        (min_val, max_val)
    } else {
        (max_val, min_val)
    };
    let range = max - min;
    let padding = if range < 1e-6 { 0.5 } else { range * 0.15 };
    (min - padding, max + padding)
}
