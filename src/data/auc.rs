//! Trapezoidal integration primitives
//!
//! Standalone functions on raw `&[f64]` slices, used by
//! [`TimeActivityCurve`](crate::data::TimeActivityCurve) to integrate an input
//! function between arbitrary times.
//!
//! ```rust
//! use petkin::data::auc::{auc_interval, interpolate_linear, AUCMethod};
//!
//! let times = [0.0, 1.0, 2.0, 4.0, 8.0];
//! let concs = [0.0, 10.0, 8.0, 4.0, 2.0];
//!
//! let partial = auc_interval(&times, &concs, 1.0, 4.0, &AUCMethod::Linear);
//! assert!((partial - 21.0).abs() < 1e-10);
//! assert!((interpolate_linear(&times, &concs, 3.0) - 6.0).abs() < 1e-10);
//! ```

use serde::{Deserialize, Serialize};

/// Trapezoidal rule variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AUCMethod {
    /// Linear trapezoid on every segment
    #[default]
    Linear,
    /// Linear on rising segments, log-linear on falling ones
    LinUpLogDown,
}

// ============================================================================
// Segment-level helpers
// ============================================================================

#[inline]
fn use_log_linear(c1: f64, c2: f64) -> bool {
    c2 < c1 && c1 > 0.0 && c2 > 0.0 && ((c1 / c2) - 1.0).abs() >= 1e-10
}

#[inline]
fn auc_linear(c1: f64, c2: f64, dt: f64) -> f64 {
    (c1 + c2) / 2.0 * dt
}

/// Assumes c1 > c2 > 0
#[inline]
fn auc_log(c1: f64, c2: f64, dt: f64) -> f64 {
    (c1 - c2) * dt / (c1 / c2).ln()
}

/// Area of a single segment; zero when `t2 <= t1`
#[inline]
pub fn auc_segment(t1: f64, c1: f64, t2: f64, c2: f64, method: &AUCMethod) -> f64 {
    let dt = t2 - t1;
    if dt <= 0.0 {
        return 0.0;
    }

    match method {
        AUCMethod::Linear => auc_linear(c1, c2, dt),
        AUCMethod::LinUpLogDown => {
            if use_log_linear(c1, c2) {
                auc_log(c1, c2, dt)
            } else {
                auc_linear(c1, c2, dt)
            }
        }
    }
}

// ============================================================================
// Profile functions
// ============================================================================

/// Area under the sampled profile between `start` and `end`
///
/// Boundaries that fall between samples are linearly interpolated. Only the
/// part of `[start, end]` covered by the samples contributes; callers handle
/// extrapolation. Returns 0 when `end <= start`.
///
/// # Panics
/// Panics if `times.len() != values.len()`.
pub fn auc_interval(times: &[f64], values: &[f64], start: f64, end: f64, method: &AUCMethod) -> f64 {
    assert_eq!(
        times.len(),
        values.len(),
        "times and values must have equal length"
    );

    if end <= start || times.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 1..times.len() {
        let t1 = times[i - 1];
        let t2 = times[i];

        // Segments entirely outside the interval
        if t2 <= start || t1 >= end {
            continue;
        }

        let seg_start = t1.max(start);
        let seg_end = t2.min(end);

        let c1 = if t1 < start {
            interpolate_linear(times, values, start)
        } else {
            values[i - 1]
        };
        let c2 = if t2 > end {
            interpolate_linear(times, values, end)
        } else {
            values[i]
        };

        total += auc_segment(seg_start, c1, seg_end, c2, method);
    }
    total
}

/// Linearly interpolated value at `time`, clamped to the first/last sample
///
/// # Panics
/// Panics if `times.len() != values.len()`.
pub fn interpolate_linear(times: &[f64], values: &[f64], time: f64) -> f64 {
    assert_eq!(
        times.len(),
        values.len(),
        "times and values must have equal length"
    );

    if times.is_empty() {
        return 0.0;
    }
    if time <= times[0] {
        return values[0];
    }
    let last = times.len() - 1;
    if time >= times[last] {
        return values[last];
    }

    let upper = times.partition_point(|&t| t < time);
    let lower = upper.saturating_sub(1);

    let (t1, t2) = (times[lower], times[upper]);
    let (v1, v2) = (values[lower], values[upper]);

    if (t2 - t1).abs() < 1e-10 {
        v1
    } else {
        v1 + (v2 - v1) * (time - t1) / (t2 - t1)
    }
}
