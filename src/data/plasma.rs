//! Sampled input functions
//!
//! A [`TimeActivityCurve`] is a plasma (or whole-blood) activity concentration
//! sampled at increasing times. Between samples the curve is piecewise
//! linear. Before the first sample it is zero (no tracer before injection),
//! after the last sample it keeps the last sampled value.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::auc::{auc_interval, interpolate_linear, AUCMethod};

/// Errors in sampled curve data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlasmaDataError {
    /// The curve has no samples
    #[error("Plasma data contains no samples")]
    Empty,

    /// Sample times do not strictly increase
    #[error("Plasma sample {index} at time {time} does not follow the previous sample at {previous}")]
    UnsortedTimes {
        index: usize,
        time: f64,
        previous: f64,
    },

    /// A time or value is NaN or infinite
    #[error("Plasma sample {index} is not finite (time {time}, value {value})")]
    NonFinite { index: usize, time: f64, value: f64 },

    /// Parallel arrays of different lengths
    #[error("Array length mismatch: {times} times, {values} values")]
    LengthMismatch { times: usize, values: usize },

    /// A plasma file line or record could not be interpreted
    #[error("Malformed plasma data: {0}")]
    Malformed(String),
}

/// One measured sample of the input function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlasmaSample {
    /// Sample time in seconds
    pub time: f64,
    /// Plasma activity concentration
    pub plasma: f64,
    /// Whole-blood activity concentration, when measured
    #[serde(default)]
    pub blood: Option<f64>,
}

impl PlasmaSample {
    pub fn new(time: f64, plasma: f64) -> Self {
        PlasmaSample {
            time,
            plasma,
            blood: None,
        }
    }

    pub fn with_blood(mut self, blood: f64) -> Self {
        self.blood = Some(blood);
        self
    }
}

/// Activity concentration curve of the input function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PlasmaSample>", into = "Vec<PlasmaSample>")]
pub struct TimeActivityCurve {
    times: Vec<f64>,
    values: Vec<f64>,
    blood: Option<Vec<f64>>,
}

impl TimeActivityCurve {
    /// Build from samples, which must have finite, strictly increasing times
    ///
    /// The whole-blood curve is kept only if every sample carries a blood value.
    pub fn new(samples: Vec<PlasmaSample>) -> Result<Self, PlasmaDataError> {
        if samples.is_empty() {
            return Err(PlasmaDataError::Empty);
        }

        for (index, sample) in samples.iter().enumerate() {
            let blood_ok = sample.blood.map_or(true, f64::is_finite);
            if !sample.time.is_finite() || !sample.plasma.is_finite() || !blood_ok {
                return Err(PlasmaDataError::NonFinite {
                    index,
                    time: sample.time,
                    value: sample.plasma,
                });
            }
            if index > 0 && sample.time <= samples[index - 1].time {
                return Err(PlasmaDataError::UnsortedTimes {
                    index,
                    time: sample.time,
                    previous: samples[index - 1].time,
                });
            }
        }

        let blood = samples
            .iter()
            .map(|s| s.blood)
            .collect::<Option<Vec<f64>>>();

        Ok(TimeActivityCurve {
            times: samples.iter().map(|s| s.time).collect(),
            values: samples.iter().map(|s| s.plasma).collect(),
            blood,
        })
    }

    /// Build a plasma-only curve from parallel arrays
    pub fn from_arrays(times: &[f64], values: &[f64]) -> Result<Self, PlasmaDataError> {
        if times.len() != values.len() {
            return Err(PlasmaDataError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        Self::new(
            times
                .iter()
                .zip(values)
                .map(|(&t, &v)| PlasmaSample::new(t, v))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The whole-blood curve sampled at the same times, if it was measured
    pub fn blood_curve(&self) -> Option<TimeActivityCurve> {
        self.blood.as_ref().map(|blood| TimeActivityCurve {
            times: self.times.clone(),
            values: blood.clone(),
            blood: None,
        })
    }

    /// Concentration at `time`
    pub fn value_at(&self, time: f64) -> f64 {
        if time < self.times[0] {
            return 0.0;
        }
        interpolate_linear(&self.times, &self.values, time)
    }

    /// Integral of the curve over `[start, end]`; negative when `end < start`
    pub fn integral(&self, start: f64, end: f64, method: &AUCMethod) -> f64 {
        if end < start {
            return -self.integral(end, start, method);
        }

        let last = self.times[self.times.len() - 1];

        let covered = auc_interval(&self.times, &self.values, start, end, method);
        // Constant tail after the last sample
        let tail_start = start.max(last);
        let tail = if end > tail_start {
            (end - tail_start) * self.values[self.values.len() - 1]
        } else {
            0.0
        };
        covered + tail
    }

    /// Average concentration over `[start, end]`
    ///
    /// For an empty interval this is the value at `start`.
    pub fn mean_over(&self, start: f64, end: f64, method: &AUCMethod) -> f64 {
        let duration = end - start;
        if duration <= 0.0 {
            return self.value_at(start);
        }
        self.integral(start, end, method) / duration
    }

    /// Feed the exact bit patterns of the samples into `state`
    pub(crate) fn fingerprint<H: Hasher>(&self, state: &mut H) {
        for (t, v) in self.times.iter().zip(&self.values) {
            t.to_bits().hash(state);
            v.to_bits().hash(state);
        }
    }
}

impl TryFrom<Vec<PlasmaSample>> for TimeActivityCurve {
    type Error = PlasmaDataError;

    fn try_from(samples: Vec<PlasmaSample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<TimeActivityCurve> for Vec<PlasmaSample> {
    fn from(curve: TimeActivityCurve) -> Self {
        (0..curve.len())
            .map(|i| PlasmaSample {
                time: curve.times[i],
                plasma: curve.values[i],
                blood: curve.blood.as_ref().map(|b| b[i]),
            })
            .collect()
    }
}
