//! Temporal binning of a dynamic acquisition
//!
//! [`TimeFrameDefinitions`] holds an ordered list of non-overlapping time
//! intervals ("frames"). Frames are numbered from 1, matching the numbering
//! used in frame-definition files and scanner headers.
//!
//! # Frame-definition text format
//!
//! Whitespace separated `(count, duration)` pairs. Each pair appends `count`
//! contiguous frames of length `duration` seconds. A count of `0` advances the
//! clock by `duration` without creating a frame, which is how a dead period at
//! the start (or in the middle) of an acquisition is described.
//!
//! ```rust
//! use petkin::data::TimeFrameDefinitions;
//!
//! let frames = TimeFrameDefinitions::parse("0 10.0\n2 5.0").unwrap();
//! assert_eq!(frames.num_frames(), 2);
//! assert_eq!(frames.start_time(1), 10.0);
//! assert_eq!(frames.end_time(2), 20.0);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::KineticError;

/// Largest frame count accepted in one `(count, duration)` entry
pub const MAX_FRAMES_PER_ENTRY: i64 = 1_000_000;

/// Errors describing malformed or inconsistent frame definitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameDefinitionError {
    /// A `(count, duration)` entry with a count outside `0..=MAX_FRAMES_PER_ENTRY`
    /// or a non-positive duration
    #[error("Reading frame definitions from {source_name}: invalid entry ({count}, {duration})")]
    InvalidEntry {
        source_name: String,
        count: i64,
        duration: f64,
    },

    /// A frame starts before the previous frame ends
    #[error("Frame {frame} start time ({start}) is smaller than previous end time ({previous_end})")]
    Overlap {
        frame: usize,
        start: f64,
        previous_end: f64,
    },

    /// A frame ends before it starts
    #[error("Frame {frame} start time ({start}) is larger than end time ({end})")]
    NegativeDuration { frame: usize, start: f64, end: f64 },

    /// A frame boundary is NaN or infinite
    #[error("Frame {frame} has a non-finite boundary ({start}, {end})")]
    NonFinite { frame: usize, start: f64, end: f64 },
}

/// A single time interval, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeFrame {
    start: f64,
    end: f64,
}

impl TimeFrame {
    pub(crate) fn new(start: f64, end: f64) -> Self {
        TimeFrame { start, end }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Time of the centre of the frame
    pub fn mid(&self) -> f64 {
        0.5 * (self.start + self.end)
    }

    /// The same frame moved by `shift` seconds
    pub fn shifted(&self, shift: f64) -> Self {
        TimeFrame::new(self.start + shift, self.end + shift)
    }
}

/// Ordered, non-overlapping time frames of a dynamic acquisition
///
/// Invariants, checked on construction and never broken afterwards:
/// - every frame has `start <= end`
/// - consecutive frames do not overlap: `start(i + 1) >= end(i)` (gaps are allowed)
///
/// An empty definition is valid but cannot be used to build a kinetic model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct TimeFrameDefinitions {
    frames: Vec<TimeFrame>,
}

impl TimeFrameDefinitions {
    /// Parse the frame-definition text format
    ///
    /// Reading stops at the first token pair that cannot be parsed; this is
    /// the normal end of input, not an error.
    pub fn parse(text: &str) -> Result<Self, FrameDefinitionError> {
        Self::parse_named(text, "<string>")
    }

    /// Read a frame-definition file
    pub fn read(path: impl AsRef<Path>) -> Result<Self, KineticError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| KineticError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse_named(&text, &path.display().to_string())?)
    }

    fn parse_named(text: &str, source_name: &str) -> Result<Self, FrameDefinitionError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut frames = Vec::new();
        let mut previous_end_time = 0.0;
        let mut consumed = 0;

        for pair in tokens.chunks(2) {
            let [count, duration] = pair else {
                break;
            };
            let (Ok(count), Ok(duration)) = (count.parse::<i64>(), duration.parse::<f64>()) else {
                break;
            };
            consumed += 2;

            let count_in_range = (0..=MAX_FRAMES_PER_ENTRY).contains(&count);
            if !count_in_range || !(duration > 0.0 && duration.is_finite()) {
                return Err(FrameDefinitionError::InvalidEntry {
                    source_name: source_name.to_string(),
                    count,
                    duration,
                });
            }

            // A zero count skips a period without storing a frame
            if count == 0 {
                let start = previous_end_time;
                previous_end_time += duration;
                if !previous_end_time.is_finite() {
                    return Err(FrameDefinitionError::NonFinite {
                        frame: frames.len() + 1,
                        start,
                        end: previous_end_time,
                    });
                }
            }
            for _ in 0..count {
                let start = previous_end_time;
                previous_end_time += duration;
                if !previous_end_time.is_finite() {
                    return Err(FrameDefinitionError::NonFinite {
                        frame: frames.len() + 1,
                        start,
                        end: previous_end_time,
                    });
                }
                frames.push(TimeFrame::new(start, previous_end_time));
            }
        }

        if consumed < tokens.len() {
            warn!(
                source = source_name,
                "frame definitions contain trailing unparseable tokens; ignoring them"
            );
        }
        debug!(source = source_name, frames = frames.len(), "parsed frame definitions");

        Ok(TimeFrameDefinitions { frames })
    }

    /// Build from explicit `(start, end)` pairs, checking temporal consistency
    pub fn from_intervals(intervals: Vec<(f64, f64)>) -> Result<Self, FrameDefinitionError> {
        let frames: Vec<TimeFrame> = intervals
            .into_iter()
            .map(|(start, end)| TimeFrame::new(start, end))
            .collect();

        let mut previous_end: Option<f64> = None;
        for (index, frame) in frames.iter().enumerate() {
            let frame_num = index + 1;
            if !frame.start.is_finite() || !frame.end.is_finite() {
                return Err(FrameDefinitionError::NonFinite {
                    frame: frame_num,
                    start: frame.start,
                    end: frame.end,
                });
            }
            if let Some(previous_end) = previous_end {
                if previous_end > frame.start {
                    return Err(FrameDefinitionError::Overlap {
                        frame: frame_num,
                        start: frame.start,
                        previous_end,
                    });
                }
            }
            if frame.start > frame.end {
                return Err(FrameDefinitionError::NegativeDuration {
                    frame: frame_num,
                    start: frame.start,
                    end: frame.end,
                });
            }
            previous_end = Some(frame.end);
        }

        Ok(TimeFrameDefinitions { frames })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame `frame_num` (1-based)
    ///
    /// # Panics
    /// Panics if `frame_num` is 0 or larger than [`num_frames`](Self::num_frames).
    pub fn frame(&self, frame_num: usize) -> &TimeFrame {
        assert!(
            frame_num >= 1 && frame_num <= self.num_frames(),
            "frame number {} out of range 1..={}",
            frame_num,
            self.num_frames()
        );
        &self.frames[frame_num - 1]
    }

    pub fn start_time(&self, frame_num: usize) -> f64 {
        self.frame(frame_num).start
    }

    pub fn end_time(&self, frame_num: usize) -> f64 {
        self.frame(frame_num).end
    }

    pub fn duration(&self, frame_num: usize) -> f64 {
        self.end_time(frame_num) - self.start_time(frame_num)
    }

    /// Start of the first frame
    pub fn acquisition_start(&self) -> f64 {
        self.start_time(1)
    }

    /// End of the last frame
    pub fn acquisition_end(&self) -> f64 {
        self.end_time(self.num_frames())
    }

    /// Number of the frame with exactly these boundaries, within `1e-3` s
    pub fn frame_num(&self, start: f64, end: f64) -> Option<usize> {
        const TOLERANCE: f64 = 1e-3;
        self.frames
            .iter()
            .position(|f| (f.start - start).abs() < TOLERANCE && (f.end - end).abs() < TOLERANCE)
            .map(|index| index + 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeFrame> {
        self.frames.iter()
    }
}

impl TryFrom<Vec<(f64, f64)>> for TimeFrameDefinitions {
    type Error = FrameDefinitionError;

    fn try_from(intervals: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::from_intervals(intervals)
    }
}

impl From<TimeFrameDefinitions> for Vec<(f64, f64)> {
    fn from(definitions: TimeFrameDefinitions) -> Self {
        definitions
            .frames
            .iter()
            .map(|f| (f.start, f.end))
            .collect()
    }
}

impl FromStr for TimeFrameDefinitions {
    type Err = FrameDefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Writes the frame-definition text format
///
/// Contiguous frames of equal duration are written as one entry, gaps as
/// zero-count entries. Zero-duration frames cannot be represented and are
/// skipped.
impl fmt::Display for TimeFrameDefinitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clock = 0.0;
        let mut run: Option<(usize, f64)> = None;

        for frame in self.frames.iter().filter(|frame| frame.duration() > 0.0) {
            let gap = frame.start - clock;
            let continues_run = gap.abs() < 1e-9
                && run.is_some_and(|(_, duration)| (duration - frame.duration()).abs() < 1e-9);

            if continues_run {
                if let Some((count, _)) = run.as_mut() {
                    *count += 1;
                }
            } else {
                if let Some((count, duration)) = run.take() {
                    writeln!(f, "{} {}", count, duration)?;
                }
                if gap > 1e-9 {
                    writeln!(f, "0 {}", gap)?;
                }
                run = Some((1, frame.duration()));
            }
            clock = frame.end;
        }

        if let Some((count, duration)) = run {
            writeln!(f, "{} {}", count, duration)?;
        }
        Ok(())
    }
}
