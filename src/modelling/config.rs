//! Patlak plot parameters
//!
//! The same settings can come from a keyword block
//!
//! ```text
//! Patlak Plot Parameters:=
//! time frame definition filename := frames.txt
//! starting frame := 23
//! calibration factor := 9000
//! blood data filename := blood_file.txt
//! Time Shift := 0
//! In total counts := 1
//! end Patlak Plot Parameters:=
//! ```
//!
//! or from the equivalent JSON object with snake_case field names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::patlak::{PatlakOptions, PlasmaSampling};
use crate::data::parser::{read_plasma_data, KeyMap};
use crate::data::{AUCMethod, TimeActivityCurve, TimeFrameDefinitions};
use crate::KineticError;

const FRAMES_KEY: &str = "time frame definition filename";
const STARTING_FRAME_KEY: &str = "starting frame";
const CALIBRATION_KEY: &str = "calibration factor";
const BLOOD_KEY: &str = "blood data filename";
const TIME_SHIFT_KEY: &str = "time shift";
const TOTAL_COUNTS_KEY: &str = "in total counts";
const SAMPLING_KEY: &str = "plasma sampling";
const INTEGRATION_KEY: &str = "integration method";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatlakConfig {
    pub time_frame_definition_filename: Option<PathBuf>,
    pub starting_frame: usize,
    pub calibration_factor: f64,
    pub blood_data_filename: Option<PathBuf>,
    pub time_shift: f64,
    pub in_total_counts: bool,
    pub plasma_sampling: PlasmaSampling,
    pub integration_method: AUCMethod,
}

impl Default for PatlakConfig {
    fn default() -> Self {
        let options = PatlakOptions::default();
        PatlakConfig {
            time_frame_definition_filename: None,
            starting_frame: options.starting_frame,
            calibration_factor: options.calibration_factor,
            blood_data_filename: None,
            time_shift: options.time_shift,
            in_total_counts: options.in_total_counts,
            plasma_sampling: options.plasma_sampling,
            integration_method: options.integration,
        }
    }
}

impl PatlakConfig {
    pub fn from_keymap(keymap: &KeyMap) -> Result<Self, KineticError> {
        let mut config = PatlakConfig::default();

        for key in keymap.keys() {
            match key {
                FRAMES_KEY | STARTING_FRAME_KEY | CALIBRATION_KEY | BLOOD_KEY | TIME_SHIFT_KEY
                | TOTAL_COUNTS_KEY | SAMPLING_KEY | INTEGRATION_KEY => {}
                unknown => warn!(key = unknown, "ignoring unrecognised Patlak parameter"),
            }
        }

        if let Some(path) = keymap.get(FRAMES_KEY).filter(|v| !v.is_empty()) {
            config.time_frame_definition_filename = Some(PathBuf::from(path));
        }
        if let Some(path) = keymap.get(BLOOD_KEY).filter(|v| !v.is_empty()) {
            config.blood_data_filename = Some(PathBuf::from(path));
        }
        if let Some(starting_frame) = keymap.parse_value(STARTING_FRAME_KEY)? {
            config.starting_frame = starting_frame;
        }
        if let Some(factor) = keymap.parse_value(CALIBRATION_KEY)? {
            config.calibration_factor = factor;
        }
        if let Some(shift) = keymap.parse_value(TIME_SHIFT_KEY)? {
            config.time_shift = shift;
        }
        if let Some(flag) = keymap.parse_flag(TOTAL_COUNTS_KEY)? {
            config.in_total_counts = flag;
        }
        if let Some(sampling) = keymap.parse_value(SAMPLING_KEY)? {
            config.plasma_sampling = sampling;
        }
        if let Some(method) = keymap.get(INTEGRATION_KEY) {
            config.integration_method = parse_integration_method(method)?;
        }

        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, KineticError> {
        serde_json::from_str(text)
            .map_err(|e| KineticError::InvalidConfiguration(format!("Patlak JSON parameters: {}", e)))
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self, KineticError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| KineticError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, KineticError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| KineticError::InvalidConfiguration(e.to_string()))
    }

    pub fn options(&self) -> PatlakOptions {
        PatlakOptions {
            starting_frame: self.starting_frame,
            calibration_factor: self.calibration_factor,
            time_shift: self.time_shift,
            in_total_counts: self.in_total_counts,
            plasma_sampling: self.plasma_sampling,
            integration: self.integration_method,
        }
    }

    /// Read the frame definitions and the input function
    ///
    /// Relative paths are taken from `base_dir` when given.
    pub fn load(
        &self,
        base_dir: Option<&Path>,
    ) -> Result<(TimeFrameDefinitions, TimeActivityCurve), KineticError> {
        let frames_path = required(&self.time_frame_definition_filename, FRAMES_KEY)?;
        let blood_path = required(&self.blood_data_filename, BLOOD_KEY)?;

        let frames = TimeFrameDefinitions::read(resolve(frames_path, base_dir))?;
        let plasma = read_plasma_data(resolve(blood_path, base_dir))?;
        debug!(
            frames = frames.num_frames(),
            samples = plasma.len(),
            "loaded Patlak inputs"
        );
        Ok((frames, plasma))
    }
}

fn required<'a>(value: &'a Option<PathBuf>, key: &str) -> Result<&'a Path, KineticError> {
    value
        .as_deref()
        .ok_or_else(|| KineticError::InvalidConfiguration(format!("'{}' is required", key)))
}

fn resolve(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn parse_integration_method(value: &str) -> Result<AUCMethod, KineticError> {
    let name = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match name.as_str() {
        "linear" => Ok(AUCMethod::Linear),
        "lin up log down" | "linuplogdown" | "lin_up_log_down" => Ok(AUCMethod::LinUpLogDown),
        _ => Err(KineticError::InvalidConfiguration(format!(
            "unknown integration method '{}', expected 'linear' or 'lin up log down'",
            value
        ))),
    }
}
