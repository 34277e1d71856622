use std::path::PathBuf;

use thiserror::Error;

use crate::data::frames::FrameDefinitionError;
use crate::data::plasma::PlasmaDataError;
use crate::modelling::ModelState;

/// Errors raised while configuring or applying a kinetic model
///
/// Configuration-time errors (frame parsing, plasma loading, model matrix
/// construction, [`set_up`](crate::modelling::PatlakPlot::set_up)) leave the
/// model short of [`ModelState::Ready`]. Once a model is ready the volume
/// operators only fail on [`KineticError::ModelNotConfigured`] and, for the
/// fit, on an unsolvable least-squares system.
#[derive(Error, Debug, Clone)]
pub enum KineticError {
    /// Malformed or temporally inconsistent time frames
    #[error(transparent)]
    InvalidFrameDefinition(#[from] FrameDefinitionError),

    /// A configuration, frame-definition or plasma file could not be read
    #[error("Error reading {}: {reason}", path.display())]
    FileNotFound { path: PathBuf, reason: String },

    /// Out-of-range or missing configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The model matrix row of an included frame cannot be formed
    #[error("Degenerate model at frame {frame}: {cause}")]
    DegenerateModel { frame: usize, cause: Degeneracy },

    /// A volume operation was requested before `set_up` succeeded
    #[error("Model is not ready (current state: {state:?}); call set_up first")]
    ModelNotConfigured { state: ModelState },

    /// Fewer included frames than free parameters
    #[error("Insufficient frames: {available} included, need at least {required}")]
    InsufficientFrames { available: usize, required: usize },

    /// The normal equations of the linear fit cannot be inverted
    #[error("Singular least-squares system (determinant {determinant:e})")]
    SingularSystem { determinant: f64 },

    /// Malformed plasma or blood samples
    #[error(transparent)]
    InvalidPlasmaData(#[from] PlasmaDataError),

    /// Failure while reading or writing CSV data
    #[error("CSV error: {0}")]
    Csv(String),
}

/// What makes a model matrix row impossible to form
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degeneracy {
    /// The input function vanishes over the frame
    PlasmaValue(f64),
    /// The frame has no duration under the mean-rate convention
    FrameDuration(f64),
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degeneracy::PlasmaValue(plasma) => write!(f, "plasma value {plasma:e}"),
            Degeneracy::FrameDuration(duration) => {
                write!(f, "frame duration {duration} under the mean-rate convention")
            }
        }
    }
}

impl From<csv::Error> for KineticError {
    fn from(e: csv::Error) -> Self {
        KineticError::Csv(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_model_names_its_cause() {
        let err = KineticError::DegenerateModel {
            frame: 3,
            cause: Degeneracy::FrameDuration(0.0),
        };
        assert_eq!(
            err.to_string(),
            "Degenerate model at frame 3: frame duration 0 under the mean-rate convention"
        );

        let err = KineticError::DegenerateModel {
            frame: 1,
            cause: Degeneracy::PlasmaValue(0.0),
        };
        assert_eq!(err.to_string(), "Degenerate model at frame 1: plasma value 0e0");
    }
}
