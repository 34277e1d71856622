//! Linear kinetic models applied voxel by voxel
//!
//! A model goes through three states:
//!
//! 1. [`ModelState::Unconfigured`]: defaults only, no data.
//! 2. [`ModelState::Configured`]: time frames, input function and options are
//!    known, e.g. after [`PatlakPlot::parse_parameters`].
//! 3. [`ModelState::Ready`]: the model matrix has been built by `set_up`.
//!
//! Only a ready model runs [`fit`](KineticModel::fit),
//! [`forward`](KineticModel::forward) and [`adjoint`](KineticModel::adjoint).
//! All three share the same read-only [`ModelMatrix`] and process the voxels
//! of a volume in parallel.

pub mod config;
pub mod model_matrix;
pub mod patlak;
mod progress;
pub mod registry;

pub use config::PatlakConfig;
pub use model_matrix::{LeastSquares, ModelMatrix};
pub use patlak::{build_model_matrix, PatlakOptions, PatlakPlot, PlasmaSampling};
pub use registry::{ModelFactory, ModelRegistry};

use crate::data::{DynamicVolume, ParametricVolume};
use crate::KineticError;

/// Readiness of a kinetic model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unconfigured,
    Configured,
    Ready,
}

/// Settings of a whole-volume operation
#[derive(Debug, Clone, Copy, Default)]
pub struct VoxelOptions {
    /// Draw a progress bar on the terminal
    pub show_progress: bool,
}

impl VoxelOptions {
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// The kinetic models known to this crate
#[derive(Debug, Clone)]
pub enum KineticModel {
    Patlak(PatlakPlot),
}

impl KineticModel {
    pub fn name(&self) -> &'static str {
        match self {
            KineticModel::Patlak(_) => PatlakPlot::NAME,
        }
    }

    pub fn state(&self) -> ModelState {
        match self {
            KineticModel::Patlak(model) => model.state(),
        }
    }

    pub fn set_up(&mut self) -> Result<(), KineticError> {
        match self {
            KineticModel::Patlak(model) => model.set_up(),
        }
    }

    pub fn model_matrix(&self) -> Result<&ModelMatrix, KineticError> {
        match self {
            KineticModel::Patlak(model) => model.model_matrix(),
        }
    }

    pub fn fit(&self, dynamic: &DynamicVolume) -> Result<ParametricVolume, KineticError> {
        match self {
            KineticModel::Patlak(model) => model.fit(dynamic),
        }
    }

    pub fn fit_into(
        &self,
        dynamic: &DynamicVolume,
        parametric: &mut ParametricVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        match self {
            KineticModel::Patlak(model) => model.fit_into(dynamic, parametric, options),
        }
    }

    pub fn forward(&self, parametric: &ParametricVolume) -> Result<DynamicVolume, KineticError> {
        match self {
            KineticModel::Patlak(model) => model.forward(parametric),
        }
    }

    pub fn forward_into(
        &self,
        parametric: &ParametricVolume,
        dynamic: &mut DynamicVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        match self {
            KineticModel::Patlak(model) => model.forward_into(parametric, dynamic, options),
        }
    }

    pub fn adjoint(&self, dynamic: &DynamicVolume) -> Result<ParametricVolume, KineticError> {
        match self {
            KineticModel::Patlak(model) => model.adjoint(dynamic),
        }
    }

    pub fn adjoint_into(
        &self,
        dynamic: &DynamicVolume,
        parametric: &mut ParametricVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        match self {
            KineticModel::Patlak(model) => model.adjoint_into(dynamic, parametric, options),
        }
    }

    pub fn as_patlak(&self) -> Option<&PatlakPlot> {
        match self {
            KineticModel::Patlak(model) => Some(model),
        }
    }
}

impl From<PatlakPlot> for KineticModel {
    fn from(model: PatlakPlot) -> Self {
        KineticModel::Patlak(model)
    }
}
