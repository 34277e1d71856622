pub mod data;
pub mod error;
pub mod modelling;

pub use crate::data::*;
pub use crate::modelling::{
    KineticModel, ModelMatrix, ModelRegistry, ModelState, PatlakOptions, PatlakPlot, VoxelOptions,
};
pub use error::{Degeneracy, KineticError};

pub mod prelude {
    pub mod data {
        pub use crate::data::parser::{read_plasma_data, KeyMap};
        pub use crate::data::{
            AUCMethod, Dimensions, DynamicVolume, ParametricVolume, PlasmaSample,
            TimeActivityCurve, TimeFrame, TimeFrameDefinitions,
        };
    }
    pub mod modelling {
        pub use crate::modelling::{
            build_model_matrix, KineticModel, LeastSquares, ModelMatrix, ModelRegistry,
            ModelState, PatlakConfig, PatlakOptions, PatlakPlot, PlasmaSampling, VoxelOptions,
        };
    }

    pub use crate::data::*;
    pub use crate::modelling::{KineticModel, ModelState, PatlakOptions, PatlakPlot, VoxelOptions};
    pub use crate::{Degeneracy, KineticError};
}
