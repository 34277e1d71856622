pub mod auc;
pub mod frames;
pub mod parser;
pub mod plasma;
pub mod volume;

pub use auc::AUCMethod;
pub use frames::{FrameDefinitionError, TimeFrame, TimeFrameDefinitions};
pub use plasma::{PlasmaDataError, PlasmaSample, TimeActivityCurve};
pub use volume::{Dimensions, DynamicVolume, ParametricVolume};
