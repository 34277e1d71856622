//! Patlak plot
//!
//! After equilibrium the tissue activity `C(t)` of an irreversibly trapping
//! region follows
//!
//! ```text
//! C(t) / Cp(t) = Ki · ∫₀ᵗ Cp(τ) dτ / Cp(t) + V
//! ```
//!
//! where `Cp` is the plasma input function. Multiplying through by `Cp(t)`
//! keeps the model linear in the measured activity, so with the rows of the
//! model matrix set to `(∫₀ᵗ Cp / Cp, 1)` the voxel series is fitted by
//! ordinary least squares for `(Ki, V)`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::PatlakConfig;
use super::model_matrix::ModelMatrix;
use super::progress::VoxelProgress;
use super::{ModelState, VoxelOptions};
use crate::data::parser::KeyMap;
use crate::data::volume::NUM_PARAMETERS;
use crate::data::{AUCMethod, DynamicVolume, ParametricVolume, TimeActivityCurve, TimeFrameDefinitions};
use crate::{Degeneracy, KineticError};

/// Plasma values closer to zero than this make a frame unusable
const PLASMA_TOLERANCE: f64 = 1e-12;

// ==============================
// Options
// ==============================

/// How the plasma value of a frame is taken from the input function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlasmaSampling {
    /// Mean of the curve over the frame
    #[default]
    FrameMean,
    /// Value of the curve at the centre of the frame
    MidFrame,
}

impl FromStr for PlasmaSampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase().as_str() {
            "frame mean" | "frame_mean" | "mean" => Ok(PlasmaSampling::FrameMean),
            "mid frame" | "mid_frame" | "mid" => Ok(PlasmaSampling::MidFrame),
            other => Err(format!(
                "unknown plasma sampling '{}', expected 'frame mean' or 'mid frame'",
                other
            )),
        }
    }
}

/// Settings of the Patlak model matrix
#[derive(Debug, Clone, PartialEq)]
pub struct PatlakOptions {
    /// First frame (1-based) inside the linear regime
    pub starting_frame: usize,
    /// Scale applied to the integral column
    pub calibration_factor: f64,
    /// Seconds added to the frame times to align them with the plasma clock
    pub time_shift: f64,
    /// Dynamic images hold total counts per frame rather than mean rates
    pub in_total_counts: bool,
    pub plasma_sampling: PlasmaSampling,
    pub integration: AUCMethod,
}

impl Default for PatlakOptions {
    fn default() -> Self {
        PatlakOptions {
            starting_frame: 0,
            calibration_factor: 1.0,
            time_shift: 0.0,
            in_total_counts: false,
            plasma_sampling: PlasmaSampling::default(),
            integration: AUCMethod::default(),
        }
    }
}

impl PatlakOptions {
    pub fn new(starting_frame: usize) -> Self {
        PatlakOptions {
            starting_frame,
            ..Default::default()
        }
    }

    pub fn with_calibration_factor(mut self, calibration_factor: f64) -> Self {
        self.calibration_factor = calibration_factor;
        self
    }

    pub fn with_time_shift(mut self, time_shift: f64) -> Self {
        self.time_shift = time_shift;
        self
    }

    pub fn with_total_counts(mut self, in_total_counts: bool) -> Self {
        self.in_total_counts = in_total_counts;
        self
    }

    pub fn with_plasma_sampling(mut self, plasma_sampling: PlasmaSampling) -> Self {
        self.plasma_sampling = plasma_sampling;
        self
    }

    pub fn with_integration(mut self, integration: AUCMethod) -> Self {
        self.integration = integration;
        self
    }

    /// Check the options against an acquisition of `num_frames` frames
    pub fn validate(&self, num_frames: usize) -> Result<(), KineticError> {
        if self.starting_frame < 1 || self.starting_frame > num_frames {
            return Err(KineticError::InvalidConfiguration(format!(
                "starting frame {} is outside 1..={}",
                self.starting_frame, num_frames
            )));
        }
        if !self.calibration_factor.is_finite() || self.calibration_factor == 0.0 {
            return Err(KineticError::InvalidConfiguration(format!(
                "calibration factor must be finite and non-zero, got {}",
                self.calibration_factor
            )));
        }
        if !self.time_shift.is_finite() {
            return Err(KineticError::InvalidConfiguration(format!(
                "time shift must be finite, got {}",
                self.time_shift
            )));
        }
        Ok(())
    }

    fn fingerprint<H: Hasher>(&self, state: &mut H) {
        self.starting_frame.hash(state);
        self.calibration_factor.to_bits().hash(state);
        self.time_shift.to_bits().hash(state);
        self.in_total_counts.hash(state);
        self.plasma_sampling.hash(state);
        self.integration.hash(state);
    }
}

// ==============================
// Model matrix
// ==============================

/// Build the Patlak model matrix for frames `starting_frame..=num_frames`
///
/// For each included frame, shifted by `time_shift`, the first column is
/// `∫₀ᵉⁿᵈ Cp / Cp(frame) · calibration_factor`, further divided by the frame
/// duration unless the images are in total counts. The second column is 1.
pub fn build_model_matrix(
    frames: &TimeFrameDefinitions,
    plasma: &TimeActivityCurve,
    options: &PatlakOptions,
) -> Result<ModelMatrix, KineticError> {
    options.validate(frames.num_frames())?;

    let first = options.starting_frame;
    let num_rows = frames.num_frames() - first + 1;
    let mut rows = Array2::zeros((num_rows, NUM_PARAMETERS));

    for (r, frame_num) in (first..=frames.num_frames()).enumerate() {
        let frame = frames.frame(frame_num).shifted(options.time_shift);

        let plasma_value = match options.plasma_sampling {
            PlasmaSampling::FrameMean => {
                plasma.mean_over(frame.start(), frame.end(), &options.integration)
            }
            PlasmaSampling::MidFrame => plasma.value_at(frame.mid()),
        };
        if !(plasma_value.abs() >= PLASMA_TOLERANCE) {
            return Err(KineticError::DegenerateModel {
                frame: frame_num,
                cause: Degeneracy::PlasmaValue(plasma_value),
            });
        }

        let integral = plasma.integral(0.0, frame.end(), &options.integration);
        let mut regressor = integral / plasma_value * options.calibration_factor;
        if !options.in_total_counts {
            let duration = frame.duration();
            if duration <= 0.0 {
                return Err(KineticError::DegenerateModel {
                    frame: frame_num,
                    cause: Degeneracy::FrameDuration(duration),
                });
            }
            regressor /= duration;
        }

        rows[[r, 0]] = regressor;
        rows[[r, 1]] = 1.0;
    }

    ModelMatrix::new(first, rows)
}

// ==============================
// Operator
// ==============================

#[derive(Debug, Clone)]
struct PatlakInputs {
    frames: TimeFrameDefinitions,
    plasma: TimeActivityCurve,
    options: PatlakOptions,
}

impl PatlakInputs {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for frame in self.frames.iter() {
            frame.start().to_bits().hash(&mut hasher);
            frame.end().to_bits().hash(&mut hasher);
        }
        self.plasma.fingerprint(&mut hasher);
        self.options.fingerprint(&mut hasher);
        hasher.finish()
    }
}

/// A stored model matrix and the inputs it was built from
#[derive(Debug, Clone)]
struct CachedMatrix {
    /// `None` for a matrix supplied through [`PatlakPlot::set_model_matrix`]
    fingerprint: Option<u64>,
    matrix: Arc<ModelMatrix>,
}

/// Patlak plot kinetic model
///
/// # Example
///
/// ```rust
/// use petkin::data::{TimeActivityCurve, TimeFrameDefinitions};
/// use petkin::modelling::{PatlakOptions, PatlakPlot};
///
/// let frames = TimeFrameDefinitions::parse("6 60").unwrap();
/// let plasma = TimeActivityCurve::from_arrays(&[0.0, 30.0, 360.0], &[0.0, 10.0, 4.0]).unwrap();
///
/// let mut patlak = PatlakPlot::new();
/// patlak.configure(frames, plasma, PatlakOptions::new(3));
/// patlak.set_up().unwrap();
/// assert_eq!(patlak.model_matrix().unwrap().num_rows(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatlakPlot {
    inputs: Option<PatlakInputs>,
    cache: Option<CachedMatrix>,
    ready: bool,
}

impl PatlakPlot {
    /// Registry name and parameter block name
    pub const NAME: &'static str = "Patlak Plot";

    pub fn new() -> Self {
        Self::default()
    }

    /// A configured model
    pub fn with_inputs(
        frames: TimeFrameDefinitions,
        plasma: TimeActivityCurve,
        options: PatlakOptions,
    ) -> Self {
        let mut model = Self::new();
        model.configure(frames, plasma, options);
        model
    }

    /// Replace the frames, input function and options
    ///
    /// The model falls back to [`ModelState::Configured`] until the next
    /// [`set_up`](Self::set_up).
    pub fn configure(
        &mut self,
        frames: TimeFrameDefinitions,
        plasma: TimeActivityCurve,
        options: PatlakOptions,
    ) {
        self.inputs = Some(PatlakInputs {
            frames,
            plasma,
            options,
        });
        self.ready = false;
        if self.cache.as_ref().is_some_and(|c| c.fingerprint.is_none()) {
            self.cache = None;
        }
    }

    /// A configured model from a parsed parameter block
    ///
    /// Relative file names are resolved against `base_dir`.
    pub fn from_keymap(keymap: &KeyMap, base_dir: Option<&Path>) -> Result<Self, KineticError> {
        if let Some(name) = keymap.name() {
            if !name.eq_ignore_ascii_case(Self::NAME) {
                return Err(KineticError::InvalidConfiguration(format!(
                    "expected '{}' parameters, found '{}'",
                    Self::NAME,
                    name
                )));
            }
        }
        Self::from_config(&PatlakConfig::from_keymap(keymap)?, base_dir)
    }

    /// A configured model, loading the frame and plasma files named by `config`
    pub fn from_config(config: &PatlakConfig, base_dir: Option<&Path>) -> Result<Self, KineticError> {
        let (frames, plasma) = config.load(base_dir)?;
        Ok(Self::with_inputs(frames, plasma, config.options()))
    }

    /// Parse a `Patlak Plot Parameters:=` block
    ///
    /// On failure the model keeps its previous state.
    pub fn parse_parameters(&mut self, text: &str, base_dir: Option<&Path>) -> Result<(), KineticError> {
        let parsed = Self::from_keymap(&KeyMap::parse(text)?, base_dir)?;
        if let Some(inputs) = parsed.inputs {
            self.configure(inputs.frames, inputs.plasma, inputs.options);
        }
        Ok(())
    }

    /// Read a parameter file, either a keyword block or (`.json`) a
    /// serialised [`PatlakConfig`]
    pub fn read_parameters(path: impl AsRef<Path>) -> Result<Self, KineticError> {
        let path = path.as_ref();
        let base_dir = path.parent();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            return Self::from_config(&PatlakConfig::read_json(path)?, base_dir);
        }
        let text = std::fs::read_to_string(path).map_err(|e| KineticError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut model = Self::new();
        model.parse_parameters(&text, base_dir)?;
        Ok(model)
    }

    pub fn state(&self) -> ModelState {
        match (&self.inputs, self.ready) {
            (None, _) => ModelState::Unconfigured,
            (Some(_), false) => ModelState::Configured,
            (Some(_), true) => ModelState::Ready,
        }
    }

    /// Validate the options and build the model matrix
    ///
    /// A matrix built from identical inputs, or supplied through
    /// [`set_model_matrix`](Self::set_model_matrix), is reused. On failure
    /// the model stays [`ModelState::Configured`].
    pub fn set_up(&mut self) -> Result<(), KineticError> {
        self.ready = false;
        let Some(inputs) = &self.inputs else {
            return Err(KineticError::InvalidConfiguration(
                "Patlak plot parameters have not been set".into(),
            ));
        };
        inputs.options.validate(inputs.frames.num_frames())?;

        let fingerprint = inputs.fingerprint();
        let stored = self.cache.as_ref().map(|cached| cached.fingerprint);
        match stored {
            Some(None) => debug!("keeping supplied Patlak model matrix"),
            Some(Some(previous)) if previous == fingerprint => {
                debug!("reusing stored Patlak model matrix")
            }
            _ => {
                let matrix = build_model_matrix(&inputs.frames, &inputs.plasma, &inputs.options)?;
                self.cache = Some(CachedMatrix {
                    fingerprint: Some(fingerprint),
                    matrix: Arc::new(matrix),
                });
            }
        }

        self.ready = true;
        info!(
            starting_frame = inputs.options.starting_frame,
            frames = inputs.frames.num_frames(),
            "Patlak plot ready"
        );
        Ok(())
    }

    /// Install a precomputed model matrix
    ///
    /// It must cover frames `starting_frame..=num_frames` of the configured
    /// frames. The model becomes ready.
    pub fn set_model_matrix(&mut self, matrix: ModelMatrix) -> Result<(), KineticError> {
        let Some(inputs) = &self.inputs else {
            return Err(KineticError::InvalidConfiguration(
                "cannot set a model matrix before the time frames are known".into(),
            ));
        };
        let num_frames = inputs.frames.num_frames();
        inputs.options.validate(num_frames)?;
        if matrix.starting_frame() != inputs.options.starting_frame || matrix.last_frame() != num_frames {
            return Err(KineticError::InvalidConfiguration(format!(
                "model matrix covers frames {}..={}, expected {}..={}",
                matrix.starting_frame(),
                matrix.last_frame(),
                inputs.options.starting_frame,
                num_frames
            )));
        }
        self.cache = Some(CachedMatrix {
            fingerprint: None,
            matrix: Arc::new(matrix),
        });
        self.ready = true;
        Ok(())
    }

    pub fn model_matrix(&self) -> Result<&ModelMatrix, KineticError> {
        self.ready_matrix().map(|matrix| &**matrix)
    }

    /// A shared handle on the model matrix
    pub fn shared_model_matrix(&self) -> Result<Arc<ModelMatrix>, KineticError> {
        self.ready_matrix().cloned()
    }

    pub fn starting_frame(&self) -> Option<usize> {
        self.inputs.as_ref().map(|i| i.options.starting_frame)
    }

    pub fn time_frame_definitions(&self) -> Option<&TimeFrameDefinitions> {
        self.inputs.as_ref().map(|i| &i.frames)
    }

    pub fn plasma_data(&self) -> Option<&TimeActivityCurve> {
        self.inputs.as_ref().map(|i| &i.plasma)
    }

    pub fn options(&self) -> Option<&PatlakOptions> {
        self.inputs.as_ref().map(|i| &i.options)
    }

    fn ready_matrix(&self) -> Result<&Arc<ModelMatrix>, KineticError> {
        match &self.cache {
            Some(cached) if self.ready => Ok(&cached.matrix),
            _ => Err(KineticError::ModelNotConfigured {
                state: self.state(),
            }),
        }
    }

    fn assert_compatible(matrix: &ModelMatrix, dynamic: &DynamicVolume, parametric: &ParametricVolume) {
        assert_eq!(
            dynamic.dimensions(),
            parametric.dimensions(),
            "dynamic and parametric volumes have different dimensions"
        );
        assert_eq!(
            dynamic.num_frames(),
            matrix.last_frame(),
            "dynamic volume has {} frames, the model expects {}",
            dynamic.num_frames(),
            matrix.last_frame()
        );
    }

    // ==============================
    // Volume operators
    // ==============================

    /// Least-squares `(slope, intercept)` of every voxel
    ///
    /// A singular model matrix fails the whole fit with
    /// [`KineticError::SingularSystem`] before any voxel is touched.
    pub fn fit(&self, dynamic: &DynamicVolume) -> Result<ParametricVolume, KineticError> {
        let mut parametric = ParametricVolume::zeros(dynamic.dimensions());
        self.fit_into(dynamic, &mut parametric, VoxelOptions::default())?;
        Ok(parametric)
    }

    pub fn fit_into(
        &self,
        dynamic: &DynamicVolume,
        parametric: &mut ParametricVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        let matrix = self.ready_matrix()?;
        Self::assert_compatible(matrix, dynamic, parametric);
        let solver = matrix.least_squares()?;
        let first = matrix.starting_frame() - 1;

        let progress = VoxelProgress::new("Patlak fit", dynamic.num_voxels(), options.show_progress);
        Zip::from(parametric.as_array_mut().rows_mut())
            .and(dynamic.as_array().rows())
            .par_for_each(|mut params, series| {
                let (slope, intercept) = solver.solve(series.slice(s![first..]));
                params[0] = slope;
                params[1] = intercept;
                progress.inc();
            });
        progress.finish();

        info!(voxels = dynamic.num_voxels(), "Patlak fit done");
        Ok(())
    }

    /// Dynamic volume predicted by `parametric`
    ///
    /// Frames before the starting frame are zero.
    pub fn forward(&self, parametric: &ParametricVolume) -> Result<DynamicVolume, KineticError> {
        let matrix = self.ready_matrix()?;
        let mut dynamic = DynamicVolume::zeros(parametric.dimensions(), matrix.last_frame());
        self.forward_into(parametric, &mut dynamic, VoxelOptions::default())?;
        Ok(dynamic)
    }

    /// Overwrite the included frames of `dynamic` with the prediction of
    /// `parametric`; earlier frames are left as they are
    pub fn forward_into(
        &self,
        parametric: &ParametricVolume,
        dynamic: &mut DynamicVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        let matrix = self.ready_matrix()?;
        Self::assert_compatible(matrix, dynamic, parametric);
        let first = matrix.starting_frame() - 1;

        let progress = VoxelProgress::new("Patlak forward", parametric.num_voxels(), options.show_progress);
        Zip::from(dynamic.as_array_mut().rows_mut())
            .and(parametric.as_array().rows())
            .par_for_each(|mut series, params| {
                matrix.project((params[0], params[1]), series.slice_mut(s![first..]));
                progress.inc();
            });
        progress.finish();

        debug!(voxels = parametric.num_voxels(), "Patlak forward done");
        Ok(())
    }

    /// Transpose of [`forward`](Self::forward) applied to `dynamic`
    ///
    /// Frames before the starting frame do not contribute.
    pub fn adjoint(&self, dynamic: &DynamicVolume) -> Result<ParametricVolume, KineticError> {
        let mut parametric = ParametricVolume::zeros(dynamic.dimensions());
        self.adjoint_into(dynamic, &mut parametric, VoxelOptions::default())?;
        Ok(parametric)
    }

    pub fn adjoint_into(
        &self,
        dynamic: &DynamicVolume,
        parametric: &mut ParametricVolume,
        options: VoxelOptions,
    ) -> Result<(), KineticError> {
        let matrix = self.ready_matrix()?;
        Self::assert_compatible(matrix, dynamic, parametric);
        let first = matrix.starting_frame() - 1;

        let progress = VoxelProgress::new("Patlak adjoint", dynamic.num_voxels(), options.show_progress);
        Zip::from(parametric.as_array_mut().rows_mut())
            .and(dynamic.as_array().rows())
            .par_for_each(|mut params, series| {
                let (slope, intercept) = matrix.project_transpose(series.slice(s![first..]));
                params[0] = slope;
                params[1] = intercept;
                progress.inc();
            });
        progress.finish();

        debug!(voxels = dynamic.num_voxels(), "Patlak adjoint done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frames() -> TimeFrameDefinitions {
        TimeFrameDefinitions::parse("2 30\n4 60").unwrap()
    }

    fn plasma() -> TimeActivityCurve {
        TimeActivityCurve::from_arrays(&[0.0, 30.0, 120.0, 300.0], &[0.0, 20.0, 8.0, 5.0]).unwrap()
    }

    #[test]
    fn rows_follow_the_integral_over_plasma() {
        let options = PatlakOptions::new(3)
            .with_total_counts(true)
            .with_plasma_sampling(PlasmaSampling::MidFrame);
        let matrix = build_model_matrix(&frames(), &plasma(), &options).unwrap();
        assert_eq!(matrix.num_rows(), 4);
        assert_eq!(matrix.starting_frame(), 3);

        // Frame 3 is [60, 120], mid 90 where Cp = 12
        // ∫₀¹²⁰ Cp = 0.5·30·20 + 0.5·90·(20 + 8) = 300 + 1260
        assert_relative_eq!(matrix.row(0)[0], 1560.0 / 12.0, epsilon = 1e-9);
        assert_eq!(matrix.row(0)[1], 1.0);
    }

    #[test]
    fn mean_rate_divides_the_integral_column_only() {
        let total = PatlakOptions::new(2).with_total_counts(true);
        let rate = PatlakOptions::new(2).with_total_counts(false);
        let a = build_model_matrix(&frames(), &plasma(), &total).unwrap();
        let b = build_model_matrix(&frames(), &plasma(), &rate).unwrap();
        let f = frames();
        for r in 0..a.num_rows() {
            let duration = f.duration(r + 2);
            assert_relative_eq!(b.row(r)[0], a.row(r)[0] / duration, epsilon = 1e-12);
            assert_eq!(b.row(r)[1], 1.0);
        }
    }

    #[test]
    fn calibration_and_shift() {
        let base = build_model_matrix(&frames(), &plasma(), &PatlakOptions::new(3)).unwrap();
        let scaled = build_model_matrix(
            &frames(),
            &plasma(),
            &PatlakOptions::new(3).with_calibration_factor(2.5),
        )
        .unwrap();
        assert_relative_eq!(scaled.row(1)[0], 2.5 * base.row(1)[0], epsilon = 1e-12);

        let shifted = build_model_matrix(
            &frames(),
            &plasma(),
            &PatlakOptions::new(3).with_time_shift(15.0),
        )
        .unwrap();
        assert!((shifted.row(0)[0] - base.row(0)[0]).abs() > 1e-6);
    }

    #[test]
    fn zero_plasma_is_degenerate() {
        let zero = TimeActivityCurve::from_arrays(&[0.0, 600.0], &[0.0, 0.0]).unwrap();
        let err = build_model_matrix(&frames(), &zero, &PatlakOptions::new(1)).unwrap_err();
        assert!(matches!(
            err,
            KineticError::DegenerateModel {
                frame: 1,
                cause: Degeneracy::PlasmaValue(_)
            }
        ));
    }

    #[test]
    fn zero_duration_frame_is_degenerate_as_a_mean_rate() {
        let frames = TimeFrameDefinitions::from_intervals(vec![
            (0.0, 30.0),
            (30.0, 60.0),
            (60.0, 60.0),
            (60.0, 120.0),
        ])
        .unwrap();

        let err = build_model_matrix(&frames, &plasma(), &PatlakOptions::new(2)).unwrap_err();
        match err {
            KineticError::DegenerateModel { frame, cause } => {
                assert_eq!(frame, 3);
                assert_eq!(cause, Degeneracy::FrameDuration(0.0));
            }
            other => panic!("unexpected error {other:?}"),
        }

        // In total counts the frame needs no duration
        let options = PatlakOptions::new(2).with_total_counts(true);
        let matrix = build_model_matrix(&frames, &plasma(), &options).unwrap();
        assert_eq!(matrix.num_rows(), 3);
        assert!(matrix.row(1)[0].is_finite());
    }

    #[test]
    fn log_down_integration_changes_the_integral_column() {
        let linear = PatlakOptions::new(1)
            .with_total_counts(true)
            .with_plasma_sampling(PlasmaSampling::MidFrame);
        let log_down = linear.clone().with_integration(AUCMethod::LinUpLogDown);
        let a = build_model_matrix(&frames(), &plasma(), &linear).unwrap();
        let b = build_model_matrix(&frames(), &plasma(), &log_down).unwrap();

        // Frame 1 ends on the rising part, where both methods are linear
        assert_relative_eq!(a.row(0)[0], b.row(0)[0], epsilon = 1e-12);

        // Frame 3 ends at 120 s; Cp falls from 20 to 8 over [30, 120]
        let log_area = 300.0 + (20.0 - 8.0) * 90.0 / (20.0f64 / 8.0).ln();
        assert_relative_eq!(a.row(2)[0], 1560.0 / 12.0, epsilon = 1e-9);
        assert_relative_eq!(b.row(2)[0], log_area / 12.0, epsilon = 1e-9);
        assert!(b.row(2)[0] < a.row(2)[0]);

        for r in 0..b.num_rows() {
            assert_eq!(b.row(r)[1], 1.0);
        }
    }

    #[test]
    fn starting_frame_out_of_range() {
        for starting_frame in [0, 7] {
            let err = build_model_matrix(&frames(), &plasma(), &PatlakOptions::new(starting_frame))
                .unwrap_err();
            assert!(matches!(err, KineticError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn bad_calibration_is_rejected() {
        for factor in [0.0, f64::NAN, f64::INFINITY] {
            let options = PatlakOptions::new(1).with_calibration_factor(factor);
            assert!(options.validate(6).is_err());
        }
        assert!(PatlakOptions::new(1).with_time_shift(f64::NAN).validate(6).is_err());
    }

    #[test]
    fn state_transitions() {
        let mut patlak = PatlakPlot::new();
        assert_eq!(patlak.state(), ModelState::Unconfigured);
        assert!(patlak.set_up().is_err());

        patlak.configure(frames(), plasma(), PatlakOptions::new(0));
        assert_eq!(patlak.state(), ModelState::Configured);
        assert!(patlak.set_up().is_err());
        assert_eq!(patlak.state(), ModelState::Configured);

        patlak.configure(frames(), plasma(), PatlakOptions::new(2));
        patlak.set_up().unwrap();
        assert_eq!(patlak.state(), ModelState::Ready);
    }

    #[test]
    fn unchanged_inputs_reuse_the_matrix() {
        let mut patlak = PatlakPlot::with_inputs(frames(), plasma(), PatlakOptions::new(2));
        patlak.set_up().unwrap();
        let first = patlak.shared_model_matrix().unwrap();

        patlak.configure(frames(), plasma(), PatlakOptions::new(2));
        patlak.set_up().unwrap();
        assert!(Arc::ptr_eq(&first, &patlak.shared_model_matrix().unwrap()));

        patlak.configure(frames(), plasma(), PatlakOptions::new(3));
        patlak.set_up().unwrap();
        assert!(!Arc::ptr_eq(&first, &patlak.shared_model_matrix().unwrap()));
    }

    #[test]
    fn supplied_matrix_must_match_frames() {
        let mut patlak = PatlakPlot::with_inputs(frames(), plasma(), PatlakOptions::new(5));
        let wrong = ModelMatrix::new(4, Array2::ones((3, 2))).unwrap();
        assert!(patlak.set_model_matrix(wrong).is_err());
        assert_eq!(patlak.state(), ModelState::Configured);

        let rows = ndarray::array![[1.0, 1.0], [3.0, 1.0]];
        patlak
            .set_model_matrix(ModelMatrix::new(5, rows.clone()).unwrap())
            .unwrap();
        assert_eq!(patlak.state(), ModelState::Ready);
        patlak.set_up().unwrap();
        assert_eq!(patlak.model_matrix().unwrap().as_array(), rows.view());
    }

    #[test]
    fn plasma_sampling_names() {
        assert_eq!("Frame  Mean".parse::<PlasmaSampling>(), Ok(PlasmaSampling::FrameMean));
        assert_eq!("mid frame".parse::<PlasmaSampling>(), Ok(PlasmaSampling::MidFrame));
        assert!("peak".parse::<PlasmaSampling>().is_err());
    }
}
