//! Design matrix of a linear two-parameter kinetic model
//!
//! A [`ModelMatrix`] has one row per included frame, from its starting frame
//! to the last frame of the acquisition, and two columns: the slope regressor
//! and the intercept regressor. It is built once and then only read, so a
//! single matrix can be shared by every voxel of a volume (and by every
//! worker thread) without locking.

use std::path::Path;

use nalgebra::Matrix2;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

use crate::data::volume::NUM_PARAMETERS;
use crate::KineticError;

/// Relative determinant below which the normal equations count as singular
const SINGULAR_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMatrix {
    starting_frame: usize,
    rows: Array2<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelMatrixRecord {
    frame: usize,
    slope_regressor: f64,
    intercept_regressor: f64,
}

impl ModelMatrix {
    /// Wrap `rows`, shaped `(included frames, 2)`, whose first row belongs to
    /// frame `starting_frame` (1-based)
    pub fn new(starting_frame: usize, rows: Array2<f64>) -> Result<Self, KineticError> {
        if starting_frame == 0 {
            return Err(KineticError::InvalidConfiguration(
                "model matrix starting frame must be at least 1".into(),
            ));
        }
        if rows.ncols() != NUM_PARAMETERS {
            return Err(KineticError::InvalidConfiguration(format!(
                "model matrix must have {} columns, found {}",
                NUM_PARAMETERS,
                rows.ncols()
            )));
        }
        if rows.iter().any(|v| !v.is_finite()) {
            return Err(KineticError::InvalidConfiguration(
                "model matrix contains non-finite values".into(),
            ));
        }
        Ok(ModelMatrix {
            starting_frame,
            rows,
        })
    }

    /// First frame (1-based) described by the matrix
    pub fn starting_frame(&self) -> usize {
        self.starting_frame
    }

    /// Last frame (1-based) described by the matrix
    pub fn last_frame(&self) -> usize {
        self.starting_frame + self.num_rows() - 1
    }

    pub fn num_rows(&self) -> usize {
        self.rows.nrows()
    }

    /// Regressors of frame `starting_frame + r`
    pub fn row(&self, r: usize) -> ArrayView1<'_, f64> {
        self.rows.row(r)
    }

    pub fn as_array(&self) -> ArrayView2<'_, f64> {
        self.rows.view()
    }

    /// The slope regressor of every included frame
    pub fn slope_regressor(&self) -> ArrayView1<'_, f64> {
        self.rows.column(0)
    }

    /// Write `matrix · parameters` into `series`
    ///
    /// `series` holds exactly the included frames.
    #[inline]
    pub fn project(&self, (slope, intercept): (f64, f64), mut series: ArrayViewMut1<'_, f64>) {
        debug_assert_eq!(series.len(), self.num_rows());
        for (value, row) in series.iter_mut().zip(self.rows.axis_iter(Axis(0))) {
            *value = row[0] * slope + row[1] * intercept;
        }
    }

    /// `matrixᵗ · series`, the exact transpose of [`project`](Self::project)
    #[inline]
    pub fn project_transpose(&self, series: ArrayView1<'_, f64>) -> (f64, f64) {
        debug_assert_eq!(series.len(), self.num_rows());
        series
            .iter()
            .zip(self.rows.axis_iter(Axis(0)))
            .fold((0.0, 0.0), |(a, b), (y, row)| (a + row[0] * y, b + row[1] * y))
    }

    /// Prepare the closed-form least-squares solution of `matrix · p ≈ series`
    pub fn least_squares(&self) -> Result<LeastSquares, KineticError> {
        if self.num_rows() < NUM_PARAMETERS {
            return Err(KineticError::InsufficientFrames {
                available: self.num_rows(),
                required: NUM_PARAMETERS,
            });
        }

        // Normal equations: (XᵗX) p = Xᵗy
        let mut normal = Matrix2::<f64>::zeros();
        for row in self.rows.axis_iter(Axis(0)) {
            normal[(0, 0)] += row[0] * row[0];
            normal[(0, 1)] += row[0] * row[1];
            normal[(1, 1)] += row[1] * row[1];
        }
        normal[(1, 0)] = normal[(0, 1)];

        let determinant = normal.determinant();
        let scale = (normal[(0, 0)] * normal[(1, 1)]).abs();
        if !(determinant.abs() > SINGULAR_TOLERANCE * scale) {
            return Err(KineticError::SingularSystem { determinant });
        }
        let inverse = normal
            .try_inverse()
            .ok_or(KineticError::SingularSystem { determinant })?;

        // (XᵗX)⁻¹ Xᵗ, shared by every voxel
        let mut pseudo_inverse = Array2::zeros((NUM_PARAMETERS, self.num_rows()));
        for (r, row) in self.rows.axis_iter(Axis(0)).enumerate() {
            for k in 0..NUM_PARAMETERS {
                pseudo_inverse[[k, r]] = inverse[(k, 0)] * row[0] + inverse[(k, 1)] * row[1];
            }
        }

        Ok(LeastSquares {
            pseudo_inverse,
            determinant,
        })
    }

    /// Write the matrix as CSV with columns `frame,slope_regressor,intercept_regressor`
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), KineticError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(path.as_ref())?;
        for (r, row) in self.rows.axis_iter(Axis(0)).enumerate() {
            writer.serialize(ModelMatrixRecord {
                frame: self.starting_frame + r,
                slope_regressor: row[0],
                intercept_regressor: row[1],
            })?;
        }
        writer
            .flush()
            .map_err(|e| KineticError::Csv(e.to_string()))?;
        Ok(())
    }

    /// Read a matrix written by [`write_csv`](Self::write_csv)
    ///
    /// Frames must be consecutive.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, KineticError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| KineticError::FileNotFound {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let records = reader
            .deserialize()
            .collect::<Result<Vec<ModelMatrixRecord>, _>>()?;
        let Some(first) = records.first() else {
            return Err(KineticError::InvalidConfiguration(format!(
                "model matrix file {} is empty",
                path.display()
            )));
        };
        let starting_frame = first.frame;

        let mut rows = Array2::zeros((records.len(), NUM_PARAMETERS));
        for (r, record) in records.iter().enumerate() {
            if record.frame != starting_frame + r {
                return Err(KineticError::InvalidConfiguration(format!(
                    "model matrix file {}: expected frame {}, found {}",
                    path.display(),
                    starting_frame + r,
                    record.frame
                )));
            }
            rows[[r, 0]] = record.slope_regressor;
            rows[[r, 1]] = record.intercept_regressor;
        }

        Self::new(starting_frame, rows)
    }
}

/// Precomputed `(XᵗX)⁻¹Xᵗ` for a fixed model matrix `X`
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pseudo_inverse: Array2<f64>,
    determinant: f64,
}

impl LeastSquares {
    /// Determinant of the normal matrix `XᵗX`
    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    /// Best `(slope, intercept)` for the included frames of one voxel
    #[inline]
    pub fn solve(&self, series: ArrayView1<'_, f64>) -> (f64, f64) {
        debug_assert_eq!(series.len(), self.pseudo_inverse.ncols());
        let slope = self.pseudo_inverse.row(0).dot(&series);
        let intercept = self.pseudo_inverse.row(1).dot(&series);
        (slope, intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    fn matrix() -> ModelMatrix {
        ModelMatrix::new(3, array![[1.0, 1.0], [2.0, 1.0], [4.0, 1.0], [7.0, 1.0]]).unwrap()
    }

    #[test]
    fn frame_range() {
        let m = matrix();
        assert_eq!(m.starting_frame(), 3);
        assert_eq!(m.last_frame(), 6);
        assert_eq!(m.num_rows(), 4);
    }

    #[test]
    fn solves_exact_line() {
        let m = matrix();
        let series: Array1<f64> = m.slope_regressor().mapv(|x| 2.0 + 3.0 * x);
        let (slope, intercept) = m.least_squares().unwrap().solve(series.view());
        assert_relative_eq!(slope, 3.0, epsilon = 1e-12);
        assert_relative_eq!(intercept, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn matches_simple_regression_with_noise() {
        let m = matrix();
        let series = array![3.0, 4.5, 9.5, 14.0];
        let (slope, intercept) = m.least_squares().unwrap().solve(series.view());

        // Centered formulas
        let x = [1.0, 2.0, 4.0, 7.0];
        let x_mean = 3.5;
        let y_mean = series.mean().unwrap();
        let sxy: f64 = x.iter().zip(series.iter()).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
        let sxx: f64 = x.iter().map(|x| (x - x_mean) * (x - x_mean)).sum();
        assert_relative_eq!(slope, sxy / sxx, epsilon = 1e-12);
        assert_relative_eq!(intercept, y_mean - sxy / sxx * x_mean, epsilon = 1e-12);
    }

    #[test]
    fn projections_are_transposes() {
        let m = matrix();
        let mut forward = Array1::zeros(4);
        m.project((0.5, -2.0), forward.view_mut());
        let y = array![1.0, -1.0, 0.5, 2.0];
        let (a, b) = m.project_transpose(y.view());
        assert_relative_eq!(forward.dot(&y), 0.5 * a - 2.0 * b, epsilon = 1e-12);
    }

    #[test]
    fn identical_rows_are_singular() {
        let m = ModelMatrix::new(1, array![[2.0, 1.0], [2.0, 1.0], [2.0, 1.0]]).unwrap();
        assert!(matches!(
            m.least_squares(),
            Err(KineticError::SingularSystem { .. })
        ));

        let zeros = ModelMatrix::new(1, Array2::zeros((3, 2))).unwrap();
        assert!(matches!(
            zeros.least_squares(),
            Err(KineticError::SingularSystem { .. })
        ));
    }

    #[test]
    fn one_row_is_insufficient() {
        let m = ModelMatrix::new(5, array![[2.0, 1.0]]).unwrap();
        assert!(matches!(
            m.least_squares(),
            Err(KineticError::InsufficientFrames {
                available: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(ModelMatrix::new(1, Array2::zeros((3, 3))).is_err());
        assert!(ModelMatrix::new(0, Array2::zeros((3, 2))).is_err());
        assert!(ModelMatrix::new(1, array![[f64::NAN, 1.0]]).is_err());
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_matrix.csv");
        let m = matrix();
        m.write_csv(&path).unwrap();
        assert_eq!(ModelMatrix::read_csv(&path).unwrap(), m);
    }

    #[test]
    fn csv_with_frame_gap_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_matrix.csv");
        std::fs::write(
            &path,
            "frame,slope_regressor,intercept_regressor\n2,1.0,1.0\n4,2.0,1.0\n",
        )
        .unwrap();
        assert!(matches!(
            ModelMatrix::read_csv(&path),
            Err(KineticError::InvalidConfiguration(_))
        ));
    }
}
