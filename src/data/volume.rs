//! Voxel grids for dynamic and parametric images
//!
//! Both containers store one row per voxel in an [`Array2`], voxels in
//! x-fastest order. A [`DynamicVolume`] row is the voxel's time-activity
//! curve (one column per frame), a [`ParametricVolume`] row holds the two
//! linear-model parameters `(slope, intercept)`.

use std::ops::{Add, Div, Index, IndexMut, Mul, Rem};

use ndarray::{Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

/// Voxel counts along x, y and z
pub type Dimensions = [usize; 3];

/// Number of parameters of a linear two-regressor model
pub const NUM_PARAMETERS: usize = 2;

// --------------------------------------------------------------------------------
//                  Conversion between 1d and 3d indices

pub fn index3_to_1<T>([ix, iy, iz]: [T; 3], [nx, ny, _nz]: [T; 3]) -> T
where
    T: Mul<Output = T> + Add<Output = T>,
{
    ix + (iy + iz * ny) * nx
}

#[allow(clippy::many_single_char_names)]
pub fn index1_to_3<T>(i: T, [nx, ny, _nz]: [T; 3]) -> [T; 3]
where
    T: Mul<Output = T> + Div<Output = T> + Rem<Output = T> + Copy,
{
    let z = i / (nx * ny);
    let r = i % (nx * ny);
    let y = r / nx;
    let x = r % nx;
    [x, y, z]
}

fn num_voxels([nx, ny, nz]: Dimensions) -> usize {
    nx * ny * nz
}

fn check_voxel(voxel: Dimensions, dimensions: Dimensions) {
    assert!(
        voxel.iter().zip(dimensions.iter()).all(|(i, n)| i < n),
        "voxel {:?} outside volume {:?}",
        voxel,
        dimensions
    );
}

// --------------------------------------------------------------------------------

/// Per-voxel, per-frame activity values
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicVolume {
    dimensions: Dimensions,
    data: Array2<f64>,
}

impl DynamicVolume {
    pub fn zeros(dimensions: Dimensions, num_frames: usize) -> Self {
        DynamicVolume {
            dimensions,
            data: Array2::zeros((num_voxels(dimensions), num_frames)),
        }
    }

    /// Wrap `data`, shaped `(voxels, frames)`
    ///
    /// # Panics
    /// Panics if the number of rows does not match `dimensions`.
    pub fn from_array(dimensions: Dimensions, data: Array2<f64>) -> Self {
        assert_eq!(
            data.nrows(),
            num_voxels(dimensions),
            "dynamic data has {} voxels but dimensions {:?} need {}",
            data.nrows(),
            dimensions,
            num_voxels(dimensions)
        );
        DynamicVolume { dimensions, data }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn num_voxels(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_frames(&self) -> usize {
        self.data.ncols()
    }

    /// Time-activity curve of one voxel, indexed by `frame_num - 1`
    pub fn time_activity(&self, voxel: Dimensions) -> ArrayView1<'_, f64> {
        check_voxel(voxel, self.dimensions);
        self.data.row(index3_to_1(voxel, self.dimensions))
    }

    pub fn time_activity_mut(&mut self, voxel: Dimensions) -> ArrayViewMut1<'_, f64> {
        check_voxel(voxel, self.dimensions);
        self.data.row_mut(index3_to_1(voxel, self.dimensions))
    }

    /// Image of frame `frame_num` (1-based), one value per voxel
    pub fn frame_image(&self, frame_num: usize) -> ArrayView1<'_, f64> {
        assert!(
            frame_num >= 1 && frame_num <= self.num_frames(),
            "frame number {} out of range 1..={}",
            frame_num,
            self.num_frames()
        );
        self.data.column(frame_num - 1)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Writable view of the values; the shape stays fixed
    pub fn as_array_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }
}

/// Voxel and 1-based frame number
impl Index<(Dimensions, usize)> for DynamicVolume {
    type Output = f64;
    fn index(&self, (voxel, frame_num): (Dimensions, usize)) -> &Self::Output {
        check_voxel(voxel, self.dimensions);
        &self.data[[index3_to_1(voxel, self.dimensions), frame_num - 1]]
    }
}

impl IndexMut<(Dimensions, usize)> for DynamicVolume {
    fn index_mut(&mut self, (voxel, frame_num): (Dimensions, usize)) -> &mut Self::Output {
        check_voxel(voxel, self.dimensions);
        &mut self.data[[index3_to_1(voxel, self.dimensions), frame_num - 1]]
    }
}

// --------------------------------------------------------------------------------

/// Per-voxel `(slope, intercept)` pairs
#[derive(Debug, Clone, PartialEq)]
pub struct ParametricVolume {
    dimensions: Dimensions,
    data: Array2<f64>,
}

impl ParametricVolume {
    pub fn zeros(dimensions: Dimensions) -> Self {
        ParametricVolume {
            dimensions,
            data: Array2::zeros((num_voxels(dimensions), NUM_PARAMETERS)),
        }
    }

    /// Wrap `data`, shaped `(voxels, 2)`
    ///
    /// # Panics
    /// Panics if the shape does not match `dimensions`.
    pub fn from_array(dimensions: Dimensions, data: Array2<f64>) -> Self {
        assert_eq!(
            data.dim(),
            (num_voxels(dimensions), NUM_PARAMETERS),
            "parametric data shape does not match dimensions {:?}",
            dimensions
        );
        ParametricVolume { dimensions, data }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn num_voxels(&self) -> usize {
        self.data.nrows()
    }

    /// `(slope, intercept)` of one voxel
    pub fn parameters(&self, voxel: Dimensions) -> (f64, f64) {
        check_voxel(voxel, self.dimensions);
        let row = self.data.row(index3_to_1(voxel, self.dimensions));
        (row[0], row[1])
    }

    pub fn set_parameters(&mut self, voxel: Dimensions, (slope, intercept): (f64, f64)) {
        check_voxel(voxel, self.dimensions);
        let mut row = self.data.row_mut(index3_to_1(voxel, self.dimensions));
        row[0] = slope;
        row[1] = intercept;
    }

    /// Slope (Patlak influx rate) of every voxel
    pub fn slope_image(&self) -> ArrayView1<'_, f64> {
        self.data.column(0)
    }

    /// Intercept (apparent distribution volume) of every voxel
    pub fn intercept_image(&self) -> ArrayView1<'_, f64> {
        self.data.column(1)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_volume_indexing() {
        let mut volume = DynamicVolume::zeros([2, 3, 4], 5);
        assert_eq!(volume.num_voxels(), 24);
        assert_eq!(volume.num_frames(), 5);

        volume[([1, 2, 3], 5)] = 7.0;
        assert_eq!(volume.time_activity([1, 2, 3])[4], 7.0);
        assert_eq!(volume.frame_image(5)[23], 7.0);
        assert_eq!(volume.frame_image(5).sum(), 7.0);
    }

    #[test]
    fn parametric_volume_images() {
        let mut volume = ParametricVolume::zeros([2, 1, 1]);
        volume.set_parameters([1, 0, 0], (0.5, 2.0));
        assert_eq!(volume.parameters([1, 0, 0]), (0.5, 2.0));
        assert_eq!(volume.slope_image().to_vec(), vec![0.0, 0.5]);
        assert_eq!(volume.intercept_image().to_vec(), vec![0.0, 2.0]);
    }

    #[test]
    fn writes_through_the_view_keep_the_shape() {
        let mut dynamic = DynamicVolume::zeros([2, 2, 1], 3);
        dynamic.as_array_mut().column_mut(1).fill(4.0);
        assert_eq!(dynamic.as_array().dim(), (4, 3));
        assert_eq!(dynamic.frame_image(2).sum(), 16.0);
        assert_eq!(dynamic.frame_image(1).sum(), 0.0);

        let mut parametric = ParametricVolume::zeros([2, 2, 1]);
        parametric.as_array_mut().fill(0.5);
        assert_eq!(parametric.as_array().dim(), (4, NUM_PARAMETERS));
        assert_eq!(parametric.parameters([1, 1, 0]), (0.5, 0.5));
    }

    #[test]
    #[should_panic(expected = "outside volume")]
    fn voxel_out_of_range() {
        let volume = ParametricVolume::zeros([2, 2, 2]);
        volume.parameters([0, 2, 0]);
    }

    #[test]
    #[should_panic]
    fn mismatched_array_is_rejected() {
        DynamicVolume::from_array([2, 2, 2], Array2::zeros((7, 3)));
    }
}
