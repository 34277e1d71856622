use indicatif::{ProgressBar, ProgressStyle};

/// Per-voxel progress of a whole-volume operation
///
/// Hidden unless requested. [`ProgressBar`] is shareable across the rayon
/// workers, so every worker ticks the same bar.
pub(crate) struct VoxelProgress(Option<ProgressBar>);

impl VoxelProgress {
    pub(crate) fn new(operation: &'static str, num_voxels: usize, show: bool) -> Self {
        if !show {
            return VoxelProgress(None);
        }
        let bar = ProgressBar::new(num_voxels as u64).with_message(operation);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg}: [{elapsed_precise}] {wide_bar} {pos}/{len} voxels ({eta_precise})")
        {
            bar.set_style(style);
        }
        VoxelProgress(Some(bar))
    }

    #[inline]
    pub(crate) fn inc(&self) {
        if let Some(bar) = &self.0 {
            bar.inc(1);
        }
    }

    pub(crate) fn finish(self) {
        if let Some(bar) = self.0 {
            bar.finish();
        }
    }
}
