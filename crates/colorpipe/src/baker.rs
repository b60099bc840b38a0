//! LUT baking.
//!
//! Samples a processor into a 1D or 3D table so applications without a
//! color engine can reproduce the pipeline, and writes the table as
//! `.cube`.
//!
//! # Example
//!
//! ```
//! use colorpipe::{Baker, OptimizationFlags, Processor};
//! use colorpipe::op::Op;
//!
//! let processor = Processor::from_ops(
//!     vec![Op::clamp(Some(0.0), Some(0.5))],
//!     OptimizationFlags::NONE,
//! );
//! let lut = Baker::new(&processor).bake_lut3d(17).unwrap();
//! assert_eq!(lut.size, 17);
//! ```

use std::path::Path;

use colorpipe_lut::{Lut1D, Lut3D, LutError};
use tracing::debug;

use crate::error::{ColorError, ColorResult};
use crate::processor::Processor;

/// Samples a [`Processor`] into lookup tables.
#[derive(Debug, Clone, Copy)]
pub struct Baker<'a> {
    processor: &'a Processor,
    domain_min: f32,
    domain_max: f32,
}

impl<'a> Baker<'a> {
    /// Creates a baker over the unit input domain.
    pub fn new(processor: &'a Processor) -> Self {
        Self {
            processor,
            domain_min: 0.0,
            domain_max: 1.0,
        }
    }

    /// Sets the input domain, shared by all channels.
    pub fn with_domain(mut self, min: f32, max: f32) -> Self {
        self.domain_min = min;
        self.domain_max = max;
        self
    }

    /// Input domain as `(min, max)`.
    #[inline]
    pub fn domain(&self) -> (f32, f32) {
        (self.domain_min, self.domain_max)
    }

    /// Bakes `size` entries per channel.
    ///
    /// Inputs are sampled on the neutral axis, so channel crosstalk in the
    /// pipeline is not captured.
    pub fn bake_lut1d(&self, size: usize) -> ColorResult<Lut1D> {
        let lut = Lut1D::from_fn(size, self.domain_min, self.domain_max, |v| {
            self.processor.apply_rgb_pixel([v, v, v])
        })
        .map_err(bake_error)?;
        debug!(size, ops = self.processor.num_ops(), "baked 1D LUT");
        Ok(lut)
    }

    /// Bakes a `size^3` cube.
    pub fn bake_lut3d(&self, size: usize) -> ColorResult<Lut3D> {
        let min = [self.domain_min; 3];
        let max = [self.domain_max; 3];
        let lut = Lut3D::from_fn(size, min, max, |rgb| self.processor.apply_rgb_pixel(rgb))
            .map_err(bake_error)?;
        debug!(size, ops = self.processor.num_ops(), "baked 3D LUT");
        Ok(lut)
    }

    /// Bakes a 1D table and writes it to `path` as `.cube`.
    pub fn write_cube_1d(&self, path: impl AsRef<Path>, size: usize) -> ColorResult<Lut1D> {
        let path = path.as_ref();
        let lut = self.bake_lut1d(size)?;
        colorpipe_lut::write_cube_1d(path, &lut).map_err(|source| ColorError::LutWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(lut)
    }

    /// Bakes a cube and writes it to `path` as `.cube`.
    pub fn write_cube_3d(&self, path: impl AsRef<Path>, size: usize) -> ColorResult<Lut3D> {
        let path = path.as_ref();
        let lut = self.bake_lut3d(size)?;
        colorpipe_lut::write_cube_3d(path, &lut).map_err(|source| ColorError::LutWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(lut)
    }
}

fn bake_error(e: LutError) -> ColorError {
    ColorError::Validation(format!("cannot bake LUT: {}", e))
}
