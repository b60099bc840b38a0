//! Compiled color pipelines.
//!
//! A [`Processor`] holds the flat op list a request expanded into, its
//! optimized form and the provenance of the build (files, looks, consulted
//! context variables). Processors are immutable once built and are shared
//! between threads through `Arc`.
//!
//! # Example
//!
//! ```
//! use colorpipe::{OptimizationFlags, Processor};
//! use colorpipe::op::Op;
//!
//! let processor = Processor::from_ops(
//!     vec![Op::Exponent { value: [2.0; 4], negative_style: Default::default(), fast: false }],
//!     OptimizationFlags::LOSSLESS,
//! );
//! let mut rgb = [0.5f32, 0.5, 0.5];
//! processor.apply_rgb(&mut rgb).unwrap();
//! assert!((rgb[0] - 0.25).abs() < 1e-6);
//! ```

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::builder::Built;
use crate::context::UsedVars;
use crate::cpu::{PackedImage, PlanarImage};
use crate::error::{ColorError, ColorResult};
use crate::gpu::{self, GpuShader, GpuShaderDesc};
use crate::op::Op;
use crate::optimizer::{optimize, OptimizationFlags};

/// Where a processor's ops came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorMetadata {
    files: Vec<String>,
    looks: Vec<String>,
}

impl ProcessorMetadata {
    /// LUT files loaded by the build, resolved, in first-use order.
    #[inline]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Looks applied by the build, in first-use order.
    #[inline]
    pub fn looks(&self) -> &[String] {
        &self.looks
    }

    pub(crate) fn add_file(&mut self, file: String) {
        if !self.files.contains(&file) {
            self.files.push(file);
        }
    }

    pub(crate) fn add_look(&mut self, look: &str) {
        if !self.looks.iter().any(|l| l == look) {
            self.looks.push(look.to_string());
        }
    }
}

/// Compiled, optimized color pipeline.
#[derive(Debug, Clone)]
pub struct Processor {
    raw: Vec<Op>,
    ops: Vec<Op>,
    flags: OptimizationFlags,
    metadata: ProcessorMetadata,
    used_vars: UsedVars,
    cache_id: String,
}

impl Processor {
    pub(crate) fn new(built: Built, flags: OptimizationFlags) -> Self {
        let Built { ops, used, metadata } = built;
        Self::assemble(ops, flags, metadata, used)
    }

    /// Builds a processor straight from ops, optimized with `flags`.
    pub fn from_ops(ops: Vec<Op>, flags: OptimizationFlags) -> Self {
        Self::assemble(ops, flags, ProcessorMetadata::default(), UsedVars::new())
    }

    fn assemble(
        raw: Vec<Op>,
        flags: OptimizationFlags,
        metadata: ProcessorMetadata,
        used_vars: UsedVars,
    ) -> Self {
        let ops = optimize(&raw, flags);
        let cache_id = ops_cache_id(&ops);
        Self {
            raw,
            ops,
            flags,
            metadata,
            used_vars,
            cache_id,
        }
    }

    /// Optimized ops, in evaluation order.
    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Ops as built, before optimization.
    #[inline]
    pub fn raw_ops(&self) -> &[Op] {
        &self.raw
    }

    /// Flags the ops were optimized with.
    #[inline]
    pub fn flags(&self) -> OptimizationFlags {
        self.flags
    }

    /// Build provenance.
    #[inline]
    pub fn metadata(&self) -> &ProcessorMetadata {
        &self.metadata
    }

    /// Context variables consulted by the build, with the values seen.
    #[inline]
    pub fn used_vars(&self) -> &UsedVars {
        &self.used_vars
    }

    /// Hex SHA-256 over the optimized ops.
    ///
    /// Processors with equal ids evaluate identically.
    #[inline]
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Number of optimized ops.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// True if the optimized pipeline is empty.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }

    /// Same pipeline optimized with other flags.
    pub fn optimized(&self, flags: OptimizationFlags) -> Processor {
        Self::assemble(
            self.raw.clone(),
            flags,
            self.metadata.clone(),
            self.used_vars.clone(),
        )
    }

    /// Reverse pipeline, built from the unoptimized ops.
    pub fn inverse(&self) -> ColorResult<Processor> {
        let raw = self.raw.iter().rev().map(Op::inverse).collect::<ColorResult<Vec<_>>>()?;
        Ok(Self::assemble(
            raw,
            self.flags,
            self.metadata.clone(),
            self.used_vars.clone(),
        ))
    }

    /// Evaluates one RGBA pixel.
    pub fn apply_pixel(&self, px: [f32; 4]) -> [f32; 4] {
        let mut v = px.map(f64::from);
        for op in &self.ops {
            v = op.apply(v);
        }
        v.map(|x| x as f32)
    }

    /// Evaluates one RGB pixel; alpha is treated as 1.
    pub fn apply_rgb_pixel(&self, rgb: [f32; 3]) -> [f32; 3] {
        let out = self.apply_pixel([rgb[0], rgb[1], rgb[2], 1.0]);
        [out[0], out[1], out[2]]
    }

    /// Processes packed RGB floats in place.
    pub fn apply_rgb(&self, pixels: &mut [f32]) -> ColorResult<()> {
        check_len(pixels.len(), 3)?;
        for px in pixels.chunks_exact_mut(3) {
            let out = self.apply_rgb_pixel([px[0], px[1], px[2]]);
            px.copy_from_slice(&out);
        }
        trace!(pixels = pixels.len() / 3, ops = self.ops.len(), "applied RGB");
        Ok(())
    }

    /// Processes packed RGBA floats in place.
    pub fn apply_rgba(&self, pixels: &mut [f32]) -> ColorResult<()> {
        check_len(pixels.len(), 4)?;
        for px in pixels.chunks_exact_mut(4) {
            let out = self.apply_pixel([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
        trace!(pixels = pixels.len() / 4, ops = self.ops.len(), "applied RGBA");
        Ok(())
    }

    /// Processes a packed image of any supported bit depth in place.
    pub fn apply(&self, image: &mut PackedImage<'_>) {
        image.for_each_pixel(|px| self.apply_pixel(px));
    }

    /// Processes a planar image in place.
    pub fn apply_planar(&self, image: &mut PlanarImage<'_>) {
        image.for_each_pixel(|px| self.apply_pixel(px));
    }

    /// Shader implementing the optimized pipeline.
    pub fn gpu_shader(&self, desc: &GpuShaderDesc) -> ColorResult<GpuShader> {
        gpu::generate(&self.ops, desc)
    }
}

fn check_len(len: usize, channels: usize) -> ColorResult<()> {
    if len % channels != 0 {
        return Err(ColorError::buffer(format!(
            "buffer length {} is not a multiple of {} channels",
            len, channels
        )));
    }
    Ok(())
}

pub(crate) fn ops_cache_id(ops: &[Op]) -> String {
    let mut hasher = Sha256::new();
    for op in ops {
        op.hash_into(&mut hasher);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{BitDepth, PixelData};
    use crate::transform::NegativeStyle;
    use crate::ErrorKind;

    fn gamma(v: f64) -> Op {
        Op::Exponent {
            value: [v, v, v, 1.0],
            negative_style: NegativeStyle::Clamp,
            fast: false,
        }
    }

    fn scale(s: f64) -> Op {
        let mut matrix = crate::op::IDENTITY_MATRIX;
        matrix[0] = s;
        matrix[5] = s;
        matrix[10] = s;
        Op::Matrix {
            matrix,
            offset: [0.0; 4],
        }
    }

    #[test]
    fn packed_lengths_are_checked() {
        let processor = Processor::from_ops(vec![gamma(2.0)], OptimizationFlags::LOSSLESS);
        for len in [1, 2, 4, 5] {
            let mut buf = vec![0.5f32; len];
            let err = processor.apply_rgb(&mut buf).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Type);
        }
        for len in [3, 5, 6] {
            let mut buf = vec![0.5f32; len];
            assert!(processor.apply_rgba(&mut buf).is_err());
        }
        let mut ok = vec![0.5f32; 8];
        processor.apply_rgba(&mut ok).unwrap();
        assert!((ok[0] - 0.25).abs() < 1e-6);
        assert_eq!(ok[3], 0.5);
        processor.apply_rgb(&mut []).unwrap();
    }

    #[test]
    fn optimization_keeps_raw_ops() {
        let ops = vec![scale(2.0), scale(0.5)];
        let processor = Processor::from_ops(ops, OptimizationFlags::DEFAULT);
        assert_eq!(processor.raw_ops().len(), 2);
        assert!(processor.is_noop());

        let lossless = processor.optimized(OptimizationFlags::NONE);
        assert_eq!(lossless.num_ops(), 2);
        assert_eq!(lossless.apply_rgb_pixel([0.3, 0.4, 0.5]), [0.3, 0.4, 0.5]);
    }

    #[test]
    fn inverse_round_trips() {
        let processor = Processor::from_ops(vec![scale(1.5), gamma(2.2)], OptimizationFlags::NONE);
        let inverse = processor.inverse().unwrap();
        let px = [0.18f32, 0.5, 0.9, 1.0];
        let back = inverse.apply_pixel(processor.apply_pixel(px));
        for c in 0..4 {
            assert!((back[c] - px[c]).abs() < 1e-5);
        }

        let ops = vec![Op::clamp(Some(0.0), Some(1.0))];
        let clamp = Processor::from_ops(ops, OptimizationFlags::NONE);
        assert_eq!(clamp.inverse().unwrap_err().kind(), ErrorKind::NotInvertible);
    }

    #[test]
    fn cache_id_tracks_content() {
        let a = Processor::from_ops(vec![gamma(2.0)], OptimizationFlags::DEFAULT);
        let b = Processor::from_ops(vec![gamma(2.0)], OptimizationFlags::DEFAULT);
        let c = Processor::from_ops(vec![gamma(2.2)], OptimizationFlags::DEFAULT);
        assert_eq!(a.cache_id(), b.cache_id());
        assert_ne!(a.cache_id(), c.cache_id());
    }

    #[test]
    fn images_use_bit_depth() {
        let processor = Processor::from_ops(vec![gamma(2.0)], OptimizationFlags::DEFAULT);
        let mut data = vec![255u8, 128, 0];
        let mut image =
            PackedImage::new(PixelData::U8(&mut data), 1, 1, 3, BitDepth::UInt8).unwrap();
        processor.apply(&mut image);
        assert_eq!(data, vec![255, 64, 0]);
    }

    #[test]
    fn metadata_dedupes() {
        let mut meta = ProcessorMetadata::default();
        meta.add_look("grade");
        meta.add_look("grade");
        meta.add_file("/luts/a.cube".into());
        meta.add_file("/luts/a.cube".into());
        assert_eq!(meta.looks(), ["grade"]);
        assert_eq!(meta.files().len(), 1);
    }
}
