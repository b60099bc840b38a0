//! CPU evaluation over pixel buffers.
//!
//! Buffers hold normalized integers (8, 10, 12 or 16 bit), half floats or
//! floats. Integer samples map `0..=max` onto `[0, 1]` on the way in and are
//! rounded and clamped on the way out. Evaluation is per pixel, so every
//! buffer is processed in place.
//!
//! # Example
//!
//! ```
//! use colorpipe::{BitDepth, PackedImage, PixelData};
//!
//! let mut pixels = vec![0u8, 128, 255, 255, 255, 255];
//! let image = PackedImage::new(PixelData::U8(&mut pixels), 2, 1, 3, BitDepth::UInt8).unwrap();
//! assert_eq!(image.pixel_count(), 2);
//! ```

use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{ColorError, ColorResult};

/// Per-channel numeric type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    UInt8,
    /// 10-bit unsigned integer stored in 16 bits.
    UInt10,
    /// 12-bit unsigned integer stored in 16 bits.
    UInt12,
    /// 16-bit unsigned integer.
    UInt16,
    /// 16-bit float.
    F16,
    /// 32-bit float.
    #[default]
    F32,
}

impl BitDepth {
    /// True for the float depths.
    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Significant bits per channel.
    pub fn bits(self) -> u32 {
        match self {
            Self::UInt8 => 8,
            Self::UInt10 => 10,
            Self::UInt12 => 12,
            Self::UInt16 | Self::F16 => 16,
            Self::F32 => 32,
        }
    }

    /// Integer code mapped to 1.0; 1.0 for float depths.
    pub fn max_value(self) -> f32 {
        if self.is_float() {
            1.0
        } else {
            ((1u32 << self.bits()) - 1) as f32
        }
    }
}

/// Channel samples of one buffer or plane.
#[derive(Debug)]
pub enum PixelData<'a> {
    /// 8-bit samples.
    U8(&'a mut [u8]),
    /// 10, 12 or 16-bit samples.
    U16(&'a mut [u16]),
    /// Half float samples.
    F16(&'a mut [f16]),
    /// Float samples.
    F32(&'a mut [f32]),
}

impl PixelData<'_> {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(d) => d.len(),
            Self::U16(d) => d.len(),
            Self::F16(d) => d.len(),
            Self::F32(d) => d.len(),
        }
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn accepts(&self, depth: BitDepth) -> bool {
        matches!(
            (self, depth),
            (Self::U8(_), BitDepth::UInt8)
                | (Self::U16(_), BitDepth::UInt10 | BitDepth::UInt12 | BitDepth::UInt16)
                | (Self::F16(_), BitDepth::F16)
                | (Self::F32(_), BitDepth::F32)
        )
    }

    #[inline]
    fn get(&self, i: usize, max: f32) -> f32 {
        match self {
            Self::U8(d) => d[i] as f32 / max,
            Self::U16(d) => d[i] as f32 / max,
            Self::F16(d) => d[i].to_f32(),
            Self::F32(d) => d[i],
        }
    }

    #[inline]
    fn set(&mut self, i: usize, v: f32, max: f32) {
        match self {
            Self::U8(d) => d[i] = quantize(v, max) as u8,
            Self::U16(d) => d[i] = quantize(v, max) as u16,
            Self::F16(d) => d[i] = f16::from_f32(v),
            Self::F32(d) => d[i] = v,
        }
    }
}

#[inline]
fn quantize(v: f32, max: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        (v * max).round().clamp(0.0, max)
    }
}

fn check_depth(data: &PixelData<'_>, depth: BitDepth) -> ColorResult<()> {
    if !data.accepts(depth) {
        return Err(ColorError::buffer(format!(
            "{:?} samples cannot hold {:?} data",
            data_kind(data),
            depth
        )));
    }
    Ok(())
}

fn data_kind(data: &PixelData<'_>) -> &'static str {
    match data {
        PixelData::U8(_) => "u8",
        PixelData::U16(_) => "u16",
        PixelData::F16(_) => "f16",
        PixelData::F32(_) => "f32",
    }
}

/// Interleaved RGB or RGBA image.
#[derive(Debug)]
pub struct PackedImage<'a> {
    data: PixelData<'a>,
    width: usize,
    height: usize,
    channels: usize,
    depth: BitDepth,
}

impl<'a> PackedImage<'a> {
    /// Wraps `data`; its length must be `width * height * channels` and
    /// `channels` must be 3 or 4.
    pub fn new(
        data: PixelData<'a>,
        width: usize,
        height: usize,
        channels: usize,
        depth: BitDepth,
    ) -> ColorResult<Self> {
        if channels != 3 && channels != 4 {
            return Err(ColorError::buffer(format!(
                "packed images need 3 or 4 channels, got {}",
                channels
            )));
        }
        check_depth(&data, depth)?;
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(ColorError::buffer(format!(
                "{}x{}x{} image needs {} samples, got {}",
                width,
                height,
                channels,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            depth,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sample type.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub(crate) fn for_each_pixel(&mut self, mut f: impl FnMut([f32; 4]) -> [f32; 4]) {
        let max = self.depth.max_value();
        let ch = self.channels;
        for p in 0..self.pixel_count() {
            let base = p * ch;
            let mut px = [0.0, 0.0, 0.0, 1.0];
            for (c, v) in px.iter_mut().enumerate().take(ch) {
                *v = self.data.get(base + c, max);
            }
            let out = f(px);
            for (c, v) in out.iter().enumerate().take(ch) {
                self.data.set(base + c, *v, max);
            }
        }
    }
}

/// Image stored as separate R, G, B and optional A planes.
#[derive(Debug)]
pub struct PlanarImage<'a> {
    r: PixelData<'a>,
    g: PixelData<'a>,
    b: PixelData<'a>,
    a: Option<PixelData<'a>>,
    depth: BitDepth,
}

impl<'a> PlanarImage<'a> {
    /// Wraps the planes; all of them must have the same length and type.
    pub fn new(
        r: PixelData<'a>,
        g: PixelData<'a>,
        b: PixelData<'a>,
        a: Option<PixelData<'a>>,
        depth: BitDepth,
    ) -> ColorResult<Self> {
        let len = r.len();
        for plane in [Some(&r), Some(&g), Some(&b), a.as_ref()].into_iter().flatten() {
            check_depth(plane, depth)?;
            if plane.len() != len {
                return Err(ColorError::buffer(format!(
                    "plane lengths differ: {} vs {}",
                    len,
                    plane.len()
                )));
            }
        }
        Ok(Self { r, g, b, a, depth })
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.r.len()
    }

    /// True if an alpha plane is present.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.a.is_some()
    }

    /// Sample type.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    pub(crate) fn for_each_pixel(&mut self, mut f: impl FnMut([f32; 4]) -> [f32; 4]) {
        let max = self.depth.max_value();
        for i in 0..self.pixel_count() {
            let alpha = self.a.as_ref().map_or(1.0, |a| a.get(i, max));
            let out = f([self.r.get(i, max), self.g.get(i, max), self.b.get(i, max), alpha]);
            self.r.set(i, out[0], max);
            self.g.set(i, out[1], max);
            self.b.set(i, out[2], max);
            if let Some(a) = self.a.as_mut() {
                a.set(i, out[3], max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_ranges() {
        assert_eq!(BitDepth::UInt8.max_value(), 255.0);
        assert_eq!(BitDepth::UInt10.max_value(), 1023.0);
        assert_eq!(BitDepth::UInt12.max_value(), 4095.0);
        assert_eq!(BitDepth::F16.max_value(), 1.0);
        assert!(BitDepth::F16.is_float());
        assert_eq!(BitDepth::default(), BitDepth::F32);
    }

    #[test]
    fn packed_shape_checks() {
        let mut data = vec![0.0f32; 12];
        assert!(PackedImage::new(PixelData::F32(&mut data), 2, 2, 3, BitDepth::F32).is_ok());
        let err = PackedImage::new(PixelData::F32(&mut data), 2, 2, 4, BitDepth::F32).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Type);
        assert!(PackedImage::new(PixelData::F32(&mut data), 3, 2, 2, BitDepth::F32).is_err());
        assert!(PackedImage::new(PixelData::F32(&mut data), 2, 2, 3, BitDepth::UInt8).is_err());
    }

    #[test]
    fn integer_round_trip_quantizes() {
        let (mut r, mut g, mut b) = (vec![0u16], vec![512u16], vec![1023u16]);
        let mut image = PlanarImage::new(
            PixelData::U16(&mut r),
            PixelData::U16(&mut g),
            PixelData::U16(&mut b),
            None,
            BitDepth::UInt10,
        )
        .unwrap();
        image.for_each_pixel(|px| [px[0] + 0.5, px[1] * 2.0, px[2] + 1.0, px[3]]);
        assert_eq!(r[0], 512);
        assert_eq!(g[0], 1023);
        assert_eq!(b[0], 1023);
    }

    #[test]
    fn half_and_alpha() {
        let mut data: Vec<f16> = [0.5f32, 0.25, 1.0, 0.5]
            .iter()
            .map(|v| f16::from_f32(*v))
            .collect();
        let mut image =
            PackedImage::new(PixelData::F16(&mut data), 1, 1, 4, BitDepth::F16).unwrap();
        image.for_each_pixel(|px| px.map(|v| v * 2.0));
        assert_eq!(data[3].to_f32(), 1.0);
        assert_eq!(data[1].to_f32(), 0.5);
    }
}
