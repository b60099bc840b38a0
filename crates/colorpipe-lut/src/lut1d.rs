//! 1-dimensional lookup table.
//!
//! A 1D LUT applies an independent curve to each color channel. Inputs are
//! mapped from `[domain_min, domain_max]` onto the table and clamped to it.

use serde::{Deserialize, Serialize};

use crate::{LutError, LutResult};

/// A 1-dimensional lookup table.
///
/// Each channel can have its own curve, or all channels share the red one
/// (mono LUT).
///
/// # Example
///
/// ```rust
/// use colorpipe_lut::Lut1D;
///
/// let lut = Lut1D::gamma(256, 2.0);
/// assert!((lut.apply(0.5) - 0.25).abs() < 0.01);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lut1D {
    /// Entries for red (or all channels if mono).
    pub r: Vec<f32>,
    /// Entries for green (`None` if mono).
    pub g: Option<Vec<f32>>,
    /// Entries for blue (`None` if mono).
    pub b: Option<Vec<f32>>,
    /// Input domain minimum.
    pub domain_min: f32,
    /// Input domain maximum.
    pub domain_max: f32,
}

impl Lut1D {
    /// Creates an identity 1D LUT over `[0, 1]`.
    ///
    /// ```rust
    /// use colorpipe_lut::Lut1D;
    ///
    /// let lut = Lut1D::identity(256);
    /// assert!((lut.apply(0.5) - 0.5).abs() < 1e-6);
    /// ```
    pub fn identity(size: usize) -> Self {
        let size = size.max(2);
        let entries = (0..size).map(|i| i as f32 / (size - 1) as f32).collect();
        Self {
            r: entries,
            g: None,
            b: None,
            domain_min: 0.0,
            domain_max: 1.0,
        }
    }

    /// Creates a power curve LUT over `[0, 1]`.
    pub fn gamma(size: usize, gamma: f32) -> Self {
        let size = size.max(2);
        let entries = (0..size)
            .map(|i| (i as f32 / (size - 1) as f32).powf(gamma))
            .collect();
        Self {
            r: entries,
            g: None,
            b: None,
            domain_min: 0.0,
            domain_max: 1.0,
        }
    }

    /// Creates a mono LUT from raw data.
    pub fn from_data(data: Vec<f32>, domain_min: f32, domain_max: f32) -> LutResult<Self> {
        if data.len() < 2 {
            return Err(LutError::InvalidSize("1D LUT needs at least 2 entries".into()));
        }
        check_domain(domain_min, domain_max)?;
        Ok(Self {
            r: data,
            g: None,
            b: None,
            domain_min,
            domain_max,
        })
    }

    /// Creates a 3-channel LUT from separate channel data.
    pub fn from_rgb(
        r: Vec<f32>,
        g: Vec<f32>,
        b: Vec<f32>,
        domain_min: f32,
        domain_max: f32,
    ) -> LutResult<Self> {
        if r.len() < 2 {
            return Err(LutError::InvalidSize("1D LUT needs at least 2 entries".into()));
        }
        if r.len() != g.len() || r.len() != b.len() {
            return Err(LutError::InvalidSize("RGB channels must have same size".into()));
        }
        check_domain(domain_min, domain_max)?;
        Ok(Self {
            r,
            g: Some(g),
            b: Some(b),
            domain_min,
            domain_max,
        })
    }

    /// Samples `f` at `size` evenly spaced inputs across the domain.
    ///
    /// The closure receives the input value and returns the RGB output.
    pub fn from_fn<F>(size: usize, domain_min: f32, domain_max: f32, mut f: F) -> LutResult<Self>
    where
        F: FnMut(f32) -> [f32; 3],
    {
        if size < 2 {
            return Err(LutError::InvalidSize("1D LUT needs at least 2 entries".into()));
        }
        check_domain(domain_min, domain_max)?;
        let mut r = Vec::with_capacity(size);
        let mut g = Vec::with_capacity(size);
        let mut b = Vec::with_capacity(size);
        let step = (domain_max - domain_min) / (size - 1) as f32;
        for i in 0..size {
            let out = f(domain_min + step * i as f32);
            r.push(out[0]);
            g.push(out[1]);
            b.push(out[2]);
        }
        Self::from_rgb(r, g, b, domain_min, domain_max)
    }

    /// Number of entries per channel.
    #[inline]
    pub fn size(&self) -> usize {
        self.r.len()
    }

    /// True if all channels share one curve.
    #[inline]
    pub fn is_mono(&self) -> bool {
        self.g.is_none()
    }

    /// Table for channel `ch` (0 = R, 1 = G, 2 = B).
    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        match ch {
            1 => self.g.as_deref().unwrap_or(&self.r),
            2 => self.b.as_deref().unwrap_or(&self.r),
            _ => &self.r,
        }
    }

    /// Applies the red (mono) curve to one value.
    pub fn apply(&self, value: f32) -> f32 {
        self.apply_channel(0, value)
    }

    /// Applies the curve of channel `ch` to one value.
    pub fn apply_channel(&self, ch: usize, value: f32) -> f32 {
        let data = self.channel(ch);
        let size = data.len();
        let range = self.domain_max - self.domain_min;
        let t = if range.abs() < 1e-12 {
            0.0
        } else {
            ((value - self.domain_min) / range).clamp(0.0, 1.0)
        };

        let idx_f = t * (size - 1) as f32;
        let idx0 = (idx_f.floor() as usize).min(size - 1);
        let idx1 = (idx0 + 1).min(size - 1);
        let frac = idx_f - idx0 as f32;

        data[idx0] + (data[idx1] - data[idx0]) * frac
    }

    /// Applies the LUT to RGB values.
    pub fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        [
            self.apply_channel(0, rgb[0]),
            self.apply_channel(1, rgb[1]),
            self.apply_channel(2, rgb[2]),
        ]
    }

    /// Smallest and largest output value of channel `ch`.
    pub fn output_range(&self, ch: usize) -> (f32, f32) {
        self.channel(ch)
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// True if every channel is monotonic and not constant.
    ///
    /// Only such tables have a well defined inverse.
    pub fn is_invertible(&self) -> bool {
        (0..3).all(|ch| {
            let data = self.channel(ch);
            let rising = data.windows(2).all(|w| w[1] >= w[0]);
            let falling = data.windows(2).all(|w| w[1] <= w[0]);
            let (lo, hi) = self.output_range(ch);
            (rising || falling) && hi > lo
        })
    }

    /// Exact inverse of the piecewise-linear curve of channel `ch`.
    ///
    /// Values outside the output range clamp to the domain ends. Flat
    /// segments resolve to their first input.
    pub fn invert_channel_value(&self, ch: usize, value: f32) -> f32 {
        let data = self.channel(ch);
        let size = data.len();
        let rising = data[size - 1] >= data[0];
        let step = (self.domain_max - self.domain_min) / (size - 1) as f32;
        let input_at = |pos: f32| self.domain_min + pos * step;

        let (first, last) = (data[0], data[size - 1]);
        if rising {
            if value <= first {
                return input_at(0.0);
            }
            if value >= last {
                return input_at((size - 1) as f32);
            }
        } else {
            if value >= first {
                return input_at(0.0);
            }
            if value <= last {
                return input_at((size - 1) as f32);
            }
        }

        // Binary search for the segment that brackets the value.
        let mut lo = 0usize;
        let mut hi = size - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            let past = if rising {
                data[mid] >= value
            } else {
                data[mid] <= value
            };
            if past {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let (a, b) = (data[lo], data[hi]);
        let frac = if (b - a).abs() < f32::EPSILON {
            0.0
        } else {
            (value - a) / (b - a)
        };
        input_at(lo as f32 + frac)
    }

    /// Inverse curve of all three channels.
    pub fn invert_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        [
            self.invert_channel_value(0, rgb[0]),
            self.invert_channel_value(1, rgb[1]),
            self.invert_channel_value(2, rgb[2]),
        ]
    }

    /// Bakes the inverse into a forward table of `size` entries.
    ///
    /// The new domain is the union of the channel output ranges.
    pub fn invert(&self, size: usize) -> LutResult<Self> {
        if !self.is_invertible() {
            return Err(LutError::InvalidSize("1D LUT is not monotonic".into()));
        }
        let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
        for ch in 0..3 {
            let (l, h) = self.output_range(ch);
            lo = lo.min(l);
            hi = hi.max(h);
        }
        Self::from_fn(size, lo, hi, |v| self.invert_rgb([v, v, v]))
    }

    /// True if the table maps its domain onto itself within `tolerance`.
    pub fn is_identity(&self, tolerance: f32) -> bool {
        let size = self.size();
        let step = (self.domain_max - self.domain_min) / (size - 1) as f32;
        (0..3).all(|ch| {
            self.channel(ch)
                .iter()
                .enumerate()
                .all(|(i, &v)| (v - (self.domain_min + step * i as f32)).abs() <= tolerance)
        })
    }
}

fn check_domain(min: f32, max: f32) -> LutResult<()> {
    if !(max > min) || !min.is_finite() || !max.is_finite() {
        return Err(LutError::InvalidDomain { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let lut = Lut1D::identity(256);
        assert!((lut.apply(0.0) - 0.0).abs() < 1e-6);
        assert!((lut.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((lut.apply(1.0) - 1.0).abs() < 1e-6);
        assert!(lut.is_identity(1e-6));
    }

    #[test]
    fn test_gamma() {
        let lut = Lut1D::gamma(1024, 2.0);
        assert!((lut.apply(0.5) - 0.25).abs() < 1e-3);
        assert!(!lut.is_identity(1e-3));
    }

    #[test]
    fn clamps_outside_domain() {
        let lut = Lut1D::identity(16);
        assert_eq!(lut.apply(-1.0), 0.0);
        assert_eq!(lut.apply(2.0), 1.0);
    }

    #[test]
    fn inverse_value_matches_forward() {
        let lut = Lut1D::gamma(512, 2.2);
        for &x in &[0.1_f32, 0.3, 0.5, 0.9] {
            let y = lut.apply(x);
            assert!((lut.invert_channel_value(0, y) - x).abs() < 1e-4);
        }
    }

    #[test]
    fn falling_curve_inverts() {
        let lut = Lut1D::from_data(vec![1.0, 0.5, 0.0], 0.0, 1.0).unwrap();
        assert!(lut.is_invertible());
        assert!((lut.invert_channel_value(0, 0.75) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn constant_curve_not_invertible() {
        let lut = Lut1D::from_data(vec![0.5, 0.5, 0.5], 0.0, 1.0).unwrap();
        assert!(!lut.is_invertible());
        assert!(lut.invert(16).is_err());
    }

    #[test]
    fn baked_inverse() {
        let lut = Lut1D::gamma(256, 2.0);
        let inv = lut.invert(1024).unwrap();
        assert!((inv.apply(0.25) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(Lut1D::from_data(vec![0.0], 0.0, 1.0).is_err());
        assert!(Lut1D::from_data(vec![0.0, 1.0], 1.0, 1.0).is_err());
        assert!(Lut1D::from_rgb(vec![0.0, 1.0], vec![0.0], vec![0.0, 1.0], 0.0, 1.0).is_err());
    }
}
