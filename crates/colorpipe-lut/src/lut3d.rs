//! 3-dimensional lookup table.
//!
//! A 3D LUT maps RGB input to RGB output through a cube of samples. Inputs
//! are normalized by the per-channel domain and clamped to the cube.

use serde::{Deserialize, Serialize};

use crate::{Interpolation, LutError, LutResult};

/// A 3-dimensional lookup table.
///
/// # Structure
///
/// - `size^3` RGB samples
/// - red varies fastest, then green, then blue
///
/// # Example
///
/// ```rust
/// use colorpipe_lut::Lut3D;
///
/// let lut = Lut3D::identity(17);
/// let out = lut.apply([0.5, 0.3, 0.8]);
/// assert!((out[0] - 0.5).abs() < 1e-5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lut3D {
    /// Samples, red fastest.
    pub data: Vec<[f32; 3]>,
    /// Cube edge length.
    pub size: usize,
    /// Input domain minimum (per channel).
    pub domain_min: [f32; 3],
    /// Input domain maximum (per channel).
    pub domain_max: [f32; 3],
    /// Interpolation method.
    pub interpolation: Interpolation,
}

impl Lut3D {
    /// Creates an identity 3D LUT over `[0, 1]^3`.
    pub fn identity(size: usize) -> Self {
        let size = size.max(2);
        let n = (size - 1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    data.push([r as f32 / n, g as f32 / n, b as f32 / n]);
                }
            }
        }
        Self {
            data,
            size,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            interpolation: Interpolation::Linear,
        }
    }

    /// Creates a 3D LUT from raw data (red fastest, `size^3` entries).
    pub fn from_data(data: Vec<[f32; 3]>, size: usize) -> LutResult<Self> {
        if size < 2 {
            return Err(LutError::InvalidSize(format!("3D LUT edge must be >= 2, got {}", size)));
        }
        let expected = size * size * size;
        if data.len() != expected {
            return Err(LutError::InvalidSize(format!(
                "expected {} entries for size {}, got {}",
                expected,
                size,
                data.len()
            )));
        }
        Ok(Self {
            data,
            size,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            interpolation: Interpolation::Linear,
        })
    }

    /// Samples `f` on a `size^3` grid spanning `[min, max]`.
    pub fn from_fn<F>(size: usize, min: [f32; 3], max: [f32; 3], mut f: F) -> LutResult<Self>
    where
        F: FnMut([f32; 3]) -> [f32; 3],
    {
        if size < 2 {
            return Err(LutError::InvalidSize(format!("3D LUT edge must be >= 2, got {}", size)));
        }
        for ch in 0..3 {
            if !(max[ch] > min[ch]) {
                return Err(LutError::InvalidDomain {
                    min: min[ch],
                    max: max[ch],
                });
            }
        }
        let n = (size - 1) as f32;
        let at = |ch: usize, i: usize| min[ch] + (max[ch] - min[ch]) * i as f32 / n;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    data.push(f([at(0, r), at(1, g), at(2, b)]));
                }
            }
        }
        Ok(Self {
            data,
            size,
            domain_min: min,
            domain_max: max,
            interpolation: Interpolation::Linear,
        })
    }

    /// Sets the input domain.
    pub fn with_domain(mut self, min: [f32; 3], max: [f32; 3]) -> Self {
        self.domain_min = min;
        self.domain_max = max;
        self
    }

    /// Sets the interpolation method.
    pub fn with_interpolation(mut self, interp: Interpolation) -> Self {
        self.interpolation = interp;
        self
    }

    /// Total number of samples.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.size * self.size * self.size
    }

    #[inline]
    fn index(&self, r: usize, g: usize, b: usize) -> usize {
        (b * self.size + g) * self.size + r
    }

    /// Sample at grid position (r, g, b).
    #[inline]
    pub fn get(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[self.index(r, g, b)]
    }

    /// Applies the LUT with its configured interpolation.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        self.apply_with(rgb, self.interpolation)
    }

    /// Applies the LUT with an explicit interpolation.
    pub fn apply_with(&self, rgb: [f32; 3], interp: Interpolation) -> [f32; 3] {
        match interp {
            Interpolation::Nearest => self.apply_nearest(rgb),
            Interpolation::Linear => self.apply_trilinear(rgb),
            Interpolation::Tetrahedral => self.apply_tetrahedral(rgb),
        }
    }

    fn normalize(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for ch in 0..3 {
            let range = self.domain_max[ch] - self.domain_min[ch];
            out[ch] = ((rgb[ch] - self.domain_min[ch]) / range).clamp(0.0, 1.0);
        }
        out
    }

    fn apply_nearest(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = (self.size - 1) as f32;
        let [r, g, b] = self.normalize(rgb);
        let idx = |v: f32| ((v * n).round() as usize).min(self.size - 1);
        self.get(idx(r), idx(g), idx(b))
    }

    /// Cell origin and fractional position for a normalized input.
    fn cell(&self, v: f32) -> (usize, f32) {
        let n = (self.size - 1) as f32;
        let i = ((v * n).floor() as usize).min(self.size - 2);
        (i, v * n - i as f32)
    }

    fn apply_trilinear(&self, rgb: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = self.normalize(rgb);
        let (ri, rf) = self.cell(r);
        let (gi, gf) = self.cell(g);
        let (bi, bf) = self.cell(b);

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let c00 = c000[i] + (c100[i] - c000[i]) * rf;
            let c10 = c010[i] + (c110[i] - c010[i]) * rf;
            let c01 = c001[i] + (c101[i] - c001[i]) * rf;
            let c11 = c011[i] + (c111[i] - c011[i]) * rf;
            let c0 = c00 + (c10 - c00) * gf;
            let c1 = c01 + (c11 - c01) * gf;
            out[i] = c0 + (c1 - c0) * bf;
        }
        out
    }

    fn apply_tetrahedral(&self, rgb: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = self.normalize(rgb);
        let (ri, rf) = self.cell(r);
        let (gi, gf) = self.cell(g);
        let (bi, bf) = self.cell(b);

        let c000 = self.get(ri, gi, bi);
        let c100 = self.get(ri + 1, gi, bi);
        let c010 = self.get(ri, gi + 1, bi);
        let c110 = self.get(ri + 1, gi + 1, bi);
        let c001 = self.get(ri, gi, bi + 1);
        let c101 = self.get(ri + 1, gi, bi + 1);
        let c011 = self.get(ri, gi + 1, bi + 1);
        let c111 = self.get(ri + 1, gi + 1, bi + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            out[i] = if rf > gf {
                if gf > bf {
                    c000[i]
                        + rf * (c100[i] - c000[i])
                        + gf * (c110[i] - c100[i])
                        + bf * (c111[i] - c110[i])
                } else if rf > bf {
                    c000[i]
                        + rf * (c100[i] - c000[i])
                        + bf * (c101[i] - c100[i])
                        + gf * (c111[i] - c101[i])
                } else {
                    c000[i]
                        + bf * (c001[i] - c000[i])
                        + rf * (c101[i] - c001[i])
                        + gf * (c111[i] - c101[i])
                }
            } else if gf > bf {
                if rf > bf {
                    c000[i]
                        + gf * (c010[i] - c000[i])
                        + rf * (c110[i] - c010[i])
                        + bf * (c111[i] - c110[i])
                } else {
                    c000[i]
                        + gf * (c010[i] - c000[i])
                        + bf * (c011[i] - c010[i])
                        + rf * (c111[i] - c011[i])
                }
            } else {
                c000[i]
                    + bf * (c001[i] - c000[i])
                    + gf * (c011[i] - c001[i])
                    + rf * (c111[i] - c011[i])
            };
        }
        out
    }

    /// Finds the input that maps to `target` by damped Newton iteration.
    ///
    /// The search runs on the normalized cube, so the result is always
    /// inside the domain. Non-bijective tables yield the nearest solution
    /// reached from the identity guess.
    pub fn invert_rgb(&self, target: [f32; 3]) -> [f32; 3] {
        const MAX_ITERS: usize = 30;
        const TOLERANCE: f32 = 1e-6;
        const DAMPING: f32 = 0.8;
        const DELTA: f32 = 1e-4;

        let denorm = |p: [f32; 3]| {
            let mut out = [0.0; 3];
            for ch in 0..3 {
                out[ch] = self.domain_min[ch] + p[ch] * (self.domain_max[ch] - self.domain_min[ch]);
            }
            out
        };

        let mut guess = self.normalize(target);
        for _ in 0..MAX_ITERS {
            let eval = self.apply_with(denorm(guess), Interpolation::Tetrahedral);
            let err = [eval[0] - target[0], eval[1] - target[1], eval[2] - target[2]];
            if (err[0] * err[0] + err[1] * err[1] + err[2] * err[2]).sqrt() < TOLERANCE {
                break;
            }

            let mut jacobian = [[0.0f32; 3]; 3];
            for j in 0..3 {
                let mut nudged = guess;
                let step = if nudged[j] + DELTA > 1.0 {
                    -DELTA
                } else {
                    DELTA
                };
                nudged[j] += step;
                let eval_nudged = self.apply_with(denorm(nudged), Interpolation::Tetrahedral);
                for i in 0..3 {
                    jacobian[i][j] = (eval_nudged[i] - eval[i]) / step;
                }
            }

            let Some(dx) = solve_3x3(&jacobian, &[-err[0], -err[1], -err[2]]) else {
                break;
            };
            for ch in 0..3 {
                guess[ch] = (guess[ch] + DAMPING * dx[ch]).clamp(0.0, 1.0);
            }
        }
        denorm(guess)
    }

    /// Bakes the inverse into a forward table of the same size and domain.
    pub fn invert(&self) -> LutResult<Self> {
        let inv = Self::from_fn(self.size, self.domain_min, self.domain_max, |rgb| {
            self.invert_rgb(rgb)
        })?;
        Ok(inv.with_interpolation(self.interpolation))
    }

    /// True if every sample equals its grid position within `tolerance`.
    pub fn is_identity(&self, tolerance: f32) -> bool {
        let n = (self.size - 1) as f32;
        let at = |ch: usize, i: usize| {
            self.domain_min[ch] + (self.domain_max[ch] - self.domain_min[ch]) * i as f32 / n
        };
        for b in 0..self.size {
            for g in 0..self.size {
                for r in 0..self.size {
                    let v = self.get(r, g, b);
                    if (v[0] - at(0, r)).abs() > tolerance
                        || (v[1] - at(1, g)).abs() > tolerance
                        || (v[2] - at(2, b)).abs() > tolerance
                    {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Solves `a * x = b` by Cramer's rule; `None` for singular systems.
fn solve_3x3(a: &[[f32; 3]; 3], b: &[f32; 3]) -> Option<[f32; 3]> {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }

    let det_x = b[0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (b[1] * a[2][2] - a[1][2] * b[2])
        + a[0][2] * (b[1] * a[2][1] - a[1][1] * b[2]);
    let det_y = a[0][0] * (b[1] * a[2][2] - a[1][2] * b[2])
        - b[0] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * b[2] - b[1] * a[2][0]);
    let det_z = a[0][0] * (a[1][1] * b[2] - b[1] * a[2][1])
        - a[0][1] * (a[1][0] * b[2] - b[1] * a[2][0])
        + b[0] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);

    Some([det_x / det, det_y / det, det_z / det])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled(size: usize) -> Lut3D {
        Lut3D::from_fn(size, [0.0; 3], [1.0; 3], |[r, g, b]| {
            [r * 0.5, g * 0.8 + 0.1, b * b]
        })
        .unwrap()
    }

    #[test]
    fn test_identity() {
        let lut = Lut3D::identity(17);
        let out = lut.apply([0.5, 0.3, 0.8]);
        assert!((out[0] - 0.5).abs() < 1e-5);
        assert!((out[1] - 0.3).abs() < 1e-5);
        assert!((out[2] - 0.8).abs() < 1e-5);
        assert!(lut.is_identity(1e-6));
    }

    #[test]
    fn test_corners() {
        let lut = Lut3D::identity(33);
        assert_eq!(lut.apply([0.0, 0.0, 0.0]), [0.0, 0.0, 0.0]);
        let red = lut.apply([1.0, 0.0, 0.0]);
        assert!((red[0] - 1.0).abs() < 1e-6);
        assert!(red[1].abs() < 1e-6);
    }

    #[test]
    fn red_varies_fastest() {
        let lut = Lut3D::identity(2);
        assert_eq!(lut.data[1], [1.0, 0.0, 0.0]);
        assert_eq!(lut.data[2], [0.0, 1.0, 0.0]);
        assert_eq!(lut.data[4], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn tetrahedral_matches_linear_on_affine_data() {
        let lut =
            Lut3D::from_fn(9, [0.0; 3], [1.0; 3], |[r, g, b]| [0.2 * r + 0.5 * g, b, r]).unwrap();
        let rgb = [0.37, 0.61, 0.12];
        let lin = lut.apply_with(rgb, Interpolation::Linear);
        let tet = lut.apply_with(rgb, Interpolation::Tetrahedral);
        for i in 0..3 {
            assert!((lin[i] - tet[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn newton_inverse() {
        let lut = scaled(33);
        let rgb = [0.4, 0.7, 0.6];
        let fwd = lut.apply_with(rgb, Interpolation::Tetrahedral);
        let back = lut.invert_rgb(fwd);
        for i in 0..3 {
            assert!((back[i] - rgb[i]).abs() < 1e-3, "{:?} vs {:?}", back, rgb);
        }
    }

    #[test]
    fn test_from_data() {
        let data: Vec<[f32; 3]> = (0..8).map(|_| [0.5, 0.5, 0.5]).collect();
        let lut = Lut3D::from_data(data, 2).unwrap();
        assert_eq!(lut.apply([0.5, 0.5, 0.5]), [0.5, 0.5, 0.5]);
        assert!(Lut3D::from_data(vec![[0.0; 3]; 7], 2).is_err());
    }
}
