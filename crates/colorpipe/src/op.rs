//! Concrete pipeline operators.
//!
//! An [`Op`] is one executable stage of a processor. Ops evaluate in f64 on
//! RGBA pixels, know their own inverse, and expose the structural queries
//! the optimizer needs (identity detection, inverse pairs, composition).

use std::sync::Arc;

use glam::DMat4;
use sha2::{Digest, Sha256};

use colorpipe_lut::{Lut1D, Lut3D};

use crate::error::{ColorError, ColorResult};
use crate::fast_math;
use crate::fixed_function;
use crate::transform::{CdlStyle, ExposureContrastStyle, FixedFunctionStyle, NegativeStyle};

/// Smallest argument fed to a logarithm.
const LOG_MIN: f64 = f32::MIN_POSITIVE as f64;
/// Rec.709 luma weights used by CDL saturation.
const CDL_LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];
/// Video-style exposure/contrast exponent.
const VIDEO_POWER: f64 = 0.54644808743;
/// Parameter comparison tolerance for pair detection.
const PARAM_EPS: f64 = 1e-9;

/// Identity 4x4 matrix, row-major.
pub const IDENTITY_MATRIX: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Result of simplifying an op or an adjacent pair of ops.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reduction {
    /// Drop entirely.
    Remove,
    /// Replace by a cheaper op (usually a clamp).
    Replace(Op),
}

/// Pipeline operator.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Op {
    /// `out = matrix * in + offset` on RGBA.
    Matrix { matrix: [f64; 16], offset: [f64; 4] },
    /// `out = clamp(in * scale + offset)` on RGB.
    Range {
        scale: f64,
        offset: f64,
        clamp_min: Option<f64>,
        clamp_max: Option<f64>,
    },
    /// Per-channel power on RGBA.
    Exponent {
        value: [f64; 4],
        negative_style: NegativeStyle,
        fast: bool,
    },
    /// Power with linear toe; forward decodes to linear.
    ExponentWithLinear {
        gamma: [f64; 4],
        offset: [f64; 4],
        negative_style: NegativeStyle,
        forward: bool,
        fast: bool,
    },
    /// Log family curve; forward is linear to log.
    Log {
        curve: LogCurve,
        forward: bool,
        fast: bool,
    },
    /// ASC CDL.
    Cdl {
        slope: [f64; 3],
        offset: [f64; 3],
        power: [f64; 3],
        saturation: f64,
        style: CdlStyle,
        forward: bool,
    },
    /// Exposure/contrast.
    ExposureContrast {
        exposure: f64,
        contrast: f64,
        gamma: f64,
        pivot: f64,
        log_exposure_step: f64,
        log_midway_gray: f64,
        style: ExposureContrastStyle,
        forward: bool,
    },
    /// Fixed function.
    FixedFunction {
        style: FixedFunctionStyle,
        params: Vec<f64>,
        forward: bool,
    },
    /// 1D LUT; inverse evaluates the exact inverse curve.
    Lut1D { lut: Arc<Lut1D>, forward: bool },
    /// 3D LUT; inverse solves per pixel.
    Lut3D { lut: Arc<Lut3D>, forward: bool },
}

/// Precomputed log family curve (plain, affine or camera).
///
/// Encoding (linear to log) is
/// `log_slope * log_base(lin_slope * x + lin_offset) + log_offset`,
/// replaced by `linear_slope * x + linear_offset` below `lin_break`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogCurve {
    /// Logarithm base.
    pub base: f64,
    /// Log side slope.
    pub log_slope: [f64; 3],
    /// Log side offset.
    pub log_offset: [f64; 3],
    /// Linear side slope.
    pub lin_slope: [f64; 3],
    /// Linear side offset.
    pub lin_offset: [f64; 3],
    /// Linear side break, for camera curves.
    pub lin_break: Option<[f64; 3]>,
    /// Slope of the linear segment.
    pub linear_slope: [f64; 3],
    /// Offset of the linear segment.
    pub linear_offset: [f64; 3],
}

impl LogCurve {
    /// `log_base(x)`.
    pub fn plain(base: f64) -> Self {
        Self::affine(base, [1.0; 3], [0.0; 3], [1.0; 3], [0.0; 3])
    }

    /// Affine log without a linear segment.
    pub fn affine(
        base: f64,
        log_slope: [f64; 3],
        log_offset: [f64; 3],
        lin_slope: [f64; 3],
        lin_offset: [f64; 3],
    ) -> Self {
        Self {
            base,
            log_slope,
            log_offset,
            lin_slope,
            lin_offset,
            lin_break: None,
            linear_slope: [1.0; 3],
            linear_offset: [0.0; 3],
        }
    }

    /// Camera log; a missing `linear_slope` matches the log slope at the
    /// break, the offset always makes the curve continuous.
    pub fn camera(
        base: f64,
        log_slope: [f64; 3],
        log_offset: [f64; 3],
        lin_slope: [f64; 3],
        lin_offset: [f64; 3],
        lin_break: [f64; 3],
        linear_slope: Option<[f64; 3]>,
    ) -> Self {
        let mut curve = Self::affine(base, log_slope, log_offset, lin_slope, lin_offset);
        let ln_base = base.ln();
        for c in 0..3 {
            let arg = lin_slope[c] * lin_break[c] + lin_offset[c];
            let slope = match linear_slope {
                Some(s) => s[c],
                None => log_slope[c] * lin_slope[c] / (arg * ln_base),
            };
            curve.linear_slope[c] = slope;
            curve.linear_offset[c] = curve.log_side(c, lin_break[c], false) - slope * lin_break[c];
        }
        curve.lin_break = Some(lin_break);
        curve
    }

    #[inline]
    fn log_side(&self, c: usize, x: f64, fast: bool) -> f64 {
        let arg = (self.lin_slope[c] * x + self.lin_offset[c]).max(LOG_MIN);
        let log2 = if fast {
            fast_math::log2(arg)
        } else {
            arg.log2()
        };
        self.log_slope[c] * log2 / self.base.log2() + self.log_offset[c]
    }

    /// Linear to log for channel `c`.
    pub fn encode(&self, c: usize, x: f64, fast: bool) -> f64 {
        match self.lin_break {
            Some(brk) if x < brk[c] => self.linear_slope[c] * x + self.linear_offset[c],
            _ => self.log_side(c, x, fast),
        }
    }

    /// Log to linear for channel `c`.
    pub fn decode(&self, c: usize, y: f64, fast: bool) -> f64 {
        if let Some(brk) = self.lin_break {
            let log_brk = self.linear_slope[c] * brk[c] + self.linear_offset[c];
            let increasing = self.log_slope[c] * self.lin_slope[c] > 0.0;
            let below = if increasing { y < log_brk } else { y > log_brk };
            if below {
                return (y - self.linear_offset[c]) / self.linear_slope[c];
            }
        }
        let z = (y - self.log_offset[c]) / self.log_slope[c] * self.base.log2();
        let p = if fast { fast_math::exp2(z) } else { z.exp2() };
        (p - self.lin_offset[c]) / self.lin_slope[c]
    }

    fn is_uniform(&self) -> bool {
        let same = |a: &[f64; 3]| a[0] == a[1] && a[1] == a[2];
        same(&self.log_slope)
            && same(&self.log_offset)
            && same(&self.lin_slope)
            && same(&self.lin_offset)
    }
}

impl Op {
    /// Identity matrix op.
    pub fn identity() -> Self {
        Op::Matrix {
            matrix: IDENTITY_MATRIX,
            offset: [0.0; 4],
        }
    }

    /// Clamp-only range op.
    pub fn clamp(min: Option<f64>, max: Option<f64>) -> Self {
        Op::Range {
            scale: 1.0,
            offset: 0.0,
            clamp_min: min,
            clamp_max: max,
        }
    }

    /// Unit exponent: clamps negatives to zero on all four channels.
    ///
    /// Range ops leave alpha alone, so clamping exponents reduce to this.
    pub(crate) fn clamp_negatives() -> Self {
        Op::Exponent {
            value: [1.0; 4],
            negative_style: NegativeStyle::Clamp,
            fast: false,
        }
    }

    /// Short kind name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Matrix { .. } => "Matrix",
            Op::Range { .. } => "Range",
            Op::Exponent { .. } => "Exponent",
            Op::ExponentWithLinear { .. } => "ExponentWithLinear",
            Op::Log { .. } => "Log",
            Op::Cdl { .. } => "CDL",
            Op::ExposureContrast { .. } => "ExposureContrast",
            Op::FixedFunction { .. } => "FixedFunction",
            Op::Lut1D { .. } => "Lut1D",
            Op::Lut3D { .. } => "Lut3D",
        }
    }

    /// Evaluates the op on one RGBA pixel.
    pub fn apply(&self, px: [f64; 4]) -> [f64; 4] {
        match self {
            Op::Matrix { matrix: m, offset } => {
                let mut out = [0.0; 4];
                for (i, o) in out.iter_mut().enumerate() {
                    *o = m[i * 4] * px[0]
                        + m[i * 4 + 1] * px[1]
                        + m[i * 4 + 2] * px[2]
                        + m[i * 4 + 3] * px[3]
                        + offset[i];
                }
                out
            }
            Op::Range { scale, offset, clamp_min, clamp_max } => {
                let mut out = px;
                for v in out.iter_mut().take(3) {
                    let mut x = *v * scale + offset;
                    if let Some(lo) = clamp_min {
                        x = x.max(*lo);
                    }
                    if let Some(hi) = clamp_max {
                        x = x.min(*hi);
                    }
                    *v = x;
                }
                out
            }
            Op::Exponent { value, negative_style, fast } => {
                let mut out = px;
                for c in 0..4 {
                    out[c] = exponent(px[c], value[c], *negative_style, *fast);
                }
                out
            }
            Op::ExponentWithLinear { gamma, offset, negative_style, forward, fast } => {
                let mut out = px;
                for c in 0..4 {
                    let f = |x: f64| {
                        if *forward {
                            moncurve_decode(x, gamma[c], offset[c], *fast)
                        } else {
                            moncurve_encode(x, gamma[c], offset[c], *fast)
                        }
                    };
                    out[c] = match negative_style {
                        NegativeStyle::Mirror => f(px[c].abs()).copysign(px[c]),
                        _ => f(px[c]),
                    };
                }
                out
            }
            Op::Log { curve, forward, fast } => {
                let mut out = px;
                for c in 0..3 {
                    out[c] = if *forward {
                        curve.encode(c, px[c], *fast)
                    } else {
                        curve.decode(c, px[c], *fast)
                    };
                }
                out
            }
            Op::Cdl { slope, offset, power, saturation, style, forward } => {
                let rgb = [px[0], px[1], px[2]];
                let rgb = if *forward {
                    cdl_forward(rgb, slope, offset, power, *saturation, *style)
                } else {
                    cdl_inverse(rgb, slope, offset, power, *saturation, *style)
                };
                [rgb[0], rgb[1], rgb[2], px[3]]
            }
            Op::ExposureContrast { .. } => self.apply_exposure_contrast(px),
            Op::FixedFunction { style, params, forward } => {
                let rgb = fixed_function::apply(*style, params, !*forward, [px[0], px[1], px[2]]);
                [rgb[0], rgb[1], rgb[2], px[3]]
            }
            Op::Lut1D { lut, forward } => {
                let mut out = px;
                for c in 0..3 {
                    let v = px[c] as f32;
                    out[c] = if *forward {
                        lut.apply_channel(c, v)
                    } else {
                        lut.invert_channel_value(c, v)
                    } as f64;
                }
                out
            }
            Op::Lut3D { lut, forward } => {
                let rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
                let rgb = if *forward {
                    lut.apply(rgb)
                } else {
                    lut.invert_rgb(rgb)
                };
                [rgb[0] as f64, rgb[1] as f64, rgb[2] as f64, px[3]]
            }
        }
    }

    fn apply_exposure_contrast(&self, px: [f64; 4]) -> [f64; 4] {
        let Op::ExposureContrast {
            exposure,
            contrast,
            gamma,
            pivot,
            log_exposure_step,
            log_midway_gray,
            style,
            forward,
        } = self
        else {
            return px;
        };
        let c = contrast * gamma;
        let mut out = px;
        match style {
            ExposureContrastStyle::Linear | ExposureContrastStyle::Video => {
                let (gain, pivot) = if *style == ExposureContrastStyle::Video {
                    ((exposure * VIDEO_POWER).exp2(), pivot.powf(VIDEO_POWER))
                } else {
                    (exposure.exp2(), *pivot)
                };
                for v in out.iter_mut().take(3) {
                    *v = if *forward {
                        (*v * gain / pivot).max(0.0).powf(c) * pivot
                    } else {
                        (*v / pivot).max(0.0).powf(1.0 / c) * pivot / gain
                    };
                }
            }
            ExposureContrastStyle::Logarithmic => {
                let log_pivot =
                    ((pivot / 0.18).log2() * log_exposure_step + log_midway_gray).max(0.0);
                let shift = exposure * log_exposure_step;
                for v in out.iter_mut().take(3) {
                    *v = if *forward {
                        (*v + shift - log_pivot) * c + log_pivot
                    } else {
                        (*v - log_pivot) / c + log_pivot - shift
                    };
                }
            }
        }
        out
    }

    /// Inverse op; fails for ops without a defined inverse.
    pub fn inverse(&self) -> ColorResult<Op> {
        let op = match self {
            Op::Matrix { matrix, offset } => {
                let m = DMat4::from_cols_array(matrix).transpose();
                if m.determinant().abs() < 1e-12 {
                    return Err(ColorError::not_invertible("singular matrix"));
                }
                let inv = m.inverse();
                let o = inv * glam::DVec4::from_array(*offset);
                Op::Matrix {
                    matrix: inv.transpose().to_cols_array(),
                    offset: (-o).to_array(),
                }
            }
            Op::Range { scale, offset, clamp_min, clamp_max } => {
                let clamps = clamp_min.is_some() || clamp_max.is_some();
                if clamps && *scale == 1.0 && *offset == 0.0 {
                    return Err(ColorError::not_invertible("clamp-only range"));
                }
                if *scale == 0.0 || !scale.is_finite() {
                    return Err(ColorError::not_invertible("degenerate range"));
                }
                let back = |v: f64| (v - offset) / scale;
                let (lo, hi) = (clamp_min.map(back), clamp_max.map(back));
                let (clamp_min, clamp_max) = if *scale > 0.0 { (lo, hi) } else { (hi, lo) };
                Op::Range {
                    scale: 1.0 / scale,
                    offset: -offset / scale,
                    clamp_min,
                    clamp_max,
                }
            }
            Op::Exponent { value, negative_style, fast } => Op::Exponent {
                value: value.map(|v| 1.0 / v),
                negative_style: *negative_style,
                fast: *fast,
            },
            Op::ExponentWithLinear {
                gamma,
                offset,
                negative_style,
                forward,
                fast,
            } => Op::ExponentWithLinear {
                gamma: *gamma,
                offset: *offset,
                negative_style: *negative_style,
                forward: !forward,
                fast: *fast,
            },
            Op::Log { curve, forward, fast } => Op::Log {
                curve: curve.clone(),
                forward: !forward,
                fast: *fast,
            },
            Op::Cdl { slope, offset, power, saturation, style, forward } => {
                if *forward && (slope.iter().any(|s| *s == 0.0) || *saturation == 0.0) {
                    return Err(ColorError::not_invertible("CDL with zero slope or saturation"));
                }
                Op::Cdl {
                    slope: *slope,
                    offset: *offset,
                    power: *power,
                    saturation: *saturation,
                    style: *style,
                    forward: !forward,
                }
            }
            Op::ExposureContrast { forward, .. } => {
                let mut inv = self.clone();
                if let Op::ExposureContrast { forward: f, .. } = &mut inv {
                    *f = !forward;
                }
                inv
            }
            Op::FixedFunction { style, params, forward } => {
                Op::FixedFunction {
                    style: *style,
                    params: params.clone(),
                    forward: !forward,
                }
            }
            Op::Lut1D { lut, forward } => {
                if *forward && !lut.is_invertible() {
                    return Err(ColorError::not_invertible("non-monotonic 1D LUT"));
                }
                Op::Lut1D {
                    lut: Arc::clone(lut),
                    forward: !forward,
                }
            }
            Op::Lut3D { lut, forward } => Op::Lut3D {
                lut: Arc::clone(lut),
                forward: !forward,
            },
        };
        Ok(op)
    }

    /// True for power-curve ops governed by the gamma identity flag.
    pub(crate) fn is_gamma(&self) -> bool {
        matches!(self, Op::Exponent { .. } | Op::ExponentWithLinear { .. })
    }

    /// How to drop this op if it is a no-op (up to clamping).
    pub(crate) fn identity_reduction(&self) -> Option<Reduction> {
        match self {
            Op::Matrix { matrix, offset } => {
                let is_id = matrix
                    .iter()
                    .zip(IDENTITY_MATRIX.iter())
                    .all(|(a, b)| (a - b).abs() < 1e-12)
                    && offset.iter().all(|v| v.abs() < 1e-12);
                is_id.then_some(Reduction::Remove)
            }
            Op::Range { scale, offset, clamp_min, clamp_max } => {
                (*scale == 1.0 && *offset == 0.0 && clamp_min.is_none() && clamp_max.is_none())
                    .then_some(Reduction::Remove)
            }
            Op::Exponent { value, negative_style, .. } => {
                if !value.iter().all(|v| *v == 1.0) {
                    return None;
                }
                Some(match negative_style {
                    NegativeStyle::Clamp => Reduction::Replace(Op::clamp_negatives()),
                    _ => Reduction::Remove,
                })
            }
            Op::ExponentWithLinear { gamma, offset, .. } => {
                (gamma.iter().all(|g| *g == 1.0) && offset.iter().all(|o| *o == 0.0))
                    .then_some(Reduction::Remove)
            }
            Op::Log { .. } => None,
            Op::Cdl { slope, offset, power, saturation, style, .. } => {
                let neutral = slope.iter().all(|v| *v == 1.0)
                    && offset.iter().all(|v| *v == 0.0)
                    && power.iter().all(|v| *v == 1.0)
                    && *saturation == 1.0;
                if !neutral {
                    return None;
                }
                Some(match style {
                    CdlStyle::AscCdl => Reduction::Replace(Op::clamp(Some(0.0), Some(1.0))),
                    CdlStyle::NoClamp => Reduction::Remove,
                })
            }
            Op::ExposureContrast { exposure, contrast, gamma, style, .. } => {
                if *exposure != 0.0 || contrast * gamma != 1.0 {
                    return None;
                }
                Some(match style {
                    ExposureContrastStyle::Logarithmic => Reduction::Remove,
                    _ => Reduction::Replace(Op::clamp(Some(0.0), None)),
                })
            }
            Op::FixedFunction { style, params, .. } => {
                (*style == FixedFunctionStyle::Rec2100Surround && params.first() == Some(&1.0))
                    .then_some(Reduction::Remove)
            }
            Op::Lut1D { lut, .. } => lut
                .is_identity(1e-5)
                .then(|| Reduction::Replace(domain_clamp(lut.domain_min, lut.domain_max))),
            Op::Lut3D { lut, .. } => {
                let uniform = lut.domain_min.iter().all(|v| *v == lut.domain_min[0])
                    && lut.domain_max.iter().all(|v| *v == lut.domain_max[0]);
                (uniform && lut.is_identity(1e-5))
                    .then(|| Reduction::Replace(domain_clamp(lut.domain_min[0], lut.domain_max[0])))
            }
        }
    }

    /// How to drop `self` followed by `next` if they cancel.
    pub(crate) fn pair_reduction(&self, next: &Op) -> Option<Reduction> {
        match (self, next) {
            (
                Op::Exponent { value: a, negative_style: sa, .. },
                Op::Exponent { value: b, negative_style: sb, .. },
            ) => {
                if sa != sb || !(0..4).all(|c| close(a[c] * b[c], 1.0)) {
                    return None;
                }
                Some(match sa {
                    NegativeStyle::Clamp => Reduction::Replace(Op::clamp_negatives()),
                    _ => Reduction::Remove,
                })
            }
            (
                Op::ExponentWithLinear {
                    gamma: ga,
                    offset: oa,
                    negative_style: sa,
                    forward: fa,
                    ..
                },
                Op::ExponentWithLinear {
                    gamma: gb,
                    offset: ob,
                    negative_style: sb,
                    forward: fb,
                    ..
                },
            ) => (fa != fb && ga == gb && oa == ob && sa == sb).then_some(Reduction::Remove),
            (Op::Log { curve: ca, forward: fa, .. }, Op::Log { curve: cb, forward: fb, .. }) => {
                if fa == fb || ca != cb {
                    return None;
                }
                if !*fa || ca.lin_break.is_some() {
                    return Some(Reduction::Remove);
                }
                // Encoding first clamps the log argument.
                if !ca.is_uniform() || !(ca.lin_slope[0] > 0.0) {
                    return None;
                }
                let floor = (LOG_MIN - ca.lin_offset[0]) / ca.lin_slope[0];
                Some(Reduction::Replace(Op::clamp(Some(floor), None)))
            }
            (
                Op::Cdl {
                    slope: sa,
                    offset: oa,
                    power: pa,
                    saturation: ta,
                    style: ya,
                    forward: fa,
                },
                Op::Cdl {
                    slope: sb,
                    offset: ob,
                    power: pb,
                    saturation: tb,
                    style: yb,
                    forward: fb,
                },
            ) => {
                if fa == fb || sa != sb || oa != ob || pa != pb || ta != tb || ya != yb {
                    return None;
                }
                Some(match ya {
                    CdlStyle::AscCdl => Reduction::Replace(Op::clamp(Some(0.0), Some(1.0))),
                    CdlStyle::NoClamp => Reduction::Remove,
                })
            }
            (
                Op::ExposureContrast { forward: fa, .. },
                Op::ExposureContrast { forward: fb, .. },
            ) => {
                if fa == fb {
                    return None;
                }
                let mut flipped = next.clone();
                if let Op::ExposureContrast { forward, .. } = &mut flipped {
                    *forward = *fa;
                }
                if flipped != *self {
                    return None;
                }
                Some(match self {
                    Op::ExposureContrast {
                        style: ExposureContrastStyle::Logarithmic,
                        ..
                    } => Reduction::Remove,
                    _ => Reduction::Replace(Op::clamp(Some(0.0), None)),
                })
            }
            (
                Op::FixedFunction { style: sa, params: pa, forward: fa },
                Op::FixedFunction { style: sb, params: pb, forward: fb },
            ) => (fa != fb && sa == sb && pa == pb).then_some(Reduction::Remove),
            (Op::Lut1D { lut: la, forward: true }, Op::Lut1D { lut: lb, forward: false }) => {
                (la == lb).then(|| Reduction::Replace(domain_clamp(la.domain_min, la.domain_max)))
            }
            (Op::Lut3D { lut: la, forward: true }, Op::Lut3D { lut: lb, forward: false }) => {
                let uniform = la.domain_min.iter().all(|v| *v == la.domain_min[0])
                    && la.domain_max.iter().all(|v| *v == la.domain_max[0]);
                (la == lb && uniform)
                    .then(|| Reduction::Replace(domain_clamp(la.domain_min[0], la.domain_max[0])))
            }
            _ => None,
        }
    }

    /// Feeds a canonical encoding of the op into a hasher.
    pub(crate) fn hash_into(&self, h: &mut Sha256) {
        fn floats(h: &mut Sha256, values: &[f64]) {
            for v in values {
                h.update(v.to_bits().to_le_bytes());
            }
        }
        fn opt(h: &mut Sha256, v: Option<f64>) {
            match v {
                Some(v) => {
                    h.update([1u8]);
                    floats(h, &[v]);
                }
                None => h.update([0u8]),
            }
        }

        h.update(self.name().as_bytes());
        match self {
            Op::Matrix { matrix, offset } => {
                floats(h, matrix);
                floats(h, offset);
            }
            Op::Range { scale, offset, clamp_min, clamp_max } => {
                floats(h, &[*scale, *offset]);
                opt(h, *clamp_min);
                opt(h, *clamp_max);
            }
            Op::Exponent { value, negative_style, fast } => {
                floats(h, value);
                h.update(format!("{:?}{}", negative_style, fast).as_bytes());
            }
            Op::ExponentWithLinear { gamma, offset, negative_style, forward, fast } => {
                floats(h, gamma);
                floats(h, offset);
                h.update(format!("{:?}{}{}", negative_style, forward, fast).as_bytes());
            }
            Op::Log { curve, forward, fast } => {
                floats(h, &[curve.base]);
                for part in [
                    &curve.log_slope,
                    &curve.log_offset,
                    &curve.lin_slope,
                    &curve.lin_offset,
                    &curve.linear_slope,
                    &curve.linear_offset,
                ] {
                    floats(h, part);
                }
                match &curve.lin_break {
                    Some(b) => floats(h, b),
                    None => h.update([0u8]),
                }
                h.update(format!("{}{}", forward, fast).as_bytes());
            }
            Op::Cdl { slope, offset, power, saturation, style, forward } => {
                floats(h, slope);
                floats(h, offset);
                floats(h, power);
                floats(h, &[*saturation]);
                h.update(format!("{:?}{}", style, forward).as_bytes());
            }
            Op::ExposureContrast {
                exposure,
                contrast,
                gamma,
                pivot,
                log_exposure_step,
                log_midway_gray,
                style,
                forward,
            } => {
                floats(
                    h,
                    &[
                        *exposure,
                        *contrast,
                        *gamma,
                        *pivot,
                        *log_exposure_step,
                        *log_midway_gray,
                    ],
                );
                h.update(format!("{:?}{}", style, forward).as_bytes());
            }
            Op::FixedFunction { style, params, forward } => {
                floats(h, params);
                h.update(format!("{:?}{}", style, forward).as_bytes());
            }
            Op::Lut1D { lut, forward } => {
                for c in 0..3 {
                    for v in lut.channel(c) {
                        h.update(v.to_bits().to_le_bytes());
                    }
                }
                floats(h, &[lut.domain_min as f64, lut.domain_max as f64]);
                h.update([*forward as u8]);
            }
            Op::Lut3D { lut, forward } => {
                h.update((lut.size as u64).to_le_bytes());
                for rgb in &lut.data {
                    for v in rgb {
                        h.update(v.to_bits().to_le_bytes());
                    }
                }
                for c in 0..3 {
                    floats(h, &[lut.domain_min[c] as f64, lut.domain_max[c] as f64]);
                }
                h.update(lut.interpolation.as_str().as_bytes());
                h.update([*forward as u8]);
            }
        }
    }
}

#[inline]
fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= PARAM_EPS * a.abs().max(b.abs()).max(1.0)
}

fn exponent(x: f64, e: f64, style: NegativeStyle, fast: bool) -> f64 {
    let pow = |v: f64| {
        if fast {
            fast_math::pow(v, e)
        } else {
            v.powf(e)
        }
    };
    match style {
        NegativeStyle::Mirror => pow(x.abs()).copysign(x),
        NegativeStyle::PassThru if x < 0.0 => x,
        _ => pow(x.max(0.0)),
    }
}

/// Encoded break point and linear slope of a gamma-with-linear curve.
pub(crate) fn moncurve_params(gamma: f64, offset: f64) -> (f64, f64) {
    if gamma <= 1.0 {
        return (f64::INFINITY, 1.0 + offset);
    }
    let brk = offset / (gamma - 1.0);
    let at_brk = ((brk + offset) / (1.0 + offset)).powf(gamma);
    (brk, if at_brk > 0.0 { brk / at_brk } else { 1.0 })
}

/// Encoded to linear.
pub(crate) fn moncurve_decode(x: f64, gamma: f64, offset: f64, fast: bool) -> f64 {
    let (brk, slope) = moncurve_params(gamma, offset);
    if x >= brk {
        let base = (x + offset) / (1.0 + offset);
        if fast {
            fast_math::pow(base, gamma)
        } else {
            base.powf(gamma)
        }
    } else {
        x / slope
    }
}

/// Linear to encoded.
pub(crate) fn moncurve_encode(x: f64, gamma: f64, offset: f64, fast: bool) -> f64 {
    let (brk, slope) = moncurve_params(gamma, offset);
    let lin_brk = if brk.is_finite() {
        brk / slope
    } else {
        f64::INFINITY
    };
    if x >= lin_brk {
        let p = if fast {
            fast_math::pow(x, 1.0 / gamma)
        } else {
            x.powf(1.0 / gamma)
        };
        (1.0 + offset) * p - offset
    } else {
        x * slope
    }
}

fn saturate(rgb: [f64; 3], sat: f64) -> [f64; 3] {
    let luma = CDL_LUMA[0] * rgb[0] + CDL_LUMA[1] * rgb[1] + CDL_LUMA[2] * rgb[2];
    rgb.map(|v| luma + sat * (v - luma))
}

/// Clamp to a LUT input domain.
fn domain_clamp(min: f32, max: f32) -> Op {
    Op::clamp(Some(min as f64), Some(max as f64))
}

fn cdl_forward(
    rgb: [f64; 3],
    slope: &[f64; 3],
    offset: &[f64; 3],
    power: &[f64; 3],
    sat: f64,
    style: CdlStyle,
) -> [f64; 3] {
    let mut v = [0.0; 3];
    for c in 0..3 {
        let x = rgb[c] * slope[c] + offset[c];
        v[c] = match style {
            CdlStyle::AscCdl => x.clamp(0.0, 1.0).powf(power[c]),
            CdlStyle::NoClamp if x > 0.0 => x.powf(power[c]),
            CdlStyle::NoClamp => x,
        };
    }
    let v = saturate(v, sat);
    match style {
        CdlStyle::AscCdl => v.map(|x| x.clamp(0.0, 1.0)),
        CdlStyle::NoClamp => v,
    }
}

fn cdl_inverse(
    rgb: [f64; 3],
    slope: &[f64; 3],
    offset: &[f64; 3],
    power: &[f64; 3],
    sat: f64,
    style: CdlStyle,
) -> [f64; 3] {
    let clamp = style == CdlStyle::AscCdl;
    let v = if clamp {
        rgb.map(|x| x.clamp(0.0, 1.0))
    } else {
        rgb
    };
    let v = saturate(v, 1.0 / sat);
    let mut out = [0.0; 3];
    for c in 0..3 {
        let x = if clamp { v[c].clamp(0.0, 1.0) } else { v[c] };
        let x = if x > 0.0 { x.powf(1.0 / power[c]) } else { x };
        out[c] = (x - offset[c]) / slope[c];
    }
    out
}

/// Row-major 4x4 product `a * b`.
pub(crate) fn mat4_mul(a: &[f64; 16], b: &[f64; 16]) -> [f64; 16] {
    let mut r = [0.0; 16];
    for i in 0..4 {
        for j in 0..4 {
            r[i * 4 + j] = (0..4).map(|k| a[i * 4 + k] * b[k * 4 + j]).sum();
        }
    }
    r
}

/// Row-major 4x4 matrix times vector.
pub(crate) fn mat4_apply(m: &[f64; 16], v: &[f64; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (i, o) in out.iter_mut().enumerate() {
        *o = (0..4).map(|k| m[i * 4 + k] * v[k]).sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_px(a: [f64; 4], b: [f64; 4], tol: f64) {
        for c in 0..4 {
            assert!((a[c] - b[c]).abs() < tol, "{:?} vs {:?}", a, b);
        }
    }

    fn roundtrip(op: &Op, px: [f64; 4], tol: f64) {
        let inv = op.inverse().unwrap();
        assert_px(inv.apply(op.apply(px)), px, tol);
    }

    #[test]
    fn matrix_inverse() {
        let op = Op::Matrix {
            matrix: [
                2.0, 0.1, 0.0, 0.0, 0.0, 1.5, 0.2, 0.0, 0.3, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 1.0,
            ],
            offset: [0.1, -0.2, 0.05, 0.0],
        };
        roundtrip(&op, [0.3, 0.6, 0.9, 1.0], 1e-12);
        let singular = Op::Matrix {
            matrix: [0.0; 16],
            offset: [0.0; 4],
        };
        assert_eq!(singular.inverse().unwrap_err().kind(), crate::ErrorKind::NotInvertible);
    }

    #[test]
    fn range_inverse_rules() {
        let scale = Op::Range {
            scale: 2.0,
            offset: 0.5,
            clamp_min: Some(0.5),
            clamp_max: Some(2.5),
        };
        roundtrip(&scale, [0.2, 0.4, 0.6, 1.0], 1e-12);
        assert!(Op::clamp(Some(0.0), Some(1.0)).inverse().is_err());
        assert!(Op::clamp(None, None).inverse().is_ok());
    }

    #[test]
    fn srgb_moncurve() {
        let (brk, slope) = moncurve_params(2.4, 0.055);
        assert!((brk - 0.0392857).abs() < 1e-6);
        assert!((slope - 12.923).abs() < 1e-3);
        // sRGB 0.5 decodes to about 0.214.
        assert!((moncurve_decode(0.5, 2.4, 0.055, false) - 0.214041).abs() < 1e-5);
        let op = Op::ExponentWithLinear {
            gamma: [2.4, 2.4, 2.4, 1.0],
            offset: [0.055, 0.055, 0.055, 0.0],
            negative_style: NegativeStyle::Linear,
            forward: true,
            fast: false,
        };
        roundtrip(&op, [0.01, 0.5, 1.0, 1.0], 1e-12);
        roundtrip(&op, [-0.1, 0.02, 0.9, 0.5], 1e-12);
    }

    #[test]
    fn acescct_linear_segment() {
        let curve = LogCurve::camera(
            2.0,
            [1.0 / 17.52; 3],
            [9.72 / 17.52; 3],
            [1.0; 3],
            [0.0; 3],
            [0.0078125; 3],
            None,
        );
        assert!((curve.linear_slope[0] - 10.5402377416545).abs() < 1e-9);
        assert!((curve.linear_offset[0] - 0.0729055341958355).abs() < 1e-9);
        // 0.18 encodes to about 0.4135884.
        assert!((curve.encode(0, 0.18, false) - 0.4135884).abs() < 1e-6);
        let op = Op::Log {
            curve,
            forward: true,
            fast: false,
        };
        roundtrip(&op, [0.0, 0.005, 0.18, 1.0], 1e-12);
    }

    #[test]
    fn cdl_roundtrip_and_identity() {
        let op = Op::Cdl {
            slope: [1.1, 1.0, 0.9],
            offset: [0.01, 0.0, -0.01],
            power: [1.2, 1.0, 0.8],
            saturation: 0.9,
            style: CdlStyle::NoClamp,
            forward: true,
        };
        roundtrip(&op, [0.2, 0.4, 0.6, 1.0], 1e-12);

        let asc = Op::Cdl {
            slope: [1.0; 3],
            offset: [0.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
            style: CdlStyle::AscCdl,
            forward: true,
        };
        let unit = Op::clamp(Some(0.0), Some(1.0));
        assert_eq!(asc.identity_reduction(), Some(Reduction::Replace(unit)));
    }

    #[test]
    fn exposure_contrast_styles() {
        for style in [
            ExposureContrastStyle::Linear,
            ExposureContrastStyle::Video,
            ExposureContrastStyle::Logarithmic,
        ] {
            let op = Op::ExposureContrast {
                exposure: 1.0,
                contrast: 1.2,
                gamma: 0.9,
                pivot: 0.18,
                log_exposure_step: 0.088,
                log_midway_gray: 0.435,
                style,
                forward: true,
            };
            roundtrip(&op, [0.05, 0.18, 0.7, 1.0], 1e-12);
        }
        let gain = Op::ExposureContrast {
            exposure: 1.0,
            contrast: 1.0,
            gamma: 1.0,
            pivot: 0.18,
            log_exposure_step: 0.088,
            log_midway_gray: 0.435,
            style: ExposureContrastStyle::Linear,
            forward: true,
        };
        assert_px(gain.apply([0.25, 0.5, 1.0, 1.0]), [0.5, 1.0, 2.0, 1.0], 1e-12);
    }

    #[test]
    fn exponent_styles() {
        let clamp = Op::Exponent {
            value: [2.0; 4],
            negative_style: NegativeStyle::Clamp,
            fast: false,
        };
        assert_eq!(clamp.apply([-0.5, 0.5, 1.0, 1.0]), [0.0, 0.25, 1.0, 1.0]);
        let mirror = Op::Exponent {
            value: [2.0; 4],
            negative_style: NegativeStyle::Mirror,
            fast: false,
        };
        assert_eq!(mirror.apply([-0.5, 0.5, 1.0, 1.0])[0], -0.25);
        let pass = Op::Exponent {
            value: [2.0; 4],
            negative_style: NegativeStyle::PassThru,
            fast: false,
        };
        assert_eq!(pass.apply([-0.5, 0.5, 1.0, 1.0])[0], -0.5);
    }

    #[test]
    fn pair_detection() {
        let e = Op::Exponent {
            value: [2.0, 2.0, 2.0, 1.0],
            negative_style: NegativeStyle::Mirror,
            fast: false,
        };
        let inv = e.inverse().unwrap();
        assert_eq!(e.pair_reduction(&inv), Some(Reduction::Remove));
        let ff = Op::FixedFunction {
            style: FixedFunctionStyle::RgbToHsv,
            params: vec![],
            forward: true,
        };
        assert_eq!(ff.pair_reduction(&ff.inverse().unwrap()), Some(Reduction::Remove));
        assert_eq!(ff.pair_reduction(&ff), None);
    }

    #[test]
    fn lut1d_inverse_needs_monotonic() {
        let bumpy = Lut1D::from_data(vec![0.0, 0.8, 0.3, 1.0], 0.0, 1.0).unwrap();
        let op = Op::Lut1D {
            lut: Arc::new(bumpy),
            forward: true,
        };
        assert!(op.inverse().is_err());
        let gamma = Op::Lut1D {
            lut: Arc::new(Lut1D::gamma(1024, 2.0)),
            forward: true,
        };
        roundtrip(&gamma, [0.1, 0.5, 0.9, 1.0], 1e-4);
    }

    #[test]
    fn hashing_distinguishes_direction() {
        let a = Op::Log {
            curve: LogCurve::plain(10.0),
            forward: true,
            fast: false,
        };
        let b = a.inverse().unwrap();
        let digest = |op: &Op| {
            let mut h = Sha256::new();
            op.hash_into(&mut h);
            h.finalize()
        };
        assert_ne!(digest(&a), digest(&b));
        assert_eq!(digest(&a), digest(&a.clone()));
    }
}
