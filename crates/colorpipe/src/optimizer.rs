//! Operator pipeline optimization.
//!
//! [`optimize`] rewrites an op list into a shorter equivalent one. Every
//! rewrite is gated by a bit of [`OptimizationFlags`]; the passes run until
//! nothing changes, so the result is a fixed point and optimizing twice
//! gives the same list.
//!
//! ```
//! use colorpipe::op::Op;
//! use colorpipe::optimizer::{optimize, OptimizationFlags};
//!
//! let ops = vec![Op::identity(), Op::identity()];
//! assert!(optimize(&ops, OptimizationFlags::LOSSLESS).is_empty());
//! assert_eq!(optimize(&ops, OptimizationFlags::NONE).len(), 2);
//! ```

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use colorpipe_lut::{Lut1D, Lut3D};

use crate::op::{mat4_apply, mat4_mul, LogCurve, Op, Reduction};
use crate::transform::{CdlStyle, NegativeStyle};

/// Upper bound on optimizer passes.
const MAX_PASSES: usize = 64;
/// Smallest table used when baking an inverse 1D LUT.
const INV_LUT1D_MIN_SIZE: usize = 4096;

/// Bitmask selecting optimizer rewrites.
///
/// Bit values match the common color engine convention so masks can be
/// passed through environment variables. Unknown bits are kept but ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptimizationFlags(u32);

impl OptimizationFlags {
    /// No optimization.
    pub const NONE: Self = Self(0);
    /// Remove identity ops (other than power curves).
    pub const IDENTITY: Self = Self(0x0000_0001);
    /// Remove identity power curves.
    pub const IDENTITY_GAMMA: Self = Self(0x0000_0002);
    /// Remove CDL/inverse CDL pairs.
    pub const PAIR_IDENTITY_CDL: Self = Self(0x0000_0040);
    /// Remove exposure/contrast pairs.
    pub const PAIR_IDENTITY_EXPOSURE_CONTRAST: Self = Self(0x0000_0080);
    /// Remove fixed function pairs.
    pub const PAIR_IDENTITY_FIXED_FUNCTION: Self = Self(0x0000_0100);
    /// Remove power curve pairs.
    pub const PAIR_IDENTITY_GAMMA: Self = Self(0x0000_0200);
    /// Remove 1D LUT pairs.
    pub const PAIR_IDENTITY_LUT1D: Self = Self(0x0000_0400);
    /// Remove 3D LUT pairs.
    pub const PAIR_IDENTITY_LUT3D: Self = Self(0x0000_0800);
    /// Remove log pairs.
    pub const PAIR_IDENTITY_LOG: Self = Self(0x0000_1000);
    /// Compose adjacent exponents.
    pub const COMP_EXPONENT: Self = Self(0x0004_0000);
    /// Fold exponents into adjacent log curves.
    pub const COMP_GAMMA: Self = Self(0x0008_0000);
    /// Compose adjacent matrices.
    pub const COMP_MATRIX: Self = Self(0x0010_0000);
    /// Compose adjacent 1D LUTs.
    pub const COMP_LUT1D: Self = Self(0x0020_0000);
    /// Compose adjacent 3D LUTs.
    pub const COMP_LUT3D: Self = Self(0x0040_0000);
    /// Compose adjacent ranges.
    pub const COMP_RANGE: Self = Self(0x0080_0000);
    /// Separable prefix composition; recognized, nothing acts on it.
    pub const COMP_SEPARABLE_PREFIX: Self = Self(0x0100_0000);
    /// Bake inverse LUTs into forward tables.
    pub const LUT_INV_FAST: Self = Self(0x0200_0000);
    /// Table based log, exp and pow.
    pub const FAST_LOG_EXP_POW: Self = Self(0x0400_0000);
    /// Turn unclamped ranges and linear CDLs into matrices.
    pub const SIMPLIFY_OPS: Self = Self(0x0800_0000);
    /// Freeze dynamic properties; recognized, nothing acts on it.
    pub const NO_DYNAMIC_PROPERTIES: Self = Self(0x1000_0000);
    /// Every bit.
    pub const ALL: Self = Self(0xFFFF_FFFF);

    /// Rewrites that do not change results beyond rounding.
    pub const LOSSLESS: Self = Self(
        Self::IDENTITY.0
            | Self::IDENTITY_GAMMA.0
            | Self::PAIR_IDENTITY_CDL.0
            | Self::PAIR_IDENTITY_EXPOSURE_CONTRAST.0
            | Self::PAIR_IDENTITY_FIXED_FUNCTION.0
            | Self::PAIR_IDENTITY_GAMMA.0
            | Self::PAIR_IDENTITY_LUT1D.0
            | Self::PAIR_IDENTITY_LUT3D.0
            | Self::PAIR_IDENTITY_LOG.0
            | Self::COMP_EXPONENT.0
            | Self::COMP_GAMMA.0
            | Self::COMP_MATRIX.0
            | Self::COMP_RANGE.0
            | Self::SIMPLIFY_OPS.0
            | Self::NO_DYNAMIC_PROPERTIES.0,
    );
    /// Lossless plus 1D LUT composition, inverse baking and fast math.
    pub const VERY_GOOD: Self = Self(
        Self::LOSSLESS.0
            | Self::COMP_LUT1D.0
            | Self::LUT_INV_FAST.0
            | Self::FAST_LOG_EXP_POW.0
            | Self::COMP_SEPARABLE_PREFIX.0,
    );
    /// Very good plus 3D LUT composition.
    pub const GOOD: Self = Self(Self::VERY_GOOD.0 | Self::COMP_LUT3D.0);
    /// Everything.
    pub const DRAFT: Self = Self::ALL;
    /// Default preset.
    pub const DEFAULT: Self = Self::VERY_GOOD;

    /// Wraps raw bits; unknown bits are kept.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no bit is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for OptimizationFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OptimizationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OptimizationFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for OptimizationFlags {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Returns an optimized copy of `ops`.
///
/// A zero mask returns the list unchanged. The output is deterministic for
/// a given input and mask.
pub fn optimize(ops: &[Op], flags: OptimizationFlags) -> Vec<Op> {
    let mut ops = ops.to_vec();
    if flags.is_empty() {
        return ops;
    }
    let before = ops.len();

    run_passes(&mut ops, flags);
    if flags.contains(OptimizationFlags::LUT_INV_FAST) && bake_inverse_luts(&mut ops) {
        run_passes(&mut ops, flags);
    }
    if flags.contains(OptimizationFlags::FAST_LOG_EXP_POW) {
        use_fast_math(&mut ops);
    }

    trace!(before, after = ops.len(), flags = flags.bits(), "optimized op list");
    ops
}

fn run_passes(ops: &mut Vec<Op>, flags: OptimizationFlags) {
    for _ in 0..MAX_PASSES {
        let mut changed = remove_identities(ops, flags);
        changed |= remove_pairs(ops, flags);
        changed |= compose_adjacent(ops, flags);
        if flags.contains(OptimizationFlags::SIMPLIFY_OPS) {
            changed |= simplify(ops);
        }
        if !changed {
            break;
        }
    }
}

fn remove_identities(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    let mut changed = false;
    let mut out = Vec::with_capacity(ops.len());
    for op in ops.drain(..) {
        let flag = if op.is_gamma() {
            OptimizationFlags::IDENTITY_GAMMA
        } else {
            OptimizationFlags::IDENTITY
        };
        let reduction = if flags.contains(flag) {
            op.identity_reduction()
        } else {
            None
        };
        match reduction {
            Some(Reduction::Remove) => changed = true,
            // A clamp standing in for a clamp is already minimal.
            Some(Reduction::Replace(r)) if r != op => {
                changed = true;
                out.push(r);
            }
            _ => out.push(op),
        }
    }
    *ops = out;
    changed
}

fn pair_flag(op: &Op) -> Option<OptimizationFlags> {
    Some(match op {
        Op::Exponent { .. } | Op::ExponentWithLinear { .. } => {
            OptimizationFlags::PAIR_IDENTITY_GAMMA
        }
        Op::Log { .. } => OptimizationFlags::PAIR_IDENTITY_LOG,
        Op::Cdl { .. } => OptimizationFlags::PAIR_IDENTITY_CDL,
        Op::ExposureContrast { .. } => OptimizationFlags::PAIR_IDENTITY_EXPOSURE_CONTRAST,
        Op::FixedFunction { .. } => OptimizationFlags::PAIR_IDENTITY_FIXED_FUNCTION,
        Op::Lut1D { .. } => OptimizationFlags::PAIR_IDENTITY_LUT1D,
        Op::Lut3D { .. } => OptimizationFlags::PAIR_IDENTITY_LUT3D,
        Op::Matrix { .. } | Op::Range { .. } => return None,
    })
}

fn remove_pairs(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < ops.len() {
        let enabled = pair_flag(&ops[i]).is_some_and(|f| flags.contains(f));
        match enabled.then(|| ops[i].pair_reduction(&ops[i + 1])).flatten() {
            Some(Reduction::Remove) => {
                ops.drain(i..i + 2);
                changed = true;
                i = i.saturating_sub(1);
            }
            Some(Reduction::Replace(r)) => {
                ops[i] = r;
                ops.remove(i + 1);
                changed = true;
            }
            None => i += 1,
        }
    }
    changed
}

fn compose_adjacent(ops: &mut Vec<Op>, flags: OptimizationFlags) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 1 < ops.len() {
        match compose(&ops[i], &ops[i + 1], flags) {
            Some(op) => {
                ops[i] = op;
                ops.remove(i + 1);
                changed = true;
            }
            None => i += 1,
        }
    }
    changed
}

/// Single op equivalent to `a` followed by `b`, if the flags allow one.
fn compose(a: &Op, b: &Op, flags: OptimizationFlags) -> Option<Op> {
    use OptimizationFlags as F;
    match (a, b) {
        (Op::Matrix { matrix: ma, offset: oa }, Op::Matrix { matrix: mb, offset: ob })
            if flags.contains(F::COMP_MATRIX) =>
        {
            let m = mat4_mul(mb, ma);
            let o = mat4_apply(mb, oa);
            Some(Op::Matrix {
                matrix: m,
                offset: [o[0] + ob[0], o[1] + ob[1], o[2] + ob[2], o[3] + ob[3]],
            })
        }
        (Op::Range { .. }, Op::Range { .. }) if flags.contains(F::COMP_RANGE) => {
            compose_ranges(a, b)
        }
        (
            Op::Exponent { value: va, negative_style: sa, fast: fa },
            Op::Exponent { value: vb, negative_style: sb, fast: fb },
        ) if flags.contains(F::COMP_EXPONENT) && sa == sb => Some(Op::Exponent {
            value: [va[0] * vb[0], va[1] * vb[1], va[2] * vb[2], va[3] * vb[3]],
            negative_style: *sa,
            fast: *fa || *fb,
        }),
        (Op::Exponent { .. }, Op::Log { .. }) | (Op::Log { .. }, Op::Exponent { .. })
            if flags.contains(F::COMP_GAMMA) =>
        {
            fold_exponent_into_log(a, b)
        }
        (Op::Lut1D { lut: la, forward: true }, Op::Lut1D { lut: lb, forward: true })
            if flags.contains(F::COMP_LUT1D) =>
        {
            let size = la.size().max(lb.size());
            Lut1D::from_fn(size, la.domain_min, la.domain_max, |v| {
                lb.apply_rgb(la.apply_rgb([v, v, v]))
            })
            .ok()
            .map(|lut| Op::Lut1D {
                lut: Arc::new(lut),
                forward: true,
            })
        }
        (Op::Lut3D { lut: la, forward: true }, Op::Lut3D { lut: lb, forward: true })
            if flags.contains(F::COMP_LUT3D) =>
        {
            let size = la.size.max(lb.size);
            Lut3D::from_fn(size, la.domain_min, la.domain_max, |rgb| lb.apply(la.apply(rgb)))
                .ok()
                .map(|lut| Op::Lut3D {
                    lut: Arc::new(lut.with_interpolation(la.interpolation)),
                    forward: true,
                })
        }
        _ => None,
    }
}

fn compose_ranges(a: &Op, b: &Op) -> Option<Op> {
    let (
        Op::Range { scale: sa, offset: oa, clamp_min: lo_a, clamp_max: hi_a },
        Op::Range { scale: sb, offset: ob, clamp_min: lo_b, clamp_max: hi_b },
    ) = (a, b)
    else {
        return None;
    };
    if !(*sb > 0.0) {
        return None;
    }
    let map = |v: f64| v * sb + ob;
    let lo = match (lo_a.map(map), *lo_b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    };
    let hi = match (hi_a.map(map), *hi_b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    };
    if let (Some(lo), Some(hi)) = (lo, hi) {
        if lo > hi {
            return None;
        }
    }
    Some(Op::Range {
        scale: sa * sb,
        offset: oa * sb + ob,
        clamp_min: lo,
        clamp_max: hi,
    })
}

/// Folds a per-channel power into the decoding log curve before it.
///
/// `(base^y / lns)^g` is `base^(g * y) / lns^g`, so the exponent becomes a
/// change of log slope. A pure decoding curve never outputs negatives, so
/// only the alpha channel can tell negative styles apart: a clamping
/// exponent also clamps alpha and is left alone. Exponents before an
/// encoding log are never folded, the log floor would move.
fn fold_exponent_into_log(a: &Op, b: &Op) -> Option<Op> {
    let (
        Op::Log {
            curve,
            forward: false,
            fast: fl,
        },
        Op::Exponent {
            value,
            negative_style,
            fast: fe,
        },
    ) = (a, b)
    else {
        return None;
    };
    if *negative_style == NegativeStyle::Clamp || value[3] != 1.0 {
        return None;
    }
    if !is_pure_log(curve) || curve.lin_slope.iter().any(|s| !(*s > 0.0)) {
        return None;
    }

    let mut folded = curve.clone();
    for c in 0..3 {
        let g = value[c];
        if !(g > 0.0) {
            return None;
        }
        folded.log_slope[c] = curve.log_slope[c] / g;
        folded.lin_slope[c] = curve.lin_slope[c].powf(g);
    }
    Some(Op::Log {
        curve: folded,
        forward: false,
        fast: *fl || *fe,
    })
}

/// Rewrites ops that are plain affine maps as matrices.
fn simplify(ops: &mut [Op]) -> bool {
    let mut changed = false;
    for op in ops.iter_mut() {
        if let Some(m) = as_matrix(op) {
            *op = m;
            changed = true;
        }
    }
    changed
}

fn as_matrix(op: &Op) -> Option<Op> {
    match op {
        Op::Range { scale, offset, clamp_min: None, clamp_max: None } => {
            let mut m = crate::op::IDENTITY_MATRIX;
            for c in 0..3 {
                m[c * 5] = *scale;
            }
            Some(Op::Matrix {
                matrix: m,
                offset: [*offset, *offset, *offset, 0.0],
            })
        }
        Op::Cdl { slope, offset, power, saturation, style: CdlStyle::NoClamp, forward } => {
            if power.iter().any(|p| *p != 1.0) {
                return None;
            }
            const LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];
            let mut m = crate::op::IDENTITY_MATRIX;
            let mut o = [0.0; 4];
            for i in 0..3 {
                for j in 0..3 {
                    let sat = (1.0 - saturation) * LUMA[j] + if i == j { *saturation } else { 0.0 };
                    m[i * 4 + j] = sat * slope[j];
                    o[i] += sat * offset[j];
                }
            }
            let fwd = Op::Matrix {
                matrix: m,
                offset: o,
            };
            if *forward {
                Some(fwd)
            } else {
                fwd.inverse().ok()
            }
        }
        _ => None,
    }
}

fn bake_inverse_luts(ops: &mut [Op]) -> bool {
    let mut changed = false;
    for op in ops.iter_mut() {
        let baked = match op {
            Op::Lut1D { lut, forward: false } => {
                let size = lut.size().max(INV_LUT1D_MIN_SIZE);
                lut.invert(size).ok().map(|inv| Op::Lut1D {
                    lut: Arc::new(inv),
                    forward: true,
                })
            }
            Op::Lut3D { lut, forward: false } => {
                lut.invert().ok().map(|inv| Op::Lut3D {
                    lut: Arc::new(inv),
                    forward: true,
                })
            }
            _ => None,
        };
        if let Some(b) = baked {
            *op = b;
            changed = true;
        }
    }
    changed
}

fn use_fast_math(ops: &mut [Op]) {
    for op in ops.iter_mut() {
        match op {
            // A unit exponent is a clamp and stays exact.
            Op::Exponent { value, .. } if value.iter().all(|v| *v == 1.0) => {}
            Op::Exponent { fast, .. }
            | Op::ExponentWithLinear { fast, .. }
            | Op::Log { fast, .. } => *fast = true,
            _ => {}
        }
    }
}

/// Log curve without a linear segment or linear side offset.
fn is_pure_log(curve: &LogCurve) -> bool {
    curve.lin_break.is_none() && curve.lin_offset.iter().all(|o| *o == 0.0)
}
