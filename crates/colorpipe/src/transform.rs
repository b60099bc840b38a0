//! Transform definitions for color space conversions.
//!
//! Transforms are immutable value descriptions of color operations:
//! - Matrix, exponent and log family curves
//! - Range remapping, CDL and exposure/contrast grading
//! - 1D/3D lookup tables, inline or referenced by file
//! - Indirections to named color spaces, looks and display/views
//!
//! Transforms can be chained via [`GroupTransform`]. Each kind validates its
//! own parameters with [`Transform::validate`]; the builder turns validated
//! transforms into operators.

use serde::{Deserialize, Serialize};

use colorpipe_lut::{Lut1D, Lut3D};

use crate::builtin;
use crate::error::{ColorError, ColorResult};

pub use colorpipe_lut::Interpolation;

/// Transform application direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransformDirection {
    /// Forward transform.
    #[default]
    Forward,
    /// Inverse transform.
    Inverse,
}

impl TransformDirection {
    /// Returns the opposite direction.
    #[inline]
    pub fn inverse(self) -> Self {
        match self {
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }

    /// Composes two directions (inverse of inverse is forward).
    #[inline]
    pub fn combine(self, other: Self) -> Self {
        if self == other {
            Self::Forward
        } else {
            Self::Inverse
        }
    }
}

/// Color transform definition.
///
/// A closed set of kinds; adding one means handling it in validation and
/// in the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Transform {
    /// 4x4 matrix plus offset.
    Matrix(MatrixTransform),
    /// Per-channel power function.
    Exponent(ExponentTransform),
    /// Power function with a linear toe (sRGB style).
    ExponentWithLinear(ExponentWithLinearTransform),
    /// Plain logarithm in a given base.
    Log(LogTransform),
    /// Logarithm with affine input and output.
    LogAffine(LogAffineTransform),
    /// Camera log curve with a linear segment below a break point.
    LogCamera(LogCameraTransform),
    /// Range remapping with optional clamping.
    Range(RangeTransform),
    /// Exposure/contrast adjustment.
    ExposureContrast(ExposureContrastTransform),
    /// ASC CDL.
    Cdl(CdlTransform),
    /// Fixed function (HSV, xyY, surround, PQ, ...).
    FixedFunction(FixedFunctionTransform),
    /// LUT referenced by file path.
    File(FileTransform),
    /// Inline 1D LUT.
    Lut1D(Lut1DTransform),
    /// Inline 3D LUT.
    Lut3D(Lut3DTransform),
    /// Ordered composite.
    Group(GroupTransform),
    /// Named canonical transform.
    Builtin(BuiltinTransform),
    /// Reference to a color space pair.
    ColorSpace(ColorSpaceTransform),
    /// Reference to named looks.
    Look(LookTransform),
    /// Reference to a display/view.
    DisplayView(DisplayViewTransform),
    /// Uniform or log2 range allocation.
    Allocation(AllocationTransform),
}

impl Transform {
    /// Creates a matrix transform from a row-major 4x4 array.
    pub fn matrix(m: [f64; 16]) -> Self {
        Self::Matrix(MatrixTransform {
            matrix: m,
            ..Default::default()
        })
    }

    /// Creates a matrix transform with an offset.
    pub fn matrix_offset(m: [f64; 16], offset: [f64; 4]) -> Self {
        Self::Matrix(MatrixTransform {
            matrix: m,
            offset,
            ..Default::default()
        })
    }

    /// Creates an RGB exponent with alpha left alone.
    pub fn exponent(value: f64) -> Self {
        Self::Exponent(ExponentTransform {
            value: [value, value, value, 1.0],
            ..Default::default()
        })
    }

    /// Creates a group transform.
    pub fn group(transforms: Vec<Transform>) -> Self {
        Self::Group(GroupTransform {
            transforms,
            direction: TransformDirection::Forward,
        })
    }

    /// Creates a file transform (LUT reference).
    pub fn file(src: impl Into<String>) -> Self {
        Self::File(FileTransform {
            src: src.into(),
            interpolation: Interpolation::default(),
            direction: TransformDirection::Forward,
        })
    }

    /// Creates a builtin transform.
    pub fn builtin(style: impl Into<String>) -> Self {
        Self::Builtin(BuiltinTransform {
            style: style.into(),
            direction: TransformDirection::Forward,
        })
    }

    /// Creates a color space indirection.
    pub fn colorspace(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self::ColorSpace(ColorSpaceTransform {
            src: src.into(),
            dst: dst.into(),
            data_bypass: true,
            direction: TransformDirection::Forward,
        })
    }

    /// Creates a look indirection.
    pub fn look(src: impl Into<String>, dst: impl Into<String>, looks: impl Into<String>) -> Self {
        Self::Look(LookTransform {
            src: src.into(),
            dst: dst.into(),
            looks: looks.into(),
            skip_colorspace_conversion: false,
            direction: TransformDirection::Forward,
        })
    }

    /// Creates a clamping range transform.
    pub fn range(min_in: f64, max_in: f64, min_out: f64, max_out: f64) -> Self {
        Self::Range(RangeTransform {
            min_in: Some(min_in),
            max_in: Some(max_in),
            min_out: Some(min_out),
            max_out: Some(max_out),
            ..Default::default()
        })
    }

    /// Short kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "Matrix",
            Self::Exponent(_) => "Exponent",
            Self::ExponentWithLinear(_) => "ExponentWithLinear",
            Self::Log(_) => "Log",
            Self::LogAffine(_) => "LogAffine",
            Self::LogCamera(_) => "LogCamera",
            Self::Range(_) => "Range",
            Self::ExposureContrast(_) => "ExposureContrast",
            Self::Cdl(_) => "CDL",
            Self::FixedFunction(_) => "FixedFunction",
            Self::File(_) => "File",
            Self::Lut1D(_) => "Lut1D",
            Self::Lut3D(_) => "Lut3D",
            Self::Group(_) => "Group",
            Self::Builtin(_) => "Builtin",
            Self::ColorSpace(_) => "ColorSpace",
            Self::Look(_) => "Look",
            Self::DisplayView(_) => "DisplayView",
            Self::Allocation(_) => "Allocation",
        }
    }

    fn direction_mut(&mut self) -> &mut TransformDirection {
        match self {
            Self::Matrix(t) => &mut t.direction,
            Self::Exponent(t) => &mut t.direction,
            Self::ExponentWithLinear(t) => &mut t.direction,
            Self::Log(t) => &mut t.direction,
            Self::LogAffine(t) => &mut t.direction,
            Self::LogCamera(t) => &mut t.direction,
            Self::Range(t) => &mut t.direction,
            Self::ExposureContrast(t) => &mut t.direction,
            Self::Cdl(t) => &mut t.direction,
            Self::FixedFunction(t) => &mut t.direction,
            Self::File(t) => &mut t.direction,
            Self::Lut1D(t) => &mut t.direction,
            Self::Lut3D(t) => &mut t.direction,
            Self::Group(t) => &mut t.direction,
            Self::Builtin(t) => &mut t.direction,
            Self::ColorSpace(t) => &mut t.direction,
            Self::Look(t) => &mut t.direction,
            Self::DisplayView(t) => &mut t.direction,
            Self::Allocation(t) => &mut t.direction,
        }
    }

    /// Direction of this transform.
    pub fn direction(&self) -> TransformDirection {
        match self {
            Self::Matrix(t) => t.direction,
            Self::Exponent(t) => t.direction,
            Self::ExponentWithLinear(t) => t.direction,
            Self::Log(t) => t.direction,
            Self::LogAffine(t) => t.direction,
            Self::LogCamera(t) => t.direction,
            Self::Range(t) => t.direction,
            Self::ExposureContrast(t) => t.direction,
            Self::Cdl(t) => t.direction,
            Self::FixedFunction(t) => t.direction,
            Self::File(t) => t.direction,
            Self::Lut1D(t) => t.direction,
            Self::Lut3D(t) => t.direction,
            Self::Group(t) => t.direction,
            Self::Builtin(t) => t.direction,
            Self::ColorSpace(t) => t.direction,
            Self::Look(t) => t.direction,
            Self::DisplayView(t) => t.direction,
            Self::Allocation(t) => t.direction,
        }
    }

    /// Returns a copy with the given direction.
    pub fn with_direction(mut self, direction: TransformDirection) -> Self {
        *self.direction_mut() = direction;
        self
    }

    /// Returns this transform with its direction flipped.
    ///
    /// Groups keep their child order; the builder reverses it when it
    /// expands an inverse group.
    pub fn inverse(mut self) -> Self {
        let dir = self.direction_mut();
        *dir = dir.inverse();
        self
    }

    /// Checks the parameters of this transform (recursively for groups).
    pub fn validate(&self) -> ColorResult<()> {
        match self {
            Self::Matrix(t) => t.validate(),
            Self::Exponent(t) => t.validate(),
            Self::ExponentWithLinear(t) => t.validate(),
            Self::Log(t) => check_base(t.base),
            Self::LogAffine(t) => t.validate(),
            Self::LogCamera(t) => t.validate(),
            Self::Range(t) => t.validate(),
            Self::ExposureContrast(t) => t.validate(),
            Self::Cdl(t) => t.validate(),
            Self::FixedFunction(t) => t.validate(),
            Self::File(t) => {
                if t.src.trim().is_empty() {
                    return Err(ColorError::invalid("file transform has an empty path"));
                }
                Ok(())
            }
            Self::Lut1D(t) => t.validate(),
            Self::Lut3D(t) => t.validate(),
            Self::Group(t) => t.transforms.iter().try_for_each(Transform::validate),
            Self::Builtin(t) => {
                if builtin::lookup(&t.style).is_none() {
                    return Err(ColorError::invalid(format!(
                        "unknown builtin transform '{}'",
                        t.style
                    )));
                }
                Ok(())
            }
            Self::ColorSpace(t) => {
                non_empty(&[("src", &t.src), ("dst", &t.dst)], "color space transform")
            }
            Self::Look(t) => non_empty(&[("src", &t.src), ("dst", &t.dst)], "look transform"),
            Self::DisplayView(t) => non_empty(
                &[("src", &t.src), ("display", &t.display), ("view", &t.view)],
                "display/view transform",
            ),
            Self::Allocation(t) => t.validate(),
        }
    }
}

fn non_empty(fields: &[(&str, &str)], what: &str) -> ColorResult<()> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ColorError::invalid(format!("{} has an empty {}", what, field)));
        }
    }
    Ok(())
}

fn check_base(base: f64) -> ColorResult<()> {
    if !(base > 0.0) || base == 1.0 || !base.is_finite() {
        return Err(ColorError::invalid(format!(
            "log base must be positive and not 1, got {}",
            base
        )));
    }
    Ok(())
}

fn check_nonzero(values: &[f64; 3], what: &str) -> ColorResult<()> {
    if values.iter().any(|v| *v == 0.0 || !v.is_finite()) {
        return Err(ColorError::invalid(format!("{} must be finite and non-zero", what)));
    }
    Ok(())
}

/// 4x4 matrix + offset transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixTransform {
    /// 4x4 matrix in row-major order.
    pub matrix: [f64; 16],
    /// RGBA offset.
    pub offset: [f64; 4],
    /// Direction.
    pub direction: TransformDirection,
}

impl MatrixTransform {
    /// Identity matrix.
    pub const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];

    /// Embeds a row-major 3x3 matrix, alpha untouched.
    pub fn from_mat3(m: [[f64; 3]; 3]) -> [f64; 16] {
        [
            m[0][0], m[0][1], m[0][2], 0.0,
            m[1][0], m[1][1], m[1][2], 0.0,
            m[2][0], m[2][1], m[2][2], 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    fn validate(&self) -> ColorResult<()> {
        if self.matrix.iter().chain(self.offset.iter()).any(|v| !v.is_finite()) {
            return Err(ColorError::invalid("matrix contains non-finite values"));
        }
        Ok(())
    }
}

impl Default for MatrixTransform {
    fn default() -> Self {
        Self {
            matrix: Self::IDENTITY,
            offset: [0.0; 4],
            direction: TransformDirection::Forward,
        }
    }
}

/// Negative value handling for power curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NegativeStyle {
    /// Clamp negatives to zero.
    #[default]
    Clamp,
    /// Mirror: sign * pow(abs(x), exp).
    Mirror,
    /// Pass negatives through unchanged.
    PassThru,
    /// Continue the linear segment below zero (gamma with linear toe only).
    Linear,
}

/// Exponent/gamma transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentTransform {
    /// Per-channel exponents [R, G, B, A].
    pub value: [f64; 4],
    /// Negative handling style.
    pub negative_style: NegativeStyle,
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for ExponentTransform {
    fn default() -> Self {
        Self {
            value: [1.0; 4],
            negative_style: NegativeStyle::Clamp,
            direction: TransformDirection::Forward,
        }
    }
}

impl ExponentTransform {
    /// Allowed exponent range.
    pub const RANGE: (f64, f64) = (0.01, 100.0);

    fn validate(&self) -> ColorResult<()> {
        let (lo, hi) = Self::RANGE;
        if let Some(v) = self.value.iter().find(|v| !(**v >= lo && **v <= hi)) {
            return Err(ColorError::invalid(format!("exponent {} outside [{}, {}]", v, lo, hi)));
        }
        if self.negative_style == NegativeStyle::Linear {
            return Err(ColorError::invalid("exponent does not support the linear negative style"));
        }
        Ok(())
    }
}

/// Power curve with a linear segment near zero.
///
/// Forward maps encoded values to linear:
/// `((x + offset) / (1 + offset))^gamma` above the break point and
/// `x / slope` below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentWithLinearTransform {
    /// Per-channel gamma [R, G, B, A].
    pub gamma: [f64; 4],
    /// Per-channel offset [R, G, B, A].
    pub offset: [f64; 4],
    /// Negative handling style (Linear or Mirror).
    pub negative_style: NegativeStyle,
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for ExponentWithLinearTransform {
    fn default() -> Self {
        Self {
            gamma: [1.0; 4],
            offset: [0.0; 4],
            negative_style: NegativeStyle::Linear,
            direction: TransformDirection::Forward,
        }
    }
}

impl ExponentWithLinearTransform {
    /// sRGB curve (gamma 2.4, offset 0.055).
    pub fn srgb() -> Self {
        Self {
            gamma: [2.4, 2.4, 2.4, 1.0],
            offset: [0.055, 0.055, 0.055, 0.0],
            ..Default::default()
        }
    }

    fn validate(&self) -> ColorResult<()> {
        if let Some(g) = self.gamma.iter().find(|g| !(**g >= 1.0 && **g <= 10.0)) {
            return Err(ColorError::invalid(format!("gamma {} outside [1, 10]", g)));
        }
        if let Some(o) = self.offset.iter().find(|o| !(**o >= 0.0 && **o <= 0.9)) {
            return Err(ColorError::invalid(format!("offset {} outside [0, 0.9]", o)));
        }
        if !matches!(self.negative_style, NegativeStyle::Linear | NegativeStyle::Mirror) {
            return Err(ColorError::invalid(
                "gamma with linear segment supports only the linear and mirror negative styles",
            ));
        }
        Ok(())
    }
}

/// Log transform: forward is `log_base(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogTransform {
    /// Base of logarithm.
    pub base: f64,
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for LogTransform {
    fn default() -> Self {
        Self {
            base: 2.0,
            direction: TransformDirection::Forward,
        }
    }
}

/// Log with affine input and output.
///
/// Forward: `log_slope * log_base(lin_slope * x + lin_offset) + log_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAffineTransform {
    /// Base of logarithm.
    pub base: f64,
    /// Log side slope per channel.
    pub log_side_slope: [f64; 3],
    /// Log side offset per channel.
    pub log_side_offset: [f64; 3],
    /// Linear side slope per channel.
    pub lin_side_slope: [f64; 3],
    /// Linear side offset per channel.
    pub lin_side_offset: [f64; 3],
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for LogAffineTransform {
    fn default() -> Self {
        Self {
            base: 2.0,
            log_side_slope: [1.0; 3],
            log_side_offset: [0.0; 3],
            lin_side_slope: [1.0; 3],
            lin_side_offset: [0.0; 3],
            direction: TransformDirection::Forward,
        }
    }
}

impl LogAffineTransform {
    fn validate(&self) -> ColorResult<()> {
        check_base(self.base)?;
        check_nonzero(&self.log_side_slope, "log side slope")?;
        check_nonzero(&self.lin_side_slope, "linear side slope")
    }
}

/// Camera log: affine log above `lin_side_break`, a straight line below.
///
/// When `linear_slope` is absent it is chosen so the curve is smooth at the
/// break; the linear offset always keeps it continuous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogCameraTransform {
    /// Base of logarithm.
    pub base: f64,
    /// Log side slope per channel.
    pub log_side_slope: [f64; 3],
    /// Log side offset per channel.
    pub log_side_offset: [f64; 3],
    /// Linear side slope per channel.
    pub lin_side_slope: [f64; 3],
    /// Linear side offset per channel.
    pub lin_side_offset: [f64; 3],
    /// Linear-side break point per channel.
    pub lin_side_break: [f64; 3],
    /// Slope of the linear segment.
    pub linear_slope: Option<[f64; 3]>,
    /// Direction.
    pub direction: TransformDirection,
}

impl LogCameraTransform {
    /// Camera log with unit slopes and the given break.
    pub fn new(base: f64, lin_side_break: [f64; 3]) -> Self {
        Self {
            base,
            log_side_slope: [1.0; 3],
            log_side_offset: [0.0; 3],
            lin_side_slope: [1.0; 3],
            lin_side_offset: [0.0; 3],
            lin_side_break,
            linear_slope: None,
            direction: TransformDirection::Forward,
        }
    }

    fn validate(&self) -> ColorResult<()> {
        check_base(self.base)?;
        check_nonzero(&self.log_side_slope, "log side slope")?;
        check_nonzero(&self.lin_side_slope, "linear side slope")?;
        if let Some(slope) = &self.linear_slope {
            check_nonzero(slope, "linear slope")?;
        }
        for ch in 0..3 {
            let arg = self.lin_side_slope[ch] * self.lin_side_break[ch] + self.lin_side_offset[ch];
            if !(arg > 0.0) {
                return Err(ColorError::invalid(
                    "log camera break point falls outside the log domain",
                ));
            }
        }
        Ok(())
    }
}

/// Range transform style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangeStyle {
    /// Clamp values to the output bounds.
    #[default]
    Clamp,
    /// Scale only.
    NoClamp,
}

/// Range remapping transform.
///
/// Bounds come in pairs: `min_in` with `min_out`, `max_in` with `max_out`.
/// With both pairs the input range is mapped linearly onto the output
/// range; with one pair only an offset is applied and the output clamped
/// on that side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeTransform {
    /// Input min.
    pub min_in: Option<f64>,
    /// Input max.
    pub max_in: Option<f64>,
    /// Output min.
    pub min_out: Option<f64>,
    /// Output max.
    pub max_out: Option<f64>,
    /// Style.
    pub style: RangeStyle,
    /// Direction.
    pub direction: TransformDirection,
}

impl RangeTransform {
    fn validate(&self) -> ColorResult<()> {
        if self.min_in.is_some() != self.min_out.is_some() {
            return Err(ColorError::invalid(
                "range min_in and min_out must both be set or both unset",
            ));
        }
        if self.max_in.is_some() != self.max_out.is_some() {
            return Err(ColorError::invalid(
                "range max_in and max_out must both be set or both unset",
            ));
        }
        if let (Some(lo), Some(hi)) = (self.min_in, self.max_in) {
            if !(hi > lo) {
                return Err(ColorError::invalid(format!(
                    "range max_in {} must exceed min_in {}",
                    hi, lo
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_out, self.max_out) {
            if !(hi > lo) {
                return Err(ColorError::invalid(format!(
                    "range max_out {} must exceed min_out {}",
                    hi, lo
                )));
            }
        }
        Ok(())
    }
}

/// CDL style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CdlStyle {
    /// ASC CDL v1.2, clamped to [0, 1].
    #[default]
    AscCdl,
    /// No clamping; negatives pass through the power.
    NoClamp,
}

/// CDL (ASC Color Decision List) transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdlTransform {
    /// Per-channel slope [R, G, B].
    pub slope: [f64; 3],
    /// Per-channel offset [R, G, B].
    pub offset: [f64; 3],
    /// Per-channel power [R, G, B].
    pub power: [f64; 3],
    /// Saturation (1.0 = no change).
    pub saturation: f64,
    /// CDL style.
    pub style: CdlStyle,
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for CdlTransform {
    fn default() -> Self {
        Self {
            slope: [1.0; 3],
            offset: [0.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
            style: CdlStyle::default(),
            direction: TransformDirection::Forward,
        }
    }
}

impl CdlTransform {
    fn validate(&self) -> ColorResult<()> {
        if self.slope.iter().any(|s| !(*s >= 0.0)) {
            return Err(ColorError::invalid("CDL slope must be >= 0"));
        }
        if self.power.iter().any(|p| !(*p > 0.0)) {
            return Err(ColorError::invalid("CDL power must be > 0"));
        }
        if !(self.saturation >= 0.0) {
            return Err(ColorError::invalid("CDL saturation must be >= 0"));
        }
        Ok(())
    }
}

/// Exposure/contrast style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExposureContrastStyle {
    /// Scene-linear data.
    #[default]
    Linear,
    /// Video (gamma encoded) data.
    Video,
    /// Log encoded data.
    Logarithmic,
}

/// Exposure/contrast adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureContrastTransform {
    /// Exposure in stops.
    pub exposure: f64,
    /// Contrast (1.0 = no change).
    pub contrast: f64,
    /// Gamma (1.0 = no change).
    pub gamma: f64,
    /// Pivot point for contrast, in linear units.
    pub pivot: f64,
    /// Log units per stop (logarithmic style).
    pub log_exposure_step: f64,
    /// Log value of mid gray (logarithmic style).
    pub log_midway_gray: f64,
    /// Style.
    pub style: ExposureContrastStyle,
    /// Direction.
    pub direction: TransformDirection,
}

impl Default for ExposureContrastTransform {
    fn default() -> Self {
        Self {
            exposure: 0.0,
            contrast: 1.0,
            gamma: 1.0,
            pivot: 0.18,
            log_exposure_step: 0.088,
            log_midway_gray: 0.435,
            style: ExposureContrastStyle::Linear,
            direction: TransformDirection::Forward,
        }
    }
}

impl ExposureContrastTransform {
    fn validate(&self) -> ColorResult<()> {
        if !(self.pivot > 0.0) {
            return Err(ColorError::invalid("exposure/contrast pivot must be > 0"));
        }
        if !(self.log_exposure_step > 0.0) {
            return Err(ColorError::invalid("exposure/contrast log exposure step must be > 0"));
        }
        if !(self.contrast > 0.0) || !(self.gamma > 0.0) {
            return Err(ColorError::invalid("exposure/contrast contrast and gamma must be > 0"));
        }
        if !self.exposure.is_finite() {
            return Err(ColorError::invalid("exposure must be finite"));
        }
        Ok(())
    }
}

/// Fixed function styles. Each has a defined inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixedFunctionStyle {
    /// RGB to HSV (hue in [0, 1)).
    RgbToHsv,
    /// CIE XYZ to xyY.
    XyzToXyY,
    /// CIE XYZ to u'v'Y.
    XyzToUvY,
    /// CIE XYZ to L*u*v* (normalized to [0, 1]).
    XyzToLuv,
    /// Surround correction on luminance: `Y^(gamma - 1)` gain.
    Rec2100Surround,
    /// ACES dark to dim surround (gamma 0.9811 on luminance).
    AcesDarkToDim10,
    /// Linear (1.0 = 100 nits) to ST-2084 PQ.
    LinToPq,
}

impl FixedFunctionStyle {
    /// Number of parameters this style takes.
    pub fn param_count(self) -> usize {
        match self {
            Self::Rec2100Surround => 1,
            _ => 0,
        }
    }
}

/// Fixed function transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedFunctionTransform {
    /// Function style.
    pub style: FixedFunctionStyle,
    /// Parameters.
    pub params: Vec<f64>,
    /// Direction.
    pub direction: TransformDirection,
}

impl FixedFunctionTransform {
    /// Fixed function without parameters.
    pub fn new(style: FixedFunctionStyle) -> Self {
        Self {
            style,
            params: Vec::new(),
            direction: TransformDirection::Forward,
        }
    }

    fn validate(&self) -> ColorResult<()> {
        let expected = self.style.param_count();
        if self.params.len() != expected {
            return Err(ColorError::invalid(format!(
                "fixed function {:?} takes {} parameter(s), got {}",
                self.style,
                expected,
                self.params.len()
            )));
        }
        if self.style == FixedFunctionStyle::Rec2100Surround && !(self.params[0] > 0.0) {
            return Err(ColorError::invalid("Rec2100Surround gamma must be > 0"));
        }
        Ok(())
    }
}

/// File-based LUT transform.
///
/// `src` may contain context variables and is resolved through the
/// context's search path when relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransform {
    /// Source file path.
    pub src: String,
    /// Interpolation for 3D tables.
    pub interpolation: Interpolation,
    /// Direction.
    pub direction: TransformDirection,
}

/// Inline 1D LUT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lut1DTransform {
    /// Table.
    pub lut: Lut1D,
    /// Direction.
    pub direction: TransformDirection,
}

impl Lut1DTransform {
    fn validate(&self) -> ColorResult<()> {
        let n = self.lut.size();
        if n < 2 {
            return Err(ColorError::invalid("1D LUT needs at least 2 entries"));
        }
        let mismatch = |c: &Option<Vec<f32>>| c.as_ref().is_some_and(|c| c.len() != n);
        if mismatch(&self.lut.g) || mismatch(&self.lut.b) {
            return Err(ColorError::invalid("1D LUT channels differ in length"));
        }
        if !(self.lut.domain_max > self.lut.domain_min) {
            return Err(ColorError::invalid("1D LUT domain max must exceed min"));
        }
        Ok(())
    }
}

/// Inline 3D LUT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lut3DTransform {
    /// Table (carries its interpolation).
    pub lut: Lut3D,
    /// Direction.
    pub direction: TransformDirection,
}

impl Lut3DTransform {
    fn validate(&self) -> ColorResult<()> {
        let edge = self.lut.size;
        if edge < 2 {
            return Err(ColorError::invalid("3D LUT edge must be >= 2"));
        }
        if self.lut.data.len() != edge * edge * edge {
            return Err(ColorError::invalid(format!(
                "3D LUT of edge {} needs {} samples, got {}",
                edge,
                edge * edge * edge,
                self.lut.data.len()
            )));
        }
        if (0..3).any(|c| !(self.lut.domain_max[c] > self.lut.domain_min[c])) {
            return Err(ColorError::invalid("3D LUT domain max must exceed min"));
        }
        Ok(())
    }
}

/// Group of chained transforms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupTransform {
    /// Ordered list of transforms.
    pub transforms: Vec<Transform>,
    /// Direction; inverse runs the children backwards, each inverted.
    pub direction: TransformDirection,
}

/// Builtin transform by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinTransform {
    /// Builtin name (e.g., "ACEScct_to_ACES2065-1"), case-insensitive.
    pub style: String,
    /// Direction.
    pub direction: TransformDirection,
}

/// Reference to a pair of named color spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSpaceTransform {
    /// Source color space name.
    pub src: String,
    /// Destination color space name.
    pub dst: String,
    /// Skip conversion when either side is a data space.
    pub data_bypass: bool,
    /// Direction.
    pub direction: TransformDirection,
}

/// Reference to named looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookTransform {
    /// Source color space.
    pub src: String,
    /// Destination color space.
    pub dst: String,
    /// Look list (see [`parse_looks`](crate::parse_looks)).
    pub looks: String,
    /// Apply the looks without converting into their process spaces.
    pub skip_colorspace_conversion: bool,
    /// Direction.
    pub direction: TransformDirection,
}

/// Display/view transform reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayViewTransform {
    /// Source color space.
    pub src: String,
    /// Display name.
    pub display: String,
    /// View name.
    pub view: String,
    /// Skip the view's looks.
    pub looks_bypass: bool,
    /// Skip conversion when the source is a data space.
    pub data_bypass: bool,
    /// Direction.
    pub direction: TransformDirection,
}

impl DisplayViewTransform {
    /// Display/view transform with default bypass settings.
    pub fn new(
        src: impl Into<String>,
        display: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            display: display.into(),
            view: view.into(),
            looks_bypass: false,
            data_bypass: true,
            direction: TransformDirection::Forward,
        }
    }
}

/// Allocation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AllocationType {
    /// Linear remap of [min, max] to [0, 1].
    #[default]
    Uniform,
    /// `log2(x + offset)` remapped from [min, max] (in stops) to [0, 1].
    Log2,
}

/// Allocation transform: maps a value range onto [0, 1].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocationTransform {
    /// Allocation type.
    pub allocation: AllocationType,
    /// `[min, max]` or, for log2, `[min, max, offset]`. Empty means `[0, 1]`.
    pub vars: Vec<f64>,
    /// Direction.
    pub direction: TransformDirection,
}

impl AllocationTransform {
    /// `(min, max, offset)` with defaults applied.
    pub fn bounds(&self) -> (f64, f64, f64) {
        match self.vars.as_slice() {
            [min, max] => (*min, *max, 0.0),
            [min, max, offset] => (*min, *max, *offset),
            _ => (0.0, 1.0, 0.0),
        }
    }

    fn validate(&self) -> ColorResult<()> {
        let ok_len = match self.allocation {
            AllocationType::Uniform => matches!(self.vars.len(), 0 | 2),
            AllocationType::Log2 => matches!(self.vars.len(), 0 | 2 | 3),
        };
        if !ok_len {
            return Err(ColorError::invalid(format!(
                "{:?} allocation takes [min, max]{}, got {} values",
                self.allocation,
                if self.allocation == AllocationType::Log2 {
                    " or [min, max, offset]"
                } else {
                    ""
                },
                self.vars.len()
            )));
        }
        let (min, max, _) = self.bounds();
        if !(max > min) {
            return Err(ColorError::invalid("allocation max must exceed min"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_inverse() {
        assert_eq!(TransformDirection::Forward.inverse(), TransformDirection::Inverse);
        assert_eq!(TransformDirection::Inverse.inverse(), TransformDirection::Forward);
        assert_eq!(
            TransformDirection::Inverse.combine(TransformDirection::Inverse),
            TransformDirection::Forward
        );
    }

    #[test]
    fn group_inverse_keeps_order() {
        let g = Transform::group(vec![Transform::exponent(2.0), Transform::file("a.cube")]);
        let Transform::Group(g) = g.inverse() else { unreachable!() };
        assert_eq!(g.direction, TransformDirection::Inverse);
        assert_eq!(g.transforms[0].kind_name(), "Exponent");
    }

    #[test]
    fn exponent_bounds() {
        assert!(Transform::exponent(2.0).validate().is_ok());
        assert!(Transform::exponent(0.001).validate().is_err());
        assert!(Transform::exponent(101.0).validate().is_err());
    }

    #[test]
    fn moncurve_bounds() {
        let srgb = ExponentWithLinearTransform::srgb();
        assert!(Transform::ExponentWithLinear(srgb).validate().is_ok());
        let bad = ExponentWithLinearTransform {
            offset: [0.95; 4],
            ..ExponentWithLinearTransform::srgb()
        };
        assert!(Transform::ExponentWithLinear(bad).validate().is_err());
        let clamp = ExponentWithLinearTransform {
            negative_style: NegativeStyle::Clamp,
            ..ExponentWithLinearTransform::srgb()
        };
        assert!(Transform::ExponentWithLinear(clamp).validate().is_err());
    }

    #[test]
    fn range_pairs() {
        assert!(Transform::range(0.0, 1.0, 0.0, 2.0).validate().is_ok());
        assert!(Transform::range(1.0, 0.0, 0.0, 1.0).validate().is_err());
        let unpaired = RangeTransform {
            min_in: Some(0.0),
            ..Default::default()
        };
        assert!(Transform::Range(unpaired).validate().is_err());
        let one_sided = RangeTransform {
            min_in: Some(0.0),
            min_out: Some(0.1),
            ..Default::default()
        };
        assert!(Transform::Range(one_sided).validate().is_ok());
    }

    #[test]
    fn log_and_cdl() {
        let flat = LogTransform {
            base: 1.0,
            ..Default::default()
        };
        assert!(Transform::Log(flat).validate().is_err());
        let decimal = LogTransform {
            base: 10.0,
            ..Default::default()
        };
        assert!(Transform::Log(decimal).validate().is_ok());
        let cdl = CdlTransform {
            power: [1.0, 0.0, 1.0],
            ..Default::default()
        };
        assert!(Transform::Cdl(cdl).validate().is_err());
    }

    #[test]
    fn fixed_function_params() {
        let mut ff = FixedFunctionTransform::new(FixedFunctionStyle::Rec2100Surround);
        assert!(Transform::FixedFunction(ff.clone()).validate().is_err());
        ff.params = vec![0.78];
        assert!(Transform::FixedFunction(ff).validate().is_ok());
        let mut hsv = FixedFunctionTransform::new(FixedFunctionStyle::RgbToHsv);
        hsv.params = vec![1.0];
        assert!(Transform::FixedFunction(hsv).validate().is_err());
    }

    #[test]
    fn allocation_vars() {
        let ok = AllocationTransform {
            allocation: AllocationType::Log2,
            vars: vec![-8.0, 5.0, 0.00390625],
            ..Default::default()
        };
        assert!(Transform::Allocation(ok).validate().is_ok());
        let bad = AllocationTransform {
            vars: vec![0.0, 1.0, 2.0],
            ..Default::default()
        };
        assert!(Transform::Allocation(bad).validate().is_err());
    }

    #[test]
    fn builtin_and_names() {
        assert!(Transform::builtin("acescct_to_aces2065-1").validate().is_ok());
        assert!(Transform::builtin("no such thing").validate().is_err());
        assert!(Transform::colorspace("", "b").validate().is_err());
    }
}
