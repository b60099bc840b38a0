//! Shader generation for real-time color transforms.
//!
//! Emits a pure shading-language function implementing the same operator
//! list as the CPU evaluator, plus the textures that LUT stages sample.
//!
//! # Example
//!
//! ```
//! use colorpipe::{Processor, OptimizationFlags};
//! use colorpipe::gpu::{GpuLanguage, GpuShaderDesc};
//! use colorpipe::op::Op;
//!
//! let clamp = Op::clamp(Some(0.0), Some(1.0));
//! let processor = Processor::from_ops(vec![clamp], OptimizationFlags::NONE);
//! let desc = GpuShaderDesc::new()
//!     .with_language(GpuLanguage::Glsl330)
//!     .with_function_name("grade");
//! let shader = processor.gpu_shader(&desc).unwrap();
//! assert!(shader.text().contains("vec4 grade(vec4 inPixel)"));
//! ```
//!
//! # Supported operators
//!
//! - Matrix, range, exponent, gamma with linear segment, log family
//! - ASC CDL, exposure/contrast
//! - Fixed functions: PQ, surround corrections, xyY
//! - 1D LUTs as Nx1 textures; inverse curves are baked first
//! - 3D LUTs as 3D textures; inverses need a non-zero edge length to bake

use std::fmt::{self, Write};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use colorpipe_lut::{Interpolation, Lut1D, Lut3D};

use crate::error::{ColorError, ColorResult};
use crate::op::{moncurve_params, LogCurve, Op};
use crate::transform::{CdlStyle, ExposureContrastStyle, FixedFunctionStyle, NegativeStyle};

/// Minimum table size when baking an inverse 1D LUT.
const INV_LUT1D_SIZE: usize = 4096;
/// Smallest argument fed to a logarithm.
const LOG_MIN: f64 = f32::MIN_POSITIVE as f64;
const CDL_LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];
const REC2020_LUMA: [f64; 3] = [0.2627, 0.6780, 0.0593];
const AP1_LUMA: [f64; 3] = [0.2722287168, 0.6740817658, 0.0536895174];
const DIM_SURROUND_GAMMA: f64 = 0.9811;
const VIDEO_POWER: f64 = 0.54644808743;

const PQ_M1: f64 = 0.1593017578125;
const PQ_M2: f64 = 78.84375;
const PQ_C1: f64 = 0.8359375;
const PQ_C2: f64 = 18.8515625;
const PQ_C3: f64 = 18.6875;

const CHANNELS: [&str; 4] = ["r", "g", "b", "a"];

/// Target shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuLanguage {
    /// GLSL 1.20 (OpenGL 2.1)
    Glsl120,
    /// GLSL 3.30 (OpenGL 3.3)
    #[default]
    Glsl330,
    /// GLSL 4.00 (OpenGL 4.0)
    Glsl400,
    /// GLSL ES 3.00 (WebGL 2.0)
    GlslEs300,
    /// HLSL Shader Model 5.0
    Hlsl50,
}

impl GpuLanguage {
    /// Version directive placed at the top of the shader.
    pub fn version_directive(&self) -> &'static str {
        match self {
            GpuLanguage::Glsl120 => "#version 120",
            GpuLanguage::Glsl330 => "#version 330 core",
            GpuLanguage::Glsl400 => "#version 400 core",
            GpuLanguage::GlslEs300 => {
                "#version 300 es\nprecision highp float;\nprecision highp sampler3D;"
            }
            GpuLanguage::Hlsl50 => "",
        }
    }

    /// True for GLSL variants.
    pub fn is_glsl(&self) -> bool {
        !matches!(self, GpuLanguage::Hlsl50)
    }

    fn vec3(&self) -> &'static str {
        if self.is_glsl() { "vec3" } else { "float3" }
    }

    fn vec4(&self) -> &'static str {
        if self.is_glsl() { "vec4" } else { "float4" }
    }

    fn vec2(&self) -> &'static str {
        if self.is_glsl() { "vec2" } else { "float2" }
    }
}

/// Shader request: language, entry point name and 3D LUT edge length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GpuShaderDesc {
    language: GpuLanguage,
    function_name: String,
    lut3d_edge_len: usize,
    resource_prefix: String,
}

impl Default for GpuShaderDesc {
    fn default() -> Self {
        Self {
            language: GpuLanguage::default(),
            function_name: "colorpipe_transform".into(),
            lut3d_edge_len: 0,
            resource_prefix: "colorpipe_".into(),
        }
    }
}

impl GpuShaderDesc {
    /// GLSL 3.30, function `colorpipe_transform`, native LUT sizes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target language.
    pub fn with_language(mut self, language: GpuLanguage) -> Self {
        self.language = language;
        self
    }

    /// Sets the emitted function name.
    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = name.into();
        self
    }

    /// Sets the 3D LUT texture edge length; 0 keeps native sizes.
    pub fn with_lut3d_edge_len(mut self, edge: usize) -> Self {
        self.lut3d_edge_len = edge;
        self
    }

    /// Sets the prefix of texture and sampler names.
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = prefix.into();
        self
    }

    /// Target language.
    #[inline]
    pub fn language(&self) -> GpuLanguage {
        self.language
    }

    /// Emitted function name.
    #[inline]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// 3D LUT texture edge length.
    #[inline]
    pub fn lut3d_edge_len(&self) -> usize {
        self.lut3d_edge_len
    }

    /// Texture name prefix.
    #[inline]
    pub fn resource_prefix(&self) -> &str {
        &self.resource_prefix
    }

    fn validate(&self) -> ColorResult<()> {
        let ident_ok = |s: &str| {
            s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !s.starts_with(|c: char| c.is_ascii_digit())
        };
        if self.function_name.is_empty() || !ident_ok(&self.function_name) {
            return Err(ColorError::buffer(format!(
                "invalid shader function name '{}'",
                self.function_name
            )));
        }
        if !ident_ok(&self.resource_prefix) {
            return Err(ColorError::buffer(format!(
                "invalid resource prefix '{}'",
                self.resource_prefix
            )));
        }
        if self.lut3d_edge_len == 1 {
            return Err(ColorError::buffer("3D LUT edge length must be 0 or at least 2"));
        }
        Ok(())
    }
}

/// Texture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureType {
    /// 2D texture; 1D LUTs are stored as Nx1.
    Texture2D,
    /// 3D texture.
    Texture3D,
}

/// Texture filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuInterpolation {
    /// Nearest neighbor.
    Nearest,
    /// Hardware linear filtering.
    #[default]
    Linear,
}

/// Texture a LUT stage samples.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuTexture {
    /// Uniform name in the shader.
    pub name: String,
    /// Texture kind.
    pub texture_type: GpuTextureType,
    /// Width in texels.
    pub width: u32,
    /// Height (1 for 1D LUTs).
    pub height: u32,
    /// Depth (1 for 2D textures).
    pub depth: u32,
    /// RGB texels, red fastest.
    pub data: Vec<f32>,
    /// Filtering mode.
    pub interpolation: GpuInterpolation,
}

/// Generated shader text and its textures.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuShader {
    text: String,
    textures: Vec<GpuTexture>,
    cache_id: String,
}

impl GpuShader {
    /// Shader source.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Textures to upload, in declaration order.
    #[inline]
    pub fn textures(&self) -> &[GpuTexture] {
        &self.textures
    }

    /// True if any texture is needed.
    #[inline]
    pub fn has_textures(&self) -> bool {
        !self.textures.is_empty()
    }

    /// Hex SHA-256 over the text and texture contents.
    #[inline]
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }
}

/// One emitted stage; LUT stages carry the table actually uploaded.
enum Stage<'a> {
    Math(&'a Op),
    Lut1D { lut: Arc<Lut1D>, texture: usize },
    Lut3D { lut: Arc<Lut3D>, texture: usize },
}

/// Generates a shader for `ops`.
///
/// Fails with [`ColorError::GpuUnsupported`] if any op has no shader form.
pub fn generate(ops: &[Op], desc: &GpuShaderDesc) -> ColorResult<GpuShader> {
    desc.validate()?;
    let (stages, textures) = plan(ops, desc)?;
    let text = emit(&stages, &textures, desc)
        .map_err(|_| ColorError::invalid("shader text formatting failed"))?;

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    for tex in &textures {
        hasher.update(tex.name.as_bytes());
        for dim in [tex.width, tex.height, tex.depth] {
            hasher.update(dim.to_le_bytes());
        }
        for v in &tex.data {
            hasher.update(v.to_le_bytes());
        }
    }
    let cache_id = format!("{:x}", hasher.finalize());
    debug!(
        language = ?desc.language,
        function = %desc.function_name,
        stages = stages.len(),
        textures = textures.len(),
        "generated shader"
    );
    Ok(GpuShader {
        text,
        textures,
        cache_id,
    })
}

fn unsupported(what: impl Into<String>) -> ColorError {
    ColorError::GpuUnsupported { op: what.into() }
}

fn plan<'a>(ops: &'a [Op], desc: &GpuShaderDesc) -> ColorResult<(Vec<Stage<'a>>, Vec<GpuTexture>)> {
    let mut stages = Vec::with_capacity(ops.len());
    let mut textures = Vec::new();
    for op in ops {
        match op {
            Op::Lut1D { lut, forward } => {
                let lut = if *forward {
                    lut.clone()
                } else {
                    let size = lut.size().max(INV_LUT1D_SIZE);
                    let inverse = lut
                        .invert(size)
                        .map_err(|e| unsupported(format!("inverse 1D LUT: {}", e)))?;
                    Arc::new(inverse)
                };
                let name = format!("{}lut1d_{}", desc.resource_prefix, textures.len());
                textures.push(lut1d_texture(name, &lut));
                stages.push(Stage::Lut1D {
                    lut,
                    texture: textures.len() - 1,
                });
            }
            Op::Lut3D { lut, forward } => {
                let edge = desc.lut3d_edge_len;
                let lut = match (*forward, edge) {
                    (false, 0) => {
                        return Err(unsupported("inverse 3D LUT without a bake edge length"));
                    }
                    (false, edge) => Arc::new(
                        Lut3D::from_fn(edge, lut.domain_min, lut.domain_max, |rgb| {
                            lut.invert_rgb(rgb)
                        })
                        .map_err(|e| unsupported(format!("inverse 3D LUT: {}", e)))?,
                    ),
                    (true, edge) if edge != 0 && edge != lut.size => Arc::new(
                        Lut3D::from_fn(edge, lut.domain_min, lut.domain_max, |rgb| lut.apply(rgb))
                            .map_err(|e| unsupported(format!("3D LUT resample: {}", e)))?
                            .with_interpolation(lut.interpolation),
                    ),
                    (true, _) => lut.clone(),
                };
                let name = format!("{}lut3d_{}", desc.resource_prefix, textures.len());
                textures.push(lut3d_texture(name, &lut));
                stages.push(Stage::Lut3D {
                    lut,
                    texture: textures.len() - 1,
                });
            }
            Op::FixedFunction { style, .. } => match style {
                FixedFunctionStyle::LinToPq
                | FixedFunctionStyle::Rec2100Surround
                | FixedFunctionStyle::AcesDarkToDim10
                | FixedFunctionStyle::XyzToXyY => stages.push(Stage::Math(op)),
                other => return Err(unsupported(format!("fixed function {:?}", other))),
            },
            _ => stages.push(Stage::Math(op)),
        }
    }
    Ok((stages, textures))
}

fn lut1d_texture(name: String, lut: &Lut1D) -> GpuTexture {
    let n = lut.size();
    let mut data = Vec::with_capacity(n * 3);
    for i in 0..n {
        for c in 0..3 {
            data.push(lut.channel(c)[i]);
        }
    }
    GpuTexture {
        name,
        texture_type: GpuTextureType::Texture2D,
        width: n as u32,
        height: 1,
        depth: 1,
        data,
        interpolation: GpuInterpolation::Linear,
    }
}

fn lut3d_texture(name: String, lut: &Lut3D) -> GpuTexture {
    let n = lut.size as u32;
    GpuTexture {
        name,
        texture_type: GpuTextureType::Texture3D,
        width: n,
        height: n,
        depth: n,
        data: lut.data.iter().flatten().copied().collect(),
        interpolation: match lut.interpolation {
            Interpolation::Nearest => GpuInterpolation::Nearest,
            Interpolation::Linear | Interpolation::Tetrahedral => GpuInterpolation::Linear,
        },
    }
}

/// Float literal valid in every target language.
fn lit(v: f64) -> String {
    let v = if v.is_finite() {
        v
    } else {
        (f32::MAX as f64).copysign(v)
    };
    let s = if v == 0.0 || (v.abs() >= 1e-4 && v.abs() < 1e9) {
        format!("{:.8}", v)
    } else {
        format!("{:.8e}", v)
    };
    if v < 0.0 { format!("({})", s) } else { s }
}

struct Emitter<'d> {
    lang: GpuLanguage,
    desc: &'d GpuShaderDesc,
    out: String,
}

impl Emitter<'_> {
    fn v3(&self, v: [f64; 3]) -> String {
        format!(
            "{}({}, {}, {})",
            self.lang.vec3(),
            lit(v[0]),
            lit(v[1]),
            lit(v[2])
        )
    }

    fn splat3(&self, v: f64) -> String {
        self.v3([v; 3])
    }

    fn v4(&self, v: [f64; 4]) -> String {
        format!(
            "{}({}, {}, {}, {})",
            self.lang.vec4(),
            lit(v[0]),
            lit(v[1]),
            lit(v[2]),
            lit(v[3])
        )
    }

    fn sample2d(&self, tex: &str, u: &str) -> String {
        let coord = format!("{}({}, 0.5)", self.lang.vec2(), u);
        match self.lang {
            GpuLanguage::Glsl120 => format!("texture2D({}, {})", tex, coord),
            GpuLanguage::Hlsl50 => format!("{}.Sample({}_sampler, {})", tex, tex, coord),
            _ => format!("texture({}, {})", tex, coord),
        }
    }

    fn sample3d(&self, tex: &str, coord: &str) -> String {
        match self.lang {
            GpuLanguage::Glsl120 => format!("texture3D({}, {})", tex, coord),
            GpuLanguage::Hlsl50 => format!("{}.Sample({}_sampler, {})", tex, tex, coord),
            _ => format!("texture({}, {})", tex, coord),
        }
    }

    fn line(&mut self, s: &str) -> fmt::Result {
        writeln!(self.out, "    {}", s)
    }
}

fn emit(
    stages: &[Stage<'_>],
    textures: &[GpuTexture],
    desc: &GpuShaderDesc,
) -> Result<String, fmt::Error> {
    let lang = desc.language;
    let mut e = Emitter {
        lang,
        desc,
        out: String::new(),
    };

    let directive = lang.version_directive();
    if !directive.is_empty() {
        writeln!(e.out, "{}", directive)?;
        writeln!(e.out)?;
    }
    writeln!(e.out, "// Generated by colorpipe")?;
    writeln!(e.out)?;

    for tex in textures {
        match (lang.is_glsl(), tex.texture_type) {
            (true, GpuTextureType::Texture2D) => {
                writeln!(e.out, "uniform sampler2D {};", tex.name)?
            }
            (true, GpuTextureType::Texture3D) => {
                writeln!(e.out, "uniform sampler3D {};", tex.name)?
            }
            (false, GpuTextureType::Texture2D) => {
                writeln!(e.out, "Texture2D<float4> {};", tex.name)?
            }
            (false, GpuTextureType::Texture3D) => {
                writeln!(e.out, "Texture3D<float4> {};", tex.name)?
            }
        }
        if !lang.is_glsl() {
            writeln!(e.out, "SamplerState {}_sampler;", tex.name)?;
        }
    }
    if !textures.is_empty() {
        writeln!(e.out)?;
    }

    let v4 = lang.vec4();
    writeln!(e.out, "{} {}({} inPixel)", v4, e.desc.function_name, v4)?;
    writeln!(e.out, "{{")?;
    e.line(&format!("{} outColor = inPixel;", v4))?;

    for stage in stages {
        match stage {
            Stage::Math(op) => {
                writeln!(e.out)?;
                e.line(&format!("// {}", op.name()))?;
                emit_op(&mut e, op)?;
            }
            Stage::Lut1D { lut, texture } => {
                writeln!(e.out)?;
                e.line("// Lut1D")?;
                emit_lut1d(&mut e, lut, &textures[*texture].name)?;
            }
            Stage::Lut3D { lut, texture } => {
                writeln!(e.out)?;
                e.line("// Lut3D")?;
                emit_lut3d(&mut e, lut, &textures[*texture].name)?;
            }
        }
    }

    writeln!(e.out)?;
    e.line("return outColor;")?;
    writeln!(e.out, "}}")?;
    Ok(e.out)
}

fn emit_op(e: &mut Emitter<'_>, op: &Op) -> fmt::Result {
    match op {
        Op::Matrix { matrix: m, offset } => {
            let rows: Vec<String> = (0..4)
                .map(|i| {
                    let row = [m[i * 4], m[i * 4 + 1], m[i * 4 + 2], m[i * 4 + 3]];
                    format!("dot({}, outColor) + {}", e.v4(row), lit(offset[i]))
                })
                .collect();
            let line = format!("outColor = {}({});", e.lang.vec4(), rows.join(", "));
            e.line(&line)
        }
        Op::Range { scale, offset, clamp_min, clamp_max } => {
            if *scale != 1.0 || *offset != 0.0 {
                let line = format!(
                    "outColor.rgb = outColor.rgb * {} + {};",
                    e.splat3(*scale),
                    e.splat3(*offset)
                );
                e.line(&line)?;
            }
            if let Some(lo) = clamp_min {
                let line = format!("outColor.rgb = max(outColor.rgb, {});", e.splat3(*lo));
                e.line(&line)?;
            }
            if let Some(hi) = clamp_max {
                let line = format!("outColor.rgb = min(outColor.rgb, {});", e.splat3(*hi));
                e.line(&line)?;
            }
            Ok(())
        }
        Op::Exponent { value, negative_style, .. } => {
            for (c, ch) in CHANNELS.iter().enumerate() {
                let x = format!("outColor.{}", ch);
                let p = lit(value[c]);
                let expr = match negative_style {
                    NegativeStyle::Mirror => format!("sign({x}) * pow(abs({x}), {p})"),
                    NegativeStyle::PassThru => format!("{x} < 0.0 ? {x} : pow({x}, {p})"),
                    _ => format!("pow(max({x}, 0.0), {p})"),
                };
                e.line(&format!("{} = {};", x, expr))?;
            }
            Ok(())
        }
        Op::ExponentWithLinear { gamma, offset, negative_style, forward, .. } => {
            for (c, ch) in CHANNELS.iter().enumerate() {
                let x = format!("outColor.{}", ch);
                if *negative_style == NegativeStyle::Mirror {
                    let curve = moncurve_expr("t", gamma[c], offset[c], *forward);
                    e.line(&format!("{{ float t = abs({x}); {x} = sign({x}) * ({curve}); }}"))?;
                } else {
                    let curve = moncurve_expr(&x, gamma[c], offset[c], *forward);
                    e.line(&format!("{} = {};", x, curve))?;
                }
            }
            Ok(())
        }
        Op::Log { curve, forward, .. } => {
            for (c, ch) in CHANNELS.iter().enumerate().take(3) {
                let x = format!("outColor.{}", ch);
                let expr = if *forward {
                    log_encode_expr(curve, c, &x)
                } else {
                    log_decode_expr(curve, c, &x)
                };
                e.line(&format!("{} = {};", x, expr))?;
            }
            Ok(())
        }
        Op::Cdl { slope, offset, power, saturation, style, forward } => {
            emit_cdl(e, slope, offset, power, *saturation, *style, *forward)
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
            let c = contrast * gamma;
            let line = match style {
                ExposureContrastStyle::Linear | ExposureContrastStyle::Video => {
                    let (gain, pivot) = if *style == ExposureContrastStyle::Video {
                        ((exposure * VIDEO_POWER).exp2(), pivot.powf(VIDEO_POWER))
                    } else {
                        (exposure.exp2(), *pivot)
                    };
                    if *forward {
                        format!(
                            "outColor.rgb = pow(max(outColor.rgb * {}, {}), {}) * {};",
                            lit(gain / pivot),
                            e.splat3(0.0),
                            e.splat3(c),
                            lit(pivot)
                        )
                    } else {
                        format!(
                            "outColor.rgb = pow(max(outColor.rgb * {}, {}), {}) * {};",
                            lit(1.0 / pivot),
                            e.splat3(0.0),
                            e.splat3(1.0 / c),
                            lit(pivot / gain)
                        )
                    }
                }
                ExposureContrastStyle::Logarithmic => {
                    let lp = ((pivot / 0.18).log2() * log_exposure_step + log_midway_gray).max(0.0);
                    let shift = exposure * log_exposure_step;
                    if *forward {
                        format!(
                            "outColor.rgb = (outColor.rgb + {}) * {} + {};",
                            e.splat3(shift - lp),
                            lit(c),
                            e.splat3(lp)
                        )
                    } else {
                        format!(
                            "outColor.rgb = (outColor.rgb - {}) * {} + {};",
                            e.splat3(lp),
                            lit(1.0 / c),
                            e.splat3(lp - shift)
                        )
                    }
                }
            };
            e.line(&line)
        }
        Op::FixedFunction { style, params, forward } => {
            emit_fixed_function(e, *style, params, *forward)
        }
        // LUT ops are planned into texture stages.
        Op::Lut1D { .. } | Op::Lut3D { .. } => Ok(()),
    }
}

fn moncurve_expr(x: &str, gamma: f64, offset: f64, forward: bool) -> String {
    let (brk, slope) = moncurve_params(gamma, offset);
    if forward {
        let power = format!(
            "pow(max(({x} + {}) * {}, 0.0), {})",
            lit(offset),
            lit(1.0 / (1.0 + offset)),
            lit(gamma)
        );
        if brk.is_finite() {
            format!("{x} >= {} ? {power} : {x} * {}", lit(brk), lit(1.0 / slope))
        } else {
            format!("{x} * {}", lit(1.0 / slope))
        }
    } else {
        let power = format!(
            "{} * pow(max({x}, 0.0), {}) - {}",
            lit(1.0 + offset),
            lit(1.0 / gamma),
            lit(offset)
        );
        if brk.is_finite() {
            format!("{x} >= {} ? {power} : {x} * {}", lit(brk / slope), lit(slope))
        } else {
            format!("{x} * {}", lit(slope))
        }
    }
}

fn log_encode_expr(curve: &LogCurve, c: usize, x: &str) -> String {
    let k = curve.log_slope[c] / curve.base.log2();
    let log = format!(
        "{} * log2(max({x} * {} + {}, {})) + {}",
        lit(k),
        lit(curve.lin_slope[c]),
        lit(curve.lin_offset[c]),
        lit(LOG_MIN),
        lit(curve.log_offset[c])
    );
    match curve.lin_break {
        Some(brk) => format!(
            "{x} < {} ? {x} * {} + {} : {log}",
            lit(brk[c]),
            lit(curve.linear_slope[c]),
            lit(curve.linear_offset[c])
        ),
        None => log,
    }
}

fn log_decode_expr(curve: &LogCurve, c: usize, y: &str) -> String {
    let k = curve.base.log2() / curve.log_slope[c];
    let exp = format!(
        "(exp2(({y} - {}) * {}) - {}) * {}",
        lit(curve.log_offset[c]),
        lit(k),
        lit(curve.lin_offset[c]),
        lit(1.0 / curve.lin_slope[c])
    );
    match curve.lin_break {
        Some(brk) => {
            let log_brk = curve.linear_slope[c] * brk[c] + curve.linear_offset[c];
            let increasing = curve.log_slope[c] * curve.lin_slope[c] > 0.0;
            let cmp = if increasing { "<" } else { ">" };
            format!(
                "{y} {cmp} {} ? ({y} - {}) * {} : {exp}",
                lit(log_brk),
                lit(curve.linear_offset[c]),
                lit(1.0 / curve.linear_slope[c])
            )
        }
        None => exp,
    }
}

fn emit_cdl(
    e: &mut Emitter<'_>,
    slope: &[f64; 3],
    offset: &[f64; 3],
    power: &[f64; 3],
    sat: f64,
    style: CdlStyle,
    forward: bool,
) -> fmt::Result {
    let clamp01 = format!(
        "outColor.rgb = clamp(outColor.rgb, {}, {});",
        e.splat3(0.0),
        e.splat3(1.0)
    );
    let luma = e.v3(CDL_LUMA);
    let saturate = |s: f64| {
        format!(
            "{{ float luma = dot(outColor.rgb, {luma}); outColor.rgb = luma + {} * (outColor.rgb - luma); }}",
            lit(s)
        )
    };
    let asc = style == CdlStyle::AscCdl;
    if forward {
        let line = format!("outColor.rgb = outColor.rgb * {} + {};", e.v3(*slope), e.v3(*offset));
        e.line(&line)?;
        if asc {
            let line = format!("outColor.rgb = pow({}, {});", clamp01_expr(e), e.v3(*power));
            e.line(&line)?;
        } else {
            for (c, ch) in CHANNELS.iter().enumerate().take(3) {
                let x = format!("outColor.{}", ch);
                e.line(&format!("{x} = {x} > 0.0 ? pow({x}, {}) : {x};", lit(power[c])))?;
            }
        }
        e.line(&saturate(sat))?;
        if asc {
            e.line(&clamp01)?;
        }
    } else {
        if asc {
            e.line(&clamp01)?;
        }
        e.line(&saturate(1.0 / sat))?;
        if asc {
            e.line(&clamp01)?;
        }
        for (c, ch) in CHANNELS.iter().enumerate().take(3) {
            let x = format!("outColor.{}", ch);
            e.line(&format!("{x} = {x} > 0.0 ? pow({x}, {}) : {x};", lit(1.0 / power[c])))?;
        }
        let inv_slope = slope.map(|s| 1.0 / s);
        let line = format!(
            "outColor.rgb = (outColor.rgb - {}) * {};",
            e.v3(*offset),
            e.v3(inv_slope)
        );
        e.line(&line)?;
    }
    Ok(())
}

fn clamp01_expr(e: &Emitter<'_>) -> String {
    format!("clamp(outColor.rgb, {}, {})", e.splat3(0.0), e.splat3(1.0))
}

fn emit_fixed_function(
    e: &mut Emitter<'_>,
    style: FixedFunctionStyle,
    params: &[f64],
    forward: bool,
) -> fmt::Result {
    let v3 = e.lang.vec3();
    match style {
        FixedFunctionStyle::LinToPq if forward => {
            let lines = [
                format!("{v3} l = min(abs(outColor.rgb) * 0.01, {});", e.splat3(1.0)),
                format!("{v3} lm = pow(l, {});", e.splat3(PQ_M1)),
                format!(
                    "{v3} n = pow(({} + {} * lm) / ({} + {} * lm), {});",
                    e.splat3(PQ_C1),
                    lit(PQ_C2),
                    e.splat3(1.0),
                    lit(PQ_C3),
                    e.splat3(PQ_M2)
                ),
                "outColor.rgb = sign(outColor.rgb) * n;".to_string(),
            ];
            block(e, &lines)
        }
        FixedFunctionStyle::LinToPq => {
            let lines = [
                format!(
                    "{v3} np = pow(min(abs(outColor.rgb), {}), {});",
                    e.splat3(1.0),
                    e.splat3(1.0 / PQ_M2)
                ),
                format!(
                    "{v3} l = pow(max(np - {}, {}) / ({} - {} * np), {});",
                    e.splat3(PQ_C1),
                    e.splat3(0.0),
                    e.splat3(PQ_C2),
                    lit(PQ_C3),
                    e.splat3(1.0 / PQ_M1)
                ),
                "outColor.rgb = sign(outColor.rgb) * l * 100.0;".to_string(),
            ];
            block(e, &lines)
        }
        FixedFunctionStyle::Rec2100Surround | FixedFunctionStyle::AcesDarkToDim10 => {
            let (weights, gamma) = if style == FixedFunctionStyle::Rec2100Surround {
                (REC2020_LUMA, params.first().copied().unwrap_or(1.0))
            } else {
                (AP1_LUMA, DIM_SURROUND_GAMMA)
            };
            let gamma = if forward { gamma } else { 1.0 / gamma };
            let lines = [
                format!("float y = max(dot(outColor.rgb, {}), {});", e.v3(weights), lit(1e-10)),
                format!("outColor.rgb = outColor.rgb * pow(y, {});", lit(gamma - 1.0)),
            ];
            block(e, &lines)
        }
        FixedFunctionStyle::XyzToXyY if forward => {
            let lines = [
                "float s = outColor.r + outColor.g + outColor.b;".to_string(),
                format!(
                    "outColor.rgb = s == 0.0 ? {v3}(0.0, 0.0, outColor.g) : {v3}(outColor.r / s, outColor.g / s, outColor.g);"
                ),
            ];
            block(e, &lines)
        }
        FixedFunctionStyle::XyzToXyY => {
            let lines = [
                format!("{v3} c = outColor.rgb;"),
                format!(
                    "outColor.rgb = c.g == 0.0 ? {v3}(0.0, c.b, 0.0) : {v3}(c.r * c.b / c.g, c.b, (1.0 - c.r - c.g) * c.b / c.g);"
                ),
            ];
            block(e, &lines)
        }
        // Rejected while planning.
        FixedFunctionStyle::RgbToHsv
        | FixedFunctionStyle::XyzToUvY
        | FixedFunctionStyle::XyzToLuv => Ok(()),
    }
}

fn block(e: &mut Emitter<'_>, lines: &[String]) -> fmt::Result {
    e.line("{")?;
    for l in lines {
        e.line(&format!("    {}", l))?;
    }
    e.line("}")
}

/// Normalized texel-center coordinate expression for a LUT axis.
fn lut_coord(e: &Emitter<'_>, min: [f64; 3], max: [f64; 3], n: usize) -> String {
    let scale = [0, 1, 2].map(|c| 1.0 / (max[c] - min[c]));
    let n = n as f64;
    format!(
        "(clamp((outColor.rgb - {}) * {}, {}, {}) * {} + {}) * {}",
        e.v3(min),
        e.v3(scale),
        e.splat3(0.0),
        e.splat3(1.0),
        lit(n - 1.0),
        e.splat3(0.5),
        lit(1.0 / n)
    )
}

fn emit_lut1d(e: &mut Emitter<'_>, lut: &Lut1D, tex: &str) -> fmt::Result {
    let min = [lut.domain_min as f64; 3];
    let max = [lut.domain_max as f64; 3];
    let coord = lut_coord(e, min, max, lut.size());
    let mut lines = vec![format!("{} u = {};", e.lang.vec3(), coord)];
    for ch in CHANNELS.iter().take(3) {
        let sample = e.sample2d(tex, &format!("u.{}", ch));
        lines.push(format!("outColor.{} = {}.{};", ch, sample, ch));
    }
    block(e, &lines)
}

fn emit_lut3d(e: &mut Emitter<'_>, lut: &Lut3D, tex: &str) -> fmt::Result {
    let min = lut.domain_min.map(f64::from);
    let max = lut.domain_max.map(f64::from);
    let coord = lut_coord(e, min, max, lut.size);
    let line = format!("outColor.rgb = {}.rgb;", e.sample3d(tex, &coord));
    e.line(&line)
}
