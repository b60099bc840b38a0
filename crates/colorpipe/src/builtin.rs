//! Named builtin transforms.
//!
//! Each builtin expands into primitive transforms (log curves, matrices,
//! fixed functions), so it is optimized and inverted like any other chain.
//! Names are matched case-insensitively.
//!
//! ```
//! use colorpipe::builtin;
//!
//! assert!(builtin::lookup("acescct_to_aces2065-1").is_some());
//! assert_eq!(builtin::names().count(), 13);
//! ```

use crate::error::{ColorError, ColorResult};
use crate::primaries::{self, Primaries};
use crate::transform::{
    ExponentWithLinearTransform, FixedFunctionStyle, FixedFunctionTransform, LogCameraTransform,
    MatrixTransform, Transform, TransformDirection,
};

/// A registered builtin transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinDef {
    /// Canonical name.
    pub name: &'static str,
    /// One line description.
    pub description: &'static str,
}

const BUILTINS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "IDENTITY",
        description: "No-op",
    },
    BuiltinDef {
        name: "ACEScg_to_ACES2065-1",
        description: "ACES AP1 linear to AP0 linear",
    },
    BuiltinDef {
        name: "ACEScct_to_ACES2065-1",
        description: "ACEScct log (AP1) to AP0 linear",
    },
    BuiltinDef {
        name: "ARRI_ALEXA-LOGC-EI800-AWG_to_ACES2065-1",
        description: "ARRI LogC3 EI800 Wide Gamut 3 to AP0 linear",
    },
    BuiltinDef {
        name: "SONY_SLOG3-SGAMUT3_to_ACES2065-1",
        description: "Sony S-Log3 S-Gamut3 to AP0 linear",
    },
    BuiltinDef {
        name: "PANASONIC_VLOG-VGAMUT_to_ACES2065-1",
        description: "Panasonic V-Log V-Gamut to AP0 linear",
    },
    BuiltinDef {
        name: "RED_LOG3G10-RWG_to_ACES2065-1",
        description: "RED Log3G10 REDWideGamutRGB to AP0 linear",
    },
    BuiltinDef {
        name: "UTILITY - ACES-AP0_to_CIE-XYZ-D65_BFD",
        description: "AP0 to CIE XYZ, Bradford adapted to D65",
    },
    BuiltinDef {
        name: "UTILITY - ACES-AP1_to_CIE-XYZ-D65_BFD",
        description: "AP1 to CIE XYZ, Bradford adapted to D65",
    },
    BuiltinDef {
        name: "CURVE - ST-2084_to_LINEAR",
        description: "SMPTE ST-2084 (PQ) to linear, 1.0 = 100 nits",
    },
    BuiltinDef {
        name: "DISPLAY - CIE-XYZ-D65_to_sRGB",
        description: "CIE XYZ D65 to sRGB display encoding",
    },
    BuiltinDef {
        name: "DISPLAY - CIE-XYZ-D65_to_REC.1886-REC.709",
        description: "CIE XYZ D65 to Rec.709 with a 2.4 gamma",
    },
    BuiltinDef {
        name: "ACES-LMT - BLUE_LIGHT_ARTIFACT_FIX",
        description: "ACES blue light artifact fix LMT",
    },
];

const BLUE_LIGHT_FIX: [[f64; 3]; 3] = [
    [0.9404372683, -0.0183068787, 0.0778696104],
    [0.0083786969, 0.8286599939, 0.1629613092],
    [0.0005471261, -0.0008833746, 1.0003362486],
];

/// Looks up a builtin by name, ignoring ASCII case.
pub fn lookup(style: &str) -> Option<&'static BuiltinDef> {
    let style = style.trim();
    BUILTINS.iter().find(|b| b.name.eq_ignore_ascii_case(style))
}

/// Canonical names of every builtin.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

/// Forward definition of a builtin as primitive transforms.
pub fn transform(style: &str) -> ColorResult<Transform> {
    let def = lookup(style)
        .ok_or_else(|| ColorError::invalid(format!("unknown builtin transform '{}'", style)))?;

    let t = match def.name {
        "IDENTITY" => Transform::group(Vec::new()),
        "ACEScg_to_ACES2065-1" => gamut(&primaries::AP1, &primaries::AP0),
        "ACEScct_to_ACES2065-1" => Transform::group(vec![
            to_linear(acescct()),
            gamut(&primaries::AP1, &primaries::AP0),
        ]),
        "ARRI_ALEXA-LOGC-EI800-AWG_to_ACES2065-1" => Transform::group(vec![
            to_linear(logc3_ei800()),
            gamut(&primaries::ALEXA_WIDE_GAMUT, &primaries::AP0),
        ]),
        "SONY_SLOG3-SGAMUT3_to_ACES2065-1" => Transform::group(vec![
            to_linear(slog3()),
            gamut(&primaries::S_GAMUT3, &primaries::AP0),
        ]),
        "PANASONIC_VLOG-VGAMUT_to_ACES2065-1" => Transform::group(vec![
            to_linear(vlog()),
            gamut(&primaries::V_GAMUT, &primaries::AP0),
        ]),
        "RED_LOG3G10-RWG_to_ACES2065-1" => Transform::group(vec![
            to_linear(log3g10()),
            gamut(&primaries::RED_WIDE_GAMUT, &primaries::AP0),
        ]),
        "UTILITY - ACES-AP0_to_CIE-XYZ-D65_BFD" => mat3(primaries::to_rows(
            primaries::rgb_to_xyz_adapted(&primaries::AP0, primaries::D65),
        )),
        "UTILITY - ACES-AP1_to_CIE-XYZ-D65_BFD" => mat3(primaries::to_rows(
            primaries::rgb_to_xyz_adapted(&primaries::AP1, primaries::D65),
        )),
        "CURVE - ST-2084_to_LINEAR" => Transform::FixedFunction(FixedFunctionTransform {
            direction: TransformDirection::Inverse,
            ..FixedFunctionTransform::new(FixedFunctionStyle::LinToPq)
        }),
        "DISPLAY - CIE-XYZ-D65_to_sRGB" => Transform::group(vec![
            mat3(primaries::to_rows(primaries::xyz_to_rgb(&primaries::REC709))),
            Transform::ExponentWithLinear(ExponentWithLinearTransform {
                direction: TransformDirection::Inverse,
                ..ExponentWithLinearTransform::srgb()
            }),
        ]),
        "DISPLAY - CIE-XYZ-D65_to_REC.1886-REC.709" => Transform::group(vec![
            mat3(primaries::to_rows(primaries::xyz_to_rgb(&primaries::REC709))),
            Transform::exponent(2.4).inverse(),
        ]),
        "ACES-LMT - BLUE_LIGHT_ARTIFACT_FIX" => mat3(BLUE_LIGHT_FIX),
        other => {
            return Err(ColorError::invalid(format!("builtin '{}' has no definition", other)));
        }
    };
    Ok(t)
}

fn mat3(rows: [[f64; 3]; 3]) -> Transform {
    Transform::matrix(MatrixTransform::from_mat3(rows))
}

fn gamut(src: &Primaries, dst: &Primaries) -> Transform {
    mat3(primaries::to_rows(primaries::rgb_to_rgb(src, dst)))
}

fn to_linear(curve: LogCameraTransform) -> Transform {
    Transform::LogCamera(curve).inverse()
}

/// ACEScct encoding: lin to log.
pub fn acescct() -> LogCameraTransform {
    LogCameraTransform {
        log_side_slope: [1.0 / 17.52; 3],
        log_side_offset: [9.72 / 17.52; 3],
        ..LogCameraTransform::new(2.0, [0.0078125; 3])
    }
}

/// ARRI LogC3 (EI 800) encoding.
pub fn logc3_ei800() -> LogCameraTransform {
    LogCameraTransform {
        log_side_slope: [0.247190; 3],
        log_side_offset: [0.385537; 3],
        lin_side_slope: [5.555556; 3],
        lin_side_offset: [0.052272; 3],
        linear_slope: Some([5.367655; 3]),
        ..LogCameraTransform::new(10.0, [0.010591; 3])
    }
}

/// Sony S-Log3 encoding.
pub fn slog3() -> LogCameraTransform {
    LogCameraTransform {
        log_side_slope: [261.5 / 1023.0; 3],
        log_side_offset: [420.0 / 1023.0; 3],
        lin_side_slope: [1.0 / 0.19; 3],
        lin_side_offset: [0.01 / 0.19; 3],
        linear_slope: Some([(171.2102946929 - 95.0) / 0.01125 / 1023.0; 3]),
        ..LogCameraTransform::new(10.0, [0.01125; 3])
    }
}

/// Panasonic V-Log encoding.
pub fn vlog() -> LogCameraTransform {
    LogCameraTransform {
        log_side_slope: [0.241514; 3],
        log_side_offset: [0.598206; 3],
        lin_side_offset: [0.00873; 3],
        linear_slope: Some([5.6; 3]),
        ..LogCameraTransform::new(10.0, [0.01; 3])
    }
}

/// RED Log3G10 encoding.
pub fn log3g10() -> LogCameraTransform {
    const A: f64 = 0.224282;
    const B: f64 = 155.975327;
    const C: f64 = 0.01;
    LogCameraTransform {
        log_side_slope: [A; 3],
        lin_side_slope: [B; 3],
        lin_side_offset: [B * C + 1.0; 3],
        linear_slope: Some([15.1927; 3]),
        ..LogCameraTransform::new(10.0, [-C; 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_is_valid() {
        for name in names() {
            let t = transform(name).unwrap();
            t.validate().unwrap_or_else(|e| panic!("{}: {}", name, e));
        }
    }

    #[test]
    fn case_insensitive() {
        let def = lookup("display - cie-xyz-d65_to_srgb").unwrap();
        assert_eq!(def.name, "DISPLAY - CIE-XYZ-D65_to_sRGB");
        assert!(lookup("sRGB").is_none());
        assert!(transform("nope").is_err());
    }

    #[test]
    fn acescct_is_forward_log_encoding() {
        let t = acescct();
        assert_eq!(t.base, 2.0);
        assert!(t.linear_slope.is_none());
        assert_eq!(t.direction, TransformDirection::Forward);
    }
}
