//! Color primaries, white points and RGB/XYZ matrix generation.
//!
//! Builtin gamut conversions are derived here from chromaticities rather
//! than hard-coded, with Bradford chromatic adaptation when white points
//! differ.

use glam::{DMat3, DVec3};

/// RGB color space primaries as CIE xy chromaticities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    /// Red primary (x, y).
    pub r: (f64, f64),
    /// Green primary (x, y).
    pub g: (f64, f64),
    /// Blue primary (x, y).
    pub b: (f64, f64),
    /// White point (x, y).
    pub w: (f64, f64),
    /// Name for diagnostics.
    pub name: &'static str,
}

/// CIE D65 white.
pub const D65: (f64, f64) = (0.3127, 0.3290);
/// ACES white (approximately D60).
pub const ACES_WHITE: (f64, f64) = (0.32168, 0.33767);

/// ACES AP0 (ACES2065-1).
pub const AP0: Primaries = Primaries {
    r: (0.7347, 0.2653),
    g: (0.0, 1.0),
    b: (0.0001, -0.077),
    w: ACES_WHITE,
    name: "ACES AP0",
};

/// ACES AP1 (ACEScg, ACEScct).
pub const AP1: Primaries = Primaries {
    r: (0.713, 0.293),
    g: (0.165, 0.830),
    b: (0.128, 0.044),
    w: ACES_WHITE,
    name: "ACES AP1",
};

/// ITU-R BT.709 / sRGB.
pub const REC709: Primaries = Primaries {
    r: (0.64, 0.33),
    g: (0.30, 0.60),
    b: (0.15, 0.06),
    w: D65,
    name: "Rec.709",
};

/// ITU-R BT.2020.
pub const REC2020: Primaries = Primaries {
    r: (0.708, 0.292),
    g: (0.170, 0.797),
    b: (0.131, 0.046),
    w: D65,
    name: "Rec.2020",
};

/// ARRI Wide Gamut 3.
pub const ALEXA_WIDE_GAMUT: Primaries = Primaries {
    r: (0.684, 0.313),
    g: (0.221, 0.848),
    b: (0.0861, -0.102),
    w: D65,
    name: "ARRI Wide Gamut 3",
};

/// Sony S-Gamut3.
pub const S_GAMUT3: Primaries = Primaries {
    r: (0.73, 0.28),
    g: (0.14, 0.855),
    b: (0.1, -0.05),
    w: D65,
    name: "S-Gamut3",
};

/// Panasonic V-Gamut.
pub const V_GAMUT: Primaries = Primaries {
    r: (0.73, 0.28),
    g: (0.165, 0.84),
    b: (0.1, -0.03),
    w: D65,
    name: "V-Gamut",
};

/// RED Wide Gamut RGB.
pub const RED_WIDE_GAMUT: Primaries = Primaries {
    r: (0.780308, 0.304253),
    g: (0.121595, 1.493994),
    b: (0.095612, -0.084589),
    w: D65,
    name: "REDWideGamutRGB",
};

const BRADFORD: [[f64; 3]; 3] = [
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
];

/// xy chromaticity to XYZ with Y = 1.
#[inline]
pub fn xy_to_xyz(x: f64, y: f64) -> DVec3 {
    DVec3::new(x / y, 1.0, (1.0 - x - y) / y)
}

/// Builds a `DMat3` from row-major rows.
#[inline]
pub fn from_rows(rows: [[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(&rows).transpose()
}

/// Row-major rows of a `DMat3`.
#[inline]
pub fn to_rows(m: DMat3) -> [[f64; 3]; 3] {
    m.transpose().to_cols_array_2d()
}

/// RGB to XYZ matrix for the given primaries.
pub fn rgb_to_xyz(p: &Primaries) -> DMat3 {
    let m = DMat3::from_cols(
        xy_to_xyz(p.r.0, p.r.1),
        xy_to_xyz(p.g.0, p.g.1),
        xy_to_xyz(p.b.0, p.b.1),
    );
    let s = m.inverse() * xy_to_xyz(p.w.0, p.w.1);
    DMat3::from_cols(m.x_axis * s.x, m.y_axis * s.y, m.z_axis * s.z)
}

/// XYZ to RGB matrix for the given primaries.
#[inline]
pub fn xyz_to_rgb(p: &Primaries) -> DMat3 {
    rgb_to_xyz(p).inverse()
}

/// Bradford adaptation from one white to another, in XYZ.
pub fn bradford(src_white: (f64, f64), dst_white: (f64, f64)) -> DMat3 {
    if src_white == dst_white {
        return DMat3::IDENTITY;
    }
    let b = from_rows(BRADFORD);
    let src = b * xy_to_xyz(src_white.0, src_white.1);
    let dst = b * xy_to_xyz(dst_white.0, dst_white.1);
    let scale = DMat3::from_diagonal(dst / src);
    b.inverse() * scale * b
}

/// RGB to XYZ with the result adapted to `white`.
pub fn rgb_to_xyz_adapted(p: &Primaries, white: (f64, f64)) -> DMat3 {
    bradford(p.w, white) * rgb_to_xyz(p)
}

/// RGB to RGB, adapting white points when they differ.
pub fn rgb_to_rgb(src: &Primaries, dst: &Primaries) -> DMat3 {
    xyz_to_rgb(dst) * bradford(src.w, dst.w) * rgb_to_xyz(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rec709_white_maps_to_d65() {
        let m = rgb_to_xyz(&REC709);
        let w = m * DVec3::ONE;
        let d65 = xy_to_xyz(D65.0, D65.1);
        assert!((w - d65).abs().max_element() < 1e-12);
        // Known first row of the sRGB matrix.
        let rows = to_rows(m);
        assert!((rows[0][0] - 0.4124).abs() < 1e-3);
        assert!((rows[1][1] - 0.7152).abs() < 1e-3);
    }

    #[test]
    fn ap1_to_ap0_known_values() {
        let rows = to_rows(rgb_to_rgb(&AP1, &AP0));
        assert!((rows[0][0] - 0.695452).abs() < 1e-4);
        assert!((rows[0][1] - 0.140679).abs() < 1e-4);
        assert!((rows[2][2] - 1.001501).abs() < 1e-4);
    }

    #[test]
    fn bradford_maps_whites() {
        let m = bradford(ACES_WHITE, D65);
        let out = m * xy_to_xyz(ACES_WHITE.0, ACES_WHITE.1);
        let d65 = xy_to_xyz(D65.0, D65.1);
        assert!((out - d65).abs().max_element() < 1e-10);
    }

    #[test]
    fn rows_roundtrip() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]];
        assert_eq!(to_rows(from_rows(rows)), rows);
        let m = from_rows(rows);
        assert_eq!(m * DVec3::new(1.0, 0.0, 0.0), DVec3::new(1.0, 4.0, 7.0));
    }
}
