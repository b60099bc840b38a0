//! Fixed function math: HSV, CIE chromaticity spaces, surround and PQ.
//!
//! All functions take and return RGB triplets in f64.

use crate::transform::FixedFunctionStyle;

/// Rec.2020 luma weights.
const REC2020_LUMA: [f64; 3] = [0.2627, 0.6780, 0.0593];
/// ACES AP1 luma weights.
const AP1_LUMA: [f64; 3] = [0.2722287168, 0.6740817658, 0.0536895174];
/// ACES dark to dim surround gamma.
const DIM_SURROUND_GAMMA: f64 = 0.9811;
/// Luminance floor for surround corrections.
const MIN_LUM: f64 = 1e-10;

/// D65 u'v' white.
const D65_U: f64 = 0.197_830_006_642_836_8;
const D65_V: f64 = 0.468_319_994_938_791;

const PQ_M1: f64 = 0.1593017578125;
const PQ_M2: f64 = 78.84375;
const PQ_C1: f64 = 0.8359375;
const PQ_C2: f64 = 18.8515625;
const PQ_C3: f64 = 18.6875;

/// Evaluates `style` forward (`inverse == false`) or backward.
pub fn apply(style: FixedFunctionStyle, params: &[f64], inverse: bool, rgb: [f64; 3]) -> [f64; 3] {
    use FixedFunctionStyle::*;
    match (style, inverse) {
        (RgbToHsv, false) => rgb_to_hsv(rgb),
        (RgbToHsv, true) => hsv_to_rgb(rgb),
        (XyzToXyY, false) => xyz_to_xyy(rgb),
        (XyzToXyY, true) => xyy_to_xyz(rgb),
        (XyzToUvY, false) => xyz_to_uvy(rgb),
        (XyzToUvY, true) => uvy_to_xyz(rgb),
        (XyzToLuv, false) => xyz_to_luv(rgb),
        (XyzToLuv, true) => luv_to_xyz(rgb),
        (Rec2100Surround, inv) => {
            let gamma = params.first().copied().unwrap_or(1.0);
            surround(rgb, REC2020_LUMA, if inv { 1.0 / gamma } else { gamma })
        }
        (AcesDarkToDim10, inv) => {
            let gamma = if inv {
                1.0 / DIM_SURROUND_GAMMA
            } else {
                DIM_SURROUND_GAMMA
            };
            surround(rgb, AP1_LUMA, gamma)
        }
        (LinToPq, false) => rgb.map(lin_to_pq),
        (LinToPq, true) => rgb.map(pq_to_lin),
    }
}

/// Scales RGB by `Y^(gamma - 1)` so luminance becomes `Y^gamma`.
fn surround(rgb: [f64; 3], weights: [f64; 3], gamma: f64) -> [f64; 3] {
    let y = (weights[0] * rgb[0] + weights[1] * rgb[1] + weights[2] * rgb[2]).max(MIN_LUM);
    let scale = y.powf(gamma - 1.0);
    rgb.map(|v| v * scale)
}

/// Hue, saturation, value; hue in [0, 1).
pub fn rgb_to_hsv([r, g, b]: [f64; 3]) -> [f64; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;
    let s = if max != 0.0 { delta / max } else { 0.0 };
    if delta == 0.0 {
        return [0.0, s, v];
    }
    let sextant = if max == r {
        (g - b) / delta
    } else if max == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    let mut h = sextant / 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    [h, s, v]
}

/// Inverse of [`rgb_to_hsv`].
pub fn hsv_to_rgb([h, s, v]: [f64; 3]) -> [f64; 3] {
    let h = (h - h.floor()) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as i32 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

fn xyz_to_xyy([x, y, z]: [f64; 3]) -> [f64; 3] {
    let sum = x + y + z;
    if sum == 0.0 {
        return [0.0, 0.0, y];
    }
    [x / sum, y / sum, y]
}

fn xyy_to_xyz([x, y, big_y]: [f64; 3]) -> [f64; 3] {
    if y == 0.0 {
        return [0.0, big_y, 0.0];
    }
    [x * big_y / y, big_y, (1.0 - x - y) * big_y / y]
}

fn xyz_to_uvy([x, y, z]: [f64; 3]) -> [f64; 3] {
    let d = x + 15.0 * y + 3.0 * z;
    if d == 0.0 {
        return [0.0, 0.0, y];
    }
    [4.0 * x / d, 9.0 * y / d, y]
}

fn uvy_to_xyz([u, v, y]: [f64; 3]) -> [f64; 3] {
    if v == 0.0 {
        return [0.0, y, 0.0];
    }
    [y * 9.0 * u / (4.0 * v), y, y * (12.0 - 3.0 * u - 20.0 * v) / (4.0 * v)]
}

/// L*u*v* relative to D65, each component divided by 100.
fn xyz_to_luv(xyz: [f64; 3]) -> [f64; 3] {
    let y = xyz[1];
    let l = if y > 216.0 / 24389.0 {
        116.0 * y.cbrt() - 16.0
    } else {
        y * 24389.0 / 27.0
    };
    let [u, v, _] = xyz_to_uvy(xyz);
    let (u, v) = if xyz == [0.0; 3] {
        (D65_U, D65_V)
    } else {
        (u, v)
    };
    [l / 100.0, 13.0 * l * (u - D65_U) / 100.0, 13.0 * l * (v - D65_V) / 100.0]
}

fn luv_to_xyz([l, u, v]: [f64; 3]) -> [f64; 3] {
    let (l, u, v) = (l * 100.0, u * 100.0, v * 100.0);
    if l == 0.0 {
        return [0.0; 3];
    }
    let y = if l > 8.0 {
        ((l + 16.0) / 116.0).powi(3)
    } else {
        l * 27.0 / 24389.0
    };
    let up = u / (13.0 * l) + D65_U;
    let vp = v / (13.0 * l) + D65_V;
    uvy_to_xyz([up, vp, y])
}

/// Linear (1.0 = 100 nits) to PQ; negatives are mirrored.
pub fn lin_to_pq(x: f64) -> f64 {
    let l = (x.abs() / 100.0).min(1.0);
    let lm = l.powf(PQ_M1);
    let n = ((PQ_C1 + PQ_C2 * lm) / (1.0 + PQ_C3 * lm)).powf(PQ_M2);
    n.copysign(x)
}

/// PQ to linear (1.0 = 100 nits); negatives are mirrored.
pub fn pq_to_lin(n: f64) -> f64 {
    let np = n.abs().min(1.0).powf(1.0 / PQ_M2);
    let l = ((np - PQ_C1).max(0.0) / (PQ_C2 - PQ_C3 * np)).powf(1.0 / PQ_M1);
    (l * 100.0).copysign(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use FixedFunctionStyle::*;

    fn roundtrip(style: FixedFunctionStyle, params: &[f64], rgb: [f64; 3]) {
        let fwd = apply(style, params, false, rgb);
        let back = apply(style, params, true, fwd);
        for i in 0..3 {
            assert!(
                (back[i] - rgb[i]).abs() < 1e-7,
                "{:?}: {:?} -> {:?} -> {:?}",
                style,
                rgb,
                fwd,
                back
            );
        }
    }

    #[test]
    fn all_styles_roundtrip() {
        let xyz = [0.35, 0.4, 0.3];
        roundtrip(RgbToHsv, &[], [0.8, 0.3, 0.1]);
        roundtrip(RgbToHsv, &[], [0.1, 0.3, 0.8]);
        roundtrip(XyzToXyY, &[], xyz);
        roundtrip(XyzToUvY, &[], xyz);
        roundtrip(XyzToLuv, &[], xyz);
        roundtrip(Rec2100Surround, &[0.78], [0.2, 0.4, 0.1]);
        roundtrip(AcesDarkToDim10, &[], [0.2, 0.4, 0.1]);
        roundtrip(LinToPq, &[], [0.01, 1.0, 50.0]);
    }

    #[test]
    fn pq_reference_points() {
        // 100 nits encodes to about 0.508.
        assert!((lin_to_pq(1.0) - 0.508078).abs() < 1e-5);
        assert!((lin_to_pq(100.0) - 1.0).abs() < 1e-12);
        assert!(lin_to_pq(0.0) < 1e-6);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(rgb_to_hsv([1.0, 0.0, 0.0]), [0.0, 1.0, 1.0]);
        let green = rgb_to_hsv([0.0, 1.0, 0.0]);
        assert!((green[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn luv_white_is_neutral() {
        let white = [0.3127 / 0.3290, 1.0, (1.0 - 0.3127 - 0.3290) / 0.3290];
        let luv = xyz_to_luv(white);
        assert!((luv[0] - 1.0).abs() < 1e-9);
        assert!(luv[1].abs() < 1e-4 && luv[2].abs() < 1e-4);
    }
}
