//! Table based `log2`/`exp2`/`pow` used by the fast optimization path.
//!
//! Both functions split the argument into an integer part handled exactly
//! and a fraction looked up in a 1024 segment table with linear
//! interpolation. `log2` stays within 2e-7 absolute error, `exp2` within
//! 1e-7 relative error, so `pow` keeps a relative error below
//! [`MAX_POW_REL_ERROR`] for exponents up to 100 in magnitude.

use std::sync::OnceLock;

const SEGMENTS: usize = 1024;

/// Largest relative error of [`pow`] for `|exponent| <= 100`.
pub const MAX_POW_REL_ERROR: f64 = 1e-4;

struct Tables {
    log2: [f64; SEGMENTS + 1],
    exp2: [f64; SEGMENTS + 1],
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut log2 = [0.0; SEGMENTS + 1];
        let mut exp2 = [0.0; SEGMENTS + 1];
        for i in 0..=SEGMENTS {
            let t = i as f64 / SEGMENTS as f64;
            log2[i] = (1.0 + t).log2();
            exp2[i] = t.exp2();
        }
        Tables { log2, exp2 }
    })
}

#[inline]
fn lerp_table(table: &[f64; SEGMENTS + 1], t: f64) -> f64 {
    let pos = t * SEGMENTS as f64;
    let i = (pos as usize).min(SEGMENTS - 1);
    let frac = pos - i as f64;
    table[i] + (table[i + 1] - table[i]) * frac
}

/// Approximate `log2(x)`; non-positive input yields negative infinity.
pub fn log2(x: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NEG_INFINITY;
    }
    if !x.is_normal() {
        return x.log2();
    }
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i64 - 1023;
    let mantissa = (bits & ((1u64 << 52) - 1)) as f64 / (1u64 << 52) as f64;
    exponent as f64 + lerp_table(&tables().log2, mantissa)
}

/// Approximate `2^x`.
pub fn exp2(x: f64) -> f64 {
    if !x.is_finite() {
        return x.exp2();
    }
    if x > 1023.0 {
        return f64::INFINITY;
    }
    if x < -1022.0 {
        return x.exp2();
    }
    let whole = x.floor();
    let frac = x - whole;
    lerp_table(&tables().exp2, frac) * 2f64.powi(whole as i32)
}

/// Approximate `x^e` for `x >= 0`; `0^e` is 0.
pub fn pow(x: f64, e: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    exp2(e * log2(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_error_bound() {
        let mut x: f64 = 1e-6;
        while x < 1e6 {
            assert!((log2(x) - x.log2()).abs() < 2e-7, "x = {}", x);
            x *= 1.37;
        }
        assert_eq!(log2(8.0), 3.0);
        assert_eq!(log2(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn exp2_error_bound() {
        let mut x: f64 = -30.0;
        while x < 30.0 {
            let exact = x.exp2();
            assert!(((exp2(x) - exact) / exact).abs() < 1e-7, "x = {}", x);
            x += 0.173;
        }
    }

    #[test]
    fn pow_error_bound() {
        for &e in &[0.01, 0.45, 1.0, 2.2, 2.4, 10.0, 100.0, -3.0] {
            for &x in &[1e-3, 0.18, 0.5, 0.9, 1.0, 1.3] {
                let exact = f64::powf(x, e);
                if exact.is_normal() {
                    assert!(((pow(x, e) - exact) / exact).abs() < MAX_POW_REL_ERROR, "{}^{}", x, e);
                }
            }
        }
        assert_eq!(pow(0.0, 2.0), 0.0);
    }
}
