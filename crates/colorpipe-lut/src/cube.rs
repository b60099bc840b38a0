//! Adobe/Resolve `.cube` reader and writer.
//!
//! ```text
//! # Comment
//! TITLE "Grade"
//! LUT_3D_SIZE 2
//! DOMAIN_MIN 0.0 0.0 0.0
//! DOMAIN_MAX 1.0 1.0 1.0
//! 0.0 0.0 0.0
//! ...
//! ```
//!
//! A file holds either a 1D or a 3D table; [`read`] detects which from the
//! size keyword. 3D data is red-fastest, matching [`Lut3D`] storage.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{Lut1D, Lut3D, LutError, LutResult};

/// Decoded contents of a `.cube` file.
#[derive(Debug, Clone, PartialEq)]
pub enum CubeLut {
    /// Per-channel curves (`LUT_1D_SIZE`).
    Lut1D(Lut1D),
    /// RGB cube (`LUT_3D_SIZE`).
    Lut3D(Lut3D),
}

/// Reads a `.cube` file from disk.
pub fn read<P: AsRef<Path>>(path: P) -> LutResult<CubeLut> {
    let file = File::open(path.as_ref())?;
    parse(BufReader::new(file))
}

#[derive(Clone, Copy)]
enum Shape {
    One(usize),
    Three(usize),
}

/// Parses `.cube` text from a reader.
pub fn parse<R: BufRead>(reader: R) -> LutResult<CubeLut> {
    let mut shape: Option<Shape> = None;
    let mut domain_min = [0.0_f32; 3];
    let mut domain_max = [1.0_f32; 3];
    let mut data: Vec<[f32; 3]> = Vec::new();
    let mut last_line = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else { continue };
        match head {
            "TITLE" | "LUT_1D_INPUT_RANGE" | "LUT_3D_INPUT_RANGE" => continue,
            "LUT_1D_SIZE" | "LUT_3D_SIZE" => {
                if shape.is_some() {
                    return Err(parse_err(line_no, "duplicate size keyword"));
                }
                let size: usize = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| parse_err(line_no, "invalid size value"))?;
                shape = Some(if head == "LUT_1D_SIZE" {
                    Shape::One(size)
                } else {
                    Shape::Three(size)
                });
            }
            "DOMAIN_MIN" => domain_min = parse_triplet(parts, line_no)?,
            "DOMAIN_MAX" => domain_max = parse_triplet(parts, line_no)?,
            _ => {
                let rest = std::iter::once(head).chain(parts);
                data.push(parse_triplet(rest, line_no)?);
            }
        }
    }

    let shape = shape.ok_or_else(|| parse_err(last_line, "missing LUT_1D_SIZE or LUT_3D_SIZE"))?;
    match shape {
        Shape::One(size) => {
            if data.len() != size {
                return Err(parse_err(
                    last_line,
                    format!("expected {} entries, found {}", size, data.len()),
                ));
            }
            let r = data.iter().map(|v| v[0]).collect();
            let g = data.iter().map(|v| v[1]).collect();
            let b = data.iter().map(|v| v[2]).collect();
            Ok(CubeLut::Lut1D(Lut1D::from_rgb(r, g, b, domain_min[0], domain_max[0])?))
        }
        Shape::Three(size) => {
            let expected = size * size * size;
            if data.len() != expected {
                return Err(parse_err(
                    last_line,
                    format!("expected {} entries, found {}", expected, data.len()),
                ));
            }
            for ch in 0..3 {
                if !(domain_max[ch] > domain_min[ch]) {
                    return Err(LutError::InvalidDomain {
                        min: domain_min[ch],
                        max: domain_max[ch],
                    });
                }
            }
            Ok(CubeLut::Lut3D(Lut3D::from_data(data, size)?.with_domain(domain_min, domain_max)))
        }
    }
}

/// Writes a 1D table as `.cube`.
pub fn write_1d<P: AsRef<Path>>(path: P, lut: &Lut1D) -> LutResult<()> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    writeln!(w, "LUT_1D_SIZE {}", lut.size())?;
    let (min, max) = (lut.domain_min, lut.domain_max);
    if min != 0.0 || max != 1.0 {
        writeln!(w, "DOMAIN_MIN {} {} {}", min, min, min)?;
        writeln!(w, "DOMAIN_MAX {} {} {}", max, max, max)?;
    }
    let (r, g, b) = (lut.channel(0), lut.channel(1), lut.channel(2));
    for i in 0..lut.size() {
        writeln!(w, "{:.6} {:.6} {:.6}", r[i], g[i], b[i])?;
    }
    w.flush()?;
    Ok(())
}

/// Writes a 3D table as `.cube`.
pub fn write_3d<P: AsRef<Path>>(path: P, lut: &Lut3D) -> LutResult<()> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    writeln!(w, "LUT_3D_SIZE {}", lut.size)?;
    let (min, max) = (lut.domain_min, lut.domain_max);
    if min != [0.0; 3] || max != [1.0; 3] {
        writeln!(w, "DOMAIN_MIN {} {} {}", min[0], min[1], min[2])?;
        writeln!(w, "DOMAIN_MAX {} {} {}", max[0], max[1], max[2])?;
    }
    for rgb in &lut.data {
        writeln!(w, "{:.6} {:.6} {:.6}", rgb[0], rgb[1], rgb[2])?;
    }
    w.flush()?;
    Ok(())
}

fn parse_triplet<'a, I: Iterator<Item = &'a str>>(
    mut parts: I,
    line: usize,
) -> LutResult<[f32; 3]> {
    let mut out = [0.0f32; 3];
    for v in out.iter_mut() {
        *v = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| parse_err(line, "expected three numbers"))?;
    }
    Ok(out)
}

fn parse_err(line: usize, reason: impl Into<String>) -> LutError {
    LutError::Parse {
        line,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_3d_cube() {
        let text = r#"
# Test LUT
TITLE "Test Grade"
LUT_3D_SIZE 2
DOMAIN_MIN 0.0 0.0 0.0
DOMAIN_MAX 1.0 1.0 1.0

0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
"#;
        let CubeLut::Lut3D(lut) = parse(Cursor::new(text)).unwrap() else {
            panic!("expected 3D table");
        };
        assert_eq!(lut.size, 2);
        assert!(lut.is_identity(1e-6));
    }

    #[test]
    fn parse_1d_cube() {
        let text = "LUT_1D_SIZE 3\n0.0 0.0 0.0\n0.25 0.25 0.25\n1.0 1.0 1.0\n";
        let CubeLut::Lut1D(lut) = parse(Cursor::new(text)).unwrap() else {
            panic!("expected 1D table");
        };
        assert_eq!(lut.size(), 3);
        assert!((lut.apply(0.5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn reports_line_of_bad_data() {
        let text = "LUT_1D_SIZE 2\n0 0 0\n1 x 1\n";
        match parse(Cursor::new(text)) {
            Err(LutError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_count_mismatch() {
        let text = "LUT_3D_SIZE 2\n0 0 0\n1 1 1\n";
        assert!(parse(Cursor::new(text)).is_err());
        assert!(parse(Cursor::new("0 0 0\n")).is_err());
    }

    #[test]
    fn roundtrip_3d_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grade.cube");
        let lut = Lut3D::from_fn(3, [0.0; 3], [1.0; 3], |[r, g, b]| [g, b, r]).unwrap();
        write_3d(&path, &lut).unwrap();
        let CubeLut::Lut3D(loaded) = read(&path).unwrap() else {
            panic!("expected 3D table");
        };
        assert_eq!(loaded.size, 3);
        let out = loaded.apply([0.5, 1.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-5 && out[1].abs() < 1e-5 && (out[2] - 0.5).abs() < 1e-5);
    }
}
