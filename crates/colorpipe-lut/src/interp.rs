//! Interpolation methods for LUT evaluation.

use serde::{Deserialize, Serialize};

/// Interpolation method for LUT evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Nearest grid sample.
    Nearest,

    /// Linear (1D) / trilinear (3D).
    #[default]
    Linear,

    /// Tetrahedral (3D only, falls back to linear for 1D).
    Tetrahedral,
}

impl Interpolation {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Linear => "linear",
            Interpolation::Tetrahedral => "tetrahedral",
        }
    }
}
