//! # colorpipe-lut
//!
//! Decoded lookup tables for the colorpipe engine.
//!
//! The engine treats LUT file formats as an external concern: all it needs
//! is a sample table plus domain bounds. This crate provides those tables
//! and the sampling/inversion math on top of them.
//!
//! # LUT Types
//!
//! - [`Lut1D`] - per-channel curves
//! - [`Lut3D`] - RGB cube
//!
//! # Formats
//!
//! - `.cube` - Adobe/Resolve LUT format ([`cube`] module), used as the
//!   default decoder by the engine's file loader
//!
//! # Usage
//!
//! ```rust
//! use colorpipe_lut::{Lut1D, Lut3D, Interpolation};
//!
//! let lut = Lut1D::gamma(1024, 2.2);
//! let output = lut.apply(0.5);
//!
//! let cube = Lut3D::identity(17).with_interpolation(Interpolation::Tetrahedral);
//! let rgb = cube.apply([0.5, 0.3, 0.2]);
//! # let _ = (output, rgb);
//! ```
//!
//! # Sample Order
//!
//! 3D tables are stored red-fastest, then green, then blue, which is also
//! the order of `.cube` files.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod interp;
mod lut1d;
mod lut3d;
pub mod cube;

pub use error::{LutError, LutResult};
pub use interp::Interpolation;
pub use lut1d::Lut1D;
pub use lut3d::Lut3D;
pub use cube::{read as read_cube, write_1d as write_cube_1d, write_3d as write_cube_3d, CubeLut};
