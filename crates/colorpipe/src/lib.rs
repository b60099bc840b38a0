//! Color management engine for VFX pipelines.
//!
//! This crate resolves color conversions against a registry of named color
//! spaces and compiles them into optimized pipelines:
//! - Define color spaces, roles, looks, displays and views
//! - Resolve conversions into flat operator chains
//! - Optimize chains under a bitmask of allowed rewrites
//! - Evaluate on packed or planar buffers of several bit depths
//! - Emit GLSL/HLSL shaders with their lookup textures
//! - Bake pipelines into 1D/3D LUTs and `.cube` files
//! - Memoize processors per config, safely shared between threads
//!
//! # Quick Start
//!
//! ```
//! use colorpipe::{ColorSpace, Config, ConfigDefinition, Transform};
//!
//! let mut def = ConfigDefinition::default();
//! def.colorspaces.push(ColorSpace::new("linear"));
//! def.colorspaces.push(
//!     ColorSpace::builder("gamma22")
//!         .to_reference(Transform::exponent(2.2))
//!         .build(),
//! );
//! def.roles.define("scene_linear", "linear");
//!
//! let config = Config::from_definition(def).unwrap();
//! let processor = config.processor("gamma22", "scene_linear").unwrap();
//!
//! let mut pixels = [0.18f32, 0.5, 1.0];
//! processor.apply_rgb(&mut pixels).unwrap();
//! assert!(pixels[1] < 0.5);
//! ```
//!
//! # Display Pipeline
//!
//! ```
//! use colorpipe::{Config, TransformDirection};
//!
//! let config = Config::raw();
//! let display = config.default_display().unwrap();
//! let view = config.default_view(&display).unwrap();
//! let proc = config
//!     .display_processor("default", &display, &view, TransformDirection::Forward)
//!     .unwrap();
//! assert!(proc.is_noop());
//! ```
//!
//! # Logging
//!
//! Builds, cache activity, LUT loads and config changes are reported through
//! `tracing`. The crate never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod baker;
mod builder;
mod cache;
mod colorspace;
mod config;
mod context;
mod cpu;
mod display;
mod error;
mod fast_math;
mod file_rules;
mod fixed_function;
mod look;
mod processor;
mod role;
mod transform;

pub mod builtin;
pub mod env;
pub mod gpu;
pub mod op;
pub mod optimizer;
pub mod primaries;
pub mod validate;

// Re-exports
pub use baker::Baker;
pub use builder::{CubeLoader, LoadedLut, LutLoader};
pub use cache::ProcessorCacheFlags;
pub use colorspace::{Allocation, ColorSpace, ColorSpaceBuilder, Encoding, ReferenceSpaceType};
pub use config::{Config, ConfigDefinition, ConfigEvent, ListenerId};
pub use context::{Context, EnvironmentMode, UsedVars};
pub use cpu::{BitDepth, PackedImage, PixelData, PlanarImage};
pub use display::{Display, View, ViewTransform, USE_DISPLAY_NAME};
pub use env::EnvOverrides;
pub use error::{ColorError, ColorResult, ErrorKind};
pub use file_rules::{
    parse_colorspace_from_string, FileRule, FileRuleKind, FileRules, DEFAULT_RULE_NAME,
    PATH_SEARCH_RULE_NAME,
};
pub use gpu::{GpuLanguage, GpuShader, GpuShaderDesc};
pub use look::{look_sequence, parse_looks, Look, LookEntry, LookList};
pub use optimizer::OptimizationFlags;
pub use processor::{Processor, ProcessorMetadata};
pub use role::{names as role_names, Roles};
pub use transform::{
    AllocationTransform, AllocationType, BuiltinTransform, CdlStyle, CdlTransform,
    ColorSpaceTransform, DisplayViewTransform, ExponentTransform, ExponentWithLinearTransform,
    ExposureContrastStyle, ExposureContrastTransform, FileTransform, FixedFunctionStyle,
    FixedFunctionTransform, GroupTransform, LogAffineTransform, LogCameraTransform, LogTransform,
    LookTransform, Lut1DTransform, Lut3DTransform, MatrixTransform, NegativeStyle, RangeStyle,
    RangeTransform, Transform, TransformDirection,
};
pub use validate::{has_errors, has_warnings, Issue, IssueCategory, Severity};

pub use colorpipe_lut::{Interpolation, Lut1D, Lut3D};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_start_example() {
        let mut def = ConfigDefinition::default();
        def.colorspaces.push(ColorSpace::new("ACES2065-1"));
        def.colorspaces.push(
            ColorSpace::builder("ACEScct")
                .to_reference(Transform::builtin("ACEScct_to_ACES2065-1"))
                .build(),
        );
        def.roles.define("scene_linear", "ACES2065-1");
        let config = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();

        let processor = config.processor("scene_linear", "ACEScct").unwrap();
        let mut pixels = [0.18f32, 0.18, 0.18];
        processor.apply_rgb(&mut pixels).unwrap();
        assert!((pixels[0] - 0.4135).abs() < 1e-3);
    }

    #[test]
    fn context_variables() {
        let mut ctx = Context::new();
        ctx.set("SHOT", "sh010");

        let resolved = ctx.resolve("/shows/$SHOT/luts/grade.cube");
        assert_eq!(resolved, "/shows/sh010/luts/grade.cube");
    }

    #[test]
    fn transform_chain() {
        let cdl = Transform::Cdl(CdlTransform {
            slope: [1.1, 1.0, 0.9],
            offset: [0.0, 0.0, 0.0],
            power: [1.0, 1.0, 1.0],
            saturation: 1.0,
            ..Default::default()
        });

        let config = Config::raw();
        let processor = config
            .processor_for_transform(None, &cdl, TransformDirection::Forward)
            .unwrap();

        let mut pixels = [0.5f32, 0.5, 0.5];
        processor.apply_rgb(&mut pixels).unwrap();
        assert!((pixels[0] - 0.55).abs() < 0.01);
    }
}
