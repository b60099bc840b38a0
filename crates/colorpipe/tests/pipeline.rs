//! End-to-end conversions through a small registry.

use approx::assert_relative_eq;
use colorpipe::op::IDENTITY_MATRIX;
use colorpipe::optimizer::optimize;
use colorpipe::{
    BitDepth, ColorError, ColorSpace, Config, ConfigDefinition, Display, EnvOverrides, ErrorKind,
    FileRule, FileRules, GpuShaderDesc, Look, LogTransform, OptimizationFlags, PackedImage,
    PixelData, ReferenceSpaceType, Transform, TransformDirection, View, ViewTransform,
};

use TransformDirection::{Forward, Inverse};

fn scale(s: f64) -> Transform {
    let mut m = IDENTITY_MATRIX;
    m[0] = s;
    m[5] = s;
    m[10] = s;
    Transform::matrix(m)
}

fn offset(o: f64) -> Transform {
    Transform::matrix_offset(IDENTITY_MATRIX, [o, o, o, 0.0])
}

fn definition() -> ConfigDefinition {
    let mut def = ConfigDefinition {
        name: "pipeline".into(),
        ..Default::default()
    };
    def.colorspaces.push(ColorSpace::new("lnf"));
    def.colorspaces.push(
        ColorSpace::builder("gamma2")
            .to_reference(Transform::exponent(2.0).inverse())
            .build(),
    );
    def.colorspaces.push(
        ColorSpace::builder("log2")
            .from_reference(Transform::Log(LogTransform::default()))
            .build(),
    );
    def.colorspaces.push(ColorSpace::builder("half").to_reference(scale(2.0)).build());
    def.colorspaces.push(
        ColorSpace::builder("cct")
            .to_reference(Transform::builtin("ACEScct_to_ACES2065-1"))
            .build(),
    );
    def.colorspaces.push(ColorSpace::builder("raw").is_data(true).build());
    def.roles.define("scene_linear", "lnf");
    def.roles.define("default", "lnf");

    def.looks.push(Look::new("foo").process_space("lnf").transform(scale(2.0)));
    def.looks.push(Look::new("bar").process_space("lnf").transform(offset(0.1)));
    def
}

fn config() -> Config {
    let config = Config::from_definition_with_env(definition(), EnvOverrides::default()).unwrap();
    config.set_default_optimization_flags(OptimizationFlags::LOSSLESS);
    config
}

#[test]
fn lnf_to_gamma2_squares() {
    let config = config();
    let processor = config.processor("lnf", "gamma2").unwrap();
    let mut pixels = [0.0f32, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
    processor.apply_rgb(&mut pixels).unwrap();
    let expected = [0.0f32, 0.0, 0.0, 0.25, 0.25, 0.25, 1.0, 1.0, 1.0];
    for (got, want) in pixels.iter().zip(expected) {
        assert_relative_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn every_pair_round_trips() {
    let config = config();
    let names = ["lnf", "gamma2", "log2", "half", "cct"];
    let px = [0.18f32, 0.5, 0.9, 1.0];
    for a in names {
        for b in names {
            let there = config.processor(a, b).unwrap();
            let back = config.processor(b, a).unwrap();
            let out = back.apply_pixel(there.apply_pixel(px));
            for c in 0..4 {
                assert_relative_eq!(out[c], px[c], epsilon = 1e-4);
            }
        }
    }
}

#[test]
fn inverse_direction_matches_swapped_pair() {
    let config = config();
    let swapped = config.processor("gamma2", "log2").unwrap();
    let inverse = config.processor_with_direction("log2", "gamma2", Inverse).unwrap();
    let px = [0.3f32, 0.6, 0.9, 1.0];
    let (a, b) = (swapped.apply_pixel(px), inverse.apply_pixel(px));
    for c in 0..3 {
        assert_relative_eq!(a[c], b[c], epsilon = 1e-5);
    }
}

#[test]
fn data_spaces_bypass() {
    let config = config();
    assert!(config.processor("gamma2", "raw").unwrap().is_noop());
    assert!(config.processor("raw", "cct").unwrap().is_noop());
}

#[test]
fn optimize_is_idempotent() {
    let config = config();
    let requests = [("lnf", "gamma2"), ("cct", "log2"), ("half", "cct"), ("gamma2", "gamma2")];
    let flags = [
        OptimizationFlags::NONE,
        OptimizationFlags::LOSSLESS,
        OptimizationFlags::VERY_GOOD,
        OptimizationFlags::GOOD,
        OptimizationFlags::DRAFT,
    ];
    for (src, dst) in requests {
        let raw = config.processor(src, dst).unwrap().raw_ops().to_vec();
        for f in flags {
            let once = optimize(&raw, f);
            assert_eq!(optimize(&once, f), once, "{} -> {} with {:?}", src, dst, f);
        }
    }
}

#[test]
fn lossless_keeps_black_and_negatives() {
    let config = config();
    config.set_default_optimization_flags(OptimizationFlags::NONE);
    let exact = config.processor("gamma2", "log2").unwrap();
    config.set_default_optimization_flags(OptimizationFlags::LOSSLESS);
    let lossless = config.processor("gamma2", "log2").unwrap();

    for x in [0.0f32, -0.5, 1e-20, 0.18, 1.0] {
        let a = exact.apply_pixel([x, x, x, -0.25]);
        let b = lossless.apply_pixel([x, x, x, -0.25]);
        for c in 0..4 {
            assert_relative_eq!(a[c], b[c], epsilon = 1e-5);
        }
    }
    assert_relative_eq!(lossless.apply_rgb_pixel([0.0; 3])[0], -126.0, epsilon = 1e-4);
}

#[test]
fn malformed_buffers_fail_and_processor_survives() {
    let config = config();
    let processor = config.processor("lnf", "gamma2").unwrap();
    for len in [1, 2, 4, 5, 7] {
        let mut buf = vec![0.5f32; len];
        assert_eq!(processor.apply_rgb(&mut buf).unwrap_err().kind(), ErrorKind::Type);
    }
    for len in [1, 3, 5, 6] {
        let mut buf = vec![0.5f32; len];
        assert_eq!(processor.apply_rgba(&mut buf).unwrap_err().kind(), ErrorKind::Type);
    }

    let mut bytes = vec![0u8; 10];
    let err = PackedImage::new(PixelData::U8(&mut bytes), 2, 2, 3, BitDepth::UInt8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let mut ok = vec![0.5f32; 6];
    processor.apply_rgb(&mut ok).unwrap();
    assert_relative_eq!(ok[0], 0.25, epsilon = 1e-6);
}

#[test]
fn looks_apply_in_order() {
    let config = config();
    let forward = config.look_processor("lnf", "lnf", "foo, +bar", Forward).unwrap();
    assert_relative_eq!(forward.apply_rgb_pixel([0.5, 0.5, 0.5])[0], 1.1, epsilon = 1e-6);
    assert_eq!(forward.metadata().looks(), ["foo", "bar"]);

    let inverse = config.look_processor("lnf", "lnf", "foo, +bar", Inverse).unwrap();
    // bar undone first, then foo.
    assert_relative_eq!(inverse.apply_rgb_pixel([0.5, 0.5, 0.5])[0], 0.2, epsilon = 1e-6);

    // A '-' prefix flips a look's direction.
    let flipped = config.look_processor("lnf", "lnf", "-foo", Forward).unwrap();
    assert_relative_eq!(flipped.apply_rgb_pixel([0.5, 0.5, 0.5])[0], 0.25, epsilon = 1e-6);
}

#[test]
fn look_alternatives_and_missing_looks() {
    let config = config();
    let p = config.look_processor("lnf", "lnf", "missing | bar", Forward).unwrap();
    assert_relative_eq!(p.apply_rgb_pixel([0.5, 0.5, 0.5])[0], 0.6, epsilon = 1e-6);

    let optional = config.look_processor("lnf", "lnf", "missing |", Forward).unwrap();
    assert!(optional.is_noop());

    let err = config.look_processor("lnf", "lnf", "missing", Forward).unwrap_err();
    assert!(matches!(err, ColorError::LookNotFound { ref name } if name == "missing"));
}

#[test]
fn clamp_only_range_is_not_invertible() {
    let config = config();
    let clamp = Transform::range(0.0, 1.0, 0.0, 1.0);
    config.processor_for_transform(None, &clamp, Forward).unwrap();
    let err = config.processor_for_transform(None, &clamp, Inverse).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInvertible);
}

#[test]
fn cycles_fail_the_build() {
    let config = config();
    let looped = ColorSpace::builder("loop")
        .to_reference(Transform::colorspace("loop", "lnf"))
        .build();
    config.add_colorspace(looped).unwrap();
    let err = config.processor("loop", "lnf").unwrap_err();
    assert!(matches!(err, ColorError::CircularReference { .. }));
    assert!(config.validate().is_err());
}

#[test]
fn default_rule_not_last_fails_validation() {
    let mut def = definition();
    def.file_rules = FileRules::from_rules(vec![
        FileRule::default_rule("lnf"),
        FileRule::glob("plates", "gamma2", "*", "dpx"),
    ]);
    let config = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("Default"));

    config
        .set_file_rules(FileRules::from_rules(vec![
            FileRule::glob("plates", "gamma2", "*", "dpx"),
            FileRule::default_rule("lnf"),
        ]))
        .unwrap();
    config.validate().unwrap();
}

fn display_definition() -> ConfigDefinition {
    let mut def = definition();
    def.colorspaces.push(
        ColorSpace::builder("monitor")
            .reference_space(ReferenceSpaceType::Display)
            .from_reference(offset(0.1))
            .build(),
    );
    def.view_transforms.push(ViewTransform::new("tone").with_from_reference(scale(0.5)));
    let mut display = Display::new("Monitor");
    display.add_view(View::new("Tone", "monitor").with_view_transform("tone"));
    display.add_view(View::new("Graded", "gamma2").with_looks("foo"));
    def.displays.push(display);
    def
}

#[test]
fn display_view_through_view_transform() {
    let config =
        Config::from_definition_with_env(display_definition(), EnvOverrides::default()).unwrap();
    config.set_default_optimization_flags(OptimizationFlags::LOSSLESS);
    config.validate().unwrap();

    let view = config.display_processor("lnf", "Monitor", "Tone", Forward).unwrap();
    assert_relative_eq!(view.apply_rgb_pixel([0.25, 0.25, 0.25])[0], 0.225, epsilon = 1e-6);
    let back = config.display_processor("lnf", "Monitor", "Tone", Inverse).unwrap();
    assert_relative_eq!(back.apply_rgb_pixel([0.225, 0.225, 0.225])[0], 0.25, epsilon = 1e-6);

    // Plain pairs bridge the reference spaces with the default view transform.
    let pair = config.processor("lnf", "monitor").unwrap();
    assert_relative_eq!(pair.apply_rgb_pixel([0.25, 0.25, 0.25])[0], 0.225, epsilon = 1e-6);

    let graded = config.display_processor("lnf", "Monitor", "Graded", Forward).unwrap();
    assert_relative_eq!(graded.apply_rgb_pixel([0.25, 0.25, 0.25])[0], 0.25, epsilon = 1e-6);
    let replaced = config
        .display_processor_with_looks("lnf", "Monitor", "Graded", "bar", Forward)
        .unwrap();
    assert_relative_eq!(replaced.apply_rgb_pixel([0.4, 0.4, 0.4])[0], 0.25, epsilon = 1e-6);
}

#[test]
fn missing_view_transform_is_a_mismatch() {
    let mut def = display_definition();
    def.view_transforms.clear();
    def.displays.clear();
    let config = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();
    let err = config.processor("lnf", "monitor").unwrap_err();
    assert!(matches!(err, ColorError::ReferenceSpaceMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unknown_names_are_validation_errors() {
    let config = config();
    let err = config.processor("lnf", "nope").unwrap_err();
    assert!(matches!(err, ColorError::ColorSpaceNotFound { .. }));
    let err = config.display_processor("lnf", "Nowhere", "x", Forward).unwrap_err();
    assert!(matches!(err, ColorError::DisplayNotFound { .. }));
}

#[test]
fn shader_for_display_pipeline() {
    let config =
        Config::from_definition_with_env(display_definition(), EnvOverrides::default()).unwrap();
    let processor = config.display_processor("cct", "Monitor", "Tone", Forward).unwrap();
    let desc = GpuShaderDesc::new().with_function_name("to_monitor");
    let shader = processor.gpu_shader(&desc).unwrap();
    assert!(shader.text().contains("to_monitor"));
    assert!(!shader.has_textures());
}
