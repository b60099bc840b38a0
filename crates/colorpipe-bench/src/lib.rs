//! Shared fixtures for the colorpipe benchmarks.

use colorpipe::{ColorSpace, Config, ConfigDefinition, EnvOverrides, Transform};

/// Scene-referred registry with ACES working spaces and an sRGB output.
pub fn aces_config() -> Config {
    let mut def = ConfigDefinition {
        name: "bench".into(),
        ..Default::default()
    };
    def.colorspaces.push(ColorSpace::new("ACES2065-1"));
    def.colorspaces.push(
        ColorSpace::builder("ACEScg")
            .to_reference(Transform::builtin("ACEScg_to_ACES2065-1"))
            .build(),
    );
    def.colorspaces.push(
        ColorSpace::builder("ACEScct")
            .to_reference(Transform::builtin("ACEScct_to_ACES2065-1"))
            .build(),
    );
    def.colorspaces.push(
        ColorSpace::builder("sRGB - Output")
            .from_reference(Transform::group(vec![
                Transform::builtin("UTILITY - ACES-AP0_to_CIE-XYZ-D65_BFD"),
                Transform::builtin("DISPLAY - CIE-XYZ-D65_to_sRGB"),
            ]))
            .build(),
    );
    def.roles.define("scene_linear", "ACEScg");
    def.roles.define("default", "ACES2065-1");
    // Fixtures never fail to load: names are unique.
    Config::from_definition_with_env(def, EnvOverrides::default()).unwrap_or_else(|_| Config::raw())
}

/// Gradient of `count` RGB pixels, interleaved.
pub fn ramp(count: usize) -> Vec<f32> {
    (0..count)
        .flat_map(|i| {
            let t = i as f32 / count as f32;
            [t, t * 0.8, t * 0.6]
        })
        .collect()
}
