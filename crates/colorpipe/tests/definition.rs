//! Definitions survive a JSON round trip and rebuild an equivalent config.

use colorpipe::{
    CdlTransform, ColorSpace, Config, ConfigDefinition, Display, EnvOverrides, FileRule, FileRules,
    Look, ReferenceSpaceType, Transform, View, ViewTransform,
};

fn definition() -> ConfigDefinition {
    let mut def = ConfigDefinition {
        name: "show".into(),
        description: "round trip".into(),
        ..Default::default()
    };
    def.colorspaces.push(ColorSpace::builder("linear").alias("lin").category("working").build());
    def.colorspaces.push(
        ColorSpace::builder("gamma2")
            .category("file-io")
            .to_reference(Transform::exponent(2.0))
            .build(),
    );
    def.colorspaces.push(
        ColorSpace::builder("display")
            .reference_space(ReferenceSpaceType::Display)
            .from_reference(Transform::exponent(2.0).inverse())
            .build(),
    );
    def.colorspaces.push(ColorSpace::builder("raw").is_data(true).build());
    def.roles.define("default", "linear");
    def.roles.define("scene_linear", "lin");

    let warm = CdlTransform {
        slope: [1.25, 1.0, 0.75],
        ..Default::default()
    };
    def.looks.push(
        Look::new("warm")
            .process_space("linear")
            .transform(Transform::Cdl(warm)),
    );
    def.view_transforms.push(
        ViewTransform::new("film").with_from_reference(Transform::range(0.0, 4.0, 0.0, 1.0)),
    );

    let mut display = Display::new("sRGB");
    display.add_view(View::new("Film", "display").with_view_transform("film").with_looks("warm"));
    display.add_view(View::new("Raw", "raw"));
    def.displays.push(display);

    def.file_rules = FileRules::from_rules(vec![
        FileRule::glob("plates", "gamma2", "*", "dpx"),
        FileRule::default_rule("default"),
    ]);
    def.active_displays = vec!["sRGB".into()];
    def.environment.insert("SHOT".into(), "sh010".into());
    def
}

#[test]
fn json_round_trip() {
    let def = definition();
    let json = serde_json::to_string_pretty(&def).unwrap();
    let back: ConfigDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, def);
}

#[test]
fn partial_documents_use_defaults() {
    let json = r#"{ "name": "tiny", "colorspaces": [ { "name": "linear" } ] }"#;
    let def: ConfigDefinition = serde_json::from_str(json).unwrap();
    assert_eq!(def.name, "tiny");
    assert!(def.looks.is_empty());
    assert_eq!(def.file_rules, FileRules::default());

    let config = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();
    assert_eq!(config.all_colorspace_names(), ["linear"]);
}

#[test]
fn rebuilt_config_behaves_the_same() {
    let original = Config::from_definition_with_env(definition(), EnvOverrides::default()).unwrap();
    original.validate().unwrap();

    let json = serde_json::to_string(&original.to_definition()).unwrap();
    let def: ConfigDefinition = serde_json::from_str(&json).unwrap();
    let rebuilt = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();
    rebuilt.validate().unwrap();

    for (src, dst) in [("gamma2", "lin"), ("linear", "display"), ("raw", "gamma2")] {
        let a = original.processor(src, dst).unwrap();
        let b = rebuilt.processor(src, dst).unwrap();
        assert_eq!(a.cache_id(), b.cache_id(), "{} -> {}", src, dst);
    }
    assert_eq!(rebuilt.colorspace_from_filepath("/shots/a.dpx"), Some(("gamma2".to_string(), 0)));
    assert_eq!(rebuilt.colorspace_from_filepath("/shots/a.exr"), Some(("linear".to_string(), 1)));
    assert_eq!(rebuilt.display_names(), ["sRGB"]);
    assert_eq!(rebuilt.context().get("SHOT"), Some("sh010"));
}
