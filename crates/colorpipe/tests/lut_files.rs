//! LUT files resolved through the context: variables, search paths and the
//! working directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use colorpipe::{
    Baker, ColorSpace, Config, ConfigDefinition, EnvOverrides, ErrorKind, Transform,
    TransformDirection,
};
use tempfile::TempDir;

use TransformDirection::{Forward, Inverse};

const DOUBLE: &str = "LUT_1D_SIZE 2\n0 0 0\n2 2 2\n";
const TRIPLE: &str = "LUT_1D_SIZE 2\n0 0 0\n3 3 3\n";

fn write_lut(root: &Path, shot: &str, body: &str) {
    let dir = root.join("luts").join(shot);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("grade.cube"), body).unwrap();
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    write_lut(tmp.path(), "sh010", DOUBLE);

    let mut def = ConfigDefinition::default();
    def.search_paths = vec!["luts".into()];
    def.working_dir = Some(tmp.path().to_path_buf());
    def.environment.insert("SHOT".into(), "sh010".into());
    def.colorspaces.push(ColorSpace::new("linear"));
    def.colorspaces.push(
        ColorSpace::builder("graded")
            .from_reference(Transform::file("${SHOT}/grade.cube"))
            .build(),
    );
    def.roles.define("default", "linear");

    let config = Config::from_definition_with_env(def, EnvOverrides::default()).unwrap();
    (tmp, config)
}

fn grade() -> Transform {
    Transform::file("${SHOT}/grade.cube")
}

#[test]
fn file_found_through_search_path() {
    let (_tmp, config) = setup();
    let processor = config.processor_for_transform(None, &grade(), Forward).unwrap();
    assert_relative_eq!(processor.apply_rgb_pixel([0.25, 0.25, 0.25])[0], 0.5, epsilon = 1e-6);

    let files = processor.metadata().files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("grade.cube"));
    assert!(files[0].contains("sh010"));

    let used = processor.used_vars();
    assert_eq!(used.get("SHOT"), Some(&Some("sh010".to_string())));
}

#[test]
fn inverse_lut() {
    let (_tmp, config) = setup();
    let processor = config.processor_for_transform(None, &grade(), Inverse).unwrap();
    assert_relative_eq!(processor.apply_rgb_pixel([0.5, 0.5, 0.5])[0], 0.25, epsilon = 1e-4);

    let space = config.processor("graded", "linear").unwrap();
    assert_relative_eq!(space.apply_rgb_pixel([1.0, 1.0, 1.0])[0], 0.5, epsilon = 1e-4);
}

#[test]
fn missing_file_for_one_context_only() {
    let (_tmp, config) = setup();
    let mut other = config.context();
    other.set("SHOT", "sh020");

    let err = config.processor_for_transform(Some(&other), &grade(), Forward).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);

    // The failure leaves the config usable for other requests.
    config.processor_for_transform(None, &grade(), Forward).unwrap();
    config.processor("linear", "graded").unwrap();
}

#[test]
fn cache_entries_follow_context() {
    let (tmp, config) = setup();
    write_lut(tmp.path(), "sh020", TRIPLE);

    let first = config.processor_for_transform(None, &grade(), Forward).unwrap();
    let same = config.processor_for_transform(Some(&config.context()), &grade(), Forward).unwrap();
    assert!(Arc::ptr_eq(&first, &same));

    let mut other = config.context();
    other.set("SHOT", "sh020");
    let second = config.processor_for_transform(Some(&other), &grade(), Forward).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_relative_eq!(second.apply_rgb_pixel([0.25, 0.25, 0.25])[0], 0.75, epsilon = 1e-6);

    // Unrelated variables do not split the cache.
    let mut noisy = config.context();
    noisy.set("UNRELATED", "x");
    let again = config.processor_for_transform(Some(&noisy), &grade(), Forward).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    // Moving the search path does.
    let mut moved = config.context();
    moved.set_search_path("elsewhere");
    let err = config.processor_for_transform(Some(&moved), &grade(), Forward).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);
}

#[test]
fn decoded_files_survive_processor_cache_clears() {
    let (tmp, config) = setup();
    let before = config.processor_for_transform(None, &grade(), Forward).unwrap();
    write_lut(tmp.path(), "sh010", TRIPLE);

    config.clear_processor_cache();
    let cached = config.processor_for_transform(None, &grade(), Forward).unwrap();
    assert_eq!(before.apply_rgb_pixel([0.25; 3]), cached.apply_rgb_pixel([0.25; 3]));

    config.clear_all_caches();
    let reloaded = config.processor_for_transform(None, &grade(), Forward).unwrap();
    assert_relative_eq!(reloaded.apply_rgb_pixel([0.25; 3])[0], 0.75, epsilon = 1e-6);
}

#[test]
fn malformed_file_is_a_load_error() {
    let (tmp, config) = setup();
    write_lut(tmp.path(), "bad", "LUT_1D_SIZE 3\n0 0 0\n");
    let mut ctx = config.context();
    ctx.set("SHOT", "bad");
    let err = config.processor_for_transform(Some(&ctx), &grade(), Forward).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);
    assert!(err.to_string().contains("grade.cube"));
}

#[test]
fn baked_cube_reproduces_the_pipeline() {
    let (tmp, config) = setup();
    let dir = tmp.path().join("luts").join("baked");
    fs::create_dir_all(&dir).unwrap();

    let processor = config.processor("linear", "graded").unwrap();
    Baker::new(&processor).write_cube_1d(dir.join("grade.cube"), 33).unwrap();

    let mut ctx = config.context();
    ctx.set("SHOT", "baked");
    let baked = config.processor_for_transform(Some(&ctx), &grade(), Forward).unwrap();
    for v in [0.0, 0.3, 0.77, 1.0] {
        let expected = processor.apply_rgb_pixel([v; 3]);
        let actual = baked.apply_rgb_pixel([v; 3]);
        assert_relative_eq!(actual[0], expected[0], epsilon = 1e-5);
        assert_relative_eq!(actual[2], expected[2], epsilon = 1e-5);
    }

    // Inverse over the doubled range, as a cube.
    let inverse = config.processor("graded", "linear").unwrap();
    let path = dir.join("inverse.cube");
    Baker::new(&inverse).with_domain(0.0, 2.0).write_cube_3d(&path, 9).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("LUT_3D_SIZE 9\n"));
    assert!(text.contains("DOMAIN_MAX 2 2 2"));

    let reader = Transform::file(path.to_string_lossy());
    let read_back = config.processor_for_transform(None, &reader, Forward).unwrap();
    let out = read_back.apply_rgb_pixel([1.5, 0.5, 1.0]);
    assert_relative_eq!(out[0], 0.75, epsilon = 1e-4);
    assert_relative_eq!(out[1], 0.25, epsilon = 1e-4);
    assert_relative_eq!(out[2], 0.5, epsilon = 1e-4);
}
