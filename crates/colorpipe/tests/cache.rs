//! Processor cache behavior seen through `Config`.

use std::sync::Arc;
use std::thread;

use colorpipe::{
    ColorSpace, Config, ConfigDefinition, EnvOverrides, ErrorKind, ProcessorCacheFlags, Transform,
    TransformDirection,
};

fn config() -> Config {
    let mut def = ConfigDefinition::default();
    def.colorspaces.push(ColorSpace::new("linear"));
    def.colorspaces.push(
        ColorSpace::builder("gamma22")
            .to_reference(Transform::exponent(2.2))
            .build(),
    );
    def.colorspaces.push(
        ColorSpace::builder("gamma24")
            .to_reference(Transform::exponent(2.4))
            .build(),
    );
    def.roles.define("default", "linear");
    Config::from_definition_with_env(def, EnvOverrides::default()).unwrap()
}

#[test]
fn repeated_requests_share_one_processor() {
    let config = config();
    let a = config.processor("gamma22", "linear").unwrap();
    let b = config.processor("gamma22", "linear").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(config.cached_processor_count(), 1);

    config.clear_processor_cache();
    let c = config.processor("gamma22", "linear").unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    // Handed-out processors keep working after the cache drops them.
    assert_eq!(a.apply_rgb_pixel([0.5, 0.5, 0.5]), c.apply_rgb_pixel([0.5, 0.5, 0.5]));
}

#[test]
fn mutation_invalidates() {
    let config = config();
    let before = config.processor("gamma22", "linear").unwrap();
    config.set_role("scene_linear", "linear").unwrap();
    assert_eq!(config.cached_processor_count(), 0);
    let after = config.processor("gamma22", "linear").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn disabled_cache_builds_every_time() {
    let config = config();
    config.set_processor_cache_flags(ProcessorCacheFlags::OFF).unwrap();
    let a = config.processor("gamma22", "linear").unwrap();
    let b = config.processor("gamma22", "linear").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(config.cached_processor_count(), 0);

    let err = config.set_processor_cache_flags(ProcessorCacheFlags::FALLBACK).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheState);
    assert_eq!(config.processor_cache_flags(), ProcessorCacheFlags::OFF);
}

#[test]
fn fallback_shares_equivalent_pipelines() {
    let config = config();
    let direct = config.processor("gamma22", "linear").unwrap();
    let grouped = config
        .processor_for_transform(
            None,
            &Transform::group(vec![Transform::colorspace("gamma22", "linear")]),
            TransformDirection::Forward,
        )
        .unwrap();
    assert_eq!(direct.cache_id(), grouped.cache_id());
    assert!(Arc::ptr_eq(&direct, &grouped));

    config.set_processor_cache_flags(ProcessorCacheFlags::ENABLED).unwrap();
    config.clear_processor_cache();
    let direct = config.processor("gamma22", "linear").unwrap();
    let grouped = config
        .processor_for_transform(
            None,
            &Transform::group(vec![Transform::colorspace("gamma22", "linear")]),
            TransformDirection::Forward,
        )
        .unwrap();
    assert!(!Arc::ptr_eq(&direct, &grouped));
}

#[test]
fn threads_share_the_config() {
    let config = Arc::new(config());
    let reference = config
        .processor("gamma22", "gamma24")
        .unwrap()
        .apply_rgb_pixel([0.5, 0.5, 0.5]);

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                for _ in 0..50 {
                    let (src, dst) = if i % 2 == 0 {
                        ("gamma22", "gamma24")
                    } else {
                        ("gamma24", "gamma22")
                    };
                    let processor = config.processor(src, dst).unwrap();
                    let mut buf = [0.5f32; 30];
                    processor.apply_rgb(&mut buf).unwrap();
                }
                config.processor("gamma22", "gamma24").unwrap().apply_rgb_pixel([0.5, 0.5, 0.5])
            })
        })
        .collect();

    let mutator = {
        let config = Arc::clone(&config);
        thread::spawn(move || {
            for i in 0..20 {
                let target = if i % 2 == 0 { "gamma22" } else { "gamma24" };
                config.set_role("texture_paint", target).unwrap();
            }
        })
    };

    for worker in workers {
        assert_eq!(worker.join().unwrap(), reference);
    }
    mutator.join().unwrap();
    assert!(config.cached_processor_count() <= 2);
}
