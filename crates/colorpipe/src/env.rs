//! Environment overrides read once at config construction.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OCIO` | config document path, its directory becomes the working dir |
//! | `OCIO_ACTIVE_DISPLAYS` | active display list |
//! | `OCIO_ACTIVE_VIEWS` | active view list |
//! | `OCIO_INACTIVE_COLORSPACES` | inactive color space list |
//! | `OCIO_OPTIMIZATION_FLAGS` | default optimization flags |
//! | `OCIO_USER_CATEGORIES` | category filter |
//! | `OCIO_DISABLE_ALL_CACHES` | no processor or file cache |
//! | `OCIO_DISABLE_PROCESSOR_CACHES` | no processor cache |
//! | `OCIO_DISABLE_CACHE_FALLBACK` | no content-based fallback |
//!
//! ```
//! use colorpipe::EnvOverrides;
//!
//! let env = EnvOverrides::from_vars([("OCIO_ACTIVE_DISPLAYS", "sRGB:P3")]);
//! assert_eq!(env.active_displays.as_deref(), Some(&["sRGB".to_string(), "P3".to_string()][..]));
//! ```

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::optimizer::OptimizationFlags;

/// Config document path.
pub const OCIO_ENV: &str = "OCIO";
/// Active displays override.
pub const OCIO_ACTIVE_DISPLAYS_ENV: &str = "OCIO_ACTIVE_DISPLAYS";
/// Active views override.
pub const OCIO_ACTIVE_VIEWS_ENV: &str = "OCIO_ACTIVE_VIEWS";
/// Inactive color spaces override.
pub const OCIO_INACTIVE_COLORSPACES_ENV: &str = "OCIO_INACTIVE_COLORSPACES";
/// Optimization flags override.
pub const OCIO_OPTIMIZATION_FLAGS_ENV: &str = "OCIO_OPTIMIZATION_FLAGS";
/// User categories override.
pub const OCIO_USER_CATEGORIES_ENV: &str = "OCIO_USER_CATEGORIES";
/// Disables every cache.
pub const OCIO_DISABLE_ALL_CACHES: &str = "OCIO_DISABLE_ALL_CACHES";
/// Disables the processor cache.
pub const OCIO_DISABLE_PROCESSOR_CACHES: &str = "OCIO_DISABLE_PROCESSOR_CACHES";
/// Disables the processor cache fallback.
pub const OCIO_DISABLE_CACHE_FALLBACK: &str = "OCIO_DISABLE_CACHE_FALLBACK";

/// Snapshot of the `OCIO*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    /// Config document path.
    pub config_path: Option<PathBuf>,
    /// Active displays, in order.
    pub active_displays: Option<Vec<String>>,
    /// Active views, in order.
    pub active_views: Option<Vec<String>>,
    /// Inactive color spaces.
    pub inactive_colorspaces: Option<Vec<String>>,
    /// Default optimization flags.
    pub optimization_flags: Option<OptimizationFlags>,
    /// Category filter.
    pub user_categories: Option<Vec<String>>,
    /// Disable processor and file caches.
    pub disable_all_caches: bool,
    /// Disable the processor cache.
    pub disable_processor_caches: bool,
    /// Disable the content-based cache fallback.
    pub disable_cache_fallback: bool,
}

impl EnvOverrides {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars().filter(|(k, _)| k.starts_with(OCIO_ENV)))
    }

    /// Builds overrides from explicit key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut env = Self::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                OCIO_ENV => {
                    if !value.trim().is_empty() {
                        env.config_path = Some(PathBuf::from(value.trim()));
                    }
                }
                OCIO_ACTIVE_DISPLAYS_ENV => env.active_displays = Some(split_list(value, true)),
                OCIO_ACTIVE_VIEWS_ENV => env.active_views = Some(split_list(value, true)),
                OCIO_INACTIVE_COLORSPACES_ENV => {
                    env.inactive_colorspaces = Some(split_list(value, false))
                }
                OCIO_USER_CATEGORIES_ENV => env.user_categories = Some(split_list(value, false)),
                OCIO_OPTIMIZATION_FLAGS_ENV => match parse_bits(value) {
                    Some(bits) => env.optimization_flags = Some(OptimizationFlags::from_bits(bits)),
                    None => warn!(value, "ignoring unparsable {}", OCIO_OPTIMIZATION_FLAGS_ENV),
                },
                OCIO_DISABLE_ALL_CACHES => env.disable_all_caches = is_set(value),
                OCIO_DISABLE_PROCESSOR_CACHES => env.disable_processor_caches = is_set(value),
                OCIO_DISABLE_CACHE_FALLBACK => env.disable_cache_fallback = is_set(value),
                _ => continue,
            }
            debug!(key, value, "environment override");
        }
        env
    }
}

fn split_list(value: &str, allow_colon: bool) -> Vec<String> {
    value
        .split(|c| c == ',' || (allow_colon && c == ':'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bits(value: &str) -> Option<u32> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn is_set(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty()
        || value == "0"
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("off"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists() {
        let env = EnvOverrides::from_vars([
            ("OCIO_ACTIVE_VIEWS", " Film , Raw:Log "),
            ("OCIO_INACTIVE_COLORSPACES", "a:b, c"),
        ]);
        assert_eq!(env.active_views, Some(vec!["Film".into(), "Raw".into(), "Log".into()]));
        assert_eq!(env.inactive_colorspaces, Some(vec!["a:b".into(), "c".into()]));
        assert!(env.active_displays.is_none());
    }

    #[test]
    fn flags_decimal_and_hex() {
        let env = EnvOverrides::from_vars([("OCIO_OPTIMIZATION_FLAGS", "0x0")]);
        assert_eq!(env.optimization_flags, Some(OptimizationFlags::NONE));
        let env = EnvOverrides::from_vars([("OCIO_OPTIMIZATION_FLAGS", "3")]);
        assert_eq!(env.optimization_flags.map(|f| f.bits()), Some(3));
        let env = EnvOverrides::from_vars([("OCIO_OPTIMIZATION_FLAGS", "lots")]);
        assert!(env.optimization_flags.is_none());
    }

    #[test]
    fn toggles() {
        let env = EnvOverrides::from_vars([
            ("OCIO_DISABLE_ALL_CACHES", "1"),
            ("OCIO_DISABLE_CACHE_FALLBACK", "false"),
            ("UNRELATED", "1"),
        ]);
        assert!(env.disable_all_caches);
        assert!(!env.disable_cache_fallback);
        assert!(!env.disable_processor_caches);
    }

    #[test]
    fn config_path() {
        let env = EnvOverrides::from_vars([("OCIO", "/shows/demo/config.ocio")]);
        assert_eq!(env.config_path, Some(PathBuf::from("/shows/demo/config.ocio")));
    }
}
