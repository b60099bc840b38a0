//! Standard color space roles.
//!
//! Roles reference color spaces by purpose rather than by name, which keeps
//! client code portable across configs. Role names are case-insensitive.
//!
//! # Standard Roles
//!
//! - `reference` - Reference space
//! - `default` - Fallback for unresolved input spaces
//! - `data` - Non-color data (normals, masks, etc.)
//! - `scene_linear` - Scene-referred linear working space
//! - `rendering` - Space for rendering calculations
//! - `compositing_log` - Log compositing space
//! - `color_timing` - Color grading/timing space
//! - `texture_paint` - Texture painting space
//! - `matte_paint` - Matte painting space
//! - `color_picking` - Color picker display space
//! - `aces_interchange`, `cie_xyz_d65_interchange` - Interchange spaces

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Standard role names.
pub mod names {
    /// Reference space.
    pub const REFERENCE: &str = "reference";
    /// Default input color space.
    pub const DEFAULT: &str = "default";
    /// Non-color data (normals, masks).
    pub const DATA: &str = "data";
    /// Scene-referred linear working space.
    pub const SCENE_LINEAR: &str = "scene_linear";
    /// Rendering calculations space.
    pub const RENDERING: &str = "rendering";
    /// Compositing log space.
    pub const COMPOSITING_LOG: &str = "compositing_log";
    /// Color grading space.
    pub const COLOR_TIMING: &str = "color_timing";
    /// Texture painting space.
    pub const TEXTURE_PAINT: &str = "texture_paint";
    /// Matte painting space.
    pub const MATTE_PAINT: &str = "matte_paint";
    /// Color picker display space.
    pub const COLOR_PICKING: &str = "color_picking";
    /// ACES interchange scene-referred.
    pub const ACES_INTERCHANGE: &str = "aces_interchange";
    /// CIE XYZ interchange (D65), display-referred.
    pub const CIE_XYZ_D65_INTERCHANGE: &str = "cie_xyz_d65_interchange";
}

/// Role to color space mapping.
///
/// Keys are stored lowercase so iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles {
    mapping: BTreeMap<String, String>,
}

impl Roles {
    /// Creates an empty roles mapping.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or redefines a role.
    pub fn define(&mut self, role: impl AsRef<str>, colorspace: impl Into<String>) {
        self.mapping.insert(key(role.as_ref()), colorspace.into());
    }

    /// Removes a role; returns the color space it pointed at.
    pub fn remove(&mut self, role: &str) -> Option<String> {
        self.mapping.remove(&key(role))
    }

    /// Color space name for a role.
    #[inline]
    pub fn get(&self, role: &str) -> Option<&str> {
        self.mapping.get(&key(role)).map(String::as_str)
    }

    /// True if the role is defined.
    #[inline]
    pub fn contains(&self, role: &str) -> bool {
        self.mapping.contains_key(&key(role))
    }

    /// All roles in name order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Roles that point at `colorspace` (case-insensitive).
    pub fn roles_for<'a>(&'a self, colorspace: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.iter().filter(move |(_, cs)| cs.eq_ignore_ascii_case(colorspace)).map(|(r, _)| r)
    }

    /// Rewrites every role pointing at `from` to point at `to`.
    pub(crate) fn rename_target(&mut self, from: &str, to: &str) {
        for cs in self.mapping.values_mut() {
            if cs.eq_ignore_ascii_case(from) {
                *cs = to.to_string();
            }
        }
    }

    /// Number of defined roles.
    #[inline]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// True if no role is defined.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[inline]
fn key(role: &str) -> String {
    role.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup() {
        let mut roles = Roles::new();
        roles.define(names::SCENE_LINEAR, "ACEScg");
        roles.define("Color_Picking", "sRGB");

        assert_eq!(roles.get("scene_linear"), Some("ACEScg"));
        assert_eq!(roles.get("COLOR_PICKING"), Some("sRGB"));
        assert!(!roles.contains(names::DATA));
        assert_eq!(roles.len(), 2);
    }

    #[test]
    fn stable_order_and_reverse_lookup() {
        let mut roles = Roles::new();
        roles.define("rendering", "lin");
        roles.define("default", "raw");
        roles.define("scene_linear", "lin");

        let keys: Vec<_> = roles.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["default", "rendering", "scene_linear"]);
        let for_lin: Vec<_> = roles.roles_for("LIN").collect();
        assert_eq!(for_lin, ["rendering", "scene_linear"]);
    }

    #[test]
    fn rename_and_remove() {
        let mut roles = Roles::new();
        roles.define("default", "raw");
        roles.rename_target("RAW", "data_space");
        assert_eq!(roles.get("default"), Some("data_space"));
        assert_eq!(roles.remove("DEFAULT").as_deref(), Some("data_space"));
        assert!(roles.is_empty());
    }
}
