//! Displays, views and view transforms.
//!
//! - **Display**: a physical or virtual device (monitor, projector)
//! - **View**: a viewing condition for that display (SDR, Film, Raw, ...)
//! - **ViewTransform**: converts the scene reference into the display
//!   reference, shared by views of many displays
//!
//! A view either targets a color space directly, or names a view transform
//! and a display color space. The target may be the [`USE_DISPLAY_NAME`]
//! marker, standing for the color space named like the display.
//!
//! # Example
//!
//! ```
//! use colorpipe::{Display, View};
//!
//! let mut display = Display::new("sRGB");
//! display.add_view(View::new("Film", "sRGB").with_looks("Show LUT"));
//! display.add_view(View::new("Raw", "raw"));
//!
//! assert_eq!(display.views().len(), 2);
//! assert_eq!(display.default_view(), Some("Film"));
//! ```

use serde::{Deserialize, Serialize};

use crate::colorspace::ReferenceSpaceType;
use crate::transform::Transform;

/// Target marker standing for the color space named like the display.
pub const USE_DISPLAY_NAME: &str = "<USE_DISPLAY_NAME>";

/// A view of a display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct View {
    name: String,
    colorspace: String,
    looks: Option<String>,
    view_transform: Option<String>,
    description: String,
}

impl View {
    /// Creates a view targeting `colorspace`.
    pub fn new(name: impl Into<String>, colorspace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colorspace: colorspace.into(),
            ..Default::default()
        }
    }

    /// Sets the look list.
    pub fn with_looks(mut self, looks: impl Into<String>) -> Self {
        self.looks = Some(looks.into());
        self
    }

    /// Routes the view through a view transform; the target then names a
    /// display color space.
    pub fn with_view_transform(mut self, vt: impl Into<String>) -> Self {
        self.view_transform = Some(vt.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Returns the view name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target color space, possibly [`USE_DISPLAY_NAME`].
    #[inline]
    pub fn colorspace(&self) -> &str {
        &self.colorspace
    }

    /// Target color space with the display name marker substituted.
    pub fn resolved_colorspace<'a>(&'a self, display: &'a str) -> &'a str {
        if self.uses_display_name() {
            display
        } else {
            &self.colorspace
        }
    }

    /// True if the target is the display name marker.
    #[inline]
    pub fn uses_display_name(&self) -> bool {
        self.colorspace.trim() == USE_DISPLAY_NAME
    }

    /// Returns the look list.
    #[inline]
    pub fn looks(&self) -> Option<&str> {
        self.looks.as_deref().filter(|l| !l.trim().is_empty())
    }

    /// Returns the view transform name.
    #[inline]
    pub fn view_transform(&self) -> Option<&str> {
        self.view_transform.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Returns the description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A display and its views.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Display {
    name: String,
    views: Vec<View>,
    default_view: Option<String>,
}

impl Display {
    /// Creates a display without views.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the display name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds or replaces a view; the first view becomes the default.
    pub fn add_view(&mut self, view: View) {
        if self.default_view.is_none() {
            self.default_view = Some(view.name.clone());
        }
        match self.views.iter_mut().find(|v| v.name.eq_ignore_ascii_case(&view.name)) {
            Some(slot) => *slot = view,
            None => self.views.push(view),
        }
    }

    /// Removes a view; returns false if there was none.
    pub fn remove_view(&mut self, name: &str) -> bool {
        let before = self.views.len();
        self.views.retain(|v| !v.name.eq_ignore_ascii_case(name));
        if self.default_view.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(name)) {
            self.default_view = self.views.first().map(|v| v.name.clone());
        }
        self.views.len() != before
    }

    /// Sets the default view.
    pub fn set_default_view(&mut self, name: impl Into<String>) {
        self.default_view = Some(name.into());
    }

    /// Returns all views in declaration order.
    #[inline]
    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Finds a view by name (case-insensitive).
    pub fn view(&self, name: &str) -> Option<&View> {
        let name = name.trim();
        self.views.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Returns the default view name.
    #[inline]
    pub fn default_view(&self) -> Option<&str> {
        self.default_view.as_deref()
    }

    /// Returns view names in declaration order.
    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|v| v.name.as_str())
    }
}

/// Conversion between the scene and display reference spaces.
///
/// With a scene reference type, `from_reference` maps the scene reference
/// to the display reference. With a display reference type it maps the
/// display reference onto itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewTransform {
    name: String,
    family: String,
    description: String,
    reference_space: ReferenceSpaceType,
    from_reference: Option<Transform>,
    to_reference: Option<Transform>,
}

impl ViewTransform {
    /// Creates a scene-referred view transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the family.
    #[inline]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Sets the family.
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    /// Returns the description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Reference space the transform starts from.
    #[inline]
    pub fn reference_space(&self) -> ReferenceSpaceType {
        self.reference_space
    }

    /// Sets the reference space type.
    pub fn with_reference_space(mut self, reference: ReferenceSpaceType) -> Self {
        self.reference_space = reference;
        self
    }

    /// Sets the transform from the reference to the display reference.
    pub fn with_from_reference(mut self, t: Transform) -> Self {
        self.from_reference = Some(t);
        self
    }

    /// Sets the transform from the display reference back to the reference.
    pub fn with_to_reference(mut self, t: Transform) -> Self {
        self.to_reference = Some(t);
        self
    }

    /// Transform from the reference, as authored.
    #[inline]
    pub fn from_reference(&self) -> Option<&Transform> {
        self.from_reference.as_ref()
    }

    /// Transform to the reference, as authored.
    #[inline]
    pub fn to_reference(&self) -> Option<&Transform> {
        self.to_reference.as_ref()
    }

    /// Reference to display reference, inverting `to_reference` if needed.
    pub fn forward_transform(&self) -> Option<Transform> {
        self.from_reference
            .clone()
            .or_else(|| self.to_reference.clone().map(Transform::inverse))
    }

    /// Display reference to reference.
    pub fn inverse_transform(&self) -> Option<Transform> {
        self.to_reference
            .clone()
            .or_else(|| self.from_reference.clone().map(Transform::inverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_views() {
        let mut display = Display::new("sRGB Monitor");
        display.add_view(View::new("Film", "sRGB").with_looks("Show LUT"));
        display.add_view(View::new("Raw", "raw"));
        display.add_view(View::new("raw", "Raw Data"));

        assert_eq!(display.views().len(), 2);
        assert_eq!(display.default_view(), Some("Film"));
        assert_eq!(display.view("RAW").unwrap().colorspace(), "Raw Data");
        assert_eq!(display.view("Film").unwrap().looks(), Some("Show LUT"));
    }

    #[test]
    fn removing_default_view_picks_next() {
        let mut display = Display::new("d");
        display.add_view(View::new("a", "cs"));
        display.add_view(View::new("b", "cs"));
        assert!(display.remove_view("A"));
        assert_eq!(display.default_view(), Some("b"));
        assert!(!display.remove_view("zzz"));
    }

    #[test]
    fn display_name_marker() {
        let view = View::new("Standard", USE_DISPLAY_NAME).with_view_transform("Filmic");
        assert!(view.uses_display_name());
        assert_eq!(view.resolved_colorspace("Rec.2100-PQ"), "Rec.2100-PQ");
        assert_eq!(view.view_transform(), Some("Filmic"));
        assert_eq!(View::new("v", "cs").with_looks("  ").looks(), None);
    }

    #[test]
    fn view_transform_directions() {
        let vt = ViewTransform::new("Un-tone-mapped").with_to_reference(Transform::exponent(2.0));
        assert_eq!(vt.forward_transform(), Some(Transform::exponent(2.0).inverse()));
        assert_eq!(vt.reference_space(), ReferenceSpaceType::Scene);
    }
}
