//! Color space definition and properties.
//!
//! A color space defines:
//! - How to convert to/from its reference space (scene or display)
//! - Categorization (family, categories, encoding, equality group)
//! - Metadata (description, aliases, bit depth, allocation)
//!
//! # Example
//!
//! ```
//! use colorpipe::{ColorSpace, Encoding, Transform};
//!
//! let cs = ColorSpace::builder("ACEScg")
//!     .family("ACES")
//!     .encoding(Encoding::SceneLinear)
//!     .to_reference(Transform::builtin("ACEScg_to_ACES2065-1"))
//!     .description("ACES CG working space")
//!     .build();
//!
//! assert_eq!(cs.name(), "ACEScg");
//! assert!(cs.transform_from_reference().is_some());
//! ```

use serde::{Deserialize, Serialize};

use crate::cpu::BitDepth;
use crate::transform::{AllocationType, Transform};

/// Color encoding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Scene-referred linear.
    SceneLinear,
    /// Display-referred linear.
    DisplayLinear,
    /// Logarithmic encoding.
    Log,
    /// SDR video encoding (sRGB, Rec.709, ...).
    Sdr,
    /// HDR video encoding (PQ, HLG).
    Hdr,
    /// Non-color data.
    Data,
    /// Unspecified.
    #[default]
    Unknown,
}

impl Encoding {
    /// Parses the usual config spelling; unknown strings give `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "scene-linear" | "scene_linear" => Self::SceneLinear,
            "display-linear" | "display_linear" => Self::DisplayLinear,
            "log" => Self::Log,
            "sdr-video" | "sdr_video" => Self::Sdr,
            "hdr-video" | "hdr_video" => Self::Hdr,
            "data" => Self::Data,
            _ => Self::Unknown,
        }
    }

    /// Config spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SceneLinear => "scene-linear",
            Self::DisplayLinear => "display-linear",
            Self::Log => "log",
            Self::Sdr => "sdr-video",
            Self::Hdr => "hdr-video",
            Self::Data => "data",
            Self::Unknown => "",
        }
    }

    /// True for linear encodings.
    #[inline]
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::SceneLinear | Self::DisplayLinear)
    }
}

/// Which reference space a color space is defined against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferenceSpaceType {
    /// Scene-referred reference.
    #[default]
    Scene,
    /// Display-referred reference.
    Display,
}

/// Allocation hint: how values are spread when baked into textures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation type.
    pub allocation: AllocationType,
    /// `[min, max]` or, for log2, `[min, max, offset]`.
    pub vars: Vec<f64>,
}

/// Color space definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSpace {
    name: String,
    aliases: Vec<String>,
    description: String,
    family: String,
    equality_group: String,
    categories: Vec<String>,
    encoding: Encoding,
    bit_depth: BitDepth,
    is_data: bool,
    reference_space: ReferenceSpaceType,
    allocation: Allocation,
    to_reference: Option<Transform>,
    from_reference: Option<Transform>,
}

impl Default for ColorSpace {
    fn default() -> Self {
        Self::new("")
    }
}

impl ColorSpace {
    /// Creates a scene-referred color space identical to the reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            family: String::new(),
            equality_group: String::new(),
            categories: Vec::new(),
            encoding: Encoding::default(),
            bit_depth: BitDepth::F32,
            is_data: false,
            reference_space: ReferenceSpaceType::Scene,
            allocation: Allocation::default(),
            to_reference: None,
            from_reference: None,
        }
    }

    /// Creates a builder.
    #[inline]
    pub fn builder(name: impl Into<String>) -> ColorSpaceBuilder {
        ColorSpaceBuilder::new(name)
    }

    /// Returns the color space name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all aliases.
    #[inline]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the family, a `/` separated path such as `ACES/Input`.
    #[inline]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Returns the equality group.
    ///
    /// Spaces sharing a non-empty group convert into each other as a no-op.
    #[inline]
    pub fn equality_group(&self) -> &str {
        &self.equality_group
    }

    /// Returns the categories.
    #[inline]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// True if the space carries `category` (case-insensitive).
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(category.trim()))
    }

    /// Returns the encoding type.
    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns the bit depth hint.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// True for non-color data; conversions bypass such spaces.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.is_data
    }

    /// Reference space this color space is defined against.
    #[inline]
    pub fn reference_space(&self) -> ReferenceSpaceType {
        self.reference_space
    }

    /// Allocation hint.
    #[inline]
    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Transform to the reference space, as authored.
    #[inline]
    pub fn to_reference(&self) -> Option<&Transform> {
        self.to_reference.as_ref()
    }

    /// Transform from the reference space, as authored.
    #[inline]
    pub fn from_reference(&self) -> Option<&Transform> {
        self.from_reference.as_ref()
    }

    /// Conversion to the reference space.
    ///
    /// Falls back to the inverse of `from_reference`. `None` means the space
    /// is the reference itself.
    pub fn transform_to_reference(&self) -> Option<Transform> {
        self.to_reference
            .clone()
            .or_else(|| self.from_reference.clone().map(Transform::inverse))
    }

    /// Conversion from the reference space; see [`Self::transform_to_reference`].
    pub fn transform_from_reference(&self) -> Option<Transform> {
        self.from_reference
            .clone()
            .or_else(|| self.to_reference.clone().map(Transform::inverse))
    }

    /// True if `name` is the name or an alias (case-insensitive).
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Adds an alias unless already present.
    pub fn add_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        if !self.matches_name(&alias) {
            self.aliases.push(alias);
        }
    }

    /// Removes an alias (case-insensitive).
    pub fn remove_alias(&mut self, alias: &str) {
        self.aliases.retain(|a| !a.eq_ignore_ascii_case(alias));
    }

    /// Adds a category unless already present.
    pub fn add_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if !self.has_category(&category) {
            self.categories.push(category);
        }
    }

    /// Sets the transform to the reference space.
    pub fn set_to_reference(&mut self, transform: Option<Transform>) {
        self.to_reference = transform;
    }

    /// Sets the transform from the reference space.
    pub fn set_from_reference(&mut self, transform: Option<Transform>) {
        self.from_reference = transform;
    }
}

/// Builder for constructing color spaces.
#[derive(Debug)]
pub struct ColorSpaceBuilder {
    inner: ColorSpace,
}

impl ColorSpaceBuilder {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: ColorSpace::new(name),
        }
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.add_alias(alias);
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.inner.description = desc.into();
        self
    }

    /// Sets the family.
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.inner.family = family.into();
        self
    }

    /// Sets the equality group.
    pub fn equality_group(mut self, group: impl Into<String>) -> Self {
        self.inner.equality_group = group.into();
        self
    }

    /// Adds a category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.inner.add_category(category);
        self
    }

    /// Sets the encoding; `Data` also marks the space as data.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.inner.encoding = encoding;
        if encoding == Encoding::Data {
            self.inner.is_data = true;
        }
        self
    }

    /// Sets the bit depth.
    pub fn bit_depth(mut self, depth: BitDepth) -> Self {
        self.inner.bit_depth = depth;
        self
    }

    /// Marks as data (non-color) space.
    pub fn is_data(mut self, is_data: bool) -> Self {
        self.inner.is_data = is_data;
        self
    }

    /// Sets the reference space type.
    pub fn reference_space(mut self, reference: ReferenceSpaceType) -> Self {
        self.inner.reference_space = reference;
        self
    }

    /// Sets the allocation hint.
    pub fn allocation(mut self, allocation: AllocationType, vars: Vec<f64>) -> Self {
        self.inner.allocation = Allocation { allocation, vars };
        self
    }

    /// Sets the transform to reference space.
    pub fn to_reference(mut self, transform: Transform) -> Self {
        self.inner.to_reference = Some(transform);
        self
    }

    /// Sets the transform from reference space.
    pub fn from_reference(mut self, transform: Transform) -> Self {
        self.inner.from_reference = Some(transform);
        self
    }

    /// Builds the color space.
    pub fn build(self) -> ColorSpace {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformDirection;

    #[test]
    fn build_colorspace() {
        let cs = ColorSpace::builder("ACEScg")
            .alias("ACES - ACEScg")
            .family("ACES")
            .category("working-space")
            .encoding(Encoding::SceneLinear)
            .description("ACES CG working space")
            .build();

        assert_eq!(cs.name(), "ACEScg");
        assert_eq!(cs.family(), "ACES");
        assert!(cs.encoding().is_linear());
        assert!(cs.matches_name("acescg"));
        assert!(cs.matches_name("ACES - ACEScg"));
        assert!(cs.has_category("Working-Space"));
    }

    #[test]
    fn encoding_parse() {
        assert_eq!(Encoding::parse("scene-linear"), Encoding::SceneLinear);
        assert_eq!(Encoding::parse(" LOG "), Encoding::Log);
        assert_eq!(Encoding::parse("bogus"), Encoding::Unknown);
        assert_eq!(Encoding::parse(Encoding::Hdr.as_str()), Encoding::Hdr);
    }

    #[test]
    fn data_colorspace() {
        let cs = ColorSpace::builder("Raw").encoding(Encoding::Data).build();
        assert!(cs.is_data());
    }

    #[test]
    fn reference_fallbacks() {
        let cs = ColorSpace::builder("gamma2")
            .from_reference(Transform::exponent(2.0).inverse())
            .build();
        let to_ref = cs.transform_to_reference().unwrap();
        assert_eq!(to_ref.direction(), TransformDirection::Forward);
        assert!(ColorSpace::new("lin").transform_to_reference().is_none());
    }

    #[test]
    fn aliases_are_unique() {
        let mut cs = ColorSpace::new("sRGB");
        cs.add_alias("srgb");
        cs.add_alias("srgb_tx");
        cs.add_alias("SRGB_TX");
        assert_eq!(cs.aliases(), ["srgb_tx".to_string()]);
        cs.remove_alias("SRGB_tx");
        assert!(cs.aliases().is_empty());
    }
}
