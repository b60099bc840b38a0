//! Look definitions and look list parsing.
//!
//! Looks are named creative transforms applied in a process space, e.g. a
//! show LUT or a per-shot grade. A look list names several of them:
//!
//! - `,` separates looks applied in sequence
//! - a `+` or `-` prefix applies a look forward or inverted
//! - `|` separates alternatives; the first one whose looks all exist wins
//! - an empty alternative makes the whole list optional
//!
//! # Example
//!
//! ```
//! use colorpipe::{parse_looks, Look, TransformDirection};
//!
//! let look = Look::new("Show LUT").process_space("ACEScct");
//! assert_eq!(look.get_process_space(), Some("ACEScct"));
//!
//! let list = parse_looks("foo, -bar | baz |");
//! assert!(list.optional);
//! assert_eq!(list.options.len(), 2);
//! assert_eq!(list.options[0][1].direction, TransformDirection::Inverse);
//! ```

use serde::{Deserialize, Serialize};

use crate::transform::{Transform, TransformDirection};

/// A named creative look/grade.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Look {
    name: String,
    process_space: Option<String>,
    description: String,
    transform: Option<Transform>,
    inverse_transform: Option<Transform>,
}

impl Look {
    /// Creates a new look with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the process space.
    pub fn process_space(mut self, space: impl Into<String>) -> Self {
        self.process_space = Some(space.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the forward transform.
    pub fn transform(mut self, t: Transform) -> Self {
        self.transform = Some(t);
        self
    }

    /// Sets the inverse transform.
    pub fn inverse_transform(mut self, t: Transform) -> Self {
        self.inverse_transform = Some(t);
        self
    }

    /// Returns the look name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the process space name.
    #[inline]
    pub fn get_process_space(&self) -> Option<&str> {
        self.process_space.as_deref()
    }

    /// Returns the description.
    #[inline]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// Returns the forward transform.
    #[inline]
    pub fn get_transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Returns the inverse transform.
    #[inline]
    pub fn get_inverse_transform(&self) -> Option<&Transform> {
        self.inverse_transform.as_ref()
    }

    /// Transform applying this look in `direction`.
    ///
    /// An explicit inverse transform wins over inverting the forward one.
    /// `None` means the look does nothing.
    pub fn transform_for(&self, direction: TransformDirection) -> Option<Transform> {
        match direction {
            TransformDirection::Forward => self
                .transform
                .clone()
                .or_else(|| self.inverse_transform.clone().map(Transform::inverse)),
            TransformDirection::Inverse => self
                .inverse_transform
                .clone()
                .or_else(|| self.transform.clone().map(Transform::inverse)),
        }
    }
}

/// One look of a look list with its requested direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookEntry {
    /// Look name.
    pub name: String,
    /// Requested direction.
    pub direction: TransformDirection,
}

/// Parsed look list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookList {
    /// Alternatives in preference order, each an ordered list of looks.
    pub options: Vec<Vec<LookEntry>>,
    /// True if an empty alternative was given.
    pub optional: bool,
}

impl LookList {
    /// True if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.options.iter().all(Vec::is_empty)
    }

    /// All look names, in order of first appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for entry in self.options.iter().flatten() {
            if !out.iter().any(|n| n.eq_ignore_ascii_case(&entry.name)) {
                out.push(&entry.name);
            }
        }
        out
    }
}

/// Parses a look list string.
pub fn parse_looks(looks: &str) -> LookList {
    let mut list = LookList::default();
    if looks.trim().is_empty() {
        return list;
    }
    for option in looks.split('|') {
        let entries: Vec<LookEntry> = option
            .split(',')
            .filter_map(|token| {
                let token = token.trim();
                let (name, direction) = if let Some(name) = token.strip_prefix('-') {
                    (name.trim(), TransformDirection::Inverse)
                } else if let Some(name) = token.strip_prefix('+') {
                    (name.trim(), TransformDirection::Forward)
                } else {
                    (token, TransformDirection::Forward)
                };
                (!name.is_empty()).then(|| LookEntry { name: name.to_string(), direction })
            })
            .collect();
        if entries.is_empty() {
            list.optional = true;
        } else {
            list.options.push(entries);
        }
    }
    list
}

/// Application order of `entries` for a request in `direction`.
///
/// Forward keeps the written order; inverse reverses it and flips every
/// look's direction.
pub fn look_sequence(entries: &[LookEntry], direction: TransformDirection) -> Vec<LookEntry> {
    match direction {
        TransformDirection::Forward => entries.to_vec(),
        TransformDirection::Inverse => entries
            .iter()
            .rev()
            .map(|e| LookEntry {
                name: e.name.clone(),
                direction: e.direction.inverse(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransformDirection::{Forward, Inverse};

    fn entry(name: &str, direction: TransformDirection) -> LookEntry {
        LookEntry {
            name: name.into(),
            direction,
        }
    }

    #[test]
    fn build_look() {
        let look = Look::new("Film Grade").process_space("ACEScct").description("Main film look");
        assert_eq!(look.name(), "Film Grade");
        assert_eq!(look.get_process_space(), Some("ACEScct"));
        assert!(look.transform_for(Forward).is_none());
    }

    #[test]
    fn explicit_inverse_wins() {
        let look = Look::new("grade")
            .transform(Transform::exponent(2.0))
            .inverse_transform(Transform::exponent(0.5));
        assert_eq!(look.transform_for(Inverse), Some(Transform::exponent(0.5)));

        let fwd_only = Look::new("grade").transform(Transform::exponent(2.0));
        assert_eq!(fwd_only.transform_for(Inverse), Some(Transform::exponent(2.0).inverse()));
    }

    #[test]
    fn parse_single_and_multiple() {
        assert_eq!(parse_looks("ShowLUT").options, vec![vec![entry("ShowLUT", Forward)]]);
        let list = parse_looks("foo, +bar, -baz");
        assert_eq!(
            list.options[0],
            vec![entry("foo", Forward), entry("bar", Forward), entry("baz", Inverse)]
        );
        assert!(!list.optional);
    }

    #[test]
    fn parse_alternatives() {
        let list = parse_looks("a, b | c |");
        assert_eq!(list.options.len(), 2);
        assert!(list.optional);
        assert_eq!(list.names(), ["a", "b", "c"]);
        assert!(parse_looks("   ").is_empty());
    }

    #[test]
    fn inverse_sequence_reverses_and_flips() {
        let list = parse_looks("foo, +bar");
        let fwd = look_sequence(&list.options[0], Forward);
        assert_eq!(fwd, vec![entry("foo", Forward), entry("bar", Forward)]);
        let inv = look_sequence(&list.options[0], Inverse);
        assert_eq!(inv, vec![entry("bar", Inverse), entry("foo", Inverse)]);
    }
}
