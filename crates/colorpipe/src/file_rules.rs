//! File path rules: assigning a color space to an image file by its path.
//!
//! Rules are evaluated in order and the first match wins. Two sentinel rules
//! exist besides glob and regex rules:
//! - `ColorSpaceNamePathSearch` matches when a color space name appears in
//!   the path (the right-most occurrence wins) and falls through otherwise
//! - `Default` matches everything and must be the last rule
//!
//! ```
//! use colorpipe::{FileRule, FileRules};
//!
//! let mut rules = FileRules::new();
//! rules.insert_rule(0, FileRule::glob("exr", "ACEScg", "*", "exr")).unwrap();
//! let names = ["ACEScg", "sRGB", "default"];
//! assert_eq!(rules.colorspace_for("/shots/a.EXR", &names), Some(("ACEScg".to_string(), 0)));
//! assert_eq!(rules.colorspace_for("/shots/a.png", &names), Some(("default".to_string(), 1)));
//! ```

use std::sync::OnceLock;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ColorError, ColorResult};

/// Name of the catch-all rule.
pub const DEFAULT_RULE_NAME: &str = "Default";
/// Name of the path search rule.
pub const PATH_SEARCH_RULE_NAME: &str = "ColorSpaceNamePathSearch";

/// Rule matching strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileRuleKind {
    /// Matches every path.
    Default,
    /// Matches paths containing a color space name.
    ColorSpaceNamePathSearch,
    /// Glob over the path and the extension; the extension ignores case.
    /// Empty strings match anything.
    Glob {
        /// Glob for everything before the last matched `.`.
        pattern: String,
        /// Glob for the extension, without the dot.
        extension: String,
    },
    /// Regular expression searched in the path.
    Regex {
        /// Expression.
        regex: String,
    },
}

enum Matcher {
    Glob(Pattern, Pattern),
    Regex(Regex),
    Sentinel,
}

/// A single file rule.
#[derive(Serialize, Deserialize)]
pub struct FileRule {
    name: String,
    colorspace: String,
    kind: FileRuleKind,
    #[serde(skip)]
    matcher: OnceLock<Result<Matcher, String>>,
}

impl Clone for FileRule {
    fn clone(&self) -> Self {
        Self::with_kind(
            self.name.clone(),
            self.colorspace.clone(),
            self.kind.clone(),
        )
    }
}

impl PartialEq for FileRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.colorspace == other.colorspace && self.kind == other.kind
    }
}

impl std::fmt::Debug for FileRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRule")
            .field("name", &self.name)
            .field("colorspace", &self.colorspace)
            .field("kind", &self.kind)
            .finish()
    }
}

impl FileRule {
    fn with_kind(name: String, colorspace: String, kind: FileRuleKind) -> Self {
        Self {
            name,
            colorspace,
            kind,
            matcher: OnceLock::new(),
        }
    }

    /// The catch-all rule assigning `colorspace`.
    pub fn default_rule(colorspace: impl Into<String>) -> Self {
        Self::with_kind(
            DEFAULT_RULE_NAME.into(),
            colorspace.into(),
            FileRuleKind::Default,
        )
    }

    /// The path search rule.
    pub fn path_search() -> Self {
        Self::with_kind(
            PATH_SEARCH_RULE_NAME.into(),
            String::new(),
            FileRuleKind::ColorSpaceNamePathSearch,
        )
    }

    /// Glob rule.
    pub fn glob(
        name: impl Into<String>,
        colorspace: impl Into<String>,
        pattern: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let kind = FileRuleKind::Glob {
            pattern: pattern.into(),
            extension: extension.into(),
        };
        Self::with_kind(name.into(), colorspace.into(), kind)
    }

    /// Regex rule.
    pub fn regex(
        name: impl Into<String>,
        colorspace: impl Into<String>,
        regex: impl Into<String>,
    ) -> Self {
        let kind = FileRuleKind::Regex {
            regex: regex.into(),
        };
        Self::with_kind(name.into(), colorspace.into(), kind)
    }

    /// Rule name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigned color space (empty for the path search rule).
    #[inline]
    pub fn colorspace(&self) -> &str {
        &self.colorspace
    }

    /// Matching strategy.
    #[inline]
    pub fn kind(&self) -> &FileRuleKind {
        &self.kind
    }

    /// True for the catch-all rule.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.kind == FileRuleKind::Default
    }

    /// Checks that the rule is well formed: name, color space and pattern.
    pub fn validate(&self) -> ColorResult<()> {
        if self.name.trim().is_empty() {
            return Err(ColorError::invalid("file rule has an empty name"));
        }
        let reserved = |n: &str| self.name.eq_ignore_ascii_case(n);
        match &self.kind {
            FileRuleKind::Default | FileRuleKind::ColorSpaceNamePathSearch => {}
            _ if reserved(DEFAULT_RULE_NAME) || reserved(PATH_SEARCH_RULE_NAME) => {
                return Err(ColorError::invalid(format!(
                    "file rule name '{}' is reserved",
                    self.name
                )));
            }
            _ => {}
        }
        let needs_colorspace = self.kind != FileRuleKind::ColorSpaceNamePathSearch;
        if needs_colorspace && self.colorspace.trim().is_empty() {
            return Err(ColorError::invalid(format!(
                "file rule '{}' has no color space",
                self.name
            )));
        }
        if let Err(reason) = self.matcher() {
            return Err(ColorError::invalid(format!("file rule '{}': {}", self.name, reason)));
        }
        Ok(())
    }

    fn matcher(&self) -> &Result<Matcher, String> {
        self.matcher.get_or_init(|| match &self.kind {
            FileRuleKind::Default | FileRuleKind::ColorSpaceNamePathSearch => Ok(Matcher::Sentinel),
            FileRuleKind::Glob { pattern, extension } => {
                let any = |s: &str| {
                    if s.trim().is_empty() {
                        "*".to_string()
                    } else {
                        s.to_string()
                    }
                };
                let path = Pattern::new(&any(pattern))
                    .map_err(|e| format!("bad glob '{}': {}", pattern, e))?;
                let ext = Pattern::new(&any(extension))
                    .map_err(|e| format!("bad glob '{}': {}", extension, e))?;
                Ok(Matcher::Glob(path, ext))
            }
            FileRuleKind::Regex { regex } => {
                if regex.is_empty() {
                    return Err("empty regex".into());
                }
                Regex::new(regex).map(Matcher::Regex).map_err(|e| format!("bad regex: {}", e))
            }
        })
    }

    /// Color space this rule assigns to `path`, if it matches.
    fn assign(&self, path: &str, colorspaces: &[&str]) -> Option<String> {
        match (&self.kind, self.matcher()) {
            (FileRuleKind::Default, _) => Some(self.colorspace.clone()),
            (FileRuleKind::ColorSpaceNamePathSearch, _) => {
                parse_colorspace_from_string(path, colorspaces).map(|i| colorspaces[i].to_string())
            }
            (_, Ok(Matcher::Glob(pattern, ext))) => {
                glob_matches(pattern, ext, path).then(|| self.colorspace.clone())
            }
            (_, Ok(Matcher::Regex(re))) => re.is_match(path).then(|| self.colorspace.clone()),
            _ => None,
        }
    }
}

fn glob_matches(pattern: &Pattern, ext: &Pattern, path: &str) -> bool {
    let exact = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let loose = MatchOptions {
        case_sensitive: false,
        ..exact
    };
    path.match_indices('.').any(|(i, _)| {
        pattern.matches_with(&path[..i], exact) && ext.matches_with(&path[i + 1..], loose)
    })
}

/// Index of the color space whose name ends right-most in `path`.
///
/// Matching ignores case; among names ending at the same position the
/// longest wins.
pub fn parse_colorspace_from_string(path: &str, colorspaces: &[&str]) -> Option<usize> {
    let haystack = path.to_lowercase();
    let mut best: Option<(usize, usize, usize)> = None;
    for (index, name) in colorspaces.iter().enumerate() {
        let needle = name.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let Some(pos) = haystack.rfind(&needle) else {
            continue;
        };
        let end = pos + needle.len();
        let better = match best {
            None => true,
            Some((best_end, best_len, _)) => {
                end > best_end || (end == best_end && needle.len() > best_len)
            }
        };
        if better {
            best = Some((end, needle.len(), index));
        }
    }
    best.map(|(_, _, index)| index)
}

/// Ordered file rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRules {
    rules: Vec<FileRule>,
}

impl Default for FileRules {
    fn default() -> Self {
        Self::new()
    }
}

impl FileRules {
    /// Only the Default rule, assigning the `default` role.
    pub fn new() -> Self {
        Self {
            rules: vec![FileRule::default_rule(crate::role::names::DEFAULT)],
        }
    }

    /// Wraps a rule list without checking it; see [`Self::check`].
    pub fn from_rules(rules: Vec<FileRule>) -> Self {
        Self { rules }
    }

    /// Rules in evaluation order.
    #[inline]
    pub fn rules(&self) -> &[FileRule] {
        &self.rules
    }

    /// Number of rules.
    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if there are no rules at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Position of the rule called `name` (case-insensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Problems with the rule list, in order: malformed rules, duplicate
    /// names, a missing or misplaced Default rule.
    pub fn check(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if let Err(e) = rule.validate() {
                issues.push(e.to_string());
            }
            if self.rules[..i].iter().any(|r| r.name.eq_ignore_ascii_case(&rule.name)) {
                issues.push(format!("duplicate file rule name '{}'", rule.name));
            }
        }
        match self.rules.iter().position(FileRule::is_default) {
            None => issues.push("file rules have no Default rule".into()),
            Some(i) if i + 1 != self.rules.len() => {
                issues.push(format!("Default file rule is at position {} but must be last", i));
            }
            Some(_) => {}
        }
        issues
    }

    fn last_insertable(&self) -> usize {
        match self.rules.last() {
            Some(r) if r.is_default() => self.rules.len() - 1,
            _ => self.rules.len(),
        }
    }

    /// Inserts `rule` at `index`, before the Default rule.
    pub fn insert_rule(&mut self, index: usize, rule: FileRule) -> ColorResult<()> {
        rule.validate()?;
        if rule.is_default() {
            return Err(ColorError::invalid("the Default file rule already exists"));
        }
        if self.index_of(&rule.name).is_some() {
            return Err(ColorError::DuplicateName {
                kind: "file rule",
                name: rule.name.clone(),
            });
        }
        if index > self.last_insertable() {
            return Err(ColorError::invalid(format!(
                "file rule index {} is past the Default rule",
                index
            )));
        }
        self.rules.insert(index, rule);
        Ok(())
    }

    /// Inserts the path search rule at `index`.
    pub fn insert_path_search_rule(&mut self, index: usize) -> ColorResult<()> {
        self.insert_rule(index, FileRule::path_search())
    }

    /// Removes the rule at `index`; the Default rule cannot be removed.
    pub fn remove_rule(&mut self, index: usize) -> ColorResult<FileRule> {
        match self.rules.get(index) {
            None => Err(ColorError::invalid(format!("no file rule at index {}", index))),
            Some(r) if r.is_default() => {
                Err(ColorError::invalid("the Default file rule cannot be removed"))
            }
            Some(_) => Ok(self.rules.remove(index)),
        }
    }

    /// Swaps the rule at `index` with the one before it.
    pub fn move_rule_up(&mut self, index: usize) -> ColorResult<()> {
        if index == 0 || index >= self.last_insertable() {
            return Err(ColorError::invalid(format!("file rule {} cannot move up", index)));
        }
        self.rules.swap(index - 1, index);
        Ok(())
    }

    /// Swaps the rule at `index` with the one after it.
    pub fn move_rule_down(&mut self, index: usize) -> ColorResult<()> {
        if index + 1 >= self.last_insertable() {
            return Err(ColorError::invalid(format!("file rule {} cannot move down", index)));
        }
        self.rules.swap(index, index + 1);
        Ok(())
    }

    /// Sets the color space of the Default rule.
    pub fn set_default_colorspace(&mut self, colorspace: impl Into<String>) -> ColorResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.is_default())
            .ok_or_else(|| ColorError::invalid("file rules have no Default rule"))?;
        rule.colorspace = colorspace.into();
        Ok(())
    }

    /// Renames every rule target `from` to `to`.
    pub(crate) fn rename_target(&mut self, from: &str, to: &str) {
        for rule in &mut self.rules {
            if rule.colorspace.eq_ignore_ascii_case(from) {
                rule.colorspace = to.to_string();
            }
        }
    }

    /// First matching rule for `path`: the assigned color space and the
    /// rule index.
    ///
    /// `colorspaces` are the names searched by the path search rule.
    pub fn colorspace_for(&self, path: &str, colorspaces: &[&str]) -> Option<(String, usize)> {
        self.rules
            .iter()
            .enumerate()
            .find_map(|(i, rule)| rule.assign(path, colorspaces).map(|cs| (cs, i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 4] = ["lnf", "srgb", "srgb_linear", "raw"];

    #[test]
    fn glob_extension_ignores_case() {
        let rule = FileRule::glob("tiff", "srgb", "*/plates/*", "tif*");
        assert_eq!(rule.assign("/job/plates/a.TIFF", &NAMES).as_deref(), Some("srgb"));
        assert_eq!(rule.assign("/job/plates/a.tif", &NAMES).as_deref(), Some("srgb"));
        // `?` needs exactly one character.
        let strict = FileRule::glob("tiff", "srgb", "*/plates/*", "tif?");
        assert_eq!(strict.assign("/job/plates/a.Tiff", &NAMES).as_deref(), Some("srgb"));
        assert!(strict.assign("/job/plates/a.tif", &NAMES).is_none());
        assert!(rule.assign("/job/renders/a.tif", &NAMES).is_none());
        // Pattern part stays case sensitive.
        assert!(rule.assign("/job/PLATES/a.tif", &NAMES).is_none());
    }

    #[test]
    fn empty_glob_parts_match_anything() {
        let rule = FileRule::glob("any", "raw", "", "");
        assert!(rule.assign("a.b.c", &NAMES).is_some());
        assert!(rule.assign("noext", &NAMES).is_none());
    }

    #[test]
    fn regex_rule() {
        let rule = FileRule::regex("proxy", "srgb", r"_proxy\.(jpg|png)$");
        assert!(rule.assign("shot_proxy.png", &NAMES).is_some());
        assert!(rule.assign("shot.png", &NAMES).is_none());
        assert!(FileRule::regex("bad", "srgb", "(").validate().is_err());
    }

    #[test]
    fn path_search_prefers_rightmost_then_longest() {
        assert_eq!(parse_colorspace_from_string("/lnf/plate_srgb.exr", &NAMES), Some(1));
        assert_eq!(parse_colorspace_from_string("/x/plate_sRGB_linear.exr", &NAMES), Some(2));
        assert_eq!(parse_colorspace_from_string("/x/plate.exr", &NAMES), None);
    }

    #[test]
    fn rule_order_and_fallthrough() {
        let mut rules = FileRules::new();
        rules.insert_path_search_rule(0).unwrap();
        rules.insert_rule(1, FileRule::glob("exr", "lnf", "*", "exr")).unwrap();

        assert_eq!(rules.colorspace_for("/a/raw.png", &NAMES), Some(("raw".into(), 0)));
        assert_eq!(rules.colorspace_for("/a/plate.exr", &NAMES), Some(("lnf".into(), 1)));
        assert_eq!(rules.colorspace_for("/a/plate.png", &NAMES), Some(("default".into(), 2)));
        assert!(rules.check().is_empty());
    }

    #[test]
    fn default_rule_stays_last() {
        let mut rules = FileRules::new();
        assert!(rules.insert_rule(1, FileRule::glob("late", "lnf", "*", "exr")).is_err());
        rules.insert_rule(0, FileRule::glob("a", "lnf", "*", "exr")).unwrap();
        rules.insert_rule(1, FileRule::glob("b", "lnf", "*", "dpx")).unwrap();
        assert!(rules.move_rule_down(1).is_err());
        rules.move_rule_up(1).unwrap();
        assert_eq!(rules.rules()[0].name(), "b");
        assert!(rules.remove_rule(2).is_err());
        assert!(matches!(
            rules.insert_rule(0, FileRule::glob("A", "lnf", "*", "exr")),
            Err(ColorError::DuplicateName { .. })
        ));
    }

    #[test]
    fn check_reports_misplaced_default() {
        let rules = FileRules::from_rules(vec![
            FileRule::default_rule("lnf"),
            FileRule::glob("exr", "lnf", "*", "exr"),
        ]);
        let issues = rules.check();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("must be last"));
    }
}
