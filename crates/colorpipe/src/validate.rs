//! Registry validation.
//!
//! [`check`] walks a whole [`ConfigDefinition`] and reports every problem it
//! finds instead of stopping at the first one:
//! - empty or duplicate names and aliases
//! - roles, looks and views pointing at unknown entities
//! - malformed transforms on any entity
//! - reference space mismatches between views and view transforms
//! - misordered or malformed file rules
//! - cyclic references through color spaces, looks and view transforms
//!
//! # Example
//!
//! ```
//! use colorpipe::{ColorSpace, ConfigDefinition, validate};
//!
//! let mut def = ConfigDefinition::default();
//! def.colorspaces.push(ColorSpace::new("lin"));
//! def.roles.define("default", "lin");
//! def.roles.define("scene_linear", "missing");
//!
//! let issues = validate::check(&def);
//! assert!(validate::has_errors(&issues));
//! for issue in &issues {
//!     println!("{}: {}", issue.severity, issue.message);
//! }
//! ```

use std::collections::{HashMap, HashSet};

use crate::colorspace::ReferenceSpaceType;
use crate::config::ConfigDefinition;
use crate::error::{ColorError, ColorResult};
use crate::look::parse_looks;
use crate::transform::Transform;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Works, but listings or lookups may surprise.
    Warning,
    /// Processor requests touching this will fail.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A validation issue found in a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Severity level.
    pub severity: Severity,
    /// Issue category.
    pub category: IssueCategory,
    /// Human-readable message.
    pub message: String,
    /// Related element (color space name, role, etc.).
    pub context: Option<String>,
}

impl Issue {
    fn error(category: IssueCategory, context: impl Into<String>, message: String) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message,
            context: Some(context.into()),
        }
    }

    fn warning(category: IssueCategory, context: impl Into<String>, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message,
            context: Some(context.into()),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Categories of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCategory {
    /// Empty or otherwise unusable name.
    InvalidName,
    /// Two entities share a name or alias.
    Duplicate,
    /// Missing color space reference.
    MissingColorSpace,
    /// Missing look reference.
    MissingLook,
    /// Missing display or view.
    MissingDisplay,
    /// Missing view transform reference.
    MissingViewTransform,
    /// Invalid transform configuration.
    InvalidTransform,
    /// Scene and display references cannot be bridged.
    ReferenceSpace,
    /// Malformed file rules.
    FileRule,
    /// Active or inactive list naming unknown entries.
    ActiveList,
    /// Circular reference in transforms.
    CircularReference,
}

/// Validates a registry and returns all issues found.
pub fn check(def: &ConfigDefinition) -> Vec<Issue> {
    let mut issues = Vec::new();

    check_colorspaces(def, &mut issues);
    check_roles(def, &mut issues);
    check_looks(def, &mut issues);
    check_view_transforms(def, &mut issues);
    check_displays(def, &mut issues);
    check_file_rules(def, &mut issues);
    check_active_lists(def, &mut issues);
    check_cycles(def, &mut issues);

    issues
}

/// Fails with every error-severity issue joined into one message.
pub(crate) fn validate(def: &ConfigDefinition) -> ColorResult<()> {
    let errors: Vec<String> = check(def)
        .into_iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.message)
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    Err(ColorError::Validation(errors.join("; ")))
}

/// Returns true if any issue is an error.
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// Returns true if any issue is a warning.
pub fn has_warnings(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Warning)
}

/// Named entity a transform points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference {
    ColorSpace(String),
    Look(String),
    View { display: String, view: String },
}

/// Collects the named entities `t` refers to, descending into groups.
pub(crate) fn collect_references(t: &Transform, out: &mut Vec<Reference>) {
    match t {
        Transform::Group(g) => g.transforms.iter().for_each(|t| collect_references(t, out)),
        Transform::ColorSpace(cs) => {
            out.push(Reference::ColorSpace(cs.src.clone()));
            out.push(Reference::ColorSpace(cs.dst.clone()));
        }
        Transform::Look(lt) => {
            out.push(Reference::ColorSpace(lt.src.clone()));
            out.push(Reference::ColorSpace(lt.dst.clone()));
            let list = parse_looks(&lt.looks);
            for entry in list.options.iter().flatten() {
                out.push(Reference::Look(entry.name.clone()));
            }
        }
        Transform::DisplayView(dv) => {
            out.push(Reference::ColorSpace(dv.src.clone()));
            out.push(Reference::View {
                display: dv.display.clone(),
                view: dv.view.clone(),
            });
        }
        _ => {}
    }
}

fn transform_issues(owner: &str, what: &str, t: Option<&Transform>, issues: &mut Vec<Issue>) {
    let Some(t) = t else { return };
    if let Err(e) = t.validate() {
        issues.push(Issue::error(
            IssueCategory::InvalidTransform,
            owner,
            format!("{} '{}': {}", what, owner, e),
        ));
    }
}

fn check_colorspaces(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for cs in &def.colorspaces {
        if cs.name().trim().is_empty() {
            let message = "color space with an empty name".into();
            issues.push(Issue::error(IssueCategory::InvalidName, "", message));
            continue;
        }
        for name in std::iter::once(cs.name()).chain(cs.aliases().iter().map(String::as_str)) {
            let key = name.trim().to_ascii_lowercase();
            match seen.get(&key) {
                Some(owner) => issues.push(Issue::error(
                    IssueCategory::Duplicate,
                    cs.name(),
                    format!("color space name or alias '{}' is already used by '{}'", name, owner),
                )),
                None => {
                    seen.insert(key, cs.name());
                }
            }
        }
        transform_issues(cs.name(), "color space", cs.to_reference(), issues);
        transform_issues(cs.name(), "color space", cs.from_reference(), issues);
        check_transform_targets(def, cs.name(), cs.to_reference(), issues);
        check_transform_targets(def, cs.name(), cs.from_reference(), issues);
    }
}

fn check_transform_targets(
    def: &ConfigDefinition,
    owner: &str,
    t: Option<&Transform>,
    issues: &mut Vec<Issue>,
) {
    let Some(t) = t else { return };
    let mut refs = Vec::new();
    collect_references(t, &mut refs);
    for r in refs {
        match r {
            Reference::ColorSpace(name) if def.resolve_colorspace(&name).is_none() => {
                issues.push(Issue::error(
                    IssueCategory::MissingColorSpace,
                    owner,
                    format!("'{}' references unknown color space '{}'", owner, name),
                ))
            }
            Reference::Look(name) if def.look(&name).is_none() => issues.push(Issue::error(
                IssueCategory::MissingLook,
                owner,
                format!("'{}' references unknown look '{}'", owner, name),
            )),
            Reference::View { display, view } => {
                let found = def.display(&display).is_some_and(|d| d.view(&view).is_some());
                if !found {
                    issues.push(Issue::error(
                        IssueCategory::MissingDisplay,
                        owner,
                        format!(
                            "'{}' references unknown view '{}' of display '{}'",
                            owner, view, display
                        ),
                    ));
                }
            }
            _ => {}
        }
    }
}

fn check_roles(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    for (role, target) in def.roles.iter() {
        if def.colorspaces.iter().all(|cs| !cs.matches_name(target)) {
            issues.push(Issue::error(
                IssueCategory::MissingColorSpace,
                role,
                format!("role '{}' references non-existent color space '{}'", role, target),
            ));
        }
        if def.colorspaces.iter().any(|cs| cs.matches_name(role)) {
            issues.push(Issue::warning(
                IssueCategory::Duplicate,
                role,
                format!("role '{}' shadows a color space of the same name", role),
            ));
        }
    }
}

fn check_looks(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    for look in &def.looks {
        if look.name().trim().is_empty() {
            let message = "look with an empty name".into();
            issues.push(Issue::error(IssueCategory::InvalidName, "", message));
            continue;
        }
        if !seen.insert(look.name().to_ascii_lowercase()) {
            issues.push(Issue::error(
                IssueCategory::Duplicate,
                look.name(),
                format!("look '{}' is defined more than once", look.name()),
            ));
        }
        if let Some(ps) = look.get_process_space() {
            if def.resolve_colorspace(ps).is_none() {
                issues.push(Issue::error(
                    IssueCategory::MissingColorSpace,
                    look.name(),
                    format!("look '{}' has unknown process space '{}'", look.name(), ps),
                ));
            }
        }
        transform_issues(look.name(), "look", look.get_transform(), issues);
        transform_issues(look.name(), "look", look.get_inverse_transform(), issues);
        check_transform_targets(def, look.name(), look.get_transform(), issues);
        check_transform_targets(def, look.name(), look.get_inverse_transform(), issues);
    }
}

fn check_view_transforms(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    for vt in &def.view_transforms {
        if !seen.insert(vt.name().to_ascii_lowercase()) {
            issues.push(Issue::error(
                IssueCategory::Duplicate,
                vt.name(),
                format!("view transform '{}' is defined more than once", vt.name()),
            ));
        }
        if vt.from_reference().is_none() && vt.to_reference().is_none() {
            issues.push(Issue::error(
                IssueCategory::InvalidTransform,
                vt.name(),
                format!("view transform '{}' has no transform", vt.name()),
            ));
        }
        transform_issues(vt.name(), "view transform", vt.from_reference(), issues);
        transform_issues(vt.name(), "view transform", vt.to_reference(), issues);
        check_transform_targets(def, vt.name(), vt.from_reference(), issues);
        check_transform_targets(def, vt.name(), vt.to_reference(), issues);
    }

    if let Some(name) = &def.default_view_transform {
        if def.view_transform(name).is_none() {
            issues.push(Issue::error(
                IssueCategory::MissingViewTransform,
                name.as_str(),
                format!("default view transform '{}' is not defined", name),
            ));
        }
    }

    let has = |r: ReferenceSpaceType| {
        def.colorspaces
            .iter()
            .any(|cs| !cs.is_data() && cs.reference_space() == r)
    };
    if has(ReferenceSpaceType::Scene)
        && has(ReferenceSpaceType::Display)
        && def.default_view_transform().is_none()
    {
        issues.push(Issue {
            severity: Severity::Error,
            category: IssueCategory::ReferenceSpace,
            message: "scene and display-referred color spaces exist \
                      but no view transform connects them"
                .into(),
            context: None,
        });
    }
}

fn check_displays(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    for display in &def.displays {
        if !seen.insert(display.name().to_ascii_lowercase()) {
            issues.push(Issue::error(
                IssueCategory::Duplicate,
                display.name(),
                format!("display '{}' is defined more than once", display.name()),
            ));
        }
        if display.views().is_empty() {
            issues.push(Issue::warning(
                IssueCategory::MissingDisplay,
                display.name(),
                format!("display '{}' has no views", display.name()),
            ));
        }
        for view in display.views() {
            let ctx = format!("{}/{}", display.name(), view.name());
            let target = view.resolved_colorspace(display.name());
            let Some(cs) = def.resolve_colorspace(target) else {
                issues.push(Issue::error(
                    IssueCategory::MissingColorSpace,
                    ctx.as_str(),
                    format!(
                        "view '{}' of display '{}' references unknown color space '{}'",
                        view.name(),
                        display.name(),
                        target
                    ),
                ));
                continue;
            };
            if let Some(vt) = view.view_transform() {
                if def.view_transform(vt).is_none() {
                    issues.push(Issue::error(
                        IssueCategory::MissingViewTransform,
                        ctx.as_str(),
                        format!(
                            "view '{}' of display '{}' references unknown view transform '{}'",
                            view.name(),
                            display.name(),
                            vt
                        ),
                    ));
                }
                if cs.reference_space() != ReferenceSpaceType::Display && !cs.is_data() {
                    issues.push(Issue::error(
                        IssueCategory::ReferenceSpace,
                        ctx.as_str(),
                        format!(
                            "view '{}' uses a view transform but '{}' is not display-referred",
                            view.name(),
                            cs.name()
                        ),
                    ));
                }
            }
            if let Some(looks) = view.looks() {
                for entry in parse_looks(looks).options.iter().flatten() {
                    if def.look(&entry.name).is_none() {
                        issues.push(Issue::error(
                            IssueCategory::MissingLook,
                            ctx.as_str(),
                            format!(
                                "view '{}' of display '{}' references unknown look '{}'",
                                view.name(),
                                display.name(),
                                entry.name
                            ),
                        ));
                    }
                }
            }
        }
        if let Some(default) = display.default_view() {
            if display.view(default).is_none() {
                issues.push(Issue::error(
                    IssueCategory::MissingDisplay,
                    display.name(),
                    format!("display '{}' has unknown default view '{}'", display.name(), default),
                ));
            }
        }
    }
}

fn check_file_rules(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    for message in def.file_rules.check() {
        issues.push(Issue {
            severity: Severity::Error,
            category: IssueCategory::FileRule,
            message,
            context: None,
        });
    }
    for rule in def.file_rules.rules() {
        let target = rule.colorspace();
        if target.is_empty() {
            continue;
        }
        if def.resolve_colorspace(target).is_none() {
            issues.push(Issue::error(
                IssueCategory::FileRule,
                rule.name(),
                format!(
                    "file rule '{}' references unknown color space or role '{}'",
                    rule.name(),
                    target
                ),
            ));
        }
    }
}

fn check_active_lists(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    for name in &def.active_displays {
        if def.display(name).is_none() {
            issues.push(Issue::warning(
                IssueCategory::ActiveList,
                name.as_str(),
                format!("active display '{}' is not defined", name),
            ));
        }
    }
    for name in &def.active_views {
        if !def.displays.iter().any(|d| d.view(name).is_some()) {
            issues.push(Issue::warning(
                IssueCategory::ActiveList,
                name.as_str(),
                format!("active view '{}' is not used by any display", name),
            ));
        }
    }
    for name in &def.inactive_colorspaces {
        if !def.colorspaces.iter().any(|cs| cs.matches_name(name)) {
            issues.push(Issue::warning(
                IssueCategory::ActiveList,
                name.as_str(),
                format!("inactive color space '{}' is not defined", name),
            ));
        }
    }
}

/// Reference graph over `kind:name` nodes.
struct Graph<'a> {
    def: &'a ConfigDefinition,
}

impl Graph<'_> {
    fn nodes(&self) -> Vec<String> {
        let def = self.def;
        let cs = def.colorspaces.iter().map(|c| node("colorspace", c.name()));
        let looks = def.looks.iter().map(|l| node("look", l.name()));
        let vts = def.view_transforms.iter().map(|v| node("viewtransform", v.name()));
        cs.chain(looks).chain(vts).collect()
    }

    fn edges(&self, key: &str) -> Vec<String> {
        let def = self.def;
        let (kind, name) = key.split_once(':').unwrap_or(("", key));
        let transforms: Vec<&Transform> = match kind {
            "colorspace" => def
                .resolve_colorspace(name)
                .map(|c| c.to_reference().into_iter().chain(c.from_reference()).collect())
                .unwrap_or_default(),
            "look" => def
                .look(name)
                .map(|l| l.get_transform().into_iter().chain(l.get_inverse_transform()).collect())
                .unwrap_or_default(),
            "viewtransform" => def
                .view_transform(name)
                .map(|v| v.from_reference().into_iter().chain(v.to_reference()).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut refs = Vec::new();
        for t in transforms {
            collect_references(t, &mut refs);
        }
        let mut out = Vec::new();
        for r in refs {
            match r {
                Reference::ColorSpace(n) => {
                    if let Some(cs) = def.resolve_colorspace(&n) {
                        out.push(node("colorspace", cs.name()));
                    }
                }
                Reference::Look(n) => {
                    if let Some(look) = def.look(&n) {
                        out.push(node("look", look.name()));
                    }
                }
                Reference::View { display, view } => {
                    let Some(d) = def.display(&display) else { continue };
                    let Some(v) = d.view(&view) else { continue };
                    if let Some(cs) = def.resolve_colorspace(v.resolved_colorspace(d.name())) {
                        out.push(node("colorspace", cs.name()));
                    }
                    if let Some(vt) = v.view_transform().and_then(|n| def.view_transform(n)) {
                        out.push(node("viewtransform", vt.name()));
                    }
                    if let Some(looks) = v.looks() {
                        for e in parse_looks(looks).options.iter().flatten() {
                            if let Some(look) = def.look(&e.name) {
                                out.push(node("look", look.name()));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

fn node(kind: &str, name: &str) -> String {
    format!("{}:{}", kind, name.to_ascii_lowercase())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Active,
    Done,
}

/// Depth-first search reporting each cycle once, by the node closing it.
fn check_cycles(def: &ConfigDefinition, issues: &mut Vec<Issue>) {
    let graph = Graph { def };
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        graph: &Graph<'_>,
        key: String,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        issues: &mut Vec<Issue>,
    ) {
        match marks.get(&key) {
            Some(Mark::Done) => return,
            Some(Mark::Active) => {
                let start = stack.iter().position(|k| *k == key).unwrap_or(0);
                let mut chain = stack[start..].join(" -> ");
                chain.push_str(" -> ");
                chain.push_str(&key);
                issues.push(Issue::error(
                    IssueCategory::CircularReference,
                    key.as_str(),
                    format!("circular reference: {}", chain),
                ));
                return;
            }
            None => {}
        }
        marks.insert(key.clone(), Mark::Active);
        stack.push(key.clone());
        for next in graph.edges(&key) {
            visit(graph, next, marks, stack, issues);
        }
        stack.pop();
        marks.insert(key, Mark::Done);
    }

    for key in graph.nodes() {
        visit(&graph, key, &mut marks, &mut stack, issues);
    }
}
