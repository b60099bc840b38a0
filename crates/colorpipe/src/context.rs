//! Context variables for dynamic path resolution.
//!
//! File transforms can use variables like `$SHOT` or `${SEQ}` in their
//! paths. A [`Context`] supplies the values plus the search path and working
//! directory used to locate the file.
//!
//! # Example
//!
//! ```
//! use colorpipe::Context;
//!
//! let mut ctx = Context::new();
//! ctx.set("SHOT", "sh010");
//! ctx.set("SEQ", "sq01");
//!
//! let resolved = ctx.resolve("/shows/$SEQ/shots/${SHOT}/luts/grade.cube");
//! assert_eq!(resolved, "/shows/sq01/shots/sh010/luts/grade.cube");
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ColorError, ColorResult};

/// Variables consulted while resolving one request.
///
/// `None` records a lookup of a variable that was not set, so a later
/// context that defines it does not reuse a stale result.
pub type UsedVars = BTreeMap<String, Option<String>>;

/// Pseudo variable recording the search path.
pub(crate) const SEARCH_PATH_KEY: &str = "@search_path";
/// Pseudo variable recording the working directory.
pub(crate) const WORKING_DIR_KEY: &str = "@working_dir";

/// Which process environment variables a context imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnvironmentMode {
    /// Ignore the process environment.
    #[default]
    LoadNone,
    /// Only refresh variables the context already declares.
    LoadPredefined,
    /// Import every process variable.
    LoadAll,
}

/// Context for variable substitution and file lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, String>,
    search_paths: Vec<String>,
    working_dir: Option<PathBuf>,
    environment_mode: EnvironmentMode,
}

impl Context {
    /// Creates an empty context.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a context variable.
    #[inline]
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Gets a context variable value.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// All variables, sorted by name.
    #[inline]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Removes every variable.
    #[inline]
    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    /// Ordered search path entries.
    #[inline]
    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }

    /// Replaces the search path with a `:` separated list.
    pub fn set_search_path(&mut self, paths: &str) {
        self.search_paths = paths
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    /// Appends one search path entry.
    pub fn add_search_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !path.is_empty() {
            self.search_paths.push(path);
        }
    }

    /// Drops every search path entry.
    #[inline]
    pub fn clear_search_paths(&mut self) {
        self.search_paths.clear();
    }

    /// Working directory for relative search paths.
    #[inline]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Sets the working directory.
    #[inline]
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Environment import mode.
    #[inline]
    pub fn environment_mode(&self) -> EnvironmentMode {
        self.environment_mode
    }

    /// Imports process environment variables according to `mode`.
    pub fn load_environment(&mut self, mode: EnvironmentMode) {
        self.load_environment_from(mode, std::env::vars());
    }

    /// Imports variables from `env` according to `mode`.
    pub fn load_environment_from<I, K, V>(&mut self, mode: EnvironmentMode, env: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment_mode = mode;
        match mode {
            EnvironmentMode::LoadNone => {}
            EnvironmentMode::LoadPredefined => {
                for (k, v) in env {
                    let k = k.into();
                    if let Some(slot) = self.vars.get_mut(&k) {
                        *slot = v.into();
                    }
                }
            }
            EnvironmentMode::LoadAll => {
                for (k, v) in env {
                    self.vars.insert(k.into(), v.into());
                }
            }
        }
    }

    /// Resolves all `$VAR` and `${VAR}` references in a string.
    ///
    /// Unknown variables are left as-is.
    pub fn resolve(&self, input: &str) -> String {
        let mut scratch = UsedVars::new();
        self.resolve_tracked(input, &mut scratch)
    }

    /// Like [`resolve`](Self::resolve), recording every variable looked up.
    pub fn resolve_tracked(&self, input: &str, used: &mut UsedVars) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == '}' {
                        closed = true;
                        break;
                    }
                    name.push(ch);
                }
                match self.lookup(&name, used) {
                    Some(value) if closed => result.push_str(value),
                    _ => {
                        result.push_str("${");
                        result.push_str(&name);
                        if closed {
                            result.push('}');
                        }
                    }
                }
            } else {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    result.push('$');
                } else if let Some(value) = self.lookup(&name, used) {
                    result.push_str(value);
                } else {
                    result.push('$');
                    result.push_str(&name);
                }
            }
        }
        result
    }

    fn lookup<'a>(&'a self, name: &str, used: &mut UsedVars) -> Option<&'a str> {
        let value = self.get(name);
        used.insert(name.to_string(), value.map(String::from));
        value
    }

    /// Current value of a recorded key, including the pseudo keys for the
    /// search path and working directory.
    pub(crate) fn consulted_value(&self, key: &str) -> Option<String> {
        match key {
            SEARCH_PATH_KEY => Some(self.search_paths.join(":")),
            WORKING_DIR_KEY => self.working_dir.as_ref().map(|p| p.display().to_string()),
            _ => self.get(key).map(String::from),
        }
    }

    /// True if every recorded key still has the recorded value here.
    pub(crate) fn matches(&self, used: &UsedVars) -> bool {
        used.iter().all(|(k, v)| self.consulted_value(k) == *v)
    }

    /// Locates a file: variables are substituted, absolute paths are used
    /// as-is, relative paths are tried against each search path entry
    /// (themselves relative to the working directory) in order.
    pub fn resolve_file_location(&self, path: &str) -> ColorResult<PathBuf> {
        let mut scratch = UsedVars::new();
        self.resolve_file_location_tracked(path, &mut scratch)
    }

    /// Like [`resolve_file_location`](Self::resolve_file_location),
    /// recording what was consulted.
    pub fn resolve_file_location_tracked(
        &self,
        path: &str,
        used: &mut UsedVars,
    ) -> ColorResult<PathBuf> {
        let resolved = self.resolve_tracked(path, used);
        if resolved.is_empty() {
            return Err(ColorError::FileNotFound {
                path: PathBuf::new(),
            });
        }
        let candidate = PathBuf::from(&resolved);
        if candidate.is_absolute() {
            return if candidate.is_file() {
                Ok(candidate)
            } else {
                Err(ColorError::FileNotFound { path: candidate })
            };
        }

        let working_dir = self.consulted_value(WORKING_DIR_KEY);
        used.insert(WORKING_DIR_KEY.to_string(), working_dir);
        let base = |dir: &Path| match &self.working_dir {
            Some(wd) if dir.is_relative() => wd.join(dir),
            _ => dir.to_path_buf(),
        };

        if self.search_paths.is_empty() {
            let full = base(Path::new("")).join(&candidate);
            return if full.is_file() {
                Ok(full)
            } else {
                Err(ColorError::FileNotFound { path: candidate })
            };
        }

        let search_path = self.consulted_value(SEARCH_PATH_KEY);
        used.insert(SEARCH_PATH_KEY.to_string(), search_path);
        for entry in &self.search_paths {
            let dir = PathBuf::from(self.resolve_tracked(entry, used));
            let full = base(&dir).join(&candidate);
            if full.is_file() {
                return Ok(full);
            }
        }
        Err(ColorError::FileNotFound { path: candidate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_simple_var() {
        let mut ctx = Context::new();
        ctx.set("SHOT", "sh010");
        assert_eq!(ctx.resolve("/path/$SHOT/file"), "/path/sh010/file");
    }

    #[test]
    fn resolve_braced_var() {
        let mut ctx = Context::new();
        ctx.set("SEQ", "sq01");
        assert_eq!(ctx.resolve("/path/${SEQ}_data"), "/path/sq01_data");
    }

    #[test]
    fn unresolved_left_as_is() {
        let ctx = Context::new();
        assert_eq!(ctx.resolve("$UNKNOWN"), "$UNKNOWN");
        assert_eq!(ctx.resolve("${UNKNOWN}"), "${UNKNOWN}");
        assert_eq!(ctx.resolve("${OPEN"), "${OPEN");
        assert_eq!(ctx.resolve("test$"), "test$");
    }

    #[test]
    fn tracks_missing_and_present() {
        let mut ctx = Context::new();
        ctx.set("A", "alpha");
        let mut used = UsedVars::new();
        ctx.resolve_tracked("$A/$B", &mut used);
        assert_eq!(used.get("A"), Some(&Some("alpha".to_string())));
        assert_eq!(used.get("B"), Some(&None));
        assert!(ctx.matches(&used));

        ctx.set("B", "beta");
        assert!(!ctx.matches(&used));
    }

    #[test]
    fn environment_modes() {
        let env = [("SHOT", "sh020"), ("OTHER", "x")];

        let mut ctx = Context::new();
        ctx.set("SHOT", "default");
        ctx.load_environment_from(EnvironmentMode::LoadPredefined, env);
        assert_eq!(ctx.get("SHOT"), Some("sh020"));
        assert_eq!(ctx.get("OTHER"), None);

        let mut ctx = Context::new();
        ctx.load_environment_from(EnvironmentMode::LoadAll, env);
        assert_eq!(ctx.get("OTHER"), Some("x"));

        let mut ctx = Context::new();
        ctx.load_environment_from(EnvironmentMode::LoadNone, env);
        assert!(ctx.vars().is_empty());
    }

    #[test]
    fn file_location_via_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("luts")).unwrap();
        let body = "LUT_1D_SIZE 2\n0 0 0\n1 1 1\n";
        std::fs::write(dir.path().join("luts/sh010.cube"), body).unwrap();

        let mut ctx = Context::new();
        ctx.set_working_dir(dir.path());
        ctx.set_search_path("missing:luts");
        ctx.set("SHOT", "sh010");

        let mut used = UsedVars::new();
        let found = ctx.resolve_file_location_tracked("$SHOT.cube", &mut used).unwrap();
        assert_eq!(found, dir.path().join("luts/sh010.cube"));
        assert!(used.contains_key(SEARCH_PATH_KEY));
        assert!(used.contains_key(WORKING_DIR_KEY));

        let err = ctx.resolve_file_location("nope.cube").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MissingFile);
    }
}
