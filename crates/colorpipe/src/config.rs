//! Config registry and processor requests.
//!
//! [`ConfigDefinition`] is the plain data of a registry: color spaces,
//! roles, looks, displays, view transforms, file rules and the context
//! defaults. An external document parser produces one and hands it to
//! [`Config::from_definition`].
//!
//! [`Config`] owns a definition behind a reader-writer lock together with
//! the processor and LUT file caches. Processor requests take the read lock,
//! so any number of threads can build and evaluate concurrently; mutations
//! take the write lock, clear the processor cache and then notify
//! subscribed listeners.
//!
//! # Example
//!
//! ```
//! use colorpipe::{ColorSpace, Config, ConfigDefinition, Transform};
//!
//! let mut def = ConfigDefinition::default();
//! def.colorspaces.push(ColorSpace::new("lnf"));
//! def.colorspaces.push(
//!     ColorSpace::builder("gamma2")
//!         .to_reference(Transform::exponent(2.0).inverse())
//!         .build(),
//! );
//! def.roles.define("scene_linear", "lnf");
//! def.roles.define("default", "lnf");
//!
//! let config = Config::from_definition(def).unwrap();
//! let processor = config.processor("scene_linear", "gamma2").unwrap();
//! let rgb = processor.apply_rgb_pixel([0.5, 0.5, 0.5]);
//! assert!((rgb[0] - 0.25).abs() < 1e-3);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::builder::{Builder, CubeLoader, LutLoader};
use crate::cache::{fingerprint, FileCache, ProcessorCache, ProcessorCacheFlags};
use crate::colorspace::{ColorSpace, ReferenceSpaceType};
use crate::context::{Context, EnvironmentMode};
use crate::display::{Display, View, ViewTransform};
use crate::env::EnvOverrides;
use crate::error::{ColorError, ColorResult};
use crate::file_rules::FileRules;
use crate::look::Look;
use crate::optimizer::OptimizationFlags;
use crate::processor::Processor;
use crate::role::Roles;
use crate::transform::{DisplayViewTransform, Transform, TransformDirection};
use crate::validate::{self, collect_references, Issue, Reference};

/// Complete registry contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDefinition {
    /// Config name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Color spaces in declaration order.
    pub colorspaces: Vec<ColorSpace>,
    /// Role mapping.
    pub roles: Roles,
    /// Looks.
    pub looks: Vec<Look>,
    /// Displays with their views.
    pub displays: Vec<Display>,
    /// Scene to display reference conversions.
    pub view_transforms: Vec<ViewTransform>,
    /// View transform used to bridge reference spaces; the first
    /// scene-referred one when unset.
    pub default_view_transform: Option<String>,
    /// File path rules.
    pub file_rules: FileRules,
    /// Displays to list, in order; empty lists all.
    pub active_displays: Vec<String>,
    /// Views to list, in order; empty lists all.
    pub active_views: Vec<String>,
    /// Color spaces hidden from listings.
    pub inactive_colorspaces: Vec<String>,
    /// LUT search path entries.
    pub search_paths: Vec<String>,
    /// Base directory for relative search paths.
    pub working_dir: Option<PathBuf>,
    /// Context variables with their default values.
    pub environment: BTreeMap<String, String>,
}

impl ConfigDefinition {
    /// Color space by name or alias, then by role.
    pub fn resolve_colorspace(&self, name: &str) -> Option<&ColorSpace> {
        self.find_colorspace(name)
            .or_else(|| self.roles.get(name).and_then(|target| self.find_colorspace(target)))
    }

    fn find_colorspace(&self, name: &str) -> Option<&ColorSpace> {
        self.colorspaces.iter().find(|cs| cs.matches_name(name))
    }

    /// Look by name (case-insensitive).
    pub fn look(&self, name: &str) -> Option<&Look> {
        let name = name.trim();
        self.looks.iter().find(|l| l.name().eq_ignore_ascii_case(name))
    }

    /// Display by name (case-insensitive).
    pub fn display(&self, name: &str) -> Option<&Display> {
        let name = name.trim();
        self.displays.iter().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    /// View transform by name (case-insensitive).
    pub fn view_transform(&self, name: &str) -> Option<&ViewTransform> {
        let name = name.trim();
        self.view_transforms.iter().find(|v| v.name().eq_ignore_ascii_case(name))
    }

    /// View transform bridging the scene and display references.
    pub fn default_view_transform(&self) -> Option<&ViewTransform> {
        match &self.default_view_transform {
            Some(name) => self.view_transform(name),
            None => self
                .view_transforms
                .iter()
                .find(|v| v.reference_space() == ReferenceSpaceType::Scene),
        }
    }

    fn duplicate_check(&self) -> ColorResult<()> {
        let mut seen = HashSet::new();
        for cs in &self.colorspaces {
            for name in std::iter::once(cs.name()).chain(cs.aliases().iter().map(String::as_str)) {
                if !seen.insert(name.trim().to_ascii_lowercase()) {
                    return Err(ColorError::DuplicateName {
                        kind: "color space",
                        name: name.to_string(),
                    });
                }
            }
        }
        unique("look", self.looks.iter().map(Look::name))?;
        unique("display", self.displays.iter().map(Display::name))?;
        unique("view transform", self.view_transforms.iter().map(ViewTransform::name))
    }

    fn build_context(&self, env: &EnvOverrides) -> Context {
        let mut context = Context::new();
        for path in &self.search_paths {
            context.add_search_path(path.clone());
        }
        let config_dir = env.config_path.as_ref().and_then(|p| p.parent()).map(PathBuf::from);
        if let Some(dir) = self.working_dir.clone().or(config_dir) {
            context.set_working_dir(dir);
        }
        for (name, value) in &self.environment {
            context.set(name.clone(), value.clone());
        }
        context
    }
}

fn unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> ColorResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.trim().to_ascii_lowercase()) {
            return Err(ColorError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Registry change reported to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A color space was added or replaced.
    ColorSpaceAdded(String),
    /// A color space was removed.
    ColorSpaceRemoved(String),
    /// A color space was renamed.
    ColorSpaceRenamed {
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },
    /// A role was set or unset.
    RoleChanged(String),
    /// A look was added or replaced.
    LookAdded(String),
    /// A look was removed.
    LookRemoved(String),
    /// A view was added or replaced.
    ViewAdded {
        /// Display name.
        display: String,
        /// View name.
        view: String,
    },
    /// A view was removed.
    ViewRemoved {
        /// Display name.
        display: String,
        /// View name.
        view: String,
    },
    /// A view transform was added, replaced or made the default.
    ViewTransformChanged(String),
    /// File rules were replaced.
    FileRulesChanged,
    /// Active or inactive lists were replaced.
    ActiveListsChanged,
    /// The default context was replaced.
    ContextChanged,
}

/// Handle returned by [`Config::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

struct State {
    def: ConfigDefinition,
    context: Context,
}

/// Shared color management registry.
///
/// `Config` is `Send + Sync`; wrap it in an `Arc` to share it between
/// threads. Processors come back as `Arc<Processor>` and stay valid after
/// the cache drops them.
pub struct Config {
    state: RwLock<State>,
    processors: ProcessorCache,
    files: FileCache,
    loader: Arc<dyn LutLoader>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    env: EnvOverrides,
    optimization: AtomicU32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Config")
            .field("name", &state.def.name)
            .field("colorspaces", &state.def.colorspaces.len())
            .field("displays", &state.def.displays.len())
            .field("cached_processors", &self.processors.len())
            .field("cached_files", &self.files.len())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Creates an empty configuration honoring the process environment.
    pub fn new() -> Self {
        Self::assemble(ConfigDefinition::default(), EnvOverrides::from_env())
    }

    /// Minimal configuration: a `Raw` data space, the `default` role and an
    /// `sRGB` display with a `Raw` view. The environment is ignored.
    pub fn raw() -> Self {
        let mut def = ConfigDefinition {
            name: "raw".into(),
            ..Default::default()
        };
        def.colorspaces.push(ColorSpace::builder("Raw").category("file-io").is_data(true).build());
        def.roles.define(crate::role::names::DEFAULT, "Raw");
        let mut display = Display::new("sRGB");
        display.add_view(View::new("Raw", "Raw"));
        def.displays.push(display);
        Self::assemble(def, EnvOverrides::default())
    }

    /// Config from a definition, honoring the process environment.
    ///
    /// Context variables declared in the definition take their values from
    /// the environment when set there.
    pub fn from_definition(def: ConfigDefinition) -> ColorResult<Self> {
        let config = Self::from_definition_with_env(def, EnvOverrides::from_env())?;
        config.write().context.load_environment(EnvironmentMode::LoadPredefined);
        Ok(config)
    }

    /// Config from a definition with explicit environment overrides.
    ///
    /// Fails if two entities of one kind share a name.
    pub fn from_definition_with_env(def: ConfigDefinition, env: EnvOverrides) -> ColorResult<Self> {
        def.duplicate_check()?;
        debug!(
            name = def.name,
            colorspaces = def.colorspaces.len(),
            displays = def.displays.len(),
            looks = def.looks.len(),
            "config loaded"
        );
        Ok(Self::assemble(def, env))
    }

    fn assemble(def: ConfigDefinition, env: EnvOverrides) -> Self {
        let cache_flags = if env.disable_all_caches || env.disable_processor_caches {
            ProcessorCacheFlags::OFF
        } else if env.disable_cache_fallback {
            ProcessorCacheFlags::ENABLED
        } else {
            ProcessorCacheFlags::DEFAULT
        };
        let optimization = env.optimization_flags.unwrap_or(OptimizationFlags::DEFAULT);
        let context = def.build_context(&env);
        Self {
            state: RwLock::new(State { def, context }),
            processors: ProcessorCache::new(cache_flags),
            files: FileCache::new(!env.disable_all_caches),
            loader: Arc::new(CubeLoader),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            env,
            optimization: AtomicU32::new(optimization.bits()),
        }
    }

    /// Replaces the LUT loader used by file transforms.
    pub fn with_loader(mut self, loader: Arc<dyn LutLoader>) -> Self {
        self.loader = loader;
        self.files.clear();
        self
    }

    /// Snapshot of the registry, with the current context defaults.
    pub fn to_definition(&self) -> ConfigDefinition {
        let state = self.read();
        let mut def = state.def.clone();
        def.search_paths = state.context.search_paths().to_vec();
        def.working_dir = state.context.working_dir().map(PathBuf::from);
        def.environment = state.context.vars().clone();
        def
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Config name.
    pub fn name(&self) -> String {
        self.read().def.name.clone()
    }

    /// Environment overrides read at construction.
    #[inline]
    pub fn env(&self) -> &EnvOverrides {
        &self.env
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Registers `listener` for registry changes.
    ///
    /// Listeners run on the mutating thread after the registry lock is
    /// released, so they may query the config.
    pub fn subscribe(&self, listener: impl Fn(&ConfigEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener; returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(i, _)| *i != id);
        listeners.len() != before
    }

    fn notify(&self, event: &ConfigEvent) {
        let listeners: Vec<Listener> = {
            let guard = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            guard.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        trace!(?event, listeners = listeners.len(), "notifying listeners");
        for listener in listeners {
            listener(event);
        }
    }

    /// Applies a structural change: the processor cache is cleared while
    /// the write lock is held, listeners run after it is released.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ConfigDefinition) -> ColorResult<(T, ConfigEvent)>,
    ) -> ColorResult<T> {
        let (value, event) = {
            let mut state = self.write();
            let out = f(&mut state.def)?;
            let evicted = self.processors.clear();
            debug!(event = ?out.1, evicted, "config changed");
            out
        };
        self.notify(&event);
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Adds a color space, replacing one with the same name.
    ///
    /// Fails if its name or an alias is taken by another color space.
    pub fn add_colorspace(&self, cs: ColorSpace) -> ColorResult<()> {
        if cs.name().trim().is_empty() {
            return Err(ColorError::invalid("color space name is empty"));
        }
        for t in cs.to_reference().into_iter().chain(cs.from_reference()) {
            t.validate()?;
        }
        self.mutate(|def| {
            let slot = def
                .colorspaces
                .iter()
                .position(|c| c.name().eq_ignore_ascii_case(cs.name()));
            let taken = |n: &str| {
                def.colorspaces
                    .iter()
                    .enumerate()
                    .any(|(i, c)| Some(i) != slot && c.matches_name(n))
            };
            let clash = std::iter::once(cs.name())
                .chain(cs.aliases().iter().map(String::as_str))
                .find(|&n| taken(n));
            if let Some(name) = clash {
                return Err(ColorError::DuplicateName {
                    kind: "color space",
                    name: name.to_string(),
                });
            }
            let name = cs.name().to_string();
            match slot {
                Some(i) => def.colorspaces[i] = cs,
                None => def.colorspaces.push(cs),
            }
            Ok(((), ConfigEvent::ColorSpaceAdded(name)))
        })
    }

    /// Removes a color space by name or alias and returns it.
    ///
    /// Roles and rules pointing at it are left alone; see [`Config::check`].
    pub fn remove_colorspace(&self, name: &str) -> ColorResult<ColorSpace> {
        self.mutate(|def| {
            let i = def
                .colorspaces
                .iter()
                .position(|c| c.matches_name(name))
                .ok_or_else(|| ColorError::ColorSpaceNotFound {
                    name: name.to_string(),
                })?;
            let cs = def.colorspaces.remove(i);
            let event = ConfigEvent::ColorSpaceRemoved(cs.name().to_string());
            Ok((cs, event))
        })
    }

    /// Renames a color space, updating roles, file rules and the inactive
    /// list. Views and transforms keep the old name.
    pub fn rename_colorspace(&self, from: &str, to: &str) -> ColorResult<()> {
        let to = to.trim();
        if to.is_empty() {
            return Err(ColorError::invalid("color space name is empty"));
        }
        self.mutate(|def| {
            let i = def
                .colorspaces
                .iter()
                .position(|c| c.matches_name(from))
                .ok_or_else(|| ColorError::ColorSpaceNotFound {
                    name: from.to_string(),
                })?;
            if def.colorspaces.iter().enumerate().any(|(j, c)| j != i && c.matches_name(to)) {
                return Err(ColorError::DuplicateName {
                    kind: "color space",
                    name: to.to_string(),
                });
            }
            let old = def.colorspaces[i].name().to_string();
            def.colorspaces[i].set_name(to);
            def.colorspaces[i].remove_alias(to);
            def.roles.rename_target(&old, to);
            def.file_rules.rename_target(&old, to);
            let inactive = def.inactive_colorspaces.iter_mut();
            for name in inactive.filter(|n| n.eq_ignore_ascii_case(&old)) {
                *name = to.to_string();
            }
            Ok(((), ConfigEvent::ColorSpaceRenamed {
                from: old,
                to: to.to_string(),
            }))
        })
    }

    /// Points `role` at a color space.
    pub fn set_role(&self, role: &str, colorspace: &str) -> ColorResult<()> {
        if role.trim().is_empty() {
            return Err(ColorError::invalid("role name is empty"));
        }
        self.mutate(|def| {
            def.roles.define(role, colorspace);
            Ok(((), ConfigEvent::RoleChanged(role.to_string())))
        })
    }

    /// Removes a role; returns the color space it pointed at.
    pub fn unset_role(&self, role: &str) -> ColorResult<String> {
        self.mutate(|def| {
            let target = def.roles.remove(role).ok_or_else(|| ColorError::RoleNotDefined {
                role: role.to_string(),
            })?;
            Ok((target, ConfigEvent::RoleChanged(role.to_string())))
        })
    }

    /// Adds a look, replacing one with the same name.
    pub fn add_look(&self, look: Look) -> ColorResult<()> {
        if look.name().trim().is_empty() {
            return Err(ColorError::invalid("look name is empty"));
        }
        for t in look.get_transform().into_iter().chain(look.get_inverse_transform()) {
            t.validate()?;
        }
        self.mutate(|def| {
            let name = look.name().to_string();
            match def.looks.iter_mut().find(|l| l.name().eq_ignore_ascii_case(&name)) {
                Some(slot) => *slot = look,
                None => def.looks.push(look),
            }
            Ok(((), ConfigEvent::LookAdded(name)))
        })
    }

    /// Removes a look.
    pub fn remove_look(&self, name: &str) -> ColorResult<Look> {
        self.mutate(|def| {
            let i = def
                .looks
                .iter()
                .position(|l| l.name().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ColorError::LookNotFound {
                    name: name.to_string(),
                })?;
            let look = def.looks.remove(i);
            let event = ConfigEvent::LookRemoved(look.name().to_string());
            Ok((look, event))
        })
    }

    /// Adds a view to `display`, creating the display if needed.
    pub fn add_display_view(&self, display: &str, view: View) -> ColorResult<()> {
        if display.trim().is_empty() || view.name().trim().is_empty() {
            return Err(ColorError::invalid("display and view names must not be empty"));
        }
        self.mutate(|def| {
            let event = ConfigEvent::ViewAdded {
                display: display.to_string(),
                view: view.name().to_string(),
            };
            match def.displays.iter_mut().find(|d| d.name().eq_ignore_ascii_case(display.trim())) {
                Some(d) => d.add_view(view),
                None => {
                    let mut d = Display::new(display.trim());
                    d.add_view(view);
                    def.displays.push(d);
                }
            }
            Ok(((), event))
        })
    }

    /// Removes a view; a display left without views is removed too.
    pub fn remove_display_view(&self, display: &str, view: &str) -> ColorResult<()> {
        self.mutate(|def| {
            let i = def
                .displays
                .iter()
                .position(|d| d.name().eq_ignore_ascii_case(display.trim()))
                .ok_or_else(|| ColorError::DisplayNotFound {
                    name: display.to_string(),
                })?;
            if !def.displays[i].remove_view(view) {
                return Err(ColorError::ViewNotFound {
                    display: display.to_string(),
                    view: view.to_string(),
                });
            }
            if def.displays[i].views().is_empty() {
                def.displays.remove(i);
            }
            Ok(((), ConfigEvent::ViewRemoved {
                display: display.to_string(),
                view: view.to_string(),
            }))
        })
    }

    /// Adds a view transform, replacing one with the same name.
    pub fn add_view_transform(&self, vt: ViewTransform) -> ColorResult<()> {
        if vt.name().trim().is_empty() {
            return Err(ColorError::invalid("view transform name is empty"));
        }
        for t in vt.from_reference().into_iter().chain(vt.to_reference()) {
            t.validate()?;
        }
        self.mutate(|def| {
            let name = vt.name().to_string();
            match def.view_transforms.iter_mut().find(|v| v.name().eq_ignore_ascii_case(&name)) {
                Some(slot) => *slot = vt,
                None => def.view_transforms.push(vt),
            }
            Ok(((), ConfigEvent::ViewTransformChanged(name)))
        })
    }

    /// Sets the view transform bridging reference spaces; `None` falls
    /// back to the first scene-referred one.
    pub fn set_default_view_transform(&self, name: Option<&str>) -> ColorResult<()> {
        self.mutate(|def| {
            if let Some(name) = name {
                if def.view_transform(name).is_none() {
                    return Err(ColorError::ViewTransformNotFound {
                        name: name.to_string(),
                    });
                }
            }
            def.default_view_transform = name.map(String::from);
            Ok(((), ConfigEvent::ViewTransformChanged(name.unwrap_or_default().to_string())))
        })
    }

    /// Replaces the file rules; they must pass [`FileRules::check`].
    pub fn set_file_rules(&self, rules: FileRules) -> ColorResult<()> {
        let problems = rules.check();
        if !problems.is_empty() {
            return Err(ColorError::Validation(problems.join("; ")));
        }
        self.mutate(|def| {
            def.file_rules = rules;
            Ok(((), ConfigEvent::FileRulesChanged))
        })
    }

    /// Replaces the active display list.
    pub fn set_active_displays(&self, displays: Vec<String>) -> ColorResult<()> {
        self.mutate(|def| {
            def.active_displays = displays;
            Ok(((), ConfigEvent::ActiveListsChanged))
        })
    }

    /// Replaces the active view list.
    pub fn set_active_views(&self, views: Vec<String>) -> ColorResult<()> {
        self.mutate(|def| {
            def.active_views = views;
            Ok(((), ConfigEvent::ActiveListsChanged))
        })
    }

    /// Replaces the inactive color space list.
    pub fn set_inactive_colorspaces(&self, names: Vec<String>) -> ColorResult<()> {
        self.mutate(|def| {
            def.inactive_colorspaces = names;
            Ok(((), ConfigEvent::ActiveListsChanged))
        })
    }

    /// Copy of the default context.
    pub fn context(&self) -> Context {
        self.read().context.clone()
    }

    /// Replaces the default context.
    ///
    /// Cached processors stay: each one is only reused while the variables
    /// it consulted keep their values.
    pub fn set_context(&self, context: Context) {
        self.write().context = context;
        self.notify(&ConfigEvent::ContextChanged);
    }

    // ------------------------------------------------------------------
    // Caches and flags
    // ------------------------------------------------------------------

    /// Drops every cached processor. Processors already handed out stay
    /// usable.
    pub fn clear_processor_cache(&self) {
        self.processors.clear();
    }

    /// Drops cached processors and decoded LUT files.
    pub fn clear_all_caches(&self) {
        self.processors.clear();
        self.files.clear();
    }

    /// Number of cached processor entries.
    pub fn cached_processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Current processor cache policy.
    pub fn processor_cache_flags(&self) -> ProcessorCacheFlags {
        self.processors.flags()
    }

    /// Sets the processor cache policy.
    pub fn set_processor_cache_flags(&self, flags: ProcessorCacheFlags) -> ColorResult<()> {
        self.processors.set_flags(flags)
    }

    /// Flags processors are optimized with.
    pub fn default_optimization_flags(&self) -> OptimizationFlags {
        OptimizationFlags::from_bits(self.optimization.load(Ordering::Acquire))
    }

    /// Sets the flags processors are optimized with.
    pub fn set_default_optimization_flags(&self, flags: OptimizationFlags) {
        self.optimization.store(flags.bits(), Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Processors
    // ------------------------------------------------------------------

    /// Processor converting `src` to `dst` (names, aliases or roles).
    pub fn processor(&self, src: &str, dst: &str) -> ColorResult<Arc<Processor>> {
        self.processor_with_direction(src, dst, TransformDirection::Forward)
    }

    /// Processor converting `src` to `dst` in `direction`.
    pub fn processor_with_direction(
        &self,
        src: &str,
        dst: &str,
        direction: TransformDirection,
    ) -> ColorResult<Arc<Processor>> {
        self.processor_for_transform(None, &Transform::colorspace(src, dst), direction)
    }

    /// Processor from `src` to a display's view, applying the view's looks.
    pub fn display_processor(
        &self,
        src: &str,
        display: &str,
        view: &str,
        direction: TransformDirection,
    ) -> ColorResult<Arc<Processor>> {
        let dv = DisplayViewTransform::new(src, display, view);
        self.processor_for_transform(None, &Transform::DisplayView(dv), direction)
    }

    /// Display processor applying `looks` in place of the view's own looks.
    pub fn display_processor_with_looks(
        &self,
        src: &str,
        display: &str,
        view: &str,
        looks: &str,
        direction: TransformDirection,
    ) -> ColorResult<Arc<Processor>> {
        let mut dv = DisplayViewTransform::new(src, display, view);
        dv.looks_bypass = true;
        let group = Transform::group(vec![
            Transform::look(src, src, looks),
            Transform::DisplayView(dv),
        ]);
        self.processor_for_transform(None, &group, direction)
    }

    /// Processor applying `looks` while converting `src` to `dst`.
    pub fn look_processor(
        &self,
        src: &str,
        dst: &str,
        looks: &str,
        direction: TransformDirection,
    ) -> ColorResult<Arc<Processor>> {
        self.processor_for_transform(None, &Transform::look(src, dst, looks), direction)
    }

    /// Processor for an arbitrary transform, resolved against `context`
    /// or the config's own.
    pub fn processor_for_transform(
        &self,
        context: Option<&Context>,
        transform: &Transform,
        direction: TransformDirection,
    ) -> ColorResult<Arc<Processor>> {
        transform.validate()?;
        let flags = self.default_optimization_flags();
        let key = fingerprint(transform, direction, flags);

        // Builds and stores run under the read lock so a mutation cannot
        // interleave and leave stale entries behind.
        let state = self.read();
        let context = context.unwrap_or(&state.context);
        if let Some(hit) = self.processors.get(&key, context) {
            return Ok(hit);
        }

        let built = Builder::new(&state.def, context, self.loader.as_ref(), &self.files)
            .build(transform, direction)?;
        let processor = Processor::new(built, flags);
        debug!(
            request = transform.kind_name(),
            ?direction,
            raw_ops = processor.raw_ops().len(),
            ops = processor.num_ops(),
            "processor built"
        );
        Ok(self.processors.insert(key, processor))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Color space by name, alias or role.
    pub fn colorspace(&self, name: &str) -> Option<ColorSpace> {
        self.read().def.resolve_colorspace(name).cloned()
    }

    fn inactive<'a>(&'a self, def: &'a ConfigDefinition) -> &'a [String] {
        self.env.inactive_colorspaces.as_deref().unwrap_or(&def.inactive_colorspaces)
    }

    /// Names of the active color spaces, in declaration order.
    pub fn colorspace_names(&self) -> Vec<String> {
        let state = self.read();
        let inactive = self.inactive(&state.def);
        state
            .def
            .colorspaces
            .iter()
            .filter(|cs| !inactive.iter().any(|n| cs.matches_name(n)))
            .map(|cs| cs.name().to_string())
            .collect()
    }

    /// Names of every color space, inactive ones included.
    pub fn all_colorspace_names(&self) -> Vec<String> {
        self.read().def.colorspaces.iter().map(|cs| cs.name().to_string()).collect()
    }

    /// Active color spaces in `category`.
    ///
    /// With user categories set, only spaces also carrying one of them are
    /// returned, unless that leaves nothing.
    pub fn colorspace_names_by_category(&self, category: &str) -> Vec<String> {
        let state = self.read();
        let inactive = self.inactive(&state.def);
        let matching: Vec<&ColorSpace> = state
            .def
            .colorspaces
            .iter()
            .filter(|cs| cs.has_category(category) && !inactive.iter().any(|n| cs.matches_name(n)))
            .collect();

        let user = self.env.user_categories.as_deref().unwrap_or_default();
        if !user.is_empty() {
            let narrowed: Vec<String> = matching
                .iter()
                .filter(|cs| user.iter().any(|u| cs.has_category(u)))
                .map(|cs| cs.name().to_string())
                .collect();
            if !narrowed.is_empty() {
                return narrowed;
            }
            warn!(category, ?user, "no color space matches the user categories, ignoring them");
        }
        matching.iter().map(|cs| cs.name().to_string()).collect()
    }

    /// True if any role, transform, look, view or file rule refers to the
    /// color space.
    pub fn is_colorspace_used(&self, name: &str) -> bool {
        let state = self.read();
        let def = &state.def;
        let Some(target) = def.resolve_colorspace(name) else {
            return false;
        };
        let is_target = |n: &str| {
            def.resolve_colorspace(n)
                .is_some_and(|cs| cs.name() == target.name())
        };

        if def.roles.iter().any(|(_, cs)| is_target(cs)) {
            return true;
        }

        let mut refs = Vec::new();
        for cs in def.colorspaces.iter().filter(|cs| cs.name() != target.name()) {
            cs.to_reference()
                .into_iter()
                .chain(cs.from_reference())
                .for_each(|t| collect_references(t, &mut refs));
        }
        for look in &def.looks {
            if look.get_process_space().is_some_and(is_target) {
                return true;
            }
            look.get_transform()
                .into_iter()
                .chain(look.get_inverse_transform())
                .for_each(|t| collect_references(t, &mut refs));
        }
        for vt in &def.view_transforms {
            vt.from_reference()
                .into_iter()
                .chain(vt.to_reference())
                .for_each(|t| collect_references(t, &mut refs));
        }
        if refs.iter().any(|r| matches!(r, Reference::ColorSpace(n) if is_target(n.as_str()))) {
            return true;
        }

        let in_views = def
            .displays
            .iter()
            .any(|d| d.views().iter().any(|v| is_target(v.resolved_colorspace(d.name()))));
        in_views || def.file_rules.rules().iter().any(|r| is_target(r.colorspace()))
    }

    /// Displays to offer, ordered by the active list when one is set.
    pub fn display_names(&self) -> Vec<String> {
        let state = self.read();
        let def = &state.def;
        let active = self.env.active_displays.as_deref().unwrap_or(&def.active_displays);
        if active.is_empty() {
            return def.displays.iter().map(|d| d.name().to_string()).collect();
        }
        active.iter().filter_map(|n| def.display(n)).map(|d| d.name().to_string()).collect()
    }

    /// Views of `display` to offer, ordered by the active list when one is
    /// set.
    pub fn view_names(&self, display: &str) -> Vec<String> {
        let state = self.read();
        let def = &state.def;
        let Some(d) = def.display(display) else {
            return Vec::new();
        };
        let active = self.env.active_views.as_deref().unwrap_or(&def.active_views);
        if active.is_empty() {
            return d.view_names().map(String::from).collect();
        }
        active.iter().filter_map(|n| d.view(n)).map(|v| v.name().to_string()).collect()
    }

    /// First display offered.
    pub fn default_display(&self) -> Option<String> {
        self.display_names().into_iter().next()
    }

    /// The display's default view if offered, else its first offered view.
    pub fn default_view(&self, display: &str) -> Option<String> {
        let views = self.view_names(display);
        let preferred = self
            .read()
            .def
            .display(display)
            .and_then(|d| d.default_view().map(String::from));
        match preferred {
            Some(p) if views.iter().any(|v| v.eq_ignore_ascii_case(&p)) => Some(p),
            _ => views.into_iter().next(),
        }
    }

    /// Color space assigned to `path` by the file rules, with the index of
    /// the matching rule. Roles are resolved to color space names.
    pub fn colorspace_from_filepath(&self, path: &str) -> Option<(String, usize)> {
        let state = self.read();
        let def = &state.def;
        let names: Vec<&str> = def.colorspaces.iter().map(ColorSpace::name).collect();
        let (assigned, index) = def.file_rules.colorspace_for(path, &names)?;
        let name = def.resolve_colorspace(&assigned).map_or(assigned, |cs| cs.name().to_string());
        trace!(path, colorspace = name, rule = index, "file rule matched");
        Some((name, index))
    }

    /// Every problem found in the registry.
    pub fn check(&self) -> Vec<Issue> {
        validate::check(&self.read().def)
    }

    /// Fails with a validation error listing every error-severity problem.
    pub fn validate(&self) -> ColorResult<()> {
        validate::validate(&self.read().def)
    }
}
