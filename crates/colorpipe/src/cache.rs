//! Thread-safe processor and LUT file caching.
//!
//! Processors are memoized by a SHA-256 fingerprint of the normalized
//! request. Each entry remembers the context variables its build consulted,
//! so a lookup only hits when the caller's context agrees on all of them.
//! With the fallback toggle on, processors whose optimized ops are identical
//! share one instance even when their requests differ.
//!
//! Evicting never invalidates an `Arc<Processor>` already handed out.

use std::collections::HashMap;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use crate::builder::{LoadedLut, LutLoader};
use crate::context::{Context, UsedVars};
use crate::error::{ColorError, ColorResult};
use crate::optimizer::OptimizationFlags;
use crate::processor::Processor;
use crate::transform::{Transform, TransformDirection};

/// Processor cache policy bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorCacheFlags(u32);

impl ProcessorCacheFlags {
    /// Every request rebuilds.
    pub const OFF: Self = Self(0);
    /// Memoize processors.
    pub const ENABLED: Self = Self(0x01);
    /// Share processors with identical content across requests.
    pub const FALLBACK: Self = Self(0x02);
    /// Enabled with fallback.
    pub const DEFAULT: Self = Self(Self::ENABLED.0 | Self::FALLBACK.0);

    const KNOWN: u32 = Self::ENABLED.0 | Self::FALLBACK.0;

    /// Wraps raw bits; see [`validate`](Self::validate).
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Fails for unknown bits and for fallback without the cache enabled.
    pub fn validate(self) -> ColorResult<()> {
        if self.0 & !Self::KNOWN != 0 {
            return Err(ColorError::CacheState {
                reason: format!("unknown cache flag bits {:#x}", self.0 & !Self::KNOWN),
            });
        }
        if self.contains(Self::FALLBACK) && !self.contains(Self::ENABLED) {
            return Err(ColorError::CacheState {
                reason: "fallback requires the cache to be enabled".into(),
            });
        }
        Ok(())
    }
}

impl Default for ProcessorCacheFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for ProcessorCacheFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Fingerprint of a processor request.
pub(crate) fn fingerprint(
    request: &Transform,
    direction: TransformDirection,
    flags: OptimizationFlags,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", request).as_bytes());
    hasher.update([direction as u8]);
    hasher.update(flags.bits().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
struct Entries {
    by_request: HashMap<String, Vec<(UsedVars, Arc<Processor>)>>,
    by_content: HashMap<String, Arc<Processor>>,
}

/// Memoized processors of one config.
#[derive(Debug)]
pub(crate) struct ProcessorCache {
    flags: AtomicU32,
    entries: RwLock<Entries>,
}

impl ProcessorCache {
    pub fn new(flags: ProcessorCacheFlags) -> Self {
        Self {
            flags: AtomicU32::new(flags.bits()),
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn flags(&self) -> ProcessorCacheFlags {
        ProcessorCacheFlags(self.flags.load(Ordering::Acquire))
    }

    /// Validates and installs `flags`; turning the cache off drops entries.
    pub fn set_flags(&self, flags: ProcessorCacheFlags) -> ColorResult<()> {
        flags.validate()?;
        self.flags.store(flags.bits(), Ordering::Release);
        if !flags.contains(ProcessorCacheFlags::ENABLED) {
            self.clear();
        }
        debug!(flags = flags.bits(), "processor cache flags set");
        Ok(())
    }

    /// Cached processor for `key` whose consulted variables agree with `context`.
    pub fn get(&self, key: &str, context: &Context) -> Option<Arc<Processor>> {
        if !self.flags().contains(ProcessorCacheFlags::ENABLED) {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let hit = entries
            .by_request
            .get(key)
            .and_then(|list| list.iter().find(|(used, _)| context.matches(used)))
            .map(|(_, p)| Arc::clone(p));
        trace!(key, hit = hit.is_some(), "processor cache lookup");
        hit
    }

    /// Stores a freshly built processor and returns the shared instance.
    ///
    /// If another thread stored an equivalent entry first, that one wins.
    pub fn insert(&self, key: String, processor: Processor) -> Arc<Processor> {
        let flags = self.flags();
        if !flags.contains(ProcessorCacheFlags::ENABLED) {
            return Arc::new(processor);
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Entries { by_request, by_content } = &mut *entries;

        let list = by_request.entry(key).or_default();
        if let Some((_, existing)) = list.iter().find(|(used, _)| used == processor.used_vars()) {
            return Arc::clone(existing);
        }

        let used = processor.used_vars().clone();
        let shared = if flags.contains(ProcessorCacheFlags::FALLBACK) {
            match by_content.get(processor.cache_id()) {
                Some(p) if p.used_vars() == &used => {
                    trace!(cache_id = processor.cache_id(), "processor shared by content");
                    Arc::clone(p)
                }
                _ => {
                    let p = Arc::new(processor);
                    by_content.insert(p.cache_id().to_string(), Arc::clone(&p));
                    p
                }
            }
        } else {
            Arc::new(processor)
        };
        list.push((used, Arc::clone(&shared)));
        shared
    }

    /// Drops every entry; returns how many requests were cached.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = entries.by_request.values().map(Vec::len).sum();
        entries.by_request.clear();
        entries.by_content.clear();
        if evicted > 0 {
            debug!(evicted, "processor cache cleared");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.by_request.values().map(Vec::len).sum()
    }
}

/// Decoded LUT files keyed by resolved path.
#[derive(Debug)]
pub(crate) struct FileCache {
    enabled: bool,
    entries: RwLock<HashMap<PathBuf, LoadedLut>>,
}

impl FileCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Decoded table for `path`, loading it on first use.
    ///
    /// Failures are not cached, so a fixed file loads on the next build.
    pub fn get_or_load(&self, path: &Path, loader: &dyn LutLoader) -> ColorResult<LoadedLut> {
        if self.enabled {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(lut) = entries.get(path) {
                trace!(path = %path.display(), "LUT file cache hit");
                return Ok(lut.clone());
            }
        }

        let lut = loader.load(path).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "LUT load failed");
        })?;
        debug!(path = %path.display(), "LUT file loaded");

        if self.enabled {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            return Ok(entries.entry(path.to_path_buf()).or_insert(lut).clone());
        }
        Ok(lut)
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
