//! Owning scopes
//!
//! A [`LifetimeContainer`] is the scope a registration lives in. Lifetime
//! managers key per-scope values by its [`Scope`] id and hand it disposable
//! instances it must release on teardown.

use crate::value::Instance;
use crate::{ResolutionError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Unique scope identifier.
///
/// Each scope gets a unique ID for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// Generate a new unique scope ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Disposal list of one scope.
///
/// Instances are disposed in reverse order of addition, once.
pub struct LifetimeContainer {
    scope: Scope,
    items: Mutex<Vec<Instance>>,
    disposed: AtomicBool,
}

impl LifetimeContainer {
    #[inline]
    pub fn new() -> Self {
        let scope = Scope::new();

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            scope_id = scope.id(),
            "Creating lifetime container"
        );

        Self {
            scope,
            items: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Track an instance for disposal.
    pub fn add(&self, item: Instance) -> Result<()> {
        if self.is_disposed() {
            return Err(ResolutionError::Disposed {
                scope: self.scope.to_string(),
            });
        }
        self.items.lock().push(item);
        Ok(())
    }

    /// Stop tracking an instance without disposing it.
    pub fn remove(&self, item: &Instance) -> bool {
        let mut items = self.items.lock();
        match items.iter().position(|tracked| tracked.ptr_eq(item)) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, item: &Instance) -> bool {
        self.items.lock().iter().any(|tracked| tracked.ptr_eq(item))
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.items.lock().len()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose every tracked instance, newest first. Later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let items = std::mem::take(&mut *self.items.lock());

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            scope_id = self.scope.id(),
            count = items.len(),
            "Disposing lifetime container"
        );

        for item in items.iter().rev() {
            if let Some(disposer) = item.disposer() {
                disposer.dispose();
            }
        }
    }
}

impl Default for LifetimeContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifetimeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeContainer")
            .field("scope", &self.scope)
            .field("count", &self.count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
