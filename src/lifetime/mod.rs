//! Lifetime managers
//!
//! A lifetime manager owns the cache slot of one registration and decides
//! whether a produced instance is reused. Reads return [`Cached`]: either
//! [`Cached::NoValue`] or a cached [`Value`], which may itself be a null.
//!
//! Slot states are `Unset → Set → Unset` (after `remove`). The synchronized
//! managers add a build lock so at most one thread constructs a value; see
//! [`sync`].

use crate::scope::{LifetimeContainer, Scope};
use crate::value::Resolve;
use crate::{ResolutionError, ResolveContext, Result, Value};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod managers;
pub mod sync;

pub use managers::*;
pub use sync::{
    BuildLock, DEFAULT_RESOLVE_TIMEOUT, ResolveTimeout, Synchronized, default_resolve_timeout,
    set_default_resolve_timeout,
};

#[cfg(feature = "logging")]
use tracing::debug;

/// Content of a lifetime slot.
///
/// `NoValue` is the unset marker and is distinct from a cached null,
/// `Value(None)`. Test with [`Cached::is_no_value`], never by comparing
/// values.
#[derive(Clone, Debug)]
pub enum Cached {
    /// Nothing cached
    NoValue,
    /// A cached value, possibly null
    Value(Value),
}

impl Cached {
    #[inline]
    pub fn is_no_value(&self) -> bool {
        matches!(self, Cached::NoValue)
    }

    #[inline]
    pub fn has_value(&self) -> bool {
        matches!(self, Cached::Value(_))
    }

    /// The cached value, if there is one.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Cached::NoValue => None,
            Cached::Value(value) => Some(value),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Cached::NoValue => None,
            Cached::Value(value) => Some(value),
        }
    }
}

impl From<Value> for Cached {
    fn from(value: Value) -> Self {
        Cached::Value(value)
    }
}

/// Same object, or both null.
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

/// Compiled resolution pipeline of a registration
pub type Pipeline = Arc<dyn Resolve>;

/// State every manager carries besides its slot: owning scope (write
/// once), pipeline (write once) and the in-use flag.
#[derive(Default)]
pub struct ManagerCore {
    scope: OnceCell<Scope>,
    pipeline: OnceCell<Pipeline>,
    in_use: AtomicBool,
}

impl ManagerCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh core carrying only the owning scope.
    pub fn clone_config(&self) -> Self {
        let core = Self::new();
        if let Some(scope) = self.scope.get() {
            let _ = core.scope.set(*scope);
        }
        core
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope.get().copied()
    }

    /// Assign the owning scope. Assigning the same scope again is a no-op.
    pub fn set_scope(&self, scope: Scope) -> Result<()> {
        match self.scope.try_insert(scope) {
            Ok(_) => Ok(()),
            Err((current, _)) if *current == scope => Ok(()),
            Err((current, _)) => Err(ResolutionError::ScopeAlreadySet {
                current: current.to_string(),
            }),
        }
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Ordering::Release);
    }

    /// Install the pipeline; returns `false` if one is already set.
    pub fn set_pipeline(&self, pipeline: Pipeline) -> bool {
        self.pipeline.set(pipeline).is_ok()
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.get().is_some()
    }

    /// Run the pipeline.
    pub fn run_pipeline(&self, context: &mut dyn ResolveContext) -> Result<Value> {
        self.pipeline
            .get()
            .ok_or(ResolutionError::UninitializedPipeline)?
            .resolve(context)
    }
}

impl fmt::Debug for ManagerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCore")
            .field("scope", &self.scope())
            .field("in_use", &self.in_use())
            .field("pipeline", &self.has_pipeline())
            .finish()
    }
}

/// Cache slot policy of one registration.
///
/// `scope` is the lifetime container of the resolution in progress; only
/// per-scope managers require one.
pub trait LifetimeManager: Send + Sync + fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Shared state: owning scope, pipeline and in-use flag.
    fn core(&self) -> &ManagerCore;

    /// Non-blocking read.
    fn try_get(&self, scope: Option<&LifetimeContainer>) -> Result<Cached>;

    /// Read for resolution. Synchronized managers take the build lock when
    /// nothing is cached.
    fn get(&self, scope: Option<&LifetimeContainer>) -> Result<Cached> {
        self.try_get(scope)
    }

    /// Store a value, ending any build in progress.
    fn set(&self, value: Value, scope: Option<&LifetimeContainer>) -> Result<()>;

    /// Forget the cached value without disposing it.
    fn remove(&self, scope: Option<&LifetimeContainer>) -> Result<()>;

    /// New, empty manager of the same kind and configuration.
    fn clone_policy(&self) -> Arc<dyn LifetimeManager>;

    /// Abandon a build started by `get`. Never fails.
    fn recover(&self) {}

    /// Tear down, disposing what the manager owns.
    fn dispose(&self) {}

    /// Drop and dispose whatever is held for `scope` alone. Called when a
    /// child container goes away while the registration lives on.
    fn release_scope(&self, _scope: &LifetimeContainer) {}

    fn in_use(&self) -> bool {
        self.core().in_use()
    }

    fn set_in_use(&self, in_use: bool) {
        self.core().set_in_use(in_use);
    }

    fn scope(&self) -> Option<Scope> {
        self.core().scope()
    }

    fn set_scope(&self, scope: Scope) -> Result<()> {
        let result = self.core().set_scope(scope);

        #[cfg(feature = "logging")]
        if result.is_ok() {
            debug!(
                target: "dependency_resolver",
                manager = self.name(),
                scope = %scope,
                "Lifetime manager bound to scope"
            );
        }

        result
    }

    fn set_pipeline(&self, pipeline: Pipeline) -> bool {
        self.core().set_pipeline(pipeline)
    }

    fn pipeline(&self, context: &mut dyn ResolveContext) -> Result<Value> {
        self.core().run_pipeline(context)
    }
}
