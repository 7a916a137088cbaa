//! Policy sets
//!
//! Per-registration configuration (lifetime manager, selection mode, ...)
//! is attached through an opaque keyed store. The core only ever reads or
//! writes single keys; it never iterates a set.

use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Type-erased policy value
pub type Policy = Arc<dyn Any + Send + Sync>;

/// Keyed store of policies.
pub trait PolicySet: Send + Sync {
    fn get(&self, kind: TypeId) -> Option<Policy>;

    fn set(&self, kind: TypeId, policy: Policy);

    fn clear(&self, kind: TypeId);
}

/// Typed access to any [`PolicySet`].
pub trait PolicySetExt: PolicySet {
    /// Policy stored under its own type.
    fn get_policy<P: Any + Send + Sync>(&self) -> Option<Arc<P>> {
        self.get(TypeId::of::<P>())
            .and_then(|policy| policy.downcast::<P>().ok())
    }

    fn set_policy<P: Any + Send + Sync>(&self, policy: P) {
        self.set(TypeId::of::<P>(), Arc::new(policy));
    }

    fn clear_policy<P: Any + Send + Sync>(&self) {
        self.clear(TypeId::of::<P>());
    }
}

impl<T: PolicySet + ?Sized> PolicySetExt for T {}

/// Concurrent policy store with an optional parent for defaults.
///
/// Lookups fall through to the parent chain; writes and clears only touch
/// this level.
pub struct Policies {
    policies: DashMap<TypeId, Policy, RandomState>,
    parent: Option<Arc<Policies>>,
}

impl Policies {
    /// Create an empty set.
    ///
    /// A registration carries a handful of policies, so eight shards is
    /// plenty.
    #[inline]
    pub fn new() -> Self {
        Self {
            policies: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            parent: None,
        }
    }

    /// Create a set whose missing keys are read from `parent`.
    #[inline]
    pub fn with_parent(parent: Arc<Policies>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Whether this level (not the parent chain) holds `kind`.
    #[inline]
    pub fn contains_local(&self, kind: TypeId) -> bool {
        self.policies.contains_key(&kind)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySet for Policies {
    fn get(&self, kind: TypeId) -> Option<Policy> {
        if let Some(policy) = self.policies.get(&kind) {
            return Some(Arc::clone(&policy));
        }

        let mut current = self.parent.as_ref();
        while let Some(parent) = current {
            if let Some(policy) = parent.policies.get(&kind) {
                return Some(Arc::clone(&policy));
            }
            current = parent.parent.as_ref();
        }
        None
    }

    #[inline]
    fn set(&self, kind: TypeId, policy: Policy) {
        self.policies.insert(kind, policy);
    }

    #[inline]
    fn clear(&self, kind: TypeId) {
        self.policies.remove(&kind);
    }
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies")
            .field("count", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
