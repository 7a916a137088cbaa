//! Concrete lifetime managers

use super::sync::{ResolveTimeout, Synchronized};
use super::{Cached, LifetimeManager, ManagerCore, same_value};
use crate::scope::{LifetimeContainer, Scope};
use crate::value::WeakInstance;
use crate::{ResolutionError, Result, Value};
use ahash::{AHashMap, RandomState};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

fn dispose_value(value: &Value) {
    if let Some(disposer) = value.as_ref().and_then(|instance| instance.disposer()) {
        disposer.dispose();
    }
}

fn shard_map<K: Eq + std::hash::Hash, V>() -> DashMap<K, V, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

// =============================================================================
// Transient
// =============================================================================

/// Never caches: every resolution builds a new instance.
#[derive(Debug, Default)]
pub struct TransientLifetimeManager {
    core: ManagerCore,
}

impl TransientLifetimeManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for TransientLifetimeManager {
    fn name(&self) -> &'static str {
        "Transient"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        Ok(Cached::NoValue)
    }

    fn set(&self, _value: Value, _scope: Option<&LifetimeContainer>) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _scope: Option<&LifetimeContainer>) -> Result<()> {
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self {
            core: self.core.clone_config(),
        })
    }
}

// =============================================================================
// Container controlled (singleton)
// =============================================================================

/// One value for the lifetime of the manager, built at most once.
///
/// The manager owns the value: `dispose` disposes it.
#[derive(Debug)]
pub struct ContainerControlledLifetimeManager {
    core: ManagerCore,
    sync: Synchronized,
    value: RwLock<Cached>,
    disposed: AtomicBool,
}

impl ContainerControlledLifetimeManager {
    pub fn new() -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::new())
    }

    pub fn with_timeout(timeout: impl Into<ResolveTimeout>) -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::with_timeout(timeout.into()))
    }

    fn with_core(core: ManagerCore, sync: Synchronized) -> Self {
        Self {
            core,
            sync,
            value: RwLock::new(Cached::NoValue),
            disposed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> Result<Cached> {
        Ok(self.value.read().clone())
    }
}

impl Default for ContainerControlledLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for ContainerControlledLifetimeManager {
    fn name(&self) -> &'static str {
        "ContainerControlled"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        self.sync.try_get(|| self.read())
    }

    fn get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        self.sync.get(|| self.read())
    }

    fn set(&self, value: Value, _scope: Option<&LifetimeContainer>) -> Result<()> {
        self.sync.commit(|| {
            let mut slot = self.value.write();
            // A build that finishes after `dispose` is not cached
            if self.disposed.load(Ordering::Acquire) {
                drop(slot);
                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    manager = self.name(),
                    "Disposing value set after manager was disposed"
                );
                dispose_value(&value);
                return Ok(());
            }

            if let Cached::Value(current) = &*slot {
                if !same_value(current, &value) {
                    return Err(ResolutionError::ValueMismatch {
                        manager: self.name(),
                    });
                }
            }

            #[cfg(feature = "logging")]
            trace!(target: "dependency_resolver", manager = self.name(), "Caching value");

            *slot = Cached::Value(value);
            Ok(())
        })
    }

    fn remove(&self, _scope: Option<&LifetimeContainer>) -> Result<()> {
        *self.value.write() = Cached::NoValue;
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::with_core(
            self.core.clone_config(),
            Synchronized::with_timeout(self.sync.timeout()),
        ))
    }

    fn recover(&self) {
        self.sync.recover();
    }

    fn dispose(&self) {
        let cached = {
            let mut slot = self.value.write();
            self.disposed.store(true, Ordering::Release);
            std::mem::replace(&mut *slot, Cached::NoValue)
        };
        self.sync.recover();

        if let Cached::Value(value) = cached {
            #[cfg(feature = "logging")]
            debug!(target: "dependency_resolver", manager = self.name(), "Disposing cached value");

            dispose_value(&value);
        }
    }
}

// =============================================================================
// Hierarchical (per scope)
// =============================================================================

/// One value per owning [`LifetimeContainer`].
///
/// Every call needs a scope; without one the manager reports
/// [`ResolutionError::MissingScope`].
#[derive(Debug)]
pub struct HierarchicalLifetimeManager {
    core: ManagerCore,
    sync: Synchronized,
    values: DashMap<Scope, Value, RandomState>,
}

impl HierarchicalLifetimeManager {
    pub fn new() -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::new())
    }

    pub fn with_timeout(timeout: impl Into<ResolveTimeout>) -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::with_timeout(timeout.into()))
    }

    fn with_core(core: ManagerCore, sync: Synchronized) -> Self {
        Self {
            core,
            sync,
            values: shard_map(),
        }
    }

    fn key(&self, scope: Option<&LifetimeContainer>) -> Result<Scope> {
        scope
            .map(LifetimeContainer::scope)
            .ok_or(ResolutionError::MissingScope {
                manager: self.name(),
            })
    }

    fn read(&self, key: Scope) -> Result<Cached> {
        Ok(self
            .values
            .get(&key)
            .map_or(Cached::NoValue, |value| Cached::Value(value.clone())))
    }

    /// Number of scopes holding a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for HierarchicalLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for HierarchicalLifetimeManager {
    fn name(&self) -> &'static str {
        "Hierarchical"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, scope: Option<&LifetimeContainer>) -> Result<Cached> {
        let key = self.key(scope)?;
        self.sync.try_get(|| self.read(key))
    }

    fn get(&self, scope: Option<&LifetimeContainer>) -> Result<Cached> {
        let key = self.key(scope)?;
        self.sync.get(|| self.read(key))
    }

    fn set(&self, value: Value, scope: Option<&LifetimeContainer>) -> Result<()> {
        self.sync.commit(|| {
            let key = self.key(scope)?;
            let mut entry = self.values.entry(key).or_insert_with(|| value.clone());
            if !same_value(&entry, &value) {
                return Err(ResolutionError::ValueMismatch {
                    manager: self.name(),
                });
            }
            *entry = value;

            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_resolver",
                manager = self.name(),
                scope = %key,
                "Caching value for scope"
            );

            Ok(())
        })
    }

    fn remove(&self, scope: Option<&LifetimeContainer>) -> Result<()> {
        let key = self.key(scope)?;
        self.values.remove(&key);
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::with_core(
            self.core.clone_config(),
            Synchronized::with_timeout(self.sync.timeout()),
        ))
    }

    fn recover(&self) {
        self.sync.recover();
    }

    fn dispose(&self) {
        self.sync.recover();

        let keys: Vec<Scope> = self.values.iter().map(|entry| *entry.key()).collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            manager = self.name(),
            count = keys.len(),
            "Disposing per-scope values"
        );

        for key in keys {
            if let Some((_, value)) = self.values.remove(&key) {
                dispose_value(&value);
            }
        }
    }

    fn release_scope(&self, scope: &LifetimeContainer) {
        if let Some((_, value)) = self.values.remove(&scope.scope()) {
            #[cfg(feature = "logging")]
            debug!(
                target: "dependency_resolver",
                manager = self.name(),
                scope = %scope.scope(),
                "Releasing value of disposed scope"
            );

            dispose_value(&value);
        }
    }
}

// =============================================================================
// Externally controlled (weak)
// =============================================================================

enum WeakSlot {
    Empty,
    Null,
    Weak(WeakInstance),
}

impl WeakSlot {
    fn load(&self) -> Cached {
        match self {
            WeakSlot::Empty => Cached::NoValue,
            WeakSlot::Null => Cached::Value(None),
            WeakSlot::Weak(weak) => weak
                .upgrade()
                .map_or(Cached::NoValue, |instance| Cached::Value(Some(instance))),
        }
    }
}

impl fmt::Debug for WeakSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeakSlot::Empty => f.write_str("Empty"),
            WeakSlot::Null => f.write_str("Null"),
            WeakSlot::Weak(weak) => write!(f, "Weak(alive: {})", weak.upgrade().is_some()),
        }
    }
}

/// Holds only a weak reference; the value lives as long as someone else
/// keeps it. Never disposes the value.
#[derive(Debug)]
pub struct ExternallyControlledLifetimeManager {
    core: ManagerCore,
    sync: Synchronized,
    value: RwLock<WeakSlot>,
}

impl ExternallyControlledLifetimeManager {
    pub fn new() -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::new())
    }

    pub fn with_timeout(timeout: impl Into<ResolveTimeout>) -> Self {
        Self::with_core(ManagerCore::new(), Synchronized::with_timeout(timeout.into()))
    }

    fn with_core(core: ManagerCore, sync: Synchronized) -> Self {
        Self {
            core,
            sync,
            value: RwLock::new(WeakSlot::Empty),
        }
    }

    fn read(&self) -> Result<Cached> {
        Ok(self.value.read().load())
    }
}

impl Default for ExternallyControlledLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for ExternallyControlledLifetimeManager {
    fn name(&self) -> &'static str {
        "ExternallyControlled"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        self.sync.try_get(|| self.read())
    }

    fn get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        self.sync.get(|| self.read())
    }

    fn set(&self, value: Value, _scope: Option<&LifetimeContainer>) -> Result<()> {
        self.sync.commit(|| {
            let mut slot = self.value.write();
            // A collected value no longer blocks a new one
            if let Cached::Value(current) = slot.load() {
                if !same_value(&current, &value) {
                    return Err(ResolutionError::ValueMismatch {
                        manager: self.name(),
                    });
                }
            }

            *slot = match &value {
                None => WeakSlot::Null,
                Some(instance) => WeakSlot::Weak(instance.downgrade()),
            };
            Ok(())
        })
    }

    fn remove(&self, _scope: Option<&LifetimeContainer>) -> Result<()> {
        *self.value.write() = WeakSlot::Empty;
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::with_core(
            self.core.clone_config(),
            Synchronized::with_timeout(self.sync.timeout()),
        ))
    }

    fn recover(&self) {
        self.sync.recover();
    }

    fn dispose(&self) {
        self.sync.recover();
        *self.value.write() = WeakSlot::Empty;
    }
}

// =============================================================================
// Per thread
// =============================================================================

static NEXT_PER_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Values cached by per-thread managers on this thread, keyed by manager
    /// id. Dropped with the thread.
    static PER_THREAD_VALUES: RefCell<AHashMap<u64, Value>> = RefCell::new(AHashMap::new());
}

/// One value per calling thread. Threads never see each other's values.
///
/// Values live in thread-local storage, so a thread's value is released
/// when that thread exits.
#[derive(Debug)]
pub struct PerThreadLifetimeManager {
    core: ManagerCore,
    id: u64,
}

impl PerThreadLifetimeManager {
    pub fn new() -> Self {
        Self::with_core(ManagerCore::new())
    }

    fn with_core(core: ManagerCore) -> Self {
        Self {
            core,
            id: NEXT_PER_THREAD_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Take this manager's value out of the current thread's slots.
    ///
    /// The value is dropped by the caller, outside the slot borrow.
    fn take_current(&self) -> Option<Value> {
        PER_THREAD_VALUES
            .try_with(|values| values.borrow_mut().remove(&self.id))
            .ok()
            .flatten()
    }
}

impl Default for PerThreadLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PerThreadLifetimeManager {
    fn drop(&mut self) {
        // Other threads release theirs when they exit
        drop(self.take_current());
    }
}

impl LifetimeManager for PerThreadLifetimeManager {
    fn name(&self) -> &'static str {
        "PerThread"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        Ok(PER_THREAD_VALUES
            .try_with(|values| {
                values
                    .borrow()
                    .get(&self.id)
                    .map_or(Cached::NoValue, |value| Cached::Value(value.clone()))
            })
            .unwrap_or(Cached::NoValue))
    }

    fn set(&self, value: Value, _scope: Option<&LifetimeContainer>) -> Result<()> {
        let previous = PER_THREAD_VALUES
            .try_with(|values| values.borrow_mut().insert(self.id, value))
            .ok()
            .flatten();
        drop(previous);
        Ok(())
    }

    fn remove(&self, _scope: Option<&LifetimeContainer>) -> Result<()> {
        drop(self.take_current());
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self::with_core(self.core.clone_config()))
    }
}

// =============================================================================
// Container controlled transient
// =============================================================================

/// Never caches, but hands disposable instances to the scope so they are
/// disposed with it.
///
/// The manager may be shared freely, so `in_use` always reads `false`.
#[derive(Debug, Default)]
pub struct ContainerControlledTransientManager {
    core: ManagerCore,
}

impl ContainerControlledTransientManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for ContainerControlledTransientManager {
    fn name(&self) -> &'static str {
        "ContainerControlledTransient"
    }

    fn core(&self) -> &ManagerCore {
        &self.core
    }

    fn try_get(&self, _scope: Option<&LifetimeContainer>) -> Result<Cached> {
        Ok(Cached::NoValue)
    }

    fn set(&self, value: Value, scope: Option<&LifetimeContainer>) -> Result<()> {
        let (Some(instance), Some(scope)) = (value, scope) else {
            return Ok(());
        };
        if instance.disposer().is_none() || scope.contains(&instance) {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            manager = self.name(),
            scope = %scope.scope(),
            "Tracking transient for disposal"
        );

        scope.add(instance)
    }

    fn remove(&self, _scope: Option<&LifetimeContainer>) -> Result<()> {
        Ok(())
    }

    fn clone_policy(&self) -> Arc<dyn LifetimeManager> {
        Arc::new(Self {
            core: self.core.clone_config(),
        })
    }

    fn in_use(&self) -> bool {
        false
    }

    fn set_in_use(&self, _in_use: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Type;
    use crate::value::{Disposable, Instance};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeDisposable {
        disposed: AtomicBool,
    }

    impl Disposable for FakeDisposable {
        fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
        }
    }

    fn disposable() -> (Instance, Arc<FakeDisposable>) {
        let instance = Instance::disposable(&Type::class("FakeDisposable"), FakeDisposable::default());
        let handle = instance.downcast::<FakeDisposable>().unwrap();
        (instance, handle)
    }

    fn object() -> Instance {
        Instance::new(&Type::object(), ())
    }

    fn short() -> ResolveTimeout {
        ResolveTimeout::Bounded(Duration::from_millis(50))
    }

    fn assert_same(cached: Cached, expected: &Instance) {
        match cached {
            Cached::Value(Some(actual)) => assert!(actual.ptr_eq(expected)),
            other => panic!("expected cached instance, got {other:?}"),
        }
    }

    fn caching_managers() -> Vec<Arc<dyn LifetimeManager>> {
        vec![
            Arc::new(ContainerControlledLifetimeManager::with_timeout(short())),
            Arc::new(HierarchicalLifetimeManager::with_timeout(short())),
            Arc::new(ExternallyControlledLifetimeManager::with_timeout(short())),
            Arc::new(PerThreadLifetimeManager::new()),
        ]
    }

    #[test]
    fn test_get_set_round_trip() {
        for manager in caching_managers() {
            let scope = LifetimeContainer::new();
            let value = object();

            assert!(manager.try_get(Some(&scope)).unwrap().is_no_value());
            assert!(manager.get(Some(&scope)).unwrap().is_no_value());
            assert!(manager.get(Some(&scope)).unwrap().is_no_value());

            manager.set(Some(value.clone()), Some(&scope)).unwrap();

            assert_same(manager.try_get(Some(&scope)).unwrap(), &value);
            assert_same(manager.get(Some(&scope)).unwrap(), &value);
        }
    }

    #[test]
    fn test_set_same_value_twice() {
        for manager in caching_managers() {
            let scope = LifetimeContainer::new();
            let value = object();

            manager.set(Some(value.clone()), Some(&scope)).unwrap();
            manager.set(Some(value.clone()), Some(&scope)).unwrap();
            assert_same(manager.get(Some(&scope)).unwrap(), &value);
        }
    }

    #[test]
    fn test_cached_null_is_a_value() {
        let manager = ContainerControlledLifetimeManager::new();
        manager.set(None, None).unwrap();

        let cached = manager.try_get(None).unwrap();
        assert!(cached.has_value());
        assert!(matches!(cached, Cached::Value(None)));
    }

    #[test]
    fn test_remove_returns_to_unset() {
        for manager in caching_managers() {
            let scope = LifetimeContainer::new();
            let value = object();

            manager.set(Some(value.clone()), Some(&scope)).unwrap();
            manager.remove(Some(&scope)).unwrap();
            assert!(manager.try_get(Some(&scope)).unwrap().is_no_value());

            // A different value may be stored after removal
            let replacement = object();
            manager.set(Some(replacement.clone()), Some(&scope)).unwrap();
            assert!(manager.try_get(Some(&scope)).unwrap().has_value());
        }
    }

    #[test]
    fn test_singleton_rejects_different_value() {
        let manager = ContainerControlledLifetimeManager::with_timeout(short());
        manager.set(Some(object()), None).unwrap();

        let err = manager.set(Some(object()), None).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::ValueMismatch {
                manager: "ContainerControlled"
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_singleton_value_is_shared_across_threads() {
        let manager = Arc::new(ContainerControlledLifetimeManager::with_timeout(short()));
        let value = object();
        manager.set(Some(value.clone()), None).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || (manager.try_get(None).unwrap(), manager.get(None).unwrap()))
            })
            .collect();

        for handle in handles {
            let (peeked, got) = handle.join().unwrap();
            assert_same(peeked, &value);
            assert_same(got, &value);
        }
    }

    #[test]
    fn test_singleton_dispose_disposes_value() {
        let manager = ContainerControlledLifetimeManager::new();
        let (instance, handle) = disposable();
        manager.set(Some(instance), None).unwrap();
        assert!(!handle.disposed.load(Ordering::SeqCst));

        manager.dispose();

        assert!(handle.disposed.load(Ordering::SeqCst));
        assert!(manager.try_get(None).unwrap().is_no_value());
        manager.dispose();
    }

    #[test]
    fn test_singleton_build_finishing_after_dispose_is_disposed() {
        let manager = Arc::new(ContainerControlledLifetimeManager::with_timeout(short()));
        let (building_tx, building_rx) = mpsc::channel();
        let (disposed_tx, disposed_rx) = mpsc::channel::<()>();
        let (instance, handle) = disposable();

        let builder = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                assert!(manager.get(None).unwrap().is_no_value());
                building_tx.send(()).unwrap();
                disposed_rx.recv().unwrap();
                manager.set(Some(instance), None).unwrap();
            })
        };

        building_rx.recv().unwrap();
        manager.dispose();
        disposed_tx.send(()).unwrap();
        builder.join().unwrap();

        assert!(handle.disposed.load(Ordering::SeqCst));
        assert!(manager.try_get(None).unwrap().is_no_value());
    }

    #[test]
    fn test_dispose_unused_manager_is_noop() {
        for manager in caching_managers() {
            manager.dispose();
            manager.recover();
        }
    }

    #[test]
    fn test_clone_policy_is_empty_and_keeps_scope() {
        let manager = ContainerControlledLifetimeManager::with_timeout(short());
        let owner = Scope::new();
        manager.set_scope(owner).unwrap();
        manager.set(Some(object()), None).unwrap();

        let clone = manager.clone_policy();

        assert_eq!(clone.name(), manager.name());
        assert_eq!(clone.scope(), Some(owner));
        assert!(clone.try_get(None).unwrap().is_no_value());
        assert!(!clone.in_use());
    }

    #[test]
    fn test_in_use_flag() {
        for manager in caching_managers() {
            assert!(!manager.in_use());
            manager.set_in_use(true);
            assert!(manager.in_use());
        }
    }

    #[test]
    fn test_hierarchical_requires_scope() {
        let manager = HierarchicalLifetimeManager::with_timeout(short());
        let missing = ResolutionError::MissingScope {
            manager: "Hierarchical",
        };

        assert_eq!(manager.try_get(None).unwrap_err(), missing);
        assert_eq!(manager.get(None).unwrap_err(), missing);
        assert_eq!(manager.set(Some(object()), None).unwrap_err(), missing);
        assert_eq!(manager.remove(None).unwrap_err(), missing);
    }

    #[test]
    fn test_hierarchical_values_are_per_scope() {
        let manager = HierarchicalLifetimeManager::with_timeout(short());
        let scope = LifetimeContainer::new();
        let other = LifetimeContainer::new();
        let first = object();
        let second = object();

        manager.set(Some(first.clone()), Some(&scope)).unwrap();
        assert!(manager.try_get(Some(&other)).unwrap().is_no_value());
        assert!(manager.get(Some(&other)).unwrap().is_no_value());

        manager.set(Some(second.clone()), Some(&other)).unwrap();
        assert_same(manager.get(Some(&scope)).unwrap(), &first);
        assert_same(manager.get(Some(&other)).unwrap(), &second);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_hierarchical_dispose_disposes_every_scope() {
        let manager = HierarchicalLifetimeManager::new();
        let (a, a_handle) = disposable();
        let (b, b_handle) = disposable();
        manager.set(Some(a), Some(&LifetimeContainer::new())).unwrap();
        manager.set(Some(b), Some(&LifetimeContainer::new())).unwrap();

        manager.dispose();

        assert!(a_handle.disposed.load(Ordering::SeqCst));
        assert!(b_handle.disposed.load(Ordering::SeqCst));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_hierarchical_release_scope_disposes_only_that_scope() {
        let manager = HierarchicalLifetimeManager::with_timeout(short());
        let child = LifetimeContainer::new();
        let sibling = LifetimeContainer::new();
        let (a, a_handle) = disposable();
        let (b, b_handle) = disposable();
        manager.set(Some(a), Some(&child)).unwrap();
        manager.set(Some(b), Some(&sibling)).unwrap();

        manager.release_scope(&child);

        assert!(a_handle.disposed.load(Ordering::SeqCst));
        assert!(!b_handle.disposed.load(Ordering::SeqCst));
        assert!(manager.try_get(Some(&child)).unwrap().is_no_value());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_externally_controlled_shares_across_scopes() {
        let manager = ExternallyControlledLifetimeManager::with_timeout(short());
        let value = object();
        manager.set(Some(value.clone()), Some(&LifetimeContainer::new())).unwrap();

        let other = LifetimeContainer::new();
        assert_same(manager.try_get(Some(&other)).unwrap(), &value);
        assert_same(manager.get(Some(&other)).unwrap(), &value);
    }

    #[test]
    fn test_externally_controlled_does_not_keep_value_alive() {
        let manager = ExternallyControlledLifetimeManager::with_timeout(short());
        manager.set(Some(object()), None).unwrap();

        // Nothing else holds the value, so it is already gone
        assert!(manager.try_get(None).unwrap().is_no_value());

        // and a fresh value may take its place
        let value = object();
        manager.set(Some(value.clone()), None).unwrap();
        assert_same(manager.try_get(None).unwrap(), &value);
    }

    #[test]
    fn test_externally_controlled_dispose_leaves_value_alone() {
        let manager = ExternallyControlledLifetimeManager::new();
        let (instance, handle) = disposable();
        manager.set(Some(instance.clone()), None).unwrap();

        manager.dispose();

        assert!(!handle.disposed.load(Ordering::SeqCst));
        assert!(manager.try_get(None).unwrap().is_no_value());
    }

    #[test]
    fn test_per_thread_values_are_isolated() {
        let manager = Arc::new(PerThreadLifetimeManager::new());
        let mine = object();
        manager.set(Some(mine.clone()), None).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    assert!(manager.try_get(None).unwrap().is_no_value());
                    assert!(manager.get(None).unwrap().is_no_value());

                    let own = object();
                    manager.set(Some(own.clone()), None).unwrap();
                    assert_same(manager.get(None).unwrap(), &own);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_same(manager.get(None).unwrap(), &mine);
    }

    #[test]
    fn test_per_thread_value_released_when_thread_exits() {
        let manager = Arc::new(PerThreadLifetimeManager::new());
        let payload = Arc::new(7u32);
        let instance = Instance::from_arc(&Type::object(), Arc::clone(&payload));

        for _ in 0..50 {
            let manager = Arc::clone(&manager);
            let instance = instance.clone();
            thread::spawn(move || manager.set(Some(instance), None).unwrap())
                .join()
                .unwrap();
        }

        // Only `payload` and `instance` are left
        assert_eq!(Arc::strong_count(&payload), 2);
        assert!(manager.try_get(None).unwrap().is_no_value());
    }

    #[test]
    fn test_per_thread_managers_do_not_share_slots() {
        let first = PerThreadLifetimeManager::new();
        let second = PerThreadLifetimeManager::new();
        let payload = Arc::new(7u32);
        let value = Instance::from_arc(&Type::object(), Arc::clone(&payload));

        first.set(Some(value), None).unwrap();
        assert!(second.try_get(None).unwrap().is_no_value());

        let copy = first.clone_policy();
        assert!(copy.try_get(None).unwrap().is_no_value());

        drop(first);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_transient_never_caches() {
        let manager = TransientLifetimeManager::new();
        manager.set(Some(object()), None).unwrap();

        assert!(manager.try_get(None).unwrap().is_no_value());
        assert!(manager.get(None).unwrap().is_no_value());
        assert_eq!(manager.clone_policy().name(), "Transient");
    }

    #[test]
    fn test_container_transient_never_caches() {
        let manager = ContainerControlledTransientManager::new();
        let scope = LifetimeContainer::new();
        manager.set(Some(object()), Some(&scope)).unwrap();

        assert!(manager.try_get(Some(&scope)).unwrap().is_no_value());
        assert!(manager.get(Some(&scope)).unwrap().is_no_value());
        assert!(manager.get(None).unwrap().is_no_value());
        // Non-disposable values are not tracked
        assert_eq!(scope.count(), 0);
    }

    #[test]
    fn test_container_transient_tracks_disposable_once() {
        let manager = ContainerControlledTransientManager::new();
        let scope = LifetimeContainer::new();
        let (instance, handle) = disposable();

        manager.set(Some(instance.clone()), None).unwrap();
        manager.set(Some(instance.clone()), Some(&scope)).unwrap();
        manager.set(Some(instance), Some(&scope)).unwrap();
        assert_eq!(scope.count(), 1);

        scope.dispose();
        assert!(handle.disposed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_container_transient_is_never_in_use() {
        let manager = ContainerControlledTransientManager::new();
        assert!(!manager.in_use());
        manager.set_in_use(true);
        assert!(!manager.in_use());
    }

    #[test]
    fn test_debug_output_names_manager() {
        for manager in caching_managers() {
            let debug = format!("{manager:?}");
            assert!(debug.contains("LifetimeManager"));
        }
    }
}
