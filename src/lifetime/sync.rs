//! Build lock and synchronized slot core
//!
//! The first thread to `get` an empty synchronized slot takes the build
//! lock and keeps it until it either commits a value with `set` or gives
//! up with `recover`. Everyone else waiting in `get` blocks, bounded by a
//! [`ResolveTimeout`], and re-reads the slot once the lock is released.
//!
//! The lock is owned by a thread. Re-entering from the owning thread
//! returns immediately, and releasing is "if held by me": calling
//! `recover` from any other thread, or when nobody holds the lock, is a
//! no-op.

use super::Cached;
use crate::{ResolutionError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[cfg(feature = "logging")]
use tracing::{trace, warn};

/// Default bound on waiting for a build lock
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

const INFINITE: u64 = u64::MAX;

/// Nanoseconds, `INFINITE` meaning no bound.
static DEFAULT_TIMEOUT_NANOS: AtomicU64 = AtomicU64::new(DEFAULT_RESOLVE_TIMEOUT.as_nanos() as u64);

/// How long `get` waits for another thread's build to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveTimeout {
    /// Give up with `LockTimeout` after this long
    Bounded(Duration),
    /// Wait forever
    Infinite,
}

impl ResolveTimeout {
    fn to_nanos(self) -> u64 {
        match self {
            ResolveTimeout::Bounded(duration) => {
                u64::try_from(duration.as_nanos()).map_or(INFINITE - 1, |nanos| nanos.min(INFINITE - 1))
            }
            ResolveTimeout::Infinite => INFINITE,
        }
    }

    fn from_nanos(nanos: u64) -> Self {
        match nanos {
            INFINITE => ResolveTimeout::Infinite,
            nanos => ResolveTimeout::Bounded(Duration::from_nanos(nanos)),
        }
    }

    /// Bound as a duration, `None` when infinite.
    pub fn duration(self) -> Option<Duration> {
        match self {
            ResolveTimeout::Bounded(duration) => Some(duration),
            ResolveTimeout::Infinite => None,
        }
    }
}

impl Default for ResolveTimeout {
    fn default() -> Self {
        ResolveTimeout::Bounded(DEFAULT_RESOLVE_TIMEOUT)
    }
}

impl From<Duration> for ResolveTimeout {
    fn from(duration: Duration) -> Self {
        ResolveTimeout::Bounded(duration)
    }
}

/// Process-wide timeout copied by synchronized managers when they are
/// created.
pub fn default_resolve_timeout() -> ResolveTimeout {
    ResolveTimeout::from_nanos(DEFAULT_TIMEOUT_NANOS.load(Ordering::Relaxed))
}

/// Change the process-wide timeout. Existing managers keep theirs.
pub fn set_default_resolve_timeout(timeout: ResolveTimeout) {
    DEFAULT_TIMEOUT_NANOS.store(timeout.to_nanos(), Ordering::Relaxed);
}

/// Thread-owned lock guarding construction of one slot.
#[derive(Default)]
pub struct BuildLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl BuildLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for the current thread, waiting at most `timeout`.
    ///
    /// Returns immediately if the current thread already owns it.
    pub fn acquire(&self, timeout: ResolveTimeout) -> Result<()> {
        let me = thread::current().id();
        // A bound too large for `Instant` waits forever
        let deadline = timeout
            .duration()
            .and_then(|bound| Instant::now().checked_add(bound));
        let mut owner = self.owner.lock();

        loop {
            match *owner {
                None => {
                    *owner = Some(me);
                    #[cfg(feature = "logging")]
                    trace!(target: "dependency_resolver", "Build lock acquired");
                    return Ok(());
                }
                Some(current) if current == me => return Ok(()),
                Some(_) => {}
            }

            #[cfg(feature = "logging")]
            trace!(target: "dependency_resolver", "Waiting for build lock");

            match deadline {
                None => self.released.wait(&mut owner),
                Some(deadline) => {
                    if self.released.wait_until(&mut owner, deadline).timed_out()
                        && owner.is_some()
                    {
                        #[cfg(feature = "logging")]
                        warn!(
                            target: "dependency_resolver",
                            timeout = ?timeout,
                            "Timed out waiting for build lock"
                        );
                        return Err(ResolutionError::LockTimeout {
                            timeout: timeout.duration().unwrap_or_default(),
                        });
                    }
                }
            }
        }
    }

    /// Release the lock if the current thread holds it.
    pub fn release(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner != Some(me) {
            return false;
        }

        *owner = None;
        drop(owner);
        self.released.notify_one();
        true
    }

    /// Whether any thread holds the lock.
    pub fn is_held(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Whether the current thread holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Whether a thread other than the current one holds the lock.
    pub fn is_held_by_other(&self) -> bool {
        matches!(*self.owner.lock(), Some(owner) if owner != thread::current().id())
    }
}

impl std::fmt::Debug for BuildLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLock")
            .field("owner", &*self.owner.lock())
            .finish()
    }
}

/// Build lock plus timeout, shared by every synchronized manager.
///
/// The slot itself stays with the manager; reads are passed in as closures
/// so one core serves single-value and per-scope storage alike.
#[derive(Debug)]
pub struct Synchronized {
    lock: BuildLock,
    timeout: ResolveTimeout,
}

impl Synchronized {
    /// Core using the current process-wide timeout.
    pub fn new() -> Self {
        Self::with_timeout(default_resolve_timeout())
    }

    pub fn with_timeout(timeout: ResolveTimeout) -> Self {
        Self {
            lock: BuildLock::new(),
            timeout,
        }
    }

    #[inline]
    pub fn timeout(&self) -> ResolveTimeout {
        self.timeout
    }

    /// Peek without joining a build in progress.
    pub fn try_get(&self, read: impl FnOnce() -> Result<Cached>) -> Result<Cached> {
        if self.lock.is_held_by_other() {
            return Ok(Cached::NoValue);
        }
        read()
    }

    /// Read the slot, taking the build lock when it is empty.
    ///
    /// Returning [`Cached::NoValue`] leaves the caller holding the lock; it
    /// must follow up with a commit or [`recover`](Self::recover).
    pub fn get(&self, read: impl Fn() -> Result<Cached>) -> Result<Cached> {
        if !self.lock.is_held_by_current() {
            let cached = read()?;
            if cached.has_value() {
                return Ok(cached);
            }
        }

        self.lock.acquire(self.timeout)?;

        match read() {
            Ok(cached) if cached.has_value() => {
                self.lock.release();
                Ok(cached)
            }
            Ok(cached) => Ok(cached),
            Err(err) => {
                self.lock.release();
                Err(err)
            }
        }
    }

    /// Run a store and end the build, whether the store succeeded or not.
    pub fn commit(&self, store: impl FnOnce() -> Result<()>) -> Result<()> {
        let result = store();
        self.lock.release();
        result
    }

    /// Abandon a build without storing anything.
    pub fn recover(&self) {
        if self.lock.release() {
            #[cfg(feature = "logging")]
            trace!(target: "dependency_resolver", "Build lock released by recovery");
        }
    }

    /// Whether some thread is currently building.
    pub fn is_building(&self) -> bool {
        self.lock.is_held()
    }
}

impl Default for Synchronized {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Type;
    use crate::value::Instance;
    use parking_lot::RwLock;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier, mpsc};

    fn short() -> ResolveTimeout {
        ResolveTimeout::Bounded(Duration::from_millis(10))
    }

    #[test]
    fn test_lock_is_reentrant_for_owner() {
        let lock = BuildLock::new();
        lock.acquire(short()).unwrap();
        lock.acquire(short()).unwrap();
        assert!(lock.is_held_by_current());
        assert!(!lock.is_held_by_other());

        assert!(lock.release());
        assert!(!lock.is_held());
        assert!(!lock.release());
    }

    #[test]
    fn test_release_from_other_thread_is_noop() {
        let lock = Arc::new(BuildLock::new());
        lock.acquire(short()).unwrap();

        let other = Arc::clone(&lock);
        let released = thread::spawn(move || other.release()).join().unwrap();

        assert!(!released);
        assert!(lock.is_held_by_current());
        lock.release();
    }

    #[test]
    fn test_waiting_times_out() {
        let lock = Arc::new(BuildLock::new());
        lock.acquire(short()).unwrap();

        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.acquire(short())).join().unwrap();

        assert_eq!(
            result,
            Err(ResolutionError::LockTimeout {
                timeout: Duration::from_millis(10)
            })
        );
        assert!(result.unwrap_err().is_retryable());
        lock.release();
    }

    #[test]
    fn test_huge_bound_waits_instead_of_overflowing() {
        let lock = Arc::new(BuildLock::new());
        lock.acquire(short()).unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.acquire(ResolveTimeout::Bounded(Duration::MAX)).unwrap();
                lock.release()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(lock.release());
        assert!(waiter.join().unwrap());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_infinite_wait_outlasts_short_bound() {
        let slot = Arc::new(Slot::new(ResolveTimeout::Infinite));
        let (held_tx, held_rx) = mpsc::channel();
        let ty = Type::class("Slow");

        let builder = {
            let slot = Arc::clone(&slot);
            let ty = ty.clone();
            thread::spawn(move || {
                assert!(slot.get().unwrap().is_no_value());
                held_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(150));
                let instance = Instance::new(&ty, 1u8);
                slot.set(instance.clone()).unwrap();
                instance
            })
        };

        held_rx.recv().unwrap();
        let begin = Instant::now();
        let cached = slot.get().unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(50));

        let built = builder.join().unwrap();
        match cached {
            Cached::Value(Some(value)) => assert!(value.ptr_eq(&built)),
            other => panic!("expected committed value, got {other:?}"),
        }
        assert!(!slot.core.is_building());
    }

    #[test]
    fn test_managers_copy_default_timeout_at_creation() {
        let before = default_resolve_timeout();
        let changed = ResolveTimeout::Bounded(Duration::from_secs(90));

        let earlier = Synchronized::new();
        set_default_resolve_timeout(changed);
        let later = Synchronized::new();
        set_default_resolve_timeout(before);

        assert_eq!(later.timeout(), changed);
        assert_eq!(earlier.timeout(), before);
        assert_eq!(default_resolve_timeout(), before);
    }

    #[test]
    fn test_timeout_conversion() {
        assert_eq!(ResolveTimeout::default().duration(), Some(DEFAULT_RESOLVE_TIMEOUT));
        assert_eq!(ResolveTimeout::Infinite.duration(), None);
        assert_eq!(ResolveTimeout::from_nanos(INFINITE), ResolveTimeout::Infinite);
        assert_eq!(
            ResolveTimeout::from_nanos(short().to_nanos()),
            short()
        );
        assert_eq!(ResolveTimeout::from(Duration::from_secs(1)).duration(), Some(Duration::from_secs(1)));
    }

    /// Slot used to drive the core directly.
    struct Slot {
        core: Synchronized,
        value: RwLock<Cached>,
    }

    impl Slot {
        fn new(timeout: ResolveTimeout) -> Self {
            Self {
                core: Synchronized::with_timeout(timeout),
                value: RwLock::new(Cached::NoValue),
            }
        }

        fn get(&self) -> Result<Cached> {
            self.core.get(|| Ok(self.value.read().clone()))
        }

        fn try_get(&self) -> Result<Cached> {
            self.core.try_get(|| Ok(self.value.read().clone()))
        }

        fn set(&self, value: Instance) -> Result<()> {
            self.core.commit(|| {
                *self.value.write() = Cached::Value(Some(value));
                Ok(())
            })
        }
    }

    #[test]
    fn test_concurrent_get_constructs_once() {
        const THREADS: usize = 8;
        let slot = Arc::new(Slot::new(ResolveTimeout::Bounded(Duration::from_secs(5))));
        let constructed = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));
        let ty = Type::class("Singleton");

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let constructed = Arc::clone(&constructed);
                let barrier = Arc::clone(&barrier);
                let ty = ty.clone();
                thread::spawn(move || {
                    barrier.wait();
                    match slot.get().unwrap() {
                        Cached::NoValue => {
                            thread::sleep(Duration::from_millis(20));
                            constructed.fetch_add(1, Ordering::SeqCst);
                            let instance = Instance::new(&ty, 42u32);
                            slot.set(instance.clone()).unwrap();
                            instance
                        }
                        Cached::Value(value) => value.unwrap(),
                    }
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| i.ptr_eq(&instances[0])));
        assert!(!slot.core.is_building());
    }

    #[test]
    fn test_try_get_does_not_block_while_building() {
        let slot = Arc::new(Slot::new(ResolveTimeout::Bounded(Duration::from_secs(5))));
        let (started_tx, started_rx) = mpsc::channel();

        let builder = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                assert!(slot.get().unwrap().is_no_value());
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(200));
                slot.set(Instance::new(&Type::class("Slow"), ())).unwrap();
            })
        };

        started_rx.recv().unwrap();
        let begin = Instant::now();
        assert!(slot.try_get().unwrap().is_no_value());
        assert!(begin.elapsed() < Duration::from_millis(100));

        builder.join().unwrap();
        assert!(slot.try_get().unwrap().has_value());
    }

    #[test]
    fn test_recover_allows_retry() {
        let slot = Arc::new(Slot::new(ResolveTimeout::Bounded(Duration::from_secs(5))));

        // First attempt fails and recovers on another thread
        {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                assert!(slot.get().unwrap().is_no_value());
                slot.core.recover();
            })
            .join()
            .unwrap();
        }

        assert!(!slot.core.is_building());
        assert!(slot.get().unwrap().is_no_value());
        slot.set(Instance::new(&Type::class("Retry"), ())).unwrap();
        assert!(slot.get().unwrap().has_value());
    }

    #[test]
    fn test_waiting_get_times_out_while_build_stalls() {
        let slot = Arc::new(Slot::new(short()));
        let (held_tx, held_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let holder = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                assert!(slot.get().unwrap().is_no_value());
                held_tx.send(()).unwrap();
                done_rx.recv().unwrap();
                slot.core.recover();
            })
        };

        held_rx.recv().unwrap();
        let err = slot.get().unwrap_err();
        assert!(matches!(err, ResolutionError::LockTimeout { .. }));

        done_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn test_recover_without_lock_is_noop() {
        let core = Synchronized::with_timeout(short());
        core.recover();
        core.recover();
        assert!(!core.is_building());
    }

    #[test]
    fn test_commit_releases_even_on_error() {
        let core = Synchronized::with_timeout(short());
        assert!(core.get(|| Ok(Cached::NoValue)).unwrap().is_no_value());
        assert!(core.is_building());

        let result = core.commit(|| Err(ResolutionError::ValueMismatch { manager: "test" }));
        assert!(result.is_err());
        assert!(!core.is_building());
    }
}
