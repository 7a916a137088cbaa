#![no_main]

//! Fuzz target for lifetime managers
//!
//! Drives every manager kind through random get/set/remove/recover/dispose
//! sequences across a few scopes and checks the slot stays consistent.

use arbitrary::Arbitrary;
use dependency_resolver::{
    Cached, ContainerControlledLifetimeManager, ContainerControlledTransientManager,
    ExternallyControlledLifetimeManager, HierarchicalLifetimeManager, Instance,
    LifetimeContainer, LifetimeManager, PerThreadLifetimeManager, ResolutionError,
    TransientLifetimeManager, Type, Value,
};
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

#[derive(Debug, Arbitrary)]
enum ManagerKind {
    Transient,
    Singleton,
    Hierarchical,
    External,
    PerThread,
    ContainerTransient,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Get { scope: u8 },
    TryGet { scope: u8 },
    Set { scope: u8, value: u8, null: bool },
    SetSame { scope: u8 },
    Remove { scope: u8 },
    Recover,
    DisposeScope { scope: u8 },
    Clone,
}

#[derive(Debug, Arbitrary)]
struct Input {
    kind: ManagerKind,
    ops: Vec<Op>,
}

const SCOPES: usize = 3;

fn manager(kind: &ManagerKind) -> Box<dyn LifetimeManager> {
    let timeout = Duration::from_millis(1);
    match kind {
        ManagerKind::Transient => Box::new(TransientLifetimeManager::new()),
        ManagerKind::Singleton => Box::new(ContainerControlledLifetimeManager::with_timeout(timeout)),
        ManagerKind::Hierarchical => Box::new(HierarchicalLifetimeManager::with_timeout(timeout)),
        ManagerKind::External => Box::new(ExternallyControlledLifetimeManager::with_timeout(timeout)),
        ManagerKind::PerThread => Box::new(PerThreadLifetimeManager::new()),
        ManagerKind::ContainerTransient => Box::new(ContainerControlledTransientManager::new()),
    }
}

fuzz_target!(|input: Input| {
    let ty = Type::class("Fuzzed");
    let manager = manager(&input.kind);
    let scopes: Vec<LifetimeContainer> = (0..SCOPES).map(|_| LifetimeContainer::new()).collect();
    // Keeps weakly held values alive
    let mut held: Vec<Value> = Vec::new();

    for op in input.ops.into_iter().take(64) {
        match op {
            Op::Get { scope } => {
                let scope = &scopes[scope as usize % SCOPES];
                if let Ok(Cached::NoValue) = manager.get(Some(scope)) {
                    manager.recover();
                }
            }
            Op::TryGet { scope } => {
                let _ = manager.try_get(Some(&scopes[scope as usize % SCOPES]));
            }
            Op::Set { scope, value, null } => {
                let scope = &scopes[scope as usize % SCOPES];
                let value: Value = (!null).then(|| Instance::new(&ty, value));
                let before = manager.try_get(Some(scope));
                match manager.set(value.clone(), Some(scope)) {
                    Ok(()) => {
                        held.push(value);
                    }
                    Err(ResolutionError::ValueMismatch { .. }) => {
                        // Only an occupied slot refuses a different value
                        assert!(matches!(before, Ok(Cached::Value(_))));
                    }
                    Err(ResolutionError::Disposed { .. }) => assert!(scope.is_disposed()),
                    Err(_) => {}
                }
            }
            Op::SetSame { scope } => {
                let scope = &scopes[scope as usize % SCOPES];
                if let Ok(Cached::Value(current)) = manager.try_get(Some(scope)) {
                    assert!(manager.set(current, Some(scope)).is_ok());
                }
            }
            Op::Remove { scope } => {
                let scope = &scopes[scope as usize % SCOPES];
                if manager.remove(Some(scope)).is_ok() {
                    assert!(matches!(manager.try_get(Some(scope)), Ok(Cached::NoValue)));
                }
            }
            Op::Recover => manager.recover(),
            Op::DisposeScope { scope } => scopes[scope as usize % SCOPES].dispose(),
            Op::Clone => {
                let copy = manager.clone_policy();
                assert_eq!(copy.name(), manager.name());
                assert!(matches!(copy.try_get(Some(&scopes[0])), Ok(Cached::NoValue)));
            }
        }
    }

    manager.dispose();
    drop(held);
});
