#![no_main]

//! Fuzz target for container resolution
//!
//! Builds a random dependency graph over a handful of types, registers it
//! with random lifetimes and resolves every node with random overrides.
//! Resolution may fail, but it must terminate and never panic.

use arbitrary::Arbitrary;
use dependency_resolver::{
    Container, Contract, InjectionValue, Instance, Lifetime, Member, MetadataRegistry,
    Registration, ResolutionError, ResolverOverride, ResolverSettings, Type,
};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Duration;

const NODES: usize = 6;

#[derive(Debug, Arbitrary)]
enum LifetimeChoice {
    Transient,
    Singleton,
    Hierarchical,
    PerThread,
    ContainerTransient,
}

#[derive(Debug, Arbitrary)]
struct Node {
    dependencies: Vec<u8>,
    lifetime: LifetimeChoice,
    registered: bool,
}

#[derive(Debug, Arbitrary)]
struct Input {
    nodes: [Node; NODES],
    overrides: Vec<(u8, u8)>,
    validating: bool,
    child: bool,
}

fuzz_target!(|input: Input| {
    let types: Vec<Type> = (0..NODES).map(|i| Type::class(format!("Node{i}"))).collect();
    let metadata = Arc::new(MetadataRegistry::new());

    for (index, node) in input.nodes.iter().enumerate() {
        let mut ctor = Member::constructor(&types[index]);
        for (position, dependency) in node.dependencies.iter().take(4).enumerate() {
            ctor = ctor.param(format!("p{position}"), &types[*dependency as usize % NODES]);
        }
        let ty = types[index].clone();
        metadata.add(ctor.constructs(move |_| Ok(Instance::new(&ty, ()))).build());
    }

    let mut settings = ResolverSettings::new().timeout(Duration::from_millis(10));
    if input.validating {
        settings = settings.validating();
    }
    let root = Container::with_settings(metadata, settings);

    for (index, node) in input.nodes.iter().enumerate() {
        if !node.registered {
            continue;
        }
        let lifetime = match node.lifetime {
            LifetimeChoice::Transient => Lifetime::Transient,
            LifetimeChoice::Singleton => Lifetime::Singleton,
            LifetimeChoice::Hierarchical => Lifetime::Hierarchical,
            LifetimeChoice::PerThread => Lifetime::PerThread,
            LifetimeChoice::ContainerTransient => Lifetime::ContainerTransient,
        };
        assert!(root.register(Registration::new(&types[index]).lifetime(lifetime)).is_ok());
    }

    let overrides: Vec<ResolverOverride> = input
        .overrides
        .iter()
        .take(4)
        .map(|(param, node)| {
            let ty = &types[*node as usize % NODES];
            ResolverOverride::parameter(
                &format!("p{}", param % 4),
                InjectionValue::Instance(Instance::new(ty, ())),
            )
        })
        .collect();

    let container = if input.child { root.scope() } else { root.clone() };
    for (index, ty) in types.iter().enumerate() {
        let result = container.resolve_contract(&Contract::new(ty), &overrides);
        match result {
            Ok(value) => assert!(value.is_some()),
            Err(ResolutionError::NotRegistered { .. })
            | Err(ResolutionError::CircularDependency { .. }) => {}
            Err(err) => {
                // Only a missing or cyclic graph can fail here
                panic!("node {index} failed: {err}");
            }
        }
    }

    container.dispose();
    root.dispose();
});
