//! Resolution driver
//!
//! The `Container` ties the core together: registrations keyed by
//! [`Contract`], a lifetime manager and policy set per registration, and a
//! [`LifetimeContainer`] that owns what the container must dispose.
//!
//! Resolving a contract runs the same steps for every registration:
//!
//! 1. ask the lifetime manager for a cached value,
//! 2. select the constructor (configured, or the longest eligible one),
//! 3. resolve each parameter, letting resolver overrides take precedence,
//! 4. invoke the constructor,
//! 5. inject configured fields, properties and methods,
//! 6. store the value in the manager, or `recover` it when anything failed.

use crate::config::ResolverSettings;
use crate::injection::{InjectionInfo, InjectionMember};
use crate::lifetime::{
    Cached, ContainerControlledLifetimeManager, ContainerControlledTransientManager,
    ExternallyControlledLifetimeManager, HierarchicalLifetimeManager, LifetimeManager,
    PerThreadLifetimeManager, TransientLifetimeManager,
};
use crate::member::{InjectionTarget, Member, MemberKind};
use crate::metadata::TypeMetadata;
use crate::overrides::{OverrideSite, ResolverOverride, select_override};
use crate::policy::{Policies, PolicySetExt};
use crate::scope::LifetimeContainer;
use crate::selection::{self, SelectionMode};
use crate::value::{Instance, Resolve};
use crate::{Contract, ResolutionError, ResolveContext, Result, Type, Value};
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Registration
// =============================================================================

/// Lifetime manager attached to a registration's policy set.
#[derive(Clone)]
pub struct LifetimePolicy(pub Arc<dyn LifetimeManager>);

impl fmt::Debug for LifetimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LifetimePolicy({})", self.0.name())
    }
}

/// Which lifetime manager a registration gets.
///
/// Synchronized kinds are created with the container's lock timeout.
#[derive(Clone, Default)]
pub enum Lifetime {
    /// New instance on every resolve
    #[default]
    Transient,
    /// One instance per container
    Singleton,
    /// One instance per (child) container resolving it
    Hierarchical,
    /// One instance per thread
    PerThread,
    /// Weakly held; the caller keeps it alive
    External,
    /// New instance on every resolve, disposed with the container
    ContainerTransient,
    /// Caller-supplied manager
    Custom(Arc<dyn LifetimeManager>),
}

impl Lifetime {
    fn manager(&self, settings: &ResolverSettings) -> Arc<dyn LifetimeManager> {
        let timeout = settings.lock_timeout;
        match self {
            Lifetime::Transient => Arc::new(TransientLifetimeManager::new()),
            Lifetime::Singleton => Arc::new(ContainerControlledLifetimeManager::with_timeout(timeout)),
            Lifetime::Hierarchical => Arc::new(HierarchicalLifetimeManager::with_timeout(timeout)),
            Lifetime::PerThread => Arc::new(PerThreadLifetimeManager::new()),
            Lifetime::External => Arc::new(ExternallyControlledLifetimeManager::with_timeout(timeout)),
            Lifetime::ContainerTransient => Arc::new(ContainerControlledTransientManager::new()),
            Lifetime::Custom(manager) => Arc::clone(manager),
        }
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => f.write_str("Transient"),
            Lifetime::Singleton => f.write_str("Singleton"),
            Lifetime::Hierarchical => f.write_str("Hierarchical"),
            Lifetime::PerThread => f.write_str("PerThread"),
            Lifetime::External => f.write_str("External"),
            Lifetime::ContainerTransient => f.write_str("ContainerTransient"),
            Lifetime::Custom(manager) => write!(f, "Custom({})", manager.name()),
        }
    }
}

/// Where a registration's values come from
#[derive(Clone)]
enum Source {
    /// Construct the implementation type
    Type(Type),
    /// Run the manager's pipeline
    Factory(Arc<dyn Resolve>),
    /// Hand out a fixed value
    Instance(Value),
}

/// Description of one registration, consumed by [`Container::register`].
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Container, Lifetime, Member, MetadataRegistry, Registration, Type};
/// use dependency_resolver::value::Instance;
/// use std::sync::Arc;
///
/// let logger = Type::interface("ILogger");
/// let console = Type::builder("ConsoleLogger").extends(&logger).build();
///
/// let registry = Arc::new(MetadataRegistry::new());
/// let ctor_ty = console.clone();
/// registry.add(
///     Member::constructor(&console)
///         .constructs(move |_| Ok(Instance::new(&ctor_ty, ())))
///         .build(),
/// );
///
/// let container = Container::new(registry);
/// container
///     .register(Registration::new(&logger).to(&console).lifetime(Lifetime::Singleton))
///     .unwrap();
///
/// let a = container.resolve(&logger).unwrap().unwrap();
/// let b = container.resolve(&logger).unwrap().unwrap();
/// assert!(a.ptr_eq(&b));
/// assert_eq!(a.ty(), &console);
/// ```
pub struct Registration {
    contract_type: Type,
    name: Option<String>,
    source: Source,
    lifetime: Option<Lifetime>,
    members: Vec<InjectionMember>,
    selection: Option<SelectionMode>,
}

impl Registration {
    /// Register `ty`, constructed as itself.
    pub fn new(ty: &Type) -> Self {
        Self {
            contract_type: ty.clone(),
            name: None,
            source: Source::Type(ty.clone()),
            lifetime: None,
            members: Vec::new(),
            selection: None,
        }
    }

    /// Register a fixed instance, held as a singleton unless another
    /// lifetime is given.
    pub fn instance(ty: &Type, instance: Instance) -> Self {
        Self {
            source: Source::Instance(Some(instance)),
            lifetime: Some(Lifetime::Singleton),
            ..Self::new(ty)
        }
    }

    /// Register a factory; it becomes the lifetime manager's pipeline.
    pub fn factory<F>(ty: &Type, factory: F) -> Self
    where
        F: Fn(&mut dyn ResolveContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            source: Source::Factory(Arc::new(factory)),
            ..Self::new(ty)
        }
    }

    /// Construct `implementation` for this contract.
    pub fn to(mut self, implementation: &Type) -> Self {
        self.source = Source::Type(implementation.clone());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Use a specific manager instance.
    pub fn manager(self, manager: Arc<dyn LifetimeManager>) -> Self {
        self.lifetime(Lifetime::Custom(manager))
    }

    /// Add a configured constructor, method, field or property.
    pub fn inject(mut self, member: InjectionMember) -> Self {
        self.members.push(member);
        self
    }

    /// Selection mode for this registration's members.
    pub fn selection(mut self, mode: SelectionMode) -> Self {
        self.selection = Some(mode);
        self
    }

    fn contract(&self) -> Contract {
        match &self.name {
            Some(name) => Contract::named(&self.contract_type, name),
            None => Contract::new(&self.contract_type),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("contract", &self.contract())
            .field("lifetime", &self.lifetime)
            .field("members", &self.members)
            .finish()
    }
}

/// A stored registration
struct Entry {
    contract: Contract,
    source: Source,
    members: Arc<[InjectionMember]>,
    policies: Policies,
}

impl Entry {
    fn manager(&self) -> Result<Arc<dyn LifetimeManager>> {
        self.policies
            .get_policy::<LifetimePolicy>()
            .map(|policy| Arc::clone(&policy.0))
            .ok_or_else(|| {
                ResolutionError::invalid_member(
                    self.contract.ty().name(),
                    "registration",
                    "no lifetime manager",
                )
            })
    }

    fn constructor(&self) -> Option<&InjectionMember> {
        self.members
            .iter()
            .find(|member| member.kind() == MemberKind::Constructor)
    }
}

// =============================================================================
// Container
// =============================================================================

fn entry_map() -> DashMap<Contract, Arc<Entry>, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

struct Inner {
    registrations: DashMap<Contract, Arc<Entry>, RandomState>,
    /// Closed generic contracts served by an open registration of this
    /// container
    closed: DashMap<Contract, Arc<Entry>, RandomState>,
    parent: Option<Container>,
    metadata: Arc<dyn TypeMetadata>,
    settings: ResolverSettings,
    defaults: Arc<Policies>,
    lifetime: LifetimeContainer,
    depth: u32,
}

/// Registrations plus the scope that owns their values.
///
/// Cloning is cheap and shares the same registrations. Child containers
/// created with [`scope`](Self::scope) see their parent's registrations and
/// own a separate [`LifetimeContainer`].
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Root container with default settings.
    pub fn new(metadata: Arc<dyn TypeMetadata>) -> Self {
        Self::with_settings(metadata, ResolverSettings::default())
    }

    pub fn with_settings(metadata: Arc<dyn TypeMetadata>, settings: ResolverSettings) -> Self {
        let defaults = Policies::new();
        defaults.set_policy(settings.selection);

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            depth = 0,
            selection = ?settings.selection,
            lock_timeout = ?settings.lock_timeout,
            "Creating root container"
        );

        Self {
            inner: Arc::new(Inner {
                registrations: entry_map(),
                closed: entry_map(),
                parent: None,
                metadata,
                settings,
                defaults: Arc::new(defaults),
                lifetime: LifetimeContainer::new(),
                depth: 0,
            }),
        }
    }

    /// Child container inheriting registrations and settings.
    pub fn scope(&self) -> Self {
        let depth = self.inner.depth + 1;

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            parent_depth = self.inner.depth,
            child_depth = depth,
            "Creating child container"
        );

        Self {
            inner: Arc::new(Inner {
                registrations: entry_map(),
                closed: entry_map(),
                parent: Some(self.clone()),
                metadata: Arc::clone(&self.inner.metadata),
                settings: self.inner.settings,
                defaults: Arc::new(Policies::with_parent(Arc::clone(&self.inner.defaults))),
                lifetime: LifetimeContainer::new(),
                depth,
            }),
        }
    }

    /// Policies every registration of this container falls back to.
    pub fn policies(&self) -> &Policies {
        &self.inner.defaults
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.inner.settings
    }

    /// Scope owning this container's disposable values.
    pub fn lifetime_container(&self) -> &LifetimeContainer {
        &self.inner.lifetime
    }

    /// Nesting depth, 0 for the root.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Add or replace a registration.
    ///
    /// Configured members are bound here, so selection and eligibility
    /// errors surface at registration rather than at first resolve.
    pub fn register(&self, registration: Registration) -> Result<()> {
        if self.inner.lifetime.is_disposed() {
            return Err(ResolutionError::Disposed {
                scope: self.inner.lifetime.scope().to_string(),
            });
        }

        let contract = registration.contract();
        let Registration {
            contract_type,
            source,
            lifetime,
            members,
            selection,
            ..
        } = registration;

        let policies = Policies::with_parent(Arc::clone(&self.inner.defaults));
        if let Some(mode) = selection {
            policies.set_policy(mode);
        }
        let mode = policies
            .get_policy::<SelectionMode>()
            .map_or(self.inner.settings.selection, |mode| *mode);

        if let Source::Type(implementation) = &source {
            if contract_type.is_generic_definition() && implementation != &contract_type {
                return Err(ResolutionError::invalid_member(
                    implementation.name(),
                    "registration",
                    format!(
                        "open generic '{}' can only be registered as itself",
                        contract_type.name()
                    ),
                ));
            }
            if !contract_type.is_assignable_from(implementation) {
                return Err(ResolutionError::invalid_member(
                    implementation.name(),
                    "registration",
                    format!("type cannot be assigned to '{}'", contract_type.name()),
                ));
            }
            for member in &members {
                member.bind(&*self.inner.metadata, implementation, mode)?;
            }
        }

        let manager = match &lifetime {
            Some(lifetime) => lifetime.manager(&self.inner.settings),
            None => match self.inner.defaults.get_policy::<LifetimePolicy>() {
                Some(default) => default.0.clone_policy(),
                None => Lifetime::Transient.manager(&self.inner.settings),
            },
        };

        if manager.in_use() {
            return Err(ResolutionError::SharedConfiguration {
                member: format!("lifetime manager '{}'", manager.name()),
                bound: "another registration".to_string(),
                requested: contract.to_string(),
            });
        }
        manager.set_scope(self.inner.lifetime.scope())?;

        match &source {
            Source::Factory(factory) => {
                manager.set_pipeline(Arc::clone(factory));
            }
            Source::Instance(value) => {
                manager.set(value.clone(), Some(&self.inner.lifetime))?;
            }
            Source::Type(_) => {}
        }
        manager.set_in_use(true);

        policies.set_policy(LifetimePolicy(Arc::clone(&manager)));

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            contract = %contract,
            lifetime = manager.name(),
            members = members.len(),
            depth = self.inner.depth,
            "Registering contract"
        );

        let entry = Arc::new(Entry {
            contract: contract.clone(),
            source,
            members: members.into(),
            policies,
        });

        if contract.ty().is_generic_definition() {
            self.inner
                .closed
                .retain(|closed, _| closed.generic_type_definition().as_ref() != Some(&contract));
        }
        if let Some(previous) = self.inner.registrations.insert(contract, entry) {
            if let Ok(manager) = previous.manager() {
                manager.set_in_use(false);
            }
        }
        Ok(())
    }

    /// Register `instance` under the unnamed contract of `ty`.
    pub fn register_instance(&self, ty: &Type, instance: Instance) -> Result<()> {
        self.register(Registration::instance(ty, instance))
    }

    /// Register a factory for the unnamed contract of `ty`.
    pub fn register_factory<F>(&self, ty: &Type, lifetime: Lifetime, factory: F) -> Result<()>
    where
        F: Fn(&mut dyn ResolveContext) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(Registration::factory(ty, factory).lifetime(lifetime))
    }

    /// Whether `contract` is registered here or in a parent.
    pub fn contains(&self, contract: &Contract) -> bool {
        self.lookup(contract).is_some()
    }

    /// Registrations of this container, not counting parents.
    pub fn len(&self) -> usize {
        self.inner.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registrations.is_empty()
    }

    /// Contracts registered in this container.
    pub fn registered_contracts(&self) -> Vec<Contract> {
        self.inner
            .registrations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Registration for `contract` and the container holding it.
    fn lookup(&self, contract: &Contract) -> Option<(&Container, Arc<Entry>)> {
        let mut current = Some(self);
        while let Some(container) = current {
            if let Some(entry) = container.inner.registrations.get(contract) {
                return Some((container, Arc::clone(&entry)));
            }
            current = container.inner.parent.as_ref();
        }
        None
    }

    /// Registration for `contract`, falling back to the open generic
    /// definition of a closed generic contract.
    fn find(&self, contract: &Contract) -> Result<Arc<Entry>> {
        if let Some((_, entry)) = self.lookup(contract) {
            return Ok(entry);
        }

        let not_registered = || ResolutionError::NotRegistered {
            contract: contract.to_string(),
        };
        let definition = contract
            .generic_type_definition()
            .filter(|definition| definition != contract)
            .ok_or_else(not_registered)?;
        let (owner, open) = self.lookup(&definition).ok_or_else(not_registered)?;
        owner.closed_entry(contract, &open).ok_or_else(not_registered)
    }

    /// Registration serving `contract` from the open registration `open`.
    ///
    /// Created once per closed contract with a fresh copy of the open
    /// registration's lifetime manager, so every closed type caches its own
    /// value. Instance registrations cannot serve closed types.
    fn closed_entry(&self, contract: &Contract, open: &Entry) -> Option<Arc<Entry>> {
        if let Some(entry) = self.inner.closed.get(contract) {
            return Some(Arc::clone(&entry));
        }

        let source = match &open.source {
            Source::Type(_) => Source::Type(contract.ty().clone()),
            Source::Factory(factory) => Source::Factory(Arc::clone(factory)),
            Source::Instance(_) => return None,
        };

        let manager = open.manager().ok()?.clone_policy();
        manager.set_scope(self.inner.lifetime.scope()).ok()?;
        if let Source::Factory(factory) = &source {
            manager.set_pipeline(Arc::clone(factory));
        }
        manager.set_in_use(true);

        let policies = Policies::with_parent(Arc::clone(&self.inner.defaults));
        if let Some(mode) = open.policies.get_policy::<SelectionMode>() {
            policies.set_policy(*mode);
        }
        policies.set_policy(LifetimePolicy(manager));

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            contract = %contract,
            definition = %open.contract,
            depth = self.inner.depth,
            "Closing open generic registration"
        );

        let entry = Arc::new(Entry {
            contract: contract.clone(),
            source,
            members: Arc::clone(&open.members),
            policies,
        });
        let stored = Arc::clone(self.inner.closed.entry(contract.clone()).or_insert(entry).value());
        Some(stored)
    }

    /// Managers of this container's own and closed generic registrations.
    fn managers(&self) -> Vec<Arc<dyn LifetimeManager>> {
        self.inner
            .registrations
            .iter()
            .chain(self.inner.closed.iter())
            .filter_map(|entry| entry.value().manager().ok())
            .collect()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve the unnamed contract of `ty`.
    pub fn resolve(&self, ty: &Type) -> Result<Value> {
        self.resolve_contract(&Contract::new(ty), &[])
    }

    /// Resolve the contract `(ty, name)`.
    pub fn resolve_named(&self, ty: &Type, name: &str) -> Result<Value> {
        self.resolve_contract(&Contract::named(ty, name), &[])
    }

    /// Resolve `contract`, applying `overrides` anywhere in the graph.
    pub fn resolve_contract(
        &self,
        contract: &Contract,
        overrides: &[ResolverOverride],
    ) -> Result<Value> {
        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            contract = %contract,
            overrides = overrides.len(),
            depth = self.inner.depth,
            "Resolving contract"
        );

        let mut context = ContainerContext {
            container: self,
            root: contract.clone(),
            overrides,
            stack: Vec::new(),
        };
        context.resolve_contract(contract)
    }

    fn resolve_entry(&self, context: &mut ContainerContext<'_>, entry: &Entry) -> Result<Value> {
        let manager = entry.manager()?;
        let scope = Some(&self.inner.lifetime);

        if let Cached::Value(value) = manager.get(scope)? {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_resolver",
                contract = %context.contract(),
                lifetime = manager.name(),
                "Resolved from lifetime manager"
            );
            return Ok(value);
        }

        let built = match &entry.source {
            Source::Type(implementation) => self.build(context, entry, implementation),
            Source::Factory(_) => manager.pipeline(context),
            Source::Instance(value) => Ok(value.clone()),
        };

        match built {
            Ok(value) => {
                manager.set(value.clone(), scope)?;
                Ok(value)
            }
            Err(err) => {
                manager.recover();
                Err(err)
            }
        }
    }

    fn build(
        &self,
        context: &mut ContainerContext<'_>,
        entry: &Entry,
        implementation: &Type,
    ) -> Result<Value> {
        let metadata = &*self.inner.metadata;

        let (constructor, infos) = match entry.constructor() {
            Some(configured) => {
                let member = configured.member_info(metadata, implementation)?;
                let infos = configured.parameter_infos(&member);
                (member, infos)
            }
            None => {
                let member = selection::select_default_constructor(metadata, implementation)?;
                let infos = member
                    .parameters()
                    .iter()
                    .map(|parameter| InjectionInfo::new(parameter.ty(), implementation))
                    .collect();
                (member, infos)
            }
        };

        let arguments = resolve_arguments(context, &constructor, &infos)?;
        let instance = constructor.invoke(None, &arguments)?.ok_or_else(|| {
            ResolutionError::invocation_failed(constructor.signature(), "constructor returned null")
        })?;

        for configured in entry.members.iter() {
            if configured.kind() == MemberKind::Constructor {
                continue;
            }
            let member = configured.member_info(metadata, implementation)?;

            let arguments = match member.kind() {
                MemberKind::Field | MemberKind::Property => {
                    let info = configured.injection_info(&member);
                    let Some(target) = member.targets().into_iter().next() else {
                        continue;
                    };
                    vec![resolve_site(context, target, &info)?]
                }
                MemberKind::Method | MemberKind::Constructor => {
                    let infos = configured.parameter_infos(&member);
                    resolve_arguments(context, &member, &infos)?
                }
            };

            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_resolver",
                member = %member.signature(),
                "Injecting member"
            );

            member.invoke(Some(&instance), &arguments)?;
        }

        Ok(Some(instance))
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Dispose every owned value, newest first, then the managers of this
    /// container's registrations. Inherited registrations only release the
    /// values they hold for this container's scope.
    pub fn dispose(&self) {
        if self.inner.lifetime.is_disposed() {
            return;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            depth = self.inner.depth,
            registrations = self.inner.registrations.len(),
            "Disposing container"
        );

        self.inner.lifetime.dispose();

        for manager in self.managers() {
            manager.dispose();
        }

        let mut ancestor = self.inner.parent.as_ref();
        while let Some(container) = ancestor {
            for manager in container.managers() {
                manager.release_scope(&self.inner.lifetime);
            }
            ancestor = container.inner.parent.as_ref();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lifetime.is_disposed()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.inner.registrations.len())
            .field("depth", &self.inner.depth)
            .field("has_parent", &self.inner.parent.is_some())
            .field("lifetime", &self.inner.lifetime)
            .finish()
    }
}

/// Resolve each parameter of `member` from its descriptor.
fn resolve_arguments(
    context: &mut ContainerContext<'_>,
    member: &Member,
    infos: &[InjectionInfo],
) -> Result<Vec<Value>> {
    member
        .targets()
        .into_iter()
        .zip(infos)
        .map(|(target, info)| resolve_site(context, target, info))
        .collect()
}

/// Value for one injection site: the best override, or the descriptor.
fn resolve_site(
    context: &mut ContainerContext<'_>,
    target: InjectionTarget<'_>,
    info: &InjectionInfo,
) -> Result<Value> {
    let overrides = context.overrides;
    let site = OverrideSite {
        target,
        contract_type: &info.contract_type,
        contract_name: info.contract_name.as_deref(),
    };

    match select_override(overrides, &site) {
        Some(selected) => selected.resolve(context, target.ty),
        None => info.resolve(context),
    }
}

// =============================================================================
// Resolution context
// =============================================================================

/// In-flight resolution: overrides plus the stack of contracts being built.
struct ContainerContext<'a> {
    container: &'a Container,
    root: Contract,
    overrides: &'a [ResolverOverride],
    stack: Vec<Contract>,
}

impl ResolveContext for ContainerContext<'_> {
    fn contract(&self) -> &Contract {
        self.stack.last().unwrap_or(&self.root)
    }

    fn resolve(&mut self, ty: &Type, name: Option<&str>) -> Result<Value> {
        let contract = match name {
            Some(name) => Contract::named(ty, name),
            None => Contract::new(ty),
        };
        self.resolve_contract(&contract)
    }

    fn resolve_contract(&mut self, contract: &Contract) -> Result<Value> {
        if self.stack.contains(contract) {
            return Err(ResolutionError::CircularDependency {
                contract: contract.to_string(),
            });
        }

        let container = self.container;
        let entry = container.find(contract)?;

        self.stack.push(contract.clone());
        let result = container.resolve_entry(self, &entry);
        self.stack.pop();
        result
    }
}
