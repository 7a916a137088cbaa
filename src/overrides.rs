//! Resolver overrides
//!
//! Overrides are caller-supplied values for one top-level resolution. Each
//! ranks itself against an injection site with the matching engine so they
//! can be layered: the most specific applicable override wins.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::{InjectionValue, ResolverOverride, Type};
//!
//! let logger = Type::interface("ILogger");
//! let console = Type::builder("ConsoleLogger").extends(&logger).build();
//!
//! let overrides = vec![
//!     ResolverOverride::dependency(&logger, InjectionValue::instance(&console, ())),
//!     ResolverOverride::parameter("retries", InjectionValue::Null),
//! ];
//! assert_eq!(overrides.len(), 2);
//! ```

use crate::contract::ContractName;
use crate::matching::rank_value;
use crate::member::{InjectionTarget, MemberKind};
use crate::value::{Instance, Resolve, ResolverFactory};
use crate::{InjectionValue, MatchRank, ResolveContext, Result, Type, Value};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Where an override would apply: the target member plus the contract the
/// site would otherwise import.
#[derive(Debug, Clone, Copy)]
pub struct OverrideSite<'a> {
    pub target: InjectionTarget<'a>,
    pub contract_type: &'a Type,
    pub contract_name: Option<&'a str>,
}

/// Value an override produces
#[derive(Clone)]
pub enum OverrideValue {
    /// Literal or configuration value
    Value(InjectionValue),
    /// Nested resolver
    Resolver(Arc<dyn Resolve>),
    /// Factory asked for a resolver for the site's type
    Factory(Arc<dyn ResolverFactory>),
}

impl OverrideValue {
    fn rank(&self, target: &Type) -> MatchRank {
        match self {
            OverrideValue::Value(value) => rank_value(value, target),
            OverrideValue::Resolver(_) | OverrideValue::Factory(_) => MatchRank::HigherProspect,
        }
    }

    fn describe(&self) -> String {
        match self {
            OverrideValue::Value(value) => value.describe(),
            OverrideValue::Resolver(_) => "resolver".to_string(),
            OverrideValue::Factory(_) => "factory".to_string(),
        }
    }
}

impl From<InjectionValue> for OverrideValue {
    fn from(value: InjectionValue) -> Self {
        OverrideValue::Value(value)
    }
}

impl From<Instance> for OverrideValue {
    fn from(instance: Instance) -> Self {
        OverrideValue::Value(InjectionValue::Instance(instance))
    }
}

/// Which sites an override is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKind {
    /// Any site importing a matching contract
    Dependency,
    /// Constructor or method parameters
    Parameter,
    /// Fields
    Field,
    /// Properties
    Property,
}

/// Caller-supplied value source for one resolution.
#[derive(Clone)]
pub struct ResolverOverride {
    kind: OverrideKind,
    target: Option<Type>,
    name: ContractName,
    ty: Option<Type>,
    value: OverrideValue,
}

impl ResolverOverride {
    fn new(kind: OverrideKind, name: ContractName, ty: Option<&Type>, value: OverrideValue) -> Self {
        Self {
            kind,
            target: None,
            name,
            ty: ty.cloned(),
            value,
        }
    }

    /// Override every dependency on `ty`, whatever its name.
    pub fn dependency(ty: &Type, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Dependency, ContractName::Any, Some(ty), value.into())
    }

    /// Override the dependency on contract `(ty, name)`.
    pub fn dependency_named(ty: &Type, name: Option<&str>, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Dependency, ContractName::exact(name), Some(ty), value.into())
    }

    /// Override every dependency named `name`; the value decides which types
    /// it fits.
    pub fn dependency_by_name(name: &str, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Dependency, ContractName::exact(Some(name)), None, value.into())
    }

    /// Override parameters named `name`.
    pub fn parameter(name: &str, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Parameter, ContractName::exact(Some(name)), None, value.into())
    }

    /// Override parameters of type `ty`.
    pub fn parameter_of_type(ty: &Type, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Parameter, ContractName::Any, Some(ty), value.into())
    }

    /// Override the field named `name`.
    pub fn field(name: &str, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Field, ContractName::exact(Some(name)), None, value.into())
    }

    /// Override the property named `name`.
    pub fn property(name: &str, value: impl Into<OverrideValue>) -> Self {
        Self::new(OverrideKind::Property, ContractName::exact(Some(name)), None, value.into())
    }

    /// Restrict the override to members declared by `target`.
    pub fn on_type(mut self, target: &Type) -> Self {
        self.target = Some(target.clone());
        self
    }

    /// Additionally require the site's type to be `ty`.
    pub fn of_type(mut self, ty: &Type) -> Self {
        self.ty = Some(ty.clone());
        self
    }

    #[inline]
    pub fn kind(&self) -> OverrideKind {
        self.kind
    }

    pub fn value(&self) -> &OverrideValue {
        &self.value
    }

    /// Lowest rank at which the override is applied.
    pub fn min_rank(&self) -> MatchRank {
        match self.kind {
            OverrideKind::Dependency => MatchRank::Compatible,
            OverrideKind::Parameter | OverrideKind::Field | OverrideKind::Property => {
                MatchRank::ExactMatch
            }
        }
    }

    #[inline]
    pub fn accepts(&self, rank: MatchRank) -> bool {
        rank >= self.min_rank()
    }

    /// Rank the override against an injection site.
    pub fn rank(&self, site: &OverrideSite<'_>) -> MatchRank {
        if self
            .target
            .as_ref()
            .is_some_and(|target| target != site.target.declaring_type)
        {
            return MatchRank::NoMatch;
        }

        match self.kind {
            OverrideKind::Dependency => self.rank_contract(site.contract_type, site.contract_name),
            OverrideKind::Parameter => self.rank_member(site, |kind| {
                matches!(kind, MemberKind::Constructor | MemberKind::Method)
            }),
            OverrideKind::Field => self.rank_member(site, |kind| kind == MemberKind::Field),
            OverrideKind::Property => self.rank_member(site, |kind| kind == MemberKind::Property),
        }
    }

    fn rank_contract(&self, contract_type: &Type, contract_name: Option<&str>) -> MatchRank {
        if !self.name.matches(contract_name) {
            return MatchRank::NoMatch;
        }

        match &self.ty {
            None => self.value.rank(contract_type),
            Some(ty) if contract_type == ty => MatchRank::ExactMatch,
            Some(ty) if contract_type.is_assignable_from(ty) => MatchRank::HigherProspect,
            Some(_) => MatchRank::NoMatch,
        }
    }

    fn rank_member(&self, site: &OverrideSite<'_>, kind: impl Fn(MemberKind) -> bool) -> MatchRank {
        let target = &site.target;
        if kind(target.kind)
            && self.ty.as_ref().is_none_or(|ty| ty == target.ty)
            && self.name.matches(Some(target.name))
        {
            MatchRank::ExactMatch
        } else {
            MatchRank::NoMatch
        }
    }

    /// Produce the override's value for a site of type `target`.
    ///
    /// Nested resolvers and factories recurse into `context`, so failures
    /// propagate exactly like ordinary dependency failures.
    pub fn resolve(&self, context: &mut dyn ResolveContext, target: &Type) -> Result<Value> {
        match &self.value {
            OverrideValue::Value(value) => value.resolve(context, target),
            OverrideValue::Resolver(resolver) => resolver.resolve(context),
            OverrideValue::Factory(factory) => {
                let ty = self.ty.as_ref().unwrap_or(target);
                factory.resolver(ty).resolve(context)
            }
        }
    }
}

impl fmt::Debug for ResolverOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOverride")
            .field("kind", &self.kind)
            .field("target", &self.target.as_ref().map(Type::name))
            .field("name", &self.name.to_string())
            .field("type", &self.ty.as_ref().map(Type::name))
            .field("value", &self.value.describe())
            .finish()
    }
}

/// Pick the override for `site`: the highest applicable rank wins and the
/// last declared override wins a tie.
pub fn select_override<'o>(
    overrides: &'o [ResolverOverride],
    site: &OverrideSite<'_>,
) -> Option<&'o ResolverOverride> {
    let mut best: Option<(MatchRank, &ResolverOverride)> = None;

    for candidate in overrides {
        let rank = candidate.rank(site);
        if !candidate.accepts(rank) {
            continue;
        }
        if best.is_none_or(|(top, _)| rank >= top) {
            best = Some((rank, candidate));
        }
    }

    #[cfg(feature = "logging")]
    if let Some((rank, selected)) = best {
        trace!(
            target: "dependency_resolver",
            declaring_type = site.target.declaring_type.name(),
            member = site.target.name,
            rank = %rank,
            value = %selected.value.describe(),
            "Applying resolver override"
        );
    }

    best.map(|(_, selected)| selected)
}
