//! Configured injection members
//!
//! An [`InjectionMember`] records how a registration wants one constructor,
//! method, field or property used: which member (by name and data) and
//! what to inject. Binding it to a type runs the selector once, validates
//! the winner and remembers it. Binding the same configuration to a second
//! type is a configuration error.
//!
//! Members selected on an open generic definition are not reusable on a
//! closed instantiation; [`InjectionMember::member_info`] re-walks the
//! closed type and caches the rebound member per closed type.

use crate::contract::ContractName;
use crate::matching::rank_value;
use crate::member::{Member, MemberKind, ParameterModifier, Visibility};
use crate::metadata::TypeMetadata;
use crate::selection::{self, SelectionMode};
use crate::{
    Contract, InjectionValue, MatchRank, ResolutionError, ResolveContext, Result, Type, Value,
};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Descriptor handed from injection configuration to resolution.
///
/// Starts out importing the member's own type with no name and is refined
/// by the configuration that produced it.
#[derive(Debug, Clone)]
pub struct InjectionInfo {
    /// Type of the parameter, field or property receiving the value
    pub member_type: Type,
    /// Type declaring the member
    pub declaring_type: Type,
    /// Type of the imported contract
    pub contract_type: Type,
    /// Name of the imported contract
    pub contract_name: Option<Arc<str>>,
    /// Whether the value is imported from the container rather than supplied
    pub is_import: bool,
    /// Whether a failed import falls back to the default value
    pub allow_default: bool,
    /// Fallback used when an import fails and defaults are allowed
    pub default_value: Option<Value>,
    /// Arguments of a configured method or constructor
    pub arguments: Option<Vec<InjectionValue>>,
    /// Supplied data, resolved in place of an import
    pub data: Option<InjectionValue>,
}

impl InjectionInfo {
    pub fn new(member_type: &Type, declaring_type: &Type) -> Self {
        Self {
            member_type: member_type.clone(),
            declaring_type: declaring_type.clone(),
            contract_type: member_type.clone(),
            contract_name: None,
            is_import: true,
            allow_default: false,
            default_value: None,
            arguments: None,
            data: None,
        }
    }

    /// Set a default value; this also allows defaults.
    pub fn set_default(&mut self, value: Value) {
        self.default_value = Some(value);
        self.allow_default = true;
    }

    /// Supply data in place of an import.
    ///
    /// A type supplied for anything but a meta-typed member redirects the
    /// import to that type's unnamed contract instead.
    pub fn set_data(&mut self, data: InjectionValue) {
        match data {
            InjectionValue::Type(ty) if !self.member_type.is_meta() => {
                self.contract_type = ty;
                self.contract_name = None;
            }
            data => {
                self.data = Some(data);
                self.is_import = false;
            }
        }
    }

    /// Contract imported when no data was supplied.
    pub fn contract(&self) -> Contract {
        match &self.contract_name {
            Some(name) => Contract::named(&self.contract_type, name),
            None => Contract::new(&self.contract_type),
        }
    }

    /// Produce the value this descriptor asks for.
    pub fn resolve(&self, context: &mut dyn ResolveContext) -> Result<Value> {
        let result = match &self.data {
            Some(data) => data.resolve(context, &self.member_type),
            None => context.resolve(&self.contract_type, self.contract_name.as_deref()),
        };

        match result {
            Err(err) if self.allow_default && !err.is_retryable() => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "dependency_resolver",
                    contract = %self.contract(),
                    error = %err,
                    "Import failed, substituting default"
                );
                Ok(self.default_value.clone().flatten())
            }
            other => other,
        }
    }
}

/// What the configuration supplies for the member.
#[derive(Clone, Debug)]
enum MemberData {
    /// Import from the container by member type
    Import,
    /// Single value for a field or property
    Value(InjectionValue),
    /// Arguments for a constructor or method
    Arguments(Vec<InjectionValue>),
}

#[derive(Default)]
struct BindState {
    selection: Option<Member>,
    bound: Option<Type>,
}

/// Configuration of one injected constructor, method, field or property.
pub struct InjectionMember {
    kind: MemberKind,
    name: Option<String>,
    data: MemberData,
    optional: bool,
    contract_type: Option<Type>,
    contract_name: ContractName,
    state: Mutex<BindState>,
    closed: DashMap<Type, Member, RandomState>,
}

impl InjectionMember {
    fn new(kind: MemberKind, name: Option<String>, data: MemberData) -> Self {
        Self {
            kind,
            name,
            data,
            optional: false,
            contract_type: None,
            contract_name: ContractName::Any,
            state: Mutex::new(BindState::default()),
            closed: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Call the constructor matching `arguments`.
    pub fn constructor(arguments: Vec<InjectionValue>) -> Self {
        Self::new(MemberKind::Constructor, None, MemberData::Arguments(arguments))
    }

    /// Use an already selected constructor.
    pub fn with_constructor(member: Member, arguments: Vec<InjectionValue>) -> Self {
        let this = Self::constructor(arguments);
        this.state.lock().selection = Some(member);
        this
    }

    /// Call the named method with `arguments`; empty arguments resolve every
    /// parameter by type.
    pub fn method(name: impl Into<String>, arguments: Vec<InjectionValue>) -> Self {
        Self::new(MemberKind::Method, Some(name.into()), MemberData::Arguments(arguments))
    }

    /// Inject the named field from the container by its type.
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Field, Some(name.into()), MemberData::Import)
    }

    /// Inject the named field with `value`.
    pub fn field_value(name: impl Into<String>, value: impl Into<InjectionValue>) -> Self {
        Self::new(MemberKind::Field, Some(name.into()), MemberData::Value(value.into()))
    }

    /// Inject the named property from the container by its type.
    pub fn property(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Property, Some(name.into()), MemberData::Import)
    }

    /// Inject the named property with `value`.
    pub fn property_value(name: impl Into<String>, value: impl Into<InjectionValue>) -> Self {
        Self::new(MemberKind::Property, Some(name.into()), MemberData::Value(value.into()))
    }

    /// Import a specific contract instead of the member's own type.
    pub fn contract(mut self, ty: &Type, name: Option<&str>) -> Self {
        self.contract_type = Some(ty.clone());
        self.contract_name = ContractName::exact(name);
        self
    }

    /// Substitute the default value when the import fails.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Arguments or value supplied for selection.
    pub fn data(&self) -> &[InjectionValue] {
        match &self.data {
            MemberData::Import => &[],
            MemberData::Value(value) => std::slice::from_ref(value),
            MemberData::Arguments(arguments) => arguments,
        }
    }

    /// Whether this configuration has been bound to a type.
    pub fn is_bound(&self) -> bool {
        self.state.lock().bound.is_some()
    }

    /// Member selected at bind time.
    pub fn selection(&self) -> Option<Member> {
        self.state.lock().selection.clone()
    }

    /// How well `member` fits this configuration.
    pub fn rank(&self, member: &Member) -> MatchRank {
        if member.kind() != self.kind || self.name.as_deref().is_some_and(|n| n != member.name()) {
            return MatchRank::NoMatch;
        }

        match &self.data {
            MemberData::Import => MatchRank::ExactMatch,
            MemberData::Value(_) => MatchRank::Compatible,
            MemberData::Arguments(_) => match selection::score(member, self.name(), self.data()) {
                score if score.is_match() => MatchRank::ExactMatch,
                _ => MatchRank::NoMatch,
            },
        }
    }

    /// Select, validate and remember the member of `ty` this configuration
    /// injects through.
    pub fn bind(
        &self,
        metadata: &dyn TypeMetadata,
        ty: &Type,
        mode: SelectionMode,
    ) -> Result<Member> {
        let mut state = self.state.lock();

        if let Some(bound) = &state.bound {
            if bound != ty {
                return Err(ResolutionError::SharedConfiguration {
                    member: self.to_string(),
                    bound: bound.name().to_string(),
                    requested: ty.name().to_string(),
                });
            }
            if let Some(selection) = &state.selection {
                return Ok(selection.clone());
            }
        }

        let member = match &state.selection {
            // Preselected constructor
            Some(member) => member.clone(),
            None => selection::select(metadata, ty, self.kind, self.name(), self.data(), mode)?,
        };

        if mode == SelectionMode::Validating {
            self.validate(&member)?;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_resolver",
            target_type = ty.name(),
            member = %member.signature(),
            "Bound injection member"
        );

        state.selection = Some(member.clone());
        state.bound = Some(ty.clone());
        Ok(member)
    }

    /// Member to use on `ty`, rebinding a member selected on an open generic
    /// definition to the closed type.
    pub fn member_info(&self, metadata: &dyn TypeMetadata, ty: &Type) -> Result<Member> {
        let selection = self.selection().ok_or_else(|| {
            ResolutionError::invalid_member(ty.name(), self.to_string(), "member is not bound")
        })?;

        let declaring = selection.declaring_type();
        if declaring == ty || !declaring.is_generic() {
            return Ok(selection);
        }

        if let Some(member) = self.closed.get(ty) {
            return Ok(member.clone());
        }

        let arity = selection.parameters().len();
        let rebound = metadata
            .supported_members(ty, self.kind)
            .into_iter()
            .find(|member| {
                member.name() == selection.name()
                    && match self.kind {
                        MemberKind::Constructor | MemberKind::Method => {
                            member.parameters().len() == arity
                        }
                        MemberKind::Field | MemberKind::Property => true,
                    }
            })
            .ok_or_else(|| ResolutionError::no_match(ty.name(), selection.signature()))?;

        #[cfg(feature = "logging")]
        trace!(
            target: "dependency_resolver",
            definition = declaring.name(),
            closed_type = ty.name(),
            member = %rebound.signature(),
            "Rebound member to closed generic type"
        );

        self.closed.insert(ty.clone(), rebound.clone());
        Ok(rebound)
    }

    /// Descriptor for a field or property, or for a method as a whole.
    pub fn injection_info(&self, member: &Member) -> InjectionInfo {
        let member_type = member.member_type().unwrap_or(member.declaring_type());
        let mut info = InjectionInfo::new(member_type, member.declaring_type());
        info.allow_default = self.optional;

        match &self.data {
            MemberData::Import => self.apply_contract(&mut info),
            MemberData::Value(value) => info.set_data(value.clone()),
            MemberData::Arguments(arguments) if !arguments.is_empty() => {
                info.arguments = Some(arguments.clone());
            }
            MemberData::Arguments(_) => {}
        }
        info
    }

    /// Descriptors for each parameter of a constructor or method.
    pub fn parameter_infos(&self, member: &Member) -> Vec<InjectionInfo> {
        let arguments = match &self.data {
            MemberData::Arguments(arguments) if !arguments.is_empty() => Some(arguments),
            _ => None,
        };

        member
            .parameters()
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                let mut info = InjectionInfo::new(parameter.ty(), member.declaring_type());
                info.allow_default = self.optional;
                match arguments.and_then(|arguments| arguments.get(index)) {
                    Some(data) => info.set_data(data.clone()),
                    None => self.apply_contract(&mut info),
                }
                info
            })
            .collect()
    }

    fn apply_contract(&self, info: &mut InjectionInfo) {
        if let Some(ty) = &self.contract_type {
            info.contract_type = ty.clone();
        }
        if let ContractName::Exact(name) = &self.contract_name {
            info.contract_name = name.clone();
        }
    }

    /// Bind-time eligibility checks.
    fn validate(&self, member: &Member) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ResolutionError::invalid_member(
                member.declaring_type().name(),
                format!("{} '{}'", member.kind(), member.name()),
                reason,
            ))
        };

        match member.kind() {
            MemberKind::Constructor => {
                if member.is_static() {
                    return invalid("static constructors cannot be injected");
                }
                Ok(())
            }
            MemberKind::Method => {
                if member.is_static() {
                    return invalid("static methods cannot be injected");
                }
                match member.visibility() {
                    Visibility::Private => return invalid("private methods cannot be injected"),
                    Visibility::Protected => return invalid("protected methods cannot be injected"),
                    Visibility::Public | Visibility::Internal => {}
                }
                if member.is_generic_method_definition() {
                    return invalid("open generic methods cannot be injected");
                }
                for parameter in member.parameters() {
                    match parameter.modifier() {
                        ParameterModifier::Out => {
                            return invalid("methods with 'out' parameters are not injectable");
                        }
                        ParameterModifier::Ref => {
                            return invalid("methods with 'ref' parameters are not injectable");
                        }
                        ParameterModifier::None => {}
                    }
                }
                Ok(())
            }
            MemberKind::Field => {
                if member.is_static() {
                    return invalid("static fields cannot be injected");
                }
                match member.visibility() {
                    Visibility::Private => return invalid("private fields cannot be injected"),
                    Visibility::Protected => return invalid("protected fields cannot be injected"),
                    Visibility::Public | Visibility::Internal => {}
                }
                if member.is_read_only() {
                    return invalid("read-only fields cannot be injected");
                }
                self.validate_data(member)
            }
            MemberKind::Property => {
                let Some(setter) = member.setter() else {
                    return invalid("read-only properties cannot be injected");
                };
                if member.index_parameters() != 0 {
                    return invalid("indexers cannot be injected");
                }
                if member.is_static() {
                    return invalid("static properties cannot be injected");
                }
                match setter {
                    Visibility::Private => invalid("private properties cannot be injected"),
                    Visibility::Protected => invalid("protected properties cannot be injected"),
                    Visibility::Public | Visibility::Internal => self.validate_data(member),
                }
            }
        }
    }

    fn validate_data(&self, member: &Member) -> Result<()> {
        let (MemberData::Value(value), Some(member_type)) = (&self.data, member.member_type())
        else {
            return Ok(());
        };

        match value {
            InjectionValue::Resolver(_) | InjectionValue::Factory(_) => Ok(()),
            value if rank_value(value, member_type).is_match() => Ok(()),
            value => Err(ResolutionError::invalid_member(
                member.declaring_type().name(),
                format!("{} '{}'", member.kind(), member.name()),
                format!(
                    "injected data '{}' could not be matched with type '{}'",
                    value.describe(),
                    member_type.name()
                ),
            )),
        }
    }
}

impl fmt::Display for InjectionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or(".ctor");
        match (&self.kind, &self.data) {
            (MemberKind::Constructor | MemberKind::Method, _) => write!(
                f,
                "Invoke.{}('{}', {})",
                self.kind,
                name,
                crate::matching::signature(self.data())
            ),
            (_, MemberData::Import) => write!(f, "Resolve.{}('{}')", self.kind, name),
            (_, _) => write!(
                f,
                "Inject.{}('{}', {})",
                self.kind,
                name,
                crate::matching::signature(self.data())
            ),
        }
    }
}

impl fmt::Debug for InjectionMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string())
    }
}
