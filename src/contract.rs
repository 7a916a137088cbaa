//! Contract identity: the (type, name) key every resolution is made against

use crate::Type;
use ahash::RandomState;
use once_cell::sync::Lazy;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

/// Hasher shared by every contract so precomputed hashes agree in-process.
static CONTRACT_HASHER: Lazy<RandomState> = Lazy::new(RandomState::new);

/// Marker name that matches every contract name.
pub const ANY_CONTRACT_NAME: &str = "Any Contract Name";

/// Immutable contract of a registration or dependency.
///
/// Equality is structural on `(type, name)` and the hash is computed once
/// at construction.
///
/// # Examples
///
/// ```rust
/// use dependency_resolver::{Contract, Type};
///
/// let ty = Type::class("Logger");
/// assert_eq!(Contract::named(&ty, "file"), Contract::named(&ty, "file"));
/// assert_ne!(Contract::named(&ty, "file"), Contract::new(&ty));
/// ```
#[derive(Clone)]
pub struct Contract {
    hash: u64,
    ty: Type,
    name: Option<Arc<str>>,
}

impl Contract {
    /// Contract for an unnamed registration of `ty`.
    pub fn new(ty: &Type) -> Self {
        Self::with(ty.clone(), None)
    }

    /// Contract for a named registration of `ty`.
    pub fn named(ty: &Type, name: &str) -> Self {
        Self::with(ty.clone(), Some(Arc::from(name)))
    }

    fn with(ty: Type, name: Option<Arc<str>>) -> Self {
        let mut hasher = CONTRACT_HASHER.build_hasher();
        ty.hash(&mut hasher);
        name.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            ty,
            name,
        }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Same name, different type.
    pub fn with_type(&self, ty: &Type) -> Self {
        Self::with(ty.clone(), self.name.clone())
    }

    /// Same type, different name.
    pub fn with_name(&self, name: Option<&str>) -> Self {
        Self::with(self.ty.clone(), name.map(Arc::from))
    }

    /// Contract of the open generic definition, if the type is generic.
    pub fn generic_type_definition(&self) -> Option<Self> {
        self.ty
            .generic_type_definition()
            .map(|definition| Self::with(definition, self.name.clone()))
    }
}

impl PartialEq for Contract {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.name == other.name
    }
}

impl Eq for Contract {}

impl Hash for Contract {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("type", &self.ty.name())
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contract: Type = {}, Name = {}",
            self.ty.name(),
            self.name().unwrap_or("null")
        )
    }
}

/// Name filter used by overrides; `Any` is the catch-all sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContractName {
    /// Matches every name, including none
    Any,
    /// Matches exactly this name (or the absence of one)
    Exact(Option<Arc<str>>),
}

impl ContractName {
    pub fn exact(name: Option<&str>) -> Self {
        ContractName::Exact(name.map(Arc::from))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, ContractName::Any)
    }

    pub fn matches(&self, name: Option<&str>) -> bool {
        match self {
            ContractName::Any => true,
            ContractName::Exact(expected) => expected.as_deref() == name,
        }
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractName::Any => f.write_str(ANY_CONTRACT_NAME),
            ContractName::Exact(Some(name)) => f.write_str(name),
            ContractName::Exact(None) => f.write_str("null"),
        }
    }
}
