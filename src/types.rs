//! Runtime type metadata
//!
//! The matching engine never looks at Rust types directly. It works on
//! [`Type`] handles: cheap, identity-compared descriptors that know whether
//! they accept absence, whether they are arrays or generic instantiations,
//! and which supertypes they can be assigned to.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::Type;
//!
//! let service = Type::interface("IService");
//! let impl_ty = Type::builder("ServiceImpl").extends(&service).build();
//!
//! assert!(service.is_assignable_from(&impl_ty));
//! assert!(!impl_ty.is_assignable_from(&service));
//! ```

use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

static META: Lazy<Type> = Lazy::new(|| TypeBuilder::new("Type").shape(TypeShape::Meta).build());
static OBJECT: Lazy<Type> = Lazy::new(|| TypeBuilder::new("object").build());
static ANY_ARRAY: Lazy<Type> =
    Lazy::new(|| TypeBuilder::new("Array").shape(TypeShape::AnyArray).build());

/// Array and nullable types are interned by the id of the wrapped type.
static ARRAY_TYPES: Lazy<DashMap<u64, Type, RandomState>> =
    Lazy::new(|| DashMap::with_hasher(RandomState::new()));
static NULLABLE_TYPES: Lazy<DashMap<u64, Type, RandomState>> =
    Lazy::new(|| DashMap::with_hasher(RandomState::new()));

/// Structural category of a type
#[derive(Clone, Debug)]
pub enum TypeShape {
    /// Ordinary class, interface or value type
    Plain,
    /// The meta-type "Type" itself
    Meta,
    /// The generic "any array" supertype
    AnyArray,
    /// Nullable wrapper around a value type
    Nullable(Type),
    /// Array with the given element type
    Array(Type),
    /// Open generic type definition (`List<>`)
    GenericDefinition { arity: usize },
    /// Closed generic instantiation (`List<i32>`)
    Generic { definition: Type, arguments: Vec<Type> },
}

pub struct TypeInfo {
    id: u64,
    name: String,
    value_type: bool,
    shape: TypeShape,
    supertypes: Vec<Type>,
}

/// Identity-compared handle to runtime type metadata.
#[derive(Clone)]
pub struct Type(Arc<TypeInfo>);

impl Type {
    /// Start describing a new reference type.
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    /// A reference type with no supertypes besides `object`.
    pub fn class(name: impl Into<String>) -> Self {
        TypeBuilder::new(name).build()
    }

    /// An interface; assignability is expressed through `extends`.
    pub fn interface(name: impl Into<String>) -> Self {
        TypeBuilder::new(name).build()
    }

    /// A value type, which does not accept absence.
    pub fn value(name: impl Into<String>) -> Self {
        TypeBuilder::new(name).value_type().build()
    }

    /// Nullable wrapper over a value type.
    pub fn nullable(inner: &Type) -> Self {
        NULLABLE_TYPES
            .entry(inner.id())
            .or_insert_with(|| {
                TypeBuilder::new(format!("{}?", inner.name()))
                    .value_type()
                    .shape(TypeShape::Nullable(inner.clone()))
                    .build()
            })
            .clone()
    }

    /// Array of `element`; one handle per element type.
    pub fn array_of(element: &Type) -> Self {
        ARRAY_TYPES
            .entry(element.id())
            .or_insert_with(|| {
                TypeBuilder::new(format!("{}[]", element.name()))
                    .shape(TypeShape::Array(element.clone()))
                    .extends(Type::any_array())
                    .build()
            })
            .clone()
    }

    /// Open generic definition with `arity` type parameters.
    pub fn generic_definition(name: impl Into<String>, arity: usize) -> Self {
        TypeBuilder::new(name)
            .shape(TypeShape::GenericDefinition { arity })
            .build()
    }

    /// The meta-type "Type".
    pub fn meta() -> &'static Type {
        &META
    }

    /// Root of every type hierarchy.
    pub fn object() -> &'static Type {
        &OBJECT
    }

    /// The generic "any array" supertype.
    pub fn any_array() -> &'static Type {
        &ANY_ARRAY
    }

    /// Close this generic definition over `arguments`.
    pub fn make_generic(&self, arguments: &[Type]) -> TypeBuilder {
        let args = arguments
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ");
        let base = self.name().trim_end_matches("<>");
        let mut builder = TypeBuilder::new(format!("{base}<{args}>")).shape(TypeShape::Generic {
            definition: self.clone(),
            arguments: arguments.to_vec(),
        });
        builder.value_type = self.is_value_type();
        builder
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn shape(&self) -> &TypeShape {
        &self.0.shape
    }

    #[inline]
    pub fn supertypes(&self) -> &[Type] {
        &self.0.supertypes
    }

    #[inline]
    pub fn is_value_type(&self) -> bool {
        self.0.value_type
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        matches!(self.0.shape, TypeShape::Meta)
    }

    #[inline]
    pub fn is_any_array(&self) -> bool {
        matches!(self.0.shape, TypeShape::AnyArray)
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.0.shape, TypeShape::Array(_))
    }

    /// Element type of an array type.
    pub fn element_type(&self) -> Option<&Type> {
        match &self.0.shape {
            TypeShape::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Value type wrapped by a nullable type.
    pub fn nullable_underlying(&self) -> Option<&Type> {
        match &self.0.shape {
            TypeShape::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    /// Reference types and nullable value types accept a null value.
    #[inline]
    pub fn accepts_absence(&self) -> bool {
        !self.0.value_type || self.nullable_underlying().is_some()
    }

    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        matches!(self.0.shape, TypeShape::GenericDefinition { .. })
    }

    /// Open definitions and closed instantiations.
    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(
            self.0.shape,
            TypeShape::GenericDefinition { .. } | TypeShape::Generic { .. }
        )
    }

    /// The open definition of a generic type; a definition returns itself.
    pub fn generic_type_definition(&self) -> Option<Type> {
        match &self.0.shape {
            TypeShape::GenericDefinition { .. } => Some(self.clone()),
            TypeShape::Generic { definition, .. } => Some(definition.clone()),
            _ => None,
        }
    }

    pub fn generic_arguments(&self) -> &[Type] {
        match &self.0.shape {
            TypeShape::Generic { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Whether a value of type `other` can be stored where `self` is expected.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other || self == Type::object() {
            return true;
        }

        if self.nullable_underlying() == Some(other) {
            return true;
        }

        if let (Some(target), Some(source)) = (self.element_type(), other.element_type()) {
            // Covariance applies to reference element types only
            if !source.is_value_type() && target.is_assignable_from(source) {
                return true;
            }
        }

        other
            .supertypes()
            .iter()
            .any(|parent| self.is_assignable_from(parent))
    }
}

impl PartialEq for Type {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Builder for [`Type`] handles.
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    value_type: bool,
    shape: TypeShape,
    supertypes: Vec<Type>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: false,
            shape: TypeShape::Plain,
            supertypes: Vec::new(),
        }
    }

    /// Mark the type as a value type.
    pub fn value_type(mut self) -> Self {
        self.value_type = true;
        self
    }

    /// Add a base class or implemented interface.
    pub fn extends(mut self, parent: &Type) -> Self {
        self.supertypes.push(parent.clone());
        self
    }

    pub fn shape(mut self, shape: TypeShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn build(self) -> Type {
        Type(Arc::new(TypeInfo {
            id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            value_type: self.value_type,
            shape: self.shape,
            supertypes: self.supertypes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = Type::class("Foo");
        let b = Type::class("Foo");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_array_and_nullable_are_interned() {
        let int = Type::value("i32");
        assert_eq!(Type::array_of(&int), Type::array_of(&int));
        assert_eq!(Type::nullable(&int), Type::nullable(&int));
        assert_ne!(Type::array_of(&int), Type::array_of(&Type::value("i32")));
    }

    #[test]
    fn test_absence() {
        let int = Type::value("i32");
        assert!(!int.accepts_absence());
        assert!(Type::nullable(&int).accepts_absence());
        assert!(Type::class("Foo").accepts_absence());
    }

    #[test]
    fn test_assignability_through_hierarchy() {
        let base = Type::interface("IRepo");
        let mid = Type::builder("RepoBase").extends(&base).build();
        let leaf = Type::builder("SqlRepo").extends(&mid).build();

        assert!(base.is_assignable_from(&leaf));
        assert!(mid.is_assignable_from(&leaf));
        assert!(!leaf.is_assignable_from(&base));
        assert!(Type::object().is_assignable_from(&leaf));
    }

    #[test]
    fn test_nullable_accepts_underlying() {
        let int = Type::value("i32");
        let nullable = Type::nullable(&int);
        assert!(nullable.is_assignable_from(&int));
        assert!(!int.is_assignable_from(&nullable));
    }

    #[test]
    fn test_array_covariance() {
        let base = Type::class("Base");
        let derived = Type::builder("Derived").extends(&base).build();
        let int = Type::value("i32");

        assert!(Type::array_of(&base).is_assignable_from(&Type::array_of(&derived)));
        assert!(Type::any_array().is_assignable_from(&Type::array_of(&int)));
        assert!(!Type::array_of(&Type::object()).is_assignable_from(&Type::array_of(&int)));
    }

    #[test]
    fn test_generic_definition() {
        let list = Type::generic_definition("List<>", 1);
        let int = Type::value("i32");
        let closed = list.make_generic(std::slice::from_ref(&int)).build();

        assert_eq!(closed.name(), "List<i32>");
        assert!(closed.is_generic());
        assert!(!closed.is_generic_definition());
        assert_eq!(closed.generic_type_definition(), Some(list.clone()));
        assert_eq!(closed.generic_arguments(), &[int]);
    }
}
