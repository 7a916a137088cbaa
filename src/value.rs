//! Runtime values flowing through matching, overrides and lifetime slots
//!
//! An [`Instance`] is a produced object tagged with its runtime [`Type`].
//! A [`Value`] is what a slot or a parameter receives: `None` is a legal
//! null. An [`InjectionValue`] is configuration data supplied for a
//! parameter, field or property before anything is resolved.

use crate::context::ResolveContext;
use crate::matching::rank_array;
use crate::member::InjectionTarget;
use crate::{MatchRank, Result, Type};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// A resolved value; `None` is a legitimate null.
pub type Value = Option<Instance>;

/// Objects that release resources when their owner is torn down.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// A produced object together with its runtime type.
#[derive(Clone)]
pub struct Instance {
    ty: Type,
    value: Arc<dyn Any + Send + Sync>,
    disposer: Option<Arc<dyn Disposable>>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(ty: &Type, value: T) -> Self {
        Self::from_arc(ty, Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(ty: &Type, value: Arc<T>) -> Self {
        Self {
            ty: ty.clone(),
            value,
            disposer: None,
        }
    }

    /// An instance whose owner may dispose it.
    pub fn disposable<T: Disposable + Any>(ty: &Type, value: T) -> Self {
        let value = Arc::new(value);
        Self {
            ty: ty.clone(),
            value: value.clone(),
            disposer: Some(value),
        }
    }

    /// Wrap a type handle as a value of the meta-type.
    pub fn of_type(ty: &Type) -> Self {
        Self::new(Type::meta(), ty.clone())
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Identity comparison of the underlying objects.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub fn disposer(&self) -> Option<&Arc<dyn Disposable>> {
        self.disposer.as_ref()
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            ty: self.ty.clone(),
            value: Arc::downgrade(&self.value),
            disposer: self.disposer.as_ref().map(Arc::downgrade),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.ty.name())
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// Non-owning reference to an [`Instance`].
#[derive(Clone)]
pub struct WeakInstance {
    ty: Type,
    value: Weak<dyn Any + Send + Sync>,
    disposer: Option<Weak<dyn Disposable>>,
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        let value = self.value.upgrade()?;
        Some(Instance {
            ty: self.ty.clone(),
            value,
            disposer: self.disposer.as_ref().and_then(Weak::upgrade),
        })
    }
}

/// Custom compatibility logic exposed by a value.
pub trait Match: Send + Sync {
    /// Rank against a bare type.
    fn rank_type(&self, target: &Type) -> MatchRank;

    /// Rank against a parameter, field or property with its declaring context.
    fn rank_target(&self, target: &InjectionTarget<'_>) -> MatchRank {
        self.rank_type(target.ty)
    }
}

/// A deferred value produced at resolution time.
pub trait Resolve: Send + Sync {
    fn resolve(&self, context: &mut dyn ResolveContext) -> Result<Value>;
}

impl<F> Resolve for F
where
    F: Fn(&mut dyn ResolveContext) -> Result<Value> + Send + Sync,
{
    #[inline]
    fn resolve(&self, context: &mut dyn ResolveContext) -> Result<Value> {
        self(context)
    }
}

/// Produces a resolver for a concrete type on demand.
pub trait ResolverFactory: Send + Sync {
    fn resolver(&self, ty: &Type) -> Arc<dyn Resolve>;
}

/// A parameter value object: ranks itself and resolves itself.
pub trait InjectionParameter: Match + Resolve + fmt::Debug {}

impl<T: Match + Resolve + fmt::Debug> InjectionParameter for T {}

/// Array literal supplied as injection data.
#[derive(Clone, Debug)]
pub struct ArrayValue {
    array_type: Type,
    elements: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element_type: &Type, elements: Vec<Value>) -> Self {
        Self {
            array_type: Type::array_of(element_type),
            elements,
        }
    }

    /// Concrete array type of this literal.
    #[inline]
    pub fn array_type(&self) -> &Type {
        &self.array_type
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn to_instance(&self) -> Instance {
        Instance::new(&self.array_type, self.elements.clone())
    }
}

/// Configuration data supplied for a member parameter, field or property.
#[derive(Clone)]
pub enum InjectionValue {
    /// Literal null
    Null,
    /// Array literal
    Array(ArrayValue),
    /// Value object with its own matching logic
    Parameter(Arc<dyn InjectionParameter>),
    /// A type: resolve the unnamed contract of this type
    Type(Type),
    /// Deferred resolver
    Resolver(Arc<dyn Resolve>),
    /// Deferred resolver factory
    Factory(Arc<dyn ResolverFactory>),
    /// Literal instance
    Instance(Instance),
}

impl InjectionValue {
    pub fn instance<T: Any + Send + Sync>(ty: &Type, value: T) -> Self {
        InjectionValue::Instance(Instance::new(ty, value))
    }

    pub fn resolver<F>(resolver: F) -> Self
    where
        F: Fn(&mut dyn ResolveContext) -> Result<Value> + Send + Sync + 'static,
    {
        InjectionValue::Resolver(Arc::new(resolver))
    }

    /// Produce the value to inject into a member of type `target`.
    pub fn resolve(&self, context: &mut dyn ResolveContext, target: &Type) -> Result<Value> {
        match self {
            InjectionValue::Null => Ok(None),
            InjectionValue::Array(array) => Ok(Some(array.to_instance())),
            InjectionValue::Parameter(parameter) => parameter.resolve(context),
            InjectionValue::Type(ty) if target.is_meta() => Ok(Some(Instance::of_type(ty))),
            InjectionValue::Type(ty) => context.resolve(ty, None),
            InjectionValue::Resolver(resolver) => resolver.resolve(context),
            InjectionValue::Factory(factory) => factory.resolver(target).resolve(context),
            InjectionValue::Instance(instance) => Ok(Some(instance.clone())),
        }
    }

    /// Short description used in signatures and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            InjectionValue::Null => "null".to_string(),
            InjectionValue::Array(array) => array.array_type().name().to_string(),
            InjectionValue::Parameter(parameter) => format!("{parameter:?}"),
            InjectionValue::Type(ty) => ty.name().to_string(),
            InjectionValue::Resolver(_) => "resolver".to_string(),
            InjectionValue::Factory(_) => "factory".to_string(),
            InjectionValue::Instance(instance) => instance.ty().name().to_string(),
        }
    }
}

impl fmt::Debug for InjectionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionValue({})", self.describe())
    }
}

impl From<Instance> for InjectionValue {
    fn from(instance: Instance) -> Self {
        InjectionValue::Instance(instance)
    }
}

impl From<&Type> for InjectionValue {
    fn from(ty: &Type) -> Self {
        InjectionValue::Type(ty.clone())
    }
}

impl From<ArrayValue> for InjectionValue {
    fn from(array: ArrayValue) -> Self {
        InjectionValue::Array(array)
    }
}

/// Array parameter whose elements are resolved from the container.
#[derive(Debug, Clone)]
pub struct ResolvedArray {
    array_type: Type,
    element_type: Type,
    elements: Vec<InjectionValue>,
}

impl ResolvedArray {
    pub fn new(element_type: &Type, elements: Vec<InjectionValue>) -> Self {
        Self {
            array_type: Type::array_of(element_type),
            element_type: element_type.clone(),
            elements,
        }
    }

    pub fn array_type(&self) -> &Type {
        &self.array_type
    }
}

impl Match for ResolvedArray {
    fn rank_type(&self, target: &Type) -> MatchRank {
        rank_array(&self.array_type, target)
    }
}

impl Resolve for ResolvedArray {
    fn resolve(&self, context: &mut dyn ResolveContext) -> Result<Value> {
        let mut items = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            items.push(element.resolve(context, &self.element_type)?);
        }
        Ok(Some(Instance::new(&self.array_type, items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Handle;

    impl Disposable for Handle {
        fn dispose(&self) {}
    }

    #[test]
    fn test_instance_identity() {
        let ty = Type::class("Foo");
        let a = Instance::new(&ty, 1u32);
        let b = a.clone();
        let c = Instance::new(&ty, 1u32);

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn test_disposable_instance_shares_object() {
        let ty = Type::class("Handle");
        let instance = Instance::disposable(&ty, Handle);
        assert!(instance.disposer().is_some());
        assert!(instance.downcast::<Handle>().is_some());
        assert!(Instance::new(&ty, Handle).disposer().is_none());
    }

    #[test]
    fn test_weak_instance_does_not_keep_alive() {
        let ty = Type::class("Foo");
        let instance = Instance::new(&ty, String::from("x"));
        let weak = instance.downgrade();

        assert!(weak.upgrade().is_some());
        drop(instance);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_describe() {
        let ty = Type::class("Foo");
        assert_eq!(InjectionValue::Null.describe(), "null");
        assert_eq!(InjectionValue::instance(&ty, 1u8).describe(), "Foo");
        assert_eq!(InjectionValue::from(&ty).describe(), "Foo");
    }
}
