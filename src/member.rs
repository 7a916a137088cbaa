//! Member descriptors: constructors, methods, fields and properties
//!
//! A [`Member`] is the metadata-side view of something that can produce or
//! receive an injected value. Constructors and methods carry an ordered
//! parameter list; fields and properties expose exactly one implicit
//! parameter, the member's own type.

use crate::{ResolutionError, Result, Type, Value};
use crate::value::Instance;
use std::fmt;
use std::sync::Arc;

/// Kind of member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constructor,
    Method,
    Field,
    Property,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
            MemberKind::Field => "field",
            MemberKind::Property => "property",
        };
        f.write_str(name)
    }
}

/// Accessibility of a member or property setter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

/// Passing convention of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterModifier {
    #[default]
    None,
    Ref,
    Out,
}

/// A single declared parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    ty: Type,
    modifier: ParameterModifier,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: &Type) -> Self {
        Self {
            name: name.into(),
            ty: ty.clone(),
            modifier: ParameterModifier::None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn modifier(&self) -> ParameterModifier {
        self.modifier
    }
}

/// Where a value is going: a parameter, field or property in its declaring type.
#[derive(Debug, Clone, Copy)]
pub struct InjectionTarget<'a> {
    pub kind: MemberKind,
    pub declaring_type: &'a Type,
    pub ty: &'a Type,
    pub name: &'a str,
}

/// Invokes a member. Constructors get `None` as target and return the new
/// instance; methods get the instance and their arguments; fields and
/// properties get the instance and a single value.
pub type Invoker = Arc<dyn Fn(Option<&Instance>, &[Value]) -> Result<Value> + Send + Sync>;

struct MemberInfo {
    kind: MemberKind,
    name: String,
    declaring_type: Type,
    parameters: Vec<Parameter>,
    member_type: Option<Type>,
    visibility: Visibility,
    is_static: bool,
    read_only: bool,
    setter: Option<Visibility>,
    index_parameters: usize,
    generic_method_definition: bool,
    invoker: Option<Invoker>,
}

/// Identity-compared member handle.
#[derive(Clone)]
pub struct Member(Arc<MemberInfo>);

impl Member {
    /// Describe a constructor of `declaring_type`.
    pub fn constructor(declaring_type: &Type) -> MemberBuilder {
        MemberBuilder::new(MemberKind::Constructor, ".ctor", declaring_type, Some(declaring_type))
    }

    /// Describe a method of `declaring_type`.
    pub fn method(declaring_type: &Type, name: impl Into<String>) -> MemberBuilder {
        MemberBuilder::new(MemberKind::Method, name, declaring_type, None)
    }

    /// Describe a field of type `ty`.
    pub fn field(declaring_type: &Type, name: impl Into<String>, ty: &Type) -> MemberBuilder {
        MemberBuilder::new(MemberKind::Field, name, declaring_type, Some(ty))
    }

    /// Describe a property of type `ty` with a public setter.
    pub fn property(declaring_type: &Type, name: impl Into<String>, ty: &Type) -> MemberBuilder {
        let mut builder = MemberBuilder::new(MemberKind::Property, name, declaring_type, Some(ty));
        builder.setter = Some(Visibility::Public);
        builder
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.0.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn declaring_type(&self) -> &Type {
        &self.0.declaring_type
    }

    /// Declared parameters; empty for fields and properties.
    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.0.parameters
    }

    /// Field or property type, constructed type, or method return type.
    pub fn member_type(&self) -> Option<&Type> {
        self.0.member_type.as_ref()
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.0.visibility
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.0.read_only
    }

    pub fn setter(&self) -> Option<Visibility> {
        self.0.setter
    }

    pub fn index_parameters(&self) -> usize {
        self.0.index_parameters
    }

    pub fn is_generic_method_definition(&self) -> bool {
        self.0.generic_method_definition
    }

    /// Number of values the member consumes.
    pub fn arity(&self) -> usize {
        match self.0.kind {
            MemberKind::Constructor | MemberKind::Method => self.0.parameters.len(),
            MemberKind::Field | MemberKind::Property => 1,
        }
    }

    /// Injection targets in declaration order.
    pub fn targets(&self) -> Vec<InjectionTarget<'_>> {
        match self.0.kind {
            MemberKind::Constructor | MemberKind::Method => self
                .0
                .parameters
                .iter()
                .map(|p| InjectionTarget {
                    kind: self.0.kind,
                    declaring_type: &self.0.declaring_type,
                    ty: &p.ty,
                    name: &p.name,
                })
                .collect(),
            MemberKind::Field | MemberKind::Property => self
                .0
                .member_type
                .iter()
                .map(|ty| InjectionTarget {
                    kind: self.0.kind,
                    declaring_type: &self.0.declaring_type,
                    ty,
                    name: &self.0.name,
                })
                .collect(),
        }
    }

    /// `Name(T1, T2)` style description.
    pub fn signature(&self) -> String {
        match self.0.kind {
            MemberKind::Constructor | MemberKind::Method => {
                let params = self
                    .0
                    .parameters
                    .iter()
                    .map(|p| p.ty.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", self.0.name, params)
            }
            MemberKind::Field | MemberKind::Property => format!("{} {}", self.0.kind, self.0.name),
        }
    }

    /// Run the member's invoker.
    pub fn invoke(&self, target: Option<&Instance>, arguments: &[Value]) -> Result<Value> {
        match &self.0.invoker {
            Some(invoker) => invoker(target, arguments),
            None => Err(ResolutionError::invocation_failed(
                self.signature(),
                "member has no invoker",
            )),
        }
    }
}

impl PartialEq for Member {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Member {}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.0.declaring_type.name(), self.signature())
    }
}

/// Builder for [`Member`] descriptors.
pub struct MemberBuilder {
    kind: MemberKind,
    name: String,
    declaring_type: Type,
    parameters: Vec<Parameter>,
    member_type: Option<Type>,
    visibility: Visibility,
    is_static: bool,
    read_only: bool,
    setter: Option<Visibility>,
    index_parameters: usize,
    generic_method_definition: bool,
    invoker: Option<Invoker>,
}

impl MemberBuilder {
    fn new(
        kind: MemberKind,
        name: impl Into<String>,
        declaring_type: &Type,
        member_type: Option<&Type>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            declaring_type: declaring_type.clone(),
            parameters: Vec::new(),
            member_type: member_type.cloned(),
            visibility: Visibility::Public,
            is_static: false,
            read_only: false,
            setter: None,
            index_parameters: 0,
            generic_method_definition: false,
            invoker: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: &Type) -> Self {
        self.parameters.push(Parameter::new(name, ty));
        self
    }

    pub fn ref_param(mut self, name: impl Into<String>, ty: &Type) -> Self {
        let mut parameter = Parameter::new(name, ty);
        parameter.modifier = ParameterModifier::Ref;
        self.parameters.push(parameter);
        self
    }

    pub fn out_param(mut self, name: impl Into<String>, ty: &Type) -> Self {
        let mut parameter = Parameter::new(name, ty);
        parameter.modifier = ParameterModifier::Out;
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, ty: &Type) -> Self {
        self.member_type = Some(ty.clone());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Property setter accessibility; `None` means the property has no setter.
    pub fn setter(mut self, setter: Option<Visibility>) -> Self {
        self.setter = setter;
        self
    }

    pub fn indexer(mut self, index_parameters: usize) -> Self {
        self.index_parameters = index_parameters;
        self
    }

    pub fn generic_method_definition(mut self) -> Self {
        self.generic_method_definition = true;
        self
    }

    pub fn invoker<F>(mut self, invoker: F) -> Self
    where
        F: Fn(Option<&Instance>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    /// Constructor body receiving the resolved arguments.
    pub fn constructs<F>(self, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Instance> + Send + Sync + 'static,
    {
        self.invoker(move |_, arguments| body(arguments).map(Some))
    }

    /// Field or property assignment.
    pub fn assigns<F>(self, body: F) -> Self
    where
        F: Fn(&Instance, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.invoker(move |target, arguments| {
            let target = target
                .ok_or_else(|| ResolutionError::invocation_failed(name.as_str(), "missing target"))?;
            body(target, arguments.first().cloned().flatten())?;
            Ok(None)
        })
    }

    pub fn build(self) -> Member {
        Member(Arc::new(MemberInfo {
            kind: self.kind,
            name: self.name,
            declaring_type: self.declaring_type,
            parameters: self.parameters,
            member_type: self.member_type,
            visibility: self.visibility,
            is_static: self.is_static,
            read_only: self.read_only,
            setter: self.setter,
            index_parameters: self.index_parameters,
            generic_method_definition: self.generic_method_definition,
            invoker: self.invoker,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_signature_and_targets() {
        let ty = Type::class("Service");
        let int = Type::value("i32");
        let string = Type::class("String");
        let ctor = Member::constructor(&ty)
            .param("count", &int)
            .param("label", &string)
            .build();

        assert_eq!(ctor.signature(), ".ctor(i32, String)");
        assert_eq!(ctor.arity(), 2);

        let targets = ctor.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].name, "label");
        assert_eq!(targets[1].ty, &string);
        assert_eq!(targets[0].declaring_type, &ty);
    }

    #[test]
    fn test_field_has_single_implicit_target() {
        let ty = Type::class("Service");
        let int = Type::value("i32");
        let field = Member::field(&ty, "Count", &int).build();

        assert!(field.parameters().is_empty());
        assert_eq!(field.arity(), 1);
        let targets = field.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Count");
        assert_eq!(targets[0].kind, MemberKind::Field);
    }

    #[test]
    fn test_member_identity() {
        let ty = Type::class("Service");
        let a = Member::constructor(&ty).build();
        let b = Member::constructor(&ty).build();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_invoke_without_invoker_fails() {
        let ty = Type::class("Service");
        let ctor = Member::constructor(&ty).build();
        assert!(matches!(
            ctor.invoke(None, &[]),
            Err(ResolutionError::InvocationFailed { .. })
        ));
    }

    #[test]
    fn test_constructs_returns_instance() {
        let ty = Type::class("Service");
        let ctor_ty = ty.clone();
        let ctor = Member::constructor(&ty)
            .constructs(move |_| Ok(Instance::new(&ctor_ty, 7u32)))
            .build();

        let value = ctor.invoke(None, &[]).unwrap().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&7));
    }
}
