use serde::{Deserialize, Serialize};
use tessel_syntax::{AccessorKind, NodeId};

use crate::ids::{EntityId, InstanceId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// A declared symbol. Owns its member declarations.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: Symbol,
    pub kind: EntityKind,
    pub owner: Option<EntityId>,
    pub members: Vec<EntityId>,
    /// Ordered template parameters (entities of kind `TemplateParam`).
    pub template_params: Vec<EntityId>,
    pub visibility: Visibility,
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Joker,
    Namespace,
    Type(TypeDecl),
    Function(FunctionDecl),
    Field(FieldDecl),
    TemplateParam(TemplateParam),
    /// Synthesized union or intersection.
    Aggregate(Aggregate),
}

impl Entity {
    pub fn as_type(&self) -> Option<&TypeDecl> {
        match &self.kind {
            EntityKind::Type(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            EntityKind::Function(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDecl> {
        match &self.kind {
            EntityKind::Field(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_template_param(&self) -> Option<&TemplateParam> {
        match &self.kind {
            EntityKind::TemplateParam(param) => Some(param),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&Aggregate> {
        match &self.kind {
            EntityKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<TypeCategory> {
        self.as_type().map(|decl| decl.category)
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, EntityKind::Type(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, EntityKind::Function(_))
    }

    pub fn is_template_param(&self) -> bool {
        matches!(self.kind, EntityKind::TemplateParam(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    /// Reference semantics.
    #[default]
    Class,
    /// Copied by value; substituting a subtype slices it.
    Value,
    /// Abstract interface, satisfiable nominally or structurally.
    Protocol,
    Enum,
    Reference,
    Pointer,
}

impl TypeCategory {
    pub fn is_pointer_like(self) -> bool {
        matches!(self, TypeCategory::Reference | TypeCategory::Pointer)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub category: TypeCategory,
    pub parents: Vec<ParentDecl>,
    pub always_mutable: bool,
    pub sealed: bool,
    pub is_abstract: bool,
}

impl TypeDecl {
    pub fn new(category: TypeCategory) -> Self {
        Self {
            category,
            parents: Vec::new(),
            always_mutable: false,
            sealed: false,
            is_abstract: false,
        }
    }
}

/// A declared parent, expressed in terms of the child's own template parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentDecl {
    pub ty: InstanceId,
    /// Implementation base (as opposed to an interface-only parent).
    pub implementation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Method,
    Constructor { implicit: bool },
    Conversion { implicit: bool },
    Accessor(AccessorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Required,
    /// Has a default value.
    Optional,
    Variadic { min: u32, max: Option<u32> },
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::Variadic { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Symbol,
    /// For variadic parameters, the element type.
    pub ty: InstanceId,
    pub kind: ParamKind,
    /// The callee keeps a reference to this argument.
    pub attached: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub params: Vec<Parameter>,
    pub result: InstanceId,
    pub role: FunctionRole,
    pub is_abstract: bool,
    pub is_static: bool,
    /// Requires a mutable receiver.
    pub mutating: bool,
}

impl FunctionDecl {
    pub fn new(result: InstanceId) -> Self {
        Self {
            params: Vec::new(),
            result,
            role: FunctionRole::Method,
            is_abstract: false,
            is_static: false,
            mutating: false,
        }
    }

    pub fn param(self, name: &str, ty: InstanceId) -> Self {
        self.with_param(name, ty, ParamKind::Required)
    }

    pub fn optional(self, name: &str, ty: InstanceId) -> Self {
        self.with_param(name, ty, ParamKind::Optional)
    }

    pub fn variadic(self, name: &str, ty: InstanceId, min: u32, max: Option<u32>) -> Self {
        self.with_param(name, ty, ParamKind::Variadic { min, max })
    }

    pub fn with_param(mut self, name: &str, ty: InstanceId, kind: ParamKind) -> Self {
        self.params.push(Parameter {
            name: Symbol::from(name),
            ty,
            kind,
            attached: false,
        });
        self
    }

    /// Marks the most recently added parameter as attached.
    pub fn attached(mut self) -> Self {
        if let Some(last) = self.params.last_mut() {
            last.attached = true;
        }
        self
    }

    pub fn role(mut self, role: FunctionRole) -> Self {
        self.role = role;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.role, FunctionRole::Constructor { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub ty: InstanceId,
    pub reassignable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variance {
    /// Invariant.
    #[default]
    None,
    /// Contravariant.
    In,
    /// Covariant.
    Out,
}

impl Variance {
    /// Variance of a position declared `self` nested inside a position of variance `outer`.
    pub fn compose(self, outer: Variance) -> Variance {
        match (self, outer) {
            (Variance::None, _) | (_, Variance::None) => Variance::None,
            (Variance::Out, v) => v,
            (Variance::In, v) => v.flip(),
        }
    }

    pub fn flip(self) -> Variance {
        match self {
            Variance::In => Variance::Out,
            Variance::Out => Variance::In,
            Variance::None => Variance::None,
        }
    }
}

/// Requirements on a template argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    /// The argument must inherit every bound.
    pub inherits: Vec<InstanceId>,
    /// Every bound must inherit the argument.
    pub base_of: Vec<InstanceId>,
    /// `Some(true)` requires a mutable argument, `Some(false)` a const one.
    pub mutable: Option<bool>,
    pub reassignable: bool,
    /// Member functions the argument must provide. Declared as members of the parameter.
    pub functions: Vec<EntityId>,
}

impl Constraint {
    pub fn is_empty(&self) -> bool {
        self.inherits.is_empty()
            && self.base_of.is_empty()
            && self.mutable.is_none()
            && !self.reassignable
            && self.functions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateParam {
    pub index: usize,
    pub variance: Variance,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKind {
    Union,
    Intersection,
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub members: Vec<InstanceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_composition() {
        assert_eq!(Variance::Out.compose(Variance::Out), Variance::Out);
        assert_eq!(Variance::In.compose(Variance::Out), Variance::In);
        assert_eq!(Variance::Out.compose(Variance::In), Variance::In);
        assert_eq!(Variance::In.compose(Variance::In), Variance::Out);
        assert_eq!(Variance::None.compose(Variance::In), Variance::None);
        assert_eq!(Variance::Out.compose(Variance::None), Variance::None);
    }

    #[test]
    fn test_function_builder() {
        let decl = FunctionDecl::new(InstanceId::ROOT)
            .param("a", InstanceId::ROOT)
            .variadic("rest", InstanceId::ROOT, 1, Some(3))
            .attached()
            .mutating();
        assert_eq!(decl.params.len(), 2);
        assert!(!decl.params[0].attached);
        assert!(decl.params[1].attached);
        assert!(decl.params[1].kind.is_variadic());
        assert!(decl.mutating);
    }
}
