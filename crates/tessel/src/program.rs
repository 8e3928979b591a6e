//! JSON program descriptions and how they become declarations.
//!
//! Loading runs in two phases. The first declares every type, function and
//! template parameter so that names resolve regardless of order; the second
//! resolves type expressions into parents, constraints, fields and
//! signatures.

use std::path::Path;

use serde::Deserialize;
use tessel_types::{
    Config, Constraint, EntityId, FunctionDecl, FunctionRole, InstanceId, Mutability, ParamKind,
    TypeCategory, TypeContext, Variance, Visibility,
};
use thiserror::Error;

use crate::type_expr::{self, TypeExpr, TypeExprError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed program: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad type expression `{text}`: {source}")]
    TypeExpr {
        text: String,
        #[source]
        source: TypeExprError,
    },
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("`{0}` is declared twice")]
    Duplicate(String),
    #[error("`{name}` expects {expected} template argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("template parameter `{0}` takes no template arguments")]
    ParamWithArgs(String),
    #[error("`{0}` is not a type")]
    NotAType(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Program {
    pub config: Config,
    pub types: Vec<TypeSpec>,
    pub functions: Vec<FunctionSpec>,
    pub queries: Vec<Query>,
}

impl Program {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub category: TypeCategory,
    #[serde(default)]
    pub template: Vec<TemplateSpec>,
    /// Implementation bases.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Interface-only parents.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub always_mutable: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub methods: Vec<FunctionSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default)]
    pub variance: Variance,
    #[serde(default)]
    pub inherits: Vec<String>,
    #[serde(default)]
    pub base_of: Vec<String>,
    #[serde(default)]
    pub mutable: Option<bool>,
    #[serde(default)]
    pub reassignable: bool,
    /// Functions the argument must provide.
    #[serde(default)]
    pub requires: Vec<FunctionSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub reassignable: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSpec {
    #[default]
    Method,
    Constructor,
    ImplicitConstructor,
    Conversion,
    ImplicitConversion,
}

impl From<RoleSpec> for FunctionRole {
    fn from(role: RoleSpec) -> Self {
        match role {
            RoleSpec::Method => FunctionRole::Method,
            RoleSpec::Constructor => FunctionRole::Constructor { implicit: false },
            RoleSpec::ImplicitConstructor => FunctionRole::Constructor { implicit: true },
            RoleSpec::Conversion => FunctionRole::Conversion { implicit: false },
            RoleSpec::ImplicitConversion => FunctionRole::Conversion { implicit: true },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub template: Vec<TemplateSpec>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Defaults to `Object`.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub role: RoleSpec,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub mutating: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKindSpec {
    #[default]
    Required,
    Optional,
    Variadic,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub kind: ParamKindSpec,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub attached: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum Query {
    /// Does `input` fit where `target` is expected?
    Match { input: String, target: String },
    Cast { input: String, target: String },
    /// Look a member up on a type; fields report their translated type.
    Member {
        #[serde(rename = "type")]
        ty: String,
        name: String,
    },
    Mutability {
        #[serde(rename = "type")]
        ty: String,
    },
    /// Resolve a call to a top-level function, or to a method when a
    /// receiver is given.
    Call {
        function: String,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        args: Vec<ArgSpec>,
    },
    Ancestors {
        #[serde(rename = "type")]
        ty: String,
    },
}

/// A call argument: either just a type, or a type with a label or spread.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArgSpec {
    Plain(String),
    Full {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        spread: bool,
    },
}

/// Build a context holding every declaration of `program`.
pub fn load(program: &Program) -> Result<TypeContext, LoadError> {
    let mut loader = Loader {
        ctx: TypeContext::with_config(program.config),
        pending_types: Vec::new(),
        pending_functions: Vec::new(),
    };
    loader.declare_all(program)?;
    loader.define_all()?;
    Ok(loader.ctx)
}

/// Resolve a type expression against top-level declarations.
pub fn resolve_type(ctx: &mut TypeContext, text: &str) -> Result<InstanceId, LoadError> {
    let expr = parse_expr(text)?;
    lower(ctx, &expr, None)
}

struct Loader<'p> {
    ctx: TypeContext,
    pending_types: Vec<(EntityId, &'p TypeSpec)>,
    pending_functions: Vec<(EntityId, &'p FunctionSpec)>,
}

impl<'p> Loader<'p> {
    fn declare_all(&mut self, program: &'p Program) -> Result<(), LoadError> {
        for spec in &program.types {
            if self.ctx.lookup(None, &spec.name).is_some() {
                return Err(LoadError::Duplicate(spec.name.clone()));
            }
            let ty = self.ctx.declare_type(None, &spec.name, spec.category);
            self.ctx.set_sealed(ty, spec.sealed);
            self.ctx.set_abstract(ty, spec.is_abstract);
            self.ctx.set_always_mutable(ty, spec.always_mutable);
            for param in &spec.template {
                self.ctx.declare_template_param(ty, &param.name, param.variance);
            }
            for method in &spec.methods {
                self.declare_function(Some(ty), method);
            }
            self.pending_types.push((ty, spec));
        }
        for spec in &program.functions {
            self.declare_function(None, spec);
        }
        Ok(())
    }

    /// Declares with a placeholder signature, filled in by `define_all`.
    fn declare_function(&mut self, owner: Option<EntityId>, spec: &'p FunctionSpec) {
        let function = self
            .ctx
            .declare_function(owner, &spec.name, FunctionDecl::new(InstanceId::ROOT));
        self.ctx.set_visibility(function, spec.visibility);
        for param in &spec.template {
            self.ctx.declare_template_param(function, &param.name, param.variance);
        }
        self.pending_functions.push((function, spec));
    }

    fn define_all(&mut self) -> Result<(), LoadError> {
        for (ty, spec) in std::mem::take(&mut self.pending_types) {
            for parent in &spec.parents {
                let parent = self.resolve(parent, ty)?;
                self.ctx.add_parent(ty, parent, true);
            }
            for interface in &spec.interfaces {
                let interface = self.resolve(interface, ty)?;
                self.ctx.add_parent(ty, interface, false);
            }
            self.define_template(ty, &spec.template)?;
            for field in &spec.fields {
                let field_ty = self.resolve(&field.ty, ty)?;
                let id = self.ctx.declare_field(ty, &field.name, field_ty);
                self.ctx.set_reassignable(id, field.reassignable);
                self.ctx.set_visibility(id, field.visibility);
            }
        }
        for (function, spec) in std::mem::take(&mut self.pending_functions) {
            self.define_template(function, &spec.template)?;
            let signature = self.signature(spec, function)?;
            self.ctx.set_signature(function, signature);
        }
        Ok(())
    }

    fn define_template(&mut self, owner: EntityId, specs: &[TemplateSpec]) -> Result<(), LoadError> {
        let params = self.ctx.entity(owner).template_params.clone();
        for (param, spec) in params.into_iter().zip(specs) {
            let inherits = spec
                .inherits
                .iter()
                .map(|text| self.resolve(text, owner))
                .collect::<Result<Vec<_>, _>>()?;
            let base_of = spec
                .base_of
                .iter()
                .map(|text| self.resolve(text, owner))
                .collect::<Result<Vec<_>, _>>()?;
            self.ctx.set_constraint(
                param,
                Constraint {
                    inherits,
                    base_of,
                    mutable: spec.mutable,
                    reassignable: spec.reassignable,
                    functions: Vec::new(),
                },
            );
            for required in &spec.requires {
                let signature = self.signature(required, owner)?;
                self.ctx.require_function(param, &required.name, signature);
            }
        }
        Ok(())
    }

    /// Signature of `spec`, with names resolved from inside `scope`.
    fn signature(&mut self, spec: &FunctionSpec, scope: EntityId) -> Result<FunctionDecl, LoadError> {
        let result = match &spec.result {
            Some(text) => self.resolve(text, scope)?,
            None => InstanceId::ROOT,
        };
        let mut decl = FunctionDecl::new(result).role(spec.role.into());
        for param in &spec.params {
            let ty = self.resolve(&param.ty, scope)?;
            let kind = match param.kind {
                ParamKindSpec::Required => ParamKind::Required,
                ParamKindSpec::Optional => ParamKind::Optional,
                ParamKindSpec::Variadic => ParamKind::Variadic {
                    min: param.min,
                    max: param.max,
                },
            };
            decl = decl.with_param(&param.name, ty, kind);
            if param.attached {
                decl = decl.attached();
            }
        }
        if spec.is_abstract {
            decl = decl.abstract_();
        }
        if spec.is_static {
            decl = decl.static_();
        }
        if spec.mutating {
            decl = decl.mutating();
        }
        Ok(decl)
    }

    fn resolve(&mut self, text: &str, scope: EntityId) -> Result<InstanceId, LoadError> {
        let expr = parse_expr(text)?;
        lower(&mut self.ctx, &expr, Some(scope))
    }
}

fn parse_expr(text: &str) -> Result<TypeExpr, LoadError> {
    type_expr::parse(text).map_err(|source| LoadError::TypeExpr {
        text: text.to_string(),
        source,
    })
}

/// Find `name` in `scope`, its enclosing declarations, then at top level.
fn lookup_name(ctx: &TypeContext, name: &str, scope: Option<EntityId>) -> Option<EntityId> {
    let mut current = scope;
    while let Some(owner) = current {
        if let Some(found) = ctx.lookup(Some(owner), name) {
            if ctx.entity(found).is_template_param() {
                return Some(found);
            }
        }
        current = ctx.entity(owner).owner;
    }
    ctx.lookup(None, name)
}

fn lower(ctx: &mut TypeContext, expr: &TypeExpr, scope: Option<EntityId>) -> Result<InstanceId, LoadError> {
    match expr {
        TypeExpr::Named { name, args } => {
            if name == "?" {
                return Ok(InstanceId::JOKER);
            }
            let entity = lookup_name(ctx, name, scope).ok_or_else(|| LoadError::UnknownType(name.clone()))?;
            if ctx.entity(entity).is_template_param() {
                if !args.is_empty() {
                    return Err(LoadError::ParamWithArgs(name.clone()));
                }
                return Ok(ctx.param(entity));
            }
            if !ctx.entity(entity).is_type() {
                return Err(LoadError::NotAType(name.clone()));
            }
            if args.is_empty() {
                return Ok(ctx.plain(entity));
            }
            let expected = ctx.entity(entity).template_params.len();
            if args.len() != expected {
                return Err(LoadError::Arity {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                });
            }
            let args = args
                .iter()
                .map(|arg| lower(ctx, arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ctx.instantiate(entity, &args))
        }
        TypeExpr::Mutable(inner) => with_mutability(ctx, inner, scope, Mutability::MUTABLE),
        TypeExpr::Const(inner) => with_mutability(ctx, inner, scope, Mutability::CONST),
        TypeExpr::ReadOnly(inner) => with_mutability(ctx, inner, scope, Mutability::READ_ONLY),
        TypeExpr::Reassignable(inner) => with_mutability(ctx, inner, scope, Mutability::REASSIGNABLE),
        TypeExpr::Reference(inner) => {
            let referent = lower(ctx, inner, scope)?;
            Ok(ctx.reference_to(referent))
        }
        TypeExpr::Pointer(inner) => {
            let referent = lower(ctx, inner, scope)?;
            Ok(ctx.pointer_to(referent))
        }
        TypeExpr::Union(members) => {
            let members = members
                .iter()
                .map(|m| lower(ctx, m, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ctx.union_of(&members, None))
        }
        TypeExpr::Intersection(members) => {
            let members = members
                .iter()
                .map(|m| lower(ctx, m, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ctx.intersection_of(&members))
        }
    }
}

fn with_mutability(
    ctx: &mut TypeContext,
    inner: &TypeExpr,
    scope: Option<EntityId>,
    mutability: Mutability,
) -> Result<InstanceId, LoadError> {
    let base = lower(ctx, inner, scope)?;
    Ok(ctx.with_mutability(base, mutability))
}
