use tessel_syntax::NodeId;

use crate::context::TypeContext;
use crate::entity::{
    Constraint, Entity, EntityKind, FieldDecl, FunctionDecl, ParentDecl, TemplateParam,
    TypeCategory, TypeDecl, Variance, Visibility,
};
use crate::ids::{EntityId, InstanceId, Symbol};

impl TypeContext {
    fn declare(&mut self, owner: Option<EntityId>, name: &str, kind: EntityKind) -> EntityId {
        let id = self.push_entity(Entity {
            name: Symbol::from(name),
            kind,
            owner,
            members: Vec::new(),
            template_params: Vec::new(),
            visibility: Visibility::Public,
            node: None,
        });
        if let Some(owner) = owner {
            self.entity_mut(owner).members.push(id);
        }
        id
    }

    pub fn declare_namespace(&mut self, owner: Option<EntityId>, name: &str) -> EntityId {
        self.declare(owner, name, EntityKind::Namespace)
    }

    pub fn declare_type(&mut self, owner: Option<EntityId>, name: &str, category: TypeCategory) -> EntityId {
        self.declare(owner, name, EntityKind::Type(TypeDecl::new(category)))
    }

    /// Appends a template parameter to `owner` (a type or a function).
    pub fn declare_template_param(&mut self, owner: EntityId, name: &str, variance: Variance) -> EntityId {
        let index = self.entity(owner).template_params.len();
        let id = self.push_entity(Entity {
            name: Symbol::from(name),
            kind: EntityKind::TemplateParam(TemplateParam {
                index,
                variance,
                constraint: Constraint::default(),
            }),
            owner: Some(owner),
            members: Vec::new(),
            template_params: Vec::new(),
            visibility: Visibility::Public,
            node: None,
        });
        self.entity_mut(owner).template_params.push(id);
        id
    }

    pub fn set_constraint(&mut self, param: EntityId, constraint: Constraint) {
        if let EntityKind::TemplateParam(tp) = &mut self.entity_mut(param).kind {
            tp.constraint = constraint;
        }
    }

    /// Declares a function the argument of `param` must provide, and records
    /// it in the parameter's constraint.
    pub fn require_function(&mut self, param: EntityId, name: &str, signature: FunctionDecl) -> EntityId {
        let function = self.declare(Some(param), name, EntityKind::Function(signature));
        if let EntityKind::TemplateParam(tp) = &mut self.entity_mut(param).kind {
            tp.constraint.functions.push(function);
        }
        function
    }

    /// `parent` is written in terms of `ty`'s own template parameters.
    pub fn add_parent(&mut self, ty: EntityId, parent: InstanceId, implementation: bool) {
        if let EntityKind::Type(decl) = &mut self.entity_mut(ty).kind {
            decl.parents.push(ParentDecl {
                ty: parent,
                implementation,
            });
        }
    }

    pub fn set_always_mutable(&mut self, ty: EntityId, always_mutable: bool) {
        if let EntityKind::Type(decl) = &mut self.entity_mut(ty).kind {
            decl.always_mutable = always_mutable;
        }
    }

    pub fn set_sealed(&mut self, ty: EntityId, sealed: bool) {
        if let EntityKind::Type(decl) = &mut self.entity_mut(ty).kind {
            decl.sealed = sealed;
        }
    }

    pub fn set_abstract(&mut self, ty: EntityId, is_abstract: bool) {
        if let EntityKind::Type(decl) = &mut self.entity_mut(ty).kind {
            decl.is_abstract = is_abstract;
        }
    }

    pub fn declare_field(&mut self, owner: EntityId, name: &str, ty: InstanceId) -> EntityId {
        self.declare(
            Some(owner),
            name,
            EntityKind::Field(FieldDecl {
                ty,
                reassignable: false,
            }),
        )
    }

    pub fn set_reassignable(&mut self, field: EntityId, reassignable: bool) {
        if let EntityKind::Field(decl) = &mut self.entity_mut(field).kind {
            decl.reassignable = reassignable;
        }
    }

    pub fn declare_function(&mut self, owner: Option<EntityId>, name: &str, signature: FunctionDecl) -> EntityId {
        self.declare(owner, name, EntityKind::Function(signature))
    }

    /// Replace a function's signature, typically once its template parameters exist.
    pub fn set_signature(&mut self, function: EntityId, signature: FunctionDecl) {
        if let EntityKind::Function(decl) = &mut self.entity_mut(function).kind {
            *decl = signature;
        }
    }

    pub fn set_visibility(&mut self, entity: EntityId, visibility: Visibility) {
        self.entity_mut(entity).visibility = visibility;
    }

    pub fn set_node(&mut self, entity: EntityId, node: NodeId) {
        self.entity_mut(entity).node = Some(node);
    }
}
