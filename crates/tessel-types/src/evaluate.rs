use crate::context::TypeContext;
use crate::entity::{EntityKind, TypeCategory};
use crate::error::TypeError;
use crate::ids::{EntityId, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvalState {
    InProgress,
    Done,
}

impl TypeContext {
    /// Evaluate every user declaration. Returns whether the program is free
    /// of errors afterwards. Re-entering a declaration that is still being
    /// evaluated means circular inheritance.
    pub fn evaluate_all(&mut self) -> bool {
        for index in EntityId::FIRST_USER..self.entity_count() as u32 {
            self.evaluate(EntityId(index));
        }
        !self.has_errors()
    }

    /// Evaluate `entity` unless already done. Returns `false` when it was
    /// re-entered while in progress.
    pub fn evaluate(&mut self, entity: EntityId) -> bool {
        match self.guards.evaluation.get(&entity).copied() {
            Some(EvalState::Done) => return true,
            Some(EvalState::InProgress) => {
                let context = self
                    .guards
                    .evaluation_stack
                    .last()
                    .and_then(|&e| self.entity(e).node);
                let name = self.name(entity).to_string();
                tracing::debug!(target: "tessel::evaluate", entity = %name, "circular reference");
                let node = self.entity(entity).node;
                self.report(TypeError::CircularReference { name }, node, context);
                return false;
            }
            None => {}
        }
        self.guards.evaluation.insert(entity, EvalState::InProgress);
        self.guards.evaluation_stack.push(entity);

        match self.entity(entity).kind.clone() {
            EntityKind::Type(decl) => {
                for parent in &decl.parents {
                    self.evaluate_parent(entity, parent.ty);
                }
                if !decl.is_abstract && decl.category != TypeCategory::Protocol {
                    self.check_implementations(entity);
                }
            }
            EntityKind::Function(decl) => {
                let node = self.entity(entity).node;
                for param in &decl.params {
                    self.check_instance_constraints(param.ty, node);
                }
                self.check_instance_constraints(decl.result, node);
            }
            EntityKind::Field(field) => {
                let node = self.entity(entity).node;
                self.check_instance_constraints(field.ty, node);
            }
            EntityKind::TemplateParam(param) => {
                let node = self.entity(entity).node;
                for bound in param.constraint.inherits.iter().chain(&param.constraint.base_of) {
                    self.check_instance_constraints(*bound, node);
                }
            }
            EntityKind::Joker | EntityKind::Namespace | EntityKind::Aggregate(_) => {}
        }

        let children: Vec<EntityId> = {
            let e = self.entity(entity);
            e.template_params.iter().chain(&e.members).copied().collect()
        };
        for child in children {
            self.evaluate(child);
        }

        self.guards.evaluation_stack.pop();
        self.guards.evaluation.insert(entity, EvalState::Done);
        true
    }

    fn evaluate_parent(&mut self, entity: EntityId, parent: InstanceId) {
        let node = self.entity(entity).node;
        let target = self.target_of(parent);
        if !self.evaluate(target) {
            return;
        }
        if self.entity(target).as_type().is_some_and(|t| t.sealed) {
            let name = self.name(target).to_string();
            self.report(TypeError::SealedInheritance { name }, node, None);
        }
        self.check_instance_constraints(parent, node);
    }

    /// Every abstract member of a protocol ancestor needs a concrete
    /// counterpart on a concrete type.
    fn check_implementations(&mut self, entity: EntityId) {
        let node = self.entity(entity).node;
        let instance = self.plain(entity);
        let protocols: Vec<InstanceId> = self
            .ancestors(instance)
            .into_iter()
            .filter(|a| self.entity(a.target).category() == Some(TypeCategory::Protocol))
            .map(|a| a.instance)
            .collect();
        for protocol in protocols {
            for need in self.abstract_members(protocol) {
                if self.find_implementation(instance, need).is_none() {
                    let ty = self.display(instance);
                    let function = self.name(need.function).to_string();
                    let protocol = self.display(protocol);
                    self.report(
                        TypeError::MissingImplementation {
                            ty,
                            function,
                            protocol,
                        },
                        node,
                        None,
                    );
                }
            }
        }
    }
}
