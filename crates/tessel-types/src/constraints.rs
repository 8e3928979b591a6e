use tessel_syntax::NodeId;

use crate::context::TypeContext;
use crate::error::TypeError;
use crate::ids::{EntityId, InstanceId, TranslationId};
use crate::matcher::MatchOptions;
use crate::mutability::{Mutability, MutabilityKind};
use crate::vtable::MemberRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Inherits { bound: InstanceId },
    BaseOf { bound: InstanceId },
    Mutability,
    Assignability,
    MissingFunction { function: EntityId },
}

/// Bounds compare types only; mutability has its own requirement.
const BOUND_OPTIONS: MatchOptions = MatchOptions {
    mutability: false,
    ..MatchOptions::STRICT
};

impl TypeContext {
    /// Check `argument` against the constraint of `param`. Bounds are written
    /// in terms of the owner's parameters and are read through `table`.
    pub fn check_constraint(
        &mut self,
        param: EntityId,
        argument: InstanceId,
        table: TranslationId,
    ) -> Vec<ConstraintViolation> {
        let Some(constraint) = self
            .entity(param)
            .as_template_param()
            .map(|p| p.constraint.clone())
        else {
            return Vec::new();
        };
        if argument.is_joker() || constraint.is_empty() {
            return Vec::new();
        }

        let mut violations = Vec::new();
        for bound in constraint.inherits {
            let bound = self.translate_through(bound, table);
            if self
                .matches_with(argument.into(), bound.into(), BOUND_OPTIONS)
                .is_no()
            {
                violations.push(ConstraintViolation::Inherits { bound });
            }
        }
        for bound in constraint.base_of {
            let bound = self.translate_through(bound, table);
            if self
                .matches_with(bound.into(), argument.into(), BOUND_OPTIONS)
                .is_no()
            {
                violations.push(ConstraintViolation::BaseOf { bound });
            }
        }

        let mode = self.config().mutability_mode;
        if mode.checks_mutability() {
            let ok = match constraint.mutable {
                Some(true) => {
                    let kind = self.mutability_of_type(argument).kind;
                    kind.is_mutable_like() || kind == MutabilityKind::DualConstMutable
                }
                Some(false) => self.surface_mutability(argument).kind != MutabilityKind::ForceMutable,
                None => true,
            };
            if !ok {
                violations.push(ConstraintViolation::Mutability);
            }
        }
        if mode.checks_assignability() && constraint.reassignable && !self.surface_mutability(argument).reassignable {
            violations.push(ConstraintViolation::Assignability);
        }

        if !constraint.functions.is_empty() {
            let with_argument = self.translation(table).with(param, argument);
            let with_argument = self.intern_translation(with_argument);
            for function in constraint.functions {
                let need = MemberRef {
                    function,
                    table: with_argument,
                };
                if !self.provides(argument, need) {
                    violations.push(ConstraintViolation::MissingFunction { function });
                }
            }
        }
        violations
    }

    /// Whether `instance` has a member standing in for `need`. An open
    /// parameter may rely on the abstract members of its bounds.
    fn provides(&mut self, instance: InstanceId, need: MemberRef) -> bool {
        if self.entity(self.target_of(instance)).is_template_param() {
            let members = self.callable_members(instance);
            return members
                .into_iter()
                .any(|have| self.signatures_compatible(have, need));
        }
        self.find_implementation(instance, need).is_some()
    }

    /// Check every bound template argument of `instance` and report the
    /// violations. Returns whether all constraints hold.
    pub fn check_instance_constraints(&mut self, instance: InstanceId, node: Option<NodeId>) -> bool {
        let inst = *self.instance(instance);
        let params = self.entity(inst.target).template_params.clone();
        let mut ok = true;
        for param in params {
            let Some(argument) = self.translation(inst.translation).get(param) else {
                continue;
            };
            for violation in self.check_constraint(param, argument, inst.translation) {
                self.report_violation(param, argument, violation, node);
                ok = false;
            }
        }
        ok
    }

    pub(crate) fn report_violation(
        &mut self,
        param: EntityId,
        argument: InstanceId,
        violation: ConstraintViolation,
        node: Option<NodeId>,
    ) {
        let ty = self.display(argument);
        let param_name = self.name(param).to_string();
        let error = match violation {
            ConstraintViolation::Inherits { bound } => TypeError::InheritsConstraint {
                ty,
                bound: self.display(bound),
                param: param_name,
            },
            ConstraintViolation::BaseOf { bound } => TypeError::BaseOfConstraint {
                ty,
                bound: self.display(bound),
                param: param_name,
            },
            ConstraintViolation::Mutability => TypeError::MutabilityConstraint {
                ty,
                param: param_name,
            },
            ConstraintViolation::Assignability => TypeError::AssignabilityConstraint {
                ty,
                param: param_name,
            },
            ConstraintViolation::MissingFunction { function } => TypeError::MissingFunctionConstraint {
                ty,
                function: self.name(function).to_string(),
                param: param_name,
            },
        };
        self.report(error, node, None);
    }

    /// Instantiate `entity` as written in the program. A wrong argument count
    /// or a violated constraint is reported and yields the Joker. No
    /// arguments at all names the bare generic.
    pub fn instantiate_checked(
        &mut self,
        entity: EntityId,
        args: &[InstanceId],
        mutability: Mutability,
        node: Option<NodeId>,
    ) -> InstanceId {
        let expected = self.entity(entity).template_params.len();
        if !args.is_empty() && args.len() != expected {
            let name = self.name(entity).to_string();
            self.report(
                TypeError::TemplateArity {
                    name,
                    expected,
                    found: args.len(),
                },
                node,
                None,
            );
            return InstanceId::JOKER;
        }
        let instance = self.instantiate_with(entity, args, mutability);
        if self.check_instance_constraints(instance, node) {
            instance
        } else {
            InstanceId::JOKER
        }
    }
}
