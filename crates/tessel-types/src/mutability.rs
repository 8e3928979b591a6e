use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::MutabilityMode;
use crate::context::TypeContext;
use crate::entity::{Constraint, EntityKind};
use crate::ids::InstanceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutabilityKind {
    /// No override. As a matching target: neutral.
    #[default]
    Unspecified,
    ForceMutable,
    ForceConst,
    /// Read-only view.
    ConstAsSource,
    /// Template parameter without a mutability requirement.
    GenericUnknown,
    /// Literals: usable as either.
    DualConstMutable,
}

impl MutabilityKind {
    pub fn is_const_like(self) -> bool {
        matches!(self, MutabilityKind::ForceConst | MutabilityKind::ConstAsSource)
    }

    pub fn is_mutable_like(self) -> bool {
        matches!(self, MutabilityKind::ForceMutable | MutabilityKind::GenericUnknown)
    }

    pub fn is_forced(self) -> bool {
        self != MutabilityKind::Unspecified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mutability {
    pub kind: MutabilityKind,
    /// The slot holding the value may be re-bound.
    pub reassignable: bool,
}

impl Mutability {
    pub const NONE: Mutability = Mutability::new(MutabilityKind::Unspecified);
    pub const MUTABLE: Mutability = Mutability::new(MutabilityKind::ForceMutable);
    pub const CONST: Mutability = Mutability::new(MutabilityKind::ForceConst);
    pub const READ_ONLY: Mutability = Mutability::new(MutabilityKind::ConstAsSource);
    pub const UNKNOWN: Mutability = Mutability::new(MutabilityKind::GenericUnknown);
    pub const LITERAL: Mutability = Mutability::new(MutabilityKind::DualConstMutable);
    pub const REASSIGNABLE: Mutability = Mutability {
        kind: MutabilityKind::Unspecified,
        reassignable: true,
    };

    pub const fn new(kind: MutabilityKind) -> Self {
        Self {
            kind,
            reassignable: false,
        }
    }

    pub fn reassignable(self) -> Self {
        Self {
            reassignable: true,
            ..self
        }
    }

    /// `self` layered over `under`: a forced kind wins, reassignability accumulates.
    pub fn overlay(self, under: Mutability) -> Mutability {
        Mutability {
            kind: if self.kind.is_forced() { self.kind } else { under.kind },
            reassignable: self.reassignable || under.reassignable,
        }
    }
}

/// Whether a value of mutability `input` may flow into a slot of mutability `target`.
pub fn mutability_matches(input: Mutability, target: Mutability, mode: MutabilityMode) -> bool {
    let kinds_ok = !mode.checks_mutability() || kinds_compatible(input.kind, target.kind);
    let assign_ok = !mode.checks_assignability() || !target.reassignable || input.reassignable;
    kinds_ok && assign_ok
}

fn kinds_compatible(input: MutabilityKind, target: MutabilityKind) -> bool {
    use MutabilityKind::*;
    match (input, target) {
        (_, Unspecified) | (Unspecified, _) => true,
        (DualConstMutable, _) | (_, DualConstMutable) => true,
        (i, t) if i.is_const_like() => t.is_const_like(),
        (_, t) => t.is_mutable_like(),
    }
}

impl TypeContext {
    /// Deep mutability of a value of type `id`. Types that fix nothing are
    /// read-only.
    pub fn mutability_of_type(&mut self, id: InstanceId) -> Mutability {
        self.deep_mutability(id, MutabilityKind::ConstAsSource)
    }

    /// Deep mutability of `id` as a matching target: types that fix nothing
    /// are neutral and accept either kind.
    pub fn target_mutability(&mut self, id: InstanceId) -> Mutability {
        self.deep_mutability(id, MutabilityKind::Unspecified)
    }

    fn deep_mutability(&mut self, id: InstanceId, fallback: MutabilityKind) -> Mutability {
        if let Some(&cached) = self.caches.mutability.get(&(id, fallback)) {
            return cached;
        }
        let mut visiting = FxHashSet::default();
        let result = self.deep_mutability_inner(id, fallback, &mut visiting);
        self.caches.mutability.insert((id, fallback), result);
        result
    }

    fn deep_mutability_inner(
        &mut self,
        id: InstanceId,
        fallback: MutabilityKind,
        visiting: &mut FxHashSet<InstanceId>,
    ) -> Mutability {
        let inst = *self.instance(id);
        let reassignable =
            inst.mutability.reassignable && self.config().mutability_mode.checks_assignability();
        if inst.mutability.kind.is_forced() {
            return Mutability {
                kind: inst.mutability.kind,
                reassignable,
            };
        }
        // A cycle contributes nothing
        if !visiting.insert(id) {
            return Mutability {
                kind: fallback,
                reassignable,
            };
        }

        let kind = match &self.entity(inst.target).kind {
            EntityKind::Joker => MutabilityKind::DualConstMutable,
            EntityKind::TemplateParam(param) => param_mutability(&param.constraint, fallback),
            EntityKind::Type(decl) if decl.always_mutable => MutabilityKind::ForceMutable,
            EntityKind::Type(decl) if decl.category.is_pointer_like() => {
                match self.template_arg(id, 0) {
                    Some(referent) => self.deep_mutability_inner(referent, fallback, visiting).kind,
                    None => fallback,
                }
            }
            EntityKind::Aggregate(agg) => {
                let members = agg.members.clone();
                let any_mutable = members.into_iter().any(|m| {
                    self.deep_mutability_inner(m, fallback, visiting)
                        .kind
                        .is_mutable_like()
                });
                if any_mutable {
                    MutabilityKind::ForceMutable
                } else {
                    fallback
                }
            }
            _ => {
                let args: Vec<InstanceId> = self.template_args(id).into_iter().flatten().collect();
                let any_mutable = args.into_iter().any(|arg| {
                    self.deep_mutability_inner(arg, fallback, visiting)
                        .kind
                        .is_mutable_like()
                });
                if any_mutable {
                    MutabilityKind::ForceMutable
                } else {
                    fallback
                }
            }
        };

        visiting.remove(&id);
        Mutability { kind, reassignable }
    }

    /// Mutability of the handle itself, ignoring template arguments and referents.
    pub fn surface_mutability(&mut self, id: InstanceId) -> Mutability {
        if let Some(&cached) = self.caches.surface_mutability.get(&id) {
            return cached;
        }
        let inst = *self.instance(id);
        let reassignable =
            inst.mutability.reassignable && self.config().mutability_mode.checks_assignability();
        let kind = if inst.mutability.kind.is_forced() {
            inst.mutability.kind
        } else {
            match &self.entity(inst.target).kind {
                EntityKind::Joker => MutabilityKind::DualConstMutable,
                EntityKind::TemplateParam(param) => {
                    param_mutability(&param.constraint, MutabilityKind::ConstAsSource)
                }
                EntityKind::Type(decl) if decl.always_mutable => MutabilityKind::ForceMutable,
                _ => MutabilityKind::ConstAsSource,
            }
        };
        let result = Mutability { kind, reassignable };
        self.caches.surface_mutability.insert(id, result);
        result
    }
}

/// A parameter's own requirement; unconstrained parameters are unknown,
/// except as a matching target where they stay neutral.
fn param_mutability(constraint: &Constraint, fallback: MutabilityKind) -> MutabilityKind {
    match constraint.mutable {
        Some(true) => MutabilityKind::ForceMutable,
        Some(false) => MutabilityKind::ForceConst,
        None if fallback == MutabilityKind::Unspecified => MutabilityKind::Unspecified,
        None => MutabilityKind::GenericUnknown,
    }
}
