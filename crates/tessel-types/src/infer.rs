use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::TypeContext;
use crate::entity::{AggregateKind, Variance};
use crate::ids::{EntityId, InstanceId};
use crate::matcher::MatchOptions;
use crate::mutability::Mutability;

#[derive(Debug, Clone, Default)]
pub(crate) struct ParamBounds {
    exact: Vec<InstanceId>,
    lower: Vec<InstanceId>,
    upper: Vec<InstanceId>,
}

impl ParamBounds {
    fn push(&mut self, value: InstanceId, polarity: Variance) {
        let list = match polarity {
            Variance::None => &mut self.exact,
            Variance::Out => &mut self.lower,
            Variance::In => &mut self.upper,
        };
        if !list.contains(&value) {
            list.push(value);
        }
    }
}

struct Unifier<'a> {
    open: &'a [EntityId],
    bounds: FxHashMap<EntityId, ParamBounds>,
    visited: FxHashSet<(InstanceId, InstanceId, Variance)>,
}

impl TypeContext {
    /// Infer the open parameters `open` from `(argument, pattern)` pairs.
    /// Returns the bindings in `open` order, or the first parameter nothing
    /// could be inferred for.
    ///
    /// Invariant positions give exact values, covariant ones lower bounds and
    /// contravariant ones upper bounds.
    pub(crate) fn infer_arguments(
        &mut self,
        open: &[EntityId],
        pairs: &[(InstanceId, InstanceId)],
    ) -> Result<Vec<(EntityId, InstanceId)>, EntityId> {
        let mut unifier = Unifier {
            open,
            bounds: FxHashMap::default(),
            visited: FxHashSet::default(),
        };
        for &(argument, pattern) in pairs {
            self.unify(&mut unifier, argument, pattern, Variance::Out);
        }
        let mut bindings = Vec::with_capacity(open.len());
        for &param in open {
            let bounds = unifier.bounds.remove(&param).unwrap_or_default();
            match self.solve_param(param, &bounds) {
                Some(value) => bindings.push((param, value)),
                None => {
                    tracing::debug!(
                        target: "tessel::call",
                        param = %self.name(param),
                        ?bounds,
                        "inference failed"
                    );
                    return Err(param);
                }
            }
        }
        Ok(bindings)
    }

    fn unify(&mut self, unifier: &mut Unifier<'_>, argument: InstanceId, pattern: InstanceId, polarity: Variance) {
        if argument.is_joker() || !unifier.visited.insert((argument, pattern, polarity)) {
            return;
        }
        let pattern_inst = *self.instance(pattern);
        if unifier.open.contains(&pattern_inst.target) {
            // `mutable T` against `mutable X` binds T to X
            let value = if pattern_inst.mutability == Mutability::NONE {
                argument
            } else {
                self.without_mutability(argument)
            };
            unifier
                .bounds
                .entry(pattern_inst.target)
                .or_default()
                .push(value, polarity);
            return;
        }
        if !self.mentions_params(pattern, unifier.open) {
            return;
        }

        if let Some(agg) = self.entity(pattern_inst.target).as_aggregate().cloned() {
            for member in agg.members {
                self.unify(unifier, argument, member, polarity);
            }
            return;
        }
        if let Some(agg) = self.entity(self.target_of(argument)).as_aggregate().cloned() {
            if agg.kind == AggregateKind::Union {
                for member in agg.members {
                    self.unify(unifier, member, pattern, polarity);
                }
                return;
            }
        }

        let argument_pointer = self.is_pointer_like(argument);
        if self.is_reference(pattern) && !argument_pointer {
            if let Some(inner) = self.deref(pattern) {
                self.unify(unifier, argument, inner, polarity);
            }
            return;
        }
        if argument_pointer && !self.is_pointer_like(pattern) {
            if let Some(inner) = self.deref(argument) {
                self.unify(unifier, inner, pattern, polarity);
            }
            return;
        }

        let Some(ancestor) = self.find_ancestor(argument, pattern_inst.target) else {
            return;
        };
        let params = self.entity(pattern_inst.target).template_params.clone();
        let argument_table = self.instance(ancestor.instance).translation;
        for param in params {
            let pattern_arg = self.translation(pattern_inst.translation).get(param);
            let argument_arg = self.translation(argument_table).get(param);
            let (Some(pattern_arg), Some(argument_arg)) = (pattern_arg, argument_arg) else {
                continue;
            };
            let variance = self
                .entity(param)
                .as_template_param()
                .map(|p| p.variance)
                .unwrap_or_default();
            self.unify(unifier, argument_arg, pattern_arg, variance.compose(polarity));
        }
    }

    fn solve_param(&mut self, param: EntityId, bounds: &ParamBounds) -> Option<InstanceId> {
        if let Some(&first) = bounds.exact.first() {
            let agree = bounds.exact.iter().all(|&e| self.same_core(e, first));
            let fits_lower = bounds.lower.iter().all(|&l| self.accepts(first, l));
            let fits_upper = bounds.upper.iter().all(|&u| self.accepts(u, first));
            return (agree && fits_lower && fits_upper).then_some(first);
        }

        let lower = bounds
            .lower
            .iter()
            .copied()
            .reduce(|acc, next| self.common_ancestor(acc, next));
        if let Some(lower) = lower {
            let fits_upper = bounds.upper.iter().all(|&u| self.accepts(u, lower));
            return fits_upper.then_some(lower);
        }

        if !bounds.upper.is_empty() {
            // The most specific upper bound
            let candidates = bounds.upper.clone();
            return candidates
                .iter()
                .copied()
                .find(|&c| candidates.iter().all(|&u| self.accepts(u, c)));
        }

        // Nothing at the call site: fall back to what the parameter must be a base of
        let base_of = self
            .entity(param)
            .as_template_param()
            .map(|p| p.constraint.base_of.clone())
            .unwrap_or_default();
        base_of
            .into_iter()
            .reduce(|acc, next| self.common_ancestor(acc, next))
    }

    /// `value` may stand where `slot` is expected.
    fn accepts(&mut self, slot: InstanceId, value: InstanceId) -> bool {
        self.matches_with(value.into(), slot.into(), MatchOptions::STRICT)
            .is_yes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Constraint, TypeCategory};

    struct Fixture {
        animal: InstanceId,
        cat: InstanceId,
        dog: InstanceId,
        list: EntityId,
        sink: EntityId,
        cell: EntityId,
        t: EntityId,
    }

    fn fixture(ctx: &mut TypeContext) -> Fixture {
        let animal = ctx.declare_type(None, "Animal", TypeCategory::Class);
        let cat = ctx.declare_type(None, "Cat", TypeCategory::Class);
        let dog = ctx.declare_type(None, "Dog", TypeCategory::Class);
        let animal_i = ctx.plain(animal);
        ctx.add_parent(cat, animal_i, true);
        ctx.add_parent(dog, animal_i, true);
        let list = ctx.declare_type(None, "List", TypeCategory::Class);
        ctx.declare_template_param(list, "E", Variance::Out);
        let sink = ctx.declare_type(None, "Sink", TypeCategory::Class);
        ctx.declare_template_param(sink, "E", Variance::In);
        let cell = ctx.declare_type(None, "Cell", TypeCategory::Class);
        ctx.declare_template_param(cell, "E", Variance::None);
        let f = ctx.declare_function(None, "f", crate::entity::FunctionDecl::new(InstanceId::ROOT));
        let t = ctx.declare_template_param(f, "T", Variance::None);
        Fixture {
            animal: animal_i,
            cat: ctx.plain(cat),
            dog: ctx.plain(dog),
            list,
            sink,
            cell,
            t,
        }
    }

    #[test]
    fn test_direct_binding() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        let t_i = ctx.param(fx.t);
        let result = ctx.infer_arguments(&[fx.t], &[(fx.cat, t_i)]);
        assert_eq!(result, Ok(vec![(fx.t, fx.cat)]));
    }

    #[test]
    fn test_lower_bounds_meet_at_common_ancestor() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        let t_i = ctx.param(fx.t);
        let result = ctx.infer_arguments(&[fx.t], &[(fx.cat, t_i), (fx.dog, t_i)]);
        assert_eq!(result, Ok(vec![(fx.t, fx.animal)]));
    }

    #[test]
    fn test_through_generic_arguments() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        let t_i = ctx.param(fx.t);
        let list_t = ctx.instantiate(fx.list, &[t_i]);
        let list_cat = ctx.instantiate(fx.list, &[fx.cat]);
        let sink_t = ctx.instantiate(fx.sink, &[t_i]);
        let sink_animal = ctx.instantiate(fx.sink, &[fx.animal]);

        let result = ctx.infer_arguments(&[fx.t], &[(list_cat, list_t), (sink_animal, sink_t)]);
        assert_eq!(result, Ok(vec![(fx.t, fx.cat)]));

        // Upper bound alone
        let result = ctx.infer_arguments(&[fx.t], &[(sink_animal, sink_t)]);
        assert_eq!(result, Ok(vec![(fx.t, fx.animal)]));
    }

    #[test]
    fn test_exact_values_must_agree() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        let t_i = ctx.param(fx.t);
        let cell_t = ctx.instantiate(fx.cell, &[t_i]);
        let cell_cat = ctx.instantiate(fx.cell, &[fx.cat]);
        let cell_dog = ctx.instantiate(fx.cell, &[fx.dog]);
        assert_eq!(
            ctx.infer_arguments(&[fx.t], &[(cell_cat, cell_t)]),
            Ok(vec![(fx.t, fx.cat)])
        );
        assert_eq!(
            ctx.infer_arguments(&[fx.t], &[(cell_cat, cell_t), (cell_dog, cell_t)]),
            Err(fx.t)
        );
    }

    #[test]
    fn test_base_of_fallback() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        assert_eq!(ctx.infer_arguments(&[fx.t], &[]), Err(fx.t));
        ctx.set_constraint(
            fx.t,
            Constraint {
                base_of: vec![fx.cat, fx.dog],
                ..Constraint::default()
            },
        );
        assert_eq!(ctx.infer_arguments(&[fx.t], &[]), Ok(vec![(fx.t, fx.animal)]));
    }

    #[test]
    fn test_implicit_reference() {
        let mut ctx = TypeContext::new();
        let fx = fixture(&mut ctx);
        let t_i = ctx.param(fx.t);
        let ref_t = ctx.reference_to(t_i);
        assert_eq!(
            ctx.infer_arguments(&[fx.t], &[(fx.cat, ref_t)]),
            Ok(vec![(fx.t, fx.cat)])
        );
        let list_t = ctx.instantiate(fx.list, &[t_i]);
        let list_dog = ctx.instantiate(fx.list, &[fx.dog]);
        let ptr_list_dog = ctx.pointer_to(list_dog);
        assert_eq!(
            ctx.infer_arguments(&[fx.t], &[(ptr_list_dog, list_t)]),
            Ok(vec![(fx.t, fx.dog)])
        );
    }
}
