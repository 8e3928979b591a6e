use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::context::TypeContext;
use crate::entity::{AggregateKind, EntityKind};
use crate::ids::{EntityId, InstanceId};
use crate::instance::CoreKey;
use crate::matcher::MatchOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestor {
    pub instance: InstanceId,
    pub target: EntityId,
    /// Inheritance hops from the subject.
    pub distance: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Inheritance {
    pub minimal_parents: Vec<InstanceId>,
    /// Closest first.
    pub ancestors: Vec<Ancestor>,
    /// Implementation parents, in chain order.
    pub primary: Vec<InstanceId>,
}

impl Inheritance {
    pub fn find(&self, target: EntityId) -> Option<Ancestor> {
        self.ancestors.iter().copied().find(|a| a.target == target)
    }
}

impl TypeContext {
    /// Inheritance of `instance`, translated through its template arguments.
    pub fn inheritance(&mut self, instance: InstanceId) -> Rc<Inheritance> {
        if let Some(cached) = self.caches.inheritance.get(&instance) {
            return Rc::clone(cached);
        }
        let inst = *self.instance(instance);
        let declared = self.declared_inheritance(inst.target);
        let table = inst.translation;

        let minimal_parents = declared
            .minimal_parents
            .iter()
            .map(|&p| self.translate_through(p, table))
            .collect();
        let ancestors = declared
            .ancestors
            .iter()
            .map(|a| Ancestor {
                instance: self.translate_through(a.instance, table),
                ..*a
            })
            .collect();
        let primary = declared
            .primary
            .iter()
            .map(|&p| self.translate_through(p, table))
            .collect();

        let result = Rc::new(Inheritance {
            minimal_parents,
            ancestors,
            primary,
        });
        self.caches.inheritance.insert(instance, Rc::clone(&result));
        result
    }

    pub fn minimal_parents(&mut self, instance: InstanceId) -> Vec<InstanceId> {
        self.inheritance(instance).minimal_parents.clone()
    }

    pub fn ancestors(&mut self, instance: InstanceId) -> Vec<Ancestor> {
        self.inheritance(instance).ancestors.clone()
    }

    pub fn primary_ancestors(&mut self, instance: InstanceId) -> Vec<InstanceId> {
        self.inheritance(instance).primary.clone()
    }

    /// `instance` itself (distance 0) or its closest ancestor targeting `target`.
    pub fn find_ancestor(&mut self, instance: InstanceId, target: EntityId) -> Option<Ancestor> {
        if self.target_of(instance) == target {
            return Some(Ancestor {
                instance,
                target,
                distance: 0,
            });
        }
        self.inheritance(instance).find(target)
    }

    pub fn inherits_from(&mut self, instance: InstanceId, target: EntityId) -> bool {
        self.find_ancestor(instance, target).is_some()
    }

    /// Closest type accepting both `a` and `b`: one of them if it accepts the
    /// other, else the nearest ancestor of `a` that accepts `b`, else the root.
    pub fn common_ancestor(&mut self, a: InstanceId, b: InstanceId) -> InstanceId {
        if a.is_joker() {
            return b;
        }
        if b.is_joker() {
            return a;
        }
        if self.matches_with(a.into(), b.into(), MatchOptions::STRICT).is_yes() {
            return b;
        }
        if self.matches_with(b.into(), a.into(), MatchOptions::STRICT).is_yes() {
            return a;
        }
        for ancestor in self.ancestors(a) {
            if self
                .matches_with(b.into(), ancestor.instance.into(), MatchOptions::STRICT)
                .is_yes()
            {
                return ancestor.instance;
            }
        }
        InstanceId::ROOT
    }

    /// Inheritance of `entity` in terms of its own template parameters.
    fn declared_inheritance(&mut self, entity: EntityId) -> Rc<Inheritance> {
        if let Some(cached) = self.caches.declared_inheritance.get(&entity) {
            return Rc::clone(cached);
        }

        let (parents, implementation) = self.declared_parents(entity);
        let parent_cores: Vec<CoreKey> = parents.iter().map(|&p| self.core(p)).collect();
        let mut ancestors = Vec::new();
        let mut seen: FxHashSet<CoreKey> = FxHashSet::default();
        let mut redundant: FxHashSet<CoreKey> = FxHashSet::default();
        let mut queue: VecDeque<(InstanceId, u32)> = parents.iter().map(|&p| (p, 1)).collect();
        while let Some((instance, distance)) = queue.pop_front() {
            let target = self.target_of(instance);
            // Circular inheritance is reported by the evaluation pass; here
            // the walk just stops
            if target == entity {
                tracing::debug!(target: "tessel::inheritance", entity = %self.name(entity), "cycle cut");
                continue;
            }
            let core = self.core(instance);
            if distance > 1 && parent_cores.contains(&core) {
                redundant.insert(core);
            }
            if !seen.insert(core) {
                continue;
            }
            ancestors.push(Ancestor {
                instance,
                target,
                distance,
            });
            let table = self.instance(instance).translation;
            let (above, _) = self.declared_parents(target);
            for parent in above {
                let translated = self.translate_through(parent, table);
                queue.push_back((translated, distance + 1));
            }
        }
        if parents.iter().any(|&p| p != InstanceId::ROOT) {
            ancestors.retain(|a| a.target != EntityId::ROOT);
        }

        let minimal_parents: Vec<InstanceId> = parents
            .iter()
            .copied()
            .filter(|&p| !redundant.contains(&self.core(p)))
            .collect();

        let mut primary = Vec::new();
        let mut next = implementation;
        let mut chain_seen = FxHashSet::default();
        while let Some(parent) = next {
            let inst = *self.instance(parent);
            if inst.target == entity || !chain_seen.insert(inst.core()) {
                break;
            }
            primary.push(parent);
            let (_, above) = self.declared_parents(inst.target);
            next = above.map(|p| self.translate_through(p, inst.translation));
        }

        let result = Rc::new(Inheritance {
            minimal_parents,
            ancestors,
            primary,
        });
        self.caches
            .declared_inheritance
            .insert(entity, Rc::clone(&result));
        result
    }

    /// Direct parents of `entity` and its implementation parent, if any.
    fn declared_parents(&self, entity: EntityId) -> (Vec<InstanceId>, Option<InstanceId>) {
        match &self.entity(entity).kind {
            EntityKind::Type(decl) => {
                let parents: Vec<InstanceId> = decl.parents.iter().map(|p| p.ty).collect();
                let implementation = decl.parents.iter().find(|p| p.implementation).map(|p| p.ty);
                if parents.is_empty() && entity != EntityId::ROOT {
                    (vec![InstanceId::ROOT], None)
                } else {
                    (parents, implementation)
                }
            }
            // A constrained parameter is a subtype of its bounds
            EntityKind::TemplateParam(param) => (param.constraint.inherits.clone(), None),
            // An intersection is a subtype of each member
            EntityKind::Aggregate(agg) if agg.kind == AggregateKind::Intersection => {
                (agg.members.clone(), None)
            }
            _ => (Vec::new(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Constraint, TypeCategory, Variance};

    #[test]
    fn test_root_only_without_parents() {
        let mut ctx = TypeContext::new();
        let a = ctx.declare_type(None, "A", TypeCategory::Class);
        let a = ctx.plain(a);
        assert_eq!(ctx.minimal_parents(a), vec![InstanceId::ROOT]);
        let ancestors = ctx.ancestors(a);
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].target, EntityId::ROOT);
    }

    #[test]
    fn test_closure_with_distances() {
        let mut ctx = TypeContext::new();
        let animal = ctx.declare_type(None, "Animal", TypeCategory::Class);
        let cat = ctx.declare_type(None, "Cat", TypeCategory::Class);
        let kitten = ctx.declare_type(None, "Kitten", TypeCategory::Class);
        let animal_i = ctx.plain(animal);
        let cat_i = ctx.plain(cat);
        ctx.add_parent(cat, animal_i, true);
        ctx.add_parent(kitten, cat_i, true);
        let kitten_i = ctx.plain(kitten);

        let ancestors = ctx.ancestors(kitten_i);
        let pairs: Vec<_> = ancestors.iter().map(|a| (a.target, a.distance)).collect();
        assert_eq!(pairs, vec![(cat, 1), (animal, 2)]);
        assert_eq!(ctx.primary_ancestors(kitten_i), vec![cat_i, animal_i]);
        assert!(ctx.inherits_from(kitten_i, animal));
        assert!(!ctx.inherits_from(animal_i, cat));
        assert_eq!(ctx.find_ancestor(kitten_i, kitten).map(|a| a.distance), Some(0));
    }

    #[test]
    fn test_redundant_parent_is_not_minimal() {
        let mut ctx = TypeContext::new();
        let base = ctx.declare_type(None, "Base", TypeCategory::Protocol);
        let mid = ctx.declare_type(None, "Mid", TypeCategory::Protocol);
        let leaf = ctx.declare_type(None, "Leaf", TypeCategory::Class);
        let base_i = ctx.plain(base);
        let mid_i = ctx.plain(mid);
        ctx.add_parent(mid, base_i, false);
        ctx.add_parent(leaf, mid_i, false);
        ctx.add_parent(leaf, base_i, false);
        let leaf_i = ctx.plain(leaf);
        assert_eq!(ctx.minimal_parents(leaf_i), vec![mid_i]);
        assert_eq!(ctx.find_ancestor(leaf_i, base).map(|a| a.distance), Some(1));
    }

    #[test]
    fn test_translated_per_instance() {
        let mut ctx = TypeContext::new();
        let int = ctx.declare_type(None, "Int", TypeCategory::Value);
        let int = ctx.plain(int);
        let collection = ctx.declare_type(None, "Collection", TypeCategory::Protocol);
        ctx.declare_template_param(collection, "E", Variance::Out);
        let list = ctx.declare_type(None, "List", TypeCategory::Class);
        let t = ctx.declare_template_param(list, "T", Variance::Out);
        let t_inst = ctx.param(t);
        let parent = ctx.instantiate(collection, &[t_inst]);
        ctx.add_parent(list, parent, false);

        let list_int = ctx.instantiate(list, &[int]);
        let found = ctx.find_ancestor(list_int, collection);
        let expected = ctx.instantiate(collection, &[int]);
        assert_eq!(found.map(|a| a.instance), Some(expected));
    }

    #[test]
    fn test_cycle_is_cut() {
        let mut ctx = TypeContext::new();
        let a = ctx.declare_type(None, "A", TypeCategory::Class);
        let b = ctx.declare_type(None, "B", TypeCategory::Class);
        let (a_i, b_i) = (ctx.plain(a), ctx.plain(b));
        ctx.add_parent(a, b_i, true);
        ctx.add_parent(b, a_i, true);
        let ancestors = ctx.ancestors(a_i);
        assert!(ancestors.iter().any(|x| x.target == b));
        assert_eq!(ctx.primary_ancestors(a_i), vec![b_i]);
    }

    #[test]
    fn test_common_ancestor() {
        let mut ctx = TypeContext::new();
        let animal = ctx.declare_type(None, "Animal", TypeCategory::Class);
        let cat = ctx.declare_type(None, "Cat", TypeCategory::Class);
        let dog = ctx.declare_type(None, "Dog", TypeCategory::Class);
        let rock = ctx.declare_type(None, "Rock", TypeCategory::Class);
        let animal_i = ctx.plain(animal);
        ctx.add_parent(cat, animal_i, true);
        ctx.add_parent(dog, animal_i, true);
        let (cat_i, dog_i, rock_i) = (ctx.plain(cat), ctx.plain(dog), ctx.plain(rock));

        assert_eq!(ctx.common_ancestor(cat_i, dog_i), animal_i);
        assert_eq!(ctx.common_ancestor(cat_i, animal_i), animal_i);
        assert_eq!(ctx.common_ancestor(animal_i, cat_i), animal_i);
        assert_eq!(ctx.common_ancestor(cat_i, rock_i), InstanceId::ROOT);
        assert_eq!(ctx.common_ancestor(InstanceId::JOKER, rock_i), rock_i);
    }

    #[test]
    fn test_param_bounds_are_ancestors() {
        let mut ctx = TypeContext::new();
        let shape = ctx.declare_type(None, "Shape", TypeCategory::Protocol);
        let shape_i = ctx.plain(shape);
        let holder = ctx.declare_type(None, "Holder", TypeCategory::Class);
        let t = ctx.declare_template_param(holder, "T", Variance::None);
        ctx.set_constraint(
            t,
            Constraint {
                inherits: vec![shape_i],
                ..Constraint::default()
            },
        );
        let t_inst = ctx.param(t);
        assert!(ctx.inherits_from(t_inst, shape));
    }
}
