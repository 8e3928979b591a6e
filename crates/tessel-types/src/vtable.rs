use std::rc::Rc;

use crate::context::TypeContext;
use crate::entity::{AggregateKind, EntityKind, TypeCategory};
use crate::ids::{EntityId, InstanceId, TranslationId};
use crate::matcher::MatchOptions;

/// A member function seen through the translation of the instance it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub function: EntityId,
    pub table: TranslationId,
}

/// Abstract protocol members paired with the concrete members that implement
/// them. Cached by the structural identity of both sides, so every mutability
/// variant of a type shares one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTable {
    pub concrete: InstanceId,
    pub protocol: InstanceId,
    /// (abstract member, concrete member)
    entries: Vec<(EntityId, EntityId)>,
    /// Every abstract member found an implementation.
    pub complete: bool,
}

impl VirtualTable {
    pub fn concrete_for(&self, abstract_fn: EntityId) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|&&(a, _)| a == abstract_fn)
            .map(|&(_, c)| c)
    }

    pub fn abstract_for(&self, concrete_fn: EntityId) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|&&(_, c)| c == concrete_fn)
            .map(|&(a, _)| a)
    }

    pub fn entries(&self) -> &[(EntityId, EntityId)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeContext {
    /// Table mapping the abstract members of `protocol` onto members of
    /// `concrete`. `None` when some member is missing, unless `protocol` is a
    /// synthesized union or intersection, which may be covered partially.
    pub fn virtual_table(&mut self, concrete: InstanceId, protocol: InstanceId) -> Option<Rc<VirtualTable>> {
        let key = (self.core(concrete), self.core(protocol));
        if let Some(cached) = self.caches.vtables.get(&key) {
            return cached.clone();
        }
        // Re-entered while building this very table (a member signature
        // mentions the protocol): assume it holds
        if self.guards.vtables.contains(&key) {
            return Some(Rc::new(VirtualTable {
                concrete,
                protocol,
                entries: Vec::new(),
                complete: true,
            }));
        }
        self.guards.vtables.insert(key);

        let partial_allowed = matches!(
            self.entity(self.target_of(protocol)).kind,
            EntityKind::Aggregate(_)
        );
        let required = self.abstract_members(protocol);
        let available: Vec<MemberRef> = self
            .callable_members(concrete)
            .into_iter()
            .filter(|m| !self.is_abstract_member(m.function))
            .collect();

        let mut entries = Vec::with_capacity(required.len());
        let mut missing = 0usize;
        for need in required {
            match available
                .iter()
                .copied()
                .find(|&have| self.signatures_compatible(have, need))
            {
                Some(have) => entries.push((need.function, have.function)),
                None => missing += 1,
            }
        }
        let complete = missing == 0;

        self.guards.vtables.remove(&key);
        let table = (complete || partial_allowed).then(|| {
            Rc::new(VirtualTable {
                concrete,
                protocol,
                entries,
                complete,
            })
        });
        tracing::trace!(
            target: "tessel::vtable",
            concrete = %self.display(concrete),
            protocol = %self.display(protocol),
            complete,
            missing,
            "built virtual table"
        );
        self.caches.vtables.insert(key, table.clone());
        table
    }

    /// Callable members of `instance` and its ancestors, nearest first.
    pub fn callable_members(&mut self, instance: InstanceId) -> Vec<MemberRef> {
        let mut members = Vec::new();
        let inst = *self.instance(instance);
        self.push_callables(inst.target, inst.translation, &mut members);
        for ancestor in self.ancestors(instance) {
            let table = self.instance(ancestor.instance).translation;
            self.push_callables(ancestor.target, table, &mut members);
        }
        members
    }

    fn push_callables(&self, owner: EntityId, table: TranslationId, out: &mut Vec<MemberRef>) {
        for &member in &self.entity(owner).members {
            if let Some(decl) = self.entity(member).as_function() {
                if !decl.is_static && !decl.is_constructor() {
                    out.push(MemberRef {
                        function: member,
                        table,
                    });
                }
            }
        }
    }

    /// Members a type must provide to satisfy `protocol`.
    pub fn abstract_members(&mut self, protocol: InstanceId) -> Vec<MemberRef> {
        let inst = *self.instance(protocol);
        if let Some(agg) = self.entity(inst.target).as_aggregate() {
            let members = agg.members.clone();
            let mut out = Vec::new();
            for member in members {
                out.extend(self.abstract_members(member));
            }
            return out;
        }
        self.callable_members(protocol)
            .into_iter()
            .filter(|m| self.is_abstract_member(m.function))
            .collect()
    }

    /// Declared abstract, or declared in a protocol.
    pub(crate) fn is_abstract_member(&self, function: EntityId) -> bool {
        let entity = self.entity(function);
        let in_protocol = entity
            .owner
            .and_then(|o| self.entity(o).category())
            .is_some_and(|c| c == TypeCategory::Protocol);
        entity.as_function().is_some_and(|f| f.is_abstract) || in_protocol
    }

    /// Same name, same parameter shape, and every parameter and the result
    /// compatible in both directions without conversions.
    pub(crate) fn signatures_compatible(&mut self, have: MemberRef, need: MemberRef) -> bool {
        if self.entity(have.function).name != self.entity(need.function).name {
            return false;
        }
        let (Some(have_decl), Some(need_decl)) = (
            self.entity(have.function).as_function().cloned(),
            self.entity(need.function).as_function().cloned(),
        ) else {
            return false;
        };
        if have_decl.params.len() != need_decl.params.len() {
            return false;
        }
        let mut pairs = vec![(have_decl.result, need_decl.result)];
        for (hp, np) in have_decl.params.iter().zip(&need_decl.params) {
            if hp.kind.is_variadic() != np.kind.is_variadic() {
                return false;
            }
            pairs.push((hp.ty, np.ty));
        }
        pairs.into_iter().all(|(h, n)| {
            let h = self.translate_through(h, have.table);
            let n = self.translate_through(n, need.table);
            self.mutually_compatible(h, n)
        })
    }

    fn mutually_compatible(&mut self, a: InstanceId, b: InstanceId) -> bool {
        a == b
            || (self.matches_with(a.into(), b.into(), MatchOptions::STRICT).is_yes()
                && self.matches_with(b.into(), a.into(), MatchOptions::STRICT).is_yes())
    }

    /// A member of `instance` that can stand in for `need`.
    pub fn find_implementation(&mut self, instance: InstanceId, need: MemberRef) -> Option<MemberRef> {
        let available: Vec<MemberRef> = self
            .callable_members(instance)
            .into_iter()
            .filter(|m| !self.is_abstract_member(m.function))
            .collect();
        available
            .into_iter()
            .find(|&have| self.signatures_compatible(have, need))
    }

    /// Whether `protocol` is a synthesized union of protocols.
    pub(crate) fn is_protocol_union(&self, protocol: InstanceId) -> bool {
        match self.entity(self.target_of(protocol)).as_aggregate() {
            Some(agg) => {
                agg.kind == AggregateKind::Union
                    && agg
                        .members
                        .iter()
                        .all(|&m| self.category(m) == Some(TypeCategory::Protocol))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FunctionDecl;

    struct Shapes {
        printable: InstanceId,
        point: InstanceId,
        blob: InstanceId,
        show: EntityId,
        point_show: EntityId,
    }

    fn shapes(ctx: &mut TypeContext) -> Shapes {
        let string = ctx.declare_type(None, "String", TypeCategory::Value);
        let string = ctx.plain(string);
        let printable = ctx.declare_type(None, "Printable", TypeCategory::Protocol);
        let show = ctx.declare_function(Some(printable), "show", FunctionDecl::new(string));
        let point = ctx.declare_type(None, "Point", TypeCategory::Value);
        let point_show = ctx.declare_function(Some(point), "show", FunctionDecl::new(string));
        let blob = ctx.declare_type(None, "Blob", TypeCategory::Class);
        ctx.declare_function(Some(blob), "show", FunctionDecl::new(string).param("x", string));
        Shapes {
            printable: ctx.plain(printable),
            point: ctx.plain(point),
            blob: ctx.plain(blob),
            show,
            point_show,
        }
    }

    #[test]
    fn test_complete_table() {
        let mut ctx = TypeContext::new();
        let s = shapes(&mut ctx);
        let table = ctx.virtual_table(s.point, s.printable).expect("point is printable");
        assert!(table.complete);
        assert_eq!(table.concrete_for(s.show), Some(s.point_show));
        assert_eq!(table.abstract_for(s.point_show), Some(s.show));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_signature_mismatch_has_no_table() {
        let mut ctx = TypeContext::new();
        let s = shapes(&mut ctx);
        assert!(ctx.virtual_table(s.blob, s.printable).is_none());
        // cached negative result
        assert!(ctx.virtual_table(s.blob, s.printable).is_none());
    }

    #[test]
    fn test_shared_across_mutability_variants() {
        let mut ctx = TypeContext::new();
        let s = shapes(&mut ctx);
        let first = ctx.virtual_table(s.point, s.printable);
        let mutable = ctx.with_mutability(s.point, crate::mutability::Mutability::MUTABLE);
        let second = ctx.virtual_table(mutable, s.printable);
        assert!(matches!((first, second), (Some(a), Some(b)) if Rc::ptr_eq(&a, &b)));
    }

    #[test]
    fn test_union_protocol_may_be_partial() {
        let mut ctx = TypeContext::new();
        let s = shapes(&mut ctx);
        let int = ctx.declare_type(None, "Int", TypeCategory::Value);
        let int = ctx.plain(int);
        let sized = ctx.declare_type(None, "Sized", TypeCategory::Protocol);
        ctx.declare_function(Some(sized), "size", FunctionDecl::new(int));
        let sized = ctx.plain(sized);
        let either = ctx.aggregate(AggregateKind::Union, &[s.printable, sized]);
        assert!(ctx.is_protocol_union(either));
        let table = ctx.virtual_table(s.point, either);
        assert!(table.as_ref().is_some_and(|t| !t.complete && t.len() == 1));
    }

    #[test]
    fn test_find_implementation_skips_abstract_and_mismatched() {
        let mut ctx = TypeContext::new();
        let s = shapes(&mut ctx);
        let need = ctx.abstract_members(s.printable)[0];
        let found = ctx.find_implementation(s.point, need);
        assert_eq!(found.map(|m| m.function), Some(s.point_show));
        assert!(ctx.find_implementation(s.blob, need).is_none());
        // the protocol's own abstract member never implements itself
        assert!(ctx.find_implementation(s.printable, need).is_none());
    }
}
