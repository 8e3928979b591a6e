use crate::context::TypeContext;
use crate::entity::{Aggregate, AggregateKind, Entity, EntityKind, TypeCategory, Visibility};
use crate::error::TypeError;
use crate::ids::{EntityId, InstanceId, Symbol, TranslationId};
use crate::lifetime::Lifetime;
use crate::mutability::{Mutability, MutabilityKind};
use crate::translation::Translation;
use tessel_syntax::NodeId;

/// An entity with its template substitution and mutability override.
/// Interned: equal instances share one `InstanceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInstance {
    pub target: EntityId,
    pub translation: TranslationId,
    pub mutability: Mutability,
}

impl TypeInstance {
    pub fn plain(target: EntityId) -> Self {
        Self {
            target,
            translation: TranslationId::EMPTY,
            mutability: Mutability::NONE,
        }
    }

    pub fn core(&self) -> CoreKey {
        CoreKey {
            target: self.target,
            translation: self.translation,
        }
    }
}

/// Instance identity without the mutability override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreKey {
    pub target: EntityId,
    pub translation: TranslationId,
}

/// An instance as a value carries it: with the lifetime of the node that
/// produced it. The lifetime is not part of the instance's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub instance: InstanceId,
    pub lifetime: Lifetime,
}

impl TypeRef {
    pub fn new(instance: InstanceId, lifetime: Lifetime) -> Self {
        Self { instance, lifetime }
    }

    pub fn timeless(instance: InstanceId) -> Self {
        Self {
            instance,
            lifetime: Lifetime::TIMELESS,
        }
    }

    pub fn joker() -> Self {
        Self::timeless(InstanceId::JOKER)
    }
}

impl From<InstanceId> for TypeRef {
    fn from(instance: InstanceId) -> Self {
        TypeRef::timeless(instance)
    }
}

impl TypeContext {
    pub(crate) fn intern_instance(&mut self, inst: TypeInstance) -> InstanceId {
        if let Some(&id) = self.instance_map.get(&inst) {
            return id;
        }
        let id = InstanceId(self.instances.len() as u32);
        self.instance_map.insert(inst, id);
        self.instances.push(inst);
        id
    }

    pub fn instance(&self, id: InstanceId) -> &TypeInstance {
        &self.instances[id.index()]
    }

    pub fn target_of(&self, id: InstanceId) -> EntityId {
        self.instances[id.index()].target
    }

    pub fn core(&self, id: InstanceId) -> CoreKey {
        self.instance(id).core()
    }

    pub fn same_core(&self, a: InstanceId, b: InstanceId) -> bool {
        self.core(a) == self.core(b)
    }

    /// The instance of `entity` with no substitution and no override.
    pub fn plain(&mut self, entity: EntityId) -> InstanceId {
        self.intern_instance(TypeInstance::plain(entity))
    }

    /// The open instance standing for a template parameter.
    pub fn param(&mut self, param: EntityId) -> InstanceId {
        self.plain(param)
    }

    /// Bind `args` to the template parameters of `entity`, in order. Missing
    /// arguments leave their parameters unbound; the Joker is kept as a
    /// placeholder for inference.
    pub fn instantiate(&mut self, entity: EntityId, args: &[InstanceId]) -> InstanceId {
        self.instantiate_with(entity, args, Mutability::NONE)
    }

    pub fn instantiate_with(
        &mut self,
        entity: EntityId,
        args: &[InstanceId],
        mutability: Mutability,
    ) -> InstanceId {
        let params = &self.entity(entity).template_params;
        let table = Translation::from_pairs(params.iter().copied().zip(args.iter().copied()));
        let translation = self.intern_translation(table);
        self.intern_instance(TypeInstance {
            target: entity,
            translation,
            mutability,
        })
    }

    pub fn instantiate_ref(
        &mut self,
        entity: EntityId,
        args: &[InstanceId],
        mutability: Mutability,
        lifetime: Lifetime,
    ) -> TypeRef {
        TypeRef::new(self.instantiate_with(entity, args, mutability), lifetime)
    }

    /// Same core as `id`, with `mutability` as its override.
    pub fn with_mutability(&mut self, id: InstanceId, mutability: Mutability) -> InstanceId {
        if id.is_joker() {
            return id;
        }
        let inst = *self.instance(id);
        self.intern_instance(TypeInstance { mutability, ..inst })
    }

    /// Apply `over` on top of the override `id` already has.
    pub(crate) fn overlay_mutability(&mut self, id: InstanceId, over: Mutability) -> InstanceId {
        if over == Mutability::NONE {
            return id;
        }
        let current = self.instance(id).mutability;
        self.with_mutability(id, over.overlay(current))
    }

    pub fn without_mutability(&mut self, id: InstanceId) -> InstanceId {
        self.with_mutability(id, Mutability::NONE)
    }

    /// Arguments in template-parameter order; `None` for unbound parameters.
    pub fn template_args(&self, id: InstanceId) -> Vec<Option<InstanceId>> {
        let inst = self.instance(id);
        let table = self.translation(inst.translation);
        self.entity(inst.target)
            .template_params
            .iter()
            .map(|&p| table.get(p))
            .collect()
    }

    pub fn template_arg(&self, id: InstanceId, index: usize) -> Option<InstanceId> {
        let inst = self.instance(id);
        let param = *self.entity(inst.target).template_params.get(index)?;
        self.translation(inst.translation).get(param)
    }

    /// A generic instance whose parameters are not all bound yet.
    pub fn is_bare(&self, id: InstanceId) -> bool {
        self.template_args(id).iter().any(|a| a.is_none())
    }

    pub fn category(&self, id: InstanceId) -> Option<TypeCategory> {
        self.entity(self.target_of(id)).category()
    }

    pub fn is_pointer_like(&self, id: InstanceId) -> bool {
        self.category(id).is_some_and(TypeCategory::is_pointer_like)
    }

    pub fn is_reference(&self, id: InstanceId) -> bool {
        self.category(id) == Some(TypeCategory::Reference)
    }

    /// Referent of a reference or pointer instance.
    pub fn deref(&self, id: InstanceId) -> Option<InstanceId> {
        if self.is_pointer_like(id) {
            self.template_arg(id, 0)
        } else {
            None
        }
    }

    pub fn reference_to(&mut self, referent: InstanceId) -> InstanceId {
        self.instantiate(EntityId::REFERENCE, &[referent])
    }

    pub fn pointer_to(&mut self, referent: InstanceId) -> InstanceId {
        self.instantiate(EntityId::POINTER, &[referent])
    }

    pub fn sequence_of(&mut self, element: InstanceId) -> InstanceId {
        self.instantiate(EntityId::SEQUENCE, &[element])
    }

    /// Whether any of `params` occurs in `id`.
    pub fn mentions_params(&self, id: InstanceId, params: &[EntityId]) -> bool {
        if params.is_empty() {
            return false;
        }
        let inst = self.instance(id);
        if params.contains(&inst.target) {
            return true;
        }
        if let EntityKind::Aggregate(agg) = &self.entity(inst.target).kind {
            return agg.members.iter().any(|&m| self.mentions_params(m, params));
        }
        self.translation(inst.translation)
            .entries()
            .iter()
            .any(|&(_, value)| self.mentions_params(value, params))
    }

    // ---------------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------------

    /// Interned union or intersection. Nested aggregates of the same kind are
    /// flattened; a single member collapses to itself.
    pub fn aggregate(&mut self, kind: AggregateKind, members: &[InstanceId]) -> InstanceId {
        let mut flat = Vec::with_capacity(members.len());
        for &member in members {
            match self.entity(self.target_of(member)).as_aggregate() {
                Some(agg) if agg.kind == kind => flat.extend(agg.members.iter().copied()),
                _ => flat.push(member),
            }
        }
        if flat.contains(&InstanceId::JOKER) {
            return InstanceId::JOKER;
        }
        flat.sort();
        flat.dedup();
        if flat.len() == 1 {
            return flat[0];
        }

        let key = (kind, flat.clone());
        let entity = match self.aggregates.get(&key) {
            Some(&entity) => entity,
            None => {
                let separator = match kind {
                    AggregateKind::Union => " | ",
                    AggregateKind::Intersection => " & ",
                };
                let name = flat
                    .iter()
                    .map(|&m| self.display(m))
                    .collect::<Vec<_>>()
                    .join(separator);
                let entity = self.push_entity(Entity {
                    name: Symbol::from(name.as_str()),
                    kind: EntityKind::Aggregate(Aggregate {
                        kind,
                        members: flat,
                    }),
                    owner: None,
                    members: Vec::new(),
                    template_params: Vec::new(),
                    visibility: Visibility::Public,
                    node: None,
                });
                self.aggregates.insert(key, entity);
                entity
            }
        };
        self.plain(entity)
    }

    /// Union written in the program: reports a value/reference mix.
    pub fn union_of(&mut self, members: &[InstanceId], node: Option<NodeId>) -> InstanceId {
        let union = self.aggregate(AggregateKind::Union, members);
        if let Some(agg) = self.entity(self.target_of(union)).as_aggregate() {
            let slicing = agg
                .members
                .iter()
                .filter(|&&m| self.category(m) == Some(TypeCategory::Value))
                .count();
            if slicing > 0 && slicing < agg.members.len() {
                let union_name = self.display(union);
                self.report(TypeError::SlicingMix { union: union_name }, node, None);
            }
        }
        union
    }

    pub fn intersection_of(&mut self, members: &[InstanceId]) -> InstanceId {
        self.aggregate(AggregateKind::Intersection, members)
    }

    // ---------------------------------------------------------------------
    // Display
    // ---------------------------------------------------------------------

    pub fn display(&self, id: InstanceId) -> String {
        let inst = self.instance(id);
        let entity = self.entity(inst.target);
        let mut out = String::from(inst.mutability.prefix());
        match &entity.kind {
            EntityKind::Joker => out.push('?'),
            EntityKind::Aggregate(_) => {
                if out.is_empty() {
                    out.push_str(&entity.name);
                } else {
                    out.push('(');
                    out.push_str(&entity.name);
                    out.push(')');
                }
            }
            EntityKind::Type(decl) if decl.category.is_pointer_like() => {
                match (decl.category, self.template_arg(id, 0)) {
                    (TypeCategory::Reference, Some(arg)) => {
                        out.push('&');
                        out.push_str(&self.display(arg));
                    }
                    (TypeCategory::Pointer, Some(arg)) => {
                        out.push('*');
                        out.push_str(&self.display(arg));
                    }
                    _ => out.push_str(&entity.name),
                }
            }
            _ => {
                out.push_str(&entity.name);
                let table = self.translation(inst.translation);
                if !entity.template_params.is_empty() && !table.is_empty() {
                    let args: Vec<String> = entity
                        .template_params
                        .iter()
                        .map(|&p| match table.get(p) {
                            Some(arg) => self.display(arg),
                            None => self.entity(p).name.to_string(),
                        })
                        .collect();
                    out.push('<');
                    out.push_str(&args.join(", "));
                    out.push('>');
                }
            }
        }
        out
    }
}

impl Mutability {
    fn prefix(self) -> &'static str {
        match (self.kind, self.reassignable) {
            (MutabilityKind::ForceMutable, _) => "mutable ",
            (MutabilityKind::ForceConst, _) => "const ",
            (MutabilityKind::ConstAsSource, _) => "readonly ",
            (MutabilityKind::GenericUnknown, _) => "?mutable ",
            (MutabilityKind::DualConstMutable, _) => "literal ",
            (MutabilityKind::Unspecified, true) => "var ",
            (MutabilityKind::Unspecified, false) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Variance;

    #[test]
    fn test_interning_shares_handles() {
        let mut ctx = TypeContext::new();
        let list = ctx.declare_type(None, "List", TypeCategory::Class);
        ctx.declare_template_param(list, "T", Variance::Out);
        let a = ctx.instantiate(list, &[InstanceId::ROOT]);
        let b = ctx.instantiate(list, &[InstanceId::ROOT]);
        assert_eq!(a, b);
        let m = ctx.with_mutability(a, Mutability::MUTABLE);
        assert_ne!(a, m);
        assert!(ctx.same_core(a, m));
        assert_eq!(ctx.without_mutability(m), a);
    }

    #[test]
    fn test_bare_and_args() {
        let mut ctx = TypeContext::new();
        let pair = ctx.declare_type(None, "Pair", TypeCategory::Class);
        ctx.declare_template_param(pair, "K", Variance::None);
        ctx.declare_template_param(pair, "V", Variance::None);
        let bare = ctx.plain(pair);
        assert!(ctx.is_bare(bare));
        let half = ctx.instantiate(pair, &[InstanceId::ROOT]);
        assert_eq!(ctx.template_args(half), vec![Some(InstanceId::ROOT), None]);
        assert_eq!(ctx.display(half), "Pair<Object, V>");
        let full = ctx.instantiate(pair, &[InstanceId::ROOT, InstanceId::ROOT]);
        assert!(!ctx.is_bare(full));
        assert_eq!(ctx.template_arg(full, 1), Some(InstanceId::ROOT));
    }

    #[test]
    fn test_references() {
        let mut ctx = TypeContext::new();
        let point = ctx.declare_type(None, "Point", TypeCategory::Value);
        let point = ctx.plain(point);
        let r = ctx.reference_to(point);
        assert!(ctx.is_reference(r));
        assert!(ctx.is_pointer_like(r));
        assert_eq!(ctx.deref(r), Some(point));
        assert_eq!(ctx.deref(point), None);
        assert_eq!(ctx.display(r), "&Point");
        let p = ctx.pointer_to(point);
        assert_eq!(ctx.display(p), "*Point");
    }

    #[test]
    fn test_aggregates_are_interned_and_flattened() {
        let mut ctx = TypeContext::new();
        let a = ctx.declare_type(None, "A", TypeCategory::Class);
        let b = ctx.declare_type(None, "B", TypeCategory::Class);
        let c = ctx.declare_type(None, "C", TypeCategory::Class);
        let (a, b, c) = (ctx.plain(a), ctx.plain(b), ctx.plain(c));
        let ab = ctx.aggregate(AggregateKind::Union, &[a, b]);
        let ba = ctx.aggregate(AggregateKind::Union, &[b, a]);
        assert_eq!(ab, ba);
        let abc = ctx.aggregate(AggregateKind::Union, &[ab, c]);
        let flat = ctx.aggregate(AggregateKind::Union, &[a, b, c]);
        assert_eq!(abc, flat);
        assert_eq!(ctx.aggregate(AggregateKind::Union, &[a, a]), a);
        assert_eq!(ctx.display(ab), "A | B");
        let both = ctx.intersection_of(&[a, b]);
        assert_ne!(both, ab);
    }

    #[test]
    fn test_union_reports_slicing_mix() {
        let mut ctx = TypeContext::new();
        let v = ctx.declare_type(None, "Vec2", TypeCategory::Value);
        let c = ctx.declare_type(None, "Node", TypeCategory::Class);
        let (v, c) = (ctx.plain(v), ctx.plain(c));
        ctx.union_of(&[v, c], None);
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].error.code(), "E0203");
    }

    #[test]
    fn test_mentions_params() {
        let mut ctx = TypeContext::new();
        let list = ctx.declare_type(None, "List", TypeCategory::Class);
        let t = ctx.declare_template_param(list, "T", Variance::Out);
        let t_inst = ctx.param(t);
        let inner = ctx.instantiate(list, &[t_inst]);
        let outer = ctx.reference_to(inner);
        assert!(ctx.mentions_params(outer, &[t]));
        let closed = ctx.instantiate(list, &[InstanceId::ROOT]);
        assert!(!ctx.mentions_params(closed, &[t]));
    }
}
