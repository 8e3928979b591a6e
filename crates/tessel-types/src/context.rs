use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tessel_syntax::{NodeId, SyntaxTree};

use crate::config::Config;
use crate::entity::{AggregateKind, Entity, EntityKind, TypeCategory, TypeDecl, Variance, Visibility};
use crate::error::{Diagnostic, TypeError};
use crate::evaluate::EvalState;
use crate::ids::{EntityId, InstanceId, Symbol, TranslationId};
use crate::inheritance::Inheritance;
use crate::instance::{CoreKey, TypeInstance};
use crate::mutability::{Mutability, MutabilityKind};
use crate::translation::Translation;
use crate::vtable::VirtualTable;

/// Compilation context: the entity arena, the interned instance and
/// translation arenas, memoized results and the diagnostic sink.
pub struct TypeContext {
    entities: Vec<Entity>,
    pub(crate) instances: Vec<TypeInstance>,
    pub(crate) instance_map: FxHashMap<TypeInstance, InstanceId>,
    pub(crate) translations: Vec<Translation>,
    pub(crate) translation_map: FxHashMap<Translation, TranslationId>,
    /// Synthesized union/intersection entities by (kind, sorted members)
    pub(crate) aggregates: FxHashMap<(AggregateKind, Vec<InstanceId>), EntityId>,
    pub(crate) caches: Caches,
    pub(crate) guards: Guards,
    syntax: SyntaxTree,
    config: Config,
    diagnostics: Vec<Diagnostic>,
}

/// Write-once results. Reset whenever declarations or configuration change.
#[derive(Default)]
pub(crate) struct Caches {
    pub declared_inheritance: FxHashMap<EntityId, Rc<Inheritance>>,
    pub inheritance: FxHashMap<InstanceId, Rc<Inheritance>>,
    /// Keyed by instance and the fallback used for otherwise unconstrained types
    pub mutability: FxHashMap<(InstanceId, MutabilityKind), Mutability>,
    pub surface_mutability: FxHashMap<InstanceId, Mutability>,
    pub vtables: FxHashMap<(CoreKey, CoreKey), Option<Rc<VirtualTable>>>,
}

/// Re-entrancy guards for the recursive computations.
#[derive(Default)]
pub(crate) struct Guards {
    pub vtables: FxHashSet<(CoreKey, CoreKey)>,
    pub evaluation: FxHashMap<EntityId, EvalState>,
    pub evaluation_stack: Vec<EntityId>,
}

impl TypeContext {
    /// Create a context with the builtin entities registered.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut ctx = Self {
            entities: Vec::new(),
            instances: Vec::new(),
            instance_map: FxHashMap::default(),
            translations: Vec::new(),
            translation_map: FxHashMap::default(),
            aggregates: FxHashMap::default(),
            caches: Caches::default(),
            guards: Guards::default(),
            syntax: SyntaxTree::new(),
            config,
            diagnostics: Vec::new(),
        };

        // Order matches the EntityId constants
        ctx.register_builtin("?", EntityKind::Joker); // 0
        ctx.register_builtin("Object", EntityKind::Type(TypeDecl::new(TypeCategory::Class))); // 1
        ctx.register_builtin("Ref", EntityKind::Type(TypeDecl::new(TypeCategory::Reference))); // 2
        ctx.register_builtin("Ptr", EntityKind::Type(TypeDecl::new(TypeCategory::Pointer))); // 3
        ctx.register_builtin("Sequence", EntityKind::Type(TypeDecl::new(TypeCategory::Class))); // 4
        for owner in [EntityId::REFERENCE, EntityId::POINTER, EntityId::SEQUENCE] {
            ctx.declare_template_param(owner, "T", Variance::Out); // 5, 6, 7
        }
        debug_assert_eq!(ctx.entities.len() as u32, EntityId::FIRST_USER);

        ctx.translations.push(Translation::default());
        ctx.translation_map
            .insert(Translation::default(), TranslationId::EMPTY);

        let joker = ctx.intern_instance(TypeInstance::plain(EntityId::JOKER));
        let root = ctx.intern_instance(TypeInstance::plain(EntityId::ROOT));
        debug_assert_eq!(joker, InstanceId::JOKER);
        debug_assert_eq!(root, InstanceId::ROOT);

        ctx
    }

    fn register_builtin(&mut self, name: &str, kind: EntityKind) -> EntityId {
        self.push_entity(Entity {
            name: Symbol::from(name),
            kind,
            owner: None,
            members: Vec::new(),
            template_params: Vec::new(),
            visibility: Visibility::Public,
            node: None,
        })
    }

    pub(crate) fn push_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        // Any change to a declaration invalidates derived results
        self.caches = Caches::default();
        &mut self.entities[id.index()]
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn name(&self, id: EntityId) -> &str {
        &self.entities[id.index()].name
    }

    /// Find a declaration by name among the members of `owner`, or among the
    /// top-level declarations when `owner` is `None`.
    pub fn lookup(&self, owner: Option<EntityId>, name: &str) -> Option<EntityId> {
        match owner {
            Some(owner) => self
                .entity(owner)
                .members
                .iter()
                .chain(self.entity(owner).template_params.iter())
                .copied()
                .find(|&m| &*self.entity(m).name == name),
            None => self
                .entities
                .iter()
                .enumerate()
                .filter(|(_, e)| e.owner.is_none() && !matches!(e.kind, EntityKind::Aggregate(_)))
                .find(|(_, e)| &*e.name == name)
                .map(|(i, _)| EntityId(i as u32)),
        }
    }

    /// All members of `owner` called `name` (overloads).
    pub fn members_named(&self, owner: EntityId, name: &str) -> Vec<EntityId> {
        self.entity(owner)
            .members
            .iter()
            .copied()
            .filter(|&m| &*self.entity(m).name == name)
            .collect()
    }

    /// User-declared entities without an owner.
    pub fn top_level(&self) -> Vec<EntityId> {
        (EntityId::FIRST_USER..self.entities.len() as u32)
            .map(EntityId)
            .filter(|&id| {
                let e = self.entity(id);
                e.owner.is_none() && !matches!(e.kind, EntityKind::Aggregate(_))
            })
            .collect()
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
        self.caches = Caches::default();
    }

    pub fn syntax(&self) -> &SyntaxTree {
        &self.syntax
    }

    pub fn syntax_mut(&mut self) -> &mut SyntaxTree {
        &mut self.syntax
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    pub fn report(&mut self, error: TypeError, node: Option<NodeId>, context: Option<NodeId>) {
        tracing::debug!(target: "tessel::diagnostics", code = error.code(), %error, "reported");
        self.diagnostics.push(Diagnostic {
            error,
            node,
            context,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.error.is_fatal())
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.name(EntityId::ROOT), "Object");
        assert_eq!(ctx.name(EntityId::REFERENCE), "Ref");
        assert_eq!(ctx.entity(EntityId::SEQUENCE).template_params.len(), 1);
        assert_eq!(ctx.entity_count() as u32, EntityId::FIRST_USER);
        assert_eq!(ctx.instance(InstanceId::ROOT).target, EntityId::ROOT);
        assert!(ctx.top_level().is_empty());
    }

    #[test]
    fn test_lookup() {
        let mut ctx = TypeContext::new();
        let point = ctx.declare_type(None, "Point", TypeCategory::Value);
        let field = ctx.declare_field(point, "x", InstanceId::ROOT);
        assert_eq!(ctx.lookup(None, "Point"), Some(point));
        assert_eq!(ctx.lookup(None, "Object"), Some(EntityId::ROOT));
        assert_eq!(ctx.lookup(Some(point), "x"), Some(field));
        assert_eq!(ctx.lookup(None, "x"), None);
        assert_eq!(ctx.top_level(), vec![point]);
    }

    #[test]
    fn test_report_collects() {
        let mut ctx = TypeContext::new();
        ctx.report(
            TypeError::AmbiguousCall {
                name: "f".into(),
                count: 2,
            },
            None,
            None,
        );
        assert!(!ctx.has_errors());
        ctx.report(TypeError::NameNotFound { name: "y".into() }, None, None);
        assert!(ctx.has_errors());
        assert_eq!(ctx.take_diagnostics().len(), 2);
        assert!(ctx.diagnostics().is_empty());
    }
}
