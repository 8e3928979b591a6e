use crate::context::TypeContext;
use crate::entity::EntityKind;
use crate::ids::{EntityId, InstanceId, TranslationId};
use crate::instance::TypeInstance;

/// Parameter bindings, sorted by parameter. Tables are interned, so equal
/// substitutions share one `TranslationId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Translation {
    entries: Vec<(EntityId, InstanceId)>,
}

impl Translation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later pairs win over earlier pairs for the same parameter.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (EntityId, InstanceId)>) -> Self {
        let mut entries: Vec<(EntityId, InstanceId)> = Vec::new();
        for (param, value) in pairs {
            match entries.binary_search_by_key(&param, |&(p, _)| p) {
                Ok(pos) => entries[pos].1 = value,
                Err(pos) => entries.insert(pos, (param, value)),
            }
        }
        Self { entries }
    }

    pub fn get(&self, param: EntityId) -> Option<InstanceId> {
        self.entries
            .binary_search_by_key(&param, |&(p, _)| p)
            .ok()
            .map(|pos| self.entries[pos].1)
    }

    pub fn contains(&self, param: EntityId) -> bool {
        self.get(param).is_some()
    }

    pub fn entries(&self) -> &[(EntityId, InstanceId)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn with(&self, param: EntityId, value: InstanceId) -> Translation {
        Translation::from_pairs(self.entries.iter().copied().chain([(param, value)]))
    }

    /// Entries of `self`, plus entries of `other` for parameters `self` does not bind.
    pub fn union(&self, other: &Translation) -> Translation {
        Translation::from_pairs(other.entries.iter().chain(self.entries.iter()).copied())
    }
}

impl TypeContext {
    pub fn intern_translation(&mut self, table: Translation) -> TranslationId {
        if let Some(&id) = self.translation_map.get(&table) {
            return id;
        }
        let id = TranslationId(self.translations.len() as u32);
        self.translation_map.insert(table.clone(), id);
        self.translations.push(table);
        id
    }

    pub fn translation(&self, id: TranslationId) -> &Translation {
        &self.translations[id.index()]
    }

    /// Substitute every template parameter reachable from `instance` that
    /// `table` binds. Unbound parameters stay open.
    pub fn translate_through(&mut self, instance: InstanceId, table: TranslationId) -> InstanceId {
        if table == TranslationId::EMPTY || instance.is_joker() {
            return instance;
        }
        let inst = *self.instance(instance);
        match &self.entity(inst.target).kind {
            EntityKind::TemplateParam(_) => match self.translation(table).get(inst.target) {
                Some(bound) => self.overlay_mutability(bound, inst.mutability),
                None => instance,
            },
            EntityKind::Aggregate(agg) => {
                let kind = agg.kind;
                let members = agg.members.clone();
                let translated: Vec<InstanceId> = members
                    .into_iter()
                    .map(|m| self.translate_through(m, table))
                    .collect();
                let aggregate = self.aggregate(kind, &translated);
                self.overlay_mutability(aggregate, inst.mutability)
            }
            _ => {
                if inst.translation == TranslationId::EMPTY {
                    return instance;
                }
                let entries = self.translation(inst.translation).entries().to_vec();
                let mapped: Vec<(EntityId, InstanceId)> = entries
                    .into_iter()
                    .map(|(param, value)| (param, self.translate_through(value, table)))
                    .collect();
                let translation = self.intern_translation(Translation::from_pairs(mapped));
                self.intern_instance(TypeInstance {
                    translation,
                    ..inst
                })
            }
        }
    }

    /// Table equivalent to translating through `first`, then through `second`.
    pub fn compose(&mut self, first: TranslationId, second: TranslationId) -> TranslationId {
        if first == TranslationId::EMPTY {
            return second;
        }
        if second == TranslationId::EMPTY {
            return first;
        }
        let entries = self.translation(first).entries().to_vec();
        let mapped: Vec<(EntityId, InstanceId)> = entries
            .into_iter()
            .map(|(param, value)| (param, self.translate_through(value, second)))
            .collect();
        let composed = Translation::from_pairs(mapped).union(self.translation(second));
        self.intern_translation(composed)
    }
}
