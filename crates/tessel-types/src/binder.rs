use tessel_syntax::NodeId;

use crate::context::TypeContext;
use crate::entity::Visibility;
use crate::error::TypeError;
use crate::ids::{EntityId, InstanceId};
use crate::instance::TypeRef;

/// One thing a name may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub ty: TypeRef,
    /// The declaration, when the candidate is a member.
    pub entity: Option<EntityId>,
    pub is_local_variable: bool,
}

impl Candidate {
    pub fn local(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            entity: None,
            is_local_variable: true,
        }
    }

    pub fn member(entity: EntityId, ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            entity: Some(entity),
            is_local_variable: false,
        }
    }
}

impl TypeContext {
    /// Whether code inside `from` (any declaration, or top level when
    /// `None`) may use `member`.
    pub fn is_accessible(&mut self, member: EntityId, from: Option<EntityId>) -> bool {
        let entity = self.entity(member);
        let Some(owner) = entity.owner else {
            return true;
        };
        let visibility = entity.visibility;
        let scopes = self.owner_chain(from);
        match visibility {
            Visibility::Public => true,
            Visibility::Private => scopes.contains(&owner),
            Visibility::Protected => scopes.into_iter().any(|scope| {
                if scope == owner {
                    return true;
                }
                if !self.entity(scope).is_type() {
                    return false;
                }
                let instance = self.plain(scope);
                self.inherits_from(instance, owner)
            }),
        }
    }

    /// `from` and every declaration enclosing it.
    fn owner_chain(&self, from: Option<EntityId>) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = from;
        while let Some(entity) = current {
            chain.push(entity);
            current = self.entity(entity).owner;
        }
        chain
    }

    /// Drop inaccessible candidates, let a local variable shadow members, and
    /// prefer candidates fitting `expected`. Reports when nothing is left.
    pub fn filter_candidates(
        &mut self,
        name: &str,
        candidates: &[Candidate],
        from: Option<EntityId>,
        expected: Option<InstanceId>,
        node: Option<NodeId>,
    ) -> Vec<Candidate> {
        if candidates.is_empty() {
            self.report(
                TypeError::NameNotFound {
                    name: name.to_string(),
                },
                node,
                None,
            );
            return Vec::new();
        }

        let accessible: Vec<Candidate> = candidates
            .iter()
            .copied()
            .filter(|c| c.entity.map_or(true, |e| self.is_accessible(e, from)))
            .collect();
        if accessible.is_empty() {
            self.report(
                TypeError::Inaccessible {
                    member: name.to_string(),
                },
                node,
                None,
            );
            return Vec::new();
        }

        if let Some(local) = accessible.iter().find(|c| c.is_local_variable) {
            return vec![*local];
        }

        if let Some(expected) = expected {
            let fitting: Vec<Candidate> = accessible
                .iter()
                .copied()
                .filter(|c| self.matches(c.ty, expected).is_yes())
                .collect();
            if !fitting.is_empty() {
                return fitting;
            }
        }
        accessible
    }

    /// Type of a reference to `name`. Anything unresolvable is reported and
    /// becomes the Joker.
    pub fn resolve_reference(
        &mut self,
        name: &str,
        candidates: &[Candidate],
        from: Option<EntityId>,
        expected: Option<InstanceId>,
        node: Option<NodeId>,
    ) -> TypeRef {
        let survivors = self.filter_candidates(name, candidates, from, expected, node);
        let Some(first) = survivors.first().copied() else {
            return TypeRef::joker();
        };
        if survivors.len() > 1 {
            self.report(
                TypeError::AmbiguousCall {
                    name: name.to_string(),
                    count: survivors.len(),
                },
                node,
                None,
            );
        }
        if let Some(expected) = expected {
            if self.matches(first.ty, expected).is_no() {
                let expected_name = self.display(expected);
                let found = self.display(first.ty.instance);
                self.report(
                    TypeError::Mismatch {
                        expected: expected_name,
                        found,
                    },
                    node,
                    None,
                );
                return TypeRef::joker();
            }
        }
        first.ty
    }
}
