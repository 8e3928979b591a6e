use crate::context::TypeContext;
use crate::ids::{EntityId, InstanceId, TranslationId};
use crate::instance::TypeRef;
use crate::mutability::Mutability;

/// A member found on an instance or one of its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub entity: EntityId,
    /// The instance (the receiver itself or an ancestor) declaring it.
    pub owner: InstanceId,
    /// Translation of `owner`; the member's declared types are read through it.
    pub table: TranslationId,
}

impl TypeContext {
    /// Nearest member called `name`, looking at `instance` first, then its
    /// ancestors closest first.
    pub fn find_member(&mut self, instance: InstanceId, name: &str) -> Option<Member> {
        self.members_on_chain(instance, name).into_iter().next()
    }

    /// Every member called `name` along the inheritance chain, nearest first.
    /// Overloads of a method are all returned.
    pub fn members_on_chain(&mut self, instance: InstanceId, name: &str) -> Vec<Member> {
        let mut owners = vec![instance];
        owners.extend(self.ancestors(instance).into_iter().map(|a| a.instance));
        let mut found = Vec::new();
        for owner in owners {
            let inst = *self.instance(owner);
            for entity in self.members_named(inst.target, name) {
                found.push(Member {
                    entity,
                    owner,
                    table: inst.translation,
                });
            }
        }
        found
    }

    /// Type of the field `name` read from a value of type `receiver`. Pointer
    /// receivers are dereferenced. The field takes the receiver's mutability
    /// unless it fixes its own, and lives as long as the receiver.
    pub fn read_field(&mut self, receiver: TypeRef, name: &str) -> Option<TypeRef> {
        let base = if self.is_pointer_like(receiver.instance) {
            self.deref(receiver.instance)?
        } else {
            receiver.instance
        };
        let member = self.find_member(base, name)?;
        let field = *self.entity(member.entity).as_field()?;
        let ty = self.translate_through(field.ty, member.table);
        let own = self.instance(ty).mutability;
        let from_receiver = self.instance(base).mutability;
        let mutability = Mutability {
            reassignable: field.reassignable,
            ..own.overlay(from_receiver)
        };
        let ty = self.with_mutability(ty, mutability);
        Some(TypeRef::new(ty, receiver.lifetime))
    }
}
