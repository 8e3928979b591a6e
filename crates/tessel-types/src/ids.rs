use std::sync::Arc;

/// Interned name of a declaration.
pub type Symbol = Arc<str>;

/// A declared symbol: type, function, field, namespace or template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const JOKER: EntityId = EntityId(0);
    /// Universal root every type implicitly inherits.
    pub const ROOT: EntityId = EntityId(1);
    pub const REFERENCE: EntityId = EntityId(2);
    pub const POINTER: EntityId = EntityId(3);
    /// Collection type a spread argument must match.
    pub const SEQUENCE: EntityId = EntityId(4);

    /// First ID available for user declarations (after the builtins and their parameters).
    pub const FIRST_USER: u32 = 8;

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an interned type instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub const JOKER: InstanceId = InstanceId(0);
    pub const ROOT: InstanceId = InstanceId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_joker(self) -> bool {
        self == InstanceId::JOKER
    }
}

/// Handle to an interned translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TranslationId(pub u32);

impl TranslationId {
    pub const EMPTY: TranslationId = TranslationId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
