use tessel_syntax::NodeId;

use crate::context::TypeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifetimeScope {
    Local,
    /// Globals, pointers and plain values: no owning node.
    #[default]
    Timeless,
    /// Bound to a call: may not be kept past it.
    Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lifetime {
    scope: LifetimeScope,
    node: Option<NodeId>,
}

impl Lifetime {
    pub const TIMELESS: Lifetime = Lifetime {
        scope: LifetimeScope::Timeless,
        node: None,
    };

    pub fn create(node: NodeId, scope: LifetimeScope) -> Self {
        match scope {
            LifetimeScope::Timeless => Lifetime::TIMELESS,
            _ => Lifetime {
                scope,
                node: Some(node),
            },
        }
    }

    pub fn local(node: NodeId) -> Self {
        Self::create(node, LifetimeScope::Local)
    }

    pub fn attachment(node: NodeId) -> Self {
        Self::create(node, LifetimeScope::Attachment)
    }

    pub fn scope(&self) -> LifetimeScope {
        self.scope
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_timeless(&self) -> bool {
        self.scope == LifetimeScope::Timeless
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::TIMELESS
    }
}

impl TypeContext {
    /// Whether storage with lifetime `this` may outlive a value with
    /// lifetime `source`, i.e. whether storing the value there would let it
    /// escape.
    pub fn outlives(&self, this: Lifetime, source: Lifetime) -> bool {
        self.outlives_with(this, source, &[])
    }

    /// Like [`outlives`](Self::outlives), but references created inside the
    /// accessors in `allowed_accessors` are compared like any other local.
    pub fn outlives_with(&self, this: Lifetime, source: Lifetime, allowed_accessors: &[NodeId]) -> bool {
        // A call-bound value may not be kept anywhere past the call, global
        // storage included
        if source.scope == LifetimeScope::Attachment && this.scope != LifetimeScope::Attachment {
            return true;
        }
        let (Some(this_node), Some(source_node)) = (this.node, source.node) else {
            return false;
        };

        let tree = self.syntax();
        let this_fn = tree.enclosing_function(this_node);
        let source_fn = tree.enclosing_function(source_node);
        if let (Some(a), Some(b)) = (this_fn, source_fn) {
            if a != b {
                return false;
            }
        }
        if let Some(accessor) = source_fn.filter(|&f| tree.kind(f).is_accessor()) {
            if !allowed_accessors.contains(&accessor) {
                return false;
            }
        }

        let source_scope = tree.enclosing_scope(source_node);
        let this_scope = tree.enclosing_scope(this_node);
        !tree.is_ancestor(source_scope, this_scope)
    }

    /// The lifetime that does not outlive the other; Timeless counts as longest.
    pub fn shorter(&self, a: Lifetime, b: Lifetime) -> Lifetime {
        if a.is_timeless() {
            return b;
        }
        if b.is_timeless() {
            return a;
        }
        if self.outlives(a, b) {
            b
        } else {
            a
        }
    }
}
