use std::sync::Arc;

use crate::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The module node every tree starts with.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Getter,
    Setter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    Namespace,
    TypeDecl,
    Function,
    Accessor(AccessorKind),
    Block,
    Statement,
    Expression,
}

impl NodeKind {
    /// Nodes that introduce a lexical scope.
    pub fn opens_scope(self) -> bool {
        matches!(
            self,
            NodeKind::Module
                | NodeKind::Namespace
                | NodeKind::TypeDecl
                | NodeKind::Function
                | NodeKind::Accessor(_)
                | NodeKind::Block
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Accessor(_))
    }

    pub fn is_accessor(self) -> bool {
        matches!(self, NodeKind::Accessor(_))
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub span: Span,
    pub label: Option<Arc<str>>,
}

/// Arena of syntax nodes. Children are owned by exactly one parent.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![SyntaxNode {
                kind: NodeKind::Module,
                parent: None,
                children: Vec::new(),
                span: Span::dummy(),
                label: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn add(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        self.push(parent, kind, span, None)
    }

    pub fn add_labeled(&mut self, parent: NodeId, kind: NodeKind, label: &str, span: Span) -> NodeId {
        self.push(parent, kind, span, Some(Arc::from(label)))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, span: Span, label: Option<Arc<str>>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SyntaxNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            span,
            label,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// `id` followed by its parents up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Nearest node (including `id` itself) that opens a scope.
    pub fn enclosing_scope(&self, id: NodeId) -> NodeId {
        self.ancestors(id)
            .find(|&n| self.kind(n).opens_scope())
            .unwrap_or(NodeId::ROOT)
    }

    /// Nearest function or accessor node, including `id` itself.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&n| self.kind(n).is_callable())
    }

    /// Inclusive: a node is its own ancestor.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count() - 1
    }

    /// Visits every node under `start` exactly once, parents before children.
    pub fn walk(&self, start: NodeId, mut visit: impl FnMut(NodeId)) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            visit(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SyntaxTree, NodeId, NodeId, NodeId) {
        let mut tree = SyntaxTree::new();
        let func = tree.add_labeled(NodeId::ROOT, NodeKind::Function, "main", Span::dummy());
        let block = tree.add(func, NodeKind::Block, Span::dummy());
        let stmt = tree.add(block, NodeKind::Statement, Span::dummy());
        (tree, func, block, stmt)
    }

    #[test]
    fn test_enclosing_queries() {
        let (tree, func, block, stmt) = sample();
        assert_eq!(tree.enclosing_scope(stmt), block);
        assert_eq!(tree.enclosing_scope(block), block);
        assert_eq!(tree.enclosing_function(stmt), Some(func));
        assert_eq!(tree.enclosing_function(NodeId::ROOT), None);
        assert_eq!(tree.node(func).label.as_deref(), Some("main"));
    }

    #[test]
    fn test_ancestors_inclusive() {
        let (tree, func, block, stmt) = sample();
        let chain: Vec<_> = tree.ancestors(stmt).collect();
        assert_eq!(chain, vec![stmt, block, func, NodeId::ROOT]);
        assert!(tree.is_ancestor(stmt, stmt));
        assert!(tree.is_ancestor(func, stmt));
        assert!(!tree.is_ancestor(stmt, func));
        assert_eq!(tree.depth(stmt), 3);
    }

    #[test]
    fn test_walk_visits_each_node_once() {
        let (mut tree, func, _, _) = sample();
        tree.add(func, NodeKind::Accessor(AccessorKind::Getter), Span::dummy());
        let mut seen = Vec::new();
        tree.walk(NodeId::ROOT, |id| seen.push(id));
        assert_eq!(seen.len(), tree.len());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), tree.len());
    }
}
