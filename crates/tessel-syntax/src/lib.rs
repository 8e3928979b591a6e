pub mod span;
pub mod tree;

pub use span::Span;
pub use tree::{AccessorKind, Ancestors, NodeId, NodeKind, SyntaxNode, SyntaxTree};
