use std::fmt;

use serde::Serialize;
use tessel_syntax::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Reference,
    Type,
    Constraint,
    Call,
    Access,
}

/// Problems in the program being checked. Reported through the context's
/// diagnostic sink; the affected expression continues as the Joker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("cannot find `{name}` in this scope")]
    NameNotFound { name: String },

    #[error("`{name}` refers to itself before its declaration is complete")]
    CircularReference { name: String },

    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    Mismatch { expected: String, found: String },

    #[error("cannot cast `{from}` to unrelated type `{to}`")]
    InvalidCast { from: String, to: String },

    #[error("union `{union}` mixes value types with reference types")]
    SlicingMix { union: String },

    #[error("`{name}` expects {expected} template argument(s), found {found}")]
    TemplateArity { name: String, expected: usize, found: usize },

    #[error("cannot inherit from sealed type `{name}`")]
    SealedInheritance { name: String },

    #[error("`{ty}` does not meet the mutability requirement of `{param}`")]
    MutabilityConstraint { ty: String, param: String },

    #[error("`{ty}` is not reassignable as required by `{param}`")]
    AssignabilityConstraint { ty: String, param: String },

    #[error("`{ty}` does not inherit `{bound}` as required by `{param}`")]
    InheritsConstraint { ty: String, bound: String, param: String },

    #[error("`{ty}` is not a base of `{bound}` as required by `{param}`")]
    BaseOfConstraint { ty: String, bound: String, param: String },

    #[error("`{ty}` has no function `{function}` required by `{param}`")]
    MissingFunctionConstraint { ty: String, function: String, param: String },

    #[error("`{ty}` does not implement `{function}` from `{protocol}`")]
    MissingImplementation { ty: String, function: String, protocol: String },

    #[error("no overload of `{name}` accepts these arguments")]
    TargetNotFound { name: String },

    #[error("call to `{name}` is ambiguous between {count} candidates")]
    AmbiguousCall { name: String, count: usize },

    #[error("`{name}` has no parameter named `{label}`")]
    WrongArgumentTarget { name: String, label: String },

    #[error("parameter `{param}` of `{name}` is given more than once")]
    DuplicateArgumentTarget { name: String, param: String },

    #[error("parameter `{param}` of `{name}` takes {expected} argument(s), found {found}")]
    VariadicCount { name: String, param: String, expected: String, found: usize },

    #[error("`{member}` is not accessible from here")]
    Inaccessible { member: String },
}

impl TypeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TypeError::NameNotFound { .. } | TypeError::CircularReference { .. } => {
                ErrorCategory::Reference
            }
            TypeError::Mismatch { .. }
            | TypeError::InvalidCast { .. }
            | TypeError::SlicingMix { .. }
            | TypeError::TemplateArity { .. }
            | TypeError::SealedInheritance { .. } => ErrorCategory::Type,
            TypeError::MutabilityConstraint { .. }
            | TypeError::AssignabilityConstraint { .. }
            | TypeError::InheritsConstraint { .. }
            | TypeError::BaseOfConstraint { .. }
            | TypeError::MissingFunctionConstraint { .. }
            | TypeError::MissingImplementation { .. } => ErrorCategory::Constraint,
            TypeError::TargetNotFound { .. }
            | TypeError::AmbiguousCall { .. }
            | TypeError::WrongArgumentTarget { .. }
            | TypeError::DuplicateArgumentTarget { .. }
            | TypeError::VariadicCount { .. } => ErrorCategory::Call,
            TypeError::Inaccessible { .. } => ErrorCategory::Access,
        }
    }

    /// Stable code, grouped by category.
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::NameNotFound { .. } => "E0101",
            TypeError::CircularReference { .. } => "E0102",
            TypeError::Mismatch { .. } => "E0201",
            TypeError::InvalidCast { .. } => "E0202",
            TypeError::SlicingMix { .. } => "E0203",
            TypeError::TemplateArity { .. } => "E0204",
            TypeError::SealedInheritance { .. } => "E0205",
            TypeError::MutabilityConstraint { .. } => "E0301",
            TypeError::AssignabilityConstraint { .. } => "E0302",
            TypeError::InheritsConstraint { .. } => "E0303",
            TypeError::BaseOfConstraint { .. } => "E0304",
            TypeError::MissingFunctionConstraint { .. } => "E0305",
            TypeError::MissingImplementation { .. } => "E0306",
            TypeError::TargetNotFound { .. } => "E0401",
            TypeError::AmbiguousCall { .. } => "E0402",
            TypeError::WrongArgumentTarget { .. } => "E0403",
            TypeError::DuplicateArgumentTarget { .. } => "E0404",
            TypeError::VariadicCount { .. } => "E0405",
            TypeError::Inaccessible { .. } => "E0501",
        }
    }

    /// Ambiguity is reported, but resolution continues with the first survivor.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TypeError::AmbiguousCall { .. })
    }
}

/// A reported error together with the node it concerns and, optionally, the
/// node that led to it (the call site, the declaration being evaluated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub error: TypeError,
    pub node: Option<NodeId>,
    pub context: Option<NodeId>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.error.code(), self.error)
    }
}

/// Broken internal invariants. Never caused by the checked program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    #[error("internal error: argument {argument} was mapped to more than one parameter; please report this as a bug")]
    DoubleMappedArgument { argument: usize },

    #[error("internal error: parameter {param} lists argument {argument}, which is mapped elsewhere; please report this as a bug")]
    InconsistentMapping { param: usize, argument: usize },
}

pub type CoreResult<T> = Result<T, InternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic {
            error: TypeError::Mismatch {
                expected: "Int".into(),
                found: "String".into(),
            },
            node: None,
            context: None,
        };
        assert_eq!(
            diag.to_string(),
            "error[E0201]: type mismatch: expected `Int`, found `String`"
        );
        assert_eq!(diag.error.category(), ErrorCategory::Type);
    }

    #[test]
    fn test_ambiguity_is_not_fatal() {
        let err = TypeError::AmbiguousCall {
            name: "f".into(),
            count: 2,
        };
        assert!(!err.is_fatal());
        assert_eq!(err.category(), ErrorCategory::Call);
        assert!(TypeError::Inaccessible { member: "x".into() }.is_fatal());
    }
}
