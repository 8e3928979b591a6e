pub mod ids;
pub mod entity;
pub mod config;
pub mod error;
pub mod context;
pub mod translation;
pub mod instance;
pub mod mutability;
pub mod lifetime;
pub mod declare;
pub mod inheritance;
pub mod vtable;
pub mod matcher;
pub mod member;
pub mod constraints;
pub mod infer;
pub mod call;
pub mod evaluate;
pub mod binder;

pub use ids::{EntityId, InstanceId, Symbol, TranslationId};
pub use entity::{
    Aggregate, AggregateKind, Constraint, Entity, EntityKind, FieldDecl, FunctionDecl, FunctionRole,
    ParamKind, Parameter, ParentDecl, TemplateParam, TypeCategory, TypeDecl, Variance, Visibility,
};
pub use config::{Config, MutabilityMode};
pub use error::{CoreResult, Diagnostic, ErrorCategory, InternalError, TypeError};
pub use context::TypeContext;
pub use translation::Translation;
pub use instance::{CoreKey, TypeInstance, TypeRef};
pub use mutability::{mutability_matches, Mutability, MutabilityKind};
pub use lifetime::{Lifetime, LifetimeScope};
pub use inheritance::{Ancestor, Inheritance};
pub use vtable::{MemberRef, VirtualTable};
pub use matcher::{Accepted, MatchKind, MatchOptions, Rejection, TypeMatch};
pub use member::Member;
pub use constraints::ConstraintViolation;
pub use call::{CallArgument, CallOutcome, CallResolution, CallSite, CandidateFailure, Viability};
pub use binder::Candidate;
