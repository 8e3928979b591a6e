use tessel_syntax::NodeId;

use crate::context::TypeContext;
use crate::entity::{FunctionDecl, ParamKind};
use crate::error::{CoreResult, InternalError, TypeError};
use crate::ids::{EntityId, InstanceId, Symbol, TranslationId};
use crate::instance::TypeRef;
use crate::lifetime::Lifetime;
use crate::matcher::{Accepted, MatchOptions, Rejection, TypeMatch};
use crate::mutability::Mutability;
use crate::translation::Translation;

const WEIGHT_VARIADIC: u32 = 4;
const WEIGHT_GENERIC: u32 = 2;
const WEIGHT_INEXACT: u32 = 1;

/// Parameters hold their arguments only for the duration of the call, so
/// there is no escape to check.
const ARGUMENT_OPTIONS: MatchOptions = MatchOptions {
    lifetimes: false,
    ..MatchOptions::STANDARD
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArgument {
    pub ty: TypeRef,
    pub label: Option<Symbol>,
    /// Expands a sequence into a variadic parameter.
    pub spread: bool,
}

impl CallArgument {
    pub fn positional(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            label: None,
            spread: false,
        }
    }

    pub fn named(label: &str, ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            label: Some(Symbol::from(label)),
            spread: false,
        }
    }

    pub fn spread(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            label: None,
            spread: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallSite {
    pub node: Option<NodeId>,
    pub receiver: Option<TypeRef>,
    pub args: Vec<CallArgument>,
}

impl CallSite {
    pub fn new(args: Vec<CallArgument>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    pub fn with_receiver(mut self, receiver: impl Into<TypeRef>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn at(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

/// A candidate that fits the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResolution {
    pub function: InstanceId,
    /// Parameter index of each argument.
    pub arg_to_param: Vec<usize>,
    /// Arguments of each parameter, in call order.
    pub param_to_args: Vec<Vec<usize>>,
    /// Parameter types as seen at this call site.
    pub param_types: Vec<InstanceId>,
    pub arg_matches: Vec<Accepted>,
    pub receiver_match: Option<Accepted>,
    pub inferred: Vec<(EntityId, InstanceId)>,
    /// Shortest lifetime among the attached arguments.
    pub attachment: Lifetime,
    pub result: TypeRef,
    /// Optional parameters left at their default.
    pub defaults_used: usize,
    pub weights: Vec<u32>,
}

/// Why a candidate was dropped. Not a diagnostic by itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateFailure {
    NotAFunction,
    UnknownLabel(Symbol),
    DuplicateTarget { param: Symbol },
    SpreadToFixed { param: Symbol },
    TooManyArguments,
    MissingRequired { param: Symbol },
    VariadicCount {
        param: Symbol,
        count: usize,
        min: u32,
        max: Option<u32>,
    },
    /// A spread argument next to other arguments for the same variadic parameter.
    SpreadMixed { param: Symbol },
    ReceiverMismatch,
    ArgumentMismatch { argument: usize, rejection: Rejection },
    Inference { param: Symbol },
    Constraint { param: Symbol },
}

#[derive(Debug, Clone)]
pub enum Viability {
    Viable(Box<CallResolution>),
    Void(CandidateFailure),
}

#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// The selected candidate, also when the call is ambiguous.
    pub resolution: Option<CallResolution>,
    /// Candidates nothing dominated, when more than one.
    pub ambiguous: Vec<InstanceId>,
    pub failures: Vec<(InstanceId, CandidateFailure)>,
    /// Result type of the call; the Joker when nothing fits.
    pub result: TypeRef,
}

impl CallOutcome {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous.is_empty()
    }
}

struct Mapping {
    arg_to_param: Vec<usize>,
    param_to_args: Vec<Vec<usize>>,
}

impl TypeContext {
    /// Resolve a call among `candidates` (function instances, possibly with
    /// explicit template arguments). Errors are reported to the diagnostic
    /// sink; only broken internal invariants are returned as `Err`.
    ///
    /// Each candidate is checked on its own: arguments are mapped onto
    /// parameters, open template parameters are inferred and each argument
    /// is matched. Survivors are ranked by per-argument weights.
    pub fn resolve_call(&mut self, candidates: &[InstanceId], site: &CallSite) -> CoreResult<CallOutcome> {
        let name = candidates
            .first()
            .map(|&c| self.name(self.target_of(c)).to_string())
            .unwrap_or_default();

        let mut survivors = Vec::new();
        let mut failures = Vec::new();
        for &candidate in candidates {
            match self.resolve_candidate(candidate, site)? {
                Viability::Viable(resolution) => survivors.push(*resolution),
                Viability::Void(failure) => {
                    tracing::trace!(
                        target: "tessel::call",
                        function = %name,
                        ?failure,
                        "candidate dropped"
                    );
                    failures.push((candidate, failure));
                }
            }
        }

        if survivors.is_empty() {
            let error = match (candidates.len(), failures.first()) {
                (1, Some((_, CandidateFailure::UnknownLabel(label)))) => TypeError::WrongArgumentTarget {
                    name,
                    label: label.to_string(),
                },
                (1, Some((_, CandidateFailure::DuplicateTarget { param }))) => {
                    TypeError::DuplicateArgumentTarget {
                        name,
                        param: param.to_string(),
                    }
                }
                (1, Some((_, CandidateFailure::VariadicCount { param, count, min, max }))) => {
                    let expected = match max {
                        Some(max) => format!("{min} to {max}"),
                        None => format!("at least {min}"),
                    };
                    TypeError::VariadicCount {
                        name,
                        param: param.to_string(),
                        expected,
                        found: *count,
                    }
                }
                _ => TypeError::TargetNotFound { name },
            };
            self.report(error, site.node, None);
            return Ok(CallOutcome {
                resolution: None,
                ambiguous: Vec::new(),
                failures,
                result: TypeRef::joker(),
            });
        }

        let best = undominated(&survivors);
        let ambiguous = if best.len() > 1 {
            tracing::debug!(target: "tessel::call", function = %name, count = best.len(), "ambiguous call");
            self.report(
                TypeError::AmbiguousCall {
                    name,
                    count: best.len(),
                },
                site.node,
                None,
            );
            best.iter().map(|&i| survivors[i].function).collect()
        } else {
            Vec::new()
        };
        let chosen = survivors.swap_remove(best[0]);
        Ok(CallOutcome {
            result: chosen.result,
            resolution: Some(chosen),
            ambiguous,
            failures,
        })
    }

    /// Check one candidate against the call site.
    pub fn resolve_candidate(&mut self, candidate: InstanceId, site: &CallSite) -> CoreResult<Viability> {
        let function = self.target_of(candidate);
        let Some(decl) = self.entity(function).as_function().cloned() else {
            return Ok(Viability::Void(CandidateFailure::NotAFunction));
        };

        let (receiver_table, receiver_match) = match self.match_receiver(function, &decl, site) {
            Ok(found) => found,
            Err(failure) => return Ok(Viability::Void(failure)),
        };

        let mapping = match map_arguments(&decl, &site.args) {
            Ok(mapping) => mapping,
            Err(failure) => return Ok(Viability::Void(failure)),
        };
        verify_mapping(&mapping)?;

        let defaults_used = match check_completeness(&decl, &site.args, &mapping) {
            Ok(defaults) => defaults,
            Err(failure) => return Ok(Viability::Void(failure)),
        };

        // Parameter types with the receiver's arguments filled in
        let mut patterns = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            patterns.push(self.translate_through(param.ty, receiver_table));
        }

        let function_table = self.instance(candidate).translation;
        let open: Vec<EntityId> = self
            .entity(function)
            .template_params
            .iter()
            .copied()
            .filter(|&p| {
                self.translation(function_table)
                    .get(p)
                    .map_or(true, InstanceId::is_joker)
            })
            .collect();

        let mut inferred = Vec::new();
        let mut table = function_table;
        if !open.is_empty() {
            let mut pairs = Vec::with_capacity(site.args.len());
            for (index, arg) in site.args.iter().enumerate() {
                let slot = mapping.arg_to_param[index];
                let pattern = if arg.spread {
                    self.sequence_of(patterns[slot])
                } else {
                    patterns[slot]
                };
                pairs.push((arg.ty.instance, pattern));
            }
            inferred = match self.infer_arguments(&open, &pairs) {
                Ok(bindings) => bindings,
                Err(param) => {
                    return Ok(Viability::Void(CandidateFailure::Inference {
                        param: self.entity(param).name.clone(),
                    }))
                }
            };
            // Inferred values replace the Joker placeholders
            let explicit = self.translation(function_table).clone();
            let extended = Translation::from_pairs(inferred.iter().copied()).union(&explicit);
            table = self.intern_translation(extended);
            for &(param, value) in &inferred {
                if !self.check_constraint(param, value, table).is_empty() {
                    return Ok(Viability::Void(CandidateFailure::Constraint {
                        param: self.entity(param).name.clone(),
                    }));
                }
            }
        }

        let mut param_types = Vec::with_capacity(patterns.len());
        for &pattern in &patterns {
            param_types.push(self.translate_through(pattern, table));
        }

        let mut arg_matches = Vec::with_capacity(site.args.len());
        let mut attachment = Lifetime::TIMELESS;
        let mut weights = Vec::with_capacity(site.args.len() + 1);
        for (index, arg) in site.args.iter().enumerate() {
            let slot = mapping.arg_to_param[index];
            let param = &decl.params[slot];
            let expected = if arg.spread {
                self.sequence_of(param_types[slot])
            } else {
                param_types[slot]
            };
            let mut accepted = match self.matches_with(arg.ty, expected.into(), ARGUMENT_OPTIONS) {
                TypeMatch::Yes(accepted) => accepted,
                TypeMatch::No(rejection) => {
                    return Ok(Viability::Void(CandidateFailure::ArgumentMismatch {
                        argument: index,
                        rejection,
                    }))
                }
            };
            if param.attached {
                accepted.attachment = true;
                attachment = self.shorter(attachment, arg.ty.lifetime);
            }

            let mut weight = 0;
            if param.kind.is_variadic() {
                weight += WEIGHT_VARIADIC;
            }
            if self.mentions_params(param.ty, &self.entity(function).template_params) {
                weight += WEIGHT_GENERIC;
            }
            if !accepted.is_exact() {
                weight += WEIGHT_INEXACT;
            }
            weights.push(weight);
            arg_matches.push(accepted);
        }
        weights.push(u32::from(defaults_used > 0));

        let result = self.translate_through(decl.result, receiver_table);
        let result = self.translate_through(result, table);
        let result = TypeRef::new(result, attachment);

        let resolution = CallResolution {
            function: candidate,
            arg_to_param: mapping.arg_to_param,
            param_to_args: mapping.param_to_args,
            param_types,
            arg_matches,
            receiver_match,
            inferred,
            attachment,
            result,
            defaults_used,
            weights,
        };
        tracing::trace!(
            target: "tessel::call",
            function = %self.name(function),
            weights = ?resolution.weights,
            "candidate viable"
        );
        Ok(Viability::Viable(Box::new(resolution)))
    }

    /// The receiver's view of the function's owner, and how the receiver
    /// matched it. Static functions and constructors ignore the receiver.
    fn match_receiver(
        &mut self,
        function: EntityId,
        decl: &FunctionDecl,
        site: &CallSite,
    ) -> Result<(TranslationId, Option<Accepted>), CandidateFailure> {
        let owner = self
            .entity(function)
            .owner
            .filter(|&o| self.entity(o).is_type());
        let (Some(owner), Some(receiver)) = (owner, site.receiver) else {
            return Ok((TranslationId::EMPTY, None));
        };
        if decl.is_static || decl.is_constructor() || receiver.instance.is_joker() {
            return Ok((TranslationId::EMPTY, None));
        }
        let base = if self.is_pointer_like(receiver.instance) {
            self.deref(receiver.instance).unwrap_or(receiver.instance)
        } else {
            receiver.instance
        };
        let ancestor = self
            .find_ancestor(base, owner)
            .ok_or(CandidateFailure::ReceiverMismatch)?;
        let mut expected = ancestor.instance;
        if decl.mutating {
            expected = self.with_mutability(expected, Mutability::MUTABLE);
        }
        let options = MatchOptions {
            conversions: false,
            ..ARGUMENT_OPTIONS
        };
        match self.matches_with(TypeRef::new(base, receiver.lifetime), expected.into(), options) {
            TypeMatch::Yes(accepted) => Ok((self.instance(ancestor.instance).translation, Some(accepted))),
            TypeMatch::No(_) => Err(CandidateFailure::ReceiverMismatch),
        }
    }
}

/// Bind arguments to parameter slots. Named arguments go to the parameter
/// of that name; positional ones fill slots after the last one used, and
/// stay on a variadic slot once they reach it.
fn map_arguments(decl: &FunctionDecl, args: &[CallArgument]) -> Result<Mapping, CandidateFailure> {
    let mut arg_to_param = Vec::with_capacity(args.len());
    let mut param_to_args = vec![Vec::new(); decl.params.len()];
    let mut cursor = 0usize;
    for (index, arg) in args.iter().enumerate() {
        let slot = match &arg.label {
            Some(label) => decl
                .params
                .iter()
                .position(|p| p.name == *label)
                .ok_or_else(|| CandidateFailure::UnknownLabel(label.clone()))?,
            None if cursor < decl.params.len() => cursor,
            None => return Err(CandidateFailure::TooManyArguments),
        };
        let param = &decl.params[slot];
        let variadic = param.kind.is_variadic();
        if arg.spread && !variadic {
            return Err(CandidateFailure::SpreadToFixed {
                param: param.name.clone(),
            });
        }
        if !variadic && !param_to_args[slot].is_empty() {
            return Err(CandidateFailure::DuplicateTarget {
                param: param.name.clone(),
            });
        }
        arg_to_param.push(slot);
        param_to_args[slot].push(index);
        cursor = if variadic { slot } else { slot + 1 };
    }
    Ok(Mapping {
        arg_to_param,
        param_to_args,
    })
}

fn verify_mapping(mapping: &Mapping) -> CoreResult<()> {
    let mut seen = vec![false; mapping.arg_to_param.len()];
    for (param, args) in mapping.param_to_args.iter().enumerate() {
        for &argument in args {
            if std::mem::replace(&mut seen[argument], true) {
                return Err(InternalError::DoubleMappedArgument { argument });
            }
            if mapping.arg_to_param[argument] != param {
                return Err(InternalError::InconsistentMapping { param, argument });
            }
        }
    }
    match seen.iter().position(|&s| !s) {
        Some(argument) => Err(InternalError::InconsistentMapping {
            param: mapping.arg_to_param[argument],
            argument,
        }),
        None => Ok(()),
    }
}

/// Returns how many optional parameters keep their default.
fn check_completeness(
    decl: &FunctionDecl,
    args: &[CallArgument],
    mapping: &Mapping,
) -> Result<usize, CandidateFailure> {
    let mut defaults = 0;
    for (param, bound) in decl.params.iter().zip(&mapping.param_to_args) {
        match param.kind {
            ParamKind::Required if bound.is_empty() => {
                return Err(CandidateFailure::MissingRequired {
                    param: param.name.clone(),
                })
            }
            ParamKind::Required => {}
            ParamKind::Optional => {
                if bound.is_empty() {
                    defaults += 1;
                }
            }
            ParamKind::Variadic { min, max } => {
                let spreads = bound.iter().filter(|&&a| args[a].spread).count();
                if spreads > 0 {
                    if spreads != 1 || bound.len() != 1 {
                        return Err(CandidateFailure::SpreadMixed {
                            param: param.name.clone(),
                        });
                    }
                    continue;
                }
                let count = bound.len();
                let too_few = count < min as usize;
                let too_many = max.is_some_and(|max| count > max as usize);
                if too_few || too_many {
                    return Err(CandidateFailure::VariadicCount {
                        param: param.name.clone(),
                        count,
                        min,
                        max,
                    });
                }
            }
        }
    }
    Ok(defaults)
}

/// `a` is nowhere worse than `b` and somewhere better.
fn dominates(a: &[u32], b: &[u32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x <= y) && a.iter().zip(b).any(|(x, y)| x < y)
}

/// Indices of the candidates no other candidate dominates.
fn undominated(survivors: &[CallResolution]) -> Vec<usize> {
    (0..survivors.len())
        .filter(|&i| {
            !survivors
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && dominates(&other.weights, &survivors[i].weights))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{TypeCategory, Variance};
    use tessel_syntax::{NodeKind, Span};

    struct Lib {
        int: InstanceId,
        string: InstanceId,
        animal: InstanceId,
        cat: InstanceId,
    }

    fn lib(ctx: &mut TypeContext) -> Lib {
        let int = ctx.declare_type(None, "Int", TypeCategory::Value);
        let string = ctx.declare_type(None, "String", TypeCategory::Value);
        let animal = ctx.declare_type(None, "Animal", TypeCategory::Class);
        let cat = ctx.declare_type(None, "Cat", TypeCategory::Class);
        let animal_i = ctx.plain(animal);
        ctx.add_parent(cat, animal_i, true);
        Lib {
            int: ctx.plain(int),
            string: ctx.plain(string),
            animal: animal_i,
            cat: ctx.plain(cat),
        }
    }

    fn candidates(ctx: &mut TypeContext, functions: &[EntityId]) -> Vec<InstanceId> {
        functions.iter().map(|&f| ctx.plain(f)).collect()
    }

    #[test]
    fn test_positional_and_named_mapping() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let f = ctx.declare_function(
            None,
            "f",
            FunctionDecl::new(l.int)
                .param("a", l.int)
                .param("b", l.string)
                .optional("c", l.int),
        );
        let cands = candidates(&mut ctx, &[f]);
        let site = CallSite::new(vec![
            CallArgument::named("b", l.string),
            CallArgument::positional(l.int),
            CallArgument::named("a", l.int),
        ]);
        let outcome = ctx.resolve_call(&cands, &site).expect("no internal error");
        let resolution = outcome.resolution.expect("resolved");
        assert_eq!(resolution.arg_to_param, vec![1, 2, 0]);
        assert_eq!(resolution.param_to_args, vec![vec![2], vec![0], vec![1]]);
        assert_eq!(resolution.defaults_used, 0);
        assert_eq!(outcome.result.instance, l.int);
    }

    #[test]
    fn test_wrong_and_duplicate_targets() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let f = ctx.declare_function(None, "f", FunctionDecl::new(l.int).param("a", l.int));
        let cands = candidates(&mut ctx, &[f]);

        let site = CallSite::new(vec![CallArgument::named("zzz", l.int)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("no internal error");
        assert!(outcome.result.instance.is_joker());
        let site = CallSite::new(vec![
            CallArgument::positional(l.int),
            CallArgument::named("a", l.int),
        ]);
        ctx.resolve_call(&cands, &site).expect("no internal error");

        let codes: Vec<_> = ctx.diagnostics().iter().map(|d| d.error.code()).collect();
        assert_eq!(codes, vec!["E0403", "E0404"]);
    }

    #[test]
    fn test_variadic_binding() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let f = ctx.declare_function(
            None,
            "sum",
            FunctionDecl::new(l.int).variadic("values", l.int, 1, Some(3)),
        );
        let cands = candidates(&mut ctx, &[f]);
        let seq = ctx.sequence_of(l.int);

        let none = CallSite::new(Vec::new());
        assert!(!ctx.resolve_call(&cands, &none).expect("ok").is_resolved());
        let spread = CallSite::new(vec![CallArgument::spread(seq)]);
        assert!(ctx.resolve_call(&cands, &spread).expect("ok").is_resolved());
        let mixed = CallSite::new(vec![
            CallArgument::positional(l.int),
            CallArgument::positional(l.int),
            CallArgument::spread(seq),
        ]);
        let outcome = ctx.resolve_call(&cands, &mixed).expect("ok");
        assert!(matches!(
            outcome.failures[0].1,
            CandidateFailure::SpreadMixed { .. }
        ));
        let three = CallSite::new(vec![CallArgument::positional(l.int); 3]);
        let resolution = ctx.resolve_call(&cands, &three).expect("ok").resolution;
        assert_eq!(resolution.map(|r| r.param_to_args), Some(vec![vec![0, 1, 2]]));
        let four = CallSite::new(vec![CallArgument::positional(l.int); 4]);
        assert!(!ctx.resolve_call(&cands, &four).expect("ok").is_resolved());
        assert_eq!(ctx.diagnostics()[0].error.code(), "E0405");
    }

    #[test]
    fn test_concrete_overload_dominates_generic() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let concrete = ctx.declare_function(None, "f", FunctionDecl::new(l.int).param("x", l.int));
        let generic = ctx.declare_function(None, "f", FunctionDecl::new(l.int));
        let t = ctx.declare_template_param(generic, "T", Variance::None);
        let t_i = ctx.param(t);
        ctx.set_signature(generic, FunctionDecl::new(t_i).param("x", t_i));
        let cands = candidates(&mut ctx, &[generic, concrete]);

        let site = CallSite::new(vec![CallArgument::positional(l.int)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("ok");
        assert!(!outcome.is_ambiguous());
        assert_eq!(outcome.resolution.map(|r| r.function), Some(cands[1]));

        // Only the generic one accepts a string, and infers T
        let site = CallSite::new(vec![CallArgument::positional(l.string)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("ok");
        let resolution = outcome.resolution.expect("generic fits");
        assert_eq!(resolution.inferred, vec![(t, l.string)]);
        assert_eq!(outcome.result.instance, l.string);
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_ambiguity_is_reported_but_resolves() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let a = ctx.declare_function(
            None,
            "g",
            FunctionDecl::new(l.int).param("x", l.animal).param("y", l.cat),
        );
        let b = ctx.declare_function(
            None,
            "g",
            FunctionDecl::new(l.string).param("x", l.cat).param("y", l.animal),
        );
        let cands = candidates(&mut ctx, &[a, b]);
        let site = CallSite::new(vec![CallArgument::positional(l.cat), CallArgument::positional(l.cat)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("ok");
        assert!(outcome.is_ambiguous());
        assert_eq!(outcome.result.instance, l.int);
        assert!(!ctx.has_errors());
        assert_eq!(ctx.diagnostics()[0].error.code(), "E0402");
    }

    #[test]
    fn test_defaults_penalty() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let short = ctx.declare_function(None, "h", FunctionDecl::new(l.int).param("x", l.int));
        let long = ctx.declare_function(
            None,
            "h",
            FunctionDecl::new(l.string).param("x", l.int).optional("y", l.int),
        );
        let cands = candidates(&mut ctx, &[long, short]);
        let site = CallSite::new(vec![CallArgument::positional(l.int)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("ok");
        assert_eq!(outcome.result.instance, l.int);
    }

    #[test]
    fn test_receiver_translation_and_mutating() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let list = ctx.declare_type(None, "List", TypeCategory::Class);
        let t = ctx.declare_template_param(list, "T", Variance::None);
        let t_i = ctx.param(t);
        let get = ctx.declare_function(Some(list), "get", FunctionDecl::new(t_i).param("index", l.int));
        let push = ctx.declare_function(
            Some(list),
            "push",
            FunctionDecl::new(l.int).param("item", t_i).mutating(),
        );
        let list_cat = ctx.instantiate(list, &[l.cat]);
        let cands = candidates(&mut ctx, &[get, push]);

        let site = CallSite::new(vec![CallArgument::positional(l.int)]).with_receiver(list_cat);
        let outcome = ctx.resolve_call(&cands[..1], &site).expect("ok");
        assert_eq!(outcome.result.instance, l.cat);

        let site = CallSite::new(vec![CallArgument::positional(l.cat)]).with_receiver(list_cat);
        let outcome = ctx.resolve_call(&cands[1..], &site).expect("ok");
        assert_eq!(outcome.failures[0].1, CandidateFailure::ReceiverMismatch);
        let mutable_list = ctx.with_mutability(list_cat, Mutability::MUTABLE);
        let site = CallSite::new(vec![CallArgument::positional(l.cat)]).with_receiver(mutable_list);
        assert!(ctx.resolve_call(&cands[1..], &site).expect("ok").is_resolved());
    }

    #[test]
    fn test_attachment_lifetime() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let tree = ctx.syntax_mut();
        let func = tree.add(NodeId::ROOT, NodeKind::Function, Span::dummy());
        let body = tree.add(func, NodeKind::Block, Span::dummy());
        let inner = tree.add(body, NodeKind::Block, Span::dummy());
        let local = tree.add(inner, NodeKind::Statement, Span::dummy());

        let ref_cat = ctx.reference_to(l.cat);
        let keep = ctx.declare_function(
            None,
            "keep",
            FunctionDecl::new(ref_cat).param("item", ref_cat).attached(),
        );
        let cands = candidates(&mut ctx, &[keep]);
        let arg = TypeRef::new(ref_cat, Lifetime::local(local));
        let site = CallSite::new(vec![CallArgument::positional(arg)]);
        let outcome = ctx.resolve_call(&cands, &site).expect("ok");
        assert_eq!(outcome.result.lifetime, arg.lifetime);
        let resolution = outcome.resolution.expect("resolved");
        assert!(resolution.arg_matches[0].attachment);
    }

    #[test]
    fn test_attached_argument_passes_through_call() {
        let mut ctx = TypeContext::new();
        let l = lib(&mut ctx);
        let stmt = ctx.syntax_mut().add(NodeId::ROOT, NodeKind::Statement, Span::dummy());
        let ref_cat = ctx.reference_to(l.cat);
        let look = ctx.declare_function(None, "look", FunctionDecl::new(l.int).param("item", ref_cat));
        let cands = candidates(&mut ctx, &[look]);
        let arg = TypeRef::new(ref_cat, Lifetime::attachment(stmt));
        let site = CallSite::new(vec![CallArgument::positional(arg)]);
        assert!(ctx.resolve_call(&cands, &site).expect("ok").is_resolved());

        // but the same value cannot be stored in timeless storage
        assert_eq!(
            ctx.matches(arg, TypeRef::timeless(ref_cat)),
            TypeMatch::No(Rejection::Lifetime)
        );
    }

    #[test]
    fn test_verify_mapping_catches_double_mapping() {
        let mapping = Mapping {
            arg_to_param: vec![0],
            param_to_args: vec![vec![0], vec![0]],
        };
        assert_eq!(
            verify_mapping(&mapping),
            Err(InternalError::DoubleMappedArgument { argument: 0 })
        );
    }
}
