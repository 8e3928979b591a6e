use tessel_syntax::NodeId;

use crate::context::TypeContext;
use crate::entity::{AggregateKind, EntityKind, FunctionRole, TypeCategory, Variance};
use crate::error::TypeError;
use crate::ids::{EntityId, InstanceId};
use crate::instance::TypeRef;
use crate::mutability::mutability_matches;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Same,
    /// Nominal subtype (or a type standing in through a parameter bound).
    Substitute,
    /// Duck-typed protocol conformance.
    Structural,
    /// Through an implicit constructor of the target.
    InConversion,
    /// Through an implicit conversion function of the input.
    OutConversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub kind: MatchKind,
    /// Inheritance hops, summed over template arguments.
    pub distance: u32,
    pub implicit_reference: bool,
    pub auto_dereference: bool,
    /// Set by call resolution when the parameter keeps the argument.
    pub attachment: bool,
}

impl Accepted {
    pub fn new(kind: MatchKind, distance: u32) -> Self {
        Self {
            kind,
            distance,
            implicit_reference: false,
            auto_dereference: false,
            attachment: false,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind == MatchKind::Same
            && self.distance == 0
            && !self.implicit_reference
            && !self.auto_dereference
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Mismatch,
    /// The types fit but the input's mutability may not flow into the target.
    Mutability,
    /// The target storage would outlive the referenced value.
    Lifetime,
    /// A value type substituted by a subtype while slicing is disabled.
    Slicing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMatch {
    Yes(Accepted),
    No(Rejection),
}

impl TypeMatch {
    pub const SAME: TypeMatch = TypeMatch::Yes(Accepted {
        kind: MatchKind::Same,
        distance: 0,
        implicit_reference: false,
        auto_dereference: false,
        attachment: false,
    });

    pub const MISMATCH: TypeMatch = TypeMatch::No(Rejection::Mismatch);

    pub fn is_yes(&self) -> bool {
        matches!(self, TypeMatch::Yes(_))
    }

    pub fn is_no(&self) -> bool {
        !self.is_yes()
    }

    pub fn accepted(&self) -> Option<Accepted> {
        match self {
            TypeMatch::Yes(accepted) => Some(*accepted),
            TypeMatch::No(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            TypeMatch::Yes(_) => None,
            TypeMatch::No(rejection) => Some(*rejection),
        }
    }

    pub fn kind(&self) -> Option<MatchKind> {
        self.accepted().map(|a| a.kind)
    }

    pub fn distance(&self) -> Option<u32> {
        self.accepted().map(|a| a.distance)
    }

    pub fn is_exact(&self) -> bool {
        self.accepted().is_some_and(|a| a.is_exact())
    }

    pub fn is_mutability_mismatch(&self) -> bool {
        matches!(self, TypeMatch::No(Rejection::Mutability))
    }

    fn map_accepted(self, f: impl FnOnce(&mut Accepted)) -> TypeMatch {
        match self {
            TypeMatch::Yes(mut accepted) => {
                f(&mut accepted);
                TypeMatch::Yes(accepted)
            }
            no => no,
        }
    }
}

/// Every result must be a yes; the worst one is reported.
fn combine_all(results: Vec<TypeMatch>) -> TypeMatch {
    let mut worst: Option<Accepted> = None;
    for result in results {
        match result {
            TypeMatch::No(rejection) => return TypeMatch::No(rejection),
            TypeMatch::Yes(accepted) => {
                worst = Some(match worst {
                    None => accepted,
                    Some(prev) if prev.kind == accepted.kind => Accepted {
                        distance: prev.distance.max(accepted.distance),
                        ..prev
                    },
                    Some(prev) => Accepted::new(MatchKind::Substitute, prev.distance.max(accepted.distance)),
                });
            }
        }
    }
    worst.map_or(TypeMatch::MISMATCH, TypeMatch::Yes)
}

/// One yes suffices; the closest one is reported. A mutability rejection is
/// preferred over a plain mismatch so callers can explain it.
fn combine_any(results: Vec<TypeMatch>) -> TypeMatch {
    let mut best: Option<Accepted> = None;
    let mut rejection = Rejection::Mismatch;
    for result in results {
        match result {
            TypeMatch::Yes(accepted) => {
                if best.map_or(true, |b| accepted.distance < b.distance) {
                    best = Some(accepted);
                }
            }
            TypeMatch::No(Rejection::Mutability) => rejection = Rejection::Mutability,
            TypeMatch::No(_) => {}
        }
    }
    best.map_or(TypeMatch::No(rejection), TypeMatch::Yes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Try implicit in/out conversions.
    pub conversions: bool,
    /// Reject references whose storage would outlive the referenced value.
    pub lifetimes: bool,
    /// Apply the mutability rule after a structural success.
    pub mutability: bool,
    /// Matching behind a reference: substituting a value subtype does not slice.
    pub by_reference: bool,
}

impl MatchOptions {
    pub const STANDARD: MatchOptions = MatchOptions {
        conversions: true,
        lifetimes: true,
        mutability: true,
        by_reference: false,
    };

    /// No conversions, no lifetime checks.
    pub const STRICT: MatchOptions = MatchOptions {
        conversions: false,
        lifetimes: false,
        mutability: true,
        by_reference: false,
    };

    fn nested(self) -> MatchOptions {
        MatchOptions {
            conversions: false,
            lifetimes: false,
            ..self
        }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions::STANDARD
    }
}

impl TypeContext {
    /// Whether a value of type `input` may be used where `target` is
    /// expected. The tiers are tried in a fixed order and the first one that
    /// applies decides.
    pub fn matches(&mut self, input: impl Into<TypeRef>, target: impl Into<TypeRef>) -> TypeMatch {
        self.matches_with(input.into(), target.into(), MatchOptions::STANDARD)
    }

    pub fn matches_with(&mut self, input: TypeRef, target: TypeRef, options: MatchOptions) -> TypeMatch {
        let result = self.match_tiers(input, target, options);
        tracing::trace!(
            target: "tessel::matcher",
            input = %self.display(input.instance),
            target = %self.display(target.instance),
            ?result,
            "match"
        );
        result
    }

    fn match_tiers(&mut self, input: TypeRef, target: TypeRef, options: MatchOptions) -> TypeMatch {
        let (i, t) = (input.instance, target.instance);
        if i.is_joker() || t.is_joker() {
            return TypeMatch::SAME;
        }
        if options.lifetimes && self.outlives(target.lifetime, input.lifetime) {
            return TypeMatch::No(Rejection::Lifetime);
        }
        if i == t {
            return TypeMatch::SAME;
        }
        if let Some(result) = self.match_aggregates(input, target, options) {
            return result;
        }
        if options.conversions {
            if let Some(result) = self.match_in_conversion(i, t) {
                return result;
            }
        }
        if let Some(result) = self.match_references(input, target, options) {
            return result;
        }
        if options.conversions {
            if let Some(result) = self.match_out_conversion(i, t) {
                return result;
            }
        }
        let nominal = self.match_nominal(i, t, options);
        if nominal.is_yes() {
            return nominal;
        }
        self.match_reverse(i, t, options).unwrap_or(nominal)
    }

    // ---------------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------------

    fn match_aggregates(&mut self, input: TypeRef, target: TypeRef, options: MatchOptions) -> Option<TypeMatch> {
        if let Some(agg) = self.entity(self.target_of(input.instance)).as_aggregate().cloned() {
            let results: Vec<TypeMatch> = agg
                .members
                .iter()
                .map(|&m| self.matches_with(TypeRef::new(m, input.lifetime), target, options))
                .collect();
            return Some(match agg.kind {
                AggregateKind::Union => combine_all(results),
                AggregateKind::Intersection => combine_any(results),
            });
        }
        if let Some(agg) = self.entity(self.target_of(target.instance)).as_aggregate().cloned() {
            let results: Vec<TypeMatch> = agg
                .members
                .iter()
                .map(|&m| self.matches_with(input, TypeRef::new(m, target.lifetime), options))
                .collect();
            let result = match agg.kind {
                AggregateKind::Union => combine_any(results),
                AggregateKind::Intersection => combine_all(results),
            };
            if result.is_yes()
                && self.config().duck_typing
                && self.is_protocol_union(target.instance)
                && self.entity(self.target_of(input.instance)).is_type()
            {
                // Record which alternatives the input covers, for dispatch
                self.virtual_table(input.instance, target.instance);
            }
            return Some(result);
        }
        None
    }

    // ---------------------------------------------------------------------
    // Conversions
    // ---------------------------------------------------------------------

    fn match_in_conversion(&mut self, input: InstanceId, target: InstanceId) -> Option<TypeMatch> {
        let entity = self.target_of(target);
        let table = self.instance(target).translation;
        let sources: Vec<InstanceId> = self
            .entity(entity)
            .members
            .iter()
            .filter_map(|&m| {
                let f = self.entity(m).as_function()?;
                let implicit = matches!(f.role, FunctionRole::Constructor { implicit: true });
                (implicit && f.params.len() == 1 && !f.params[0].kind.is_variadic())
                    .then(|| f.params[0].ty)
            })
            .collect();
        for source in sources {
            let source = self.translate_through(source, table);
            if self.same_core(source, target) {
                continue;
            }
            if self
                .matches_with(input.into(), source.into(), MatchOptions::STRICT)
                .is_yes()
            {
                return Some(TypeMatch::Yes(Accepted::new(MatchKind::InConversion, 0)));
            }
        }
        None
    }

    fn match_out_conversion(&mut self, input: InstanceId, target: InstanceId) -> Option<TypeMatch> {
        for member in self.callable_members(input) {
            let Some(f) = self.entity(member.function).as_function() else {
                continue;
            };
            let implicit = matches!(f.role, FunctionRole::Conversion { implicit: true });
            if !implicit || !f.params.is_empty() {
                continue;
            }
            let result = f.result;
            let result = self.translate_through(result, member.table);
            if self.same_core(result, input) {
                continue;
            }
            if self
                .matches_with(result.into(), target.into(), MatchOptions::STRICT)
                .is_yes()
            {
                return Some(TypeMatch::Yes(Accepted::new(MatchKind::OutConversion, 0)));
            }
        }
        None
    }

    // ---------------------------------------------------------------------
    // References
    // ---------------------------------------------------------------------

    fn match_references(&mut self, input: TypeRef, target: TypeRef, options: MatchOptions) -> Option<TypeMatch> {
        let (i, t) = (input.instance, target.instance);
        let behind = MatchOptions {
            by_reference: true,
            ..options.nested()
        };
        let input_pointer = self.is_pointer_like(i);
        if self.is_reference(t) {
            let target_inner = self.deref(t)?;
            if input_pointer {
                let input_inner = self.deref(i)?;
                let inner = self.matches_with(
                    TypeRef::new(input_inner, input.lifetime),
                    TypeRef::new(target_inner, target.lifetime),
                    behind,
                );
                return Some(inner.map_accepted(|a| a.implicit_reference = true));
            }
            let inner = self.matches_with(input, TypeRef::new(target_inner, target.lifetime), behind);
            return inner
                .is_yes()
                .then(|| inner.map_accepted(|a| a.implicit_reference = true));
        }
        if input_pointer && !self.is_pointer_like(t) {
            let input_inner = self.deref(i)?;
            let inner = self.matches_with(
                TypeRef::new(input_inner, input.lifetime),
                target,
                MatchOptions {
                    by_reference: true,
                    ..options.nested()
                },
            );
            return inner
                .is_yes()
                .then(|| inner.map_accepted(|a| a.auto_dereference = true));
        }
        None
    }

    // ---------------------------------------------------------------------
    // Nominal and structural
    // ---------------------------------------------------------------------

    fn match_nominal(&mut self, input: InstanceId, target: InstanceId, options: MatchOptions) -> TypeMatch {
        let target_entity = self.target_of(target);
        let category = self.entity(target_entity).category();

        if target_entity == EntityId::ROOT {
            let distance = match self.find_ancestor(input, EntityId::ROOT) {
                Some(root) => root.distance,
                None => {
                    self.ancestors(input)
                        .iter()
                        .map(|a| a.distance)
                        .max()
                        .unwrap_or(0)
                        + 1
                }
            };
            return self.check_mutability(input, target, Accepted::new(MatchKind::Substitute, distance), options);
        }

        if let Some(ancestor) = self.find_ancestor(input, target_entity) {
            if ancestor.distance > 0
                && category == Some(TypeCategory::Value)
                && !options.by_reference
                && !self.config().slicing
            {
                return TypeMatch::No(Rejection::Slicing);
            }
            if let Some(arg_distance) = self.match_template_args(ancestor.instance, target, options) {
                let kind = if ancestor.distance == 0 && arg_distance == 0 {
                    MatchKind::Same
                } else {
                    MatchKind::Substitute
                };
                let accepted = Accepted::new(kind, ancestor.distance + arg_distance);
                return self.check_mutability(input, target, accepted, options);
            }
        }

        if category == Some(TypeCategory::Protocol)
            && self.config().duck_typing
            && self.entity(self.target_of(input)).is_type()
            && self
                .virtual_table(input, target)
                .is_some_and(|table| table.complete)
        {
            return self.check_mutability(input, target, Accepted::new(MatchKind::Structural, 1), options);
        }

        TypeMatch::MISMATCH
    }

    /// Compare the template arguments of `input` (an instance of the same
    /// entity as `target`) parameter by parameter. Unbound parameters on
    /// either side accept anything.
    fn match_template_args(&mut self, input: InstanceId, target: InstanceId, options: MatchOptions) -> Option<u32> {
        let entity = self.target_of(target);
        let params = self.entity(entity).template_params.clone();
        let input_table = self.instance(input).translation;
        let target_table = self.instance(target).translation;
        let mut total = 0;
        for param in params {
            let input_arg = self.translation(input_table).get(param);
            let target_arg = self.translation(target_table).get(param);
            let (Some(input_arg), Some(target_arg)) = (input_arg, target_arg) else {
                continue;
            };
            let variance = self
                .entity(param)
                .as_template_param()
                .map(|p| p.variance)
                .unwrap_or_default();
            match self.template_matches_target(input_arg, target_arg, variance, options) {
                TypeMatch::Yes(accepted) => total += accepted.distance,
                TypeMatch::No(_) => return None,
            }
        }
        Some(total)
    }

    /// Match one template argument under the variance of its parameter.
    /// Nested variances compose because a contravariant position swaps the
    /// operands, and a second swap further in restores them.
    pub fn template_matches_target(
        &mut self,
        input: InstanceId,
        target: InstanceId,
        variance: Variance,
        options: MatchOptions,
    ) -> TypeMatch {
        let nested = options.nested();
        match variance {
            Variance::None => {
                if input.is_joker() || target.is_joker() || self.same_core(input, target) {
                    TypeMatch::SAME
                } else {
                    TypeMatch::MISMATCH
                }
            }
            Variance::Out => self.matches_with(input.into(), target.into(), nested),
            Variance::In => self.matches_with(target.into(), input.into(), nested),
        }
    }

    fn check_mutability(
        &mut self,
        input: InstanceId,
        target: InstanceId,
        accepted: Accepted,
        options: MatchOptions,
    ) -> TypeMatch {
        if !options.mutability {
            return TypeMatch::Yes(accepted);
        }
        let input_mutability = self.mutability_of_type(input);
        let target_mutability = self.target_mutability(target);
        if mutability_matches(input_mutability, target_mutability, self.config().mutability_mode) {
            TypeMatch::Yes(accepted)
        } else {
            TypeMatch::No(Rejection::Mutability)
        }
    }

    // ---------------------------------------------------------------------
    // Reverse searches
    // ---------------------------------------------------------------------

    fn match_reverse(&mut self, input: InstanceId, target: InstanceId, options: MatchOptions) -> Option<TypeMatch> {
        let input_entity = self.target_of(input);
        let target_entity = self.target_of(target);

        // An enum value flows into an enum that extends it
        if self.entity(input_entity).category() == Some(TypeCategory::Enum)
            && self.entity(target_entity).category() == Some(TypeCategory::Enum)
        {
            let ancestor = self.find_ancestor(target, input_entity)?;
            let accepted = Accepted::new(MatchKind::Substitute, ancestor.distance);
            return Some(self.check_mutability(input, target, accepted, options));
        }

        // A value fits an open parameter only through one of its base-of
        // bounds: input <= bound <= T. Inherits bounds say nothing about how
        // narrow T is.
        if let EntityKind::TemplateParam(param) = &self.entity(target_entity).kind {
            let bounds = param.constraint.base_of.clone();
            let nested = options.nested();
            let mut best: Option<Accepted> = None;
            for bound in bounds {
                if let TypeMatch::Yes(found) = self.matches_with(input.into(), bound.into(), nested) {
                    let distance = found.distance + 1;
                    if best.map_or(true, |b| distance < b.distance) {
                        best = Some(Accepted::new(MatchKind::Substitute, distance));
                    }
                }
            }
            return Some(match best {
                Some(accepted) => self.check_mutability(input, target, accepted, options),
                None => TypeMatch::No(Rejection::Mismatch),
            });
        }
        None
    }

    // ---------------------------------------------------------------------
    // Casts
    // ---------------------------------------------------------------------

    /// Explicit cast from `input` to `target`. Related types always cast;
    /// unrelated ones only when one side is open to further subtypes.
    pub fn check_cast(&mut self, input: InstanceId, target: InstanceId, node: Option<NodeId>) -> bool {
        if self
            .matches_with(input.into(), target.into(), MatchOptions::STRICT)
            .is_yes()
            || self
                .matches_with(target.into(), input.into(), MatchOptions::STRICT)
                .is_yes()
        {
            return true;
        }
        let allowed = (self.is_open_type(input) && !self.is_closed_type(target))
            || (self.is_open_type(target) && !self.is_closed_type(input));
        if !allowed {
            let from = self.display(input);
            let to = self.display(target);
            self.report(TypeError::InvalidCast { from, to }, node, None);
        }
        allowed
    }

    /// Protocols, parameters and aggregates may be implemented by anything.
    fn is_open_type(&self, id: InstanceId) -> bool {
        match &self.entity(self.target_of(id)).kind {
            EntityKind::Type(decl) => decl.category == TypeCategory::Protocol,
            EntityKind::TemplateParam(_) | EntityKind::Aggregate(_) => true,
            _ => false,
        }
    }

    /// No further subtypes can exist.
    fn is_closed_type(&self, id: InstanceId) -> bool {
        match &self.entity(self.target_of(id)).kind {
            EntityKind::Type(decl) => {
                decl.sealed || matches!(decl.category, TypeCategory::Value | TypeCategory::Enum)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::FunctionDecl;
    use crate::lifetime::Lifetime;
    use crate::mutability::Mutability;
    use tessel_syntax::{NodeKind, Span};

    struct Zoo {
        animal: InstanceId,
        cat: InstanceId,
        dog: InstanceId,
    }

    fn zoo(ctx: &mut TypeContext) -> Zoo {
        let animal = ctx.declare_type(None, "Animal", TypeCategory::Class);
        let cat = ctx.declare_type(None, "Cat", TypeCategory::Class);
        let dog = ctx.declare_type(None, "Dog", TypeCategory::Class);
        let animal = ctx.plain(animal);
        ctx.add_parent(cat, animal, true);
        ctx.add_parent(dog, animal, true);
        Zoo {
            animal,
            cat: ctx.plain(cat),
            dog: ctx.plain(dog),
        }
    }

    #[test]
    fn test_reflexive() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        for t in [z.animal, z.cat, InstanceId::ROOT, InstanceId::JOKER] {
            assert_eq!(ctx.matches(t, t), TypeMatch::SAME);
        }
    }

    #[test]
    fn test_joker_matches_anything() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        assert!(ctx.matches(InstanceId::JOKER, z.cat).is_exact());
        assert!(ctx.matches(z.dog, InstanceId::JOKER).is_exact());
    }

    #[test]
    fn test_nominal_distance() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let m = ctx.matches(z.cat, z.animal);
        assert_eq!(m.kind(), Some(MatchKind::Substitute));
        assert_eq!(m.distance(), Some(1));
        assert!(ctx.matches(z.animal, z.cat).is_no());
        assert!(ctx.matches(z.cat, z.dog).is_no());
        assert!(ctx.matches(z.cat, InstanceId::ROOT).is_yes());
    }

    #[test]
    fn test_variance() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let producer = ctx.declare_type(None, "Producer", TypeCategory::Class);
        ctx.declare_template_param(producer, "T", Variance::Out);
        let consumer = ctx.declare_type(None, "Consumer", TypeCategory::Class);
        ctx.declare_template_param(consumer, "T", Variance::In);
        let cell = ctx.declare_type(None, "Cell", TypeCategory::Class);
        ctx.declare_template_param(cell, "T", Variance::None);

        let p_cat = ctx.instantiate(producer, &[z.cat]);
        let p_animal = ctx.instantiate(producer, &[z.animal]);
        assert!(ctx.matches(p_cat, p_animal).is_yes());
        assert!(ctx.matches(p_animal, p_cat).is_no());

        let c_cat = ctx.instantiate(consumer, &[z.cat]);
        let c_animal = ctx.instantiate(consumer, &[z.animal]);
        assert!(ctx.matches(c_animal, c_cat).is_yes());
        assert!(ctx.matches(c_cat, c_animal).is_no());

        let cell_cat = ctx.instantiate(cell, &[z.cat]);
        let cell_animal = ctx.instantiate(cell, &[z.animal]);
        assert!(ctx.matches(cell_cat, cell_animal).is_no());
        assert!(ctx.matches(cell_animal, cell_cat).is_no());

        // Consumer<Consumer<T>> is covariant in T
        let cc_cat = ctx.instantiate(consumer, &[c_cat]);
        let cc_animal = ctx.instantiate(consumer, &[c_animal]);
        assert!(ctx.matches(cc_cat, cc_animal).is_yes());
        assert!(ctx.matches(cc_animal, cc_cat).is_no());
    }

    #[test]
    fn test_slicing_needs_config_or_reference() {
        let mut ctx = TypeContext::new();
        let base = ctx.declare_type(None, "Vec2", TypeCategory::Value);
        let derived = ctx.declare_type(None, "Vec3", TypeCategory::Value);
        let base = ctx.plain(base);
        ctx.add_parent(derived, base, true);
        let derived = ctx.plain(derived);

        assert_eq!(ctx.matches(derived, base), TypeMatch::No(Rejection::Slicing));
        let (rd, rb) = (ctx.reference_to(derived), ctx.reference_to(base));
        assert!(ctx.matches(rd, rb).is_yes());

        ctx.set_config(Config {
            slicing: true,
            ..Config::default()
        });
        assert!(ctx.matches(derived, base).is_yes());
    }

    #[test]
    fn test_mutability_rejection_is_flagged() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let mutable_animal = ctx.with_mutability(z.animal, Mutability::MUTABLE);
        let const_cat = ctx.with_mutability(z.cat, Mutability::CONST);
        let mutable_cat = ctx.with_mutability(z.cat, Mutability::MUTABLE);
        assert!(ctx.matches(const_cat, mutable_animal).is_mutability_mismatch());
        assert!(ctx.matches(mutable_cat, mutable_animal).is_yes());
        assert!(ctx.matches(mutable_cat, z.animal).is_yes());
        let const_animal = ctx.with_mutability(z.animal, Mutability::CONST);
        assert!(ctx.matches(mutable_cat, const_animal).is_mutability_mismatch());
        let literal = ctx.with_mutability(z.cat, Mutability::LITERAL);
        assert!(ctx.matches(literal, mutable_animal).is_yes());
    }

    #[test]
    fn test_duck_typing_toggle() {
        let mut ctx = TypeContext::new();
        let string = ctx.declare_type(None, "String", TypeCategory::Value);
        let string = ctx.plain(string);
        let printable = ctx.declare_type(None, "Printable", TypeCategory::Protocol);
        ctx.declare_function(Some(printable), "show", FunctionDecl::new(string));
        let point = ctx.declare_type(None, "Point", TypeCategory::Value);
        ctx.declare_function(Some(point), "show", FunctionDecl::new(string));
        let (printable, point) = (ctx.plain(printable), ctx.plain(point));

        let m = ctx.matches(point, printable);
        assert_eq!(m.kind(), Some(MatchKind::Structural));
        ctx.set_config(Config {
            duck_typing: false,
            ..Config::default()
        });
        assert!(ctx.matches(point, printable).is_no());
    }

    #[test]
    fn test_aggregates() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let cat_or_dog = ctx.aggregate(AggregateKind::Union, &[z.cat, z.dog]);
        assert!(ctx.matches(cat_or_dog, z.animal).is_yes());
        assert!(ctx.matches(z.cat, cat_or_dog).is_yes());
        assert!(ctx.matches(z.animal, cat_or_dog).is_no());
        assert!(ctx.matches(cat_or_dog, z.cat).is_no());

        let both = ctx.intersection_of(&[z.cat, z.dog]);
        assert!(ctx.matches(both, z.cat).is_yes());
        assert!(ctx.matches(z.cat, both).is_no());
    }

    #[test]
    fn test_conversions() {
        let mut ctx = TypeContext::new();
        let int = ctx.declare_type(None, "Int", TypeCategory::Value);
        let int_i = ctx.plain(int);
        let big = ctx.declare_type(None, "BigInt", TypeCategory::Value);
        ctx.declare_function(
            Some(big),
            "new",
            FunctionDecl::new(InstanceId::JOKER)
                .param("value", int_i)
                .role(FunctionRole::Constructor { implicit: true }),
        );
        let text = ctx.declare_type(None, "Text", TypeCategory::Value);
        let text_i = ctx.plain(text);
        let name = ctx.declare_type(None, "Name", TypeCategory::Value);
        ctx.declare_function(
            Some(name),
            "text",
            FunctionDecl::new(text_i).role(FunctionRole::Conversion { implicit: true }),
        );
        let (big_i, name_i) = (ctx.plain(big), ctx.plain(name));

        assert_eq!(ctx.matches(int_i, big_i).kind(), Some(MatchKind::InConversion));
        assert_eq!(ctx.matches(name_i, text_i).kind(), Some(MatchKind::OutConversion));
        assert!(ctx
            .matches_with(int_i.into(), big_i.into(), MatchOptions::STRICT)
            .is_no());
        assert!(!ctx.matches(int_i, big_i).is_exact());
    }

    #[test]
    fn test_reference_tiers() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let ref_cat = ctx.reference_to(z.cat);
        let ref_animal = ctx.reference_to(z.animal);
        let ptr_cat = ctx.pointer_to(z.cat);

        let m = ctx.matches(z.cat, ref_animal).accepted();
        assert!(m.is_some_and(|a| a.implicit_reference));
        let m = ctx.matches(ptr_cat, ref_animal).accepted();
        assert!(m.is_some_and(|a| a.implicit_reference));
        let m = ctx.matches(ref_cat, z.animal).accepted();
        assert!(m.is_some_and(|a| a.auto_dereference));
        assert!(ctx.matches(ref_animal, ref_cat).is_no());
    }

    #[test]
    fn test_reference_escape_rejected() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let tree = ctx.syntax_mut();
        let func = tree.add(NodeId::ROOT, NodeKind::Function, Span::dummy());
        let body = tree.add(func, NodeKind::Block, Span::dummy());
        let outer = tree.add(body, NodeKind::Statement, Span::dummy());
        let nested = tree.add(body, NodeKind::Block, Span::dummy());
        let inner = tree.add(nested, NodeKind::Statement, Span::dummy());

        let r = ctx.reference_to(z.cat);
        let value = TypeRef::new(r, Lifetime::local(inner));
        let storage = TypeRef::new(r, Lifetime::local(outer));
        assert_eq!(ctx.matches(value, storage), TypeMatch::No(Rejection::Lifetime));
        assert!(ctx.matches(storage, value).is_yes());
    }

    #[test]
    fn test_enum_reverse_and_param_bounds() {
        let mut ctx = TypeContext::new();
        let basic = ctx.declare_type(None, "Basic", TypeCategory::Enum);
        let extended = ctx.declare_type(None, "Extended", TypeCategory::Enum);
        let basic_i = ctx.plain(basic);
        ctx.add_parent(extended, basic_i, true);
        let extended_i = ctx.plain(extended);
        assert!(ctx.matches(basic_i, extended_i).is_yes());

        let z = zoo(&mut ctx);
        let holder = ctx.declare_type(None, "Holder", TypeCategory::Class);
        let t = ctx.declare_template_param(holder, "T", Variance::None);
        ctx.set_constraint(
            t,
            crate::entity::Constraint {
                base_of: vec![z.cat],
                ..Default::default()
            },
        );
        let t_i = ctx.param(t);
        // T may be as narrow as Cat, so only Cat and its subtypes fit
        let kitten = ctx.declare_type(None, "Kitten", TypeCategory::Class);
        ctx.add_parent(kitten, z.cat, true);
        let kitten = ctx.plain(kitten);
        assert!(ctx.matches(z.cat, t_i).is_yes());
        assert_eq!(ctx.matches(kitten, t_i).kind(), Some(MatchKind::Substitute));
        assert!(ctx.matches(z.animal, t_i).is_no());
        assert!(ctx.matches(z.dog, t_i).is_no());
    }

    #[test]
    fn test_open_param_rejects_without_base_of() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let holder = ctx.declare_type(None, "Holder", TypeCategory::Class);
        let open = ctx.declare_template_param(holder, "T", Variance::None);
        let open_i = ctx.param(open);
        assert_eq!(ctx.matches(z.cat, open_i), TypeMatch::No(Rejection::Mismatch));

        let bounded = ctx.declare_template_param(holder, "U", Variance::None);
        ctx.set_constraint(
            bounded,
            crate::entity::Constraint {
                inherits: vec![z.animal],
                ..Default::default()
            },
        );
        let bounded_i = ctx.param(bounded);
        assert!(ctx.matches(z.cat, bounded_i).is_no());
        assert!(ctx.matches(open_i, open_i).is_yes());
    }

    #[test]
    fn test_in_conversion_skips_zero_argument_members() {
        let mut ctx = TypeContext::new();
        let int = ctx.declare_type(None, "Int", TypeCategory::Value);
        let int = ctx.plain(int);
        let meters = ctx.declare_type(None, "Meters", TypeCategory::Value);
        let meters_i = ctx.plain(meters);
        ctx.declare_function(Some(meters), "value", FunctionDecl::new(int));
        ctx.declare_function(
            Some(meters),
            "new",
            FunctionDecl::new(meters_i)
                .param("raw", int)
                .role(FunctionRole::Constructor { implicit: true }),
        );
        assert_eq!(ctx.matches(int, meters_i).kind(), Some(MatchKind::InConversion));
        assert!(ctx.matches(meters_i, int).is_no());
    }

    #[test]
    fn test_casts() {
        let mut ctx = TypeContext::new();
        let z = zoo(&mut ctx);
        let v = ctx.declare_type(None, "Meters", TypeCategory::Value);
        let v = ctx.plain(v);
        let proto = ctx.declare_type(None, "Named", TypeCategory::Protocol);
        ctx.declare_function(Some(proto), "name", FunctionDecl::new(v));
        let proto = ctx.plain(proto);
        assert!(ctx.check_cast(z.animal, z.cat, None));
        assert!(ctx.check_cast(z.cat, proto, None));
        assert!(!ctx.check_cast(v, proto, None));
        assert_eq!(ctx.diagnostics().len(), 1);
    }
}
