//! Answering the queries listed in a program file.

use tessel_types::{
    CallArgument, CallOutcome, CallSite, EntityId, EntityKind, InstanceId, TypeContext, TypeMatch,
    TypeRef,
};

use crate::program::{resolve_type, ArgSpec, LoadError, Query};

/// Run one query and render its answer as a single line.
pub fn run_query(ctx: &mut TypeContext, query: &Query) -> Result<String, LoadError> {
    match query {
        Query::Match { input, target } => {
            let (i, t) = (resolve_type(ctx, input)?, resolve_type(ctx, target)?);
            let found = ctx.matches(i, t);
            Ok(format!("match {input} -> {target}: {}", describe_match(&found)))
        }
        Query::Cast { input, target } => {
            let (i, t) = (resolve_type(ctx, input)?, resolve_type(ctx, target)?);
            let allowed = ctx.check_cast(i, t, None);
            Ok(format!("cast {input} -> {target}: {}", if allowed { "allowed" } else { "rejected" }))
        }
        Query::Member { ty, name } => {
            let instance = resolve_type(ctx, ty)?;
            Ok(format!("member {ty}.{name}: {}", describe_member(ctx, instance, name)))
        }
        Query::Mutability { ty } => {
            let instance = resolve_type(ctx, ty)?;
            let deep = ctx.mutability_of_type(instance);
            let surface = ctx.surface_mutability(instance);
            Ok(format!(
                "mutability {ty}: deep {:?}, surface {:?}{}",
                deep.kind,
                surface.kind,
                if surface.reassignable { ", reassignable" } else { "" }
            ))
        }
        Query::Call {
            function,
            receiver,
            args,
        } => {
            let receiver = receiver.as_deref().map(|text| resolve_type(ctx, text)).transpose()?;
            let args = args
                .iter()
                .map(|arg| call_argument(ctx, arg))
                .collect::<Result<Vec<_>, _>>()?;
            let candidates = call_candidates(ctx, function, receiver);
            let mut site = CallSite::new(args);
            if let Some(receiver) = receiver {
                site = site.with_receiver(receiver);
            }
            let label = match receiver {
                Some(r) => format!("{}.{function}", ctx.display(r)),
                None => function.clone(),
            };
            match ctx.resolve_call(&candidates, &site) {
                Ok(outcome) => Ok(format!("call {label}: {}", describe_call(ctx, &outcome))),
                Err(internal) => Ok(format!("call {label}: {internal}")),
            }
        }
        Query::Ancestors { ty } => {
            let instance = resolve_type(ctx, ty)?;
            let ancestors: Vec<String> = ctx
                .ancestors(instance)
                .into_iter()
                .map(|a| format!("{} ({})", ctx.display(a.instance), a.distance))
                .collect();
            Ok(format!("ancestors {ty}: {}", ancestors.join(", ")))
        }
    }
}

fn describe_match(found: &TypeMatch) -> String {
    match (found.accepted(), found.rejection()) {
        (Some(accepted), _) => {
            let mut text = format!("yes ({:?}, distance {})", accepted.kind, accepted.distance);
            if accepted.implicit_reference {
                text.push_str(", implicit reference");
            }
            if accepted.auto_dereference {
                text.push_str(", auto-dereference");
            }
            text
        }
        (None, Some(rejection)) => format!("no ({rejection:?})"),
        (None, None) => "no".to_string(),
    }
}

fn describe_member(ctx: &mut TypeContext, instance: InstanceId, name: &str) -> String {
    if let Some(field) = ctx.read_field(TypeRef::timeless(instance), name) {
        return format!("field of type {}", ctx.display(field.instance));
    }
    let Some(member) = ctx.find_member(instance, name) else {
        return "not found".to_string();
    };
    let owner = ctx.display(member.owner);
    let declared = match &ctx.entity(member.entity).kind {
        EntityKind::Function(decl) => decl.result,
        _ => return format!("declared on {owner}"),
    };
    let result = ctx.translate_through(declared, member.table);
    format!("function returning {} (declared on {owner})", ctx.display(result))
}

fn call_argument(ctx: &mut TypeContext, arg: &ArgSpec) -> Result<CallArgument, LoadError> {
    Ok(match arg {
        ArgSpec::Plain(text) => CallArgument::positional(resolve_type(ctx, text)?),
        ArgSpec::Full { ty, label, spread } => {
            let ty = resolve_type(ctx, ty)?;
            match (label, spread) {
                (_, true) => CallArgument::spread(ty),
                (Some(label), false) => CallArgument::named(label, ty),
                (None, false) => CallArgument::positional(ty),
            }
        }
    })
}

/// Functions called `name`: methods along the receiver's chain, or
/// top-level functions.
fn call_candidates(ctx: &mut TypeContext, name: &str, receiver: Option<InstanceId>) -> Vec<InstanceId> {
    let functions: Vec<EntityId> = match receiver {
        Some(receiver) => {
            let base = if ctx.is_pointer_like(receiver) {
                ctx.deref(receiver).unwrap_or(receiver)
            } else {
                receiver
            };
            ctx.members_on_chain(base, name)
                .into_iter()
                .map(|m| m.entity)
                .filter(|&e| ctx.entity(e).is_function())
                .collect()
        }
        None => ctx
            .top_level()
            .into_iter()
            .filter(|&e| ctx.name(e) == name && ctx.entity(e).is_function())
            .collect(),
    };
    functions.into_iter().map(|f| ctx.plain(f)).collect()
}

fn describe_call(ctx: &TypeContext, outcome: &CallOutcome) -> String {
    let result = ctx.display(outcome.result.instance);
    match &outcome.resolution {
        Some(resolution) if outcome.is_ambiguous() => {
            format!("ambiguous ({} candidates), first returns {result}", outcome.ambiguous.len())
                + &weights(&resolution.weights)
        }
        Some(resolution) => {
            let mut text = format!("resolved, returns {result}{}", weights(&resolution.weights));
            if !resolution.inferred.is_empty() {
                let inferred: Vec<String> = resolution
                    .inferred
                    .iter()
                    .map(|(param, value)| format!("{} = {}", ctx.name(*param), ctx.display(*value)))
                    .collect();
                text.push_str(&format!(", inferred {}", inferred.join(", ")));
            }
            text
        }
        None => {
            let reasons: Vec<String> = outcome.failures.iter().map(|(_, f)| format!("{f:?}")).collect();
            format!("unresolved [{}]", reasons.join("; "))
        }
    }
}

fn weights(weights: &[u32]) -> String {
    if weights.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = weights.iter().map(u32::to_string).collect();
    format!(", weights [{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{load, Program};

    fn run_all(json: &str) -> Vec<String> {
        let program = Program::from_json(json).unwrap();
        let mut ctx = load(&program).unwrap();
        program
            .queries
            .iter()
            .map(|q| run_query(&mut ctx, q).unwrap())
            .collect()
    }

    #[test]
    fn test_match_and_ancestors() {
        let lines = run_all(
            r#"{
                "types": [
                    { "name": "Animal" },
                    { "name": "Cat", "parents": ["Animal"] }
                ],
                "queries": [
                    { "query": "match", "input": "Cat", "target": "Animal" },
                    { "query": "match", "input": "Animal", "target": "Cat" },
                    { "query": "ancestors", "type": "Cat" }
                ]
            }"#,
        );
        assert_eq!(lines[0], "match Cat -> Animal: yes (Substitute, distance 1)");
        assert!(lines[1].starts_with("match Animal -> Cat: no"));
        assert!(lines[2].contains("Animal (1)"));
        assert!(!lines[2].contains("Object"));
    }

    #[test]
    fn test_member_and_call() {
        let lines = run_all(
            r#"{
                "types": [
                    { "name": "Int", "category": "value" },
                    { "name": "String", "category": "value" },
                    {
                        "name": "Pair",
                        "category": "value",
                        "template": [{ "name": "K", "variance": "out" }, { "name": "V", "variance": "out" }],
                        "fields": [{ "name": "first", "type": "K" }],
                        "methods": [{ "name": "second", "result": "V" }]
                    }
                ],
                "functions": [
                    { "name": "f", "params": [{ "name": "x", "type": "Int" }], "result": "Int" },
                    {
                        "name": "f",
                        "template": [{ "name": "T" }],
                        "params": [{ "name": "x", "type": "T" }],
                        "result": "T"
                    }
                ],
                "queries": [
                    { "query": "member", "type": "Pair<Int, String>", "name": "first" },
                    { "query": "member", "type": "Pair<Int, String>", "name": "second" },
                    { "query": "call", "function": "f", "args": ["Int"] },
                    { "query": "call", "function": "f", "args": ["String"] },
                    { "query": "call", "function": "second", "receiver": "Pair<Int, String>" }
                ]
            }"#,
        );
        assert_eq!(lines[0], "member Pair<Int, String>.first: field of type Int");
        assert!(lines[1].starts_with("member Pair<Int, String>.second: function returning String"));
        assert_eq!(lines[2], "call f: resolved, returns Int, weights [0, 0]");
        assert_eq!(lines[3], "call f: resolved, returns String, weights [2, 0], inferred T = String");
        assert!(lines[4].contains("resolved, returns String"));
    }
}
