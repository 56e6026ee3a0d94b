#![forbid(unsafe_code)]

use quill_ir::{Cv, Expr, InputRole, Kind, NodeId, RoundingMode, Trace};
use tracing::debug;

use crate::LowerError;

/// A trace that passed every check, reduced to what serialization needs.
#[derive(Clone, Debug)]
pub struct ValidTrace {
    pub level: u32,
    pub rounding: RoundingMode,
    /// Universal inputs in declaration order.
    pub params: Vec<(NodeId, Kind)>,
    /// Constant pool without the boolean literals.
    pub constants: Vec<(NodeId, Cv)>,
    pub assignments: Vec<(NodeId, Expr)>,
    pub output: NodeId,
    pub output_kind: Kind,
    /// Uninterpreted names applied in the body, first appearance first.
    pub free_names: Vec<String>,
}

pub type Check = fn(&str, &Trace, &Kind) -> Result<(), LowerError>;

/// Checks in the order they run. The first failure wins.
pub const CHECKS: &[(&str, Check)] = &[
    ("observables", no_observables),
    ("code segments", no_code_segments),
    ("tables", no_tables),
    ("arrays", no_arrays),
    ("constraints", no_constraints),
    ("assertions", no_assertions),
    ("existential inputs", no_existentials),
    ("tracker inputs", no_trackers),
    ("output", single_output_of_kind),
];

fn list(names: impl Iterator<Item = String>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

fn no_observables(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.observables.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!(
            "observing values ({} observable(s): {})",
            t.observables.len(),
            list(t.observables.iter().map(|o| o.label.clone()))
        ),
    ))
}

fn no_code_segments(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.code_segments.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!(
            "uninterpreted code ({} segment(s) for {})",
            t.code_segments.len(),
            list(t.code_segments.iter().map(|c| c.function.clone()))
        ),
    ))
}

fn no_tables(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.tables.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!(
            "indexing lists with symbolic values ({} table(s): {})",
            t.tables.len(),
            list(
                t.tables
                    .iter()
                    .map(|tb| format!("table{} [{}] of {}", tb.id, tb.entries.len(), tb.elem))
            )
        ),
    ))
}

fn no_arrays(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.arrays.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!(
            "arrays ({} array(s): {})",
            t.arrays.len(),
            list(
                t.arrays
                    .iter()
                    .map(|a| format!("{} : array<{}, {}>", a.name, a.key, a.value))
            )
        ),
    ))
}

fn no_constraints(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.constraints.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!("constraints inside the body ({} found)", t.constraints.len()),
    ))
}

fn no_assertions(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    if t.assertions.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!(
            "assertions inside the body ({} found: {})",
            t.assertions.len(),
            list(t.assertions.iter().map(|a| a.label.clone()))
        ),
    ))
}

fn inputs_with(t: &Trace, role: InputRole) -> Vec<String> {
    t.inputs
        .iter()
        .filter(|i| i.role == role)
        .map(|i| format!("{} : {}", i.name, i.kind))
        .collect()
}

fn no_existentials(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    let found = inputs_with(t, InputRole::Existential);
    if found.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!("existential inputs ({})", found.join(", ")),
    ))
}

fn no_trackers(ctx: &str, t: &Trace, _: &Kind) -> Result<(), LowerError> {
    let found = inputs_with(t, InputRole::Tracker);
    if found.is_empty() {
        return Ok(());
    }
    Err(LowerError::unsupported(
        ctx,
        format!("tracker inputs ({})", found.join(", ")),
    ))
}

fn single_output_of_kind(ctx: &str, t: &Trace, expected: &Kind) -> Result<(), LowerError> {
    let [out] = t.outputs.as_slice() else {
        return Err(LowerError::impossible(
            ctx,
            format!("expected exactly one output, found {}", t.outputs.len()),
        ));
    };
    match t.kind_of(*out) {
        Some(k) if k == expected => Ok(()),
        Some(k) => Err(LowerError::impossible(
            ctx,
            format!("expected a result of kind {expected}, got {k}"),
        )),
        None => Err(LowerError::impossible(
            ctx,
            format!("output {out} is not a node of this scope"),
        )),
    }
}

/// Uninterpreted names applied anywhere in `assignments`, without repeats.
pub fn free_names(assignments: &[(NodeId, Expr)]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, expr) in assignments {
        if let Some(name) = expr.applied_name() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Run every check in order and extract the lowering inputs.
pub fn validate(ctx: &str, trace: Trace, expected: &Kind) -> Result<ValidTrace, LowerError> {
    for (name, check) in CHECKS {
        if let Err(err) = check(ctx, &trace, expected) {
            debug!(context = ctx, check = name, "validation failed");
            return Err(err);
        }
    }

    let mut params = Vec::new();
    for input in &trace.inputs {
        match input.role {
            InputRole::Universal => params.push((input.node, input.kind.clone())),
            role => {
                return Err(LowerError::impossible(
                    ctx,
                    format!("{role:?} input {} survived validation", input.name),
                ));
            }
        }
    }

    let output = trace.outputs[0];
    let output_kind = expected.clone();
    let constants = trace
        .constants
        .into_iter()
        .filter(|(n, _)| !n.is_bool_literal())
        .collect();
    let free_names = free_names(&trace.assignments);
    debug!(
        context = ctx,
        params = params.len(),
        free_names = free_names.len(),
        "validated"
    );
    Ok(ValidTrace {
        level: trace.level,
        rounding: trace.config.rounding_mode,
        params,
        constants,
        assignments: trace.assignments,
        output,
        output_kind,
        free_names,
    })
}
