#![forbid(unsafe_code)]

use quill_ir::{Context, ContextField, FieldPolicy};
use tracing::debug;

use crate::LowerError;

/// What a forked child is going to be lowered into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    Lambda,
    Named,
    Constraint,
}

impl Purpose {
    pub fn describe(self) -> &'static str {
        match self {
            Purpose::Lambda => "lambda",
            Purpose::Named => "named function",
            Purpose::Constraint => "constraint",
        }
    }
}

use FieldPolicy::{Fresh, Share, Snapshot};

/// How every context field reaches a child: `(field, lambda and constraint,
/// named function)`. Adding a field to `Context` means adding a row here.
pub const FORK_MANIFEST: &[(ContextField, FieldPolicy, FieldPolicy)] = &[
    (ContextField::Config, Snapshot, Snapshot),
    (ContextField::StartTime, Snapshot, Snapshot),
    (ContextField::Uninterpreted, Share, Share),
    (ContextField::UserFunctions, Share, Snapshot),
    (ContextField::Definitions, Share, Snapshot),
    (ContextField::Axioms, Share, Share),
    (ContextField::TableIds, Share, Share),
    (ContextField::ArrayIds, Share, Share),
    (ContextField::Nodes, Fresh, Fresh),
    (ContextField::Inputs, Fresh, Fresh),
    (ContextField::Constants, Fresh, Fresh),
    (ContextField::Assignments, Fresh, Fresh),
    (ContextField::Tables, Fresh, Fresh),
    (ContextField::Arrays, Fresh, Fresh),
    (ContextField::CodeSegments, Fresh, Fresh),
    (ContextField::Observables, Fresh, Fresh),
    (ContextField::Constraints, Fresh, Fresh),
    (ContextField::Assertions, Fresh, Fresh),
    (ContextField::Outputs, Fresh, Fresh),
    (ContextField::Kinds, Fresh, Fresh),
];

/// Policy the manifest assigns to `field` for `purpose`. Fields missing from
/// the manifest are never inherited.
pub fn policy(field: ContextField, purpose: Purpose) -> FieldPolicy {
    FORK_MANIFEST
        .iter()
        .find(|(f, _, _)| *f == field)
        .map(|&(_, scoped, named)| match purpose {
            Purpose::Named => named,
            Purpose::Lambda | Purpose::Constraint => scoped,
        })
        .unwrap_or(Fresh)
}

/// Create the child context a lowering replays in, one level below `parent`.
///
/// Constraints may only be declared at the outermost scope.
pub fn fork(parent: &Context, purpose: Purpose) -> Result<Context, LowerError> {
    if purpose == Purpose::Constraint && parent.level() != 0 {
        return Err(LowerError::unsupported(
            purpose.describe(),
            format!(
                "declaring a constraint inside a nested scope (level {})",
                parent.level()
            ),
        ));
    }
    let level = parent.level() + 1;
    let shared = ContextField::ALL
        .iter()
        .filter(|f| policy(**f, purpose) == Share)
        .count();
    debug!(purpose = purpose.describe(), level, shared, "fork");
    Ok(parent.derive(level, |field| policy(field, purpose)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ir::Kind;

    #[test]
    fn manifest_covers_every_field_once() {
        for field in ContextField::ALL {
            let rows = FORK_MANIFEST.iter().filter(|(f, _, _)| *f == field).count();
            assert_eq!(rows, 1, "{field:?} has {rows} manifest rows");
        }
        assert_eq!(FORK_MANIFEST.len(), ContextField::ALL.len());
    }

    #[test]
    fn child_is_one_level_deeper_and_empty() {
        let mut parent = Context::default();
        let x = parent.forall("x", Kind::Int);
        parent.neg(&x).unwrap();
        let child = fork(&parent, Purpose::Lambda).unwrap();
        assert_eq!(child.level(), 1);
        assert!(child.inputs().is_empty());
        assert!(child.assignments().is_empty());
        assert_eq!(child.node_count(), 2);
    }

    #[test]
    fn named_children_see_a_snapshot_of_user_functions() {
        let parent = Context::default();
        let mut child = fork(&parent, Purpose::Named).unwrap();
        let x = child.forall("x", Kind::Int);
        child.apply("g", Kind::Int, &[x]).unwrap();
        // Uninterpreted functions are shared, so the parent learns about `g`.
        assert!(parent.uninterpreted("g").is_some());
        assert_eq!(policy(ContextField::UserFunctions, Purpose::Named), Snapshot);
        assert_eq!(policy(ContextField::UserFunctions, Purpose::Lambda), Share);
    }

    #[test]
    fn nested_constraints_are_refused() {
        let top = Context::default();
        let lambda = fork(&top, Purpose::Lambda).unwrap();
        let Err(err) = fork(&lambda, Purpose::Constraint) else {
            panic!("a constraint was forked from a nested scope");
        };
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("level 1"), "{err}");
    }
}
