#![forbid(unsafe_code)]

use quill_ir::{Context, IrError, SVal, Trace};
use tracing::debug;

use crate::LowerError;

/// Run `computation` to completion inside `child` and keep what it recorded.
///
/// The returned value becomes the trace's single output. An error raised by
/// the computation is a replay failure, not a validation failure.
pub fn replay<F>(mut child: Context, context: &str, computation: F) -> Result<Trace, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let replay_err = |source| LowerError::Replay {
        context: context.to_string(),
        source,
    };
    let out = computation(&mut child).map_err(replay_err)?;
    child.add_output(&out).map_err(replay_err)?;
    let trace = child.finish();
    debug!(
        context,
        level = trace.level,
        inputs = trace.inputs.len(),
        assignments = trace.assignments.len(),
        outputs = trace.outputs.len(),
        "replayed"
    );
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ir::Kind;

    #[test]
    fn records_inputs_and_output() {
        let child = Context::default();
        let trace = replay(child, "test", |ctx| {
            let x = ctx.forall("x", Kind::Int);
            ctx.neg(&x)
        })
        .unwrap();
        assert_eq!(trace.inputs.len(), 1);
        assert_eq!(trace.assignments.len(), 1);
        assert_eq!(trace.outputs, vec![trace.assignments[0].0]);
    }

    #[test]
    fn computation_errors_are_replay_failures() {
        let child = Context::default();
        let err = replay(child, "test", |ctx| {
            let x = ctx.forall("x", Kind::Int);
            let p = ctx.forall("p", Kind::Bool);
            ctx.add(&x, &p)
        })
        .unwrap_err();
        assert!(matches!(err, LowerError::Replay { .. }), "{err}");
    }
}
