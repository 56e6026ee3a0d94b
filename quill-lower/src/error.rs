#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use quill_ir::IrError;

pub(crate) const FEATURE_HINT: &str =
    "this construct cannot be lowered yet; please file a feature request with the failing computation";

/// Terminal failure of a lowering call. None of these are recoverable; the
/// caller must not keep building the same definition.
#[derive(Debug, Error, Diagnostic)]
pub enum LowerError {
    /// The computation is valid but uses something the lowered subset lacks.
    #[error("{context}: {what} is not supported")]
    #[diagnostic(code(quill::lower::unsupported))]
    Unsupported {
        context: String,
        what: String,
        #[help]
        hint: Option<String>,
    },

    /// The trace contradicts what its producer promised; this is a bug.
    #[error("{context}: impossible happened: {what}")]
    #[diagnostic(
        code(quill::lower::impossible),
        help("please report this as a bug together with the computation being lowered")
    )]
    Impossible { context: String, what: String },

    #[error("{context}: the computation failed during replay")]
    #[diagnostic(code(quill::lower::replay))]
    Replay {
        context: String,
        #[source]
        #[diagnostic_source]
        source: IrError,
    },
}

impl LowerError {
    pub(crate) fn unsupported(context: &str, what: impl Into<String>) -> Self {
        LowerError::Unsupported {
            context: context.to_string(),
            what: what.into(),
            hint: Some(FEATURE_HINT.to_string()),
        }
    }

    pub(crate) fn impossible(context: &str, what: impl Into<String>) -> Self {
        LowerError::Impossible {
            context: context.to_string(),
            what: what.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, LowerError::Unsupported { .. })
    }

    pub fn is_impossible(&self) -> bool {
        matches!(self, LowerError::Impossible { .. })
    }
}
