#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::Kind;

/// Errors raised while building symbolic values.
#[derive(Debug, Error, Diagnostic)]
pub enum IrError {
    #[error("kind mismatch in `{op}`: {left} vs {right}")]
    #[diagnostic(code(quill::ir::kind_mismatch))]
    KindMismatch { op: String, left: Kind, right: Kind },

    #[error("`{op}` is not defined on {kind}")]
    #[diagnostic(code(quill::ir::invalid_operand))]
    InvalidOperand { op: String, kind: Kind },

    #[error("function `{name}` applied as ({got}) but declared as ({declared})")]
    #[diagnostic(
        code(quill::ir::signature),
        help("every application of an uninterpreted or named function must agree with its first declaration")
    )]
    SignatureMismatch {
        name: String,
        declared: String,
        got: String,
    },

    #[error("lookup table with {len} entries of kind {elem} has a default of kind {default}")]
    #[diagnostic(code(quill::ir::table))]
    TableKind { len: usize, elem: Kind, default: Kind },

    #[error("value s{node} belongs to scope #{scope}, but was used in scope #{expected}")]
    #[diagnostic(
        code(quill::ir::foreign_value),
        help("a lowered computation must take its free variables as inputs, not capture them from an enclosing scope")
    )]
    ForeignValue { node: u32, scope: u32, expected: u32 },

    #[error("{0}")]
    #[diagnostic(code(quill::ir::user))]
    User(String),
}
