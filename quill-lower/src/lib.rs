#![forbid(unsafe_code)]

//! Lowering of captured sub-computations into SMTLib lambdas, named
//! functions and quantified constraints.
//!
//! Every lowering runs the same pipeline: fork a child context, replay the
//! computation in it, validate the trace, serialize what survives.

pub mod error;
pub mod fork;
pub mod lower;
pub mod replay;
pub mod serialize;
pub mod validate;

pub use error::LowerError;
pub use fork::{FORK_MANIFEST, Purpose, fork};
pub use lower::{lower_constraint, lower_function, lower_lambda};
pub use replay::replay;
pub use serialize::{Definition, Emitted, FunctionDecl, Wrapper, serialize};
pub use validate::{CHECKS, ValidTrace, validate};
