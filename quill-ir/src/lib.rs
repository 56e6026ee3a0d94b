#![forbid(unsafe_code)]

//! Symbolic values, the hash-consed node graph behind them, and the
//! contexts that record a computation's effects.

pub mod config;
pub mod context;
pub mod decl;
pub mod error;
pub mod ir;
pub mod kind;
pub mod value;

mod eval;

pub use config::*;
pub use context::*;
pub use decl::*;
pub use error::*;
pub use ir::*;
pub use kind::*;
pub use value::*;
