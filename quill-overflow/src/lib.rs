#![forbid(unsafe_code)]

//! Overflow and underflow conditions for two's-complement bit-vector
//! arithmetic, as symbolic booleans over the operands.
//!
//! With concrete operands every predicate folds to a constant, so the same
//! code answers "does this overflow?" for values and builds the condition for
//! symbolic ones.

pub mod checked;
pub mod convert;
pub mod predicates;

pub use checked::{checked_add, checked_div, checked_mul, checked_neg, checked_sub};
pub use convert::from_integral_overflow;
pub use predicates::{
    ArithOp, Overflow, add_o, div_o, mul_o, neg_o, overflow, sadd_o, sdiv_o, smul_o, sneg_o,
    ssub_o, sub_o, uadd_o, udiv_o, umul_o, uneg_o, usub_o,
};
