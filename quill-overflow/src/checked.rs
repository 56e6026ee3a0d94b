#![forbid(unsafe_code)]

use quill_ir::{Context, IrError, SVal};
use tracing::debug;

use crate::predicates::{ArithOp, Overflow, neg_o, overflow};

fn obligation(ctx: &mut Context, label: &str, o: &Overflow) -> Result<(), IrError> {
    let bad = o.either(ctx)?;
    let ok = ctx.not(&bad)?;
    debug!(label, trivial = ok.as_bool() == Some(true), "overflow obligation");
    ctx.sassert(label, &ok)
}

fn checked(ctx: &mut Context, op: ArithOp, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
    let o = overflow(ctx, op, a, b)?;
    let label = format!("{} {} does not overflow", a.kind(), op.name());
    obligation(ctx, &label, &o)?;
    match op {
        ArithOp::Add => ctx.add(a, b),
        ArithOp::Sub => ctx.sub(a, b),
        ArithOp::Mul => ctx.mul(a, b),
        ArithOp::Div => ctx.div(a, b),
    }
}

/// Wrapped `a + b`, asserting that it stays in range.
pub fn checked_add(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
    checked(ctx, ArithOp::Add, a, b)
}

pub fn checked_sub(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
    checked(ctx, ArithOp::Sub, a, b)
}

pub fn checked_mul(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
    checked(ctx, ArithOp::Mul, a, b)
}

/// Division by zero is not an overflow and is not asserted against.
pub fn checked_div(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
    checked(ctx, ArithOp::Div, a, b)
}

pub fn checked_neg(ctx: &mut Context, a: &SVal) -> Result<SVal, IrError> {
    let o = neg_o(ctx, a)?;
    let label = format!("{} neg does not overflow", a.kind());
    obligation(ctx, &label, &o)?;
    ctx.neg(a)
}
