#![forbid(unsafe_code)]

use quill_ir::{Context, Cv, IrError, Kind, SVal};
use tracing::trace;

/// Underflow and overflow conditions of one operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Overflow {
    pub underflow: SVal,
    pub overflow: SVal,
}

impl Overflow {
    pub fn none() -> Self {
        Overflow {
            underflow: false.into(),
            overflow: false.into(),
        }
    }

    pub fn over(overflow: SVal) -> Self {
        Overflow {
            underflow: false.into(),
            overflow,
        }
    }

    /// `underflow || overflow`.
    pub fn either(&self, ctx: &mut Context) -> Result<SVal, IrError> {
        ctx.or(&self.underflow, &self.overflow)
    }

    /// Concrete `(underflow, overflow)`, when both folded.
    pub fn as_bools(&self) -> Option<(bool, bool)> {
        Some((self.underflow.as_bool()?, self.overflow.as_bool()?))
    }
}

/// Width of two bit-vector operands of the same kind.
pub(crate) fn operands(op: &str, a: &SVal, b: &SVal) -> Result<u32, IrError> {
    if a.kind() != b.kind() {
        return Err(IrError::KindMismatch {
            op: op.to_string(),
            left: a.kind().clone(),
            right: b.kind().clone(),
        });
    }
    operand(op, a)
}

pub(crate) fn operand(op: &str, a: &SVal) -> Result<u32, IrError> {
    a.kind().width().ok_or_else(|| IrError::InvalidOperand {
        op: op.to_string(),
        kind: a.kind().clone(),
    })
}

fn and3(ctx: &mut Context, a: &SVal, b: &SVal, c: &SVal) -> Result<SVal, IrError> {
    let ab = ctx.and(a, b)?;
    ctx.and(&ab, c)
}

/// Carry out of the top bit: bit `n` of the `(n+1)`-bit sum.
pub fn uadd_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    let n = operands("bvAddO", a, b)?;
    if n == 0 {
        return Ok(Overflow::none());
    }
    let wa = ctx.zero_extend(a, n + 1)?;
    let wb = ctx.zero_extend(b, n + 1)?;
    let sum = ctx.add(&wa, &wb)?;
    Ok(Overflow::over(ctx.test_bit(&sum, n)?))
}

pub fn sadd_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    if operands("bvAddO", a, b)? == 0 {
        return Ok(Overflow::none());
    }
    let sum = ctx.add(a, b)?;
    let sa = ctx.sign_bit(a)?;
    let sb = ctx.sign_bit(b)?;
    let ss = ctx.sign_bit(&sum)?;
    let (na, nb, ns) = (ctx.not(&sa)?, ctx.not(&sb)?, ctx.not(&ss)?);
    Ok(Overflow {
        underflow: and3(ctx, &sa, &sb, &ns)?,
        overflow: and3(ctx, &na, &nb, &ss)?,
    })
}

/// Borrow out of the top bit: bit `n` of the `(n+1)`-bit difference. This
/// reads both operands as unsigned whatever their kind says.
pub fn usub_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    let n = operands("bvSubO", a, b)?;
    if n == 0 {
        return Ok(Overflow::none());
    }
    let wa = ctx.zero_extend(a, n + 1)?;
    let wb = ctx.zero_extend(b, n + 1)?;
    let diff = ctx.sub(&wa, &wb)?;
    Ok(Overflow {
        underflow: ctx.test_bit(&diff, n)?,
        overflow: false.into(),
    })
}

pub fn ssub_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    if operands("bvSubO", a, b)? == 0 {
        return Ok(Overflow::none());
    }
    let diff = ctx.sub(a, b)?;
    let sa = ctx.sign_bit(a)?;
    let sb = ctx.sign_bit(b)?;
    let sd = ctx.sign_bit(&diff)?;
    let (na, nb, nd) = (ctx.not(&sa)?, ctx.not(&sb)?, ctx.not(&sd)?);
    Ok(Overflow {
        underflow: and3(ctx, &sa, &nb, &nd)?,
        overflow: and3(ctx, &na, &sb, &sd)?,
    })
}

fn native(ctx: &Context, a: &SVal, b: &SVal) -> bool {
    ctx.config().native_mul_overflow && !a.is_concrete() && !b.is_concrete()
}

/// Unsigned multiplication overflow.
///
/// The product of the `(n+1)`-bit extensions catches carries into bit `n`;
/// the bit-serial scan catches the products that wrap past bit `n` entirely:
/// some bit `a[j]` with `j >= n-i` set together with `b[i]`, for `i` in
/// `1..n`. Both parts are needed.
pub fn umul_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    let n = operands("bvMulO", a, b)?;
    if n == 0 {
        return Ok(Overflow::none());
    }
    if native(ctx, a, b) {
        let ok = ctx.umul_no_overflow(a, b)?;
        return Ok(Overflow::over(ctx.not(&ok)?));
    }

    let wa = ctx.zero_extend(a, n + 1)?;
    let wb = ctx.zero_extend(b, n + 1)?;
    let product = ctx.mul(&wa, &wb)?;
    let carried = ctx.test_bit(&product, n)?;

    let mut seen = ctx.bool(false);
    let mut wrapped = ctx.bool(false);
    for i in 1..n {
        let ai = ctx.test_bit(a, n - i)?;
        seen = ctx.or(&seen, &ai)?;
        let bi = ctx.test_bit(b, i)?;
        let hit = ctx.and(&seen, &bi)?;
        wrapped = ctx.or(&wrapped, &hit)?;
    }
    trace!(width = n, "bit-serial unsigned multiplication overflow");
    Ok(Overflow::over(ctx.or(&carried, &wrapped)?))
}

/// Signed multiplication overflow and underflow.
///
/// Both share one flag: the top two bits of the `(n+1)`-bit sign-extended
/// product disagree, or the bit-serial scan over `1..n-1` finds magnitude
/// bits (each operand's bits XOR its own sign) whose positions add up past
/// the sign bit. Equal signs make the flag an overflow, differing signs an
/// underflow.
pub fn smul_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    let n = operands("bvMulO", a, b)?;
    if n == 0 {
        return Ok(Overflow::none());
    }
    if native(ctx, a, b) {
        let no_over = ctx.smul_no_overflow(a, b)?;
        let no_under = ctx.smul_no_underflow(a, b)?;
        return Ok(Overflow {
            underflow: ctx.not(&no_under)?,
            overflow: ctx.not(&no_over)?,
        });
    }

    let wa = ctx.sign_extend(a, n + 1)?;
    let wb = ctx.sign_extend(b, n + 1)?;
    let product = ctx.mul(&wa, &wb)?;
    let top = ctx.test_bit(&product, n)?;
    let next = ctx.test_bit(&product, n - 1)?;
    let spilled = ctx.xor(&top, &next)?;

    let sa = ctx.test_bit(a, n - 1)?;
    let sb = ctx.test_bit(b, n - 1)?;
    let mut seen = ctx.bool(false);
    let mut wrapped = ctx.bool(false);
    for i in 1..n - 1 {
        let bi = ctx.test_bit(b, i)?;
        let mb = ctx.xor(&sb, &bi)?;
        let ai = ctx.test_bit(a, n - 1 - i)?;
        let ma = ctx.xor(&sa, &ai)?;
        seen = ctx.or(&seen, &ma)?;
        let hit = ctx.and(&seen, &mb)?;
        wrapped = ctx.or(&wrapped, &hit)?;
    }
    let flag = ctx.or(&spilled, &wrapped)?;

    let differ = ctx.xor(&sa, &sb)?;
    let same = ctx.not(&differ)?;
    trace!(width = n, "bit-serial signed multiplication overflow");
    Ok(Overflow {
        underflow: ctx.and(&differ, &flag)?,
        overflow: ctx.and(&same, &flag)?,
    })
}

/// Unsigned division never leaves the range.
pub fn udiv_o(_ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    operands("bvDivO", a, b)?;
    Ok(Overflow::none())
}

/// Only `MIN / -1` overflows.
pub fn sdiv_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    if operands("bvDivO", a, b)? == 0 {
        return Ok(Overflow::none());
    }
    let kind = a.kind().clone();
    let min = SVal::Concrete(Cv::bv_min(&kind));
    let minus_one = ctx.bv(&kind, -1);
    let a_min = ctx.eq(a, &min)?;
    let b_neg_one = ctx.eq(b, &minus_one)?;
    Ok(Overflow::over(ctx.and(&a_min, &b_neg_one)?))
}

pub fn uneg_o(_ctx: &mut Context, a: &SVal) -> Result<Overflow, IrError> {
    operand("bvNegO", a)?;
    Ok(Overflow::none())
}

/// Only `-MIN` overflows.
pub fn sneg_o(ctx: &mut Context, a: &SVal) -> Result<Overflow, IrError> {
    if operand("bvNegO", a)? == 0 {
        return Ok(Overflow::none());
    }
    let min = SVal::Concrete(Cv::bv_min(a.kind()));
    Ok(Overflow::over(ctx.eq(a, &min)?))
}

/// Binary operations with overflow predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        }
    }
}

/// Overflow of `a op b`, signed or unsigned according to the operand kind.
pub fn overflow(ctx: &mut Context, op: ArithOp, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    let signed = a.kind().is_signed();
    match (op, signed) {
        (ArithOp::Add, false) => uadd_o(ctx, a, b),
        (ArithOp::Add, true) => sadd_o(ctx, a, b),
        (ArithOp::Sub, false) => usub_o(ctx, a, b),
        (ArithOp::Sub, true) => ssub_o(ctx, a, b),
        (ArithOp::Mul, false) => umul_o(ctx, a, b),
        (ArithOp::Mul, true) => smul_o(ctx, a, b),
        (ArithOp::Div, false) => udiv_o(ctx, a, b),
        (ArithOp::Div, true) => sdiv_o(ctx, a, b),
    }
}

pub fn add_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    overflow(ctx, ArithOp::Add, a, b)
}

pub fn sub_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    overflow(ctx, ArithOp::Sub, a, b)
}

pub fn mul_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    overflow(ctx, ArithOp::Mul, a, b)
}

pub fn div_o(ctx: &mut Context, a: &SVal, b: &SVal) -> Result<Overflow, IrError> {
    overflow(ctx, ArithOp::Div, a, b)
}

pub fn neg_o(ctx: &mut Context, a: &SVal) -> Result<Overflow, IrError> {
    if a.kind().is_signed() { sneg_o(ctx, a) } else { uneg_o(ctx, a) }
}

/// `kind` if it is a bit-vector kind.
pub(crate) fn bit_vec(op: &str, kind: &Kind) -> Result<(bool, u32), IrError> {
    match kind {
        Kind::BitVec { signed, width } => Ok((*signed, *width)),
        other => Err(IrError::InvalidOperand {
            op: op.to_string(),
            kind: other.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Pred = fn(&mut Context, &SVal, &SVal) -> Result<Overflow, IrError>;

    fn bools(ctx: &mut Context, f: Pred, kind: &Kind, a: i64, b: i64) -> (bool, bool) {
        let a = ctx.bv(kind, a);
        let b = ctx.bv(kind, b);
        f(ctx, &a, &b).unwrap().as_bools().unwrap()
    }

    #[test]
    fn signed_addition_overflows_past_max() {
        let mut ctx = Context::default();
        let k = Kind::signed(8);
        assert_eq!(bools(&mut ctx, sadd_o, &k, 100, 100), (false, true));
        assert_eq!(bools(&mut ctx, sadd_o, &k, -100, -100), (true, false));
        assert_eq!(bools(&mut ctx, sadd_o, &k, 100, -100), (false, false));
    }

    #[test]
    fn unsigned_subtraction_underflows_below_zero() {
        let mut ctx = Context::default();
        let k = Kind::unsigned(8);
        assert_eq!(bools(&mut ctx, usub_o, &k, 3, 4), (true, false));
        assert_eq!(bools(&mut ctx, usub_o, &k, 4, 3), (false, false));
        assert_eq!(bools(&mut ctx, usub_o, &k, 0, 255), (true, false));
    }

    #[test]
    fn signed_subtraction_edges() {
        let mut ctx = Context::default();
        let k = Kind::signed(8);
        assert_eq!(bools(&mut ctx, ssub_o, &k, -128, 1), (true, false));
        assert_eq!(bools(&mut ctx, ssub_o, &k, 127, -1), (false, true));
        assert_eq!(bools(&mut ctx, ssub_o, &k, 0, -128), (false, true));
        assert_eq!(bools(&mut ctx, ssub_o, &k, -1, -128), (false, false));
    }

    #[test]
    fn negation_overflows_only_at_min() {
        let mut ctx = Context::default();
        let k = Kind::signed(4);
        let min = ctx.bv(&k, -8);
        let seven = ctx.bv(&k, 7);
        assert_eq!(sneg_o(&mut ctx, &min).unwrap().as_bools(), Some((false, true)));
        assert_eq!(sneg_o(&mut ctx, &seven).unwrap().as_bools(), Some((false, false)));
        let u = ctx.bv(&Kind::unsigned(4), 8);
        assert_eq!(uneg_o(&mut ctx, &u).unwrap().as_bools(), Some((false, false)));
    }

    #[test]
    fn zero_width_never_overflows() {
        let mut ctx = Context::default();
        for k in [Kind::signed(0), Kind::unsigned(0)] {
            let x = ctx.forall("x", k.clone());
            let y = ctx.forall("y", k.clone());
            for op in [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div] {
                let o = overflow(&mut ctx, op, &x, &y).unwrap();
                assert_eq!(o.as_bools(), Some((false, false)), "{op:?} on {k}");
            }
            assert_eq!(neg_o(&mut ctx, &x).unwrap().as_bools(), Some((false, false)));
        }
    }

    #[test]
    fn operands_must_be_bit_vectors_of_one_kind() {
        let mut ctx = Context::default();
        let x = ctx.forall("x", Kind::unsigned(8));
        let y = ctx.forall("y", Kind::signed(8));
        assert!(matches!(add_o(&mut ctx, &x, &y), Err(IrError::KindMismatch { .. })));
        let i = ctx.forall("i", Kind::Int);
        assert!(matches!(neg_o(&mut ctx, &i), Err(IrError::InvalidOperand { .. })));
    }
}
