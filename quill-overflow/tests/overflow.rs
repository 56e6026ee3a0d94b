use num_bigint::BigInt;
use num_traits::One;
use proptest::prelude::*;
use rayon::prelude::*;

use quill_ir::{Context, Kind, Op, SmtConfig};
use quill_lower::lower_lambda;
use quill_overflow::{
    ArithOp, add_o, checked_add, div_o, from_integral_overflow, mul_o, overflow, uadd_o,
};

fn pow2(n: u32) -> BigInt {
    BigInt::one() << (n as usize)
}

/// Exact `(below minimum, above maximum)` for `v` in the range of `kind`.
fn out_of_range(kind: &Kind, v: &BigInt) -> (bool, bool) {
    let (lo, hi) = match kind {
        Kind::BitVec { signed: true, width } if *width > 0 => {
            (-pow2(width - 1), pow2(width - 1) - 1)
        }
        Kind::BitVec { width, .. } => (BigInt::from(0), pow2(*width) - 1),
        other => panic!("not a bit-vector kind: {other}"),
    };
    (v < &lo, v > &hi)
}

fn concrete(ctx: &mut Context, op: ArithOp, kind: &Kind, a: u64, b: u64) -> ((bool, bool), (bool, bool)) {
    let x = ctx.bv(kind, a);
    let y = ctx.bv(kind, b);
    let (xv, yv) = (x.as_int().unwrap().clone(), y.as_int().unwrap().clone());
    let exact = match op {
        ArithOp::Add => xv + yv,
        ArithOp::Sub => xv - yv,
        ArithOp::Mul => xv * yv,
        ArithOp::Div => xv / yv,
    };
    let got = overflow(ctx, op, &x, &y).unwrap().as_bools().unwrap();
    (got, out_of_range(kind, &exact))
}

#[test]
fn eight_bit_addition_examples() {
    let mut ctx = Context::default();
    let s8 = Kind::signed(8);
    let a = ctx.bv(&s8, 100);
    let b = ctx.bv(&s8, 100);
    let o = add_o(&mut ctx, &a, &b).unwrap();
    assert_eq!(o.overflow.as_bool(), Some(true));
    assert_eq!(o.underflow.as_bool(), Some(false));

    let u8k = Kind::unsigned(8);
    let a = ctx.bv(&u8k, 200);
    let b = ctx.bv(&u8k, 100);
    let o = add_o(&mut ctx, &a, &b).unwrap();
    assert_eq!(o.overflow.as_bool(), Some(true));
    assert_eq!(o.underflow.as_bool(), Some(false));
}

#[test]
fn multiplication_matches_exact_products_at_small_widths() {
    let mut ctx = Context::default();
    for width in 1..=6u32 {
        for signed in [false, true] {
            let kind = Kind::BitVec { signed, width };
            for a in 0..(1u64 << width) {
                for b in 0..(1u64 << width) {
                    let (got, want) = concrete(&mut ctx, ArithOp::Mul, &kind, a, b);
                    assert_eq!(got, want, "{kind}: {a} * {b}");
                }
            }
        }
    }
}

#[test]
fn multiplication_matches_exact_products_at_eight_bits() {
    for signed in [false, true] {
        let kind = Kind::BitVec { signed, width: 8 };
        (0..256u64).into_par_iter().for_each(|a| {
            let mut ctx = Context::default();
            for b in 0..256u64 {
                let (got, want) = concrete(&mut ctx, ArithOp::Mul, &kind, a, b);
                assert_eq!(got, want, "{kind}: {a} * {b}");
            }
        });
    }
}

#[test]
fn signed_division_overflows_only_for_min_by_minus_one() {
    let mut ctx = Context::default();
    let kind = Kind::signed(8);
    for a in -128i64..128 {
        for b in (-128i64..128).filter(|b| *b != 0) {
            let x = ctx.bv(&kind, a);
            let y = ctx.bv(&kind, b);
            let o = div_o(&mut ctx, &x, &y).unwrap().as_bools().unwrap();
            assert_eq!(o, (false, a == -128 && b == -1), "{a} / {b}");
        }
    }
}

#[test]
fn conversions_match_exact_ranges() {
    let mut ctx = Context::default();
    for n in 1..=5u32 {
        for m in 0..=6u32 {
            for (fs, ts) in [(false, false), (false, true), (true, false), (true, true)] {
                let from = Kind::BitVec { signed: fs, width: n };
                let to = Kind::BitVec { signed: ts, width: m };
                for a in 0..(1u64 << n) {
                    let x = ctx.bv(&from, a);
                    let got = from_integral_overflow(&mut ctx, &x, &to).unwrap();
                    let want = out_of_range(&to, x.as_int().unwrap());
                    assert_eq!(got.as_bools(), Some(want), "{x:?} as {to}");
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn addition_and_subtraction_match_exact_arithmetic(
        width in 1u32..=64,
        signed in any::<bool>(),
        a in any::<u64>(),
        b in any::<u64>(),
    ) {
        let mut ctx = Context::default();
        let kind = Kind::BitVec { signed, width };
        for op in [ArithOp::Add, ArithOp::Sub] {
            let (got, want) = concrete(&mut ctx, op, &kind, a, b);
            prop_assert_eq!(got, want, "{:?} on {}", op, kind);
        }
    }
}

#[test]
fn symbolic_predicates_lower_to_lambdas() {
    let ctx = Context::default();
    let k = Kind::unsigned(8);
    let out = lower_lambda(&ctx, &Kind::Bool, |c| {
        let x = c.forall("x", k.clone());
        let y = c.forall("y", k.clone());
        Ok(uadd_o(c, &x, &y)?.overflow)
    })
    .unwrap();
    assert_eq!(
        out,
        "(lambda ((l1_s2 (_ BitVec 8)) (l1_s3 (_ BitVec 8)))\n\
         \x20 (let ((l1_s4 ((_ zero_extend 1) l1_s2)))\n\
         \x20 (let ((l1_s5 ((_ zero_extend 1) l1_s3)))\n\
         \x20 (let ((l1_s6 (bvadd l1_s4 l1_s5)))\n\
         \x20 (let ((l1_s7 (= ((_ extract 8 8) l1_s6) #b1)))\n\
         \x20 l1_s7)))))"
    );
}

#[test]
fn native_multiplication_overflow_for_symbolic_operands() {
    let mut ctx = Context::new(SmtConfig::default().with_native_mul_overflow(true));
    let k = Kind::signed(16);
    let x = ctx.forall("x", k.clone());
    let y = ctx.forall("y", k.clone());
    mul_o(&mut ctx, &x, &y).unwrap();
    let ops: Vec<&Op> = ctx.assignments().iter().map(|(_, e)| &e.op).collect();
    assert!(ops.contains(&&Op::SMulNoOverflow));
    assert!(ops.contains(&&Op::SMulNoUnderflow));
    assert!(!ops.contains(&&Op::Mul), "bit-serial encoding was built: {ops:?}");

    // Concrete operands still fold through the bit-serial algorithm.
    let a = ctx.bv(&k, 300);
    let b = ctx.bv(&k, 300);
    let o = mul_o(&mut ctx, &a, &b).unwrap();
    assert_eq!(o.as_bools(), Some((false, true)));
}

#[test]
fn native_text_uses_solver_primitives() {
    let ctx = Context::new(SmtConfig::default().with_native_mul_overflow(true));
    let k = Kind::unsigned(32);
    let out = lower_lambda(&ctx, &Kind::Bool, |c| {
        let x = c.forall("x", k.clone());
        let y = c.forall("y", k.clone());
        Ok(mul_o(c, &x, &y)?.overflow)
    })
    .unwrap();
    assert!(out.contains("(bvumul_noovfl l1_s2 l1_s3)"), "{out}");
    assert!(out.contains("(not l1_s4)"), "{out}");
}

#[test]
fn checked_arithmetic_cannot_be_lowered() {
    let ctx = Context::default();
    let k = Kind::signed(8);
    let err = lower_lambda(&ctx, &k, |c| {
        let x = c.forall("x", k.clone());
        let y = c.forall("y", k.clone());
        checked_add(c, &x, &y)
    })
    .unwrap_err();
    assert!(err.is_unsupported(), "{err}");
    assert!(err.to_string().contains("i8 add does not overflow"), "{err}");
}
