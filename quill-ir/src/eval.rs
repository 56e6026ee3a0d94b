#![forbid(unsafe_code)]

//! Constant folding. Every operator on concrete operands evaluates here, with
//! exact two's-complement semantics for bit-vectors and SMTLib semantics for
//! division by zero. `None` means "leave it symbolic".

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::value::{bits_of, modulus};
use crate::{Cv, CvVal, Kind, Op};

/// Signed reading of a bit pattern, independent of the kind's signedness.
pub(crate) fn signed_of(width: u32, v: &BigInt) -> BigInt {
    if width == 0 {
        return BigInt::zero();
    }
    let bits = bits_of(width, v);
    if bits >= modulus(width - 1) { bits - modulus(width) } else { bits }
}

fn bit_width(cv: &Cv) -> Option<u32> {
    cv.kind.width()
}

pub(crate) fn fold_unary(op: &Op, v: &Cv, result: &Kind) -> Option<Cv> {
    match (op, &v.val) {
        (Op::Not, CvVal::Bool(b)) => Some(Cv::bool(!b)),
        (Op::Not, CvVal::Int(i)) => {
            let w = bit_width(v)?;
            let ones = modulus(w) - 1;
            Some(Cv::bv(result.clone(), ones ^ bits_of(w, i)))
        }

        (Op::Neg, CvVal::Int(i)) if v.kind.is_bit_vec() => Some(Cv::bv(result.clone(), -i)),
        (Op::Neg, CvVal::Int(i)) => Some(Cv::int(-i)),
        (Op::Neg, CvVal::Real(r)) => Some(Cv::real(-r)),

        (Op::ZeroExtend(_), CvVal::Int(i)) => {
            let w = bit_width(v)?;
            Some(Cv::bv(result.clone(), bits_of(w, i)))
        }
        (Op::SignExtend(_), CvVal::Int(i)) => {
            let w = bit_width(v)?;
            Some(Cv::bv(result.clone(), signed_of(w, i)))
        }
        (Op::Extract { hi, lo }, CvVal::Int(i)) => {
            let w = bit_width(v)?;
            let mask = modulus(hi - lo + 1) - 1;
            Some(Cv::bv(result.clone(), (bits_of(w, i) >> (*lo as usize)) & mask))
        }
        (Op::TestBit(n), CvVal::Int(i)) => {
            let w = bit_width(v)?;
            let bit = (bits_of(w, i) >> (*n as usize)) & BigInt::one();
            Some(Cv::bool(bit.is_one()))
        }

        _ => None,
    }
}

pub(crate) fn fold_binary(op: &Op, l: &Cv, r: &Cv, result: &Kind) -> Option<Cv> {
    let bv = l.kind.width();
    match (op, &l.val, &r.val) {
        (Op::And, CvVal::Bool(a), CvVal::Bool(b)) => Some(Cv::bool(*a && *b)),
        (Op::Or, CvVal::Bool(a), CvVal::Bool(b)) => Some(Cv::bool(*a || *b)),
        (Op::Xor, CvVal::Bool(a), CvVal::Bool(b)) => Some(Cv::bool(a != b)),
        (Op::Implies, CvVal::Bool(a), CvVal::Bool(b)) => Some(Cv::bool(!a || *b)),

        (Op::And, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            Some(Cv::bv(result.clone(), bits_of(w, a) & bits_of(w, b)))
        }
        (Op::Or, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            Some(Cv::bv(result.clone(), bits_of(w, a) | bits_of(w, b)))
        }
        (Op::Xor, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            Some(Cv::bv(result.clone(), bits_of(w, a) ^ bits_of(w, b)))
        }

        (Op::Eq, CvVal::Float(a), CvVal::Float(b)) => Some(Cv::bool(a == b)),
        (Op::Neq, CvVal::Float(a), CvVal::Float(b)) => Some(Cv::bool(a != b)),
        (Op::Eq, a, b) => Some(Cv::bool(a == b)),
        (Op::Neq, a, b) => Some(Cv::bool(a != b)),

        (Op::Lt | Op::Le | Op::Gt | Op::Ge, a, b) => {
            let ord = match (a, b) {
                (CvVal::Int(a), CvVal::Int(b)) => a.cmp(b),
                (CvVal::Real(a), CvVal::Real(b)) => a.cmp(b),
                (CvVal::Float(a), CvVal::Float(b)) => match a.partial_cmp(b) {
                    Some(o) => o,
                    // Every ordering with NaN is false.
                    None => return Some(Cv::bool(false)),
                },
                _ => return None,
            };
            Some(Cv::bool(compare(op, ord)))
        }

        (Op::Add, CvVal::Int(a), CvVal::Int(b)) => Some(arith(result, a + b)),
        (Op::Sub, CvVal::Int(a), CvVal::Int(b)) => Some(arith(result, a - b)),
        (Op::Mul, CvVal::Int(a), CvVal::Int(b)) => Some(arith(result, a * b)),
        (Op::Div, CvVal::Int(a), CvVal::Int(b)) => match result {
            Kind::BitVec { signed, width } => Some(Cv::bv(result.clone(), bv_div(*signed, *width, a, b))),
            _ if b.is_zero() => None,
            _ => Some(Cv::int(int_div(a, b))),
        },

        (Op::Add, CvVal::Real(a), CvVal::Real(b)) => Some(Cv::real(a + b)),
        (Op::Sub, CvVal::Real(a), CvVal::Real(b)) => Some(Cv::real(a - b)),
        (Op::Mul, CvVal::Real(a), CvVal::Real(b)) => Some(Cv::real(a * b)),
        (Op::Div, CvVal::Real(a), CvVal::Real(b)) if !b.is_zero() => Some(Cv::real(a / b)),

        (Op::UMulNoOverflow, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            Some(Cv::bool(bits_of(w, a) * bits_of(w, b) < modulus(w)))
        }
        (Op::SMulNoOverflow, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            let p = signed_of(w, a) * signed_of(w, b);
            Some(Cv::bool(w == 0 || p < modulus(w - 1)))
        }
        (Op::SMulNoUnderflow, CvVal::Int(a), CvVal::Int(b)) => {
            let w = bv?;
            let p = signed_of(w, a) * signed_of(w, b);
            Some(Cv::bool(w == 0 || p >= -modulus(w - 1)))
        }

        _ => None,
    }
}

fn compare(op: &Op, ord: Ordering) -> bool {
    match op {
        Op::Lt => ord == Ordering::Less,
        Op::Le => ord != Ordering::Greater,
        Op::Gt => ord == Ordering::Greater,
        Op::Ge => ord != Ordering::Less,
        _ => unreachable!("compare called with {op:?}"),
    }
}

fn arith(result: &Kind, v: BigInt) -> Cv {
    if result.is_bit_vec() { Cv::bv(result.clone(), v) } else { Cv::int(v) }
}

/// `bvudiv` / `bvsdiv`, including the division-by-zero results SMTLib fixes.
fn bv_div(signed: bool, width: u32, a: &BigInt, b: &BigInt) -> BigInt {
    if b.is_zero() {
        return if signed && a.is_negative() { BigInt::one() } else { modulus(width) - 1 };
    }
    // Truncating division on canonical values; MIN / -1 wraps back to MIN.
    a / b
}

/// SMTLib `div`: the remainder is always non-negative.
fn int_div(a: &BigInt, b: &BigInt) -> BigInt {
    let (q, r) = a.div_mod_floor(b);
    if r.is_negative() { q + 1 } else { q }
}
