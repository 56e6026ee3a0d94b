#![forbid(unsafe_code)]

use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::{Kind, NodeId, RoundingMode};

/// Payload of a concrete value.
#[derive(Clone, Debug, PartialEq)]
pub enum CvVal {
    Bool(bool),
    /// Integers and bit-vectors. Bit-vector values are kept canonical: unsigned
    /// kinds in `[0, 2^n)`, signed kinds in `[-2^(n-1), 2^(n-1))`.
    Int(BigInt),
    Real(BigRational),
    Float(f64),
}

/// A concrete value together with its kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Cv {
    pub kind: Kind,
    pub val: CvVal,
}

/// Hashable identity of a constant; used to share constant nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CvKey {
    Bool(bool),
    Int(BigInt),
    Real(BigRational),
    Float(u64),
}

pub(crate) fn modulus(width: u32) -> BigInt {
    BigInt::one() << (width as usize)
}

/// Reduce `v` into the canonical range of a bit-vector kind.
pub(crate) fn wrap(signed: bool, width: u32, v: BigInt) -> BigInt {
    if width == 0 {
        return BigInt::zero();
    }
    let m = modulus(width);
    let u = v.mod_floor(&m);
    if signed && u >= modulus(width - 1) { u - m } else { u }
}

/// Bit pattern of a canonical bit-vector value, as a non-negative integer.
pub(crate) fn bits_of(width: u32, v: &BigInt) -> BigInt {
    if v.is_negative() { v + modulus(width) } else { v.clone() }
}

impl Cv {
    pub fn bool(b: bool) -> Self {
        Cv {
            kind: Kind::Bool,
            val: CvVal::Bool(b),
        }
    }

    /// A bit-vector constant; `value` wraps into the kind's range.
    pub fn bv(kind: Kind, value: impl Into<BigInt>) -> Self {
        let Kind::BitVec { signed, width } = kind else {
            panic!("Cv::bv: expected a bit-vector kind, got {kind}");
        };
        Cv {
            kind,
            val: CvVal::Int(wrap(signed, width, value.into())),
        }
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Cv {
            kind: Kind::Int,
            val: CvVal::Int(value.into()),
        }
    }

    pub fn real(value: BigRational) -> Self {
        Cv {
            kind: Kind::Real,
            val: CvVal::Real(value),
        }
    }

    pub fn float(exp: u32, sig: u32, value: f64) -> Self {
        Cv {
            kind: Kind::Float { exp, sig },
            val: CvVal::Float(value),
        }
    }

    /// Smallest value of a bit-vector kind.
    pub fn bv_min(kind: &Kind) -> Self {
        match kind {
            Kind::BitVec { signed: true, width } if *width > 0 => {
                Cv::bv(kind.clone(), -modulus(width - 1))
            }
            _ => Cv::bv(kind.clone(), 0),
        }
    }

    /// Largest value of a bit-vector kind.
    pub fn bv_max(kind: &Kind) -> Self {
        match kind {
            Kind::BitVec { signed: true, width } if *width > 0 => {
                Cv::bv(kind.clone(), modulus(width - 1) - 1)
            }
            Kind::BitVec { width, .. } => Cv::bv(kind.clone(), modulus(*width) - 1),
            _ => panic!("Cv::bv_max: expected a bit-vector kind, got {kind}"),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.val {
            CvVal::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.val {
            CvVal::Int(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> CvKey {
        match &self.val {
            CvVal::Bool(b) => CvKey::Bool(*b),
            CvVal::Int(i) => CvKey::Int(i.clone()),
            CvVal::Real(r) => CvKey::Real(r.clone()),
            CvVal::Float(x) => CvKey::Float(x.to_bits()),
        }
    }

    /// SMTLib literal for this constant.
    pub fn to_smt(&self, rm: RoundingMode) -> String {
        match (&self.kind, &self.val) {
            (_, CvVal::Bool(b)) => b.to_string(),
            (Kind::BitVec { width, .. }, CvVal::Int(v)) => bv_literal(*width, v),
            (_, CvVal::Int(v)) => int_literal(v),
            (_, CvVal::Real(r)) => real_literal(r),
            (Kind::Float { exp, sig }, CvVal::Float(x)) => float_literal(*exp, *sig, *x, rm),
            (kind, CvVal::Float(x)) => panic!("float payload {x} under non-float kind {kind}"),
        }
    }
}

impl fmt::Display for Cv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.val {
            CvVal::Bool(b) => write!(f, "{b} :: {}", self.kind),
            CvVal::Int(i) => write!(f, "{i} :: {}", self.kind),
            CvVal::Real(r) => write!(f, "{r} :: {}", self.kind),
            CvVal::Float(x) => write!(f, "{x} :: {}", self.kind),
        }
    }
}

fn bv_literal(width: u32, v: &BigInt) -> String {
    let bits = bits_of(width, v);
    let (_, mag) = bits.into_parts();
    if width > 0 && width % 4 == 0 {
        format!("#x{:0>w$}", mag.to_str_radix(16), w = (width / 4) as usize)
    } else {
        format!("#b{:0>w$}", mag.to_str_radix(2), w = width as usize)
    }
}

fn int_literal(v: &BigInt) -> String {
    if v.is_negative() { format!("(- {})", v.abs()) } else { v.to_string() }
}

fn real_literal(r: &BigRational) -> String {
    let mag = if r.denom().is_one() {
        format!("{}.0", r.numer().abs())
    } else {
        format!("(/ {}.0 {}.0)", r.numer().abs(), r.denom())
    };
    if r.is_negative() { format!("(- {mag})") } else { mag }
}

fn fp_bits(bits: u64, exp: u32, man: u32) -> String {
    let sign = (bits >> (exp + man)) & 1;
    let e = (bits >> man) & ((1u64 << exp) - 1);
    let m = bits & ((1u64 << man) - 1);
    format!(
        "(fp #b{sign} #b{e:0ew$b} #b{m:0mw$b})",
        ew = exp as usize,
        mw = man as usize
    )
}

fn float_literal(exp: u32, sig: u32, x: f64, rm: RoundingMode) -> String {
    if x.is_nan() {
        return format!("(_ NaN {exp} {sig})");
    }
    if x.is_infinite() {
        let s = if x > 0.0 { '+' } else { '-' };
        return format!("(_ {s}oo {exp} {sig})");
    }
    if x == 0.0 {
        let s = if x.is_sign_negative() { '-' } else { '+' };
        return format!("(_ {s}zero {exp} {sig})");
    }
    match (exp, sig) {
        (11, 53) => fp_bits(x.to_bits(), 11, 52),
        (8, 24) if f64::from(x as f32) == x || rm == RoundingMode::RoundNearestTiesToEven => {
            fp_bits(u64::from((x as f32).to_bits()), 8, 23)
        }
        _ => {
            // Finite, so the conversion to an exact rational cannot fail.
            let r = BigRational::from_float(x).unwrap_or_else(BigRational::zero);
            format!("((_ to_fp {exp} {sig}) {} {})", rm.smt(), real_literal(&r))
        }
    }
}

/// A symbolic value: either folded to a constant or a handle into the
/// node arena of the context that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum SVal {
    Concrete(Cv),
    Symbolic { node: NodeId, kind: Kind, scope: u32 },
}

impl SVal {
    pub fn kind(&self) -> &Kind {
        match self {
            SVal::Concrete(cv) => &cv.kind,
            SVal::Symbolic { kind, .. } => kind,
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, SVal::Concrete(_))
    }

    pub fn as_concrete(&self) -> Option<&Cv> {
        match self {
            SVal::Concrete(cv) => Some(cv),
            SVal::Symbolic { .. } => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_concrete().and_then(Cv::as_bool)
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        self.as_concrete().and_then(Cv::as_int)
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            SVal::Symbolic { node, .. } => Some(*node),
            SVal::Concrete(_) => None,
        }
    }
}

impl From<Cv> for SVal {
    fn from(cv: Cv) -> Self {
        SVal::Concrete(cv)
    }
}

impl From<bool> for SVal {
    fn from(b: bool) -> Self {
        SVal::Concrete(Cv::bool(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_vectors_wrap_to_canonical_range() {
        assert_eq!(Cv::bv(Kind::signed(8), 200).as_int(), Some(&BigInt::from(-56)));
        assert_eq!(Cv::bv(Kind::unsigned(8), -1).as_int(), Some(&BigInt::from(255)));
        assert_eq!(Cv::bv(Kind::unsigned(0), 7).as_int(), Some(&BigInt::from(0)));
        assert_eq!(Cv::bv_min(&Kind::signed(8)).as_int(), Some(&BigInt::from(-128)));
        assert_eq!(Cv::bv_max(&Kind::unsigned(4)).as_int(), Some(&BigInt::from(15)));
    }

    #[test]
    fn literals_use_hex_when_width_allows() {
        let rm = RoundingMode::default();
        assert_eq!(Cv::bv(Kind::unsigned(8), 1).to_smt(rm), "#x01");
        assert_eq!(Cv::bv(Kind::signed(8), -1).to_smt(rm), "#xff");
        assert_eq!(Cv::bv(Kind::unsigned(3), 5).to_smt(rm), "#b101");
        assert_eq!(Cv::int(-4).to_smt(rm), "(- 4)");
        assert_eq!(Cv::bool(true).to_smt(rm), "true");
    }

    #[test]
    fn real_literals_are_exact() {
        let rm = RoundingMode::default();
        let third = BigRational::new(BigInt::from(-1), BigInt::from(3));
        assert_eq!(Cv::real(third).to_smt(rm), "(- (/ 1.0 3.0))");
        let two = BigRational::from_integer(BigInt::from(2));
        assert_eq!(Cv::real(two).to_smt(rm), "2.0");
    }

    #[test]
    fn float_literals_honor_rounding_mode() {
        let one = Cv::float(8, 24, 1.0);
        assert_eq!(
            one.to_smt(RoundingMode::RoundTowardZero),
            "(fp #b0 #b01111111 #b00000000000000000000000)"
        );

        // 0.1 is not exact in single precision, so a non-default mode goes
        // through `to_fp`.
        let tenth = Cv::float(8, 24, 0.1);
        let text = tenth.to_smt(RoundingMode::RoundTowardZero);
        assert!(text.starts_with("((_ to_fp 8 24) RTZ (/ "), "got {text}");

        let half = Cv::float(5, 11, -0.5);
        assert_eq!(
            half.to_smt(RoundingMode::RoundTowardPositive),
            "((_ to_fp 5 11) RTP (- (/ 1.0 2.0)))"
        );
        assert_eq!(Cv::float(11, 53, f64::NAN).to_smt(RoundingMode::default()), "(_ NaN 11 53)");
    }
}
