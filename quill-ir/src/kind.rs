#![forbid(unsafe_code)]

use std::fmt;

/// The type tag of a symbolic value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bool,
    /// Two's-complement bit-vector. Signedness only affects ordering,
    /// division and how constants are read back.
    BitVec { signed: bool, width: u32 },
    /// Unbounded mathematical integer.
    Int,
    Real,
    Float { exp: u32, sig: u32 },
    Array(Box<Kind>, Box<Kind>),
    /// A user-declared sort with no interpretation.
    Uninterpreted(String),
}

impl Kind {
    pub fn unsigned(width: u32) -> Self {
        Kind::BitVec { signed: false, width }
    }

    pub fn signed(width: u32) -> Self {
        Kind::BitVec { signed: true, width }
    }

    pub fn float32() -> Self {
        Kind::Float { exp: 8, sig: 24 }
    }

    pub fn float64() -> Self {
        Kind::Float { exp: 11, sig: 53 }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Kind::Bool)
    }

    pub fn is_bit_vec(&self) -> bool {
        matches!(self, Kind::BitVec { .. })
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Kind::BitVec { signed: true, .. })
    }

    /// Bit width for bit-vector kinds.
    pub fn width(&self) -> Option<u32> {
        match self {
            Kind::BitVec { width, .. } => Some(*width),
            _ => None,
        }
    }

    /// Same signedness, different width.
    pub fn with_width(&self, width: u32) -> Self {
        Kind::BitVec {
            signed: self.is_signed(),
            width,
        }
    }

    /// Kinds that support `+ - * /` and negation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::BitVec { .. } | Kind::Int | Kind::Real)
    }

    /// SMTLib sort syntax.
    pub fn smt_type(&self) -> String {
        match self {
            Kind::Bool => "Bool".to_string(),
            Kind::BitVec { width, .. } => format!("(_ BitVec {width})"),
            Kind::Int => "Int".to_string(),
            Kind::Real => "Real".to_string(),
            Kind::Float { exp, sig } => format!("(_ FloatingPoint {exp} {sig})"),
            Kind::Array(k, v) => format!("(Array {} {})", k.smt_type(), v.smt_type()),
            Kind::Uninterpreted(name) => name.clone(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bool => write!(f, "bool"),
            Kind::BitVec { signed: true, width } => write!(f, "i{width}"),
            Kind::BitVec { signed: false, width } => write!(f, "u{width}"),
            Kind::Int => write!(f, "int"),
            Kind::Real => write!(f, "real"),
            Kind::Float { exp, sig } => write!(f, "float<{exp},{sig}>"),
            Kind::Array(k, v) => write!(f, "array<{k}, {v}>"),
            Kind::Uninterpreted(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smt_type_covers_every_kind() {
        assert_eq!(Kind::Bool.smt_type(), "Bool");
        assert_eq!(Kind::signed(8).smt_type(), "(_ BitVec 8)");
        assert_eq!(Kind::unsigned(32).smt_type(), "(_ BitVec 32)");
        assert_eq!(Kind::Int.smt_type(), "Int");
        assert_eq!(Kind::Real.smt_type(), "Real");
        assert_eq!(Kind::float64().smt_type(), "(_ FloatingPoint 11 53)");
        assert_eq!(
            Kind::Array(Box::new(Kind::unsigned(4)), Box::new(Kind::Bool)).smt_type(),
            "(Array (_ BitVec 4) Bool)"
        );
        assert_eq!(Kind::Uninterpreted("Color".to_string()).smt_type(), "Color");
    }

    #[test]
    fn display_is_short_form() {
        assert_eq!(Kind::signed(16).to_string(), "i16");
        assert_eq!(Kind::unsigned(1).to_string(), "u1");
        assert_eq!(Kind::float32().to_string(), "float<8,24>");
    }
}
