#![forbid(unsafe_code)]

use std::fmt;

use crate::Kind;

/// Handle of a node in a context's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Reserved in every context for the literal `false`.
    pub const FALSE: NodeId = NodeId(0);
    /// Reserved in every context for the literal `true`.
    pub const TRUE: NodeId = NodeId(1);
    /// First handle handed out for anything else.
    pub const FIRST_FREE: u32 = 2;

    pub fn is_bool_literal(self) -> bool {
        self == NodeId::FALSE || self == NodeId::TRUE
    }

    /// Name of this node at nesting depth `level`. Nested scopes carry their
    /// depth in the name so a lambda's bindings never capture a parent's.
    pub fn smt_name(self, level: u32) -> String {
        match self {
            NodeId::FALSE => "false".to_string(),
            NodeId::TRUE => "true".to_string(),
            NodeId(n) if level == 0 => format!("s{n}"),
            NodeId(n) => format!("l{level}_s{n}"),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Not,
    And,
    Or,
    Xor,
    Implies,
    /// `(ite c t e)`; the expression domain is the branch kind.
    Ite,

    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,

    Add,
    Sub,
    Mul,
    Div,
    Neg,

    /// Add this many bits, filled with zeros.
    ZeroExtend(u32),
    /// Add this many bits, filled with the sign bit.
    SignExtend(u32),
    Extract { hi: u32, lo: u32 },
    /// Single bit as a boolean.
    TestBit(u32),

    /// Application of an uninterpreted or named function.
    Apply(String),
    /// Symbolic-index lookup into an auto-constructed table.
    Table(u32),
    /// Reference to a declared array.
    ArrayRef(u32),
    Select,

    /// Solver-native `bvumul_noovfl`.
    UMulNoOverflow,
    /// Solver-native `bvsmul_noovfl`.
    SMulNoOverflow,
    /// Solver-native `bvsmul_noudfl`.
    SMulNoUnderflow,
}

/// A node definition: operator, operand domain and operand handles.
///
/// The domain is the kind of the first value operand; it decides between the
/// signed and unsigned, bit-vector and arithmetic spellings of an operator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Expr {
    pub op: Op,
    pub domain: Kind,
    pub args: Vec<NodeId>,
}

impl Expr {
    pub fn new(op: Op, domain: Kind, args: Vec<NodeId>) -> Self {
        Self { op, domain, args }
    }

    /// Names of uninterpreted functions this expression applies.
    pub fn applied_name(&self) -> Option<&str> {
        match &self.op {
            Op::Apply(name) => Some(name),
            _ => None,
        }
    }

    /// SMTLib text, naming operands through `name_of`.
    pub fn render(&self, name_of: impl Fn(NodeId) -> String) -> String {
        let args: Vec<String> = self.args.iter().map(|a| name_of(*a)).collect();
        let head = match &self.op {
            Op::Apply(name) if args.is_empty() => return name.clone(),
            Op::ArrayRef(id) => return format!("array_{id}"),
            Op::TestBit(i) => {
                return format!("(= ((_ extract {i} {i}) {}) #b1)", args.join(" "));
            }
            op => self.head(op),
        };
        if args.is_empty() {
            head
        } else {
            format!("({head} {})", args.join(" "))
        }
    }

    fn head(&self, op: &Op) -> String {
        let bv = self.domain.is_bit_vec();
        let signed = self.domain.is_signed();
        let float = matches!(self.domain, Kind::Float { .. });
        let s = match op {
            Op::Not if bv => "bvnot",
            Op::Not => "not",
            Op::And if bv => "bvand",
            Op::And => "and",
            Op::Or if bv => "bvor",
            Op::Or => "or",
            Op::Xor if bv => "bvxor",
            Op::Xor => "xor",
            Op::Implies => "=>",
            Op::Ite => "ite",
            Op::Eq if float => "fp.eq",
            Op::Eq => "=",
            Op::Neq => "distinct",
            Op::Lt if bv => if signed { "bvslt" } else { "bvult" },
            Op::Le if bv => if signed { "bvsle" } else { "bvule" },
            Op::Gt if bv => if signed { "bvsgt" } else { "bvugt" },
            Op::Ge if bv => if signed { "bvsge" } else { "bvuge" },
            Op::Lt if float => "fp.lt",
            Op::Le if float => "fp.leq",
            Op::Gt if float => "fp.gt",
            Op::Ge if float => "fp.geq",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add if bv => "bvadd",
            Op::Add => "+",
            Op::Sub if bv => "bvsub",
            Op::Sub => "-",
            Op::Mul if bv => "bvmul",
            Op::Mul => "*",
            Op::Div if bv => if signed { "bvsdiv" } else { "bvudiv" },
            Op::Div if self.domain == Kind::Int => "div",
            Op::Div => "/",
            Op::Neg if bv => "bvneg",
            Op::Neg => "-",
            Op::ZeroExtend(n) => return format!("(_ zero_extend {n})"),
            Op::SignExtend(n) => return format!("(_ sign_extend {n})"),
            Op::Extract { hi, lo } => return format!("(_ extract {hi} {lo})"),
            Op::Apply(name) => return name.clone(),
            Op::Table(id) => return format!("table{id}"),
            Op::Select => "select",
            Op::UMulNoOverflow => "bvumul_noovfl",
            Op::SMulNoOverflow => "bvsmul_noovfl",
            Op::SMulNoUnderflow => "bvsmul_noudfl",
            Op::TestBit(_) | Op::ArrayRef(_) => unreachable!("rendered by Expr::render"),
        };
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(id: NodeId) -> String {
        id.smt_name(1)
    }

    #[test]
    fn renders_signed_and_unsigned_spellings() {
        let lt_s = Expr::new(Op::Lt, Kind::signed(8), vec![NodeId(2), NodeId(3)]);
        let lt_u = Expr::new(Op::Lt, Kind::unsigned(8), vec![NodeId(2), NodeId(3)]);
        let lt_i = Expr::new(Op::Lt, Kind::Int, vec![NodeId(2), NodeId(3)]);
        assert_eq!(lt_s.render(names), "(bvslt l1_s2 l1_s3)");
        assert_eq!(lt_u.render(names), "(bvult l1_s2 l1_s3)");
        assert_eq!(lt_i.render(names), "(< l1_s2 l1_s3)");
    }

    #[test]
    fn renders_indexed_operators() {
        let ext = Expr::new(Op::ZeroExtend(1), Kind::unsigned(8), vec![NodeId(4)]);
        assert_eq!(ext.render(names), "((_ zero_extend 1) l1_s4)");
        let bit = Expr::new(Op::TestBit(7), Kind::unsigned(8), vec![NodeId(4)]);
        assert_eq!(bit.render(names), "(= ((_ extract 7 7) l1_s4) #b1)");
        let konst = Expr::new(Op::Apply("c".to_string()), Kind::Int, vec![]);
        assert_eq!(konst.render(names), "c");
    }

    #[test]
    fn literal_nodes_render_as_literals() {
        assert_eq!(NodeId::TRUE.smt_name(3), "true");
        assert_eq!(NodeId::FALSE.smt_name(0), "false");
        assert_eq!(NodeId(9).smt_name(0), "s9");
        assert_eq!(NodeId(9).smt_name(2), "l2_s9");
    }
}
