#![forbid(unsafe_code)]

use std::fmt;

use crate::Kind;

/// Argument and result kinds of an uninterpreted or named function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSig {
    pub args: Vec<Kind>,
    pub result: Kind,
}

impl FunctionSig {
    pub fn smt_declare(&self, name: &str) -> String {
        let args: Vec<String> = self.args.iter().map(Kind::smt_type).collect();
        format!("(declare-fun {name} ({}) {})", args.join(" "), self.result.smt_type())
    }
}

impl fmt::Display for FunctionSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(Kind::to_string).collect();
        write!(f, "{} -> {}", args.join(", "), self.result)
    }
}

/// A definition registered in a context and rendered only at declaration time.
pub trait Declaration: fmt::Debug {
    fn name(&self) -> &str;

    /// Uninterpreted names the definition needs declared before it.
    fn free_names(&self) -> Vec<String>;

    fn render(&self) -> String;
}
