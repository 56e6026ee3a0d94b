#![forbid(unsafe_code)]

use std::fmt;

use quill_ir::{Declaration, Kind, NodeId};
use tracing::debug;

use crate::ValidTrace;

/// A lowered body that can be placed at any indentation.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    /// Uninterpreted names the caller must co-declare.
    pub free_names: Vec<String>,
    /// `((p1 T1) (p2 T2) ...)`, absent when there are no parameters.
    pub params: Option<String>,
    bindings: Vec<(String, String)>,
    output: String,
}

impl Definition {
    pub fn from_trace(t: &ValidTrace) -> Definition {
        let name = |n: NodeId| n.smt_name(t.level);
        let params = if t.params.is_empty() {
            None
        } else {
            let ps: Vec<String> = t
                .params
                .iter()
                .map(|(n, k)| format!("({} {})", name(*n), k.smt_type()))
                .collect();
            Some(format!("({})", ps.join(" ")))
        };
        let mut bindings: Vec<(String, String)> = t
            .constants
            .iter()
            .map(|(n, cv)| (name(*n), cv.to_smt(t.rounding)))
            .collect();
        bindings.extend(
            t.assignments
                .iter()
                .map(|(n, expr)| (name(*n), expr.render(name))),
        );
        let def = Definition {
            free_names: t.free_names.clone(),
            params,
            bindings,
            output: name(t.output),
        };
        debug!(
            bindings = def.bindings.len(),
            simple = def.is_simple(),
            "serialized"
        );
        def
    }

    /// The body is one expression with no `let`.
    pub fn is_simple(&self) -> bool {
        matches!(self.bindings.as_slice(), [(n, _)] if *n == self.output)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Body text with every line indented by `indent` spaces.
    pub fn body(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        if self.is_simple() {
            return format!("{pad}{}", self.bindings[0].1);
        }
        let mut lines: Vec<String> = self
            .bindings
            .iter()
            .map(|(n, e)| format!("{pad}(let (({n} {e}))"))
            .collect();
        lines.push(format!(
            "{pad}{}{}",
            self.output,
            ")".repeat(self.bindings.len())
        ));
        lines.join("\n")
    }
}

/// How a definition is wrapped for emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wrapper {
    Lambda,
    Named(String),
    Constraint(String),
}

/// What a lowering hands back to its caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Emitted {
    Text(String),
    Function(FunctionDecl),
}

/// Wrap a validated trace for emission.
pub fn serialize(t: &ValidTrace, wrapper: &Wrapper) -> Emitted {
    let def = Definition::from_trace(t);
    match wrapper {
        Wrapper::Lambda => Emitted::Text(lambda(&def)),
        Wrapper::Constraint(label) => Emitted::Text(constraint(&def, label)),
        Wrapper::Named(name) => {
            Emitted::Function(FunctionDecl::new(name, t.output_kind.clone(), def))
        }
    }
}

fn lambda(def: &Definition) -> String {
    match &def.params {
        Some(p) => format!("(lambda {p}\n{})", def.body(2)),
        None => def.body(0),
    }
}

/// A label on a single comment line; line breaks would end the comment.
fn comment_text(label: &str) -> String {
    label.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn constraint(def: &Definition, label: &str) -> String {
    let mut out = format!("; -- constraint: {}\n", comment_text(label));
    if !def.free_names.is_empty() {
        out.push_str(&format!("; -- uninterpreted: {}\n", def.free_names.join(", ")));
    }
    match &def.params {
        Some(p) => out.push_str(&format!("(assert (forall {p}\n{}))", def.body(2))),
        None => out.push_str(&format!("(assert\n{})", def.body(2))),
    }
    out
}

/// A named function, rendered only when the session emits its declarations.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub result: Kind,
    pub definition: Definition,
    pub recursive: bool,
}

impl FunctionDecl {
    /// `definition.free_names` must still contain `name` if the body calls
    /// itself; it is removed here and marks the function recursive.
    pub fn new(name: &str, result: Kind, mut definition: Definition) -> Self {
        let before = definition.free_names.len();
        definition.free_names.retain(|n| n != name);
        let recursive = definition.free_names.len() != before;
        FunctionDecl {
            name: name.to_string(),
            result,
            definition,
            recursive,
        }
    }
}

impl Declaration for FunctionDecl {
    fn name(&self) -> &str {
        &self.name
    }

    fn free_names(&self) -> Vec<String> {
        self.definition.free_names.clone()
    }

    fn render(&self) -> String {
        let head = if self.recursive { "define-fun-rec" } else { "define-fun" };
        let params = self.definition.params.as_deref().unwrap_or("()");
        format!(
            "({head} {} {params} {}\n{})",
            self.name,
            self.result.smt_type(),
            self.definition.body(2)
        )
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(bindings: &[(&str, &str)], output: &str, params: Option<&str>) -> Definition {
        Definition {
            free_names: vec![],
            params: params.map(str::to_string),
            bindings: bindings
                .iter()
                .map(|(n, e)| (n.to_string(), e.to_string()))
                .collect(),
            output: output.to_string(),
        }
    }

    #[test]
    fn single_binding_is_inlined() {
        let d = def(&[("l1_s3", "(bvadd l1_s2 l1_s2)")], "l1_s3", Some("((l1_s2 (_ BitVec 8)))"));
        assert_eq!(d.body(4), "    (bvadd l1_s2 l1_s2)");
        assert_eq!(
            lambda(&d),
            "(lambda ((l1_s2 (_ BitVec 8)))\n  (bvadd l1_s2 l1_s2))"
        );
    }

    #[test]
    fn nested_lets_close_once_per_binding() {
        let d = def(&[("s2", "#x01"), ("s3", "(bvadd s2 s2)")], "s3", None);
        assert_eq!(d.body(0), "(let ((s2 #x01))\n(let ((s3 (bvadd s2 s2)))\ns3))");
    }

    #[test]
    fn bare_output_has_no_bindings() {
        let d = def(&[], "l1_s2", Some("((l1_s2 Int))"));
        assert_eq!(d.body(2), "  l1_s2");
    }

    #[test]
    fn constraints_without_params_are_plain_asserts() {
        let mut d = def(&[], "true", None);
        d.free_names = vec!["f".to_string()];
        assert_eq!(
            constraint(&d, "c"),
            "; -- constraint: c\n; -- uninterpreted: f\n(assert\n  true)"
        );
    }

    #[test]
    fn line_breaks_in_labels_stay_inside_the_comment() {
        let d = def(&[], "true", None);
        let out = constraint(&d, "x\n(assert false)\r\ny");
        assert_eq!(out, "; -- constraint: x (assert false) y\n(assert\n  true)");
        assert_eq!(out.lines().filter(|l| l.starts_with("(assert")).count(), 1);
    }

    #[test]
    fn self_reference_makes_a_recursive_definition() {
        let mut d = def(&[("l1_s3", "(f l1_s2)")], "l1_s3", Some("((l1_s2 Int))"));
        d.free_names = vec!["f".to_string(), "g".to_string()];
        let decl = FunctionDecl::new("f", Kind::Int, d);
        assert!(decl.recursive);
        assert_eq!(decl.free_names(), ["g"]);
        assert_eq!(decl.render(), "(define-fun-rec f ((l1_s2 Int)) Int\n  (f l1_s2))");
    }
}
