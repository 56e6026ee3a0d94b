#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::trace;

use crate::eval::{fold_binary, fold_unary};
use crate::value::CvKey;
use crate::{Cv, Declaration, Expr, FunctionSig, IrError, Kind, NodeId, Op, SVal, SmtConfig};

type Shared<T> = Rc<RefCell<T>>;

static NEXT_SCOPE: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputRole {
    /// Free variable of the computation; becomes a parameter when lowered.
    Universal,
    Existential,
    /// Internal bookkeeping input, never user-facing.
    Tracker,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub node: NodeId,
    pub name: String,
    pub kind: Kind,
    pub role: InputRole,
}

/// Lookup table built when a list of values is indexed symbolically.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub id: u32,
    pub index: Kind,
    pub elem: Kind,
    pub entries: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDecl {
    pub id: u32,
    pub name: String,
    pub key: Kind,
    pub value: Kind,
}

/// Foreign code attached to an uninterpreted function.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeSegment {
    pub function: String,
    pub lines: Vec<String>,
}

/// A node recorded under a user label (observables, constraints, assertions).
#[derive(Clone, Debug, PartialEq)]
pub struct Labelled {
    pub label: String,
    pub node: NodeId,
}

/// Every field of a [`Context`], as addressed by fork manifests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextField {
    Config,
    StartTime,
    Uninterpreted,
    UserFunctions,
    Definitions,
    Axioms,
    TableIds,
    ArrayIds,
    Nodes,
    Inputs,
    Constants,
    Assignments,
    Tables,
    Arrays,
    CodeSegments,
    Observables,
    Constraints,
    Assertions,
    Outputs,
    Kinds,
}

impl ContextField {
    pub const ALL: [ContextField; 20] = [
        ContextField::Config,
        ContextField::StartTime,
        ContextField::Uninterpreted,
        ContextField::UserFunctions,
        ContextField::Definitions,
        ContextField::Axioms,
        ContextField::TableIds,
        ContextField::ArrayIds,
        ContextField::Nodes,
        ContextField::Inputs,
        ContextField::Constants,
        ContextField::Assignments,
        ContextField::Tables,
        ContextField::Arrays,
        ContextField::CodeSegments,
        ContextField::Observables,
        ContextField::Constraints,
        ContextField::Assertions,
        ContextField::Outputs,
        ContextField::Kinds,
    ];
}

/// How a child context obtains one field from its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Same registry by reference; appends in the child are visible to the parent.
    Share,
    /// Copy of the parent's current contents.
    Snapshot,
    /// Newly allocated and empty.
    Fresh,
}

fn inherit<T: Clone + Default>(parent: &Shared<T>, policy: FieldPolicy) -> Shared<T> {
    match policy {
        FieldPolicy::Share => Rc::clone(parent),
        FieldPolicy::Snapshot => Rc::new(RefCell::new(parent.borrow().clone())),
        FieldPolicy::Fresh => Shared::default(),
    }
}

fn inherit_counter(parent: &Rc<Cell<u32>>, policy: FieldPolicy) -> Rc<Cell<u32>> {
    match policy {
        FieldPolicy::Share => Rc::clone(parent),
        FieldPolicy::Snapshot => Rc::new(Cell::new(parent.get())),
        FieldPolicy::Fresh => Rc::default(),
    }
}

/// Everything a finished context recorded in its own scope.
#[derive(Clone, Debug)]
pub struct Trace {
    pub level: u32,
    pub config: SmtConfig,
    /// Every kind a node of this scope was created with.
    pub kinds: BTreeSet<Kind>,
    pub node_kinds: Vec<Kind>,
    pub inputs: Vec<Input>,
    pub constants: Vec<(NodeId, Cv)>,
    pub assignments: Vec<(NodeId, Expr)>,
    pub tables: Vec<Table>,
    pub arrays: Vec<ArrayDecl>,
    pub code_segments: Vec<CodeSegment>,
    pub observables: Vec<Labelled>,
    pub constraints: Vec<Labelled>,
    pub assertions: Vec<Labelled>,
    pub outputs: Vec<NodeId>,
}

impl Trace {
    pub fn kind_of(&self, node: NodeId) -> Option<&Kind> {
        self.node_kinds.get(node.0 as usize)
    }
}

/// A symbolic-execution session, or one nested scope of it.
///
/// Per-scope state (node arena, inputs, recorded artifacts) is owned; the
/// session-wide registries sit behind `Rc<RefCell<_>>` so nested scopes can
/// share them. That also makes a context `!Send`.
pub struct Context {
    scope: u32,
    level: u32,
    config: SmtConfig,
    start_time: Instant,

    node_kinds: Vec<Kind>,
    expr_cache: HashMap<Expr, NodeId>,
    const_cache: HashMap<(Kind, CvKey), NodeId>,
    inputs: Vec<Input>,
    constants: Vec<(NodeId, Cv)>,
    assignments: Vec<(NodeId, Expr)>,
    tables: Vec<Table>,
    arrays: Vec<ArrayDecl>,
    code_segments: Vec<CodeSegment>,
    observables: Vec<Labelled>,
    constraints: Vec<Labelled>,
    assertions: Vec<Labelled>,
    outputs: Vec<NodeId>,
    kinds: BTreeSet<Kind>,

    uninterpreted: Shared<BTreeMap<String, FunctionSig>>,
    user_functions: Shared<BTreeMap<String, FunctionSig>>,
    definitions: Shared<Vec<Rc<dyn Declaration>>>,
    axioms: Shared<Vec<String>>,
    table_ids: Rc<Cell<u32>>,
    array_ids: Rc<Cell<u32>>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new(SmtConfig::default())
    }
}

impl Context {
    /// A top-level session.
    pub fn new(config: SmtConfig) -> Self {
        Context::blank(0, config, Instant::now())
    }

    fn blank(level: u32, config: SmtConfig, start_time: Instant) -> Self {
        let mut ctx = Context {
            scope: NEXT_SCOPE.fetch_add(1, Ordering::Relaxed),
            level,
            config,
            start_time,
            node_kinds: Vec::new(),
            expr_cache: HashMap::new(),
            const_cache: HashMap::new(),
            inputs: Vec::new(),
            constants: Vec::new(),
            assignments: Vec::new(),
            tables: Vec::new(),
            arrays: Vec::new(),
            code_segments: Vec::new(),
            observables: Vec::new(),
            constraints: Vec::new(),
            assertions: Vec::new(),
            outputs: Vec::new(),
            kinds: BTreeSet::new(),
            uninterpreted: Shared::default(),
            user_functions: Shared::default(),
            definitions: Shared::default(),
            axioms: Shared::default(),
            table_ids: Rc::default(),
            array_ids: Rc::default(),
        };
        ctx.reserve_bool_literals();
        ctx
    }

    fn reserve_bool_literals(&mut self) {
        for b in [false, true] {
            let id = self.constant(&Cv::bool(b));
            debug_assert_eq!(id, if b { NodeId::TRUE } else { NodeId::FALSE });
        }
    }

    /// Build a context at depth `level` whose fields come from `self` as
    /// `policy` dictates.
    pub fn derive(&self, level: u32, policy: impl Fn(ContextField) -> FieldPolicy) -> Context {
        let mut child = Context::blank(level, SmtConfig::default(), Instant::now());
        for field in ContextField::ALL {
            let p = policy(field);
            let copy = p != FieldPolicy::Fresh;
            match field {
                ContextField::Config if copy => child.config = self.config.clone(),
                ContextField::StartTime if copy => child.start_time = self.start_time,
                ContextField::Uninterpreted => child.uninterpreted = inherit(&self.uninterpreted, p),
                ContextField::UserFunctions => child.user_functions = inherit(&self.user_functions, p),
                ContextField::Definitions => child.definitions = inherit(&self.definitions, p),
                ContextField::Axioms => child.axioms = inherit(&self.axioms, p),
                ContextField::TableIds => child.table_ids = inherit_counter(&self.table_ids, p),
                ContextField::ArrayIds => child.array_ids = inherit_counter(&self.array_ids, p),
                ContextField::Nodes if copy => {
                    child.node_kinds = self.node_kinds.clone();
                    child.expr_cache = self.expr_cache.clone();
                }
                ContextField::Inputs if copy => child.inputs = self.inputs.clone(),
                ContextField::Constants if copy => {
                    child.constants = self.constants.clone();
                    child.const_cache = self.const_cache.clone();
                }
                ContextField::Assignments if copy => child.assignments = self.assignments.clone(),
                ContextField::Tables if copy => child.tables = self.tables.clone(),
                ContextField::Arrays if copy => child.arrays = self.arrays.clone(),
                ContextField::CodeSegments if copy => child.code_segments = self.code_segments.clone(),
                ContextField::Observables if copy => child.observables = self.observables.clone(),
                ContextField::Constraints if copy => child.constraints = self.constraints.clone(),
                ContextField::Assertions if copy => child.assertions = self.assertions.clone(),
                ContextField::Outputs if copy => child.outputs = self.outputs.clone(),
                ContextField::Kinds if copy => child.kinds = self.kinds.clone(),
                _ => {}
            }
        }
        child
    }

    /// Consume the context, keeping what its scope recorded.
    pub fn finish(self) -> Trace {
        Trace {
            level: self.level,
            config: self.config,
            kinds: self.kinds,
            node_kinds: self.node_kinds,
            inputs: self.inputs,
            constants: self.constants,
            assignments: self.assignments,
            tables: self.tables,
            arrays: self.arrays,
            code_segments: self.code_segments,
            observables: self.observables,
            constraints: self.constraints,
            assertions: self.assertions,
            outputs: self.outputs,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn config(&self) -> &SmtConfig {
        &self.config
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn kind_of(&self, node: NodeId) -> Option<&Kind> {
        self.node_kinds.get(node.0 as usize)
    }

    pub fn node_count(&self) -> usize {
        self.node_kinds.len()
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn assignments(&self) -> &[(NodeId, Expr)] {
        &self.assignments
    }

    pub fn constants(&self) -> &[(NodeId, Cv)] {
        &self.constants
    }

    pub fn assertions(&self) -> &[Labelled] {
        &self.assertions
    }

    // ---- nodes -----------------------------------------------------------

    fn fresh_node(&mut self, kind: Kind) -> NodeId {
        let id = NodeId(self.node_kinds.len() as u32);
        self.kinds.insert(kind.clone());
        self.node_kinds.push(kind);
        id
    }

    fn constant(&mut self, cv: &Cv) -> NodeId {
        let key = (cv.kind.clone(), cv.key());
        if let Some(&id) = self.const_cache.get(&key) {
            return id;
        }
        let id = self.fresh_node(cv.kind.clone());
        self.const_cache.insert(key, id);
        self.constants.push((id, cv.clone()));
        id
    }

    fn symbolic(&self, node: NodeId, kind: Kind) -> SVal {
        SVal::Symbolic {
            node,
            kind,
            scope: self.scope,
        }
    }

    /// Node for `v` in this context, registering a constant if needed.
    pub fn materialize(&mut self, v: &SVal) -> Result<NodeId, IrError> {
        match v {
            SVal::Concrete(cv) => Ok(self.constant(cv)),
            SVal::Symbolic { node, scope, .. } if *scope == self.scope => Ok(*node),
            SVal::Symbolic { node, scope, .. } => Err(IrError::ForeignValue {
                node: node.0,
                scope: *scope,
                expected: self.scope,
            }),
        }
    }

    /// Hash-consed node for `expr`.
    fn intern(&mut self, expr: Expr, kind: Kind) -> SVal {
        if let Some(&node) = self.expr_cache.get(&expr) {
            return self.symbolic(node, kind);
        }
        let node = self.fresh_node(kind.clone());
        trace!(level = self.level, node = node.0, op = ?expr.op, "new node");
        self.expr_cache.insert(expr.clone(), node);
        self.assignments.push((node, expr));
        self.symbolic(node, kind)
    }

    fn unary(&mut self, op: Op, a: &SVal, result: Kind) -> Result<SVal, IrError> {
        if let SVal::Concrete(cv) = a {
            if let Some(out) = fold_unary(&op, cv, &result) {
                return Ok(out.into());
            }
        }
        let arg = self.materialize(a)?;
        Ok(self.intern(Expr::new(op, a.kind().clone(), vec![arg]), result))
    }

    fn binary(&mut self, op: Op, a: &SVal, b: &SVal, result: Kind) -> Result<SVal, IrError> {
        if let (SVal::Concrete(x), SVal::Concrete(y)) = (a, b) {
            if let Some(out) = fold_binary(&op, x, y, &result) {
                return Ok(out.into());
            }
        }
        let args = vec![self.materialize(a)?, self.materialize(b)?];
        Ok(self.intern(Expr::new(op, a.kind().clone(), args), result))
    }

    // ---- inputs ----------------------------------------------------------

    fn input(&mut self, name: &str, kind: Kind, role: InputRole) -> SVal {
        let node = self.fresh_node(kind.clone());
        self.inputs.push(Input {
            node,
            name: name.to_string(),
            kind: kind.clone(),
            role,
        });
        self.symbolic(node, kind)
    }

    /// A universally quantified free variable.
    pub fn forall(&mut self, name: &str, kind: Kind) -> SVal {
        self.input(name, kind, InputRole::Universal)
    }

    pub fn exists(&mut self, name: &str, kind: Kind) -> SVal {
        self.input(name, kind, InputRole::Existential)
    }

    pub fn tracker(&mut self, name: &str, kind: Kind) -> SVal {
        self.input(name, kind, InputRole::Tracker)
    }

    // ---- literals --------------------------------------------------------

    pub fn bool(&self, b: bool) -> SVal {
        SVal::Concrete(Cv::bool(b))
    }

    /// `value` wrapped into the range of `kind`.
    ///
    /// # Panics
    /// If `kind` is not a bit-vector kind.
    pub fn bv(&self, kind: &Kind, value: impl Into<BigInt>) -> SVal {
        SVal::Concrete(Cv::bv(kind.clone(), value))
    }

    pub fn int(&self, value: impl Into<BigInt>) -> SVal {
        SVal::Concrete(Cv::int(value))
    }

    // ---- kind checks -----------------------------------------------------

    fn same_kind(op: &str, a: &SVal, b: &SVal) -> Result<(), IrError> {
        if a.kind() == b.kind() {
            Ok(())
        } else {
            Err(IrError::KindMismatch {
                op: op.to_string(),
                left: a.kind().clone(),
                right: b.kind().clone(),
            })
        }
    }

    fn expect(op: &str, a: &SVal, ok: bool) -> Result<(), IrError> {
        if ok {
            Ok(())
        } else {
            Err(IrError::InvalidOperand {
                op: op.to_string(),
                kind: a.kind().clone(),
            })
        }
    }

    fn expect_bv(op: &str, a: &SVal) -> Result<u32, IrError> {
        match a.kind().width() {
            Some(w) => Ok(w),
            None => Err(IrError::InvalidOperand {
                op: op.to_string(),
                kind: a.kind().clone(),
            }),
        }
    }

    // ---- boolean / bitwise -----------------------------------------------

    pub fn not(&mut self, a: &SVal) -> Result<SVal, IrError> {
        Self::expect("not", a, a.kind().is_bool() || a.kind().is_bit_vec())?;
        self.unary(Op::Not, a, a.kind().clone())
    }

    pub fn and(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("and", a, b)?;
        Self::expect("and", a, a.kind().is_bool() || a.kind().is_bit_vec())?;
        match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Ok(self.bool(false)),
            (Some(true), _) => Ok(b.clone()),
            (_, Some(true)) => Ok(a.clone()),
            _ => self.binary(Op::And, a, b, a.kind().clone()),
        }
    }

    pub fn or(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("or", a, b)?;
        Self::expect("or", a, a.kind().is_bool() || a.kind().is_bit_vec())?;
        match (a.as_bool(), b.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Ok(self.bool(true)),
            (Some(false), _) => Ok(b.clone()),
            (_, Some(false)) => Ok(a.clone()),
            _ => self.binary(Op::Or, a, b, a.kind().clone()),
        }
    }

    pub fn xor(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("xor", a, b)?;
        Self::expect("xor", a, a.kind().is_bool() || a.kind().is_bit_vec())?;
        match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => Ok(self.bool(x != y)),
            (Some(false), _) => Ok(b.clone()),
            (_, Some(false)) => Ok(a.clone()),
            (Some(true), _) => self.not(b),
            (_, Some(true)) => self.not(a),
            _ => self.binary(Op::Xor, a, b, a.kind().clone()),
        }
    }

    pub fn implies(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("implies", a, b)?;
        Self::expect("implies", a, a.kind().is_bool())?;
        self.binary(Op::Implies, a, b, Kind::Bool)
    }

    /// Conjunction of any number of booleans; empty is `true`.
    pub fn all(&mut self, xs: &[SVal]) -> Result<SVal, IrError> {
        let mut acc = self.bool(true);
        for x in xs {
            acc = self.and(&acc, x)?;
        }
        Ok(acc)
    }

    pub fn ite(&mut self, c: &SVal, t: &SVal, e: &SVal) -> Result<SVal, IrError> {
        Self::expect("ite", c, c.kind().is_bool())?;
        Self::same_kind("ite", t, e)?;
        if let Some(b) = c.as_bool() {
            return Ok(if b { t.clone() } else { e.clone() });
        }
        if t == e {
            return Ok(t.clone());
        }
        let args = vec![self.materialize(c)?, self.materialize(t)?, self.materialize(e)?];
        Ok(self.intern(Expr::new(Op::Ite, t.kind().clone(), args), t.kind().clone()))
    }

    // ---- comparison ------------------------------------------------------

    pub fn eq(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("==", a, b)?;
        self.binary(Op::Eq, a, b, Kind::Bool)
    }

    pub fn neq(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("!=", a, b)?;
        self.binary(Op::Neq, a, b, Kind::Bool)
    }

    fn ordering(&mut self, op: Op, name: &str, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind(name, a, b)?;
        let k = a.kind();
        Self::expect(name, a, k.is_numeric() || matches!(k, Kind::Float { .. }))?;
        self.binary(op, a, b, Kind::Bool)
    }

    pub fn lt(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.ordering(Op::Lt, "<", a, b)
    }

    pub fn le(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.ordering(Op::Le, "<=", a, b)
    }

    pub fn gt(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.ordering(Op::Gt, ">", a, b)
    }

    pub fn ge(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.ordering(Op::Ge, ">=", a, b)
    }

    // ---- arithmetic ------------------------------------------------------

    fn arith(&mut self, op: Op, name: &str, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind(name, a, b)?;
        Self::expect(name, a, a.kind().is_numeric())?;
        self.binary(op, a, b, a.kind().clone())
    }

    pub fn add(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.arith(Op::Add, "+", a, b)
    }

    pub fn sub(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.arith(Op::Sub, "-", a, b)
    }

    pub fn mul(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.arith(Op::Mul, "*", a, b)
    }

    pub fn div(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        self.arith(Op::Div, "/", a, b)
    }

    pub fn neg(&mut self, a: &SVal) -> Result<SVal, IrError> {
        Self::expect("negate", a, a.kind().is_numeric())?;
        self.unary(Op::Neg, a, a.kind().clone())
    }

    // ---- bit-level -------------------------------------------------------

    /// Widen to `width` bits with zeros.
    ///
    /// # Panics
    /// If `width` is smaller than the operand's width.
    pub fn zero_extend(&mut self, a: &SVal, width: u32) -> Result<SVal, IrError> {
        let src = Self::expect_bv("zero_extend", a)?;
        assert!(
            width >= src,
            "zero_extend: target width {width} is smaller than source width {src} ({})",
            a.kind()
        );
        if width == src {
            return Ok(a.clone());
        }
        self.unary(Op::ZeroExtend(width - src), a, a.kind().with_width(width))
    }

    /// Widen to `width` bits with copies of the sign bit.
    ///
    /// # Panics
    /// If `width` is smaller than the operand's width.
    pub fn sign_extend(&mut self, a: &SVal, width: u32) -> Result<SVal, IrError> {
        let src = Self::expect_bv("sign_extend", a)?;
        assert!(
            width >= src,
            "sign_extend: target width {width} is smaller than source width {src} ({})",
            a.kind()
        );
        if width == src {
            return Ok(a.clone());
        }
        self.unary(Op::SignExtend(width - src), a, a.kind().with_width(width))
    }

    /// Bits `hi..=lo` as an unsigned vector.
    pub fn extract(&mut self, a: &SVal, hi: u32, lo: u32) -> Result<SVal, IrError> {
        let w = Self::expect_bv("extract", a)?;
        Self::expect("extract", a, lo <= hi && hi < w)?;
        if lo == 0 && hi + 1 == w && !a.kind().is_signed() {
            return Ok(a.clone());
        }
        self.unary(Op::Extract { hi, lo }, a, Kind::unsigned(hi - lo + 1))
    }

    pub fn test_bit(&mut self, a: &SVal, i: u32) -> Result<SVal, IrError> {
        let w = Self::expect_bv("test_bit", a)?;
        Self::expect("test_bit", a, i < w)?;
        self.unary(Op::TestBit(i), a, Kind::Bool)
    }

    /// Most significant bit; `false` for a zero-width vector.
    pub fn sign_bit(&mut self, a: &SVal) -> Result<SVal, IrError> {
        match Self::expect_bv("sign_bit", a)? {
            0 => Ok(self.bool(false)),
            w => self.test_bit(a, w - 1),
        }
    }

    pub fn umul_no_overflow(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("bvumul_noovfl", a, b)?;
        Self::expect_bv("bvumul_noovfl", a)?;
        self.binary(Op::UMulNoOverflow, a, b, Kind::Bool)
    }

    pub fn smul_no_overflow(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("bvsmul_noovfl", a, b)?;
        Self::expect_bv("bvsmul_noovfl", a)?;
        self.binary(Op::SMulNoOverflow, a, b, Kind::Bool)
    }

    pub fn smul_no_underflow(&mut self, a: &SVal, b: &SVal) -> Result<SVal, IrError> {
        Self::same_kind("bvsmul_noudfl", a, b)?;
        Self::expect_bv("bvsmul_noudfl", a)?;
        self.binary(Op::SMulNoUnderflow, a, b, Kind::Bool)
    }

    // ---- functions -------------------------------------------------------

    /// Apply the uninterpreted or named function `name`. The first
    /// application of an unknown name declares it as uninterpreted.
    pub fn apply(&mut self, name: &str, result: Kind, args: &[SVal]) -> Result<SVal, IrError> {
        let sig = FunctionSig {
            args: args.iter().map(|a| a.kind().clone()).collect(),
            result: result.clone(),
        };
        let known = self
            .user_functions
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.uninterpreted.borrow().get(name).cloned());
        match known {
            Some(declared) if declared != sig => {
                return Err(IrError::SignatureMismatch {
                    name: name.to_string(),
                    declared: declared.to_string(),
                    got: sig.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.uninterpreted.borrow_mut().insert(name.to_string(), sig);
            }
        }
        let domain = args.first().map(|a| a.kind().clone()).unwrap_or_else(|| result.clone());
        let nodes = args
            .iter()
            .map(|a| self.materialize(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.intern(Expr::new(Op::Apply(name.to_string()), domain, nodes), result))
    }

    /// Attach foreign code to an uninterpreted function.
    pub fn add_code_segment(&mut self, function: &str, lines: Vec<String>) {
        self.code_segments.push(CodeSegment {
            function: function.to_string(),
            lines,
        });
    }

    pub fn user_function(&self, name: &str) -> Option<FunctionSig> {
        self.user_functions.borrow().get(name).cloned()
    }

    pub fn uninterpreted(&self, name: &str) -> Option<FunctionSig> {
        self.uninterpreted.borrow().get(name).cloned()
    }

    /// Drop `name` from the uninterpreted functions, returning its signature.
    pub fn forget_uninterpreted(&self, name: &str) -> Option<FunctionSig> {
        self.uninterpreted.borrow_mut().remove(name)
    }

    // ---- tables and arrays -----------------------------------------------

    /// `entries[index]`, or `default` when out of range. A symbolic index
    /// builds a lookup table.
    pub fn lookup(&mut self, entries: &[SVal], index: &SVal, default: &SVal) -> Result<SVal, IrError> {
        Self::expect("lookup", index, index.kind().is_bit_vec() || *index.kind() == Kind::Int)?;
        if let Some(bad) = entries.iter().find(|e| e.kind() != default.kind()) {
            return Err(IrError::TableKind {
                len: entries.len(),
                elem: bad.kind().clone(),
                default: default.kind().clone(),
            });
        }
        if let Some(i) = index.as_int() {
            let picked = i.to_usize().and_then(|i| entries.get(i));
            return Ok(picked.unwrap_or(default).clone());
        }
        let id = self.table_ids.get();
        self.table_ids.set(id + 1);
        let nodes = entries
            .iter()
            .map(|e| self.materialize(e))
            .collect::<Result<Vec<_>, _>>()?;
        self.tables.push(Table {
            id,
            index: index.kind().clone(),
            elem: default.kind().clone(),
            entries: nodes,
        });
        let args = vec![self.materialize(index)?, self.materialize(default)?];
        Ok(self.intern(Expr::new(Op::Table(id), index.kind().clone(), args), default.kind().clone()))
    }

    pub fn new_array(&mut self, name: &str, key: Kind, value: Kind) -> SVal {
        let id = self.array_ids.get();
        self.array_ids.set(id + 1);
        self.arrays.push(ArrayDecl {
            id,
            name: name.to_string(),
            key: key.clone(),
            value: value.clone(),
        });
        let kind = Kind::Array(Box::new(key), Box::new(value));
        self.intern(Expr::new(Op::ArrayRef(id), kind.clone(), vec![]), kind)
    }

    pub fn select(&mut self, array: &SVal, index: &SVal) -> Result<SVal, IrError> {
        let Kind::Array(key, value) = array.kind() else {
            return Err(IrError::InvalidOperand {
                op: "select".to_string(),
                kind: array.kind().clone(),
            });
        };
        if **key != *index.kind() {
            return Err(IrError::KindMismatch {
                op: "select".to_string(),
                left: (**key).clone(),
                right: index.kind().clone(),
            });
        }
        let value = (**value).clone();
        self.binary(Op::Select, array, index, value)
    }

    // ---- session effects -------------------------------------------------

    fn labelled(&mut self, label: &str, v: &SVal) -> Result<Labelled, IrError> {
        Ok(Labelled {
            label: label.to_string(),
            node: self.materialize(v)?,
        })
    }

    /// Record `v` for display in counter-models.
    pub fn observe(&mut self, name: &str, v: &SVal) -> Result<(), IrError> {
        let l = self.labelled(name, v)?;
        self.observables.push(l);
        Ok(())
    }

    /// Add a hard constraint to the session. A constant `true` is dropped.
    pub fn constrain(&mut self, label: &str, cond: &SVal) -> Result<(), IrError> {
        Self::expect("constrain", cond, cond.kind().is_bool())?;
        if cond.as_bool() == Some(true) {
            return Ok(());
        }
        let l = self.labelled(label, cond)?;
        self.constraints.push(l);
        Ok(())
    }

    /// Record a proof obligation. A constant `true` is dropped.
    pub fn sassert(&mut self, label: &str, cond: &SVal) -> Result<(), IrError> {
        Self::expect("sassert", cond, cond.kind().is_bool())?;
        if cond.as_bool() == Some(true) {
            return Ok(());
        }
        let l = self.labelled(label, cond)?;
        self.assertions.push(l);
        Ok(())
    }

    /// Mark `v` as a result of this scope.
    pub fn add_output(&mut self, v: &SVal) -> Result<NodeId, IrError> {
        let node = self.materialize(v)?;
        self.outputs.push(node);
        Ok(node)
    }

    // ---- session-wide registries -----------------------------------------

    /// Register a named definition and make its name callable.
    pub fn register_definition(&self, sig: FunctionSig, decl: Rc<dyn Declaration>) {
        self.user_functions
            .borrow_mut()
            .insert(decl.name().to_string(), sig);
        self.definitions.borrow_mut().push(decl);
    }

    pub fn definitions(&self) -> Vec<Rc<dyn Declaration>> {
        self.definitions.borrow().clone()
    }

    pub fn add_axiom(&self, text: String) {
        self.axioms.borrow_mut().push(text);
    }

    pub fn axioms(&self) -> Vec<String> {
        self.axioms.borrow().clone()
    }

    /// Everything the session has to declare before its queries: options,
    /// uninterpreted functions without a definition, named definitions and
    /// axioms, in that order.
    pub fn declarations(&self) -> Vec<String> {
        let mut out = self.config.set_option_lines();
        let defined: BTreeSet<String> = self
            .definitions
            .borrow()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        for (name, sig) in self.uninterpreted.borrow().iter() {
            if !defined.contains(name) {
                out.push(sig.smt_declare(name));
            }
        }
        out.extend(self.definitions.borrow().iter().map(|d| d.render()));
        out.extend(self.axioms.borrow().iter().cloned());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_bool_literals() {
        let mut ctx = Context::default();
        assert_eq!(ctx.materialize(&ctx.bool(false)).unwrap(), NodeId::FALSE);
        assert_eq!(ctx.materialize(&ctx.bool(true)).unwrap(), NodeId::TRUE);
        assert_eq!(ctx.node_count(), 2);
    }

    #[test]
    fn structurally_identical_nodes_are_shared() {
        let mut ctx = Context::default();
        let k = Kind::unsigned(8);
        let x = ctx.forall("x", k.clone());
        let y = ctx.forall("y", k.clone());
        let a = ctx.add(&x, &y).unwrap();
        let b = ctx.add(&x, &y).unwrap();
        let c = ctx.add(&y, &x).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c, "commuted operands are a different node");
        assert_eq!(ctx.assignments().len(), 2);
    }

    #[test]
    fn concrete_operands_fold() {
        let mut ctx = Context::default();
        let k = Kind::signed(8);
        let a = ctx.bv(&k, 100);
        let b = ctx.bv(&k, 100);
        let s = ctx.add(&a, &b).unwrap();
        assert_eq!(s.as_int(), Some(&BigInt::from(-56)));
        assert!(ctx.assignments().is_empty());
    }

    #[test]
    fn boolean_constants_absorb() {
        let mut ctx = Context::default();
        let p = ctx.forall("p", Kind::Bool);
        let f = ctx.bool(false);
        let t = ctx.bool(true);
        assert_eq!(ctx.and(&p, &f).unwrap().as_bool(), Some(false));
        assert_eq!(ctx.or(&t, &p).unwrap().as_bool(), Some(true));
        assert_eq!(ctx.or(&f, &p).unwrap(), p);
        assert!(ctx.assignments().is_empty());
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let mut ctx = Context::default();
        let x = ctx.forall("x", Kind::unsigned(8));
        let y = ctx.forall("y", Kind::unsigned(16));
        let err = ctx.add(&x, &y).unwrap_err();
        assert!(matches!(err, IrError::KindMismatch { .. }), "{err}");
    }

    #[test]
    #[should_panic(expected = "smaller than source width")]
    fn narrowing_extension_panics() {
        let mut ctx = Context::default();
        let x = ctx.forall("x", Kind::unsigned(8));
        let _ = ctx.zero_extend(&x, 4);
    }

    #[test]
    fn values_from_another_scope_are_rejected() {
        let mut outer = Context::default();
        let x = outer.forall("x", Kind::Int);
        let mut inner = outer.derive(1, |_| FieldPolicy::Fresh);
        let err = inner.neg(&x).unwrap_err();
        assert!(matches!(err, IrError::ForeignValue { .. }), "{err}");
    }

    #[test]
    fn concrete_lookup_picks_entry_or_default() {
        let mut ctx = Context::default();
        let k = Kind::unsigned(8);
        let entries = vec![ctx.bv(&k, 10), ctx.bv(&k, 20)];
        let dflt = ctx.bv(&k, 0);
        let i = ctx.bv(&Kind::unsigned(4), 1);
        assert_eq!(ctx.lookup(&entries, &i, &dflt).unwrap().as_int(), Some(&BigInt::from(20)));
        let i = ctx.bv(&Kind::unsigned(4), 9);
        assert_eq!(ctx.lookup(&entries, &i, &dflt).unwrap().as_int(), Some(&BigInt::from(0)));
        let sym = ctx.forall("i", Kind::unsigned(4));
        ctx.lookup(&entries, &sym, &dflt).unwrap();
        assert_eq!(ctx.finish().tables.len(), 1);
    }

    #[test]
    fn apply_checks_signatures() {
        let mut ctx = Context::default();
        let x = ctx.forall("x", Kind::Int);
        ctx.apply("f", Kind::Bool, &[x.clone()]).unwrap();
        let err = ctx.apply("f", Kind::Int, &[x]).unwrap_err();
        assert!(matches!(err, IrError::SignatureMismatch { .. }), "{err}");
        assert_eq!(ctx.declarations(), vec!["(declare-fun f (Int) Bool)".to_string()]);
    }

    #[test]
    fn trace_kinds_cover_the_scope_only() {
        let mut parent = Context::default();
        parent.forall("n", Kind::Int);
        let mut child = parent.derive(1, |_| FieldPolicy::Fresh);
        child.forall("b", Kind::unsigned(8));
        let kinds: Vec<Kind> = child.finish().kinds.into_iter().collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&Kind::Bool));
        assert!(kinds.contains(&Kind::unsigned(8)));
    }

    #[test]
    #[should_panic(expected = "expected a bit-vector kind")]
    fn bit_vector_literals_need_a_bit_vector_kind() {
        let ctx = Context::default();
        ctx.bv(&Kind::Int, 3);
    }
}
