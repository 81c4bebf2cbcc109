//! Oryx specification AST
//!
//! Defines the expression and predicate trees produced by the contract and
//! test-specification parsers, the candidate-value model used to generate
//! argument combinations, and the goal/test-specification aggregates.
//! Everything here is immutable data; evaluation lives in
//! `oryx-interpreter` and `oryx-oracle`.

// Re-export common types for use by other crates
pub use oryx_lexer::Span;
pub use smol_str::SmolStr;

mod value;

pub use value::{ObjectRef, Value, EPSILON};

// ============================================================================
// Operand expressions
// ============================================================================

/// Identity of an `old(...)` wrapper node.
///
/// The parser hands out one id per parsed wrapper; a wrapper shared between
/// two predicate positions keeps its single id and therefore its single
/// cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OldId(pub u32);

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl std::fmt::Display for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Pow => "^",
        };
        write!(f, "{}", s)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// A node in the arithmetic/reference expression tree.
///
/// Evaluating an operand never mutates target state. The `Old` wrapper
/// snapshots its inner value once per lookup context, keyed by [`OldId`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal constant
    Const(Value),

    /// Named variable (call argument or local)
    Var(SmolStr),

    /// Dot-qualified field reference, resolved lazily at evaluation time
    Field(SmolStr),

    /// The guarded call's return value
    Result,

    /// `old(expr)`: value the inner expression had before the guarded call
    Old { id: OldId, inner: Box<Operand> },

    /// Binary arithmetic
    Binary {
        op: ArithOp,
        lhs: Box<Operand>,
        rhs: Box<Operand>,
    },

    /// Natural logarithm, always real-valued
    Log(Box<Operand>),

    /// Base-10 logarithm, always real-valued
    Log10(Box<Operand>),

    /// Call of a side-effect-free function in the target environment
    Call { name: SmolStr, args: Vec<Operand> },
}

impl Operand {
    /// Does this subtree contain an `old(...)` wrapper?
    pub fn contains_old(&self) -> bool {
        let mut found = Vec::new();
        self.collect_old(&mut found);
        !found.is_empty()
    }

    /// Collect references to every `Old` wrapper in this subtree.
    pub fn collect_old<'a>(&'a self, out: &mut Vec<&'a Operand>) {
        match self {
            Operand::Old { inner, .. } => {
                out.push(self);
                inner.collect_old(out);
            }
            Operand::Binary { lhs, rhs, .. } => {
                lhs.collect_old(out);
                rhs.collect_old(out);
            }
            Operand::Log(inner) | Operand::Log10(inner) => inner.collect_old(out),
            Operand::Call { args, .. } => {
                for arg in args {
                    arg.collect_old(out);
                }
            }
            Operand::Const(_) | Operand::Var(_) | Operand::Field(_) | Operand::Result => {}
        }
    }
}

// ============================================================================
// Contract predicates
// ============================================================================

/// A node in the boolean contract-predicate tree.
///
/// `And`/`Or` compose predicates within one specification; composing a
/// derived specification with its base happens through the [`Contract`]
/// chain instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The tagged empty link: vacuously true for `holds_all`, skipped by
    /// `holds_any`
    Empty,

    /// Comparison of two operands
    Cmp {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },

    /// `x within lo, hi`: inclusive interval membership
    Within {
        value: Operand,
        low: Operand,
        high: Operand,
    },

    /// `x within c +- d`: membership in `[c-d, c+d]`
    WithinDelta {
        value: Operand,
        center: Operand,
        delta: Operand,
    },

    /// Emptiness check
    IsEmpty(Operand),

    /// Non-emptiness check
    NotEmpty(Operand),

    /// Runtime type check against a (possibly qualified) type name
    InstanceOf {
        value: Operand,
        class_name: SmolStr,
    },

    /// Full-string regex match on the operand's string form
    Matches { value: Operand, pattern: SmolStr },

    /// Forward to an externally registered predicate; `value` is the
    /// checked subject, typically the object under test
    Satisfies {
        value: Operand,
        name: SmolStr,
        args: Vec<Operand>,
    },

    /// Conjunction
    And(Box<Predicate>, Box<Predicate>),

    /// Disjunction
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Is this the tagged empty link?
    pub fn is_empty_link(&self) -> bool {
        matches!(self, Predicate::Empty)
    }

    /// Collect references to every `Old` wrapper anywhere in this
    /// predicate's operand subtrees.
    pub fn collect_old<'a>(&'a self, out: &mut Vec<&'a Operand>) {
        match self {
            Predicate::Empty => {}
            Predicate::Cmp { lhs, rhs, .. } => {
                lhs.collect_old(out);
                rhs.collect_old(out);
            }
            Predicate::Within { value, low, high } => {
                value.collect_old(out);
                low.collect_old(out);
                high.collect_old(out);
            }
            Predicate::WithinDelta {
                value,
                center,
                delta,
            } => {
                value.collect_old(out);
                center.collect_old(out);
                delta.collect_old(out);
            }
            Predicate::IsEmpty(op) | Predicate::NotEmpty(op) => op.collect_old(out),
            Predicate::InstanceOf { value, .. } => value.collect_old(out),
            Predicate::Matches { value, .. } => value.collect_old(out),
            Predicate::Satisfies { value, args, .. } => {
                value.collect_old(out);
                for arg in args {
                    arg.collect_old(out);
                }
            }
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_old(out);
                b.collect_old(out);
            }
        }
    }
}

/// A contract: one predicate plus the linearized chain of predicates
/// inherited from base specifications.
///
/// The chain is walked in order by `holds_all`/`holds_any` (own predicate
/// first, then each inherited link). Links are never removed; an absent
/// check is represented by [`Predicate::Empty`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contract {
    links: Vec<Predicate>,
}

impl Contract {
    /// Contract with a single (possibly empty) predicate and no inherited
    /// links.
    pub fn new(own: Predicate) -> Self {
        Self { links: vec![own] }
    }

    /// Contract whose only link is empty.
    pub fn empty() -> Self {
        Self::new(Predicate::Empty)
    }

    /// Append the links of an inherited base contract after this one's.
    pub fn inherit(mut self, base: Contract) -> Self {
        self.links.extend(base.links);
        self
    }

    /// The chain, own predicate first.
    pub fn links(&self) -> &[Predicate] {
        &self.links
    }

    /// True if every link is the empty predicate.
    pub fn is_empty(&self) -> bool {
        self.links.iter().all(Predicate::is_empty_link)
    }

    /// Collect `Old` wrappers from every non-empty link.
    pub fn collect_old<'a>(&'a self, out: &mut Vec<&'a Operand>) {
        for link in &self.links {
            if !link.is_empty_link() {
                link.collect_old(out);
            }
        }
    }
}

// ============================================================================
// Candidate values and argument combinations
// ============================================================================

/// Ordered, possibly-duplicate candidate values for one argument position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSet {
    values: Vec<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn add(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn add_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// The common type name of all elements, or `None` when the set is
    /// empty or heterogeneous.
    pub fn common_type(&self) -> Option<&'static str> {
        let first = self.values.first()?.type_name();
        self.values
            .iter()
            .all(|v| v.type_name() == first)
            .then_some(first)
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// An ordered sequence of value sets, one per parameter slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgumentList {
    slots: Vec<ValueSet>,
}

impl ArgumentList {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn from_slots(slots: Vec<ValueSet>) -> Self {
        Self { slots }
    }

    pub fn push(&mut self, set: ValueSet) {
        self.slots.push(set);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ValueSet] {
        &self.slots
    }

    /// Number of argument tuples `expand` will produce: the product of the
    /// per-slot cardinalities, 1 for an empty list.
    pub fn combination_count(&self) -> usize {
        self.slots.iter().map(ValueSet::len).product()
    }

    /// Iterate over concrete argument tuples in odometer order: the last
    /// slot varies fastest.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations::new(&self.slots)
    }

    /// The full Cartesian product of candidate values.
    ///
    /// An empty list yields exactly one empty tuple: a call with no
    /// arguments is itself one combination.
    pub fn expand(&self) -> Vec<Vec<Value>> {
        self.combinations().collect()
    }
}

/// Lazy odometer iterator over the Cartesian product of an argument list.
#[derive(Debug)]
pub struct Combinations<'a> {
    slots: &'a [ValueSet],
    indices: Vec<usize>,
    done: bool,
}

impl<'a> Combinations<'a> {
    fn new(slots: &'a [ValueSet]) -> Self {
        // A slot with no candidates makes the whole product empty.
        let done = slots.iter().any(ValueSet::is_empty);
        Self {
            slots,
            indices: vec![0; slots.len()],
            done,
        }
    }
}

impl<'a> Iterator for Combinations<'a> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tuple: Vec<Value> = self
            .slots
            .iter()
            .zip(&self.indices)
            .map(|(set, &i)| set.values()[i].clone())
            .collect();

        // Advance the odometer, rightmost digit first.
        let mut pos = self.slots.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.slots[pos].len() {
                break;
            }
            self.indices[pos] = 0;
        }

        Some(tuple)
    }
}

// ============================================================================
// Goals and the test-specification aggregate
// ============================================================================

/// A single pass/fail oracle attached to a parameterized invocation.
///
/// These are the parsed forms; checking lives in `oryx-oracle`.
#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    /// Relate the call result to every candidate in a value set under one
    /// operator
    Compare { op: CmpOp, candidates: ValueSet },

    /// Full-string regex match on the result's string form
    Match { pattern: SmolStr },

    /// Numeric result within `[low, high]`; bounds may be late-bound field
    /// references
    Within { low: Operand, high: Operand },

    /// Numeric result within `[center-delta, center+delta]`
    WithinDelta { center: Operand, delta: Operand },

    /// A fault of one of the named classes was raised
    Throws { class_names: Vec<SmolStr> },

    /// No fault was raised
    NoThrows,

    /// Forward result and arguments to an externally registered predicate
    Satisfies { name: SmolStr, args: Vec<Operand> },

    /// Free-memory growth across the call stays within the given bound
    Memory { max_growth: u64 },
}

/// A parsed test specification: argument lists for target construction and
/// for the call itself, plus the goals to check. Read-only after parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestSpec {
    pub env_args: Vec<ArgumentList>,
    pub call_args: Vec<ArgumentList>,
    pub goals: Vec<Goal>,
}

impl TestSpec {
    /// All concrete call-argument tuples: the expansions of each
    /// alternative argument list, in specification order.
    pub fn call_argument_combinations(&self) -> Vec<Vec<Value>> {
        self.call_args
            .iter()
            .flat_map(ArgumentList::expand)
            .collect()
    }

    /// All concrete target-construction tuples.
    pub fn env_argument_combinations(&self) -> Vec<Vec<Value>> {
        self.env_args
            .iter()
            .flat_map(ArgumentList::expand)
            .collect()
    }
}
