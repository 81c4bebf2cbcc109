//! Integration tests for the Oryx oracle layer.
//!
//! These tests drive the full flow of a test specification: parse, expand
//! argument combinations, simulate the guarded invocation and check every
//! goal against the outcome.

use std::cell::RefCell;
use std::rc::Rc;

use std::cell::Cell;

use oryx_ast::{ObjectRef, TestSpec, Value};
use oryx_interpreter::{adapt, LookupContext, PredicateRegistry, TargetState, TargetType};
use oryx_oracle::{overall, Fault, Oracle, Verdict};
use oryx_parser::{parse_test_spec, ParseError, PatternExpander, TargetBuilder};
use rustc_hash::FxHashMap;

/// Expands `lo-hi` integer range patterns such as `[1-3]`.
struct RangeExpander;

impl PatternExpander for RangeExpander {
    fn expand(&self, pattern: &str) -> Result<Vec<Value>, String> {
        let inner = pattern
            .strip_prefix('[')
            .and_then(|p| p.strip_suffix(']'))
            .ok_or_else(|| format!("unsupported pattern {pattern}"))?;
        let (lo, hi) = inner
            .split_once('-')
            .ok_or_else(|| format!("unsupported pattern {pattern}"))?;
        let lo: i64 = lo.trim().parse().map_err(|_| "bad bound".to_string())?;
        let hi: i64 = hi.trim().parse().map_err(|_| "bad bound".to_string())?;
        Ok((lo..=hi).map(Value::Int).collect())
    }
}

struct NoBuilder;

impl TargetBuilder for NoBuilder {
    fn instantiate(&self, class_name: &str, _args: &[Value]) -> Result<Value, String> {
        Err(format!("no constructor for {class_name}"))
    }

    fn field_value(&self, qualified: &str) -> Result<Value, String> {
        Err(format!("no field {qualified}"))
    }
}

fn parse(source: &str) -> TestSpec {
    parse_test_spec(source, &RangeExpander, &NoBuilder)
        .unwrap_or_else(|e| panic!("parse failed for `{source}`: {e}"))
}

/// Minimal target-program stand-in: fields plus a drifting result slot.
#[derive(Default)]
struct TestVm {
    fields: RefCell<FxHashMap<String, Value>>,
    result: RefCell<Option<Value>>,
}

impl TestVm {
    fn new() -> Self {
        Self::default()
    }

    fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl TargetState for TestVm {
    fn local(&self, _name: &str) -> Option<Value> {
        None
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    fn qualified_field(&self, qualified: &str, _instance: Option<&Value>) -> Option<Value> {
        self.fields.borrow().get(qualified).cloned()
    }

    fn return_value(&self) -> Option<Value> {
        self.result.borrow().clone()
    }
}

/// The "target method" under test: integer division, faulting on a zero
/// divisor the way the target environment would.
fn divide(args: &[Value]) -> Result<Value, Fault> {
    match args {
        [Value::Int(a), Value::Int(b)] => {
            if *b == 0 {
                Err(Fault::new("java.lang.ArithmeticException", "/ by zero"))
            } else {
                Ok(Value::Int(a / b))
            }
        }
        _ => Err(Fault::new(
            "java.lang.IllegalArgumentException",
            "expected two integers",
        )),
    }
}

/// Drive one parameterized invocation round: for every argument
/// combination, run the goal lifecycle and collect the overall verdict.
fn run_spec(spec: &TestSpec, vm: &TestVm, registry: &mut PredicateRegistry) -> Vec<bool> {
    let mut outcomes = Vec::new();
    for combination in spec.call_argument_combinations() {
        let mut oracle = Oracle::new(&spec.goals);

        let mut pre = LookupContext::post_pre_exec(vm);
        assert!(oracle.pre_check_all(&mut pre).unwrap());

        let (result, fault) = match divide(&combination) {
            Ok(value) => {
                *vm.result.borrow_mut() = Some(value.clone());
                (Some(value), None)
            }
            Err(fault) => {
                *vm.result.borrow_mut() = None;
                (None, Some(fault))
            }
        };

        let mut post = pre.into_post_exec(result.clone());
        let verdicts = oracle.post_check_all(&mut post, result.as_ref(), fault.as_ref(), registry);
        outcomes.push(overall(&verdicts));
    }
    outcomes
}

#[test]
fn test_combinations_drive_invocations_in_odometer_order() {
    let spec = parse("(6|8, 1|2) noThrows");
    let combos = spec.call_argument_combinations();
    assert_eq!(combos.len(), 4);
    assert_eq!(combos[0], vec![Value::Int(6), Value::Int(1)]);
    assert_eq!(combos[1], vec![Value::Int(6), Value::Int(2)]);
    assert_eq!(combos[2], vec![Value::Int(8), Value::Int(1)]);
    assert_eq!(combos[3], vec![Value::Int(8), Value::Int(2)]);
}

#[test]
fn test_compare_goal_over_all_combinations() {
    // 6/2 = 3 and 8/2 = 4: both results are in the candidate set.
    let spec = parse("(6|8, 2) == 3|4, noThrows");
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    let outcomes = run_spec(&spec, &vm, &mut registry);
    assert_eq!(outcomes, vec![true, true]);

    // 8/2 = 4 is not in {3}: second combination fails.
    let spec = parse("(6|8, 2) == 3");
    let outcomes = run_spec(&spec, &vm, &mut registry);
    assert_eq!(outcomes, vec![true, false]);
}

#[test]
fn test_throws_goal_with_bare_name() {
    let spec = parse("(1, 0) throws ArithmeticException");
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![true]);

    // The same fault does not satisfy noThrows.
    let spec = parse("(1, 0) noThrows");
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![false]);
}

#[test]
fn test_within_goal_with_late_bound_bounds() {
    let vm = TestVm::new();
    vm.set_field("limits.low", Value::Int(2));
    vm.set_field("limits.high", Value::Int(4));

    let spec = parse("(6, 2) within limits.low, limits.high");
    let mut registry = PredicateRegistry::new();
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![true]);

    // Tighten the bounds between rounds: the next round sees the change.
    vm.set_field("limits.high", Value::Int(2));
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![false]);
}

#[test]
fn test_within_delta_goal() {
    let spec = parse("(9, 2) within 5 +- 1");
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    // 9/2 = 4, inside [4, 6].
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![true]);

    let spec = parse("(14, 2) within 5 +- 1");
    // 14/2 = 7, outside.
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![false]);
}

#[test]
fn test_match_goal() {
    let spec = parse(r#"(84, 2) matches "4\d""#);
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![true]);
}

#[test]
fn test_pattern_expansion_feeds_combinations() {
    // [1-3] expands to three divisors.
    let spec = parse("(6, [1-3]) noThrows");
    let combos = spec.call_argument_combinations();
    assert_eq!(combos.len(), 3);
    assert_eq!(combos[2], vec![Value::Int(6), Value::Int(3)]);
}

#[test]
fn test_satisfies_goal_reports_violation_message() {
    let spec = parse("(7, 2) satisfies resultIsEven");
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    registry.register(
        "resultIsEven",
        Rc::new(|subject: Option<&Value>, _args: &[Value]| {
            // The goal forwards the test object; this VM has none, so the
            // check inspects nothing and reports a fixed violation.
            match subject {
                None => Some("no test object".to_string()),
                Some(_) => None,
            }
        }),
    );

    let mut oracle = Oracle::new(&spec.goals);
    let mut pre = LookupContext::post_pre_exec(&vm);
    oracle.pre_check_all(&mut pre).unwrap();
    let mut post = pre.into_post_exec(Some(Value::Int(3)));
    let verdicts = oracle.post_check_all(&mut post, Some(&Value::Int(3)), None, &mut registry);
    match &verdicts[0] {
        Verdict::Violated(message) => assert_eq!(message, "no test object"),
        other => panic!("expected violation, got {other:?}"),
    }
}

#[test]
fn test_goal_error_is_distinguishable_from_failure() {
    // Ordering goal against a non-numeric result: the check cannot run.
    let spec = parse(r#"(1, 0) >= 3"#);
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();

    let mut oracle = Oracle::new(&spec.goals);
    let mut pre = LookupContext::post_pre_exec(&vm);
    oracle.pre_check_all(&mut pre).unwrap();
    let mut post = pre.into_post_exec(None);
    let verdicts = oracle.post_check_all(
        &mut post,
        Some(&Value::Str("boom".into())),
        None,
        &mut registry,
    );
    assert!(matches!(verdicts[0], Verdict::Error(_)));
    assert!(!overall(&verdicts));
}

/// Builds `Point(x: int, y: int)` objects, fitting the parsed candidate
/// values to the constructor's parameter types through the coercion table.
struct PointBuilder {
    next_handle: Cell<u64>,
}

impl PointBuilder {
    fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
        }
    }
}

impl TargetBuilder for PointBuilder {
    fn instantiate(&self, class_name: &str, args: &[Value]) -> Result<Value, String> {
        if class_name != "Point" || args.len() != 2 {
            return Err(format!("no constructor {class_name}/{}", args.len()));
        }
        for arg in args {
            adapt(arg, &TargetType::Int).map_err(|e| e.to_string())?;
        }
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        Ok(Value::Object(ObjectRef::new("Point", handle)))
    }

    fn field_value(&self, qualified: &str) -> Result<Value, String> {
        Err(format!("no field {qualified}"))
    }
}

#[test]
fn test_object_arguments_are_built_through_the_coercion_table() {
    let builder = PointBuilder::new();
    let spec = parse_test_spec("(Point(1, 2.9))", &RangeExpander, &builder).expect("parse failed");
    let set = &spec.call_args[0].slots()[0];
    assert_eq!(set.len(), 1);
    match &set.values()[0] {
        Value::Object(obj) => assert_eq!(obj.class_name, "Point"),
        other => panic!("expected an object, got {other:?}"),
    }

    // A candidate the coercion table cannot fit is an instantiation error.
    let err = parse_test_spec("(Point(true, 2))", &RangeExpander, &builder).unwrap_err();
    assert!(matches!(err, ParseError::Instantiation { .. }));
}

#[test]
fn test_env_argument_combinations() {
    let spec = parse("this(1|2).(5, 1)");
    let env = spec.env_argument_combinations();
    assert_eq!(env, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
}

#[test]
fn test_spec_verdict_is_conjunction_of_goals() {
    // 7/2 = 3 truncated: == goal holds, but the regex goal wants two
    // digits and fails.
    let spec = parse(r#"(7, 2) == 3, matches "\d\d""#);
    let vm = TestVm::new();
    let mut registry = PredicateRegistry::new();
    assert_eq!(run_spec(&spec, &vm, &mut registry), vec![false]);
}
