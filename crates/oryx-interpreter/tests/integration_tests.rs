//! Integration tests for the Oryx evaluation engine.
//!
//! These tests verify end-to-end behavior of contract checks: from parsing
//! contract text through evaluation against a simulated target program.

use std::cell::RefCell;

use oryx_ast::Value;
use oryx_interpreter::{
    holds, holds_all, holds_any, save_old_values, EvalError, LookupContext, PredicateRegistry,
    TargetState,
};
use oryx_parser::{parse_contract, parse_predicate};
use rustc_hash::FxHashMap;

/// A mutable stand-in for the target program: locals and fields drift as
/// the "call" executes.
#[derive(Default)]
struct TestVm {
    locals: RefCell<FxHashMap<String, Value>>,
    fields: RefCell<FxHashMap<String, Value>>,
    result: RefCell<Option<Value>>,
}

impl TestVm {
    fn new() -> Self {
        Self::default()
    }

    fn set_local(&self, name: &str, value: Value) {
        self.locals.borrow_mut().insert(name.to_string(), value);
    }

    fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    fn set_result(&self, value: Value) {
        *self.result.borrow_mut() = Some(value);
    }
}

impl TargetState for TestVm {
    fn local(&self, name: &str) -> Option<Value> {
        self.locals.borrow().get(name).cloned()
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

fn check(source: &str, vm: &TestVm) -> Result<bool, EvalError> {
    let predicate = parse_predicate(source).expect("parse failed");
    let mut ctx = LookupContext::precondition(vm);
    let mut predicates = PredicateRegistry::new();
    holds(&predicate, &mut ctx, &mut predicates)
}

// ============================================================================
// Arithmetic round trips
// ============================================================================

mod arithmetic {
    use super::*;

    #[test]
    fn test_integer_expression_round_trip() {
        let vm = TestVm::new();
        assert!(check("3 + 4 * 2 == 11", &vm).unwrap());
        assert!(!check("3 + 4 * 2 == 14", &vm).unwrap());
    }

    #[test]
    fn test_real_promotion_round_trip() {
        let vm = TestVm::new();
        assert!(check("3.0 + 4 * 2 == 11.0", &vm).unwrap());
    }

    #[test]
    fn test_power_and_log() {
        let vm = TestVm::new();
        assert!(check("2 ^ 10 == 1024", &vm).unwrap());
        assert!(check("log10(100) == 2.0", &vm).unwrap());
        assert!(check("log(1) == 0.0", &vm).unwrap());
    }

    #[test]
    fn test_integer_division_truncates_toward_zero() {
        let vm = TestVm::new();
        assert!(check("7 / 2 == 3", &vm).unwrap());
        assert!(check("0 - 7 / 2 == 0 - 3", &vm).unwrap());
    }

    #[test]
    fn test_epsilon_tolerant_equality() {
        let vm = TestVm::new();
        // Far below the 1e-10 band: equal.
        assert!(check("1.0 + EPS / 100 == 1.0", &vm).unwrap());
        // Well above the band: ordered.
        assert!(check("1.0 + EPS * 100 > 1.0", &vm).unwrap());
    }
}

// ============================================================================
// Interval checks
// ============================================================================

mod intervals {
    use super::*;

    #[test]
    fn test_within_bounds() {
        let vm = TestVm::new();
        assert!(check("1 within 0, 2", &vm).unwrap());
        assert!(!check("1 within 5, 6", &vm).unwrap());
    }

    #[test]
    fn test_within_center_delta() {
        let vm = TestVm::new();
        assert!(check("5 within 5 +- 2", &vm).unwrap());
        assert!(!check("8 within 5 +- 2", &vm).unwrap());
    }

    #[test]
    fn test_within_promotes_to_real() {
        let vm = TestVm::new();
        assert!(check("5.5 within 5 +- 1", &vm).unwrap());
        assert!(!check("6.5 within 5 +- 1", &vm).unwrap());
    }
}

// ============================================================================
// Variables, fields and the call lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_variable_and_field_resolution() {
        let vm = TestVm::new();
        vm.set_local("amount", Value::Int(50));
        vm.set_field("acct.balance", Value::Int(100));

        let predicate = parse_predicate("acct.balance + amount == 150").expect("parse failed");
        let mut ctx = LookupContext::post_pre_exec(&vm);
        let mut predicates = PredicateRegistry::new();
        assert!(holds(&predicate, &mut ctx, &mut predicates).unwrap());
    }

    #[test]
    fn test_unresolved_reference_is_an_error_not_false() {
        let vm = TestVm::new();
        let err = check("ghost > 0", &vm).unwrap_err();
        assert!(matches!(err, EvalError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_result_unavailable_before_call() {
        let vm = TestVm::new();
        vm.set_result(Value::Int(5));

        // Even though the VM already has a return value, reading `return`
        // through a pre-execution context is a usage error.
        let predicate = parse_predicate("return == 5").expect("parse failed");
        let mut ctx = LookupContext::post_pre_exec(&vm);
        let mut predicates = PredicateRegistry::new();
        let err = holds(&predicate, &mut ctx, &mut predicates).unwrap_err();
        assert!(matches!(err, EvalError::ResultUnavailable));
    }

    #[test]
    fn test_old_value_survives_mutation() {
        let vm = TestVm::new();
        vm.set_local("balance", Value::Int(100));
        vm.set_local("amount", Value::Int(50));

        // Postcondition of a deposit: return == old(balance) + amount
        let contract = parse_contract("return == old(balance) + amount").expect("parse failed");

        // Before the call: capture old values.
        let mut pre = LookupContext::post_pre_exec(&vm);
        save_old_values(&contract, &mut pre).unwrap();

        // The call mutates the balance and produces its result.
        vm.set_local("balance", Value::Int(150));
        vm.set_result(Value::Int(150));

        // After the call: the capture must still see the pre-call balance.
        let mut post = pre.into_post_exec(None);
        let mut predicates = PredicateRegistry::new();
        assert!(holds_all(&contract, &mut post, &mut predicates).unwrap());
    }

    #[test]
    fn test_old_without_capture_falls_back_to_current_state() {
        let vm = TestVm::new();
        vm.set_local("x", Value::Int(1));
        vm.set_result(Value::Int(1));

        // No save_old_values pass: the first post-execution evaluation
        // takes the snapshot, and further mutation no longer matters.
        let contract = parse_contract("return == old(x)").expect("parse failed");
        let pre = LookupContext::post_pre_exec(&vm);
        let mut post = pre.into_post_exec(None);
        let mut predicates = PredicateRegistry::new();
        assert!(holds_all(&contract, &mut post, &mut predicates).unwrap());

        vm.set_local("x", Value::Int(99));
        assert!(holds_all(&contract, &mut post, &mut predicates).unwrap());
    }
}

// ============================================================================
// Contract chains
// ============================================================================

mod chains {
    use super::*;
    use oryx_ast::Contract;

    #[test]
    fn test_empty_link_is_neutral() {
        let vm = TestVm::new();
        vm.set_local("x", Value::Int(3));

        let derived = Contract::empty();
        let base = parse_contract("x > 0").expect("parse failed");
        let chain = derived.inherit(base);

        let mut predicates = PredicateRegistry::new();
        let mut ctx = LookupContext::precondition(&vm);
        assert!(holds_all(&chain, &mut ctx, &mut predicates).unwrap());
        let mut ctx = LookupContext::precondition(&vm);
        assert!(holds_any(&chain, &mut ctx, &mut predicates).unwrap());

        vm.set_local("x", Value::Int(-3));
        let mut ctx = LookupContext::precondition(&vm);
        assert!(!holds_all(&chain, &mut ctx, &mut predicates).unwrap());
        let mut ctx = LookupContext::precondition(&vm);
        assert!(!holds_any(&chain, &mut ctx, &mut predicates).unwrap());
    }

    #[test]
    fn test_derived_and_base_old_captures_share_one_context() {
        let vm = TestVm::new();
        vm.set_local("x", Value::Int(1));
        vm.set_local("y", Value::Int(2));

        let derived = parse_contract("old(x) == 1").expect("parse failed");
        let base = parse_contract("old(y) == 2").expect("parse failed");
        let chain = derived.inherit(base);

        let mut pre = LookupContext::post_pre_exec(&vm);
        save_old_values(&chain, &mut pre).unwrap();

        vm.set_local("x", Value::Int(10));
        vm.set_local("y", Value::Int(20));

        let mut post = pre.into_post_exec(None);
        let mut predicates = PredicateRegistry::new();
        assert!(holds_all(&chain, &mut post, &mut predicates).unwrap());
    }
}

// ============================================================================
// External predicates
// ============================================================================

mod satisfies {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_satisfies_routes_through_registry() {
        let vm = TestVm::new();
        vm.set_local("x", Value::Int(4));

        let predicate = parse_predicate("x satisfies even").expect("parse failed");
        let mut registry = PredicateRegistry::new();
        registry.register(
            "even",
            Rc::new(|subject: Option<&Value>, _args: &[Value]| match subject {
                Some(Value::Int(n)) if n % 2 == 0 => None,
                other => Some(format!("{other:?} is not an even integer")),
            }),
        );

        let mut ctx = LookupContext::precondition(&vm);
        assert!(holds(&predicate, &mut ctx, &mut registry).unwrap());

        vm.set_local("x", Value::Int(5));
        let mut ctx = LookupContext::precondition(&vm);
        assert!(!holds(&predicate, &mut ctx, &mut registry).unwrap());
        assert!(registry.last_violation().is_some());
    }

    #[test]
    fn test_unregistered_predicate_is_an_error() {
        let vm = TestVm::new();
        vm.set_local("x", Value::Int(4));
        let err = check("x satisfies unknownCheck", &vm).unwrap_err();
        assert!(matches!(err, EvalError::UnresolvedPredicate { .. }));
    }
}
