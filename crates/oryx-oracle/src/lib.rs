//! Goal checking for Oryx test specifications.
//!
//! A [`GoalCheck`] wraps one parsed [`Goal`] for one invocation of the
//! target method: `pre_check` runs before the call, `post_check` after,
//! given the call's result or the fault it raised. An [`Oracle`] bundles
//! the goal checks of a whole test specification and rolls their outcomes
//! into [`Verdict`]s.

use std::cmp::Ordering;

use oryx_ast::{CmpOp, Goal, SmolStr, Value};
use oryx_interpreter::{
    compare_numeric, evaluate, full_match_regex, values_equal, within_delta, EvalError,
    LookupContext, PredicateRegistry, Result,
};

/// Package prepended to bare fault names, so `throws ArithmeticException`
/// also matches `java.lang.ArithmeticException`.
pub const BUILTIN_FAULT_PACKAGE: &str = "java.lang";

/// A fault raised by the guarded call, captured as data.
///
/// Faults never propagate through the interpreter's control flow; the
/// invocation driver hands them to `post_check` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub class_name: SmolStr,
    pub message: String,
}

impl Fault {
    pub fn new(class_name: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// Does this fault's class match the given name? Bare names also match
    /// with the builtin package prepended.
    pub fn matches_class(&self, name: &str) -> bool {
        if self.class_name == name {
            return true;
        }
        !name.contains('.') && self.class_name == format!("{}.{}", BUILTIN_FAULT_PACKAGE, name)
    }
}

/// Outcome of one goal check.
///
/// `Error` means the check failed to run; it is never conflated with a
/// check that ran and was violated.
#[derive(Debug, Clone)]
pub enum Verdict {
    Holds,
    Violated(String),
    Error(EvalError),
}

impl Verdict {
    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Holds)
    }
}

/// One goal, armed for one invocation of the target method.
///
/// Checks are stateless across invocations except for the memory goal,
/// which records the pre-call free-memory snapshot here.
pub struct GoalCheck<'a> {
    goal: &'a Goal,
    mem_before: Option<u64>,
}

impl<'a> GoalCheck<'a> {
    pub fn new(goal: &'a Goal) -> Self {
        Self {
            goal,
            mem_before: None,
        }
    }

    pub fn goal(&self) -> &'a Goal {
        self.goal
    }

    /// Run before the invocation. Most goals have nothing to do here; the
    /// memory goal snapshots free memory.
    pub fn pre_check(&mut self, ctx: &mut LookupContext) -> Result<bool> {
        if let Goal::Memory { .. } = self.goal {
            self.mem_before = Some(ctx.state().free_memory());
        }
        Ok(true)
    }

    /// Run after the invocation, given the result value or the captured
    /// fault.
    pub fn post_check(
        &mut self,
        ctx: &mut LookupContext,
        result: Option<&Value>,
        fault: Option<&Fault>,
        predicates: &mut PredicateRegistry,
    ) -> Result<bool> {
        match self.goal {
            Goal::Compare { op, candidates } => {
                let result = result.cloned().unwrap_or(Value::Null);
                check_compare(*op, &result, candidates.values(), ctx)
            }

            Goal::Match { pattern } => {
                let result = result.cloned().unwrap_or(Value::Null);
                let re = full_match_regex(pattern)?;
                Ok(re.is_match(&result.string_form()))
            }

            Goal::Within { low, high } => {
                let result = numeric_result(result)?;
                let lo = evaluate(low, ctx)?;
                let hi = evaluate(high, ctx)?;
                Ok(compare_numeric(&result, &lo)? != Ordering::Less
                    && compare_numeric(&result, &hi)? != Ordering::Greater)
            }

            Goal::WithinDelta { center, delta } => {
                let result = numeric_result(result)?;
                let c = evaluate(center, ctx)?;
                let d = evaluate(delta, ctx)?;
                within_delta(&result, &c, &d)
            }

            Goal::Throws { class_names } => Ok(match fault {
                Some(fault) => class_names.iter().any(|name| fault.matches_class(name)),
                None => false,
            }),

            Goal::NoThrows => Ok(fault.is_none()),

            Goal::Satisfies { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(evaluate(arg, ctx)?);
                }
                let test_object = ctx.state().test_object();
                let violation = predicates.check(name, test_object.as_ref(), &values)?;
                Ok(violation.is_none())
            }

            Goal::Memory { max_growth } => {
                let before = self.mem_before.ok_or_else(|| EvalError::TypeMismatch {
                    message: "memory goal checked without a pre-call snapshot".to_string(),
                })?;
                let growth = before.saturating_sub(ctx.state().free_memory());
                Ok(growth <= *max_growth)
            }
        }
    }
}

/// Relate a result to every candidate under one operator.
///
/// `==` succeeds when any candidate equals the result; `!=` only when none
/// does. Ordering operators require the result and every candidate to be
/// numeric and the relation to hold against all candidates.
fn check_compare(
    op: CmpOp,
    result: &Value,
    candidates: &[Value],
    ctx: &LookupContext,
) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(candidates
            .iter()
            .any(|candidate| values_equal(result, candidate, ctx.state()))),
        CmpOp::Ne => Ok(!candidates
            .iter()
            .any(|candidate| values_equal(result, candidate, ctx.state()))),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            if !result.is_number() {
                return Err(EvalError::TypeMismatch {
                    message: format!(
                        "ordering goal requires a numeric result, got {}",
                        result.type_name()
                    ),
                });
            }
            for candidate in candidates {
                let ord = compare_numeric(result, candidate)?;
                let related = match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                    CmpOp::Eq | CmpOp::Ne => unreachable!(),
                };
                if !related {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn numeric_result(result: Option<&Value>) -> Result<Value> {
    let value = result.ok_or(EvalError::ResultUnavailable)?;
    if !value.is_number() {
        return Err(EvalError::TypeMismatch {
            message: format!("within goal requires a numeric result, got {}", value.type_name()),
        });
    }
    Ok(value.clone())
}

/// The goal checks of one test specification, armed for one invocation.
pub struct Oracle<'a> {
    checks: Vec<GoalCheck<'a>>,
}

impl<'a> Oracle<'a> {
    pub fn new(goals: &'a [Goal]) -> Self {
        Self {
            checks: goals.iter().map(GoalCheck::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every goal's pre-invocation step. The conjunction of their
    /// outcomes gates the invocation.
    pub fn pre_check_all(&mut self, ctx: &mut LookupContext) -> Result<bool> {
        for check in &mut self.checks {
            if !check.pre_check(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run every goal's post-invocation step, producing one verdict per
    /// goal. A violated `satisfies` goal carries the external predicate's
    /// message.
    pub fn post_check_all(
        &mut self,
        ctx: &mut LookupContext,
        result: Option<&Value>,
        fault: Option<&Fault>,
        predicates: &mut PredicateRegistry,
    ) -> Vec<Verdict> {
        self.checks
            .iter_mut()
            .map(|check| match check.post_check(ctx, result, fault, predicates) {
                Ok(true) => Verdict::Holds,
                Ok(false) => {
                    let message = match check.goal() {
                        Goal::Satisfies { name, .. } => predicates
                            .last_violation()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("satisfies {} failed", name)),
                        other => describe(other),
                    };
                    Verdict::Violated(message)
                }
                Err(e) => Verdict::Error(e),
            })
            .collect()
    }
}

/// Overall verdict of an invocation: the conjunction of all goal verdicts.
pub fn overall(verdicts: &[Verdict]) -> bool {
    verdicts.iter().all(Verdict::holds)
}

fn describe(goal: &Goal) -> String {
    match goal {
        Goal::Compare { op, candidates } => {
            let values: Vec<String> = candidates.iter().map(Value::to_string).collect();
            format!("result {} {}", op, values.join("|"))
        }
        Goal::Match { pattern } => format!("result matches \"{}\"", pattern),
        Goal::Within { .. } => "result within bounds".to_string(),
        Goal::WithinDelta { .. } => "result within tolerance".to_string(),
        Goal::Throws { class_names } => format!("throws {}", class_names.join("|")),
        Goal::NoThrows => "noThrows".to_string(),
        Goal::Satisfies { name, .. } => format!("satisfies {}", name),
        Goal::Memory { max_growth } => format!("memory growth <= {}", max_growth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oryx_ast::ValueSet;

    struct BareState;

    impl oryx_interpreter::TargetState for BareState {
        fn local(&self, _name: &str) -> Option<Value> {
            None
        }
        fn field(&self, _name: &str) -> Option<Value> {
            None
        }
        fn qualified_field(&self, _q: &str, _i: Option<&Value>) -> Option<Value> {
            None
        }
        fn return_value(&self) -> Option<Value> {
            None
        }
    }

    fn run_post(goal: &Goal, result: Option<&Value>, fault: Option<&Fault>) -> Result<bool> {
        let state = BareState;
        let mut ctx = LookupContext::post_pre_exec(&state).into_post_exec(result.cloned());
        let mut predicates = PredicateRegistry::new();
        GoalCheck::new(goal).post_check(&mut ctx, result, fault, &mut predicates)
    }

    fn compare_goal(op: CmpOp, candidates: &[i64]) -> Goal {
        Goal::Compare {
            op,
            candidates: candidates.iter().map(|&n| Value::Int(n)).collect::<ValueSet>(),
        }
    }

    #[test]
    fn test_compare_eq_succeeds_on_any_candidate() {
        let goal = compare_goal(CmpOp::Eq, &[1, 2, 3]);
        assert!(run_post(&goal, Some(&Value::Int(2)), None).unwrap());
        assert!(!run_post(&goal, Some(&Value::Int(4)), None).unwrap());
    }

    #[test]
    fn test_compare_ne_requires_no_candidate_to_match() {
        let goal = compare_goal(CmpOp::Ne, &[1, 2, 3]);
        assert!(run_post(&goal, Some(&Value::Int(4)), None).unwrap());
        assert!(!run_post(&goal, Some(&Value::Int(2)), None).unwrap());
    }

    #[test]
    fn test_compare_ordering_requires_all_candidates() {
        let goal = compare_goal(CmpOp::Lt, &[5, 6, 7]);
        assert!(run_post(&goal, Some(&Value::Int(4)), None).unwrap());
        assert!(!run_post(&goal, Some(&Value::Int(6)), None).unwrap());
    }

    #[test]
    fn test_compare_ordering_rejects_non_numeric_result() {
        let goal = compare_goal(CmpOp::Lt, &[5]);
        let err = run_post(&goal, Some(&Value::Str("x".into())), None).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_throws_matches_bare_builtin_name() {
        let goal = Goal::Throws {
            class_names: vec!["ArithmeticException".into()],
        };
        let fault = Fault::new("java.lang.ArithmeticException", "/ by zero");
        assert!(run_post(&goal, None, Some(&fault)).unwrap());

        let other = Fault::new("java.io.IOException", "broken pipe");
        assert!(!run_post(&goal, None, Some(&other)).unwrap());
        assert!(!run_post(&goal, None, None).unwrap());
    }

    #[test]
    fn test_throws_matches_qualified_name_exactly() {
        let goal = Goal::Throws {
            class_names: vec!["java.io.IOException".into()],
        };
        let fault = Fault::new("java.io.IOException", "broken pipe");
        assert!(run_post(&goal, None, Some(&fault)).unwrap());
    }

    #[test]
    fn test_no_throws() {
        assert!(run_post(&Goal::NoThrows, Some(&Value::Int(1)), None).unwrap());
        let fault = Fault::new("java.lang.ArithmeticException", "/ by zero");
        assert!(!run_post(&Goal::NoThrows, None, Some(&fault)).unwrap());
    }

    #[test]
    fn test_match_goal_is_full_match() {
        let goal = Goal::Match {
            pattern: "4\\d".into(),
        };
        assert!(run_post(&goal, Some(&Value::Int(42)), None).unwrap());
        assert!(!run_post(&goal, Some(&Value::Int(420)), None).unwrap());
    }

    #[test]
    fn test_memory_goal_bounds_growth() {
        struct MemState(std::cell::Cell<u64>);
        impl oryx_interpreter::TargetState for MemState {
            fn local(&self, _name: &str) -> Option<Value> {
                None
            }
            fn field(&self, _name: &str) -> Option<Value> {
                None
            }
            fn qualified_field(&self, _q: &str, _i: Option<&Value>) -> Option<Value> {
                None
            }
            fn return_value(&self) -> Option<Value> {
                None
            }
            fn free_memory(&self) -> u64 {
                self.0.get()
            }
        }

        let state = MemState(std::cell::Cell::new(10_000));
        let goal = Goal::Memory { max_growth: 500 };
        let mut check = GoalCheck::new(&goal);
        let mut predicates = PredicateRegistry::new();

        let mut pre = LookupContext::post_pre_exec(&state);
        assert!(check.pre_check(&mut pre).unwrap());

        // The call consumes 400 bytes: within bounds.
        state.0.set(9_600);
        let mut post = pre.into_post_exec(None);
        assert!(check.post_check(&mut post, None, None, &mut predicates).unwrap());

        // A second invocation consuming 1_000 bytes: out of bounds.
        let mut check = GoalCheck::new(&goal);
        let mut pre = LookupContext::post_pre_exec(&state);
        check.pre_check(&mut pre).unwrap();
        state.0.set(8_600);
        let mut post = pre.into_post_exec(None);
        assert!(!check.post_check(&mut post, None, None, &mut predicates).unwrap());
    }

    #[test]
    fn test_overall_is_a_conjunction() {
        assert!(overall(&[Verdict::Holds, Verdict::Holds]));
        assert!(!overall(&[Verdict::Holds, Verdict::Violated("x".into())]));
        assert!(!overall(&[Verdict::Error(EvalError::ResultUnavailable)]));
        assert!(overall(&[]));
    }
}
