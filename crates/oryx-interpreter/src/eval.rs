//! Tree-walking evaluation of operands and contract predicates.

use std::cmp::Ordering;

use oryx_ast::{ArithOp, CmpOp, Contract, Operand, Predicate, Value, EPSILON};
use regex::Regex;

use crate::{CacheKey, EvalError, LookupContext, PredicateRegistry, Result, TargetState};

// ============================================================================
// Operand evaluation
// ============================================================================

/// Evaluate an operand against a lookup context.
///
/// Never mutates target state. The only interpreter-side writes are cache
/// memoizations on the context, including the capture-once snapshot taken
/// by `old(...)` wrappers.
pub fn evaluate(operand: &Operand, ctx: &mut LookupContext) -> Result<Value> {
    match operand {
        Operand::Const(value) => Ok(value.clone()),
        Operand::Var(name) => ctx.get_value(name),
        Operand::Field(qualified) => ctx.field_value(qualified),
        Operand::Result => ctx.result_value(),
        Operand::Old { id, inner } => {
            let key = CacheKey::Old(*id);
            if let Some(snapshot) = ctx.lookup(&key) {
                return Ok(snapshot.clone());
            }
            let value = evaluate(inner, ctx)?;
            ctx.put(key, value.clone());
            Ok(value)
        }
        Operand::Binary { op, lhs, rhs } => {
            let left = evaluate(lhs, ctx)?;
            let right = evaluate(rhs, ctx)?;
            apply_arith(*op, left, right)
        }
        Operand::Log(inner) => {
            let value = evaluate(inner, ctx)?;
            Ok(Value::Real(require_real("log", &value)?.ln()))
        }
        Operand::Log10(inner) => {
            let value = evaluate(inner, ctx)?;
            Ok(Value::Real(require_real("log10", &value)?.log10()))
        }
        Operand::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            ctx.state().call(name, &values)
        }
    }
}

fn require_real(what: &str, value: &Value) -> Result<f64> {
    value.as_real().ok_or_else(|| EvalError::TypeMismatch {
        message: format!("{} expects a number, got {}", what, value.type_name()),
    })
}

/// Apply a binary arithmetic operator with numeric-tower promotion: the
/// result is real if either operand is real, integer otherwise. Integer
/// division truncates toward zero; `^` over two integers is computed in
/// real arithmetic and narrowed back.
fn apply_arith(op: ArithOp, lhs: Value, rhs: Value) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                ArithOp::Add => Ok(Value::Int(a + b)),
                ArithOp::Sub => Ok(Value::Int(a - b)),
                ArithOp::Mul => Ok(Value::Int(a * b)),
                ArithOp::Div => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    Ok(Value::Int(a / b))
                }
                ArithOp::Pow => Ok(Value::Int((a as f64).powf(b as f64) as i64)),
            }
        }
        _ => {
            let a = require_real(&format!("operator `{}`", op), &lhs)?;
            let b = require_real(&format!("operator `{}`", op), &rhs)?;
            match op {
                ArithOp::Add => Ok(Value::Real(a + b)),
                ArithOp::Sub => Ok(Value::Real(a - b)),
                ArithOp::Mul => Ok(Value::Real(a * b)),
                ArithOp::Div => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    Ok(Value::Real(a / b))
                }
                ArithOp::Pow => Ok(Value::Real(a.powf(b))),
            }
        }
    }
}

// ============================================================================
// Numeric comparison
// ============================================================================

/// Compare two numeric values.
///
/// When either operand is real-valued the comparison is epsilon-tolerant:
/// values closer than [`EPSILON`] are equal, otherwise ordered by the sign
/// of the difference. Two integers compare exactly.
pub fn compare_numeric(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (number_of(a)?, number_of(b)?);
            let diff = x - y;
            if diff.abs() < EPSILON {
                Ok(Ordering::Equal)
            } else if diff > 0.0 {
                Ok(Ordering::Greater)
            } else {
                Ok(Ordering::Less)
            }
        }
    }
}

fn number_of(value: &Value) -> Result<f64> {
    value.as_real().ok_or_else(|| EvalError::TypeMismatch {
        message: format!("numeric comparison requires numbers, got {}", value.type_name()),
    })
}

/// Equality as the contract language sees it: epsilon-tolerant for numbers,
/// target-environment equality for objects, value equality otherwise
/// (`null == null` holds).
pub fn values_equal(a: &Value, b: &Value, state: &dyn TargetState) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => state.objects_equal(x, y),
        _ if a.is_number() && b.is_number() => {
            matches!(compare_numeric(a, b), Ok(Ordering::Equal))
        }
        _ => a == b,
    }
}

// ============================================================================
// Predicate evaluation
// ============================================================================

/// Evaluate one predicate node. `Err` means the check failed to run, which
/// is never conflated with the check running and failing.
pub fn holds(
    predicate: &Predicate,
    ctx: &mut LookupContext,
    predicates: &mut PredicateRegistry,
) -> Result<bool> {
    match predicate {
        Predicate::Empty => Ok(true),

        Predicate::Cmp { op, lhs, rhs } => {
            let left = evaluate(lhs, ctx)?;
            let right = evaluate(rhs, ctx)?;
            check_cmp(*op, &left, &right, ctx.state())
        }

        Predicate::Within { value, low, high } => {
            let v = evaluate(value, ctx)?;
            let lo = evaluate(low, ctx)?;
            let hi = evaluate(high, ctx)?;
            Ok(compare_numeric(&v, &lo)? != Ordering::Less
                && compare_numeric(&v, &hi)? != Ordering::Greater)
        }

        Predicate::WithinDelta {
            value,
            center,
            delta,
        } => {
            let v = evaluate(value, ctx)?;
            let c = evaluate(center, ctx)?;
            let d = evaluate(delta, ctx)?;
            within_delta(&v, &c, &d)
        }

        Predicate::IsEmpty(operand) => emptiness_of(operand, ctx),
        Predicate::NotEmpty(operand) => Ok(!emptiness_of(operand, ctx)?),

        Predicate::InstanceOf { value, class_name } => {
            let v = evaluate(value, ctx)?;
            Ok(match &v {
                Value::Null => false,
                Value::Object(obj) => obj.class_name == *class_name,
                other => other.type_name() == class_name.as_str(),
            })
        }

        Predicate::Matches { value, pattern } => {
            let v = evaluate(value, ctx)?;
            let re = full_match_regex(pattern)?;
            Ok(re.is_match(&v.string_form()))
        }

        Predicate::Satisfies { value, name, args } => {
            let subject = evaluate(value, ctx)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            let violation = predicates.check(name, Some(&subject), &values)?;
            Ok(violation.is_none())
        }

        Predicate::And(a, b) => Ok(holds(a, ctx, predicates)? && holds(b, ctx, predicates)?),
        Predicate::Or(a, b) => Ok(holds(a, ctx, predicates)? || holds(b, ctx, predicates)?),
    }
}

/// Compile a `matches` pattern so that it must cover the whole subject
/// string, not a substring.
pub fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| EvalError::InvalidPattern {
        pattern: pattern.into(),
        message: e.to_string(),
    })
}

fn check_cmp(op: CmpOp, left: &Value, right: &Value, state: &dyn TargetState) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right, state)),
        CmpOp::Ne => Ok(!values_equal(left, right, state)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ord = compare_numeric(left, right)?;
            Ok(match op {
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            })
        }
    }
}

/// `v within c +- d`: promote all three operands to real when any is
/// floating, otherwise stay in integer arithmetic.
pub fn within_delta(v: &Value, c: &Value, d: &Value) -> Result<bool> {
    if v.is_real() || c.is_real() || d.is_real() {
        let (vf, cf, df) = (number_of(v)?, number_of(c)?, number_of(d)?);
        let lo = Value::Real(cf - df);
        let hi = Value::Real(cf + df);
        let vv = Value::Real(vf);
        Ok(compare_numeric(&vv, &lo)? != Ordering::Less
            && compare_numeric(&vv, &hi)? != Ordering::Greater)
    } else {
        let require_int = |x: &Value| {
            x.as_int().ok_or_else(|| EvalError::TypeMismatch {
                message: format!("within +- requires numbers, got {}", x.type_name()),
            })
        };
        let (vi, ci, di) = (require_int(v)?, require_int(c)?, require_int(d)?);
        Ok(vi >= ci - di && vi <= ci + di)
    }
}

fn emptiness_of(operand: &Operand, ctx: &mut LookupContext) -> Result<bool> {
    let value = evaluate(operand, ctx)?;
    value.emptiness().ok_or_else(|| EvalError::TypeMismatch {
        message: format!("emptiness is undefined for {}", value.type_name()),
    })
}

// ============================================================================
// Contract chains
// ============================================================================

/// Every non-empty link in the chain holds. Empty links are vacuously true;
/// evaluation short-circuits in chain order.
pub fn holds_all(
    contract: &Contract,
    ctx: &mut LookupContext,
    predicates: &mut PredicateRegistry,
) -> Result<bool> {
    for link in contract.links() {
        if link.is_empty_link() {
            continue;
        }
        if !holds(link, ctx, predicates)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Some non-empty link in the chain holds. Empty links are skipped and
/// never satisfy the disjunction by themselves.
pub fn holds_any(
    contract: &Contract,
    ctx: &mut LookupContext,
    predicates: &mut PredicateRegistry,
) -> Result<bool> {
    for link in contract.links() {
        if link.is_empty_link() {
            continue;
        }
        if holds(link, ctx, predicates)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Capture every `old(...)` operand reachable from a non-empty link of the
/// chain into the given (pre-execution) context.
pub fn save_old_values(contract: &Contract, ctx: &mut LookupContext) -> Result<()> {
    let mut wrappers = Vec::new();
    contract.collect_old(&mut wrappers);
    for wrapper in wrappers {
        evaluate(wrapper, ctx)?;
    }
    Ok(())
}
