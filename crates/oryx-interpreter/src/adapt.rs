//! Argument adaptation for target-object construction.
//!
//! A closed rule table replaces open-ended runtime type matching: every
//! coercion the engine performs when fitting candidate values to a
//! constructor's parameter types is enumerated here.

use std::fmt;
use std::rc::Rc;

use oryx_ast::{SmolStr, Value};

use crate::{EvalError, Result};

/// Parameter types a constructor in the target environment can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Str,
    Object(SmolStr),
    List(Box<TargetType>),
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Bool => write!(f, "bool"),
            TargetType::Byte => write!(f, "byte"),
            TargetType::Short => write!(f, "short"),
            TargetType::Int => write!(f, "int"),
            TargetType::Long => write!(f, "long"),
            TargetType::Float => write!(f, "float"),
            TargetType::Double => write!(f, "double"),
            TargetType::Str => write!(f, "string"),
            TargetType::Object(name) => write!(f, "{}", name),
            TargetType::List(elem) => write!(f, "{}[]", elem),
        }
    }
}

impl TargetType {
    fn integral_range(&self) -> Option<(i64, i64)> {
        match self {
            TargetType::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            TargetType::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            TargetType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            TargetType::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

/// Adapt a candidate value to a declared parameter type.
///
/// Coercions performed: identity for bool/string, integral narrowing with a
/// range check, int→real widening, real→integral truncation toward zero
/// (range-checked), element-wise list coercion, and scalar↔singleton-list
/// adaptation. Anything else is an instantiation failure.
pub fn adapt(value: &Value, target: &TargetType) -> Result<Value> {
    match target {
        TargetType::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(mismatch(other, target)),
        },

        TargetType::Byte | TargetType::Short | TargetType::Int | TargetType::Long => {
            let (min, max) = match target.integral_range() {
                Some(range) => range,
                None => unreachable!(),
            };
            let n = match value {
                Value::Int(n) => *n,
                Value::Real(f) => f.trunc() as i64,
                Value::List(items) if items.len() == 1 => {
                    return adapt(&items[0], target);
                }
                other => return Err(mismatch(other, target)),
            };
            if n < min || n > max {
                return Err(EvalError::Instantiation {
                    class_name: target.to_string().into(),
                    message: format!("value {} out of range for {}", value, target),
                });
            }
            Ok(Value::Int(n))
        }

        TargetType::Float | TargetType::Double => match value {
            Value::Int(n) => Ok(Value::Real(*n as f64)),
            Value::Real(f) => Ok(Value::Real(*f)),
            Value::List(items) if items.len() == 1 => adapt(&items[0], target),
            other => Err(mismatch(other, target)),
        },

        TargetType::Str => match value {
            Value::Str(s) => Ok(Value::Str(s.clone())),
            other => Err(mismatch(other, target)),
        },

        TargetType::Object(class_name) => match value {
            Value::Null => Ok(Value::Null),
            Value::Object(obj) if obj.class_name == *class_name => Ok(value.clone()),
            other => Err(mismatch(other, target)),
        },

        TargetType::List(elem) => match value {
            Value::List(items) => {
                let adapted = items
                    .iter()
                    .map(|item| adapt(item, elem))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(Rc::new(adapted)))
            }
            // A lone scalar adapts to a singleton collection.
            other => Ok(Value::List(Rc::new(vec![adapt(other, elem)?]))),
        },
    }
}

fn mismatch(value: &Value, target: &TargetType) -> EvalError {
    EvalError::Instantiation {
        class_name: target.to_string().into(),
        message: format!("cannot adapt {} ({}) to {}", value, value.type_name(), target),
    }
}
