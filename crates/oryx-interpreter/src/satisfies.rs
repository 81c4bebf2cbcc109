//! Bridge to externally supplied `satisfies` predicates.
//!
//! A predicate is identified by name. Resolution consults host-native
//! registrations first and falls back to predicates hosted inside the
//! target environment; either way the resolved instance is memoized so
//! repeated uses of one name share it. The registry is an explicit value
//! passed into evaluation, never global state, so independent interpreter
//! instances never share resolution caches.

use std::rc::Rc;

use oryx_ast::{SmolStr, Value};
use rustc_hash::FxHashMap;

use crate::{EvalError, Result};

/// An externally supplied, named boolean check.
///
/// `check` receives the test object's current value and the evaluated
/// extra arguments. `None` means the contract holds; a string is a
/// human-readable violation message.
pub trait SatisfiesPredicate {
    fn check(&self, test_object: Option<&Value>, args: &[Value]) -> Option<String>;
}

impl<F> SatisfiesPredicate for F
where
    F: Fn(Option<&Value>, &[Value]) -> Option<String>,
{
    fn check(&self, test_object: Option<&Value>, args: &[Value]) -> Option<String> {
        self(test_object, args)
    }
}

/// Collaborator locating predicates hosted inside the target environment.
pub trait PredicateResolver {
    fn resolve(&self, name: &str) -> Option<Rc<dyn SatisfiesPredicate>>;
}

/// Name→predicate resolution with memoization and native-first precedence.
#[derive(Default)]
pub struct PredicateRegistry {
    native: FxHashMap<SmolStr, Rc<dyn SatisfiesPredicate>>,
    fallback: Option<Box<dyn PredicateResolver>>,
    resolved: FxHashMap<SmolStr, Rc<dyn SatisfiesPredicate>>,
    last_violation: Option<String>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that can fall back to predicates hosted in the target
    /// environment.
    pub fn with_fallback(resolver: Box<dyn PredicateResolver>) -> Self {
        Self {
            fallback: Some(resolver),
            ..Self::default()
        }
    }

    /// Register a host-native predicate under a name. Native registrations
    /// take precedence over target-hosted ones.
    pub fn register(&mut self, name: impl Into<SmolStr>, predicate: Rc<dyn SatisfiesPredicate>) {
        self.native.insert(name.into(), predicate);
    }

    /// Resolve a predicate by name, memoizing fallback hits.
    pub fn resolve(&mut self, name: &str) -> Result<Rc<dyn SatisfiesPredicate>> {
        if let Some(predicate) = self.native.get(name) {
            return Ok(predicate.clone());
        }
        if let Some(predicate) = self.resolved.get(name) {
            return Ok(predicate.clone());
        }
        if let Some(resolver) = &self.fallback {
            if let Some(predicate) = resolver.resolve(name) {
                self.resolved.insert(name.into(), predicate.clone());
                return Ok(predicate);
            }
        }
        Err(EvalError::UnresolvedPredicate { name: name.into() })
    }

    /// Resolve and run a predicate, recording any violation message for
    /// diagnostics. Returns the violation message, `None` when the check
    /// holds.
    pub fn check(
        &mut self,
        name: &str,
        test_object: Option<&Value>,
        args: &[Value],
    ) -> Result<Option<String>> {
        let predicate = self.resolve(name)?;
        let violation = predicate.check(test_object, args);
        self.last_violation = violation.clone();
        Ok(violation)
    }

    /// The violation message produced by the most recent check, if any.
    pub fn last_violation(&self) -> Option<&str> {
        self.last_violation.as_deref()
    }
}
