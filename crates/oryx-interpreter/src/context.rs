//! Lookup contexts: phase-specific variable resolution with a memoizing
//! cache.
//!
//! One context instance covers one phase of a guarded call's lifecycle. The
//! post-execution context is built from the pre-execution one so that
//! `old(...)` captures taken before the call survive into the
//! post-condition check.

use oryx_ast::{ObjectRef, OldId, SmolStr, Value};
use rustc_hash::FxHashMap;

use crate::{EvalError, Result};

/// Narrow view of the target program's execution state.
///
/// This is the only seam between the interpreter and the host virtual
/// machine. Every method reads current state; the interpreter never writes
/// through it.
pub trait TargetState {
    /// Current value of a named call argument or local in the active frame.
    fn local(&self, name: &str) -> Option<Value>;

    /// Current value of a named instance or static field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Value of a dot-qualified field, optionally rooted at an instance.
    fn qualified_field(&self, qualified: &str, instance: Option<&Value>) -> Option<Value>;

    /// The guarded call's return value, once the call has completed.
    fn return_value(&self) -> Option<Value>;

    /// The object under test, if any.
    fn test_object(&self) -> Option<Value> {
        None
    }

    /// Invoke a side-effect-free function in the target environment.
    fn call(&self, name: &str, _args: &[Value]) -> Result<Value> {
        Err(EvalError::UnresolvedReference { name: name.into() })
    }

    /// Target-environment equality for object references.
    fn objects_equal(&self, a: &ObjectRef, b: &ObjectRef) -> bool {
        a == b
    }

    /// Free memory in the target environment, for memory goals.
    fn free_memory(&self) -> u64 {
        0
    }
}

/// Which phase of the call lifecycle a context resolves names for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Before the call; names are arguments and locals at the call site
    Precondition,

    /// Immediately before the guarded call, for `old(...)` capture
    PostPreExec,

    /// After the guarded call; additionally serves the result value
    PostPostExec,

    /// Instance/static fields only, independent of any particular call
    Invariant,
}

/// Key into a context's value cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A plain variable or qualified-field name
    Name(SmolStr),

    /// An `old(...)` wrapper, by node identity
    Old(OldId),

    /// The reserved slot for the call's return value
    Result,
}

/// Phase-specific variable resolution with a memoizing cache.
///
/// Cache entries are written at most once per key for the lifetime of a
/// context, except [`CacheKey::Result`], which is bound only at the
/// post-execution stage.
pub struct LookupContext<'env> {
    kind: ContextKind,
    state: &'env dyn TargetState,
    cache: FxHashMap<CacheKey, Value>,
}

impl<'env> LookupContext<'env> {
    /// Context for precondition checks.
    pub fn precondition(state: &'env dyn TargetState) -> Self {
        Self::new(ContextKind::Precondition, state)
    }

    /// Context for capturing `old(...)` values just before the call.
    pub fn post_pre_exec(state: &'env dyn TargetState) -> Self {
        Self::new(ContextKind::PostPreExec, state)
    }

    /// Context for invariant checks.
    pub fn invariant(state: &'env dyn TargetState) -> Self {
        Self::new(ContextKind::Invariant, state)
    }

    fn new(kind: ContextKind, state: &'env dyn TargetState) -> Self {
        Self {
            kind,
            state,
            cache: FxHashMap::default(),
        }
    }

    /// Build the post-execution context from the pre-execution one,
    /// inheriting every `old(...)` capture already taken, and binding the
    /// call's result when given.
    ///
    /// `old(e)` is always captured against the pre-execution context; this
    /// constructor is why the captures survive into the post-condition.
    /// Plain-name entries are purged so that names resolve against
    /// post-call state.
    pub fn into_post_exec(self, result: Option<Value>) -> LookupContext<'env> {
        let mut ctx = LookupContext {
            kind: ContextKind::PostPostExec,
            state: self.state,
            cache: self.cache,
        };
        ctx.purge_vars();
        if let Some(value) = result {
            ctx.bind_result(value);
        }
        ctx
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// The target-state collaborator this context resolves against.
    pub fn state(&self) -> &'env dyn TargetState {
        self.state
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<&Value> {
        self.cache.get(key)
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn put(&mut self, key: CacheKey, value: Value) {
        self.cache.insert(key, value);
    }

    /// Drop every entry keyed by a plain name, keeping `old(...)` captures
    /// and the result slot. Used when a cache is reused across a new
    /// evaluation round.
    pub fn purge_vars(&mut self) {
        self.cache.retain(|key, _| !matches!(key, CacheKey::Name(_)));
    }

    /// Bind the call's return value. Only the post-execution stage writes
    /// this slot.
    pub fn bind_result(&mut self, value: Value) {
        debug_assert_eq!(self.kind, ContextKind::PostPostExec);
        self.cache.insert(CacheKey::Result, value);
    }

    /// Resolve a plain name per this context's phase, memoizing the result.
    pub fn get_value(&mut self, name: &str) -> Result<Value> {
        let key = CacheKey::Name(name.into());
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }

        let resolved = match self.kind {
            ContextKind::Precondition => self.state.local(name),
            ContextKind::PostPreExec | ContextKind::PostPostExec => {
                self.state.local(name).or_else(|| self.state.field(name))
            }
            ContextKind::Invariant => self.state.field(name),
        };

        match resolved {
            Some(value) => {
                self.cache.insert(key, value.clone());
                Ok(value)
            }
            None => Err(EvalError::UnresolvedReference { name: name.into() }),
        }
    }

    /// Resolve a dot-qualified field reference, memoizing the result.
    pub fn field_value(&mut self, qualified: &str) -> Result<Value> {
        let key = CacheKey::Name(qualified.into());
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }

        let instance = self.state.test_object();
        match self.state.qualified_field(qualified, instance.as_ref()) {
            Some(value) => {
                self.cache.insert(key, value.clone());
                Ok(value)
            }
            None => Err(EvalError::UnresolvedReference {
                name: qualified.into(),
            }),
        }
    }

    /// The guarded call's result. Reading it outside the post-execution
    /// phase is a usage error, not a silent null.
    pub fn result_value(&mut self) -> Result<Value> {
        if let Some(value) = self.cache.get(&CacheKey::Result) {
            return Ok(value.clone());
        }
        if self.kind != ContextKind::PostPostExec {
            return Err(EvalError::ResultUnavailable);
        }
        match self.state.return_value() {
            Some(value) => {
                self.cache.insert(CacheKey::Result, value.clone());
                Ok(value)
            }
            None => Err(EvalError::ResultUnavailable),
        }
    }
}
