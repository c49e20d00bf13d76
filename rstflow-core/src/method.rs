//! Host method table and the arity guard.
//!
//! A host type publishes its callable surface explicitly: named predicates
//! (used by named-predicate guard filters) and named methods with a declared
//! arity (used as event actions and named callbacks). The engine resolves
//! names through this table instead of probing the host at runtime.

use crate::context::Scope;
use crate::error::{BoxError, CoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Named zero-argument predicate on the host.
pub type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Named host method. Receives the transition scope and the event arguments.
pub type MethodFn<T> =
    Arc<dyn Fn(&mut Scope<'_, T>, &[Value]) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// Declared parameter count of a host method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Exactly N arguments.
    Exact(usize),
    /// N required arguments followed by a rest parameter.
    AtLeast(usize),
}

impl Arity {
    /// Decodes the signed convention: `N >= 0` is exact, `-(N + 1)` means at
    /// least `N`.
    pub fn from_signed(n: i64) -> Self {
        if n >= 0 {
            Arity::Exact(n as usize)
        } else {
            Arity::AtLeast((-(n + 1)) as usize)
        }
    }

    /// Encodes the arity in the signed convention.
    pub fn signed(&self) -> i64 {
        match self {
            Arity::Exact(n) => *n as i64,
            Arity::AtLeast(n) => -1 - (*n as i64),
        }
    }

    pub fn accepts(&self, given: usize) -> bool {
        match self {
            Arity::Exact(n) => given == *n,
            Arity::AtLeast(n) => given >= *n,
        }
    }

    /// Fails with `CallbackArity` unless `given` arguments fit.
    pub fn check(&self, method: &str, given: usize) -> Result<(), CoreError> {
        if self.accepts(given) {
            Ok(())
        } else {
            Err(CoreError::CallbackArity {
                method: method.to_string(),
                arity: *self,
                given,
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signed())
    }
}

struct Method<T> {
    arity: Arity,
    func: MethodFn<T>,
}

/// Named predicates and methods a host type exposes to its workflow.
pub struct MethodTable<T> {
    methods: HashMap<String, Method<T>>,
    predicates: HashMap<String, PredicateFn<T>>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MethodTable<T> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            predicates: HashMap::new(),
        }
    }

    /// Registers a method. A later registration under the same name replaces
    /// the earlier one.
    pub fn method<F>(mut self, name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &[Value]) -> Result<Option<Value>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(
            name.into(),
            Method {
                arity,
                func: Arc::new(func),
            },
        );
        self
    }

    /// Registers a named predicate.
    pub fn predicate<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(func));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn arity(&self, name: &str) -> Option<Arity> {
        self.methods.get(name).map(|m| m.arity)
    }

    /// Evaluates a named predicate against `target`.
    pub fn check_predicate(&self, name: &str, target: &T) -> Result<bool, CoreError> {
        let predicate = self
            .predicates
            .get(name)
            .ok_or_else(|| CoreError::UndefinedMethod {
                name: name.to_string(),
            })?;
        Ok(predicate(target))
    }

    /// Invokes a named method after validating the argument count.
    ///
    /// Missing methods and arity mismatches are returned as boxed
    /// `CoreError`s before the method runs.
    pub fn invoke(
        &self,
        name: &str,
        scope: &mut Scope<'_, T>,
        args: &[Value],
    ) -> Result<Option<Value>, BoxError> {
        let method = self.methods.get(name).ok_or_else(|| {
            Box::new(CoreError::UndefinedMethod {
                name: name.to_string(),
            }) as BoxError
        })?;
        method.arity.check(name, args.len())?;
        (method.func)(scope, args)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
