//! Guard conditions.
//!
//! A [`Condition`] is two filter lists: every `if` filter must pass and every
//! `unless` filter must fail. Each [`Filter`] kind is reduced to a boolean
//! check against the host, optionally seeing the in-flight transition.

use crate::context::TransitionContext;
use crate::error::CoreError;
use crate::guard::{GuardExpr, GuardScope};
use crate::host::Host;
use crate::method::MethodTable;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type NullaryFn = Arc<dyn Fn() -> bool + Send + Sync>;
pub type UnaryFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub type BinaryFn<T> = Arc<dyn Fn(&T, Option<&TransitionContext>) -> bool + Send + Sync>;

/// An object answering convention-named predicates on behalf of a host.
///
/// The engine asks for `guard_<event>` when resolving events and for
/// `<phase>_<category>` (e.g. `before_transition`) when filtering callbacks.
/// Returning `None` means the delegate does not implement that predicate.
pub trait ConditionDelegate<T>: Send + Sync {
    fn dispatch(&self, method: &str, target: &T) -> Option<bool>;
}

/// One guard filter.
pub enum Filter<T> {
    /// Named predicate from the host's method table.
    Predicate(String),
    /// Textual guard expression over `Host::fields()`.
    Expression { source: String, expr: GuardExpr },
    Nullary(NullaryFn),
    Unary(UnaryFn<T>),
    /// Receives the target and, inside a callback chain, the transition.
    Binary(BinaryFn<T>),
    Delegate(Arc<dyn ConditionDelegate<T>>),
}

impl<T> Filter<T> {
    pub fn predicate(name: impl Into<String>) -> Self {
        Filter::Predicate(name.into())
    }

    /// Parses a guard expression. Fails with `InvalidGuard`.
    pub fn expression(source: impl Into<String>) -> Result<Self, CoreError> {
        let source = source.into();
        let expr = GuardExpr::parse(&source)?;
        Ok(Filter::Expression { source, expr })
    }

    pub fn nullary<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Filter::Nullary(Arc::new(f))
    }

    pub fn unary<F>(f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Filter::Unary(Arc::new(f))
    }

    pub fn binary<F>(f: F) -> Self
    where
        F: Fn(&T, Option<&TransitionContext>) -> bool + Send + Sync + 'static,
    {
        Filter::Binary(Arc::new(f))
    }

    pub fn delegate(delegate: impl ConditionDelegate<T> + 'static) -> Self {
        Filter::Delegate(Arc::new(delegate))
    }

    /// Whether the filter can be written to a specification document.
    pub fn is_data(&self) -> bool {
        matches!(self, Filter::Predicate(_) | Filter::Expression { .. })
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        match self {
            Filter::Predicate(name) => Filter::Predicate(name.clone()),
            Filter::Expression { source, expr } => Filter::Expression {
                source: source.clone(),
                expr: expr.clone(),
            },
            Filter::Nullary(f) => Filter::Nullary(Arc::clone(f)),
            Filter::Unary(f) => Filter::Unary(Arc::clone(f)),
            Filter::Binary(f) => Filter::Binary(Arc::clone(f)),
            Filter::Delegate(d) => Filter::Delegate(Arc::clone(d)),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Predicate(name) => f.debug_tuple("Predicate").field(name).finish(),
            Filter::Expression { source, .. } => f.debug_tuple("Expression").field(source).finish(),
            Filter::Nullary(_) => f.write_str("Nullary(<fn>)"),
            Filter::Unary(_) => f.write_str("Unary(<fn>)"),
            Filter::Binary(_) => f.write_str("Binary(<fn>)"),
            Filter::Delegate(_) => f.write_str("Delegate(<object>)"),
        }
    }
}

/// What a condition is evaluated against, besides the target itself.
pub struct Evaluation<'a, T> {
    pub methods: &'a MethodTable<T>,
    pub transition: Option<&'a TransitionContext>,
    /// Delegate method prefix and name, joined as `<prefix>_<name>`.
    pub delegate_prefix: &'a str,
    pub delegate_name: &'a str,
}

impl<'a, T> Evaluation<'a, T> {
    /// Evaluation for resolving `event` (no transition in flight yet).
    pub fn for_event(methods: &'a MethodTable<T>, event: &'a str) -> Self {
        Self {
            methods,
            transition: None,
            delegate_prefix: "guard",
            delegate_name: event,
        }
    }
}

static NULL: Value = Value::Null;

/// Lazily built inputs for expression filters, shared across one `apply`.
#[derive(Default)]
struct ExpressionInputs {
    fields: Option<Value>,
    transition: Option<Value>,
}

impl ExpressionInputs {
    fn scope<T: Host>(&mut self, target: &T, ctx: Option<&TransitionContext>) -> GuardScope<'_> {
        if self.fields.is_none() {
            self.fields = Some(target.fields());
        }
        if self.transition.is_none() {
            self.transition = ctx.map(TransitionContext::to_value);
        }
        let scope = GuardScope::new(self.fields.as_ref().unwrap_or(&NULL));
        match &self.transition {
            Some(transition) => scope.with_transition(transition),
            None => scope,
        }
    }
}

impl<T: Host> Filter<T> {
    fn check(
        &self,
        target: &T,
        eval: &Evaluation<'_, T>,
        inputs: &mut ExpressionInputs,
    ) -> Result<bool, CoreError> {
        match self {
            Filter::Predicate(name) => eval.methods.check_predicate(name, target),
            Filter::Expression { expr, .. } => {
                Ok(expr.evaluate(&inputs.scope(target, eval.transition)))
            }
            Filter::Nullary(f) => Ok(f()),
            Filter::Unary(f) => Ok(f(target)),
            Filter::Binary(f) => Ok(f(target, eval.transition)),
            Filter::Delegate(delegate) => {
                let method = format!("{}_{}", eval.delegate_prefix, eval.delegate_name);
                delegate
                    .dispatch(&method, target)
                    .ok_or(CoreError::UndefinedMethod { name: method })
            }
        }
    }
}

/// `if` and `unless` filter lists.
pub struct Condition<T> {
    if_filters: Vec<Filter<T>>,
    unless_filters: Vec<Filter<T>>,
}

impl<T> Default for Condition<T> {
    fn default() -> Self {
        Self {
            if_filters: Vec::new(),
            unless_filters: Vec::new(),
        }
    }
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        Self {
            if_filters: self.if_filters.clone(),
            unless_filters: self.unless_filters.clone(),
        }
    }
}

impl<T> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("if", &self.if_filters)
            .field("unless", &self.unless_filters)
            .finish()
    }
}

impl<T> Condition<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, filter: Filter<T>) -> Self {
        self.if_filters.push(filter);
        self
    }

    pub fn unless(mut self, filter: Filter<T>) -> Self {
        self.unless_filters.push(filter);
        self
    }

    pub(crate) fn push_if(&mut self, filter: Filter<T>) {
        self.if_filters.push(filter);
    }

    pub(crate) fn push_unless(&mut self, filter: Filter<T>) {
        self.unless_filters.push(filter);
    }

    pub fn if_filters(&self) -> &[Filter<T>] {
        &self.if_filters
    }

    pub fn unless_filters(&self) -> &[Filter<T>] {
        &self.unless_filters
    }

    pub fn is_empty(&self) -> bool {
        self.if_filters.is_empty() && self.unless_filters.is_empty()
    }
}

impl<T: Host> Condition<T> {
    /// True iff every `if` filter passes and every `unless` filter fails.
    ///
    /// Filters run in declaration order and stop at the first deciding one.
    /// Evaluation errors propagate.
    pub fn apply(&self, target: &T, eval: &Evaluation<'_, T>) -> Result<bool, CoreError> {
        let mut inputs = ExpressionInputs::default();
        for filter in &self.if_filters {
            if !filter.check(target, eval, &mut inputs)? {
                return Ok(false);
            }
        }
        for filter in &self.unless_filters {
            if filter.check(target, eval, &mut inputs)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
