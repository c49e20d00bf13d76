//! Before/around/after callback chains.
//!
//! A specification owns three chains (transition, exit, entry). The executor
//! nests them: each chain wraps a body, and the body of an outer chain runs
//! the next chain inward. A chain reports whether its level completed through
//! [`ChainOutcome`] instead of unwinding.

use crate::condition::{Condition, Evaluation, Filter};
use crate::context::Scope;
use crate::error::BoxError;
use crate::event::canonical_key;
use crate::host::Host;
use crate::method::MethodTable;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    Around,
    After,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::Around => "around",
            Phase::After => "after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Transition,
    Exit,
    Entry,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transition => "transition",
            Category::Exit => "exit",
            Category::Entry => "entry",
        }
    }
}

/// Result of running one chain level.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome<R> {
    Completed(R),
    /// A before or around callback halted before the body completed, or an
    /// around callback never continued.
    Aborted,
}

impl<R> ChainOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainOutcome::Completed(_))
    }
}

pub type CallbackFn<T> = Arc<dyn Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync>;

/// Continuation handed to an around callback.
pub type Next<'n, T> = dyn FnMut(&mut Scope<'_, T>) -> Result<(), BoxError> + 'n;

/// Around callback. Must call the continuation for the transition to proceed.
pub type AroundFn<T> =
    Arc<dyn Fn(&mut Scope<'_, T>, &mut Next<'_, T>) -> Result<(), BoxError> + Send + Sync>;

/// A before or after callback body.
pub enum Step<T> {
    /// Zero-argument method from the host's method table.
    Method(String),
    Func(CallbackFn<T>),
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Step::Method(name) => Step::Method(name.clone()),
            Step::Func(f) => Step::Func(Arc::clone(f)),
        }
    }
}

pub enum Hook<T> {
    Before(Step<T>),
    Around(AroundFn<T>),
    After(Step<T>),
}

impl<T> Hook<T> {
    pub fn phase(&self) -> Phase {
        match self {
            Hook::Before(_) => Phase::Before,
            Hook::Around(_) => Phase::Around,
            Hook::After(_) => Phase::After,
        }
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        match self {
            Hook::Before(step) => Hook::Before(step.clone()),
            Hook::Around(f) => Hook::Around(Arc::clone(f)),
            Hook::After(step) => Hook::After(step.clone()),
        }
    }
}

/// One registered callback with its inclusion filter.
///
/// `only`/`except` match the event name; `in_states`/`except_states` match
/// the state the chain runs for.
pub struct CallbackEntry<T> {
    hook: Hook<T>,
    only: Vec<String>,
    except: Vec<String>,
    states: Vec<String>,
    except_states: Vec<String>,
    condition: Condition<T>,
    prepend: bool,
}

impl<T> CallbackEntry<T> {
    fn with_hook(hook: Hook<T>) -> Self {
        Self {
            hook,
            only: Vec::new(),
            except: Vec::new(),
            states: Vec::new(),
            except_states: Vec::new(),
            condition: Condition::new(),
            prepend: false,
        }
    }

    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_hook(Hook::Before(Step::Func(Arc::new(f))))
    }

    pub fn before_method(name: impl Into<String>) -> Self {
        Self::with_hook(Hook::Before(Step::Method(name.into())))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_hook(Hook::After(Step::Func(Arc::new(f))))
    }

    pub fn after_method(name: impl Into<String>) -> Self {
        Self::with_hook(Hook::After(Step::Method(name.into())))
    }

    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &mut Next<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_hook(Hook::Around(Arc::new(f)))
    }

    /// Restricts the callback to these events.
    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.only
            .extend(names.into_iter().map(|n| canonical_key(n.as_ref())));
        self
    }

    /// Skips the callback for these events.
    pub fn except<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.except
            .extend(names.into_iter().map(|n| canonical_key(n.as_ref())));
        self
    }

    /// Restricts the callback to chains running for these states.
    pub fn in_states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.states
            .extend(names.into_iter().map(|n| n.as_ref().trim().to_string()));
        self
    }

    /// Skips the callback in chains running for these states.
    pub fn except_states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.except_states
            .extend(names.into_iter().map(|n| n.as_ref().trim().to_string()));
        self
    }

    pub fn when(mut self, filter: Filter<T>) -> Self {
        self.condition.push_if(filter);
        self
    }

    pub fn unless(mut self, filter: Filter<T>) -> Self {
        self.condition.push_unless(filter);
        self
    }

    /// Runs ahead of previously registered callbacks of the same phase.
    pub fn prepend(mut self) -> Self {
        self.prepend = true;
        self
    }

    pub fn phase(&self) -> Phase {
        self.hook.phase()
    }

    pub fn hook(&self) -> &Hook<T> {
        &self.hook
    }

    fn matches(&self, event: &str, state: &str) -> bool {
        let included = |only: &[String], except: &[String], key: &str| {
            (only.is_empty() || only.iter().any(|n| n == key)) && !except.iter().any(|n| n == key)
        };
        included(&self.only, &self.except, event)
            && included(&self.states, &self.except_states, state)
    }
}

impl<T> Clone for CallbackEntry<T> {
    fn clone(&self) -> Self {
        Self {
            hook: self.hook.clone(),
            only: self.only.clone(),
            except: self.except.clone(),
            states: self.states.clone(),
            except_states: self.except_states.clone(),
            condition: self.condition.clone(),
            prepend: self.prepend,
        }
    }
}

impl<T> fmt::Debug for CallbackEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.hook {
            Hook::Before(Step::Method(name)) | Hook::After(Step::Method(name)) => name.as_str(),
            _ => "<fn>",
        };
        f.debug_struct("CallbackEntry")
            .field("phase", &self.phase())
            .field("target", &target)
            .field("only", &self.only)
            .field("except", &self.except)
            .field("states", &self.states)
            .field("except_states", &self.except_states)
            .field("condition", &self.condition)
            .finish()
    }
}

/// Ordered callbacks of one category.
pub struct CallbackChain<T> {
    category: Category,
    entries: Vec<CallbackEntry<T>>,
}

impl<T> Clone for CallbackChain<T> {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            entries: self.entries.clone(),
        }
    }
}

impl<T> fmt::Debug for CallbackChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChain")
            .field("category", &self.category)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<T> CallbackChain<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: Vec::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn register(&mut self, entry: CallbackEntry<T>) {
        if entry.prepend {
            self.entries.insert(0, entry);
        } else {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[CallbackEntry<T>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Host> CallbackChain<T> {
    /// Runs the chain around `body`.
    ///
    /// `state` is the state that state filters match: the `from` state for
    /// the transition and exit chains, the `to` state for entry. Entries are
    /// selected once, up front. After callbacks run only when the chain
    /// completed. Once the body has completed, a halt requested by an around
    /// callback on its way out or by an after callback is discarded.
    pub fn run<R, F>(
        &self,
        scope: &mut Scope<'_, T>,
        methods: &MethodTable<T>,
        state: &str,
        body: F,
    ) -> Result<ChainOutcome<R>, BoxError>
    where
        F: FnOnce(&mut Scope<'_, T>) -> Result<ChainOutcome<R>, BoxError>,
    {
        let selected = self.select(scope, methods, state)?;

        for entry in selected.iter().filter(|e| e.phase() == Phase::Before) {
            if let Hook::Before(step) = &entry.hook {
                self.run_step(Phase::Before, step, scope, methods)?;
            }
            if scope.is_halted() {
                tracing::debug!(
                    "{} chain aborted in before phase on '{}'",
                    self.category.as_str(),
                    scope.context().event()
                );
                return Ok(ChainOutcome::Aborted);
            }
        }

        let arounds: Vec<&AroundFn<T>> = selected
            .iter()
            .filter_map(|e| match &e.hook {
                Hook::Around(f) => Some(f),
                _ => None,
            })
            .collect();

        let mut body = Some(body);
        let mut result = None;
        run_around(self.category, &arounds, scope, &mut body, &mut result)?;

        let outcome = match result {
            Some(ChainOutcome::Completed(value)) => {
                if scope.is_halted() {
                    let halt = scope.take_halt();
                    tracing::warn!(
                        "Ignoring halt requested after the {} body completed on '{}': {}",
                        self.category.as_str(),
                        scope.context().event(),
                        halt.reason().unwrap_or("no reason")
                    );
                }
                ChainOutcome::Completed(value)
            }
            Some(ChainOutcome::Aborted) => ChainOutcome::Aborted,
            None => {
                scope.halt_implicitly();
                ChainOutcome::Aborted
            }
        };

        let ChainOutcome::Completed(value) = outcome else {
            tracing::debug!(
                "{} chain aborted on '{}'",
                self.category.as_str(),
                scope.context().event()
            );
            return Ok(ChainOutcome::Aborted);
        };

        for entry in selected.iter().filter(|e| e.phase() == Phase::After) {
            if let Hook::After(step) = &entry.hook {
                self.run_step(Phase::After, step, scope, methods)?;
            }
            if scope.is_halted() {
                let halt = scope.take_halt();
                tracing::warn!(
                    "Ignoring halt requested after {} on '{}': {}",
                    self.category.as_str(),
                    scope.context().event(),
                    halt.reason().unwrap_or("no reason")
                );
            }
        }

        Ok(ChainOutcome::Completed(value))
    }

    fn select(
        &self,
        scope: &Scope<'_, T>,
        methods: &MethodTable<T>,
        state: &str,
    ) -> Result<Vec<&CallbackEntry<T>>, BoxError> {
        let ctx = scope.context();
        let mut selected = Vec::new();
        for entry in &self.entries {
            if !entry.matches(ctx.event(), state) {
                continue;
            }
            let eval = Evaluation {
                methods,
                transition: Some(ctx),
                delegate_prefix: entry.phase().as_str(),
                delegate_name: self.category.as_str(),
            };
            if entry.condition.apply(scope.target(), &eval)? {
                selected.push(entry);
            }
        }
        Ok(selected)
    }

    fn run_step(
        &self,
        phase: Phase,
        step: &Step<T>,
        scope: &mut Scope<'_, T>,
        methods: &MethodTable<T>,
    ) -> Result<(), BoxError> {
        tracing::trace!(
            "Running {}_{} callback on '{}'",
            phase.as_str(),
            self.category.as_str(),
            scope.context().event()
        );
        match step {
            Step::Method(name) => methods.invoke(name, scope, &[]).map(|_| ()),
            Step::Func(f) => f(scope),
        }
    }
}

/// Nests the around callbacks, outermost first, with `body` innermost.
///
/// `result` stays `None` when some around callback never continued.
fn run_around<T, R, F>(
    category: Category,
    arounds: &[&AroundFn<T>],
    scope: &mut Scope<'_, T>,
    body: &mut Option<F>,
    result: &mut Option<ChainOutcome<R>>,
) -> Result<(), BoxError>
where
    F: FnOnce(&mut Scope<'_, T>) -> Result<ChainOutcome<R>, BoxError>,
{
    let Some((around, rest)) = arounds.split_first() else {
        if let Some(body) = body.take() {
            *result = Some(if scope.is_halted() {
                ChainOutcome::Aborted
            } else {
                body(scope)?
            });
        }
        return Ok(());
    };

    tracing::trace!(
        "Running around_{} callback on '{}'",
        category.as_str(),
        scope.context().event()
    );
    let next: &mut Next<'_, T> =
        &mut |inner: &mut Scope<'_, T>| run_around(category, rest, inner, body, result);
    around(scope, next)
}
