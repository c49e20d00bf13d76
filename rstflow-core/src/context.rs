//! Per-call transition context and the scope handed to host closures.

use serde_json::{json, Map, Value};

/// Immutable record of one in-flight transition.
///
/// Created at the start of `process_event` and dropped when it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionContext {
    from: String,
    to: String,
    event: String,
    args: Vec<Value>,
    named: Map<String, Value>,
}

impl TransitionContext {
    /// Builds a context, binding positional `args` to the declared
    /// `event_args` names in order. Surplus arguments stay positional only.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
        args: Vec<Value>,
        event_args: &[String],
    ) -> Self {
        let named = event_args
            .iter()
            .zip(args.iter())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            from: from.into(),
            to: to.into(),
            event: event.into(),
            args,
            named,
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn named(&self) -> &Map<String, Value> {
        &self.named
    }

    pub fn named_arg(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// JSON view used by the `transition.` root of guard expressions.
    pub fn to_value(&self) -> Value {
        json!({
            "from": self.from,
            "to": self.to,
            "event": self.event,
            "args": self.args,
            "named": self.named,
        })
    }
}

/// Halt request recorded during one transition.
///
/// The first request wins: an inner level that halts is never overwritten by
/// an outer level halting afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Halt {
    halted: bool,
    reason: Option<String>,
    raise: bool,
}

impl Halt {
    pub(crate) fn request(&mut self, reason: Option<String>, raise: bool) {
        if self.halted {
            return;
        }
        self.halted = true;
        self.reason = reason;
        self.raise = raise;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Whether the halt was requested through `halt_with_error`.
    pub fn raises(&self) -> bool {
        self.raise
    }
}

/// What actions, callbacks and hooks receive while a transition runs.
pub struct Scope<'a, T> {
    target: &'a mut T,
    context: &'a TransitionContext,
    halt: &'a mut Halt,
}

impl<'a, T> Scope<'a, T> {
    pub(crate) fn new(target: &'a mut T, context: &'a TransitionContext, halt: &'a mut Halt) -> Self {
        Self {
            target,
            context,
            halt,
        }
    }

    pub fn target(&self) -> &T {
        &*self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut *self.target
    }

    pub fn context(&self) -> &'a TransitionContext {
        self.context
    }

    /// Stops the transition; `process_event` returns a halted outcome.
    pub fn halt(&mut self, reason: impl Into<String>) {
        self.halt.request(Some(reason.into()), false);
    }

    /// Stops the transition; `process_event` fails with `TransitionHalted`.
    pub fn halt_with_error(&mut self, reason: impl Into<String>) {
        self.halt.request(Some(reason.into()), true);
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }

    pub fn halted_because(&self) -> Option<&str> {
        self.halt.reason()
    }

    /// Marks the transition halted without a reason (an around callback that
    /// never continued).
    pub(crate) fn halt_implicitly(&mut self) {
        self.halt.request(None, false);
    }

    /// Clears and returns the current halt request.
    pub(crate) fn take_halt(&mut self) -> Halt {
        std::mem::take(self.halt)
    }
}
