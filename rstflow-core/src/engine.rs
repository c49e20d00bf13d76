//! Transition executor - resolves events and drives the callback chains.
//!
//! One call to [`TransitionExecutor::process_event`] runs to completion:
//!
//! ```text
//! transition chain
//!   exit chain (from state)
//!     on_exit hook
//!     entry chain (to state)
//!       action, persist, on_entry hook
//! ```

use crate::callback::{Category, ChainOutcome};
use crate::context::{Halt, Scope, TransitionContext};
use crate::definition::{Specification, State};
use crate::error::{BoxError, CoreError};
use crate::event::{canonical_key, Action, Transition};
use crate::host::Host;
use crate::method::MethodTable;
use serde_json::Value;

/// Result of processing an event.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The new state was persisted. Carries the action's result, or `true`
    /// when the action returned nothing.
    Completed(Value),
    /// A callback or action halted the transition; nothing was persisted.
    Halted { reason: Option<String> },
    /// No transition applied and the unavailable-transition hook declined
    /// the event.
    Declined,
}

impl TransitionOutcome {
    /// Only completed transitions are truthy.
    pub fn is_truthy(&self) -> bool {
        matches!(self, TransitionOutcome::Completed(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, TransitionOutcome::Halted { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            TransitionOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Runs events of one specification against host objects.
pub struct TransitionExecutor<'w, T> {
    spec: &'w Specification<T>,
    methods: &'w MethodTable<T>,
}

impl<'w, T: Host> TransitionExecutor<'w, T> {
    pub fn new(spec: &'w Specification<T>, methods: &'w MethodTable<T>) -> Self {
        Self { spec, methods }
    }

    /// The host's current state. A host with no state is in the initial state.
    pub fn current_state(&self, host: &T) -> Result<&'w State<T>, CoreError> {
        match host.load_workflow_state() {
            None => Ok(self.spec.initial_state()),
            Some(name) => self
                .spec
                .state(&name)
                .ok_or(CoreError::UnknownState { state: name }),
        }
    }

    /// Whether some transition for `event` applies from the current state.
    /// Never mutates the host.
    pub fn can_trigger(&self, host: &T, event: &str) -> Result<bool, CoreError> {
        let from = self.current_state(host)?;
        Ok(from
            .events()
            .first_applicable(event, host, self.methods)?
            .is_some())
    }

    /// Events of the current state with at least one applicable transition.
    pub fn available_events(&self, host: &T) -> Result<Vec<String>, CoreError> {
        let from = self.current_state(host)?;
        let mut names = Vec::new();
        for name in from.events().names() {
            if from
                .events()
                .first_applicable(name, host, self.methods)?
                .is_some()
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Resolves `event` from the current state and runs the transition.
    ///
    /// `halt` is reset before the callbacks run and holds the halt request
    /// (if any) afterwards.
    pub fn process_event(
        &self,
        host: &mut T,
        halt: &mut Halt,
        event: &str,
        args: Vec<Value>,
    ) -> Result<TransitionOutcome, CoreError> {
        let from = self.current_state(host)?;
        let event = canonical_key(event);

        let Some((_, transition)) = from.events().first_applicable(&event, host, self.methods)?
        else {
            return self.unavailable(host, from, &event, &args);
        };

        let to = self
            .spec
            .state(transition.to())
            .ok_or_else(|| CoreError::UnknownTarget {
                event: event.clone(),
                target: transition.to().to_string(),
            })?;

        tracing::debug!(
            "Resolved '{}' in state '{}' to '{}'",
            event,
            from.name(),
            to.name()
        );

        *halt = Halt::default();
        let ctx = TransitionContext::new(from.name(), to.name(), &event, args, self.spec.event_args());
        let outcome = {
            let mut scope = Scope::new(host, &ctx, halt);
            self.run_chains(&mut scope, from, to, transition)
                .map_err(|e| CoreError::lift(e, CoreError::Callback))?
        };

        match outcome {
            ChainOutcome::Completed(value) => {
                tracing::info!("Transitioned {} -> {} on '{}'", from.name(), to.name(), event);
                Ok(TransitionOutcome::Completed(value))
            }
            ChainOutcome::Aborted => {
                let reason = halt.reason().map(str::to_string);
                tracing::warn!(
                    "Transition {} -> {} on '{}' halted: {}",
                    from.name(),
                    to.name(),
                    event,
                    reason.as_deref().unwrap_or("no reason given")
                );
                if halt.raises() {
                    return Err(CoreError::TransitionHalted {
                        reason: reason.unwrap_or_else(|| "transition halted".to_string()),
                    });
                }
                Ok(TransitionOutcome::Halted { reason })
            }
        }
    }

    fn unavailable(
        &self,
        host: &mut T,
        from: &State<T>,
        event: &str,
        args: &[Value],
    ) -> Result<TransitionOutcome, CoreError> {
        if let Some(hook) = self.spec.on_unavailable() {
            let declined = hook(host, from.name(), event, args)
                .map_err(|e| CoreError::lift(e, CoreError::Callback))?;
            if declined {
                tracing::warn!("Event '{}' declined in state '{}'", event, from.name());
                return Ok(TransitionOutcome::Declined);
            }
        }
        tracing::debug!("No transition for '{}' in state '{}'", event, from.name());
        Err(CoreError::NoTransitionAllowed {
            state: from.name().to_string(),
            event: event.to_string(),
        })
    }

    fn run_chains(
        &self,
        scope: &mut Scope<'_, T>,
        from: &State<T>,
        to: &State<T>,
        transition: &Transition<T>,
    ) -> Result<ChainOutcome<Value>, BoxError> {
        let spec = self.spec;
        spec.chain(Category::Transition)
            .run(scope, self.methods, from.name(), |scope| {
                spec.chain(Category::Exit)
                    .run(scope, self.methods, from.name(), |scope| {
                        if let Some(hook) = from.on_exit() {
                            hook(scope)?;
                            if scope.is_halted() {
                                return Ok(ChainOutcome::Aborted);
                            }
                        }
                        spec.chain(Category::Entry)
                            .run(scope, self.methods, to.name(), |scope| {
                                self.execute(scope, to, transition)
                            })
                    })
            })
    }

    /// Innermost body: action, persistence, entry hook.
    fn execute(
        &self,
        scope: &mut Scope<'_, T>,
        to: &State<T>,
        transition: &Transition<T>,
    ) -> Result<ChainOutcome<Value>, BoxError> {
        let result = match self.run_action(scope, transition) {
            Ok(result) => result,
            Err(err) => {
                let err = CoreError::lift(err, CoreError::Action);
                if matches!(err, CoreError::CallbackArity { .. }) {
                    return Err(err.into());
                }
                let Some(hook) = self.spec.on_error() else {
                    return Err(err.into());
                };
                tracing::debug!("Action for '{}' failed: {}", scope.context().event(), err);
                hook(scope, &err)?;
                scope.halt(err.to_string());
                None
            }
        };

        if scope.is_halted() {
            return Ok(ChainOutcome::Aborted);
        }

        scope
            .target_mut()
            .persist_workflow_state(to.name())
            .map_err(|source| CoreError::Persistence {
                state: to.name().to_string(),
                source,
            })?;

        if let Some(hook) = to.on_entry() {
            hook(scope)?;
            if scope.is_halted() {
                let halt = scope.take_halt();
                tracing::warn!(
                    "Ignoring halt requested on entry to '{}': {}",
                    to.name(),
                    halt.reason().unwrap_or("no reason given")
                );
            }
        }

        Ok(ChainOutcome::Completed(result.unwrap_or(Value::Bool(true))))
    }

    /// Runs the transition's action, then the host method named after the
    /// event when the action produced no value.
    fn run_action(
        &self,
        scope: &mut Scope<'_, T>,
        transition: &Transition<T>,
    ) -> Result<Option<Value>, BoxError> {
        let ctx = scope.context();
        let event = ctx.event();
        let mut result = match transition.action() {
            Some(Action::Func(f)) => f(scope)?,
            Some(Action::Method(name)) => self.methods.invoke(name, scope, ctx.args())?,
            None => None,
        };

        let already_ran = transition.action().and_then(Action::method_name) == Some(event);
        if result.is_none() && !already_ran && self.methods.has_method(event) {
            result = self.methods.invoke(event, scope, ctx.args())?;
        }
        Ok(result)
    }
}
