//! Host objects driven through a bound workflow.

use crate::binding::{Operation, Workflow, WorkflowRegistry};
use crate::context::Halt;
use crate::definition::{Specification, State};
use crate::engine::TransitionOutcome;
use crate::error::CoreError;
use crate::host::Host;
use serde_json::Value;
use std::sync::Arc;

/// A host object together with the workflow it runs under.
///
/// The instance keeps the halt flag and reason of the most recent
/// `process_event` call; each call resets them before callbacks run.
pub struct WorkflowInstance<T: Host> {
    host: T,
    workflow: Arc<Workflow<T>>,
    halt: Halt,
}

impl<T: Host> WorkflowInstance<T> {
    pub fn new(host: T, workflow: Arc<Workflow<T>>) -> Self {
        Self {
            host,
            workflow,
            halt: Halt::default(),
        }
    }

    /// Uses the workflow bound to `T` in `registry`.
    pub fn from_registry(host: T, registry: &WorkflowRegistry) -> Result<Self, CoreError> {
        Ok(Self::new(host, registry.get::<T>()?))
    }

    /// Gives this object a specification of its own, independent of any
    /// binding for `T`.
    pub fn ad_hoc(host: T, spec: Specification<T>) -> Self {
        Self::new(host, Arc::new(Workflow::bind(spec)))
    }

    pub fn host(&self) -> &T {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut T {
        &mut self.host
    }

    pub fn into_host(self) -> T {
        self.host
    }

    pub fn workflow(&self) -> &Arc<Workflow<T>> {
        &self.workflow
    }

    pub fn spec(&self) -> &Specification<T> {
        self.workflow.spec()
    }

    pub fn current_state(&self) -> Result<&State<T>, CoreError> {
        self.workflow.executor().current_state(&self.host)
    }

    pub fn is_state(&self, name: &str) -> Result<bool, CoreError> {
        Ok(self.current_state()?.name() == name)
    }

    /// Runs `event` with `args` from the current state.
    pub fn process_event(
        &mut self,
        event: &str,
        args: Vec<Value>,
    ) -> Result<TransitionOutcome, CoreError> {
        let executor = self.workflow.executor();
        executor.process_event(&mut self.host, &mut self.halt, event, args)
    }

    /// `process_event` with no arguments.
    pub fn trigger(&mut self, event: &str) -> Result<TransitionOutcome, CoreError> {
        self.process_event(event, Vec::new())
    }

    pub fn can_trigger(&self, event: &str) -> Result<bool, CoreError> {
        self.workflow
            .executor()
            .can_trigger(&self.host, &crate::event::canonical_key(event))
    }

    pub fn available_events(&self) -> Result<Vec<String>, CoreError> {
        self.workflow.executor().available_events(&self.host)
    }

    /// Whether the last `process_event` call was halted.
    pub fn halted(&self) -> bool {
        self.halt.is_halted()
    }

    pub fn halted_because(&self) -> Option<&str> {
        self.halt.reason()
    }

    /// Dispatches a generated operation by name.
    ///
    /// Predicates answer with a boolean. Triggers answer with the action's
    /// result, or `false` when the transition was halted or declined.
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value, CoreError> {
        let operation = self
            .workflow
            .operations()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownOperation {
                name: name.to_string(),
            })?;

        match operation {
            Operation::IsState(state) => Ok(Value::Bool(self.is_state(&state)?)),
            Operation::CanTrigger(event) => Ok(Value::Bool(self.can_trigger(&event)?)),
            Operation::Trigger(event) => match self.process_event(&event, args)? {
                TransitionOutcome::Completed(value) => Ok(value),
                TransitionOutcome::Halted { .. } | TransitionOutcome::Declined => {
                    Ok(Value::Bool(false))
                }
            },
        }
    }
}

impl<T: Host + std::fmt::Debug> std::fmt::Debug for WorkflowInstance<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInstance")
            .field("host", &self.host)
            .field("halt", &self.halt)
            .finish()
    }
}
