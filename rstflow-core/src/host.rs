//! The contract a host type implements to be driven by a workflow.

use crate::error::BoxError;
use crate::method::MethodTable;
use serde_json::Value;

/// A type whose instances move through a workflow.
///
/// The host owns its current state. The engine reads it fresh at the start of
/// every transition and writes it exactly once per successful transition.
pub trait Host: Sized + 'static {
    /// Current state name, or `None` for "not yet in a state" (the engine
    /// substitutes the initial state).
    fn load_workflow_state(&self) -> Option<String>;

    /// Persists the new state. Errors propagate as `CoreError::Persistence`;
    /// an optimistic-locking conflict should be reported here.
    fn persist_workflow_state(&mut self, state: &str) -> Result<(), BoxError>;

    /// Attribute view consulted by textual guard expressions.
    fn fields(&self) -> Value {
        Value::Null
    }

    /// Named predicates and methods available to the workflow.
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
    }
}
