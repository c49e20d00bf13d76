//! Core error types.

use crate::method::Arity;
use thiserror::Error;

/// Error type returned by host-supplied closures (actions, callbacks, hooks,
/// persistence).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid workflow definition: {reason}")]
    Definition { reason: String },

    #[error("no transition allowed: event '{event}' is not applicable in state '{state}'")]
    NoTransitionAllowed { state: String, event: String },

    #[error("event '{event}' transitions to '{target}', which is not a declared state")]
    UnknownTarget { event: String, target: String },

    #[error("persisted state '{state}' is not declared in the workflow")]
    UnknownState { state: String },

    #[error("method '{method}' has arity {arity} but was called with {given} arguments")]
    CallbackArity {
        method: String,
        arity: Arity,
        given: usize,
    },

    #[error("transition halted: {reason}")]
    TransitionHalted { reason: String },

    #[error("undefined method '{name}'")]
    UndefinedMethod { name: String },

    #[error("unknown operation '{name}'")]
    UnknownOperation { name: String },

    #[error("no workflow bound for type {type_name}")]
    NotBound { type_name: &'static str },

    #[error("invalid guard expression: {reason}")]
    InvalidGuard { reason: String },

    #[error("action failed: {0}")]
    Action(#[source] BoxError),

    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error("failed to persist state '{state}': {source}")]
    Persistence {
        state: String,
        #[source]
        source: BoxError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    pub(crate) fn definition(reason: impl Into<String>) -> Self {
        CoreError::Definition {
            reason: reason.into(),
        }
    }

    /// Recovers a `CoreError` that travelled through a host closure as a
    /// `BoxError`; anything else is wrapped with `wrap`.
    pub(crate) fn lift(err: BoxError, wrap: fn(BoxError) -> CoreError) -> CoreError {
        match err.downcast::<CoreError>() {
            Ok(core) => *core,
            Err(other) => wrap(other),
        }
    }

    /// Returns whether this error indicates the operation can be retried.
    ///
    /// Only persistence failures qualify: a concurrent writer may have won an
    /// optimistic-locking race. The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Persistence { .. })
    }

    /// Returns true for the non-error halt raised by `halt_with_error`.
    pub fn is_halt(&self) -> bool {
        matches!(self, CoreError::TransitionHalted { .. })
    }

    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Definition { .. } => "WORKFLOW_DEFINITION",
            CoreError::NoTransitionAllowed { .. } => "NO_TRANSITION_ALLOWED",
            CoreError::UnknownTarget { .. } => "WORKFLOW_ERROR",
            CoreError::UnknownState { .. } => "WORKFLOW_ERROR",
            CoreError::CallbackArity { .. } => "CALLBACK_ARITY",
            CoreError::TransitionHalted { .. } => "TRANSITION_HALTED",
            CoreError::UndefinedMethod { .. } => "UNDEFINED_METHOD",
            CoreError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            CoreError::NotBound { .. } => "NOT_BOUND",
            CoreError::InvalidGuard { .. } => "WORKFLOW_DEFINITION",
            CoreError::Action(_) => "ACTION_FAILED",
            CoreError::Callback(_) => "CALLBACK_FAILED",
            CoreError::Persistence { .. } => "PERSISTENCE_FAILED",
            CoreError::Json(_) => "BAD_DOCUMENT",
            CoreError::Yaml(_) => "BAD_DOCUMENT",
        }
    }
}
