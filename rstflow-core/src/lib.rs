//! # rstflow-core
//!
//! Finite-state workflow engine.
//!
//! This crate provides:
//! - Specification building, validation and (de)serialization
//! - Guard conditions and the guard expression language
//! - Callback chains (before / around / after) for transitions, exits and entries
//! - The transition executor with halting and error semantics
//! - Binding specifications to host types and driving host objects

pub mod binding;
pub mod builder;
pub mod callback;
pub mod condition;
pub mod config;
pub mod context;
pub mod definition;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod host;
pub mod instance;
pub mod method;

#[cfg(test)]
mod test_support;

pub use binding::{Operation, OperationTable, Workflow, WorkflowRegistry};
pub use builder::{EventBuilder, SpecificationBuilder, StateBuilder};
pub use callback::{CallbackChain, CallbackEntry, Category, ChainOutcome, Next, Phase};
pub use condition::{Condition, ConditionDelegate, Filter};
pub use config::{ConfigError, EngineConfig};
pub use context::{Halt, Scope, TransitionContext};
pub use definition::{Specification, State};
pub use document::SpecificationDocument;
pub use engine::{TransitionExecutor, TransitionOutcome};
pub use error::{BoxError, CoreError};
pub use event::{canonical_key, Action, Event, EventCollection, Transition};
pub use guard::{FieldPath, GuardExpr, GuardScope};
pub use host::Host;
pub use instance::WorkflowInstance;
pub use method::{Arity, MethodTable};
