//! Binding specifications to host types.
//!
//! A [`Workflow`] pairs a specification with the host's method table and the
//! table of generated operations. The [`WorkflowRegistry`] keeps one binding
//! per host type; binding again replaces the previous one wholesale.

use crate::definition::Specification;
use crate::engine::TransitionExecutor;
use crate::error::CoreError;
use crate::host::Host;
use crate::method::MethodTable;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A generated host-facing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `<state>?`
    IsState(String),
    /// `<event>!`
    Trigger(String),
    /// `can_<event>?`
    CanTrigger(String),
}

/// Operations generated from a specification, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationTable {
    operations: BTreeMap<String, Operation>,
}

impl OperationTable {
    pub fn generate<T>(spec: &Specification<T>) -> Self {
        let mut operations = BTreeMap::new();
        for state in spec.state_names() {
            operations.insert(format!("{state}?"), Operation::IsState(state.to_string()));
        }
        for event in spec.event_names() {
            operations.insert(format!("{event}!"), Operation::Trigger(event.to_string()));
            operations.insert(
                format!("can_{event}?"),
                Operation::CanTrigger(event.to_string()),
            );
        }
        Self { operations }
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name.trim())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Operation names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A specification bound to a host type.
pub struct Workflow<T> {
    spec: Arc<Specification<T>>,
    methods: MethodTable<T>,
    operations: OperationTable,
}

impl<T: Host> Workflow<T> {
    pub fn bind(spec: Specification<T>) -> Self {
        Self::bind_shared(Arc::new(spec))
    }

    /// Binds a specification that may be shared with other bindings.
    pub fn bind_shared(spec: Arc<Specification<T>>) -> Self {
        let operations = OperationTable::generate(spec.as_ref());
        Self {
            spec,
            methods: T::methods(),
            operations,
        }
    }

    pub fn spec(&self) -> &Arc<Specification<T>> {
        &self.spec
    }

    pub fn methods(&self) -> &MethodTable<T> {
        &self.methods
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn executor(&self) -> TransitionExecutor<'_, T> {
        TransitionExecutor::new(self.spec.as_ref(), &self.methods)
    }
}

impl<T> fmt::Debug for Workflow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("spec", &self.spec)
            .field("methods", &self.methods.method_names())
            .field("operations", &self.operations)
            .finish()
    }
}

/// Type-keyed registry of bindings.
#[derive(Default)]
pub struct WorkflowRegistry {
    bindings: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `spec` to `T`, replacing any earlier binding and the operations
    /// generated from it.
    pub fn bind<T: Host>(&self, spec: Specification<T>) -> Arc<Workflow<T>> {
        let workflow = Arc::new(Workflow::bind(spec));
        let previous = self
            .bindings
            .insert(TypeId::of::<T>(), workflow.clone() as Arc<dyn Any + Send + Sync>);
        if previous.is_some() {
            tracing::info!("Replaced workflow bound to {}", std::any::type_name::<T>());
        } else {
            tracing::debug!("Bound workflow to {}", std::any::type_name::<T>());
        }
        workflow
    }

    pub fn get<T: Host>(&self) -> Result<Arc<Workflow<T>>, CoreError> {
        let not_bound = || CoreError::NotBound {
            type_name: std::any::type_name::<T>(),
        };
        let entry = self
            .bindings
            .get(&TypeId::of::<T>())
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(not_bound)?;
        entry.downcast::<Workflow<T>>().map_err(|_| not_bound())
    }

    /// Removes the binding for `T`. Returns whether one existed.
    pub fn unbind<T: Host>(&self) -> bool {
        self.bindings.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn is_bound<T: Host>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SpecificationBuilder;
    use crate::error::BoxError;
    use crate::test_support::Ticket;

    struct Invoice;

    impl Host for Invoice {
        fn load_workflow_state(&self) -> Option<String> {
            None
        }

        fn persist_workflow_state(&mut self, _state: &str) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn ticket_spec(event: &str) -> Specification<Ticket> {
        SpecificationBuilder::new()
            .state_with("open", |s| {
                s.event(event, "closed");
            })
            .state("closed")
            .build()
            .unwrap()
    }

    #[test]
    fn test_operation_names() {
        let ops = OperationTable::generate(&ticket_spec("close"));
        assert_eq!(
            ops.names().collect::<Vec<_>>(),
            vec!["can_close?", "close!", "closed?", "open?"]
        );
        assert_eq!(ops.get("close!"), Some(&Operation::Trigger("close".to_string())));
        assert_eq!(ops.get("open?"), Some(&Operation::IsState("open".to_string())));
        assert!(!ops.contains("reopen!"));
    }

    #[test]
    fn test_registry_bind_and_get() {
        let registry = WorkflowRegistry::new();
        assert!(matches!(registry.get::<Ticket>(), Err(CoreError::NotBound { .. })));

        registry.bind(ticket_spec("close"));
        let workflow = registry.get::<Ticket>().unwrap();
        assert!(workflow.operations().contains("close!"));
        assert!(workflow.methods().has_method("assign"));
        assert!(!registry.is_bound::<Invoice>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rebind_replaces_operations() {
        let registry = WorkflowRegistry::new();
        let first = registry.bind(ticket_spec("close"));
        registry.bind(ticket_spec("resolve"));

        let current = registry.get::<Ticket>().unwrap();
        assert!(current.operations().contains("resolve!"));
        assert!(current.operations().contains("can_resolve?"));
        assert!(!current.operations().contains("close!"));
        assert!(!current.operations().contains("can_close?"));

        // holders of the old binding keep it
        assert!(first.operations().contains("close!"));
    }

    #[test]
    fn test_bindings_are_per_type() {
        let registry = WorkflowRegistry::new();
        registry.bind(ticket_spec("close"));
        registry.bind(
            SpecificationBuilder::<Invoice>::new()
                .state_with("unpaid", |s| {
                    s.event("pay", "paid");
                })
                .state("paid")
                .build()
                .unwrap(),
        );

        assert!(registry.get::<Invoice>().unwrap().operations().contains("pay!"));
        assert!(!registry.get::<Ticket>().unwrap().operations().contains("pay!"));

        assert!(registry.unbind::<Invoice>());
        assert!(!registry.unbind::<Invoice>());
        assert!(registry.is_bound::<Ticket>());
    }
}
