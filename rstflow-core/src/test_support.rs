//! Host fixture shared by unit tests.

use crate::context::Scope;
use crate::error::BoxError;
use crate::host::Host;
use crate::method::{Arity, MethodTable};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub(crate) struct Ticket {
    pub state: Option<String>,
    pub title: String,
    pub priority: i64,
    pub log: Vec<String>,
    pub persisted: Vec<String>,
    pub fail_persist: bool,
}

impl Ticket {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn in_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Appends `entry` to the ticket's log.
pub(crate) fn note(scope: &mut Scope<'_, Ticket>, entry: &str) {
    scope.target_mut().log.push(entry.to_string());
}

impl Host for Ticket {
    fn load_workflow_state(&self) -> Option<String> {
        self.state.clone()
    }

    fn persist_workflow_state(&mut self, state: &str) -> Result<(), BoxError> {
        if self.fail_persist {
            return Err("version conflict".into());
        }
        self.state = Some(state.to_string());
        self.persisted.push(state.to_string());
        Ok(())
    }

    fn fields(&self) -> Value {
        json!({
            "title": self.title,
            "priority": self.priority,
            "state": self.state,
        })
    }

    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .predicate("urgent", |t: &Ticket| t.priority > 5)
            .predicate("titled", |t: &Ticket| !t.title.is_empty())
            .method("assign", Arity::Exact(1), |scope, args| {
                let entry = format!("assign:{}", args[0]);
                note(scope, &entry);
                Ok(Some(json!("assigned")))
            })
            .method("audit", Arity::Exact(0), |scope, _| {
                note(scope, "audit");
                Ok(None)
            })
            .method("escalate", Arity::AtLeast(1), |scope, args| {
                let entry = format!("escalate:{}", args.len());
                note(scope, &entry);
                Ok(None)
            })
    }
}
