//! Specification builder.
//!
//! ```ignore
//! let spec = SpecificationBuilder::<Article>::new()
//!     .state_with("draft", |s| {
//!         s.event("submit", "review").when_expr("title != ''");
//!     })
//!     .state_with("review", |s| {
//!         s.on("approve", |e| {
//!             e.to("published").when(Filter::predicate("complete"));
//!             e.to("draft");
//!         });
//!     })
//!     .state("published")
//!     .before_transition(|scope| Ok(()))
//!     .build()?;
//! ```
//!
//! Structural errors are collected while declaring and reported by
//! [`SpecificationBuilder::build`].

use crate::callback::{CallbackChain, CallbackEntry, Category, Next};
use crate::condition::Filter;
use crate::config::EngineConfig;
use crate::context::Scope;
use crate::definition::{ErrorHook, Specification, State, StateHook, UnavailableHook};
use crate::document::{ConditionDocument, SpecificationDocument};
use crate::error::{BoxError, CoreError};
use crate::event::{canonical_key, Action, Event, EventCollection, Transition};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const REVERT_PREFIX: &str = "revert_";

/// Declares one event overload on a state.
pub struct EventBuilder<T> {
    name: String,
    transitions: Vec<Transition<T>>,
    meta: Map<String, Value>,
    errors: Vec<CoreError>,
}

impl<T> EventBuilder<T> {
    fn new(name: &str) -> Self {
        Self {
            name: canonical_key(name),
            transitions: Vec::new(),
            meta: Map::new(),
            errors: Vec::new(),
        }
    }

    /// Adds a target. Conditions and actions declared afterwards apply to it.
    pub fn to(&mut self, target: impl Into<String>) -> &mut Self {
        self.transitions.push(Transition::new(target));
        self
    }

    fn last(&mut self, what: &str) -> Option<&mut Transition<T>> {
        if self.transitions.is_empty() {
            let err = CoreError::definition(format!(
                "event '{}' declares {} before any target state",
                self.name, what
            ));
            self.errors.push(err);
        }
        self.transitions.last_mut()
    }

    pub fn when(&mut self, filter: Filter<T>) -> &mut Self {
        if let Some(t) = self.last("a condition") {
            t.condition.push_if(filter);
        }
        self
    }

    pub fn unless(&mut self, filter: Filter<T>) -> &mut Self {
        if let Some(t) = self.last("a condition") {
            t.condition.push_unless(filter);
        }
        self
    }

    /// Adds an `if` guard expression. Parse errors fail the build.
    pub fn when_expr(&mut self, source: &str) -> &mut Self {
        match Filter::expression(source) {
            Ok(filter) => self.when(filter),
            Err(err) => self.fail(err),
        }
    }

    /// Adds an `unless` guard expression. Parse errors fail the build.
    pub fn unless_expr(&mut self, source: &str) -> &mut Self {
        match Filter::expression(source) {
            Ok(filter) => self.unless(filter),
            Err(err) => self.fail(err),
        }
    }

    pub fn when_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.when(Filter::unary(f))
    }

    pub fn action<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        if let Some(t) = self.last("an action") {
            t.action = Some(Action::func(f));
        }
        self
    }

    /// Uses a method from the host's method table as the action.
    pub fn action_method(&mut self, name: impl Into<String>) -> &mut Self {
        if let Some(t) = self.last("an action") {
            t.action = Some(Action::method(name));
        }
        self
    }

    pub fn meta(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    fn fail(&mut self, err: CoreError) -> &mut Self {
        self.errors.push(CoreError::definition(format!(
            "event '{}': {}",
            self.name, err
        )));
        self
    }

    fn apply_condition(&mut self, doc: &ConditionDocument) {
        for filter in &doc.if_filters {
            match filter.to_filter() {
                Ok(filter) => self.when(filter),
                Err(err) => self.fail(err),
            };
        }
        for filter in &doc.unless {
            match filter.to_filter() {
                Ok(filter) => self.unless(filter),
                Err(err) => self.fail(err),
            };
        }
    }
}

/// Declares one state.
pub struct StateBuilder<T> {
    name: String,
    meta: Map<String, Value>,
    on_entry: Option<StateHook<T>>,
    on_exit: Option<StateHook<T>>,
    events: Vec<EventBuilder<T>>,
    on_names: HashSet<String>,
    errors: Vec<CoreError>,
}

impl<T> StateBuilder<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            meta: Map::new(),
            on_entry: None,
            on_exit: None,
            events: Vec::new(),
            on_names: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Declares an event overload targeting `to`. Repeating a name adds
    /// another overload, tried after the earlier ones.
    pub fn event(&mut self, name: &str, to: impl Into<String>) -> &mut EventBuilder<T> {
        let mut event = EventBuilder::new(name);
        event.to(to);
        self.push_event(event)
    }

    /// Declares an event in block form. A name may be used once per state
    /// with this form.
    pub fn on<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut EventBuilder<T>),
    {
        let mut event = EventBuilder::new(name);
        if !self.on_names.insert(event.name.clone()) {
            self.errors.push(CoreError::definition(format!(
                "event '{}' is declared more than once on state '{}'",
                event.name, self.name
            )));
        }
        f(&mut event);
        self.push_event(event);
        self
    }

    /// Declares an overload without a target yet.
    fn declare(&mut self, name: &str) -> &mut EventBuilder<T> {
        self.push_event(EventBuilder::new(name))
    }

    fn push_event(&mut self, event: EventBuilder<T>) -> &mut EventBuilder<T> {
        self.events.push(event);
        let last = self.events.len() - 1;
        &mut self.events[last]
    }

    pub fn meta(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Hook run when entering this state, right after the new state is
    /// persisted.
    pub fn on_entry<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_entry = Some(Arc::new(f));
        self
    }

    /// Hook run when leaving this state, before the entry chain starts.
    pub fn on_exit<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(f));
        self
    }
}

/// Builds a [`Specification`].
pub struct SpecificationBuilder<T> {
    states: Vec<StateBuilder<T>>,
    initial_state: Option<String>,
    meta: Map<String, Value>,
    event_args: Vec<String>,
    revert_events: bool,
    strict_targets: bool,
    transition_chain: CallbackChain<T>,
    exit_chain: CallbackChain<T>,
    entry_chain: CallbackChain<T>,
    on_error: Option<ErrorHook<T>>,
    on_unavailable: Option<UnavailableHook<T>>,
}

impl<T> Default for SpecificationBuilder<T> {
    fn default() -> Self {
        Self::with_config(&EngineConfig::default())
    }
}

impl<T> SpecificationBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            states: Vec::new(),
            initial_state: None,
            meta: Map::new(),
            event_args: Vec::new(),
            revert_events: config.revert_events,
            strict_targets: config.strict_targets,
            transition_chain: CallbackChain::new(Category::Transition),
            exit_chain: CallbackChain::new(Category::Exit),
            entry_chain: CallbackChain::new(Category::Entry),
            on_error: None,
            on_unavailable: None,
        }
    }

    /// Seeds a builder from a document. Validation happens in `build`.
    pub fn from_document(doc: &SpecificationDocument) -> Self {
        let mut builder = Self::new()
            .strict_targets(doc.strict_targets)
            .event_args(doc.event_args.iter());
        builder.meta = doc.meta.clone();
        if let Some(initial) = &doc.initial_state {
            builder = builder.initial_state(initial.as_str());
        }

        for state in &doc.states {
            builder = builder.state_with(state.name.as_str(), |s| {
                s.meta = state.meta.clone();
                for (name, events) in state.events.iter() {
                    for event_doc in events {
                        let event = s.declare(name);
                        if let Some(to) = &event_doc.transitions_to {
                            event.to(to.as_str());
                            event.apply_condition(&event_doc.condition);
                            if let Some(action) = &event_doc.action {
                                event.action_method(action.as_str());
                            }
                        }
                        for transition in &event_doc.transitions {
                            event.to(transition.to.as_str());
                            event.apply_condition(&transition.condition);
                            if let Some(action) = &transition.action {
                                event.action_method(action.as_str());
                            }
                        }
                        event.meta = event_doc.meta.clone();
                    }
                }
            });
        }
        builder
    }

    pub fn state(self, name: impl Into<String>) -> Self {
        self.state_with(name, |_| {})
    }

    pub fn state_with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut StateBuilder<T>),
    {
        let mut state = StateBuilder::new(name.into());
        f(&mut state);
        self.states.push(state);
        self
    }

    /// Overrides the initial state (the first declared state by default).
    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.initial_state = Some(name.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Names bound, in order, to the positional arguments of every event.
    pub fn event_args<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_args = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn revert_events(mut self, enabled: bool) -> Self {
        self.revert_events = enabled;
        self
    }

    pub fn strict_targets(mut self, enabled: bool) -> Self {
        self.strict_targets = enabled;
        self
    }

    pub fn callback(mut self, category: Category, entry: CallbackEntry<T>) -> Self {
        match category {
            Category::Transition => self.transition_chain.register(entry),
            Category::Exit => self.exit_chain.register(entry),
            Category::Entry => self.entry_chain.register(entry),
        }
        self
    }

    pub fn before_transition<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Transition, CallbackEntry::before(f))
    }

    pub fn around_transition<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &mut Next<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Transition, CallbackEntry::around(f))
    }

    pub fn after_transition<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Transition, CallbackEntry::after(f))
    }

    pub fn before_exit<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Exit, CallbackEntry::before(f))
    }

    pub fn around_exit<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &mut Next<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Exit, CallbackEntry::around(f))
    }

    pub fn after_exit<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Exit, CallbackEntry::after(f))
    }

    pub fn before_entry<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Entry, CallbackEntry::before(f))
    }

    pub fn around_entry<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &mut Next<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Entry, CallbackEntry::around(f))
    }

    pub fn after_entry<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callback(Category::Entry, CallbackEntry::after(f))
    }

    /// Hook receiving errors raised by transition actions. The transition is
    /// halted with the error message unless the hook halts first.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>, &CoreError) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Hook consulted when no transition applies. Returning `true` declines
    /// the event instead of failing with `NoTransitionAllowed`.
    pub fn on_unavailable_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, &str, &str, &[Value]) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.on_unavailable = Some(Arc::new(f));
        self
    }

    /// Validates the declarations and compiles the specification.
    pub fn build(self) -> Result<Specification<T>, CoreError> {
        for state in &self.states {
            if let Some(err) = state.errors.first() {
                return Err(CoreError::definition(err_reason(err)));
            }
            for event in &state.events {
                if let Some(err) = event.errors.first() {
                    return Err(CoreError::definition(err_reason(err)));
                }
            }
        }

        if self.states.is_empty() {
            return Err(CoreError::definition("workflow declares no states"));
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, state) in self.states.iter().enumerate() {
            if state.name.is_empty() {
                return Err(CoreError::definition("state name must not be empty"));
            }
            if index.insert(state.name.clone(), i).is_some() {
                return Err(CoreError::definition(format!(
                    "state '{}' is declared more than once",
                    state.name
                )));
            }
        }

        let initial = match &self.initial_state {
            Some(name) => *index.get(name).ok_or_else(|| {
                CoreError::definition(format!("initial state '{}' is not declared", name))
            })?,
            None => 0,
        };

        let mut collections: Vec<EventCollection<T>> = Vec::with_capacity(self.states.len());
        for state in &self.states {
            let mut events = EventCollection::new();
            for event in &state.events {
                if event.transitions.is_empty() {
                    return Err(CoreError::definition(format!(
                        "event '{}' on state '{}' has no target state",
                        event.name, state.name
                    )));
                }
                if self.strict_targets {
                    for t in &event.transitions {
                        if !index.contains_key(&t.to) {
                            return Err(CoreError::definition(format!(
                                "event '{}' on state '{}' transitions to undeclared state '{}'",
                                event.name, state.name, t.to
                            )));
                        }
                    }
                }
                events.push(Event::new(
                    &event.name,
                    event.transitions.clone(),
                    event.meta.clone(),
                )?);
            }
            collections.push(events);
        }

        if self.revert_events {
            synthesize_reverts(&self.states, &index, &mut collections)?;
        }

        let SpecificationBuilder {
            states: builders,
            meta,
            event_args,
            transition_chain,
            exit_chain,
            entry_chain,
            on_error,
            on_unavailable,
            strict_targets,
            ..
        } = self;

        let states = builders
            .into_iter()
            .zip(collections)
            .enumerate()
            .map(|(sequence, (state, events))| State {
                name: state.name,
                sequence,
                meta: state.meta,
                on_entry: state.on_entry,
                on_exit: state.on_exit,
                events,
            })
            .collect();

        let mut spec = Specification {
            states,
            index,
            initial,
            meta,
            event_args,
            transition_chain,
            exit_chain,
            entry_chain,
            on_error,
            on_unavailable,
            strict_targets,
            checksum: 0,
        };
        spec.checksum = spec.compute_checksum()?;

        tracing::debug!(
            "Built workflow with {} states, initial '{}' (checksum {:08x})",
            spec.states.len(),
            spec.initial_state().name(),
            spec.checksum
        );
        Ok(spec)
    }
}

fn err_reason(err: &CoreError) -> String {
    match err {
        CoreError::Definition { reason } => reason.clone(),
        other => other.to_string(),
    }
}

/// Adds `revert_<event>` on each target state, leading back to the source.
///
/// Events already named `revert_*` are not reverted again, and a revert
/// event declared explicitly on the target state is kept as is. Several
/// sources reaching the same target yield overloads in declaration order.
fn synthesize_reverts<T>(
    states: &[StateBuilder<T>],
    index: &HashMap<String, usize>,
    collections: &mut [EventCollection<T>],
) -> Result<(), CoreError> {
    let declared: Vec<HashSet<String>> = collections
        .iter()
        .map(|c| c.names().map(str::to_string).collect())
        .collect();

    let mut reverts: Vec<(usize, String, String)> = Vec::new();
    for state in states {
        for event in &state.events {
            if event.name.starts_with(REVERT_PREFIX) {
                continue;
            }
            let mut seen: HashSet<&str> = HashSet::new();
            for t in &event.transitions {
                if !seen.insert(t.to.as_str()) {
                    continue;
                }
                let Some(&target) = index.get(&t.to) else {
                    continue;
                };
                let name = format!("{}{}", REVERT_PREFIX, event.name);
                if declared[target].contains(&name) {
                    continue;
                }
                let entry = (target, name, state.name.clone());
                if !reverts.contains(&entry) {
                    reverts.push(entry);
                }
            }
        }
    }

    for (target, name, source) in reverts {
        let mut meta = Map::new();
        meta.insert("reverts".to_string(), Value::String(name[REVERT_PREFIX.len()..].to_string()));
        collections[target].push(Event::new(&name, vec![Transition::new(source)], meta)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Ticket;
    use serde_json::json;

    fn builder() -> SpecificationBuilder<Ticket> {
        SpecificationBuilder::new()
    }

    #[test]
    fn test_initial_state_defaults_to_first() {
        let spec = builder().state("new").state("used").build().unwrap();
        assert_eq!(spec.initial_state().name(), "new");
    }

    #[test]
    fn test_initial_state_override() {
        let spec = builder()
            .state("new")
            .state("used")
            .initial_state("used")
            .build()
            .unwrap();
        assert_eq!(spec.initial_state().name(), "used");

        let err = builder().state("new").initial_state("gone").build().unwrap_err();
        assert!(err.to_string().contains("initial state 'gone'"));
    }

    #[test]
    fn test_requires_states() {
        let err = builder().build().unwrap_err();
        assert!(matches!(err, CoreError::Definition { .. }));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let err = builder().state("a").state("a").build().unwrap_err();
        assert!(err.to_string().contains("'a' is declared more than once"));
    }

    #[test]
    fn test_event_without_target_rejected() {
        let err = builder()
            .state_with("a", |s| {
                s.on("go", |_| {});
            })
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid workflow definition: event 'go' on state 'a' has no target state"
        );
    }

    #[test]
    fn test_duplicate_on_event_rejected() {
        let err = builder()
            .state_with("a", |s| {
                s.on("go", |e| {
                    e.to("b");
                });
                s.on(":go", |e| {
                    e.to("a");
                });
            })
            .state("b")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'go' is declared more than once on state 'a'"));
    }

    #[test]
    fn test_classic_overloads_allowed() {
        let spec = builder()
            .state_with("a", |s| {
                s.event("go", "b").when_expr("priority > 3");
                s.event("go", "a");
            })
            .state("b")
            .build()
            .unwrap();
        assert_eq!(spec.state("a").unwrap().events().get("go").len(), 2);
    }

    #[test]
    fn test_undeclared_target() {
        let err = builder()
            .state_with("a", |s| {
                s.event("go", "nowhere");
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("undeclared state 'nowhere'"));

        let lenient = builder()
            .strict_targets(false)
            .state_with("a", |s| {
                s.event("go", "nowhere");
            })
            .build();
        assert!(lenient.is_ok());
    }

    #[test]
    fn test_condition_before_target_rejected() {
        let err = builder()
            .state_with("a", |s| {
                s.on("go", |e| {
                    e.when_expr("priority > 1").to("a");
                });
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("before any target state"));
    }

    #[test]
    fn test_invalid_guard_expression_is_definition_error() {
        let err = builder()
            .state_with("a", |s| {
                s.event("go", "a").when_expr("priority >");
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Definition { .. }));
        assert!(err.to_string().contains("event 'go'"));
    }

    #[test]
    fn test_revert_synthesis() {
        let spec = builder()
            .revert_events(true)
            .state_with("draft", |s| {
                s.event("submit", "review");
            })
            .state_with("review", |s| {
                s.event("approve", "published");
            })
            .state("published")
            .build()
            .unwrap();

        let review = spec.state("review").unwrap().events();
        let revert = &review.get("revert_submit")[0];
        assert_eq!(revert.targets().collect::<Vec<_>>(), vec!["draft"]);
        assert_eq!(revert.meta()["reverts"], json!("submit"));

        let published = spec.state("published").unwrap().events();
        assert_eq!(published.get("revert_approve")[0].transitions()[0].to(), "review");
        assert!(!spec.state("draft").unwrap().events().contains("revert_revert_submit"));
    }

    #[test]
    fn test_revert_skips_existing_and_merges_sources() {
        let spec = builder()
            .revert_events(true)
            .state_with("a", |s| {
                s.event("finish", "done");
            })
            .state_with("b", |s| {
                s.event("finish", "done");
                s.event("revert_finish", "a");
            })
            .state_with("done", |s| {
                s.event("reopen", "a");
            })
            .build()
            .unwrap();

        let done = spec.state("done").unwrap().events();
        let targets: Vec<&str> = done
            .get("revert_finish")
            .iter()
            .flat_map(|e| e.targets())
            .collect();
        assert_eq!(targets, vec!["a", "b"]);

        // explicit revert_finish on "b" is not reverted onto "a"
        assert!(!spec.state("a").unwrap().events().contains("revert_revert_finish"));

        let explicit: Specification<Ticket> = builder()
            .revert_events(true)
            .state_with("a", |s| {
                s.event("go", "b");
            })
            .state_with("b", |s| {
                s.event("revert_go", "c");
            })
            .state("c")
            .build()
            .unwrap();
        let b = explicit.state("b").unwrap().events();
        assert_eq!(b.get("revert_go").len(), 1);
        assert_eq!(b.get("revert_go")[0].transitions()[0].to(), "c");
    }

    #[test]
    fn test_with_config() {
        let config = EngineConfig {
            revert_events: true,
            strict_targets: true,
        };
        let spec = SpecificationBuilder::<Ticket>::with_config(&config)
            .state_with("a", |s| {
                s.event("go", "b");
            })
            .state("b")
            .build()
            .unwrap();
        assert!(spec.state("b").unwrap().events().contains("revert_go"));
    }

    #[test]
    fn test_from_document_multi_target() {
        let json = r#"{
            "initial_state": "review",
            "event_args": ["reason"],
            "states": [
                {"name": "draft"},
                {"name": "review", "events": {"decide": [{
                    "name": "decide",
                    "transitions": [
                        {"to": "draft", "condition": {"if": [{"predicate": "urgent"}]}},
                        {"to": "review", "action": "audit"}
                    ],
                    "meta": {"ui": "button"}
                }]}}
            ]
        }"#;
        let doc: SpecificationDocument = serde_json::from_str(json).unwrap();
        let spec = SpecificationBuilder::<Ticket>::from_document(&doc).build().unwrap();

        assert_eq!(spec.initial_state().name(), "review");
        assert_eq!(spec.event_args(), &["reason".to_string()]);
        let decide = &spec.state("review").unwrap().events().get("decide")[0];
        assert_eq!(decide.transitions().len(), 2);
        assert_eq!(decide.transitions()[1].action().and_then(|a| a.method_name()), Some("audit"));
        assert_eq!(decide.meta()["ui"], json!("button"));
    }

    #[test]
    fn test_callbacks_registered_by_category() {
        let spec = builder()
            .state("a")
            .before_transition(|_| Ok(()))
            .around_exit(|s, next| next(s))
            .after_entry(|_| Ok(()))
            .callback(Category::Entry, CallbackEntry::before_method("audit"))
            .build()
            .unwrap();

        assert_eq!(spec.chain(Category::Transition).entries().len(), 1);
        assert_eq!(spec.chain(Category::Exit).entries().len(), 1);
        assert_eq!(spec.chain(Category::Entry).entries().len(), 2);
    }
}
