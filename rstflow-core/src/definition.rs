//! Compiled workflow specification.
//!
//! A [`Specification`] is produced by the builder (or from a document) and
//! is immutable afterwards. Re-binding replaces it wholesale.

use crate::builder::SpecificationBuilder;
use crate::callback::{CallbackChain, Category};
use crate::context::Scope;
use crate::document::{EventDocument, EventMap, SpecificationDocument, StateDocument};
use crate::error::{BoxError, CoreError};
use crate::event::{canonical_key, EventCollection};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-state entry or exit hook.
pub type StateHook<T> = Arc<dyn Fn(&mut Scope<'_, T>) -> Result<(), BoxError> + Send + Sync>;

/// Receives an action error. The transition is halted afterwards.
pub type ErrorHook<T> =
    Arc<dyn Fn(&mut Scope<'_, T>, &CoreError) -> Result<(), BoxError> + Send + Sync>;

/// Called with `(target, from, event, args)` when no transition applies.
/// Returning `true` declines the event quietly.
pub type UnavailableHook<T> =
    Arc<dyn Fn(&mut T, &str, &str, &[Value]) -> Result<bool, BoxError> + Send + Sync>;

/// A named node of the workflow.
pub struct State<T> {
    pub(crate) name: String,
    pub(crate) sequence: usize,
    pub(crate) meta: Map<String, Value>,
    pub(crate) on_entry: Option<StateHook<T>>,
    pub(crate) on_exit: Option<StateHook<T>>,
    pub(crate) events: EventCollection<T>,
}

impl<T> State<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in declaration order.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn events(&self) -> &EventCollection<T> {
        &self.events
    }

    pub fn on_entry(&self) -> Option<&StateHook<T>> {
        self.on_entry.as_ref()
    }

    pub fn on_exit(&self) -> Option<&StateHook<T>> {
        self.on_exit.as_ref()
    }

    fn to_document(&self) -> StateDocument {
        StateDocument {
            name: self.name.clone(),
            meta: self.meta.clone(),
            events: EventMap(
                self.events
                    .iter()
                    .map(|(name, list)| {
                        (
                            name.to_string(),
                            list.iter().map(EventDocument::from_event).collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

impl<T> PartialEq for State<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> PartialOrd for State<T> {
    /// Orders states by declaration. Distinct states sharing a sequence
    /// number (from different specifications) are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.name == other.name {
            return Some(Ordering::Equal);
        }
        match self.sequence.cmp(&other.sequence) {
            Ordering::Equal => None,
            ordering => Some(ordering),
        }
    }
}

impl<T> fmt::Display for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("sequence", &self.sequence)
            .field("meta", &self.meta)
            .field("events", &self.events)
            .finish()
    }
}

/// An immutable workflow: states, events, callback chains and hooks.
pub struct Specification<T> {
    pub(crate) states: Vec<State<T>>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) initial: usize,
    pub(crate) meta: Map<String, Value>,
    pub(crate) event_args: Vec<String>,
    pub(crate) transition_chain: CallbackChain<T>,
    pub(crate) exit_chain: CallbackChain<T>,
    pub(crate) entry_chain: CallbackChain<T>,
    pub(crate) on_error: Option<ErrorHook<T>>,
    pub(crate) on_unavailable: Option<UnavailableHook<T>>,
    pub(crate) strict_targets: bool,
    pub(crate) checksum: u32,
}

impl<T> Specification<T> {
    pub fn builder() -> SpecificationBuilder<T> {
        SpecificationBuilder::new()
    }

    /// States in declaration order.
    pub fn states(&self) -> &[State<T>] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&State<T>> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn initial_state(&self) -> &State<T> {
        &self.states[self.initial]
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    /// Distinct event names across all states, in first-declaration order.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for state in &self.states {
            for name in state.events.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Whether any state declares `event`.
    pub fn has_event(&self, event: &str) -> bool {
        let key = canonical_key(event);
        self.states.iter().any(|s| s.events.contains(&key))
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Names bound, in order, to the positional arguments of every event.
    pub fn event_args(&self) -> &[String] {
        &self.event_args
    }

    pub fn chain(&self, category: Category) -> &CallbackChain<T> {
        match category {
            Category::Transition => &self.transition_chain,
            Category::Exit => &self.exit_chain,
            Category::Entry => &self.entry_chain,
        }
    }

    pub fn on_error(&self) -> Option<&ErrorHook<T>> {
        self.on_error.as_ref()
    }

    pub fn on_unavailable(&self) -> Option<&UnavailableHook<T>> {
        self.on_unavailable.as_ref()
    }

    /// Whether undeclared targets were rejected at build time.
    pub fn strict_targets(&self) -> bool {
        self.strict_targets
    }

    /// CRC32C of the canonical JSON document.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn to_document(&self) -> SpecificationDocument {
        SpecificationDocument {
            initial_state: Some(self.initial_state().name.clone()),
            meta: self.meta.clone(),
            event_args: self.event_args.clone(),
            strict_targets: self.strict_targets,
            states: self.states.iter().map(State::to_document).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn to_yaml(&self) -> Result<String, CoreError> {
        Ok(serde_yaml::to_string(&self.to_document())?)
    }

    /// Builds a specification from a document, validating it like the
    /// builder does.
    pub fn from_document(doc: &SpecificationDocument) -> Result<Self, CoreError> {
        SpecificationBuilder::from_document(doc).build()
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let doc: SpecificationDocument = serde_json::from_str(json)?;
        Self::from_document(&doc)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CoreError> {
        let doc: SpecificationDocument = serde_yaml::from_str(yaml)?;
        Self::from_document(&doc)
    }

    pub(crate) fn compute_checksum(&self) -> Result<u32, CoreError> {
        let bytes = serde_json::to_vec(&self.to_document())?;
        Ok(crc32c::crc32c(&bytes))
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("states", &self.states)
            .field("initial", &self.initial_state().name)
            .field("meta", &self.meta)
            .field("event_args", &self.event_args)
            .field("transition_chain", &self.transition_chain)
            .field("exit_chain", &self.exit_chain)
            .field("entry_chain", &self.entry_chain)
            .field("checksum", &self.checksum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Filter;
    use crate::config::EngineConfig;
    use crate::test_support::Ticket;
    use proptest::prelude::*;
    use serde_json::json;

    fn review_workflow() -> Specification<Ticket> {
        SpecificationBuilder::new()
            .meta("owner", json!("editorial"))
            .event_args(["reviewer"])
            .state_with("draft", |s| {
                s.meta("color", json!("grey"));
                s.event("submit", "review");
            })
            .state_with("review", |s| {
                s.event("approve", "published")
                    .when(Filter::predicate("titled"))
                    .action_method("assign");
                s.event("approve", "draft");
                s.on("reject", |e| {
                    e.to("draft").when_expr("priority < 3");
                    e.to("archived");
                });
            })
            .state("published")
            .state("archived")
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_ordering() {
        let spec = review_workflow();
        let draft = spec.state("draft").unwrap();
        let review = spec.state("review").unwrap();
        let published = spec.state("published").unwrap();

        assert!(draft < review);
        assert!(published > review);
        assert!(draft <= draft);
        assert_eq!(draft, spec.initial_state());
    }

    #[test]
    fn test_state_equality_is_by_name() {
        let a = review_workflow();
        let b: Specification<Ticket> = SpecificationBuilder::new()
            .state("published")
            .state("draft")
            .build()
            .unwrap();

        assert_eq!(a.state("draft").unwrap(), b.state("draft").unwrap());
        assert_ne!(a.state("draft").unwrap().sequence(), b.state("draft").unwrap().sequence());
    }

    #[test]
    fn test_event_names() {
        let spec = review_workflow();
        assert_eq!(spec.event_names(), vec!["submit", "approve", "reject"]);
        assert!(spec.has_event(":approve"));
        assert!(!spec.has_event("publish"));
    }

    #[test]
    fn test_json_roundtrip() {
        let spec = review_workflow();
        let json = spec.to_json().unwrap();
        let rebuilt: Specification<Ticket> = Specification::from_json(&json).unwrap();

        assert_eq!(rebuilt.to_document(), spec.to_document());
        assert_eq!(rebuilt.checksum(), spec.checksum());
        assert_eq!(rebuilt.event_args(), &["reviewer".to_string()]);
        assert_eq!(rebuilt.state("draft").unwrap().meta()["color"], json!("grey"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let spec = review_workflow();
        let yaml = spec.to_yaml().unwrap();
        let rebuilt: Specification<Ticket> = Specification::from_yaml(&yaml).unwrap();
        assert_eq!(rebuilt.to_document(), spec.to_document());
    }

    #[test]
    fn test_lenient_targets_survive_roundtrip() {
        let spec: Specification<Ticket> = SpecificationBuilder::new()
            .strict_targets(false)
            .state_with("open", |s| {
                s.event("close", "closd");
            })
            .build()
            .unwrap();

        let json = spec.to_json().unwrap();
        assert!(json.contains("\"strict_targets\": false"));
        let rebuilt: Specification<Ticket> = Specification::from_json(&json).unwrap();
        assert!(!rebuilt.strict_targets());
        assert_eq!(rebuilt.to_document(), spec.to_document());

        let rebuilt: Specification<Ticket> = Specification::from_yaml(&spec.to_yaml().unwrap()).unwrap();
        assert!(!rebuilt.strict_targets());

        // strict documents leave the flag out
        assert!(!review_workflow().to_json().unwrap().contains("strict_targets"));
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = review_workflow();
        let b: Specification<Ticket> = SpecificationBuilder::new()
            .state_with("draft", |s| {
                s.event("submit", "review");
            })
            .state("review")
            .build()
            .unwrap();
        assert_ne!(a.checksum(), b.checksum());
        assert_eq!(a.checksum(), review_workflow().checksum());
    }

    #[test]
    fn test_from_document_validates() {
        let json = r#"{"states": [{"name": "a", "events": {"go": [{"transitions_to": "b"}]}}]}"#;
        let err = Specification::<Ticket>::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::Definition { .. }));

        let json = r#"{"states": [{"name": "a", "events": {"go": [{"name": "go"}]}}]}"#;
        let err = Specification::<Ticket>::from_json(json).unwrap_err();
        assert!(err.to_string().contains("no target"));
    }

    #[test]
    fn test_bad_document() {
        assert!(matches!(
            Specification::<Ticket>::from_json("{\"states\": 3}"),
            Err(CoreError::Json(_))
        ));
    }

    fn state_name() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_initial_state_is_first_declared(
            names in proptest::collection::hash_set(state_name(), 1..8)
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let mut builder = SpecificationBuilder::<Ticket>::new();
            for name in &names {
                builder = builder.state(name);
            }
            let spec = builder.build().unwrap();
            prop_assert_eq!(spec.initial_state().name(), names[0].as_str());
            prop_assert_eq!(spec.state_names().collect::<Vec<_>>(), names.iter().map(String::as_str).collect::<Vec<_>>());
        }

        #[test]
        fn prop_roundtrip_preserves_document(
            names in proptest::collection::hash_set(state_name(), 2..6),
            revert in any::<bool>(),
            strict in any::<bool>(),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let config = EngineConfig { revert_events: revert, strict_targets: strict };
            let mut builder = SpecificationBuilder::<Ticket>::with_config(&config);
            for (i, name) in names.iter().enumerate() {
                let next = names[(i + 1) % names.len()].clone();
                builder = builder.state_with(name, move |s| {
                    s.event(&format!("to_{next}"), &next);
                    if !strict {
                        s.event("retire", "RETIRED");
                    }
                });
            }
            let spec = builder.build().unwrap();
            let rebuilt = Specification::<Ticket>::from_json(&spec.to_json().unwrap()).unwrap();
            prop_assert_eq!(rebuilt.to_document(), spec.to_document());
            prop_assert_eq!(rebuilt.strict_targets(), strict);
            prop_assert_eq!(rebuilt.checksum(), spec.checksum());
        }

        #[test]
        fn prop_undeclared_target_rejected(
            names in proptest::collection::hash_set(state_name(), 1..6),
            missing in "[A-Z]{1,4}",
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let mut builder = SpecificationBuilder::<Ticket>::new();
            for name in &names {
                let target = missing.clone();
                builder = builder.state_with(name, move |s| {
                    s.event("go", &target);
                });
            }
            let is_definition_error = matches!(builder.build(), Err(CoreError::Definition { .. }));
            prop_assert!(is_definition_error);
        }
    }
}
