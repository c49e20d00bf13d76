//! Events, transitions and the per-state event collection.

use crate::condition::{Condition, Evaluation};
use crate::context::Scope;
use crate::error::{BoxError, CoreError};
use crate::host::Host;
use crate::method::MethodTable;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Inline transition action.
pub type ActionFn<T> =
    Arc<dyn Fn(&mut Scope<'_, T>) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// What runs when a transition fires.
pub enum Action<T> {
    /// Method from the host's method table, called with the event arguments.
    Method(String),
    Func(ActionFn<T>),
}

impl<T> Action<T> {
    pub fn method(name: impl Into<String>) -> Self {
        Action::Method(name.into())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, T>) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Action::Func(Arc::new(f))
    }

    pub fn method_name(&self) -> Option<&str> {
        match self {
            Action::Method(name) => Some(name),
            Action::Func(_) => None,
        }
    }

    /// Identity used when deduplicating events: the method name, or the
    /// closure's address.
    fn identity(&self) -> String {
        match self {
            Action::Method(name) => format!("method:{name}"),
            Action::Func(f) => format!("fn:{:p}", Arc::as_ptr(f) as *const ()),
        }
    }
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        match self {
            Action::Method(name) => Action::Method(name.clone()),
            Action::Func(f) => Action::Func(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Action::Func(_) => f.write_str("Func(<fn>)"),
        }
    }
}

/// One guarded target of an event.
pub struct Transition<T> {
    pub(crate) to: String,
    pub(crate) condition: Condition<T>,
    pub(crate) action: Option<Action<T>>,
}

impl<T> Transition<T> {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            condition: Condition::new(),
            action: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition<T>) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_action(mut self, action: Action<T>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn condition(&self) -> &Condition<T> {
        &self.condition
    }

    pub fn action(&self) -> Option<&Action<T>> {
        self.action.as_ref()
    }
}

impl<T> Clone for Transition<T> {
    fn clone(&self) -> Self {
        Self {
            to: self.to.clone(),
            condition: self.condition.clone(),
            action: self.action.clone(),
        }
    }
}

impl<T> fmt::Debug for Transition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("to", &self.to)
            .field("condition", &self.condition)
            .field("action", &self.action)
            .finish()
    }
}

/// A named family of guarded transitions.
pub struct Event<T> {
    name: String,
    transitions: Vec<Transition<T>>,
    meta: Map<String, Value>,
}

impl<T> Event<T> {
    /// Creates an event. An event must have at least one transition.
    pub fn new(
        name: &str,
        transitions: Vec<Transition<T>>,
        meta: Map<String, Value>,
    ) -> Result<Self, CoreError> {
        let name = canonical_key(name);
        if name.is_empty() {
            return Err(CoreError::definition("event name must not be empty"));
        }
        if transitions.is_empty() {
            return Err(CoreError::definition(format!(
                "event '{name}' has no target state"
            )));
        }
        Ok(Self {
            name,
            transitions,
            meta,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &[Transition<T>] {
        &self.transitions
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.transitions.iter().map(|t| t.to.as_str())
    }

    fn dedup_key(&self) -> String {
        let targets: Vec<&str> = self.targets().collect();
        let actions: Vec<String> = self
            .transitions
            .iter()
            .map(|t| t.action.as_ref().map(Action::identity).unwrap_or_default())
            .collect();
        format!(
            "{}|{}|{}|{}",
            self.name,
            targets.join(","),
            Value::Object(self.meta.clone()),
            actions.join(",")
        )
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            transitions: self.transitions.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("transitions", &self.transitions)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Canonical form of an event name: surrounding whitespace, a leading `:`
/// and a trailing `!` are dropped.
pub fn canonical_key(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_prefix(':').unwrap_or(name);
    let name = name.strip_suffix('!').unwrap_or(name);
    name.trim().to_string()
}

/// Events declared on one state, keyed by canonical name.
///
/// Same-named events are overloads, tried in declaration order.
pub struct EventCollection<T> {
    order: Vec<String>,
    events: HashMap<String, Vec<Event<T>>>,
}

impl<T> Default for EventCollection<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            events: HashMap::new(),
        }
    }
}

impl<T> Clone for EventCollection<T> {
    fn clone(&self) -> Self {
        Self {
            order: self.order.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T> fmt::Debug for EventCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T> EventCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an overload for the event's name.
    pub fn push(&mut self, event: Event<T>) {
        match self.events.get_mut(event.name()) {
            Some(list) => list.push(event),
            None => {
                self.order.push(event.name().to_string());
                self.events.insert(event.name().to_string(), vec![event]);
            }
        }
    }

    /// All overloads for `name`; empty when the event is not declared.
    pub fn get(&self, name: &str) -> &[Event<T>] {
        self.events
            .get(&canonical_key(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(&canonical_key(name))
    }

    /// Event names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(name, overloads)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Event<T>])> {
        self.order.iter().filter_map(move |name| {
            self.events
                .get(name)
                .map(|list| (name.as_str(), list.as_slice()))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every distinct event, deduplicated by name, targets, meta and action.
    pub fn flat(&self) -> Vec<&Event<T>> {
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for (_, list) in self.iter() {
            for event in list {
                let key = event.dedup_key();
                if !seen.contains(&key) {
                    seen.push(key);
                    out.push(event);
                }
            }
        }
        out
    }
}

impl<T: Host> EventCollection<T> {
    /// First transition, scanning overloads then their transitions in
    /// order, whose condition holds for `target`.
    pub fn first_applicable(
        &self,
        name: &str,
        target: &T,
        methods: &MethodTable<T>,
    ) -> Result<Option<(&Event<T>, &Transition<T>)>, CoreError> {
        let key = canonical_key(name);
        let eval = Evaluation::for_event(methods, &key);
        for event in self.get(&key) {
            for transition in &event.transitions {
                if transition.condition.apply(target, &eval)? {
                    return Ok(Some((event, transition)));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Filter;
    use crate::test_support::Ticket;

    fn event(name: &str, to: &str) -> Event<Ticket> {
        Event::new(name, vec![Transition::new(to)], Map::new()).unwrap()
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key(":submit"), "submit");
        assert_eq!(canonical_key("submit!"), "submit");
        assert_eq!(canonical_key("  submit "), "submit");
        assert_eq!(canonical_key("revert_submit"), "revert_submit");
    }

    #[test]
    fn test_event_requires_transition() {
        let err = Event::<Ticket>::new("close", vec![], Map::new()).unwrap_err();
        assert!(matches!(err, CoreError::Definition { .. }));
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn test_lookup_normalizes_names() {
        let mut events = EventCollection::new();
        events.push(event("submit", "review"));
        assert!(events.contains(":submit"));
        assert_eq!(events.get("submit!").len(), 1);
        assert!(events.get("approve").is_empty());
    }

    #[test]
    fn test_overloads_keep_declaration_order() {
        let mut events = EventCollection::new();
        events.push(event("publish", "live"));
        events.push(event("archive", "archived"));
        events.push(event("publish", "scheduled"));

        assert_eq!(events.names().collect::<Vec<_>>(), vec!["publish", "archive"]);
        let targets: Vec<&str> = events.get("publish").iter().flat_map(|e| e.targets()).collect();
        assert_eq!(targets, vec!["live", "scheduled"]);
    }

    #[test]
    fn test_first_applicable_scans_in_order() {
        let methods = Ticket::methods();
        let mut events = EventCollection::new();
        events.push(
            Event::new(
                "publish",
                vec![Transition::new("featured").with_condition(
                    Condition::new().when(Filter::expression("title == 'foobar'").unwrap()),
                )],
                Map::new(),
            )
            .unwrap(),
        );
        events.push(event("publish", "live"));

        let (_, t) = events
            .first_applicable("publish", &Ticket::new("foobar"), &methods)
            .unwrap()
            .unwrap();
        assert_eq!(t.to(), "featured");

        let (_, t) = events
            .first_applicable("publish", &Ticket::new("other"), &methods)
            .unwrap()
            .unwrap();
        assert_eq!(t.to(), "live");

        assert!(events
            .first_applicable("retract", &Ticket::new("x"), &methods)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_flat_deduplicates() {
        let shared = Action::<Ticket>::func(|_| Ok(None));
        let mut events = EventCollection::new();
        events.push(
            Event::new(
                "close",
                vec![Transition::new("closed").with_action(shared.clone())],
                Map::new(),
            )
            .unwrap(),
        );
        events.push(
            Event::new(
                "close",
                vec![Transition::new("closed").with_action(shared)],
                Map::new(),
            )
            .unwrap(),
        );
        events.push(event("close", "archived"));

        assert_eq!(events.get("close").len(), 3);
        assert_eq!(events.flat().len(), 2);
    }
}
