//! Serializable specification document.
//!
//! The same document is read and written as JSON or YAML:
//!
//! ```yaml
//! initial_state: draft
//! states:
//!   - name: draft
//!     events:
//!       submit:
//!         - name: submit
//!           transitions_to: review
//!           condition:
//!             if: [{expression: "title != ''"}]
//!   - name: review
//!     events:
//!       approve:
//!         - name: approve
//!           transitions:
//!             - to: published
//!               condition: {if: [{predicate: urgent}]}
//!             - to: scheduled
//! ```
//!
//! Closures are not data: closure filters are left out of `condition` and
//! closure actions are left out of `action`.

use crate::condition::{Condition, Filter};
use crate::error::CoreError;
use crate::event::{Action, Event, Transition};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_args: Vec<String>,
    /// `false` when event targets may name undeclared states.
    #[serde(default = "strict_by_default", skip_serializing_if = "is_strict")]
    pub strict_targets: bool,
    pub states: Vec<StateDocument>,
}

impl Default for SpecificationDocument {
    fn default() -> Self {
        Self {
            initial_state: None,
            meta: Map::new(),
            event_args: Vec::new(),
            strict_targets: true,
            states: Vec::new(),
        }
    }
}

fn strict_by_default() -> bool {
    true
}

fn is_strict(strict: &bool) -> bool {
    *strict
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "EventMap::is_empty")]
    pub events: EventMap,
}

/// Event name to overloads, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMap(pub Vec<(String, Vec<EventDocument>)>);

impl EventMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Vec<EventDocument>)> {
        self.0.iter()
    }
}

impl Serialize for EventMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, events) in &self.0 {
            map.serialize_entry(name, events)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EventMapVisitor;

        impl<'de> Visitor<'de> for EventMapVisitor {
            type Value = EventMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map from event name to a list of events")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut entries: Vec<(String, Vec<EventDocument>)> = Vec::new();
                while let Some((name, events)) = access.next_entry::<String, Vec<EventDocument>>()? {
                    match entries.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, existing)) => existing.extend(events),
                        None => entries.push((name, events)),
                    }
                }
                Ok(EventMap(entries))
            }
        }

        deserializer.deserialize_map(EventMapVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions_to: Option<String>,
    #[serde(default, skip_serializing_if = "ConditionDocument::is_empty")]
    pub condition: ConditionDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionDocument>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl EventDocument {
    pub(crate) fn from_event<T>(event: &Event<T>) -> Self {
        let mut doc = EventDocument {
            name: Some(event.name().to_string()),
            meta: event.meta().clone(),
            ..Default::default()
        };
        match event.transitions() {
            [single] => {
                doc.transitions_to = Some(single.to().to_string());
                doc.condition = ConditionDocument::from_condition(single.condition());
                doc.action = action_name(single);
            }
            many => {
                doc.transitions = many.iter().map(TransitionDocument::from_transition).collect();
            }
        }
        doc
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionDocument {
    pub to: String,
    #[serde(default, skip_serializing_if = "ConditionDocument::is_empty")]
    pub condition: ConditionDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl TransitionDocument {
    fn from_transition<T>(transition: &Transition<T>) -> Self {
        Self {
            to: transition.to().to_string(),
            condition: ConditionDocument::from_condition(transition.condition()),
            action: action_name(transition),
        }
    }
}

fn action_name<T>(transition: &Transition<T>) -> Option<String> {
    transition
        .action()
        .and_then(Action::method_name)
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDocument {
    #[serde(rename = "if", default, skip_serializing_if = "Vec::is_empty")]
    pub if_filters: Vec<FilterDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unless: Vec<FilterDocument>,
}

impl ConditionDocument {
    pub fn is_empty(&self) -> bool {
        self.if_filters.is_empty() && self.unless.is_empty()
    }

    fn from_condition<T>(condition: &Condition<T>) -> Self {
        Self {
            if_filters: condition
                .if_filters()
                .iter()
                .filter_map(FilterDocument::from_filter)
                .collect(),
            unless: condition
                .unless_filters()
                .iter()
                .filter_map(FilterDocument::from_filter)
                .collect(),
        }
    }
}

/// A data filter: exactly one of `predicate` or `expression`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl FilterDocument {
    pub fn predicate(name: impl Into<String>) -> Self {
        Self {
            predicate: Some(name.into()),
            expression: None,
        }
    }

    pub fn expression(source: impl Into<String>) -> Self {
        Self {
            predicate: None,
            expression: Some(source.into()),
        }
    }

    fn from_filter<T>(filter: &Filter<T>) -> Option<Self> {
        match filter {
            Filter::Predicate(name) => Some(Self::predicate(name.clone())),
            Filter::Expression { source, .. } => Some(Self::expression(source.clone())),
            _ => None,
        }
    }

    pub fn to_filter<T>(&self) -> Result<Filter<T>, CoreError> {
        match (&self.predicate, &self.expression) {
            (Some(name), None) => Ok(Filter::predicate(name.clone())),
            (None, Some(source)) => Filter::expression(source.clone()),
            _ => Err(CoreError::definition(
                "a filter needs exactly one of 'predicate' or 'expression'",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Ticket;

    #[test]
    fn test_event_map_preserves_order() {
        let json = r#"{
            "name": "review",
            "events": {
                "reject": [{"transitions_to": "draft"}],
                "approve": [{"transitions_to": "published"}],
                "escalate": [{"transitions_to": "legal"}]
            }
        }"#;
        let state: StateDocument = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = state.events.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["reject", "approve", "escalate"]);

        let out = serde_json::to_string(&state).unwrap();
        let reject = out.find("reject").unwrap();
        let approve = out.find("approve").unwrap();
        assert!(reject < approve);
    }

    #[test]
    fn test_yaml_document() {
        let yaml = r#"
initial_state: draft
meta:
  owner: editorial
states:
  - name: draft
    events:
      submit:
        - transitions_to: review
          condition:
            if:
              - expression: "title != ''"
            unless:
              - predicate: urgent
  - name: review
"#;
        let doc: SpecificationDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.initial_state.as_deref(), Some("draft"));
        assert_eq!(doc.states.len(), 2);
        let (name, events) = &doc.states[0].events.0[0];
        assert_eq!(name, "submit");
        assert_eq!(events[0].transitions_to.as_deref(), Some("review"));
        assert_eq!(
            events[0].condition.if_filters,
            vec![FilterDocument::expression("title != ''")]
        );
        assert_eq!(events[0].condition.unless, vec![FilterDocument::predicate("urgent")]);
        assert!(doc.states[1].events.is_empty());
    }

    #[test]
    fn test_closures_are_not_serialized() {
        let event: Event<Ticket> = Event::new(
            "close",
            vec![Transition::new("closed")
                .with_condition(
                    Condition::new()
                        .when(Filter::predicate("titled"))
                        .when(Filter::unary(|t: &Ticket| t.priority > 0)),
                )
                .with_action(Action::func(|_| Ok(None)))],
            Map::new(),
        )
        .unwrap();

        let doc = EventDocument::from_event(&event);
        assert_eq!(doc.transitions_to.as_deref(), Some("closed"));
        assert_eq!(doc.condition.if_filters, vec![FilterDocument::predicate("titled")]);
        assert!(doc.action.is_none());
    }

    #[test]
    fn test_multi_target_event() {
        let event: Event<Ticket> = Event::new(
            "approve",
            vec![
                Transition::new("published").with_action(Action::method("assign")),
                Transition::new("scheduled"),
            ],
            Map::new(),
        )
        .unwrap();

        let doc = EventDocument::from_event(&event);
        assert!(doc.transitions_to.is_none());
        assert_eq!(doc.transitions.len(), 2);
        assert_eq!(doc.transitions[0].action.as_deref(), Some("assign"));
        assert_eq!(doc.transitions[1].to, "scheduled");
    }

    #[test]
    fn test_filter_needs_exactly_one_kind() {
        let both = FilterDocument {
            predicate: Some("urgent".to_string()),
            expression: Some("priority > 5".to_string()),
        };
        assert!(both.to_filter::<Ticket>().is_err());
        assert!(FilterDocument::default().to_filter::<Ticket>().is_err());
        assert!(matches!(
            FilterDocument::predicate("urgent").to_filter::<Ticket>(),
            Ok(Filter::Predicate(_))
        ));
    }
}
