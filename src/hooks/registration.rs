use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle instants the host reports to the dispatcher.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HookEvent {
    SessionStart,
    SessionEnd,
    PreTask,
    PostTask,
}

/// Predicate over task attributes. A small tagged expression instead of a
/// scripting language: equals / contains / any-of, plus conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
    Equals { key: String, value: String },
    Contains { key: String, value: String },
    AnyOf { key: String, values: Vec<String> },
    All { exprs: Vec<FilterExpr> },
}

impl FilterExpr {
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        match self {
            Self::Equals { key, value } => attributes.get(key).is_some_and(|v| v == value),
            Self::Contains { key, value } => {
                attributes.get(key).is_some_and(|v| v.contains(value.as_str()))
            }
            Self::AnyOf { key, values } => {
                attributes.get(key).is_some_and(|v| values.iter().any(|c| c == v))
            }
            Self::All { exprs } => exprs.iter().all(|e| e.matches(attributes)),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// One registered handler. Loaded from config at startup and immutable for
/// the life of the session; the dispatcher receives the full list explicitly
/// rather than reading a process-wide global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookRegistration {
    pub event: HookEvent,
    pub handler_ref: String,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub filters: Vec<FilterExpr>,
}

impl HookRegistration {
    /// All filters must match; an empty filter list matches everything.
    pub fn matches(&self, event: HookEvent, attributes: &HashMap<String, String>) -> bool {
        self.event == event && self.filters.iter().all(|f| f.matches(attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn event_round_trips_through_strings() {
        use std::str::FromStr;
        for event in [
            HookEvent::SessionStart,
            HookEvent::SessionEnd,
            HookEvent::PreTask,
            HookEvent::PostTask,
        ] {
            assert_eq!(HookEvent::from_str(&event.to_string()).unwrap(), event);
        }
        assert_eq!(HookEvent::PreTask.to_string(), "pre_task");
    }

    #[test]
    fn equals_filter_requires_exact_value() {
        let filter = FilterExpr::Equals {
            key: "agent".into(),
            value: "builder".into(),
        };
        assert!(filter.matches(&attrs(&[("agent", "builder")])));
        assert!(!filter.matches(&attrs(&[("agent", "builder-2")])));
        assert!(!filter.matches(&attrs(&[])));
    }

    #[test]
    fn contains_filter_matches_substring() {
        let filter = FilterExpr::Contains {
            key: "task".into(),
            value: "deploy".into(),
        };
        assert!(filter.matches(&attrs(&[("task", "deploy to staging")])));
        assert!(!filter.matches(&attrs(&[("task", "run tests")])));
    }

    #[test]
    fn any_of_filter_matches_candidates() {
        let filter = FilterExpr::AnyOf {
            key: "agent".into(),
            values: vec!["builder".into(), "tester".into()],
        };
        assert!(filter.matches(&attrs(&[("agent", "tester")])));
        assert!(!filter.matches(&attrs(&[("agent", "reviewer")])));
    }

    #[test]
    fn all_combinator_is_conjunction() {
        let filter = FilterExpr::All {
            exprs: vec![
                FilterExpr::Equals {
                    key: "agent".into(),
                    value: "builder".into(),
                },
                FilterExpr::Contains {
                    key: "task".into(),
                    value: "release".into(),
                },
            ],
        };
        assert!(filter.matches(&attrs(&[("agent", "builder"), ("task", "cut release")])));
        assert!(!filter.matches(&attrs(&[("agent", "builder"), ("task", "refactor")])));
    }

    #[test]
    fn registration_with_no_filters_matches_event() {
        let reg = HookRegistration {
            event: HookEvent::PreTask,
            handler_ref: "echo".into(),
            blocking: false,
            timeout_ms: 1_000,
            filters: Vec::new(),
        };
        assert!(reg.matches(HookEvent::PreTask, &attrs(&[])));
        assert!(!reg.matches(HookEvent::PostTask, &attrs(&[])));
    }
}
