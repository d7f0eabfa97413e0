//! Canonicalization and identity of submitted events.
//!
//! Some SDKs still send interface payloads under their legacy
//! `sentry.interfaces.*` names. Those are folded into the plain top-level
//! keys before the event is cached; nothing below the top level is touched.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::IngestError;

/// Legacy interface aliases and the canonical key they map to
const LEGACY_INTERFACE_KEYS: &[(&str, &str)] = &[
    ("sentry.interfaces.Exception", "exception"),
    ("sentry.interfaces.Message", "logentry"),
    ("sentry.interfaces.Stacktrace", "stacktrace"),
    ("sentry.interfaces.Template", "template"),
    ("sentry.interfaces.Http", "request"),
    ("sentry.interfaces.User", "user"),
    ("sentry.interfaces.Csp", "csp"),
    ("sentry.interfaces.Breadcrumbs", "breadcrumbs"),
    ("sentry.interfaces.Contexts", "contexts"),
    ("sentry.interfaces.Threads", "threads"),
    ("sentry.interfaces.DebugMeta", "debug_meta"),
];

fn canonical_name(key: &str) -> Option<&'static str> {
    LEGACY_INTERFACE_KEYS
        .iter()
        .find(|(legacy, _)| *legacy == key)
        .map(|(_, canonical)| *canonical)
}

/// An event body as submitted, before canonicalization
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedEvent {
    Plain(Map<String, Value>),
    /// Carries at least one `sentry.interfaces.*` alias
    LegacyKeyed(Map<String, Value>),
}

impl SubmittedEvent {
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        let Value::Object(map) = value else {
            return Err(IngestError::malformed("Event payload must be a JSON object"));
        };

        if map.keys().any(|key| canonical_name(key).is_some()) {
            Ok(SubmittedEvent::LegacyKeyed(map))
        } else {
            Ok(SubmittedEvent::Plain(map))
        }
    }

    /// Plain mapping with canonical top-level keys. An existing canonical key
    /// wins over its legacy alias.
    pub fn canonicalize(self) -> Map<String, Value> {
        match self {
            SubmittedEvent::Plain(map) => map,
            SubmittedEvent::LegacyKeyed(map) => {
                let mut canonical = Map::with_capacity(map.len());
                let mut aliased = Vec::new();

                for (key, value) in map {
                    match canonical_name(&key) {
                        Some(name) => aliased.push((name, value)),
                        None => {
                            canonical.insert(key, value);
                        }
                    }
                }

                for (name, value) in aliased {
                    canonical.entry(name).or_insert(value);
                }

                canonical
            }
        }
    }
}

/// Normalize a client supplied event id to 32 lowercase hex characters,
/// assigning a fresh one when absent
pub fn normalize_event_id(value: Option<&Value>) -> Result<String, IngestError> {
    match value {
        None | Some(Value::Null) => Ok(Uuid::new_v4().simple().to_string()),
        Some(Value::String(raw)) => Uuid::parse_str(raw.trim())
            .map(|id| id.simple().to_string())
            .map_err(|_| IngestError::malformed(format!("Invalid event_id: {}", raw))),
        Some(other) => Err(IngestError::malformed(format!(
            "Invalid event_id: {}",
            other
        ))),
    }
}

/// Cache fingerprint for an event. Two deliveries of the same event for the
/// same project always produce the same key.
pub fn cache_key_for_event(event_id: &str, project_id: i32) -> String {
    format!("e:{}:{}", event_id, project_id)
}

/// Event body ready to be cached
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub event_id: String,
    pub project_id: i32,
    pub payload: Value,
}

impl CanonicalEvent {
    pub fn cache_key(&self) -> String {
        cache_key_for_event(&self.event_id, self.project_id)
    }
}

/// Canonicalize `value` and stamp it with its event id and owning project
pub fn prepare_event(value: Value, project_id: i32) -> Result<CanonicalEvent, IngestError> {
    let mut payload = SubmittedEvent::from_value(value)?.canonicalize();

    let event_id = normalize_event_id(payload.get("event_id"))?;
    payload.insert("event_id".to_string(), Value::String(event_id.clone()));
    payload.insert("project".to_string(), Value::from(project_id));

    Ok(CanonicalEvent {
        event_id,
        project_id,
        payload: Value::Object(payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_event_is_untouched() {
        let event = SubmittedEvent::from_value(json!({"message": "boom", "level": "error"}))
            .unwrap();
        assert!(matches!(event, SubmittedEvent::Plain(_)));
        assert_eq!(
            Value::Object(event.canonicalize()),
            json!({"message": "boom", "level": "error"})
        );
    }

    #[test]
    fn test_legacy_keys_are_renamed() {
        let event = SubmittedEvent::from_value(json!({
            "sentry.interfaces.Exception": {"values": []},
            "sentry.interfaces.Http": {"url": "https://example.com"},
            "sentry.interfaces.User": {"id": "1"},
            "user": {"id": "2"},
        }))
        .unwrap();
        assert!(matches!(event, SubmittedEvent::LegacyKeyed(_)));

        let canonical = event.canonicalize();
        assert_eq!(canonical.get("exception"), Some(&json!({"values": []})));
        assert_eq!(
            canonical.get("request"),
            Some(&json!({"url": "https://example.com"}))
        );
        assert_eq!(canonical.get("user"), Some(&json!({"id": "2"})));
        assert!(!canonical.contains_key("sentry.interfaces.User"));
    }

    #[test]
    fn test_nested_aliases_are_not_rewritten() {
        let canonical = SubmittedEvent::from_value(json!({
            "sentry.interfaces.Message": {"sentry.interfaces.User": {}},
        }))
        .unwrap()
        .canonicalize();
        assert_eq!(
            canonical.get("logentry"),
            Some(&json!({"sentry.interfaces.User": {}}))
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            SubmittedEvent::from_value(json!(["a"])),
            Err(IngestError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_normalize_event_id() {
        assert_eq!(
            normalize_event_id(Some(&json!("FC6D8C0C-43FC-4630-AD85-0F6D4E0E9B4A"))).unwrap(),
            "fc6d8c0c43fc4630ad850f6d4e0e9b4a"
        );
        assert_eq!(
            normalize_event_id(Some(&json!("fc6d8c0c43fc4630ad850f6d4e0e9b4a"))).unwrap(),
            "fc6d8c0c43fc4630ad850f6d4e0e9b4a"
        );
        assert_eq!(normalize_event_id(None).unwrap().len(), 32);
        assert!(normalize_event_id(Some(&json!("nope"))).is_err());
        assert!(normalize_event_id(Some(&json!(12))).is_err());
    }

    #[test]
    fn test_same_event_same_key() {
        let body = json!({"event_id": "fc6d8c0c43fc4630ad850f6d4e0e9b4a", "message": "x"});
        let first = prepare_event(body.clone(), 7).unwrap();
        let second = prepare_event(body, 7).unwrap();

        assert_eq!(first.cache_key(), second.cache_key());
        assert_eq!(first.cache_key(), "e:fc6d8c0c43fc4630ad850f6d4e0e9b4a:7");
        assert_eq!(first.payload["project"], json!(7));
    }
}
