//! Typed accessors over raw event payloads.
//!
//! Event shapes vary widely by event type, so payloads stay generic JSON
//! maps and only the handful of fields the pipeline actually reads get
//! accessors. A missing key, a JSON null, and a blank string are all
//! treated as "absent".

use serde_json::{Map, Value};

/// One event payload as delivered by the transport: an unordered mapping of
/// string keys to heterogeneous values.
pub type EventPayload = Map<String, Value>;

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|found| !found.is_empty())
}

/// Channel id the event belongs to: `channel`, then `channel_id`, then the
/// nested `item.channel`, first non-empty value wins.
pub fn channel_id(data: &EventPayload) -> Option<&str> {
    for key in ["channel", "channel_id"] {
        if let Some(found) = non_empty_str(data.get(key)) {
            return Some(found);
        }
    }
    non_empty_str(data.get("item").and_then(|item| item.get("channel")))
}

/// User id the event was generated by: `user`, then `user_id`.
pub fn user_id(data: &EventPayload) -> Option<&str> {
    for key in ["user", "user_id"] {
        if let Some(found) = non_empty_str(data.get(key)) {
            return Some(found);
        }
    }
    None
}

/// The event's `ts` field. Slack sends it as a string; numbers are accepted
/// as well since some payload variants carry bare floats.
pub fn ts(data: &EventPayload) -> Option<&Value> {
    match data.get("ts") {
        Some(Value::String(raw)) if raw.trim().is_empty() => None,
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

/// Whether the event carries a `subtype` key at all. Reaction mode only
/// applies to plain messages, which have none.
pub fn has_subtype(data: &EventPayload) -> bool {
    data.contains_key("subtype")
}

#[cfg(test)]
mod tests {
    use super::{channel_id, has_subtype, ts, user_id, EventPayload};
    use serde_json::{json, Value};

    fn payload(value: Value) -> EventPayload {
        value.as_object().expect("object fixture").clone()
    }

    #[test]
    fn unit_channel_id_prefers_channel_then_channel_id_then_item() {
        let data = payload(json!({"channel": "C1", "channel_id": "C2"}));
        assert_eq!(channel_id(&data), Some("C1"));

        let data = payload(json!({"channel_id": "C2"}));
        assert_eq!(channel_id(&data), Some("C2"));

        let data = payload(json!({"item": {"channel": "C3", "ts": "1.0"}}));
        assert_eq!(channel_id(&data), Some("C3"));
    }

    #[test]
    fn unit_channel_id_treats_empty_strings_as_absent() {
        let data = payload(json!({"channel": "", "channel_id": "  ", "item": {}}));
        assert_eq!(channel_id(&data), None);
        assert_eq!(channel_id(&payload(json!({"type": "message"}))), None);
    }

    #[test]
    fn unit_user_id_prefers_user_then_user_id() {
        let data = payload(json!({"user": "U1", "user_id": "U2"}));
        assert_eq!(user_id(&data), Some("U1"));

        let data = payload(json!({"user": "", "user_id": "U2"}));
        assert_eq!(user_id(&data), Some("U2"));

        assert_eq!(user_id(&payload(json!({}))), None);
    }

    #[test]
    fn unit_ts_skips_null_and_blank_values() {
        assert!(ts(&payload(json!({"ts": ""}))).is_none());
        assert!(ts(&payload(json!({"ts": null}))).is_none());
        assert_eq!(
            ts(&payload(json!({"ts": "1000.1"}))),
            Some(&json!("1000.1"))
        );
        assert_eq!(ts(&payload(json!({"ts": 1000.1}))), Some(&json!(1000.1)));
    }

    #[test]
    fn unit_has_subtype_checks_key_presence_only() {
        assert!(has_subtype(&payload(json!({"subtype": "bot_message"}))));
        assert!(has_subtype(&payload(json!({"subtype": null}))));
        assert!(!has_subtype(&payload(json!({"type": "message"}))));
    }
}
