use serde::{Deserialize, Serialize};

use super::Envelope;

///
/// SaveAction
///
/// Discriminator carried on every [`ItemEvent`] (spec §3/§8).
///
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaveAction {
    Created,
    Updated,
    Deleted,
}

///
/// PropertyChange
///
/// One entry per tracked property whose serialized value differs between
/// pre- and post-state. `old_value` is `Value::Null` for every tracked
/// property on `CREATED` events; `DELETED` events never carry any entries
/// (spec §3).
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyChange {
    #[serde(rename = "propertyName")]
    pub property_name: String,
    #[serde(rename = "oldValue")]
    pub old_value: serde_json::Value,
    #[serde(rename = "newValue")]
    pub new_value: serde_json::Value,
}

///
/// RequestContext
///
/// Snapshot of the identity fields carried by the out-of-scope HTTP
/// surface (spec §6's consumed interface). Every field is optional;
/// the core reads this once per save to populate `ItemEvent::context`
/// and never interprets the values.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RequestContext {
    #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(
        rename = "httpTraceIdentifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub http_trace_identifier: Option<String>,
    #[serde(rename = "httpRequestPath", skip_serializing_if = "Option::is_none")]
    pub http_request_path: Option<String>,
}

///
/// ItemEvent
///
/// The immutable audit record co-written with every mutation (spec §3).
/// `envelope.type_name()` is always the reserved value `event`;
/// `envelope.partition_key()` always equals the mutated item's partition
/// key; `envelope.id()` is a freshly generated identifier distinct from
/// the mutated item's id.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ItemEvent {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "saveAction")]
    pub save_action: SaveAction,
    #[serde(rename = "relatedId")]
    pub related_id: String,
    #[serde(rename = "relatedTypeName")]
    pub related_type_name: String,
    pub changes: Vec<PropertyChange>,
    pub context: RequestContext,
}

impl ItemEvent {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        partition_key: impl Into<String>,
        save_action: SaveAction,
        related_id: impl Into<String>,
        related_type_name: impl Into<String>,
        changes: Vec<PropertyChange>,
        context: RequestContext,
    ) -> Self {
        Self {
            envelope: Envelope::new(event_id, partition_key, super::EVENT_TYPE_NAME),
            save_action,
            related_id: related_id.into(),
            related_type_name: related_type_name.into(),
            changes,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_name_is_reserved() {
        let event = ItemEvent::new(
            "evt-1",
            "pk-1",
            SaveAction::Created,
            "item-1",
            "test-item",
            vec![],
            RequestContext::default(),
        );
        assert_eq!(event.envelope.type_name(), "event");
    }

    #[test]
    fn save_action_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(SaveAction::Created).unwrap(),
            serde_json::json!("CREATED")
        );
        assert_eq!(
            serde_json::to_value(SaveAction::Deleted).unwrap(),
            serde_json::json!("DELETED")
        );
    }
}
