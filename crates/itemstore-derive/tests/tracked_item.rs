use itemstore_core::model::Envelope;
use itemstore_core::proxy::Item;
use itemstore_derive::TrackedItem;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, TrackedItem)]
struct Widget {
    #[serde(flatten)]
    envelope: Envelope,
    #[tracked]
    name: String,
    #[tracked]
    count: i64,
    #[queryable]
    category: String,
    description: String,
}

fn sample() -> Widget {
    Widget {
        envelope: Envelope::new("widget-1", "pk-1", "widget"),
        name: "lamp".to_string(),
        count: 3,
        category: "lighting".to_string(),
        description: "a desk lamp".to_string(),
    }
}

#[test]
fn tracked_fields_match_attributes_in_declaration_order() {
    assert_eq!(Widget::TRACKED_FIELDS, &["name", "count"]);
}

#[test]
fn queryable_fields_include_tracked_plus_queryable_only_plus_implicit_envelope_fields() {
    let fields = Widget::QUERYABLE_FIELDS;
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"count"));
    assert!(fields.contains(&"category"));
    assert!(fields.contains(&"typeName"));
    assert!(fields.contains(&"updatedDate"));
    assert!(fields.contains(&"isDeleted"));
    assert!(!fields.contains(&"description"));
}

#[test]
fn envelope_accessors_reach_the_envelope_field() {
    let mut widget = sample();
    assert_eq!(widget.envelope().id(), "widget-1");
    assert_eq!(widget.envelope().partition_key(), "pk-1");
    assert_eq!(widget.envelope_mut().id(), "widget-1");
}

#[test]
fn tracked_value_reads_back_tracked_fields_only() {
    let widget = sample();
    assert_eq!(widget.tracked_value("name"), Some(serde_json::json!("lamp")));
    assert_eq!(widget.tracked_value("count"), Some(serde_json::json!(3)));
    assert_eq!(widget.tracked_value("category"), None);
    assert_eq!(widget.tracked_value("description"), None);
    assert_eq!(widget.tracked_value("missing"), None);
}
