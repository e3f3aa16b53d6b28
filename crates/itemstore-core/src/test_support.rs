//! Fixture entity used by this crate's own unit and integration tests.
//! Not part of the public API.

use serde::{Deserialize, Serialize};

use crate::adapter::memory::MemoryAdapter;
use crate::model::Envelope;
use crate::provider::{NewItem, Provider, ProviderOptions};
use crate::proxy::Item;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TestItem {
    #[serde(flatten)]
    envelope: Envelope,
    pub message: String,
}

impl TestItem {
    pub const TYPE_NAME: &'static str = "test-item";

    #[must_use]
    pub fn new(
        id: impl Into<String>,
        partition_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope::new(id, partition_key, Self::TYPE_NAME),
            message: message.into(),
        }
    }
}

impl Item for TestItem {
    const TRACKED_FIELDS: &'static [&'static str] = &["message"];
    const QUERYABLE_FIELDS: &'static [&'static str] =
        &["message", "updatedDate", "typeName", "isDeleted"];

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn tracked_value(&self, field: &str) -> Option<serde_json::Value> {
        match field {
            "message" => Some(serde_json::json!(self.message)),
            _ => None,
        }
    }
}

impl NewItem for TestItem {
    fn new_item(envelope: Envelope) -> Self {
        Self {
            envelope,
            message: String::new(),
        }
    }
}

/// Fresh `TestItem` provider over a fresh [`MemoryAdapter`], shared by
/// unit and integration tests (grounded on `icydb-core`'s
/// `test_fixtures.rs` provider-builder pattern).
#[must_use]
pub fn fresh_provider() -> Provider<TestItem, MemoryAdapter<TestItem>> {
    Provider::register(MemoryAdapter::new(), ProviderOptions::new(TestItem::TYPE_NAME))
        .expect("test-item is a valid type name")
}
