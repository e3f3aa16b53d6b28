use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

///
/// Envelope
///
/// The fields every stored entity extends (spec §3 `BaseItem`). Every
/// setter on this type is `pub(crate)`: callers reach the envelope only
/// through [`crate::proxy::Proxy`]'s read-only getters. This is how "system-
/// managed fields are set only by the core, never by the caller" (spec
/// §4.1) is enforced in a language without a runtime dynamic proxy —
/// there is simply no public API that can mutate these fields.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    pub(crate) id: String,
    #[serde(rename = "partitionKey")]
    pub(crate) partition_key: String,
    #[serde(rename = "typeName")]
    pub(crate) type_name: String,
    #[serde(rename = "createdDate")]
    pub(crate) created_date: DateTime<Utc>,
    #[serde(rename = "updatedDate")]
    pub(crate) updated_date: DateTime<Utc>,
    #[serde(rename = "deletedDate", skip_serializing_if = "Option::is_none")]
    pub(crate) deleted_date: Option<DateTime<Utc>>,
    #[serde(rename = "isDeleted", skip_serializing_if = "Option::is_none")]
    pub(crate) is_deleted: Option<bool>,
    #[serde(rename = "_etag")]
    pub(crate) e_tag: String,
}

impl Envelope {
    /// Construct a brand-new envelope for `Create` (spec §4.3: `createdDate
    /// == updatedDate`, no tombstone fields, empty `eTag` pending store
    /// assignment).
    #[must_use]
    pub fn new(id: impl Into<String>, partition_key: impl Into<String>, type_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
            type_name: type_name.to_string(),
            created_date: now,
            updated_date: now,
            deleted_date: None,
            is_deleted: None,
            e_tag: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub const fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    #[must_use]
    pub const fn updated_date(&self) -> DateTime<Utc> {
        self.updated_date
    }

    #[must_use]
    pub const fn deleted_date(&self) -> Option<DateTime<Utc>> {
        self.deleted_date
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self.is_deleted, Some(true))
    }

    #[must_use]
    pub fn e_tag(&self) -> &str {
        &self.e_tag
    }

    pub(crate) fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_date = now;
    }

    pub(crate) fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_date = now;
        self.updated_date = now;
    }

    pub(crate) fn stamp_deleted(&mut self, now: DateTime<Utc>) {
        self.updated_date = now;
        self.deleted_date = Some(now);
        self.is_deleted = Some(true);
    }

    pub(crate) fn set_e_tag(&mut self, e_tag: impl Into<String>) {
        self.e_tag = e_tag.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_envelope_has_matching_created_and_updated() {
        let env = Envelope::new("id-1", "pk-1", "test-item");
        assert_eq!(env.created_date(), env.updated_date());
        assert!(env.deleted_date().is_none());
        assert!(!env.is_deleted());
        assert_eq!(env.e_tag(), "");
    }

    #[test]
    fn json_shape_matches_canonical_field_names() {
        let env = Envelope::new("id-1", "pk-1", "test-item");
        let value = serde_json::to_value(&env).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("partitionKey"));
        assert!(obj.contains_key("typeName"));
        assert!(obj.contains_key("createdDate"));
        assert!(obj.contains_key("updatedDate"));
        assert!(obj.contains_key("_etag"));
        assert!(!obj.contains_key("deletedDate"));
        assert!(!obj.contains_key("isDeleted"));
    }
}
