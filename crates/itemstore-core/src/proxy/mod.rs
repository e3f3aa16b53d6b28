//! Proxy layer (spec §4.1).
//!
//! Rust has no runtime dynamic proxy generation, so this is implemented the
//! way Design Notes §9 directs for that case: a single struct holding a
//! read-only flag plus method-based mutators, rather than a generated
//! interface-view type. System-managed envelope fields never need a
//! runtime check at all — [`crate::model::Envelope`]'s mutators are
//! `pub(crate)`, so there is no public path through which a caller's
//! mutation closure could reach them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::model::{Envelope, PropertyChange};

///
/// Item
///
/// Implemented by every concrete entity type. `#[derive(TrackedItem)]`
/// (see `itemstore-derive`) generates this from `#[tracked]` field
/// attributes; it may also be written by hand. `Serialize`/
/// `DeserializeOwned` are required because every store adapter's wire
/// form is this type's own JSON serialization (spec §3/§4.2).
pub trait Item: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Tracked-property metadata, consulted once at provider-registration
    /// time, never per call (spec §4.1).
    const TRACKED_FIELDS: &'static [&'static str];

    /// Field names a caller may reference in a predicate or sort key
    /// (spec §4.5/§4.6). Always includes the envelope fields a query may
    /// legitimately order by (e.g. `updatedDate`) in addition to
    /// `TRACKED_FIELDS`.
    const QUERYABLE_FIELDS: &'static [&'static str];

    fn envelope(&self) -> &Envelope;
    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Serialized value of a tracked property, or `None` if `field` is not
    /// a declared tracked field.
    fn tracked_value(&self, field: &str) -> Option<serde_json::Value>;
}

/// How a [`Proxy`]'s change baseline should be interpreted when computing
/// `ItemEvent::changes` at save time.
pub(crate) enum ChangeBaseline {
    /// `Create`: there is no pre-state: every tracked field is reported as
    /// changed, with `oldValue = null` (spec §3).
    Absent,
    /// `Update`: diff against the tracked values captured when the item
    /// was read from the store.
    Snapshot(BTreeMap<String, serde_json::Value>),
    /// `Delete`: `changes` is always empty (spec §3), regardless of what
    /// mutated between read and save.
    Suppressed,
}

///
/// Proxy
///
/// Owns a single item instance for the lifetime of one command (spec §3
/// "Ownership"). `get` always succeeds, even after finalization; `set`
/// fails with `ReadOnly` once the command has saved.
///
pub struct Proxy<T: Item> {
    item: T,
    read_only: bool,
    baseline: ChangeBaseline,
}

impl<T: Item> Proxy<T> {
    pub(crate) fn new(item: T, baseline: ChangeBaseline) -> Self {
        Self {
            item,
            read_only: false,
            baseline,
        }
    }

    /// Get-accessor: forwards to the underlying item, readable in every
    /// state (spec §4.1).
    #[must_use]
    pub fn get(&self) -> &T {
        &self.item
    }

    /// Direct mutable access for core-internal envelope stamping, bypassing
    /// the `read_only` check `set` enforces. Never exposed outside the crate.
    pub(crate) fn item_mut(&mut self) -> &mut T {
        &mut self.item
    }

    /// Set-accessor: rejected once the command is read-only.
    pub fn set(&mut self, mutate: impl FnOnce(&mut T)) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::read_only());
        }
        mutate(&mut self.item);
        Ok(())
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Replace the owned item with the stored form and transition to
    /// read-only (spec §4.3 step 7). Irreversible.
    pub(crate) fn finalize(&mut self, stored: T) {
        self.item = stored;
        self.read_only = true;
    }

    pub(crate) fn into_inner(self) -> T {
        self.item
    }

    /// Tracked-property deltas between the baseline and the item's current
    /// state (spec §3/§8 property 4).
    pub(crate) fn changes(&self) -> Vec<PropertyChange> {
        match &self.baseline {
            ChangeBaseline::Suppressed => Vec::new(),
            ChangeBaseline::Absent => T::TRACKED_FIELDS
                .iter()
                .map(|&field| PropertyChange {
                    property_name: field.to_string(),
                    old_value: serde_json::Value::Null,
                    new_value: self
                        .item
                        .tracked_value(field)
                        .unwrap_or(serde_json::Value::Null),
                })
                .collect(),
            ChangeBaseline::Snapshot(snapshot) => T::TRACKED_FIELDS
                .iter()
                .filter_map(|&field| {
                    let old = snapshot
                        .get(field)
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);
                    let new = self
                        .item
                        .tracked_value(field)
                        .unwrap_or(serde_json::Value::Null);
                    (old != new).then_some(PropertyChange {
                        property_name: field.to_string(),
                        old_value: old,
                        new_value: new,
                    })
                })
                .collect(),
        }
    }
}

/// Capture the current tracked-property values of `item` as a snapshot
/// baseline, for use on `Update`/`Delete` commands built from a stored item.
pub(crate) fn snapshot<T: Item>(item: &T) -> BTreeMap<String, serde_json::Value> {
    T::TRACKED_FIELDS
        .iter()
        .map(|&field| {
            (
                field.to_string(),
                item.tracked_value(field).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect()
}
