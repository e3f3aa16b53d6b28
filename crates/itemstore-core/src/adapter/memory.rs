//! In-memory reference [`StoreAdapter`] (spec §9's first Open Question,
//! resolved here in favor of the "stores pre-serialized strings"
//! generation): every row is kept as its committed JSON wire form, never
//! as a live, still-mutable Rust value shared through `Arc`/`Clone`, so a
//! `Read` can only ever observe the exact bytes a `Save` committed.
//!
//! Readers (`read_item`, `query`) and writers (`save_item`, `save_batch`)
//! serialize through a single [`tokio::sync::RwLock`]: a writer excludes
//! all readers for the duration of one call (spec §5).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::AdapterError;
use crate::model::SaveAction;
use crate::proxy::Item;
use crate::query::{QueryCursor, QueryPlan};

use super::{BatchRowResult, BatchRowStatus, SaveRequest, StoreAdapter};

type RowKey = (String, String);

#[derive(Default)]
struct Inner {
    items: BTreeMap<RowKey, String>,
    events: BTreeMap<RowKey, String>,
}

///
/// MemoryAdapter
///

pub struct MemoryAdapter<T: Item> {
    inner: Arc<RwLock<Inner>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Item> Default for MemoryAdapter<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            _marker: PhantomData,
        }
    }
}

impl<T: Item> Clone for MemoryAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<T: Item> MemoryAdapter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn new_etag() -> String {
        ulid::Ulid::new().to_string()
    }

    /// Test/diagnostic hook: true if the raw store still holds a row for
    /// `(id, partition_key)`, regardless of its tombstone state. Models
    /// the "a later `Read` on the raw store would still find it" contract
    /// in spec §8 property 3.
    pub async fn raw_row_exists(&self, id: &str, partition_key: &str) -> bool {
        let inner = self.inner.read().await;
        inner
            .items
            .contains_key(&(partition_key.to_string(), id.to_string()))
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }

    /// Test/diagnostic hook: every committed `ItemEvent` whose
    /// `relatedId` matches `related_id`, in commit order (ulid event ids
    /// sort chronologically within a partition's `BTreeMap` bucket).
    pub async fn events_for(&self, related_id: &str) -> Vec<crate::model::ItemEvent> {
        let inner = self.inner.read().await;
        inner
            .events
            .values()
            .filter_map(|blob| serde_json::from_str::<crate::model::ItemEvent>(blob).ok())
            .filter(|event| event.related_id == related_id)
            .collect()
    }
}

#[async_trait]
impl<T: Item> StoreAdapter<T> for MemoryAdapter<T> {
    async fn read_item(&self, id: &str, partition_key: &str) -> Result<Option<T>, AdapterError> {
        let inner = self.inner.read().await;
        let key = (partition_key.to_string(), id.to_string());
        let Some(blob) = inner.items.get(&key) else {
            return Ok(None);
        };
        let item: T =
            serde_json::from_str(blob).map_err(|e| AdapterError::Internal(e.to_string()))?;
        Ok((!item.envelope().is_deleted()).then_some(item))
    }

    async fn save_item(&self, request: SaveRequest<T>) -> Result<T, AdapterError> {
        let mut inner = self.inner.write().await;
        let mut item = request.item;
        let key = (
            item.envelope().partition_key().to_string(),
            item.envelope().id().to_string(),
        );

        validate_precondition(&inner, &key, request.action, item.envelope().e_tag())?;

        item.envelope_mut().set_e_tag(Self::new_etag());
        commit_row(&mut inner, key, &item)?;

        let mut event = request.event;
        event.envelope.set_e_tag(Self::new_etag());
        commit_event(&mut inner, &event)?;

        Ok(item)
    }

    async fn save_batch(
        &self,
        partition_key: &str,
        requests: Vec<SaveRequest<T>>,
    ) -> Result<Vec<BatchRowResult<T>>, AdapterError> {
        let mut inner = self.inner.write().await;

        let mut statuses = vec![BatchRowStatus::Ok; requests.len()];
        let mut any_failed = false;
        let mut seen_keys: std::collections::HashSet<RowKey> = std::collections::HashSet::new();
        for (idx, req) in requests.iter().enumerate() {
            if req.item.envelope().partition_key() != partition_key {
                statuses[idx] = BatchRowStatus::BadRequest;
                any_failed = true;
                continue;
            }
            let key = (
                req.item.envelope().partition_key().to_string(),
                req.item.envelope().id().to_string(),
            );
            // Two requests in one batch targeting the same row can never
            // both legitimately apply in a single atomic commit, even if
            // neither collides with store state checked in isolation.
            if !seen_keys.insert(key.clone()) {
                statuses[idx] = BatchRowStatus::Conflict;
                any_failed = true;
                continue;
            }
            if let Err(err) =
                validate_precondition(&inner, &key, req.action, req.item.envelope().e_tag())
            {
                statuses[idx] = BatchRowStatus::from_adapter_error(&err);
                any_failed = true;
            }
        }

        if any_failed {
            // Whole batch is atomic: a single hard failure means no row
            // commits. Siblings surface as FailedDependency, never a
            // silent OK (spec §4.6 / §9's third Open Question).
            let results = statuses
                .into_iter()
                .map(|status| {
                    BatchRowResult::failed(if status == BatchRowStatus::Ok {
                        BatchRowStatus::FailedDependency
                    } else {
                        status
                    })
                })
                .collect();
            return Ok(results);
        }

        let mut results = Vec::with_capacity(requests.len());
        for req in requests {
            let mut item = req.item;
            let key = (
                item.envelope().partition_key().to_string(),
                item.envelope().id().to_string(),
            );
            item.envelope_mut().set_e_tag(Self::new_etag());
            commit_row(&mut inner, key, &item)?;

            let mut event = req.event;
            event.envelope.set_e_tag(Self::new_etag());
            commit_event(&mut inner, &event)?;

            results.push(BatchRowResult::ok(item));
        }

        Ok(results)
    }

    async fn query(&self, plan: QueryPlan) -> Result<Box<dyn QueryCursor<T>>, AdapterError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<(Value, T)> = Vec::new();
        for blob in inner.items.values() {
            let value: Value =
                serde_json::from_str(blob).map_err(|e| AdapterError::Internal(e.to_string()))?;
            if !plan.predicate.as_ref().is_none_or(|p| p.matches(&value)) {
                continue;
            }
            let item: T = serde_json::from_value(value.clone())
                .map_err(|e| AdapterError::Internal(e.to_string()))?;
            rows.push((value, item));
        }

        if let Some(order) = &plan.order {
            rows.sort_by(|(a, _), (b, _)| {
                let ord = json_cmp(a.get(&order.field), b.get(&order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let skip = plan.skip.unwrap_or(0) as usize;
        let mut iter = rows.into_iter().skip(skip).map(|(_, item)| item);
        let rows: Vec<T> = match plan.take {
            Some(take) => iter.by_ref().take(take as usize).collect(),
            None => iter.collect(),
        };

        Ok(Box::new(VecCursor {
            rows: rows.into_iter(),
        }))
    }
}

fn validate_precondition(
    inner: &Inner,
    key: &RowKey,
    action: SaveAction,
    submitted_etag: &str,
) -> Result<(), AdapterError> {
    match action {
        SaveAction::Created => {
            if inner.items.contains_key(key) {
                return Err(AdapterError::Conflict(format!(
                    "item '{}' already exists",
                    key.1
                )));
            }
            Ok(())
        }
        SaveAction::Updated | SaveAction::Deleted => {
            let existing = inner
                .items
                .get(key)
                .ok_or_else(|| AdapterError::PreconditionFailed(format!("item '{}' not found", key.1)))?;
            let existing_etag = existing_e_tag(existing)?;
            if existing_etag != submitted_etag {
                return Err(AdapterError::PreconditionFailed(format!(
                    "etag mismatch for item '{}'",
                    key.1
                )));
            }
            Ok(())
        }
    }
}

fn existing_e_tag(blob: &str) -> Result<String, AdapterError> {
    let value: Value =
        serde_json::from_str(blob).map_err(|e| AdapterError::Internal(e.to_string()))?;
    Ok(value
        .get("_etag")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn commit_row<T: Item>(inner: &mut Inner, key: RowKey, item: &T) -> Result<(), AdapterError> {
    let blob = serde_json::to_string(item).map_err(|e| AdapterError::Internal(e.to_string()))?;
    inner.items.insert(key, blob);
    Ok(())
}

fn commit_event(inner: &mut Inner, event: &crate::model::ItemEvent) -> Result<(), AdapterError> {
    let key = (
        event.envelope.partition_key().to_string(),
        event.envelope.id().to_string(),
    );
    let blob = serde_json::to_string(event).map_err(|e| AdapterError::Internal(e.to_string()))?;
    inner.events.insert(key, blob);
    Ok(())
}

fn json_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

struct VecCursor<T> {
    rows: std::vec::IntoIter<T>,
}

#[async_trait]
impl<T: Item> QueryCursor<T> for VecCursor<T> {
    async fn next(&mut self) -> Result<Option<T>, AdapterError> {
        Ok(self.rows.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemEvent, RequestContext, SaveAction as Action};
    use crate::query::Query;
    use crate::test_support::TestItem;

    fn event_for(item: &TestItem, action: Action) -> ItemEvent {
        ItemEvent::new(
            ulid::Ulid::new().to_string(),
            item.envelope().partition_key().to_string(),
            action,
            item.envelope().id().to_string(),
            TestItem::TYPE_NAME,
            vec![],
            RequestContext::default(),
        )
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let adapter = MemoryAdapter::<TestItem>::new();
        let item = TestItem::new("id-1", "pk-1", "hello");
        let event = event_for(&item, Action::Created);
        let stored = adapter
            .save_item(SaveRequest {
                item,
                event,
                action: Action::Created,
            })
            .await
            .unwrap();
        assert!(!stored.envelope().e_tag().is_empty());

        let read = adapter.read_item("id-1", "pk-1").await.unwrap().unwrap();
        assert_eq!(read.message, "hello");
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let adapter = MemoryAdapter::<TestItem>::new();
        let item = TestItem::new("id-1", "pk-1", "hello");
        adapter
            .save_item(SaveRequest {
                item: item.clone(),
                event: event_for(&item, Action::Created),
                action: Action::Created,
            })
            .await
            .unwrap();

        let err = adapter
            .save_item(SaveRequest {
                item: item.clone(),
                event: event_for(&item, Action::Created),
                action: Action::Created,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_etag_on_update_fails_precondition() {
        let adapter = MemoryAdapter::<TestItem>::new();
        let item = TestItem::new("id-1", "pk-1", "hello");
        let stored = adapter
            .save_item(SaveRequest {
                item: item.clone(),
                event: event_for(&item, Action::Created),
                action: Action::Created,
            })
            .await
            .unwrap();

        // Stale copy still carries the pre-create empty etag.
        let err = adapter
            .save_item(SaveRequest {
                item: item.clone(),
                event: event_for(&item, Action::Updated),
                action: Action::Updated,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::PreconditionFailed(_)));

        // Fresh copy with the current etag succeeds.
        let mut fresh = stored;
        fresh.message = "bye".into();
        adapter
            .save_item(SaveRequest {
                item: fresh.clone(),
                event: event_for(&fresh, Action::Updated),
                action: Action::Updated,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_hides_from_read_but_keeps_raw_row() {
        let adapter = MemoryAdapter::<TestItem>::new();
        let item = TestItem::new("id-1", "pk-1", "hello");
        let stored = adapter
            .save_item(SaveRequest {
                item: item.clone(),
                event: event_for(&item, Action::Created),
                action: Action::Created,
            })
            .await
            .unwrap();

        let mut deleted = stored;
        deleted.envelope_mut().stamp_deleted(chrono::Utc::now());
        adapter
            .save_item(SaveRequest {
                item: deleted.clone(),
                event: event_for(&deleted, Action::Deleted),
                action: Action::Deleted,
            })
            .await
            .unwrap();

        assert!(adapter.read_item("id-1", "pk-1").await.unwrap().is_none());
        assert!(adapter.raw_row_exists("id-1", "pk-1").await);
    }

    #[tokio::test]
    async fn ordering_and_take_window_results() {
        let adapter = MemoryAdapter::<TestItem>::new();
        for (id, msg) in [("id-1", "Message #1"), ("id-2", "Message #2")] {
            let item = TestItem::new(id, "pk-1", msg);
            adapter
                .save_item(SaveRequest {
                    item: item.clone(),
                    event: event_for(&item, Action::Created),
                    action: Action::Created,
                })
                .await
                .unwrap();
        }

        let plan = Query::<TestItem>::new(TestItem::QUERYABLE_FIELDS)
            .order_by("message")
            .unwrap()
            .take(1)
            .into_plan(TestItem::TYPE_NAME);
        let mut cursor = adapter.query(plan).await.unwrap();
        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.message, "Message #1");
        assert!(cursor.next().await.unwrap().is_none());

        let plan_desc = Query::<TestItem>::new(TestItem::QUERYABLE_FIELDS)
            .order_by_desc("message")
            .unwrap()
            .take(1)
            .into_plan(TestItem::TYPE_NAME);
        let mut cursor = adapter.query(plan_desc).await.unwrap();
        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.message, "Message #2");
    }

    #[tokio::test]
    async fn batch_rejects_duplicate_key_within_the_same_batch() {
        let adapter = MemoryAdapter::<TestItem>::new();
        let a = TestItem::new("id-1", "pk-1", "a");
        let b = TestItem::new("id-1", "pk-1", "b");

        let results = adapter
            .save_batch(
                "pk-1",
                vec![
                    SaveRequest {
                        item: a.clone(),
                        event: event_for(&a, Action::Created),
                        action: Action::Created,
                    },
                    SaveRequest {
                        item: b.clone(),
                        event: event_for(&b, Action::Created),
                        action: Action::Created,
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(results[0].status, BatchRowStatus::FailedDependency);
        assert_eq!(results[1].status, BatchRowStatus::Conflict);
        assert!(!adapter.raw_row_exists("id-1", "pk-1").await);
    }
}
