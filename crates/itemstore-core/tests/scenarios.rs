use itemstore_core::adapter::memory::MemoryAdapter;
use itemstore_core::error::ErrorKind;
use itemstore_core::model::{Envelope, RequestContext, SaveAction};
use itemstore_core::provider::{Provider, ProviderOptions};
use itemstore_derive::TrackedItem;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Deserialize, Serialize, TrackedItem)]
struct Note {
    #[serde(flatten)]
    envelope: Envelope,
    #[tracked]
    message: String,
}

impl itemstore_core::provider::NewItem for Note {
    fn new_item(envelope: Envelope) -> Self {
        Self {
            envelope,
            message: String::new(),
        }
    }
}

const TYPE_NAME: &str = "note";

fn provider() -> Provider<Note, MemoryAdapter<Note>> {
    Provider::register(MemoryAdapter::new(), ProviderOptions::new(TYPE_NAME))
        .expect("note is a valid type name")
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

/// S1: Create-Read round trip.
#[tokio::test]
async fn create_then_read_round_trips() {
    let provider = provider();
    let cancel = cancel();

    let create = provider.create("2a4cb3ec-id", "b297ff5b-pk");
    create
        .set(|note| note.message = "Message #1".to_string())
        .await
        .unwrap();
    let saved = create.save(RequestContext::default(), &cancel).await.unwrap();

    assert_eq!(saved.item().envelope.id(), "2a4cb3ec-id");
    assert_eq!(saved.item().envelope.partition_key(), "b297ff5b-pk");
    assert_eq!(saved.item().message, "Message #1");
    assert!(!saved.item().envelope.e_tag().is_empty());
    assert_eq!(saved.item().envelope.created_date(), saved.item().envelope.updated_date());

    let read = provider
        .read("2a4cb3ec-id", "b297ff5b-pk", &cancel)
        .await
        .unwrap()
        .expect("item was just created");
    assert_eq!(read.item().message, "Message #1");
}

/// S2: Create conflict on a duplicate (id, partitionKey).
#[tokio::test]
async fn duplicate_create_conflicts() {
    let provider = provider();
    let cancel = cancel();

    let first = provider.create("id-1", "pk-1");
    first.save(RequestContext::default(), &cancel).await.unwrap();

    let second = provider.create("id-1", "pk-1");
    let err = second.save(RequestContext::default(), &cancel).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

/// S3: Two updates reading the same version; the second loses the race.
#[tokio::test]
async fn concurrent_updates_fail_precondition() {
    let provider = provider();
    let cancel = cancel();

    let create = provider.create("id-1", "pk-1");
    create
        .set(|note| note.message = "v1".to_string())
        .await
        .unwrap();
    create.save(RequestContext::default(), &cancel).await.unwrap();

    let update_a = provider.update("id-1", "pk-1", &cancel).await.unwrap();
    let update_b = provider.update("id-1", "pk-1", &cancel).await.unwrap();

    update_a
        .set(|note| note.message = "from-a".to_string())
        .await
        .unwrap();
    update_a.save(RequestContext::default(), &cancel).await.unwrap();

    update_b
        .set(|note| note.message = "from-b".to_string())
        .await
        .unwrap();
    let err = update_b.save(RequestContext::default(), &cancel).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PreconditionFailed);
}

/// S4: Delete semantics -- absent from Read/Query, audit trail is
/// CREATED then DELETED with no changes recorded on the DELETED event.
#[tokio::test]
async fn delete_hides_item_and_leaves_audit_trail() {
    let adapter = MemoryAdapter::<Note>::new();
    let provider = Provider::register(adapter.clone(), ProviderOptions::new(TYPE_NAME)).unwrap();
    let cancel = cancel();

    let create = provider.create("id-1", "pk-1");
    create
        .set(|note| note.message = "v1".to_string())
        .await
        .unwrap();
    create.save(RequestContext::default(), &cancel).await.unwrap();

    let delete = provider.delete("id-1", "pk-1", &cancel).await.unwrap();
    delete.save(RequestContext::default(), &cancel).await.unwrap();

    let read = provider.read("id-1", "pk-1", &cancel).await.unwrap();
    assert!(read.is_none());

    let mut cursor = provider.run_query(provider.query(), cancel).await.unwrap();
    assert!(cursor.next().await.unwrap().is_none());

    let events = adapter.events_for("id-1").await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].save_action, SaveAction::Created);
    assert_eq!(events[1].save_action, SaveAction::Deleted);
    assert!(events[1].changes.is_empty());
}

/// S5: Batch create atomicity -- a duplicate key fails the whole batch,
/// siblings report FailedDependency, and no new row is committed.
#[tokio::test]
async fn batch_create_is_all_or_nothing_on_conflict() {
    let adapter = MemoryAdapter::<Note>::new();
    let provider = Provider::register(adapter.clone(), ProviderOptions::new(TYPE_NAME)).unwrap();
    let cancel = cancel();

    // Seed an existing row that the batch's third create will collide with.
    let seed = provider.create("id-3", "pk-1");
    seed.save(RequestContext::default(), &cancel).await.unwrap();

    let batch = provider.batch();
    batch.add(provider.create("id-1", "pk-1")).await.unwrap();
    batch.add(provider.create("id-2", "pk-1")).await.unwrap();
    batch.add(provider.create("id-3", "pk-1")).await.unwrap();

    let results = batch.save(RequestContext::default(), &cancel).await.unwrap();
    assert_eq!(results.len(), 3);

    let conflict_count = results
        .iter()
        .filter(|r| r.status == itemstore_core::adapter::BatchRowStatus::Conflict)
        .count();
    let dependency_count = results
        .iter()
        .filter(|r| r.status == itemstore_core::adapter::BatchRowStatus::FailedDependency)
        .count();
    assert_eq!(conflict_count, 1);
    assert_eq!(dependency_count, 2);

    assert!(!adapter.raw_row_exists("id-1", "pk-1").await);
    assert!(!adapter.raw_row_exists("id-2", "pk-1").await);
}

/// S6: Query ordering -- OrderBy/OrderByDescending plus Take(1).
#[tokio::test]
async fn query_ordering_and_take_window() {
    let provider = provider();
    let cancel = cancel();

    let first = provider.create("id-1", "pk-1");
    first
        .set(|note| note.message = "Message #1".to_string())
        .await
        .unwrap();
    first.save(RequestContext::default(), &cancel).await.unwrap();

    let second = provider.create("id-2", "pk-1");
    second
        .set(|note| note.message = "Message #2".to_string())
        .await
        .unwrap();
    second.save(RequestContext::default(), &cancel).await.unwrap();

    let ascending = provider
        .query()
        .order_by("message")
        .unwrap()
        .take(1);
    let mut cursor = provider.run_query(ascending, cancel.clone()).await.unwrap();
    let row = cursor.next().await.unwrap().expect("one row");
    assert_eq!(row.item().message, "Message #1");
    assert!(cursor.next().await.unwrap().is_none());

    let descending = provider
        .query()
        .order_by_desc("message")
        .unwrap()
        .take(1);
    let mut cursor = provider.run_query(descending, cancel).await.unwrap();
    let row = cursor.next().await.unwrap().expect("one row");
    assert_eq!(row.item().message, "Message #2");
}
