//! Store adapter contract (spec §4.2): the narrow interface the core
//! requires from any backend. A document-store adapter and a relational
//! adapter are named in spec §6 to anchor the contract's shape; neither's
//! network code lives here. [`memory::MemoryAdapter`] is the in-memory
//! reference implementation used by this crate's own tests.

pub mod memory;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::model::{ItemEvent, SaveAction};
use crate::proxy::Item;
use crate::query::{QueryCursor, QueryPlan};

///
/// SaveRequest
///
/// One atomic (item, event) pair. On `Create` the adapter uses
/// insert-or-conflict semantics; on `Update`/`Delete` it uses
/// compare-and-swap on the stored item's `eTag` against `item`'s `eTag`
/// (spec §4.2).
///
#[derive(Clone, Debug)]
pub struct SaveRequest<T: Item> {
    pub item: T,
    pub event: ItemEvent,
    pub action: SaveAction,
}

///
/// BatchRowStatus
///
/// Per-row outcome of a [`StoreAdapter::save_batch`] call, positionally
/// aligned with the input (spec §4.2).
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchRowStatus {
    Ok,
    Conflict,
    PreconditionFailed,
    BadRequest,
    FailedDependency,
    ServiceUnavailable,
    Internal,
}

///
/// BatchRowResult
///

#[derive(Clone, Debug)]
pub struct BatchRowResult<T: Item> {
    pub status: BatchRowStatus,
    pub item: Option<T>,
}

impl<T: Item> BatchRowResult<T> {
    #[must_use]
    pub const fn ok(item: T) -> Self {
        Self {
            status: BatchRowStatus::Ok,
            item: Some(item),
        }
    }

    #[must_use]
    pub const fn failed(status: BatchRowStatus) -> Self {
        Self { status, item: None }
    }
}

impl BatchRowStatus {
    /// Maps a whole-batch adapter failure onto the per-row status every
    /// row is reported with (spec §4.6: "Adapter whole-batch failure ->
    /// all rows non-OK").
    #[must_use]
    pub(crate) fn from_adapter_error(err: &AdapterError) -> Self {
        match err {
            AdapterError::Conflict(_) => Self::Conflict,
            AdapterError::PreconditionFailed(_) => Self::PreconditionFailed,
            AdapterError::BadRequest(_) => Self::BadRequest,
            AdapterError::ServiceUnavailable(_) => Self::ServiceUnavailable,
            AdapterError::NotFound(_) | AdapterError::Internal(_) => Self::Internal,
        }
    }
}

///
/// StoreAdapter
///
/// The four capabilities the core requires from any backend (spec §4.2).
/// Adapters are assumed thread-safe; the core never serializes calls to
/// an adapter beyond what a single command's own lock already implies.
///
#[async_trait]
pub trait StoreAdapter<T: Item>: Send + Sync {
    async fn read_item(&self, id: &str, partition_key: &str) -> Result<Option<T>, AdapterError>;

    async fn save_item(&self, request: SaveRequest<T>) -> Result<T, AdapterError>;

    /// All requests share one partition key, executed as a single atomic
    /// unit. If the batch is rejected as a whole, every entry must reflect
    /// the failure; if a subset is rejected, successful entries are
    /// reported as `FailedDependency` (no partial commit is observable).
    async fn save_batch(
        &self,
        partition_key: &str,
        requests: Vec<SaveRequest<T>>,
    ) -> Result<Vec<BatchRowResult<T>>, AdapterError>;

    async fn query(&self, plan: QueryPlan) -> Result<Box<dyn QueryCursor<T>>, AdapterError>;
}
