//! Provider façade (spec §4.7): per-type factory exposing
//! Create/Read/Update/Delete/Batch/Query, enforcing `typeName` rules and
//! the operation allow-list at registration time.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapter::StoreAdapter;
use crate::batch::BatchCommand;
use crate::command::{QueryResult, ReadResult, SaveCommand, Validator};
use crate::error::Error;
use crate::model::{is_valid_type_name, Envelope};
use crate::obs::{MetricsEvent, MetricsSink, NullMetricsSink};
use crate::proxy::{ChangeBaseline, Item};
use crate::query::{Query, QueryCursor};

bitflags::bitflags! {
    /// Per-provider allow-list gating `Update`/`Delete` (spec §4.7).
    /// `Create`, `Read`, `Batch`, and `Query` are never gated.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct CommandOperations: u8 {
        const UPDATE = 0b01;
        const DELETE = 0b10;
        const ALL = Self::UPDATE.bits() | Self::DELETE.bits();
    }
}

impl Default for CommandOperations {
    fn default() -> Self {
        Self::ALL
    }
}

///
/// ProviderOptions
///
/// Builder carrying per-provider configuration (spec §2.3 of this
/// expansion). Constructed programmatically; there is no config-file
/// loading in the core.
///
pub struct ProviderOptions {
    type_name: &'static str,
    operations: CommandOperations,
    metrics_sink: Arc<dyn MetricsSink>,
}

impl ProviderOptions {
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            operations: CommandOperations::default(),
            metrics_sink: Arc::new(NullMetricsSink),
        }
    }

    #[must_use]
    pub const fn operations(mut self, operations: CommandOperations) -> Self {
        self.operations = operations;
        self
    }

    #[must_use]
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics_sink = sink;
        self
    }
}

///
/// Provider
///
/// Per `(concrete item type, typeName)` registration (spec §4.7).
///
pub struct Provider<T: Item, A: StoreAdapter<T>> {
    type_name: &'static str,
    operations: CommandOperations,
    adapter: Arc<A>,
    metrics: Arc<dyn MetricsSink>,
    validator: Option<Validator<T>>,
}

impl<T: Item, A: StoreAdapter<T>> Provider<T, A> {
    /// Registers a provider. Fails with `InvalidType` if `options`'
    /// `type_name` does not satisfy spec §3/§4.7's naming rule.
    pub fn register(adapter: A, options: ProviderOptions) -> Result<Self, Error> {
        if !is_valid_type_name(options.type_name) {
            return Err(Error::invalid_type(options.type_name));
        }
        Ok(Self {
            type_name: options.type_name,
            operations: options.operations,
            adapter: Arc::new(adapter),
            metrics: options.metrics_sink,
            validator: None,
        })
    }

    /// Attaches a validator consulted by every command's `validate`/`save`.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator<T>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Builds a fresh `Create` command over `new_item(envelope)`. No
    /// store read is performed; `eTag` is assigned by the adapter.
    pub fn create(&self, id: impl Into<String>, partition_key: impl Into<String>) -> SaveCommand<T, A>
    where
        T: NewItem,
    {
        let envelope = Envelope::new(id, partition_key, self.type_name);
        let item = T::new_item(envelope);
        SaveCommand::new(
            item,
            crate::model::SaveAction::Created,
            ChangeBaseline::Absent,
            self.validator.clone(),
            self.type_name,
            Arc::clone(&self.adapter),
            Arc::clone(&self.metrics),
        )
    }

    /// Reads a single item. Absence is not an error (spec §4.2/§7).
    #[tracing::instrument(skip_all)]
    pub async fn read(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ReadResult<T>>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let found = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            res = self.adapter.read_item(id, partition_key) => res?,
        };
        Ok(found.map(|item| ReadResult::new(item, self.validator.clone())))
    }

    /// Builds an `Update` command over the currently stored item. Fails
    /// fast with `NotFound` if absent, `NotSupported` if the provider
    /// disallows `Update` (spec §4.3).
    pub async fn update(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> Result<SaveCommand<T, A>, Error> {
        self.read_for_mutation(id, partition_key, crate::model::SaveAction::Updated, cancel)
            .await
    }

    /// Builds a `Delete` command over the currently stored item. Fails
    /// fast with `NotFound` if absent, `NotSupported` if the provider
    /// disallows `Delete` (spec §4.3).
    pub async fn delete(
        &self,
        id: &str,
        partition_key: &str,
        cancel: &CancellationToken,
    ) -> Result<SaveCommand<T, A>, Error> {
        self.read_for_mutation(id, partition_key, crate::model::SaveAction::Deleted, cancel)
            .await
    }

    async fn read_for_mutation(
        &self,
        id: &str,
        partition_key: &str,
        action: crate::model::SaveAction,
        cancel: &CancellationToken,
    ) -> Result<SaveCommand<T, A>, Error> {
        let gate = match action {
            crate::model::SaveAction::Updated => CommandOperations::UPDATE,
            crate::model::SaveAction::Deleted => CommandOperations::DELETE,
            crate::model::SaveAction::Created => unreachable!("only Update/Delete reach here"),
        };
        if !self.operations.contains(gate) {
            return Err(Error::not_supported(if gate == CommandOperations::UPDATE {
                "update"
            } else {
                "delete"
            }));
        }

        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let found = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            res = self.adapter.read_item(id, partition_key) => res?,
        };
        let item = found.ok_or_else(|| Error::not_found(format!("item '{id}' not found")))?;
        let baseline = match action {
            crate::model::SaveAction::Deleted => ChangeBaseline::Suppressed,
            _ => ChangeBaseline::Snapshot(crate::proxy::snapshot(&item)),
        };
        Ok(SaveCommand::new(
            item,
            action,
            baseline,
            self.validator.clone(),
            self.type_name,
            Arc::clone(&self.adapter),
            Arc::clone(&self.metrics),
        ))
    }

    /// Starts a new, empty batch.
    #[must_use]
    pub fn batch(&self) -> BatchCommand<T, A> {
        BatchCommand::new(Arc::clone(&self.adapter), Arc::clone(&self.metrics), self.type_name)
    }

    /// Starts a fresh, empty query against this provider's `typeName`.
    #[must_use]
    pub fn query(&self) -> Query<T> {
        Query::new(T::QUERYABLE_FIELDS)
    }

    /// Runs a composed query, returning a lazy, cancellable cursor of
    /// `QueryResult`s (spec §4.5).
    #[tracing::instrument(skip_all)]
    pub async fn run_query(
        &self,
        built: Query<T>,
        cancel: CancellationToken,
    ) -> Result<QueryResultCursor<T, A>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let plan = built.into_plan(self.type_name);
        let cursor = self.adapter.query(plan).await?;
        Ok(QueryResultCursor {
            cursor,
            adapter: Arc::clone(&self.adapter),
            metrics: Arc::clone(&self.metrics),
            validator: self.validator.clone(),
            related_type_name: self.type_name,
            cancel,
            rows_scanned: 0,
        })
    }
}

/// Constructs a brand-new concrete item from a fresh envelope. Implemented
/// by hand or via `#[derive(TrackedItem)]`.
pub trait NewItem: Item {
    fn new_item(envelope: Envelope) -> Self;
}

///
/// QueryResultCursor
///
/// Lazy, single-pass, cancellable sequence of [`QueryResult`] (spec
/// §4.5's `ToAsyncSequence`). Cancellation requested before or during
/// iteration surfaces as `Cancelled` on the next step; iteration never
/// materializes the full result set in memory.
///
pub struct QueryResultCursor<T: Item, A: StoreAdapter<T>> {
    cursor: Box<dyn QueryCursor<T>>,
    adapter: Arc<A>,
    metrics: Arc<dyn MetricsSink>,
    validator: Option<Validator<T>>,
    related_type_name: &'static str,
    cancel: CancellationToken,
    rows_scanned: u64,
}

impl<T: Item, A: StoreAdapter<T>> QueryResultCursor<T, A> {
    /// Advances the cursor by one row, or `None` at end of sequence.
    pub async fn next(&mut self) -> Result<Option<QueryResult<T, A>>, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let row = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::cancelled()),
            res = self.cursor.next() => res?,
        };
        match row {
            Some(item) => {
                self.rows_scanned += 1;
                self.metrics.record(MetricsEvent::QueryRowsScanned {
                    type_name: self.related_type_name,
                    rows: self.rows_scanned,
                });
                Ok(Some(QueryResult::new(
                    item,
                    self.validator.clone(),
                    Arc::clone(&self.adapter),
                    Arc::clone(&self.metrics),
                    self.related_type_name,
                )))
            }
            None => Ok(None),
        }
    }
}
