use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::adapter::{SaveRequest, StoreAdapter};
use crate::error::Error;
use crate::model::{ItemEvent, RequestContext, SaveAction};
use crate::obs::{MetricsEvent, MetricsSink, SaveKind};
use crate::proxy::{ChangeBaseline, Item, Proxy};

use super::read::ReadResult;
use super::{run_validator, Validator};

pub(crate) struct SaveState<T: Item> {
    pub(crate) proxy: Proxy<T>,
    pub(crate) action: SaveAction,
    pub(crate) validator: Option<Validator<T>>,
    pub(crate) finalized: bool,
}

impl<T: Item> SaveState<T> {
    pub(crate) fn partition_key(&self) -> &str {
        self.proxy.get().envelope().partition_key()
    }

    /// Stamps envelope dates for `self.action` and builds the
    /// `(item, event)` pair to hand the adapter. Shared by
    /// `SaveCommand::save` and the batch driver so both stamp identically.
    pub(crate) fn build_request(
        &mut self,
        now: chrono::DateTime<chrono::Utc>,
        related_type_name: &'static str,
        context: RequestContext,
    ) -> SaveRequest<T> {
        self.proxy.item_mut().envelope_mut().stamp_updated(now);
        match self.action {
            SaveAction::Created => self.proxy.item_mut().envelope_mut().stamp_created(now),
            SaveAction::Deleted => self.proxy.item_mut().envelope_mut().stamp_deleted(now),
            SaveAction::Updated => {}
        }

        let changes = self.proxy.changes();
        let item = self.proxy.get().clone();
        let event = ItemEvent::new(
            ulid::Ulid::new().to_string(),
            item.envelope().partition_key().to_string(),
            self.action,
            item.envelope().id().to_string(),
            related_type_name,
            changes,
            context,
        );
        SaveRequest {
            item,
            event,
            action: self.action,
        }
    }

    pub(crate) fn finalize_with(&mut self, stored: T) {
        self.proxy.finalize(stored);
        self.finalized = true;
    }
}

///
/// SaveCommand
///
/// Stateful Create/Update/Delete command (spec §4.3). Holds a private
/// mutex guarding its item for the full `save` pipeline, including the
/// adapter call — mirrors the source's "exclusive mutex ... held for the
/// full Save pipeline".
///
pub struct SaveCommand<T: Item, A: StoreAdapter<T>> {
    pub(crate) state: Arc<Mutex<SaveState<T>>>,
    adapter: Arc<A>,
    metrics: Arc<dyn MetricsSink>,
    related_type_name: &'static str,
}

impl<T: Item, A: StoreAdapter<T>> Clone for SaveCommand<T, A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            adapter: Arc::clone(&self.adapter),
            metrics: Arc::clone(&self.metrics),
            related_type_name: self.related_type_name,
        }
    }
}

impl<T: Item, A: StoreAdapter<T>> SaveCommand<T, A> {
    pub(crate) fn new(
        item: T,
        action: SaveAction,
        baseline: ChangeBaseline,
        validator: Option<Validator<T>>,
        related_type_name: &'static str,
        adapter: Arc<A>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SaveState {
                proxy: Proxy::new(item, baseline),
                action,
                validator,
                finalized: false,
            })),
            adapter,
            metrics,
            related_type_name,
        }
    }

    /// Get-accessor (spec §4.3 `Item`): succeeds in every state.
    pub async fn item(&self) -> T {
        self.state.lock().await.proxy.get().clone()
    }

    /// Set-accessor. Fails with `ReadOnly` once the command has saved.
    pub async fn set(&self, mutate: impl FnOnce(&mut T) + Send) -> Result<(), Error> {
        self.state.lock().await.proxy.set(mutate)
    }

    /// Pure validation against the current item; no I/O.
    pub async fn validate(&self) -> super::ValidationResult {
        let state = self.state.lock().await;
        run_validator(state.validator.as_ref(), state.proxy.get())
    }

    /// Runs the save pipeline (spec §4.3 steps 1-8).
    #[tracing::instrument(skip_all)]
    pub async fn save(
        &self,
        context: RequestContext,
        cancel: &CancellationToken,
    ) -> Result<ReadResult<T>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let mut state = self.state.lock().await;

        if state.finalized {
            return Err(Error::already_saved());
        }

        let validation = run_validator(state.validator.as_ref(), state.proxy.get());
        if !validation.is_valid() {
            return Err(Error::validation(validation.field_errors));
        }

        let now = chrono::Utc::now();
        let action = state.action;
        let request = state.build_request(now, self.related_type_name, context);

        self.metrics.record(MetricsEvent::SaveStarted {
            type_name: self.related_type_name,
            kind: SaveKind::from(action),
        });

        let result: Result<T, Error> = tokio::select! {
            _ = cancel.cancelled() => Err(Error::cancelled()),
            res = self.adapter.save_item(request) => res.map_err(Error::from),
        };

        self.metrics.record(MetricsEvent::SaveFinished {
            type_name: self.related_type_name,
            kind: SaveKind::from(action),
            ok: result.is_ok(),
        });

        match result {
            Ok(stored) => {
                state.finalize_with(stored.clone());
                Ok(ReadResult::new(stored, state.validator.clone()))
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn related_type_name(&self) -> &'static str {
        self.related_type_name
    }

    pub(crate) fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    pub(crate) fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }
}
