use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::model::SaveAction;
use crate::obs::MetricsSink;
use crate::adapter::StoreAdapter;
use crate::proxy::{ChangeBaseline, Item};

use super::save::SaveCommand;
use super::{run_validator, Validator};

///
/// ReadResult
///
/// A read-only view of an item (spec §4.4). Produced by `Provider::read`
/// and wrapped inside every successful `SaveCommand::save`.
///
#[derive(Clone)]
pub struct ReadResult<T: Item> {
    item: T,
    validator: Option<Validator<T>>,
}

impl<T: Item> ReadResult<T> {
    pub(crate) fn new(item: T, validator: Option<Validator<T>>) -> Self {
        Self { item, validator }
    }

    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }

    #[must_use]
    pub fn validate(&self) -> super::ValidationResult {
        run_validator(self.validator.as_ref(), &self.item)
    }
}

///
/// QueryResult
///
/// A [`ReadResult`] produced by row iteration that can additionally be
/// converted into an `Update` or `Delete` [`SaveCommand`] (spec §4.4).
/// Conversion is one-shot: whichever of `into_update`/`into_delete` wins
/// the race flips `converted`; the other call (or a repeat of the same
/// call) fails with `AlreadyConverted`. Modeled with `AtomicBool` rather
/// than consuming `self`, since a `QueryResult` may be held behind a
/// shared reference while iterating (spec §4.4: "may be called at most
/// once ... a second call ... fails").
///
pub struct QueryResult<T: Item, A: StoreAdapter<T>> {
    read: ReadResult<T>,
    adapter: Arc<A>,
    metrics: Arc<dyn MetricsSink>,
    related_type_name: &'static str,
    converted: AtomicBool,
}

impl<T: Item, A: StoreAdapter<T>> QueryResult<T, A> {
    pub(crate) fn new(
        item: T,
        validator: Option<Validator<T>>,
        adapter: Arc<A>,
        metrics: Arc<dyn MetricsSink>,
        related_type_name: &'static str,
    ) -> Self {
        Self {
            read: ReadResult::new(item, validator),
            adapter,
            metrics,
            related_type_name,
            converted: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn item(&self) -> &T {
        self.read.item()
    }

    #[must_use]
    pub fn validate(&self) -> super::ValidationResult {
        self.read.validate()
    }

    /// Convert into an `Update` save command. One-shot across both
    /// `into_update` and `into_delete`.
    pub fn into_update(&self) -> Result<SaveCommand<T, A>, Error> {
        self.convert(SaveAction::Updated)
    }

    /// Convert into a `Delete` save command. One-shot across both
    /// `into_update` and `into_delete`.
    pub fn into_delete(&self) -> Result<SaveCommand<T, A>, Error> {
        self.convert(SaveAction::Deleted)
    }

    fn convert(&self, action: SaveAction) -> Result<SaveCommand<T, A>, Error> {
        self.converted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::already_converted())?;

        let item = self.read.item().clone();
        let baseline = match action {
            SaveAction::Deleted => ChangeBaseline::Suppressed,
            _ => ChangeBaseline::Snapshot(crate::proxy::snapshot(&item)),
        };
        Ok(SaveCommand::new(
            item,
            action,
            baseline,
            self.read.validator.clone(),
            self.related_type_name,
            Arc::clone(&self.adapter),
            Arc::clone(&self.metrics),
        ))
    }
}
