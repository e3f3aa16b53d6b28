//! Batch driver (spec §4.6): collects save commands sharing a partition
//! key, validates all, acquires each exclusively, dispatches one atomic
//! multi-op to the adapter, and disperses per-row outcomes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::adapter::{BatchRowStatus, SaveRequest, StoreAdapter};
use crate::command::{run_validator, ReadResult, SaveCommand, SaveState, ValidationResult};
use crate::error::Error;
use crate::obs::{MetricsEvent, MetricsSink};
use crate::proxy::Item;

///
/// BatchResult
///
/// Per-row outcome of [`BatchCommand::save`], positionally aligned with
/// add-order (spec §4.6 step 5).
///
pub struct BatchResult<T: Item> {
    pub status: BatchRowStatus,
    pub result: Option<ReadResult<T>>,
}

impl<T: Item> BatchResult<T> {
    const fn ok(result: ReadResult<T>) -> Self {
        Self {
            status: BatchRowStatus::Ok,
            result: Some(result),
        }
    }

    const fn failed(status: BatchRowStatus) -> Self {
        Self {
            status,
            result: None,
        }
    }
}

///
/// BatchCommand
///
/// Holds a private mutex guarding both the add list and the save
/// pipeline (spec §5). Not `Clone`: a batch is meant to be built up and
/// saved once by a single owner.
///
pub struct BatchCommand<T: Item, A: StoreAdapter<T>> {
    commands: Mutex<Vec<SaveCommand<T, A>>>,
    adapter: Arc<A>,
    metrics: Arc<dyn MetricsSink>,
    related_type_name: &'static str,
}

impl<T: Item, A: StoreAdapter<T>> BatchCommand<T, A> {
    pub(crate) fn new(
        adapter: Arc<A>,
        metrics: Arc<dyn MetricsSink>,
        related_type_name: &'static str,
    ) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            adapter,
            metrics,
            related_type_name,
        }
    }

    /// Adds a save command. Fails with `AlreadySaved` if `command` has
    /// already finalized (spec §4.6).
    pub async fn add(&self, command: SaveCommand<T, A>) -> Result<(), Error> {
        if command.state.lock().await.finalized {
            return Err(Error::already_saved());
        }
        self.commands.lock().await.push(command);
        Ok(())
    }

    /// Runs every contained command's validator; pure, no I/O.
    pub async fn validate(&self) -> Vec<ValidationResult> {
        let commands = self.commands.lock().await;
        let mut results = Vec::with_capacity(commands.len());
        for command in commands.iter() {
            let state = command.state.lock().await;
            results.push(run_validator(state.validator.as_ref(), state.proxy.get()));
        }
        results
    }

    /// Runs the batch save pipeline (spec §4.6 steps 1-6).
    #[tracing::instrument(skip_all)]
    pub async fn save(
        &self,
        context: crate::model::RequestContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<BatchResult<T>>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let commands = self.commands.lock().await;
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        // Step: every added command must share one partition key, checked
        // before any I/O.
        let mut partition_key: Option<String> = None;
        for command in commands.iter() {
            let state = command.state.lock().await;
            let key = state.partition_key().to_string();
            match &partition_key {
                None => partition_key = Some(key),
                Some(existing) if *existing == key => {}
                Some(_) => {
                    return Err(Error::bad_request(
                        "all commands in a batch must share one partition key",
                    ));
                }
            }
        }
        let partition_key = partition_key.expect("non-empty commands checked above");

        // Step 1: validate every command; no acquires on failure.
        let mut field_errors = BTreeMap::new();
        for (idx, command) in commands.iter().enumerate() {
            let state = command.state.lock().await;
            let validation = run_validator(state.validator.as_ref(), state.proxy.get());
            for (field, messages) in validation.field_errors {
                field_errors
                    .entry(format!("[{idx}].{field}"))
                    .or_insert_with(Vec::new)
                    .extend(messages);
            }
        }
        if !field_errors.is_empty() {
            return Err(Error::validation(field_errors));
        }

        self.metrics.record(MetricsEvent::BatchStarted {
            type_name: self.related_type_name,
            row_count: commands.len(),
        });

        // Step 2: acquire each command's own mutex without holding foreign
        // locks across acquires. On any failure, release what was
        // acquired and report the failing row as BadRequest, siblings as
        // FailedDependency — no adapter call.
        let mut guards: Vec<OwnedMutexGuard<SaveState<T>>> = Vec::with_capacity(commands.len());
        let mut acquire_failed_at: Option<usize> = None;
        for command in commands.iter() {
            match Arc::clone(&command.state).try_lock_owned() {
                Ok(guard) if !guard.finalized => guards.push(guard),
                _ => {
                    acquire_failed_at = Some(guards.len());
                    break;
                }
            }
        }

        if let Some(failed_idx) = acquire_failed_at {
            drop(guards);
            let results = (0..commands.len())
                .map(|idx| {
                    if idx == failed_idx {
                        BatchRowStatus::BadRequest
                    } else {
                        BatchRowStatus::FailedDependency
                    }
                })
                .map(BatchResult::failed)
                .collect();
            return Ok(results);
        }

        // Step 3/4: build the request set, dispatch one atomic SaveBatch.
        let now = chrono::Utc::now();
        let requests: Vec<SaveRequest<T>> = guards
            .iter_mut()
            .map(|guard| guard.build_request(now, self.related_type_name, context.clone()))
            .collect();

        let batch_result = tokio::select! {
            _ = cancel.cancelled() => Err(crate::error::AdapterError::Internal("cancelled".into())),
            res = self.adapter.save_batch(&partition_key, requests) => res,
        };

        let row_results = match batch_result {
            Ok(rows) => rows,
            Err(err) => {
                let status = BatchRowStatus::from_adapter_error(&err);
                self.metrics.record(MetricsEvent::BatchFinished {
                    type_name: self.related_type_name,
                    ok_count: 0,
                    failed_count: guards.len(),
                });
                return Ok((0..guards.len())
                    .map(|_| BatchResult::failed(status))
                    .collect());
            }
        };

        // Step 5: finalize OK rows, leave non-OK rows unfinalized.
        let mut ok_count = 0usize;
        let mut failed_count = 0usize;
        let mut results = Vec::with_capacity(row_results.len());
        for (guard, row) in guards.iter_mut().zip(row_results) {
            match row.item {
                Some(stored) => {
                    guard.finalize_with(stored.clone());
                    ok_count += 1;
                    results.push(BatchResult::ok(ReadResult::new(
                        stored,
                        guard.validator.clone(),
                    )));
                }
                None => {
                    failed_count += 1;
                    results.push(BatchResult::failed(row.status));
                }
            }
        }

        self.metrics.record(MetricsEvent::BatchFinished {
            type_name: self.related_type_name,
            ok_count,
            failed_count,
        });

        drop(guards);
        Ok(results)
    }
}
