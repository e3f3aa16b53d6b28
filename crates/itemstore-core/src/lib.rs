//! Core runtime for an audited, optimistically-concurrent data-access
//! library over a pluggable item store.
//!
//! Organized leaf-first, mirroring the dependency chain each layer is
//! built on: [`model`] (envelope + audit event) underlies [`proxy`]
//! (read-only/tracked-change enforcement), which underlies [`adapter`]
//! (the narrow backend contract), which underlies [`command`] (Create/
//! Update/Delete/Read) and [`query`] (the composable query builder),
//! which underlie [`batch`] (partition-atomic multi-row saves) and
//! finally [`provider`] (the per-type façade callers use).

pub mod adapter;
pub mod batch;
pub mod command;
pub mod error;
pub mod model;
pub mod obs;
pub mod provider;
pub mod proxy;
pub mod query;

#[cfg(test)]
pub(crate) mod test_support;

/// Common imports for a caller wiring up a provider over a concrete item
/// type and adapter.
pub mod prelude {
    pub use crate::adapter::{BatchRowResult, BatchRowStatus, SaveRequest, StoreAdapter};
    pub use crate::batch::{BatchCommand, BatchResult};
    pub use crate::command::{QueryResult, ReadResult, SaveCommand, ValidationResult, Validator};
    pub use crate::error::{AdapterError, Error, ErrorKind};
    pub use crate::model::{Envelope, ItemEvent, PropertyChange, RequestContext, SaveAction};
    pub use crate::obs::{MetricsEvent, MetricsSink, NullMetricsSink, SaveKind};
    pub use crate::provider::{CommandOperations, NewItem, Provider, ProviderOptions};
    pub use crate::proxy::Item;
    pub use crate::query::{Predicate, Query, QueryCursor};
}
