//! Metrics sink boundary.
//!
//! Command, batch, and query pipelines MUST NOT depend on any concrete
//! metrics backend. All instrumentation flows through [`MetricsEvent`] and
//! [`MetricsSink`], the only bridge between execution logic and caller-owned
//! observability (grounded on `icydb-core::obs::sink`). `tracing` spans are
//! emitted independently at the same call sites for structured logging.

use std::fmt;

///
/// SaveKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaveKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

impl From<crate::model::SaveAction> for SaveKind {
    fn from(action: crate::model::SaveAction) -> Self {
        match action {
            crate::model::SaveAction::Created => Self::Create,
            crate::model::SaveAction::Updated => Self::Update,
            crate::model::SaveAction::Deleted => Self::Delete,
        }
    }
}

///
/// MetricsEvent
///
/// Structured instrumentation points a [`MetricsSink`] may subscribe to.
///
#[derive(Clone, Debug)]
pub enum MetricsEvent {
    SaveStarted {
        type_name: &'static str,
        kind: SaveKind,
    },
    SaveFinished {
        type_name: &'static str,
        kind: SaveKind,
        ok: bool,
    },
    BatchStarted {
        type_name: &'static str,
        row_count: usize,
    },
    BatchFinished {
        type_name: &'static str,
        ok_count: usize,
        failed_count: usize,
    },
    QueryRowsScanned {
        type_name: &'static str,
        rows: u64,
    },
}

///
/// MetricsSink
///
/// Caller-supplied instrumentation boundary. The default
/// [`NullMetricsSink`] makes the core usable with zero observability setup.
///
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

///
/// NullMetricsSink
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn record(&self, _event: MetricsEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    impl MetricsSink for CountingSink {
        fn record(&self, _event: MetricsEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn sink_receives_events() {
        let sink = CountingSink::default();
        sink.record(MetricsEvent::SaveStarted {
            type_name: "test-item",
            kind: SaveKind::Create,
        });
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn null_sink_is_a_no_op() {
        NullMetricsSink.record(MetricsEvent::QueryRowsScanned {
            type_name: "test-item",
            rows: 3,
        });
    }
}
