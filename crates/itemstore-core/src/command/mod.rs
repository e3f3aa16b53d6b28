//! Save commands (Create/Update/Delete) and read results (spec §4.3/§4.4).

mod read;
mod save;

pub use read::{QueryResult, ReadResult};
pub use save::SaveCommand;

pub(crate) use save::SaveState;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::proxy::Item;

///
/// ValidationResult
///
/// Aggregated field-level validation failures (spec §4.3 `Validate`).
/// Empty `field_errors` means valid.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationResult {
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }
}

/// Registered validator for a concrete item type: pure, synchronous, no I/O.
pub type Validator<T> = Arc<dyn Fn(&T) -> ValidationResult + Send + Sync>;

pub(crate) fn run_validator<T: Item>(validator: Option<&Validator<T>>, item: &T) -> ValidationResult {
    match validator {
        Some(v) => v(item),
        None => ValidationResult::default(),
    }
}
