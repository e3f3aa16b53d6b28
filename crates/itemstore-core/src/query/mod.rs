//! Composable, backend-neutral query builder (spec §4.5) and the
//! expression rewriter that binds it to a concrete item type (spec §4.6 /
//! Design Notes §9).
//!
//! Rust has no `TInterface` vs `TItem` split the way the source's LINQ
//! expression trees do: a predicate here is always written directly
//! against field names. "Rewriting" therefore degenerates to *validating*
//! that every referenced field is one the concrete item declares as
//! queryable — still done once, at the point a clause is added, exactly
//! where the source would rebind a member access (see `DESIGN.md`).

mod predicate;

pub use predicate::Predicate;

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::{AdapterError, Error};
use crate::proxy::Item;

///
/// OrderKey
///

#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

///
/// QueryPlan
///
/// Fully composed, backend-bound query handed to
/// [`crate::adapter::StoreAdapter::query`]. Includes the two filters the
/// core implicitly appends and that a caller cannot remove (spec §4.5):
/// `type_name` equality and the live-row (non-deleted) filter.
///
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub type_name: &'static str,
    pub predicate: Option<Predicate>,
    pub order: Option<OrderKey>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

/// Rewrite-time validation: reject any field name the concrete item type
/// does not declare as queryable (spec §4.5: "Any member not mapped on the
/// concrete type fails with `BadRequest` at rewrite time").
fn rewrite_check<T: Item>(predicate: &Predicate, queryable: &[&'static str]) -> Result<(), Error> {
    let mut names = Vec::new();
    predicate.field_names(&mut names);
    for name in names {
        if !queryable.contains(&name.as_str()) {
            return Err(Error::bad_request(format!(
                "field '{name}' is not queryable on this item type"
            )));
        }
    }
    Ok(())
}

///
/// Query
///
/// Holds a stack of composed clauses (spec §4.5). `Where` calls AND
/// together (property 8); a later `OrderBy`/`OrderByDescending` replaces
/// any earlier ordering; `Skip`/`Take` follow ordering. Not safe for
/// concurrent mutation from multiple tasks — single-owner, like the
/// source's query command (spec §5).
///
pub struct Query<T: Item> {
    queryable_fields: &'static [&'static str],
    predicate: Option<Predicate>,
    order: Option<OrderKey>,
    skip: Option<u64>,
    take: Option<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Item> Query<T> {
    #[must_use]
    pub(crate) fn new(queryable_fields: &'static [&'static str]) -> Self {
        Self {
            queryable_fields,
            predicate: None,
            order: None,
            skip: None,
            take: None,
            _marker: PhantomData,
        }
    }

    /// Add a predicate, implicitly AND-ing with any existing predicate
    /// (spec §8 property 8).
    pub fn where_(mut self, predicate: Predicate) -> Result<Self, Error> {
        rewrite_check::<T>(&predicate, self.queryable_fields)?;
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        Ok(self)
    }

    /// Append an ascending sort key; replaces any earlier ordering.
    pub fn order_by(mut self, field: impl Into<String>) -> Result<Self, Error> {
        let field = field.into();
        if !self.queryable_fields.contains(&field.as_str()) {
            return Err(Error::bad_request(format!(
                "field '{field}' is not queryable on this item type"
            )));
        }
        self.order = Some(OrderKey {
            field,
            descending: false,
        });
        Ok(self)
    }

    /// Append a descending sort key; replaces any earlier ordering.
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Result<Self, Error> {
        let field = field.into();
        if !self.queryable_fields.contains(&field.as_str()) {
            return Err(Error::bad_request(format!(
                "field '{field}' is not queryable on this item type"
            )));
        }
        self.order = Some(OrderKey {
            field,
            descending: true,
        });
        Ok(self)
    }

    #[must_use]
    pub const fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    #[must_use]
    pub const fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    /// Compose the final plan, appending the two implicit filters the
    /// caller cannot remove: `typeName == <registered name>` AND
    /// (`isDeleted` absent OR `isDeleted == false`). A live row never
    /// serializes the field at all, so the filter is expressed as
    /// `isDeleted != true` rather than an equality check against `false`
    /// or `null` — an absent field compares unequal to `true` under
    /// `Predicate::matches`, but never equal to either `false` or `null`.
    pub(crate) fn into_plan(self, type_name: &'static str) -> QueryPlan {
        let live_filter =
            Predicate::eq("typeName", type_name).and(Predicate::ne("isDeleted", true));
        let predicate = match self.predicate {
            Some(p) => live_filter.and(p),
            None => live_filter,
        };
        QueryPlan {
            type_name,
            predicate: Some(predicate),
            order: self.order,
            skip: self.skip,
            take: self.take,
        }
    }
}

///
/// QueryCursor
///
/// Lazy, single-pass, cancellable row source returned by a store adapter.
/// Iteration never materializes the full result set in memory (spec
/// §4.5).
///
#[async_trait]
pub trait QueryCursor<T: Item>: Send {
    async fn next(&mut self) -> Result<Option<T>, AdapterError>;
}
