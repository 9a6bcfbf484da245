//! # Repo Kit
//!
//! Generic tenant-aware CRUD building blocks. Domain repositories describe a
//! table once with a [`TableDescriptor`] and compose the operation structs
//! instead of hand-writing SQL. Every tenant-scoped operation has a
//! separately named `...Global` counterpart for tables without tenant
//! ownership.

pub mod condition;
pub mod create;
pub mod delete;
pub mod exist;
pub mod get;
pub mod list;
pub mod list_pageable;
pub mod list_union;
pub mod order;
pub mod query_builder;
pub mod rebind;
pub mod table;
mod tenant;
pub mod update;
pub mod upsert;

use sea_orm::{FromQueryResult, QueryResult, Value};

use crate::error::{Error, Result, Scope, translate};

pub use condition::{Condition, Conditions};
pub use create::{Creator, CreatorGlobal};
pub use delete::{Deleter, DeleterGlobal};
pub use exist::{ExistQuerier, ExistQuerierGlobal};
pub use get::{SingleGetter, SingleGetterGlobal};
pub use list::{Lister, ListerGlobal};
pub use list_pageable::{PageableQuerier, PageableQuerierGlobal};
pub use list_union::{UnionLister, UnionListerGlobal, UnionPage, UnionRequest};
pub use order::{Direction, OrderBy, OrderBySpec};
pub use query_builder::{QueryBuilder, QueryBuilderGlobal, SelectQuery, build_select};
pub use table::{TableDescriptor, TenantKind};
pub use update::{Updater, UpdaterGlobal};
pub use upsert::{Upserter, UpserterGlobal};

/// Row type persisted through the repo kit.
///
/// Reads decode through [`FromQueryResult`]; writes pull column values by name.
pub trait Entity: FromQueryResult + Send + Sync {
    /// Value to bind for `column`, or `None` when the entity does not carry it.
    fn value(&self, column: &str) -> Option<Value>;
}

pub(crate) fn decode<E: Entity>(scope: &Scope, row: &QueryResult) -> Result<E> {
    E::from_query_result(row, "").map_err(|err| translate(scope, err))
}

pub(crate) fn entity_value<E: Entity>(entity: &E, column: &str) -> Result<Value> {
    entity
        .value(column)
        .ok_or_else(|| Error::invalid_data(format_args!("entity has no value for column {column}")))
}

/// Column values of `entity` in `columns` order.
pub(crate) fn entity_values<E, S>(entity: &E, columns: &[S]) -> Result<Vec<Value>>
where
    E: Entity,
    S: AsRef<str>,
{
    columns
        .iter()
        .map(|column| entity_value(entity, column.as_ref()))
        .collect()
}
