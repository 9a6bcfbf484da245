//! Offset-paginated reads.
//!
//! Each call issues the page query and an independent `COUNT(*)` over the same
//! predicate. Ordering by a unique column keeps pages disjoint.

use sea_orm::Value;

use super::condition::Condition;
use super::query_builder::append_where;
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, decode};
use crate::config::RepoConfig;
use crate::error::{Error, Result, translate};
use crate::pagination::{Page, decode_cursor, validate_page_size};
use crate::persistence::{Call, Context};

/// Page-independent part of a pageable request.
struct PageRequest<'a> {
    page_size: u32,
    cursor: &'a str,
    order_by_column: &'a str,
}

async fn fetch_page<E: Entity>(
    call: &Call<'_>,
    descriptor: &TableDescriptor,
    max_page_size: u32,
    request: PageRequest<'_>,
    conditions: &[Condition],
) -> Result<Page<E>> {
    let offset = validate_page_size(request.page_size, max_page_size)
        .and_then(|_| decode_cursor(request.cursor))
        .and_then(|offset| {
            descriptor.ensure_columns(&[request.order_by_column], "order by")?;
            Ok(offset)
        })
        .map_err(|e| e.with_scope(call.scope()))?;

    let mut page_sql = format!("SELECT {} FROM {}", descriptor.columns().join(", "), descriptor.table());
    let args: Vec<Value> = append_where(&mut page_sql, conditions);
    page_sql.push_str(&format!(
        " ORDER BY {} LIMIT {} OFFSET {}",
        request.order_by_column, request.page_size, offset
    ));

    let mut count_sql = format!("SELECT COUNT(*) FROM {}", descriptor.table());
    let count_args = append_where(&mut count_sql, conditions);

    let rows = call.query_all(&page_sql, args).await?;
    let items = rows
        .iter()
        .map(|row| decode(call.scope(), row))
        .collect::<Result<Vec<E>>>()?;

    let total_count = match call.query_one(&count_sql, count_args).await? {
        Some(row) => {
            let count: i64 = row
                .try_get_by_index(0)
                .map_err(|err| translate(call.scope(), err.into()))?;
            u64::try_from(count).map_err(|_| {
                Error::internal(format_args!("negative row count {count}")).with_scope(call.scope())
            })?
        }
        None => 0,
    };

    tracing::debug!(
        table = ?call.scope().table,
        offset,
        returned = items.len(),
        total_count,
        "Fetched page"
    );

    Ok(Page::assemble(items, request.cursor, offset, request.page_size, total_count))
}

/// Paginates rows of a tenant-owned table.
#[derive(Debug, Clone)]
pub struct PageableQuerier {
    descriptor: TableDescriptor,
    tenant: TenantScope,
    max_page_size: u32,
}

impl PageableQuerier {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "list_pageable")?;
        Ok(Self {
            descriptor,
            tenant,
            max_page_size: RepoConfig::default().max_page_size,
        })
    }

    /// Caps the accepted page size, usually with [`RepoConfig::max_page_size`].
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Returns the page of `tenant`'s rows addressed by `cursor`.
    pub async fn list<E: Entity>(
        &self,
        ctx: &Context,
        tenant: &str,
        page_size: u32,
        cursor: &str,
        order_by_column: &str,
        conditions: &[Condition],
    ) -> Result<Page<E>> {
        let scope = self.descriptor.scope("list_pageable");
        let scoped = self
            .tenant
            .apply(tenant, conditions)
            .map_err(|e| e.with_scope(&scope))?;

        let request = PageRequest {
            page_size,
            cursor,
            order_by_column,
        };
        fetch_page(
            &Call::new(ctx, scope),
            &self.descriptor,
            self.max_page_size,
            request,
            &scoped,
        )
        .await
    }
}

/// Paginates rows without tenant scoping.
#[derive(Debug, Clone)]
pub struct PageableQuerierGlobal {
    descriptor: TableDescriptor,
    max_page_size: u32,
}

impl PageableQuerierGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("list_pageable_global")?;
        Ok(Self {
            descriptor,
            max_page_size: RepoConfig::default().max_page_size,
        })
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub async fn list_global<E: Entity>(
        &self,
        ctx: &Context,
        page_size: u32,
        cursor: &str,
        order_by_column: &str,
        conditions: &[Condition],
    ) -> Result<Page<E>> {
        let request = PageRequest {
            page_size,
            cursor,
            order_by_column,
        };
        fetch_page(
            &Call::new(ctx, self.descriptor.scope("list_pageable_global")),
            &self.descriptor,
            self.max_page_size,
            request,
            conditions,
        )
        .await
    }
}
