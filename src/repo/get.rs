//! Single-row reads.

use sea_orm::QueryResult;

use super::condition::Condition;
use super::order::OrderBySpec;
use super::query_builder::{SelectQuery, build_select};
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, decode};
use crate::error::{Error, Result};
use crate::persistence::{Call, Context};

/// Fetches at most two rows so that ambiguity is detected without scanning.
async fn fetch_single<E: Entity>(call: &Call<'_>, query: SelectQuery) -> Result<E> {
    let sql = format!("{} LIMIT 2", query.sql);
    let mut rows: Vec<QueryResult> = call.query_all(&sql, query.args).await?;

    match rows.len() {
        0 => Err(Error::not_found().with_scope(call.scope())),
        1 => {
            let row = rows.remove(0);
            decode(call.scope(), &row)
        }
        n => {
            tracing::error!(
                table = ?call.scope().table,
                rows = n,
                "Single-row query matched several rows"
            );
            Err(Error::internal("more than one row returned for a single-row query")
                .with_scope(call.scope()))
        }
    }
}

/// Reads exactly one row of a tenant-owned table.
#[derive(Debug, Clone)]
pub struct SingleGetter {
    descriptor: TableDescriptor,
    tenant: TenantScope,
}

impl SingleGetter {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "get")?;
        Ok(Self { descriptor, tenant })
    }

    pub async fn get<E: Entity>(
        &self,
        ctx: &Context,
        tenant: &str,
        conditions: &[Condition],
        order_by: &OrderBySpec,
    ) -> Result<E> {
        let scope = self.descriptor.scope("get");
        let query = self
            .tenant
            .apply(tenant, conditions)
            .and_then(|scoped| {
                build_select(
                    self.descriptor.table(),
                    self.descriptor.columns(),
                    &scoped,
                    order_by,
                )
            })
            .map_err(|e| e.with_scope(&scope))?;

        fetch_single(&Call::new(ctx, scope), query).await
    }
}

/// Reads exactly one row without tenant scoping.
#[derive(Debug, Clone)]
pub struct SingleGetterGlobal {
    descriptor: TableDescriptor,
}

impl SingleGetterGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("get_global")?;
        Ok(Self { descriptor })
    }

    pub async fn get_global<E: Entity>(
        &self,
        ctx: &Context,
        conditions: &[Condition],
        order_by: &OrderBySpec,
    ) -> Result<E> {
        let scope = self.descriptor.scope("get_global");
        let query = build_select(
            self.descriptor.table(),
            self.descriptor.columns(),
            conditions,
            order_by,
        )
        .map_err(|e| e.with_scope(&scope))?;

        fetch_single(&Call::new(ctx, scope), query).await
    }
}
