//! Unpaged multi-row reads.

use super::condition::Condition;
use super::order::OrderBySpec;
use super::query_builder::{SelectQuery, build_select};
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, decode};
use crate::error::Result;
use crate::pagination::Collection;
use crate::persistence::{Call, Context};

async fn fetch_all<E: Entity>(call: &Call<'_>, query: SelectQuery) -> Result<Collection<E>> {
    let rows = call.query_all(&query.sql, query.args).await?;
    rows.iter().map(|row| decode(call.scope(), row)).collect()
}

/// Lists rows of a tenant-owned table in a fixed order.
#[derive(Debug, Clone)]
pub struct Lister {
    descriptor: TableDescriptor,
    tenant: TenantScope,
    order_by: OrderBySpec,
}

impl Lister {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "list")?;
        Ok(Self {
            descriptor,
            tenant,
            order_by: OrderBySpec::none(),
        })
    }

    pub fn with_order_by(mut self, order_by: OrderBySpec) -> Self {
        self.order_by = order_by;
        self
    }

    /// Every row of `tenant` matching `conditions`; an empty result is not an error.
    pub async fn list<E: Entity>(
        &self,
        ctx: &Context,
        tenant: &str,
        conditions: &[Condition],
    ) -> Result<Collection<E>> {
        let scope = self.descriptor.scope("list");
        let query = self
            .tenant
            .apply(tenant, conditions)
            .and_then(|scoped| {
                build_select(
                    self.descriptor.table(),
                    self.descriptor.columns(),
                    &scoped,
                    &self.order_by,
                )
            })
            .map_err(|e| e.with_scope(&scope))?;

        fetch_all(&Call::new(ctx, scope), query).await
    }
}

/// Lists rows without tenant scoping.
#[derive(Debug, Clone)]
pub struct ListerGlobal {
    descriptor: TableDescriptor,
    order_by: OrderBySpec,
}

impl ListerGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("list_global")?;
        Ok(Self {
            descriptor,
            order_by: OrderBySpec::none(),
        })
    }

    pub fn with_order_by(mut self, order_by: OrderBySpec) -> Self {
        self.order_by = order_by;
        self
    }

    pub async fn list_global<E: Entity>(
        &self,
        ctx: &Context,
        conditions: &[Condition],
    ) -> Result<Collection<E>> {
        let scope = self.descriptor.scope("list_global");
        let query = build_select(
            self.descriptor.table(),
            self.descriptor.columns(),
            conditions,
            &self.order_by,
        )
        .map_err(|e| e.with_scope(&scope))?;

        fetch_all(&Call::new(ctx, scope), query).await
    }
}
