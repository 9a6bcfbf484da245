//! Existence checks.

use super::condition::Condition;
use super::order::OrderBySpec;
use super::query_builder::{SelectQuery, build_select};
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use crate::error::Result;
use crate::persistence::{Call, Context};

async fn any_row(call: &Call<'_>, query: SelectQuery) -> Result<bool> {
    let sql = format!("{} LIMIT 1", query.sql);
    Ok(call.query_one(&sql, query.args).await?.is_some())
}

#[derive(Debug, Clone)]
pub struct ExistQuerier {
    descriptor: TableDescriptor,
    tenant: TenantScope,
}

impl ExistQuerier {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "exists")?;
        Ok(Self { descriptor, tenant })
    }

    /// Whether `tenant` owns a row matching `conditions`.
    pub async fn exists(&self, ctx: &Context, tenant: &str, conditions: &[Condition]) -> Result<bool> {
        let scope = self.descriptor.scope("exists");
        let query = self
            .tenant
            .apply(tenant, conditions)
            .and_then(|scoped| {
                build_select(self.descriptor.table(), &["1"], &scoped, &OrderBySpec::none())
            })
            .map_err(|e| e.with_scope(&scope))?;

        any_row(&Call::new(ctx, scope), query).await
    }
}

#[derive(Debug, Clone)]
pub struct ExistQuerierGlobal {
    descriptor: TableDescriptor,
}

impl ExistQuerierGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("exists_global")?;
        Ok(Self { descriptor })
    }

    pub async fn exists_global(&self, ctx: &Context, conditions: &[Condition]) -> Result<bool> {
        let scope = self.descriptor.scope("exists_global");
        let query = build_select(self.descriptor.table(), &["1"], conditions, &OrderBySpec::none())
            .map_err(|e| e.with_scope(&scope))?;

        any_row(&Call::new(ctx, scope), query).await
    }
}
