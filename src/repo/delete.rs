//! Row deletion.
//!
//! Deleting nothing is not an error: removing an already removed row succeeds.

use super::condition::Condition;
use super::query_builder::append_where;
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use crate::error::{Error, Result};
use crate::persistence::{Call, Context};

async fn delete_rows(
    call: &Call<'_>,
    table: &str,
    conditions: &[Condition],
    single: bool,
) -> Result<u64> {
    let mut sql = format!("DELETE FROM {table}");
    let args = append_where(&mut sql, conditions);
    let affected = call.execute(&sql, args).await?;

    if single && affected > 1 {
        return Err(Error::internal(format_args!(
            "delete should remove single row, but removed {affected} rows"
        ))
        .with_scope(call.scope()));
    }
    Ok(affected)
}

/// Deletes rows of a tenant-owned table.
#[derive(Debug, Clone)]
pub struct Deleter {
    descriptor: TableDescriptor,
    tenant: TenantScope,
}

impl Deleter {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "delete")?;
        Ok(Self { descriptor, tenant })
    }

    /// Deletes the single row of `tenant` matching `conditions`.
    pub async fn delete_one(&self, ctx: &Context, tenant: &str, conditions: &[Condition]) -> Result<()> {
        self.delete(ctx, tenant, conditions, true, "delete_one")
            .await
            .map(|_| ())
    }

    /// Deletes every row of `tenant` matching `conditions`, returning the count.
    pub async fn delete_many(&self, ctx: &Context, tenant: &str, conditions: &[Condition]) -> Result<u64> {
        self.delete(ctx, tenant, conditions, false, "delete_many")
            .await
    }

    async fn delete(
        &self,
        ctx: &Context,
        tenant: &str,
        conditions: &[Condition],
        single: bool,
        operation: &'static str,
    ) -> Result<u64> {
        let scope = self.descriptor.scope(operation);
        let scoped = self
            .tenant
            .apply(tenant, conditions)
            .map_err(|e| e.with_scope(&scope))?;

        delete_rows(&Call::new(ctx, scope), self.descriptor.table(), &scoped, single).await
    }
}

/// Deletes rows without tenant scoping.
#[derive(Debug, Clone)]
pub struct DeleterGlobal {
    descriptor: TableDescriptor,
}

impl DeleterGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("delete_global")?;
        Ok(Self { descriptor })
    }

    pub async fn delete_one_global(&self, ctx: &Context, conditions: &[Condition]) -> Result<()> {
        let call = Call::new(ctx, self.descriptor.scope("delete_one_global"));
        delete_rows(&call, self.descriptor.table(), conditions, true)
            .await
            .map(|_| ())
    }

    /// Without conditions this empties the table.
    pub async fn delete_many_global(&self, ctx: &Context, conditions: &[Condition]) -> Result<u64> {
        let call = Call::new(ctx, self.descriptor.scope("delete_many_global"));
        delete_rows(&call, self.descriptor.table(), conditions, false).await
    }
}
