//! Insert-or-update on a conflict target.
//!
//! The tenant-scoped variant guards the `DO UPDATE` branch with the tenant
//! column, so a conflicting row owned by another tenant is left untouched and
//! reported as not found.

use super::create::insert_sql;
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, entity_values};
use crate::error::{Error, Result};
use crate::persistence::{Call, Context};

const OWNER_ACCESS_REQUIRED: &str = "Owner access is needed for resource modification";

fn conflict_columns<I, S>(
    descriptor: &TableDescriptor,
    columns: I,
    operation: &'static str,
) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    let scope = descriptor.scope(operation);

    if columns.is_empty() {
        return Err(Error::invalid_data("upsert requires conflict columns").with_scope(&scope));
    }
    if descriptor.updatable_columns().is_empty() {
        return Err(Error::invalid_data("no updatable columns declared").with_scope(&scope));
    }
    descriptor
        .ensure_columns(&columns, "conflict")
        .map_err(|e| e.with_scope(&scope))?;
    Ok(columns)
}

/// `INSERT ... ON CONFLICT ( c ) DO UPDATE SET u=EXCLUDED.u, ...`.
fn upsert_sql(descriptor: &TableDescriptor, conflict_columns: &[String]) -> String {
    let assignments: Vec<String> = descriptor
        .updatable_columns()
        .iter()
        .map(|column| format!("{column}=EXCLUDED.{column}"))
        .collect();
    format!(
        "{} ON CONFLICT ( {} ) DO UPDATE SET {}",
        insert_sql(descriptor.table(), descriptor.columns()),
        conflict_columns.join(", "),
        assignments.join(", ")
    )
}

fn single_row(call: &Call<'_>, affected: u64, scoped: bool) -> Result<()> {
    match affected {
        1 => Ok(()),
        0 if scoped => Err(Error::not_found_because(OWNER_ACCESS_REQUIRED).with_scope(call.scope())),
        n => Err(Error::internal(format_args!(
            "should upsert single row, but upserted {n} rows"
        ))
        .with_scope(call.scope())),
    }
}

/// Upserts entities of a tenant-owned table.
#[derive(Debug, Clone)]
pub struct Upserter {
    descriptor: TableDescriptor,
    tenant: TenantScope,
    conflict_columns: Vec<String>,
}

impl Upserter {
    pub fn new<I, S>(descriptor: TableDescriptor, conflict_columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tenant = TenantScope::for_operation(&descriptor, "upsert")?;
        let conflict_columns = self::conflict_columns(&descriptor, conflict_columns, "upsert")?;
        Ok(Self {
            descriptor,
            tenant,
            conflict_columns,
        })
    }

    pub async fn upsert<E: Entity>(&self, ctx: &Context, tenant: &str, entity: &E) -> Result<()> {
        let scope = self.descriptor.scope("upsert");
        let args = self
            .tenant
            .entity_values(self.descriptor.columns(), tenant, entity)
            .and_then(|mut args| {
                args.push(self.tenant.tenant_value(tenant)?);
                Ok(args)
            })
            .map_err(|e| e.with_scope(&scope))?;

        let sql = format!(
            "{} WHERE {}.{} = ?",
            upsert_sql(&self.descriptor, &self.conflict_columns),
            self.descriptor.table(),
            self.tenant.column()
        );
        let call = Call::new(ctx, scope);
        let affected = call.execute(&sql, args).await?;
        single_row(&call, affected, true)
    }
}

/// Upserts entities without tenant checks.
#[derive(Debug, Clone)]
pub struct UpserterGlobal {
    descriptor: TableDescriptor,
    conflict_columns: Vec<String>,
}

impl UpserterGlobal {
    pub fn new<I, S>(descriptor: TableDescriptor, conflict_columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        descriptor.validate_for("upsert_global")?;
        let conflict_columns = self::conflict_columns(&descriptor, conflict_columns, "upsert_global")?;
        Ok(Self {
            descriptor,
            conflict_columns,
        })
    }

    pub async fn upsert_global<E: Entity>(&self, ctx: &Context, entity: &E) -> Result<()> {
        let scope = self.descriptor.scope("upsert_global");
        let args = entity_values(entity, self.descriptor.columns()).map_err(|e| e.with_scope(&scope))?;

        let sql = upsert_sql(&self.descriptor, &self.conflict_columns);
        let call = Call::new(ctx, scope);
        let affected = call.execute(&sql, args).await?;
        single_row(&call, affected, false)
    }
}
