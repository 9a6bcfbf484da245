//! `INSERT` of single entities.

use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, entity_values};
use crate::error::{Error, Result};
use crate::persistence::{Call, Context};

/// `INSERT INTO t ( a, b ) VALUES ( ?, ? )`.
pub(crate) fn insert_sql<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    let markers = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO {} ( {} ) VALUES ( {} )",
        table,
        names.join(", "),
        markers
    )
}

fn matching_clause(matching_columns: &[String]) -> String {
    if matching_columns.is_empty() {
        return String::new();
    }
    format!(" ON CONFLICT ( {} ) DO NOTHING", matching_columns.join(", "))
}

fn checked_matching_columns<I, S>(
    descriptor: &TableDescriptor,
    columns: I,
    operation: &'static str,
) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    descriptor
        .ensure_columns(&columns, "matching")
        .map_err(|e| e.with_scope(&descriptor.scope(operation)))?;
    Ok(columns)
}

/// A skipped insert means another row already holds the matching columns.
fn ensure_inserted(call: &Call<'_>, affected: u64, matching_columns: &[String]) -> Result<()> {
    if affected == 0 && !matching_columns.is_empty() {
        return Err(Error::not_unique().with_scope(call.scope()));
    }
    Ok(())
}

/// Inserts entities into a tenant-owned table.
#[derive(Debug, Clone)]
pub struct Creator {
    descriptor: TableDescriptor,
    tenant: TenantScope,
    matching_columns: Vec<String>,
}

impl Creator {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "create")?;
        Ok(Self {
            descriptor,
            tenant,
            matching_columns: Vec::new(),
        })
    }

    /// Skips the insert when a row with equal `columns` exists, reporting `NotUnique`.
    pub fn with_matching_columns<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matching_columns = checked_matching_columns(&self.descriptor, columns, "create")?;
        Ok(self)
    }

    /// Inserts `entity` on behalf of `tenant`.
    ///
    /// The entity's tenant column is filled from `tenant` when unset and must
    /// otherwise equal it.
    pub async fn create<E: Entity>(&self, ctx: &Context, tenant: &str, entity: &E) -> Result<()> {
        let scope = self.descriptor.scope("create");
        let args = self
            .tenant
            .entity_values(self.descriptor.columns(), tenant, entity)
            .map_err(|e| e.with_scope(&scope))?;

        tracing::debug!(
            resource = %self.descriptor.resource_type(),
            tenant_id = %tenant,
            "Persisting entity"
        );

        let sql = insert_sql(self.descriptor.table(), self.descriptor.columns())
            + &matching_clause(&self.matching_columns);
        let call = Call::new(ctx, scope);
        let affected = call.execute(&sql, args).await?;
        ensure_inserted(&call, affected, &self.matching_columns)
    }
}

/// Inserts entities without tenant checks.
#[derive(Debug, Clone)]
pub struct CreatorGlobal {
    descriptor: TableDescriptor,
    matching_columns: Vec<String>,
}

impl CreatorGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("create_global")?;
        Ok(Self {
            descriptor,
            matching_columns: Vec::new(),
        })
    }

    pub fn with_matching_columns<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matching_columns =
            checked_matching_columns(&self.descriptor, columns, "create_global")?;
        Ok(self)
    }

    pub async fn create_global<E: Entity>(&self, ctx: &Context, entity: &E) -> Result<()> {
        let scope = self.descriptor.scope("create_global");
        let args = entity_values(entity, self.descriptor.columns())
            .map_err(|e| e.with_scope(&scope))?;

        let sql = insert_sql(self.descriptor.table(), self.descriptor.columns())
            + &matching_clause(&self.matching_columns);
        let call = Call::new(ctx, scope);
        let affected = call.execute(&sql, args).await?;
        ensure_inserted(&call, affected, &self.matching_columns)
    }
}
