//! Single-row updates keyed by the id columns.
//!
//! Only the descriptor's updatable columns are written. Id and tenant columns
//! can never be updatable, so they keep their stored value.

use sea_orm::Value;

use super::condition::{self, Condition};
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, entity_value, entity_values};
use crate::error::{Error, Result};
use crate::persistence::{Call, Context};

const VERSION_COLUMN: &str = "version";

fn check_updatable(descriptor: &TableDescriptor, operation: &'static str) -> Result<()> {
    descriptor.validate_for(operation)?;

    let scope = descriptor.scope(operation);
    if descriptor.updatable_columns().is_empty() {
        return Err(Error::invalid_data("no updatable columns declared").with_scope(&scope));
    }

    let protected = descriptor
        .id_columns()
        .iter()
        .map(String::as_str)
        .chain(descriptor.tenant_column())
        .chain(std::iter::once(VERSION_COLUMN));
    for column in protected {
        if descriptor.updatable_columns().iter().any(|c| c == column) {
            return Err(Error::invalid_data(format_args!(
                "column {column} cannot be updated"
            ))
            .with_scope(&scope));
        }
    }
    Ok(())
}

/// `UPDATE t SET a = ?, b = ?[, version = version+1] WHERE ...`.
fn update_sql(descriptor: &TableDescriptor, versioned: bool, predicate: &str) -> String {
    let assignments: Vec<String> = descriptor
        .updatable_columns()
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect();
    let bump = if versioned { ", version = version+1" } else { "" };
    format!(
        "UPDATE {} SET {}{} WHERE {}",
        descriptor.table(),
        assignments.join(", "),
        bump,
        predicate
    )
}

/// Equality on every id column, plus the expected version when requested.
fn key_conditions<E: Entity>(
    descriptor: &TableDescriptor,
    entity: &E,
    skip: Option<&str>,
    versioned: bool,
) -> Result<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(descriptor.id_columns().len() + 1);
    for column in descriptor.id_columns() {
        if Some(column.as_str()) == skip {
            continue;
        }
        conditions.push(Condition::equal(column.clone(), entity_value(entity, column)?));
    }

    if versioned {
        if !descriptor.has_column(VERSION_COLUMN) {
            return Err(Error::invalid_data(format_args!(
                "table {} has no version column",
                descriptor.table()
            )));
        }
        conditions.push(Condition::equal(
            VERSION_COLUMN,
            entity_value(entity, VERSION_COLUMN)?,
        ));
    }

    Ok(conditions)
}

async fn update_one(
    call: &Call<'_>,
    descriptor: &TableDescriptor,
    versioned: bool,
    mut args: Vec<Value>,
    conditions: &[Condition],
) -> Result<()> {
    let (predicate, where_args) = condition::render(conditions);
    args.extend(where_args);

    let sql = update_sql(descriptor, versioned, &predicate);
    let affected = call.execute(&sql, args).await?;

    match affected {
        1 => Ok(()),
        0 if versioned => Err(Error::not_found_because("concurrent update").with_scope(call.scope())),
        0 => Err(Error::not_found().with_scope(call.scope())),
        n => Err(Error::internal(format_args!(
            "should update single row, but updated {n} rows"
        ))
        .with_scope(call.scope())),
    }
}

/// Updates one row of a tenant-owned table.
#[derive(Debug, Clone)]
pub struct Updater {
    descriptor: TableDescriptor,
    tenant: TenantScope,
}

impl Updater {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "update")?;
        check_updatable(&descriptor, "update")?;
        Ok(Self { descriptor, tenant })
    }

    pub async fn update_single<E: Entity>(&self, ctx: &Context, tenant: &str, entity: &E) -> Result<()> {
        self.update(ctx, tenant, entity, false, "update").await
    }

    /// Like [`update_single`](Self::update_single), guarded by the entity's
    /// `version` which is incremented on success.
    pub async fn update_single_with_version<E: Entity>(
        &self,
        ctx: &Context,
        tenant: &str,
        entity: &E,
    ) -> Result<()> {
        self.update(ctx, tenant, entity, true, "update_with_version")
            .await
    }

    async fn update<E: Entity>(
        &self,
        ctx: &Context,
        tenant: &str,
        entity: &E,
        versioned: bool,
        operation: &'static str,
    ) -> Result<()> {
        let scope = self.descriptor.scope(operation);
        let (args, conditions) = entity_values(entity, self.descriptor.updatable_columns())
            .and_then(|args| {
                let keys =
                    key_conditions(&self.descriptor, entity, Some(self.tenant.column()), versioned)?;
                Ok((args, self.tenant.apply(tenant, &keys)?))
            })
            .map_err(|e| e.with_scope(&scope))?;

        let call = Call::new(ctx, scope);
        update_one(&call, &self.descriptor, versioned, args, &conditions).await
    }
}

/// Updates one row without tenant scoping.
#[derive(Debug, Clone)]
pub struct UpdaterGlobal {
    descriptor: TableDescriptor,
}

impl UpdaterGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        check_updatable(&descriptor, "update_global")?;
        Ok(Self { descriptor })
    }

    pub async fn update_single_global<E: Entity>(&self, ctx: &Context, entity: &E) -> Result<()> {
        self.update(ctx, entity, false, "update_global").await
    }

    pub async fn update_single_with_version_global<E: Entity>(
        &self,
        ctx: &Context,
        entity: &E,
    ) -> Result<()> {
        self.update(ctx, entity, true, "update_with_version_global")
            .await
    }

    async fn update<E: Entity>(
        &self,
        ctx: &Context,
        entity: &E,
        versioned: bool,
        operation: &'static str,
    ) -> Result<()> {
        let scope = self.descriptor.scope(operation);
        let (args, conditions) = entity_values(entity, self.descriptor.updatable_columns())
            .and_then(|args| Ok((args, key_conditions(&self.descriptor, entity, None, versioned)?)))
            .map_err(|e| e.with_scope(&scope))?;

        let call = Call::new(ctx, scope);
        update_one(&call, &self.descriptor, versioned, args, &conditions).await
    }
}
