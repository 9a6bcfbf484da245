//! Tenant isolation.
//!
//! A [`TenantScope`] is held by every tenant-scoped operation and is the only
//! way such an operation obtains its predicate list.

use sea_orm::Value;
use sea_orm::prelude::Uuid;

use super::condition::{Condition, Conditions};
use super::table::{TableDescriptor, TenantKind};
use super::{Entity, entity_value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TenantScope {
    column: String,
    kind: TenantKind,
}

impl TenantScope {
    /// Fails for descriptors without a tenant column.
    pub(crate) fn for_table(descriptor: &TableDescriptor) -> Result<Self> {
        match descriptor.tenant_column() {
            Some(column) if !column.trim().is_empty() => Ok(Self {
                column: column.to_string(),
                kind: descriptor.tenant_kind(),
            }),
            _ => Err(Error::invalid_data(format_args!(
                "table {} has no tenant column, use the global variant",
                descriptor.table()
            ))),
        }
    }

    /// Validates `descriptor` for a tenant-scoped `operation`.
    pub(crate) fn for_operation(descriptor: &TableDescriptor, operation: &'static str) -> Result<Self> {
        descriptor.validate_for(operation)?;
        Self::for_table(descriptor).map_err(|e| e.with_scope(&descriptor.scope(operation)))
    }

    pub(crate) fn column(&self) -> &str {
        &self.column
    }

    pub(crate) fn require(&self, tenant: &str) -> Result<()> {
        if tenant.trim().is_empty() {
            return Err(Error::tenant_required());
        }
        Ok(())
    }

    /// `tenant` typed for the tenant column.
    pub(crate) fn tenant_value(&self, tenant: &str) -> Result<Value> {
        self.require(tenant)?;
        match self.kind {
            TenantKind::Text => Ok(Value::from(tenant.to_string())),
            TenantKind::Uuid => parse_uuid(tenant).map(Value::from).ok_or_else(|| {
                Error::invalid_data(format_args!("tenant {tenant} is not a valid UUID"))
            }),
        }
    }

    /// Tenant equality followed by the caller's conditions.
    pub(crate) fn apply(&self, tenant: &str, conditions: &[Condition]) -> Result<Conditions> {
        let tenant_value = self.tenant_value(tenant)?;

        if conditions
            .iter()
            .any(|condition| condition.field().trim().eq_ignore_ascii_case(&self.column))
        {
            return Err(Error::invalid_data(format_args!(
                "condition on tenant column {} is not allowed",
                self.column
            )));
        }

        let mut scoped = Vec::with_capacity(conditions.len() + 1);
        scoped.push(Condition::equal(self.column.clone(), tenant_value));
        scoped.extend_from_slice(conditions);
        Ok(scoped)
    }

    /// Resolves the tenant value written for an entity owned by `tenant`.
    ///
    /// An unset value takes the tenant; a different tenant is rejected. The
    /// result is always typed for the tenant column.
    pub(crate) fn owner_value(&self, tenant: &str, current: Option<Value>) -> Result<Value> {
        let tenant_value = self.tenant_value(tenant)?;

        match current {
            None | Some(Value::String(None)) | Some(Value::Uuid(None)) => Ok(tenant_value),
            Some(value) if self.owns(&value, tenant) => Ok(tenant_value),
            Some(_) => Err(Error::invalid_data(
                "entity tenant does not match the requested tenant",
            )),
        }
    }

    /// Values of `columns` for an entity written on behalf of `tenant`.
    pub(crate) fn entity_values<E: Entity>(
        &self,
        columns: &[String],
        tenant: &str,
        entity: &E,
    ) -> Result<Vec<Value>> {
        self.require(tenant)?;
        columns
            .iter()
            .map(|column| {
                if *column == self.column {
                    self.owner_value(tenant, entity.value(column))
                } else {
                    entity_value(entity, column)
                }
            })
            .collect()
    }

    fn owns(&self, value: &Value, tenant: &str) -> bool {
        match (self.kind, value) {
            (_, Value::Uuid(Some(id))) => parse_uuid(tenant).is_some_and(|t| t == **id),
            (TenantKind::Uuid, Value::String(Some(s))) => {
                parse_uuid(s).is_some_and(|owner| parse_uuid(tenant) == Some(owner))
            }
            (TenantKind::Text, Value::String(Some(s))) => s.as_str() == tenant,
            _ => false,
        }
    }
}

fn parse_uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}
