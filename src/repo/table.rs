//! Static description of a table managed through the repo kit.

use std::collections::HashSet;

use crate::error::{Error, Result, Scope};
use crate::resource::ResourceType;

/// SQL type of a tenant column, deciding how tenant ids are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantKind {
    /// Text column; the tenant id is bound as a string.
    #[default]
    Text,
    /// `uuid` column; the tenant id must parse as a UUID.
    Uuid,
}

/// Column layout of one table. Tables without a tenant column are global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    resource_type: ResourceType,
    table: String,
    columns: Vec<String>,
    id_columns: Vec<String>,
    updatable_columns: Vec<String>,
    tenant_column: Option<String>,
    tenant_kind: TenantKind,
}

impl TableDescriptor {
    /// Describes `table` with the given columns; `id` is the default key.
    pub fn new<I, S>(resource_type: ResourceType, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_type,
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            id_columns: vec!["id".to_string()],
            updatable_columns: Vec::new(),
            tenant_column: None,
            tenant_kind: TenantKind::Text,
        }
    }

    pub fn with_id_columns<I, S>(mut self, id_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_columns = id_columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_updatable_columns<I, S>(mut self, updatable_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updatable_columns = updatable_columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tenant_column(mut self, tenant_column: impl Into<String>) -> Self {
        self.tenant_column = Some(tenant_column.into());
        self.tenant_kind = TenantKind::Text;
        self
    }

    /// Tenant column of SQL type `uuid`.
    pub fn with_uuid_tenant_column(mut self, tenant_column: impl Into<String>) -> Self {
        self.tenant_column = Some(tenant_column.into());
        self.tenant_kind = TenantKind::Uuid;
        self
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn id_columns(&self) -> &[String] {
        &self.id_columns
    }

    pub fn updatable_columns(&self) -> &[String] {
        &self.updatable_columns
    }

    pub fn tenant_column(&self) -> Option<&str> {
        self.tenant_column.as_deref()
    }

    pub fn tenant_kind(&self) -> TenantKind {
        self.tenant_kind
    }

    pub fn is_global(&self) -> bool {
        self.tenant_column.is_none()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Checks the descriptor is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::invalid_data("table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(Error::invalid_data("table must declare at least one column"));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.trim().is_empty() {
                return Err(Error::invalid_data("column name cannot be empty"));
            }
            if !seen.insert(column.as_str()) {
                return Err(Error::invalid_data(format_args!("duplicate column {column}")));
            }
        }

        if self.id_columns.is_empty() {
            return Err(Error::invalid_data("table must declare at least one id column"));
        }
        self.ensure_columns(&self.id_columns, "id")?;
        self.ensure_columns(&self.updatable_columns, "updatable")?;

        if let Some(tenant_column) = &self.tenant_column {
            if !self.has_column(tenant_column) {
                return Err(Error::invalid_data(format_args!(
                    "tenant column {tenant_column} is not a column of {}",
                    self.table
                )));
            }
        }

        Ok(())
    }

    /// Fails when any of `columns` is not part of the table.
    pub(crate) fn ensure_columns<S: AsRef<str>>(&self, columns: &[S], role: &str) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c.as_ref())) {
            Some(unknown) => Err(Error::invalid_data(format_args!(
                "{role} column {} is not a column of {}",
                unknown.as_ref(),
                self.table
            ))),
            None => Ok(()),
        }
    }

    /// [`validate`](Self::validate) with the failure attributed to `operation`.
    pub(crate) fn validate_for(&self, operation: &'static str) -> Result<()> {
        self.validate().map_err(|e| e.with_scope(&self.scope(operation)))
    }

    pub(crate) fn scope(&self, operation: &'static str) -> Scope {
        Scope::new(self.resource_type, self.table.clone(), operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> TableDescriptor {
        TableDescriptor::new(
            ResourceType::Application,
            "public.widgets",
            ["id", "tenant_id", "name", "version"],
        )
        .with_tenant_column("tenant_id")
        .with_updatable_columns(["name"])
    }

    #[test]
    fn test_valid_descriptor() {
        let descriptor = widgets();
        assert!(descriptor.validate().is_ok());
        assert!(!descriptor.is_global());
        assert_eq!(descriptor.id_columns(), ["id".to_string()]);
    }

    #[test]
    fn test_rejects_unknown_columns() {
        let err = widgets().with_updatable_columns(["colour"]).validate().unwrap_err();
        assert!(err.is_invalid_data());
        assert_eq!(
            err.message(),
            "Invalid data [reason=updatable column colour is not a column of public.widgets]"
        );

        assert!(widgets().with_tenant_column("owner").validate().is_err());
        assert!(widgets().with_id_columns(["uuid"]).validate().is_err());
        assert!(widgets().with_id_columns(Vec::<String>::new()).validate().is_err());
    }

    #[test]
    fn test_rejects_empty_and_duplicate_names() {
        assert!(
            TableDescriptor::new(ResourceType::Label, " ", ["id"])
                .validate()
                .is_err()
        );
        assert!(
            TableDescriptor::new(ResourceType::Label, "labels", Vec::<String>::new())
                .validate()
                .is_err()
        );
        assert!(
            TableDescriptor::new(ResourceType::Label, "labels", ["id", "key", "id"])
                .validate()
                .is_err()
        );
    }
}
