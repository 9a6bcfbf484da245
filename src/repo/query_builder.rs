//! `SELECT` rendering.
//!
//! Rendered text keeps the neutral `?` marker so a query can be embedded in
//! [`Condition::InSubquery`]; it is rebound only when turned into a statement.

use sea_orm::{DbBackend, Statement, Value};

use super::condition::{self, Condition};
use super::order::OrderBySpec;
use super::rebind::rebind;
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use crate::error::{Error, Result};

/// Rendered `SELECT` with its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl SelectQuery {
    /// Rebinds for `backend` and attaches the values.
    pub fn into_statement(self, backend: DbBackend) -> Statement {
        let sql = rebind(backend, &self.sql);
        Statement::from_sql_and_values(backend, sql, self.args)
    }

    /// `field IN (<this query>)`.
    pub fn into_condition(self, field: impl Into<String>) -> Condition {
        Condition::in_subquery(field, self.sql, self.args)
    }
}

/// Renders `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...]`.
pub fn build_select<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    conditions: &[Condition],
    order_by: &OrderBySpec,
) -> Result<SelectQuery> {
    if table.trim().is_empty() {
        return Err(Error::invalid_data("table name cannot be empty"));
    }
    if columns.is_empty() {
        return Err(Error::invalid_data("select projection cannot be empty"));
    }

    let projection: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    let mut sql = format!("SELECT {} FROM {}", projection.join(", "), table);
    let args = append_where(&mut sql, conditions);
    sql.push_str(&order_by.to_sql());

    Ok(SelectQuery { sql, args })
}

/// Appends ` WHERE ...` when there are conditions and returns their values.
pub(crate) fn append_where(sql: &mut String, conditions: &[Condition]) -> Vec<Value> {
    if conditions.is_empty() {
        return Vec::new();
    }
    let (predicate, args) = condition::render(conditions);
    sql.push_str(" WHERE ");
    sql.push_str(&predicate);
    args
}

fn projection(descriptor: &TableDescriptor, columns: Vec<String>) -> Result<Vec<String>> {
    descriptor.validate()?;
    descriptor.ensure_columns(&columns, "selected")?;
    Ok(columns)
}

/// Tenant-scoped subquery builder.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    descriptor: TableDescriptor,
    columns: Vec<String>,
    tenant: TenantScope,
}

impl QueryBuilder {
    pub fn new<I, S>(descriptor: TableDescriptor, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = projection(&descriptor, columns.into_iter().map(Into::into).collect())?;
        let tenant = TenantScope::for_table(&descriptor)?;
        Ok(Self {
            descriptor,
            columns,
            tenant,
        })
    }

    pub fn build(&self, tenant: &str, conditions: &[Condition]) -> Result<SelectQuery> {
        let scope = self.descriptor.scope("build_query");
        let conditions = self
            .tenant
            .apply(tenant, conditions)
            .map_err(|e| e.with_scope(&scope))?;
        build_select(
            self.descriptor.table(),
            &self.columns,
            &conditions,
            &OrderBySpec::none(),
        )
        .map_err(|e| e.with_scope(&scope))
    }
}

/// Subquery builder for global tables or cross-tenant lookups.
#[derive(Debug, Clone)]
pub struct QueryBuilderGlobal {
    descriptor: TableDescriptor,
    columns: Vec<String>,
}

impl QueryBuilderGlobal {
    pub fn new<I, S>(descriptor: TableDescriptor, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = projection(&descriptor, columns.into_iter().map(Into::into).collect())?;
        Ok(Self {
            descriptor,
            columns,
        })
    }

    pub fn build_global(&self, conditions: &[Condition]) -> Result<SelectQuery> {
        build_select(
            self.descriptor.table(),
            &self.columns,
            conditions,
            &OrderBySpec::none(),
        )
        .map_err(|e| e.with_scope(&self.descriptor.scope("build_query_global")))
    }
}
