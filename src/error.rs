//! # Error Handling
//!
//! This module provides the fixed error taxonomy of the data-access layer and the
//! single boundary where driver failures are translated into it.
//!
//! Argument misuse is reported before any SQL is issued. Driver errors are
//! translated exactly once, in [`translate`], and the raw driver text is only ever
//! reachable through [`std::error::Error::source`].

use std::fmt;

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;

use crate::resource::ResourceType;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) const UNEXPECTED_SQL_ERROR: &str = "Unexpected error while executing SQL query";
pub(crate) const TIMEOUT_REACHED: &str = "Maximum processing timeout reached";
pub(crate) const CONTEXT_CANCELED: &str = "context canceled";
pub(crate) const MISSING_EXECUTOR: &str = "unable to fetch database from context";

/// Error categories exposed to domain repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("Object not found")]
    NotFound,
    #[error("Object is not unique")]
    NotUnique,
    #[error("Tenant is required")]
    TenantRequired,
    #[error("Invalid data")]
    InvalidData,
    #[error("Internal Server Error")]
    Internal,
}

/// Diagnostic origin of an error: which resource, table and operation raised it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub resource_type: Option<ResourceType>,
    pub table: Option<String>,
    pub operation: Option<&'static str>,
}

impl Scope {
    /// Creates a scope for an operation against a table.
    pub fn new(resource_type: ResourceType, table: impl Into<String>, operation: &'static str) -> Self {
        Self {
            resource_type: Some(resource_type),
            table: Some(table.into()),
            operation: Some(operation),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resource_type.is_none() && self.table.is_none() && self.operation.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::with_capacity(3);
        if let Some(resource_type) = &self.resource_type {
            parts.push(format!("resource={}", resource_type));
        }
        if let Some(table) = &self.table {
            parts.push(format!("table={}", table));
        }
        if let Some(operation) = self.operation {
            parts.push(format!("operation={}", operation));
        }
        write!(f, " ({})", parts.join(", "))
    }
}

/// Error returned by every data-access operation.
#[derive(Debug, Error)]
#[error("{message}{scope}")]
pub struct Error {
    kind: ErrorKind,
    message: Box<str>,
    scope: Scope,
    #[source]
    source: Option<DbErr>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into().into_boxed_str(),
            scope: Scope::default(),
            source: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, ErrorKind::NotFound.to_string())
    }

    /// Not-found flavour used when a guarded write matched nothing.
    pub fn not_found_because(reason: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("{} [reason={}]", ErrorKind::NotFound, reason),
        )
    }

    pub fn not_unique() -> Self {
        Self::new(ErrorKind::NotUnique, ErrorKind::NotUnique.to_string())
    }

    pub fn tenant_required() -> Self {
        Self::new(ErrorKind::TenantRequired, ErrorKind::TenantRequired.to_string())
    }

    pub fn invalid_data(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InvalidData,
            format!("{} [reason={}]", ErrorKind::InvalidData, reason),
        )
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Internal,
            format!("{}: {}", ErrorKind::Internal, message),
        )
    }

    /// Attaches the diagnostic scope, keeping an already attached one.
    pub fn with_scope(mut self, scope: &Scope) -> Self {
        if self.scope.is_empty() {
            self.scope = scope.clone();
        }
        self
    }

    fn with_source(mut self, source: DbErr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message without the scope suffix; safe to show to external callers.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_not_unique(&self) -> bool {
        self.kind == ErrorKind::NotUnique
    }

    pub fn is_tenant_required(&self) -> bool {
        self.kind == ErrorKind::TenantRequired
    }

    pub fn is_invalid_data(&self) -> bool {
        self.kind == ErrorKind::InvalidData
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

fn is_unique_violation(error: &DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    if matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

/// Maps a driver failure onto the taxonomy and wraps it with its scope.
pub(crate) fn translate(scope: &Scope, error: DbErr) -> Error {
    if is_unique_violation(&error) {
        tracing::debug!(
            resource = ?scope.resource_type,
            table = ?scope.table,
            operation = ?scope.operation,
            "Unique constraint violation detected"
        );
        return Error::not_unique().with_scope(scope).with_source(error);
    }

    if let DbErr::RecordNotFound(_) = error {
        return Error::not_found().with_scope(scope).with_source(error);
    }

    tracing::error!(
        resource = ?scope.resource_type,
        table = ?scope.table,
        operation = ?scope.operation,
        "Database error: {:?}",
        error
    );
    Error::internal(UNEXPECTED_SQL_ERROR)
        .with_scope(scope)
        .with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn widget_scope() -> Scope {
        Scope::new(ResourceType::Application, "public.widgets", "get")
    }

    #[test]
    fn test_messages_match_taxonomy() {
        assert_eq!(Error::not_found().to_string(), "Object not found");
        assert_eq!(Error::not_unique().to_string(), "Object is not unique");
        assert_eq!(Error::tenant_required().to_string(), "Tenant is required");
        assert_eq!(
            Error::invalid_data("page size cannot be smaller than 1").to_string(),
            "Invalid data [reason=page size cannot be smaller than 1]"
        );
        assert_eq!(
            Error::internal(UNEXPECTED_SQL_ERROR).to_string(),
            "Internal Server Error: Unexpected error while executing SQL query"
        );
    }

    #[test]
    fn test_scope_is_appended_once() {
        let err = Error::not_found()
            .with_scope(&widget_scope())
            .with_scope(&Scope::new(ResourceType::Bundle, "bundles", "list"));

        assert_eq!(
            err.to_string(),
            "Object not found (resource=application, table=public.widgets, operation=get)"
        );
        assert_eq!(err.message(), "Object not found");
        assert_eq!(err.scope().table.as_deref(), Some("public.widgets"));
    }

    #[test]
    fn test_translate_generic_driver_error() {
        let err = translate(&widget_scope(), DbErr::Custom("connection reset by peer".into()));

        assert!(err.is_internal());
        assert_eq!(
            err.message(),
            "Internal Server Error: Unexpected error while executing SQL query"
        );
        assert!(!err.to_string().contains("connection reset"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_translate_record_not_found() {
        let err = translate(&widget_scope(), DbErr::RecordNotFound("widget".into()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Error::tenant_required().is_tenant_required());
        assert!(Error::invalid_data("x").is_invalid_data());
        assert!(Error::not_unique().is_not_unique());
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);
    }
}
