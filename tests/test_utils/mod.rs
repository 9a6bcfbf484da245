//! Test utilities for repo kit testing.
//!
//! Provides the `widgets` fixture table, an in-memory SQLite database, sea-orm
//! mock connections for asserting exact SQL, and a spy executor that records
//! whether any statement reached the driver.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use directory_repo::Context;
use directory_repo::config::RepoConfig;
use directory_repo::repo::{Entity, TableDescriptor};
use directory_repo::resource::ResourceType;
use directory_repo::telemetry::init_tracing;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, FromQueryResult, MockDatabase,
    QueryResult, Statement, Transaction, Value,
};

pub const WIDGET_COLUMNS: [&str; 4] = ["id", "tenant_id", "name", "version"];

/// Row of the `widgets` fixture table.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct Widget {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub version: i64,
}

impl Widget {
    pub fn new(id: &str, tenant_id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            version: 1,
        }
    }

    /// Mock row as returned by a `SELECT id, tenant_id, name, version`.
    pub fn row(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("id", Value::from(self.id.clone())),
            ("tenant_id", Value::from(self.tenant_id.clone())),
            ("name", Value::from(self.name.clone())),
            ("version", Value::BigInt(Some(self.version))),
        ])
    }
}

impl Entity for Widget {
    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.clone().into()),
            "tenant_id" if self.tenant_id.is_empty() => None,
            "tenant_id" => Some(self.tenant_id.clone().into()),
            "name" => Some(self.name.clone().into()),
            "version" => Some(self.version.into()),
            _ => None,
        }
    }
}

/// Tenant-scoped descriptor of the `widgets` table.
pub fn widgets_table() -> TableDescriptor {
    TableDescriptor::new(ResourceType::Application, "widgets", WIDGET_COLUMNS)
        .with_tenant_column("tenant_id")
        .with_updatable_columns(["name"])
}

/// `widgets` whose tenant column has SQL type `uuid`.
pub fn uuid_widgets_table() -> TableDescriptor {
    TableDescriptor::new(ResourceType::Application, "widgets", WIDGET_COLUMNS)
        .with_uuid_tenant_column("tenant_id")
        .with_updatable_columns(["name"])
}

/// Sets up an in-memory SQLite database holding an empty `widgets` table.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "CREATE TABLE widgets (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            UNIQUE (tenant_id, name)
        )"
        .to_string(),
    ))
    .await?;

    Ok(db)
}

/// In-memory database plus a context bound to it.
///
/// Tracing is installed from the default configuration so statement events
/// flow through the same subscriber as in production.
pub async fn setup_test_context() -> Result<(Arc<DatabaseConnection>, Context)> {
    init_tracing(&RepoConfig::default())?;
    let db = Arc::new(setup_test_db().await?);
    let ctx = Context::new(db.clone());
    Ok((db, ctx))
}

/// Inserts a widget row directly, bypassing the repo kit.
pub async fn insert_widget(db: &DatabaseConnection, widget: &Widget) -> Result<()> {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO widgets (id, tenant_id, name, version) VALUES (?, ?, ?, ?)",
        vec![
            widget.id.clone().into(),
            widget.tenant_id.clone().into(),
            widget.name.clone().into(),
            widget.version.into(),
        ],
    ))
    .await?;
    Ok(())
}

/// Reads a widget row directly, bypassing the repo kit.
pub async fn fetch_widget(db: &DatabaseConnection, id: &str) -> Result<Option<Widget>> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT id, tenant_id, name, version FROM widgets WHERE id = ?",
            vec![id.into()],
        ))
        .await?;
    Ok(row.map(|row| Widget::from_query_result(&row, "")).transpose()?)
}

/// Postgres mock connection plus a context bound to it.
///
/// Read the statements with [`transaction_log`] once the context is done.
pub fn mock_context(mock: MockDatabase) -> (Arc<DatabaseConnection>, Context) {
    let db = Arc::new(mock.into_connection());
    let ctx = Context::new(db.clone());
    (db, ctx)
}

/// Statements recorded by a mock connection, in execution order.
///
/// Consumes the context so the connection is no longer shared.
pub fn transaction_log(db: Arc<DatabaseConnection>, ctx: Context) -> Vec<Transaction> {
    drop(ctx);
    match Arc::try_unwrap(db) {
        Ok(db) => db.into_transaction_log(),
        Err(_) => panic!("mock connection is still shared"),
    }
}

pub fn postgres_mock() -> MockDatabase {
    MockDatabase::new(DbBackend::Postgres)
}

/// Executor that counts calls and never touches a database.
#[derive(Debug, Default)]
pub struct SpyExecutor {
    calls: AtomicUsize,
}

impl SpyExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

// Implemented by path: importing the trait would make `db.execute` ambiguous.
#[async_trait]
impl directory_repo::persistence::Executor for SpyExecutor {
    fn backend(&self) -> DbBackend {
        DbBackend::Postgres
    }

    async fn execute(&self, _stmt: Statement) -> Result<u64, DbErr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn query_one(&self, _stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn query_all(&self, _stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Spy executor plus a context bound to it.
pub fn spy_context() -> (Arc<SpyExecutor>, Context) {
    let spy = Arc::new(SpyExecutor::default());
    let ctx = Context::new(spy.clone());
    (spy, ctx)
}
