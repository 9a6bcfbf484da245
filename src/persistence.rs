//! # Persistence Context
//!
//! Request-scoped handle through which every data-access operation reaches the
//! database. A [`Context`] carries the executor (a pooled connection or a
//! transaction owned by the caller's transaction manager), a cancellation token
//! and an optional deadline. This layer never begins, commits or rolls back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, QueryResult, Statement, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RepoConfig;
use crate::error::{
    CONTEXT_CANCELED, Error, MISSING_EXECUTOR, Result, Scope, TIMEOUT_REACHED, translate,
};
use crate::repo::rebind::rebind;

/// Minimal statement execution surface the repo kit needs.
///
/// Implemented for every sea-orm [`ConnectionTrait`], so both
/// `DatabaseConnection` and `DatabaseTransaction` can be placed into a [`Context`].
#[async_trait]
pub trait Executor: Send + Sync {
    fn backend(&self) -> DbBackend;

    /// Executes a statement and returns the number of affected rows.
    async fn execute(&self, stmt: Statement) -> Result<u64, DbErr>;

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr>;

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr>;
}

#[async_trait]
impl<C> Executor for C
where
    C: ConnectionTrait + Send + Sync,
{
    fn backend(&self) -> DbBackend {
        self.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<u64, DbErr> {
        ConnectionTrait::execute(self, stmt)
            .await
            .map(|result| result.rows_affected())
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        ConnectionTrait::query_one(self, stmt).await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        ConnectionTrait::query_all(self, stmt).await
    }
}

/// Request-scoped execution context.
#[derive(Clone, Default)]
pub struct Context {
    executor: Option<Arc<dyn Executor>>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("has_executor", &self.executor.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Context {
    /// Context without an executor; operations fail until one is attached.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self::background().with_executor(executor)
    }

    /// Context whose deadline is the configured statement timeout.
    pub fn from_config(executor: Arc<dyn Executor>, config: &RepoConfig) -> Self {
        Self::new(executor).with_timeout(config.statement_timeout())
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Tightens the deadline to `now + timeout`; an earlier deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn executor(&self) -> Result<Arc<dyn Executor>> {
        self.executor
            .clone()
            .ok_or_else(|| Error::internal(MISSING_EXECUTOR))
    }

    fn check_live(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::internal(CONTEXT_CANCELED));
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Error::internal(TIMEOUT_REACHED));
        }
        Ok(())
    }

    /// Drives `fut` until it completes, the token is cancelled or the deadline passes.
    async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        self.check_live()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Error::internal(TIMEOUT_REACHED)),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::internal(CONTEXT_CANCELED)),
            outcome = bounded => outcome,
        }
    }
}

/// One scoped statement round trip: rebinding, logging, metrics and error translation.
pub(crate) struct Call<'a> {
    ctx: &'a Context,
    scope: Scope,
}

impl<'a> Call<'a> {
    pub(crate) fn new(ctx: &'a Context, scope: Scope) -> Self {
        Self { ctx, scope }
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    fn prepare(&self, sql: &str, args: Vec<Value>) -> Result<(Arc<dyn Executor>, Statement)> {
        let executor = self.ctx.executor().map_err(|e| e.with_scope(&self.scope))?;
        let backend = executor.backend();
        let sql = rebind(backend, sql);

        tracing::debug!(
            resource = ?self.scope.resource_type,
            table = ?self.scope.table,
            operation = ?self.scope.operation,
            sql = %sql,
            args = args.len(),
            "Executing statement"
        );

        Ok((executor, Statement::from_sql_and_values(backend, sql, args)))
    }

    fn record(&self, started: std::time::Instant, outcome: &'static str) {
        let operation = self.scope.operation.unwrap_or("unknown");
        counter!("repo_statements_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        histogram!("repo_statement_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());
    }

    fn finish<T>(&self, outcome: Result<Result<T, DbErr>>) -> Result<T> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(db_err)) => Err(translate(&self.scope, db_err)),
            Err(interrupted) => {
                tracing::warn!(
                    table = ?self.scope.table,
                    operation = ?self.scope.operation,
                    "Statement interrupted: {}",
                    interrupted.message()
                );
                Err(interrupted.with_scope(&self.scope))
            }
        }
    }

    async fn run<T, F>(&self, statement: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T, DbErr>>,
    {
        let started = std::time::Instant::now();
        let outcome = self.ctx.guard(statement).await;
        self.record(started, outcome_label(&outcome));
        self.finish(outcome)
    }

    pub(crate) async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        let (executor, stmt) = self.prepare(sql, args)?;
        self.run(executor.execute(stmt)).await
    }

    pub(crate) async fn query_one(&self, sql: &str, args: Vec<Value>) -> Result<Option<QueryResult>> {
        let (executor, stmt) = self.prepare(sql, args)?;
        self.run(executor.query_one(stmt)).await
    }

    pub(crate) async fn query_all(&self, sql: &str, args: Vec<Value>) -> Result<Vec<QueryResult>> {
        let (executor, stmt) = self.prepare(sql, args)?;
        self.run(executor.query_all(stmt)).await
    }
}

/// `outcome` label of `repo_statements_total`.
fn outcome_label<T>(outcome: &Result<Result<T, DbErr>>) -> &'static str {
    match outcome {
        Ok(Ok(_)) => "ok",
        Ok(Err(_)) => "error",
        Err(_) => "interrupted",
    }
}
