//! Per-parent pagination.
//!
//! Children of several parents are paged in one round trip: each parent id gets
//! its own `SELECT ... LIMIT ? OFFSET ?` and the selects are joined with
//! `UNION`. A second statement counts every parent's children with
//! `GROUP BY`, so each parent's listing can report its own total.

use std::collections::HashMap;

use sea_orm::prelude::Uuid;
use sea_orm::{QueryResult, Value};

use super::condition::{Condition, Conditions};
use super::order::OrderBySpec;
use super::query_builder::append_where;
use super::table::TableDescriptor;
use super::tenant::TenantScope;
use super::{Entity, decode};
use crate::config::RepoConfig;
use crate::error::{Result, translate};
use crate::pagination::{decode_cursor, validate_page_size};
use crate::persistence::{Call, Context};

/// Children fetched for all parents plus each parent's total child count.
pub type UnionPage<E> = (Vec<E>, HashMap<String, u64>);

/// Page geometry shared by every parent of a union listing.
#[derive(Debug, Clone, Copy)]
pub struct UnionRequest<'a> {
    /// Column holding the parent id.
    pub ids_column: &'a str,
    pub page_size: u32,
    pub cursor: &'a str,
    pub order_by: &'a OrderBySpec,
}

impl<'a> UnionRequest<'a> {
    pub fn new(ids_column: &'a str, page_size: u32, cursor: &'a str, order_by: &'a OrderBySpec) -> Self {
        Self {
            ids_column,
            page_size,
            cursor,
            order_by,
        }
    }
}

/// `(SELECT ... LIMIT ? OFFSET ?) UNION (...)` over one predicate list per parent.
fn union_sql(
    descriptor: &TableDescriptor,
    per_parent: &[Conditions],
    order_by: &OrderBySpec,
    page_size: u32,
    offset: u64,
) -> (String, Vec<Value>) {
    let projection = descriptor.columns().join(", ");
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let mut args = Vec::new();

    let selects: Vec<String> = per_parent
        .iter()
        .map(|conditions| {
            let mut sql = format!("SELECT {projection} FROM {}", descriptor.table());
            args.extend(append_where(&mut sql, conditions));
            sql.push_str(&order_by.to_sql());
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Value::from(i64::from(page_size)));
            args.push(Value::from(offset));
            format!("({sql})")
        })
        .collect();

    (selects.join(" UNION "), args)
}

fn count_sql(descriptor: &TableDescriptor, ids_column: &str, conditions: &[Condition]) -> (String, Vec<Value>) {
    let mut sql = format!(
        "SELECT {ids_column} AS id, COUNT(*) AS total_count FROM {}",
        descriptor.table()
    );
    let args = append_where(&mut sql, conditions);
    sql.push_str(&format!(" GROUP BY {ids_column} ORDER BY {ids_column} ASC"));
    (sql, args)
}

/// Parent id of a count row; `uuid` parent columns are rendered as text.
fn parent_key(row: &QueryResult) -> std::result::Result<String, sea_orm::DbErr> {
    row.try_get::<String>("", "id")
        .or_else(|_| row.try_get::<Uuid>("", "id").map(|id| id.to_string()))
}

async fn fetch_union<E: Entity>(
    call: &Call<'_>,
    descriptor: &TableDescriptor,
    request: UnionRequest<'_>,
    offset: u64,
    per_parent: Vec<Conditions>,
    count_conditions: &[Condition],
) -> Result<UnionPage<E>> {
    if per_parent.is_empty() {
        return Ok((Vec::new(), HashMap::new()));
    }

    let (sql, args) = union_sql(descriptor, &per_parent, request.order_by, request.page_size, offset);
    let rows = call.query_all(&sql, args).await?;
    let items = rows
        .iter()
        .map(|row| decode(call.scope(), row))
        .collect::<Result<Vec<E>>>()?;

    let (sql, args) = count_sql(descriptor, request.ids_column, count_conditions);
    let mut counts = HashMap::new();
    for row in call.query_all(&sql, args).await? {
        let parent = parent_key(&row).map_err(|err| translate(call.scope(), err))?;
        let total: i64 = row
            .try_get("", "total_count")
            .map_err(|err| translate(call.scope(), err))?;
        counts.insert(parent, u64::try_from(total).unwrap_or_default());
    }

    tracing::debug!(
        table = ?call.scope().table,
        parents = counts.len(),
        returned = items.len(),
        "Fetched union page"
    );

    Ok((items, counts))
}

/// Validates the request and returns the decoded offset.
fn prepare(descriptor: &TableDescriptor, max_page_size: u32, request: &UnionRequest<'_>) -> Result<u64> {
    validate_page_size(request.page_size, max_page_size)?;
    descriptor.ensure_columns(&[request.ids_column], "ids")?;
    let order_columns: Vec<&str> = request.order_by.keys().iter().map(|key| key.field.as_str()).collect();
    descriptor.ensure_columns(&order_columns, "order by")?;
    decode_cursor(request.cursor)
}

fn with_parent(conditions: &[Condition], ids_column: &str, id: Value) -> Conditions {
    let mut scoped = conditions.to_vec();
    scoped.push(Condition::equal(ids_column, id));
    scoped
}

/// Pages children of several parents in a tenant-owned table.
#[derive(Debug, Clone)]
pub struct UnionLister {
    descriptor: TableDescriptor,
    tenant: TenantScope,
    max_page_size: u32,
}

impl UnionLister {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        let tenant = TenantScope::for_operation(&descriptor, "list_union")?;
        Ok(Self {
            descriptor,
            tenant,
            max_page_size: RepoConfig::default().max_page_size,
        })
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// One page of `tenant`'s children for each of `ids`, plus per-parent totals.
    pub async fn list<E, V>(
        &self,
        ctx: &Context,
        tenant: &str,
        ids: &[V],
        request: UnionRequest<'_>,
        conditions: &[Condition],
    ) -> Result<UnionPage<E>>
    where
        E: Entity,
        V: Clone + Into<Value>,
    {
        let scope = self.descriptor.scope("list_union");
        let prepared = self.tenant.apply(tenant, conditions).and_then(|count_conditions| {
            let offset = prepare(&self.descriptor, self.max_page_size, &request)?;
            let per_parent = ids
                .iter()
                .map(|id| {
                    let parent = with_parent(conditions, request.ids_column, id.clone().into());
                    self.tenant.apply(tenant, &parent)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((offset, per_parent, count_conditions))
        });
        let (offset, per_parent, count_conditions) = prepared.map_err(|e| e.with_scope(&scope))?;

        fetch_union(
            &Call::new(ctx, scope),
            &self.descriptor,
            request,
            offset,
            per_parent,
            &count_conditions,
        )
        .await
    }
}

/// Pages children of several parents without tenant scoping.
#[derive(Debug, Clone)]
pub struct UnionListerGlobal {
    descriptor: TableDescriptor,
    max_page_size: u32,
}

impl UnionListerGlobal {
    pub fn new(descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate_for("list_union_global")?;
        Ok(Self {
            descriptor,
            max_page_size: RepoConfig::default().max_page_size,
        })
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub async fn list_global<E, V>(
        &self,
        ctx: &Context,
        ids: &[V],
        request: UnionRequest<'_>,
        conditions: &[Condition],
    ) -> Result<UnionPage<E>>
    where
        E: Entity,
        V: Clone + Into<Value>,
    {
        let scope = self.descriptor.scope("list_union_global");
        let offset = prepare(&self.descriptor, self.max_page_size, &request)
            .map_err(|e| e.with_scope(&scope))?;
        let per_parent = ids
            .iter()
            .map(|id| with_parent(conditions, request.ids_column, id.clone().into()))
            .collect();

        fetch_union(
            &Call::new(ctx, scope),
            &self.descriptor,
            request,
            offset,
            per_parent,
            conditions,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::order::OrderBy;
    use crate::resource::ResourceType;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            ResourceType::Application,
            "users",
            ["id", "tenant_id", "first_name", "last_name", "age"],
        )
        .with_tenant_column("tenant_id")
    }

    #[test]
    fn test_union_sql_pages_each_parent() {
        let order_by = OrderBySpec::from(OrderBy::asc("id"));
        let per_parent = vec![
            vec![Condition::equal("tenant_id", "t1"), Condition::equal("id", "peter")],
            vec![Condition::equal("tenant_id", "t1"), Condition::equal("id", "homer")],
        ];

        let (sql, args) = union_sql(&users(), &per_parent, &order_by, 10, 0);

        assert_eq!(
            sql,
            "(SELECT id, tenant_id, first_name, last_name, age FROM users WHERE tenant_id = ? AND id = ? \
             ORDER BY id ASC LIMIT ? OFFSET ?) UNION \
             (SELECT id, tenant_id, first_name, last_name, age FROM users WHERE tenant_id = ? AND id = ? \
             ORDER BY id ASC LIMIT ? OFFSET ?)"
        );
        assert_eq!(args.len(), 8);
        assert_eq!(args[2], Value::BigInt(Some(10)));
        assert_eq!(args[3], Value::BigInt(Some(0)));
    }

    #[test]
    fn test_count_sql_groups_by_parent() {
        let (sql, args) = count_sql(&users(), "id", &[]);
        assert_eq!(
            sql,
            "SELECT id AS id, COUNT(*) AS total_count FROM users GROUP BY id ORDER BY id ASC"
        );
        assert!(args.is_empty());
    }

    #[test]
    fn test_prepare_rejects_unknown_columns() {
        let order_by = OrderBySpec::from(OrderBy::asc("id"));
        assert!(prepare(&users(), 200, &UnionRequest::new("parent_id", 10, "", &order_by)).is_err());

        let bad_order = OrderBySpec::from(OrderBy::asc("nickname"));
        assert!(prepare(&users(), 200, &UnionRequest::new("id", 10, "", &bad_order)).is_err());
        assert_eq!(prepare(&users(), 200, &UnionRequest::new("id", 10, "", &order_by)).unwrap(), 0);
    }
}
