//! End-to-end behaviour against an in-memory SQLite database.

#[path = "test_utils/mod.rs"]
mod test_utils;

use anyhow::Result;
use directory_repo::repo::{
    Condition, Creator, Deleter, ExistQuerier, Lister, ListerGlobal, OrderBy, OrderBySpec,
    PageableQuerier, SingleGetter, Updater, Upserter,
};
use directory_repo::pagination::encode_cursor;
use test_utils::*;

#[tokio::test]
async fn created_widget_is_only_visible_to_its_tenant() -> Result<()> {
    let (_db, ctx) = setup_test_context().await?;
    let creator = Creator::new(widgets_table())?;
    let getter = SingleGetter::new(widgets_table())?;
    let widget = Widget::new("w1", "t1", "foo");

    creator.create(&ctx, "t1", &widget).await?;

    let by_id = [Condition::equal("id", "w1")];
    let fetched: Widget = getter.get(&ctx, "t1", &by_id, &OrderBySpec::none()).await?;
    assert_eq!(fetched, widget);

    let err = getter
        .get::<Widget>(&ctx, "t2", &by_id, &OrderBySpec::none())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn duplicate_key_is_not_unique() -> Result<()> {
    let (_db, ctx) = setup_test_context().await?;
    let creator = Creator::new(widgets_table())?;

    creator.create(&ctx, "t1", &Widget::new("w1", "t1", "foo")).await?;
    let err = creator
        .create(&ctx, "t1", &Widget::new("w1", "t1", "bar"))
        .await
        .unwrap_err();

    assert!(err.is_not_unique(), "unexpected error: {err}");
    assert_eq!(err.message(), "Object is not unique");
    Ok(())
}

#[tokio::test]
async fn matching_columns_skip_duplicates() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    let creator = Creator::new(widgets_table())?.with_matching_columns(["tenant_id", "name"])?;

    creator.create(&ctx, "t1", &Widget::new("w1", "t1", "foo")).await?;
    let err = creator
        .create(&ctx, "t1", &Widget::new("w2", "t1", "foo"))
        .await
        .unwrap_err();

    assert!(err.is_not_unique());
    assert!(fetch_widget(&db, "w2").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn update_changes_only_updatable_columns() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let updater = Updater::new(widgets_table())?;

    let mut changed = Widget::new("w1", "t1", "bar");
    changed.version = 42;
    updater.update_single(&ctx, "t1", &changed).await?;

    let stored = fetch_widget(&db, "w1").await?.expect("widget stored");
    assert_eq!(stored.name, "bar");
    assert_eq!(stored.tenant_id, "t1");
    assert_eq!(stored.version, 1);

    let err = updater
        .update_single(&ctx, "t2", &Widget::new("w1", "t2", "baz"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fetch_widget(&db, "w1").await?.map(|w| w.name), Some("bar".to_string()));
    Ok(())
}

#[tokio::test]
async fn versioned_update_detects_stale_entity() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let updater = Updater::new(widgets_table())?;

    let current = fetch_widget(&db, "w1").await?.expect("widget stored");
    let first = Widget {
        name: "first".to_string(),
        ..current.clone()
    };
    let second = Widget {
        name: "second".to_string(),
        ..current
    };

    updater.update_single_with_version(&ctx, "t1", &first).await?;
    let err = updater
        .update_single_with_version(&ctx, "t1", &second)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    let stored = fetch_widget(&db, "w1").await?.expect("widget stored");
    assert_eq!(stored.name, "first");
    assert_eq!(stored.version, 2);
    Ok(())
}

#[tokio::test]
async fn delete_is_idempotent() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let deleter = Deleter::new(widgets_table())?;
    let by_id = [Condition::equal("id", "w1")];

    deleter.delete_one(&ctx, "t2", &by_id).await?;
    assert!(fetch_widget(&db, "w1").await?.is_some());

    deleter.delete_one(&ctx, "t1", &by_id).await?;
    deleter.delete_one(&ctx, "t1", &by_id).await?;
    assert!(fetch_widget(&db, "w1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn exists_respects_tenant() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let querier = ExistQuerier::new(widgets_table())?;
    let by_id = [Condition::equal("id", "w1")];

    assert!(querier.exists(&ctx, "t1", &by_id).await?);
    assert!(!querier.exists(&ctx, "t2", &by_id).await?);
    Ok(())
}

#[tokio::test]
async fn upsert_never_overwrites_another_tenant() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let upserter = Upserter::new(widgets_table(), ["id"])?;

    let err = upserter
        .upsert(&ctx, "t2", &Widget::new("w1", "t2", "hijacked"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fetch_widget(&db, "w1").await?.map(|w| w.name), Some("foo".to_string()));

    upserter.upsert(&ctx, "t1", &Widget::new("w1", "t1", "renamed")).await?;
    upserter.upsert(&ctx, "t1", &Widget::new("w2", "t1", "fresh")).await?;
    assert_eq!(fetch_widget(&db, "w1").await?.map(|w| w.name), Some("renamed".to_string()));
    assert!(fetch_widget(&db, "w2").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn pages_concatenate_to_unpaged_listing() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    for i in 0..7 {
        insert_widget(&db, &Widget::new(&format!("w{i}"), "t1", &format!("name-{i}"))).await?;
    }
    insert_widget(&db, &Widget::new("other", "t2", "name-x")).await?;

    let filter = [Condition::not_equal("name", "name-3")];
    let querier = PageableQuerier::new(widgets_table())?;
    let lister = Lister::new(widgets_table())?.with_order_by(OrderBySpec::from(OrderBy::asc("id")));

    let mut paged = Vec::new();
    let mut cursor = String::new();
    let mut totals = Vec::new();
    loop {
        let page = querier
            .list::<Widget>(&ctx, "t1", 4, &cursor, "id", &filter)
            .await?;
        assert_eq!(page.start_cursor, cursor);
        totals.push(page.total_count);
        paged.extend(page.items);
        if !page.has_next_page {
            break;
        }
        cursor = page.end_cursor;
    }

    let unpaged: Vec<Widget> = lister.list(&ctx, "t1", &filter).await?;
    assert_eq!(paged, unpaged);
    assert_eq!(paged.len(), 6);
    assert_eq!(totals, vec![6, 6]);
    Ok(())
}

#[tokio::test]
async fn oversized_cursor_offset_is_invalid_data() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    let querier = PageableQuerier::new(widgets_table())?;

    let err = querier
        .list::<Widget>(&ctx, "t1", 4, &encode_cursor(u64::MAX), "id", &[])
        .await
        .unwrap_err();
    assert!(err.is_invalid_data());
    assert!(err.message().contains("offset out of range"));

    let far = querier
        .list::<Widget>(&ctx, "t1", 4, &encode_cursor(i64::MAX as u64), "id", &[])
        .await?;
    assert!(far.items.is_empty());
    assert!(!far.has_next_page);
    assert_eq!(far.total_count, 1);
    Ok(())
}

#[tokio::test]
async fn global_listing_spans_tenants() -> Result<()> {
    let (db, ctx) = setup_test_context().await?;
    insert_widget(&db, &Widget::new("w1", "t1", "foo")).await?;
    insert_widget(&db, &Widget::new("w2", "t2", "foo")).await?;

    let lister = ListerGlobal::new(widgets_table())?.with_order_by(OrderBy::desc("id").into());
    let widgets: Vec<Widget> = lister
        .list_global(&ctx, &[Condition::equal("name", "foo")])
        .await?;

    let ids: Vec<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, ["w2", "w1"]);

    let none: Vec<Widget> = lister
        .list_global(&ctx, &[Condition::in_values("id", Vec::<String>::new())])
        .await?;
    assert!(none.is_empty());
    Ok(())
}
