use folio_model::{
    DocStatus, Document, DocumentExt, NewVersion, Query, SCHEDULED_PUBLISH_FIELD, Sort, Where,
};
use folio_storage::{MemoryStore, StorageBackend, StorageError};
use folio_types::{Timestamp, VersionId};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    for (id, title, views) in [("a", "Alpha", 3), ("b", "Beta", 1), ("c", "Gamma", 2)] {
        store
            .create("posts", doc(json!({"id": id, "title": title, "views": views})))
            .await
            .unwrap();
    }
    store
}

fn version(parent: &str, status: DocStatus) -> NewVersion {
    NewVersion {
        collection: "posts".into(),
        parent: parent.into(),
        snapshot: doc(json!({"id": parent})),
        status,
        scheduled_publish_at: None,
    }
}

// ── CRUD ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_id_when_missing() {
    let store = MemoryStore::new();
    let created = store.create("posts", doc(json!({"title": "x"}))).await.unwrap();
    let id = created.id().expect("id assigned");
    let fetched = store.find_by_id("posts", &id).await.unwrap();
    assert_eq!(fetched, Some(created));
}

#[tokio::test]
async fn create_duplicate_id_conflicts() {
    let store = seeded().await;
    let err = store.create("posts", doc(json!({"id": "a"}))).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn update_is_shallow_merge() {
    let store = MemoryStore::new();
    store
        .create("posts", doc(json!({"id": "a", "title": "x", "meta": {"k": 1, "j": 2}})))
        .await
        .unwrap();
    let updated = store
        .update("posts", "a", doc(json!({"meta": {"k": 5}, "id": "ignored"})))
        .await
        .unwrap();
    assert_eq!(updated, doc(json!({"id": "a", "title": "x", "meta": {"k": 5}})));
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let store = MemoryStore::new();
    let err = store.update("posts", "nope", Document::new()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn delete_returns_removed_document() {
    let store = seeded().await;
    let removed = store.delete("posts", "b").await.unwrap();
    assert_eq!(removed.get_str("title"), Some("Beta"));
    assert_eq!(store.find_by_id("posts", "b").await.unwrap(), None);
    assert_eq!(store.count("posts", None).await.unwrap(), 2);
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn find_filters_sorts_and_paginates() {
    let store = seeded().await;
    let query = Query::new()
        .filter(Where::greater_than("views", 1))
        .sort(Sort::desc("views"))
        .limit(1)
        .page(2);
    let result = store.find("posts", &query).await.unwrap();
    assert_eq!(result.total_docs, 2);
    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.docs[0].id().as_deref(), Some("c"));
}

#[tokio::test]
async fn find_unknown_collection_is_empty() {
    let store = MemoryStore::new();
    let result = store.find("nothing", &Query::new()).await.unwrap();
    assert!(result.docs.is_empty());
    assert_eq!(result.total_docs, 0);
}

#[tokio::test]
async fn count_with_filter() {
    let store = seeded().await;
    let filter = Where::in_values("id", vec![json!("a"), json!("c")]);
    assert_eq!(store.count("posts", Some(&filter)).await.unwrap(), 2);
}

#[tokio::test]
async fn search_matches_nested_strings() {
    let store = seeded().await;
    store
        .create("posts", doc(json!({"id": "d", "blocks": [{"body": "hidden GAMMA ray"}]})))
        .await
        .unwrap();
    let result = store.search("posts", "gamma", &Query::new()).await.unwrap();
    let ids: Vec<_> = result.docs.iter().filter_map(|d| d.id()).collect();
    assert_eq!(ids, vec!["c".to_string(), "d".to_string()]);
}

// ── Soft delete ──────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_and_restore_toggle_marker() {
    let store = seeded().await;
    let at = Timestamp::now();
    let deleted = store.soft_delete("posts", "a", "deletedAt", at).await.unwrap();
    assert_eq!(deleted.get_str("deletedAt"), Some(at.to_rfc3339().as_str()));

    let restored = store.restore("posts", "a", "deletedAt").await.unwrap();
    assert_eq!(restored.get("deletedAt"), Some(&Value::Null));
    assert!(Where::is_null("deletedAt").matches(&restored));
}

#[tokio::test]
async fn optional_capabilities_can_be_disabled() {
    let store = MemoryStore::without_optional_capabilities();
    store.create("posts", doc(json!({"id": "a"}))).await.unwrap();

    assert!(!store.supports_transactions());
    let err = store
        .soft_delete("posts", "a", "deletedAt", Timestamp::now())
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(store.search("posts", "x", &Query::new()).await.unwrap_err().is_unsupported());
    assert!(matches!(store.begin_transaction().await, Err(e) if e.is_unsupported()));
}

// ── Transactions ─────────────────────────────────────────────────

#[tokio::test]
async fn rollback_discards_staged_writes() {
    let store = seeded().await;
    let tx = store.begin_transaction().await.unwrap();
    let staged = tx.backend();
    staged.delete("posts", "a").await.unwrap();
    staged.create("posts", doc(json!({"id": "z"}))).await.unwrap();
    assert!(staged.find_by_id("posts", "z").await.unwrap().is_some());
    tx.rollback().await.unwrap();

    assert!(store.find_by_id("posts", "a").await.unwrap().is_some());
    assert!(store.find_by_id("posts", "z").await.unwrap().is_none());
}

#[tokio::test]
async fn commit_keeps_changes() {
    let store = seeded().await;
    let tx = store.begin_transaction().await.unwrap();
    tx.backend().delete("posts", "a").await.unwrap();
    tx.commit().await.unwrap();
    assert!(store.find_by_id("posts", "a").await.unwrap().is_none());
}

#[tokio::test]
async fn rollback_keeps_writes_made_outside_the_transaction() {
    let store = Arc::new(seeded().await);
    let tx = store.begin_transaction().await.unwrap();
    tx.backend().delete("posts", "a").await.unwrap();

    let outside = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.create("notes", doc(json!({"id": "n1"}))).await })
    };
    tokio::task::yield_now().await;
    assert!(!outside.is_finished());

    tx.rollback().await.unwrap();
    outside.await.unwrap().unwrap();
    assert!(store.find_by_id("posts", "a").await.unwrap().is_some());
    assert!(store.find_by_id("notes", "n1").await.unwrap().is_some());
}

#[tokio::test]
async fn transactions_run_one_at_a_time() {
    let store = Arc::new(MemoryStore::new());
    let first = store.begin_transaction().await.unwrap();

    let second = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let tx = store.begin_transaction().await?;
            let found = tx.backend().find_by_id("posts", "a").await?;
            tx.commit().await?;
            Ok::<_, StorageError>(found)
        })
    };
    tokio::task::yield_now().await;
    assert!(!second.is_finished());

    first.backend().create("posts", doc(json!({"id": "a"}))).await.unwrap();
    first.commit().await.unwrap();
    let seen = second.await.unwrap().unwrap();
    assert_eq!(seen.and_then(|d| d.id()), Some("a".to_string()));
}

// ── Versions ─────────────────────────────────────────────────────

#[tokio::test]
async fn version_ids_strictly_increase_newest_first() {
    let store = MemoryStore::new();
    let v1 = store.create_version(version("a", DocStatus::Draft)).await.unwrap();
    let v2 = store.create_version(version("a", DocStatus::Published)).await.unwrap();
    store.create_version(version("b", DocStatus::Draft)).await.unwrap();
    assert!(v2.id > v1.id);

    let versions = store.find_versions("posts", "a").await.unwrap();
    let ids: Vec<VersionId> = versions.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![v2.id, v1.id]);
    assert_eq!(versions[0].status, DocStatus::Published);
}

#[tokio::test]
async fn version_ids_survive_rollback() {
    let store = MemoryStore::new();
    let tx = store.begin_transaction().await.unwrap();
    let rolled_back = tx
        .backend()
        .create_version(version("a", DocStatus::Draft))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let kept = store.create_version(version("a", DocStatus::Draft)).await.unwrap();
    assert!(kept.id > rolled_back.id);
    assert_eq!(store.find_version_by_id("posts", rolled_back.id).await.unwrap(), None);
    assert!(store.find_version_by_id("posts", kept.id).await.unwrap().is_some());
    assert_eq!(store.find_version_by_id("pages", kept.id).await.unwrap(), None);
}

// ── Scheduling ───────────────────────────────────────────────────

#[tokio::test]
async fn scheduled_documents_due_at_or_before_now() {
    let store = seeded().await;
    let now = Timestamp::now();
    store
        .set_scheduled_publish_at("posts", "a", Some(now.offset_millis(-1_000)))
        .await
        .unwrap();
    store.set_scheduled_publish_at("posts", "b", Some(now)).await.unwrap();
    store
        .set_scheduled_publish_at("posts", "c", Some(now.offset_millis(60_000)))
        .await
        .unwrap();

    let due = store.find_scheduled_documents("posts", now).await.unwrap();
    let ids: Vec<_> = due.iter().filter_map(|d| d.id()).collect();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn clearing_schedule_removes_field() {
    let store = seeded().await;
    store
        .set_scheduled_publish_at("posts", "a", Some(Timestamp::now()))
        .await
        .unwrap();
    store.set_scheduled_publish_at("posts", "a", None).await.unwrap();
    let doc = store.find_by_id("posts", "a").await.unwrap().unwrap();
    assert!(!doc.contains_key(SCHEDULED_PUBLISH_FIELD));
}

// ── Globals ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_global_creates_then_merges() {
    let store = MemoryStore::new();
    assert_eq!(store.find_global("settings").await.unwrap(), None);
    store.update_global("settings", doc(json!({"title": "Site"}))).await.unwrap();
    let merged = store
        .update_global("settings", doc(json!({"tagline": "hi"})))
        .await
        .unwrap();
    assert_eq!(merged, doc(json!({"title": "Site", "tagline": "hi"})));
}
