use folio_model::{Document, DocumentExt, Query, Sort, Where, compare_values, is_empty_value};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::cmp::Ordering;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

// ── Document helpers ─────────────────────────────────────────────

#[test]
fn get_path_walks_objects_and_arrays() {
    let d = doc(json!({"meta": {"owner": "u1"}, "rows": [{"n": 1}, {"n": 2}]}));
    assert_eq!(d.get_str("meta.owner"), Some("u1"));
    assert_eq!(d.get_number("rows.1.n"), Some(2.0));
    assert_eq!(d.get_path("rows.5.n"), None);
    assert_eq!(d.get_path("meta.owner.deeper"), None);
}

#[test]
fn id_accepts_strings_and_numbers() {
    assert_eq!(doc(json!({"id": "abc"})).id(), Some("abc".into()));
    assert_eq!(doc(json!({"id": 42})).id(), Some("42".into()));
    assert_eq!(doc(json!({"id": true})).id(), None);
}

#[test]
fn empty_values() {
    assert!(is_empty_value(None));
    assert!(is_empty_value(Some(&Value::Null)));
    assert!(is_empty_value(Some(&json!(""))));
    assert!(is_empty_value(Some(&json!([]))));
    assert!(!is_empty_value(Some(&json!(0))));
    assert!(!is_empty_value(Some(&json!(false))));
    assert!(!is_empty_value(Some(&json!({}))));
}

// ── Where evaluation ─────────────────────────────────────────────

#[test]
fn equals_and_null_semantics() {
    let d = doc(json!({"status": "draft"}));
    assert!(Where::equals("status", "draft").matches(&d));
    assert!(!Where::equals("status", "published").matches(&d));
    assert!(Where::equals("deletedAt", Value::Null).matches(&d));
    assert!(Where::not_equals("status", "published").matches(&d));
}

#[test]
fn equals_compares_composite_values_structurally() {
    let d = doc(json!({"tenants": ["a", "b"]}));
    assert!(Where::equals("tenants", json!(["a", "b"])).matches(&d));
    assert!(!Where::equals("tenants", json!(["b", "a"])).matches(&d));
}

#[test]
fn in_matches_scalars_and_list_elements() {
    let scalar = doc(json!({"tenant": "t2"}));
    let list = doc(json!({"tenants": ["t9", "t2"]}));
    let allowed = vec![json!("t1"), json!("t2")];
    assert!(Where::in_values("tenant", allowed.clone()).matches(&scalar));
    assert!(Where::in_values("tenants", allowed.clone()).matches(&list));
    assert!(!Where::in_values("missing", allowed).matches(&scalar));
}

#[test]
fn exists_treats_null_as_absent() {
    let d = doc(json!({"deletedAt": null, "title": "x"}));
    assert!(Where::is_null("deletedAt").matches(&d));
    assert!(Where::is_null("other").matches(&d));
    assert!(Where::exists("title").matches(&d));
    assert!(!Where::exists("deletedAt").matches(&d));
}

#[test]
fn contains_is_case_insensitive() {
    let d = doc(json!({"title": "Hello World", "tags": ["Rust", "cms"]}));
    assert!(Where::contains("title", "world").matches(&d));
    assert!(Where::contains("tags", "rust").matches(&d));
    assert!(!Where::contains("tags", "ru").matches(&d));
}

#[test]
fn ordering_comparisons() {
    let d = doc(json!({"views": 10, "publishedAt": "2026-01-02T00:00:00.000Z"}));
    assert!(Where::greater_than("views", 5).matches(&d));
    assert!(Where::less_than("views", 11).matches(&d));
    assert!(!Where::greater_than("views", "5").matches(&d));
    assert!(Where::less_than("publishedAt", "2026-02-01T00:00:00.000Z").matches(&d));
}

#[test]
fn and_or_composition() {
    let d = doc(json!({"a": 1, "b": 2}));
    let both = Where::equals("a", 1).and(Where::equals("b", 2));
    assert!(both.matches(&d));
    assert!(Where::Or(vec![Where::equals("a", 9), Where::equals("b", 2)]).matches(&d));
    assert!(!Where::Or(vec![]).matches(&d));
    assert!(Where::And(vec![]).matches(&d));
}

#[test]
fn and_flattens_nested_conjunctions() {
    let combined = Where::equals("a", 1)
        .and(Where::equals("b", 2))
        .and(Where::equals("c", 3).and(Where::equals("d", 4)));
    match combined {
        Where::And(clauses) => assert_eq!(clauses.len(), 4),
        other => panic!("expected And, got {other:?}"),
    }
}

#[test]
fn and_all_skips_missing_filters() {
    assert_eq!(Where::and_all([None, None]), None);
    assert_eq!(
        Where::and_all([None, Some(Where::exists("a"))]),
        Some(Where::exists("a"))
    );
}

// ── Sort and pagination ──────────────────────────────────────────

#[test]
fn nulls_sort_last() {
    assert_eq!(compare_values(Some(&json!(1)), None), Ordering::Less);
    assert_eq!(compare_values(None, Some(&json!("a"))), Ordering::Greater);
    assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
}

#[test]
fn sort_parse_prefix() {
    assert_eq!(Sort::parse("-createdAt"), Sort::desc("createdAt"));
    assert_eq!(Sort::parse("title"), Sort::asc("title"));

    let a = doc(json!({"n": 1}));
    let b = doc(json!({"n": 2}));
    assert_eq!(Sort::desc("n").compare(&a, &b), Ordering::Greater);
}

#[test]
fn query_offset() {
    assert_eq!(Query::new().offset(), 0);
    assert_eq!(Query::new().limit(10).page(3).offset(), 20);
    assert_eq!(Query::new().limit(10).page(0).offset(), 0);
}

#[test]
fn query_deserializes_with_default_page() {
    let query: Query = serde_json::from_value(json!({"limit": 5})).expect("valid query");
    assert_eq!(query.page, 1);
    assert_eq!(query.limit, Some(5));
}
