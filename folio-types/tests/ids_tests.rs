use folio_types::{DocumentId, VersionId};
use proptest::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

// ── DocumentId ────────────────────────────────────────────────────

#[test]
fn document_id_new_is_unique() {
    let a = DocumentId::new();
    let b = DocumentId::new();
    assert_ne!(a, b);
}

#[test]
fn document_id_renders_as_uuid() {
    let rendered = DocumentId::new().to_string();
    let parsed = uuid::Uuid::parse_str(&rendered).unwrap();
    assert_eq!(parsed.get_version_num(), 7);
}

#[test]
fn document_ids_are_time_ordered() {
    let first = DocumentId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = DocumentId::new();
    assert!(first < second);
    assert!(first.to_string() < second.to_string());
}

#[test]
fn document_id_hash_and_eq() {
    let id = DocumentId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn document_id_serializes_as_plain_string() {
    let id = DocumentId::new();
    let json = serde_json::to_value(id).unwrap();
    assert_eq!(json, serde_json::Value::String(id.to_string()));
}

// ── VersionId ─────────────────────────────────────────────────────

#[test]
fn version_id_orders_by_sequence() {
    let v = VersionId::new(7);
    assert_eq!(v.get(), 7);
    assert!(v < VersionId::new(8));
}

#[test]
fn version_id_parse_invalid() {
    assert!(VersionId::from_str("v1").is_err());
    assert!(VersionId::from_str("-3").is_err());
}

#[test]
fn version_id_serializes_as_number() {
    let json = serde_json::to_string(&VersionId::new(42)).unwrap();
    assert_eq!(json, "42");
}

proptest! {
    #[test]
    fn version_id_display_parses_back(seq in any::<u64>()) {
        let id = VersionId::new(seq);
        let parsed: VersionId = id.to_string().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    #[test]
    fn version_id_order_matches_sequence(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(VersionId::new(a).cmp(&VersionId::new(b)), a.cmp(&b));
    }
}
