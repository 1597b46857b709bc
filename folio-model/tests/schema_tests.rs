use folio_model::{
    AccessFn, Block, CollectionConfig, Field, FieldType, GlobalConfig, Operation, RelationTo,
    Schema, SchemaError, Tab,
};
use serde_json::json;

fn posts() -> CollectionConfig {
    CollectionConfig::new("posts").fields(vec![
        Field::text("title").required().max_length(120),
        Field::relationship("author", "users"),
    ])
}

fn users() -> CollectionConfig {
    CollectionConfig::new("users").field(Field::email("email").required())
}

// ── Field builders ───────────────────────────────────────────────

#[test]
fn text_builder_sets_constraints() {
    let field = Field::text("slug").min_length(3).max_length(40).pattern("^[a-z-]+$");
    match field {
        Field::Data(data) => match data.field_type {
            FieldType::Text(opts) => {
                assert_eq!(opts.min_length, Some(3));
                assert_eq!(opts.max_length, Some(40));
                let pattern = opts.pattern.expect("pattern set");
                assert_eq!(pattern.source(), "^[a-z-]+$");
                assert!(pattern.regex().is_some_and(|re| re.is_match("hello-world")));
            }
            other => panic!("expected text, got {other:?}"),
        },
        other => panic!("expected data field, got {other:?}"),
    }
}

#[test]
fn inapplicable_builder_is_noop() {
    let field = Field::checkbox("done").max_length(10).min(1.0).max_rows(3);
    match field {
        Field::Data(data) => assert!(matches!(data.field_type, FieldType::Checkbox)),
        other => panic!("expected data field, got {other:?}"),
    }
}

#[test]
fn has_many_applies_to_relationship() {
    let field = Field::relationship("tags", "tags").has_many().max_depth(1);
    match field {
        Field::Data(data) => match data.field_type {
            FieldType::Relationship(opts) => {
                assert!(opts.has_many);
                assert_eq!(opts.max_depth, Some(1));
                assert_eq!(opts.relation_to, RelationTo::One("tags".into()));
            }
            other => panic!("expected relationship, got {other:?}"),
        },
        other => panic!("expected data field, got {other:?}"),
    }
}

#[test]
fn polymorphic_relation_targets() {
    let rel = RelationTo::Many(vec!["pages".into(), "posts".into()]);
    assert!(rel.is_polymorphic());
    assert_eq!(rel.targets(), vec!["pages", "posts"]);
    assert!(!RelationTo::One("pages".into()).is_polymorphic());
}

#[test]
fn layout_fields_own_no_key() {
    let row = Field::row(vec![Field::text("a"), Field::text("b")]);
    assert!(row.is_layout());
    assert_eq!(row.name(), None);

    let group = Field::group("meta", vec![Field::text("description")]);
    assert!(!group.is_layout());
    assert_eq!(group.name(), Some("meta"));
}

#[test]
fn required_and_default_land_on_base() {
    let field = Field::number("views").required().default_value(json!(0));
    let base = field.base().expect("data field has a base");
    assert!(base.required);
    assert_eq!(base.default_value, Some(json!(0)));
}

#[test]
fn blocks_lookup_by_slug() {
    let field = Field::blocks(
        "layout",
        vec![
            Block::new("hero", vec![Field::text("heading")]),
            Block::new("quote", vec![Field::text("body")]),
        ],
    );
    match field {
        Field::Blocks(blocks) => {
            assert_eq!(blocks.block("quote").map(|b| b.fields.len()), Some(1));
            assert!(blocks.block("video").is_none());
        }
        other => panic!("expected blocks, got {other:?}"),
    }
}

// ── CollectionConfig ─────────────────────────────────────────────

#[test]
fn collection_defaults() {
    let config = CollectionConfig::new("pages");
    assert!(config.timestamps);
    assert!(!config.versions);
    assert!(!config.managed);
    assert!(config.soft_delete.is_none());
    assert!(config.access.get(Operation::Read).is_none());
}

#[test]
fn soft_delete_field_names() {
    assert_eq!(CollectionConfig::new("a").soft_delete().deleted_at_field(), Some("deletedAt"));
    assert_eq!(
        CollectionConfig::new("b").soft_delete_field("trashedAt").deleted_at_field(),
        Some("trashedAt")
    );
    assert_eq!(CollectionConfig::new("c").deleted_at_field(), None);
}

#[test]
fn access_slot_set_by_builder() {
    let config = CollectionConfig::new("posts").access(Operation::ForceDelete, AccessFn::deny());
    assert!(config.access.get(Operation::ForceDelete).is_some());
    assert!(config.access.get(Operation::Delete).is_none());
}

// ── Schema registry ──────────────────────────────────────────────

#[test]
fn lookup_collections_and_globals() {
    let schema = Schema::new()
        .collection(posts())
        .collection(users().versioned())
        .global(GlobalConfig::new("settings"));

    assert!(schema.get_collection("posts").is_some());
    assert!(schema.get_collection("missing").is_none());
    assert!(schema.get_global("settings").is_some());
    let versioned: Vec<_> = schema.versioned_collections().map(|c| c.slug.as_str()).collect();
    assert_eq!(versioned, vec!["users"]);
}

#[test]
fn valid_schema_passes() {
    let schema = Schema::new().collection(posts()).collection(users());
    assert_eq!(schema.validate(), Ok(()));
}

#[test]
fn duplicate_collection_rejected() {
    let schema = Schema::new().collection(users()).collection(users());
    assert_eq!(
        schema.validate(),
        Err(SchemaError::DuplicateCollection("users".into()))
    );
}

#[test]
fn duplicate_global_rejected() {
    let schema = Schema::new()
        .global(GlobalConfig::new("nav"))
        .global(GlobalConfig::new("nav"));
    assert_eq!(schema.validate(), Err(SchemaError::DuplicateGlobal("nav".into())));
}

#[test]
fn empty_slug_rejected() {
    let schema = Schema::new().collection(CollectionConfig::new(""));
    assert_eq!(schema.validate(), Err(SchemaError::EmptySlug));
}

#[test]
fn unknown_relation_target_rejected() {
    let schema = Schema::new().collection(posts());
    match schema.validate() {
        Err(SchemaError::UnknownRelationTarget { collection, field, target }) => {
            assert_eq!(collection, "posts");
            assert_eq!(field, "author");
            assert_eq!(target, "users");
        }
        other => panic!("expected UnknownRelationTarget, got {other:?}"),
    }
}

#[test]
fn invalid_text_pattern_rejected() {
    let schema = Schema::new().collection(CollectionConfig::new("pages").field(Field::group(
        "meta",
        vec![Field::text("code").pattern("[A-Z")],
    )));
    match schema.validate() {
        Err(SchemaError::InvalidPattern { collection, field, .. }) => {
            assert_eq!(collection, "pages");
            assert_eq!(field, "code");
        }
        other => panic!("expected InvalidPattern, got {other:?}"),
    }
}

#[test]
fn relation_inside_named_tab_is_checked() {
    let schema = Schema::new().collection(CollectionConfig::new("pages").field(Field::tabs(vec![
        Tab::unnamed("Content", vec![Field::text("title")]),
        Tab::named("seo", vec![Field::relationship("image", "media")]),
    ])));
    assert!(matches!(
        schema.validate(),
        Err(SchemaError::UnknownRelationTarget { .. })
    ));
}

#[test]
fn duplicate_block_rejected() {
    let schema = Schema::new().collection(CollectionConfig::new("pages").field(Field::blocks(
        "layout",
        vec![Block::new("hero", vec![]), Block::new("hero", vec![])],
    )));
    match schema.validate() {
        Err(SchemaError::DuplicateBlock { block, .. }) => assert_eq!(block, "hero"),
        other => panic!("expected DuplicateBlock, got {other:?}"),
    }
}

#[test]
fn get_collection_mut_allows_extension() {
    let mut schema = Schema::new().collection(users());
    schema
        .get_collection_mut("users")
        .expect("users exists")
        .fields
        .push(Field::text("nickname"));
    assert_eq!(schema.get_collection("users").map(|c| c.fields.len()), Some(2));
}
