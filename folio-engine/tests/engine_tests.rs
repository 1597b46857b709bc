use async_trait::async_trait;
use folio_engine::{EngineConfig, EngineError, Folio, Plugin};
use folio_model::{
    AccessFn, CollectionConfig, Document, Field, FieldHook, FieldHookArgs, HookPhase, Operation,
    Schema, SchemaError,
};
use folio_storage::{MemoryStore, StorageBackend};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.max_depth, 10);
    assert_eq!(config.default_depth, 2);
    assert_eq!(config.default_limit, 10);
    assert!(config.scheduler.enabled);
    assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(60));
}

#[test]
fn config_partial_toml_keeps_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
        max_depth = 4

        [scheduler]
        poll_interval_secs = 5
        "#,
    )
    .unwrap();
    assert_eq!(config.max_depth, 4);
    assert_eq!(config.default_depth, 2);
    assert!(config.scheduler.enabled);
    assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(5));
}

#[test]
fn config_rejects_malformed_toml() {
    let err = EngineConfig::from_toml_str("max_depth = \"deep\"").unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn zero_poll_interval_is_raised_to_one_second() {
    let config = EngineConfig::from_toml_str("[scheduler]\npoll_interval_secs = 0").unwrap();
    assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(1));
}

#[test]
fn load_from_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "default_limit = 25").unwrap();

    let config = EngineConfig::load_from(&path);
    assert_eq!(config.default_limit, 25);
}

#[test]
fn load_from_missing_or_broken_file_falls_back() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        EngineConfig::load_from(dir.path().join("absent.toml")),
        EngineConfig::default()
    );

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "max_depth = [").unwrap();
    assert_eq!(EngineConfig::load_from(&broken), EngineConfig::default());
}

#[test]
fn clamp_depth_uses_default() {
    let config = EngineConfig::default();
    assert_eq!(config.clamp_depth(None), 2);
    assert_eq!(config.clamp_depth(Some(0)), 0);
    assert_eq!(config.clamp_depth(Some(999)), 10);
}

proptest! {
    #[test]
    fn clamp_depth_never_exceeds_max(max in 0u32..64, requested in proptest::option::of(0u32..10_000)) {
        let config = EngineConfig { max_depth: max, ..EngineConfig::default() };
        let depth = config.clamp_depth(requested);
        prop_assert!(depth <= max);
        if let Some(requested) = requested {
            prop_assert_eq!(depth, requested.min(max));
        }
    }

    #[test]
    fn hook_chain_applies_in_order(input in "[a-z]{0,12}", suffixes in proptest::collection::vec("[a-z]{1,3}", 0..5)) {
        let mut title = Field::text("title");
        for suffix in suffixes.clone() {
            title = title.hook(
                HookPhase::BeforeChange,
                FieldHook::from_fn(move |args: FieldHookArgs| {
                    Ok(args
                        .value
                        .and_then(|v| v.as_str().map(|s| Value::String(format!("{s}{suffix}")))))
                }),
            );
        }
        title = title.hook(HookPhase::BeforeChange, FieldHook::from_fn(|_args: FieldHookArgs| Ok(None)));
        let schema = Schema::new().collection(CollectionConfig::new("posts").field(title));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let created = runtime.block_on(async {
            let folio = Folio::builder(schema, Arc::new(MemoryStore::new()))
                .build()
                .await
                .unwrap();
            folio
                .collection("posts")
                .unwrap()
                .create(doc(json!({"title": input.clone()})))
                .await
                .unwrap()
        });

        let expected = format!("{input}{}", suffixes.concat());
        prop_assert_eq!(created.get("title"), Some(&Value::String(expected)));
    }
}

// ── Builder and plugins ─────────────────────────────────────────

#[tokio::test]
async fn duplicate_collection_is_rejected() {
    let schema = Schema::new()
        .collection(CollectionConfig::new("posts"))
        .collection(CollectionConfig::new("posts"));
    let err = Folio::builder(schema, Arc::new(MemoryStore::new()))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidSchema(SchemaError::DuplicateCollection(ref slug)) if slug == "posts"
    ));
}

#[tokio::test]
async fn unknown_relation_target_is_rejected() {
    let schema = Schema::new().collection(
        CollectionConfig::new("posts").field(Field::relationship("author", "users")),
    );
    let err = Folio::builder(schema, Arc::new(MemoryStore::new()))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidSchema(SchemaError::UnknownRelationTarget { .. })
    ));
}

#[tokio::test]
async fn invalid_text_pattern_is_rejected() {
    let schema = Schema::new()
        .collection(CollectionConfig::new("codes").field(Field::text("code").pattern("(unclosed")));
    let err = Folio::builder(schema, Arc::new(MemoryStore::new()))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidSchema(SchemaError::InvalidPattern { .. })
    ));
}

struct AuditPlugin;

#[async_trait]
impl Plugin for AuditPlugin {
    fn name(&self) -> &str {
        "audit"
    }

    fn before_init(&self, schema: &mut Schema) -> anyhow::Result<()> {
        schema.add_collection(
            CollectionConfig::new("audit")
                .field(Field::text("event"))
                .access(Operation::Create, AccessFn::deny())
                .managed(),
        );
        if let Some(posts) = schema.get_collection_mut("posts") {
            posts.fields.push(Field::text("auditedBy"));
        }
        Ok(())
    }

    async fn after_init(&self, folio: &Folio) -> anyhow::Result<()> {
        folio
            .collection("audit")?
            .create(doc(json!({"event": "boot"})))
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn plugins_extend_schema_and_run_trusted() {
    init_tracing();
    let schema = Schema::new().collection(CollectionConfig::new("posts").field(Field::text("title")));
    let folio = Folio::builder(schema, Arc::new(MemoryStore::new()))
        .plugin(Arc::new(AuditPlugin))
        .build()
        .await
        .unwrap();

    assert!(folio.schema().get_collection("audit").is_some());
    let posts = folio.schema().get_collection("posts").unwrap();
    assert!(posts.fields.iter().any(|f| f.name() == Some("auditedBy")));
    assert_eq!(folio.storage().count("audit", None).await.unwrap(), 1);

    // The facade handed back to callers is not trusted.
    assert!(!folio.is_overriding_access());
    let err = folio
        .collection("audit")
        .unwrap()
        .create(doc(json!({"event": "x"})))
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
}

struct FailingPlugin;

#[async_trait]
impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        "failing"
    }

    fn before_init(&self, _schema: &mut Schema) -> anyhow::Result<()> {
        anyhow::bail!("missing license")
    }
}

#[tokio::test]
async fn plugin_failure_aborts_build() {
    let err = Folio::builder(Schema::new(), Arc::new(MemoryStore::new()))
        .plugin(Arc::new(FailingPlugin))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Callback(_)));
}

#[tokio::test]
async fn debug_output_names_backend() {
    let folio = Folio::builder(Schema::new(), Arc::new(MemoryStore::new()))
        .build()
        .await
        .unwrap();
    let rendered = format!("{folio:?}");
    assert!(rendered.contains(folio.storage().name()));
}
