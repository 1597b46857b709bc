use folio_model::{
    AccessArgs, AccessFn, CollectionHook, CollectionHookArgs, DocStatus, FieldAccessArgs,
    FieldAccessFn, FieldHook, FieldHookArgs, FieldValidator, HookPhase, Hooks, Operation,
    Principal, RequestContext, ValidateArgs,
};
use serde_json::{Map, Value, json};

fn access_args(context: RequestContext) -> AccessArgs {
    AccessArgs {
        context,
        id: None,
        data: None,
    }
}

fn editor() -> RequestContext {
    RequestContext::authenticated(Principal::new("u1").with_role("editor"))
}

// ── Access predicates ────────────────────────────────────────────

#[tokio::test]
async fn authenticated_predicate() {
    let check = AccessFn::authenticated();
    assert!(check.check(access_args(editor())).await.unwrap());
    assert!(!check.check(access_args(RequestContext::anonymous())).await.unwrap());
}

#[tokio::test]
async fn role_predicate() {
    assert!(AccessFn::role("editor").check(access_args(editor())).await.unwrap());
    assert!(!AccessFn::role("admin").check(access_args(editor())).await.unwrap());
}

#[tokio::test]
async fn async_predicate_sees_args() {
    let check = AccessFn::new(|args: AccessArgs| async move {
        Ok(args.id.as_deref() == Some("doc-1"))
    });
    let mut args = access_args(editor());
    args.id = Some("doc-1".into());
    assert!(check.check(args).await.unwrap());
}

#[tokio::test]
async fn predicate_error_propagates() {
    let check = AccessFn::new(|_args: AccessArgs| async { Err(anyhow::anyhow!("lookup failed")) });
    let err = check.check(access_args(editor())).await.unwrap_err();
    assert_eq!(err.to_string(), "lookup failed");
}

#[tokio::test]
async fn field_predicate_sees_sibling_data() {
    let check = FieldAccessFn::from_fn(|args: &FieldAccessArgs| {
        args.sibling_data.get("public") == Some(&Value::Bool(true))
    });
    let mut sibling = Map::new();
    sibling.insert("public".into(), json!(true));
    let args = FieldAccessArgs {
        context: RequestContext::anonymous(),
        id: None,
        sibling_data: sibling,
        doc: None,
    };
    assert!(check.check(args).await.unwrap());
}

// ── Hooks ────────────────────────────────────────────────────────

#[tokio::test]
async fn field_hook_returns_replacement() {
    let hook = FieldHook::from_fn(|args: FieldHookArgs| {
        Ok(args.value.and_then(|v| v.as_str().map(|s| json!(s.trim()))))
    });
    let out = hook
        .call(FieldHookArgs {
            phase: HookPhase::BeforeChange,
            operation: Operation::Create,
            field: "title".into(),
            value: Some(json!("  hi  ")),
            sibling_data: Map::new(),
            original_doc: None,
            context: RequestContext::anonymous(),
        })
        .await
        .unwrap();
    assert_eq!(out, Some(json!("hi")));
}

#[tokio::test]
async fn collection_hook_can_keep_document() {
    let hook = CollectionHook::new(|_args: CollectionHookArgs| async { Ok(None) });
    let out = hook
        .call(CollectionHookArgs {
            phase: HookPhase::AfterRead,
            operation: Operation::Read,
            collection: "posts".into(),
            id: Some("1".into()),
            data: Map::new(),
            original_doc: None,
            context: RequestContext::anonymous(),
        })
        .await
        .unwrap();
    assert!(out.is_none());
}

#[test]
fn hooks_preserve_declaration_order() {
    let mut hooks: Hooks<&'static str> = Hooks::new();
    hooks.push(HookPhase::BeforeChange, "first");
    hooks.push(HookPhase::AfterRead, "read");
    hooks.push(HookPhase::BeforeChange, "second");
    assert_eq!(hooks.get(HookPhase::BeforeChange), &["first", "second"]);
    assert!(hooks.get(HookPhase::AfterDelete).is_empty());
    assert!(!hooks.is_empty());
}

#[test]
fn hook_phase_display() {
    assert_eq!(HookPhase::BeforeValidate.to_string(), "beforeValidate");
    assert_eq!(Operation::ForceDelete.to_string(), "forceDelete");
}

// ── Validators ───────────────────────────────────────────────────

#[tokio::test]
async fn validator_rejects_with_message() {
    let validator = FieldValidator::from_fn(|args: &ValidateArgs| {
        if args.value.as_str().is_some_and(|s| s.contains(' ')) {
            Err("no spaces allowed".to_string())
        } else {
            Ok(())
        }
    });
    let verdict = validator
        .validate(ValidateArgs {
            field: "slug".into(),
            value: json!("a b"),
            sibling_data: Map::new(),
            operation: Operation::Create,
            context: RequestContext::anonymous(),
        })
        .await
        .unwrap();
    assert_eq!(verdict, Err("no spaces allowed".to_string()));
}

// ── Status ───────────────────────────────────────────────────────

#[test]
fn status_from_value() {
    assert_eq!(DocStatus::from_value(Some(&json!("published"))), Some(DocStatus::Published));
    assert_eq!(DocStatus::from_value(Some(&json!("archived"))), None);
    assert_eq!(DocStatus::from_value(None), None);
    assert_eq!(serde_json::to_value(DocStatus::Draft).unwrap(), json!("draft"));
}
