//! Integration tests for the model registry: plugins, naming and references.

use std::cell::Cell;
use std::rc::Rc;

use chrono::Utc;
use docmodel::{Error, FieldDef, Registry, Schema, SchemaOptions, Value};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn user_schema() -> Schema {
    Schema::from_json(
        &json!({ "name": "String", "email": "String" }),
        SchemaOptions::default(),
    )
    .unwrap()
}

fn post_schema(reference: &str) -> Schema {
    Schema::from_json(
        &json!({
            "title": "String",
            "author": { "type": "ObjectId", "ref": reference }
        }),
        SchemaOptions::default(),
    )
    .unwrap()
}

#[test]
fn plugins_apply_to_schemas_compiled_afterwards() {
    init_logger();
    let registry = Registry::new();
    let before = registry.model("Before", user_schema()).unwrap();

    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    registry.plugin(
        move |schema, opts| {
            counter.set(counter.get() + 1);
            let path = opts["path"].as_str().unwrap_or("createdAt");
            schema
                .declare(path, FieldDef::date())?
                .default_with(|| Value::from(Utc::now()));
            Ok(())
        },
        json!({ "path": "created" }),
    );
    let users = registry.model("User", user_schema()).unwrap();

    assert_eq!(runs.get(), 1);
    assert!(before.schema().path("created").is_none());
    let pg = users.create(json!({ "name": "pg" })).unwrap();
    assert!(pg.get("created").as_date().is_some());
}

#[test]
fn plugin_errors_abort_registration() {
    init_logger();
    let registry = Registry::new();
    registry.plugin(
        |schema, _| {
            schema.declare("name", FieldDef::string())?;
            Ok(())
        },
        json!({}),
    );

    let err = registry.model("User", user_schema()).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(registry.get("User").is_none());
}

#[test]
fn object_ids_resolve_referenced_models_by_name() {
    init_logger();
    let registry = Registry::new();
    let users = registry.model("User", user_schema()).unwrap();
    let posts = registry.model("Post", post_schema("User")).unwrap();

    let post = posts
        .create(json!({
            "title": "hello",
            "author": { "_id": "u1", "name": "pg" }
        }))
        .unwrap();

    let author = post.get("author");
    let author = author.as_model().expect("author is a document");
    assert!(author.model_type().ptr_eq(&users));
    assert!(users.find("u1").is_some_and(|found| found.ptr_eq(author)));
    assert!(author.parent().is_some_and(|parent| parent.ptr_eq(&post)));

    post.set("author", "u2").unwrap();
    assert_eq!(post.get("author"), Value::from("u2"));
}

#[test]
fn unknown_references_fail_the_cast() {
    init_logger();
    let registry = Registry::new();
    let posts = registry.model("Post", post_schema("Ghost")).unwrap();

    let err = posts
        .create(json!({ "author": { "_id": "u1" } }))
        .unwrap_err();
    assert_eq!(err, Error::UnknownModel { name: "Ghost".into() });

    // plain ids never need the reference
    assert!(posts.create(json!({ "author": "u1" })).is_ok());
}

#[test]
fn names_are_unique_and_memoized() {
    init_logger();
    let registry = Registry::new();
    let schema = user_schema();
    let users = registry.model("User", schema.clone()).unwrap();

    assert!(registry.model("User", post_schema("User")).unwrap().ptr_eq(&users));
    let alias = registry.model("Member", schema).unwrap();
    assert!(alias.ptr_eq(&users));
    assert_eq!(users.name().as_deref(), Some("User"));

    registry.model("Post", post_schema("User")).unwrap();
    assert_eq!(registry.names(), vec!["Member", "Post", "User"]);
}

#[test]
fn clear_forgets_models_and_plugins() {
    init_logger();
    let registry = Registry::new();
    registry.plugin(
        |schema, _| {
            schema.declare("tenant", FieldDef::string())?;
            Ok(())
        },
        json!(null),
    );
    let users = registry.model("User", user_schema()).unwrap();
    let pg = users.create(json!({ "_id": "1", "tenant": "acme" })).unwrap();

    registry.clear();
    assert!(registry.names().is_empty());
    assert!(registry.get("User").is_none());
    assert_eq!(pg.get("tenant"), Value::from("acme"));

    let fresh = registry.model("User", user_schema()).unwrap();
    assert!(!fresh.ptr_eq(&users));
    assert!(fresh.schema().path("tenant").is_none());
}

#[test]
fn statics_see_their_model_type() {
    init_logger();
    let registry = Registry::new();
    let mut schema = Schema::from_json(
        &json!({ "email": "String" }),
        SchemaOptions {
            indexes: vec!["email".into()],
            ..SchemaOptions::default()
        },
    )
    .unwrap();
    schema.static_method("by_email", |users, args| {
        let email = args.first().map(Value::to_string).unwrap_or_default();
        Ok(users.find_by("email", &email).map(Value::from).unwrap_or_default())
    });
    let users = registry.model("User", schema).unwrap();
    let pg = users.create(json!({ "email": "pg@x.com" })).unwrap();

    let found = users
        .call_static("by_email", &[Value::from("pg@x.com")])
        .unwrap();
    assert!(found.as_model().is_some_and(|model| model.ptr_eq(&pg)));
    assert!(users.call_static("by_email", &[]).unwrap().is_null());
    assert_eq!(
        users.call_static("missing", &[]).unwrap_err(),
        Error::UnknownStatic { name: "missing".into() }
    );
}
