//! Integration tests for models: identity, casting, validation, events and dirty tracking.

mod user;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use docmodel::{
    Error, FieldDef, JsonOptions, ModelType, Schema, SchemaError, SchemaOptions, Value,
};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn same_identity_returns_the_same_instance() {
    init_logger();
    let users = user::user_type();

    let first = users
        .create(json!({ "_id": "1", "email": "a@x.com" }))
        .unwrap();
    let second = users
        .create(json!({ "_id": "1", "email": "b@x.com" }))
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(first.get("email"), Value::from("b@x.com"));
    assert_eq!(users.store_len(), 1);
    assert!(users.find("1").is_some_and(|found| found.ptr_eq(&first)));
}

#[test]
fn writing_the_current_value_is_a_no_op() {
    init_logger();
    let users = user::user_type();
    let pg = users
        .create(json!({ "email": "pg@x.com", "name": { "first": "pg" }, "age": 30 }))
        .unwrap();

    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    pg.on("change", move |_| counter.set(counter.get() + 1));

    for path in ["email", "name.first", "age", "role"] {
        pg.set(path, pg.get(path)).unwrap();
    }
    assert_eq!(fired.get(), 0);
    assert!(pg.modified_paths().is_empty());
}

#[test]
fn number_paths_cast_or_fail() {
    init_logger();
    let pg = user::user_type().create(json!({})).unwrap();

    let err = pg.set("age", "abc").unwrap_err();
    assert!(matches!(err, Error::Cast(ref cast) if cast.path == "age"));
    assert!(pg.get("age").is_null());

    pg.set("age", "30").unwrap();
    assert_eq!(pg.get("age"), Value::Number(30.0));
}

#[test]
fn required_path_reports_a_single_error() {
    init_logger();
    let schema = Schema::from_json(
        &json!({ "name": { "type": "String", "required": true } }),
        SchemaOptions::default(),
    )
    .unwrap();
    let doc = ModelType::compile(schema).create(json!({})).unwrap();

    doc.set("name", "").unwrap();
    let errors = doc.validate().expect("name is required");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, "required");
    assert_eq!(errors[0].path, "name");
}

#[test]
fn enum_and_match_violations_are_collected() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "email": "pg@x.com" }))
        .unwrap();
    assert!(pg.validate().is_none());

    pg.set("role", "owner").unwrap();
    let errors = pg.validate().expect("owner is not a valid role");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, "enum");

    pg.set("role", "admin").unwrap();
    pg.set("email", "not-an-email").unwrap();
    pg.set("age", 200).unwrap();
    let kinds: Vec<(String, String)> = pg
        .validate()
        .expect("email and age fail")
        .into_iter()
        .map(|e| (e.path, e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("email".to_string(), "match".to_string()),
            ("age".to_string(), "max".to_string())
        ]
    );
}

#[test]
fn leaf_change_bubbles_to_every_ancestor_once() {
    init_logger();
    let pg = user::user_type().create(json!({})).unwrap();

    let counts: Vec<(&str, Rc<Cell<u32>>)> =
        ["change", "change:one", "change:one.two", "change:one.two.tree"]
            .into_iter()
            .map(|name| (name, Rc::new(Cell::new(0))))
            .collect();
    for (name, count) in &counts {
        let count = Rc::clone(count);
        pg.on(*name, move |_| count.set(count.get() + 1));
    }

    pg.nested("one")
        .and_then(|one| one.nested("two"))
        .expect("one.two is a namespace")
        .set("tree", false)
        .unwrap();

    for (name, count) in &counts {
        assert_eq!(count.get(), 1, "{} should fire once", name);
    }
}

#[test]
fn listeners_observe_the_settled_document() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "name": { "first": "john", "last": "doe" } }))
        .unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    pg.on("change:name.first", move |event| {
        let model = event.model().expect("change events carry the model");
        sink.borrow_mut().push(model.get("name.full").to_string());
    });
    let sink = Rc::clone(&seen);
    pg.on("change:name", move |event| {
        let value = event.value().cloned().unwrap_or_default();
        sink.borrow_mut()
            .push(value.get("last").map(Value::to_string).unwrap_or_default());
    });

    pg.assign(&Value::from(json!({ "name": { "first": "paul", "last": "graham" } })))
        .unwrap();
    assert_eq!(*seen.borrow(), vec!["paul graham", "graham"]);
}

#[test]
fn virtual_paths_compute_and_split() {
    init_logger();
    let users = user::user_type();
    let grace = users
        .create(json!({ "name": { "full": "grace hopper" } }))
        .unwrap();
    assert_eq!(grace.get("name.first"), Value::from("grace"));
    assert_eq!(grace.get("name.last"), Value::from("hopper"));

    grace.set("name.full", "ada lovelace").unwrap();
    assert_eq!(grace.get("name.full"), Value::from("ada lovelace"));
    assert!(grace.get_value("name.full").is_null());
    assert!(grace.to_json(&JsonOptions::default())["name"].get("full").is_none());
}

#[test]
fn to_json_rebuilds_an_equal_document() {
    init_logger();
    let users = user::user_type();
    let original = users
        .create(json!({
            "_id": "u1",
            "email": "pg@x.com",
            "name": { "first": "paul", "last": "graham" },
            "age": 30,
            "one": { "two": { "tree": true } },
            "joined": "2013-05-01T10:30:00Z",
            "tags": ["lisp", "essays"],
            "address": { "street": "1 Main St", "city": "Palo Alto", "zip": "94301" },
            "projects": [{ "name": "arc", "stars": 3 }, { "name": "hn" }]
        }))
        .unwrap();

    let json = original.to_json(&JsonOptions::default());
    users.clear_store();
    let copy = users.create(json.clone()).unwrap();
    assert!(!copy.ptr_eq(&original));

    for path in users.schema().path_names() {
        let (left, right) = (original.get(path), copy.get(path));
        match (&left, &right) {
            (Value::Model(_), Value::Model(_)) | (Value::Collection(_), Value::Collection(_)) => {
                assert_eq!(left.to_json(&JsonOptions::default()), right.to_json(&JsonOptions::default()));
            }
            _ => assert_eq!(left, right, "path {}", path),
        }
    }
    assert_eq!(copy.to_json(&JsonOptions::default()), json);
    assert_eq!(json["joined"], json!("2013-05-01T10:30:00.000Z"));
    assert_eq!(json["projects"][0], json!({ "name": "arc", "stars": 3 }));
}

#[test]
fn embedded_documents_know_their_parent() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "address": { "city": "Palo Alto" } }))
        .unwrap();

    let address = pg.get("address");
    let address = address.as_model().expect("address is embedded");
    assert!(address.parent().is_some_and(|parent| parent.ptr_eq(&pg)));
    assert_eq!(address.parent_path().as_deref(), Some("address"));
    assert_eq!(address.get("city"), Value::from("Palo Alto"));
}

#[test]
fn embedded_errors_are_prefixed_with_the_embedding_path() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "email": "pg@x.com", "address": { "zip": "abc" } }))
        .unwrap();

    let errors = pg.validate().expect("zip does not match");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "address.zip");
    assert_eq!(errors[0].kind, "match");
}

#[test]
fn child_edits_mark_the_parent_dirty_and_clear_recurses() {
    init_logger();
    let pg = user::user_type()
        .create(json!({
            "address": { "city": "Palo Alto" },
            "projects": [{ "name": "arc" }]
        }))
        .unwrap();
    assert!(pg.modified_paths().is_empty());

    let address = pg.get("address").as_model().cloned().expect("embedded");
    address.set("city", "Cambridge").unwrap();
    assert_eq!(address.modified_paths(), vec!["city"]);
    assert!(pg.is_modified("address"));

    let projects = pg.get("projects").as_collection().cloned().expect("collection");
    let arc = projects.models().remove(0);
    arc.set("stars", 10).unwrap();
    assert_eq!(pg.modified_paths(), vec!["address", "projects"]);

    pg.clear_modified_paths();
    assert!(pg.modified_paths().is_empty());
    assert!(address.modified_paths().is_empty());
    assert!(arc.modified_paths().is_empty());
}

#[test]
fn nested_accessors_read_and_write_namespaces() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "name": { "first": "paul", "last": "graham" } }))
        .unwrap();

    let name = pg.nested("name").expect("name is a namespace");
    assert_eq!(name.get("first"), Value::from("paul"));
    assert_eq!(name.get("full"), Value::from("paul graham"));

    name.assign(json!({ "last": "g", "ignored": true })).unwrap();
    assert_eq!(pg.get("name.last"), Value::from("g"));
    assert!(pg.nested("email").is_none());
}

#[test]
fn undeclared_paths_are_ignored() {
    init_logger();
    let pg = user::user_type()
        .create(json!({ "email": "pg@x.com", "nickname": "pg" }))
        .unwrap();
    assert!(pg.get_value("nickname").is_null());

    pg.set("nickname", "p").unwrap();
    assert!(pg.get_value("nickname").is_null());
    assert!(pg.modified_paths().is_empty());
}

#[test]
fn changing_the_id_rekeys_the_store() {
    init_logger();
    let users = user::user_type();
    let pg = users.create(json!({ "email": "pg@x.com" })).unwrap();
    assert!(pg.is_new());
    assert_eq!(users.store_len(), 0);

    pg.set("_id", "42").unwrap();
    assert!(users.find("42").is_some_and(|found| found.ptr_eq(&pg)));

    pg.set("_id", "43").unwrap();
    assert!(users.find("42").is_none());
    assert!(users.find("43").is_some());
}

#[test]
fn secondary_indexes_find_instances() {
    init_logger();
    let schema = Schema::from_json(
        &json!({ "email": "String" }),
        SchemaOptions {
            indexes: vec!["email".to_string()],
            ..SchemaOptions::default()
        },
    )
    .unwrap();
    let accounts = ModelType::compile(schema);
    let acme = accounts.create(json!({ "email": "ops@acme.io" })).unwrap();

    assert!(accounts
        .find_by("email", "ops@acme.io")
        .is_some_and(|found| found.ptr_eq(&acme)));

    acme.set("email", "root@acme.io").unwrap();
    assert!(accounts.find_by("email", "ops@acme.io").is_none());
    assert!(accounts.find_by("email", "root@acme.io").is_some());
}

#[test]
fn options_deserialize_from_json() {
    let options: SchemaOptions =
        serde_json::from_value(json!({ "id_attribute": "uuid", "store": false })).unwrap();
    assert_eq!(options.id_attribute, "uuid");
    assert!(!options.store);
    assert!(options.indexes.is_empty());

    let schema = Schema::from_json(&json!({ "title": "String" }), options).unwrap();
    let notes = ModelType::compile(schema);
    let a = notes.create(json!({ "uuid": "n1" })).unwrap();
    let b = notes.create(json!({ "uuid": "n1" })).unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(a.equals(&b));
}

#[test]
fn schema_definition_errors_fail_fast() {
    let err = Schema::from_json(&json!({ "x": "Thing" }), SchemaOptions::default())
        .err()
        .expect("unknown type name");
    assert_eq!(
        err,
        SchemaError::UndefinedType {
            path: "x".into(),
            name: "Thing".into()
        }
    );

    let mut schema = user::user_schema();
    assert!(matches!(
        schema.declare("email", FieldDef::string()),
        Err(SchemaError::DuplicatePath { .. })
    ));
    assert!(matches!(
        schema.declare("email.domain", FieldDef::string()),
        Err(SchemaError::NestedUnderTyped { .. })
    ));
    assert!(matches!(
        schema.declare("name", FieldDef::string()),
        Err(SchemaError::NamespaceConflict { .. })
    ));
    assert!(matches!(
        schema.declare("level", FieldDef::number().default_value("high")),
        Err(SchemaError::InvalidDefault { .. })
    ));
}
