//! Integration tests for document arrays embedded in models and standalone.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use docmodel::{
    DocumentArray, FieldDef, ModelType, Schema, SchemaOptions, Value, ADD, REMOVE, RESET, SORT,
};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn people() -> ModelType {
    let mut schema = Schema::from_json(
        &json!({
            "name": { "type": "String", "required": true },
            "age": "Number"
        }),
        SchemaOptions::default(),
    )
    .unwrap();
    schema.method("compare", |person, args| {
        let other = args.first().and_then(Value::as_model).map(|m| m.get("age"));
        let mine = person.get("age").as_f64().unwrap_or_default();
        let theirs = other.and_then(|age| age.as_f64()).unwrap_or_default();
        Ok(Value::from(mine - theirs))
    });
    ModelType::compile(schema)
}

fn person(id: &str, name: &str, age: i32) -> Value {
    Value::from(json!({ "_id": id, "name": name, "age": age }))
}

fn ids(array: &DocumentArray) -> Vec<String> {
    array
        .models()
        .iter()
        .map(|model| model.id().unwrap_or_default())
        .collect()
}

fn recorder(array: &DocumentArray, events: &[&str]) -> Rc<RefCell<Vec<(String, usize)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in events {
        let sink = Rc::clone(&log);
        array.on(*name, move |event| {
            sink.borrow_mut()
                .push((event.event_type(), event.items().len()));
        });
    }
    log
}

#[test]
fn push_deduplicates_by_identity() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(
        &people,
        vec![person("1", "jeremy", 30), person("2", "pg", 50)],
    )
    .unwrap();
    let log = recorder(&team, &[ADD]);

    let pg = team.get("2").and_then(|v| v.as_model().cloned()).expect("pg is in");
    let len = team
        .push(vec![
            Value::Model(pg.clone()),
            person("3", "thomas", 25),
            person("3", "thomas", 25),
        ])
        .unwrap();

    assert_eq!(len, 3);
    assert_eq!(ids(&team), vec!["1", "2", "3"]);
    assert_eq!(*log.borrow(), vec![(ADD.to_string(), 1)]);
    assert!(pg.parent_array().is_some_and(|array| array.ptr_eq(&team)));
}

#[test]
fn items_without_id_are_keyed_by_cid_until_they_get_one() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(&people, vec![Value::from(json!({ "name": "anon" }))]).unwrap();

    let anon = team.models().remove(0);
    assert!(team.get(anon.cid()).is_some());
    assert!(team.contains(&Value::Model(anon.clone())));

    anon.set("_id", "9").unwrap();
    assert!(team.get("9").is_some());
    assert!(team.contains(&Value::from(json!({ "_id": "9" }))));
}

#[test]
fn remove_accepts_models_ids_and_objects() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(
        &people,
        vec![
            person("1", "a", 1),
            person("2", "b", 2),
            person("3", "c", 3),
            person("4", "d", 4),
        ],
    )
    .unwrap();
    let log = recorder(&team, &[REMOVE]);
    let first = team.models().remove(0);

    let removed = team.remove(&[
        Value::Model(first.clone()),
        Value::from("3"),
        Value::from(json!({ "_id": "4" })),
        Value::from("missing"),
    ]);

    assert_eq!(removed.len(), 3);
    assert_eq!(ids(&team), vec!["2"]);
    assert_eq!(*log.borrow(), vec![(REMOVE.to_string(), 3)]);
    assert!(first.parent_array().is_none());
    assert!(team.get("1").is_none());
}

#[test]
fn set_syncs_by_identity() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(
        &people,
        vec![person("1", "a", 1), person("2", "b", 2), person("3", "c", 3)],
    )
    .unwrap();
    let kept = team.get("2").and_then(|v| v.as_model().cloned()).expect("2 is in");
    let log = recorder(&team, &[ADD, REMOVE]);

    team.set(vec![
        Value::from(json!({ "_id": "2", "name": "updated" })),
        person("4", "d", 4),
    ])
    .unwrap();

    assert_eq!(ids(&team), vec!["2", "4"]);
    assert_eq!(kept.get("name"), Value::from("updated"));
    assert!(team.get("2").and_then(|v| v.as_model().cloned()).is_some_and(|m| m.ptr_eq(&kept)));
    assert_eq!(
        *log.borrow(),
        vec![(REMOVE.to_string(), 2), (ADD.to_string(), 1)]
    );
}

#[test]
fn reset_replaces_everything_with_one_event() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(&people, vec![person("1", "a", 1)]).unwrap();
    let old = team.models().remove(0);
    let log = recorder(&team, &[ADD, REMOVE, RESET]);

    team.reset(vec![person("5", "e", 5), person("6", "f", 6)])
        .unwrap();

    assert_eq!(ids(&team), vec!["5", "6"]);
    assert_eq!(*log.borrow(), vec![(RESET.to_string(), 2)]);
    assert!(old.parent_array().is_none());
    assert!(team.get("1").is_none());
}

#[test]
fn sort_uses_the_compare_method() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(
        &people,
        vec![person("1", "old", 80), person("2", "young", 20), person("3", "mid", 40)],
    )
    .unwrap();
    let sorted = Rc::new(Cell::new(0));
    let counter = Rc::clone(&sorted);
    team.on(SORT, move |_| counter.set(counter.get() + 1));

    team.sort().unwrap();
    assert_eq!(ids(&team), vec!["2", "3", "1"]);
    assert_eq!(sorted.get(), 1);

    team.silent().sort_by(|a, b| b.to_string().cmp(&a.to_string()));
    assert_eq!(sorted.get(), 1);
}

#[test]
fn item_changes_are_forwarded_to_the_collection() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(&people, vec![person("1", "a", 1), person("2", "b", 2)]).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    team.on("change:name", move |event| {
        let id = event.model().and_then(|m| m.id()).unwrap_or_default();
        let value = event.value().map(Value::to_string).unwrap_or_default();
        sink.borrow_mut().push(format!("{}={}", id, value));
    });

    let second = team.models().remove(1);
    second.set("name", "bee").unwrap();
    // forwarded events do not consume the silent flag
    team.silent();
    second.set("name", "bea").unwrap();

    assert_eq!(*seen.borrow(), vec!["2=bee", "2=bea"]);
}

#[test]
fn dispose_leaves_collection_and_store() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(&people, vec![person("1", "a", 1), person("2", "b", 2)]).unwrap();
    let log = recorder(&team, &[REMOVE]);
    let first = team.models().remove(0);

    first.dispose();

    assert_eq!(ids(&team), vec!["2"]);
    assert!(people.find("1").is_none());
    assert!(first.parent_array().is_none());
    assert_eq!(*log.borrow(), vec![(REMOVE.to_string(), 1)]);

    // disposing twice is harmless
    first.dispose();
    assert_eq!(team.len(), 1);
}

fn owner_type(people: &ModelType) -> ModelType {
    let mut schema = Schema::from_json(
        &json!({
            "name": "String",
            "tags": { "type": ["String"], "max": 3 },
            "scores": ["Number"]
        }),
        SchemaOptions::default(),
    )
    .unwrap();
    schema
        .declare("members", FieldDef::array_of(people).min(1.0))
        .unwrap();
    ModelType::compile(schema)
}

#[test]
fn element_errors_are_remapped_under_the_index() {
    init_logger();
    let people = people();
    let org = owner_type(&people)
        .create(json!({
            "members": [
                { "_id": "1", "name": "a" },
                { "_id": "2", "name": "b" },
                { "_id": "3" }
            ]
        }))
        .unwrap();

    let errors = org.validate().expect("third member has no name");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "members.2.name");
    assert_eq!(errors[0].kind, "required");
}

#[test]
fn collection_bounds_validate_length() {
    init_logger();
    let people = people();
    let org = owner_type(&people)
        .create(json!({ "tags": ["a", "b", "c", "d"], "members": [] }))
        .unwrap();

    let kinds: Vec<(String, String)> = org
        .validate()
        .expect("too many tags and too few members")
        .into_iter()
        .map(|e| (e.path, e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("tags".to_string(), "max".to_string()),
            ("members".to_string(), "min".to_string())
        ]
    );
}

#[test]
fn embedded_collections_wire_their_parent() {
    init_logger();
    let people = people();
    let org = owner_type(&people)
        .create(json!({
            "members": [{ "_id": "1", "name": "a" }],
            "scores": ["1", 2.5, "3"]
        }))
        .unwrap();

    let members = org.get("members").as_collection().cloned().expect("collection");
    assert!(members.parent().is_some_and(|parent| parent.ptr_eq(&org)));
    assert_eq!(members.path(), "members");

    members.push(vec![person("2", "b", 2)]).unwrap();
    let added = members.get("2").and_then(|v| v.as_model().cloned()).expect("added");
    assert!(added.parent().is_some_and(|parent| parent.ptr_eq(&org)));

    let scores = org.get("scores");
    assert_eq!(
        scores.as_collection().map(DocumentArray::items),
        Some(vec![Value::from(1), Value::from(2.5), Value::from(3)])
    );
    assert_eq!(
        org.to_json(&Default::default())["scores"],
        json!([1, 2.5, 3])
    );
}

#[test]
fn scalar_cast_failures_abort_the_push() {
    init_logger();
    let numbers = DocumentArray::scalars(FieldDef::number(), vec![Value::from(1)]).unwrap();
    assert!(numbers.push(vec![Value::from("x")]).is_err());
    assert_eq!(numbers.items(), vec![Value::from(1)]);
}

#[test]
fn failed_splice_keeps_documents_linked() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(
        &people,
        vec![person("1", "a", 1), person("2", "b", 2), person("3", "c", 3)],
    )
    .unwrap();
    let log = recorder(&team, &[ADD, REMOVE]);
    let first = team.models().remove(0);

    // a boolean is not a document
    assert!(team.splice(0, 2, vec![Value::from(true)]).is_err());

    assert_eq!(ids(&team), vec!["1", "2", "3"]);
    assert!(team.get("2").is_some());
    assert!(first.parent_array().is_some_and(|array| array.ptr_eq(&team)));
    assert!(log.borrow().is_empty());
}

#[test]
fn splice_keeps_documents_it_puts_back() {
    init_logger();
    let people = people();
    let team = DocumentArray::of(&people, vec![person("1", "a", 1), person("2", "b", 2)]).unwrap();
    let first = team.models().remove(0);

    let removed = team
        .splice(0, 2, vec![Value::Model(first.clone()), person("3", "c", 3)])
        .unwrap();

    assert_eq!(removed.len(), 2);
    assert_eq!(ids(&team), vec!["1", "3"]);
    assert!(first.parent_array().is_some_and(|array| array.ptr_eq(&team)));
}
