use docmodel::{FieldDef, ModelType, Schema, SchemaOptions, Value};
use serde_json::json;

pub fn address_type() -> ModelType {
    let schema = Schema::from_json(
        &json!({
            "street": "String",
            "city": "String",
            "zip": { "type": "String", "match": "^[0-9]{5}$" }
        }),
        SchemaOptions::default(),
    )
    .unwrap();
    ModelType::compile(schema)
}

pub fn project_type() -> ModelType {
    let schema = Schema::from_json(
        &json!({
            "name": { "type": "String", "required": true },
            "stars": "Number"
        }),
        SchemaOptions::default(),
    )
    .unwrap();
    ModelType::compile(schema)
}

pub fn user_schema() -> Schema {
    let mut schema = Schema::from_json(
        &json!({
            "email": { "type": "String", "required": true, "match": "^\\S+@\\S+\\.\\S+$" },
            "name": { "first": "String", "last": "String" },
            "age": { "type": "Number", "min": 0, "max": 150 },
            "one": { "two": { "tree": "Boolean" } },
            "role": { "type": "String", "enum": ["admin", "member"], "default": "member" },
            "joined": "Date",
            "tags": ["String"]
        }),
        SchemaOptions::default(),
    )
    .unwrap();

    schema
        .declare("address", FieldDef::embedded(&address_type()))
        .unwrap();
    schema
        .declare("projects", FieldDef::array_of(&project_type()))
        .unwrap();

    schema
        .virtual_field("name.full")
        .unwrap()
        .get(|_, user| {
            Value::from(format!("{} {}", user.get("name.first"), user.get("name.last")))
        })
        .set(|value, user| {
            let full = value.to_string();
            let (first, last) = full.split_once(' ').unwrap_or((full.as_str(), ""));
            user.set("name.first", first)?;
            user.set("name.last", last)?;
            Ok(value)
        });

    schema
}

pub fn user_type() -> ModelType {
    ModelType::compile(user_schema())
}
