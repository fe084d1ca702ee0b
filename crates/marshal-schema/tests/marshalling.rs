//! Integration test: object marshalling in both directions.
//!
//! Covers dumping domain objects and loaded records (single, many, JSON
//! text, projected), loading raw dictionaries into typed records and into
//! domain objects, nested lists of sub-records, and plucked sub-fields.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use marshal_schema::{
    DumpOptions, Field, FieldSource, FieldType, FromRecord, Record, Schema, TypedValue,
    ValidatorError,
};
use serde_json::{json, Value};

// ─── Fixtures ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct User {
    name: String,
    email: String,
    created_at: DateTime<FixedOffset>,
}

impl User {
    fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now().fixed_offset(),
        }
    }
}

impl FieldSource for User {
    fn field(&self, name: &str) -> Option<Cow<'_, TypedValue>> {
        let value = match name {
            "name" => TypedValue::from(self.name.as_str()),
            "email" => TypedValue::from(self.email.as_str()),
            "created_at" => TypedValue::DateTime(self.created_at),
            _ => return None,
        };
        Some(Cow::Owned(value))
    }
}

impl FromRecord for User {
    fn from_record(record: Record) -> Result<Self, ValidatorError> {
        let text = |key: &str| {
            record
                .get_str(key)
                .map(str::to_string)
                .ok_or_else(|| ValidatorError::new(format!("{key} is required to build a user")))
        };
        let created_at = match record.get("created_at") {
            Some(TypedValue::DateTime(dt)) => *dt,
            _ => Utc::now().fixed_offset(),
        };
        Ok(User {
            name: text("name")?,
            email: text("email")?,
            created_at,
        })
    }
}

fn user_schema() -> Schema {
    Schema::builder("UserSchema")
        .field(Field::new("name", FieldType::Str))
        .field(Field::new("email", FieldType::Email))
        .field(Field::new("created_at", FieldType::DateTime))
        .build()
        .unwrap()
}

fn task_schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder("TaskSchema")
            .field(Field::new("title", FieldType::Str))
            .build()
            .unwrap(),
    )
}

fn client_schema() -> Schema {
    Schema::builder("ClientSchema")
        .field(Field::new("name", FieldType::Str))
        .field(Field::new("email", FieldType::Email))
        .field(Field::new("created_at", FieldType::DateTime))
        .field(Field::new("tasks", FieldType::list(FieldType::nested(task_schema()))))
        .build()
        .unwrap()
}

fn client_schema_flat() -> Schema {
    Schema::builder("ClientSchemaFlat")
        .field(Field::new("name", FieldType::Str))
        .field(Field::new("email", FieldType::Email))
        .field(Field::new("created_at", FieldType::DateTime))
        .field(Field::new(
            "tasks",
            FieldType::list(FieldType::pluck(task_schema(), "title")),
        ))
        .build()
        .unwrap()
}

fn user_2_dict() -> Value {
    json!({
        "created_at": "2014-08-11T05:26:03.869245",
        "email": "ken@yahoo.com",
        "name": "Ken",
    })
}

fn client_with_two_tasks() -> Value {
    json!({
        "name": "Test client",
        "email": "test@mail.ru",
        "created_at": "2022-09-05T18:00:25",
        "tasks": [{"title": "First task"}, {"title": "Second task"}],
    })
}

// ─── Serializing ─────────────────────────────────────────────────────

#[test]
fn test_dump_object_to_dict() {
    let out = user_schema().dump(&User::new("Monty", "monty@python.org"));
    let obj = out.as_object().unwrap();
    assert_eq!(obj["name"], json!("Monty"));
    assert_eq!(obj["email"], json!("monty@python.org"));
    assert!(obj["created_at"].is_string());
}

#[test]
fn test_dump_object_to_json_text() {
    let text = user_schema().dumps(&User::new("Monty", "monty@python.org"));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["name"], json!("Monty"));
}

#[test]
fn test_dump_only_selected_fields() {
    let out = user_schema().dump_with(
        &User::new("Monty", "monty@python.org"),
        &DumpOptions::new().only(["name", "email"]),
    );
    let obj = out.as_object().unwrap();
    assert!(obj.contains_key("name"));
    assert!(obj.contains_key("email"));
    assert!(!obj.contains_key("created_at"));
}

#[test]
fn test_dump_many_objects() {
    let users = vec![
        User::new("Mick", "mick@stones.com"),
        User::new("Keith", "keith@stones.com"),
    ];
    let out = user_schema().dump_many(&users);
    let items = out.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_object());
    assert_eq!(items[1]["name"], json!("Keith"));
}

#[test]
fn test_dump_nested_task_list() {
    let schema = client_schema();
    let record = schema.load(&client_with_two_tasks()).unwrap();
    let out = schema.dump(&record);
    assert_eq!(
        out["tasks"],
        json!([{"title": "First task"}, {"title": "Second task"}])
    );
}

#[test]
fn test_dump_plucked_task_titles() {
    let schema = client_schema_flat();
    let nested = client_schema().load(&client_with_two_tasks()).unwrap();
    let out = schema.dump(&nested);
    assert_eq!(out["tasks"], json!(["First task", "Second task"]));
}

#[test]
fn test_load_plucked_titles() {
    let schema = client_schema_flat();
    let mut raw = client_with_two_tasks();
    raw["tasks"] = json!(["First task", "Second task"]);
    let record = schema.load(&raw).unwrap();
    let tasks = record.get("tasks").and_then(TypedValue::as_list).unwrap();
    assert_eq!(tasks[0].as_record().unwrap().get_str("title"), Some("First task"));
    assert_eq!(schema.dump(&record)["tasks"], raw["tasks"]);
}

// ─── Deserializing ───────────────────────────────────────────────────

#[test]
fn test_load_dict_to_typed_record() {
    let record = user_schema().load(&user_2_dict()).unwrap();
    assert!(matches!(record.get("created_at"), Some(TypedValue::DateTime(_))));
    assert_eq!(record.get_str("email"), Some("ken@yahoo.com"));
}

#[test]
fn test_load_dict_to_object() {
    let user: User = user_schema()
        .load_into(&json!({"email": "ken@yahoo.com", "name": "Ken"}))
        .unwrap();
    assert_eq!(user.name, "Ken");
    assert_eq!(user.email, "ken@yahoo.com");
}

#[test]
fn test_load_many_into_objects() {
    let users: Vec<User> = user_schema()
        .load_many_into(&json!([
            {"name": "Mick", "email": "mick@stones.com"},
            {"name": "Keith", "email": "keith@stones.com"},
        ]))
        .unwrap();
    assert_eq!(users.len(), 2);
}

#[test]
fn test_invalid_email_is_keyed_by_field() {
    let errs = user_schema()
        .load(&json!({"name": "Ken", "email": "not-an-email"}))
        .unwrap_err();
    assert_eq!(errs.keys().collect::<Vec<_>>(), vec!["email"]);
}

#[test]
fn test_nested_task_errors_carry_index() {
    let mut raw = client_with_two_tasks();
    raw["tasks"][1]["title"] = json!(42);
    let errs = client_schema().load(&raw).unwrap_err();
    assert!(errs.get("tasks.1.title").is_some());
    assert!(errs.contains_field("tasks"));
}

#[test]
fn test_aliased_fields_round_trip() {
    let schema = Schema::builder("Aliased")
        .field(Field::new("created_at", FieldType::DateTime).data_key("createdAt"))
        .field(Field::new("password", FieldType::Str).load_only())
        .field(Field::new("kind", FieldType::Str).dump_only())
        .build()
        .unwrap();
    let record = schema
        .load(&json!({"createdAt": "2014-08-11T05:26:03Z", "password": "pw", "kind": "x"}))
        .unwrap();
    assert!(record.contains_key("password"));
    assert!(!record.contains_key("kind"));
    assert_eq!(schema.dump(&record), json!({"createdAt": "2014-08-11T05:26:03Z"}));
}

// ─── Unions ──────────────────────────────────────────────────────────

fn pet_schema(name: &str, tag: &str, field: &str) -> Schema {
    Schema::builder(name)
        .field(
            Field::new("kind", FieldType::literal([json!(tag)]))
                .required()
                .data_key("petType"),
        )
        .field(Field::new(field, FieldType::Int).required().data_key(field.to_uppercase()))
        .build()
        .unwrap()
}

#[test]
fn test_union_round_trips_through_second_member() {
    let cat = Schema::builder("Cat")
        .field(Field::new("meows", FieldType::Int).required())
        .build()
        .unwrap();
    let dog = Schema::builder("Dog")
        .field(Field::new("barks", FieldType::Int).required())
        .field(Field::new("good", FieldType::Bool).data_key("isGood"))
        .build()
        .unwrap();
    let schema = Schema::builder("Owner")
        .field(Field::new("name", FieldType::Str))
        .field(Field::new(
            "pet",
            FieldType::union([FieldType::nested(cat), FieldType::nested(dog)]),
        ))
        .build()
        .unwrap();

    let raw = json!({"name": "Ann", "pet": {"barks": 3, "isGood": true}});
    let record = schema.load(&raw).unwrap();
    let dumped = schema.dump(&record);
    assert_eq!(dumped, raw);
    assert_eq!(schema.load(&dumped).unwrap(), record);
}

#[test]
fn test_tagged_union_round_trips_with_aliased_discriminator() {
    let schema = Schema::builder("Owner")
        .field(Field::new(
            "pets",
            FieldType::list(FieldType::tagged(
                "petType",
                [
                    ("cat", pet_schema("Cat", "cat", "meows")),
                    ("dog", pet_schema("Dog", "dog", "barks")),
                ],
            )),
        ))
        .build()
        .unwrap();

    let raw = json!({"pets": [
        {"petType": "dog", "BARKS": 2},
        {"petType": "cat", "MEOWS": 7},
    ]});
    let record = schema.load(&raw).unwrap();
    let dumped = schema.dump(&record);
    assert_eq!(dumped, raw);
    assert_eq!(schema.load(&dumped).unwrap(), record);
}
