#![allow(dead_code)]

use redmodel::{
    Collection, CollectionOptions, FieldSpec, FieldType, IndexKind, MemoryStore, Model, Registry,
    Result, Scalar, Value,
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub active: bool,
    pub bio: String,
    pub nickname: Option<String>,
    pub tags: Vec<String>,
}

impl Model for Person {
    fn schema() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("Name", FieldType::Str).indexed(IndexKind::String),
            FieldSpec::new("Age", FieldType::Int).indexed(IndexKind::Numeric),
            FieldSpec::new("Active", FieldType::Bool).indexed(IndexKind::Boolean),
            FieldSpec::new("Bio", FieldType::Str),
            FieldSpec::new("Nickname", FieldType::Str)
                .store_as("nick")
                .indexed(IndexKind::String),
            FieldSpec::fallback("Tags"),
        ]
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    fn set_model_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, name: &str) -> Result<Option<Value>> {
        Ok(match name {
            "Name" => Some(self.name.to_value()),
            "Age" => Some(self.age.to_value()),
            "Active" => Some(self.active.to_value()),
            "Bio" => Some(self.bio.to_value()),
            "Nickname" => self.nickname.as_ref().map(|n| n.to_value()),
            "Tags" => Some(Value::fallback(&self.tags)?),
            _ => None,
        })
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            "Name" => self.name = String::from_value(value)?,
            "Age" => self.age = i64::from_value(value)?,
            "Active" => self.active = bool::from_value(value)?,
            "Bio" => self.bio = String::from_value(value)?,
            "Nickname" => self.nickname = Some(String::from_value(value)?),
            "Tags" => self.tags = value.decode_fallback()?,
            _ => {}
        }
        Ok(())
    }
}

/// A collection without a primary index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    pub body: String,
}

impl Model for Note {
    fn schema() -> Vec<FieldSpec> {
        vec![FieldSpec::new("Body", FieldType::Str)]
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    fn set_model_id(&mut self, id: String) {
        self.id = id;
    }

    fn field(&self, name: &str) -> Result<Option<Value>> {
        Ok(match name {
            "Body" => Some(self.body.to_value()),
            _ => None,
        })
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        if name == "Body" {
            self.body = String::from_value(value)?;
        }
        Ok(())
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub registry: Registry,
    pub people: Collection<Person>,
}

pub fn setup() -> Fixture {
    let store = MemoryStore::new();
    let registry = Registry::new(store.pool());
    let people = registry
        .register::<Person>(CollectionOptions::new().index(true))
        .unwrap();
    Fixture {
        store,
        registry,
        people,
    }
}

pub fn person(name: &str, age: i64) -> Person {
    Person {
        name: name.to_string(),
        age,
        ..Default::default()
    }
}

pub async fn save_all(people: &Collection<Person>, records: &mut [Person]) {
    let mut tx = people.pool().transaction();
    for record in records.iter_mut() {
        tx.save(people, record);
    }
    tx.exec().await.unwrap();
}
