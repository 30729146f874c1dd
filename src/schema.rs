//! Field and collection descriptors.
//!
//! A [`Model`] declares its fields once through [`Model::schema`]. Registration
//! validates the declaration and freezes it into a [`CollectionDescriptor`],
//! which is shared read-only by every operation on the collection.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{FieldType, IndexKind};
use crate::value::Value;

/// Hash field holding the record's own id.
pub const ID_FIELD: &str = "_id";

/// Separates the collection name from the rest of a key.
pub const KEY_DELIMITER: char = ':';

/// Separates value and id inside a string index member.
pub const STRING_INDEX_SEPARATOR: u8 = 0;

/// A record type that can be stored in a collection.
///
/// `field` and `set_field` are keyed by the field names declared in
/// [`Model::schema`]. `field` returns `None` for an absent value (an empty
/// `Option`); absent values are removed from the hash and from indexes.
pub trait Model: Default + Send + Sync + 'static {
    fn schema() -> Vec<FieldSpec>;

    fn model_id(&self) -> &str;

    fn set_model_id(&mut self, id: String);

    fn field(&self, name: &str) -> Result<Option<Value>>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;
}

/// Field declaration, as written by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub storage_name: Option<String>,
    pub ty: FieldType,
    pub index: IndexKind,
}

impl FieldSpec {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.to_string(),
            storage_name: None,
            ty,
            index: IndexKind::None,
        }
    }

    /// A field stored through the fallback codec.
    pub fn fallback(name: &str) -> Self {
        Self::new(name, FieldType::Fallback)
    }

    pub fn indexed(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    /// Store the field in the hash under `storage_name` instead of its name.
    pub fn store_as(mut self, storage_name: &str) -> Self {
        self.storage_name = Some(storage_name.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub storage_name: String,
    pub ty: FieldType,
    pub index: IndexKind,
}

#[derive(Debug)]
pub struct CollectionDescriptor {
    name: String,
    indexed: bool,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_storage: HashMap<String, usize>,
}

impl CollectionDescriptor {
    /// Validate field declarations and build the descriptor.
    pub fn new(name: &str, indexed: bool, specs: Vec<FieldSpec>) -> Result<Self> {
        validate_name(name)?;

        let schema_err = |reason: String| Error::Schema {
            collection: name.to_string(),
            reason,
        };

        let mut fields = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::new();
        let mut by_storage = HashMap::new();

        for spec in specs {
            let storage_name = spec.storage_name.clone().unwrap_or_else(|| spec.name.clone());
            if spec.name.is_empty() || storage_name.is_empty() {
                return Err(schema_err("field names cannot be empty".to_string()));
            }
            if storage_name == ID_FIELD {
                return Err(schema_err(format!("storage name {:?} is reserved", ID_FIELD)));
            }
            check_index_fits(&spec).map_err(schema_err)?;

            let pos = fields.len();
            if by_name.insert(spec.name.clone(), pos).is_some() {
                return Err(schema_err(format!("duplicate field {:?}", spec.name)));
            }
            if by_storage.insert(storage_name.clone(), pos).is_some() {
                return Err(schema_err(format!("duplicate storage name {:?}", storage_name)));
            }
            fields.push(FieldDescriptor {
                name: spec.name,
                storage_name,
                ty: spec.ty,
                index: spec.index,
            });
        }

        Ok(Self {
            name: name.to_string(),
            indexed,
            fields,
            by_name,
            by_storage,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the collection keeps a primary index of live ids.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.index.is_indexed())
    }

    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.by_name
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| Error::UnknownField {
                collection: self.name.clone(),
                field: name.to_string(),
            })
    }

    pub fn field_by_storage(&self, storage_name: &str) -> Option<&FieldDescriptor> {
        self.by_storage.get(storage_name).map(|&i| &self.fields[i])
    }

    /// `<collection>:<id>`
    pub fn model_key(&self, id: &str) -> String {
        format!("{}{}{}", self.name, KEY_DELIMITER, id)
    }

    /// `<collection>:all`
    pub fn all_key(&self) -> String {
        format!("{}{}all", self.name, KEY_DELIMITER)
    }

    /// `<collection>:<storage name>` for an indexed field.
    pub fn field_index_key(&self, field: &str) -> Result<String> {
        let field = self.field(field)?;
        if !field.index.is_indexed() {
            return Err(Error::FieldNotIndexed {
                collection: self.name.clone(),
                field: field.name.clone(),
            });
        }
        Ok(self.index_key_for(field))
    }

    pub(crate) fn index_key_for(&self, field: &FieldDescriptor) -> String {
        format!("{}{}{}", self.name, KEY_DELIMITER, field.storage_name)
    }

    /// `SORT ... GET` pattern for a field's hash value.
    pub(crate) fn get_pattern(&self, field: &FieldDescriptor) -> String {
        format!("{}{}*->{}", self.name, KEY_DELIMITER, field.storage_name)
    }

    pub(crate) fn require_indexed(&self) -> Result<()> {
        if self.indexed {
            Ok(())
        } else {
            Err(Error::NotIndexed(self.name.clone()))
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(KEY_DELIMITER) {
        return Err(invalid("name contains the key delimiter ':'"));
    }
    if name.contains('*') {
        return Err(invalid("name contains the pattern character '*'"));
    }
    Ok(())
}

fn check_index_fits(spec: &FieldSpec) -> std::result::Result<(), String> {
    let fits = match spec.index {
        IndexKind::None => true,
        IndexKind::Numeric => spec.ty.is_numeric(),
        IndexKind::Boolean => spec.ty == FieldType::Bool,
        IndexKind::String => spec.ty == FieldType::Str,
    };
    if fits {
        Ok(())
    } else {
        Err(format!(
            "field {:?} of type {:?} cannot have a {:?} index",
            spec.name, spec.ty, spec.index
        ))
    }
}

/// Member of a string index: `value\0id`.
pub(crate) fn string_index_member(value: &str, id: &str) -> Vec<u8> {
    let mut member = Vec::with_capacity(value.len() + id.len() + 1);
    member.extend_from_slice(value.as_bytes());
    member.push(STRING_INDEX_SEPARATOR);
    member.extend_from_slice(id.as_bytes());
    member
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("Name", FieldType::Str).indexed(IndexKind::String),
            FieldSpec::new("Age", FieldType::Int).indexed(IndexKind::Numeric),
            FieldSpec::new("Nickname", FieldType::Str).store_as("nick"),
            FieldSpec::fallback("Tags"),
        ]
    }

    #[test]
    fn test_keys() {
        let desc = CollectionDescriptor::new("Person", true, person_fields()).unwrap();
        assert_eq!(desc.model_key("abc"), "Person:abc");
        assert_eq!(desc.all_key(), "Person:all");
        assert_eq!(desc.field_index_key("Age").unwrap(), "Person:Age");
        assert_eq!(desc.field("Nickname").unwrap().storage_name, "nick");
        assert_eq!(desc.field_by_storage("nick").unwrap().name, "Nickname");
        assert_eq!(desc.indexed_fields().count(), 2);
    }

    #[test]
    fn test_index_key_errors() {
        let desc = CollectionDescriptor::new("Person", true, person_fields()).unwrap();
        assert!(matches!(
            desc.field_index_key("Nickname"),
            Err(Error::FieldNotIndexed { .. })
        ));
        assert!(matches!(
            desc.field_index_key("Missing"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            CollectionDescriptor::new("a:b", true, vec![]),
            Err(Error::InvalidName { .. })
        ));
        assert!(matches!(
            CollectionDescriptor::new("", true, vec![]),
            Err(Error::InvalidName { .. })
        ));
    }

    #[test]
    fn test_schema_validation() {
        let reserved = vec![FieldSpec::new("Id", FieldType::Str).store_as(ID_FIELD)];
        assert!(matches!(
            CollectionDescriptor::new("A", true, reserved),
            Err(Error::Schema { .. })
        ));

        let duplicate_storage = vec![
            FieldSpec::new("A", FieldType::Int),
            FieldSpec::new("B", FieldType::Int).store_as("A"),
        ];
        assert!(CollectionDescriptor::new("A", true, duplicate_storage).is_err());

        let bad_index = vec![FieldSpec::new("A", FieldType::Str).indexed(IndexKind::Numeric)];
        assert!(CollectionDescriptor::new("A", true, bad_index).is_err());

        let indexed_fallback = vec![FieldSpec::fallback("A").indexed(IndexKind::String)];
        assert!(CollectionDescriptor::new("A", true, indexed_fallback).is_err());
    }

    #[test]
    fn test_string_index_member() {
        assert_eq!(string_index_member("bob", "x1"), b"bob\0x1".to_vec());
    }
}
