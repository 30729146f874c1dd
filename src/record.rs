//! Conversion between models and the flat field/value lists the store returns.

use crate::error::{Error, Result};
use crate::resp::RespValue;
use crate::schema::{CollectionDescriptor, FieldDescriptor, Model, ID_FIELD, STRING_INDEX_SEPARATOR};
use crate::types::IndexKind;
use crate::value::Value;

/// A field of a model about to be written; `None` when the value is absent.
pub(crate) struct EncodedField<'d> {
    pub field: &'d FieldDescriptor,
    pub value: Option<Value>,
}

/// Read `names` (or every field) off `model`, checking each value against its
/// descriptor. Nothing is written unless every field encodes.
pub(crate) fn encode_fields<'d, T: Model>(
    desc: &'d CollectionDescriptor,
    model: &T,
    names: Option<&[&str]>,
) -> Result<Vec<EncodedField<'d>>> {
    let fields: Vec<&FieldDescriptor> = match names {
        Some(names) => names
            .iter()
            .map(|n| desc.field(n))
            .collect::<Result<_>>()?,
        None => desc.fields().iter().collect(),
    };

    let mut encoded = Vec::with_capacity(fields.len());
    for field in fields {
        let value = model.field(&field.name)?;
        if let Some(value) = &value {
            check_value(field, value)?;
        }
        encoded.push(EncodedField { field, value });
    }
    Ok(encoded)
}

fn check_value(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if !value.fits(field.ty) {
        return Err(Error::encode(
            &field.name,
            format!("value {:?} does not fit type {:?}", value, field.ty),
        ));
    }
    match (field.index, value) {
        (IndexKind::String, Value::Str(s)) if s.as_bytes().contains(&STRING_INDEX_SEPARATOR) => {
            Err(Error::encode(&field.name, "string-indexed values cannot contain NUL"))
        }
        (IndexKind::Numeric, v) if v.score().map_or(false, f64::is_nan) => {
            Err(Error::encode(&field.name, "NaN cannot be indexed"))
        }
        _ => Ok(()),
    }
}

fn decode_into<T: Model>(model: &mut T, field: &FieldDescriptor, raw: Vec<u8>) -> Result<()> {
    let value = Value::from_store_bytes(field.ty, raw).map_err(|e| Error::decode(&field.name, e))?;
    model.set_field(&field.name, value)
}

/// Fill `model` from an `HGETALL`-style `[field, value, ...]` list. Unknown
/// storage names are skipped.
pub(crate) fn scan_pairs<T: Model>(
    desc: &CollectionDescriptor,
    model: &mut T,
    pairs: Vec<RespValue>,
) -> Result<()> {
    let mut items = pairs.into_iter();
    while let (Some(name), Some(value)) = (items.next(), items.next()) {
        let name = name.into_string()?.unwrap_or_default();
        let Some(raw) = value.into_bulk()? else {
            continue;
        };
        if name == ID_FIELD {
            model.set_model_id(String::from_utf8_lossy(&raw).into_owned());
            continue;
        }
        if let Some(field) = desc.field_by_storage(&name) {
            decode_into(model, field, raw)?;
        }
    }
    Ok(())
}

/// Fill `model` from values that line up with `fields`; nil values leave the
/// destination field untouched.
pub(crate) fn scan_values<T: Model>(
    model: &mut T,
    fields: &[&FieldDescriptor],
    values: impl IntoIterator<Item = RespValue>,
) -> Result<()> {
    for (field, value) in fields.iter().zip(values) {
        if let Some(raw) = value.into_bulk()? {
            decode_into(model, field, raw)?;
        }
    }
    Ok(())
}

/// Decode the reply of the bulk-fetch script: one `[id, field, value, ...]`
/// array per record.
pub(crate) fn scan_models<T: Model>(desc: &CollectionDescriptor, reply: RespValue) -> Result<Vec<T>> {
    let rows = reply.into_array()?;
    let mut models = Vec::with_capacity(rows.len());
    for row in rows {
        let mut items = row.into_array()?.into_iter();
        let id = match items.next() {
            Some(id) => id.into_string()?.unwrap_or_default(),
            None => continue,
        };
        let mut model = T::default();
        model.set_model_id(id);
        scan_pairs(desc, &mut model, items.collect())?;
        models.push(model);
    }
    Ok(models)
}
