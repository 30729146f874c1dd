//! Index maintenance: the commands that keep field indexes in step with the
//! record hash.
//!
//! A string index member embeds the field value, so removing the stale member
//! needs the old value. That read happens inside the delete-string-index script,
//! which is always queued ahead of the command that rewrites or deletes the
//! hash.

use crate::record::EncodedField;
use crate::resp::Cmd;
use crate::schema::{string_index_member, CollectionDescriptor, ID_FIELD};
use crate::scripts;
use crate::types::IndexKind;
use crate::value::Value;

/// Commands writing `fields` of record `id`, in execution order.
pub(crate) fn save_commands(desc: &CollectionDescriptor, id: &str, fields: &[EncodedField<'_>]) -> Vec<Cmd> {
    let key = desc.model_key(id);
    let mut cmds = Vec::new();

    // Stale string members first, while the hash still holds the old values.
    for f in fields.iter().filter(|f| f.field.index == IndexKind::String) {
        cmds.push(scripts::delete_string_index(desc, id, &f.field.storage_name));
    }

    let absent: Vec<&str> = fields
        .iter()
        .filter(|f| f.value.is_none())
        .map(|f| f.field.storage_name.as_str())
        .collect();
    if !absent.is_empty() {
        cmds.push(Cmd::new("HDEL").arg(&key).args(absent));
    }

    let mut hmset = Cmd::new("HMSET").arg(&key).arg(ID_FIELD).arg(id);
    for f in fields {
        if let Some(value) = &f.value {
            hmset = hmset.arg(f.field.storage_name.as_str()).arg(value.to_store_bytes());
        }
    }
    cmds.push(hmset);

    for f in fields.iter().filter(|f| f.field.index.is_indexed()) {
        let index_key = desc.index_key_for(f.field);
        match (&f.value, f.field.index) {
            (Some(Value::Str(s)), IndexKind::String) => {
                cmds.push(Cmd::new("ZADD").arg(index_key).arg(0i64).arg(string_index_member(s, id)));
            }
            (Some(value), _) => {
                if let Some(score) = value.score() {
                    cmds.push(Cmd::new("ZADD").arg(index_key).arg(score).arg(id));
                }
            }
            (None, IndexKind::String) => {}
            (None, _) => cmds.push(Cmd::new("ZREM").arg(index_key).arg(id)),
        }
    }

    if desc.is_indexed() {
        cmds.push(Cmd::new("SADD").arg(desc.all_key()).arg(id));
    }
    cmds
}

/// Commands removing record `id`: index cleanup, the hash delete (whose
/// integer reply says whether the record existed) and the primary index entry.
pub(crate) struct DeleteCommands {
    pub cleanup: Vec<Cmd>,
    pub delete: Cmd,
    pub unindex: Option<Cmd>,
}

pub(crate) fn delete_commands(desc: &CollectionDescriptor, id: &str) -> DeleteCommands {
    let mut cleanup = Vec::new();
    for field in desc.indexed_fields() {
        match field.index {
            IndexKind::String => {
                cleanup.push(scripts::delete_string_index(desc, id, &field.storage_name));
            }
            _ => cleanup.push(Cmd::new("ZREM").arg(desc.index_key_for(field)).arg(id)),
        }
    }

    DeleteCommands {
        cleanup,
        delete: Cmd::new("DEL").arg(desc.model_key(id)),
        unindex: desc
            .is_indexed()
            .then(|| Cmd::new("SREM").arg(desc.all_key()).arg(id)),
    }
}
