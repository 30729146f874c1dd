//! Server-side scripts for the read-then-write steps a plain batch cannot do.
//!
//! Every script runs through `EVAL`, so it is atomic with respect to every
//! other command on the store and can be queued inside a transaction.

use crate::resp::{Cmd, ToArg};
use crate::schema::CollectionDescriptor;
use crate::types::IndexKind;

#[derive(Debug, PartialEq, Eq)]
pub struct Script {
    name: &'static str,
    source: &'static str,
}

pub static DELETE_STRING_INDEX: Script = Script {
    name: "delete_string_index",
    source: include_str!("scripts/delete_string_index.lua"),
};

pub static FIND_MODELS_BY_IDS_KEY: Script = Script {
    name: "find_models_by_ids_key",
    source: include_str!("scripts/find_models_by_ids_key.lua"),
};

pub static DELETE_MODELS_BY_IDS_KEY: Script = Script {
    name: "delete_models_by_ids_key",
    source: include_str!("scripts/delete_models_by_ids_key.lua"),
};

pub static EXTRACT_IDS_FROM_FIELD_INDEX: Script = Script {
    name: "extract_ids_from_field_index",
    source: include_str!("scripts/extract_ids_from_field_index.lua"),
};

pub static EXTRACT_IDS_FROM_STRING_INDEX: Script = Script {
    name: "extract_ids_from_string_index",
    source: include_str!("scripts/extract_ids_from_string_index.lua"),
};

static ALL: [&Script; 5] = [
    &DELETE_STRING_INDEX,
    &FIND_MODELS_BY_IDS_KEY,
    &DELETE_MODELS_BY_IDS_KEY,
    &EXTRACT_IDS_FROM_FIELD_INDEX,
    &EXTRACT_IDS_FROM_STRING_INDEX,
];

impl Script {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Find one of the crate's scripts by its source text.
    pub fn lookup(source: &[u8]) -> Option<&'static Script> {
        ALL.iter().copied().find(|s| s.source.as_bytes() == source)
    }

    /// `EVAL <source> <numkeys> <keys...> <args...>`
    pub fn invoke<A: ToArg>(&self, keys: &[String], args: impl IntoIterator<Item = A>) -> Cmd {
        Cmd::new("EVAL")
            .arg(self.source)
            .arg(keys.len())
            .args(keys.iter())
            .args(args)
    }
}

/// Remove the string index member for the value currently in the hash.
pub(crate) fn delete_string_index(desc: &CollectionDescriptor, id: &str, storage: &str) -> Cmd {
    DELETE_STRING_INDEX.invoke(&[], [desc.name(), id, storage])
}

pub(crate) fn find_models_by_ids_key(
    ids_key: &str,
    desc: &CollectionDescriptor,
    limit: usize,
    offset: usize,
    reverse: bool,
) -> Cmd {
    FIND_MODELS_BY_IDS_KEY.invoke(
        &[ids_key.to_string()],
        [
            desc.name().to_string(),
            limit.to_string(),
            offset.to_string(),
            if reverse { "1" } else { "0" }.to_string(),
        ],
    )
}

pub(crate) fn delete_models_by_ids_key(ids_key: &str, desc: &CollectionDescriptor) -> Cmd {
    let mut args = vec![desc.name().to_string()];
    for field in desc.indexed_fields() {
        args.push(field.index.script_tag().to_string());
        args.push(field.storage_name.clone());
    }
    DELETE_MODELS_BY_IDS_KEY.invoke(&[ids_key.to_string()], args)
}

/// Copy ids from a field index into `dest_key` for the range `[min, max]`.
pub(crate) fn extract_ids(kind: IndexKind, index_key: &str, dest_key: &str, min: &[u8], max: &[u8]) -> Cmd {
    let script = match kind {
        IndexKind::String => &EXTRACT_IDS_FROM_STRING_INDEX,
        _ => &EXTRACT_IDS_FROM_FIELD_INDEX,
    };
    script.invoke(&[index_key.to_string(), dest_key.to_string()], [min, max])
}
