//! Native equivalents of the crate's Lua scripts.

use super::commands::{range_by_lex, range_by_score, rank_window, LexBound, ScoreBound};
use super::{Keyspace, KsResult};
use crate::resp::RespValue;
use crate::schema::{KEY_DELIMITER, STRING_INDEX_SEPARATOR};
use crate::scripts::{
    Script, DELETE_MODELS_BY_IDS_KEY, DELETE_STRING_INDEX, EXTRACT_IDS_FROM_FIELD_INDEX,
    EXTRACT_IDS_FROM_STRING_INDEX, FIND_MODELS_BY_IDS_KEY,
};
use crate::types::{KeyType, ZMember};

pub(super) fn run(ks: &mut Keyspace, script: &Script, keys: &[Vec<u8>], argv: &[Vec<u8>]) -> RespValue {
    let result = if *script == DELETE_STRING_INDEX {
        delete_string_index(ks, argv)
    } else if *script == FIND_MODELS_BY_IDS_KEY {
        find_models_by_ids_key(ks, keys, argv)
    } else if *script == DELETE_MODELS_BY_IDS_KEY {
        delete_models_by_ids_key(ks, keys, argv)
    } else if *script == EXTRACT_IDS_FROM_FIELD_INDEX {
        extract_ids_from_field_index(ks, keys, argv)
    } else if *script == EXTRACT_IDS_FROM_STRING_INDEX {
        extract_ids_from_string_index(ks, keys, argv)
    } else {
        Ok(RespValue::error(format!("no native version of {}", script.name())))
    };
    result.unwrap_or_else(|_| RespValue::wrong_type())
}

fn script_error(script: &Script) -> RespValue {
    RespValue::error(format!("bad arguments for script {}", script.name()))
}

fn join_key(collection: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.len() + suffix.len() + 1);
    key.extend_from_slice(collection);
    key.push(KEY_DELIMITER as u8);
    key.extend_from_slice(suffix);
    key
}

fn index_member(value: &[u8], id: &[u8]) -> Vec<u8> {
    let mut member = value.to_vec();
    member.push(STRING_INDEX_SEPARATOR);
    member.extend_from_slice(id);
    member
}

fn parse_usize(arg: &[u8]) -> Option<usize> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// Ids held in a set or sorted set; anything else has none.
fn ids_in(ks: &Keyspace, key: &[u8]) -> KsResult<Vec<Vec<u8>>> {
    match ks.key_type(key) {
        Some(KeyType::ZSet) => Ok(ks.zsorted(key)?.into_iter().map(|m| m.member).collect()),
        Some(KeyType::Set) => Ok(ks.set(key)?.into_iter().flatten().cloned().collect()),
        _ => Ok(Vec::new()),
    }
}

fn delete_string_index(ks: &mut Keyspace, argv: &[Vec<u8>]) -> KsResult<RespValue> {
    let [collection, id, field] = argv else {
        return Ok(script_error(&DELETE_STRING_INDEX));
    };
    let Some(value) = ks.hget(&join_key(collection, id), field)? else {
        return Ok(RespValue::Integer(0));
    };
    let removed = ks.zrem(&join_key(collection, field), &[index_member(&value, id)])?;
    Ok(RespValue::Integer(removed as i64))
}

fn find_models_by_ids_key(ks: &mut Keyspace, keys: &[Vec<u8>], argv: &[Vec<u8>]) -> KsResult<RespValue> {
    let ([ids_key], [collection, limit, offset, reverse]) = (keys, argv) else {
        return Ok(script_error(&FIND_MODELS_BY_IDS_KEY));
    };
    let (Some(limit), Some(offset)) = (parse_usize(limit), parse_usize(offset)) else {
        return Ok(script_error(&FIND_MODELS_BY_IDS_KEY));
    };

    let mut ids = ids_in(ks, ids_key)?;
    match ks.key_type(ids_key) {
        Some(KeyType::ZSet) => {
            if reverse.as_slice() == b"1" {
                ids.reverse();
            }
            let stop = if limit > 0 { (offset + limit) as i64 - 1 } else { -1 };
            let window = rank_window(offset as i64, stop, ids.len());
            ids = ids.drain(window).collect();
        }
        _ => {
            let count = if limit > 0 { limit } else { usize::MAX };
            ids = ids.into_iter().skip(offset).take(count).collect();
        }
    }

    let mut models = Vec::with_capacity(ids.len());
    for id in ids {
        let pairs = ks.hgetall(&join_key(collection, &id))?;
        if pairs.is_empty() {
            continue;
        }
        let mut row = vec![RespValue::from_bytes(id)];
        for (field, value) in pairs {
            row.push(RespValue::from_bytes(field));
            row.push(RespValue::from_bytes(value));
        }
        models.push(RespValue::Array(Some(row)));
    }
    Ok(RespValue::Array(Some(models)))
}

fn delete_models_by_ids_key(ks: &mut Keyspace, keys: &[Vec<u8>], argv: &[Vec<u8>]) -> KsResult<RespValue> {
    let ([ids_key], [collection, indexes @ ..]) = (keys, argv) else {
        return Ok(script_error(&DELETE_MODELS_BY_IDS_KEY));
    };
    if indexes.len() % 2 != 0 {
        return Ok(script_error(&DELETE_MODELS_BY_IDS_KEY));
    }

    let all_key = join_key(collection, b"all");
    let mut count = 0;
    for id in ids_in(ks, ids_key)? {
        let key = join_key(collection, &id);
        for pair in indexes.chunks(2) {
            let (kind, storage) = (&pair[0], &pair[1]);
            let index_key = join_key(collection, storage);
            if kind.as_slice() == b"s" {
                if let Some(value) = ks.hget(&key, storage)? {
                    ks.zrem(&index_key, &[index_member(&value, &id)])?;
                }
            } else {
                ks.zrem(&index_key, &[id.clone()])?;
            }
        }
        if ks.del(&key) {
            count += 1;
        }
        ks.srem(&all_key, &[id])?;
    }
    Ok(RespValue::Integer(count))
}

fn extract_ids_from_field_index(ks: &mut Keyspace, keys: &[Vec<u8>], argv: &[Vec<u8>]) -> KsResult<RespValue> {
    let ([index_key, dest], [min, max]) = (keys, argv) else {
        return Ok(script_error(&EXTRACT_IDS_FROM_FIELD_INDEX));
    };
    let (Some(min), Some(max)) = (ScoreBound::parse(min), ScoreBound::parse(max)) else {
        return Ok(RespValue::error("min or max is not a float"));
    };
    let members = range_by_score(ks, index_key, min, max)?;
    let n = members.len();
    if n > 0 {
        ks.zadd(dest, &members)?;
    }
    Ok(RespValue::Integer(n as i64))
}

fn extract_ids_from_string_index(ks: &mut Keyspace, keys: &[Vec<u8>], argv: &[Vec<u8>]) -> KsResult<RespValue> {
    let ([index_key, dest], [min, max]) = (keys, argv) else {
        return Ok(script_error(&EXTRACT_IDS_FROM_STRING_INDEX));
    };
    let (Some(min), Some(max)) = (LexBound::parse(min), LexBound::parse(max)) else {
        return Ok(RespValue::error("min or max not valid string range item"));
    };
    let members = range_by_lex(ks, index_key, &min, &max)?;
    let start = ks.zset(dest)?.map_or(0, |z| z.len());

    let ids: Vec<ZMember> = members
        .iter()
        .enumerate()
        .filter_map(|(i, member)| {
            let sep = member.iter().position(|&b| b == STRING_INDEX_SEPARATOR)?;
            Some(ZMember::new((start + i + 1) as f64, member[sep + 1..].to_vec()))
        })
        .collect();
    if !ids.is_empty() {
        ks.zadd(dest, &ids)?;
    }
    Ok(RespValue::Integer(members.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::super::commands::execute_command;
    use super::*;
    use crate::resp::Cmd;

    fn eval(ks: &mut Keyspace, cmd: Cmd) -> RespValue {
        execute_command(ks, cmd.as_args())
    }

    fn exec(ks: &mut Keyspace, parts: &[&[u8]]) -> RespValue {
        let args: Vec<Vec<u8>> = parts.iter().map(|p| p.to_vec()).collect();
        execute_command(ks, &args)
    }

    #[test]
    fn test_extract_ids_from_string_index_keeps_order() {
        let mut ks = Keyspace::default();
        exec(&mut ks, &[b"ZADD", b"P:Name", b"0", b"bob\0b1", b"0", b"alice\0a1", b"0", b"carl\0c1"]);
        let cmd = EXTRACT_IDS_FROM_STRING_INDEX.invoke(
            &["P:Name".to_string(), "tmp".to_string()],
            [b"-".as_slice(), b"(bob\0".as_slice()],
        );
        assert_eq!(eval(&mut ks, cmd), RespValue::Integer(1));

        let cmd = EXTRACT_IDS_FROM_STRING_INDEX.invoke(
            &["P:Name".to_string(), "tmp".to_string()],
            [b"[bob\x01".as_slice(), b"+".as_slice()],
        );
        assert_eq!(eval(&mut ks, cmd), RespValue::Integer(1));

        let ids: Vec<Vec<u8>> = ks.zsorted(b"tmp").unwrap().into_iter().map(|m| m.member).collect();
        assert_eq!(ids, vec![b"a1".to_vec(), b"c1".to_vec()]);
    }

    #[test]
    fn test_delete_string_index_uses_stored_value() {
        let mut ks = Keyspace::default();
        exec(&mut ks, &[b"HSET", b"P:a1", b"Name", b"alice"]);
        exec(&mut ks, &[b"ZADD", b"P:Name", b"0", b"alice\0a1"]);
        let cmd = DELETE_STRING_INDEX.invoke(&[], ["P", "a1", "Name"]);
        assert_eq!(eval(&mut ks, cmd), RespValue::Integer(1));
        assert!(!ks.exists(b"P:Name"));
    }

    #[test]
    fn test_delete_models_by_ids_key_keeps_id_set() {
        let mut ks = Keyspace::default();
        exec(&mut ks, &[b"HSET", b"P:a1", b"Age", b"3"]);
        exec(&mut ks, &[b"ZADD", b"P:Age", b"3", b"a1"]);
        exec(&mut ks, &[b"SADD", b"P:all", b"a1", b"ghost"]);
        exec(&mut ks, &[b"SADD", b"ids", b"a1", b"ghost"]);

        let cmd = DELETE_MODELS_BY_IDS_KEY.invoke(&["ids".to_string()], ["P", "n", "Age"]);
        assert_eq!(eval(&mut ks, cmd), RespValue::Integer(1));
        assert!(ks.exists(b"ids"));
        assert!(!ks.exists(b"P:a1"));
        assert!(!ks.exists(b"P:Age"));
        assert!(!ks.exists(b"P:all"));
    }

    #[test]
    fn test_find_models_window_on_sorted_set() {
        let mut ks = Keyspace::default();
        for (score, id) in [("1", "a"), ("2", "b"), ("3", "c")] {
            exec(&mut ks, &[b"ZADD", b"ids", score.as_bytes(), id.as_bytes()]);
            exec(&mut ks, &[b"HSET", format!("P:{}", id).as_bytes(), b"_id", id.as_bytes()]);
        }
        let cmd = FIND_MODELS_BY_IDS_KEY.invoke(&["ids".to_string()], ["P", "2", "0", "1"]);
        let rows = eval(&mut ks, cmd).into_array().unwrap();
        let ids: Vec<String> = rows
            .into_iter()
            .map(|r| r.into_array().unwrap()[0].clone().into_string().unwrap().unwrap())
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
