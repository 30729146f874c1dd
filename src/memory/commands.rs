use std::collections::HashMap;

use super::{scripts, Keyspace, KsResult};
use crate::resp::{format_score, RespValue};
use crate::scripts::Script;
use crate::types::{KeyType, ZMember};

const COMMANDS: &[&str] = &[
    "PING", "FLUSHDB", "DEL", "EXISTS", "TYPE", "HSET", "HMSET", "HGET", "HMGET", "HGETALL", "HDEL",
    "SADD", "SREM", "SCARD", "SMEMBERS", "SISMEMBER", "ZADD", "ZREM", "ZCARD", "ZSCORE", "ZRANGE",
    "ZREVRANGE", "ZRANGEBYSCORE", "ZRANGEBYLEX", "ZINTERSTORE", "SORT", "EVAL",
];

pub(super) fn is_known(name: &str) -> bool {
    COMMANDS.contains(&name)
}

pub(super) fn execute_command(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.is_empty() {
        return RespValue::error("empty command");
    }

    let cmd = String::from_utf8_lossy(&args[0]).to_uppercase();
    let cmd_args = &args[1..];

    match cmd.as_str() {
        "PING" => RespValue::pong(),
        "FLUSHDB" => {
            ks.flush();
            RespValue::ok()
        }
        "DEL" => cmd_del(ks, cmd_args),
        "EXISTS" => cmd_exists(ks, cmd_args),
        "TYPE" => cmd_type(ks, cmd_args),
        // Hash operations
        "HSET" => cmd_hset(ks, cmd_args, false),
        "HMSET" => cmd_hset(ks, cmd_args, true),
        "HGET" => cmd_hget(ks, cmd_args),
        "HMGET" => cmd_hmget(ks, cmd_args),
        "HGETALL" => cmd_hgetall(ks, cmd_args),
        "HDEL" => cmd_hdel(ks, cmd_args),
        // Set operations
        "SADD" => cmd_sadd(ks, cmd_args),
        "SREM" => cmd_srem(ks, cmd_args),
        "SCARD" => cmd_scard(ks, cmd_args),
        "SMEMBERS" => cmd_smembers(ks, cmd_args),
        "SISMEMBER" => cmd_sismember(ks, cmd_args),
        // Sorted set operations
        "ZADD" => cmd_zadd(ks, cmd_args),
        "ZREM" => cmd_zrem(ks, cmd_args),
        "ZCARD" => cmd_zcard(ks, cmd_args),
        "ZSCORE" => cmd_zscore(ks, cmd_args),
        "ZRANGE" => cmd_zrange(ks, cmd_args, false),
        "ZREVRANGE" => cmd_zrange(ks, cmd_args, true),
        "ZRANGEBYSCORE" => cmd_zrangebyscore(ks, cmd_args),
        "ZRANGEBYLEX" => cmd_zrangebylex(ks, cmd_args),
        "ZINTERSTORE" => cmd_zinterstore(ks, cmd_args),
        "SORT" => cmd_sort(ks, cmd_args),
        "EVAL" => cmd_eval(ks, cmd_args),
        _ => RespValue::error(format!("unknown command '{}'", cmd)),
    }
}

fn arity_error(name: &str) -> RespValue {
    RespValue::error(format!("wrong number of arguments for '{}' command", name))
}

fn reply<T>(result: KsResult<T>, f: impl FnOnce(T) -> RespValue) -> RespValue {
    match result {
        Ok(v) => f(v),
        Err(_) => RespValue::wrong_type(),
    }
}

fn count(n: usize) -> RespValue {
    RespValue::Integer(n as i64)
}

fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn parse_float(arg: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(arg).ok()?;
    match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

fn bulk_array(items: impl IntoIterator<Item = Vec<u8>>) -> RespValue {
    RespValue::Array(Some(items.into_iter().map(RespValue::from_bytes).collect()))
}

// --- Keys ---

fn cmd_del(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.is_empty() {
        return arity_error("del");
    }
    count(args.iter().filter(|k| ks.del(k)).count())
}

fn cmd_exists(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.is_empty() {
        return arity_error("exists");
    }
    count(args.iter().filter(|k| ks.exists(k)).count())
}

fn cmd_type(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 1 {
        return arity_error("type");
    }
    let name = ks.key_type(&args[0]).map_or("none", |t| t.as_str());
    RespValue::SimpleString(name.to_string())
}

// --- Hashes ---

fn cmd_hset(ks: &mut Keyspace, args: &[Vec<u8>], legacy: bool) -> RespValue {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return arity_error(if legacy { "hmset" } else { "hset" });
    }
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = args[1..]
        .chunks(2)
        .map(|p| (p[0].clone(), p[1].clone()))
        .collect();
    reply(ks.hset(&args[0], &pairs), |added| {
        if legacy {
            RespValue::ok()
        } else {
            count(added)
        }
    })
}

fn cmd_hget(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 2 {
        return arity_error("hget");
    }
    reply(ks.hget(&args[0], &args[1]), RespValue::BulkString)
}

fn cmd_hmget(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("hmget");
    }
    reply(ks.hash(&args[0]), |hash| {
        RespValue::Array(Some(
            args[1..]
                .iter()
                .map(|f| RespValue::BulkString(hash.and_then(|h| h.get(f).cloned())))
                .collect(),
        ))
    })
}

fn cmd_hgetall(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 1 {
        return arity_error("hgetall");
    }
    reply(ks.hgetall(&args[0]), |pairs| {
        bulk_array(pairs.into_iter().flat_map(|(f, v)| [f, v]))
    })
}

fn cmd_hdel(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("hdel");
    }
    reply(ks.hdel(&args[0], &args[1..]), count)
}

// --- Sets ---

fn cmd_sadd(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("sadd");
    }
    reply(ks.sadd(&args[0], &args[1..]), count)
}

fn cmd_srem(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("srem");
    }
    reply(ks.srem(&args[0], &args[1..]), count)
}

fn cmd_scard(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 1 {
        return arity_error("scard");
    }
    reply(ks.set(&args[0]), |s| count(s.map_or(0, |s| s.len())))
}

fn cmd_smembers(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 1 {
        return arity_error("smembers");
    }
    reply(ks.set(&args[0]), |s| {
        bulk_array(s.into_iter().flatten().cloned())
    })
}

fn cmd_sismember(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 2 {
        return arity_error("sismember");
    }
    reply(ks.set(&args[0]), |s| {
        RespValue::Integer(s.map_or(false, |s| s.contains(&args[1])) as i64)
    })
}

// --- Sorted sets ---

fn cmd_zadd(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return arity_error("zadd");
    }

    let mut members = Vec::new();
    for pair in args[1..].chunks(2) {
        match parse_float(&pair[0]) {
            Some(score) if !score.is_nan() => members.push(ZMember::new(score, pair[1].clone())),
            _ => return RespValue::error("value is not a valid float"),
        }
    }
    reply(ks.zadd(&args[0], &members), count)
}

fn cmd_zrem(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("zrem");
    }
    reply(ks.zrem(&args[0], &args[1..]), count)
}

fn cmd_zcard(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 1 {
        return arity_error("zcard");
    }
    reply(ks.zset(&args[0]), |z| count(z.map_or(0, |z| z.len())))
}

fn cmd_zscore(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 2 {
        return arity_error("zscore");
    }
    reply(ks.zset(&args[0]), |z| match z.and_then(|z| z.get(&args[1])) {
        Some(score) => RespValue::from_string(format_score(*score)),
        None => RespValue::null(),
    })
}

/// Clamp Redis-style inclusive `start`/`stop` indexes to `len`.
pub(super) fn rank_window(start: i64, stop: i64, len: usize) -> std::ops::Range<usize> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return 0..0;
    }
    start as usize..(stop + 1) as usize
}

fn with_scores(members: Vec<ZMember>, scores: bool) -> RespValue {
    if scores {
        bulk_array(
            members
                .into_iter()
                .flat_map(|m| [m.member, format_score(m.score).into_bytes()]),
        )
    } else {
        bulk_array(members.into_iter().map(|m| m.member))
    }
}

fn cmd_zrange(ks: &mut Keyspace, args: &[Vec<u8>], reverse: bool) -> RespValue {
    if args.len() < 3 {
        return arity_error(if reverse { "zrevrange" } else { "zrange" });
    }
    let (Some(start), Some(stop)) = (parse_int(&args[1]), parse_int(&args[2])) else {
        return RespValue::error("value is not an integer or out of range");
    };
    let scores = args.get(3).map_or(false, |a| a.eq_ignore_ascii_case(b"WITHSCORES"));

    reply(ks.zsorted(&args[0]), |mut members| {
        if reverse {
            members.reverse();
        }
        let window = rank_window(start, stop, members.len());
        with_scores(members.drain(window).collect(), scores)
    })
}

#[derive(Debug, Clone, Copy)]
pub(super) struct ScoreBound {
    value: f64,
    exclusive: bool,
}

impl ScoreBound {
    pub fn parse(arg: &[u8]) -> Option<Self> {
        let (exclusive, rest) = match arg.first() {
            Some(b'(') => (true, &arg[1..]),
            _ => (false, arg),
        };
        let value = parse_float(rest)?;
        (!value.is_nan()).then_some(Self { value, exclusive })
    }

    fn above_min(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn below_max(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

pub(super) fn range_by_score(ks: &Keyspace, key: &[u8], min: ScoreBound, max: ScoreBound) -> KsResult<Vec<ZMember>> {
    Ok(ks
        .zsorted(key)?
        .into_iter()
        .filter(|m| min.above_min(m.score) && max.below_max(m.score))
        .collect())
}

fn cmd_zrangebyscore(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 3 {
        return arity_error("zrangebyscore");
    }
    let (Some(min), Some(max)) = (ScoreBound::parse(&args[1]), ScoreBound::parse(&args[2])) else {
        return RespValue::error("min or max is not a float");
    };
    let scores = args[3..].iter().any(|a| a.eq_ignore_ascii_case(b"WITHSCORES"));
    reply(range_by_score(ks, &args[0], min, max), |members| with_scores(members, scores))
}

#[derive(Debug, Clone)]
pub(super) enum LexBound {
    NegInf,
    PosInf,
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
}

impl LexBound {
    pub fn parse(arg: &[u8]) -> Option<Self> {
        match arg.first()? {
            b'-' if arg.len() == 1 => Some(LexBound::NegInf),
            b'+' if arg.len() == 1 => Some(LexBound::PosInf),
            b'[' => Some(LexBound::Inclusive(arg[1..].to_vec())),
            b'(' => Some(LexBound::Exclusive(arg[1..].to_vec())),
            _ => None,
        }
    }

    fn above_min(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Inclusive(b) => member >= b.as_slice(),
            LexBound::Exclusive(b) => member > b.as_slice(),
        }
    }

    fn below_max(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Inclusive(b) => member <= b.as_slice(),
            LexBound::Exclusive(b) => member < b.as_slice(),
        }
    }
}

/// Members between `min` and `max` in byte order. Meant for sets whose
/// members all share one score.
pub(super) fn range_by_lex(ks: &Keyspace, key: &[u8], min: &LexBound, max: &LexBound) -> KsResult<Vec<Vec<u8>>> {
    let mut members: Vec<Vec<u8>> = ks
        .zset(key)?
        .map(|z| z.keys().cloned().collect())
        .unwrap_or_default();
    members.sort();
    members.retain(|m| min.above_min(m) && max.below_max(m));
    Ok(members)
}

fn cmd_zrangebylex(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() != 3 {
        return arity_error("zrangebylex");
    }
    let (Some(min), Some(max)) = (LexBound::parse(&args[1]), LexBound::parse(&args[2])) else {
        return RespValue::error("min or max not valid string range item");
    };
    reply(range_by_lex(ks, &args[0], &min, &max), bulk_array)
}

/// Members of a set (score 1) or sorted set at `key`.
fn weighted_members(ks: &Keyspace, key: &[u8]) -> KsResult<HashMap<Vec<u8>, f64>> {
    match ks.key_type(key) {
        None => Ok(HashMap::new()),
        Some(KeyType::Set) => Ok(ks
            .set(key)?
            .into_iter()
            .flatten()
            .map(|m| (m.clone(), 1.0))
            .collect()),
        Some(_) => Ok(ks.zset(key)?.cloned().unwrap_or_default()),
    }
}

fn cmd_zinterstore(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 3 {
        return arity_error("zinterstore");
    }
    let numkeys = match parse_int(&args[1]) {
        Some(n) if n > 0 && args.len() >= 2 + n as usize => n as usize,
        _ => return RespValue::error("at least 1 input key is needed"),
    };
    let keys = &args[2..2 + numkeys];
    let mut weights = vec![1.0; numkeys];
    let mut aggregate = b"SUM".to_vec();

    let mut rest = args[2 + numkeys..].iter();
    while let Some(opt) = rest.next() {
        if opt.eq_ignore_ascii_case(b"WEIGHTS") {
            for w in weights.iter_mut() {
                match rest.next().and_then(|a| parse_float(a)) {
                    Some(v) => *w = v,
                    None => return RespValue::error("weight value is not a float"),
                }
            }
        } else if opt.eq_ignore_ascii_case(b"AGGREGATE") {
            match rest.next() {
                Some(a) => aggregate = a.to_ascii_uppercase(),
                None => return RespValue::error("syntax error"),
            }
        } else {
            return RespValue::error("syntax error");
        }
    }

    let mut sources = Vec::with_capacity(numkeys);
    for key in keys {
        match weighted_members(ks, key) {
            Ok(m) => sources.push(m),
            Err(_) => return RespValue::wrong_type(),
        }
    }

    let mut result = HashMap::new();
    if let Some((first, others)) = sources.split_first() {
        'members: for (member, score) in first {
            let mut total = score * weights[0];
            for (i, other) in others.iter().enumerate() {
                let Some(s) = other.get(member) else {
                    continue 'members;
                };
                let weighted = s * weights[i + 1];
                total = match aggregate.as_slice() {
                    b"MIN" => total.min(weighted),
                    b"MAX" => total.max(weighted),
                    _ => total + weighted,
                };
            }
            result.insert(member.clone(), total);
        }
    }
    let n = result.len();
    ks.zstore(&args[0], result);
    count(n)
}

// --- SORT ---

/// Resolve a SORT `GET`/`BY` pattern for one element. `#` is the element
/// itself; `key*->field` reads a hash field. Plain string keys are not stored
/// here, so other patterns read as nil.
fn lookup_pattern(ks: &Keyspace, pattern: &[u8], element: &[u8]) -> Option<Vec<u8>> {
    if pattern == b"#" {
        return Some(element.to_vec());
    }
    let star = pattern.iter().position(|&b| b == b'*')?;
    let arrow = pattern.windows(2).position(|w| w == b"->");
    let (key_pattern, field) = match arrow {
        Some(a) if a > star => (&pattern[..a], Some(&pattern[a + 2..])),
        _ => (pattern, None),
    };
    let mut key = key_pattern[..star].to_vec();
    key.extend_from_slice(element);
    key.extend_from_slice(&key_pattern[star + 1..]);
    ks.hget(&key, field?).ok().flatten()
}

fn cmd_sort(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.is_empty() {
        return arity_error("sort");
    }
    let mut by: Option<&[u8]> = None;
    let mut window: Option<(i64, i64)> = None;
    let mut gets: Vec<&[u8]> = Vec::new();
    let mut desc = false;
    let mut alpha = false;

    let mut opts = args[1..].iter();
    while let Some(opt) = opts.next() {
        let upper = opt.to_ascii_uppercase();
        match upper.as_slice() {
            b"BY" => match opts.next() {
                Some(p) => by = Some(p.as_slice()),
                None => return RespValue::error("syntax error"),
            },
            b"LIMIT" => match (opts.next().and_then(|a| parse_int(a)), opts.next().and_then(|a| parse_int(a))) {
                (Some(offset), Some(count)) => window = Some((offset, count)),
                _ => return RespValue::error("value is not an integer or out of range"),
            },
            b"GET" => match opts.next() {
                Some(p) => gets.push(p.as_slice()),
                None => return RespValue::error("syntax error"),
            },
            b"ASC" => desc = false,
            b"DESC" => desc = true,
            b"ALPHA" => alpha = true,
            _ => return RespValue::error("syntax error"),
        }
    }

    let key = &args[0];
    let mut elements: Vec<Vec<u8>> = match ks.key_type(key) {
        None => Vec::new(),
        Some(KeyType::Set) => match ks.set(key) {
            Ok(s) => s.into_iter().flatten().cloned().collect(),
            Err(_) => return RespValue::wrong_type(),
        },
        Some(KeyType::ZSet) => match ks.zsorted(key) {
            Ok(m) => m.into_iter().map(|m| m.member).collect(),
            Err(_) => return RespValue::wrong_type(),
        },
        Some(_) => return RespValue::wrong_type(),
    };

    let nosort = by.map_or(false, |p| !p.contains(&b'*'));
    if !nosort {
        let mut keyed = Vec::with_capacity(elements.len());
        for element in elements {
            let weight = match by {
                Some(pattern) => lookup_pattern(ks, pattern, &element),
                None => Some(element.clone()),
            };
            keyed.push((weight.unwrap_or_default(), element));
        }
        if alpha {
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        } else {
            let mut numeric = Vec::with_capacity(keyed.len());
            for (weight, element) in keyed {
                let score = if weight.is_empty() {
                    Some(0.0)
                } else {
                    parse_float(&weight)
                };
                match score {
                    Some(s) => numeric.push((s, element)),
                    None => return RespValue::error("One or more scores can't be converted into double"),
                }
            }
            numeric.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            keyed = numeric.into_iter().map(|(_, e)| (Vec::new(), e)).collect();
        }
        elements = keyed.into_iter().map(|(_, e)| e).collect();
    }
    if desc {
        elements.reverse();
    }

    if let Some((offset, count)) = window {
        let offset = offset.max(0) as usize;
        let count = if count < 0 { usize::MAX } else { count as usize };
        elements = elements.into_iter().skip(offset).take(count).collect();
    }

    if gets.is_empty() {
        return bulk_array(elements);
    }
    let mut out = Vec::with_capacity(elements.len() * gets.len());
    for element in &elements {
        for pattern in &gets {
            out.push(RespValue::BulkString(lookup_pattern(ks, pattern, element)));
        }
    }
    RespValue::Array(Some(out))
}

// --- Scripts ---

fn cmd_eval(ks: &mut Keyspace, args: &[Vec<u8>]) -> RespValue {
    if args.len() < 2 {
        return arity_error("eval");
    }
    let numkeys = match parse_int(&args[1]) {
        Some(n) if n >= 0 && args.len() >= 2 + n as usize => n as usize,
        _ => return RespValue::error("Number of keys can't be greater than number of args"),
    };
    let keys = &args[2..2 + numkeys];
    let argv = &args[2 + numkeys..];

    match Script::lookup(&args[0]) {
        Some(script) => scripts::run(ks, script, keys, argv),
        None => RespValue::error("only the crate's own scripts can be evaluated here"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ks: &mut Keyspace, parts: &[&str]) -> RespValue {
        let args: Vec<Vec<u8>> = parts.iter().map(|p| p.as_bytes().to_vec()).collect();
        execute_command(ks, &args)
    }

    fn strings(reply: RespValue) -> Vec<String> {
        reply
            .into_array()
            .unwrap()
            .into_iter()
            .map(|v| v.into_string().unwrap().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_rank_window() {
        assert_eq!(rank_window(0, -1, 5), 0..5);
        assert_eq!(rank_window(1, 2, 5), 1..3);
        assert_eq!(rank_window(3, 100, 5), 3..5);
        assert_eq!(rank_window(6, 8, 5), 0..0);
        assert_eq!(rank_window(0, -1, 0), 0..0);
    }

    #[test]
    fn test_zrangebyscore_bounds() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]);
        assert_eq!(strings(run(&mut ks, &["ZRANGEBYSCORE", "z", "(1", "+inf"])), vec!["b", "c"]);
        assert_eq!(strings(run(&mut ks, &["ZRANGEBYSCORE", "z", "-inf", "2"])), vec!["a", "b"]);
        assert_eq!(
            strings(run(&mut ks, &["ZRANGEBYSCORE", "z", "2", "2", "WITHSCORES"])),
            vec!["b", "2"]
        );
    }

    #[test]
    fn test_zrangebylex() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["ZADD", "z", "0", "alice", "0", "bob", "0", "carol"]);
        assert_eq!(strings(run(&mut ks, &["ZRANGEBYLEX", "z", "[b", "+"])), vec!["bob", "carol"]);
        assert_eq!(strings(run(&mut ks, &["ZRANGEBYLEX", "z", "-", "(bob"])), vec!["alice"]);
    }

    #[test]
    fn test_zinterstore_weights() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["ZADD", "f", "9", "a", "9", "b"]);
        run(&mut ks, &["ZADD", "o", "2", "a", "1", "b", "5", "c"]);
        let reply = run(&mut ks, &["ZINTERSTORE", "d", "2", "f", "o", "WEIGHTS", "0", "1"]);
        assert_eq!(reply, RespValue::Integer(2));
        assert_eq!(strings(run(&mut ks, &["ZRANGE", "d", "0", "-1"])), vec!["b", "a"]);
    }

    #[test]
    fn test_zinterstore_mixed_sources() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["SADD", "s", "a", "c"]);
        run(&mut ks, &["ZADD", "z", "4", "a", "3", "b", "2", "c"]);
        let reply = run(&mut ks, &["ZINTERSTORE", "d", "2", "s", "z"]);
        assert_eq!(reply, RespValue::Integer(2));
        assert_eq!(strings(run(&mut ks, &["ZRANGE", "d", "0", "-1"])), vec!["c", "a"]);
        assert_eq!(strings(run(&mut ks, &["ZSCORE", "d", "a"])), vec!["5"]);

        run(&mut ks, &["HSET", "h", "f", "v"]);
        assert!(run(&mut ks, &["ZINTERSTORE", "d", "2", "h", "z"]).is_error());
        assert_eq!(run(&mut ks, &["ZINTERSTORE", "d", "2", "missing", "z"]), RespValue::Integer(0));
    }

    #[test]
    fn test_sort_get_patterns() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["ZADD", "idx", "2", "x", "1", "y"]);
        run(&mut ks, &["HSET", "P:x", "Name", "Xavier"]);
        run(&mut ks, &["HSET", "P:y", "Name", "Yann"]);

        let reply = run(&mut ks, &["SORT", "idx", "BY", "nosort", "GET", "#", "GET", "P:*->Name"]);
        assert_eq!(strings(reply), vec!["y", "Yann", "x", "Xavier"]);

        let reply = run(&mut ks, &["SORT", "idx", "BY", "nosort", "LIMIT", "0", "1", "GET", "#", "DESC"]);
        assert_eq!(strings(reply), vec!["x"]);
    }

    #[test]
    fn test_sort_alpha_and_numeric() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["SADD", "s", "10", "9", "100"]);
        assert_eq!(strings(run(&mut ks, &["SORT", "s"])), vec!["9", "10", "100"]);
        assert_eq!(strings(run(&mut ks, &["SORT", "s", "ALPHA"])), vec!["10", "100", "9"]);
    }

    #[test]
    fn test_type_and_wrongtype() {
        let mut ks = Keyspace::default();
        run(&mut ks, &["SADD", "s", "a"]);
        assert_eq!(run(&mut ks, &["TYPE", "s"]), RespValue::SimpleString("set".to_string()));
        assert_eq!(run(&mut ks, &["TYPE", "nope"]), RespValue::SimpleString("none".to_string()));
        assert!(run(&mut ks, &["HGET", "s", "f"]).is_error());
    }
}
