//! In-process store speaking the same command set the crate sends to a real
//! server. Used by tests and examples; scripts are recognised by their source
//! and run natively.

mod commands;
mod scripts;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::pool::{Connection, Connector, Pool, PoolConfig};
use crate::resp::{Cmd, RespValue};
use crate::types::{KeyType, ZMember};

#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    ZSet(HashMap<Vec<u8>, f64>),
}

impl Entry {
    fn key_type(&self) -> KeyType {
        match self {
            Entry::Hash(_) => KeyType::Hash,
            Entry::Set(_) => KeyType::Set,
            Entry::ZSet(_) => KeyType::ZSet,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(h) => h.is_empty(),
            Entry::Set(s) => s.is_empty(),
            Entry::ZSet(z) => z.is_empty(),
        }
    }
}

/// Operation against a key holding the wrong kind of value.
#[derive(Debug)]
pub(crate) struct WrongType;

type KsResult<T> = std::result::Result<T, WrongType>;

#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Keyspace {
    pub fn key_type(&self, key: &[u8]) -> Option<KeyType> {
        self.entries.get(key).map(Entry::key_type)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn del(&mut self, key: &[u8]) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    fn drop_if_empty(&mut self, key: &[u8]) {
        if self.entries.get(key).map_or(false, Entry::is_empty) {
            self.entries.remove(key);
        }
    }

    // --- Hashes ---

    pub fn hash(&self, key: &[u8]) -> KsResult<Option<&BTreeMap<Vec<u8>, Vec<u8>>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(WrongType),
        }
    }

    fn hash_mut(&mut self, key: &[u8]) -> KsResult<&mut BTreeMap<Vec<u8>, Vec<u8>>> {
        match self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(h) => Ok(h),
            _ => Err(WrongType),
        }
    }

    /// Returns the number of fields that were new.
    pub fn hset(&mut self, key: &[u8], pairs: &[(Vec<u8>, Vec<u8>)]) -> KsResult<usize> {
        let hash = self.hash_mut(key)?;
        let mut added = 0;
        for (field, value) in pairs {
            if hash.insert(field.clone(), value.clone()).is_none() {
                added += 1;
            }
        }
        self.drop_if_empty(key);
        Ok(added)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> KsResult<Option<Vec<u8>>> {
        Ok(self.hash(key)?.and_then(|h| h.get(field).cloned()))
    }

    pub fn hgetall(&self, key: &[u8]) -> KsResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .hash(key)?
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>]) -> KsResult<usize> {
        if self.hash(key)?.is_none() {
            return Ok(0);
        }
        let hash = self.hash_mut(key)?;
        let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
        self.drop_if_empty(key);
        Ok(removed)
    }

    // --- Sets ---

    pub fn set(&self, key: &[u8]) -> KsResult<Option<&BTreeSet<Vec<u8>>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Set(s)) => Ok(Some(s)),
            Some(_) => Err(WrongType),
        }
    }

    pub fn sadd(&mut self, key: &[u8], members: &[Vec<u8>]) -> KsResult<usize> {
        let set = match self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(s) => s,
            _ => return Err(WrongType),
        };
        let added = members.iter().filter(|m| set.insert((*m).clone())).count();
        self.drop_if_empty(key);
        Ok(added)
    }

    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>]) -> KsResult<usize> {
        let removed = match self.entries.get_mut(key) {
            None => return Ok(0),
            Some(Entry::Set(s)) => members.iter().filter(|m| s.remove(*m)).count(),
            Some(_) => return Err(WrongType),
        };
        self.drop_if_empty(key);
        Ok(removed)
    }

    // --- Sorted sets ---

    pub fn zset(&self, key: &[u8]) -> KsResult<Option<&HashMap<Vec<u8>, f64>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::ZSet(z)) => Ok(Some(z)),
            Some(_) => Err(WrongType),
        }
    }

    pub fn zadd(&mut self, key: &[u8], members: &[ZMember]) -> KsResult<usize> {
        let zset = match self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::ZSet(HashMap::new()))
        {
            Entry::ZSet(z) => z,
            _ => return Err(WrongType),
        };
        let added = members
            .iter()
            .filter(|m| zset.insert(m.member.clone(), m.score).is_none())
            .count();
        self.drop_if_empty(key);
        Ok(added)
    }

    pub fn zrem(&mut self, key: &[u8], members: &[Vec<u8>]) -> KsResult<usize> {
        let removed = match self.entries.get_mut(key) {
            None => return Ok(0),
            Some(Entry::ZSet(z)) => members.iter().filter(|m| z.remove(*m).is_some()).count(),
            Some(_) => return Err(WrongType),
        };
        self.drop_if_empty(key);
        Ok(removed)
    }

    /// Members ordered by score, then by member bytes.
    pub fn zsorted(&self, key: &[u8]) -> KsResult<Vec<ZMember>> {
        let mut members: Vec<ZMember> = self
            .zset(key)?
            .map(|z| z.iter().map(|(m, s)| ZMember::new(*s, m.clone())).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.member.cmp(&b.member)));
        Ok(members)
    }

    /// Replace `key` with `members`; an empty result removes the key.
    pub fn zstore(&mut self, key: &[u8], members: HashMap<Vec<u8>, f64>) {
        if members.is_empty() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_vec(), Entry::ZSet(members));
        }
    }
}

/// Shared in-memory keyspace. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool whose connections all talk to this store.
    pub fn pool(&self) -> Pool {
        Pool::with_connector(self.clone(), PoolConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, Keyspace> {
        self.keyspace.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one command outside any connection.
    pub fn execute(&self, cmd: &Cmd) -> RespValue {
        commands::execute_command(&mut self.lock(), cmd.as_args())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lock().exists(key.as_bytes())
    }

    pub fn key_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Every key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .entries
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect();
        keys.sort();
        keys
    }

    pub fn flush(&self) {
        self.lock().flush();
    }
}

#[async_trait]
impl Connector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection {
            store: self.clone(),
        }))
    }
}

pub struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<RespValue>> {
        Ok(self.store.run_pipeline(cmds))
    }
}

impl MemoryStore {
    /// The lock is held for the whole pipeline, so MULTI/EXEC blocks run
    /// without interleaving.
    fn run_pipeline(&self, cmds: &[Cmd]) -> Vec<RespValue> {
        let mut ks = self.lock();
        let mut replies = Vec::with_capacity(cmds.len());
        let mut queued: Option<Vec<&Cmd>> = None;
        let mut aborted = false;

        for cmd in cmds {
            let name = cmd.name();
            let reply = match (name.as_str(), queued.as_mut()) {
                ("MULTI", None) => {
                    queued = Some(Vec::new());
                    aborted = false;
                    RespValue::ok()
                }
                ("MULTI", Some(_)) => RespValue::error("MULTI calls can not be nested"),
                ("EXEC", None) => RespValue::error("EXEC without MULTI"),
                ("EXEC", Some(_)) => {
                    let batch = queued.take().unwrap_or_default();
                    if aborted {
                        RespValue::Error(
                            "EXECABORT Transaction discarded because of previous errors.".to_string(),
                        )
                    } else {
                        RespValue::Array(Some(
                            batch
                                .into_iter()
                                .map(|c| commands::execute_command(&mut ks, c.as_args()))
                                .collect(),
                        ))
                    }
                }
                (_, Some(batch)) => {
                    if commands::is_known(&name) {
                        batch.push(cmd);
                        RespValue::SimpleString("QUEUED".to_string())
                    } else {
                        aborted = true;
                        RespValue::error(format!("unknown command '{}'", name))
                    }
                }
                (_, None) => commands::execute_command(&mut ks, cmd.as_args()),
            };
            replies.push(reply);
        }
        replies
    }
}
