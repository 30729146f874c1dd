//! Command batches.
//!
//! A [`Transaction`] collects commands, each with an optional reply handler,
//! and sends them in one `MULTI`/`EXEC` round trip. Handlers run afterwards in
//! queue order and usually write into an output borrowed when the command was
//! queued.
//!
//! The first error, from queueing or from execution, is the only one reported.
//! Once a queueing error is recorded, later calls queue nothing and `exec`
//! returns that error without contacting the store.

use crate::error::{Error, Result};
use crate::index;
use crate::pool::Pool;
use crate::record;
use crate::registry::{new_model_id, Collection};
use crate::resp::{Cmd, RespValue, ToArg};
use crate::schema::{FieldDescriptor, Model, ID_FIELD};
use crate::scripts::{self, Script};

/// Translates one reply; runs after the whole batch has executed.
pub type ReplyHandler<'a> = Box<dyn FnOnce(RespValue) -> Result<()> + Send + 'a>;

struct Action<'a> {
    cmd: Cmd,
    handler: Option<ReplyHandler<'a>>,
}

pub struct Transaction<'a> {
    pool: Pool,
    actions: Vec<Action<'a>>,
    err: Option<Error>,
}

impl<'a> Transaction<'a> {
    pub fn new(pool: &Pool) -> Self {
        Self {
            pool: pool.clone(),
            actions: Vec::new(),
            err: None,
        }
    }

    /// Queue a raw command.
    pub fn command(&mut self, cmd: Cmd, handler: Option<ReplyHandler<'a>>) {
        if self.err.is_some() {
            return;
        }
        self.actions.push(Action { cmd, handler });
    }

    /// Queue a script invocation.
    pub fn script<A: ToArg>(
        &mut self,
        script: &Script,
        keys: &[String],
        args: impl IntoIterator<Item = A>,
        handler: Option<ReplyHandler<'a>>,
    ) {
        self.command(script.invoke(keys, args), handler);
    }

    /// Record a queueing error. Only the first one is kept.
    pub fn set_error(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn queue_all(&mut self, cmds: impl IntoIterator<Item = Cmd>) {
        for cmd in cmds {
            self.command(cmd, None);
        }
    }

    fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) if self.err.is_none() => Some(v),
            Ok(_) => None,
            Err(e) => {
                self.set_error(e);
                None
            }
        }
    }

    /// Send every queued command in one atomic round trip and run the handlers.
    pub async fn exec(self) -> Result<()> {
        let Transaction { pool, actions, err } = self;
        if let Some(err) = err {
            return Err(err);
        }
        if actions.is_empty() {
            return Ok(());
        }

        let (cmds, handlers): (Vec<Cmd>, Vec<Option<ReplyHandler<'a>>>) =
            actions.into_iter().map(|a| (a.cmd, a.handler)).unzip();
        tracing::debug!(commands = cmds.len(), "Executing transaction");

        let replies = {
            let mut conn = pool.get().await?;
            conn.transaction(&cmds).await
        };
        let replies = replies.map_err(|e| {
            tracing::warn!("Transaction failed: {}", e);
            e
        })?;

        for ((reply, handler), cmd) in replies.into_iter().zip(handlers).zip(&cmds) {
            let reply = reply.into_result().map_err(|e| {
                tracing::warn!("{} failed: {}", cmd.name(), e);
                e
            })?;
            if let Some(handler) = handler {
                handler(reply)?;
            }
        }
        Ok(())
    }

    // --- Record operations ---

    /// Queue a full save of `model`, assigning it a random id if it has none.
    pub fn save<T: Model>(&mut self, collection: &Collection<T>, model: &mut T) {
        if self.err.is_some() {
            return;
        }
        let desc = collection.descriptor();
        let Some(fields) = self.check(record::encode_fields(desc, model, None)) else {
            return;
        };
        if model.model_id().is_empty() {
            model.set_model_id(new_model_id());
        }
        self.queue_all(index::save_commands(desc, model.model_id(), &fields));
    }

    /// Queue a save of only the named fields; other fields and their indexes
    /// are left as they are.
    pub fn save_fields<T: Model>(&mut self, collection: &Collection<T>, model: &T, fields: &[&str]) {
        if self.err.is_some() {
            return;
        }
        let desc = collection.descriptor();
        if model.model_id().is_empty() {
            return self.set_error(Error::MissingId(desc.name().to_string()));
        }
        let Some(fields) = self.check(record::encode_fields(desc, model, Some(fields))) else {
            return;
        };
        self.queue_all(index::save_commands(desc, model.model_id(), &fields));
    }

    /// Queue a lookup of record `id` into `out`. A missing record makes
    /// `exec` return [`Error::NotFound`].
    pub fn find<T: Model>(&mut self, collection: &Collection<T>, id: &str, out: &'a mut T) {
        let desc = collection.shared_descriptor();
        let id = id.to_string();
        let cmd = Cmd::new("HGETALL").arg(desc.model_key(&id));
        self.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                let pairs = reply.into_array()?;
                if pairs.is_empty() {
                    return Err(Error::NotFound {
                        collection: desc.name().to_string(),
                        id,
                    });
                }
                out.set_model_id(id);
                record::scan_pairs(&desc, out, pairs)
            })),
        );
    }

    /// Like [`find`](Self::find) but only reads the named fields.
    pub fn find_fields<T: Model>(
        &mut self,
        collection: &Collection<T>,
        id: &str,
        fields: &[&str],
        out: &'a mut T,
    ) {
        let desc = collection.shared_descriptor();
        let Some(names) = self.check(
            fields
                .iter()
                .map(|f| desc.field(f).map(|d| d.name.clone()))
                .collect::<Result<Vec<_>>>(),
        ) else {
            return;
        };

        let mut cmd = Cmd::new("HMGET").arg(desc.model_key(id)).arg(ID_FIELD);
        for name in &names {
            if let Ok(field) = desc.field(name) {
                cmd = cmd.arg(field.storage_name.as_str());
            }
        }
        let id = id.to_string();
        self.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                let mut values = reply.into_array()?.into_iter();
                let exists = matches!(values.next(), Some(RespValue::BulkString(Some(_))));
                if !exists {
                    return Err(Error::NotFound {
                        collection: desc.name().to_string(),
                        id,
                    });
                }
                out.set_model_id(id);
                let fields: Vec<&FieldDescriptor> =
                    names.iter().filter_map(|n| desc.field(n).ok()).collect();
                record::scan_values(out, &fields, values)
            })),
        );
    }

    /// Queue a fetch of every record of an indexed collection.
    pub fn find_all<T: Model>(&mut self, collection: &Collection<T>, out: &'a mut Vec<T>) {
        let desc = collection.shared_descriptor();
        if self.check(desc.require_indexed()).is_none() {
            return;
        }
        let cmd = scripts::find_models_by_ids_key(&desc.all_key(), &desc, 0, 0, false);
        self.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                *out = record::scan_models(&desc, reply)?;
                Ok(())
            })),
        );
    }

    pub fn exists<T: Model>(&mut self, collection: &Collection<T>, id: &str, out: &'a mut bool) {
        let cmd = Cmd::new("EXISTS").arg(collection.descriptor().model_key(id));
        self.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                *out = reply.into_integer()? > 0;
                Ok(())
            })),
        );
    }

    /// Queue removal of record `id` and all its index entries. `deleted` is set
    /// to whether the record existed; a missing record is not an error.
    pub fn delete<T: Model>(&mut self, collection: &Collection<T>, id: &str, deleted: &'a mut bool) {
        let plan = index::delete_commands(collection.descriptor(), id);
        self.queue_all(plan.cleanup);
        self.command(
            plan.delete,
            Some(Box::new(move |reply: RespValue| {
                *deleted = reply.into_integer()? > 0;
                Ok(())
            })),
        );
        if let Some(cmd) = plan.unindex {
            self.command(cmd, None);
        }
    }

    /// Queue removal of every record of an indexed collection.
    pub fn delete_all<T: Model>(&mut self, collection: &Collection<T>, count: &'a mut usize) {
        let desc = collection.descriptor();
        if self.check(desc.require_indexed()).is_none() {
            return;
        }
        self.delete_models_by_set_ids(&desc.all_key(), collection, count);
    }

    /// Queue removal of the records whose ids are in the set or sorted set at
    /// `ids_key`. The id set itself is kept.
    pub fn delete_models_by_set_ids<T: Model>(
        &mut self,
        ids_key: &str,
        collection: &Collection<T>,
        count: &'a mut usize,
    ) {
        let cmd = scripts::delete_models_by_ids_key(ids_key, collection.descriptor());
        self.command(cmd, Some(usize_handler(count)));
    }

    /// Queue a count of the records in an indexed collection.
    pub fn count<T: Model>(&mut self, collection: &Collection<T>, count: &'a mut usize) {
        let desc = collection.descriptor();
        if self.check(desc.require_indexed()).is_none() {
            return;
        }
        self.command(Cmd::new("SCARD").arg(desc.all_key()), Some(usize_handler(count)));
    }
}

fn usize_handler(out: &mut usize) -> ReplyHandler<'_> {
    Box::new(move |reply: RespValue| {
        *out = reply.into_integer()?.max(0) as usize;
        Ok(())
    })
}
