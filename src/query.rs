//! Query compilation.
//!
//! A query picks a set of ids to read from (the primary index, a field index,
//! or a temporary sorted set built from one), then fetches the projected
//! fields of every id with a single `SORT ... BY nosort GET ...` command.
//! Temporary keys are created and deleted inside the same transaction.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record;
use crate::registry::{new_model_id, Collection};
use crate::resp::{format_score, Cmd, RespValue};
use crate::schema::{CollectionDescriptor, FieldDescriptor, Model, ID_FIELD, STRING_INDEX_SEPARATOR};
use crate::scripts;
use crate::transaction::Transaction;
use crate::types::{Direction, FilterOp, IndexKind};
use crate::value::Value;

#[derive(Debug, Clone)]
struct Order {
    field: String,
    direction: Direction,
}

#[derive(Debug, Clone)]
struct Filter {
    field: String,
    op: FilterOp,
    value: Value,
}

pub struct Query<T> {
    collection: Collection<T>,
    order: Option<Order>,
    filter: Option<Filter>,
    limit: usize,
    offset: usize,
    includes: Vec<String>,
    excludes: Vec<String>,
    // Misuse of the builder itself, reported when the query is compiled.
    invalid: Option<String>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            order: self.order.clone(),
            filter: self.filter.clone(),
            limit: self.limit,
            offset: self.offset,
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            invalid: self.invalid.clone(),
        }
    }
}

/// Where the compiled fetch reads ids from.
struct IdSource {
    key: String,
    temp_keys: Vec<String>,
}

impl<T: Model> Query<T> {
    pub(crate) fn new(collection: Collection<T>) -> Self {
        Self {
            collection,
            order: None,
            filter: None,
            limit: 0,
            offset: 0,
            includes: Vec::new(),
            excludes: Vec::new(),
            invalid: None,
        }
    }

    fn reject(&mut self, reason: String) {
        if self.invalid.is_none() {
            self.invalid = Some(reason);
        }
    }

    /// Sort by an indexed field.
    pub fn order(mut self, field: &str, direction: Direction) -> Self {
        if self.order.is_some() {
            self.reject("a query can only be ordered by one field".to_string());
        } else {
            self.order = Some(Order {
                field: field.to_string(),
                direction,
            });
        }
        self
    }

    /// Keep only records whose indexed `field` compares to `value` by `op`.
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        if self.filter.is_some() {
            self.reject("a query can only filter on one field".to_string());
        } else {
            self.filter = Some(Filter {
                field: field.to_string(),
                op,
                value: value.into(),
            });
        }
        self
    }

    /// At most `n` records; 0 means no limit.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }

    /// Skip the first `n` records in query order.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Fetch only these fields.
    pub fn include(mut self, fields: &[&str]) -> Self {
        if !self.excludes.is_empty() {
            self.reject("include and exclude cannot be combined".to_string());
        }
        self.includes.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Fetch every field except these.
    pub fn exclude(mut self, fields: &[&str]) -> Self {
        if !self.includes.is_empty() {
            self.reject("include and exclude cannot be combined".to_string());
        }
        self.excludes.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    fn desc(&self) -> &CollectionDescriptor {
        self.collection.descriptor()
    }

    /// Check everything that can be checked without the store.
    fn validate(&self) -> Result<()> {
        let desc = self.desc();
        desc.require_indexed()?;
        if let Some(reason) = &self.invalid {
            return Err(Error::Query(reason.clone()));
        }
        for name in self.includes.iter().chain(&self.excludes) {
            desc.field(name)?;
        }
        if let Some(order) = &self.order {
            desc.field_index_key(&order.field)?;
        }
        if let Some(filter) = &self.filter {
            desc.field_index_key(&filter.field)?;
            check_filter_value(desc.field(&filter.field)?, filter)?;
        }
        Ok(())
    }

    /// Fields fetched for each record, in declaration order.
    fn projection(&self) -> Vec<&FieldDescriptor> {
        let desc = self.desc();
        desc.fields()
            .iter()
            .filter(|f| {
                if !self.includes.is_empty() {
                    self.includes.contains(&f.name)
                } else {
                    !self.excludes.contains(&f.name)
                }
            })
            .collect()
    }

    fn reverse(&self) -> bool {
        matches!(&self.order, Some(o) if o.direction == Direction::Descending)
    }

    /// Queue the extraction an ordering needs, returning the sorted set to
    /// read ids from.
    fn order_source(&self, tx: &mut Transaction<'_>, temp_keys: &mut Vec<String>, order: &Order) -> Result<String> {
        let desc = self.desc();
        let field = desc.field(&order.field)?;
        let index_key = desc.index_key_for(field);
        if field.index != IndexKind::String {
            return Ok(index_key);
        }
        // String members are value\0id; pull out the ids in index order.
        let temp = temp_key(desc);
        tx.command(scripts::extract_ids(IndexKind::String, &index_key, &temp, b"-", b"+"), None);
        temp_keys.push(temp.clone());
        Ok(temp)
    }

    /// Queue whatever builds the id set and say where it ends up.
    fn queue_id_source(&self, tx: &mut Transaction<'_>) -> Result<IdSource> {
        let desc = self.desc();
        let mut temp_keys = Vec::new();

        let key = match (&self.filter, &self.order) {
            (None, None) => desc.all_key(),
            (None, Some(order)) => self.order_source(tx, &mut temp_keys, order)?,
            (Some(filter), order) => {
                let field = desc.field(&filter.field)?;
                let index_key = desc.index_key_for(field);
                let filtered = temp_key(desc);
                temp_keys.push(filtered.clone());
                for (min, max) in filter_ranges(field.index, filter)? {
                    tx.command(scripts::extract_ids(field.index, &index_key, &filtered, &min, &max), None);
                }

                match order {
                    Some(order) if order.field != filter.field => {
                        let ordering = self.order_source(tx, &mut temp_keys, order)?;
                        let combined = temp_key(desc);
                        temp_keys.push(combined.clone());
                        // Membership from the filter, scores from the ordering set.
                        tx.command(
                            Cmd::new("ZINTERSTORE")
                                .arg(&combined)
                                .arg(2usize)
                                .arg(&filtered)
                                .arg(ordering)
                                .arg("WEIGHTS")
                                .arg(0i64)
                                .arg(1i64),
                            None,
                        );
                        combined
                    }
                    _ => filtered,
                }
            }
        };
        Ok(IdSource { key, temp_keys })
    }

    /// `SORT <key> BY nosort [LIMIT offset count] <gets> [DESC]`
    fn sort_cmd(&self, key: &str, gets: Vec<String>) -> Cmd {
        let mut cmd = Cmd::new("SORT").arg(key).arg("BY").arg("nosort");
        if self.limit > 0 || self.offset > 0 {
            let count: i64 = if self.limit > 0 { self.limit as i64 } else { -1 };
            cmd = cmd.arg("LIMIT").arg(self.offset).arg(count);
        }
        for pattern in gets {
            cmd = cmd.arg("GET").arg(pattern);
        }
        if self.reverse() {
            cmd = cmd.arg("DESC");
        }
        cmd
    }

    fn queue_cleanup(tx: &mut Transaction<'_>, source: IdSource) {
        if !source.temp_keys.is_empty() {
            tx.command(Cmd::new("DEL").args(source.temp_keys), None);
        }
    }

    /// Queue the fetch; `sink` receives the decoded records.
    fn queue_fetch<'a, F>(&self, tx: &mut Transaction<'a>, sink: F) -> Result<()>
    where
        F: FnOnce(Vec<T>) -> Result<()> + Send + 'a,
    {
        self.validate()?;
        let desc: Arc<CollectionDescriptor> = self.collection.shared_descriptor();
        let source = self.queue_id_source(tx)?;

        let projected: Vec<String> = self.projection().iter().map(|f| f.name.clone()).collect();
        let mut gets = vec!["#".to_string(), format!("{}:*->{}", desc.name(), ID_FIELD)];
        for name in &projected {
            gets.push(desc.get_pattern(desc.field(name)?));
        }
        let cmd = self.sort_cmd(&source.key, gets);

        tx.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                let fields: Vec<&FieldDescriptor> =
                    projected.iter().filter_map(|n| desc.field(n).ok()).collect();
                let stride = 2 + fields.len();
                let items = reply.into_array()?;
                let mut models = Vec::with_capacity(items.len() / stride);
                let mut items = items.into_iter();
                loop {
                    let row: Vec<RespValue> = items.by_ref().take(stride).collect();
                    if row.len() < stride {
                        break;
                    }
                    let mut row = row.into_iter();
                    let id = row.next().map(|v| v.into_string()).transpose()?.flatten();
                    let stored = row.next().map(|v| v.into_bulk()).transpose()?.flatten();
                    // An id left in an index without its hash is skipped.
                    let (Some(id), Some(_)) = (id, stored) else {
                        continue;
                    };
                    let mut model = T::default();
                    model.set_model_id(id);
                    record::scan_values(&mut model, &fields, row)?;
                    models.push(model);
                }
                sink(models)
            })),
        );
        Self::queue_cleanup(tx, source);
        Ok(())
    }

    fn queue_ids<'a>(&self, tx: &mut Transaction<'a>, out: &'a mut Vec<String>) -> Result<()> {
        self.validate()?;
        let source = self.queue_id_source(tx)?;
        let cmd = self.sort_cmd(&source.key, vec!["#".to_string()]);
        tx.command(
            cmd,
            Some(Box::new(move |reply: RespValue| {
                let mut ids = Vec::new();
                for item in reply.into_array()? {
                    if let Some(id) = item.into_string()? {
                        ids.push(id);
                    }
                }
                *out = ids;
                Ok(())
            })),
        );
        Self::queue_cleanup(tx, source);
        Ok(())
    }

    fn queue_count<'a>(&self, tx: &mut Transaction<'a>, out: &'a mut usize) -> Result<()> {
        self.validate()?;
        let (limit, offset) = (self.limit, self.offset);
        let windowed = move |total: usize| {
            let remaining = total.saturating_sub(offset);
            if limit > 0 {
                remaining.min(limit)
            } else {
                remaining
            }
        };

        let desc = self.desc();
        if self.filter.is_none() {
            tx.command(
                Cmd::new("SCARD").arg(desc.all_key()),
                Some(Box::new(move |reply: RespValue| {
                    *out = windowed(reply.into_integer()?.max(0) as usize);
                    Ok(())
                })),
            );
            return Ok(());
        }

        // Ordering does not change a count; only the filter matters.
        let unordered = Query {
            order: None,
            ..self.clone()
        };
        let source = unordered.queue_id_source(tx)?;
        tx.command(
            Cmd::new("ZCARD").arg(&source.key),
            Some(Box::new(move |reply: RespValue| {
                *out = windowed(reply.into_integer()?.max(0) as usize);
                Ok(())
            })),
        );
        Self::queue_cleanup(tx, source);
        Ok(())
    }

    /// Run the query and return the matching records.
    pub async fn run(&self) -> Result<Vec<T>> {
        let mut models = Vec::new();
        let mut tx = self.collection.pool().transaction();
        tx.query(self, &mut models);
        tx.exec().await?;
        Ok(models)
    }

    /// First matching record, or [`Error::NoMatch`].
    pub async fn run_one(&self) -> Result<T> {
        let mut model = T::default();
        let mut tx = self.collection.pool().transaction();
        tx.query_one(self, &mut model);
        tx.exec().await?;
        Ok(model)
    }

    /// Ids of the matching records, in query order.
    pub async fn ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut tx = self.collection.pool().transaction();
        tx.query_ids(self, &mut ids);
        tx.exec().await?;
        Ok(ids)
    }

    /// Number of records the query would return.
    pub async fn count(&self) -> Result<usize> {
        let mut count = 0;
        let mut tx = self.collection.pool().transaction();
        tx.query_count(self, &mut count);
        tx.exec().await?;
        Ok(count)
    }
}

impl<'a> Transaction<'a> {
    pub fn query<T: Model>(&mut self, query: &Query<T>, out: &'a mut Vec<T>) {
        if self.error().is_some() {
            return;
        }
        let sink = move |models: Vec<T>| {
            *out = models;
            Ok(())
        };
        if let Err(e) = query.queue_fetch(self, sink) {
            self.set_error(e);
        }
    }

    /// Queue a query for its first match. No match makes `exec` return
    /// [`Error::NoMatch`].
    pub fn query_one<T: Model>(&mut self, query: &Query<T>, out: &'a mut T) {
        if self.error().is_some() {
            return;
        }
        let collection = query.desc().name().to_string();
        let sink = move |models: Vec<T>| match models.into_iter().next() {
            Some(model) => {
                *out = model;
                Ok(())
            }
            None => Err(Error::NoMatch(collection)),
        };
        if let Err(e) = query.clone().limit(1).queue_fetch(self, sink) {
            self.set_error(e);
        }
    }

    pub fn query_ids<T: Model>(&mut self, query: &Query<T>, out: &'a mut Vec<String>) {
        if self.error().is_some() {
            return;
        }
        if let Err(e) = query.queue_ids(self, out) {
            self.set_error(e);
        }
    }

    pub fn query_count<T: Model>(&mut self, query: &Query<T>, out: &'a mut usize) {
        if self.error().is_some() {
            return;
        }
        if let Err(e) = query.queue_count(self, out) {
            self.set_error(e);
        }
    }
}

fn temp_key(desc: &CollectionDescriptor) -> String {
    format!("tmp:{}:{}", desc.name(), new_model_id())
}

fn check_filter_value(field: &FieldDescriptor, filter: &Filter) -> Result<()> {
    let ok = match (field.index, &filter.value) {
        (IndexKind::Numeric, Value::Int(_) | Value::Uint(_)) => true,
        (IndexKind::Numeric, Value::Float(f)) => !f.is_nan(),
        (IndexKind::Boolean, Value::Bool(_)) => true,
        (IndexKind::String, Value::Str(s)) => !s.as_bytes().contains(&STRING_INDEX_SEPARATOR),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Query(format!(
            "cannot filter {:?} {} {:?}",
            field.name, filter.op, filter.value
        )))
    }
}

/// Index ranges (in ZRANGEBYSCORE or ZRANGEBYLEX syntax) matching the filter.
fn filter_ranges(kind: IndexKind, filter: &Filter) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    if kind == IndexKind::String {
        let Value::Str(s) = &filter.value else {
            return Err(Error::Query(format!("{:?} needs a string value", filter.field)));
        };
        return Ok(string_ranges(filter.op, s.as_bytes()));
    }

    let score = filter
        .value
        .score()
        .ok_or_else(|| Error::Query(format!("{:?} needs a numeric value", filter.field)))?;
    let v = format_score(score);
    let inclusive = || v.clone().into_bytes();
    let exclusive = || format!("({}", v).into_bytes();
    let ranges = match filter.op {
        FilterOp::Equal => vec![(inclusive(), inclusive())],
        FilterOp::NotEqual => vec![
            (b"-inf".to_vec(), exclusive()),
            (exclusive(), b"+inf".to_vec()),
        ],
        FilterOp::Greater => vec![(exclusive(), b"+inf".to_vec())],
        FilterOp::GreaterOrEqual => vec![(inclusive(), b"+inf".to_vec())],
        FilterOp::Less => vec![(b"-inf".to_vec(), exclusive())],
        FilterOp::LessOrEqual => vec![(b"-inf".to_vec(), inclusive())],
    };
    Ok(ranges)
}

/// Members for value `v` are `v\0id`, so they all sort in `[v\0, v\x01)`.
fn string_ranges(op: FilterOp, v: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let bound = |prefix: u8, suffix: u8| {
        let mut b = Vec::with_capacity(v.len() + 2);
        b.push(prefix);
        b.extend_from_slice(v);
        b.push(suffix);
        b
    };
    let (min, max) = (b"-".to_vec(), b"+".to_vec());
    match op {
        FilterOp::Equal => vec![(bound(b'[', 0), bound(b'(', 1))],
        FilterOp::NotEqual => vec![(min, bound(b'(', 0)), (bound(b'[', 1), max)],
        FilterOp::Greater => vec![(bound(b'[', 1), max)],
        FilterOp::GreaterOrEqual => vec![(bound(b'[', 0), max)],
        FilterOp::Less => vec![(min, bound(b'(', 0))],
        FilterOp::LessOrEqual => vec![(min, bound(b'(', 1))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(field: &str, op: FilterOp, value: Value) -> Filter {
        Filter {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_numeric_ranges() {
        let ranges = filter_ranges(IndexKind::Numeric, &filter("Age", FilterOp::Greater, Value::Int(30))).unwrap();
        assert_eq!(ranges, vec![(b"(30".to_vec(), b"+inf".to_vec())]);

        let ranges = filter_ranges(IndexKind::Numeric, &filter("Age", FilterOp::NotEqual, Value::Float(1.5))).unwrap();
        assert_eq!(
            ranges,
            vec![
                (b"-inf".to_vec(), b"(1.5".to_vec()),
                (b"(1.5".to_vec(), b"+inf".to_vec()),
            ]
        );
    }

    #[test]
    fn test_boolean_range_uses_score() {
        let ranges = filter_ranges(IndexKind::Boolean, &filter("Active", FilterOp::Equal, Value::Bool(true))).unwrap();
        assert_eq!(ranges, vec![(b"1".to_vec(), b"1".to_vec())]);
    }

    #[test]
    fn test_string_ranges() {
        assert_eq!(
            string_ranges(FilterOp::Equal, b"bob"),
            vec![(b"[bob\0".to_vec(), b"(bob\x01".to_vec())]
        );
        assert_eq!(
            string_ranges(FilterOp::Less, b"bob"),
            vec![(b"-".to_vec(), b"(bob\0".to_vec())]
        );
        assert_eq!(
            string_ranges(FilterOp::Greater, b"bob"),
            vec![(b"[bob\x01".to_vec(), b"+".to_vec())]
        );
    }

    #[test]
    fn test_filter_value_must_fit_index() {
        let field = FieldDescriptor {
            name: "Age".to_string(),
            storage_name: "Age".to_string(),
            ty: crate::types::FieldType::Int,
            index: IndexKind::Numeric,
        };
        assert!(check_filter_value(&field, &filter("Age", FilterOp::Equal, Value::Int(1))).is_ok());
        assert!(check_filter_value(&field, &filter("Age", FilterOp::Equal, Value::Str("1".into()))).is_err());
        assert!(check_filter_value(&field, &filter("Age", FilterOp::Equal, Value::Float(f64::NAN))).is_err());
    }
}
