use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of value held at a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Hash,
    Set,
    ZSet,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Hash => "hash",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZMember {
    pub score: f64,
    pub member: Vec<u8>,
}

impl ZMember {
    pub fn new(score: f64, member: impl Into<Vec<u8>>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

/// Storage type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Uint,
    Float,
    Bool,
    Str,
    Bytes,
    /// Opaque bytes produced by a [`Codec`](crate::Codec).
    Fallback,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Uint | FieldType::Float)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Fallback)
    }
}

/// Secondary index maintained for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    #[default]
    None,
    /// Sorted set of id -> numeric value.
    Numeric,
    /// Sorted set of id -> 0 or 1.
    Boolean,
    /// Sorted set of `value\0id` members, all scored 0.
    String,
}

impl IndexKind {
    pub fn is_indexed(&self) -> bool {
        !matches!(self, IndexKind::None)
    }

    /// Tag passed to the bulk-delete script for this kind of index.
    pub(crate) fn script_tag(&self) -> &'static str {
        match self {
            IndexKind::String => "s",
            _ => "n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Comparison used by a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl FromStr for FilterOp {
    type Err = Error;

    /// Parse the textual operator (`=`, `!=`, `>`, `>=`, `<`, `<=`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" | "==" => Ok(FilterOp::Equal),
            "!=" => Ok(FilterOp::NotEqual),
            ">" => Ok(FilterOp::Greater),
            ">=" => Ok(FilterOp::GreaterOrEqual),
            "<" => Ok(FilterOp::Less),
            "<=" => Ok(FilterOp::LessOrEqual),
            other => Err(Error::Query(format!("unknown filter operator {:?}", other))),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterOp::Equal => "=",
            FilterOp::NotEqual => "!=",
            FilterOp::Greater => ">",
            FilterOp::GreaterOrEqual => ">=",
            FilterOp::Less => "<",
            FilterOp::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}
