use crate::error::{Error, Result};

/// One store reply. Replies from Redis are converted into this shape so the
/// in-process store and a real server decode the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    pub fn null() -> Self {
        RespValue::BulkString(None)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        RespValue::Error(format!("ERR {}", msg.into()))
    }

    pub fn wrong_type() -> Self {
        RespValue::Error(
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        )
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        RespValue::BulkString(Some(bytes))
    }

    pub fn from_string(s: String) -> Self {
        RespValue::BulkString(Some(s.into_bytes()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Turn an error reply into `Error::Store`, passing everything else through.
    pub fn into_result(self) -> Result<RespValue> {
        match self {
            RespValue::Error(msg) => Err(Error::Store(msg)),
            other => Ok(other),
        }
    }

    pub fn into_integer(self) -> Result<i64> {
        match self.into_result()? {
            RespValue::Integer(n) => Ok(n),
            RespValue::BulkString(Some(bytes)) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::UnexpectedReply("bulk string is not an integer".into())),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Bulk payload, `None` for a nil reply. Simple strings are accepted too.
    pub fn into_bulk(self) -> Result<Option<Vec<u8>>> {
        match self.into_result()? {
            RespValue::BulkString(data) => Ok(data),
            RespValue::SimpleString(s) => Ok(Some(s.into_bytes())),
            other => Err(unexpected("bulk string", &other)),
        }
    }

    /// Array items; a nil array reads as empty.
    pub fn into_array(self) -> Result<Vec<RespValue>> {
        match self.into_result()? {
            RespValue::Array(items) => Ok(items.unwrap_or_default()),
            other => Err(unexpected("array", &other)),
        }
    }

    pub fn into_string(self) -> Result<Option<String>> {
        match self.into_bulk()? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::UnexpectedReply("reply is not valid utf-8".into())),
            None => Ok(None),
        }
    }
}

fn unexpected(wanted: &str, got: &RespValue) -> Error {
    let kind = match got {
        RespValue::SimpleString(_) => "simple string",
        RespValue::Error(_) => "error",
        RespValue::Integer(_) => "integer",
        RespValue::BulkString(_) => "bulk string",
        RespValue::Array(_) => "array",
    };
    Error::UnexpectedReply(format!("expected {}, got {}", wanted, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_becomes_store_error() {
        let err = RespValue::wrong_type().into_integer().unwrap_err();
        assert!(matches!(err, Error::Store(msg) if msg.starts_with("WRONGTYPE")));
    }

    #[test]
    fn test_integer_from_bulk() {
        assert_eq!(RespValue::from_bytes(b"42".to_vec()).into_integer().unwrap(), 42);
        assert!(RespValue::from_bytes(b"x".to_vec()).into_integer().is_err());
    }

    #[test]
    fn test_nil_array_reads_empty() {
        assert!(RespValue::Array(None).into_array().unwrap().is_empty());
        assert!(matches!(
            RespValue::Integer(3).into_array(),
            Err(Error::UnexpectedReply(_))
        ));
    }
}
