use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("type {0} is already registered")]
    DuplicateType(&'static str),

    #[error("collection name {0:?} is already taken")]
    DuplicateName(String),

    #[error("invalid collection name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid schema for {collection}: {reason}")]
    Schema { collection: String, reason: String },

    #[error("collection {0} is not indexed")]
    NotIndexed(String),

    #[error("{collection} has no field named {field:?}")]
    UnknownField { collection: String, field: String },

    #[error("field {field:?} of {collection} is not indexed")]
    FieldNotIndexed { collection: String, field: String },

    #[error("model of {0} has no id")]
    MissingId(String),

    #[error("model {id:?} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("no {0} matched the query")]
    NoMatch(String),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("cannot encode field {field:?}: {reason}")]
    Encode { field: String, reason: String },

    #[error("cannot decode field {field:?}: {reason}")]
    Decode { field: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out waiting for the store")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis client error: {0}")]
    Redis(redis::RedisError),
}

impl From<redis::RedisError> for Error {
    /// Error replies from the server become [`Error::Store`]; everything else
    /// is a client or connection failure.
    fn from(e: redis::RedisError) -> Self {
        if let Some(code) = e.code() {
            return Error::Store(match e.detail() {
                Some(detail) => format!("{} {}", code, detail),
                None => code.to_string(),
            });
        }
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Redis(e)
        }
    }
}

impl Error {
    /// True for the "record does not exist" outcome, as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::NoMatch(_))
    }

    /// Transport failures leave the connection in an unknown state.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Timeout | Error::Protocol(_) | Error::Redis(_)
        )
    }

    pub(crate) fn encode(field: &str, reason: impl ToString) -> Self {
        Error::Encode {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(field: &str, reason: impl ToString) -> Self {
        Error::Decode {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
