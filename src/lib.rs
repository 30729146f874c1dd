//! redmodel - typed models, secondary indexes and batched transactions on top
//! of a Redis-compatible hash/sorted-set store.
//!
//! # Example
//!
//! ```
//! use redmodel::{
//!     CollectionOptions, Direction, FieldSpec, FieldType, IndexKind, MemoryStore, Model,
//!     Registry, Result, Scalar, Value,
//! };
//!
//! #[derive(Default)]
//! struct Person {
//!     id: String,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Model for Person {
//!     fn schema() -> Vec<FieldSpec> {
//!         vec![
//!             FieldSpec::new("Name", FieldType::Str).indexed(IndexKind::String),
//!             FieldSpec::new("Age", FieldType::Int).indexed(IndexKind::Numeric),
//!         ]
//!     }
//!
//!     fn model_id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn set_model_id(&mut self, id: String) {
//!         self.id = id;
//!     }
//!
//!     fn field(&self, name: &str) -> Result<Option<Value>> {
//!         Ok(match name {
//!             "Name" => Some(self.name.to_value()),
//!             "Age" => Some(self.age.to_value()),
//!             _ => None,
//!         })
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
//!         match name {
//!             "Name" => self.name = String::from_value(value)?,
//!             "Age" => self.age = i64::from_value(value)?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let registry = Registry::new(MemoryStore::new().pool());
//! let people = registry.register::<Person>(CollectionOptions::new().index(true))?;
//!
//! let mut alice = Person { name: "Alice".into(), age: 30, ..Default::default() };
//! people.save(&mut alice).await?;
//!
//! let oldest = people.query().order("Age", Direction::Descending).limit(1).run_one().await?;
//! assert_eq!(oldest.name, "Alice");
//! # Ok::<(), redmodel::Error>(())
//! # }).unwrap();
//! ```

pub mod error;
mod index;
pub mod memory;
pub mod pool;
pub mod query;
mod record;
pub mod registry;
pub mod resp;
pub mod schema;
pub mod scripts;
pub mod transaction;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use pool::{Connection, Connector, Pool, PoolConfig, RedisConnection, RedisConnector};
pub use query::Query;
pub use registry::{new_model_id, Collection, CollectionOptions, Registry};
pub use resp::{Cmd, RespValue};
pub use schema::{CollectionDescriptor, FieldDescriptor, FieldSpec, Model};
pub use scripts::Script;
pub use transaction::{ReplyHandler, Transaction};
pub use types::{Direction, FieldType, FilterOp, IndexKind};
pub use value::{Codec, Scalar, Value};
