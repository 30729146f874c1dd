//! Commands sent to the store and the replies it sends back.

mod command;
mod value;

pub use command::{format_score, Cmd, ToArg};
pub use value::RespValue;
