pub mod error;
pub mod snowflake;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use snowflake::SnowflakeGenerator;
pub use types::Row;
pub use value::Value;
