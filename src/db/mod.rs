//! Database layer - connection pooling, schema model, and the table writer

pub mod pool;
pub mod schema;
pub mod writer;

pub use pool::Pool;
pub use schema::{Schema, SqlType};
pub use writer::{SqlTableWriter, TableWriter};
