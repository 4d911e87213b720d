// query_engine/src/sql/mod.rs

pub mod backend;
pub mod compiler;

pub use backend::SqlBackend;
pub use compiler::{SqlCompiler, SqlStatement, SqlValue};
