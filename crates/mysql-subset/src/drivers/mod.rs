//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB source and target over `mysql_async`
//! - [`memory`]: in-memory source and target for tests and dry runs

pub mod memory;
pub mod mysql;

pub use memory::{MemoryDatabase, MemorySource, MemoryTarget};
pub use mysql::{MysqlReader, MysqlWriter};
