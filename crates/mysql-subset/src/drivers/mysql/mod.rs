//! MySQL driver.
//!
//! - [`MysqlReader`]: catalog introspection and row fetches on the source
//! - [`MysqlWriter`]: clearing and loading the target
//! - [`MysqlDialect`]: statement text
//!
//! Both sides connect through `mysql_async` pools and use the binary
//! protocol with `?` placeholders for every value.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod connection;
mod convert;
mod dialect;
mod reader;
mod writer;

pub use dialect::MysqlDialect;
pub use reader::MysqlReader;
pub use writer::MysqlWriter;
