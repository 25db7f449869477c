//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database the subset is extracted from.
    pub source: ConnectionConfig,

    /// Target database the subset is loaded into.
    pub target: ConnectionConfig,

    /// Table the seed rows are drawn from (e.g. "customers").
    #[serde(default)]
    pub root_table: String,

    /// Column of the root table the seed filter matches on (default: "city").
    #[serde(default = "default_filter_column")]
    pub filter_column: String,

    /// Value or values the filter column must equal.
    #[serde(default)]
    pub city_filter: CityFilter,

    /// Subsetting behavior.
    #[serde(default)]
    pub subset: SubsetConfig,
}

/// MySQL connection settings, used for both source and target.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database (schema) name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Seed filter: a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CityFilter {
    /// `filter_column = value`
    One(String),
    /// `filter_column IN (values...)`
    Many(Vec<String>),
}

impl CityFilter {
    /// The filter values as a slice.
    pub fn values(&self) -> &[String] {
        match self {
            CityFilter::One(v) => std::slice::from_ref(v),
            CityFilter::Many(v) => v,
        }
    }
}

impl Default for CityFilter {
    fn default() -> Self {
        CityFilter::Many(Vec::new())
    }
}

impl From<Vec<String>> for CityFilter {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            CityFilter::One(values.remove(0))
        } else {
            CityFilter::Many(values)
        }
    }
}

/// Subsetting behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetConfig {
    /// Table insert ordering policy (default: topological).
    #[serde(default)]
    pub insert_order: InsertOrder,

    /// Truncate every target table before loading (default: true).
    #[serde(default = "default_true")]
    pub clear_target: bool,

    /// Key rows of tables without a primary key by their full value tuple
    /// instead of failing (default: false).
    #[serde(default)]
    pub allow_keyless_tables: bool,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            insert_order: InsertOrder::default(),
            clear_target: true,
            allow_keyless_tables: false,
        }
    }
}

/// Order in which collected tables are written to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOrder {
    /// Parents before children; cyclic tables load with constraint checks relaxed.
    #[default]
    Topological,

    /// Ascending count of outgoing foreign keys.
    EdgeCount,
}

// Default value functions for serde
fn default_filter_column() -> String {
    "city".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}
