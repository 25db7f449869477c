//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::error::{Result, SubsetError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;
    validate_connection("target", &config.target)?;

    // Writing into the source would truncate it first
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(SubsetError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    if config.root_table.trim().is_empty() {
        return Err(SubsetError::Config("root_table is required".into()));
    }
    if config.filter_column.trim().is_empty() {
        return Err(SubsetError::Config("filter_column cannot be empty".into()));
    }

    let values = config.city_filter.values();
    if values.is_empty() {
        return Err(SubsetError::Config(
            "city_filter must contain at least one value".into(),
        ));
    }
    if values.iter().any(|v| v.is_empty()) {
        return Err(SubsetError::Config(
            "city_filter values cannot be empty strings".into(),
        ));
    }

    Ok(())
}

fn validate_connection(side: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.host.is_empty() {
        return Err(SubsetError::Config(format!("{}.host is required", side)));
    }
    if conn.database.is_empty() {
        return Err(SubsetError::Config(format!("{}.database is required", side)));
    }
    if conn.user.is_empty() {
        return Err(SubsetError::Config(format!("{}.user is required", side)));
    }
    Ok(())
}
