//! Connection pool setup shared by the reader and writer.

use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Result, SubsetError};

/// The subsetting run is a single actor; a small pool covers the reader,
/// one open load transaction and the occasional ping.
const MAX_CONNECTIONS: usize = 4;

fn ssl_opts(ssl_mode: &str) -> Option<SslOpts> {
    match ssl_mode.to_lowercase().as_str() {
        "disable" => {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
            None
        }
        "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
        other => {
            warn!("Unknown ssl_mode '{}', defaulting to prefer", other);
            Some(SslOpts::default().with_danger_accept_invalid_certs(true))
        }
    }
}

/// Open a pool for `config` and verify it with a round-trip.
/// `role` ("source" or "target") is used in log and error context.
pub async fn connect(config: &ConnectionConfig, role: &str) -> Result<Pool> {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(&config.host)
        .tcp_port(config.port)
        .db_name(Some(&config.database))
        .user(Some(&config.user))
        .pass(Some(&config.password))
        // utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"]);

    if let Some(ssl) = ssl_opts(&config.ssl_mode) {
        builder = builder.ssl_opts(ssl);
    }

    let constraints = PoolConstraints::new(1, MAX_CONNECTIONS).unwrap_or_default();
    let opts: Opts = builder
        .pool_opts(PoolOpts::new().with_constraints(constraints))
        .into();
    let pool = Pool::new(opts);

    let mut conn = pool
        .get_conn()
        .await
        .map_err(|e| SubsetError::pool(e, format!("creating MySQL {} pool", role)))?;
    conn.query_drop("SELECT 1")
        .await
        .map_err(|e| SubsetError::pool(e, format!("testing MySQL {} connection", role)))?;
    drop(conn);

    info!("Connected to MySQL {}: {}", role, config.display_url());
    Ok(pool)
}

/// Round-trip a pooled connection.
pub async fn ping(pool: &Pool, role: &str) -> Result<()> {
    let mut conn = pool
        .get_conn()
        .await
        .map_err(|e| SubsetError::pool(e, format!("connecting to MySQL {}", role)))?;
    conn.query_drop("SELECT 1")
        .await
        .map_err(|e| SubsetError::pool(e, format!("pinging MySQL {}", role)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_modes() {
        assert!(ssl_opts("disable").is_none());
        assert!(ssl_opts("DISABLE").is_none());
        assert!(ssl_opts("require").is_some());
        assert!(ssl_opts("verify-full").is_some());
        assert!(ssl_opts("bogus").is_some());
    }
}
