//! Connection lifecycle management
//!
//! One physical connection is opened lazily, validated before reuse, and
//! cached until closed. Every freshly established connection runs the
//! schema-migration hook, which is a no-op once the process-wide flag is set.

use super::{queries::Dialect, schema};
use crate::config::DatabaseConfig;
use crate::{Error, Result};
use rusqlite::Connection;
use tracing::debug;

/// Lazily obtains and caches a database connection for the configured
/// backend. Callers serialize access through the store's lock; the supplier
/// itself holds no lock.
pub struct ConnectionSupplier {
    config: DatabaseConfig,
    connection: Option<Connection>,
}

impl ConnectionSupplier {
    pub fn new(config: DatabaseConfig) -> Self {
        ConnectionSupplier {
            config,
            connection: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Return the cached connection, establishing one if none is live.
    ///
    /// A cached connection that fails the validation query is discarded and
    /// replaced, so a connection lost mid-lifetime heals on the next call.
    pub fn connection(&mut self) -> Result<&mut Connection> {
        if let Some(conn) = self.connection.as_ref() {
            let probe = self.config.validation_query();
            if conn.query_row(probe, [], |_| Ok(())).is_err() {
                debug!("cached connection failed validation, reconnecting");
                self.connection = None;
            }
        }

        if self.connection.is_none() {
            let conn = self.open()?;
            schema::ensure_migrated(&conn, self.config.dialect)?;
            self.connection = Some(conn);
        }

        self.connection
            .as_mut()
            .ok_or_else(|| Error::Connectivity("connection unavailable after connect".into()))
    }

    fn open(&self) -> Result<Connection> {
        match self.config.dialect {
            Dialect::Sqlite => {
                let conn = if self.config.database == ":memory:" {
                    Connection::open_in_memory()
                } else {
                    Connection::open(&self.config.database)
                }
                .map_err(|e| {
                    Error::Connectivity(format!(
                        "failed to open sqlite database {}: {e}",
                        self.config.database
                    ))
                })?;
                debug!(database = %self.config.database, "opened sqlite connection");
                Ok(conn)
            }
            // The pool/driver for server dialects is an external collaborator;
            // this crate bundles only the sqlite driver.
            other => Err(Error::Configuration(format!(
                "no bundled connection backend for dialect {other}"
            ))),
        }
    }

    /// Release the cached connection unconditionally. Tolerates never having
    /// connected; the next `connection()` call re-establishes.
    pub fn close(&mut self) {
        self.connection = None;
    }
}
