//! Pool of open tool server connections
//!
//! Opens every server an agent is bound to and closes them together.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{info, warn};

use super::{ToolConnection, ToolConnector};
use crate::core::{PilotError, Result, ServerConfig};

/// The set of open tool server connections an agent is bound to
pub struct ServerPool {
    connections: Vec<Box<dyn ToolConnection>>,
}

impl ServerPool {
    /// Open a connection to every named server, in order.
    ///
    /// If any server fails to open, the ones already opened are closed
    /// before the error is returned.
    pub async fn open(
        connector: &dyn ToolConnector,
        server_names: &[String],
        servers: &BTreeMap<String, ServerConfig>,
    ) -> Result<Self> {
        let mut pool = Self {
            connections: Vec::with_capacity(server_names.len()),
        };

        for name in server_names {
            let opened = match servers.get(name) {
                Some(config) => connector.connect(name, config).await,
                None => Err(PilotError::config(format!(
                    "server '{}' is not declared under [servers]",
                    name
                ))),
            };

            match opened {
                Ok(connection) => pool.connections.push(connection),
                Err(e) => {
                    pool.close_all().await;
                    return Err(e);
                }
            }
        }

        info!(servers = ?pool.server_names(), "Tool connections opened");
        Ok(pool)
    }

    /// Build a pool from connections that are already open
    pub fn from_connections(connections: Vec<Box<dyn ToolConnection>>) -> Self {
        Self { connections }
    }

    /// Look up the connection for a server
    pub fn get(&self, server_name: &str) -> Option<&dyn ToolConnection> {
        self.connections
            .iter()
            .find(|c| c.server_name() == server_name)
            .map(|c| c.as_ref())
    }

    /// All connections, in the order they were opened
    pub fn connections(&self) -> impl Iterator<Item = &dyn ToolConnection> {
        self.connections.iter().map(|c| c.as_ref())
    }

    /// Names of the connected servers
    pub fn server_names(&self) -> Vec<&str> {
        self.connections.iter().map(|c| c.server_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close every connection; failures are logged, not returned
    pub async fn close_all(&self) {
        let results = join_all(self.connections.iter().map(|c| c.close())).await;
        for (connection, result) in self.connections.iter().zip(results) {
            if let Err(e) = result {
                warn!(server = %connection.server_name(), "Failed to close tool server: {}", e);
            }
        }
    }
}
