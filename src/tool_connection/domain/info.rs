//! Descriptive snapshot of a live tool connection.

use super::{ConnectionId, ServerName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and provenance of a tool connection handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    id: ConnectionId,
    server: ServerName,
    process_id: Option<u32>,
    ready_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Creates connection info for a freshly launched handle.
    #[must_use]
    pub const fn new(
        id: ConnectionId,
        server: ServerName,
        process_id: Option<u32>,
        ready_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            server,
            process_id,
            ready_at,
        }
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the server name.
    #[must_use]
    pub const fn server(&self) -> &ServerName {
        &self.server
    }

    /// Returns the OS process id, when the connection is process-backed.
    #[must_use]
    pub const fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Returns when the handshake completed.
    #[must_use]
    pub const fn ready_at(&self) -> DateTime<Utc> {
        self.ready_at
    }
}
