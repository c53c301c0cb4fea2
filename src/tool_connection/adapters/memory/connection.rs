//! In-memory tool connection handle.

use crate::tool_connection::{
    domain::{
        ConnectionId, ConnectionInfo, ConnectionLifecycle, ConnectionState, ServerName,
        ToolCallOutcome, ToolCatalog, ToolConnectionDomainError,
    },
    ports::{ToolConnection, ToolConnectionError, ToolConnectionResult},
};
use async_trait::async_trait;
use mockable::Clock;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared record of the order in which in-memory connections were closed.
#[derive(Debug, Clone, Default)]
pub struct CloseJournal {
    entries: Arc<RwLock<Vec<ServerName>>>,
}

impl CloseJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, server: ServerName) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(server);
    }

    /// Returns closed server names, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<ServerName> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Tool connection handle backed by a fixed catalog instead of a process.
///
/// `call_tool` answers with a text block echoing the tool name and
/// arguments.
#[derive(Debug)]
pub struct InMemoryToolConnection {
    info: ConnectionInfo,
    catalog: ToolCatalog,
    lifecycle: RwLock<ConnectionLifecycle>,
    close_failure: Option<String>,
    journal: CloseJournal,
}

impl InMemoryToolConnection {
    /// Creates a handle in the `connecting` state, stamped with the time
    /// read from `clock`.
    #[must_use]
    pub fn new(
        server: ServerName,
        catalog: ToolCatalog,
        journal: CloseJournal,
        clock: &impl Clock,
    ) -> Self {
        Self {
            info: ConnectionInfo::new(ConnectionId::new(), server, None, clock.utc()),
            catalog,
            lifecycle: RwLock::new(ConnectionLifecycle::new()),
            close_failure: None,
            journal,
        }
    }

    /// Makes every successful first `close` report `reason` as a failure.
    #[must_use]
    pub fn with_close_failure(mut self, reason: impl Into<String>) -> Self {
        self.close_failure = Some(reason.into());
        self
    }

    /// Completes the simulated handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ToolConnectionDomainError::InvalidLifecycleTransition`]
    /// unless the handle is `connecting`.
    pub fn mark_ready(&self) -> Result<(), ToolConnectionDomainError> {
        self.lifecycle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_ready()
    }

    fn ensure_ready(&self, operation: &'static str) -> ToolConnectionResult<()> {
        let state = self.state();
        if state.can_use_tools() {
            return Ok(());
        }
        Err(ToolConnectionError::InvalidState {
            connection_id: self.info.id(),
            operation,
            state,
        })
    }
}

#[async_trait]
impl ToolConnection for InMemoryToolConnection {
    fn info(&self) -> ConnectionInfo {
        self.info.clone()
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    fn list_tools(&self) -> ToolConnectionResult<ToolCatalog> {
        self.ensure_ready("list tools")?;
        Ok(self.catalog.clone())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> ToolConnectionResult<ToolCallOutcome> {
        self.ensure_ready("call tools")?;
        if !self.catalog.contains(tool_name) {
            return Err(ToolConnectionError::UnknownTool {
                server: self.info.server().clone(),
                tool: tool_name.to_owned(),
            });
        }
        Ok(ToolCallOutcome::text(format!("{tool_name}: {arguments}")))
    }

    async fn close(&self) -> ToolConnectionResult<()> {
        let first_close = self
            .lifecycle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_closed();
        if !first_close {
            return Ok(());
        }

        self.journal.record(self.info.server().clone());
        match &self.close_failure {
            Some(reason) => Err(ToolConnectionError::Close {
                server: self.info.server().clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}
