//! In-memory launcher producing [`InMemoryToolConnection`] handles.

use super::{CloseJournal, InMemoryToolConnection};
use crate::tool_connection::{
    domain::{ServerLaunchSpec, ServerName, ToolCatalog, ToolDescriptor},
    ports::{
        HandshakeFailure, ToolConnection, ToolConnectionError, ToolConnectionResult,
        ToolServerLauncher,
    },
};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Scripted launch failure for a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchFault {
    /// The executable cannot be started.
    Spawn,
    /// The process starts but the handshake fails.
    Handshake(HandshakeFailure),
    /// The process starts and never answers, so the launch never completes.
    Unresponsive,
}

/// In-memory tool server launcher.
///
/// Catalogs and faults are keyed by server name. Servers without a catalog
/// launch with an empty one. Handles are stamped with the launcher's clock.
pub struct InMemoryToolServerLauncher<C = DefaultClock>
where
    C: Clock,
{
    state: Arc<RwLock<LauncherState>>,
    journal: CloseJournal,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct LauncherState {
    tool_catalogs: HashMap<ServerName, Vec<ToolDescriptor>>,
    launch_faults: HashMap<ServerName, LaunchFault>,
    close_failures: HashMap<ServerName, String>,
    launched: Vec<Arc<InMemoryToolConnection>>,
}

impl InMemoryToolServerLauncher {
    /// Creates a launcher with no catalogs or faults, using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryToolServerLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for InMemoryToolServerLauncher<C>
where
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            journal: self.journal.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for InMemoryToolServerLauncher<C>
where
    C: Clock,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InMemoryToolServerLauncher")
            .field("state", &self.state)
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}

impl<C> InMemoryToolServerLauncher<C>
where
    C: Clock,
{
    /// Creates a launcher with no catalogs or faults that reads time from
    /// `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::default(),
            journal: CloseJournal::new(),
            clock,
        }
    }

    /// Associates a tool catalog with a server name, replacing any previous
    /// entry.
    pub fn set_tool_catalog(&self, server: ServerName, tools: Vec<ToolDescriptor>) {
        self.write_state().tool_catalogs.insert(server, tools);
    }

    /// Makes launches of `server` fail with `fault`.
    pub fn fail_launch(&self, server: ServerName, fault: LaunchFault) {
        self.write_state().launch_faults.insert(server, fault);
    }

    /// Makes handles for `server` report `reason` when closed.
    pub fn fail_close(&self, server: ServerName, reason: impl Into<String>) {
        self.write_state()
            .close_failures
            .insert(server, reason.into());
    }

    /// Returns the journal recording close order across all handles.
    #[must_use]
    pub fn journal(&self) -> CloseJournal {
        self.journal.clone()
    }

    /// Returns every handle created so far, including ones whose handshake
    /// was made to fail.
    #[must_use]
    pub fn launched(&self) -> Vec<Arc<InMemoryToolConnection>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .launched
            .clone()
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, LauncherState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<C> ToolServerLauncher for InMemoryToolServerLauncher<C>
where
    C: Clock,
{
    async fn launch(
        &self,
        server: &ServerName,
        spec: &ServerLaunchSpec,
    ) -> ToolConnectionResult<Arc<dyn ToolConnection>> {
        let unresponsive = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .launch_faults
            .get(server)
            == Some(&LaunchFault::Unresponsive);
        if unresponsive {
            return std::future::pending().await;
        }

        let (connection, fault) = {
            let mut state = self.write_state();
            let fault = state.launch_faults.get(server).cloned();
            if matches!(fault, Some(LaunchFault::Spawn)) {
                return Err(ToolConnectionError::launch(
                    server.clone(),
                    spec.command(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such executable"),
                ));
            }

            let tools = state.tool_catalogs.get(server).cloned().unwrap_or_default();
            let catalog =
                ToolCatalog::new(tools).map_err(|err| ToolConnectionError::Handshake {
                    server: server.clone(),
                    process_id: None,
                    failure: HandshakeFailure::InvalidCatalog(err),
                })?;

            let mut connection = InMemoryToolConnection::new(
                server.clone(),
                catalog,
                self.journal.clone(),
                self.clock.as_ref(),
            );
            if let Some(reason) = state.close_failures.get(server) {
                connection = connection.with_close_failure(reason.clone());
            }
            let connection = Arc::new(connection);
            state.launched.push(Arc::clone(&connection));
            (connection, fault)
        };

        if let Some(LaunchFault::Handshake(failure)) = fault {
            // A failed handshake leaves nothing running.
            connection.close().await.ok();
            return Err(ToolConnectionError::Handshake {
                server: server.clone(),
                process_id: None,
                failure,
            });
        }

        connection.mark_ready().map_err(|err| ToolConnectionError::Handshake {
            server: server.clone(),
            process_id: None,
            failure: HandshakeFailure::Malformed(err.to_string()),
        })?;
        Ok(connection)
    }
}
