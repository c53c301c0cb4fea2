//! Ordered shutdown of every tool connection opened during an assembly.

use crate::tool_connection::{
    domain::{ConnectionId, ServerName},
    ports::{ToolConnection, ToolConnectionError},
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised when registering a connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleStackError {
    /// The handle is already held by the stack.
    #[error("tool connection {connection_id} ({server}) is already registered")]
    DuplicateRegistration {
        /// Identifier of the rejected handle.
        connection_id: ConnectionId,
        /// Server the handle belongs to.
        server: ServerName,
    },
}

/// A handle that failed to close during [`LifecycleStack::close_all`].
#[derive(Debug, Clone, Error)]
#[error("tool connection {connection_id} ({server}): {error}")]
pub struct CloseFailure {
    /// Identifier of the handle.
    pub connection_id: ConnectionId,
    /// Server the handle belongs to.
    pub server: ServerName,
    /// Error returned by the handle's `close`.
    #[source]
    pub error: ToolConnectionError,
}

/// Aggregate of every close failure from one shutdown.
#[derive(Debug, Clone, Error)]
#[error("{} tool connection(s) failed to close: {}", .failures.len(), failed_servers(.failures))]
pub struct ShutdownError {
    failures: Vec<CloseFailure>,
}

impl ShutdownError {
    /// Wraps `failures`, returning `None` when there are none.
    #[must_use]
    pub fn from_failures(failures: Vec<CloseFailure>) -> Option<Self> {
        (!failures.is_empty()).then_some(Self { failures })
    }

    /// Returns the individual failures in close order.
    #[must_use]
    pub fn failures(&self) -> &[CloseFailure] {
        &self.failures
    }

    /// Consumes the error and returns the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<CloseFailure> {
        self.failures
    }
}

fn failed_servers(failures: &[CloseFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.server.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Acquisition-ordered set of tool connections released last-in, first-out.
///
/// The stack holds shared registrations for shutdown purposes only; release
/// logic lives on each handle. Mutation needs `&mut self`, so concurrent use
/// requires external synchronisation.
#[derive(Default)]
pub struct LifecycleStack {
    entries: Vec<Arc<dyn ToolConnection>>,
}

impl LifecycleStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle for later shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleStackError::DuplicateRegistration`] when a handle
    /// with the same [`ConnectionId`] is already registered. The stack is left
    /// unchanged.
    pub fn register(
        &mut self,
        connection: Arc<dyn ToolConnection>,
    ) -> Result<(), LifecycleStackError> {
        let info = connection.info();
        if self.contains(info.id()) {
            return Err(LifecycleStackError::DuplicateRegistration {
                connection_id: info.id(),
                server: info.server().clone(),
            });
        }

        debug!(
            connection_id = %info.id(),
            server = %info.server(),
            position = self.entries.len(),
            "registered tool connection"
        );
        self.entries.push(connection);
        Ok(())
    }

    /// Returns whether a handle with `connection_id` is registered.
    #[must_use]
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.info().id() == connection_id)
    }

    /// Returns registered identifiers in acquisition order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.entries.iter().map(|entry| entry.info().id()).collect()
    }

    /// Returns the number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no handles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closes every registered handle in reverse registration order.
    ///
    /// A failing close is recorded and the remaining handles are still
    /// closed. The stack is drained, so a second call closes nothing and
    /// returns no failures.
    pub async fn close_all(&mut self) -> Vec<CloseFailure> {
        let mut failures = Vec::new();
        if self.entries.is_empty() {
            return failures;
        }

        info!(count = self.entries.len(), "closing tool connections");
        while let Some(connection) = self.entries.pop() {
            let info = connection.info();
            match connection.close().await {
                Ok(()) => debug!(
                    connection_id = %info.id(),
                    server = %info.server(),
                    "closed tool connection"
                ),
                Err(error) => {
                    warn!(
                        connection_id = %info.id(),
                        server = %info.server(),
                        %error,
                        "tool connection failed to close"
                    );
                    failures.push(CloseFailure {
                        connection_id: info.id(),
                        server: info.server().clone(),
                        error,
                    });
                }
            }
        }
        failures
    }

    /// Consumes the stack, closing every handle.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] carrying every close failure once all
    /// handles have had a close attempt.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        let failures = self.close_all().await;
        ShutdownError::from_failures(failures).map_or(Ok(()), Err)
    }
}

impl fmt::Debug for LifecycleStack {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LifecycleStack")
            .field("connections", &self.connection_ids())
            .finish()
    }
}

impl Drop for LifecycleStack {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                count = self.entries.len(),
                "lifecycle stack dropped with open tool connections; relying on kill-on-drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_connection::{
        domain::{ConnectionInfo, ConnectionState},
        ports::MockToolConnection,
    };
    use chrono::Utc;
    use std::sync::Mutex;

    type CloseLog = Arc<Mutex<Vec<String>>>;

    fn mock_connection(name: &str, log: &CloseLog, fail: bool) -> Arc<dyn ToolConnection> {
        let info = ConnectionInfo::new(
            ConnectionId::new(),
            ServerName::new(name).expect("valid server name"),
            None,
            Utc::now(),
        );
        let server = info.server().clone();
        let mut mock = MockToolConnection::new();
        mock.expect_info().return_const(info);
        mock.expect_state().return_const(ConnectionState::Ready);
        let close_log = Arc::clone(log);
        mock.expect_close().times(1).returning(move || {
            close_log
                .lock()
                .expect("close log lock")
                .push(server.as_str().to_owned());
            if fail {
                return Err(ToolConnectionError::Close {
                    server: server.clone(),
                    reason: "process did not exit".to_owned(),
                });
            }
            Ok(())
        });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn close_all_releases_in_reverse_order() {
        let log = CloseLog::default();
        let mut stack = LifecycleStack::new();
        for name in ["alpha", "bravo", "charlie"] {
            stack
                .register(mock_connection(name, &log, false))
                .expect("registration should succeed");
        }

        let failures = stack.close_all().await;

        assert!(failures.is_empty());
        assert_eq!(
            *log.lock().expect("close log lock"),
            ["charlie", "bravo", "alpha"]
        );
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn failing_close_does_not_stop_iteration() {
        let log = CloseLog::default();
        let mut stack = LifecycleStack::new();
        stack
            .register(mock_connection("alpha", &log, false))
            .expect("registration should succeed");
        stack
            .register(mock_connection("bravo", &log, true))
            .expect("registration should succeed");
        stack
            .register(mock_connection("charlie", &log, false))
            .expect("registration should succeed");

        let failures = stack.close_all().await;

        assert_eq!(failures.len(), 1);
        let failure = failures.first().expect("one failure");
        assert_eq!(failure.server.as_str(), "bravo");
        assert_eq!(
            *log.lock().expect("close log lock"),
            ["charlie", "bravo", "alpha"]
        );
    }

    #[tokio::test]
    async fn second_close_all_is_a_no_op() {
        let log = CloseLog::default();
        let mut stack = LifecycleStack::new();
        stack
            .register(mock_connection("alpha", &log, false))
            .expect("registration should succeed");

        assert!(stack.close_all().await.is_empty());
        assert!(stack.close_all().await.is_empty());
        assert_eq!(log.lock().expect("close log lock").len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected_without_side_effects() {
        let log = CloseLog::default();
        let connection = mock_connection("alpha", &log, false);
        let mut stack = LifecycleStack::new();
        stack
            .register(Arc::clone(&connection))
            .expect("first registration should succeed");

        let result = stack.register(Arc::clone(&connection));

        assert!(matches!(
            result,
            Err(LifecycleStackError::DuplicateRegistration { .. })
        ));
        assert_eq!(stack.len(), 1);

        // Satisfy the single close expectation on the mock.
        let failures = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build")
            .block_on(stack.close_all());
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn shutdown_aggregates_failures() {
        let log = CloseLog::default();
        let mut stack = LifecycleStack::new();
        stack
            .register(mock_connection("alpha", &log, true))
            .expect("registration should succeed");
        stack
            .register(mock_connection("bravo", &log, true))
            .expect("registration should succeed");

        let error = stack
            .shutdown()
            .await
            .expect_err("shutdown should report failures");

        assert_eq!(error.failures().len(), 2);
        assert_eq!(
            error.to_string(),
            "2 tool connection(s) failed to close: bravo, alpha"
        );
    }

    #[tokio::test]
    async fn empty_stack_shuts_down_cleanly() {
        assert!(LifecycleStack::new().shutdown().await.is_ok());
    }
}
