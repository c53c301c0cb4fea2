//! Launcher port for starting tool servers.

use super::{ToolConnection, ToolConnectionResult};
use crate::tool_connection::domain::{ServerLaunchSpec, ServerName};
use async_trait::async_trait;
use std::sync::Arc;

/// Starts tool servers and completes their handshake.
#[async_trait]
pub trait ToolServerLauncher: Send + Sync {
    /// Launches the server described by `spec` and returns a `ready` handle.
    ///
    /// # Errors
    ///
    /// Returns [`super::ToolConnectionError::Launch`] when the process cannot
    /// start, or [`super::ToolConnectionError::Handshake`] when it starts but
    /// does not complete the handshake. No subprocess outlives a failed
    /// launch.
    async fn launch(
        &self,
        server: &ServerName,
        spec: &ServerLaunchSpec,
    ) -> ToolConnectionResult<Arc<dyn ToolConnection>>;
}
