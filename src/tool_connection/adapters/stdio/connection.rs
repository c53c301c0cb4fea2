//! Tool connection handle owning a stdio subprocess.

use super::channel::{ChannelError, StdioChannel};
use super::process::{Termination, terminate};
use super::protocol::McpMethod;
use crate::tool_connection::{
    domain::{ConnectionInfo, ConnectionLifecycle, ConnectionState, ToolCallOutcome, ToolCatalog},
    ports::{ToolConnection, ToolConnectionError, ToolConnectionResult},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Ready handle to an MCP server running as a child process.
///
/// The child is spawned with kill-on-drop, so a handle dropped without
/// `close` still does not leave the process behind.
#[derive(Debug)]
pub struct StdioToolConnection {
    info: ConnectionInfo,
    catalog: ToolCatalog,
    lifecycle: RwLock<ConnectionLifecycle>,
    channel: StdioChannel,
    child: Mutex<Option<Child>>,
    close_grace: Duration,
}

impl StdioToolConnection {
    pub(crate) fn new(
        info: ConnectionInfo,
        catalog: ToolCatalog,
        lifecycle: ConnectionLifecycle,
        channel: StdioChannel,
        child: Child,
        close_grace: Duration,
    ) -> Self {
        Self {
            info,
            catalog,
            lifecycle: RwLock::new(lifecycle),
            channel,
            child: Mutex::new(Some(child)),
            close_grace,
        }
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

    fn transport_error(&self, reason: impl ToString) -> ToolConnectionError {
        ToolConnectionError::Transport {
            server: self.info.server().clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ToolConnection for StdioToolConnection {
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

        debug!(server = %self.info.server(), tool = tool_name, "calling tool");
        let params = json!({"name": tool_name, "arguments": arguments});
        let result = self
            .channel
            .request(McpMethod::CallTool, Some(params))
            .await
            .map_err(|err| match err {
                ChannelError::Rejected { code, message } => ToolConnectionError::ToolCall {
                    server: self.info.server().clone(),
                    tool: tool_name.to_owned(),
                    code,
                    message,
                },
                other => self.transport_error(other),
            })?;

        serde_json::from_value(result)
            .map_err(|err| self.transport_error(format!("invalid tools/call result: {err}")))
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

        info!(
            server = %self.info.server(),
            connection_id = %self.info.id(),
            "closing tool server"
        );

        // A writer stuck on a full pipe must not stall shutdown.
        if timeout(self.close_grace, self.channel.close_writer())
            .await
            .is_err()
        {
            warn!(server = %self.info.server(), "stdin busy; skipping polite shutdown");
        }

        let child = self.child.lock().await.take();
        let outcome = match child {
            Some(mut child) => terminate(&mut child, self.close_grace).await,
            None => Ok(Termination::Exited),
        };
        self.channel.release_reader();

        match outcome {
            Ok(Termination::Killed) => {
                warn!(server = %self.info.server(), "tool server ignored shutdown and was killed");
                Ok(())
            }
            Ok(termination) => {
                debug!(server = %self.info.server(), %termination, "tool server stopped");
                Ok(())
            }
            Err(err) => Err(ToolConnectionError::Close {
                server: self.info.server().clone(),
                reason: err.to_string(),
            }),
        }
    }
}
