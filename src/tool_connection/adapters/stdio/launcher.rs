//! Launcher that spawns MCP servers and performs the stdio handshake.

use super::channel::{ChannelError, StdioChannel};
use super::connection::StdioToolConnection;
use super::process::terminate;
use super::protocol::{ListToolsResult, McpMethod, PROTOCOL_VERSION};
use crate::tool_connection::{
    domain::{
        ConnectionId, ConnectionInfo, ConnectionLifecycle, ServerLaunchSpec, ServerName,
        ToolCatalog, ToolDescriptor,
    },
    ports::{
        HandshakeFailure, ToolConnection, ToolConnectionError, ToolConnectionResult,
        ToolServerLauncher,
    },
};
use async_trait::async_trait;
use mockable::Clock;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default bound on the whole handshake.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait between shutdown escalation steps.
const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on `tools/list` pages fetched during one handshake.
const MAX_TOOL_PAGES: usize = 64;

/// Timing settings for stdio launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdioLauncherSettings {
    handshake_timeout: Duration,
    close_grace: Duration,
}

impl StdioLauncherSettings {
    /// Creates settings from explicit durations.
    #[must_use]
    pub const fn new(handshake_timeout: Duration, close_grace: Duration) -> Self {
        Self {
            handshake_timeout,
            close_grace,
        }
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Returns the grace period between shutdown escalation steps.
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        self.close_grace
    }
}

impl Default for StdioLauncherSettings {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_CLOSE_GRACE)
    }
}

/// Launches tool servers as child processes speaking MCP over stdio.
#[derive(Debug, Clone)]
pub struct StdioToolServerLauncher<C>
where
    C: Clock + Send + Sync,
{
    settings: StdioLauncherSettings,
    clock: Arc<C>,
}

impl<C> StdioToolServerLauncher<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a launcher.
    #[must_use]
    pub const fn new(settings: StdioLauncherSettings, clock: Arc<C>) -> Self {
        Self { settings, clock }
    }

    /// Returns the launcher settings.
    #[must_use]
    pub const fn settings(&self) -> StdioLauncherSettings {
        self.settings
    }

    fn spawn(server: &ServerName, spec: &ServerLaunchSpec) -> ToolConnectionResult<Child> {
        let mut command = Command::new(spec.command());
        command
            .args(spec.args())
            .envs(spec.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(directory) = spec.working_directory() {
            command.current_dir(directory);
        }

        command
            .spawn()
            .map_err(|err| ToolConnectionError::launch(server.clone(), spec.command(), err))
    }

    async fn abort(&self, server: &ServerName, channel: Option<&StdioChannel>, child: &mut Child) {
        if let Some(channel) = channel {
            channel.close_writer().await;
        }
        match terminate(child, self.settings.close_grace).await {
            Ok(termination) => debug!(%server, %termination, "aborted tool server"),
            Err(err) => warn!(%server, %err, "failed to reap aborted tool server"),
        }
    }
}

#[async_trait]
impl<C> ToolServerLauncher for StdioToolServerLauncher<C>
where
    C: Clock + Send + Sync,
{
    async fn launch(
        &self,
        server: &ServerName,
        spec: &ServerLaunchSpec,
    ) -> ToolConnectionResult<Arc<dyn ToolConnection>> {
        info!(%server, command = %spec, "launching tool server");
        let mut lifecycle = ConnectionLifecycle::new();
        let mut child = Self::spawn(server, spec)?;
        let process_id = child.id();

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            self.abort(server, None, &mut child).await;
            return Err(ToolConnectionError::launch(
                server.clone(),
                spec.command(),
                std::io::Error::other("child stdio pipes were not captured"),
            ));
        };
        let channel = StdioChannel::new(stdin, stdout);

        let outcome = timeout(self.settings.handshake_timeout, handshake(&channel))
            .await
            .unwrap_or(Err(HandshakeFailure::TimedOut(self.settings.handshake_timeout)));
        let catalog = match outcome {
            Ok(catalog) => catalog,
            Err(failure) => {
                warn!(%server, %failure, "tool server handshake failed");
                self.abort(server, Some(&channel), &mut child).await;
                return Err(ToolConnectionError::Handshake {
                    server: server.clone(),
                    process_id,
                    failure,
                });
            }
        };

        if let Err(err) = lifecycle.mark_ready() {
            self.abort(server, Some(&channel), &mut child).await;
            return Err(ToolConnectionError::Handshake {
                server: server.clone(),
                process_id,
                failure: HandshakeFailure::Malformed(err.to_string()),
            });
        }

        info!(%server, tools = catalog.len(), "tool server ready");
        let info = ConnectionInfo::new(
            ConnectionId::new(),
            server.clone(),
            process_id,
            self.clock.utc(),
        );
        Ok(Arc::new(StdioToolConnection::new(
            info,
            catalog,
            lifecycle,
            channel,
            child,
            self.settings.close_grace,
        )))
    }
}

/// Runs `initialize`, `notifications/initialized` and `tools/list`.
async fn handshake(channel: &StdioChannel) -> Result<ToolCatalog, HandshakeFailure> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    });
    let initialized = channel
        .request(McpMethod::Initialize, Some(params))
        .await
        .map_err(|err| handshake_failure(McpMethod::Initialize, err))?;

    let Some(server_version) = initialized.get("protocolVersion").and_then(Value::as_str) else {
        return Err(HandshakeFailure::Malformed(
            "initialize result lacks protocolVersion".to_owned(),
        ));
    };
    debug!(
        server_version,
        server_info = %initialized.get("serverInfo").unwrap_or(&serde_json::Value::Null),
        "tool server initialized"
    );

    channel
        .notify(McpMethod::Initialized, None)
        .await
        .map_err(|err| handshake_failure(McpMethod::Initialized, err))?;

    let offers_tools = initialized
        .get("capabilities")
        .and_then(|capabilities| capabilities.get("tools"))
        .is_some();
    if !offers_tools {
        debug!("tool server does not advertise tools");
        return Ok(ToolCatalog::empty());
    }

    let descriptors = list_all_tools(channel).await?;
    Ok(ToolCatalog::new(descriptors)?)
}

async fn list_all_tools(channel: &StdioChannel) -> Result<Vec<ToolDescriptor>, HandshakeFailure> {
    let mut descriptors = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..MAX_TOOL_PAGES {
        let params = cursor.as_ref().map(|value| json!({ "cursor": value }));
        let result = channel
            .request(McpMethod::ListTools, params)
            .await
            .map_err(|err| handshake_failure(McpMethod::ListTools, err))?;
        let page: ListToolsResult = serde_json::from_value(result).map_err(|err| {
            HandshakeFailure::Malformed(format!("invalid tools/list result: {err}"))
        })?;

        for tool in page.tools {
            descriptors.push(ToolDescriptor::try_from(tool)?);
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(descriptors),
        }
    }
    Err(HandshakeFailure::Malformed(format!(
        "tools/list did not finish within {MAX_TOOL_PAGES} pages"
    )))
}

fn handshake_failure(method: McpMethod, err: ChannelError) -> HandshakeFailure {
    match err {
        ChannelError::Io(err) => HandshakeFailure::Io(err.to_string()),
        ChannelError::Encode(err) => HandshakeFailure::Malformed(err.to_string()),
        ChannelError::Closed => HandshakeFailure::ServerClosed,
        ChannelError::Malformed(reason) => HandshakeFailure::Malformed(reason),
        ChannelError::Rejected { code, message } => HandshakeFailure::Rejected {
            method: method.as_str().to_owned(),
            code,
            message,
        },
    }
}
