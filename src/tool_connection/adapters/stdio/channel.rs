//! Request/response channel over a child's stdin and stdout.

use super::protocol::{
    IncomingFrame, JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, McpMethod,
    RequestId,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Failures on the stdio channel.
#[derive(Debug, Error)]
pub(crate) enum ChannelError {
    #[error("pipe I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("peer closed its output")]
    Closed,

    #[error("{0}")]
    Malformed(String),

    #[error("peer returned error {code}: {message}")]
    Rejected { code: i64, message: String },
}

/// Newline-delimited JSON-RPC channel to one subprocess.
///
/// The reader lock serialises requests; the writer lock is held only while a
/// frame is written, so shutdown can close stdin while a request waits.
#[derive(Debug)]
pub(crate) struct StdioChannel {
    writer: Mutex<Option<ChildStdin>>,
    reader: Mutex<Option<BufReader<ChildStdout>>>,
    next_id: AtomicI64,
}

impl StdioChannel {
    pub(crate) fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            writer: Mutex::new(Some(stdin)),
            reader: Mutex::new(Some(BufReader::new(stdout))),
            next_id: AtomicI64::new(1),
        }
    }

    /// Sends a request and waits for its response, answering any requests
    /// the peer interleaves.
    pub(crate) async fn request(
        &self,
        method: McpMethod,
        params: Option<Value>,
    ) -> Result<Value, ChannelError> {
        let mut reader_guard = self.reader.lock().await;
        let reader = reader_guard.as_mut().ok_or(ChannelError::Closed)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut request = JsonRpcRequest::new(id, method);
        if let Some(params) = params {
            request = request.with_params(params);
        }
        debug!(%method, id, "sending request");
        self.write_frame(&request).await?;

        let expected = RequestId::Number(id);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(ChannelError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!(frame = trimmed, "received frame");

            let frame = IncomingFrame::decode(trimmed).map_err(|err| {
                ChannelError::Malformed(format!("undecodable frame from server: {err}"))
            })?;
            match frame {
                IncomingFrame::Request(incoming) => self.answer_peer(incoming).await?,
                IncomingFrame::Response(response) if response.id != expected => {
                    warn!(id = %response.id, expected = id, "ignoring response to unknown request");
                }
                IncomingFrame::Response(response) => return into_result(response),
            }
        }
    }

    /// Sends a notification.
    pub(crate) async fn notify(
        &self,
        method: McpMethod,
        params: Option<Value>,
    ) -> Result<(), ChannelError> {
        let mut notification = JsonRpcRequest::notification(method);
        if let Some(params) = params {
            notification = notification.with_params(params);
        }
        self.write_frame(&notification).await
    }

    /// Drops stdin, signalling end of input to the peer.
    pub(crate) async fn close_writer(&self) {
        if let Some(mut stdin) = self.writer.lock().await.take() {
            if let Err(err) = stdin.shutdown().await {
                debug!(%err, "stdin shutdown failed");
            }
        }
    }

    /// Drops stdout unless a request still holds it.
    pub(crate) fn release_reader(&self) {
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }

    async fn write_frame(&self, frame: &impl Serialize) -> Result<(), ChannelError> {
        let mut encoded = serde_json::to_vec(frame)?;
        encoded.push(b'\n');

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ChannelError::Closed)?;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn answer_peer(&self, incoming: JsonRpcRequest) -> Result<(), ChannelError> {
        let Some(id) = incoming.id else {
            debug!(method = %incoming.method, "ignoring server notification");
            return Ok(());
        };

        let response = if McpMethod::from_wire(&incoming.method) == Some(McpMethod::Ping) {
            JsonRpcResponse::success(id, Value::Object(serde_json::Map::new()))
        } else {
            debug!(method = %incoming.method, "rejecting unsupported server request");
            JsonRpcResponse::failure(
                id,
                JsonRpcError::new(METHOD_NOT_FOUND, format!("unsupported method: {}", incoming.method)),
            )
        };
        self.write_frame(&response).await
    }
}

fn into_result(response: JsonRpcResponse) -> Result<Value, ChannelError> {
    if let Some(error) = response.error {
        return Err(ChannelError::Rejected {
            code: error.code,
            message: error.message,
        });
    }
    response.result.ok_or_else(|| {
        ChannelError::Malformed("response carries neither result nor error".to_owned())
    })
}
