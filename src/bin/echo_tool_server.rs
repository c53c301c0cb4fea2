//! Minimal MCP tool server speaking newline-delimited JSON-RPC over stdio.
//!
//! It advertises two tools, `echo` and `reverse`, one per `tools/list` page.
//! Flags make it misbehave on purpose so launch and shutdown paths can be
//! exercised against a real subprocess.

use clap::Parser;
use serde_json::{Value, json};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use switchboard::tool_connection::adapters::stdio::protocol::{
    INVALID_PARAMS, IncomingFrame, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, METHOD_NOT_FOUND, McpMethod, PROTOCOL_VERSION, WireTool,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

/// Echo tool server.
#[derive(Debug, Parser)]
#[command(name = "echo-tool-server")]
#[command(version)]
struct Args {
    /// Keep running after stdin closes
    #[arg(long)]
    ignore_stdin_eof: bool,

    /// Ignore `SIGTERM`
    #[arg(long)]
    ignore_terminate: bool,

    /// Delay before answering `initialize`
    #[arg(long, default_value_t = 0)]
    handshake_delay_ms: u64,

    /// Answer `initialize` with a line that is not JSON
    #[arg(long)]
    garbage_handshake: bool,

    /// Do not advertise the tools capability
    #[arg(long)]
    no_tools: bool,

    /// Write the process id to this file on startup
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    if args.ignore_terminate {
        ignore_terminate()?;
    }
    if let Some(path) = &args.pid_file {
        std::fs::write(path, std::process::id().to_string())?;
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(IncomingFrame::Request(request)) = IncomingFrame::decode(&line) else {
            continue;
        };
        let Some(id) = request.id.clone() else {
            continue;
        };

        if request.method == McpMethod::Initialize.as_str() {
            tokio::time::sleep(Duration::from_millis(args.handshake_delay_ms)).await;
            if args.garbage_handshake {
                write_line(&mut stdout, b"this is not json-rpc").await?;
                continue;
            }
        }

        let response = match respond(&request, &args) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        let encoded = serde_json::to_vec(&response).map_err(io::Error::other)?;
        write_line(&mut stdout, &encoded).await?;
    }

    if args.ignore_stdin_eof {
        std::future::pending::<()>().await;
    }
    Ok(())
}

fn respond(request: &JsonRpcRequest, args: &Args) -> Result<Value, JsonRpcError> {
    match McpMethod::from_wire(&request.method) {
        Some(McpMethod::Initialize) => {
            let capabilities = if args.no_tools {
                json!({})
            } else {
                json!({"tools": {}})
            };
            Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {"name": "echo-tool-server", "version": env!("CARGO_PKG_VERSION")}
            }))
        }
        Some(McpMethod::ListTools) => list_tools(request.params.as_ref()),
        Some(McpMethod::CallTool) => call_tool(request.params.as_ref()),
        Some(McpMethod::Ping) => Ok(json!({})),
        _ => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("unsupported method: {}", request.method),
        )),
    }
}

fn list_tools(params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let text_schema = json!({
        "type": "object",
        "properties": {"text": {"type": "string"}},
        "required": ["text"]
    });
    let cursor = params
        .and_then(|params| params.get("cursor"))
        .and_then(Value::as_str);

    let page = match cursor {
        None => ListToolsResult {
            tools: vec![WireTool {
                name: "echo".to_owned(),
                description: Some("Returns the given text unchanged.".to_owned()),
                input_schema: text_schema,
            }],
            next_cursor: Some("reverse".to_owned()),
        },
        Some("reverse") => ListToolsResult {
            tools: vec![WireTool {
                name: "reverse".to_owned(),
                description: Some("Returns the given text reversed.".to_owned()),
                input_schema: text_schema,
            }],
            next_cursor: None,
        },
        Some(other) => {
            return Err(JsonRpcError::new(
                INVALID_PARAMS,
                format!("unknown cursor: {other}"),
            ));
        }
    };
    serde_json::to_value(page).map_err(|err| JsonRpcError::new(INVALID_PARAMS, err.to_string()))
}

fn call_tool(params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let name = params
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "missing tool name"))?;
    let input = params
        .and_then(|params| params.get("arguments"))
        .and_then(|arguments| arguments.get("text"))
        .and_then(Value::as_str);

    let output = match (name, input) {
        ("echo", Some(text)) => text.to_owned(),
        ("reverse", Some(text)) => text.chars().rev().collect(),
        ("echo" | "reverse", None) => {
            return Ok(json!({
                "content": [{"type": "text", "text": "missing required argument: text"}],
                "isError": true
            }));
        }
        (other, _) => {
            return Err(JsonRpcError::new(
                INVALID_PARAMS,
                format!("unknown tool: {other}"),
            ));
        }
    };
    Ok(json!({"content": [{"type": "text", "text": output}], "isError": false}))
}

async fn write_line(stdout: &mut Stdout, bytes: &[u8]) -> io::Result<()> {
    stdout.write_all(bytes).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

#[cfg(unix)]
fn ignore_terminate() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move { while terminate.recv().await.is_some() {} });
    Ok(())
}

#[cfg(not(unix))]
fn ignore_terminate() -> io::Result<()> {
    Ok(())
}
