// ABOUTME: Proxy for one worker subprocess speaking MCP over stdio pipes.
// ABOUTME: Spawns, handshakes, issues synchronous tool calls, reaps on disconnect.

use anyhow::{anyhow, Context, Result};
use marshal_json::{build, extract};
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Lines of startup noise tolerated before a read attempt gives up.
const MAX_NOISE_LINES: usize = 16;

/// Per-line read budget; a stuck worker eventually yields an empty result.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of a worker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Disconnected,
    Launching,
    Handshaking,
    Ready,
}

/// Owns one worker child process and its two pipe endpoints. One request is
/// in flight at a time; transport failures degrade to empty results so the
/// registry can fall through to another worker.
pub struct WorkerProxy {
    name: String,
    command: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    request_id: i64,
    state: WorkerState,
}

impl WorkerProxy {
    /// Spawn the worker and run the initialize handshake. On any failure the
    /// child is torn down and an error is returned; the proxy never reaches
    /// `Ready` without a non-empty initialize reply.
    pub async fn connect(name: &str, command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("empty worker command for '{name}'"))?;

        debug!(worker = %name, program = %program, "Spawning worker process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn worker '{name}'"))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("no stdout pipe"))?;

        let mut proxy = Self {
            name: name.to_string(),
            command: command.to_vec(),
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout)),
            request_id: 0,
            state: WorkerState::Launching,
        };

        proxy.state = WorkerState::Handshaking;
        if let Err(e) = proxy.handshake().await {
            proxy.disconnect().await;
            return Err(e);
        }
        proxy.state = WorkerState::Ready;
        Ok(proxy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    async fn handshake(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": marshal_rpc::PROTOCOL_VERSION,
            "clientInfo": {
                "name": "marshal",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {},
        })
        .to_string();

        let reply = self.send_request("initialize", &params).await;
        if reply.is_empty() {
            return Err(anyhow!("worker '{}' did not answer initialize", self.name));
        }

        self.send_notification("notifications/initialized", "{}")
            .await;
        debug!(worker = %self.name, "Worker initialized");
        Ok(())
    }

    /// Raw `tools/list` response payload, or `""` when unavailable.
    pub async fn list_tools(&mut self) -> String {
        if self.state != WorkerState::Ready {
            return String::new();
        }
        self.send_request("tools/list", "{}").await
    }

    /// Call a tool and return its text content. An error-shaped reply is
    /// synthesized into `"MCP error: <msg>"`; transport trouble yields `""`.
    pub async fn call_tool(&mut self, name: &str, arguments: &str, allow_dangerous: bool) -> String {
        if self.state != WorkerState::Ready {
            return String::new();
        }

        let args = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let params = build::object(&[
            ("name", build::string(name)),
            ("arguments", args.to_string()),
            ("exec_dangerous", build::boolean(allow_dangerous)),
        ]);

        let response = self.send_request("tools/call", &params).await;
        if response.is_empty() {
            return String::new();
        }

        if extract::has_key(&response, "error") {
            let parsed = marshal_rpc::parse_response(&response);
            let msg = extract::get_string(&parsed.error, "message");
            return format!("MCP error: {msg}");
        }

        let result = marshal_rpc::extract_result(&response);
        let content = extract::get_array(&result, "content");
        extract::get_string(&content, "text")
    }

    /// Send one request and block for its reply line. Ids strictly increase
    /// while connected; correlation is implicit since only one request is in
    /// flight per worker.
    async fn send_request(&mut self, method: &str, params: &str) -> String {
        self.request_id += 1;
        let wire = marshal_rpc::request(self.request_id, method, params);
        if !self.write_line(&wire).await {
            return String::new();
        }
        self.read_response().await
    }

    async fn send_notification(&mut self, method: &str, params: &str) {
        let wire = marshal_rpc::notification(method, params);
        self.write_line(&wire).await;
    }

    async fn write_line(&mut self, line: &str) -> bool {
        let Some(stdin) = self.stdin.as_mut() else {
            return false;
        };
        let mut framed = line.to_string();
        framed.push('\n');
        match stdin.write_all(framed.as_bytes()).await {
            Ok(()) => stdin.flush().await.is_ok(),
            Err(e) => {
                warn!(worker = %self.name, error = %e, "Worker pipe write failed");
                false
            }
        }
    }

    /// Read lines until one that starts with `{` (after trimming leading
    /// whitespace). Workers may emit startup noise on stdout; such lines are
    /// discarded and logged. Exhausting the budget yields `""`.
    async fn read_response(&mut self) -> String {
        let Some(stdout) = self.stdout.as_mut() else {
            return String::new();
        };

        for _ in 0..MAX_NOISE_LINES {
            let mut line = String::new();
            let read = tokio::time::timeout(READ_TIMEOUT, stdout.read_line(&mut line)).await;
            match read {
                Ok(Ok(0)) => {
                    warn!(worker = %self.name, "Worker closed its stdout");
                    return String::new();
                }
                Ok(Ok(_)) => {
                    let trimmed = line.trim_start();
                    if trimmed.starts_with('{') {
                        return trimmed.trim_end().to_string();
                    }
                    debug!(worker = %self.name, line = %line.trim_end(), "Discarding non-protocol output");
                }
                Ok(Err(e)) => {
                    warn!(worker = %self.name, error = %e, "Worker pipe read failed");
                    return String::new();
                }
                Err(_) => {
                    warn!(worker = %self.name, "Worker read timed out");
                    return String::new();
                }
            }
        }
        warn!(worker = %self.name, "Worker noise budget exhausted");
        String::new()
    }

    /// Close owned pipe ends, signal the child, and reap it. Idempotent.
    pub async fn disconnect(&mut self) {
        self.stdin.take();
        self.stdout.take();
        self.state = WorkerState::Disconnected;

        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }

        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                // Still alive after SIGTERM; force it.
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        debug!(worker = %self.name, "Worker disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONDER: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}}}}' ;;
            *tools/list*) echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"x","description":"d","inputSchema":{"type":"object"}}]}}' ;;
            *tools/call*) echo 'worker warming up'; echo 'another noise line'; echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"hello"}]}}' ;;
          esac
        done
    "#;

    const ERROR_RESPONDER: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{}}}' ;;
            *tools/call*) echo '{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"X"}}' ;;
          esac
        done
    "#;

    async fn spawn_script(script: &str) -> WorkerProxy {
        let command = vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()];
        WorkerProxy::connect("test-worker", &command)
            .await
            .expect("script worker should connect")
    }

    #[tokio::test]
    async fn connect_fails_for_missing_binary() {
        let command = vec!["definitely-not-a-real-binary-xyz".to_string()];
        assert!(WorkerProxy::connect("ghost", &command).await.is_err());
    }

    #[tokio::test]
    async fn connect_fails_when_worker_never_replies() {
        let command = vec!["/bin/sh".to_string(), "-c".to_string(), "exit 0".to_string()];
        assert!(WorkerProxy::connect("mute", &command).await.is_err());
    }

    #[tokio::test]
    async fn handshake_reaches_ready() {
        let mut proxy = spawn_script(RESPONDER).await;
        assert_eq!(proxy.state(), WorkerState::Ready);
        proxy.disconnect().await;
        assert_eq!(proxy.state(), WorkerState::Disconnected);
    }

    #[tokio::test]
    async fn list_tools_returns_raw_payload() {
        let mut proxy = spawn_script(RESPONDER).await;
        let payload = proxy.list_tools().await;
        assert!(payload.contains("\"tools\""));
        assert!(payload.contains("\"x\""));
        proxy.disconnect().await;
    }

    #[tokio::test]
    async fn noise_lines_before_reply_are_discarded() {
        let mut proxy = spawn_script(RESPONDER).await;
        let text = proxy.call_tool("x", "{}", false).await;
        assert_eq!(text, "hello");
        proxy.disconnect().await;
    }

    #[tokio::test]
    async fn error_reply_is_synthesized() {
        let mut proxy = spawn_script(ERROR_RESPONDER).await;
        let text = proxy.call_tool("x", "{}", false).await;
        assert_eq!(text, "MCP error: X");
        proxy.disconnect().await;
    }

    #[tokio::test]
    async fn calls_after_disconnect_degrade_to_empty() {
        let mut proxy = spawn_script(RESPONDER).await;
        proxy.disconnect().await;
        assert_eq!(proxy.list_tools().await, "");
        assert_eq!(proxy.call_tool("x", "{}", false).await, "");
        // Disconnect is idempotent.
        proxy.disconnect().await;
    }
}
