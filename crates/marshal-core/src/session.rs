// ABOUTME: Bounded multi-turn orchestration loop between controller and workers.
// ABOUTME: Gates privileged calls behind human approval and sudo rewriting.

use crate::backend::ChatMessage;
use crate::registry::Registry;
use crate::term;
use dialoguer::{Confirm, Password};
use marshal_json::build;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a capable systems assistant running in a terminal. \
You have access to tools hosted by worker processes. Call at most one tool at a time, \
then summarize the result for the user in plain language.";

/// What happened during one user turn. Used for display and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TurnReport {
    /// Tool calls actually dispatched to workers.
    pub dispatches: u32,
    /// Tool calls suppressed as within-turn repeats.
    pub suppressed: u32,
}

pub struct Session {
    registry: Registry,
    history: Vec<ChatMessage>,
    pub human_in_loop: bool,
    pub turn_limit: usize,
}

impl Session {
    pub fn new(registry: Registry, human_in_loop: bool, turn_limit: usize) -> Self {
        Self {
            registry,
            history: vec![ChatMessage::new("system", SYSTEM_PROMPT)],
            human_in_loop,
            turn_limit,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Drop accumulated history and re-seed the system prompt.
    pub fn reset_history(&mut self) {
        self.history.clear();
        self.history.push(ChatMessage::new("system", SYSTEM_PROMPT));
    }

    pub async fn shutdown(&mut self) {
        self.registry.shutdown().await;
    }

    /// Drive one user turn: up to `turn_limit` controller exchanges, each
    /// dispatching at most the first requested tool call. Repeated
    /// name:arguments pairs within the turn are suppressed.
    pub async fn run_turn(&mut self, input: &str) -> TurnReport {
        let manual = self.registry.backend().name() == "manual";
        let mut report = TurnReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = input.to_string();
        let mut loops = 0usize;

        while loops < self.turn_limit {
            let reply = self.registry.backend().chat(&current, &self.history).await;

            if !reply.content.is_empty() {
                term::print_thought(&reply.content);
                self.history
                    .push(ChatMessage::new("assistant", &reply.content));
            }

            let Some(call) = reply.tool_calls.first() else {
                break;
            };

            let name = call.name.clone();
            let mut arguments = compact(&call.arguments);

            let signature = format!("{name}:{arguments}");
            if !seen.insert(signature) {
                warn!(tool = %name, "Repeated tool call within turn, suppressing");
                report.suppressed += 1;
                break;
            }

            arguments = rewrite_sudo(&name, &arguments);

            // Manual mode is a hard override: the human already chose the call.
            let mut allow_dangerous = false;
            if !manual {
                if self.human_in_loop {
                    match approve(&name, &arguments) {
                        Approval::Denied => {
                            println!("  {}Operation rejected by user.{}", term::RED, term::RESET);
                            break;
                        }
                        Approval::Granted { dangerous } => allow_dangerous = dangerous,
                    }
                } else {
                    term::draw_box("AUTO-EXECUTING", &format!("{name}..."), term::CYAN);
                }
            }

            info!(tool = %name, "Dispatching tool call");
            let result = self.registry.call_tool(&name, &arguments, allow_dangerous).await;
            report.dispatches += 1;

            if manual {
                // A human already saw the raw result; nothing to summarize.
                term::draw_box(&format!("LOCAL DEVICE DATA: {name}"), &result, term::GREEN);
                break;
            }
            term::draw_box("SYSTEM OUTPUT LOG", &result, term::GREEN);

            self.history.push(ChatMessage::new(
                "user",
                format!(
                    "Action: Tool [{name}] executed.\nResult: {result}\n\
                     Constraint: Please summarize this data clearly for the human user. \
                     Do not call any more tools until the user speaks again."
                ),
            ));
            current = String::new();
            loops += 1;
        }

        debug!(
            dispatches = report.dispatches,
            suppressed = report.suppressed,
            "Turn complete"
        );
        report
    }
}

enum Approval {
    Granted { dangerous: bool },
    Denied,
}

/// Interactive approval gate: one prompt to run the tool at all, a second
/// to permit dangerous-classified execution downstream.
fn approve(name: &str, arguments: &str) -> Approval {
    term::draw_box(
        "APPROVAL REQUIRED",
        &format!("Tool: {name}\nArguments: {arguments}"),
        term::YELLOW,
    );
    let run = Confirm::new()
        .with_prompt("Execute this tool call?")
        .default(false)
        .interact()
        .unwrap_or(false);
    if !run {
        return Approval::Denied;
    }
    let dangerous = Confirm::new()
        .with_prompt("Also permit dangerous-classified execution?")
        .default(false)
        .interact()
        .unwrap_or(false);
    Approval::Granted { dangerous }
}

/// Collapse newlines and tabs so the fragment survives line framing.
fn compact(fragment: &str) -> String {
    fragment
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

/// For run_shell_command with a command starting "sudo ", collect the
/// password without echo and rewrite to pipe it through `sudo -S`.
fn rewrite_sudo(tool: &str, arguments: &str) -> String {
    if tool != "run_shell_command" {
        return arguments.to_string();
    }
    let command = marshal_json::get_string(arguments, "command");
    let Some(rest) = command.strip_prefix("sudo ") else {
        return arguments.to_string();
    };
    term::draw_box(
        "SUDO PRIVILEGE ESCALATION",
        &format!("The assistant requested root permissions for:\n{command}"),
        term::MAGENTA,
    );
    let password = Password::new()
        .with_prompt("  [sudo] password for user")
        .allow_empty_password(true)
        .interact()
        .unwrap_or_default();
    if password.is_empty() {
        return arguments.to_string();
    }
    let rewritten = format!("echo {} | sudo -S {rest}", shell_quote(&password));
    build::object(&[("command", build::string(&rewritten))])
}

/// Single-quote for sh, closing and escaping embedded quotes.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{ChatReply, ToolCallRequest};

    const ECHO_WORKER: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}' ;;
            *tools/list*) echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"probe","description":"d","inputSchema":{}}]}}' ;;
            *tools/call*) echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"ok"}]}}' ;;
          esac
        done
    "#;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn call(name: &str, arguments: &str) -> ChatReply {
        ChatReply {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }
    }

    async fn session_with(replies: Vec<ChatReply>) -> Session {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(replies)));
        assert!(registry.add_worker("w", &sh(ECHO_WORKER)).await);
        Session::new(registry, false, 5)
    }

    #[tokio::test]
    async fn turn_limit_bounds_dispatch_count() {
        let replies: Vec<ChatReply> = (0..8)
            .map(|i| call("probe", &format!("{{\"n\":{i}}}")))
            .collect();
        let mut session = session_with(replies).await;

        let report = session.run_turn("go").await;
        assert_eq!(report.dispatches, 5);
        assert_eq!(report.suppressed, 0);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn repeated_call_is_suppressed() {
        let replies = vec![call("probe", "{}"), call("probe", "{}")];
        let mut session = session_with(replies).await;

        let report = session.run_turn("go").await;
        assert_eq!(report.dispatches, 1);
        assert_eq!(report.suppressed, 1);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn text_only_reply_ends_turn() {
        let replies = vec![ChatReply::text("nothing to do")];
        let mut session = session_with(replies).await;

        let report = session.run_turn("hi").await;
        assert_eq!(report.dispatches, 0);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_appends_summarize_instruction() {
        let replies = vec![call("probe", "{}"), ChatReply::text("summary")];
        let mut session = session_with(replies).await;

        session.run_turn("go").await;
        let entry = session
            .history
            .iter()
            .find(|m| m.role == "user" && m.content.starts_with("Action:"))
            .cloned();
        let entry = entry.unwrap();
        assert!(entry.content.contains("Tool [probe] executed."));
        assert!(entry.content.contains("Result: ok"));
        assert!(entry.content.contains("summarize"));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn reset_history_reseeds_system_prompt() {
        let mut session = session_with(vec![ChatReply::text("hello")]).await;
        session.run_turn("hi").await;
        assert!(session.history.len() > 1);
        session.reset_history();
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].role, "system");
        session.shutdown().await;
    }

    #[test]
    fn tool_arguments_are_compacted() {
        assert_eq!(compact("{\"a\":\"x\ny\tz\"}"), "{\"a\":\"x y z\"}");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("pa'ss"), r"'pa'\''ss'");
    }

    #[test]
    fn non_sudo_command_is_untouched() {
        let args = r#"{"command":"ls -la"}"#;
        assert_eq!(rewrite_sudo("run_shell_command", args), args);
        assert_eq!(rewrite_sudo("list_directory", "{}"), "{}");
    }
}
