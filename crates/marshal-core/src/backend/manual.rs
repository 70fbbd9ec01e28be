// ABOUTME: Manual backend: the human picks tools from a numbered menu.
// ABOUTME: No model involved; a controller in the same trait clothing.

use super::{Backend, ChatMessage, ChatReply, ToolCallRequest, ToolDef, ToolSet};
use crate::term;
use async_trait::async_trait;
use std::io::Write;

#[derive(Default)]
pub struct ManualBackend {
    tools: ToolSet,
}

impl ManualBackend {
    /// Resolve a menu choice from free text: a 1-based number or a tool name.
    fn resolve_choice(&self, input: &str) -> usize {
        if let Ok(n) = input.trim().parse::<usize>() {
            return n;
        }
        self.tools
            .as_slice()
            .iter()
            .position(|t| t.name == input.trim())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn menu_entries(&self) -> Vec<(String, String)> {
        self.tools
            .as_slice()
            .iter()
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect()
    }
}

fn prompt_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

#[async_trait]
impl Backend for ManualBackend {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn chat(&self, message: &str, _history: &[ChatMessage]) -> ChatReply {
        if self.tools.is_empty() {
            return ChatReply::text("No tools available.");
        }

        let mut choice = self.resolve_choice(message);

        if message == "list" || choice == 0 || choice > self.tools.as_slice().len() {
            term::display_tool_menu(&self.menu_entries());
            if message == "list" {
                return ChatReply::text("");
            }

            println!(
                "  {}0. Skip{} | or type a tool name directly",
                term::YELLOW,
                term::RESET
            );
            let picked = prompt_line(&format!("  {}Select a tool #: {}", term::BOLD, term::RESET));
            if picked.is_empty() {
                return ChatReply::text("Manual selection skipped.");
            }
            choice = self.resolve_choice(&picked);
        }

        if choice == 0 || choice > self.tools.as_slice().len() {
            return ChatReply::text("Manual selection skipped.");
        }

        let tool = &self.tools.as_slice()[choice - 1];
        println!(
            "\n  {}Arguments for {}{}{}{}",
            term::BOLD,
            term::RESET,
            term::CYAN,
            tool.name,
            term::RESET
        );
        println!(
            "  {}Format: JSON (e.g. {{\"path\": \"/tmp\"}}){}",
            term::DIM,
            term::RESET
        );
        let mut args = prompt_line("  Input (enter for empty {}): ");
        if args.is_empty() {
            args = "{}".to_string();
        }

        ChatReply {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                name: tool.name.clone(),
                arguments: args,
            }],
        }
    }

    fn add_tool(&mut self, name: &str, description: &str, schema: &str) {
        self.tools.insert(name, description, schema);
    }

    fn clear_tools(&mut self) {
        self.tools.clear();
    }

    fn tools(&self) -> &[ToolDef] {
        self.tools.as_slice()
    }
}
