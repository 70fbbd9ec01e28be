// ABOUTME: Gemini backend: cloud model over the generateContent HTTP endpoint.
// ABOUTME: Translates history/tools to Gemini shape and normalizes the reply.

use super::{Backend, ChatMessage, ChatReply, ToolCallRequest, ToolDef, ToolSet};
use async_trait::async_trait;
use marshal_json::{build, extract, sanitize_schema};
use tracing::{debug, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    model: String,
    api_key: String,
    http: reqwest::Client,
    tools: ToolSet,
    declarations: Vec<String>,
}

impl GeminiBackend {
    pub fn new(model: &str, api_key: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            tools: ToolSet::default(),
            declarations: Vec::new(),
        }
    }

    /// Gemini takes `contents` with user/model roles and a separate
    /// system_instruction; the system history entry is lifted out.
    fn build_request(&self, message: &str, history: &[ChatMessage]) -> String {
        let mut contents: Vec<String> = Vec::new();
        let mut system_instruction = String::new();

        for msg in history {
            if msg.role == "system" {
                system_instruction = msg.content.clone();
                continue;
            }
            let role = if msg.role == "assistant" || msg.role == "model" {
                "model"
            } else {
                "user"
            };
            contents.push(content_entry(role, &msg.content));
        }

        if !message.is_empty() {
            contents.push(content_entry("user", message));
        }

        let mut root = vec![("contents", build::array(&contents))];

        let sys_part;
        if !system_instruction.is_empty() {
            sys_part = build::object(&[(
                "parts",
                build::array(&[build::object(&[("text", build::string(&system_instruction))])]),
            )]);
            root.push(("system_instruction", sys_part));
        }

        let tools_fragment;
        if !self.declarations.is_empty() {
            tools_fragment = build::array(&[build::object(&[(
                "function_declarations",
                build::array(&self.declarations),
            )])]);
            root.push(("tools", tools_fragment));
        }

        build::object(&root)
    }
}

fn content_entry(role: &str, text: &str) -> String {
    build::object(&[
        ("role", build::string(role)),
        (
            "parts",
            build::array(&[build::object(&[("text", build::string(text))])]),
        ),
    ])
}

/// Collapse newlines and tabs; the argument fragment travels on a
/// line-framed pipe downstream.
fn compact(fragment: &str) -> String {
    fragment
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

/// Normalize a Gemini reply: first candidate, first part, text plus an
/// optional functionCall. Anything unrecognized falls back to raw text.
fn normalize(body: &str) -> ChatReply {
    let candidates = extract::get_array(body, "candidates");
    if candidates == "[]" {
        // Error payload or empty response; surface it as text.
        return ChatReply::text(extract::get_string(body, "message"));
    }

    let first_candidate = extract::first_object(&candidates);
    let content = extract::get_object(&first_candidate, "content");
    let parts = extract::get_array(&content, "parts");
    let first_part = extract::first_object(&parts);

    let mut reply = ChatReply::text(extract::get_string(&first_part, "text"));

    let call = extract::get_object(&first_part, "functionCall");
    if call != "{}" {
        let name = extract::get_string(&call, "name");
        if !name.is_empty() {
            reply.tool_calls.push(ToolCallRequest {
                name,
                arguments: compact(&extract::get_object(&call, "args")),
            });
        }
    }
    reply
}

#[async_trait]
impl Backend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat(&self, message: &str, history: &[ChatMessage]) -> ChatReply {
        let request = self.build_request(message, history);
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        debug!(model = %self.model, "Sending Gemini chat request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .body(request)
            .send()
            .await;

        let body = match response {
            Ok(r) => match r.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "Failed to read Gemini response body");
                    return ChatReply::text(format!("Error: Gemini response unreadable: {e}"));
                }
            },
            Err(e) => {
                warn!(error = %e, "Gemini request failed");
                return ChatReply::text(format!("Error: Gemini request failed: {e}"));
            }
        };

        normalize(&body)
    }

    fn add_tool(&mut self, name: &str, description: &str, schema: &str) {
        if !self.tools.insert(name, description, schema) {
            return;
        }
        // Gemini rejects schemas carrying draft metadata; sanitize first.
        self.declarations.push(build::object(&[
            ("name", build::string(name)),
            ("description", build::string(description)),
            ("parameters", sanitize_schema(schema)),
        ]));
        debug!(tool = %name, total = self.declarations.len(), "Registered Gemini tool");
    }

    fn clear_tools(&mut self) {
        self.tools.clear();
        self.declarations.clear();
    }

    fn tools(&self) -> &[ToolDef] {
        self.tools.as_slice()
    }
}
