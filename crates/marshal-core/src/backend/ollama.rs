// ABOUTME: Ollama backend: local model over the /api/chat HTTP endpoint.
// ABOUTME: Replies arrive already in message/tool_calls shape; light extraction.

use super::{Backend, ChatMessage, ChatReply, ToolCallRequest, ToolDef, ToolSet};
use async_trait::async_trait;
use marshal_json::{build, extract};
use tracing::{debug, warn};

pub struct OllamaBackend {
    model: String,
    url: String,
    http: reqwest::Client,
    tools: ToolSet,
    /// Pre-rendered function-call declarations sent with every request.
    tools_json: Vec<String>,
}

impl OllamaBackend {
    pub fn new(model: &str, url: &str) -> Self {
        Self {
            model: model.to_string(),
            url: url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tools: ToolSet::default(),
            tools_json: Vec::new(),
        }
    }

    fn build_request(&self, message: &str, history: &[ChatMessage]) -> String {
        let mut messages: Vec<String> = history
            .iter()
            .map(|m| {
                build::object(&[
                    ("role", build::string(&m.role)),
                    ("content", build::string(&m.content)),
                ])
            })
            .collect();

        if !message.is_empty() {
            messages.push(build::object(&[
                ("role", build::string("user")),
                ("content", build::string(message)),
            ]));
        }

        build::object(&[
            ("model", build::string(&self.model)),
            ("messages", build::array(&messages)),
            ("tools", build::array(&self.tools_json)),
            ("stream", build::boolean(false)),
        ])
    }
}

/// Normalize an Ollama chat reply. The message object already matches the
/// controller contract; tool_calls entries may nest name/arguments under a
/// `function` member, which key-based extraction reads through either way.
fn normalize(body: &str) -> ChatReply {
    let mut message = extract::get_object(body, "message");
    if message == "{}" {
        message = body.to_string();
    }

    let mut reply = ChatReply::text(extract::get_string(&message, "content"));

    let calls = extract::get_array(&message, "tool_calls");
    for item in extract::array_items(&calls) {
        let name = extract::get_string(&item, "name");
        if name.is_empty() {
            continue;
        }
        reply.tool_calls.push(ToolCallRequest {
            name,
            arguments: extract::get_object(&item, "arguments"),
        });
    }
    reply
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, message: &str, history: &[ChatMessage]) -> ChatReply {
        let request = self.build_request(message, history);
        debug!(model = %self.model, "Sending Ollama chat request");

        let response = self
            .http
            .post(format!("{}/api/chat", self.url))
            .header("content-type", "application/json")
            .body(request)
            .send()
            .await;

        let body = match response {
            Ok(r) => match r.text().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "Failed to read Ollama response body");
                    return ChatReply::text(format!("Error: Ollama response unreadable: {e}"));
                }
            },
            Err(e) => {
                warn!(error = %e, "Ollama request failed");
                return ChatReply::text(format!("Error: Ollama request failed: {e}"));
            }
        };

        normalize(&body)
    }

    fn add_tool(&mut self, name: &str, description: &str, schema: &str) {
        if !self.tools.insert(name, description, schema) {
            return;
        }
        let function = build::object(&[
            ("name", build::string(name)),
            ("description", build::string(description)),
            ("parameters", schema.to_string()),
        ]);
        self.tools_json.push(build::object(&[
            ("type", build::string("function")),
            ("function", function),
        ]));
    }

    fn clear_tools(&mut self) {
        self.tools.clear();
        self.tools_json.clear();
    }

    fn tools(&self) -> &[ToolDef] {
        self.tools.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_content() {
        let body = r#"{"message":{"role":"assistant","content":"hi there"}}"#;
        let reply = normalize(body);
        assert_eq!(reply.content, "hi there");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn normalizes_nested_function_tool_call() {
        let body = r#"{"message":{"content":"","tool_calls":[{"function":{"name":"list_directory","arguments":{"path":"/tmp"}}}]}}"#;
        let reply = normalize(body);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "list_directory");
        assert_eq!(reply.tool_calls[0].arguments, r#"{"path":"/tmp"}"#);
    }

    #[test]
    fn malformed_body_degrades_to_empty_reply() {
        let reply = normalize("connection reset");
        assert_eq!(reply.content, "");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn request_carries_tools_and_history() {
        let mut backend = OllamaBackend::new("llama3.2", "http://localhost:11434");
        backend.add_tool("uptime", "Show uptime", r#"{"type":"object"}"#);
        let history = vec![ChatMessage::new("system", "be terse")];
        let request = backend.build_request("hello", &history);
        assert!(request.contains(r#""model":"llama3.2""#));
        assert!(request.contains(r#""uptime""#));
        assert!(request.contains(r#""be terse""#));
        assert!(request.contains(r#""stream":false"#));
    }

    #[test]
    fn duplicate_tools_are_rejected() {
        let mut backend = OllamaBackend::new("llama3.2", "http://localhost:11434");
        backend.add_tool("uptime", "first", "{}");
        backend.add_tool("uptime", "second", "{}");
        assert_eq!(backend.tools().len(), 1);
        assert_eq!(backend.tools_json.len(), 1);
    }
}
