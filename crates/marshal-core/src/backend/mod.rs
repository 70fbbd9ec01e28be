// ABOUTME: Backend trait defining how marshal connects to controllers
// ABOUTME: Implementations: Ollama (local HTTP), Gemini (cloud HTTP), Manual (menu)

mod gemini;
mod manual;
mod ollama;

pub use gemini::GeminiBackend;
pub use manual::ManualBackend;
pub use ollama::OllamaBackend;

use crate::config::Config;
use async_trait::async_trait;

/// One role-tagged entry in the conversation history.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// A requested tool invocation: name plus a raw JSON argument fragment.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: String,
}

/// Normalized controller reply: optional text, optional tool requests.
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A registered tool: name, description, opaque parameter schema fragment.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub schema: String,
}

/// Tool collection shared by all backends. Names are unique; the first
/// registration wins and later duplicates are rejected.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<ToolDef>,
}

impl ToolSet {
    pub fn insert(&mut self, name: &str, description: &str, schema: &str) -> bool {
        if self.tools.iter().any(|t| t.name == name) {
            return false;
        }
        self.tools.push(ToolDef {
            name: name.to_string(),
            description: description.to_string(),
            schema: schema.to_string(),
        });
        true
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    pub fn as_slice(&self) -> &[ToolDef] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A backend is a controller adapter: given a message and history it returns
/// normalized text and/or a tool-call request. Swapping backends is a
/// reassignment of the active implementation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Unique name for this backend
    fn name(&self) -> &'static str;

    /// Send a message plus history, receive a normalized reply.
    /// Failures degrade to an error-shaped reply; never panics.
    async fn chat(&self, message: &str, history: &[ChatMessage]) -> ChatReply;

    /// Register a tool. Duplicate names are rejected (first wins).
    fn add_tool(&mut self, name: &str, description: &str, schema: &str);

    /// Drop all registered tools.
    fn clear_tools(&mut self);

    fn tools(&self) -> &[ToolDef];
}

/// Build the backend selected by the config.
pub fn create_backend(config: &Config) -> Box<dyn Backend> {
    match config.default_provider.as_str() {
        "gemini" => Box::new(GeminiBackend::new(
            &config.gemini_model,
            &config.gemini_api_key,
        )),
        "manual" | "none" => Box::new(ManualBackend::default()),
        _ => Box::new(OllamaBackend::new(&config.ollama_model, &config.ollama_url)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Backend fed from a queue of canned replies; records every chat call.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<Vec<ChatReply>>,
        tools: ToolSet,
        pub(crate) chats: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(mut replies: Vec<ChatReply>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                tools: ToolSet::default(),
                chats: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, message: &str, _history: &[ChatMessage]) -> ChatReply {
            self.chats.lock().unwrap().push(message.to_string());
            self.replies.lock().unwrap().pop().unwrap_or_default()
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
}
