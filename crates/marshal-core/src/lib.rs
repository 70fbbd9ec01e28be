// ABOUTME: Core runtime for the marshal terminal agent.
// ABOUTME: Controller backends, worker registry, orchestration loop, config.

pub mod backend;
pub mod config;
pub mod registry;
pub mod session;
pub mod term;

pub use backend::{create_backend, Backend, ChatMessage, ChatReply, ToolCallRequest, ToolDef};
pub use config::{Config, WorkerConfig};
pub use registry::Registry;
pub use session::{Session, TurnReport};
