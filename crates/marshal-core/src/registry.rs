// ABOUTME: Worker registry: owns connected workers and the active controller.
// ABOUTME: Aggregates/dedupes tools and routes calls with sequential fallback.

use crate::backend::Backend;
use marshal_json::extract;
use marshal_worker::WorkerProxy;
use tracing::{debug, warn};

/// Synthesized result when no connected worker serves a tool.
const NOT_FOUND: &str = "Error: Tool not found on any connected server or script failed!";

/// Owns the worker set and the swappable controller.
pub struct Registry {
    backend: Box<dyn Backend>,
    workers: Vec<WorkerProxy>,
}

impl Registry {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            workers: Vec::new(),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn workers(&self) -> &[WorkerProxy] {
        &self.workers
    }

    /// Connect a worker and register its tools. On connection failure the
    /// worker is discarded; the registry keeps serving with the rest.
    pub async fn add_worker(&mut self, name: &str, command: &[String]) -> bool {
        if self.workers.iter().any(|w| w.name() == name) {
            warn!(worker = %name, "Worker name already registered, skipping");
            return false;
        }
        match WorkerProxy::connect(name, command).await {
            Ok(proxy) => {
                println!("✓ Connected to worker: {name}");
                self.workers.push(proxy);
                self.register_tools().await;
                true
            }
            Err(e) => {
                warn!(worker = %name, error = %e, "Worker connection failed");
                false
            }
        }
    }

    /// Swap the active controller. The new controller starts with an empty
    /// tool set and gets the full aggregate re-registered.
    pub async fn set_backend(&mut self, backend: Box<dyn Backend>) {
        self.backend = backend;
        self.register_tools().await;
    }

    /// List every worker's tools and register them with the controller.
    /// The controller rejects duplicate names (first wins), which makes this
    /// idempotent against an unchanged worker set.
    pub async fn register_tools(&mut self) {
        for worker in &mut self.workers {
            let listing = worker.list_tools().await;
            if listing.is_empty() {
                debug!(worker = %worker.name(), "No tools/list reply");
                continue;
            }

            let result = marshal_rpc::extract_result(&listing);
            let tools = extract::get_array(&result, "tools");
            if tools == "[]" {
                debug!(worker = %worker.name(), "Worker exposes no tools");
                continue;
            }

            let mut count = 0;
            for item in extract::array_items(&tools) {
                let name = extract::get_string(&item, "name");
                if name.is_empty() {
                    continue;
                }
                let description = extract::get_string(&item, "description");
                let schema = extract::get_object(&item, "inputSchema");
                self.backend.add_tool(&name, &description, &schema);
                count += 1;
            }
            debug!(worker = %worker.name(), count, "Registered worker tools");
        }
    }

    /// Route a tool call: try connected workers in registration order and
    /// take the first usable result. Sequential trial, never broadcast, so
    /// at most one worker runs side effects per call.
    pub async fn call_tool(&mut self, name: &str, arguments: &str, allow_dangerous: bool) -> String {
        debug!(tool = %name, workers = self.workers.len(), "Routing tool call");
        for worker in &mut self.workers {
            let result = worker.call_tool(name, arguments, allow_dangerous).await;
            debug!(worker = %worker.name(), len = result.len(), "Worker result");
            if result.is_empty()
                || result.contains("Unknown tool")
                || result.contains("not found")
                || result.contains("MCP error")
            {
                continue;
            }
            return result;
        }
        NOT_FOUND.to_string()
    }

    /// Disconnect every worker. Used on session shutdown.
    pub async fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    /// Worker that serves tool `x`.
    const HAS_X: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}' ;;
            *tools/list*) echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"x","description":"from B","inputSchema":{"type":"object"}}]}}' ;;
            *tools/call*) echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"b-result"}]}}' ;;
          esac
        done
    "#;

    /// Worker that knows no tools and rejects every call.
    const HAS_NONE: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}' ;;
            *tools/list*) echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"y","description":"from A","inputSchema":{"type":"object"}}]}}' ;;
            *tools/call*) echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"Unknown tool"}]}}' ;;
          esac
        done
    "#;

    /// Worker whose tools/list overlaps with HAS_X.
    const OVERLAP: &str = r#"
        while IFS= read -r line; do
          case "$line" in
            *notifications/initialized*) ;;
            *initialize*) echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}' ;;
            *tools/list*) echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"x","description":"duplicate","inputSchema":{}},{"name":"z","description":"unique","inputSchema":{}}]}}' ;;
          esac
        done
    "#;

    #[tokio::test]
    async fn overlapping_tool_names_register_once_first_wins() {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(vec![])));
        assert!(registry.add_worker("b", &sh(HAS_X)).await);
        assert!(registry.add_worker("dup", &sh(OVERLAP)).await);

        let names: Vec<&str> = registry.backend().tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["x", "z"]);
        let x = &registry.backend().tools()[0];
        assert_eq!(x.description, "from B");
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn fallback_tries_workers_in_order() {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(vec![])));
        assert!(registry.add_worker("a", &sh(HAS_NONE)).await);
        assert!(registry.add_worker("b", &sh(HAS_X)).await);

        let result = registry.call_tool("x", "{}", false).await;
        assert_eq!(result, "b-result");
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn missing_tool_synthesizes_not_found() {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(vec![])));
        assert!(registry.add_worker("a", &sh(HAS_NONE)).await);

        let result = registry.call_tool("nope", "{}", false).await;
        assert!(result.contains("not found"));
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn failed_worker_is_discarded() {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(vec![])));
        assert!(!registry.add_worker("ghost", &sh("exit 0")).await);
        assert!(registry.workers().is_empty());
    }

    #[tokio::test]
    async fn duplicate_worker_names_are_rejected() {
        let mut registry = Registry::new(Box::new(ScriptedBackend::new(vec![])));
        assert!(registry.add_worker("b", &sh(HAS_X)).await);
        assert!(!registry.add_worker("b", &sh(HAS_X)).await);
        assert_eq!(registry.workers().len(), 1);
        registry.shutdown().await;
    }
}
