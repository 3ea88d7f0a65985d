//! Tool registry and built-in tools.
//!
//! Tools are registered once at startup by the composition root, then
//! shared immutably across sessions. A tool's parameter schema is
//! descriptive only: it is rendered into the instructions shown to
//! personas, never enforced before execution.

pub mod fs_tools;
pub mod web_search;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Errors that can occur during tool execution.
///
/// From the round's perspective these are never fatal: the orchestrator
/// folds them into the tool's textual output.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path `{0}` escapes sandbox")]
    Sandbox(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// An executable tool with a declarative parameter description.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// One-line description shown to personas.
    fn description(&self) -> &str;

    /// JSON-schema-shaped parameter description. Metadata only.
    fn parameters(&self) -> Value;

    /// Execute with raw JSON arguments, returning text output.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// Name-keyed tool lookup. Last registration for a name wins.
#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Text block describing every registered tool, for inclusion in
    /// persona instructions. Empty string when no tools are registered.
    pub fn definitions_block(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }
        let mut block = String::from("Available tools:\n");
        for name in &self.order {
            let tool = &self.tools[name];
            block.push_str(&format!(
                "- {}: {}\n  parameters: {}\n",
                tool.name(),
                tool.description(),
                tool.parameters()
            ));
        }
        block
    }
}

/// Validate that a resolved path stays within the sandbox root.
///
/// Returns the canonicalized path on success. Files that do not exist yet
/// are resolved through their parent directory.
pub fn sandbox_check(root: &Path, relative_path: &str) -> Result<PathBuf, ToolError> {
    let candidate = root.join(relative_path);
    let resolved = candidate
        .canonicalize()
        .or_else(|_| {
            if let Some(parent) = candidate.parent() {
                let canon_parent = parent.canonicalize()?;
                Ok(canon_parent.join(candidate.file_name().unwrap_or_default()))
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot resolve path",
                ))
            }
        })
        .map_err(ToolError::Io)?;

    let canon_root = root.canonicalize().map_err(ToolError::Io)?;
    if !resolved.starts_with(&canon_root) {
        return Err(ToolError::Sandbox(relative_path.to_string()));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTool {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "static test tool"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Ok(self.reply.to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticTool {
            name: "echo",
            reply: "hello",
        }));

        let tool = registry.get("echo").unwrap();
        assert_eq!(tool.execute(Value::Null).await.unwrap(), "hello");
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticTool {
            name: "echo",
            reply: "first",
        }));
        registry.register(Arc::new(StaticTool {
            name: "echo",
            reply: "second",
        }));

        assert_eq!(registry.len(), 1);
        let tool = registry.get("echo").unwrap();
        assert_eq!(tool.execute(Value::Null).await.unwrap(), "second");
    }

    #[test]
    fn test_definitions_block() {
        let mut registry = ToolRegistry::new();
        assert!(registry.definitions_block().is_empty());

        registry.register(Arc::new(StaticTool {
            name: "echo",
            reply: "x",
        }));
        let block = registry.definitions_block();
        assert!(block.contains("Available tools:"));
        assert!(block.contains("- echo: static test tool"));
        assert!(block.contains("parameters:"));
    }

    #[test]
    fn test_sandbox_check_blocks_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("inside.txt"), "ok").unwrap();

        assert!(sandbox_check(dir.path(), "inside.txt").is_ok());
        assert!(matches!(
            sandbox_check(dir.path(), "../outside.txt"),
            Err(ToolError::Sandbox(_))
        ));
    }

    #[test]
    fn test_sandbox_check_allows_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = sandbox_check(dir.path(), "not-yet-created.txt").unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }
}
