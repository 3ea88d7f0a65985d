//! Filesystem tools: read, write, and list files within a sandboxed
//! workspace root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{sandbox_check, Tool, ToolError};

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

// ---------------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ReadFileArgs {
    /// Relative path within the workspace.
    path: String,
}

/// Read a file from the workspace. Path must stay within the sandbox.
///
/// Output beyond `max_output_chars` is truncated with a marker so tool
/// results stay small enough for persona context budgets.
pub struct ReadFileTool {
    root: PathBuf,
    max_output_chars: usize,
}

impl ReadFileTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            max_output_chars: 6000,
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file within the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        let full_path = sandbox_check(&self.root, &args.path)?;
        let content = std::fs::read_to_string(&full_path)?;

        if self.max_output_chars > 0 && content.len() > self.max_output_chars {
            let lines: Vec<&str> = content.lines().collect();
            let total_lines = lines.len();
            let mut truncated = String::with_capacity(self.max_output_chars + 100);
            let mut chars = 0;
            let mut included = 0;
            for line in &lines {
                let line_len = line.len() + 1;
                if chars + line_len > self.max_output_chars {
                    break;
                }
                truncated.push_str(line);
                truncated.push('\n');
                chars += line_len;
                included += 1;
            }
            truncated.push_str(&format!(
                "[...{} more lines truncated...]\n",
                total_lines - included
            ));
            Ok(truncated)
        } else {
            Ok(content)
        }
    }
}

// ---------------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WriteFileArgs {
    /// Relative path within the workspace.
    path: String,
    /// The content to write.
    content: String,
}

/// Write content to a file in the workspace. Creates parent directories.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative path to the file within the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        // Reject traversal lexically before creating any parent directory.
        if Path::new(&args.path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ToolError::Sandbox(args.path));
        }
        if let Some(parent) = self.root.join(&args.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let full_path = sandbox_check(&self.root, &args.path)?;
        std::fs::write(&full_path, &args.content)?;
        Ok(format!("wrote {} bytes to {}", args.content.len(), args.path))
    }
}

// ---------------------------------------------------------------------------
// list_files
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListFilesArgs {
    /// Relative directory path. Defaults to the workspace root.
    #[serde(default)]
    path: Option<String>,
}

/// List directory entries in the workspace, directories suffixed with `/`.
pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List directory entries in the workspace"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Relative directory path; omit for the workspace root"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ListFilesArgs = parse_args(args)?;
        let rel = args.path.as_deref().unwrap_or(".");
        let dir = sandbox_check(&self.root, rel)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_dir() {
                names.push(format!("{}/", name));
            } else {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.join("\n"))
    }
}
