// ABOUTME: Static catalog of built-in system tools backed by shell scripts.
// ABOUTME: Extracts per-tool arguments and captures script output.

use marshal_json::{build, extract};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, error};

const DEFAULT_TOOLS_DIR: &str = "/usr/local/share/marshal/tools";

struct ToolMeta {
    name: &'static str,
    script: &'static str,
    description: &'static str,
    input_schema: &'static str,
}

const TOOLS: &[ToolMeta] = &[
    ToolMeta {
        name: "get_top_cpu",
        script: "get_top_cpu.sh",
        description: "Get top CPU processes",
        input_schema: r#"{"type":"object","properties":{"count":{"type":"integer"}}}"#,
    },
    ToolMeta {
        name: "system_uptime",
        script: "system_uptime.sh",
        description: "Show system uptime",
        input_schema: r#"{"type":"object","properties":{}}"#,
    },
    ToolMeta {
        name: "check_port_usage",
        script: "check_port_usage.sh",
        description: "Check port usage",
        input_schema: r#"{"type":"object","properties":{"port":{"type":"integer"}},"required":["port"]}"#,
    },
    ToolMeta {
        name: "list_directory",
        script: "list_directory.sh",
        description: "List directory",
        input_schema: r#"{"type":"object","properties":{"path":{"type":"string"}}}"#,
    },
    ToolMeta {
        name: "get_process_threads",
        script: "get_process_threads.sh",
        description: "List process threads",
        input_schema: r#"{"type":"object","properties":{"pid":{"type":"integer"}},"required":["pid"]}"#,
    },
    ToolMeta {
        name: "get_process_tree",
        script: "get_process_tree.sh",
        description: "Show process tree",
        input_schema: r#"{"type":"object","properties":{"pid":{"type":"integer"}}}"#,
    },
    ToolMeta {
        name: "check_io_status",
        script: "check_io_status.sh",
        description: "Check system IO",
        input_schema: r#"{"type":"object","properties":{}}"#,
    },
    ToolMeta {
        name: "get_active_connections",
        script: "get_active_connections.sh",
        description: "List network connections",
        input_schema: r#"{"type":"object","properties":{}}"#,
    },
    ToolMeta {
        name: "run_shell_command",
        script: "run_shell_command.sh",
        description: "Run a shell command",
        input_schema: r#"{"type":"object","properties":{"command":{"type":"string"}},"required":["command"]}"#,
    },
    ToolMeta {
        name: "run_secure_shell_command",
        script: "",
        description: "Run a shell command through the privilege dispatcher",
        input_schema: r#"{"type":"object","properties":{"command":{"type":"string"}},"required":["command"]}"#,
    },
];

pub struct Catalog {
    tools_dir: PathBuf,
}

impl Catalog {
    pub fn new(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
        }
    }

    /// Tools dir from MARSHAL_TOOLS_DIR, defaulting to the install location.
    pub fn from_env() -> Self {
        let dir = std::env::var("MARSHAL_TOOLS_DIR")
            .unwrap_or_else(|_| DEFAULT_TOOLS_DIR.to_string());
        Self::new(dir)
    }

    /// The tools/list result fragment.
    pub fn listing(&self) -> String {
        let entries: Vec<String> = TOOLS
            .iter()
            .map(|t| {
                build::object(&[
                    ("name", build::string(t.name)),
                    ("description", build::string(t.description)),
                    ("inputSchema", t.input_schema.to_string()),
                ])
            })
            .collect();
        build::object(&[("tools", build::array(&entries))])
    }

    /// Run a tool by name. None means the tool is not in the catalog;
    /// execution failures become error text in the output.
    pub fn run(&self, name: &str, arguments: &str, allow_dangerous: bool) -> Option<String> {
        let tool = TOOLS.iter().find(|t| t.name == name)?;

        if tool.name == "run_secure_shell_command" {
            return Some(self.run_dispatched(arguments, allow_dangerous));
        }

        let script = self.tools_dir.join(tool.script);
        let args = script_args(tool.name, arguments);
        debug!(tool = %name, script = %script.display(), ?args, "Executing tool script");
        Some(capture(Command::new(&script).args(&args)))
    }

    /// Route through the privilege dispatcher, forwarding the dangerous
    /// flag as -y/-n.
    fn run_dispatched(&self, arguments: &str, allow_dangerous: bool) -> String {
        let command = extract::get_string(arguments, "command");
        if command.is_empty() {
            return "Error: command is required".to_string();
        }
        let flag = if allow_dangerous { "-y" } else { "-n" };
        capture(Command::new(dispatcher_path()).arg(flag).arg(&command))
    }
}

/// Positional arguments each script expects, pulled from the JSON fragment.
fn script_args(tool: &str, arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    match tool {
        "check_port_usage" => {
            let port = extract::get_number(arguments, "port");
            if port != 0 {
                args.push(port.to_string());
            }
        }
        "list_directory" => {
            let mut path = extract::get_string(arguments, "path");
            if path.is_empty() {
                path = ".".to_string();
            }
            args.push(path);
        }
        "get_process_threads" | "get_process_tree" => {
            let pid = extract::get_number(arguments, "pid");
            if pid != 0 {
                args.push(pid.to_string());
            }
        }
        "get_top_cpu" => {
            let count = extract::get_number(arguments, "count");
            if count != 0 {
                args.push(count.to_string());
            }
        }
        "run_shell_command" => {
            let command = extract::get_string(arguments, "command");
            if !command.is_empty() {
                args.push(command);
            }
        }
        _ => {}
    }
    args
}

/// Run a command and return trimmed stdout, or error text on failure.
fn capture(command: &mut Command) -> String {
    match command.output() {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            if output.stdout.is_empty() && !output.status.success() {
                text = String::from_utf8_lossy(&output.stderr).into_owned();
            }
            text.trim_end_matches('\n').to_string()
        }
        Err(e) => {
            error!(error = %e, "Tool script execution failed");
            "Error: Failed to execute tool script".to_string()
        }
    }
}

/// The dispatcher binary is installed beside this one; fall back to PATH.
fn dispatcher_path() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name("marshal-dispatcher");
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from("marshal-dispatcher")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn script_receives_positional_arguments() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "list_directory.sh", "echo \"listing $1\"");
        let catalog = Catalog::new(dir.path());

        let output = catalog
            .run("list_directory", r#"{"path":"/tmp"}"#, false)
            .unwrap();
        assert_eq!(output, "listing /tmp");
    }

    #[test]
    fn missing_path_defaults_to_current_directory() {
        assert_eq!(script_args("list_directory", "{}"), vec!["."]);
    }

    #[test]
    fn numeric_arguments_are_forwarded() {
        assert_eq!(
            script_args("check_port_usage", r#"{"port":8080}"#),
            vec!["8080"]
        );
        assert_eq!(
            script_args("get_process_threads", r#"{"pid":42}"#),
            vec!["42"]
        );
    }

    #[test]
    fn unknown_tool_is_not_in_catalog() {
        let catalog = Catalog::new("/nonexistent");
        assert!(catalog.run("nope", "{}", false).is_none());
    }

    #[test]
    fn missing_script_degrades_to_error_text() {
        let catalog = Catalog::new("/nonexistent");
        let output = catalog.run("system_uptime", "{}", false).unwrap();
        assert!(output.starts_with("Error:"));
    }

    #[test]
    fn listing_is_valid_and_complete() {
        let listing = Catalog::new("/x").listing();
        let tools = extract::get_array(&listing, "tools");
        assert_eq!(extract::array_items(&tools).len(), TOOLS.len());
    }
}
