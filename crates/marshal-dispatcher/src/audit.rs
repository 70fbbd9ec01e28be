// ABOUTME: Append-only audit trail of dispatch decisions.
// ABOUTME: One timestamped line per decision, path overridable via env.

use chrono::Local;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_AUDIT_LOG: &str = "system_audit.log";

#[derive(Debug, Clone, Copy)]
pub enum Status {
    Allowed,
    Denied,
    Aborted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Allowed => "ALLOWED",
            Status::Denied => "DENIED",
            Status::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// Audit log location, overridable via MARSHAL_AUDIT_LOG.
pub fn log_path() -> PathBuf {
    std::env::var("MARSHAL_AUDIT_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG))
}

pub fn record_at(path: &Path, command: &str, user: &str, status: Status, message: &str) {
    let timestamp = Local::now().format("%a %b %e %H:%M:%S %Y");
    let line = format!("[{timestamp}] USER:{user} CMD:{command} STATUS:{status} MSG:{message}\n");
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to write audit log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_line_has_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        record_at(&path, "rm", "alice", Status::Denied, "Unauthorized Group");
        let contents = std::fs::read_to_string(&path).unwrap();

        assert!(contents.starts_with('['));
        assert!(contents.contains("] USER:alice CMD:rm STATUS:DENIED MSG:Unauthorized Group"));
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn records_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        record_at(&path, "ls", "bob", Status::Allowed, "Passing to execution engine");
        record_at(&path, "wipe", "bob", Status::Aborted, "User declined warning");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("STATUS:ALLOWED"));
        assert!(contents.contains("STATUS:ABORTED"));
    }
}
