// ABOUTME: Risk classification of commands before dispatch.
// ABOUTME: Internal command table plus a denylist of destructive binaries.

/// Privilege required to run a command. Ordered: admin-or-above triggers
/// the authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    User,
    Admin,
    Dangerous,
}

/// Commands handled in-process instead of exec'd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Internal {
    Sched,
    Wipe,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandClass {
    pub level: RiskLevel,
    pub warning: Option<&'static str>,
    pub internal: Option<Internal>,
}

/// Binaries that are destructive enough to always require confirmation.
const DENYLIST: &[&str] = &[
    "rm",
    "rmdir",
    "dd",
    "mkfs",
    "fdisk",
    "reboot",
    "shutdown",
    "chmod",
    "chown",
    "run_shell_command.sh",
];

pub fn classify(name: &str) -> CommandClass {
    match name {
        "sched" => CommandClass {
            level: RiskLevel::Admin,
            warning: None,
            internal: Some(Internal::Sched),
        },
        "wipe" => CommandClass {
            level: RiskLevel::Dangerous,
            warning: Some("This clears system caches and logs."),
            internal: Some(Internal::Wipe),
        },
        _ if DENYLIST.contains(&name) => CommandClass {
            level: RiskLevel::Dangerous,
            warning: Some("This is a destructive system utility."),
            internal: None,
        },
        _ => CommandClass {
            level: RiskLevel::User,
            warning: None,
            internal: None,
        },
    }
}
