// ABOUTME: Privilege dispatcher: the only path by which agent-driven shell
// ABOUTME: commands run. Classifies, authorizes, confirms, audits, executes.

mod audit;
mod classify;

use anyhow::{Context, Result};
use audit::Status;
use clap::{ArgGroup, Parser};
use classify::{classify, CommandClass, Internal, RiskLevel};
use std::ffi::CString;
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

const ADMIN_GROUP: &str = "sudo";

#[derive(Parser)]
#[command(name = "marshal-dispatcher")]
#[command(about = "Privilege-gated command dispatch with audit trail")]
#[command(group(ArgGroup::new("danger_mode").required(true).args(["permit", "refuse"])))]
struct Cli {
    /// Permit dangerous-classified execution (confirmation still required)
    #[arg(short = 'y')]
    permit: bool,

    /// Refuse dangerous-classified execution outright
    #[arg(short = 'n')]
    refuse: bool,

    /// Command and arguments; a single quoted string is split on whitespace
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    marshal_log::init();
    let cli = Cli::parse();

    let tokens = split_command(&cli.command);
    let Some(name) = tokens.first().cloned() else {
        eprintln!("No command given.");
        return ExitCode::FAILURE;
    };

    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    let class = classify(&name);
    info!(command = %name, level = ?class.level, "Dispatch requested");

    let permit_dangerous = cli.permit && !cli.refuse;
    let verdict = enforce(
        &name,
        &user,
        &class,
        is_authorized(),
        permit_dangerous,
        confirm,
        &audit::log_path(),
    );

    match verdict {
        Verdict::Denied | Verdict::Refused => ExitCode::FAILURE,
        Verdict::Aborted => ExitCode::SUCCESS,
        Verdict::Execute => {
            let outcome = match class.internal {
                Some(Internal::Sched) => run_sched(&tokens),
                Some(Internal::Wipe) => run_wipe(),
                None => run_external(&tokens),
            };
            match outcome {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Execution failed: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Policy outcome for one dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// Passed every gate; hand off to the execution engine.
    Execute,
    /// Authorization failed.
    Denied,
    /// Dangerous and the caller disallowed dangerous execution.
    Refused,
    /// Dangerous and the operator declined the warning.
    Aborted,
}

/// Enforce the dispatch policy and audit the decision. Admin-or-above
/// requires authorization; dangerous additionally requires the permit flag
/// and an interactive confirmation.
fn enforce(
    name: &str,
    user: &str,
    class: &CommandClass,
    authorized: bool,
    permit_dangerous: bool,
    confirm: impl FnOnce(&str, &str) -> bool,
    audit_log: &Path,
) -> Verdict {
    if class.level >= RiskLevel::Admin && !authorized {
        println!("PERMISSION DENIED: '{name}' requires Admin privileges.");
        audit::record_at(audit_log, name, user, Status::Denied, "Unauthorized Group");
        return Verdict::Denied;
    }

    if class.level == RiskLevel::Dangerous {
        if !permit_dangerous {
            println!("Dangerous command '{name}' refused (dangerous execution not permitted).");
            audit::record_at(
                audit_log,
                name,
                user,
                Status::Aborted,
                "Dangerous execution not permitted",
            );
            return Verdict::Refused;
        }
        if !confirm(name, class.warning.unwrap_or("")) {
            println!("Operation Aborted.");
            audit::record_at(audit_log, name, user, Status::Aborted, "User declined warning");
            return Verdict::Aborted;
        }
    }

    audit::record_at(audit_log, name, user, Status::Allowed, "Passing to execution engine");
    Verdict::Execute
}

/// The whole command line may arrive as one quoted argument; split it so
/// both invocation shapes produce the same token list.
fn split_command(args: &[String]) -> Vec<String> {
    if args.len() == 1 && args[0].contains(char::is_whitespace) {
        return args[0].split_whitespace().map(str::to_string).collect();
    }
    args.to_vec()
}

/// Root, or a member of the admin group.
fn is_authorized() -> bool {
    let uid = nix::unistd::getuid();
    if uid.is_root() {
        return true;
    }
    let Ok(Some(user)) = nix::unistd::User::from_uid(uid) else {
        return false;
    };
    let Ok(Some(group)) = nix::unistd::Group::from_name(ADMIN_GROUP) else {
        return false;
    };
    let Ok(name) = CString::new(user.name) else {
        return false;
    };
    match nix::unistd::getgrouplist(&name, user.gid) {
        Ok(groups) => groups.contains(&group.gid),
        Err(e) => {
            warn!(error = %e, "Group lookup failed");
            false
        }
    }
}

/// Interactive last line of defense: requires a literal "yes".
fn confirm(name: &str, warning: &str) -> bool {
    println!("\n[PROTECTION BOUNDARY]");
    println!("!!! WARNING: You are attempting to run '{name}' !!!");
    if !warning.is_empty() {
        println!("Reason: {warning}");
    }
    print!("Confirm execution? (yes/no): ");
    let _ = std::io::stdout().flush();

    let mut reply = String::new();
    if std::io::stdin().lock().read_line(&mut reply).is_err() {
        return false;
    }
    reply.trim() == "yes"
}

/// Move a process to real-time round-robin scheduling at max priority.
fn run_sched(tokens: &[String]) -> Result<()> {
    let pid: i32 = tokens
        .get(1)
        .context("Usage: sched <pid>")?
        .parse()
        .context("PID must be numeric")?;

    let policy = libc::SCHED_RR;
    // SAFETY: sched_get_priority_max and sched_setscheduler take plain
    // scalars and a pointer to a param struct that outlives the call.
    let rc = unsafe {
        let param = libc::sched_param {
            sched_priority: libc::sched_get_priority_max(policy),
        };
        libc::sched_setscheduler(pid, policy, &param)
    };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            println!("Hint: scheduler changes require root.");
        }
        return Err(err).context("sched_setscheduler failed");
    }
    println!("PID {pid} is now running under SCHED_RR.");
    Ok(())
}

/// Sync filesystems, then drop the page cache, dentries, and inodes.
fn run_wipe() -> Result<()> {
    // SAFETY: sync takes no arguments and cannot fail.
    unsafe { libc::sync() };
    std::fs::write("/proc/sys/vm/drop_caches", "3\n")
        .context("writing /proc/sys/vm/drop_caches (root required)")?;
    println!("System caches cleared.");
    Ok(())
}

fn run_external(tokens: &[String]) -> Result<()> {
    let status = std::process::Command::new(&tokens[0])
        .args(&tokens[1..])
        .status()
        .with_context(|| format!("failed to execute '{}'", tokens[0]))?;
    if !status.success() {
        anyhow::bail!("'{}' exited with {status}", tokens[0]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_command_line_is_split_on_whitespace() {
        let args = vec!["ls -la /tmp".to_string()];
        assert_eq!(split_command(&args), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn pre_split_arguments_pass_through() {
        let args = vec!["ls".to_string(), "-la".to_string()];
        assert_eq!(split_command(&args), vec!["ls", "-la"]);
    }

    #[test]
    fn single_word_command_is_unchanged() {
        let args = vec!["uptime".to_string()];
        assert_eq!(split_command(&args), vec!["uptime"]);
    }

    #[test]
    fn external_execution_reports_success() {
        assert!(run_external(&["true".to_string()]).is_ok());
        assert!(run_external(&["false".to_string()]).is_err());
    }

    fn audit_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        (dir, path)
    }

    #[test]
    fn unauthorized_dangerous_command_is_denied_and_logged() {
        let (_dir, log) = audit_file();
        let verdict = enforce("rm", "alice", &classify("rm"), false, false, |_, _| true, &log);
        assert_eq!(verdict, Verdict::Denied);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("USER:alice CMD:rm STATUS:DENIED MSG:Unauthorized Group"));
    }

    #[test]
    fn refuse_flag_blocks_dangerous_even_for_admins() {
        let (_dir, log) = audit_file();
        let verdict = enforce("rm", "root", &classify("rm"), true, false, |_, _| true, &log);
        assert_eq!(verdict, Verdict::Refused);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("STATUS:ABORTED MSG:Dangerous execution not permitted"));
    }

    #[test]
    fn declined_warning_aborts_without_execution() {
        let (_dir, log) = audit_file();
        let verdict = enforce("wipe", "root", &classify("wipe"), true, true, |_, _| false, &log);
        assert_eq!(verdict, Verdict::Aborted);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("STATUS:ABORTED MSG:User declined warning"));
    }

    #[test]
    fn confirmed_dangerous_command_is_allowed_and_executed() {
        let (_dir, log) = audit_file();
        let class = classify("rm");
        let verdict = enforce("rm", "root", &class, true, true, |name, warning| {
            assert_eq!(name, "rm");
            assert!(!warning.is_empty());
            true
        }, &log);
        assert_eq!(verdict, Verdict::Execute);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("USER:root CMD:rm STATUS:ALLOWED MSG:Passing to execution engine"));
        assert!(run_external(&["true".to_string()]).is_ok());
    }

    #[test]
    fn user_level_command_skips_every_gate() {
        let (_dir, log) = audit_file();
        let verdict = enforce(
            "ls",
            "bob",
            &classify("ls"),
            false,
            false,
            |_, _| panic!("confirmation must not be requested"),
            &log,
        );
        assert_eq!(verdict, Verdict::Execute);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("CMD:ls STATUS:ALLOWED"));
    }

    #[test]
    fn cli_requires_a_danger_mode_flag() {
        assert!(Cli::try_parse_from(["marshal-dispatcher", "ls"]).is_err());
        assert!(Cli::try_parse_from(["marshal-dispatcher", "-y", "ls"]).is_ok());
        assert!(Cli::try_parse_from(["marshal-dispatcher", "-n", "ls", "-la"]).is_ok());
        assert!(Cli::try_parse_from(["marshal-dispatcher", "-y", "-n", "ls"]).is_err());
    }
}
