// ABOUTME: Interactive read-eval loop for the marshal session.
// ABOUTME: Slash commands for mode switching, worker control, and config.

use anyhow::Result;
use marshal_core::{create_backend, term, Config, Session};
use std::io::Write;
use tracing::info;

const HELP: &str = "\
/help            Show this help
/clear           Clear conversation history
/mode            Cycle controller: manual -> ollama -> gemini
/hil             Toggle the human approval gate
/list            Show registered tools
/servers         Show connected workers
/toggle <name>   Enable or disable a configured worker
/config          Re-run the configuration wizard
/quit            Exit";

pub async fn run(mut session: Session, mut config: Config) -> Result<()> {
    term::print_header("marshal", term::MAGENTA);
    println!(
        "  controller: {}{}{} | hil: {} | /help for commands\n",
        term::CYAN,
        session.registry().backend().name(),
        term::RESET,
        if session.human_in_loop { "on" } else { "off" },
    );

    loop {
        let Some(line) = prompt_line() else { break };
        let manual = session.registry().backend().name() == "manual";
        match interpret(&line, manual) {
            Action::Quit => break,
            Action::Ignore => continue,
            Action::Command(command) => {
                if !handle_command(&command, &mut session, &mut config).await? {
                    break;
                }
            }
            Action::Chat(message) => {
                session.run_turn(&message).await;
            }
        }
    }

    session.shutdown().await;
    println!("Goodbye.");
    Ok(())
}

/// Handle one slash command. Returns false when the session should end.
async fn handle_command(command: &str, session: &mut Session, config: &mut Config) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((n, a)) => (n, a.trim()),
        None => (command, ""),
    };

    match name {
        "help" => println!("{HELP}"),
        "clear" => {
            session.reset_history();
            println!("History cleared.");
        }
        "mode" => {
            config.default_provider = match session.registry().backend().name() {
                "manual" => "ollama".to_string(),
                "ollama" => "gemini".to_string(),
                _ => "manual".to_string(),
            };
            session
                .registry_mut()
                .set_backend(create_backend(config))
                .await;
            session.reset_history();
            info!(provider = %config.default_provider, "Controller switched");
            println!("Controller: {}", config.default_provider);
        }
        "hil" => {
            session.human_in_loop = !session.human_in_loop;
            println!(
                "Human approval gate: {}",
                if session.human_in_loop { "on" } else { "off" }
            );
        }
        "list" => {
            let entries: Vec<(String, String)> = session
                .registry()
                .backend()
                .tools()
                .iter()
                .map(|t| (t.name.clone(), t.description.clone()))
                .collect();
            term::display_tool_menu(&entries);
        }
        "servers" => {
            for worker in session.registry().workers() {
                println!("  {} [{:?}]", worker.name(), worker.state());
            }
            if session.registry().workers().is_empty() {
                println!("  No workers connected.");
            }
        }
        "toggle" => {
            if arg.is_empty() {
                println!("Usage: /toggle <worker-name>");
            } else {
                match config.toggle_worker(arg) {
                    Ok(true) => {
                        let worker = config.workers.iter().find(|w| w.name == arg);
                        let enabled = worker.map(|w| w.enabled).unwrap_or(false);
                        println!(
                            "Worker {arg} {} (takes effect on restart).",
                            if enabled { "enabled" } else { "disabled" }
                        );
                    }
                    Ok(false) => println!("No configured worker named '{arg}'."),
                    Err(e) => println!("{e}"),
                }
            }
        }
        "config" => {
            *config = Config::interactive_setup()?;
            session
                .registry_mut()
                .set_backend(create_backend(config))
                .await;
            session.human_in_loop = config.human_in_loop;
            session.turn_limit = config.turn_limit;
            session.reset_history();
        }
        "quit" | "exit" => return Ok(false),
        _ => println!("Unknown command: /{name} (try /help)"),
    }
    Ok(true)
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Quit,
    Ignore,
    Command(String),
    Chat(String),
}

/// Map one input line to a session action. Bare `exit` quits like `/quit`;
/// empty input in manual mode redisplays the tool menu.
fn interpret(line: &str, manual: bool) -> Action {
    let line = line.trim();
    if line.is_empty() {
        return if manual {
            Action::Chat("list".to_string())
        } else {
            Action::Ignore
        };
    }
    if line == "exit" {
        return Action::Quit;
    }
    if let Some(command) = line.strip_prefix('/') {
        return Action::Command(command.to_string());
    }
    Action::Chat(line.to_string())
}

fn prompt_line() -> Option<String> {
    print!("{}❯{} ", term::BOLD, term::RESET);
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_exit_quits_like_quit() {
        assert_eq!(interpret("exit", false), Action::Quit);
        assert_eq!(interpret("  exit  ", true), Action::Quit);
    }

    #[test]
    fn empty_input_shows_menu_in_manual_mode() {
        assert_eq!(interpret("", true), Action::Chat("list".to_string()));
        assert_eq!(interpret("   ", true), Action::Chat("list".to_string()));
        assert_eq!(interpret("", false), Action::Ignore);
    }

    #[test]
    fn slash_prefix_becomes_a_command() {
        assert_eq!(interpret("/servers", false), Action::Command("servers".to_string()));
        assert_eq!(
            interpret("/toggle files", false),
            Action::Command("toggle files".to_string())
        );
    }

    #[test]
    fn plain_text_goes_to_the_controller() {
        assert_eq!(
            interpret("show me the uptime", false),
            Action::Chat("show me the uptime".to_string())
        );
    }
}
