// ABOUTME: Small ANSI terminal helpers shared by the CLI and manual backend.
// ABOUTME: Boxes, headers, and the numbered tool menu.

pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const WHITE: &str = "\x1b[97m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

const BOX_WIDTH: usize = 80;

pub fn print_header(title: &str, color: &str) {
    let bar = "━".repeat(title.chars().count() + 2);
    println!("{color}┏{bar}┓{RESET}");
    println!("{color}┃ {BOLD}{title}{RESET}{color} ┃{RESET}");
    println!("{color}┗{bar}┛{RESET}");
}

/// Draw a titled box around multi-line content, wrapping long lines.
pub fn draw_box(title: &str, content: &str, color: &str) {
    let inner = BOX_WIDTH - 4;
    let pad = BOX_WIDTH.saturating_sub(title.chars().count() + 7);
    println!(
        "{color}╭──[ {BOLD}{title}{RESET}{color} ]{}╮{RESET}",
        "─".repeat(pad)
    );
    for line in content.lines() {
        let mut rest: Vec<char> = line.chars().collect();
        loop {
            let take = rest.len().min(inner);
            let part: String = rest[..take].iter().collect();
            let fill = inner - take;
            println!("{color}│ {RESET}{part}{}{color} │{RESET}", " ".repeat(fill));
            rest.drain(..take);
            if rest.is_empty() {
                break;
            }
        }
    }
    println!("{color}╰{}╯{RESET}", "─".repeat(BOX_WIDTH - 2));
}

/// Dimmed progress note, used while waiting on a model.
pub fn print_thought(thought: &str) {
    if thought.is_empty() {
        return;
    }
    for line in thought.lines() {
        println!("{DIM}┃ {line}{RESET}");
    }
}

/// Numbered menu of tools for manual selection and `/list`.
pub fn display_tool_menu(tools: &[(String, String)]) {
    if tools.is_empty() {
        draw_box("AVAILABLE TOOLS", "No tools available.", CYAN);
        return;
    }
    let mut menu = String::new();
    for (i, (name, description)) in tools.iter().enumerate() {
        let mut desc = description.clone();
        if desc.chars().count() > 48 {
            desc = desc.chars().take(46).collect::<String>() + "..";
        }
        menu.push_str(&format!("{:>2}. {name:<24} {desc}\n", i + 1));
    }
    draw_box("AVAILABLE TOOLS", menu.trim_end(), CYAN);
}
