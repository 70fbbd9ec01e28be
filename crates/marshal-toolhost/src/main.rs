// ABOUTME: Worker binary serving the built-in system tools over stdio.
// ABOUTME: One JSON-RPC message per stdin line, one response per stdout line.

mod tools;

use marshal_json::{build, extract};
use std::io::{BufRead, Write};
use tracing::{debug, error};

fn main() {
    marshal_log::init();

    let catalog = tools::Catalog::from_env();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = handle_line(&catalog, &line) {
            if writeln!(stdout, "{reply}").and_then(|_| stdout.flush()).is_err() {
                break;
            }
        }
    }
}

/// Process one request line. Notifications produce no reply.
fn handle_line(catalog: &tools::Catalog, line: &str) -> Option<String> {
    let request = marshal_rpc::parse_request(line);
    debug!(method = %request.method, "Received request");
    if request.is_notification {
        return None;
    }

    let result = match request.method.as_str() {
        "initialize" => initialize_result(),
        "tools/list" => catalog.listing(),
        "tools/call" => {
            let name = extract::get_string(&request.params, "name");
            let arguments = extract::get_object(&request.params, "arguments");
            let allow_dangerous = extract::get_bool(&request.params, "exec_dangerous");
            match catalog.run(&name, &arguments, allow_dangerous) {
                Some(output) => build::object(&[(
                    "content",
                    build::array(&[build::object(&[
                        ("type", build::string("text")),
                        ("text", build::string(&output)),
                    ])]),
                )]),
                None => {
                    error!(tool = %name, "Tool not found");
                    build::object(&[
                        ("isError", build::boolean(true)),
                        (
                            "content",
                            build::array(&[build::object(&[
                                ("type", build::string("text")),
                                ("text", build::string("Unknown tool")),
                            ])]),
                        ),
                    ])
                }
            }
        }
        _ => "{}".to_string(),
    };

    Some(marshal_rpc::response(request.id, &result))
}

fn initialize_result() -> String {
    build::object(&[
        (
            "protocolVersion",
            build::string(marshal_rpc::PROTOCOL_VERSION),
        ),
        (
            "serverInfo",
            build::object(&[
                ("name", build::string("marshal-toolhost")),
                ("version", build::string(env!("CARGO_PKG_VERSION"))),
            ]),
        ),
        ("capabilities", build::object(&[("tools", "{}".to_string())])),
    ])
}
