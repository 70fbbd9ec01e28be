// ABOUTME: JSON-RPC 2.0 protocol codec: request/notification/response/error.
// ABOUTME: Parsing correlates by id; absence of an id marks a notification.

use marshal_json::{build, extract};

/// Protocol version tag carried by the MCP handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A parsed incoming request or notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub id: i64,
    pub method: String,
    /// Raw params fragment: an object, or an array when the caller sent one.
    pub params: String,
    pub is_notification: bool,
}

/// A parsed response, possibly error-shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub id: i64,
    /// Raw result fragment; `"{}"` when absent.
    pub result: String,
    /// Raw error fragment; `"{}"` when absent.
    pub error: String,
    pub is_error: bool,
}

/// Build a request envelope. `params` is a pre-rendered fragment.
pub fn request(id: i64, method: &str, params: &str) -> String {
    build::object(&[
        ("jsonrpc", build::string("2.0")),
        ("id", build::number(id)),
        ("method", build::string(method)),
        ("params", params.to_string()),
    ])
}

/// Build a notification envelope (no id, no reply expected).
pub fn notification(method: &str, params: &str) -> String {
    build::object(&[
        ("jsonrpc", build::string("2.0")),
        ("method", build::string(method)),
        ("params", params.to_string()),
    ])
}

/// Build a success response envelope. `result` is a pre-rendered fragment.
pub fn response(id: i64, result: &str) -> String {
    build::object(&[
        ("jsonrpc", build::string("2.0")),
        ("id", build::number(id)),
        ("result", result.to_string()),
    ])
}

/// Build an error response envelope.
pub fn error(id: i64, code: i64, message: &str) -> String {
    build::object(&[
        ("jsonrpc", build::string("2.0")),
        ("id", build::number(id)),
        (
            "error",
            build::object(&[
                ("code", build::number(code)),
                ("message", build::string(message)),
            ]),
        ),
    ])
}

/// Parse an incoming message as a request. A missing id means notification.
pub fn parse_request(json: &str) -> Request {
    let mut req = Request {
        method: extract::get_string(json, "method"),
        ..Default::default()
    };

    if extract::has_key(json, "id") {
        req.id = extract::get_number(json, "id");
    } else {
        req.is_notification = true;
    }

    req.params = extract::get_object(json, "params");
    if req.params == "{}" {
        let arr = extract::get_array(json, "params");
        if arr != "[]" {
            req.params = arr;
        }
    }

    req
}

/// Parse an incoming message as a response.
pub fn parse_response(json: &str) -> Response {
    let mut resp = Response {
        id: extract::get_number(json, "id"),
        result: extract::get_object(json, "result"),
        error: "{}".to_string(),
        ..Default::default()
    };

    if extract::has_key(json, "error") {
        resp.is_error = true;
        resp.error = extract::get_object(json, "error");
    }

    resp
}

/// Return the `result` fragment, or the whole message when it has none.
/// Defensive fallback for workers that reply with bare payloads.
pub fn extract_result(json: &str) -> String {
    let result = extract::get_object(json, "result");
    if result != "{}" {
        return result;
    }
    json.to_string()
}
