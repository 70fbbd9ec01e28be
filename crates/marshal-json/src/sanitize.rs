// ABOUTME: Best-effort cleanup of upstream tool schemas before re-sending.
// ABOUTME: Strips API-unsupported metadata keys and repairs malformed tails.

use crate::scan::Scanner;

/// Metadata members some model APIs reject outright.
const STRIPPED_KEYS: &[&str] = &["$schema", "$id", "additionalProperties", "format"];

/// Clean a tool schema fragment for forwarding to a model API: drop
/// unsupported metadata members, then repair dangling braces, unterminated
/// strings, and trailing commas. Best effort, not validation.
pub fn sanitize_schema(schema: &str) -> String {
    let mut out = schema.trim().to_string();
    if out.is_empty() {
        return "{}".to_string();
    }
    for key in STRIPPED_KEYS {
        while let Some(cleaned) = remove_member(&out, key) {
            out = cleaned;
        }
    }
    repair(&out)
}

/// Remove one `"key": value` member, along with one adjacent comma.
/// None when the key is absent or its value cannot be scanned.
fn remove_member(json: &str, key: &str) -> Option<String> {
    let mut s = Scanner::new(json);
    loop {
        match s.peek() {
            None => return None,
            Some(b'"') => {}
            Some(_) => {
                s.pos += 1;
                continue;
            }
        }
        let (key_start, key_end) = s.scan_string()?;
        s.skip_ws();
        if s.peek() != Some(b':') {
            continue;
        }
        s.pos += 1;
        s.skip_ws();
        if &json[key_start + 1..key_end - 1] != key {
            continue;
        }
        let (_, value_end) = s.scan_value()?;

        let mut start = key_start;
        let mut end = value_end;
        let before: String = json[..start].trim_end().to_string();
        let after = json[end..].trim_start();
        if before.ends_with(',') {
            start = before.len() - 1;
        } else if let Some(rest) = after.strip_prefix(',') {
            end = json.len() - rest.len();
        }
        return Some(format!("{}{}", &json[..start], &json[end..]));
    }
}

/// Close unterminated strings, drop trailing commas, and balance any
/// unclosed braces/brackets at the end of the text.
fn repair(json: &str) -> String {
    let bytes = json.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(json.len() + 4);
    let mut stack: Vec<u8> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let mut s = Scanner::at(json, i);
                match s.scan_string() {
                    Some((start, end)) => {
                        out.extend_from_slice(&bytes[start..end]);
                        i = end;
                    }
                    None => {
                        out.extend_from_slice(&bytes[i..]);
                        out.push(b'"');
                        i = bytes.len();
                    }
                }
            }
            b'{' => {
                stack.push(b'}');
                out.push(b'{');
                i += 1;
            }
            b'[' => {
                stack.push(b']');
                out.push(b'[');
                i += 1;
            }
            c @ (b'}' | b']') => {
                stack.pop();
                out.push(c);
                i += 1;
            }
            b',' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j >= bytes.len() || matches!(bytes[j], b'}' | b']') {
                    i += 1; // trailing comma, drop it
                } else {
                    out.push(b',');
                    i += 1;
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    while let Some(close) = stack.pop() {
        out.push(close);
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
