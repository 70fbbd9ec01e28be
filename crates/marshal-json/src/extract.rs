// ABOUTME: Key-based extraction over JSON-ish text, not a full grammar.
// ABOUTME: Every extractor returns a neutral value on missing/malformed input.

use crate::scan::{find_key, Scanner};

/// Undo the escapes produced by `build::escape`.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Extract and unescape the string value of `key`. Neutral: `""`.
pub fn get_string(json: &str, key: &str) -> String {
    let Some(pos) = find_key(json, key) else {
        return String::new();
    };
    let mut s = Scanner::at(json, pos);
    match s.scan_string() {
        Some((start, end)) => unescape(&json[start + 1..end - 1]),
        None => String::new(),
    }
}

/// Extract the object value of `key` as a raw fragment. Neutral: `"{}"`.
pub fn get_object(json: &str, key: &str) -> String {
    extract_balanced(json, key, b'{').unwrap_or_else(|| "{}".to_string())
}

/// Extract the array value of `key` as a raw fragment. Neutral: `"[]"`.
pub fn get_array(json: &str, key: &str) -> String {
    extract_balanced(json, key, b'[').unwrap_or_else(|| "[]".to_string())
}

fn extract_balanced(json: &str, key: &str, open: u8) -> Option<String> {
    let pos = find_key(json, key)?;
    let mut s = Scanner::at(json, pos);
    if s.peek() != Some(open) {
        return None;
    }
    let (start, end) = s.scan_balanced()?;
    Some(json[start..end].to_string())
}

/// Extract the integer value of `key`. Neutral: `0`.
pub fn get_number(json: &str, key: &str) -> i64 {
    let Some(pos) = find_key(json, key) else {
        return 0;
    };
    let mut s = Scanner::at(json, pos);
    let (start, end) = s.scan_scalar();
    json[start..end].parse().unwrap_or(0)
}

/// Extract the boolean value of `key`. Neutral: `false`.
pub fn get_bool(json: &str, key: &str) -> bool {
    let Some(pos) = find_key(json, key) else {
        return false;
    };
    json[pos..].starts_with("true")
}

/// True if `key` appears in key position anywhere in the text.
pub fn has_key(json: &str, key: &str) -> bool {
    find_key(json, key).is_some()
}

/// Pull the first top-level `{...}` out of arbitrary text. Used to read one
/// element from an array of objects. Neutral: `"{}"`.
pub fn first_object(text: &str) -> String {
    let Some(offset) = text.find('{') else {
        return "{}".to_string();
    };
    let mut s = Scanner::at(text, offset);
    match s.scan_balanced() {
        Some((start, end)) => text[start..end].to_string(),
        None => "{}".to_string(),
    }
}

/// Split an array fragment (`[...]`) into its top-level element fragments.
pub fn array_items(array: &str) -> Vec<String> {
    let trimmed = array.trim();
    if !trimmed.starts_with('[') {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut s = Scanner::at(trimmed, 1);
    loop {
        s.skip_ws();
        match s.peek() {
            None | Some(b']') => break,
            Some(b',') => {
                s.pos += 1;
                continue;
            }
            _ => {}
        }
        let Some((start, end)) = s.scan_value() else {
            break;
        };
        items.push(trimmed[start..end].to_string());
    }
    items
}

/// Extract an array of strings under `key`, unescaped. Neutral: empty vec.
pub fn get_string_array(json: &str, key: &str) -> Vec<String> {
    array_items(&get_array(json, key))
        .into_iter()
        .filter(|item| item.starts_with('"') && item.ends_with('"') && item.len() >= 2)
        .map(|item| unescape(&item[1..item.len() - 1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_extraction_unescapes() {
        let json = r#"{"name":"line\none","other":"x"}"#;
        assert_eq!(get_string(json, "name"), "line\none");
    }

    #[test]
    fn missing_keys_yield_neutral_values() {
        assert_eq!(get_string("{}", "name"), "");
        assert_eq!(get_object("{}", "params"), "{}");
        assert_eq!(get_array("{}", "tools"), "[]");
        assert_eq!(get_number("{}", "id"), 0);
        assert!(!get_bool("{}", "flag"));
        assert_eq!(first_object("no json here"), "{}");
    }

    #[test]
    fn malformed_input_never_panics() {
        assert_eq!(get_object(r#"{"a": {"b": 1"#, "a"), "{}");
        assert_eq!(get_string(r#"{"a": "unterminated"#, "a"), "");
        assert_eq!(first_object("{{{"), "{}");
    }

    #[test]
    fn braces_inside_strings_do_not_skew_depth() {
        let json = r#"{"outer":{"note":"a } b { c","n":1},"next":2}"#;
        assert_eq!(get_object(json, "outer"), r#"{"note":"a } b { c","n":1}"#);
        assert_eq!(get_number(json, "next"), 2);
    }

    #[test]
    fn brackets_inside_strings_do_not_skew_arrays() {
        let json = r#"{"list":["a ] b","c"],"tail":3}"#;
        assert_eq!(get_array(json, "list"), r#"["a ] b","c"]"#);
        assert_eq!(get_string_array(json, "list"), vec!["a ] b", "c"]);
    }

    #[test]
    fn key_shaped_text_inside_values_is_ignored() {
        let json = r#"{"content":"fake \"id\": 99 here","id":7}"#;
        assert_eq!(get_number(json, "id"), 7);
    }

    #[test]
    fn first_object_skips_leading_noise() {
        let text = "server booting...\n{\"id\": 1, \"ok\": true} trailing";
        assert_eq!(first_object(text), r#"{"id": 1, "ok": true}"#);
    }

    #[test]
    fn array_items_splits_mixed_elements() {
        let items = array_items(r#"[{"a":1}, "x", 3, [4]]"#);
        assert_eq!(items, vec![r#"{"a":1}"#, r#""x""#, "3", "[4]"]);
    }

    #[test]
    fn get_bool_reads_literals() {
        assert!(get_bool(r#"{"exec_dangerous": true}"#, "exec_dangerous"));
        assert!(!get_bool(r#"{"exec_dangerous": false}"#, "exec_dangerous"));
    }

    #[test]
    fn nested_key_matches_first_occurrence() {
        let json = r#"{"result":{"tools":[{"name":"inner"}]},"name":"outer"}"#;
        assert_eq!(get_string(json, "name"), "inner");
    }
}
