// ABOUTME: JSON text builders: escaped strings, numbers, objects, arrays.
// ABOUTME: Objects take key/value pairs; arrays take pre-rendered fragments.

/// Escape a string for embedding inside a JSON string literal.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a quoted, escaped JSON string.
pub fn string(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

pub fn number(n: i64) -> String {
    n.to_string()
}

pub fn boolean(b: bool) -> String {
    if b { "true" } else { "false" }.to_string()
}

/// Render an object from key/value pairs. Values are pre-rendered JSON
/// fragments; member order carries no meaning on the wire.
pub fn object(members: &[(&str, String)]) -> String {
    let mut out = String::from("{");
    for (i, (k, v)) in members.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(k);
        out.push_str("\":");
        out.push_str(v);
    }
    out.push('}');
    out
}

/// Render an array from pre-rendered JSON fragments.
pub fn array(items: &[String]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(item);
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn builds_object_in_member_order() {
        let obj = object(&[("id", number(7)), ("name", string("x"))]);
        assert_eq!(obj, r#"{"id":7,"name":"x"}"#);
    }

    #[test]
    fn builds_array_from_fragments() {
        let arr = array(&["1".to_string(), "{}".to_string()]);
        assert_eq!(arr, "[1,{}]");
    }

    #[test]
    fn empty_collections() {
        assert_eq!(object(&[]), "{}");
        assert_eq!(array(&[]), "[]");
    }
}
