// ABOUTME: Shared structural scanner used by every extraction path.
// ABOUTME: Tracks string-literal state so quoted braces never miscount depth.

/// Cursor over JSON-ish text. All depth counting goes through here, so a
/// `{` or `[` inside a quoted value can never skew an extraction.
pub(crate) struct Scanner<'a> {
    bytes: &'a [u8],
    pub(crate) pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn at(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Consume a string literal starting at the current `"`. Returns the span
    /// including both quotes, or None if the literal never terminates.
    pub(crate) fn scan_string(&mut self) -> Option<(usize, usize)> {
        if self.peek() != Some(b'"') {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Some((start, self.pos));
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.bytes.len();
        None
    }

    /// Consume a balanced `{...}` or `[...]` starting at the current byte.
    /// Returns the full span, or None when the input runs out first.
    pub(crate) fn scan_balanced(&mut self) -> Option<(usize, usize)> {
        let open = self.peek()?;
        let close = match open {
            b'{' => b'}',
            b'[' => b']',
            _ => return None,
        };
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            if c == b'"' {
                self.scan_string()?;
                continue;
            }
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    return Some((start, self.pos));
                }
            }
            self.pos += 1;
        }
        None
    }

    /// Consume a bare scalar (number, true, false, null) up to a delimiter.
    pub(crate) fn scan_scalar(&mut self) -> (usize, usize) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.pos += 1;
        }
        (start, self.pos)
    }

    /// Consume any value form. Returns its span, or None on malformed input.
    pub(crate) fn scan_value(&mut self) -> Option<(usize, usize)> {
        match self.peek()? {
            b'"' => self.scan_string(),
            b'{' | b'[' => self.scan_balanced(),
            _ => {
                let span = self.scan_scalar();
                if span.0 == span.1 {
                    None
                } else {
                    Some(span)
                }
            }
        }
    }
}

/// Locate `"key":` anywhere in the text (first occurrence wins, matching at
/// any nesting depth) and return the byte offset of its value. String
/// literals are consumed whole, so a key-shaped substring inside a quoted
/// value never matches.
pub(crate) fn find_key(text: &str, key: &str) -> Option<usize> {
    let mut s = Scanner::new(text);
    while let Some(c) = s.peek() {
        if c != b'"' {
            s.pos += 1;
            continue;
        }
        let (start, end) = s.scan_string()?;
        let inner = &text[start + 1..end - 1];
        s.skip_ws();
        if s.peek() != Some(b':') {
            continue;
        }
        s.pos += 1;
        if inner == key {
            s.skip_ws();
            return Some(s.pos);
        }
    }
    None
}
