//! Tcl list syntax: splitting a string into elements and quoting elements
//! back into a canonical list.

/// Split `s` into list elements.
pub fn parse_list(s: &str) -> Result<Vec<String>, String> {
    let bytes = s.as_bytes();
    let mut items = Vec::new();
    let mut i = 0;

    loop {
        while i < bytes.len() && is_list_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() {
            return Ok(items);
        }

        match bytes[i] {
            b'{' => {
                let mut depth = 1;
                let start = i + 1;
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 1,
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err("unmatched open brace in list".into());
                }
                items.push(s[start..i].to_owned());
                i += 1;
                if i < bytes.len() && !is_list_space(bytes[i]) {
                    return Err("list element in braces followed by \"".to_owned()
                        + &trailing(s, i)
                        + "\" instead of space");
                }
            }
            b'"' => {
                i += 1;
                let mut out = String::new();
                let mut lit = i;
                loop {
                    if i >= bytes.len() {
                        return Err("unmatched open quote in list".into());
                    }
                    match bytes[i] {
                        b'"' => break,
                        b'\\' => {
                            out.push_str(&s[lit..i]);
                            let (text, next) = backslash(s, i);
                            out.push_str(&text);
                            i = next;
                            lit = i;
                        }
                        _ => i += 1,
                    }
                }
                out.push_str(&s[lit..i]);
                items.push(out);
                i += 1;
                if i < bytes.len() && !is_list_space(bytes[i]) {
                    return Err("list element in quotes followed by \"".to_owned()
                        + &trailing(s, i)
                        + "\" instead of space");
                }
            }
            _ => {
                let mut out = String::new();
                let mut lit = i;
                while i < bytes.len() && !is_list_space(bytes[i]) {
                    if bytes[i] == b'\\' {
                        out.push_str(&s[lit..i]);
                        let (text, next) = backslash(s, i);
                        out.push_str(&text);
                        i = next;
                        lit = i;
                    } else {
                        i += 1;
                    }
                }
                out.push_str(&s[lit..i]);
                items.push(out);
            }
        }
    }
}

fn trailing(s: &str, i: usize) -> String {
    s[i..].chars().take_while(|c| !c.is_whitespace()).collect()
}

fn is_list_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

/// Quote one element so that [`parse_list`] reads it back unchanged.
pub fn quote_element(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_owned();
    }
    let special = |c: char| {
        matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c' | '{' | '}' | '[' | ']' | '$' | '"' | ';' | '\\')
    };
    if !s.contains(special) && !s.starts_with('#') {
        return s.to_owned();
    }
    if braces_balanced(s) && !s.ends_with('\\') && !s.contains("\\\n") {
        return format!("{{{s}}}");
    }
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            c if special(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn braces_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Join elements into a canonical list string.
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| quote_element(s.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the backslash sequence starting at byte `i` (which holds `\`).
///
/// Returns the replacement text and the index just past the sequence.
pub fn backslash(s: &str, i: usize) -> (String, usize) {
    let bytes = s.as_bytes();
    let Some(&next) = bytes.get(i + 1) else {
        return ("\\".to_owned(), i + 1);
    };
    let simple = |c: char| (c.to_string(), i + 2);
    match next {
        b'a' => simple('\x07'),
        b'b' => simple('\x08'),
        b'f' => simple('\x0c'),
        b'n' => simple('\n'),
        b'r' => simple('\r'),
        b't' => simple('\t'),
        b'v' => simple('\x0b'),
        b'\n' => {
            let mut j = i + 2;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
                j += 1;
            }
            (" ".to_owned(), j)
        }
        b'x' => hex_escape(s, i + 2, 2).unwrap_or_else(|| simple('x')),
        b'u' => hex_escape(s, i + 2, 4).unwrap_or_else(|| simple('u')),
        b'U' => hex_escape(s, i + 2, 8).unwrap_or_else(|| simple('U')),
        b'0'..=b'7' => {
            let mut j = i + 1;
            let mut value = 0u32;
            while j < bytes.len() && j < i + 4 && matches!(bytes[j], b'0'..=b'7') {
                value = value * 8 + u32::from(bytes[j] - b'0');
                j += 1;
            }
            let c = char::from_u32(value & 0xff).unwrap_or('\u{fffd}');
            (c.to_string(), j)
        }
        _ => {
            // Any other character stands for itself.
            let c = s[i + 1..].chars().next().unwrap_or('\\');
            (c.to_string(), i + 1 + c.len_utf8())
        }
    }
}

fn hex_escape(s: &str, start: usize, max: usize) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    let mut j = start;
    let mut value = 0u32;
    while j < bytes.len() && j < start + max && bytes[j].is_ascii_hexdigit() {
        value = value * 16 + (bytes[j] as char).to_digit(16).unwrap_or(0);
        j += 1;
    }
    if j == start {
        return None;
    }
    let c = char::from_u32(value).unwrap_or('\u{fffd}');
    Some((c.to_string(), j))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_words() {
        assert_eq!(parse_list("a b  c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(parse_list("  ").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn split_braced_and_quoted() {
        assert_eq!(
            parse_list("{a b} \"c d\" {x {y z}}").unwrap(),
            vec!["a b", "c d", "x {y z}"]
        );
        assert_eq!(parse_list("a\\ b c").unwrap(), vec!["a b", "c"]);
    }

    #[test]
    fn split_errors() {
        assert!(parse_list("{a b").is_err());
        assert!(parse_list("\"a b").is_err());
        assert!(parse_list("{a}b").is_err());
    }

    #[test]
    fn quoting_round_trips() {
        for item in ["", "plain", "two words", "{", "}", "a}b{", "back\\", "$x", "#c", "new\nline"] {
            let list = format_list(&[item, "tail"]);
            assert_eq!(parse_list(&list).unwrap(), vec![item, "tail"], "{list}");
        }
    }

    #[test]
    fn backslash_sequences() {
        assert_eq!(backslash("\\n", 0), ("\n".to_owned(), 2));
        assert_eq!(backslash("\\x41z", 0), ("A".to_owned(), 4));
        assert_eq!(backslash("\\u00e9", 0), ("é".to_owned(), 6));
        assert_eq!(backslash("\\101", 0), ("A".to_owned(), 4));
        assert_eq!(backslash("\\$", 0), ("$".to_owned(), 2));
        assert_eq!(backslash("\\\n   x", 0), (" ".to_owned(), 5));
        assert_eq!(backslash("\\xg", 0), ("x".to_owned(), 2));
    }
}
