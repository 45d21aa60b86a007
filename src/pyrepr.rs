// ABOUTME: Python-flavored literal formatting and string-literal parsing

/// Render a string the way Python's `repr` does.
///
/// Prefers single quotes, switching to double quotes when the text
/// contains a single quote but no double quote.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f || (0x80..0xa0).contains(&(c as u32)) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Render a byte string the way Python's `repr` does: `b'…'`.
pub fn repr_bytes(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push(quote as char);
    out
}

/// Render a float the way Python's `repr` does.
///
/// Non-finite values render as `inf`/`-inf`/`nan` (not valid literals;
/// the emitter pickles them). Integral values keep a trailing `.0` and
/// very large or small magnitudes use exponent notation, so the result
/// always reads back as a float rather than an int.
pub fn repr_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && (magnitude >= 1e16 || magnitude < 1e-4) {
        return format!("{:e}", f);
    }
    if f == f.trunc() {
        return format!("{:.1}", f);
    }
    format!("{}", f)
}

/// Parse a Python string literal, optionally wrapped in parentheses.
///
/// This is the string slice of an `ast.literal_eval`: accepts `'…'`,
/// `"…"`, triple-quoted forms, and `r`/`u` prefixes. Returns `None` for
/// anything else, including bytes literals and unterminated input.
pub fn parse_string_literal(text: &str) -> Option<String> {
    let mut t = text.trim();
    while t.starts_with('(') && t.ends_with(')') && t.len() >= 2 {
        t = t[1..t.len() - 1].trim();
    }
    let mut raw = false;
    loop {
        match t.chars().next()? {
            'r' | 'R' => {
                raw = true;
                t = &t[1..];
            }
            'u' | 'U' => t = &t[1..],
            'b' | 'B' | 'f' | 'F' => return None,
            _ => break,
        }
    }
    let (quote, body) = strip_quotes(t)?;
    let _ = quote;
    if raw {
        return Some(body.to_string());
    }
    unescape(body)
}

fn strip_quotes(t: &str) -> Option<(&str, &str)> {
    for q in ["'''", "\"\"\"", "'", "\""] {
        if t.len() >= 2 * q.len() && t.starts_with(q) && t.ends_with(q) {
            return Some((q, &t[q.len()..t.len() - q.len()]));
        }
    }
    None
}

/// Process the backslash escapes of a (non-raw) Python string body.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\n' => {} // line continuation
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(take_hex(&mut chars, 2)?),
            'u' => out.push(take_hex(&mut chars, 4)?),
            'U' => out.push(take_hex(&mut chars, 8)?),
            'N' => {
                if chars.next()? != '{' {
                    return None;
                }
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        c => name.push(c),
                    }
                }
                out.push(unicode_names2::character(&name)?);
            }
            c @ '0'..='7' => {
                let mut n = c as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&d @ '0'..='7') => {
                            n = n * 8 + (d as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(n)?);
            }
            // Python keeps unknown escapes as-is.
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    Some(out)
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, n: usize) -> Option<char> {
    let mut v = 0u32;
    for _ in 0..n {
        v = v * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_str_quote_choice() {
        assert_eq!(repr_str("hello"), "'hello'");
        assert_eq!(repr_str("it's"), "\"it's\"");
        assert_eq!(repr_str("both ' and \""), "'both \\' and \"'");
    }

    #[test]
    fn test_repr_str_escapes() {
        assert_eq!(repr_str("a\nb"), "'a\\nb'");
        assert_eq!(repr_str("tab\there"), "'tab\\there'");
        assert_eq!(repr_str("back\\slash"), "'back\\\\slash'");
        assert_eq!(repr_str("\x01"), "'\\x01'");
    }

    #[test]
    fn test_repr_bytes() {
        assert_eq!(repr_bytes(b"foo"), "b'foo'");
        assert_eq!(repr_bytes(b"\xfffoo"), "b'\\xfffoo'");
        assert_eq!(repr_bytes(b"a\nb"), "b'a\\nb'");
    }

    #[test]
    fn test_repr_float() {
        assert_eq!(repr_float(4.0), "4.0");
        assert_eq!(repr_float(-4.2), "-4.2");
        assert_eq!(repr_float(f64::NAN), "nan");
        assert_eq!(repr_float(f64::INFINITY), "inf");
        assert_eq!(repr_float(f64::NEG_INFINITY), "-inf");
        assert_eq!(repr_float(-0.0), "-0.0");
    }

    #[test]
    fn test_parse_string_literal() {
        assert_eq!(parse_string_literal("'foo'"), Some("foo".to_string()));
        assert_eq!(
            parse_string_literal("('Hello, World!')"),
            Some("Hello, World!".to_string())
        );
        assert_eq!(parse_string_literal("\"a\\nb\""), Some("a\nb".to_string()));
        assert_eq!(parse_string_literal("r'a\\nb'"), Some("a\\nb".to_string()));
        assert_eq!(parse_string_literal("b'foo'"), None);
        assert_eq!(parse_string_literal("foo"), None);
        assert_eq!(parse_string_literal("'unterminated"), None);
    }

    #[test]
    fn test_parse_string_literal_named_escape() {
        assert_eq!(
            parse_string_literal("'\\N{LATIN SMALL LETTER A}'"),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_unescape_round_trip() {
        let original = "mixed \"quotes\" and\n\tcontrol";
        let reprd = repr_str(original);
        assert_eq!(parse_string_literal(&reprd), Some(original.to_string()));
    }
}
