//! Heuristic symbol decomposition.
//!
//! Capture symbols arrive as display strings of the form
//! `name (file(line))`, with no structured source information. The functions
//! here pull a source location and a coarse type name back out of that text.
//! Both are best-effort and never fail: malformed or missing input yields
//! empty strings and a zero line.

/// Split a symbol into its source file and line number.
///
/// The location lives in the outermost parenthesized suffix: the payload is
/// split on its first `(`, the part before is the file, the part after (with
/// the trailing `)` stripped) is the line text. A line that does not parse
/// becomes 0.
///
/// `"Foo::Bar (file.cpp(42))"` yields `("file.cpp", 42)`; a symbol with no
/// parentheses yields `("", 0)`.
pub fn file_and_line(symbol: &str) -> (String, u32) {
    let payload = match outer_parens(symbol) {
        Some(payload) => payload,
        None => return (String::new(), 0),
    };

    match payload.find('(') {
        Some(split) => {
            let file = payload[..split].to_string();
            let line_text = payload[split + 1..].trim_end_matches(')');
            (file, line_text.parse().unwrap_or(0))
        }
        None => (String::new(), 0),
    }
}

/// Coarse type name for a symbol.
///
/// Tried in order, first match wins: `std::<ident>`, `struct <ident>`,
/// `class <ident>`. When none match, the function name (leading text before
/// the first `(`) is used. Empty input yields an empty string.
pub fn type_name(symbol: &str) -> String {
    for prefix in ["std::", "struct ", "class "] {
        if let Some(pos) = symbol.find(prefix) {
            let rest = &symbol[pos + prefix.len()..];
            let ident: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !ident.is_empty() {
                return format!("{}{}", prefix, ident);
            }
        }
    }

    match symbol.find('(') {
        Some(pos) => symbol[..pos].trim().to_string(),
        None => symbol.trim().to_string(),
    }
}

/// Payload of the outermost trailing paren pair, if the symbol ends with one.
/// Scans backwards tracking depth so nested parens stay inside the payload.
fn outer_parens(symbol: &str) -> Option<&str> {
    let trimmed = symbol.trim_end();
    if !trimmed.ends_with(')') {
        return None;
    }

    let bytes = trimmed.as_bytes();
    let mut depth = 0usize;
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&trimmed[i + 1..trimmed.len() - 1]);
                }
            }
            _ => {}
        }
    }

    None
}
