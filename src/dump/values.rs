//! Value-list splitting for `INSERT ... VALUES` clauses.
//!
//! Splitting is quote-aware (single quotes, double quotes and backslash
//! escapes) and paren-aware, which is all the MySQL dump dialect needs. No
//! SQL grammar is attempted beyond that.

use super::Cell;

/// Split a `VALUES` payload `(..),(..);` into the inner text of each tuple.
///
/// Only whitespace, commas and a trailing `;` may appear between tuples.
pub fn split_tuples(values: &str) -> Result<Vec<&str>, String> {
    let mut tuples = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;
    let mut depth = 0i32;
    let mut start = 0usize;

    for (i, c) in values.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_single || in_double {
            if c == '\\' {
                escape = true;
            } else if c == '\'' && in_single {
                in_single = false;
            } else if c == '"' && in_double {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' if depth > 0 => in_single = true,
            '"' if depth > 0 => in_double = true,
            '(' => {
                depth += 1;
                if depth == 1 {
                    start = i + 1;
                }
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced ')' at offset {}", i));
                }
                if depth == 0 {
                    tuples.push(&values[start..i]);
                }
            }
            _ if depth > 0 => {}
            ',' | ';' => {}
            c if c.is_whitespace() => {}
            c => return Err(format!("unexpected '{}' between value tuples at offset {}", c, i)),
        }
    }

    if in_single || in_double {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unterminated value tuple".to_string());
    }
    if tuples.is_empty() {
        return Err("no value tuples".to_string());
    }
    Ok(tuples)
}

/// Split on commas that are outside quotes and nested parentheses.
///
/// Used for tuple cells and for `CREATE TABLE` bodies (where `decimal(10,2)`
/// must stay in one piece).
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut in_backtick = false;
    let mut escape = false;
    let mut depth = 0i32;
    let mut start = 0usize;

    for (i, c) in text.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_backtick {
            if c == '`' {
                in_backtick = false;
            }
            continue;
        }
        if in_single || in_double {
            if c == '\\' {
                escape = true;
            } else if c == '\'' && in_single {
                in_single = false;
            } else if c == '"' && in_double {
                in_double = false;
            }
            continue;
        }
        match c {
            '\'' => in_single = true,
            '"' => in_double = true,
            '`' => in_backtick = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse the cells of a single tuple (text between the parentheses).
pub fn parse_tuple(tuple: &str) -> Result<Vec<Cell>, String> {
    split_top_level(tuple)
        .into_iter()
        .enumerate()
        .map(|(i, raw)| parse_cell(raw.trim()).map_err(|e| format!("value {}: {}", i + 1, e)))
        .collect()
}

/// Convert one trimmed cell token into its cell value.
///
/// Quoted strings are unescaped, a bare `NULL` is absent, anything else is
/// kept verbatim.
pub fn parse_cell(token: &str) -> Result<Cell, String> {
    if token.is_empty() {
        return Err("empty value".to_string());
    }
    if token.eq_ignore_ascii_case("NULL") {
        return Ok(None);
    }

    // Character-set introducers such as `_binary 'abc'` or `_utf8mb4'abc'`.
    let literal = match token.strip_prefix('_') {
        Some(rest) => match rest.find(['\'', '"']) {
            Some(pos) if rest[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[pos..]
            }
            _ => token,
        },
        None => token,
    };

    let quote = match literal.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Ok(Some(token.to_string())),
    };
    if literal.len() < 2 || !literal.ends_with(quote) {
        return Err(format!("unterminated string {}", literal));
    }
    Ok(Some(unescape(&literal[1..literal.len() - 1], quote)))
}

/// Undo MySQL string escaping inside a quoted literal.
pub fn unescape(inner: &str, quote: char) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some('Z') => out.push('\u{1a}'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else if c == quote && chars.peek() == Some(&quote) {
            chars.next();
            out.push(quote);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tuples_keeps_order() {
        let tuples = split_tuples("(1,'a'),(2,'b'), (3,'c');").unwrap();
        assert_eq!(tuples, vec!["1,'a'", "2,'b'", "3,'c'"]);
    }

    #[test]
    fn test_split_tuples_ignores_parens_inside_quotes() {
        let tuples = split_tuples("(1,'smile :)'),(2,'(x')").unwrap();
        assert_eq!(tuples, vec!["1,'smile :)'", "2,'(x'"]);
    }

    #[test]
    fn test_split_tuples_rejects_unterminated_quote() {
        assert!(split_tuples("(1,'open)").is_err());
    }

    #[test]
    fn test_split_tuples_rejects_garbage_between_tuples() {
        assert!(split_tuples("(1) oops (2)").is_err());
    }

    #[test]
    fn test_parse_tuple_mixed_cells() {
        let cells = parse_tuple("1, 'O\\'Brien', NULL, 'NULL', 3.50").unwrap();
        assert_eq!(
            cells,
            vec![
                Some("1".to_string()),
                Some("O'Brien".to_string()),
                None,
                Some("NULL".to_string()),
                Some("3.50".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_tuple_comma_inside_string() {
        let cells = parse_tuple("'a, b','c'").unwrap();
        assert_eq!(cells, vec![Some("a, b".to_string()), Some("c".to_string())]);
    }

    #[test]
    fn test_parse_cell_doubled_quote() {
        assert_eq!(parse_cell("'it''s'").unwrap(), Some("it's".to_string()));
    }

    #[test]
    fn test_parse_cell_binary_introducer() {
        assert_eq!(parse_cell("_binary 'raw'").unwrap(), Some("raw".to_string()));
    }

    #[test]
    fn test_parse_cell_empty_is_error() {
        assert!(parse_cell("").is_err());
    }

    #[test]
    fn test_unescape_control_sequences() {
        assert_eq!(unescape("line\\nnext\\ttab\\\\", '\''), "line\nnext\ttab\\");
    }

    #[test]
    fn test_split_top_level_respects_nesting() {
        let parts = split_top_level("`id` int(11), `price` decimal(10,2), KEY (`id`)");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].trim(), "`price` decimal(10,2)");
    }
}
