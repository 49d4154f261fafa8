//! Statement assembly: turns dump lines into complete SQL statements.
//!
//! Long `INSERT` lines are frequently wrapped by dump tools, so statements are
//! joined across physical lines before any pattern matching happens. A
//! statement ends at a `;` that is outside every quoted literal. Comments
//! (`-- `, `#` and `/* ... */`) outside literals are dropped wherever they
//! appear.
//!
//! A literal left open by a broken row would otherwise swallow the rest of the
//! dump. When a line that starts a new statement arrives while a literal is
//! open, the pending text is cut off as an unterminated statement and
//! splitting resumes at that line.

/// Keywords that begin a top-level statement in a MySQL dump.
const STATEMENT_KEYWORDS: &[&str] = &[
    "INSERT", "REPLACE", "CREATE", "DROP", "LOCK", "UNLOCK", "ALTER", "SET", "USE",
];

/// A complete statement and the line it started on (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub line: usize,
    /// A quoted literal was still open when the statement was cut off.
    pub unterminated: bool,
}

impl Statement {
    /// Whether the statement ended with its own `;`.
    pub fn is_terminated(&self) -> bool {
        !self.unterminated && self.text.trim_end().ends_with(';')
    }
}

/// Tracks a statement across multiple lines.
#[derive(Debug, Default)]
pub struct StatementSplitter {
    buffer: String,
    start_line: usize,
    line_no: usize,
    in_single_quote: bool,
    in_double_quote: bool,
    in_backtick: bool,
    in_block_comment: bool,
    escape_next: bool,
    statements_emitted: usize,
}

impl StatementSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one physical line (without its terminator) and return any
    /// statements it completes.
    pub fn push_line(&mut self, line: &str) -> Vec<Statement> {
        self.line_no += 1;
        let mut results = Vec::new();

        if !self.buffer.is_empty() {
            if self.in_literal() && starts_statement(line) {
                results.push(self.take(true));
            } else {
                self.buffer.push('\n');
            }
        }

        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if self.in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }

            if self.escape_next {
                self.escape_next = false;
                self.buffer.push(c);
                continue;
            }
            if self.in_single_quote || self.in_double_quote {
                self.buffer.push(c);
                if c == '\\' {
                    self.escape_next = true;
                } else if c == '\'' && self.in_single_quote {
                    self.in_single_quote = false;
                } else if c == '"' && self.in_double_quote {
                    self.in_double_quote = false;
                }
                continue;
            }
            if self.in_backtick {
                self.buffer.push(c);
                if c == '`' {
                    self.in_backtick = false;
                }
                continue;
            }

            match c {
                '#' => break,
                // MySQL only treats `--` as a comment when whitespace follows.
                '-' if chars.peek() == Some(&'-') => {
                    let mut ahead = chars.clone();
                    ahead.next();
                    if matches!(ahead.next(), None | Some(' ' | '\t')) {
                        break;
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block_comment = true;
                    continue;
                }
                _ => {}
            }

            if self.buffer.is_empty() {
                if c.is_whitespace() {
                    continue;
                }
                self.start_line = self.line_no;
            }
            self.buffer.push(c);

            match c {
                '\'' => self.in_single_quote = true,
                '"' => self.in_double_quote = true,
                '`' => self.in_backtick = true,
                ';' => {
                    if self.buffer.trim() == ";" {
                        // Only a comment preceded this terminator.
                        self.buffer.clear();
                    } else {
                        results.push(self.take(false));
                    }
                }
                _ => {}
            }
        }
        results
    }

    /// Flush a trailing statement that never saw its terminating `;`.
    pub fn finish(&mut self) -> Option<Statement> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        let unterminated = self.in_literal();
        Some(self.take(unterminated))
    }

    /// Number of statements produced so far.
    pub fn statements_emitted(&self) -> usize {
        self.statements_emitted
    }

    fn in_literal(&self) -> bool {
        self.in_single_quote || self.in_double_quote || self.in_backtick
    }

    fn take(&mut self, unterminated: bool) -> Statement {
        self.statements_emitted += 1;
        self.in_single_quote = false;
        self.in_double_quote = false;
        self.in_backtick = false;
        self.escape_next = false;
        let mut text = std::mem::take(&mut self.buffer);
        text.truncate(text.trim_end().len());
        Statement {
            text,
            line: self.start_line,
            unterminated,
        }
    }
}

/// True when `line` opens with one of the statement keywords.
fn starts_statement(line: &str) -> bool {
    let word: String = line
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    STATEMENT_KEYWORDS
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Split a whole dump text into statements, including a trailing one without
/// its `;`.
pub fn split_statements(text: &str) -> Vec<Statement> {
    let mut splitter = StatementSplitter::new();
    let mut statements = Vec::new();
    for line in text.lines() {
        statements.extend(splitter.push_line(line));
    }
    statements.extend(splitter.finish());
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_statements() {
        let stmts = split_statements("SET NAMES utf8;\nINSERT INTO `a` VALUES (1);\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].text, "INSERT INTO `a` VALUES (1);");
        assert_eq!(stmts[1].line, 2);
        assert!(stmts.iter().all(Statement::is_terminated));
    }

    #[test]
    fn test_multi_line_insert_is_joined() {
        let text = "INSERT INTO `a` VALUES\n(1,'x'),\n(2,'y');\n";
        let stmts = split_statements(text);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "INSERT INTO `a` VALUES\n(1,'x'),\n(2,'y');");
        assert_eq!(stmts[0].line, 1);
    }

    #[test]
    fn test_semicolon_inside_string_does_not_split() {
        let stmts = split_statements("INSERT INTO a VALUES ('x;y'),('it\\'s;');");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_comments_between_statements_are_dropped() {
        let text = "-- MySQL dump\n# hash comment\n\nDROP TABLE IF EXISTS `a`;\n";
        let stmts = split_statements(text);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line, 4);
    }

    #[test]
    fn test_trailing_comment_with_apostrophe() {
        let stmts = split_statements(
            "INSERT INTO a VALUES (1,'a'); -- don't touch\nINSERT INTO a VALUES (2,'b'); # it's fine\n",
        );
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].text, "INSERT INTO a VALUES (2,'b');");
        assert!(stmts.iter().all(Statement::is_terminated));
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let stmts = split_statements("INSERT INTO a VALUES ('-- x','#1','/* y */');");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "INSERT INTO a VALUES ('-- x','#1','/* y */');");
    }

    #[test]
    fn test_block_comments_are_skipped() {
        let text = "/*!40101 SET NAMES utf8 */;\n/* the admin's\ntable */ INSERT INTO a VALUES (1);\n";
        let stmts = split_statements(text);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "INSERT INTO a VALUES (1);");
        assert_eq!(stmts[0].line, 3);
    }

    #[test]
    fn test_double_dash_needs_whitespace() {
        let stmts = split_statements("INSERT INTO a VALUES (1--2);");
        assert_eq!(stmts[0].text, "INSERT INTO a VALUES (1--2);");
    }

    #[test]
    fn test_two_statements_on_one_line() {
        let stmts = split_statements("LOCK TABLES `a` WRITE; UNLOCK TABLES;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].text, "UNLOCK TABLES;");
    }

    #[test]
    fn test_unterminated_remainder_is_reported() {
        let stmts = split_statements("INSERT INTO a VALUES ('open");
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].unterminated);
        assert!(stmts[0].text.starts_with("INSERT"));
    }

    #[test]
    fn test_open_quote_resyncs_at_next_statement() {
        let text = "INSERT INTO a VALUES (1,'ok');\n\
                    INSERT INTO a VALUES (2,'broken);\n\
                    INSERT INTO a VALUES (3,'c');\n\
                    INSERT INTO b VALUES (4,'d');\n";
        let stmts = split_statements(text);
        assert_eq!(stmts.len(), 4);
        assert!(!stmts[0].unterminated);
        assert!(stmts[1].unterminated);
        assert_eq!(stmts[1].line, 2);
        assert_eq!(stmts[2].text, "INSERT INTO a VALUES (3,'c');");
        assert_eq!(stmts[3].line, 4);
        assert!(stmts[3].is_terminated());
    }

    #[test]
    fn test_multi_line_string_continues_without_keyword() {
        let stmts = split_statements("INSERT INTO a VALUES ('first\nsecond');");
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].is_terminated());
    }
}
