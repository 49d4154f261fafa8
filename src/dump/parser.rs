//! Dump parser: extracts `CREATE TABLE` and `INSERT INTO` statements and
//! expands the insert value lists into raw rows.
//!
//! Parsing is pattern based and only aims at the MySQL dump dialect
//! (backtick identifiers, single-quoted strings with backslash escapes,
//! bareword `NULL`).

use super::statement::{self, Statement};
use super::values;
use super::{ParseError, ParsedDump};
use regex::Regex;
use std::fs;
use std::path::Path;

const IDENT: &str = r#"((?:(?:`[^`]+`|"[^"]+"|[A-Za-z0-9_$]+)\.)?(?:`[^`]+`|"[^"]+"|[A-Za-z0-9_$]+))"#;

/// Keywords that start a non-column line inside a `CREATE TABLE` body.
const NON_COLUMN_KEYWORDS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "UNIQUE",
    "CONSTRAINT",
    "FULLTEXT",
    "INDEX",
    "FOREIGN",
    "CHECK",
    "SPATIAL",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    CreateTable,
    Insert,
    Malformed,
    Other,
}

pub struct DumpParser {
    create_table_re: Regex,
    insert_re: Regex,
    insert_prefix_re: Regex,
}

impl DumpParser {
    // Build regexes once for reuse.
    pub fn new() -> Self {
        let create_table_re = Regex::new(&format!(
            r"(?is)^\s*CREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{}(?:\s*\((.*)\))?",
            IDENT
        ))
        .expect("valid create table regex");
        let insert_re = Regex::new(&format!(
            r"(?is)^\s*(?:INSERT|REPLACE)\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY|IGNORE)\s+)*(?:INTO\s+)?{}\s*(?:\(([^)]*)\))?\s*VALUES?\s*(.*)$",
            IDENT
        ))
        .expect("valid insert regex");
        let insert_prefix_re =
            Regex::new(r"(?i)^\s*(?:INSERT|REPLACE)\b").expect("valid insert prefix regex");
        Self {
            create_table_re,
            insert_re,
            insert_prefix_re,
        }
    }

    /// Read and parse a dump file.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParsedDump, ParseError> {
        let path = path.as_ref();
        tracing::debug!("Opening dump file {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ParseError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let dump = self.parse_str(&text)?;
        tracing::info!(
            "Parsed {} tables ({} rows, {} statements) from {}",
            dump.table_names().len(),
            dump.total_rows(),
            dump.statement_count(),
            path.display()
        );
        Ok(dump)
    }

    /// Parse dump text already in memory.
    pub fn parse_str(&self, text: &str) -> Result<ParsedDump, ParseError> {
        let statements = statement::split_statements(text);
        let mut dump = ParsedDump::default();
        let mut recognized = 0usize;

        for stmt in &statements {
            if stmt.unterminated {
                if self.is_table_statement(&stmt.text) {
                    recognized += 1;
                }
                dump.warn(
                    stmt.line,
                    format!("statement skipped: quoted value never closed: {}", excerpt(&stmt.text)),
                );
                continue;
            }
            match self.apply(&mut dump, stmt) {
                StatementKind::Other if !stmt.is_terminated() => dump.warn(
                    stmt.line,
                    format!("text without a terminating `;` ignored: {}", excerpt(&stmt.text)),
                ),
                StatementKind::Other => {}
                _ => recognized += 1,
            }
        }

        dump.statements = statements.len();
        if recognized == 0 {
            return Err(ParseError::NoStatements);
        }
        Ok(dump)
    }

    fn is_table_statement(&self, text: &str) -> bool {
        self.insert_prefix_re.is_match(text) || self.create_table_re.is_match(text)
    }

    fn apply(&self, dump: &mut ParsedDump, stmt: &Statement) -> StatementKind {
        if let Some(cap) = self.create_table_re.captures(&stmt.text) {
            let table = normalize_identifier(&cap[1]);
            let columns = cap
                .get(2)
                .map(|body| column_names(body.as_str()))
                .unwrap_or_default();
            tracing::debug!("Found CREATE TABLE for {} ({} columns)", table, columns.len());
            let entry = dump.table_entry(table);
            if !columns.is_empty() {
                entry.columns = columns;
            }
            return StatementKind::CreateTable;
        }

        if !self.insert_prefix_re.is_match(&stmt.text) {
            return StatementKind::Other;
        }

        let cap = match self.insert_re.captures(&stmt.text) {
            Some(cap) => cap,
            None => {
                dump.warn(
                    stmt.line,
                    "INSERT statement skipped: expected `INSERT INTO <table> VALUES (...)`"
                        .to_string(),
                );
                return StatementKind::Malformed;
            }
        };

        let table = normalize_identifier(&cap[1]);
        let tuples = match values::split_tuples(&cap[3]) {
            Ok(tuples) => tuples,
            Err(e) => {
                dump.warn(
                    stmt.line,
                    format!("INSERT into {} skipped: {}", table, e),
                );
                return StatementKind::Malformed;
            }
        };

        let mut rows = Vec::with_capacity(tuples.len());
        let mut row_warnings = Vec::new();
        for (i, tuple) in tuples.iter().enumerate() {
            match values::parse_tuple(tuple) {
                Ok(row) => rows.push(row),
                Err(e) => row_warnings.push(format!(
                    "row {} of INSERT into {} skipped: {}",
                    i + 1,
                    table,
                    e
                )),
            }
        }
        tracing::debug!("INSERT into {} has {} value groups", table, tuples.len());

        let entry = dump.table_entry(table);
        if entry.columns.is_empty() {
            if let Some(list) = cap.get(2) {
                entry.columns = list
                    .as_str()
                    .split(',')
                    .map(|c| strip_quotes(c.trim()).to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
            }
        }
        entry.rows.extend(rows);

        for message in row_warnings {
            dump.warn(stmt.line, message);
        }
        StatementKind::Insert
    }
}

impl Default for DumpParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a table identifier: drop the schema qualifier and quoting, and
/// lowercase it.
pub fn normalize_identifier(raw: &str) -> String {
    let raw = raw.trim();
    let last = if raw.starts_with('`') || raw.starts_with('"') {
        // `db`.`table` -> `table`
        match raw.rfind(['`', '"']).and_then(|end| raw[..end].rfind(['`', '"'])) {
            Some(start) => &raw[start..],
            None => raw,
        }
    } else {
        raw.rsplit('.').next().unwrap_or(raw)
    };
    strip_quotes(last).to_lowercase()
}

/// First line of a statement, shortened for log messages.
fn excerpt(text: &str) -> String {
    const MAX: usize = 60;
    let first = text.lines().next().unwrap_or_default();
    match first.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &first[..end]),
        None => first.to_string(),
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(['`', '"', '\''].as_ref())
}

/// Column names declared in a `CREATE TABLE` body.
fn column_names(body: &str) -> Vec<String> {
    values::split_top_level(body)
        .into_iter()
        .filter_map(|def| {
            let def = def.trim();
            let name = match def.chars().next()? {
                q @ ('`' | '"') => {
                    let rest = &def[1..];
                    &rest[..rest.find(q)?]
                }
                _ => {
                    let word = def.split_whitespace().next()?;
                    if NON_COLUMN_KEYWORDS
                        .iter()
                        .any(|k| word.eq_ignore_ascii_case(k))
                    {
                        return None;
                    }
                    word
                }
            };
            Some(name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
-- MySQL dump 10.13
/*!40101 SET NAMES utf8 */;
DROP TABLE IF EXISTS `admin`;
CREATE TABLE `admin` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `username` varchar(64) NOT NULL,
  `balance` decimal(10,2) DEFAULT NULL,
  PRIMARY KEY (`id`),
  UNIQUE KEY `username` (`username`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8;
LOCK TABLES `admin` WRITE;
INSERT INTO `admin` VALUES (1,'root',NULL),(2,'O\\'Brien','10.50');
UNLOCK TABLES;
";

    #[test]
    fn test_parse_create_and_insert() {
        let dump = DumpParser::new().parse_str(SAMPLE).unwrap();
        let table = dump.table("admin").unwrap();
        assert_eq!(table.columns, vec!["id", "username", "balance"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[0],
            vec![Some("1".to_string()), Some("root".to_string()), None]
        );
        assert_eq!(table.rows[1][1], Some("O'Brien".to_string()));
        assert!(dump.warnings().is_empty());
    }

    #[test]
    fn test_insert_without_create_registers_table() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO news (id, title) VALUES (1,'a');")
            .unwrap();
        let table = dump.table("news").unwrap();
        assert_eq!(table.columns, vec!["id", "title"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_create_without_insert_is_empty_table() {
        let dump = DumpParser::new()
            .parse_str("CREATE TABLE `empty` (`id` int);")
            .unwrap();
        assert_eq!(dump.table("empty").unwrap().rows.len(), 0);
    }

    #[test]
    fn test_identifier_normalization() {
        assert_eq!(normalize_identifier("`Legacy`.`Admin`"), "admin");
        assert_eq!(normalize_identifier("legacy.content"), "content");
        assert_eq!(normalize_identifier("\"Config_Choice\""), "config_choice");
    }

    #[test]
    fn test_lookup_is_normalized() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO `Admin` VALUES (1);")
            .unwrap();
        assert!(dump.table("`ADMIN`").is_some());
    }

    #[test]
    fn test_malformed_insert_is_warning() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO a VALUES (1),(2);\nINSERT INTO a SELECT * FROM b;\n")
            .unwrap();
        assert_eq!(dump.table("a").unwrap().rows.len(), 2);
        assert_eq!(dump.warnings().len(), 1);
        assert_eq!(dump.warnings()[0].line, 2);
    }

    #[test]
    fn test_bad_row_does_not_drop_siblings() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO a VALUES (1,'x'),(2,),(3,'z');")
            .unwrap();
        let rows = &dump.table("a").unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], Some("3".to_string()));
        assert_eq!(dump.warnings().len(), 1);
    }

    #[test]
    fn test_no_statements_is_error() {
        let err = DumpParser::new()
            .parse_str("-- nothing here\nSET NAMES utf8;\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::NoStatements));
    }

    #[test]
    fn test_trailing_comment_keeps_later_tables() {
        let dump = DumpParser::new()
            .parse_str(
                "INSERT INTO admin VALUES (1,'a'); -- don't touch\n\
                 INSERT INTO admin VALUES (2,'b');\n\
                 INSERT INTO content VALUES (3,'c');\n",
            )
            .unwrap();
        assert_eq!(dump.table_names(), vec!["admin", "content"]);
        assert_eq!(dump.table("admin").unwrap().rows.len(), 2);
        assert_eq!(dump.table("content").unwrap().rows.len(), 1);
        assert!(dump.warnings().is_empty());
    }

    #[test]
    fn test_open_quote_drops_only_its_statement() {
        let dump = DumpParser::new()
            .parse_str(
                "INSERT INTO admin VALUES (1,'a');\n\
                 INSERT INTO admin VALUES (2,'broken);\n\
                 INSERT INTO admin VALUES (3,'c');\n\
                 INSERT INTO content VALUES (4,'d'),(5,'e');\n\
                 INSERT INTO config_choice VALUES (6,'f');\n",
            )
            .unwrap();
        assert_eq!(dump.table("admin").unwrap().rows.len(), 2);
        assert_eq!(dump.table("content").unwrap().rows.len(), 2);
        assert_eq!(dump.table("config_choice").unwrap().rows.len(), 1);
        assert_eq!(dump.warnings().len(), 1);
        assert_eq!(dump.warnings()[0].line, 2);
    }

    #[test]
    fn test_unterminated_trailing_text_is_warned() {
        let dump = DumpParser::new()
            .parse_str("INSERT INTO a VALUES (1);\nSET @x = 'oops")
            .unwrap();
        assert_eq!(dump.table("a").unwrap().rows.len(), 1);
        assert_eq!(dump.warnings().len(), 1);
        assert_eq!(dump.warnings()[0].line, 2);
    }

    #[test]
    fn test_unreadable_file_is_source_unavailable() {
        let err = DumpParser::new()
            .parse_file("/nonexistent/legacy_dump.sql")
            .unwrap_err();
        assert!(matches!(err, ParseError::SourceUnavailable { .. }));
    }
}
