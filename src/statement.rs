//! Best-effort inspection of free-form statement text.
//!
//! A full CQL parser is out of reach here. Target extraction is a regex
//! heuristic; `LIMIT` rewriting works on the `sqlparser` token stream so that
//! string literals and comments are left alone.

use regex::{Regex, RegexBuilder};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

use crate::builder::qualified_name;
use crate::error::{Error, Result};

const TARGET_PATTERN: &str = r#"\b(?:FROM|INTO|UPDATE|CREATE\s+TABLE(?:\s+IF\s+NOT\s+EXISTS)?|DROP\s+TABLE(?:\s+IF\s+EXISTS)?|TRUNCATE(?:\s+TABLE)?)\s+(?P<target>"?(?P<keyspace>\w+)"?\s*\.\s*"?(?P<table>\w+)"?)"#;

/// Keyspace and table named by a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTarget {
    pub keyspace: String,
    pub table: String,
}

/// Statement text ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub text: String,
    /// First table named, used for schema lookup.
    pub target: Option<StatementTarget>,
    /// Every table named, in order of appearance.
    pub targets: Vec<StatementTarget>,
    pub is_select: bool,
}

#[derive(Debug, Clone)]
pub struct StatementParser {
    target: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Invariant(format!("bad statement pattern: {e}")))
}

impl StatementParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            target: compile(TARGET_PATTERN)?,
        })
    }

    pub fn target(&self, statement: &str) -> Option<StatementTarget> {
        self.targets(statement).into_iter().next()
    }

    /// All tables named by the statement. A batch yields one per member.
    pub fn targets(&self, statement: &str) -> Vec<StatementTarget> {
        self.target
            .captures_iter(statement)
            .filter_map(|caps| {
                Some(StatementTarget {
                    keyspace: caps.name("keyspace")?.as_str().to_string(),
                    table: caps.name("table")?.as_str().to_string(),
                })
            })
            .collect()
    }

    /// Cap the row count of a `SELECT` at `max`. A lower existing limit is
    /// kept, a higher one replaced and a missing one appended ahead of any
    /// `ALLOW FILTERING` or trailing comment. `PER PARTITION LIMIT` does not
    /// count as a row cap. Other statements come back unchanged.
    pub fn limit_select_query(&self, statement: &str, max: u32) -> String {
        if !is_select(statement) {
            return statement.to_string();
        }
        let body = trim_statement(statement);
        let dialect = GenericDialect {};
        // Text the tokenizer rejects is left for the server to reject.
        let Ok(tokens) = Tokenizer::new(&dialect, body).tokenize_with_location() else {
            return body.to_string();
        };
        let spans = SourceSpans::new(body);
        let significant: Vec<&TokenWithSpan> = tokens
            .iter()
            .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::SemiColon))
            .collect();

        if let Some(count) = row_limit(&significant) {
            let (Some(start), Some(end)) = (
                spans.offset(count.span.start),
                spans.offset(count.span.end),
            ) else {
                return body.to_string();
            };
            let existing = match &count.token {
                Token::Number(n, _) => n.parse::<u64>().ok(),
                _ => None,
            };
            return match existing {
                Some(existing) if existing <= u64::from(max) => body.to_string(),
                _ => format!("{}{max}{}", &body[..start], &body[end..]),
            };
        }

        let Some(last) = significant.last() else {
            return body.to_string();
        };
        let Some(end) = spans.offset(last.span.end) else {
            return body.to_string();
        };
        let cut = match significant.as_slice() {
            [.., allow, filtering]
                if is_word(&allow.token, "allow") && is_word(&filtering.token, "filtering") =>
            {
                spans.offset(allow.span.start)
            }
            _ => None,
        }
        .unwrap_or(end);

        let comments: String = tokens
            .iter()
            .filter(|t| matches!(t.token, Token::Whitespace(_)))
            .filter_map(|t| {
                let start = spans.offset(t.span.start)?;
                let stop = spans.offset(t.span.end)?;
                (start >= end).then(|| &body[start..stop])
            })
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!(" {c}"))
            .collect();

        let head = body[..cut].trim_end();
        let tail = body[cut..end].trim();
        if tail.is_empty() {
            format!("{head} LIMIT {max}{comments}")
        } else {
            format!("{head} LIMIT {max} {tail}{comments}")
        }
    }

    /// Trim, re-quote the target and cap `SELECT` row counts.
    pub fn prepare(&self, statement: &str, max_rows: u32) -> PreparedStatement {
        let trimmed = trim_statement(statement);
        let targets = self.targets(trimmed);
        let target = targets.first().cloned();
        let text = match self.target.captures(trimmed) {
            Some(caps) => match (caps.name("target"), &target) {
                (Some(m), Some(t)) => format!(
                    "{}{}{}",
                    &trimmed[..m.start()],
                    qualified_name(&t.keyspace, &t.table),
                    &trimmed[m.end()..]
                ),
                _ => trimmed.to_string(),
            },
            None => trimmed.to_string(),
        };
        let is_select = is_select(&text);
        let text = if is_select {
            self.limit_select_query(&text, max_rows)
        } else {
            text
        };
        PreparedStatement {
            text,
            target,
            targets,
            is_select,
        }
    }
}

fn is_word(token: &Token, word: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word))
}

/// Count token of the last top-level `LIMIT n`, skipping `PER PARTITION LIMIT`.
fn row_limit<'a>(significant: &[&'a TokenWithSpan]) -> Option<&'a TokenWithSpan> {
    let mut depth = 0usize;
    let mut found = None;
    for (i, tok) in significant.iter().enumerate() {
        match &tok.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(w) if depth == 0 && w.quote_style.is_none() && w.keyword == Keyword::LIMIT => {
                let per_partition = i >= 2
                    && is_word(&significant[i - 2].token, "per")
                    && is_word(&significant[i - 1].token, "partition");
                if let Some(count) = significant.get(i + 1) {
                    if !per_partition && matches!(count.token, Token::Number(..)) {
                        found = Some(*count);
                    }
                }
            }
            _ => {}
        }
    }
    found
}

/// Maps tokenizer locations (1-based line, 1-based char column) to byte
/// offsets.
struct SourceSpans<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceSpans<'a> {
    fn new(text: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    fn offset(&self, loc: Location) -> Option<usize> {
        let line = usize::try_from(loc.line).ok()?.checked_sub(1)?;
        let column = usize::try_from(loc.column).ok()?.checked_sub(1)?;
        let start = *self.line_starts.get(line)?;
        let rest = &self.text[start..];
        match rest.char_indices().nth(column) {
            Some((i, _)) => Some(start + i),
            None if rest.chars().count() == column => Some(self.text.len()),
            None => None,
        }
    }
}

/// One-off form of [`StatementParser::limit_select_query`].
pub fn limit_select_query(statement: &str, max: u32) -> Result<String> {
    Ok(StatementParser::new()?.limit_select_query(statement, max))
}

/// Strip surrounding whitespace and trailing semicolons.
pub fn trim_statement(statement: &str) -> &str {
    statement.trim().trim_end_matches(';').trim_end()
}

/// Whether the first keyword of the statement is `SELECT`.
pub fn is_select(statement: &str) -> bool {
    let dialect = GenericDialect {};
    match Tokenizer::new(&dialect, statement).tokenize() {
        Ok(tokens) => tokens
            .into_iter()
            .find(|t| !matches!(t, Token::Whitespace(_)))
            .is_some_and(|t| matches!(t, Token::Word(w) if w.keyword == Keyword::SELECT)),
        Err(_) => statement
            .split_whitespace()
            .next()
            .is_some_and(|w| w.eq_ignore_ascii_case("select")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> StatementParser {
        StatementParser::new().unwrap()
    }

    #[test]
    fn extracts_targets() {
        let p = parser();
        let cases = [
            ("SELECT * FROM ks.users", "ks", "users"),
            ("select a from \"Ks\".\"Users\" where a=1", "Ks", "Users"),
            ("INSERT INTO ks.t (a) VALUES (1)", "ks", "t"),
            ("UPDATE ks . t SET a = 1 WHERE id = 2", "ks", "t"),
            ("CREATE TABLE IF NOT EXISTS app.events (id int PRIMARY KEY)", "app", "events"),
            ("DELETE FROM ks.t WHERE id = 1", "ks", "t"),
        ];
        for (stmt, ks, table) in cases {
            let target = p.target(stmt).unwrap();
            assert_eq!(target.keyspace, ks, "{stmt}");
            assert_eq!(target.table, table, "{stmt}");
        }
        assert_eq!(p.target("SELECT now() FROM system_local"), None);
    }

    #[test]
    fn select_detection() {
        assert!(is_select("  select * from ks.t"));
        assert!(is_select("SELECT\n* FROM ks.t"));
        assert!(!is_select("INSERT INTO ks.t (a) VALUES (1)"));
        assert!(!is_select("-- SELECT\nDELETE FROM ks.t"));
    }

    #[test]
    fn limit_rewrite_rules() {
        let p = parser();
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t LIMIT 25", 100),
            "SELECT * FROM ks.t LIMIT 25"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t LIMIT 7000", 50),
            "SELECT * FROM ks.t LIMIT 50"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t;", 100),
            "SELECT * FROM ks.t LIMIT 100"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t WHERE a > 1 ALLOW FILTERING", 10),
            "SELECT * FROM ks.t WHERE a > 1 LIMIT 10 ALLOW FILTERING"
        );
        let delete = "DELETE FROM ks.t WHERE id = 1";
        assert_eq!(p.limit_select_query(delete, 1), delete);
    }

    #[test]
    fn limit_ignores_literals_comments_and_partition_limits() {
        let p = parser();
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t PER PARTITION LIMIT 5", 100),
            "SELECT * FROM ks.t PER PARTITION LIMIT 5 LIMIT 100"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t PER PARTITION LIMIT 5 LIMIT 7000", 100),
            "SELECT * FROM ks.t PER PARTITION LIMIT 5 LIMIT 100"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t WHERE note = 'LIMIT 5' ALLOW FILTERING", 100),
            "SELECT * FROM ks.t WHERE note = 'LIMIT 5' LIMIT 100 ALLOW FILTERING"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t WHERE note = 'LIMIT 7000' ALLOW FILTERING", 100),
            "SELECT * FROM ks.t WHERE note = 'LIMIT 7000' LIMIT 100 ALLOW FILTERING"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t -- recent rows", 100),
            "SELECT * FROM ks.t LIMIT 100 -- recent rows"
        );
        assert_eq!(
            p.limit_select_query("SELECT * FROM ks.t\nWHERE a = 1 ALLOW FILTERING /* slow */", 10),
            "SELECT * FROM ks.t\nWHERE a = 1 LIMIT 10 ALLOW FILTERING /* slow */"
        );
    }

    #[test]
    fn batch_yields_every_target() {
        let p = parser();
        let batch = "BEGIN BATCH INSERT INTO mine.t (a) VALUES (1); DELETE FROM theirs.t WHERE a = 2; APPLY BATCH";
        let keyspaces: Vec<_> = p.targets(batch).into_iter().map(|t| t.keyspace).collect();
        assert_eq!(keyspaces, ["mine", "theirs"]);
        let prepared = p.prepare(batch, 100);
        assert_eq!(prepared.target.unwrap().keyspace, "mine");
        assert_eq!(prepared.targets.len(), 2);
    }

    #[test]
    fn limit_is_idempotent() {
        let p = parser();
        for q in [
            "SELECT * FROM ks.t",
            "SELECT * FROM ks.t LIMIT 3",
            "SELECT * FROM ks.t LIMIT 300",
            "SELECT * FROM ks.t ALLOW FILTERING",
            "SELECT * FROM ks.t PER PARTITION LIMIT 2 -- note",
        ] {
            let once = p.limit_select_query(q, 100);
            assert_eq!(p.limit_select_query(&once, 100), once);
        }
    }

    #[test]
    fn prepare_requotes_and_limits() {
        let p = parser();
        let prepared = p.prepare("select * from MyKs.Users;  ", 100);
        assert_eq!(prepared.text, "select * from \"MyKs\".\"Users\" LIMIT 100");
        assert!(prepared.is_select);
        assert_eq!(
            prepared.target,
            Some(StatementTarget {
                keyspace: "MyKs".to_string(),
                table: "Users".to_string()
            })
        );

        let prepared = p.prepare("INSERT INTO ks.t (a) VALUES (1);", 100);
        assert_eq!(prepared.text, "INSERT INTO \"ks\".\"t\" (a) VALUES (1)");
        assert!(!prepared.is_select);
    }
}
