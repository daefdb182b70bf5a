//! Schema bootstrap documents and raw SQL splitting.

use serde::{Deserialize, Serialize};

use crate::schema::DbTable;

/// A bootstrap document as read from a `.json` or `.yaml` file.
///
/// ```yaml
/// name: system
/// tables:
///   - name: users
///     fields:
///       - { name: id, type: INTEGER, constraint: PRIMARY KEY }
///       - { name: name, type: TEXT }
/// sql: CREATE INDEX IF NOT EXISTS users_name ON users (name)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInit {
    /// Name of the schema, informational only.
    #[serde(default)]
    pub name: String,
    /// Tables to create, in order.
    #[serde(default)]
    pub tables: Vec<DbTable>,
    /// Raw SQL run after the tables.
    #[serde(default, rename = "sql", skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DbInit {
    /// Renders the document into the statements to execute, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        let mut out: Vec<String> = self.tables.iter().map(ToString::to_string).collect();
        if let Some(raw) = &self.raw {
            out.extend(split_statements(raw));
        }
        out
    }
}

/// Splits a script into statements on `;`.
///
/// Semicolons inside single- or double-quoted text and inside `--` line
/// comments do not split. Empty statements are dropped and each returned
/// statement ends with `;`.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    // A doubled quote is an escaped quote.
                    if chars.peek() == Some(&q) {
                        current.push(q);
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => push_statement(&mut statements, &mut current),
                _ => current.push(c),
            },
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(format!("{stmt};"));
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let script = "CREATE TABLE a (x INTEGER);\nCREATE TABLE b (y TEXT);\n";
        assert_eq!(
            split_statements(script),
            vec!["CREATE TABLE a (x INTEGER);", "CREATE TABLE b (y TEXT);"]
        );
    }

    #[test]
    fn test_split_keeps_quoted_semicolons() {
        let script = "INSERT INTO a VALUES ('x;y'); INSERT INTO a VALUES ('it''s;')";
        assert_eq!(
            split_statements(script),
            vec![
                "INSERT INTO a VALUES ('x;y');",
                "INSERT INTO a VALUES ('it''s;');"
            ]
        );
    }

    #[test]
    fn test_split_skips_comments_and_blanks() {
        let script = "-- setup; nothing here\n;;\nSELECT 1; -- trailing; comment\n";
        assert_eq!(split_statements(script), vec!["SELECT 1;"]);
    }

    #[test]
    fn test_document_statements() {
        let yaml = r"
name: system
tables:
  - name: users
    fields:
      - { name: id, type: INTEGER, constraint: PRIMARY KEY }
      - { name: name, type: TEXT }
  - name: groups
    fields:
      - { name: id, type: INTEGER }
    constraint:
      primaryKey: [id]
sql: CREATE INDEX IF NOT EXISTS users_name ON users (name)
";
        let init: DbInit = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(init.name, "system");
        assert_eq!(
            init.statements(),
            vec![
                "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT);",
                "CREATE TABLE IF NOT EXISTS groups (id INTEGER, PRIMARY KEY (id));",
                "CREATE INDEX IF NOT EXISTS users_name ON users (name);",
            ]
        );
    }

    #[test]
    fn test_document_without_raw_sql() {
        let init: DbInit = serde_json::from_str(r#"{"name": "x", "tables": []}"#).unwrap();
        assert!(init.statements().is_empty());
    }
}
