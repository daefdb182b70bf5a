//! Typed statements and their SQL rendering.
//!
//! Each operation kind is a [`Statement`] variant that owns exactly the
//! arguments it needs, so a caller cannot hand an UPDATE the arguments of a
//! SELECT.
//!
//! # Example
//!
//! ```rust
//! use patch_sql_core::{fields, Statement, WhereMap};
//!
//! let stmt = Statement::select("users")
//!     .fields(fields(&["id", "Name"]))
//!     .filter(WhereMap::eq("name", "alice"))
//!     .extra("LIMIT 1");
//!
//! assert_eq!(
//!     Statement::from(stmt).to_sql(),
//!     "SELECT id, name FROM users WHERE name = 'alice' LIMIT 1;"
//! );
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::schema::DbTable;
use crate::value::{DbValue, FieldName};
use crate::where_map::WhereMap;

/// The six operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `CREATE TABLE`.
    Create,
    /// `DROP TABLE`.
    Drop,
    /// `SELECT`.
    Select,
    /// `INSERT` (bulk path).
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
}

impl Method {
    /// The SQL keyword(s) this kind starts with.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Create => "CREATE TABLE",
            Self::Drop => "DROP TABLE",
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Arguments of a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectArgs {
    /// Table to read.
    pub table: String,
    /// Columns; empty means `*`.
    pub fields: Vec<FieldName>,
    /// Optional predicate.
    pub filter: Option<WhereMap>,
    /// Raw trailing clause appended verbatim, e.g. `LIMIT 1`.
    pub extra: Option<String>,
}

impl SelectArgs {
    /// Sets the selected columns.
    #[must_use]
    pub fn fields(mut self, fields: Vec<FieldName>) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the predicate.
    #[must_use]
    pub fn filter(mut self, filter: WhereMap) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the trailing raw clause.
    ///
    /// This is the one place outside INSERT rows where raw SQL is accepted.
    #[must_use]
    pub fn extra(mut self, clause: impl Into<String>) -> Self {
        self.extra = Some(clause.into());
        self
    }
}

/// Arguments of a bulk INSERT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertArgs {
    /// Target table.
    pub table: String,
    /// Columns the row values are given for.
    pub fields: Vec<FieldName>,
    /// Rows; each should have one value per field.
    pub rows: Vec<Vec<DbValue>>,
}

/// Arguments of an UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateArgs {
    /// Target table.
    pub table: String,
    /// Column assignments, rendered in field order.
    pub assignments: BTreeMap<FieldName, DbValue>,
    /// Optional predicate.
    pub filter: Option<WhereMap>,
}

impl UpdateArgs {
    /// Adds an assignment, replacing one for the same field in any case.
    #[must_use]
    pub fn set(mut self, field: impl Into<FieldName>, value: impl Into<DbValue>) -> Self {
        self.assignments
            .insert(FieldName::normalized(field.into()), value.into());
        self
    }

    /// Sets the predicate.
    #[must_use]
    pub fn filter(mut self, filter: WhereMap) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Arguments of a DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteArgs {
    /// Target table.
    pub table: String,
    /// Optional predicate; none deletes every row.
    pub filter: Option<WhereMap>,
}

/// One statement, with the arguments its kind requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Create a table if it does not exist.
    Create(DbTable),
    /// Drop a table if it exists.
    Drop {
        /// Table to drop.
        table: String,
    },
    /// Read rows.
    Select(SelectArgs),
    /// Bulk-insert rows.
    Insert(InsertArgs),
    /// Change rows.
    Update(UpdateArgs),
    /// Remove rows.
    Delete(DeleteArgs),
}

impl Statement {
    /// Starts a SELECT on `table`.
    #[must_use]
    pub fn select(table: impl Into<String>) -> SelectArgs {
        SelectArgs {
            table: table.into(),
            ..SelectArgs::default()
        }
    }

    /// Starts an UPDATE on `table`.
    #[must_use]
    pub fn update(table: impl Into<String>) -> UpdateArgs {
        UpdateArgs {
            table: table.into(),
            ..UpdateArgs::default()
        }
    }

    /// A DELETE on `table`.
    #[must_use]
    pub fn delete(table: impl Into<String>, filter: Option<WhereMap>) -> Self {
        Self::Delete(DeleteArgs {
            table: table.into(),
            filter,
        })
    }

    /// A bulk INSERT into `table`.
    #[must_use]
    pub fn insert(
        table: impl Into<String>,
        fields: Vec<FieldName>,
        rows: Vec<Vec<DbValue>>,
    ) -> Self {
        Self::Insert(InsertArgs {
            table: table.into(),
            fields,
            rows,
        })
    }

    /// A DROP of `table`.
    #[must_use]
    pub fn drop_table(table: impl Into<String>) -> Self {
        Self::Drop {
            table: table.into(),
        }
    }

    /// The operation kind.
    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Self::Create(_) => Method::Create,
            Self::Drop { .. } => Method::Drop,
            Self::Select(_) => Method::Select,
            Self::Insert(_) => Method::Insert,
            Self::Update(_) => Method::Update,
            Self::Delete(_) => Method::Delete,
        }
    }

    /// The table the statement acts on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Create(t) => &t.name,
            Self::Drop { table } => table,
            Self::Select(a) => &a.table,
            Self::Insert(a) => &a.table,
            Self::Update(a) => &a.table,
            Self::Delete(a) => &a.table,
        }
    }

    /// Renders the statement.
    ///
    /// INSERT renders to an empty string: rows are streamed by the bulk path
    /// and never turned into statement text here.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Create(table) => table.to_string(),
            Self::Drop { table } => format!("DROP TABLE IF EXISTS {table};"),
            Self::Select(args) => build_select(args),
            Self::Insert(_) => String::new(),
            Self::Update(args) => build_update(args),
            Self::Delete(args) => {
                let mut sql = format!("DELETE FROM {}", args.table);
                push_where(&mut sql, args.filter.as_ref());
                sql.push(';');
                sql
            }
        }
    }
}

impl From<SelectArgs> for Statement {
    fn from(args: SelectArgs) -> Self {
        Self::Select(args)
    }
}

impl From<UpdateArgs> for Statement {
    fn from(args: UpdateArgs) -> Self {
        Self::Update(args)
    }
}

impl From<DbTable> for Statement {
    fn from(table: DbTable) -> Self {
        Self::Create(table)
    }
}

fn push_where(sql: &mut String, filter: Option<&WhereMap>) {
    if let Some(wm) = filter.filter(|wm| !wm.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(&wm.to_string());
    }
}

fn build_select(args: &SelectArgs) -> String {
    let columns = if args.fields.is_empty() {
        String::from("*")
    } else {
        args.fields
            .iter()
            .map(FieldName::to_sql)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("SELECT {columns} FROM {}", args.table);
    push_where(&mut sql, args.filter.as_ref());
    if let Some(extra) = args.extra.as_deref().map(str::trim) {
        if !extra.is_empty() {
            sql.push(' ');
            sql.push_str(extra);
        }
    }
    sql.push(';');
    sql
}

fn build_update(args: &UpdateArgs) -> String {
    let assignments = args
        .assignments
        .iter()
        .map(|(field, value)| format!("{field} = {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("UPDATE {} SET {assignments}", args.table);
    push_where(&mut sql, args.filter.as_ref());
    sql.push(';');
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DbConstraint, DbField};
    use crate::value::fields;

    #[test]
    fn test_create() {
        let stmt = Statement::Create(
            DbTable::new("t", vec![DbField::new("k", "text"), DbField::new("v", "text")])
                .with_constraint(DbConstraint::primary_key(fields(&["k"]))),
        );
        assert_eq!(stmt.method(), Method::Create);
        assert_eq!(
            stmt.to_sql(),
            "CREATE TABLE IF NOT EXISTS t (k text, v text, PRIMARY KEY (k));"
        );
    }

    #[test]
    fn test_drop() {
        assert_eq!(
            Statement::drop_table("t").to_sql(),
            "DROP TABLE IF EXISTS t;"
        );
    }

    #[test]
    fn test_select_star() {
        let stmt: Statement = Statement::select("t").into();
        assert_eq!(stmt.to_sql(), "SELECT * FROM t;");
    }

    #[test]
    fn test_select_fields_lowercased() {
        let stmt: Statement = Statement::select("t")
            .fields(fields(&["testKey", "TestData"]))
            .filter(WhereMap::eq("testKey", "testK3"))
            .into();
        assert_eq!(
            stmt.to_sql(),
            "SELECT testkey, testdata FROM t WHERE testkey = 'testK3';"
        );
    }

    #[test]
    fn test_select_extra_clause() {
        let stmt: Statement = Statement::select("t").extra("LIMIT 1").into();
        assert_eq!(stmt.to_sql(), "SELECT * FROM t LIMIT 1;");
    }

    #[test]
    fn test_select_empty_filter_has_no_where() {
        let stmt: Statement = Statement::select("t").filter(WhereMap::new()).into();
        assert_eq!(stmt.to_sql(), "SELECT * FROM t;");
    }

    #[test]
    fn test_update_assignment_case_last_wins() {
        let stmt: Statement = Statement::update("t")
            .set("Name", "a")
            .set("name", "b")
            .into();
        assert_eq!(stmt.to_sql(), "UPDATE t SET name = 'b';");
    }

    #[test]
    fn test_update_sorted_assignments() {
        let stmt: Statement = Statement::update("t")
            .set("v", "9")
            .set("data", "d")
            .filter(WhereMap::eq("k", "a"))
            .into();
        assert_eq!(
            stmt.to_sql(),
            "UPDATE t SET data = 'd', v = '9' WHERE k = 'a';"
        );
    }

    #[test]
    fn test_update_without_filter() {
        let stmt: Statement = Statement::update("t").set("v", 1_i64).into();
        assert_eq!(stmt.to_sql(), "UPDATE t SET v = '1';");
    }

    #[test]
    fn test_delete() {
        assert_eq!(Statement::delete("t", None).to_sql(), "DELETE FROM t;");
        assert_eq!(
            Statement::delete("t", Some(WhereMap::eq("k", "a"))).to_sql(),
            "DELETE FROM t WHERE k = 'a';"
        );
    }

    #[test]
    fn test_insert_renders_nothing() {
        let stmt = Statement::insert("t", fields(&["k"]), vec![vec![DbValue::from("a")]]);
        assert_eq!(stmt.method(), Method::Insert);
        assert_eq!(stmt.to_sql(), "");
    }

    #[test]
    fn test_rendered_prefix_matches_keyword() {
        let statements: Vec<Statement> = vec![
            DbTable::new("t", vec![DbField::new("a", "INTEGER")]).into(),
            Statement::drop_table("t"),
            Statement::select("t").into(),
            Statement::update("t").set("a", 1_i64).into(),
            Statement::delete("t", None),
        ];
        for stmt in statements {
            assert!(stmt.to_sql().starts_with(stmt.method().keyword()));
            assert_eq!(stmt.table(), "t");
        }
    }
}
