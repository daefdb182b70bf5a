//! Argument checks run before a statement is rendered.
//!
//! The typed [`Statement`] variants already rule out wrong argument kinds.
//! What is left to check at runtime is whether the arguments are there.

use crate::statement::{Method, Statement};
use crate::value::FieldName;

/// A statement whose arguments cannot produce valid SQL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// No table name was given.
    #[error("no table name provided")]
    MissingTable,

    /// The operation needs arguments and none were supplied.
    #[error("no arguments provided for {0}")]
    MissingArguments(Method),

    /// A column name is empty.
    #[error("invalid field name in {0}")]
    InvalidField(Method),
}

/// Result type alias for argument checks.
pub type Result<T> = std::result::Result<T, ArgumentError>;

/// Checks that `stmt` carries what its kind needs.
///
/// DROP, SELECT and DELETE need nothing beyond the table. CREATE needs
/// columns, UPDATE needs assignments and INSERT needs a field list.
pub fn check(stmt: &Statement) -> Result<()> {
    if stmt.table().trim().is_empty() {
        return Err(ArgumentError::MissingTable);
    }

    let method = stmt.method();
    match stmt {
        Statement::Create(table) => {
            if table.fields.is_empty() {
                return Err(ArgumentError::MissingArguments(method));
            }
            check_names(method, table.fields.iter().map(|f| &f.name))
        }
        Statement::Drop { .. } => Ok(()),
        Statement::Select(args) => check_names(method, args.fields.iter()),
        Statement::Insert(args) => {
            if args.fields.is_empty() {
                return Err(ArgumentError::MissingArguments(method));
            }
            check_names(method, args.fields.iter())
        }
        Statement::Update(args) => {
            if args.assignments.is_empty() {
                return Err(ArgumentError::MissingArguments(method));
            }
            check_names(method, args.assignments.keys())
        }
        Statement::Delete(args) => match &args.filter {
            Some(wm) => check_names(method, wm.iter().map(|(f, _)| f)),
            None => Ok(()),
        },
    }
}

fn check_names<'a>(method: Method, mut names: impl Iterator<Item = &'a FieldName>) -> Result<()> {
    if names.any(FieldName::is_blank) {
        return Err(ArgumentError::InvalidField(method));
    }
    Ok(())
}
