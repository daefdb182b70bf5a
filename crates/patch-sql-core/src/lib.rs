//! # patch-sql-core
//!
//! The pure half of the PaT-CH data layer: a schema model, an equality-only
//! predicate type and a builder that renders a small, fixed subset of SQL
//! from typed inputs. Nothing here touches a database.
//!
//! This crate provides:
//! - [`DbTable`], [`DbField`], [`DbConstraint`] for `CREATE TABLE`
//! - [`WhereMap`] for `WHERE` bodies
//! - [`Statement`], one variant per operation kind, rendered by
//!   [`Statement::to_sql`]
//! - [`args::check`] for the runtime argument checks that remain
//! - [`DbInit`] and [`split_statements`] for schema bootstrap files
//!
//! ## Example
//!
//! ```rust
//! use patch_sql_core::{fields, DbConstraint, DbField, DbTable, Statement, WhereMap};
//!
//! let table = DbTable::new(
//!     "t",
//!     vec![DbField::new("k", "text"), DbField::new("v", "text")],
//! )
//! .with_constraint(DbConstraint::primary_key(fields(&["k"])));
//!
//! assert_eq!(
//!     table.to_string(),
//!     "CREATE TABLE IF NOT EXISTS t (k text, v text, PRIMARY KEY (k));"
//! );
//!
//! let update: Statement = Statement::update("t")
//!     .set("v", "9")
//!     .filter(WhereMap::eq("k", "a"))
//!     .into();
//! assert_eq!(update.to_sql(), "UPDATE t SET v = '9' WHERE k = 'a';");
//! ```

pub mod args;
mod init;
mod schema;
mod statement;
mod value;
mod where_map;

pub use args::ArgumentError;
pub use init::{split_statements, DbInit};
pub use schema::{DbConstraint, DbConstraintReference, DbField, DbForeignConstraint, DbTable};
pub use statement::{DeleteArgs, InsertArgs, Method, SelectArgs, Statement, UpdateArgs};
pub use value::{fields, format_timestamp, parse_timestamp, DbValue, FieldName};
pub use where_map::WhereMap;
