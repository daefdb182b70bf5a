//! Converting between engine rows and [`DbValue`]s.

use std::collections::BTreeMap;

use patch_sql_core::DbValue;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

/// One row: column name to value.
pub type DbRow = BTreeMap<String, DbValue>;

/// The rows a SELECT returned, in order.
pub type DbResult = Vec<DbRow>;

/// Converts every column of a row.
///
/// The value's storage class decides the kind. Text in a column declared
/// `DATETIME`, `TIMESTAMP` or `DATE` is decoded as a timestamp when it
/// parses as one.
pub fn materialize(row: &SqliteRow) -> Result<DbRow, sqlx::Error> {
    let mut out = DbRow::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            DbValue::Null
        } else {
            let storage = raw.type_info().name().to_uppercase();
            match storage.as_str() {
                "INTEGER" | "INT8" | "BIGINT" => DbValue::Int(row.try_get(i)?),
                "BOOLEAN" => DbValue::Bool(row.try_get(i)?),
                "REAL" | "NUMERIC" => DbValue::Float(row.try_get(i)?),
                "BLOB" => DbValue::Bytes(row.try_get(i)?),
                _ => {
                    let text: String = row.try_get(i)?;
                    if is_time_column(column.type_info().name()) {
                        patch_sql_core::parse_timestamp(&text)
                            .map_or(DbValue::Text(text), DbValue::Timestamp)
                    } else {
                        DbValue::Text(text)
                    }
                }
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn is_time_column(declared: &str) -> bool {
    matches!(
        declared.to_uppercase().as_str(),
        "DATETIME" | "TIMESTAMP" | "DATE"
    )
}

/// Binds one value as a statement parameter.
pub fn bind<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DbValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DbValue::Null => query.bind(Option::<i64>::None),
        DbValue::Text(s) => query.bind(s.clone()),
        DbValue::Int(n) => query.bind(*n),
        DbValue::Float(f) => query.bind(*f),
        DbValue::Bool(b) => query.bind(*b),
        DbValue::Bytes(b) => query.bind(b.clone()),
        DbValue::Timestamp(ts) => query.bind(*ts),
        DbValue::Json(v) => query.bind(v.to_string()),
    }
}
