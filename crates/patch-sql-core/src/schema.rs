//! Table definitions and their `CREATE TABLE` rendering.
//!
//! These types are also the shape of the JSON / YAML bootstrap documents, so
//! their serde names follow the document keys (`primaryKey`, `foreignTable`,
//! ...).
//!
//! Type names are not validated; whatever is in `type` goes into the SQL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::FieldName;

fn join(fields: &[FieldName]) -> String {
    fields
        .iter()
        .map(FieldName::to_sql)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbField {
    /// Column name.
    pub name: FieldName,
    /// SQL type name, e.g. `TEXT` or `INTEGER`.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Optional length, rendered as `type(len)`.
    #[serde(default, rename = "length", skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
    /// Optional inline constraint, e.g. `PRIMARY KEY` or `NOT NULL UNIQUE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl DbField {
    /// Creates a column with a name and a type.
    #[must_use]
    pub fn new(name: impl Into<FieldName>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            len: None,
            constraint: None,
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, len: u32) -> Self {
        self.len = Some(len);
        self
    }

    /// Sets the inline constraint text.
    #[must_use]
    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

impl fmt::Display for DbField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.sql_type)?;
        // A zero length in a document means "no length".
        if let Some(len) = self.len.filter(|l| *l > 0) {
            write!(f, "({len})")?;
        }
        if let Some(constraint) = self.constraint.as_deref().map(str::trim) {
            if !constraint.is_empty() {
                write!(f, " {constraint}")?;
            }
        }
        Ok(())
    }
}

/// The referenced side of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConstraintReference {
    /// Referenced table.
    #[serde(rename = "foreignTable")]
    pub table: String,
    /// Referenced columns.
    #[serde(rename = "foreignField")]
    pub fields: Vec<FieldName>,
}

impl fmt::Display for DbConstraintReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, join(&self.fields))
    }
}

/// A foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbForeignConstraint {
    /// Local columns.
    pub fields: Vec<FieldName>,
    /// What they point to.
    #[serde(rename = "references")]
    pub reference: DbConstraintReference,
}

impl DbForeignConstraint {
    /// Creates a foreign key from `fields` to `table(foreign_fields)`.
    #[must_use]
    pub fn new(
        fields: Vec<FieldName>,
        table: impl Into<String>,
        foreign_fields: Vec<FieldName>,
    ) -> Self {
        Self {
            fields,
            reference: DbConstraintReference {
                table: table.into(),
                fields: foreign_fields,
            },
        }
    }
}

impl fmt::Display for DbForeignConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FOREIGN KEY ({}) REFERENCES {}",
            join(&self.fields),
            self.reference
        )
    }
}

/// The table-level constraint block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConstraint {
    /// Primary key columns.
    #[serde(default, rename = "primaryKey")]
    pub primary_key: Vec<FieldName>,
    /// Foreign keys.
    #[serde(default, rename = "foreignKeys", skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<DbForeignConstraint>,
}

impl DbConstraint {
    /// Creates a constraint with the given primary key.
    #[must_use]
    pub fn primary_key(fields: Vec<FieldName>) -> Self {
        Self {
            primary_key: fields,
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: DbForeignConstraint) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Returns true if rendering would produce nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary_key.is_empty() && self.foreign_keys.is_empty()
    }
}

impl fmt::Display for DbConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(1 + self.foreign_keys.len());
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", join(&self.primary_key)));
        }
        parts.extend(self.foreign_keys.iter().map(ToString::to_string));
        f.write_str(&parts.join(", "))
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbTable {
    /// Table name, lower-cased when rendered.
    pub name: String,
    /// Columns in order.
    pub fields: Vec<DbField>,
    /// Optional table constraint block.
    #[serde(default, rename = "constraint", skip_serializing_if = "Option::is_none")]
    pub constraint: Option<DbConstraint>,
}

impl DbTable {
    /// Creates a table definition without a constraint block.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<DbField>) -> Self {
        Self {
            name: name.into(),
            fields,
            constraint: None,
        }
    }

    /// Sets the constraint block.
    #[must_use]
    pub fn with_constraint(mut self, constraint: DbConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

impl fmt::Display for DbTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        if let Some(constraint) = self.constraint.as_ref().filter(|c| !c.is_empty()) {
            body.push(constraint.to_string());
        }
        write!(
            f,
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.name.trim().to_lowercase(),
            body.join(", ")
        )
    }
}
