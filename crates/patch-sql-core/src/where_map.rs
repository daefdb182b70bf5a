//! Equality-only predicates.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::{DbValue, FieldName};

/// A conjunction of `field = value` clauses rendered into a `WHERE` body.
///
/// There is no disjunction, inequality or nesting. Clauses are kept ordered
/// by field name, so the same map always renders the same text.
///
/// # Example
///
/// ```rust
/// use patch_sql_core::WhereMap;
///
/// let mut wm = WhereMap::eq("name", "alice");
/// assert_eq!(wm.to_string(), "name = 'alice'");
///
/// wm.set("email", "alice@example.com");
/// assert_eq!(wm.to_string(), "email = 'alice@example.com' AND name = 'alice'");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereMap {
    clauses: BTreeMap<FieldName, DbValue>,
}

impl WhereMap {
    /// Creates an empty map, which renders to nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map holding a single clause.
    #[must_use]
    pub fn eq(field: impl Into<FieldName>, value: impl Into<DbValue>) -> Self {
        let mut wm = Self::new();
        wm.set(field, value);
        wm
    }

    /// Sets the clause for `field`, replacing any previous one. Field names
    /// compare case-insensitively, as they render.
    pub fn set(&mut self, field: impl Into<FieldName>, value: impl Into<DbValue>) {
        self.clauses
            .insert(FieldName::normalized(field.into()), value.into());
    }

    /// Adds a clause and returns the map.
    #[must_use]
    pub fn and(mut self, field: impl Into<FieldName>, value: impl Into<DbValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the value compared against `field`, if there is a clause for it.
    #[must_use]
    pub fn get(&self, field: impl Into<FieldName>) -> Option<&DbValue> {
        self.clauses.get(&FieldName::normalized(field.into()))
    }

    /// Removes the clause for `field`.
    pub fn remove(&mut self, field: impl Into<FieldName>) -> Option<DbValue> {
        self.clauses.remove(&FieldName::normalized(field.into()))
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Returns true if there are no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterates over the clauses in render order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &DbValue)> {
        self.clauses.iter()
    }
}

impl fmt::Display for WhereMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            if value.is_null() {
                write!(f, "{field} IS NULL")?;
            } else {
                write!(f, "{field} = {value}")?;
            }
        }
        Ok(())
    }
}

impl<F: Into<FieldName>, V: Into<DbValue>> FromIterator<(F, V)> for WhereMap {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut wm = Self::new();
        for (field, value) in iter {
            wm.set(field, value);
        }
        wm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_renders_nothing() {
        assert_eq!(WhereMap::new().to_string(), "");
    }

    #[test]
    fn test_single_clause() {
        let wm = WhereMap::eq("testKey", "testK3");
        assert_eq!(wm.to_string(), "testkey = 'testK3'");
        // Rendering twice gives the same text.
        assert_eq!(wm.to_string(), wm.to_string());
    }

    #[test]
    fn test_multiple_clauses_are_spaced_and_sorted() {
        let wm: WhereMap = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        assert_eq!(wm.to_string(), "a = '1' AND b = '2' AND c = '3'");
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let first = WhereMap::eq("name", "x").and("email", "y");
        let second = WhereMap::eq("email", "y").and("name", "x");
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_field_case_is_one_clause() {
        let mut wm = WhereMap::eq("Name", "a");
        wm.set("name", "b");
        assert_eq!(wm.len(), 1);
        assert_eq!(wm.get("NAME"), Some(&DbValue::from("b")));
        assert_eq!(wm.to_string(), "name = 'b'");

        let wm: WhereMap = [("K", "1"), ("k", "2")].into_iter().collect();
        assert_eq!(wm.to_string(), "k = '2'");
        assert_eq!(
            WhereMap::eq("K", "1").and("V", "2").remove("v"),
            Some(DbValue::from("2"))
        );
    }

    #[test]
    fn test_set_overwrites() {
        let mut wm = WhereMap::eq("id", 1_i64);
        wm.set("id", 2_i64);
        assert_eq!(wm.len(), 1);
        assert_eq!(wm.get("id"), Some(&DbValue::Int(2)));
        assert_eq!(wm.to_string(), "id = '2'");
    }

    #[test]
    fn test_get_distinguishes_absent() {
        let wm = WhereMap::eq("id", DbValue::Null);
        assert_eq!(wm.get("id"), Some(&DbValue::Null));
        assert_eq!(wm.get("name"), None);
    }

    #[test]
    fn test_null_clause() {
        let wm = WhereMap::eq("deleted_at", DbValue::Null).and("name", "x");
        assert_eq!(wm.to_string(), "deleted_at IS NULL AND name = 'x'");
    }

    #[test]
    fn test_remove() {
        let mut wm = WhereMap::eq("a", 1_i64).and("b", 2_i64);
        assert_eq!(wm.remove("a"), Some(DbValue::Int(1)));
        assert_eq!(wm.to_string(), "b = '2'");
        assert!(!wm.is_empty());
    }
}
