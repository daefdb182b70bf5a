//! Configuration.
//!
//! [`ConfigMap`] is the lookup interface the data layer reads its settings
//! through: a tree of values with case-insensitive, dot-separated keys
//! (`db.cache.queue`). Where the tree comes from (files, environment) is up
//! to the caller. [`DataConfig`] is the typed result.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DataError, Result};

/// Separator between nested keys.
pub const SUB_SEPARATOR: char = '.';

/// A nested configuration tree with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    root: Map<String, Value>,
}

impl ConfigMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value. Anything but an object yields an empty map.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match lowercase_keys(value) {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Parses JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map(Self::from_value)
            .map_err(|e| DataError::Config(e.to_string()))
    }

    /// Parses YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map(Self::from_value)
            .map_err(|e| DataError::Config(e.to_string()))
    }

    /// Reads a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            _ => Err(DataError::Config(format!(
                "unsupported config file: {}",
                path.display()
            ))),
        }
    }

    /// Returns the raw value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split(SUB_SEPARATOR).map(str::to_lowercase);
        let first = parts.next()?;
        let mut current = self.root.get(&first)?;
        for part in parts {
            current = current.as_object()?.get(&part)?;
        }
        Some(current)
    }

    /// Returns the value at `key` as a string. Numbers and booleans are
    /// converted; objects, arrays and null are not.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns the value at `key` as a boolean, accepting `true`/`false`,
    /// `1`/`0`, `yes`/`no` and `on`/`off` in text form.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        match value {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Number(n) => Ok(Some(n.as_i64() != Some(0))),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(invalid(key, value)),
            },
            _ => Err(invalid(key, value)),
        }
    }

    /// Returns the value at `key` as an integer, parsing text if needed.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        match value {
            Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| invalid(key, value)),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, value)),
            _ => Err(invalid(key, value)),
        }
    }

    /// Returns the nested map at `key`.
    #[must_use]
    pub fn sub(&self, key: &str) -> Option<Self> {
        match self.get(key)? {
            Value::Object(map) => Some(Self { root: map.clone() }),
            _ => None,
        }
    }

    /// Sets `key`, creating intermediate maps. An intermediate key holding a
    /// non-map value is replaced by a map.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let parts: Vec<String> = key.split(SUB_SEPARATOR).map(str::to_lowercase).collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };
        let mut current = &mut self.root;
        for part in parents {
            let entry = current
                .entry(part.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            current = map;
        }
        current.insert(last.clone(), lowercase_keys(value.into()));
    }
}

fn invalid(key: &str, value: &Value) -> DataError {
    DataError::Config(format!("invalid value for {key}: {value}"))
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Settings of the data layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// sqlx connection URL.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
    /// Schema bootstrap file or directory, run by `DataBase::init`.
    pub init_file: Option<PathBuf>,
    /// Whether the user repository caches users.
    pub use_cache: bool,
    /// Capacity of the background cache queue.
    pub cache_queue: usize,
    /// Name of the users table.
    pub user_table: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            url: String::from("sqlite::memory:"),
            max_connections: 5,
            init_file: None,
            use_cache: false,
            cache_queue: 1024,
            user_table: String::from("users"),
        }
    }
}

impl DataConfig {
    /// Reads settings from a config map, starting from the defaults.
    ///
    /// Keys: `url` (or `path` for a SQLite file), `max_connections`,
    /// `init_file`, `use_cache`, `cache.queue`, `user_table`.
    pub fn from_config(config: &ConfigMap) -> Result<Self> {
        let mut out = Self::default();

        if let Some(url) = config.get_string("url") {
            out.url = url;
        } else if let Some(path) = config.get_string("path") {
            out.url = format!("sqlite://{path}?mode=rwc");
        }
        if let Some(n) = config.get_int("max_connections")? {
            out.max_connections =
                u32::try_from(n).map_err(|_| DataError::Config(format!("max_connections: {n}")))?;
        }
        if let Some(path) = config.get_string("init_file") {
            out.init_file = Some(PathBuf::from(path));
        }
        if let Some(use_cache) = config.get_bool("use_cache")? {
            out.use_cache = use_cache;
        }
        if let Some(n) = config.get_int("cache.queue")? {
            out.cache_queue =
                usize::try_from(n).map_err(|_| DataError::Config(format!("cache.queue: {n}")))?;
        }
        if let Some(table) = config.get_string("user_table") {
            out.user_table = table;
        }

        if out.max_connections == 0 {
            return Err(DataError::Config(String::from(
                "max_connections must be at least 1",
            )));
        }
        if out.cache_queue == 0 {
            return Err(DataError::Config(String::from(
                "cache.queue must be at least 1",
            )));
        }
        Ok(out)
    }
}
