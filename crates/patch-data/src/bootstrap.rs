//! Loading schema bootstrap files.
//!
//! A bootstrap path is a single file or a directory of files, loaded in
//! name order. `.sql` files hold raw statements; `.json`, `.yaml` and
//! `.yml` files hold a [`DbInit`] document.

use std::fs;
use std::path::{Path, PathBuf};

use patch_sql_core::{split_statements, DbInit};
use tracing::{error, Span};

use crate::error::{DataError, Result};

/// The statements of one bootstrap file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitScript {
    /// File the statements came from.
    pub path: PathBuf,
    /// Statements, in execution order.
    pub statements: Vec<String>,
}

/// Lists the files to load from `path`.
///
/// A directory yields its regular files sorted by name; subdirectories are
/// skipped. Anything else yields `path` itself.
pub fn collect_files(path: &Path, span: &Span) -> Result<Vec<PathBuf>> {
    let meta = fs::metadata(path).map_err(|e| {
        error!(parent: span, path = %path.display(), error = %e, "cannot read init path");
        DataError::InitFile(path.to_path_buf())
    })?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = fs::read_dir(path).map_err(|e| {
        error!(parent: span, path = %path.display(), error = %e, "cannot list init directory");
        DataError::InitFile(path.to_path_buf())
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            error!(parent: span, path = %path.display(), error = %e, "cannot list init directory");
            DataError::InitFile(path.to_path_buf())
        })?;
        if entry.file_type().is_ok_and(|t| t.is_file()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads one bootstrap file into statements.
pub fn load_file(path: &Path, span: &Span) -> Result<InitScript> {
    let kind = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let kind = match kind.as_deref() {
        Some(k @ ("sql" | "json" | "yaml" | "yml")) => k.to_string(),
        _ => return Err(DataError::UnsupportedInitFile(path.to_path_buf())),
    };

    let text = fs::read_to_string(path).map_err(|e| {
        error!(parent: span, path = %path.display(), error = %e, "cannot read init file");
        DataError::InitFile(path.to_path_buf())
    })?;

    let statements = if kind == "sql" {
        split_statements(&text)
    } else {
        let doc: std::result::Result<DbInit, String> = if kind == "json" {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|e| e.to_string())
        };
        doc.map_err(|e| {
            error!(parent: span, path = %path.display(), error = %e, "invalid init document");
            DataError::InitFile(path.to_path_buf())
        })?
        .statements()
    };

    Ok(InitScript {
        path: path.to_path_buf(),
        statements,
    })
}

/// Reads every file under `path`. Nothing is returned unless every file
/// loads, so a bad file is reported before any statement runs.
pub fn load(path: &Path, span: &Span) -> Result<Vec<InitScript>> {
    collect_files(path, span)?
        .iter()
        .map(|file| load_file(file, span))
        .collect()
}
