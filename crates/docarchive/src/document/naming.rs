//! Archive file naming policy.
//!
//! Without a template every archive is named after the zero-padded document
//! id. A template such as `{created_year}/{title}` may place archives in
//! subdirectories of `<media_root>/archive`. Collisions are resolved with a
//! `_01`, `_02`, ... suffix.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rusqlite::Connection;
use thiserror::Error;

use crate::db::{document_repo, DatabaseError};
use crate::document::{Document, MediaPaths};
use crate::sanitize::sanitize_component;

static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

const PLACEHOLDERS: &[&str] = &[
    "id",
    "title",
    "created",
    "created_year",
    "created_month",
    "created_day",
    "mime_type",
];

/// Upper bound on suffixed candidates tried for one document.
pub const MAX_ATTEMPTS: u32 = 10_000;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("No free archive filename for document {document_id} after {attempts} attempts")]
    Exhausted { document_id: i64, attempts: u32 },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Checks a filename template for unknown placeholders and unsafe shapes.
pub fn validate_format(format: &str) -> Result<(), String> {
    if format.trim().is_empty() {
        return Err("template is empty".to_string());
    }
    if format.starts_with('/') || format.starts_with('\\') {
        return Err("template must be relative to the archive directory".to_string());
    }
    if format.split('/').any(|part| part == "..") {
        return Err("template must not contain '..' components".to_string());
    }
    for caps in RE_PLACEHOLDER.captures_iter(format) {
        let name = &caps[1];
        if !PLACEHOLDERS.contains(&name) {
            return Err(format!(
                "unknown placeholder {{{}}}, expected one of: {}",
                name,
                PLACEHOLDERS.join(", ")
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct FilenamePolicy {
    format: Option<String>,
}

impl FilenamePolicy {
    pub fn new(format: Option<String>) -> Self {
        Self { format }
    }

    /// The unsuffixed name without extension, possibly containing `/`.
    pub fn base_name(&self, document: &Document) -> String {
        let Some(format) = &self.format else {
            return format!("{:07}", document.id);
        };

        let rendered = RE_PLACEHOLDER.replace_all(format, |caps: &Captures<'_>| {
            sanitize_component(&placeholder_value(document, &caps[1]))
        });

        let cleaned: Vec<String> = rendered
            .split('/')
            .map(sanitize_component)
            .filter(|part| !part.is_empty())
            .collect();

        if cleaned.is_empty() {
            format!("{:07}", document.id)
        } else {
            cleaned.join("/")
        }
    }

    /// Candidate name for the given collision counter. Counter 0 is unsuffixed.
    pub fn candidate(&self, document: &Document, counter: u32, extension: &str) -> String {
        let mut name = self.base_name(document);
        if counter > 0 {
            name.push_str(&format!("_{:02}", counter));
        }
        if !extension.is_empty() {
            name.push('.');
            name.push_str(extension);
        }
        name
    }

    /// Picks the first candidate that is neither present on disk nor held by
    /// another document row.
    ///
    /// Must be called on the connection of the transaction that will record
    /// the name, so the row check and the write see the same state.
    pub fn unique_archive_filename(
        &self,
        conn: &Connection,
        paths: &MediaPaths,
        document: &Document,
        extension: &str,
    ) -> Result<String, NamingError> {
        for counter in 0..MAX_ATTEMPTS {
            let name = self.candidate(document, counter, extension);

            if document.archive_filename.as_deref() == Some(name.as_str()) {
                return Ok(name);
            }
            if paths.archive_path_for(&name).exists() {
                continue;
            }
            if document_repo::archive_filename_taken(conn, &name, document.id)? {
                continue;
            }
            return Ok(name);
        }

        Err(NamingError::Exhausted {
            document_id: document.id,
            attempts: MAX_ATTEMPTS,
        })
    }
}

fn placeholder_value(document: &Document, name: &str) -> String {
    let date = document.created_date();
    match name {
        "id" => format!("{:07}", document.id),
        "title" => document.title.clone(),
        "created" => date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "none".to_string()),
        "created_year" => date
            .map(|d| d.format("%Y").to_string())
            .unwrap_or_else(|| "none".to_string()),
        "created_month" => date
            .map(|d| d.format("%m").to_string())
            .unwrap_or_else(|| "none".to_string()),
        "created_day" => date
            .map(|d| d.format("%d").to_string())
            .unwrap_or_else(|| "none".to_string()),
        "mime_type" => document.mime_type.replace('/', "_"),
        _ => String::new(),
    }
}
