//! The document record and the media layout derived from it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::sanitize::sanitize_component;

pub mod naming;

pub use naming::{FilenamePolicy, NamingError};

/// A document row as stored in the repository.
///
/// `content`, `archive_checksum` and `archive_filename` are written together
/// by the archive commit; a row has either all three or none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub mime_type: String,
    /// Original file name, relative to `<media_root>/originals`.
    pub filename: String,
    /// Checksum of the original file.
    pub checksum: String,
    pub content: Option<String>,
    pub archive_checksum: Option<String>,
    /// Archive file name, relative to `<media_root>/archive`.
    pub archive_filename: Option<String>,
    pub created: String,
    pub added: String,
    pub modified: String,
}

impl Document {
    pub fn has_archive_version(&self) -> bool {
        self.archive_filename.is_some()
    }

    /// The name the document is presented under: sanitized title plus the
    /// extension of the original file.
    pub fn public_filename(&self) -> String {
        let mut name = sanitize_component(&self.title);
        if name.is_empty() {
            name = format!("{:07}", self.id);
        }
        match Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) => format!("{}.{}", name, ext.to_lowercase()),
            None => name,
        }
    }

    /// Parses `created` as RFC 3339, falling back to a bare `YYYY-MM-DD`.
    pub fn created_date(&self) -> Option<NaiveDate> {
        DateTime::<FixedOffset>::parse_from_rfc3339(&self.created)
            .map(|dt| dt.date_naive())
            .ok()
            .or_else(|| NaiveDate::parse_from_str(&self.created, "%Y-%m-%d").ok())
    }
}

/// Fields needed to create a document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub mime_type: String,
    pub filename: String,
    pub checksum: String,
    pub created: String,
}

/// Layout of the media root.
///
/// ```text
/// <root>/originals/<filename>
/// <root>/archive/<archive_filename>
/// <root>/thumbnails/<id:07>.png
/// ```
#[derive(Debug, Clone)]
pub struct MediaPaths {
    root: PathBuf,
}

impl MediaPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn originals_dir(&self) -> PathBuf {
        self.root.join("originals")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn source_path(&self, document: &Document) -> PathBuf {
        self.originals_dir().join(&document.filename)
    }

    /// `None` until the document has an archive version.
    pub fn archive_path(&self, document: &Document) -> Option<PathBuf> {
        document
            .archive_filename
            .as_deref()
            .map(|name| self.archive_path_for(name))
    }

    pub fn archive_path_for(&self, archive_filename: &str) -> PathBuf {
        self.archive_dir().join(archive_filename)
    }

    pub fn thumbnail_path(&self, document: &Document) -> PathBuf {
        self.thumbnail_dir().join(format!("{:07}.png", document.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            id: 42,
            title: "Invoice 2024/03".to_string(),
            mime_type: "application/pdf".to_string(),
            filename: "scan-0042.PDF".to_string(),
            checksum: "abc".to_string(),
            content: None,
            archive_checksum: None,
            archive_filename: None,
            created: "2024-03-15T10:00:00+01:00".to_string(),
            added: "2024-03-15T10:00:00+01:00".to_string(),
            modified: "2024-03-15T10:00:00+01:00".to_string(),
        }
    }

    #[test]
    fn test_public_filename() {
        assert_eq!(doc().public_filename(), "Invoice 2024_03.pdf");
    }

    #[test]
    fn test_public_filename_empty_title() {
        let mut d = doc();
        d.title = "..".to_string();
        d.filename = "noext".to_string();
        assert_eq!(d.public_filename(), "0000042");
    }

    #[test]
    fn test_has_archive_version() {
        let mut d = doc();
        assert!(!d.has_archive_version());
        d.archive_filename = Some("0000042.pdf".to_string());
        assert!(d.has_archive_version());
    }

    #[test]
    fn test_created_date_formats() {
        let mut d = doc();
        assert_eq!(d.created_date(), NaiveDate::from_ymd_opt(2024, 3, 15));
        d.created = "2023-12-01".to_string();
        assert_eq!(d.created_date(), NaiveDate::from_ymd_opt(2023, 12, 1));
        d.created = "yesterday".to_string();
        assert_eq!(d.created_date(), None);
    }

    #[test]
    fn test_media_paths() {
        let paths = MediaPaths::new("/srv/media");
        let mut d = doc();
        assert_eq!(
            paths.source_path(&d),
            PathBuf::from("/srv/media/originals/scan-0042.PDF")
        );
        assert_eq!(paths.archive_path(&d), None);
        assert_eq!(
            paths.thumbnail_path(&d),
            PathBuf::from("/srv/media/thumbnails/0000042.png")
        );

        d.archive_filename = Some("2024/0000042.pdf".to_string());
        assert_eq!(
            paths.archive_path(&d),
            Some(PathBuf::from("/srv/media/archive/2024/0000042.pdf"))
        );
    }
}
