//! Document parsers and the registry that picks one per mime type.
//!
//! A parser instance handles exactly one document. It is created with a
//! fresh logging group, asked to parse and to thumbnail, and finally told to
//! clean up. Files it produces live in its own scratch directory until the
//! commit moves them into the media tree.

pub mod image;
pub mod log;
pub mod pdf;
pub mod scratch;
pub mod text;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::ParsersConfig;
use crate::error::ParseError;

pub use log::DocumentLog;
pub use scratch::ScratchSpace;

/// Result of parsing one document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    /// Normalized archive file in the parser's scratch directory, if the
    /// parser produces one for this format.
    pub archive_path: Option<PathBuf>,
}

pub trait DocumentParser: Send {
    fn parse(
        &mut self,
        source: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<ParsedDocument, ParseError>;

    /// Renders a PNG thumbnail into the scratch directory.
    fn thumbnail(
        &mut self,
        source: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<PathBuf, ParseError>;

    /// Releases temporary resources. Called exactly once per instance.
    fn cleanup(&mut self);
}

/// Everything a parser instance is constructed with.
#[derive(Debug, Clone)]
pub struct ParserContext {
    pub logging_group: Uuid,
    pub scratch_dir: PathBuf,
    pub log: DocumentLog,
    pub options: ParsersConfig,
}

type ParserFactory = Arc<dyn Fn(ParserContext) -> Box<dyn DocumentParser> + Send + Sync>;

/// A registered parser capability.
#[derive(Clone)]
pub struct ParserEntry {
    name: &'static str,
    weight: i32,
    mime_types: Vec<String>,
    factory: ParserFactory,
}

impl ParserEntry {
    /// `mime_types` entries may end in `/*` to match a whole top-level type.
    pub fn new<F>(name: &'static str, weight: i32, mime_types: &[&str], factory: F) -> Self
    where
        F: Fn(ParserContext) -> Box<dyn DocumentParser> + Send + Sync + 'static,
    {
        Self {
            name,
            weight,
            mime_types: mime_types.iter().map(|m| m.to_ascii_lowercase()).collect(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.to_ascii_lowercase();
        self.mime_types.iter().any(|pattern| {
            match pattern.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .is_some_and(|(top, _)| top == prefix),
                None => *pattern == mime_type,
            }
        })
    }

    pub fn create(&self, context: ParserContext) -> Box<dyn DocumentParser> {
        (self.factory)(context)
    }
}

impl fmt::Debug for ParserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserEntry")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("mime_types", &self.mime_types)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    entries: Vec<ParserEntry>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in text, PDF and image parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ParserEntry::new(
            "text",
            0,
            &["text/*"],
            |ctx| Box::new(text::TextParser::new(ctx)),
        ));
        registry.register(ParserEntry::new(
            "pdf",
            0,
            &["application/pdf"],
            |ctx| Box::new(pdf::PdfParser::new(ctx)),
        ));
        registry.register(ParserEntry::new(
            "image",
            0,
            image::SUPPORTED_MIME_TYPES,
            |ctx| Box::new(image::ImageParser::new(ctx)),
        ));
        registry
    }

    pub fn register(&mut self, entry: ParserEntry) {
        self.entries.push(entry);
    }

    /// The highest-weighted parser supporting `mime_type`. Among equal
    /// weights the earliest registration wins.
    pub fn lookup(&self, mime_type: &str) -> Option<&ParserEntry> {
        let mut best: Option<&ParserEntry> = None;
        for entry in self.entries.iter().filter(|e| e.supports(mime_type)) {
            if best.is_none_or(|b| entry.weight > b.weight) {
                best = Some(entry);
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullParser;

    impl DocumentParser for NullParser {
        fn parse(&mut self, _: &Path, _: &str, _: &str) -> Result<ParsedDocument, ParseError> {
            Ok(ParsedDocument::default())
        }

        fn thumbnail(&mut self, _: &Path, _: &str, _: &str) -> Result<PathBuf, ParseError> {
            Err(ParseError::Thumbnail("none".to_string()))
        }

        fn cleanup(&mut self) {}
    }

    #[test]
    fn test_default_lookup() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.lookup("text/plain").unwrap().name(), "text");
        assert_eq!(registry.lookup("text/csv").unwrap().name(), "text");
        assert_eq!(registry.lookup("application/pdf").unwrap().name(), "pdf");
        assert_eq!(registry.lookup("image/png").unwrap().name(), "image");
        assert_eq!(registry.lookup("IMAGE/JPEG").unwrap().name(), "image");
    }

    #[test]
    fn test_unknown_mime_type() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.lookup("application/x-unknown").is_none());
        assert!(registry.lookup("textual").is_none());
    }

    #[test]
    fn test_weight_overrides_default() {
        let mut registry = ParserRegistry::with_defaults();
        registry.register(ParserEntry::new("custom-pdf", 10, &["application/pdf"], |_| {
            Box::new(NullParser)
        }));
        registry.register(ParserEntry::new("late-text", 0, &["text/plain"], |_| {
            Box::new(NullParser)
        }));

        assert_eq!(registry.lookup("application/pdf").unwrap().name(), "custom-pdf");
        assert_eq!(registry.lookup("text/plain").unwrap().name(), "text");
    }

    #[test]
    fn test_empty_registry() {
        let registry = ParserRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.lookup("text/plain").is_none());
        assert_eq!(ParserRegistry::with_defaults().len(), 3);
    }
}
