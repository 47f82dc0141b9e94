//! Builders for test configs, seeded documents and fake parsers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lopdf::{dictionary, Object, Stream};

use docarchive::config::{Config, ParsersConfig};
use docarchive::error::ParseError;
use docarchive::parsers::{DocumentParser, ParsedDocument, ParserContext, ParserEntry};

/// Builder for `Config` instances rooted in a test directory.
pub struct ConfigBuilder {
    task_workers: usize,
    filename_format: Option<String>,
    parsers: ParsersConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            task_workers: 1,
            filename_format: None,
            parsers: ParsersConfig::default(),
        }
    }

    pub fn task_workers(mut self, count: usize) -> Self {
        self.task_workers = count;
        self
    }

    pub fn filename_format(mut self, format: &str) -> Self {
        self.filename_format = Some(format.to_string());
        self
    }

    pub fn pdftoppm(mut self, program: impl AsRef<Path>) -> Self {
        self.parsers.pdftoppm = program.as_ref().to_string_lossy().to_string();
        self
    }

    pub fn thumbnail_width(mut self, width: u32) -> Self {
        self.parsers.thumbnail_width = width;
        self
    }

    pub fn build(self, base: &Path) -> Config {
        let mut config = Config::new(base.join("media"), base.join("data"));
        config.scratch_directory = base.join("scratch").to_string_lossy().to_string();
        config.task_workers = self.task_workers;
        config.filename_format = self.filename_format;
        config.parsers = self.parsers;
        config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A document to seed: original bytes plus the repository row.
pub struct DocumentBuilder {
    pub title: String,
    pub mime_type: String,
    pub filename: String,
    pub content: Vec<u8>,
    pub created: String,
}

impl DocumentBuilder {
    pub fn new(filename: &str, mime_type: &str) -> Self {
        Self {
            title: filename.to_string(),
            mime_type: mime_type.to_string(),
            filename: filename.to_string(),
            content: Vec::new(),
            created: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    pub fn pdf(filename: &str, text: &str) -> Self {
        Self::new(filename, "application/pdf").content(sample_pdf(text))
    }

    pub fn text(filename: &str, text: &str) -> Self {
        Self::new(filename, "text/plain").content(text.as_bytes().to_vec())
    }

    pub fn png(filename: &str, width: u32, height: u32) -> Self {
        Self::new(filename, "image/png").content(sample_png(width, height))
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn content(mut self, content: Vec<u8>) -> Self {
        self.content = content;
        self
    }

    pub fn created(mut self, created: &str) -> Self {
        self.created = created.to_string();
        self
    }
}

/// One-page PDF showing `text` in Helvetica.
pub fn sample_pdf(text: &str) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize sample PDF");
    bytes
}

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode sample PNG");
    bytes.into_inner()
}

/// Behaviour of a [`ScriptedParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Writes `archive.pdf` with the source bytes and a thumbnail.
    Archive,
    /// Text only, no archive.
    TextOnly,
    FailParse,
    FailThumbnail,
    Panic,
}

/// Parser whose behaviour is fixed per registry entry. Counts cleanups.
pub struct ScriptedParser {
    script: Script,
    scratch: PathBuf,
    cleanups: Arc<AtomicUsize>,
}

impl ScriptedParser {
    /// Registry entry for `mime_type` that builds parsers following `script`.
    pub fn entry(mime_type: &str, script: Script, cleanups: Arc<AtomicUsize>) -> ParserEntry {
        ParserEntry::new("scripted", 100, &[mime_type], move |ctx: ParserContext| {
            let scratch = ctx.scratch_dir.join(ctx.logging_group.to_string());
            std::fs::create_dir_all(&scratch).expect("Failed to create parser scratch");
            Box::new(ScriptedParser {
                script,
                scratch,
                cleanups: Arc::clone(&cleanups),
            })
        })
    }
}

impl DocumentParser for ScriptedParser {
    fn parse(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<ParsedDocument, ParseError> {
        match self.script {
            Script::FailParse => Err(ParseError::PdfProcessing("scripted failure".to_string())),
            Script::Panic => panic!("scripted panic"),
            Script::TextOnly => Ok(ParsedDocument {
                text: "text only".to_string(),
                archive_path: None,
            }),
            Script::Archive | Script::FailThumbnail => {
                let bytes = std::fs::read(source).map_err(|e| ParseError::ReadDocument {
                    path: source.to_path_buf(),
                    source: e,
                })?;
                let archive = self.scratch.join("archive.pdf");
                std::fs::write(&archive, bytes).map_err(|e| ParseError::Scratch {
                    path: archive.clone(),
                    source: e,
                })?;
                Ok(ParsedDocument {
                    text: "scripted text".to_string(),
                    archive_path: Some(archive),
                })
            }
        }
    }

    fn thumbnail(
        &mut self,
        _source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<PathBuf, ParseError> {
        if self.script == Script::FailThumbnail {
            return Err(ParseError::Thumbnail("scripted failure".to_string()));
        }
        let thumb = self.scratch.join("thumbnail.png");
        std::fs::write(&thumb, sample_png(4, 4)).map_err(|e| ParseError::Scratch {
            path: thumb.clone(),
            source: e,
        })?;
        Ok(thumb)
    }

    fn cleanup(&mut self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        let _ = std::fs::remove_dir_all(&self.scratch);
    }
}
