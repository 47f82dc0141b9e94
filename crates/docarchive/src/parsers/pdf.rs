use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ParseError;
use crate::parsers::{DocumentLog, DocumentParser, ParsedDocument, ParserContext, ScratchSpace};

/// PDF: text comes from the embedded text layer (no OCR), the archive is a
/// cleaned-up and recompressed copy, the thumbnail is page one rendered
/// by `pdftoppm`.
pub struct PdfParser {
    log: DocumentLog,
    scratch: ScratchSpace,
    thumbnail_width: u32,
    pdftoppm: String,
}

impl PdfParser {
    pub fn new(context: ParserContext) -> Self {
        Self {
            log: context.log,
            scratch: ScratchSpace::new(context.scratch_dir),
            thumbnail_width: context.options.thumbnail_width,
            pdftoppm: context.options.pdftoppm,
        }
    }
}

impl DocumentParser for PdfParser {
    fn parse(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<ParsedDocument, ParseError> {
        let _span = tracing::info_span!("parser.pdf").entered();

        let pdf_bytes = std::fs::read(source).map_err(|e| ParseError::ReadDocument {
            path: source.to_path_buf(),
            source: e,
        })?;

        let mut doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ParseError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let text = extract_text_from_pdf(&doc, &self.log);
        if text.trim().is_empty() {
            self.log
                .warn("PDF has no text layer, archive will carry no content");
        }

        let archive_path = self.scratch.file("archive.pdf")?;
        normalize_pdf(&mut doc, &archive_path)?;
        self.log.debug(&format!(
            "Wrote normalized archive with {} page(s)",
            doc.get_pages().len()
        ));

        Ok(ParsedDocument {
            text,
            archive_path: Some(archive_path),
        })
    }

    fn thumbnail(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<PathBuf, ParseError> {
        let _span = tracing::info_span!("parser.pdf.thumbnail").entered();

        let prefix = self.scratch.file("thumbnail")?;
        let output = Command::new(&self.pdftoppm)
            .args(["-png", "-singlefile", "-f", "1", "-l", "1", "-scale-to"])
            .arg(self.thumbnail_width.to_string())
            .arg(source)
            .arg(&prefix)
            .output()
            .map_err(|e| ParseError::ExternalTool {
                tool: self.pdftoppm.clone(),
                reason: format!("{}. Make sure poppler-utils is installed.", e),
            })?;

        self.log.forward_stderr(&self.pdftoppm, &output.stderr);

        if !output.status.success() {
            return Err(ParseError::ExternalTool {
                tool: self.pdftoppm.clone(),
                reason: format!("exited with {}", output.status),
            });
        }

        let png = prefix.with_extension("png");
        if !png.exists() {
            return Err(ParseError::Thumbnail(format!(
                "{} produced no output",
                self.pdftoppm
            )));
        }
        Ok(png)
    }

    fn cleanup(&mut self) {
        self.scratch.release();
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document, log: &DocumentLog) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => log.warn(&format!("No text extracted from page {}: {}", page_num, e)),
        }
    }

    text
}

/// Drops unreferenced objects and empty streams, compresses the rest and
/// writes the result to `target`.
fn normalize_pdf(doc: &mut lopdf::Document, target: &Path) -> Result<(), ParseError> {
    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    doc.save(target)
        .map_err(|e| ParseError::PdfProcessing(format!("Failed to write archive: {}", e)))?;
    Ok(())
}
