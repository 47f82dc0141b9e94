use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::ParseError;
use crate::parsers::{DocumentLog, DocumentParser, ParsedDocument, ParserContext, ScratchSpace};

/// Characters per line that map to a full-width bar in the thumbnail.
const LINE_WIDTH_CHARS: usize = 80;
/// Text lines sketched into the thumbnail.
const THUMBNAIL_LINES: usize = 40;

/// Plain text: the file content is the text, and there is no archive file.
pub struct TextParser {
    log: DocumentLog,
    scratch: ScratchSpace,
    thumbnail_width: u32,
}

impl TextParser {
    pub fn new(context: ParserContext) -> Self {
        Self {
            log: context.log,
            scratch: ScratchSpace::new(context.scratch_dir),
            thumbnail_width: context.options.thumbnail_width,
        }
    }
}

fn read_text(source: &Path) -> Result<String, ParseError> {
    let bytes = std::fs::read(source).map_err(|e| ParseError::ReadDocument {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl DocumentParser for TextParser {
    fn parse(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<ParsedDocument, ParseError> {
        let _span = tracing::info_span!("parser.text").entered();

        let text = read_text(source)?;
        self.log
            .debug(&format!("Read {} characters of text", text.chars().count()));

        Ok(ParsedDocument {
            text,
            archive_path: None,
        })
    }

    fn thumbnail(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<PathBuf, ParseError> {
        let text = read_text(source)?;
        let image = sketch_text(&text, self.thumbnail_width);

        let path = self.scratch.file("thumbnail.png")?;
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ParseError::Thumbnail(e.to_string()))?;
        Ok(path)
    }

    fn cleanup(&mut self) {
        self.scratch.release();
    }
}

/// A page-shaped sketch: one grey bar per line, as long as the line.
fn sketch_text(text: &str, width: u32) -> RgbImage {
    let width = width.max(16);
    let height = width * 4 / 3;
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    let margin = width / 10;
    let usable = width - 2 * margin;
    let line_height = ((height - 2 * margin) / THUMBNAIL_LINES as u32).max(2);
    let bar_height = (line_height / 2).max(1);

    for (row, line) in text.lines().take(THUMBNAIL_LINES).enumerate() {
        let chars = line.trim_end().chars().count().min(LINE_WIDTH_CHARS);
        if chars == 0 {
            continue;
        }
        let bar_width = (usable as usize * chars / LINE_WIDTH_CHARS).max(1) as u32;
        let top = margin + row as u32 * line_height;
        for y in top..(top + bar_height).min(height) {
            for x in margin..margin + bar_width {
                image.put_pixel(x, y, Rgb([96, 96, 96]));
            }
        }
    }

    image
}
