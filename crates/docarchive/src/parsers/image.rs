use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ParseError;
use crate::parsers::{DocumentLog, DocumentParser, ParsedDocument, ParserContext, ScratchSpace};

pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
];

/// Raster images: the archive is a single-page PDF embedding the image,
/// the text is empty (no OCR).
pub struct ImageParser {
    log: DocumentLog,
    scratch: ScratchSpace,
    thumbnail_width: u32,
}

impl ImageParser {
    pub fn new(context: ParserContext) -> Self {
        Self {
            log: context.log,
            scratch: ScratchSpace::new(context.scratch_dir),
            thumbnail_width: context.options.thumbnail_width,
        }
    }
}

fn read_image(source: &Path) -> Result<Vec<u8>, ParseError> {
    std::fs::read(source).map_err(|e| ParseError::ReadDocument {
        path: source.to_path_buf(),
        source: e,
    })
}

impl DocumentParser for ImageParser {
    fn parse(
        &mut self,
        source: &Path,
        mime_type: &str,
        _display_name: &str,
    ) -> Result<ParsedDocument, ParseError> {
        let _span = tracing::info_span!("parser.image").entered();

        let image_data = read_image(source)?;
        let pdf_bytes = create_image_pdf(&image_data, mime_type)?;

        let archive_path = self.scratch.file("archive.pdf")?;
        std::fs::write(&archive_path, &pdf_bytes)
            .map_err(|e| ParseError::PdfProcessing(format!("Failed to write archive: {}", e)))?;
        self.log
            .debug(&format!("Embedded image into {} byte PDF", pdf_bytes.len()));

        Ok(ParsedDocument {
            text: String::new(),
            archive_path: Some(archive_path),
        })
    }

    fn thumbnail(
        &mut self,
        source: &Path,
        _mime_type: &str,
        _display_name: &str,
    ) -> Result<PathBuf, ParseError> {
        let image_data = read_image(source)?;
        let img = image::load_from_memory(&image_data)
            .map_err(|e| ParseError::Thumbnail(format!("Failed to load image: {}", e)))?;

        let size = self.thumbnail_width;
        let thumb = img.thumbnail(size, size * 4 / 3);

        let path = self.scratch.file("thumbnail.png")?;
        thumb
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ParseError::Thumbnail(e.to_string()))?;
        Ok(path)
    }

    fn cleanup(&mut self) {
        self.scratch.release();
    }
}

/// A4 in points. Landscape images get the page turned sideways.
const A4: (i64, i64) = (595, 842);
const MARGIN: i64 = 24;

/// Where the image lands on the page, in points.
#[derive(Debug, PartialEq, Eq)]
struct Placement {
    page: (i64, i64),
    origin: (i64, i64),
    size: (i64, i64),
}

impl Placement {
    fn fit(width: u32, height: u32) -> Self {
        let page = if width > height { (A4.1, A4.0) } else { A4 };
        let scale = ((page.0 - 2 * MARGIN) as f64 / width as f64)
            .min((page.1 - 2 * MARGIN) as f64 / height as f64);
        let size = (
            ((width as f64 * scale) as i64).max(1),
            ((height as f64 * scale) as i64).max(1),
        );
        Self {
            page,
            origin: ((page.0 - size.0) / 2, (page.1 - size.1) / 2),
            size,
        }
    }

    fn draw(&self, name: &str) -> String {
        format!(
            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            self.size.0, self.size.1, self.origin.0, self.origin.1, name
        )
    }
}

/// Wraps the image as an XObject. RGB JPEGs pass through untouched, every
/// other input is flattened to compressed RGB samples.
fn image_xobject(img: &image::DynamicImage, original: &[u8], mime_type: &str) -> Stream {
    let (width, height) = img.dimensions();
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    let passthrough = mime_type.eq_ignore_ascii_case("image/jpeg")
        && img.color() == image::ColorType::Rgb8;
    if passthrough {
        dict.set("Filter", "DCTDecode");
        return Stream::new(dict, original.to_vec());
    }

    let mut stream = Stream::new(dict, img.to_rgb8().into_raw());
    if let Err(e) = stream.compress() {
        tracing::debug!(error = %e, "Leaving image stream uncompressed");
    }
    stream
}

fn create_image_pdf(image_data: &[u8], mime_type: &str) -> Result<Vec<u8>, ParseError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ParseError::ImageProcessing(format!("Failed to load image: {}", e)))?;
    let (width, height) = img.dimensions();
    let placement = Placement::fit(width, height);

    let mut doc = Document::with_version("1.5");
    let image_id = doc.add_object(image_xobject(&img, image_data, mime_type));
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        placement.draw("Im1").into_bytes(),
    ));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), placement.page.0.into(), placement.page.1.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        },
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

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ParseError::PdfProcessing(e.to_string()))?;
    Ok(buffer)
}
