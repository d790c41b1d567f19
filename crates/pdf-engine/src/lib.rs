use image::{ImageBuffer, Rgba};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::fs;
use std::path::Path;

use stamper_core::document::{DocumentError, DocumentLoader, PageRenderer, PageSize};
use stamper_core::SurfaceExtent;

pub mod text_layout;
pub mod writer;

pub use writer::LopdfWriter;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no usable MediaBox
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("no document is open")]
    NotOpen,
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

/// Page-size reader and placeholder rasterizer over `lopdf`
#[derive(Debug, Default)]
pub struct LopdfEngine {
    record: Option<DocumentRecord>,
    last_surface: Option<RgbaImage>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open document bytes, replacing any open document
    pub fn open(&mut self, bytes: Vec<u8>) -> Result<&[PageSize], PdfEngineError> {
        let page_sizes = parse_sizes(&bytes)?;
        self.last_surface = None;
        let record = self.record.insert(DocumentRecord { bytes, page_sizes });
        Ok(&record.page_sizes)
    }

    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> Result<&[PageSize], PdfEngineError> {
        let bytes = fs::read(path)?;
        self.open(bytes)
    }

    fn record(&self) -> Result<&DocumentRecord, PdfEngineError> {
        self.record.as_ref().ok_or(PdfEngineError::NotOpen)
    }

    /// Bytes of the open document
    pub fn bytes(&self) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record()?.bytes)
    }

    pub fn page_count(&self) -> Result<u32, PdfEngineError> {
        Ok(self.record()?.page_sizes.len() as u32)
    }

    pub fn page_sizes(&self) -> Result<&[PageSize], PdfEngineError> {
        Ok(&self.record()?.page_sizes)
    }

    /// Size of a 1-based page
    pub fn page_size(&self, page: u32) -> Result<PageSize, PdfEngineError> {
        let record = self.record()?;
        page.checked_sub(1)
            .and_then(|index| record.page_sizes.get(index as usize))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange {
                page,
                page_count: record.page_sizes.len() as u32,
            })
    }

    /// Rasterize a 1-based page at `zoom` (pixels per point).
    ///
    /// Page content is not drawn; the raster is a blank sheet with a light
    /// border, sized exactly as the page would be.
    pub fn render(&self, page: u32, zoom: f32) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(page)?;
        let scale = if zoom <= 0.0 || !zoom.is_finite() { 1.0 } else { zoom };

        let width = (page_size.width * scale).round().max(1.0) as u32;
        let height = (page_size.height * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    /// Most recent surface produced through [`PageRenderer`]
    pub fn last_surface(&self) -> Option<&RgbaImage> {
        self.last_surface.as_ref()
    }
}

impl DocumentLoader for LopdfEngine {
    fn load(&mut self, bytes: &[u8]) -> Result<Vec<PageSize>, DocumentError> {
        self.open(bytes.to_vec())
            .map(|sizes| sizes.to_vec())
            .map_err(|err| match err {
                PdfEngineError::NoPages => DocumentError::Empty,
                other => DocumentError::Load(other.to_string()),
            })
    }
}

impl PageRenderer for LopdfEngine {
    fn render_page(&mut self, page: u32, zoom: f32) -> Result<SurfaceExtent, DocumentError> {
        let surface = self.render(page, zoom).map_err(|err| match err {
            PdfEngineError::NotOpen => DocumentError::NotLoaded,
            PdfEngineError::PageOutOfRange { page, page_count } => DocumentError::InvalidPageIndex {
                page,
                count: page_count,
            },
            other => DocumentError::Render {
                page,
                reason: other.to_string(),
            },
        })?;
        let extent = SurfaceExtent::new(surface.width() as f32, surface.height() as f32);
        self.last_surface = Some(surface);
        Ok(extent)
    }
}

pub(crate) fn reject_encrypted(bytes: &[u8]) -> Result<(), PdfEngineError> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }
    Ok(())
}

fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
    reject_encrypted(bytes)?;

    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let mut sizes = Vec::with_capacity(pages.len());

    for (_, object_id) in pages {
        sizes.push(media_box(&doc, object_id).unwrap_or(DEFAULT_PAGE_SIZE));
    }

    if sizes.is_empty() {
        return Err(PdfEngineError::NoPages);
    }

    Ok(sizes)
}

/// MediaBox of a page, following inheritance through `Parent`
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Some(size) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(PageSize::new((x1 - x0).abs(), (y1 - y0).abs()))
            })
        {
            return Some(size);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Build a minimal document with one empty page per size
pub fn blank_document(sizes: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = sizes
        .iter()
        .map(|size| {
            let page: Dictionary = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), size.width.into(), size.height.into()],
                "Resources" => dictionary! {},
            };
            Object::Reference(doc.add_object(page))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => sizes.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfEngineError::Backend(e.to_string()))?;
    Ok(buffer)
}
