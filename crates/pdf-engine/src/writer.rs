//! Draw-instruction writer
//!
//! Reloads the source bytes, embeds fonts and images, and appends one content
//! stream per page. The existing page content is wrapped in `q`/`Q` first so
//! its graphics state cannot leak into the overlay.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use stamper_core::config::ExportConfig;
use stamper_core::document::{
    DocumentError, DocumentWriter, DrawInstruction, ImageDraw, PageDrawList, TextRun,
};
use stamper_core::export::Pivot;
use stamper_core::payload::{ImageFormat, ImagePayload};

use crate::text_layout::{layout_lines, LayoutConfig};
use crate::{reject_encrypted, resolve, PdfEngineError};

/// Base-14 font chosen for a family name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    pub fn for_family(family: &str) -> Self {
        let family = family.to_ascii_lowercase();
        if family.contains("courier") || family.contains("mono") {
            Self::Courier
        } else if family.contains("times")
            || family.contains("georgia")
            || (family.contains("serif") && !family.contains("sans"))
        {
            Self::TimesRoman
        } else {
            Self::Helvetica
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }

    fn dictionary(self) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font(),
            "Encoding" => "WinAnsiEncoding",
        }
    }
}

/// Writes annotation overlays into PDF pages with `lopdf`
#[derive(Debug, Clone)]
pub struct LopdfWriter {
    glyph_width_ratio: f32,
}

impl Default for LopdfWriter {
    fn default() -> Self {
        Self::new(&ExportConfig::default())
    }
}

impl LopdfWriter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            glyph_width_ratio: config.glyph_width_ratio,
        }
    }

    /// Apply draw lists to a copy of `source` and serialize the result
    pub fn apply(&self, source: &[u8], pages: &[PageDrawList]) -> Result<Vec<u8>, PdfEngineError> {
        reject_encrypted(source)?;
        let mut doc = Document::load_mem(source)?;
        let page_ids = doc.get_pages();
        let page_count = page_ids.len() as u32;
        let mut fonts: HashMap<StandardFont, ObjectId> = HashMap::new();

        for list in pages.iter().filter(|list| !list.is_empty()) {
            let page_id = *page_ids
                .get(&list.page)
                .ok_or(PdfEngineError::PageOutOfRange {
                    page: list.page,
                    page_count,
                })?;

            let mut resources = effective_resources(&doc, page_id);
            let mut font_dict = owned_subdictionary(&doc, &resources, b"Font");
            let mut xobject_dict = owned_subdictionary(&doc, &resources, b"XObject");
            let mut page_fonts: HashMap<StandardFont, Vec<u8>> = HashMap::new();
            let mut operations = Vec::new();

            for instruction in &list.instructions {
                match instruction {
                    DrawInstruction::Text(run) => {
                        let font = StandardFont::for_family(&run.font_family);
                        let name = match page_fonts.get(&font) {
                            Some(name) => name.clone(),
                            None => {
                                let id = *fonts
                                    .entry(font)
                                    .or_insert_with(|| doc.add_object(font.dictionary()));
                                let name = unused_name(&font_dict, "StampF");
                                font_dict.set(name.clone(), id);
                                page_fonts.insert(font, name.clone());
                                name
                            }
                        };
                        operations.extend(self.text_operations(run, &name));
                    }
                    DrawInstruction::Image(draw) => {
                        let id = embed_image(&mut doc, &draw.payload)?;
                        let name = unused_name(&xobject_dict, "StampIm");
                        xobject_dict.set(name.clone(), id);
                        operations.extend(image_operations(draw, &name));
                    }
                }
            }

            resources.set("Font", font_dict);
            resources.set("XObject", xobject_dict);
            append_contents(&mut doc, page_id, resources, operations)?;
            tracing::debug!(page = list.page, instructions = list.instructions.len(), "page overlay written");
        }

        doc.compress();
        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| PdfEngineError::Backend(e.to_string()))?;
        Ok(output)
    }

    fn text_operations(&self, run: &TextRun, font_name: &[u8]) -> Vec<Operation> {
        let lines = layout_lines(
            &run.text,
            &LayoutConfig {
                wrap_width: run.wrap_width,
                font_size: run.font_size,
                char_width_ratio: self.glyph_width_ratio,
            },
        );
        let [r, g, b] = run.color;

        let mut ops = vec![Operation::new("q", vec![])];
        if let Some(matrix) = rotation_matrix(run.pivot, run.rotation) {
            ops.push(concat_matrix(matrix));
        }
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.to_vec()), run.font_size.into()],
            ),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("TL", vec![(run.font_size * run.line_height).into()]),
            Operation::new("Td", vec![run.rect.x.into(), run.baseline_y.into()]),
        ]);
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
        ops
    }
}

impl DocumentWriter for LopdfWriter {
    fn write(&self, source: &[u8], pages: &[PageDrawList]) -> Result<Vec<u8>, DocumentError> {
        self.apply(source, pages)
            .map_err(|err| DocumentError::Write(err.to_string()))
    }
}

fn image_operations(draw: &ImageDraw, name: &[u8]) -> Vec<Operation> {
    let rect = draw.rect;
    let mut ops = vec![Operation::new("q", vec![])];
    if let Some(matrix) = rotation_matrix(draw.pivot, draw.rotation) {
        ops.push(concat_matrix(matrix));
    }
    ops.push(concat_matrix([rect.width, 0.0, 0.0, rect.height, rect.x, rect.y]));
    ops.push(Operation::new("Do", vec![Object::Name(name.to_vec())]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

fn concat_matrix(matrix: [f32; 6]) -> Operation {
    Operation::new("cm", matrix.into_iter().map(Object::from).collect())
}

/// `cm` matrix rotating clockwise by `degrees` about `pivot` in a Y-up space.
///
/// Returns `None` when there is nothing to rotate.
pub fn rotation_matrix(pivot: Pivot, degrees: f32) -> Option<[f32; 6]> {
    let degrees = degrees.rem_euclid(360.0);
    if degrees == 0.0 || degrees == 360.0 {
        return None;
    }
    // Clockwise on screen is a negative angle once Y points up
    let (sin, cos) = (-degrees).to_radians().sin_cos();
    let (a, b, c, d) = (cos, sin, -sin, cos);
    Some([
        a,
        b,
        c,
        d,
        pivot.x - (a * pivot.x + c * pivot.y),
        pivot.y - (b * pivot.x + d * pivot.y),
    ])
}

/// Encode text for a WinAnsiEncoding font; unmapped characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' | '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

fn embed_image(doc: &mut Document, payload: &ImagePayload) -> Result<ObjectId, PdfEngineError> {
    match payload.format {
        ImageFormat::Jpeg => {
            let frame = jpeg_frame(&payload.bytes)
                .ok_or_else(|| PdfEngineError::Backend("JPEG has no frame header".to_string()))?;
            let color_space = match frame.components {
                1 => "DeviceGray",
                3 => "DeviceRGB",
                4 => "DeviceCMYK",
                n => {
                    return Err(PdfEngineError::Backend(format!(
                        "JPEG with {n} color components is not supported"
                    )))
                }
            };
            let mut image_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => payload.width_px as i64,
                "Height" => payload.height_px as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            };
            // Adobe CMYK JPEGs store inverted samples
            if frame.components == 4 && frame.adobe {
                image_dict.set(
                    "Decode",
                    [1, 0, 1, 0, 1, 0, 1, 0].into_iter().map(Object::from).collect::<Vec<_>>(),
                );
            }
            Ok(doc.add_object(Stream::new(image_dict, payload.bytes.clone())))
        }
        ImageFormat::Png => {
            let img = image::load_from_memory_with_format(&payload.bytes, image::ImageFormat::Png)?
                .to_rgba8();
            let (img_w, img_h) = img.dimensions();
            let mut rgb = Vec::with_capacity((img_w * img_h * 3) as usize);
            let mut alpha = Vec::with_capacity((img_w * img_h) as usize);
            for pixel in img.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel[3]);
            }

            let mut image_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_w as i64,
                "Height" => img_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            };
            if payload.has_alpha {
                let smask_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => img_w as i64,
                        "Height" => img_h as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    alpha,
                ));
                image_dict.set("SMask", smask_id);
            }
            Ok(doc.add_object(Stream::new(image_dict, rgb)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    components: u8,
    /// An Adobe APP14 segment precedes the frame
    adobe: bool,
}

/// Walk JPEG marker segments up to the first start-of-frame
fn jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if bytes.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut adobe = false;
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            0xFF => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            _ => {}
        }
        let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let segment = bytes.get(i + 4..i + 2 + length)?;
        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            // SOF0..SOF15 except DHT, JPG and DAC: precision, height, width, components
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return segment.get(5).map(|&components| JpegFrame { components, adobe });
            }
            _ => {}
        }
        i += 2 + length;
    }
    None
}

/// Resources of a page, following inheritance through `Parent`, as an owned copy
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(resources) = dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        {
            return resources.clone();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

fn owned_subdictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

fn unused_name(dict: &Dictionary, prefix: &str) -> Vec<u8> {
    let mut index = 1;
    loop {
        let name = format!("{prefix}{index}").into_bytes();
        if !dict.has(&name) {
            return name;
        }
        index += 1;
    }
}

/// Replace the page resources and append the overlay content stream
fn append_contents(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
    operations: Vec<Operation>,
) -> Result<(), PdfEngineError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut ops = Vec::with_capacity(operations.len() + 1);
    if !existing.is_empty() {
        let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        ops.push(Operation::new("Q", vec![]));
    }
    ops.extend(operations);

    let overlay = Content { operations: ops }.encode()?;
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", contents);
    page.set("Resources", resources);
    Ok(())
}
