//! PDF serialization via `printpdf`.

use super::{Document, Element, Page, Raster};
use crate::error::CompositionError;
use image::{DynamicImage, Rgb, RgbImage};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Resolution rasters are embedded at before scaling into their box.
const IMAGE_DPI: f32 = 300.0;
const MM_PER_INCH: f32 = 25.4;
const LAYER: &str = "Layer 1";

/// TrueType font bytes used for label text.
#[derive(Clone)]
pub struct FontResource {
    pub path: PathBuf,
    bytes: Arc<Vec<u8>>,
}

impl std::fmt::Debug for FontResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResource")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FontResource {
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes: Arc::new(bytes),
        }
    }

    /// First candidate that can be read and embedded.
    pub fn discover(candidates: &[PathBuf]) -> Option<Self> {
        candidates.iter().find_map(|path| match fs::read(path) {
            Ok(bytes) => {
                let font = Self::from_bytes(path.clone(), bytes);
                if font.embeddable() {
                    tracing::info!("using font {}", path.display());
                    Some(font)
                } else {
                    tracing::warn!("font candidate {} is not a usable TrueType font", path.display());
                    None
                }
            }
            Err(e) => {
                tracing::debug!("font candidate {} unusable: {e}", path.display());
                None
            }
        })
    }

    fn embeddable(&self) -> bool {
        PdfDocument::empty("font check")
            .add_external_font(Cursor::new(self.bytes.as_slice()))
            .is_ok()
    }
}

/// The mode `write_pdf` will end up in for `font`.
pub fn font_mode(font: Option<&FontResource>) -> FontMode {
    match font {
        Some(font) if font.embeddable() => FontMode::Embedded,
        _ => FontMode::Builtin,
    }
}

/// How text ended up being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontMode {
    /// The injected font was embedded.
    Embedded,
    /// Helvetica-Bold; characters outside Latin-1 print as `?`.
    Builtin,
}

/// Write `doc` to `path`.
///
/// The PDF is serialized in memory first; a failed write removes the partial
/// file.
pub fn write_pdf(
    doc: &Document,
    font: Option<&FontResource>,
    path: &Path,
) -> Result<FontMode, CompositionError> {
    let (pdf, mode) = build(doc, font)?;
    let bytes = pdf.save_to_bytes()?;
    if let Err(e) = fs::write(path, &bytes) {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
        return Err(e.into());
    }
    Ok(mode)
}

fn build(
    doc: &Document,
    font: Option<&FontResource>,
) -> Result<(PdfDocumentReference, FontMode), CompositionError> {
    let Some((first, rest)) = doc.pages().split_first() else {
        return Err(CompositionError::EmptyDocument);
    };
    let (pdf, page, layer) = PdfDocument::new(
        doc.title.as_str(),
        Mm(first.size.width_mm),
        Mm(first.size.height_mm),
        LAYER,
    );
    let (font_ref, mode) = load_font(&pdf, font)?;

    draw_page(doc, first, &pdf.get_page(page).get_layer(layer), &font_ref, mode)?;
    for p in rest {
        let (page, layer) = pdf.add_page(Mm(p.size.width_mm), Mm(p.size.height_mm), LAYER);
        draw_page(doc, p, &pdf.get_page(page).get_layer(layer), &font_ref, mode)?;
    }
    Ok((pdf, mode))
}

fn load_font(
    pdf: &PdfDocumentReference,
    font: Option<&FontResource>,
) -> Result<(IndirectFontRef, FontMode), CompositionError> {
    if let Some(font) = font {
        match pdf.add_external_font(Cursor::new(font.bytes.as_slice())) {
            Ok(r) => return Ok((r, FontMode::Embedded)),
            Err(e) => tracing::warn!("font {} rejected: {e}", font.path.display()),
        }
    }
    Ok((pdf.add_builtin_font(BuiltinFont::HelveticaBold)?, FontMode::Builtin))
}

fn draw_page(
    doc: &Document,
    page: &Page,
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    mode: FontMode,
) -> Result<(), CompositionError> {
    let page_height = page.size.height_mm;
    for element in &page.elements {
        match element {
            Element::Image { raster, rect } => {
                let raster = doc
                    .raster(*raster)
                    .ok_or(CompositionError::UnknownRaster(*raster))?;
                let rgb = flatten(raster);
                let native_w = px_to_mm(rgb.width());
                let native_h = px_to_mm(rgb.height());
                Image::from_dynamic_image(&DynamicImage::ImageRgb8(rgb)).add_to_layer(
                    layer.clone(),
                    ImageTransform {
                        translate_x: Some(Mm(rect.x)),
                        // PDF's origin is bottom-left.
                        translate_y: Some(Mm(page_height - rect.y - rect.height)),
                        scale_x: Some(rect.width / native_w),
                        scale_y: Some(rect.height / native_h),
                        dpi: Some(IMAGE_DPI),
                        ..Default::default()
                    },
                );
            }
            Element::Text {
                text,
                x,
                y,
                size_pt,
            } => {
                let text = match mode {
                    FontMode::Embedded => text.clone(),
                    FontMode::Builtin => latin1(text),
                };
                layer.use_text(text, *size_pt, Mm(*x), Mm(page_height - *y), font);
            }
        }
    }
    Ok(())
}

fn px_to_mm(px: u32) -> f32 {
    px as f32 / IMAGE_DPI * MM_PER_INCH
}

/// RGB copy with any transparency composited onto white.
fn flatten(raster: &Raster) -> RgbImage {
    match raster {
        Raster::Code(code) => DynamicImage::ImageLuma8(code.image.clone()).to_rgb8(),
        Raster::Resource { path, image } => {
            tracing::debug!("embedding {}", path.display());
            let rgba = image.to_rgba8();
            RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                let [r, g, b, a] = rgba.get_pixel(x, y).0;
                let blend = |c: u8| {
                    let a = u16::from(a);
                    ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8
                };
                Rgb([blend(r), blend(g), blend(b)])
            })
        }
    }
}

/// Replace characters the built-in font cannot show.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if u32::from(c) < 0x100 { c } else { '?' })
        .collect()
}
