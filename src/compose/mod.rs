//! Document model and per-sheet rendering.

mod layout;
mod pdf;

pub use layout::LabelCaptions;
pub use pdf::{FontMode, FontResource, write_pdf};

use crate::{
    config::Config,
    encode::{self, CodeKind, EncodedImage, PixelSize},
    error::{CompositionError, PipelineError},
    jobs::{LabelSheet, Sheet},
};
use image::DynamicImage;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Physical page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Placement box in millimetres, origin at the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Pixels owned by a document.
#[derive(Debug, Clone)]
pub enum Raster {
    /// Freshly encoded code.
    Code(EncodedImage),
    /// Static image loaded from the resource directory.
    Resource { path: PathBuf, image: DynamicImage },
}

impl Raster {
    /// Load a static resource image.
    pub fn load(path: &Path) -> Result<Self, CompositionError> {
        let image = image::open(path).map_err(|source| CompositionError::Resource {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Raster::Resource {
            path: path.to_path_buf(),
            image,
        })
    }
}

/// Something drawn on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Index into the document's rasters, scaled into `rect`.
    Image { raster: usize, rect: Rect },
    /// Text whose baseline starts at (`x`, `y`).
    Text {
        text: String,
        x: f32,
        y: f32,
        size_pt: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub size: PageSize,
    pub elements: Vec<Element>,
}

/// Ordered pages plus the rasters they reference.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pages: Vec<Page>,
    rasters: Vec<Raster>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pages: Vec::new(),
            rasters: Vec::new(),
        }
    }

    /// Take ownership of a raster and return its index.
    pub fn add_raster(&mut self, raster: Raster) -> usize {
        self.rasters.push(raster);
        self.rasters.len() - 1
    }

    pub fn push_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn raster(&self, index: usize) -> Option<&Raster> {
        self.rasters.get(index)
    }
}

/// A sheet turned into files on disk.
#[derive(Debug)]
pub struct Rendered {
    pub document: Document,
    pub pdf_path: PathBuf,
    /// Images and PDF written for this sheet.
    pub artifacts: Vec<PathBuf>,
    /// The subset of `artifacts` that did not exist before this render.
    pub created: Vec<PathBuf>,
    pub font_mode: FontMode,
}

/// Paths a render writes to, remembering which ones it brought into being.
#[derive(Debug, Default)]
struct Outputs {
    written: Vec<PathBuf>,
    created: Vec<PathBuf>,
}

impl Outputs {
    /// Call before writing `path`.
    fn claim(&mut self, path: &Path) {
        if !path.exists() {
            self.created.push(path.to_path_buf());
        }
        self.written.push(path.to_path_buf());
    }
}

/// Encode, lay out and write one sheet.
///
/// When a later step fails, files this call created are removed again. Files
/// that were already there (e.g. from an earlier request for the same
/// identifiers) are left alone.
pub fn render_sheet(
    sheet: &Sheet,
    cfg: &Config,
    font: Option<&FontResource>,
) -> Result<Rendered, PipelineError> {
    fs::create_dir_all(&cfg.paths.image_dir).map_err(CompositionError::from)?;
    fs::create_dir_all(&cfg.paths.pdf_dir).map_err(CompositionError::from)?;

    let mut outputs = Outputs::default();
    match build_sheet(sheet, cfg, font, &mut outputs) {
        Ok((document, pdf_path, font_mode)) => Ok(Rendered {
            document,
            pdf_path,
            artifacts: outputs.written,
            created: outputs.created,
            font_mode,
        }),
        Err(e) => {
            discard(&outputs.created);
            Err(e)
        }
    }
}

/// Remove generated files, ignoring ones already gone.
pub fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            tracing::debug!("could not remove {}: {e}", path.display());
        }
    }
}

fn build_sheet(
    sheet: &Sheet,
    cfg: &Config,
    font: Option<&FontResource>,
    outputs: &mut Outputs,
) -> Result<(Document, PathBuf, FontMode), PipelineError> {
    let image_dir = &cfg.paths.image_dir;
    let pdf_dir = &cfg.paths.pdf_dir;

    let (document, pdf_path) = match sheet {
        Sheet::Pair { left, right } => {
            let l = device_code(left, image_dir, outputs)?;
            let r = device_code(right, image_dir, outputs)?;
            let mut doc = Document::new(format!("{left}_{right}"));
            layout::paired_page(&mut doc, l, r);
            let name = format!("{}_{}.pdf", file_stem(left), file_stem(right));
            (doc, pdf_dir.join(name))
        }
        Sheet::Single(id) => {
            let code = device_code(id, image_dir, outputs)?;
            let mut doc = Document::new(id.clone());
            layout::single_page(&mut doc, code);
            (doc, pdf_dir.join(format!("{}.pdf", file_stem(id))))
        }
        Sheet::Bulk { payload, .. } => {
            let stem = unique_stem(
                &format!("multiCode_{}", chrono::Local::now().timestamp_millis()),
                pdf_dir,
            );
            let code = encode_to_file(
                payload,
                CodeKind::QrHigh,
                PixelSize::square(encode::BULK_QR_PX),
                &image_dir.join(format!("{stem}.png")),
                outputs,
            )?;
            let mut doc = Document::new(stem.clone());
            layout::bulk_page(&mut doc, code);
            (doc, pdf_dir.join(format!("{stem}.pdf")))
        }
        Sheet::Label(label) => build_label(label, cfg, font, outputs)?,
    };

    outputs.claim(&pdf_path);
    let font_mode = write_pdf(&document, font, &pdf_path)?;
    Ok((document, pdf_path, font_mode))
}

fn build_label(
    label: &LabelSheet,
    cfg: &Config,
    font: Option<&FontResource>,
    outputs: &mut Outputs,
) -> Result<(Document, PathBuf), PipelineError> {
    let record = &label.record;
    let box_stem = file_stem(&record.box_number);
    let image_dir = &cfg.paths.image_dir;

    let type_image = Raster::load(
        &cfg.paths
            .resource_dir
            .join(format!("{}-69.png", file_stem(&record.barcode_type))),
    )?;
    let (bw, bh) = encode::BOX_BARCODE_PX;
    let barcode = encode_to_file(
        &record.box_number,
        CodeKind::Code128,
        PixelSize::new(bw, bh),
        &image_dir.join(format!("{box_stem}.png")),
        outputs,
    )?;
    let qr = encode_to_file(
        &label.qr_payload,
        CodeKind::QrMedium,
        PixelSize::square(encode::LABEL_QR_PX),
        &image_dir.join(format!("qrcode_{box_stem}.png")),
        outputs,
    )?;

    let captions = match pdf::font_mode(font) {
        FontMode::Embedded => &LabelCaptions::NATIVE,
        FontMode::Builtin => &LabelCaptions::LATIN,
    };
    let mut doc = Document::new(record.box_number.clone());
    layout::label_page(&mut doc, record, qr, barcode, type_image, captions);

    let name = match &record.file_prefix {
        Some(prefix) => format!("{}_{box_stem}.pdf", file_stem(prefix)),
        None => format!("{box_stem}.pdf"),
    };
    Ok((doc, cfg.paths.pdf_dir.join(name)))
}

/// QR-H device code written as `<dir>/<identifier>.png`.
fn device_code(
    id: &str,
    dir: &Path,
    outputs: &mut Outputs,
) -> Result<EncodedImage, PipelineError> {
    encode_to_file(
        id,
        CodeKind::QrHigh,
        PixelSize::square(encode::PAIR_QR_PX),
        &dir.join(format!("{}.png", file_stem(id))),
        outputs,
    )
}

fn encode_to_file(
    payload: &str,
    kind: CodeKind,
    size: PixelSize,
    path: &Path,
    outputs: &mut Outputs,
) -> Result<EncodedImage, PipelineError> {
    let code = encode::encode(payload, kind, size)?;
    outputs.claim(path);
    code.save_png(path)?;
    tracing::debug!(
        "wrote {:?} {}x{} to {}",
        code.kind,
        code.width(),
        code.height(),
        path.display()
    );
    Ok(code)
}

/// Make an identifier safe to use as a file name.
pub fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `base`, or `base_<n>` when a PDF with that name already exists.
fn unique_stem(base: &str, pdf_dir: &Path) -> String {
    let mut stem = base.to_string();
    let mut n = 1;
    while pdf_dir.join(format!("{stem}.pdf")).exists() {
        stem = format!("{base}_{n}");
        n += 1;
    }
    stem
}
