//! Error taxonomy for the print pipeline.

use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Input rejected before any file is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing left after trimming.
    #[error("input is empty")]
    EmptyInput,

    /// The same identifier appears more than once in one request.
    #[error("duplicate identifiers: {}", duplicates.join(","))]
    DuplicateIdentifiers { duplicates: Vec<String> },

    /// A label record field is blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Payload does not fit the barcode symbology's rules.
    #[error("invalid barcode payload {}: {reason}", preview(payload))]
    InvalidBarcodePayload { payload: String, reason: String },
}

/// A symbology rejected the payload, or the raster could not be produced.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("QR encoding failed for {}: {reason}", preview(payload))]
    Qr { payload: String, reason: String },

    #[error("barcode encoding failed for {}: {reason}", preview(payload))]
    Barcode { payload: String, reason: String },

    /// The symbol needs more pixels than the requested canvas offers.
    #[error("{modules} modules do not fit a {size}px canvas")]
    CanvasTooSmall { modules: u32, size: u32 },

    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// The document could not be built or written.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] printpdf::Error),

    /// A static image the layout depends on is missing or unreadable.
    #[error("failed to load resource {path}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("document has no pages")]
    EmptyDocument,

    #[error("element references unknown image #{0}")]
    UnknownRaster(usize),

    /// The render task died before producing a document.
    #[error("render task aborted: {0}")]
    Aborted(String),
}

/// The external print command failed. Recorded, never fatal.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("print command exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("print command still running after {0:?}; killed")]
    TimedOut(Duration),
}

/// Terminal error of a request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("encoding failed: {0}")]
    Encoding(EncodingError),

    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("cancelled before rendering")]
    Cancelled,

    #[error("dispatch queue closed")]
    QueueClosed,
}

impl From<EncodingError> for PipelineError {
    fn from(e: EncodingError) -> Self {
        match e {
            EncodingError::Invalid(v) => Self::Validation(v),
            other => Self::Encoding(other),
        }
    }
}

/// A label batch file could not be turned into records.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid batch file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("batch file has no rows")]
    Empty,

    #[error("batch file has {0} rows; at most {max} are allowed", max = crate::batch::MAX_ROWS)]
    TooManyRows(usize),
}

const PREVIEW_CHARS: usize = 32;

/// Quoted payload, cut short so status lines stay on one screen line.
fn preview(payload: &str) -> String {
    let total = payload.chars().count();
    if total <= PREVIEW_CHARS {
        return format!("{payload:?}");
    }
    let head: String = payload.chars().take(PREVIEW_CHARS).collect();
    format!("{head:?}... ({total} chars)")
}
