//! Request, label record and job models.

use crate::compose::Document;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One product label's worth of input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelRecord {
    /// Product name printed in the left column.
    pub product_name: String,
    pub product_color: String,
    /// Production date, free text (e.g. "2024-01-01").
    pub production_date: String,
    /// Piece count; printed with a "PCS" suffix.
    pub quantity: String,
    /// Kilograms; printed with a "KG" suffix.
    pub net_weight: String,
    pub gross_weight: String,
    /// Selects `<resource_dir>/<type>-69.png` as the type-indicator image.
    pub barcode_type: String,
    pub box_number: String,
    /// Raw device-number block, comma, pipe or newline delimited.
    pub device_numbers: String,
    /// Output name prefix, set by the batch producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_prefix: Option<String>,
}

/// What a caller asks the pipeline to print.
#[derive(Clone, Debug)]
pub enum PrintRequest {
    /// Comma-delimited device numbers printed two per page.
    Pair(String),
    /// Comma-delimited device numbers packed into one QR code.
    Bulk(String),
    /// A product label.
    Label(LabelRecord),
}

impl PrintRequest {
    /// Short name used in status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PrintRequest::Pair(_) => "pair",
            PrintRequest::Bulk(_) => "bulk",
            PrintRequest::Label(_) => "label",
        }
    }
}

/// A validated label ready for encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSheet {
    /// Trimmed record.
    pub record: LabelRecord,
    /// Box number followed by device numbers, newline/comma delimited.
    pub qr_payload: String,
}

/// One planned page of a request, before encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sheet {
    Pair { left: String, right: String },
    /// Odd remainder of a pair request.
    Single(String),
    /// All identifiers of a bulk request in one QR payload.
    Bulk { payload: String, count: usize },
    Label(LabelSheet),
}

impl Sheet {
    /// Identifier(s) shown in status lines.
    pub fn describe(&self) -> String {
        match self {
            Sheet::Pair { left, right } => format!("{left}, {right}"),
            Sheet::Single(id) => id.clone(),
            Sheet::Bulk { count, .. } => format!("{count} identifiers"),
            Sheet::Label(l) => format!("box {}", l.record.box_number),
        }
    }
}

/// Request progress as seen by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted by the orchestrator.
    Received,
    /// Input being checked.
    Validating,
    /// Codes being encoded and documents written.
    Rendering,
    /// Documents being handed to the print command.
    Dispatching,
    /// Finished; individual dispatches may still have failed.
    Done,
    /// Terminal failure with a reason.
    Failed(String),
}

/// A composed document on disk, waiting for dispatch.
#[derive(Debug)]
pub struct PrintJob {
    /// Request this document belongs to.
    pub request_id: Uuid,
    /// Display name for status lines.
    pub name: String,
    /// The composed pages, immutable once written.
    pub document: Document,
    /// Written PDF.
    pub pdf_path: PathBuf,
    /// Every file written for this document, PDF included.
    pub artifacts: Vec<PathBuf>,
}
