//! Identifier splitting, duplicate checks and sheet planning.

use crate::{
    error::ValidationError,
    jobs::{LabelRecord, LabelSheet, PrintRequest, Sheet},
};
use std::collections::HashSet;

/// Split a comma-delimited identifier list.
///
/// Entries are trimmed and empty ones dropped; order is preserved.
/// Fails when nothing is left or when an identifier repeats.
pub fn split_identifiers(raw: &str) -> Result<Vec<String>, ValidationError> {
    collect_identifiers(raw.split(','))
}

/// Split a label's device-number block on commas, pipes and newlines.
pub fn split_label_block(raw: &str) -> Result<Vec<String>, ValidationError> {
    collect_identifiers(raw.split([',', '|', '\n']))
}

fn collect_identifiers<'a>(
    parts: impl Iterator<Item = &'a str>,
) -> Result<Vec<String>, ValidationError> {
    let ids: Vec<String> = parts
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    let duplicates = find_duplicates(&ids);
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateIdentifiers { duplicates });
    }
    Ok(ids)
}

/// Repeated identifiers, each listed once, in order of first repetition.
pub fn find_duplicates(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) && reported.insert(id.as_str()) {
            duplicates.push(id.clone());
        }
    }
    duplicates
}

/// Consume identifiers two at a time; an odd remainder is printed alone, last.
pub fn pair_up(ids: Vec<String>) -> Vec<Sheet> {
    let mut sheets = Vec::with_capacity(ids.len().div_ceil(2));
    let mut it = ids.into_iter();
    while let Some(left) = it.next() {
        match it.next() {
            Some(right) => sheets.push(Sheet::Pair { left, right }),
            None => sheets.push(Sheet::Single(left)),
        }
    }
    sheets
}

/// Put the box number in front of the device-number block.
///
/// The joiner follows the block's own delimiter: pipe if present, else comma,
/// else newline.
pub fn prefix_box_number(box_number: &str, block: &str) -> String {
    if block.contains('|') {
        format!("{box_number}|{block}")
    } else if block.contains(',') {
        format!("{box_number},{block}")
    } else {
        format!("{box_number}\n{block}")
    }
}

/// QR payload for a label: pipes become newlines, everything else is kept.
pub fn label_payload(prefixed: &str) -> String {
    prefixed.replace('|', "\n")
}

/// Trim every field and reject the record on the first blank one.
pub fn validate_record(record: &LabelRecord) -> Result<LabelRecord, ValidationError> {
    let trimmed = LabelRecord {
        product_name: record.product_name.trim().to_string(),
        product_color: record.product_color.trim().to_string(),
        production_date: record.production_date.trim().to_string(),
        quantity: record.quantity.trim().to_string(),
        net_weight: record.net_weight.trim().to_string(),
        gross_weight: record.gross_weight.trim().to_string(),
        barcode_type: record.barcode_type.trim().to_string(),
        box_number: record.box_number.trim().to_string(),
        device_numbers: record.device_numbers.trim().to_string(),
        file_prefix: record.file_prefix.clone(),
    };
    let required = [
        ("product_name", &trimmed.product_name),
        ("product_color", &trimmed.product_color),
        ("production_date", &trimmed.production_date),
        ("quantity", &trimmed.quantity),
        ("gross_weight", &trimmed.gross_weight),
        ("net_weight", &trimmed.net_weight),
        ("barcode_type", &trimmed.barcode_type),
        ("box_number", &trimmed.box_number),
        ("device_numbers", &trimmed.device_numbers),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.is_empty()) {
        return Err(ValidationError::MissingField(*field));
    }
    Ok(trimmed)
}

/// Turn a request into its ordered sheets. Pure; writes nothing.
pub fn plan_request(request: &PrintRequest) -> Result<Vec<Sheet>, ValidationError> {
    match request {
        PrintRequest::Pair(raw) => Ok(pair_up(split_identifiers(raw)?)),
        PrintRequest::Bulk(raw) => {
            let ids = split_identifiers(raw)?;
            Ok(vec![Sheet::Bulk {
                count: ids.len(),
                payload: ids.join("\n"),
            }])
        }
        PrintRequest::Label(record) => {
            let record = validate_record(record)?;
            split_label_block(&record.device_numbers)?;
            let prefixed = prefix_box_number(&record.box_number, &record.device_numbers);
            Ok(vec![Sheet::Label(LabelSheet {
                qr_payload: label_payload(&prefixed),
                record,
            })])
        }
    }
}
