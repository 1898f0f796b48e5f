//! Label batch files: a JSON array of label records printed one by one.

use crate::{error::BatchError, jobs::LabelRecord};
use std::{fs, path::Path};
use uuid::Uuid;

/// Largest batch accepted in one file.
pub const MAX_ROWS: usize = 1000;
/// Type used when a row leaves `barcodeType` blank.
pub const DEFAULT_BARCODE_TYPE: &str = "401";

/// Read a batch file; the file stem becomes every row's output prefix.
pub fn load(path: &Path) -> Result<Vec<LabelRecord>, BatchError> {
    let json = fs::read_to_string(path).map_err(|source| BatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let prefix = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    let records = parse(&json, prefix.as_deref())?;
    tracing::info!("loaded {} label(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Parse rows and fill in the defaults a spreadsheet row may leave out.
pub fn parse(json: &str, prefix: Option<&str>) -> Result<Vec<LabelRecord>, BatchError> {
    let rows: Vec<LabelRecord> = serde_json::from_str(json)?;
    if rows.is_empty() {
        return Err(BatchError::Empty);
    }
    if rows.len() > MAX_ROWS {
        return Err(BatchError::TooManyRows(rows.len()));
    }
    Ok(rows
        .into_iter()
        .map(|row| with_defaults(row, prefix))
        .collect())
}

fn with_defaults(mut row: LabelRecord, prefix: Option<&str>) -> LabelRecord {
    if row.barcode_type.trim().is_empty() {
        row.barcode_type = DEFAULT_BARCODE_TYPE.into();
    }
    if row.box_number.trim().is_empty() {
        row.box_number = generate_box_number();
    }
    if row.file_prefix.is_none() {
        row.file_prefix = prefix.map(str::to_string);
    }
    row
}

/// `C` + local `MMDDhhmmss` + 7 random digits.
pub fn generate_box_number() -> String {
    let random = Uuid::new_v4().as_u128() % 10_000_000;
    format!("C{}{random:07}", chrono::Local::now().format("%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = r#"{
        "productName": "Sensor",
        "productColor": "White",
        "productionDate": "2024-01-01",
        "quantity": "10",
        "netWeight": "1.2",
        "grossWeight": "1.5",
        "deviceNumbers": "A,B"
    }"#;

    #[test]
    fn test_defaults_filled_in() {
        let rows = parse(&format!("[{ROW}]"), Some("march")).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.product_name, "Sensor");
        assert_eq!(row.barcode_type, "401");
        assert!(row.box_number.starts_with('C'));
        assert_eq!(row.file_prefix.as_deref(), Some("march"));
    }

    #[test]
    fn test_explicit_values_kept() {
        let json = r#"[{"boxNumber": "B-1", "barcodeType": "402", "filePrefix": "own"}]"#;
        let row = &parse(json, Some("file")).unwrap()[0];
        assert_eq!(row.box_number, "B-1");
        assert_eq!(row.barcode_type, "402");
        assert_eq!(row.file_prefix.as_deref(), Some("own"));
    }

    #[test]
    fn test_generated_box_number_shape() {
        let n = generate_box_number();
        assert_eq!(n.len(), 18);
        assert!(n[1..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(parse("[]", None), Err(BatchError::Empty)));
    }

    #[test]
    fn test_row_limit() {
        let rows = vec![ROW; MAX_ROWS + 1].join(",");
        let err = parse(&format!("[{rows}]"), None).unwrap_err();
        assert!(matches!(err, BatchError::TooManyRows(1001)));

        let rows = vec![ROW; MAX_ROWS].join(",");
        assert_eq!(parse(&format!("[{rows}]"), None).unwrap().len(), MAX_ROWS);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse("{not json", None), Err(BatchError::Parse(_))));
    }

    #[test]
    fn test_load_uses_file_stem_as_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("order-42.json");
        fs::write(&path, format!("[{ROW},{ROW}]")).unwrap();
        let rows = load(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(
            rows.iter()
                .all(|r| r.file_prefix.as_deref() == Some("order-42"))
        );
        assert!(matches!(
            load(&tmp.path().join("missing.json")),
            Err(BatchError::Read { .. })
        ));
    }
}
