//! QR and 1-D barcode rasterization.

use crate::error::{EncodingError, ValidationError};
use barcoders::sym::{code128::Code128, ean13::EAN13};
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use std::path::Path;

/// QR side for paired and single device pages.
pub const PAIR_QR_PX: u32 = 320;
/// QR side for bulk sheets.
pub const BULK_QR_PX: u32 = 600;
/// QR side for product labels.
pub const LABEL_QR_PX: u32 = 1000;
/// Box-number barcode canvas.
pub const BOX_BARCODE_PX: (u32, u32) = (200, 50);
/// EAN-13 canvas.
pub const EAN13_PX: (u32, u32) = (300, 100);

const QUIET_ZONE_MODULES: u32 = 4;
const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Code128 start-in-set-B marker understood by `barcoders`.
const CODE128_SET_B: char = 'Ɓ';

/// Symbology and the options baked into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// QR, error correction H, with quiet zone.
    QrHigh,
    /// QR, error correction M, border suppressed.
    QrMedium,
    Code128,
    Ean13,
}

/// Requested canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn square(side: u32) -> Self {
        Self { width: side, height: side }
    }

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A rasterized code together with what it encodes.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub kind: CodeKind,
    /// Exact payload, byte for byte.
    pub payload: String,
    pub image: GrayImage,
}

impl EncodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Write the raster as PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), EncodingError> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| EncodingError::Image {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Encode `payload` as `kind` on a canvas of `size`. Deterministic.
pub fn encode(payload: &str, kind: CodeKind, size: PixelSize) -> Result<EncodedImage, EncodingError> {
    let image = match kind {
        CodeKind::QrHigh => qr(payload, EcLevel::H, size.width, true)?,
        CodeKind::QrMedium => qr(payload, EcLevel::M, size.width, false)?,
        CodeKind::Code128 => {
            let bars = Code128::new(format!("{CODE128_SET_B}{payload}"))
                .map_err(|e| EncodingError::Barcode {
                    payload: payload.to_string(),
                    reason: e.to_string(),
                })?
                .encode();
            bars_to_image(&bars, size)
        }
        CodeKind::Ean13 => {
            validate_ean13(payload)?;
            // barcoders computes the check digit itself; ours was verified above.
            let bars = EAN13::new(&payload[..12])
                .map_err(|e| EncodingError::Barcode {
                    payload: payload.to_string(),
                    reason: e.to_string(),
                })?
                .encode();
            bars_to_image(&bars, size)
        }
    };
    Ok(EncodedImage {
        kind,
        payload: payload.to_string(),
        image,
    })
}

/// Check a "69" product code: 13 digits, `69` prefix, valid check digit.
pub fn validate_ean13(payload: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidBarcodePayload {
        payload: payload.to_string(),
        reason: reason.to_string(),
    };
    if payload.len() != 13 {
        return Err(invalid("must be exactly 13 digits"));
    }
    if !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("must contain digits only"));
    }
    if !payload.starts_with("69") {
        return Err(invalid("must start with 69"));
    }
    let digits: Vec<u32> = payload.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    if (10 - sum % 10) % 10 != digits[12] {
        return Err(invalid("check digit mismatch"));
    }
    Ok(())
}

fn qr(payload: &str, level: EcLevel, side: u32, quiet_zone: bool) -> Result<GrayImage, EncodingError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), level).map_err(|e| {
        EncodingError::Qr {
            payload: payload.to_string(),
            reason: e.to_string(),
        }
    })?;
    let width = code.width() as u32;
    let quiet = if quiet_zone { QUIET_ZONE_MODULES } else { 0 };
    let modules = width + 2 * quiet;
    if modules > side {
        return Err(EncodingError::CanvasTooSmall { modules, size: side });
    }
    let scale = side / modules;
    let offset = (side - modules * scale) / 2;
    let colors = code.to_colors();

    Ok(GrayImage::from_fn(side, side, |x, y| {
        if x < offset || y < offset {
            return LIGHT;
        }
        let (mx, my) = ((x - offset) / scale, (y - offset) / scale);
        if mx < quiet || my < quiet || mx >= quiet + width || my >= quiet + width {
            return LIGHT;
        }
        let idx = ((my - quiet) * width + (mx - quiet)) as usize;
        match colors[idx] {
            Color::Dark => DARK,
            Color::Light => LIGHT,
        }
    }))
}

/// Stretch 1-D bars to the canvas height and scale them by an integer factor.
///
/// A symbol wider than the canvas gets one pixel per module instead.
fn bars_to_image(bars: &[u8], size: PixelSize) -> GrayImage {
    let modules = bars.len() as u32;
    let scale = (size.width / modules.max(1)).max(1);
    let width = size.width.max(modules * scale);
    let offset = (width - modules * scale) / 2;
    GrayImage::from_fn(width, size.height, |x, _| {
        if x < offset {
            return LIGHT;
        }
        match bars.get(((x - offset) / scale) as usize) {
            Some(&1) => DARK,
            _ => LIGHT,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_qr(img: &GrayImage) -> Vec<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            img.width() as usize,
            img.height() as usize,
            |x, y| img.get_pixel(x as u32, y as u32)[0],
        );
        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|g| g.decode().ok().map(|(_, content)| content))
            .collect()
    }

    /// Sample the centre row and collapse runs back into modules.
    fn sample_bars(img: &GrayImage, modules: usize) -> Vec<u8> {
        let y = img.height() / 2;
        let row: Vec<u8> = (0..img.width())
            .map(|x| if img.get_pixel(x, y)[0] == 0 { 1 } else { 0 })
            .collect();
        let first = row.iter().position(|b| *b == 1).unwrap();
        let last = row.iter().rposition(|b| *b == 1).unwrap();
        let span = last - first + 1;
        let scale = span / modules;
        (0..modules).map(|m| row[first + m * scale]).collect()
    }

    #[test]
    fn test_qr_round_trip_device_number() {
        let enc = encode("SN2024000123", CodeKind::QrHigh, PixelSize::square(PAIR_QR_PX)).unwrap();
        assert_eq!((enc.width(), enc.height()), (320, 320));
        assert_eq!(decode_qr(&enc.image), vec!["SN2024000123".to_string()]);
    }

    #[test]
    fn test_qr_round_trip_bulk_payload() {
        let payload = (0..20).map(|i| format!("DEV{i:05}")).collect::<Vec<_>>().join("\n");
        let enc = encode(&payload, CodeKind::QrHigh, PixelSize::square(BULK_QR_PX)).unwrap();
        assert_eq!(decode_qr(&enc.image), vec![payload]);
    }

    #[test]
    fn test_qr_is_deterministic() {
        let a = encode("111", CodeKind::QrHigh, PixelSize::square(PAIR_QR_PX)).unwrap();
        let b = encode("111", CodeKind::QrHigh, PixelSize::square(PAIR_QR_PX)).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn test_label_qr_has_no_quiet_zone_modules() {
        let enc = encode("X\nA\nB", CodeKind::QrMedium, PixelSize::square(LABEL_QR_PX)).unwrap();
        assert_eq!((enc.width(), enc.height()), (1000, 1000));
        let code = QrCode::with_error_correction_level(b"X\nA\nB", EcLevel::M).unwrap();
        let scale = 1000 / code.width() as u32;
        let offset = (1000 - code.width() as u32 * scale) / 2;
        // Finder pattern corner sits right at the scaled origin.
        assert_eq!(enc.image.get_pixel(offset, offset)[0], 0);
    }

    #[test]
    fn test_qr_too_large_for_canvas() {
        let payload = "x".repeat(600);
        let err = encode(&payload, CodeKind::QrHigh, PixelSize::square(40)).unwrap_err();
        assert!(matches!(err, EncodingError::CanvasTooSmall { size: 40, .. }));
    }

    #[test]
    fn test_code128_bars_match_symbol() {
        let (w, h) = BOX_BARCODE_PX;
        let enc = encode("B0001", CodeKind::Code128, PixelSize::new(w, h)).unwrap();
        assert_eq!((enc.width(), enc.height()), (200, 50));
        let expected = Code128::new(format!("{CODE128_SET_B}B0001")).unwrap().encode();
        // Symbols end on a bar, so the sampled span covers every module.
        assert_eq!(sample_bars(&enc.image, expected.len()), expected);
    }

    #[test]
    fn test_code128_long_payload_widens_canvas() {
        let enc = encode("C01021504051234567", CodeKind::Code128, PixelSize::new(200, 50)).unwrap();
        assert!(enc.width() > 200);
        assert_eq!(enc.height(), 50);
    }

    #[test]
    fn test_code128_rejects_unencodable() {
        let err = encode("箱号", CodeKind::Code128, PixelSize::new(200, 50)).unwrap_err();
        assert!(matches!(err, EncodingError::Barcode { .. }));
    }

    #[test]
    fn test_ean13_valid() {
        let (w, h) = EAN13_PX;
        let enc = encode("6901234567892", CodeKind::Ean13, PixelSize::new(w, h)).unwrap();
        assert_eq!(enc.height(), 100);
        assert_eq!(enc.kind, CodeKind::Ean13);
    }

    #[test]
    fn test_ean13_validation() {
        for bad in ["690123456789", "7901234567892", "69012345678a2", "6901234567890"] {
            let err = encode(bad, CodeKind::Ean13, PixelSize::new(300, 100)).unwrap_err();
            assert!(
                matches!(err, EncodingError::Invalid(ValidationError::InvalidBarcodePayload { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
