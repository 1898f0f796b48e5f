//! Fixed page layouts. All coordinates are millimetres from the top-left corner.

use super::{Document, Element, Page, PageSize, Raster, Rect};
use crate::{encode::EncodedImage, jobs::LabelRecord};

/// 400×800 landscape, i.e. 800 wide and 400 tall.
pub const PAIR_PAGE: PageSize = PageSize {
    width_mm: 800.0,
    height_mm: 400.0,
};
pub const BULK_PAGE: PageSize = PageSize {
    width_mm: 840.0,
    height_mm: 840.0,
};
pub const LABEL_PAGE: PageSize = PageSize {
    width_mm: 1000.0,
    height_mm: 600.0,
};

const PAIR_LEFT: Rect = Rect::new(20.0, 0.0, 320.0, 320.0);
const PAIR_RIGHT: Rect = Rect::new(460.0, 0.0, 320.0, 320.0);
const PAIR_LEFT_CAPTION: (f32, f32) = (45.0, 370.0);
const PAIR_RIGHT_CAPTION: (f32, f32) = (485.0, 370.0);
const PAIR_FONT_PT: f32 = 112.0;

const BULK_CODE: Rect = Rect::new(120.0, 120.0, 600.0, 600.0);

const LABEL_QR: Rect = Rect::new(640.0, 240.0, 340.0, 340.0);
const LABEL_TYPE_IMAGE: Rect = Rect::new(20.0, 230.0, 580.0, 165.0);
const LABEL_BOX_BARCODE: Rect = Rect::new(20.0, 410.0, 560.0, 110.0);
const LABEL_LEFT_X: f32 = 40.0;
const LABEL_RIGHT_X: f32 = 570.0;
const LABEL_ROWS_Y: [f32; 3] = [60.0, 120.0, 180.0];
const LABEL_SN: (f32, f32) = (640.0, 230.0);
const LABEL_BOX_CAPTION: (f32, f32) = (90.0, 560.0);
const LABEL_FONT_PT: f32 = 100.0;

/// Field captions printed in front of label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelCaptions {
    pub product_name: &'static str,
    pub product_color: &'static str,
    pub production_date: &'static str,
    pub quantity: &'static str,
    pub net_weight: &'static str,
    pub gross_weight: &'static str,
    pub serial: &'static str,
    pub box_number: &'static str,
}

impl LabelCaptions {
    /// Used when a CJK-capable font is available.
    pub const NATIVE: Self = Self {
        product_name: "产品名称: ",
        product_color: "产品颜色: ",
        production_date: "产品日期: ",
        quantity: "产品数量: ",
        net_weight: "净    重: ",
        gross_weight: "毛    重: ",
        serial: "SN:",
        box_number: "箱号:",
    };

    /// Used with the built-in PDF font.
    pub const LATIN: Self = Self {
        product_name: "Product: ",
        product_color: "Color: ",
        production_date: "Date: ",
        quantity: "Quantity: ",
        net_weight: "Net weight: ",
        gross_weight: "Gross weight: ",
        serial: "SN:",
        box_number: "Box: ",
    };
}

fn text(text: impl Into<String>, (x, y): (f32, f32), size_pt: f32) -> Element {
    Element::Text {
        text: text.into(),
        x,
        y,
        size_pt,
    }
}

fn image(raster: usize, rect: Rect) -> Element {
    Element::Image { raster, rect }
}

/// Two device codes side by side, each captioned with its identifier.
pub fn paired_page(doc: &mut Document, left: EncodedImage, right: EncodedImage) {
    let left_text = left.payload.clone();
    let right_text = right.payload.clone();
    let l = doc.add_raster(Raster::Code(left));
    let r = doc.add_raster(Raster::Code(right));
    doc.push_page(Page {
        size: PAIR_PAGE,
        elements: vec![
            image(l, PAIR_LEFT),
            text(left_text, PAIR_LEFT_CAPTION, PAIR_FONT_PT),
            image(r, PAIR_RIGHT),
            text(right_text, PAIR_RIGHT_CAPTION, PAIR_FONT_PT),
        ],
    });
}

/// The paired layout with the same code in both slots.
pub fn single_page(doc: &mut Document, code: EncodedImage) {
    let caption = code.payload.clone();
    let idx = doc.add_raster(Raster::Code(code));
    doc.push_page(Page {
        size: PAIR_PAGE,
        elements: vec![
            image(idx, PAIR_LEFT),
            text(caption.clone(), PAIR_LEFT_CAPTION, PAIR_FONT_PT),
            image(idx, PAIR_RIGHT),
            text(caption, PAIR_RIGHT_CAPTION, PAIR_FONT_PT),
        ],
    });
}

/// One large code, no caption.
pub fn bulk_page(doc: &mut Document, code: EncodedImage) {
    let idx = doc.add_raster(Raster::Code(code));
    doc.push_page(Page {
        size: BULK_PAGE,
        elements: vec![image(idx, BULK_CODE)],
    });
}

/// Product label: device QR, type indicator, box barcode and the record fields.
pub fn label_page(
    doc: &mut Document,
    record: &LabelRecord,
    qr: EncodedImage,
    box_barcode: EncodedImage,
    type_image: Raster,
    captions: &LabelCaptions,
) {
    let qr = doc.add_raster(Raster::Code(qr));
    let type_image = doc.add_raster(type_image);
    let barcode = doc.add_raster(Raster::Code(box_barcode));
    let [row1, row2, row3] = LABEL_ROWS_Y;

    doc.push_page(Page {
        size: LABEL_PAGE,
        elements: vec![
            image(qr, LABEL_QR),
            image(type_image, LABEL_TYPE_IMAGE),
            image(barcode, LABEL_BOX_BARCODE),
            text(
                format!("{}{}", captions.product_name, record.product_name),
                (LABEL_LEFT_X, row1),
                LABEL_FONT_PT,
            ),
            text(
                format!("{}{}", captions.product_color, record.product_color),
                (LABEL_LEFT_X, row2),
                LABEL_FONT_PT,
            ),
            text(
                format!("{}{}", captions.production_date, record.production_date),
                (LABEL_LEFT_X, row3),
                LABEL_FONT_PT,
            ),
            text(
                format!("{}{}PCS", captions.quantity, record.quantity),
                (LABEL_RIGHT_X, row1),
                LABEL_FONT_PT,
            ),
            text(
                format!("{}{}KG", captions.net_weight, record.net_weight),
                (LABEL_RIGHT_X, row2),
                LABEL_FONT_PT,
            ),
            text(
                format!("{}{}KG", captions.gross_weight, record.gross_weight),
                (LABEL_RIGHT_X, row3),
                LABEL_FONT_PT,
            ),
            text(captions.serial, LABEL_SN, LABEL_FONT_PT),
            text(
                format!("{}{}", captions.box_number, record.box_number),
                LABEL_BOX_CAPTION,
                LABEL_FONT_PT,
            ),
        ],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode::{CodeKind, PixelSize, encode},
        normalize::tests::sample_record,
    };
    use image::DynamicImage;
    use std::path::PathBuf;

    fn qr(payload: &str) -> EncodedImage {
        encode(payload, CodeKind::QrHigh, PixelSize::square(64)).unwrap()
    }

    fn payload(raster: &Raster) -> Option<&str> {
        match raster {
            Raster::Code(code) => Some(&code.payload),
            Raster::Resource { .. } => None,
        }
    }

    fn texts(page: &Page) -> Vec<(&str, f32, f32)> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, x, y, .. } => Some((text.as_str(), *x, *y)),
                _ => None,
            })
            .collect()
    }

    fn images(page: &Page) -> Vec<(usize, Rect)> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Image { raster, rect } => Some((*raster, *rect)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_paired_page_positions() {
        let mut doc = Document::new("111_222");
        paired_page(&mut doc, qr("111"), qr("222"));
        let page = &doc.pages()[0];
        assert_eq!(page.size, PAIR_PAGE);
        assert_eq!(
            texts(page),
            vec![("111", 45.0, 370.0), ("222", 485.0, 370.0)]
        );
        let imgs = images(page);
        assert_eq!(imgs[0].1, Rect::new(20.0, 0.0, 320.0, 320.0));
        assert_eq!(imgs[1].1, Rect::new(460.0, 0.0, 320.0, 320.0));
        assert_eq!(doc.raster(imgs[0].0).and_then(payload), Some("111"));
        assert_eq!(doc.raster(imgs[1].0).and_then(payload), Some("222"));
    }

    #[test]
    fn test_single_page_mirrors_code() {
        let mut doc = Document::new("333");
        single_page(&mut doc, qr("333"));
        let page = &doc.pages()[0];
        let imgs = images(page);
        assert_eq!(imgs.len(), 2);
        assert_eq!(imgs[0].0, imgs[1].0);
        assert_eq!(
            texts(page),
            vec![("333", 45.0, 370.0), ("333", 485.0, 370.0)]
        );
    }

    #[test]
    fn test_bulk_page_centres_code() {
        let mut doc = Document::new("bulk");
        bulk_page(&mut doc, qr("a\nb"));
        let page = &doc.pages()[0];
        assert_eq!(page.size, BULK_PAGE);
        assert_eq!(images(page), vec![(0, Rect::new(120.0, 120.0, 600.0, 600.0))]);
        assert!(texts(page).is_empty());
    }

    #[test]
    fn test_label_page_placements() {
        let record = sample_record();
        let mut doc = Document::new("X");
        let type_image = Raster::Resource {
            path: PathBuf::from("401-69.png"),
            image: DynamicImage::new_rgb8(4, 4),
        };
        label_page(
            &mut doc,
            &record,
            qr("X,A,B"),
            qr("X"),
            type_image,
            &LabelCaptions::LATIN,
        );
        let page = &doc.pages()[0];
        assert_eq!(page.size, LABEL_PAGE);

        let rects: Vec<Rect> = images(page).into_iter().map(|(_, r)| r).collect();
        assert_eq!(
            rects,
            vec![
                Rect::new(640.0, 240.0, 340.0, 340.0),
                Rect::new(20.0, 230.0, 580.0, 165.0),
                Rect::new(20.0, 410.0, 560.0, 110.0),
            ]
        );
        assert_eq!(
            texts(page),
            vec![
                ("Product: Tracker", 40.0, 60.0),
                ("Color: Black", 40.0, 120.0),
                ("Date: 2024-01-01", 40.0, 180.0),
                ("Quantity: 2PCS", 570.0, 60.0),
                ("Net weight: 1.2KG", 570.0, 120.0),
                ("Gross weight: 1.5KG", 570.0, 180.0),
                ("SN:", 640.0, 230.0),
                ("Box: X", 90.0, 560.0),
            ]
        );
    }
}
