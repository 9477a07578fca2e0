//! PDF receipts for paid invoices.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

use crate::models::invoice::InvoiceView;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 7.0;
const LAYER: &str = "receipt";

// Column x-positions for line rows.
const COL_PRODUCT: f32 = MARGIN;
const COL_QUANTITY: f32 = 115.0;
const COL_UNIT_PRICE: f32 = 135.0;
const COL_LINE_TOTAL: f32 = 165.0;

/// Longest product name printed before truncation.
const MAX_NAME_CHARS: usize = 48;

/// Receipt rendering failures.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("failed to render receipt: {0}")]
    Render(String),
}

impl From<printpdf::Error> for ReceiptError {
    fn from(err: printpdf::Error) -> Self {
        Self::Render(err.to_string())
    }
}

/// Writes rows top to bottom, starting a new page when one fills up.
struct Cursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Cursor {
    fn new(title: &str) -> Result<Self, ReceiptError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(printable(text), size, Mm(x), Mm(self.y), font);
    }

    fn row(&mut self, cells: [&str; 4], bold: bool) {
        self.text(cells[0], 10.0, COL_PRODUCT, bold);
        self.text(cells[1], 10.0, COL_QUANTITY, bold);
        self.text(cells[2], 10.0, COL_UNIT_PRICE, bold);
        self.text(cells[3], 10.0, COL_LINE_TOTAL, bold);
        self.advance(ROW_HEIGHT);
    }

    fn finish(self) -> Result<Vec<u8>, ReceiptError> {
        Ok(self.doc.save_to_bytes()?)
    }
}

/// Render an A4 receipt for `invoice`.
///
/// # Errors
///
/// Returns `ReceiptError::Render` if the PDF cannot be produced.
pub fn render(invoice: &InvoiceView) -> Result<Vec<u8>, ReceiptError> {
    let mut cursor = Cursor::new(&format!("Receipt {}", invoice.id))?;

    cursor.text("Payment receipt", 18.0, MARGIN, true);
    cursor.advance(ROW_HEIGHT * 2.0);

    cursor.text(&format!("Invoice: {}", invoice.id), 10.0, MARGIN, false);
    cursor.advance(ROW_HEIGHT);
    cursor.text(
        &format!("Date: {}", invoice.updated_at.to_rfc3339()),
        10.0,
        MARGIN,
        false,
    );
    cursor.advance(ROW_HEIGHT);
    let buyer = invoice.user.as_ref().map_or_else(
        || invoice.user_id.to_string(),
        |user| format!("{} <{}>", user.name, user.email),
    );
    cursor.text(&format!("Buyer: {buyer}"), 10.0, MARGIN, false);
    cursor.advance(ROW_HEIGHT);
    cursor.text(&format!("Status: {}", invoice.status), 10.0, MARGIN, false);
    cursor.advance(ROW_HEIGHT * 2.0);

    cursor.row(["Product", "Qty", "Unit price", "Line total"], true);
    for line in &invoice.lines {
        let name = line
            .product_name
            .as_deref()
            .map_or_else(|| line.product_id.to_string(), truncate);
        cursor.row(
            [
                &name,
                &line.quantity.to_string(),
                &line.unit_price.to_string(),
                &line.line_total.to_string(),
            ],
            false,
        );
    }

    cursor.advance(ROW_HEIGHT);
    cursor.text(&format!("Total: {}", invoice.total), 12.0, COL_UNIT_PRICE, true);

    cursor.finish()
}

/// Fold text to ASCII for the builtin Helvetica fonts.
///
/// Builtin PDF fonts carry no Unicode mapping, so multi-byte characters would
/// print as mojibake. Accented Latin letters lose their accent and anything
/// else becomes `?`.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            c if c.is_ascii() => c,
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            '¡' => '!',
            _ => '?',
        })
        .collect()
}

fn truncate(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_owned();
    }
    let mut short: String = name.chars().take(MAX_NAME_CHARS - 3).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use ventas_core::invoice::{Invoice, InvoiceLine};
    use ventas_core::{Email, InvoiceStatus, Money, ProductId, UserId};

    use super::*;
    use crate::models::user::UserSummary;

    fn view(line_count: usize) -> InvoiceView {
        let user_id = UserId::new();
        let mut names = HashMap::new();
        let lines = (0..line_count)
            .map(|i| {
                let product_id = ProductId::new();
                names.insert(product_id, format!("Product {i}"));
                InvoiceLine {
                    product_id,
                    quantity: 2,
                    unit_price: Money::from_cents(1050),
                }
            })
            .collect();
        let invoice = Invoice::issue(user_id, lines, InvoiceStatus::Paid, Utc::now());
        let user = UserSummary {
            id: user_id,
            name: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
        };
        InvoiceView::new(&invoice, Some(user), &names)
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render(&view(2)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_paginates_long_invoices() {
        let short = render(&view(1)).unwrap();
        let long = render(&view(120)).unwrap();
        assert!(long.starts_with(b"%PDF"));
        assert!(long.len() > short.len());
    }

    #[test]
    fn test_printable_folds_accents() {
        assert_eq!(printable("Añejo Café"), "Anejo Cafe");
        assert_eq!(printable("¿Qué?"), "?Que?");
        assert_eq!(printable("Plain 10.50"), "Plain 10.50");
        assert_eq!(printable("茶"), "?");
    }

    #[test]
    fn test_render_accepts_non_ascii_names() {
        let mut invoice = view(1);
        for line in &mut invoice.lines {
            line.product_name = Some("Jalapeño picante".to_string());
        }
        assert!(render(&invoice).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Mug"), "Mug");
        let long = "x".repeat(60);
        assert_eq!(truncate(&long).chars().count(), MAX_NAME_CHARS);
    }
}
