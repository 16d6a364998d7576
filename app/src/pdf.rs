//! A4 invoice rendering with printpdf's built-in Helvetica faces.

use base64::Engine as _;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rect, Rgb,
};

use crate::calculations::{format_currency, format_percentage, round2};
use crate::dates;
use crate::models::{Client, Company, Invoice};

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Missing required data: invoice, client, or company")]
    MissingData,
    #[error("Invoice must have at least one item")]
    NoItems,
    #[error("Client must have name and email")]
    ClientIncomplete,
    #[error("Company must have a name")]
    CompanyNameMissing,
    #[error("Failed to generate PDF: {0}")]
    Render(String),
}

impl PdfError {
    /// Request problems, as opposed to renderer failures.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, PdfError::Render(_))
    }
}

/// Checks the inputs in the order the endpoint reports them.
pub fn validate_request<'a>(
    invoice: Option<&'a Invoice>,
    client: Option<&'a Client>,
    company: Option<&'a Company>,
) -> Result<(&'a Invoice, &'a Client, &'a Company), PdfError> {
    let (Some(invoice), Some(client), Some(company)) = (invoice, client, company) else {
        return Err(PdfError::MissingData);
    };
    if invoice.items.is_empty() {
        return Err(PdfError::NoItems);
    }
    if client.name.trim().is_empty() || client.email.trim().is_empty() {
        return Err(PdfError::ClientIncomplete);
    }
    if company.name.trim().is_empty() {
        return Err(PdfError::CompanyNameMissing);
    }
    Ok((invoice, client, company))
}

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 15.0;
const MARGIN_TOP: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 22.0;
const RIGHT_X: f32 = PAGE_W - MARGIN_X;

const COL_DESC_X: f32 = MARGIN_X + 2.0;
const COL_QTY_RIGHT: f32 = 128.0;
const COL_RATE_RIGHT: f32 = 158.0;
const COL_AMOUNT_RIGHT: f32 = RIGHT_X - 2.0;
const TOTALS_LABEL_X: f32 = 125.0;

const LOGO_BOX_MM: f32 = 22.0;
const LOGO_DPI: f32 = 300.0;

/// Built-in fonts expose no metrics; Helvetica averages a little over half
/// an em per glyph.
fn text_width_mm(text: &str, font_size_pt: f32) -> f32 {
    text.chars().count() as f32 * font_size_pt * 0.19
}

fn wrap_text_lines(input: &str, max_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw_line in input.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.len() + 1 + word.len() <= max_chars {
                current.push(' ');
                current.push_str(word);
            } else {
                out.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

fn decode_logo(data_url: &str) -> Option<printpdf::image_crate::DynamicImage> {
    let s = data_url.trim();
    if !s.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    let comma = s.find(',')?;
    let (meta, data) = s.split_at(comma);
    if !meta.to_ascii_lowercase().contains(";base64") {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data[1..].trim())
        .ok()?;
    printpdf::image_crate::load_from_memory(&bytes).ok()
}

struct Pen {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Pen {
    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn text_right(&self, text: &str, size: f32, x_right: f32, bold: bool) {
        let x = (x_right - text_width_mm(text, size)).max(MARGIN_X);
        self.text(text, size, x, bold);
    }

    fn rule(&self, x1: f32, x2: f32, thickness: f32) {
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.y)), false),
                (Point::new(Mm(x2), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn fill_band(&self, height: f32, gray: f32) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(gray, gray, gray, None)));
        let rect = Rect::new(Mm(MARGIN_X), Mm(self.y - height), Mm(RIGHT_X), Mm(self.y))
            .with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_H - MARGIN_TOP;
    }
}

pub fn render_invoice_pdf(
    invoice: &Invoice,
    client: &Client,
    company: &Company,
) -> Result<Vec<u8>, PdfError> {
    validate_request(Some(invoice), Some(client), Some(company))?;

    let mut invoice = invoice.clone();
    invoice.recalculate();

    let title = format!("Invoice {}", invoice.display_number());
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PdfError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PdfError::Render(e.to_string()))?;

    let mut pen = Pen {
        doc,
        layer,
        regular,
        bold,
        y: PAGE_H - MARGIN_TOP,
    };

    draw_header(&mut pen, &invoice, company);
    draw_bill_to(&mut pen, client);
    draw_items(&mut pen, &invoice);
    draw_totals(&mut pen, &invoice, client);
    draw_notes(&mut pen, &invoice);

    pen.y = 12.0;
    pen.text("Thank you for your business!", 8.0, MARGIN_X, false);

    let Pen { doc, .. } = pen;
    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| PdfError::Render(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| PdfError::Render(e.to_string()))
}

fn company_lines(company: &Company) -> Vec<String> {
    let mut lines = Vec::new();
    if !company.address.trim().is_empty() {
        lines.push(company.address.trim().to_string());
    }

    let mut locality = [company.city.trim(), company.state.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if let Some(zip) = company.zip_code.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !locality.is_empty() {
            locality.push(' ');
        }
        locality.push_str(zip);
    }
    if !locality.is_empty() {
        lines.push(locality);
    }
    if !company.country.trim().is_empty() {
        lines.push(company.country.trim().to_string());
    }

    let labelled = [
        ("Phone", company.phone.as_deref()),
        ("Email", Some(company.email.as_str())),
        ("Website", company.website.as_deref()),
        ("Tax ID", company.tax_id.as_deref()),
    ];
    for (label, value) in labelled {
        if let Some(v) = value.map(str::trim).filter(|s| !s.is_empty()) {
            lines.push(format!("{label}: {v}"));
        }
    }
    lines
}

fn draw_header(pen: &mut Pen, invoice: &Invoice, company: &Company) {
    let top = pen.y;

    let mut text_x = MARGIN_X;
    let mut logo_bottom = top;
    if let Some(img) = company.logo.as_deref().and_then(decode_logo) {
        let natural_w = img.width().max(1) as f32 / LOGO_DPI * 25.4;
        let natural_h = img.height().max(1) as f32 / LOGO_DPI * 25.4;
        let scale = (LOGO_BOX_MM / natural_w).min(LOGO_BOX_MM / natural_h).max(0.01);
        let h = natural_h * scale;
        Image::from_dynamic_image(&img).add_to_layer(
            pen.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_X)),
                translate_y: Some(Mm(top - h)),
                rotate: None,
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(LOGO_DPI),
            },
        );
        text_x = MARGIN_X + LOGO_BOX_MM + 5.0;
        logo_bottom = top - h;
    }

    // Company block (left).
    pen.y = top - 5.0;
    pen.text(company.name.trim(), 16.0, text_x, true);
    pen.y -= 6.0;
    for line in company_lines(company) {
        pen.text(&line, 9.0, text_x, false);
        pen.y -= 4.4;
    }
    let left_bottom = pen.y.min(logo_bottom);

    // Invoice block (right).
    pen.y = top - 7.0;
    pen.text_right("INVOICE", 22.0, RIGHT_X, true);
    pen.y -= 8.0;
    let meta = [
        format!("Invoice #: {}", invoice.display_number()),
        format!("Date: {}", dates::format_display(invoice.issue_date)),
        format!("Due Date: {}", dates::format_display(invoice.due_date)),
        format!("Status: {}", invoice.status.label()),
    ];
    for line in meta {
        pen.text_right(&line, 10.0, RIGHT_X, false);
        pen.y -= 5.0;
    }

    pen.y = pen.y.min(left_bottom) - 6.0;
    pen.rule(MARGIN_X, RIGHT_X, 0.5);
    pen.y -= 8.0;
}

fn draw_bill_to(pen: &mut Pen, client: &Client) {
    pen.text("Bill To:", 12.0, MARGIN_X, true);
    pen.y -= 6.0;
    pen.text(client.name.trim(), 10.0, MARGIN_X, true);
    pen.y -= 4.6;

    let mut locality = [client.city.trim(), client.state.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if let Some(zip) = client.zip_code.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        locality = format!("{locality} {zip}").trim().to_string();
    }

    let lines = [
        Some(client.email.trim()),
        Some(client.address.trim()),
        Some(locality.as_str()),
        Some(client.country.trim()),
        client.phone.as_deref().map(str::trim),
    ];
    for line in lines.into_iter().flatten().filter(|s| !s.is_empty()) {
        pen.text(line, 9.5, MARGIN_X, false);
        pen.y -= 4.4;
    }
    pen.y -= 6.0;
}

fn draw_table_header(pen: &mut Pen) {
    pen.fill_band(8.0, 0.94);
    pen.y -= 5.4;
    pen.text("Description", 10.0, COL_DESC_X, true);
    pen.text_right("Qty", 10.0, COL_QTY_RIGHT, true);
    pen.text_right("Rate", 10.0, COL_RATE_RIGHT, true);
    pen.text_right("Amount", 10.0, COL_AMOUNT_RIGHT, true);
    pen.y -= 8.0;
}

fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{q:.0}")
    } else {
        format!("{}", round2(q))
    }
}

fn draw_items(pen: &mut Pen, invoice: &Invoice) {
    draw_table_header(pen);

    for item in &invoice.items {
        let mut lines = wrap_text_lines(&item.description, 58);
        if lines.is_empty() {
            lines.push(item.product_name.clone());
        }
        let row_h = lines.len() as f32 * 4.4 + 3.0;
        if pen.y - row_h < MARGIN_BOTTOM {
            pen.new_page();
            draw_table_header(pen);
        }

        pen.text(&lines[0], 9.5, COL_DESC_X, false);
        pen.text_right(&format_quantity(item.quantity), 9.5, COL_QTY_RIGHT, false);
        pen.text_right(&format_currency(item.unit_price), 9.5, COL_RATE_RIGHT, false);
        pen.text_right(&format_currency(item.total), 9.5, COL_AMOUNT_RIGHT, false);
        for extra in lines.iter().skip(1) {
            pen.y -= 4.4;
            pen.text(extra, 9.5, COL_DESC_X, false);
        }
        pen.y -= 3.0;
        pen.rule(MARGIN_X, RIGHT_X, 0.2);
        pen.y -= 5.0;
    }
    pen.y -= 2.0;
}

fn draw_totals(pen: &mut Pen, invoice: &Invoice, client: &Client) {
    let advance = client
        .advance_payment
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0);

    let mut rows: Vec<(String, String)> = vec![("Subtotal:".to_string(), format_currency(invoice.subtotal))];
    if invoice.tax_rate > 0.0 {
        rows.push((
            format!("Tax ({}):", format_percentage(invoice.tax_rate)),
            format_currency(invoice.tax_amount),
        ));
    }
    if invoice.discount_rate > 0.0 {
        rows.push((
            format!("Discount ({}):", format_percentage(invoice.discount_rate)),
            format!("-{}", format_currency(invoice.discount_amount)),
        ));
    }
    if advance > 0.0 {
        rows.push((
            "Advance Payment:".to_string(),
            format!("-{}", format_currency(advance)),
        ));
    }

    pen.ensure_room(rows.len() as f32 * 6.0 + 14.0);
    for (label, value) in rows {
        pen.text(&label, 10.0, TOTALS_LABEL_X, false);
        pen.text_right(&value, 10.0, COL_AMOUNT_RIGHT, false);
        pen.y -= 6.0;
    }

    pen.y += 2.0;
    pen.rule(TOTALS_LABEL_X, RIGHT_X, 0.6);
    pen.y -= 6.0;
    let due = round2((invoice.total - advance).max(0.0));
    pen.text("Total:", 12.0, TOTALS_LABEL_X, true);
    pen.text_right(&format_currency(due), 12.0, COL_AMOUNT_RIGHT, true);
    pen.y -= 12.0;
}

fn draw_notes(pen: &mut Pen, invoice: &Invoice) {
    let Some(notes) = invoice.notes.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return;
    };
    let lines = wrap_text_lines(notes, 95);
    pen.ensure_room(10.0 + lines.len() as f32 * 4.4);
    pen.text("Notes:", 11.0, MARGIN_X, true);
    pen.y -= 5.5;
    for line in lines {
        pen.ensure_room(4.4);
        pen.text(&line, 9.0, MARGIN_X, false);
        pen.y -= 4.4;
    }
}
