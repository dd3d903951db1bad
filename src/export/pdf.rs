//! A4 PDF export.
//!
//! [`layout`] places every element on pages using millimetres measured
//! from the top-left corner; [`serialize`] turns the layout into a PDF 1.4
//! file with the standard Helvetica fonts and JPEG (DCTDecode) images.

use super::helpers::{decode_data_url, encode_jpeg, format_date, format_step_time};
use super::GuideDocument;
use crate::recorder::types::Step;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_X: f64 = 20.0;
const TEXT_WIDTH: f64 = 170.0;
const TIME_X: f64 = 120.0;
const IMAGE_WIDTH: f64 = 170.0;
const IMAGE_HEIGHT: f64 = 100.0;
const TOP_Y: f64 = 30.0;
const FIRST_STEP_Y: f64 = 80.0;
/// A step starting below `page height - STEP_BREAK` moves to a new page.
const STEP_BREAK: f64 = 80.0;
/// An image ending below `page height - IMAGE_BREAK` moves to a new page.
const IMAGE_BREAK: f64 = 20.0;
const STEP_LINE_HEIGHT: f64 = 7.0;
const LINE_HEIGHT_FACTOR: f64 = 1.15;
const PT_PER_MM: f64 = 72.0 / 25.4;
/// Average Helvetica glyph width as a share of the font size.
const AVG_GLYPH_WIDTH: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// `lines` stacked downwards from the baseline at `y`.
    Text {
        x: f64,
        y: f64,
        size: f64,
        font: Font,
        gray: u8,
        lines: Vec<String>,
    },
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfImage {
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub pages: Vec<Page>,
    pub images: Vec<PdfImage>,
}

impl Layout {
    fn current(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
    }

    fn text(&mut self, x: f64, y: f64, size: f64, font: Font, gray: u8, lines: Vec<String>) {
        self.current().elements.push(Element::Text {
            x,
            y,
            size,
            font,
            gray,
            lines,
        });
    }
}

/// Estimated rendered width in millimetres.
pub fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * AVG_GLYPH_WIDTH / PT_PER_MM
}

/// Greedy word wrap to `max_width` millimetres. Words longer than a line
/// are split by character.
pub fn wrap_text(text: &str, size: f64, max_width: f64) -> Vec<String> {
    let max_chars = ((max_width * PT_PER_MM) / (size * AVG_GLYPH_WIDTH)).floor().max(1.0) as usize;
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn step_image(step: &Step) -> Option<PdfImage> {
    let decoded = decode_data_url(step.screenshot.as_deref()?)?;
    let img = match image::load_from_memory(&decoded.bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(step = step.id, error = %e, "skipping undecodable screenshot in PDF");
            return None;
        }
    };
    Some(PdfImage {
        jpeg: encode_jpeg(&img)?,
        width_px: img.width(),
        height_px: img.height(),
    })
}

/// Places the guide on A4 pages.
pub fn layout(doc: &GuideDocument) -> Layout {
    let mut out = Layout::default();
    out.new_page();

    let title_x = ((PAGE_WIDTH_MM - text_width(&doc.title, 22.0)) / 2.0).max(MARGIN_X);
    out.text(title_x, TOP_Y, 22.0, Font::Bold, 0, vec![doc.title.clone()]);

    if !doc.description.is_empty() {
        let lines = wrap_text(&doc.description, 12.0, TEXT_WIDTH);
        out.text(MARGIN_X, 45.0, 12.0, Font::Regular, 0, lines);
    }

    let generated = format!("Generated on {}", format_date(&doc.generated));
    out.text(MARGIN_X, 65.0, 10.0, Font::Regular, 128, vec![generated]);

    let mut y = FIRST_STEP_Y;
    for step in &doc.steps {
        if y > PAGE_HEIGHT_MM - STEP_BREAK {
            out.new_page();
            y = TOP_Y;
        }

        let lines = wrap_text(&format!("{}. {}", step.id, step.description), 14.0, TEXT_WIDTH);
        let advance = lines.len() as f64 * STEP_LINE_HEIGHT;
        out.text(MARGIN_X, y, 14.0, Font::Bold, 0, lines);
        y += advance;

        let action = format!("Action: {}", step.action);
        out.text(MARGIN_X, y, 10.0, Font::Regular, 100, vec![action]);
        let time = format!("Time: {}", format_step_time(step.timestamp));
        out.text(TIME_X, y, 10.0, Font::Regular, 100, vec![time]);
        y += 15.0;

        if let Some(image) = step_image(step) {
            if y + IMAGE_HEIGHT > PAGE_HEIGHT_MM - IMAGE_BREAK {
                out.new_page();
                y = TOP_Y;
            }
            out.images.push(image);
            let index = out.images.len() - 1;
            out.current().elements.push(Element::Image {
                x: MARGIN_X,
                y,
                width: IMAGE_WIDTH,
                height: IMAGE_HEIGHT,
                image: index,
            });
            y += IMAGE_HEIGHT + 15.0;
        }

        y += 10.0;
    }
    out
}

pub fn generate(doc: &GuideDocument) -> Vec<u8> {
    serialize(&layout(doc))
}

/// Escapes a PDF literal string. Characters outside Latin-1 become `?`.
fn pdf_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 2);
    out.push(b'(');
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out.push(b')');
    out
}

fn pt(mm: f64) -> String {
    format!("{:.2}", mm * PT_PER_MM)
}

/// PDF y coordinate of a distance `mm` from the top edge.
fn pt_from_top(mm: f64) -> String {
    pt(PAGE_HEIGHT_MM - mm)
}

fn content_stream(page: &Page) -> Vec<u8> {
    let mut ops = Vec::new();
    for element in &page.elements {
        match element {
            Element::Text {
                x,
                y,
                size,
                font,
                gray,
                lines,
            } => {
                let leading = size * LINE_HEIGHT_FACTOR / PT_PER_MM;
                let level = f64::from(*gray) / 255.0;
                ops.extend_from_slice(
                    format!("BT /{} {size} Tf {level:.3} g\n", font.resource()).as_bytes(),
                );
                for (i, line) in lines.iter().enumerate() {
                    let line_y = y + i as f64 * leading;
                    ops.extend_from_slice(
                        format!("1 0 0 1 {} {} Tm ", pt(*x), pt_from_top(line_y)).as_bytes(),
                    );
                    ops.extend_from_slice(&pdf_string(line));
                    ops.extend_from_slice(b" Tj\n");
                }
                ops.extend_from_slice(b"ET\n");
            }
            Element::Image {
                x,
                y,
                width,
                height,
                image,
            } => {
                ops.extend_from_slice(
                    format!(
                        "q {} 0 0 {} {} {} cm /Im{image} Do Q\n",
                        pt(*width),
                        pt(*height),
                        pt(*x),
                        pt_from_top(y + height)
                    )
                    .as_bytes(),
                );
            }
        }
    }
    ops
}

/// Accumulates numbered objects and their byte offsets.
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    /// Object numbers are assigned in call order, starting at 1.
    fn object(&mut self, body: &[u8]) {
        self.offsets.push(self.buf.len());
        let num = self.offsets.len();
        self.buf.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, dict: &str, data: &[u8]) {
        let mut body = format!("<< {dict} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(&body);
    }

    fn finish(mut self) -> Vec<u8> {
        let xref = self.buf.len();
        let size = self.offsets.len() + 1;
        self.buf
            .extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in &self.offsets {
            self.buf
                .extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        self.buf.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n")
                .as_bytes(),
        );
        self.buf
    }
}

/// Object layout: 1 catalog, 2 page tree, 3-4 fonts, then one object per
/// image, then a page object followed by its content stream for each page.
pub fn serialize(layout: &Layout) -> Vec<u8> {
    let first_image = 5;
    let first_page = first_image + layout.images.len();
    let page_ids: Vec<usize> = (0..layout.pages.len()).map(|i| first_page + i * 2).collect();

    let mut w = PdfWriter::new();
    w.object(b"<< /Type /Catalog /Pages 2 0 R >>");
    let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();
    w.object(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_ids.len()
        )
        .as_bytes(),
    );
    w.object(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");
    w.object(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>");

    for image in &layout.images {
        let dict = format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /DCTDecode",
            image.width_px, image.height_px
        );
        w.stream(&dict, &image.jpeg);
    }

    let xobjects: String = (0..layout.images.len())
        .map(|i| format!("/Im{i} {} 0 R ", first_image + i))
        .collect();
    let media_box = format!("[0 0 {} {}]", pt(PAGE_WIDTH_MM), pt(PAGE_HEIGHT_MM));

    for (page, id) in layout.pages.iter().zip(&page_ids) {
        w.object(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox {media_box} \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> /XObject << {xobjects}>> >> \
                 /Contents {} 0 R >>",
                id + 1
            )
            .as_bytes(),
        );
        w.stream("", &content_stream(page));
    }

    w.finish()
}
