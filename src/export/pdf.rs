//! PDF rendering via `printpdf`.
//!
//! Coordinates are millimetres from the bottom-left corner of an A4 page.

use std::io::{BufWriter, Cursor};

use printpdf::image_crate::{self, codecs::jpeg::JpegEncoder, ColorType};
use printpdf::*;

use super::fonts::{fold_to_latin1, FontChoice};
use super::layout::{AnswerEntry, CellContent, PreparedImage, ProblemSheet};
use super::{ExportError, ExportMeta, Labels};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;

// Problem grid
const GRID_MARGIN: f32 = 10.0;
const HEADER_H: f32 = 20.0;
const CELL_W: f32 = 90.0;
const CELL_H: f32 = 85.0;
const CELL_PAD: f32 = 3.0;
const CELL_IMAGE_MAX_W: f32 = CELL_W - 2.0 * CELL_PAD;
const CELL_IMAGE_MAX_H: f32 = 68.0;
const GRID_LEFT: f32 = (PAGE_W - 2.0 * CELL_W) / 2.0;

// Answer sheet
const ANSWER_MARGIN: f32 = 20.0;
const ANSWER_WIDTH: f32 = PAGE_W - 2.0 * ANSWER_MARGIN;
const ANSWER_IMAGE_MAX_H: f32 = 200.0;
const ENTRY_SPACING: f32 = 10.0;

const FOOTER_Y: f32 = 5.0;
const IMAGE_DPI: f32 = 300.0;
// Embedded pixels per inch of drawn size; larger sources are shrunk to fit.
const EMBED_DPI: f32 = 200.0;
const JPEG_QUALITY: u8 = 85;
const PT_TO_MM: f32 = 0.3528;

/// Render a problem sheet: 2-column grid, 3 rows per page.
pub fn render_problem_sheet(
    sheet: &ProblemSheet,
    meta: &ExportMeta,
    font: &FontChoice,
) -> Result<Vec<u8>, ExportError> {
    let title = meta.title();
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let pen = Pen::new(&doc, font)?;
    let labels = pen.labels();

    let mut layer = doc.get_page(page1).get_layer(layer1);
    for (index, cells) in sheet.pages.iter().enumerate() {
        if index > 0 {
            let (page, layer_idx) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            layer = doc.get_page(page).get_layer(layer_idx);
        }

        let top = if index == 0 {
            let header_y = PAGE_H - GRID_MARGIN - 8.0;
            pen.text(&layer, &title, 16.0, GRID_LEFT, header_y, true);
            let date = meta.date_label();
            let date_x = GRID_LEFT + 2.0 * CELL_W - pen.width(&date, 10.0);
            pen.text(&layer, &date, 10.0, date_x, header_y, false);
            PAGE_H - GRID_MARGIN - HEADER_H
        } else {
            PAGE_H - GRID_MARGIN
        };

        for (row, cell) in cells.iter().enumerate() {
            let row_top = top - row as f32 * CELL_H;
            let left_x = GRID_LEFT + CELL_PAD;
            let right_x = GRID_LEFT + CELL_W + CELL_PAD;
            pen.text(&layer, &labels.problem_label(cell.number), 12.0, left_x, row_top - 7.0, true);
            pen.text(&layer, labels.solution, 11.0, right_x, row_top - 7.0, false);

            let content_top = row_top - 12.0;
            let content_bottom = row_top - CELL_H + CELL_PAD;
            match &cell.content {
                CellContent::Text(lines) => {
                    pen.paragraph(&layer, lines, 10.0, left_x, content_top, CELL_IMAGE_MAX_W, content_bottom);
                }
                CellContent::Image(image) => {
                    let (w, h) = image.fit_within(CELL_IMAGE_MAX_W, CELL_IMAGE_MAX_H);
                    if let Err(e) = place_image(&layer, image, left_x, content_top - h, w, h) {
                        tracing::warn!(problem = cell.number, error = %e, "Problem image not embedded");
                        pen.text(&layer, labels.placeholder(super::Placeholder::LoadFailed), 10.0, left_x, content_top - 5.0, false);
                    }
                }
                CellContent::Placeholder(placeholder) => {
                    pen.text(&layer, labels.placeholder(*placeholder), 10.0, left_x, content_top - 5.0, false);
                }
            }
        }

        draw_grid(&layer, top, cells.len());
        pen.footer(&layer, &labels.watermark(&meta.username));
    }

    finish(doc)
}

/// Render an answer sheet: one entry per answered problem, top to bottom.
pub fn render_answer_sheet(
    entries: &[AnswerEntry],
    meta: &ExportMeta,
    font: &FontChoice,
) -> Result<Vec<u8>, ExportError> {
    let (doc, page1, layer1) = PdfDocument::new(meta.title(), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let pen = Pen::new(&doc, font)?;
    let labels = pen.labels();
    // The metadata title follows the labels the fonts can actually print.
    let heading = format!("{} {}", meta.title(), labels.answer_suffix);
    let doc = doc.with_title(heading.clone());
    let watermark = labels.watermark(&meta.username);

    let mut cursor = PageCursor {
        layer: doc.get_page(page1).get_layer(layer1),
        y: PAGE_H - ANSWER_MARGIN,
    };
    pen.footer(&cursor.layer, &watermark);

    let heading_x = ((PAGE_W - pen.width(&heading, 16.0)) / 2.0).max(ANSWER_MARGIN);
    cursor.y -= 7.0;
    pen.text(&cursor.layer, &heading, 16.0, heading_x, cursor.y, true);
    cursor.y -= 15.0;

    if entries.is_empty() {
        let x = ((PAGE_W - pen.width(labels.no_answers, 12.0)) / 2.0).max(ANSWER_MARGIN);
        pen.text(&cursor.layer, labels.no_answers, 12.0, x, cursor.y, false);
        return finish(doc);
    }

    let new_page = |cursor: &mut PageCursor| {
        let (page, layer_idx) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        cursor.layer = doc.get_page(page).get_layer(layer_idx);
        cursor.y = PAGE_H - ANSWER_MARGIN;
        pen.footer(&cursor.layer, &watermark);
    };

    for entry in entries {
        let image_size = match &entry.image {
            Some(Ok(image)) => Some(image.fit_within(ANSWER_WIDTH, ANSWER_IMAGE_MAX_H)),
            _ => None,
        };
        // Label plus image (or first text line) must share a page.
        let needed = 9.0 + image_size.map_or(6.0, |(_, h)| h + 3.0);
        if cursor.y - needed < ANSWER_MARGIN && cursor.y < PAGE_H - ANSWER_MARGIN - 1.0 {
            new_page(&mut cursor);
        }

        cursor.y -= 6.0;
        pen.text(&cursor.layer, &labels.answer_label(entry.number), 12.0, ANSWER_MARGIN, cursor.y, true);
        cursor.y -= 3.0;

        match (&entry.image, image_size) {
            (Some(Ok(image)), Some((w, h))) => {
                if let Err(e) = place_image(&cursor.layer, image, ANSWER_MARGIN, cursor.y - h, w, h) {
                    tracing::warn!(problem = entry.number, error = %e, "Answer image not embedded");
                    cursor.y -= 6.0;
                    pen.text(&cursor.layer, labels.placeholder(super::Placeholder::LoadFailed), 11.0, ANSWER_MARGIN, cursor.y, false);
                } else {
                    cursor.y -= h + 3.0;
                }
            }
            (Some(Err(placeholder)), _) => {
                cursor.y -= 6.0;
                pen.text(&cursor.layer, labels.placeholder(*placeholder), 11.0, ANSWER_MARGIN, cursor.y, false);
            }
            _ => {}
        }

        for line in entry
            .text_lines
            .iter()
            .flat_map(|line| pen.wrap(line, ANSWER_WIDTH, 11.0))
        {
            if cursor.y - 5.5 < ANSWER_MARGIN {
                new_page(&mut cursor);
            }
            cursor.y -= 5.5;
            pen.text(&cursor.layer, &line, 11.0, ANSWER_MARGIN, cursor.y, false);
        }

        cursor.y -= ENTRY_SPACING;
    }

    finish(doc)
}

struct PageCursor {
    layer: PdfLayerReference,
    y: f32,
}

/// Fonts plus the text folding they require.
struct Pen {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    latin_only: bool,
}

impl Pen {
    fn new(doc: &PdfDocumentReference, choice: &FontChoice) -> Result<Self, ExportError> {
        if let FontChoice::Embedded { path, data } = choice {
            match doc.add_external_font(Cursor::new(data.as_slice())) {
                Ok(font) => {
                    return Ok(Self {
                        regular: font.clone(),
                        bold: font,
                        latin_only: false,
                    })
                }
                Err(e) => {
                    tracing::warn!(font = %path.display(), error = %e, "Font rejected by PDF writer, using builtin");
                }
            }
        }
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        Ok(Self {
            regular,
            bold,
            latin_only: true,
        })
    }

    fn labels(&self) -> Labels {
        if self.latin_only {
            Labels::LATIN
        } else {
            Labels::KOREAN
        }
    }

    fn printable(&self, text: &str) -> String {
        if self.latin_only {
            fold_to_latin1(text)
        } else {
            text.to_string()
        }
    }

    fn text(&self, layer: &PdfLayerReference, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        layer.use_text(self.printable(text), size, Mm(x), Mm(y), font);
    }

    fn width(&self, text: &str, size: f32) -> f32 {
        text_width(&self.printable(text), size)
    }

    fn wrap(&self, text: &str, max_width: f32, size: f32) -> Vec<String> {
        wrap_to_width(&self.printable(text), max_width, size)
    }

    /// Draw wrapped lines downward from `top`; lines past `bottom` are cut
    /// and the last visible line ends with an ellipsis.
    #[allow(clippy::too_many_arguments)]
    fn paragraph(
        &self,
        layer: &PdfLayerReference,
        lines: &[String],
        size: f32,
        x: f32,
        top: f32,
        max_width: f32,
        bottom: f32,
    ) {
        let line_h = size * PT_TO_MM * 1.4;
        let wrapped: Vec<String> = lines
            .iter()
            .flat_map(|l| self.wrap(l, max_width, size))
            .collect();
        let fits = (((top - bottom) / line_h).floor() as usize).max(1);
        let mut y = top;
        for (i, line) in wrapped.iter().take(fits).enumerate() {
            y -= line_h;
            if i + 1 == fits && wrapped.len() > fits {
                self.text(layer, &format!("{line}..."), size, x, y, false);
            } else {
                self.text(layer, line, size, x, y, false);
            }
        }
    }

    fn footer(&self, layer: &PdfLayerReference, watermark: &str) {
        let x = ((PAGE_W - self.width(watermark, 8.0)) / 2.0).max(GRID_MARGIN);
        layer.set_fill_color(Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None)));
        self.text(layer, watermark, 8.0, x, FOOTER_Y, false);
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }
}

/// Outer box in black, inner lines in grey.
fn draw_grid(layer: &PdfLayerReference, top: f32, rows: usize) {
    if rows == 0 {
        return;
    }
    let left = GRID_LEFT;
    let right = GRID_LEFT + 2.0 * CELL_W;
    let bottom = top - rows as f32 * CELL_H;

    layer.set_outline_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.set_outline_thickness(1.0);
    layer.add_line(segment((left + CELL_W, top), (left + CELL_W, bottom)));
    for row in 1..rows {
        let y = top - row as f32 * CELL_H;
        layer.add_line(segment((left, y), (right, y)));
    }

    layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    layer.set_outline_thickness(2.0);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(left), Mm(top)), false),
            (Point::new(Mm(right), Mm(top)), false),
            (Point::new(Mm(right), Mm(bottom)), false),
            (Point::new(Mm(left), Mm(bottom)), false),
        ],
        is_closed: true,
    });
}

fn segment(from: (f32, f32), to: (f32, f32)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
    }
}

/// Place an image with its bottom-left corner at (x, y), scaled to w x h.
fn place_image(
    layer: &PdfLayerReference,
    image: &PreparedImage,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
) -> Result<(), String> {
    let xobject = embeddable(image, w, h)?;
    let natural_w = xobject.width.0.max(1) as f32 / IMAGE_DPI * 25.4;
    let natural_h = xobject.height.0.max(1) as f32 / IMAGE_DPI * 25.4;
    Image::from(xobject).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            scale_x: Some(w / natural_w),
            scale_y: Some(h / natural_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
    Ok(())
}

/// Pixel budget for an image drawn `w_mm` x `h_mm`.
fn pixel_box(w_mm: f32, h_mm: f32) -> (u32, u32) {
    let px = |mm: f32| ((mm / 25.4 * EMBED_DPI).ceil() as u32).max(1);
    (px(w_mm), px(h_mm))
}

/// Shrink to the drawn size and re-encode as baseline RGB JPEG (DCTDecode).
fn embeddable(image: &PreparedImage, w_mm: f32, h_mm: f32) -> Result<ImageXObject, String> {
    let decoded = image_crate::load_from_memory(&image.data).map_err(|e| e.to_string())?;
    let (max_w, max_h) = pixel_box(w_mm, h_mm);
    let scaled = if decoded.width() > max_w || decoded.height() > max_h {
        decoded.thumbnail(max_w, max_h)
    } else {
        decoded
    };
    let rgb = scaled.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(ImageXObject {
        width: Px(rgb.width() as usize),
        height: Px(rgb.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        smask: None,
        clipping_bbox: None,
    })
}

fn finish(doc: PdfDocumentReference) -> Result<Vec<u8>, ExportError> {
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("buffer error: {e}")))
}

/// Estimated advance width in mm. Hangul and CJK are full-width, Latin
/// roughly half an em.
fn char_width(c: char, size: f32) -> f32 {
    let em = size * PT_TO_MM;
    match c {
        ' ' => em * 0.28,
        c if c.is_ascii() => em * 0.55,
        '\u{1100}'..='\u{11FF}'
        | '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}' => em,
        _ => em * 0.6,
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, size)).sum()
}

/// Greedy word wrap by estimated width; words wider than a line are split.
fn wrap_to_width(text: &str, max_width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_w = 0.0;
    let space_w = char_width(' ', size);

    for word in text.split_whitespace() {
        let word_w = text_width(word, size);
        if !current.is_empty() && current_w + space_w + word_w > max_width {
            lines.push(std::mem::take(&mut current));
            current_w = 0.0;
        }
        if word_w > max_width {
            for c in word.chars() {
                let w = char_width(c, size);
                if !current.is_empty() && current_w + w > max_width {
                    lines.push(std::mem::take(&mut current));
                    current_w = 0.0;
                }
                current.push(c);
                current_w += w;
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
            current_w += space_w;
        }
        current.push_str(word);
        current_w += word_w;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::layout::{answer_sheet, problem_sheet};
    use crate::export::tests_support::{meta, problem};
    use crate::storage::test_images::{tiny_png, MemoryImageStore};

    #[test]
    fn problem_sheet_is_pdf() {
        let store = MemoryImageStore::with(&[("p.png", tiny_png())]);
        let mut text = problem(2, "");
        text.problem_text = Some("\\(x^2 \\ge 0\\) (1) yes (2) no".into());
        text.is_text_extracted = true;
        let problems = vec![problem(1, "p.png"), text, problem(3, "missing.png"), problem(4, "p.png")];

        let sheet = problem_sheet(&problems, &store);
        let pdf = render_problem_sheet(&sheet, &meta(), &FontChoice::Builtin).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(sheet.pages.len(), 2);
    }

    #[test]
    fn answer_sheet_is_pdf() {
        let store = MemoryImageStore::with(&[("a.png", tiny_png())]);
        let mut answered = problem(1, "p.png");
        answered.has_answer = true;
        answered.answer_image = Some("a.png".into());
        answered.answer_text = Some("**정답** 3\n\n- 풀이 한 줄".into());
        let entries = answer_sheet(&[answered], &store);

        let pdf = render_answer_sheet(&entries, &meta(), &FontChoice::Builtin).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    /// Photo-sized JPEG with enough detail that raw pixels would not deflate away.
    fn large_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image_crate::RgbImage::from_fn(width, height, |x, y| {
            image_crate::Rgb([(x % 251) as u8, (y % 241) as u8, ((x * 7 + y * 13) % 256) as u8])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode(img.as_raw(), width, height, ColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn embedded_images_are_shrunk_to_their_box() {
        let prepared = PreparedImage::from_bytes(large_jpeg(1600, 1200)).unwrap();
        let (w, h) = prepared.fit_within(CELL_IMAGE_MAX_W, CELL_IMAGE_MAX_H);
        let xobject = embeddable(&prepared, w, h).unwrap();
        let (max_w, max_h) = pixel_box(w, h);
        assert!(xobject.width.0 as u32 <= max_w && xobject.height.0 as u32 <= max_h);
        assert!(xobject.width.0 < 1600);
        assert!(matches!(xobject.image_filter, Some(ImageFilter::DCT)));
        assert!(xobject.image_data.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn small_images_keep_their_pixels() {
        let prepared = PreparedImage::from_bytes(tiny_png()).unwrap();
        let xobject = embeddable(&prepared, 80.0, 60.0).unwrap();
        assert_eq!((xobject.width.0, xobject.height.0), (4, 3));
    }

    #[test]
    fn photo_uploads_keep_the_pdf_small() {
        let jpeg = large_jpeg(1600, 1200);
        let input_len = jpeg.len();
        let store = MemoryImageStore::with(&[("big.jpg", jpeg)]);
        let problems: Vec<_> = (1..=6).map(|n| problem(n, "big.jpg")).collect();

        let sheet = problem_sheet(&problems, &store);
        let pdf = render_problem_sheet(&sheet, &meta(), &FontChoice::Builtin).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        // Six placements of one upload stay well under six copies of it.
        assert!(
            pdf.len() < 4 * input_len,
            "pdf {} bytes for a {} byte upload",
            pdf.len(),
            input_len
        );
    }

    #[test]
    fn answer_title_matches_printed_labels() {
        let pdf = render_answer_sheet(&[], &meta(), &FontChoice::Builtin).unwrap();
        assert!(contains(&pdf, Labels::LATIN.answer_suffix.as_bytes()));
        assert!(!contains(&pdf, Labels::KOREAN.answer_suffix.as_bytes()));
    }

    #[test]
    fn empty_answer_sheet_still_renders() {
        let pdf = render_answer_sheet(&[], &meta(), &FontChoice::Builtin).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn long_answer_text_breaks_pages() {
        let store = MemoryImageStore::default();
        let mut answered = problem(1, "p.png");
        answered.has_answer = true;
        answered.answer_text = Some((1..=120).map(|i| format!("line {i}\n\n")).collect());
        let entries = answer_sheet(&[answered], &store);
        let pdf = render_answer_sheet(&entries, &meta(), &FontChoice::Builtin).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_to_width("alpha beta gamma delta epsilon", 20.0, 10.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0) <= 20.0 + 1e-3));
        assert_eq!(lines.join(" "), "alpha beta gamma delta epsilon");
    }

    #[test]
    fn wrap_splits_long_words_and_hangul() {
        let lines = wrap_to_width("가나다라마바사아자차카타파하", 20.0, 10.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "가나다라마바사아자차카타파하");
        assert_eq!(wrap_to_width("", 20.0, 10.0), vec![String::new()]);
    }

    #[test]
    fn hangul_is_wider_than_latin() {
        assert!(char_width('가', 10.0) > char_width('a', 10.0));
    }
}
