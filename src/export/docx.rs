//! Word (DOCX) rendering.
//!
//! A DOCX file is a zip package of WordprocessingML parts. The parts are
//! written with `quick-xml` and packed with `zip`; images are stored under
//! `word/media/` and referenced by relationship id.

use std::borrow::Cow;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::layout::{AnswerEntry, CellContent, PreparedImage, ProblemCell, ProblemSheet};
use super::{ExportError, ExportMeta, Labels};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const A4_W_TWIPS: u32 = 11906;
const A4_H_TWIPS: u32 = 16838;

// Problem grid: 9.5 cm columns, 9 cm rows
const COLUMN_CM: f32 = 9.5;
const ROW_CM: f32 = 9.0;
const CELL_IMAGE_MAX_W_CM: f32 = 8.5;
const CELL_IMAGE_MAX_H_CM: f32 = 7.0;
const ANSWER_IMAGE_MAX_W_CM: f32 = 15.0;
const ANSWER_IMAGE_MAX_H_CM: f32 = 18.0;

const GRID_MARGINS: Margins = Margins {
    top_cm: 1.3,
    bottom_cm: 1.2,
    side_cm: 1.0,
};
const ANSWER_MARGINS: Margins = Margins {
    top_cm: 2.0,
    bottom_cm: 2.0,
    side_cm: 2.0,
};

fn twips(cm: f32) -> u32 {
    (cm * 1440.0 / 2.54).round() as u32
}

fn emu(cm: f32) -> u64 {
    (cm * 360_000.0).round() as u64
}

/// Render a problem sheet: one bordered 2x3 table per page.
pub fn render_problem_sheet(sheet: &ProblemSheet, meta: &ExportMeta) -> Result<Vec<u8>, ExportError> {
    let labels = Labels::KOREAN;
    let mut body = DocumentBody::new()?;
    for (index, cells) in sheet.pages.iter().enumerate() {
        if index > 0 {
            body.page_break()?;
        }
        body.problem_table(cells, &labels)?;
    }
    // The body may not end on a table.
    body.spacer()?;

    let header = PageHeader {
        title: meta.title(),
        date: meta.date_label(),
    };
    package(body, Some(&header), &labels.watermark(&meta.username), GRID_MARGINS)
}

/// Render an answer sheet: a single column of labelled entries.
pub fn render_answer_sheet(entries: &[AnswerEntry], meta: &ExportMeta) -> Result<Vec<u8>, ExportError> {
    let labels = Labels::KOREAN;
    let mut body = DocumentBody::new()?;
    body.paragraph(
        &format!("{} {}", meta.title(), labels.answer_suffix),
        RunStyle::TITLE,
        Some("center"),
    )?;
    body.paragraph(&meta.date_label(), RunStyle::SMALL, Some("right"))?;

    if entries.is_empty() {
        body.paragraph(labels.no_answers, RunStyle::BODY, Some("center"))?;
    }

    for entry in entries {
        body.paragraph(&labels.answer_label(entry.number), RunStyle::LABEL, None)?;
        match &entry.image {
            Some(Ok(image)) => {
                body.image_paragraph(image, ANSWER_IMAGE_MAX_W_CM, ANSWER_IMAGE_MAX_H_CM)?
            }
            Some(Err(placeholder)) => {
                body.paragraph(labels.placeholder(*placeholder), RunStyle::MUTED, None)?
            }
            None => {}
        }
        for line in &entry.text_lines {
            body.paragraph(line, RunStyle::BODY, None)?;
        }
        body.gap()?;
    }

    package(body, None, &labels.watermark(&meta.username), ANSWER_MARGINS)
}

#[derive(Clone, Copy)]
struct Margins {
    top_cm: f32,
    bottom_cm: f32,
    side_cm: f32,
}

struct PageHeader {
    title: String,
    date: String,
}

#[derive(Clone, Copy)]
struct RunStyle {
    bold: bool,
    /// Half-points, as WordprocessingML counts them.
    size: u32,
    color: Option<&'static str>,
}

impl RunStyle {
    const TITLE: RunStyle = RunStyle { bold: true, size: 32, color: None };
    const LABEL: RunStyle = RunStyle { bold: true, size: 24, color: None };
    const BODY: RunStyle = RunStyle { bold: false, size: 22, color: None };
    const CELL: RunStyle = RunStyle { bold: false, size: 20, color: None };
    const SMALL: RunStyle = RunStyle { bold: false, size: 20, color: Some("555555") };
    const MUTED: RunStyle = RunStyle { bold: false, size: 20, color: Some("808080") };
    const FOOTER: RunStyle = RunStyle { bold: false, size: 16, color: Some("808080") };
}

fn docx_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Docx(e.to_string())
}

/// Thin event writer; every error becomes `ExportError::Docx`.
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self, ExportError> {
        let mut out = Self {
            writer: Writer::new(Vec::new()),
        };
        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(out)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.writer.write_event(event).map_err(docx_err)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.event(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn end(&mut self, name: &str) -> Result<(), ExportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExportError> {
        self.event(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn text(&mut self, text: &str) -> Result<(), ExportError> {
        self.event(Event::Text(BytesText::new(&xml_safe(text))))
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn run(&mut self, text: &str, style: RunStyle) -> Result<(), ExportError> {
        self.start("w:r", &[])?;
        self.start("w:rPr", &[])?;
        if style.bold {
            self.empty("w:b", &[])?;
        }
        if let Some(color) = style.color {
            self.empty("w:color", &[("w:val", color)])?;
        }
        let size = style.size.to_string();
        self.empty("w:sz", &[("w:val", &size)])?;
        self.empty("w:szCs", &[("w:val", &size)])?;
        self.end("w:rPr")?;
        self.start("w:t", &[("xml:space", "preserve")])?;
        self.text(text)?;
        self.end("w:t")?;
        self.end("w:r")
    }

    fn paragraph_props(&mut self, align: Option<&str>) -> Result<(), ExportError> {
        if let Some(align) = align {
            self.start("w:pPr", &[])?;
            self.empty("w:jc", &[("w:val", align)])?;
            self.end("w:pPr")?;
        }
        Ok(())
    }
}

/// Drop characters XML 1.0 cannot carry; page and line feeds become spaces.
fn xml_safe(text: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    }
    if text.chars().all(allowed) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .filter_map(|c| match c {
                '\u{000B}' | '\u{000C}' => Some(' '),
                c if allowed(c) => Some(c),
                _ => None,
            })
            .collect(),
    )
}

struct Media {
    rel_id: String,
    file_name: String,
    data: Vec<u8>,
}

/// `word/document.xml` under construction plus the images it references.
struct DocumentBody {
    xml: XmlOut,
    media: Vec<Media>,
}

impl DocumentBody {
    fn new() -> Result<Self, ExportError> {
        let mut xml = XmlOut::new()?;
        xml.start(
            "w:document",
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        )?;
        xml.start("w:body", &[])?;
        Ok(Self {
            xml,
            media: Vec::new(),
        })
    }

    fn paragraph(&mut self, text: &str, style: RunStyle, align: Option<&str>) -> Result<(), ExportError> {
        self.xml.start("w:p", &[])?;
        self.xml.paragraph_props(align)?;
        self.xml.run(text, style)?;
        self.xml.end("w:p")
    }

    fn page_break(&mut self) -> Result<(), ExportError> {
        self.xml.start("w:p", &[])?;
        self.tiny_paragraph_props()?;
        self.xml.start("w:r", &[])?;
        self.xml.empty("w:br", &[("w:type", "page")])?;
        self.xml.end("w:r")?;
        self.xml.end("w:p")
    }

    /// Near-zero-height paragraph, so a full-page table never spills it.
    fn spacer(&mut self) -> Result<(), ExportError> {
        self.xml.start("w:p", &[])?;
        self.tiny_paragraph_props()?;
        self.xml.end("w:p")
    }

    fn tiny_paragraph_props(&mut self) -> Result<(), ExportError> {
        self.xml.start("w:pPr", &[])?;
        self.xml.empty(
            "w:spacing",
            &[("w:before", "0"), ("w:after", "0"), ("w:line", "20"), ("w:lineRule", "exact")],
        )?;
        self.xml.start("w:rPr", &[])?;
        self.xml.empty("w:sz", &[("w:val", "2")])?;
        self.xml.end("w:rPr")?;
        self.xml.end("w:pPr")
    }

    /// Blank paragraph with 1 cm of space after it.
    fn gap(&mut self) -> Result<(), ExportError> {
        let after = twips(1.0).to_string();
        self.xml.start("w:p", &[])?;
        self.xml.start("w:pPr", &[])?;
        self.xml.empty("w:spacing", &[("w:after", &after)])?;
        self.xml.end("w:pPr")?;
        self.xml.end("w:p")
    }

    fn problem_table(&mut self, cells: &[ProblemCell], labels: &Labels) -> Result<(), ExportError> {
        let column = twips(COLUMN_CM).to_string();
        let table_width = (twips(COLUMN_CM) * 2).to_string();
        let row_height = twips(ROW_CM).to_string();

        self.xml.start("w:tbl", &[])?;
        self.xml.start("w:tblPr", &[])?;
        self.xml.empty("w:tblW", &[("w:w", &table_width), ("w:type", "dxa")])?;
        self.xml.empty("w:jc", &[("w:val", "center")])?;
        self.xml.start("w:tblBorders", &[])?;
        for edge in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            self.xml.empty(
                edge,
                &[("w:val", "single"), ("w:sz", "12"), ("w:space", "0"), ("w:color", "000000")],
            )?;
        }
        self.xml.end("w:tblBorders")?;
        self.xml.empty("w:tblLayout", &[("w:type", "fixed")])?;
        self.xml.end("w:tblPr")?;

        self.xml.start("w:tblGrid", &[])?;
        self.xml.empty("w:gridCol", &[("w:w", &column)])?;
        self.xml.empty("w:gridCol", &[("w:w", &column)])?;
        self.xml.end("w:tblGrid")?;

        for cell in cells {
            self.xml.start("w:tr", &[])?;
            self.xml.start("w:trPr", &[])?;
            self.xml.empty("w:cantSplit", &[])?;
            self.xml.empty("w:trHeight", &[("w:val", &row_height), ("w:hRule", "exact")])?;
            self.xml.end("w:trPr")?;

            self.start_cell(&column)?;
            self.paragraph(&labels.problem_label(cell.number), RunStyle::LABEL, None)?;
            match &cell.content {
                CellContent::Text(lines) => {
                    for line in lines {
                        self.paragraph(line, RunStyle::CELL, None)?;
                    }
                }
                CellContent::Image(image) => {
                    self.image_paragraph(image, CELL_IMAGE_MAX_W_CM, CELL_IMAGE_MAX_H_CM)?
                }
                CellContent::Placeholder(placeholder) => {
                    self.paragraph(labels.placeholder(*placeholder), RunStyle::MUTED, None)?
                }
            }
            self.xml.end("w:tc")?;

            self.start_cell(&column)?;
            self.paragraph(labels.solution, RunStyle::LABEL, None)?;
            self.xml.end("w:tc")?;

            self.xml.end("w:tr")?;
        }
        self.xml.end("w:tbl")
    }

    fn start_cell(&mut self, width: &str) -> Result<(), ExportError> {
        self.xml.start("w:tc", &[])?;
        self.xml.start("w:tcPr", &[])?;
        self.xml.empty("w:tcW", &[("w:w", width), ("w:type", "dxa")])?;
        self.xml.end("w:tcPr")
    }

    /// Inline picture scaled into `max_w_cm` x `max_h_cm`.
    fn image_paragraph(&mut self, image: &PreparedImage, max_w_cm: f32, max_h_cm: f32) -> Result<(), ExportError> {
        let index = self.media.len() + 1;
        let rel_id = format!("rIdImage{index}");
        let file_name = format!("image{index}.{}", image.kind.extension());
        let (w_cm, h_cm) = image.fit_within(max_w_cm, max_h_cm);
        let (cx, cy) = (emu(w_cm).to_string(), emu(h_cm).to_string());
        let id = index.to_string();

        let xml = &mut self.xml;
        xml.start("w:p", &[])?;
        xml.start("w:r", &[])?;
        xml.start("w:drawing", &[])?;
        xml.start(
            "wp:inline",
            &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        )?;
        xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
        xml.empty("wp:docPr", &[("id", &id), ("name", &file_name)])?;
        xml.start("a:graphic", &[])?;
        xml.start("a:graphicData", &[("uri", NS_PIC)])?;
        xml.start("pic:pic", &[])?;
        xml.start("pic:nvPicPr", &[])?;
        xml.empty("pic:cNvPr", &[("id", &id), ("name", &file_name)])?;
        xml.empty("pic:cNvPicPr", &[])?;
        xml.end("pic:nvPicPr")?;
        xml.start("pic:blipFill", &[])?;
        xml.empty("a:blip", &[("r:embed", &rel_id)])?;
        xml.start("a:stretch", &[])?;
        xml.empty("a:fillRect", &[])?;
        xml.end("a:stretch")?;
        xml.end("pic:blipFill")?;
        xml.start("pic:spPr", &[])?;
        xml.start("a:xfrm", &[])?;
        xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
        xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        xml.end("a:xfrm")?;
        xml.start("a:prstGeom", &[("prst", "rect")])?;
        xml.empty("a:avLst", &[])?;
        xml.end("a:prstGeom")?;
        xml.end("pic:spPr")?;
        xml.end("pic:pic")?;
        xml.end("a:graphicData")?;
        xml.end("a:graphic")?;
        xml.end("wp:inline")?;
        xml.end("w:drawing")?;
        xml.end("w:r")?;
        xml.end("w:p")?;

        self.media.push(Media {
            rel_id,
            file_name,
            data: image.data.clone(),
        });
        Ok(())
    }

    fn finish(mut self, has_header: bool, margins: Margins) -> Result<(Vec<u8>, Vec<Media>), ExportError> {
        let (page_w, page_h) = (A4_W_TWIPS.to_string(), A4_H_TWIPS.to_string());
        let (top, bottom, side) = (
            twips(margins.top_cm).to_string(),
            twips(margins.bottom_cm).to_string(),
            twips(margins.side_cm).to_string(),
        );
        let edge = twips(0.5).to_string();

        let xml = &mut self.xml;
        xml.start("w:sectPr", &[])?;
        if has_header {
            xml.empty("w:headerReference", &[("w:type", "default"), ("r:id", "rIdHeader")])?;
        }
        xml.empty("w:footerReference", &[("w:type", "default"), ("r:id", "rIdFooter")])?;
        xml.empty("w:pgSz", &[("w:w", &page_w), ("w:h", &page_h)])?;
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", &top),
                ("w:right", &side),
                ("w:bottom", &bottom),
                ("w:left", &side),
                ("w:header", &edge),
                ("w:footer", &edge),
                ("w:gutter", "0"),
            ],
        )?;
        xml.end("w:sectPr")?;
        xml.end("w:body")?;
        xml.end("w:document")?;
        Ok((self.xml.into_bytes(), self.media))
    }
}

fn header_part(header: &PageHeader) -> Result<Vec<u8>, ExportError> {
    let right_tab = (twips(COLUMN_CM) * 2).to_string();
    let mut xml = XmlOut::new()?;
    xml.start("w:hdr", &[("xmlns:w", NS_W)])?;
    xml.start("w:p", &[])?;
    xml.start("w:pPr", &[])?;
    xml.start("w:tabs", &[])?;
    xml.empty("w:tab", &[("w:val", "right"), ("w:pos", &right_tab)])?;
    xml.end("w:tabs")?;
    xml.end("w:pPr")?;
    xml.run(&header.title, RunStyle::LABEL)?;
    xml.start("w:r", &[])?;
    xml.empty("w:tab", &[])?;
    xml.end("w:r")?;
    xml.run(&header.date, RunStyle::SMALL)?;
    xml.end("w:p")?;
    xml.end("w:hdr")?;
    Ok(xml.into_bytes())
}

fn footer_part(watermark: &str) -> Result<Vec<u8>, ExportError> {
    let mut xml = XmlOut::new()?;
    xml.start("w:ftr", &[("xmlns:w", NS_W)])?;
    xml.start("w:p", &[])?;
    xml.paragraph_props(Some("center"))?;
    xml.run(watermark, RunStyle::FOOTER)?;
    xml.end("w:p")?;
    xml.end("w:ftr")?;
    Ok(xml.into_bytes())
}

fn styles_part() -> Result<Vec<u8>, ExportError> {
    let mut xml = XmlOut::new()?;
    xml.start("w:styles", &[("xmlns:w", NS_W)])?;
    xml.start("w:docDefaults", &[])?;
    xml.start("w:rPrDefault", &[])?;
    xml.start("w:rPr", &[])?;
    xml.empty(
        "w:rFonts",
        &[
            ("w:ascii", "Malgun Gothic"),
            ("w:hAnsi", "Malgun Gothic"),
            ("w:eastAsia", "Malgun Gothic"),
            ("w:cs", "Malgun Gothic"),
        ],
    )?;
    xml.empty("w:lang", &[("w:val", "ko-KR"), ("w:eastAsia", "ko-KR")])?;
    xml.end("w:rPr")?;
    xml.end("w:rPrDefault")?;
    xml.start("w:pPrDefault", &[])?;
    xml.start("w:pPr", &[])?;
    xml.empty("w:spacing", &[("w:after", "60"), ("w:line", "264"), ("w:lineRule", "auto")])?;
    xml.end("w:pPr")?;
    xml.end("w:pPrDefault")?;
    xml.end("w:docDefaults")?;
    xml.end("w:styles")?;
    Ok(xml.into_bytes())
}

fn content_types_part(has_header: bool) -> Result<Vec<u8>, ExportError> {
    const MAIN: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";
    let document = format!("{MAIN}.document.main+xml");
    let styles = format!("{MAIN}.styles+xml");
    let footer = format!("{MAIN}.footer+xml");
    let header = format!("{MAIN}.header+xml");

    let mut xml = XmlOut::new()?;
    xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    xml.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")],
    )?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    xml.empty("Default", &[("Extension", "png"), ("ContentType", "image/png")])?;
    xml.empty("Default", &[("Extension", "jpeg"), ("ContentType", "image/jpeg")])?;
    xml.empty("Override", &[("PartName", "/word/document.xml"), ("ContentType", &document)])?;
    xml.empty("Override", &[("PartName", "/word/styles.xml"), ("ContentType", &styles)])?;
    xml.empty("Override", &[("PartName", "/word/footer1.xml"), ("ContentType", &footer)])?;
    if has_header {
        xml.empty("Override", &[("PartName", "/word/header1.xml"), ("ContentType", &header)])?;
    }
    xml.end("Types")?;
    Ok(xml.into_bytes())
}

fn relationships(entries: &[(String, String, String)]) -> Result<Vec<u8>, ExportError> {
    let mut xml = XmlOut::new()?;
    xml.start("Relationships", &[("xmlns", NS_PKG_REL)])?;
    for (id, kind, target) in entries {
        xml.empty("Relationship", &[("Id", id), ("Type", kind), ("Target", target)])?;
    }
    xml.end("Relationships")?;
    Ok(xml.into_bytes())
}

fn rel(id: &str, kind: &str, target: &str) -> (String, String, String) {
    (id.to_string(), format!("{REL_TYPE}/{kind}"), target.to_string())
}

fn package(
    body: DocumentBody,
    header: Option<&PageHeader>,
    watermark: &str,
    margins: Margins,
) -> Result<Vec<u8>, ExportError> {
    let (document, media) = body.finish(header.is_some(), margins)?;

    let mut document_rels = vec![
        rel("rIdStyles", "styles", "styles.xml"),
        rel("rIdFooter", "footer", "footer1.xml"),
    ];
    if header.is_some() {
        document_rels.push(rel("rIdHeader", "header", "header1.xml"));
    }
    for item in &media {
        document_rels.push(rel(&item.rel_id, "image", &format!("media/{}", item.file_name)));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut add = |name: &str, bytes: &[u8]| -> Result<(), ExportError> {
        zip.start_file(name, options).map_err(docx_err)?;
        zip.write_all(bytes)?;
        Ok(())
    };

    add("[Content_Types].xml", &content_types_part(header.is_some())?)?;
    add(
        "_rels/.rels",
        &relationships(&[rel("rId1", "officeDocument", "word/document.xml")])?,
    )?;
    add("word/document.xml", &document)?;
    add("word/_rels/document.xml.rels", &relationships(&document_rels)?)?;
    add("word/styles.xml", &styles_part()?)?;
    add("word/footer1.xml", &footer_part(watermark)?)?;
    if let Some(header) = header {
        add("word/header1.xml", &header_part(header)?)?;
    }
    for item in &media {
        add(&format!("word/media/{}", item.file_name), &item.data)?;
    }

    let cursor = zip.finish().map_err(docx_err)?;
    Ok(cursor.into_inner())
}
