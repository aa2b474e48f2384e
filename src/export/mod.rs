//! Problem and answer sheet export (PDF and Word).
//!
//! `layout` resolves problems into a format-independent sheet; `pdf` and
//! `docx` draw that sheet. Content problems (missing images, odd LaTeX)
//! degrade inline; only writer failures surface as `ExportError`.

pub mod docx;
pub mod fonts;
pub mod latex;
pub mod layout;
pub mod markdown;
pub mod pdf;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{ExportFormat, Problem, SheetKind};
use crate::storage::ImageStore;

pub use fonts::FontChoice;
pub use layout::Placeholder;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("DOCX packaging failed: {0}")]
    Docx(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document metadata printed in headers and footers.
#[derive(Debug, Clone)]
pub struct ExportMeta {
    pub workbook_name: String,
    pub unit_name: String,
    /// Requesting user, printed in the watermark.
    pub username: String,
    pub generated_at: NaiveDateTime,
}

impl ExportMeta {
    pub fn title(&self) -> String {
        format!("{} - {}", self.workbook_name, self.unit_name)
    }

    pub fn date_label(&self) -> String {
        self.generated_at.format("%Y-%m-%d").to_string()
    }
}

/// Printed strings. Korean by default; Latin when the PDF falls back to the
/// builtin font.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    problem: &'static str,
    answer: &'static str,
    pub solution: &'static str,
    pub answer_suffix: &'static str,
    pub no_answers: &'static str,
    no_image: &'static str,
    load_failed: &'static str,
    personal_use: &'static str,
    no_redistribution: &'static str,
}

impl Labels {
    pub const KOREAN: Labels = Labels {
        problem: "문제",
        answer: "정답",
        solution: "풀이",
        answer_suffix: "[정답]",
        no_answers: "정답이 등록된 문제가 없습니다.",
        no_image: "[이미지 없음]",
        load_failed: "[이미지 로드 실패]",
        personal_use: "개인 학습용",
        no_redistribution: "재배포 금지",
    };

    pub const LATIN: Labels = Labels {
        problem: "Problem",
        answer: "Answer",
        solution: "Solution",
        answer_suffix: "[Answers]",
        no_answers: "No problems have a registered answer.",
        no_image: "[No image]",
        load_failed: "[Image failed to load]",
        personal_use: "Personal study use",
        no_redistribution: "No redistribution",
    };

    /// "문제 3"
    pub fn problem_label(&self, number: i64) -> String {
        format!("{} {number}", self.problem)
    }

    /// "문제 3 정답"
    pub fn answer_label(&self, number: i64) -> String {
        format!("{} {number} {}", self.problem, self.answer)
    }

    pub fn placeholder(&self, placeholder: Placeholder) -> &'static str {
        match placeholder {
            Placeholder::NoImage => self.no_image,
            Placeholder::LoadFailed => self.load_failed,
        }
    }

    pub fn watermark(&self, username: &str) -> String {
        format!(
            "{} - {username} - {}",
            self.personal_use, self.no_redistribution
        )
    }
}

/// `<kind>_<workbook>_<unit>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn export_filename(
    kind: SheetKind,
    workbook: &str,
    unit: &str,
    timestamp: NaiveDateTime,
    format: ExportFormat,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        kind.file_label(),
        filename_part(workbook),
        filename_part(unit),
        timestamp.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn filename_part(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '"' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Render one sheet in the requested format. Blocking.
pub fn render_document(
    kind: SheetKind,
    format: ExportFormat,
    problems: &[Problem],
    meta: &ExportMeta,
    images: &dyn ImageStore,
    font: &FontChoice,
) -> Result<Vec<u8>, ExportError> {
    tracing::debug!(
        kind = kind.as_str(),
        format = format.as_str(),
        problems = problems.len(),
        "Rendering export"
    );
    match (kind, format) {
        (SheetKind::Problems, ExportFormat::Pdf) => {
            pdf::render_problem_sheet(&layout::problem_sheet(problems, images), meta, font)
        }
        (SheetKind::Answers, ExportFormat::Pdf) => {
            pdf::render_answer_sheet(&layout::answer_sheet(problems, images), meta, font)
        }
        (SheetKind::Problems, ExportFormat::Docx) => {
            docx::render_problem_sheet(&layout::problem_sheet(problems, images), meta)
        }
        (SheetKind::Answers, ExportFormat::Docx) => {
            docx::render_answer_sheet(&layout::answer_sheet(problems, images), meta)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::ExportMeta;
    use crate::models::Problem;

    pub fn timestamp() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    /// Unanswered, image-only problem.
    pub fn problem(number: i64, image: &str) -> Problem {
        Problem {
            id: number,
            unit_id: 1,
            problem_image: image.into(),
            problem_text: None,
            is_text_extracted: false,
            answer_image: None,
            answer_text: None,
            has_answer: false,
            problem_number: number,
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    pub fn meta() -> ExportMeta {
        ExportMeta {
            workbook_name: "수학 I".into(),
            unit_name: "지수함수".into(),
            username: "student".into(),
            generated_at: timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::{meta, problem, timestamp};
    use super::*;
    use crate::storage::test_images::MemoryImageStore;

    #[test]
    fn filename_layout() {
        assert_eq!(
            export_filename(SheetKind::Problems, "수학 I", "지수/로그", timestamp(), ExportFormat::Pdf),
            "문제지_수학 I_지수_로그_20260314_090507.pdf"
        );
        assert_eq!(
            export_filename(SheetKind::Answers, "wb", "u", timestamp(), ExportFormat::Docx),
            "정답지_wb_u_20260314_090507.docx"
        );
    }

    #[test]
    fn labels_by_language() {
        assert_eq!(Labels::KOREAN.problem_label(3), "문제 3");
        assert_eq!(Labels::KOREAN.answer_label(3), "문제 3 정답");
        assert_eq!(Labels::LATIN.problem_label(3), "Problem 3");
        assert_eq!(
            Labels::KOREAN.watermark("kim"),
            "개인 학습용 - kim - 재배포 금지"
        );
        assert_eq!(Labels::KOREAN.placeholder(Placeholder::NoImage), "[이미지 없음]");
        assert_eq!(
            Labels::KOREAN.placeholder(Placeholder::LoadFailed),
            "[이미지 로드 실패]"
        );
    }

    #[test]
    fn meta_title_and_date() {
        let m = meta();
        assert_eq!(m.title(), "수학 I - 지수함수");
        assert_eq!(m.date_label(), "2026-03-14");
    }

    #[test]
    fn render_dispatches_every_combination() {
        let store = MemoryImageStore::default();
        let problems = vec![problem(1, "missing.png")];
        for kind in [SheetKind::Problems, SheetKind::Answers] {
            let pdf = render_document(kind, ExportFormat::Pdf, &problems, &meta(), &store, &FontChoice::Builtin)
                .unwrap();
            assert!(pdf.starts_with(b"%PDF"));
            let docx = render_document(kind, ExportFormat::Docx, &problems, &meta(), &store, &FontChoice::Builtin)
                .unwrap();
            assert!(docx.starts_with(b"PK"));
        }
    }
}
