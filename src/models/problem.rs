use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Problem {
    pub id: i64,
    pub unit_id: i64,
    /// Image reference understood by the configured image store.
    pub problem_image: String,
    /// OCR text (markdown with LaTeX), possibly edited by the user.
    pub problem_text: Option<String>,
    pub is_text_extracted: bool,
    pub answer_image: Option<String>,
    pub answer_text: Option<String>,
    pub has_answer: bool,
    /// Dense position within the unit, assigned as max+1 at creation.
    pub problem_number: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Problem {
    /// Extracted text worth rendering in place of the image.
    pub fn display_text(&self) -> Option<&str> {
        if !self.is_text_extracted {
            return None;
        }
        self.problem_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Answer payload: an image replaces a text answer and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Image(String),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(text: Option<&str>, extracted: bool) -> Problem {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Problem {
            id: 1,
            unit_id: 1,
            problem_image: "img".into(),
            problem_text: text.map(String::from),
            is_text_extracted: extracted,
            answer_image: None,
            answer_text: None,
            has_answer: false,
            problem_number: 1,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn display_text_requires_extraction_flag() {
        assert_eq!(problem(Some("x + 1"), false).display_text(), None);
        assert_eq!(problem(Some("x + 1"), true).display_text(), Some("x + 1"));
    }

    #[test]
    fn display_text_ignores_blank() {
        assert_eq!(problem(Some("   "), true).display_text(), None);
        assert_eq!(problem(None, true).display_text(), None);
    }
}
