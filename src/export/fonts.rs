//! Font selection for PDF export.
//!
//! Fallback chain: configured file, `<data_dir>/fonts/NanumGothic.ttf`,
//! well-known system Korean fonts, then the builtin Helvetica. The builtin
//! font only covers Latin-1, so text is folded before drawing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;

const PROJECT_FONT: &str = "NanumGothic.ttf";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/truetype/nanum/NanumMyeongjo.ttf",
    "/System/Library/Fonts/AppleGothic.ttf",
];

/// Font the PDF renderer should use.
#[derive(Debug, Clone)]
pub enum FontChoice {
    /// TrueType file loaded into memory.
    Embedded { path: PathBuf, data: Arc<Vec<u8>> },
    /// printpdf builtin Helvetica (Latin-1 only).
    Builtin,
}

impl FontChoice {
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Embedded { path, .. } => path.display().to_string(),
            Self::Builtin => "builtin Helvetica".to_string(),
        }
    }
}

/// Ordered font candidates for a configuration.
pub fn candidate_paths(config: &AppConfig) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = &config.font_path {
        paths.push(path.clone());
    }
    paths.push(config.fonts_dir().join(PROJECT_FONT));
    paths.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    paths
}

/// Walk the fallback chain and load the first readable font file.
pub fn resolve(config: &AppConfig) -> FontChoice {
    resolve_from(&candidate_paths(config))
}

pub fn resolve_from(candidates: &[PathBuf]) -> FontChoice {
    for path in candidates {
        match load_font_file(path) {
            Some(data) => {
                tracing::info!(font = %path.display(), "PDF font loaded");
                return FontChoice::Embedded {
                    path: path.clone(),
                    data: Arc::new(data),
                };
            }
            None => tracing::debug!(font = %path.display(), "PDF font candidate unavailable"),
        }
    }
    tracing::warn!("No Korean font found, PDF export falls back to builtin Helvetica");
    FontChoice::Builtin
}

fn load_font_file(path: &Path) -> Option<Vec<u8>> {
    let data = std::fs::read(path).ok()?;
    // TrueType (0x00010000 or "true") or OpenType CFF ("OTTO")
    let magic_ok = data.len() > 12
        && (data.starts_with(&[0x00, 0x01, 0x00, 0x00])
            || data.starts_with(b"OTTO")
            || data.starts_with(b"true"));
    if magic_ok {
        Some(data)
    } else {
        tracing::warn!(font = %path.display(), "Font file has an unrecognized header, skipping");
        None
    }
}

/// Fold text into the builtin font's Latin-1 range. Common math symbols
/// get ASCII spellings; anything else unrepresentable becomes `?`.
pub fn fold_to_latin1(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) < 0x100 {
            out.push(c);
            continue;
        }
        match ascii_spelling(c) {
            Some(spelling) => out.push_str(spelling),
            None => out.push('?'),
        }
    }
    out
}

fn ascii_spelling(c: char) -> Option<&'static str> {
    let spelling = match c {
        '≤' => "<=",
        '≥' => ">=",
        '≠' => "!=",
        '≈' => "~=",
        '≡' => "==",
        '∼' => "~",
        '∓' => "-/+",
        '∞' => "inf",
        '√' => "sqrt",
        '□' => "[ ]",
        '∠' => "angle ",
        '△' => "triangle ",
        '⊥' => "_|_",
        '∥' => "||",
        '∴' => "therefore",
        '∵' => "because",
        '⋯' | '…' => "...",
        '→' | '⇒' => "->",
        '←' | '⇐' => "<-",
        '↔' | '⇔' => "<->",
        '∈' => " in ",
        '∉' => " not in ",
        '⊂' | '⊆' => " subset ",
        '⊃' | '⊇' => " superset ",
        '∪' => " U ",
        '∩' => " n ",
        '∅' => "{}",
        '∀' => "for all ",
        '∃' => "exists ",
        '⅓' => "1/3",
        '⅔' => "2/3",
        '⅕' => "1/5",
        '⅖' => "2/5",
        '⅗' => "3/5",
        '⅘' => "4/5",
        '⅙' => "1/6",
        '⅚' => "5/6",
        '⅛' => "1/8",
        '⅜' => "3/8",
        '⅝' => "5/8",
        '⅞' => "7/8",
        'α' => "alpha",
        'β' => "beta",
        'γ' => "gamma",
        'δ' | 'Δ' => "delta",
        'ε' => "epsilon",
        'θ' | 'Θ' => "theta",
        'λ' | 'Λ' => "lambda",
        'π' | 'Π' => "pi",
        'σ' | 'Σ' => "sigma",
        'φ' | 'Φ' => "phi",
        'ω' | 'Ω' => "omega",
        '•' => "-",
        '―' | '–' | '—' => "-",
        '‘' | '’' => "'",
        '“' | '”' => "\"",
        _ => return None,
    };
    Some(spelling)
}
