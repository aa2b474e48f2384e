use serde::{Deserialize, Serialize};

/// Unknown string value for a closed set of variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ExportFormat {
    Pdf => "pdf",
    Docx => "docx",
});

str_enum!(SheetKind {
    Problems => "problems",
    Answers => "answers",
});

str_enum!(AnswerType {
    Image => "image",
    Text => "text",
});

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Pdf
    }
}

impl SheetKind {
    /// Filename prefix used for exported documents.
    pub fn file_label(&self) -> &'static str {
        match self {
            Self::Problems => "문제지",
            Self::Answers => "정답지",
        }
    }
}
