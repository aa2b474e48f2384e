//! Format-independent sheet model.
//!
//! Both renderers consume the same resolved pages, so images are fetched
//! and decoded once and every failure has already become a placeholder.

use std::io::Cursor;

use image::{GenericImageView, ImageFormat, ImageOutputFormat};

use super::latex::to_readable;
use super::markdown::to_plain_lines;
use crate::models::Problem;
use crate::storage::ImageStore;

/// Grid rows per problem-sheet page.
pub const PROBLEMS_PER_PAGE: usize = 3;

/// Split items into pages of `per_page`. Zero items give zero pages.
pub fn paginate<T>(items: &[T], per_page: usize) -> Vec<&[T]> {
    items.chunks(per_page.max(1)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// No reference, or the store could not deliver the bytes.
    NoImage,
    /// Bytes arrived but are not a decodable image.
    LoadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// Image bytes normalized to PNG or JPEG, with pixel dimensions.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Vec<u8>,
    pub kind: ImageKind,
    pub width_px: u32,
    pub height_px: u32,
}

impl PreparedImage {
    /// Probe PNG/JPEG in place; anything else decodable is re-encoded as PNG.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, image::ImageError> {
        let format = image::guess_format(&data)?;
        match format {
            ImageFormat::Png | ImageFormat::Jpeg => {
                let (width_px, height_px) =
                    image::io::Reader::with_format(Cursor::new(&data), format).into_dimensions()?;
                let kind = if format == ImageFormat::Png {
                    ImageKind::Png
                } else {
                    ImageKind::Jpeg
                };
                Ok(Self {
                    data,
                    kind,
                    width_px,
                    height_px,
                })
            }
            other => {
                let decoded = image::load_from_memory_with_format(&data, other)?;
                let (width_px, height_px) = decoded.dimensions();
                let mut png = Vec::new();
                decoded.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
                Ok(Self {
                    data: png,
                    kind: ImageKind::Png,
                    width_px,
                    height_px,
                })
            }
        }
    }

    /// Largest size with the image's aspect ratio inside `max_w` x `max_h`.
    /// Width is filled first, height clamps.
    pub fn fit_within(&self, max_w: f32, max_h: f32) -> (f32, f32) {
        if self.width_px == 0 || self.height_px == 0 {
            return (max_w, max_h);
        }
        let aspect = self.height_px as f32 / self.width_px as f32;
        let mut width = max_w;
        let mut height = width * aspect;
        if height > max_h {
            height = max_h;
            width = height / aspect;
        }
        (width, height)
    }
}

/// Resolved image slot: bytes ready to embed, or the placeholder to print.
pub type ImageSlot = Result<PreparedImage, Placeholder>;

/// Left-hand content of a problem cell.
#[derive(Debug, Clone)]
pub enum CellContent {
    Text(Vec<String>),
    Image(PreparedImage),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone)]
pub struct ProblemCell {
    pub number: i64,
    pub content: CellContent,
}

#[derive(Debug, Clone)]
pub struct AnswerEntry {
    pub number: i64,
    pub image: Option<ImageSlot>,
    pub text_lines: Vec<String>,
}

/// Problem cells grouped into grid pages.
#[derive(Debug, Clone, Default)]
pub struct ProblemSheet {
    pub pages: Vec<Vec<ProblemCell>>,
}

impl ProblemSheet {
    pub fn cell_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Resolve every problem's left cell and paginate the grid.
pub fn problem_sheet(problems: &[Problem], images: &dyn ImageStore) -> ProblemSheet {
    let pages = paginate(problems, PROBLEMS_PER_PAGE)
        .into_iter()
        .map(|page| page.iter().map(|p| problem_cell(p, images)).collect())
        .collect();
    ProblemSheet { pages }
}

fn problem_cell(problem: &Problem, images: &dyn ImageStore) -> ProblemCell {
    let content = match problem.display_text() {
        Some(text) => CellContent::Text(readable_lines(text)),
        None => match load_image(images, Some(&problem.problem_image)) {
            Ok(image) => CellContent::Image(image),
            Err(placeholder) => CellContent::Placeholder(placeholder),
        },
    };
    ProblemCell {
        number: problem.problem_number,
        content,
    }
}

/// Entries for every answered problem, in problem order.
pub fn answer_sheet(problems: &[Problem], images: &dyn ImageStore) -> Vec<AnswerEntry> {
    problems
        .iter()
        .filter(|p| p.has_answer)
        .map(|p| AnswerEntry {
            number: p.problem_number,
            image: p
                .answer_image
                .as_deref()
                .map(|reference| load_image(images, Some(reference))),
            text_lines: p
                .answer_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(|t| to_plain_lines(&to_readable(t)))
                .unwrap_or_default(),
        })
        .collect()
}

fn readable_lines(text: &str) -> Vec<String> {
    to_readable(text)
        .split('\n')
        .map(|line| line.trim_end().to_string())
        .collect()
}

fn load_image(images: &dyn ImageStore, reference: Option<&str>) -> ImageSlot {
    let reference = match reference.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Err(Placeholder::NoImage),
    };
    let bytes = images.fetch(reference).map_err(|e| {
        tracing::warn!(reference, error = %e, "Export image unavailable");
        Placeholder::NoImage
    })?;
    PreparedImage::from_bytes(bytes).map_err(|e| {
        tracing::warn!(reference, error = %e, "Export image could not be decoded");
        Placeholder::LoadFailed
    })
}
