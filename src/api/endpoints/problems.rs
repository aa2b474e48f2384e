//! Problems: image upload, OCR extraction, text editing and answers.

use std::collections::HashMap;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::core_state::CoreState;
use crate::db::repository;
use crate::models::{Answer, AnswerType, Problem};
use crate::ocr::{OcrError, OcrOutcome, OcrSource, OcrText};
use crate::storage::{self, ImageStore};

/// Problem plus renderable image URLs.
#[derive(Debug, Serialize)]
pub struct ProblemView {
    #[serde(flatten)]
    pub problem: Problem,
    pub problem_image_url: String,
    pub answer_image_url: Option<String>,
}

impl ProblemView {
    fn new(problem: Problem, images: &dyn ImageStore) -> Self {
        Self {
            problem_image_url: images.url_for(&problem.problem_image),
            answer_image_url: problem.answer_image.as_deref().map(|r| images.url_for(r)),
            problem,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveTextRequest {
    #[serde(default)]
    pub text: String,
}

// ═══════════════════════════════════════════════════════════
// Multipart helpers
// ═══════════════════════════════════════════════════════════

struct UploadedFile {
    file_name: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct FormFields {
    files: HashMap<String, UploadedFile>,
    text: HashMap<String, String>,
}

impl FormFields {
    fn take_file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        self.files
            .remove(name)
            .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

async fn read_form(mut multipart: Multipart) -> Result<FormFields, ApiError> {
    let mut form = FormFields::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part for an untouched file input.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        data: data.to_vec(),
                    },
                );
            }
            None => {
                let value = field.text().await.map_err(multipart_error)?;
                form.text.insert(name, value);
            }
        }
    }
    Ok(form)
}

/// Validate an uploaded image and hand it to the image store.
async fn store_image(
    ctx: &ApiContext,
    user_id: i64,
    subfolder: &'static str,
    file: UploadedFile,
) -> Result<String, ApiError> {
    let name = storage::validate_upload(&file.file_name, &file.data, ctx.core.config.max_upload_bytes)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let public_id = storage::public_id(subfolder, user_id, &timestamp, &name.stem);
    let images = ctx.core.images.clone();
    let reference = tokio::task::spawn_blocking(move || {
        images.upload(&file.data, &public_id, &name.extension)
    })
    .await??;
    tracing::info!(user_id, subfolder, reference = %reference, "Image stored");
    Ok(reference)
}

// ═══════════════════════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════════════════════

/// `GET /api/units/:id/problems`: ordered by problem number.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(unit_id): Path<i64>,
) -> Result<Json<Vec<ProblemView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_unit(&conn, user.user_id, unit_id)?;
    let problems = repository::list_problems(&conn, unit_id)?;
    let images = ctx.core.images.as_ref();
    Ok(Json(
        problems
            .into_iter()
            .map(|p| ProblemView::new(p, images))
            .collect(),
    ))
}

/// `POST /api/units/:id/problems`: multipart with a `problem_image` file.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(unit_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProblemView>), ApiError> {
    // Ownership before reading the body, so strangers cannot fill the store.
    {
        let conn = ctx.core.open_db()?;
        authorization::require_unit(&conn, user.user_id, unit_id)?;
    }

    let mut form = read_form(multipart).await?;
    let file = form.take_file("problem_image")?;
    let reference = store_image(&ctx, user.user_id, "problems", file).await?;

    let conn = ctx.core.open_db()?;
    let problem = repository::insert_problem(&conn, unit_id, &reference)?;
    tracing::info!(
        user_id = user.user_id,
        unit_id,
        problem_id = problem.id,
        number = problem.problem_number,
        "Problem created"
    );
    Ok((
        StatusCode::CREATED,
        Json(ProblemView::new(problem, ctx.core.images.as_ref())),
    ))
}

/// `GET /api/problems/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<ProblemView>, ApiError> {
    let conn = ctx.core.open_db()?;
    let problem = authorization::require_problem(&conn, user.user_id, id)?;
    Ok(Json(ProblemView::new(problem, ctx.core.images.as_ref())))
}

/// `DELETE /api/problems/:id`
///
/// Remaining problems keep their numbers; gaps are allowed.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_problem(&conn, user.user_id, id)?;
    repository::delete_problem(&conn, id)?;
    tracing::info!(user_id = user.user_id, problem_id = id, "Problem deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/problems/:id/extract`: run OCR on the problem image.
///
/// The text is returned for review and not persisted; the client saves it
/// through `PUT /api/problems/:id/text`.
pub async fn extract(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<OcrOutcome>), ApiError> {
    let problem = {
        let conn = ctx.core.open_db()?;
        authorization::require_problem(&conn, user.user_id, id)?
    };

    let core = ctx.core.clone();
    let reference = problem.problem_image;
    let result = tokio::task::spawn_blocking(move || run_ocr(&core, &reference)).await?;

    let status = match &result {
        Ok(text) => {
            tracing::info!(problem_id = id, chars = text.text.len(), "Text extracted");
            StatusCode::OK
        }
        Err(e) => {
            tracing::warn!(problem_id = id, error = %e, "Text extraction failed");
            StatusCode::BAD_REQUEST
        }
    };
    Ok((status, Json(OcrOutcome::from(result))))
}

/// Resolve the image reference into something the OCR provider can read.
/// Blocking.
fn run_ocr(core: &CoreState, reference: &str) -> Result<OcrText, OcrError> {
    if !core.ocr.is_configured() {
        return Err(OcrError::MissingCredentials);
    }
    let source = if storage::is_remote(reference) {
        OcrSource::Url(reference.to_string())
    } else {
        let data = core
            .images
            .fetch(reference)
            .map_err(|e| OcrError::ImageNotFound(e.to_string()))?;
        let mime = match storage::detect_image_mime(&data) {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(reference)
                .first_or(mime_guess::mime::IMAGE_PNG)
                .to_string(),
        };
        OcrSource::Bytes { data, mime }
    };
    core.ocr.extract(&source)
}

/// `PUT /api/problems/:id/text`: save reviewed OCR text.
pub async fn save_text(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
    Json(req): Json<SaveTextRequest>,
) -> Result<Json<ProblemView>, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_problem(&conn, user.user_id, id)?;
    repository::save_problem_text(&conn, id, &req.text)?;
    let problem = authorization::require_problem(&conn, user.user_id, id)?;
    Ok(Json(ProblemView::new(problem, ctx.core.images.as_ref())))
}

/// `POST /api/problems/:id/answer`
///
/// Multipart form: `answer_type` is `image` (with an `answer_image` file) or
/// `text` (with `answer_text`). Either replaces whatever answer was there.
pub async fn set_answer(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<ProblemView>, ApiError> {
    {
        let conn = ctx.core.open_db()?;
        authorization::require_problem(&conn, user.user_id, id)?;
    }

    let mut form = read_form(multipart).await?;
    let answer_type: AnswerType = form
        .text
        .get("answer_type")
        .map(|v| v.trim())
        .unwrap_or_default()
        .parse()
        .map_err(|_| ApiError::BadRequest("answer_type must be 'image' or 'text'".into()))?;

    let answer = match answer_type {
        AnswerType::Image => {
            let file = form.take_file("answer_image")?;
            Answer::Image(store_image(&ctx, user.user_id, "answers", file).await?)
        }
        AnswerType::Text => {
            let text = form
                .text
                .remove("answer_text")
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            if text.is_empty() {
                return Err(ApiError::BadRequest("answer_text is required".into()));
            }
            Answer::Text(text)
        }
    };

    let conn = ctx.core.open_db()?;
    repository::set_answer(&conn, id, &answer)?;
    let problem = authorization::require_problem(&conn, user.user_id, id)?;
    tracing::info!(
        user_id = user.user_id,
        problem_id = id,
        answer_type = answer_type.as_str(),
        "Answer saved"
    );
    Ok(Json(ProblemView::new(problem, ctx.core.images.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_images::MemoryImageStore;

    fn sample_problem(answer_image: Option<&str>) -> Problem {
        let mut problem = crate::export::tests_support::problem(1, "odabnote/problems/1/a.png");
        problem.answer_image = answer_image.map(String::from);
        problem.has_answer = answer_image.is_some();
        problem
    }

    #[test]
    fn view_flattens_problem_and_adds_urls() {
        let store = MemoryImageStore::default();
        let view = ProblemView::new(sample_problem(Some("ans.png")), &store);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["problem_number"], 1);
        assert_eq!(json["problem_image_url"], "/uploads/odabnote/problems/1/a.png");
        assert_eq!(json["answer_image_url"], "/uploads/ans.png");
    }

    #[test]
    fn view_without_answer_image_has_null_url() {
        let store = MemoryImageStore::default();
        let view = ProblemView::new(sample_problem(None), &store);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["answer_image_url"].is_null());
    }
}
