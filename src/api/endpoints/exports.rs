//! Problem and answer sheet downloads (PDF or Word).

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::db::repository;
use crate::export::{self, ExportMeta};
use crate::models::{ExportFormat, SheetKind};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// `GET /api/units/:id/export/problems?format=pdf|docx`
pub async fn problems(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(unit_id): Path<i64>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    export_sheet(ctx, user, unit_id, SheetKind::Problems, query).await
}

/// `GET /api/units/:id/export/answers?format=pdf|docx`
pub async fn answers(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(unit_id): Path<i64>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    export_sheet(ctx, user, unit_id, SheetKind::Answers, query).await
}

fn parse_format(raw: Option<&str>) -> Result<ExportFormat, ApiError> {
    match raw.map(str::trim).filter(|f| !f.is_empty()) {
        None => Ok(ExportFormat::default()),
        Some(value) => value
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Unsupported export format: {value}"))),
    }
}

/// Keep a server-side copy of a generated document. Failures only warn.
fn archive(dir: &std::path::Path, filename: &str, bytes: &[u8]) {
    let path = dir.join(filename);
    let archived = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, bytes));
    match archived {
        Ok(()) => tracing::debug!(path = %path.display(), "Export archived"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Export archive failed"),
    }
}

async fn export_sheet(
    ctx: ApiContext,
    user: UserContext,
    unit_id: i64,
    kind: SheetKind,
    query: ExportQuery,
) -> Result<Response, ApiError> {
    let format = parse_format(query.format.as_deref())?;

    let (unit, problems) = {
        let conn = ctx.core.open_db()?;
        let unit = authorization::require_unit(&conn, user.user_id, unit_id)?;
        let problems = repository::list_problems(&conn, unit_id)?;
        (unit, problems)
    };
    if problems.is_empty() {
        return Err(ApiError::BadRequest("Unit has no problems".into()));
    }

    let meta = ExportMeta {
        workbook_name: unit.workbook_name,
        unit_name: unit.unit.name,
        username: user.username,
        generated_at: chrono::Local::now().naive_local(),
    };
    let filename = export::export_filename(
        kind,
        &meta.workbook_name,
        &meta.unit_name,
        meta.generated_at,
        format,
    );
    let fallback = format!(
        "{}_{}.{}",
        kind.as_str(),
        meta.generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    );

    let core = ctx.core.clone();
    let archive_name = filename.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        let bytes = export::render_document(
            kind,
            format,
            &problems,
            &meta,
            core.images.as_ref(),
            &core.font,
        )?;
        if core.config.archive_exports {
            archive(&core.config.exports_dir(), &archive_name, &bytes);
        }
        Ok::<_, export::ExportError>(bytes)
    })
    .await??;

    tracing::info!(
        user_id = user.user_id,
        unit_id,
        kind = kind.as_str(),
        format = format.as_str(),
        bytes = bytes.len(),
        "Export generated"
    );

    let disposition = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(&filename)
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_defaults_to_pdf() {
        assert_eq!(parse_format(None).unwrap(), ExportFormat::Pdf);
        assert_eq!(parse_format(Some("")).unwrap(), ExportFormat::Pdf);
        assert_eq!(parse_format(Some("DOCX")).unwrap(), ExportFormat::Docx);
    }

    #[test]
    fn archive_writes_into_fresh_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("exports");
        archive(&dir, "수학_문제지.pdf", b"%PDF-1.3");
        assert_eq!(std::fs::read(dir.join("수학_문제지.pdf")).unwrap(), b"%PDF-1.3");
    }

    #[test]
    fn archive_failure_is_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("exports");
        std::fs::write(&blocker, b"not a directory").unwrap();
        archive(&blocker, "sheet.pdf", b"%PDF");
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[test]
    fn unknown_format_is_bad_request() {
        assert!(matches!(
            parse_format(Some("hwp")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
