use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use circrep_engine::{download_name, JobId, JobSnapshot, JobStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

const UPLOAD_FIELD: &str = "excel_file";

#[derive(Debug, Serialize)]
pub(super) struct SubmittedJob {
    job_id: JobId,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct JobLogs {
    logs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CancelResult {
    job_id: JobId,
    status: JobStatus,
}

pub(super) async fn submit_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedJob>>), ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multipart_error(&req_id.0, &e))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().trim().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| map_multipart_error(&req_id.0, &e))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("multipart field '{UPLOAD_FIELD}' is required"),
        ));
    };
    if file_name.is_empty() {
        return Err(ApiError::new(req_id.0, "bad_request", "no file selected"));
    }

    let job_id = state.engine.submit(bytes.to_vec(), file_name);

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: SubmittedJob {
                job_id,
                message: "report generation started",
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn get_report_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    let id = parse_job_id(&req_id.0, &job_id)?;
    let snapshot = state
        .engine
        .status(id)
        .ok_or_else(|| job_not_found(&req_id.0, &job_id))?;

    Ok(Json(ApiResponse {
        data: snapshot,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn drain_report_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobLogs>>, ApiError> {
    let id = parse_job_id(&req_id.0, &job_id)?;
    let logs = state
        .engine
        .drain_logs(id)
        .ok_or_else(|| job_not_found(&req_id.0, &job_id))?;

    Ok(Json(ApiResponse {
        data: JobLogs { logs },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn cancel_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<CancelResult>>, ApiError> {
    let id = parse_job_id(&req_id.0, &job_id)?;
    let status = state
        .engine
        .cancel(id)
        .ok_or_else(|| job_not_found(&req_id.0, &job_id))?;

    Ok(Json(ApiResponse {
        data: CancelResult { job_id: id, status },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn download_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&req_id.0, &job_id)?;
    let not_ready = || {
        ApiError::new(
            req_id.0.clone(),
            "not_found",
            format!("no archive available for job {job_id}"),
        )
    };
    let archive = state.engine.archive_path(id).ok_or_else(not_ready)?;

    let bytes = match tokio::fs::read(&archive).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(job_id = %id, archive = %archive.display(), "archive missing on disk");
            return Err(not_ready());
        }
        Err(e) => {
            tracing::error!(job_id = %id, archive = %archive.display(), error = %e, "failed to read archive");
            return Err(ApiError::new(
                req_id.0,
                "internal_error",
                "failed to read archive",
            ));
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", download_name(&archive));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Malformed ids are reported the same way as unknown ones.
fn parse_job_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| job_not_found(request_id, raw))
}

fn job_not_found(request_id: &str, job_id: &str) -> ApiError {
    ApiError::new(request_id, "not_found", format!("job {job_id} not found"))
}

fn map_multipart_error(request_id: &str, error: &MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::new(request_id, "payload_too_large", "upload exceeds size limit");
    }
    tracing::warn!(error = %error, "rejected malformed upload");
    ApiError::new(request_id, "bad_request", format!("invalid upload: {}", error.body_text()))
}

#[cfg(test)]
#[path = "reports_test.rs"]
mod tests;
