use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::extract_document;
use crate::screening::evaluator::{EvaluationError, ScreeningEvaluator};
use crate::screening::export::{to_csv_bytes, EXPORT_FILENAME};
use crate::screening::keywords::{merge_keywords, parse_custom_keywords};
use crate::screening::models::{Candidate, JobDescription, ScreeningRecord, Submission};
use crate::screening::results::ResultsAccumulator;
use crate::screening::sessions::{BatchEntry, BatchSnapshot, BatchState};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct KeywordRequest {
    pub jd_text: String,
    #[serde(default)]
    pub custom_keywords: Option<String>,
}

#[derive(Serialize)]
pub struct KeywordResponse {
    pub ai_keywords: Vec<String>,
    pub custom_keywords: Vec<String>,
    pub keywords: Vec<String>,
    pub cached: bool,
}

#[derive(Serialize)]
pub struct BatchStarted {
    pub batch_id: Uuid,
    pub total: usize,
}

#[derive(Serialize)]
pub struct RankedResponse {
    pub batch_id: Uuid,
    pub records: Vec<ScreeningRecord>,
}

/// POST /api/v1/keywords
pub async fn handle_generate_keywords(
    State(state): State<AppState>,
    Json(req): Json<KeywordRequest>,
) -> Result<Json<KeywordResponse>, AppError> {
    if req.jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text must not be empty".to_string()));
    }

    let generated = state
        .keyword_cache
        .get_or_generate(
            &req.jd_text,
            state.model.as_ref(),
            state.config.screening.ai_timeout,
        )
        .await?;
    let custom = parse_custom_keywords(req.custom_keywords.as_deref().unwrap_or_default());
    let keywords = merge_keywords(&custom, &generated.keywords);

    Ok(Json(KeywordResponse {
        ai_keywords: generated.keywords,
        custom_keywords: custom,
        keywords,
        cached: generated.cached,
    }))
}

/// Fields collected from the screening upload form.
struct ScreeningForm {
    jd_text: String,
    custom_keywords: Vec<String>,
    use_ai_keywords: bool,
    uploads: Vec<(String, Bytes)>,
}

async fn read_screening_form(mut multipart: Multipart) -> Result<ScreeningForm, AppError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Invalid multipart body: {e}"))
    };

    let mut jd_text = String::new();
    let mut custom_keywords = Vec::new();
    let mut use_ai_keywords = true;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "jd_text" => jd_text = field.text().await.map_err(invalid)?,
            "keywords" => custom_keywords = parse_custom_keywords(&field.text().await.map_err(invalid)?),
            "use_ai_keywords" => {
                let raw = field.text().await.map_err(invalid)?;
                use_ai_keywords = match raw.trim().to_ascii_lowercase().as_str() {
                    "" | "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    other => {
                        return Err(AppError::Validation(format!(
                            "use_ai_keywords must be true or false, got '{other}'"
                        )))
                    }
                };
            }
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let bytes = field.bytes().await.map_err(invalid)?;
                uploads.push((filename, bytes));
            }
            other => warn!("Ignoring unknown form field '{other}'"),
        }
    }

    if jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text must not be empty".to_string()));
    }
    if uploads.is_empty() {
        return Err(AppError::Validation("At least one resume file is required".to_string()));
    }

    Ok(ScreeningForm {
        jd_text,
        custom_keywords,
        use_ai_keywords,
        uploads,
    })
}

/// POST /api/v1/screenings
///
/// Resolves keywords up front so a batch with nothing to match against is
/// rejected before any file is read. Extraction and screening then run in the
/// background; poll `GET /api/v1/screenings/:id` for progress.
pub async fn handle_start_screening(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_screening_form(multipart).await?;

    let mut ai_failure = None;
    let generated = if form.use_ai_keywords {
        match state
            .keyword_cache
            .get_or_generate(
                &form.jd_text,
                state.model.as_ref(),
                state.config.screening.ai_timeout,
            )
            .await
        {
            Ok(generated) => generated.keywords,
            Err(e) => {
                warn!("AI keyword generation failed, continuing with custom keywords: {e}");
                ai_failure = Some(e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let jd = JobDescription::new(form.jd_text, &form.custom_keywords, &generated);
    if jd.keywords().is_empty() {
        return Err(match ai_failure {
            Some(e) => AppError::from(e),
            None => AppError::from(EvaluationError::Configuration),
        });
    }

    let entry = state.batches.create(form.uploads.len());
    info!(
        "Batch {} accepted: {} files, {} keywords",
        entry.id,
        entry.total,
        jd.keywords().len()
    );

    tokio::spawn(run_screening(
        state.evaluator.clone(),
        entry.clone(),
        jd,
        form.uploads,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchStarted {
            batch_id: entry.id,
            total: entry.total,
        }),
    ))
}

async fn run_screening(
    evaluator: Arc<ScreeningEvaluator>,
    entry: Arc<BatchEntry>,
    jd: JobDescription,
    uploads: Vec<(String, Bytes)>,
) {
    let submissions = join_all(uploads.into_iter().enumerate().map(
        |(index, (filename, bytes))| async move {
            match extract_document(&filename, bytes).await {
                Ok(text) => Submission::Extracted(Candidate {
                    index,
                    filename,
                    text,
                }),
                Err(error) => Submission::Unreadable {
                    index,
                    filename,
                    error,
                },
            }
        },
    ))
    .await;

    let cancel = entry.cancel_token();
    let outcome = evaluator
        .run_batch(
            submissions,
            &jd,
            ResultsAccumulator::new(),
            &cancel,
            |record| entry.record_completed(record),
        )
        .await;

    match outcome {
        Ok(results) => entry.finish(results),
        Err(e) => {
            error!("Batch {} failed: {e}", entry.id);
            entry.fail(e.to_string());
        }
    }
}

fn find_batch(state: &AppState, id: Uuid) -> Result<Arc<BatchEntry>, AppError> {
    state
        .batches
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Screening batch {id} not found")))
}

/// GET /api/v1/screenings/:id
pub async fn handle_get_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchSnapshot>, AppError> {
    Ok(Json(find_batch(&state, id)?.snapshot()))
}

/// GET /api/v1/screenings/:id/ranked
pub async fn handle_get_ranked(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RankedResponse>, AppError> {
    let entry = find_batch(&state, id)?;
    Ok(Json(RankedResponse {
        batch_id: entry.id,
        records: entry.ranked(),
    }))
}

/// POST /api/v1/screenings/:id/cancel
pub async fn handle_cancel_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let entry = find_batch(&state, id)?;
    if entry.state() == BatchState::Running {
        entry.cancel();
        info!("Batch {id} cancellation requested");
    }
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/screenings/:id/export
pub async fn handle_export_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entry = find_batch(&state, id)?;
    let csv = to_csv_bytes(&entry.records())?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        csv,
    ))
}
