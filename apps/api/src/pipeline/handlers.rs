//! Axum route handlers for the ATS API.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::analysis::analyzer::AnalyzerCacheStats;
use crate::analysis::models::AnalysisMode;
use crate::errors::AppError;
use crate::parsing::Document;
use crate::pipeline::{AnalysisResponse, AnalyzeRequest};
use crate::progress::{ProgressEvent, ProgressRecord, ProgressStatus};
use crate::state::AppState;

pub const DEFAULT_INDUSTRY: &str = "technology";
pub const DEFAULT_ROLE: &str = "Senior";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// POST /api/v1/ats/analyze
///
/// Multipart fields: `resume` (file, required), `industry`, `role`, `mode`
/// (`fast` | `comprehensive`), `sessionId`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AppError> {
    let request = read_upload(multipart, None).await?;
    let response = state.service.analyze(request).await?;
    Ok(Json(response))
}

/// POST /api/v1/ats/analyze/fast
///
/// Same fields as `handle_analyze`; `mode` is ignored.
pub async fn handle_analyze_fast(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AppError> {
    let request = read_upload(multipart, Some(AnalysisMode::Fast)).await?;
    let response = state.service.analyze(request).await?;
    Ok(Json(response))
}

/// GET /api/v1/ats/progress/:session_id
pub async fn handle_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProgressRecord>, AppError> {
    state
        .service
        .progress()
        .get(&session_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No progress for session {session_id}")))
}

/// GET /api/v1/ats/progress/:session_id/stream
///
/// Server-sent events: `connected`, the current state, then every `progress` event
/// up to the closing `complete` or `error`. A `heartbeat` frame goes out every 30s.
pub async fn handle_progress_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (snapshot, receiver) = state
        .service
        .progress()
        .subscribe(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("No progress for session {session_id}")))?;
    debug!("Progress stream opened for session {session_id}");

    let mut initial = vec![ProgressEvent::connected()];
    if snapshot.status != ProgressStatus::Started {
        initial.push(ProgressEvent::from_record(&snapshot));
    }
    let live = if snapshot.status.is_terminal() {
        None
    } else {
        Some(receiver)
    };

    let events = stream::iter(initial)
        .chain(stream::unfold(live, next_event))
        .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .event(Event::default().data(r#"{"type":"heartbeat"}"#)),
    ))
}

/// Yields events until a terminal one has been sent or the channel closes.
async fn next_event(
    receiver: Option<broadcast::Receiver<ProgressEvent>>,
) -> Option<(ProgressEvent, Option<broadcast::Receiver<ProgressEvent>>)> {
    let mut receiver = receiver?;
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let rest = if event.is_terminal() {
                    None
                } else {
                    Some(receiver)
                };
                return Some((event, rest));
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Progress stream lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn to_sse(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("Could not encode progress event: {e}");
            Event::default().data(r#"{"type":"error","message":"encoding failed"}"#)
        }
    }
}

/// GET /api/v1/ats/cache/stats
pub async fn handle_cache_stats(State(state): State<AppState>) -> Json<AnalyzerCacheStats> {
    Json(state.service.analyzer().cache_stats())
}

/// DELETE /api/v1/ats/cache
pub async fn handle_clear_cache(State(state): State<AppState>) -> StatusCode {
    state.service.analyzer().clear_caches();
    StatusCode::NO_CONTENT
}

async fn read_upload(
    mut multipart: Multipart,
    forced_mode: Option<AnalysisMode>,
) -> Result<AnalyzeRequest, AppError> {
    let mut document = None;
    let mut industry = None;
    let mut role = None;
    let mut mode = None;
    let mut session_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let filename = field.file_name().unwrap_or("resume").to_string();
                let declared_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read resume: {e}")))?;
                if bytes.is_empty() {
                    return Err(AppError::Validation("Uploaded resume is empty".to_string()));
                }
                info!("Received resume {filename} ({} bytes)", bytes.len());
                document = Some(Document::new(bytes, declared_type, filename));
            }
            "industry" | "role" | "mode" | "sessionId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "industry" => industry = Some(value),
                    "role" => role = Some(value),
                    "mode" => mode = Some(parse_mode(&value)?),
                    _ => session_id = Some(value),
                }
            }
            _ => {}
        }
    }

    let document =
        document.ok_or_else(|| AppError::Validation("No resume file uploaded".to_string()))?;

    Ok(AnalyzeRequest {
        document,
        industry: industry.unwrap_or_else(|| DEFAULT_INDUSTRY.to_string()),
        role: role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        mode: forced_mode
            .or(mode)
            .unwrap_or(AnalysisMode::Comprehensive),
        session_id,
    })
}

fn parse_mode(raw: &str) -> Result<AnalysisMode, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "fast" => Ok(AnalysisMode::Fast),
        "comprehensive" | "full" => Ok(AnalysisMode::Comprehensive),
        other => Err(AppError::Validation(format!(
            "Unknown analysis mode '{other}' (expected fast or comprehensive)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("FAST").unwrap(), AnalysisMode::Fast);
        assert_eq!(parse_mode("comprehensive").unwrap(), AnalysisMode::Comprehensive);
        assert!(matches!(parse_mode("turbo"), Err(AppError::Validation(_))));
    }
}
