//! Axum route handlers for the Report API.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, ReportError};
use crate::layout::assembler::{assemble, AssemblyInput, ReportArtifact};
use crate::layout::cancel::CancelToken;
use crate::layout::classifier::ContentBlock;
use crate::models::asset::{AssetPool, ImageAsset};
use crate::models::chapter::{Chapter, ReportRequest};
use crate::report::output::{validate_destination, write_atomic};
use crate::state::AppState;

const REPORT_ID_HEADER: HeaderName = HeaderName::from_static("x-report-id");
const PAGE_COUNT_HEADER: HeaderName = HeaderName::from_static("x-page-count");

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Serialize)]
pub struct ClassifiedChapter {
    pub index: u32,
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub chapters: Vec<ClassifiedChapter>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/reports
///
/// Multipart body: one `manifest` part holding a JSON `ReportRequest`, and any
/// number of `image` parts whose file name is the asset name. Responds with
/// the PDF itself; the report id and page count travel in headers.
pub async fn handle_create_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut manifest: Option<ReportRequest> = None;
    let mut pool = AssetPool::new();

    while let Some(field) = multipart.next_field().await? {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("manifest") => {
                let text = field.text().await?;
                let request = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("manifest is not valid: {e}")))?;
                manifest = Some(request);
            }
            Some("image") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation("image part is missing a file name".to_string())
                    })?;
                let bytes = field.bytes().await?;
                pool.insert(ImageAsset::new(name, bytes));
            }
            _ => {}
        }
    }

    let request =
        manifest.ok_or_else(|| AppError::Validation("manifest part is required".to_string()))?;
    if request.customer.name.trim().is_empty() {
        return Err(AppError::Validation("customer.name cannot be empty".to_string()));
    }
    if let Some(destination) = &request.destination {
        if state.config.output_dir.is_none() {
            return Err(ReportError::InvalidDestination(
                "this server has no output directory configured".to_string(),
            )
            .into());
        }
        validate_destination(destination)?;
    }

    info!(
        customer = %request.customer.name,
        chapters = request.chapters.len(),
        images = pool.len(),
        "Report requested"
    );

    let artifact = run_assembly(&state, request, pool).await?;

    let report_id = HeaderValue::from_str(&artifact.report.report_id.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("report id is not a header value: {e}")))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
        (REPORT_ID_HEADER, report_id),
        (PAGE_COUNT_HEADER, HeaderValue::from(artifact.page_count)),
    ];
    Ok((StatusCode::OK, headers, artifact.pdf).into_response())
}

/// Runs the CPU-bound assembly on the blocking pool. If this future is dropped
/// (client went away) the guard cancels the assembly at its next check.
async fn run_assembly(
    state: &AppState,
    request: ReportRequest,
    pool: AssetPool,
) -> Result<ReportArtifact, AppError> {
    let fonts = Arc::clone(&state.fonts);
    let default_layout = Arc::clone(&state.layout);
    let classifier = Arc::clone(&state.classifier);
    let output_dir = state.config.output_dir.clone();

    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();

    let task = tokio::task::spawn_blocking(move || {
        let layout = request
            .layout
            .clone()
            .unwrap_or_else(|| default_layout.as_ref().clone());
        let input = AssemblyInput {
            request: &request,
            pool: &pool,
            fonts: &fonts,
            layout: &layout,
            classifier: &classifier,
        };
        let artifact = assemble(&input, &cancel)?;

        if let (Some(dir), Some(name)) = (output_dir.as_deref(), request.destination.as_deref()) {
            write_atomic(dir, name, &artifact.pdf)?;
        }
        Ok::<_, ReportError>(artifact)
    });

    let artifact = task.await.map_err(|e| {
        AppError::Internal(anyhow::anyhow!("spawn_blocking failed in report assembly: {e}"))
    })??;
    guard.disarm();
    Ok(artifact)
}

/// POST /api/v1/reports/classify
///
/// Shows how each chapter's text will be split into blocks, without laying
/// anything out.
pub async fn handle_classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let mut chapters = request.chapters;
    chapters.sort_by_key(|c| c.index);

    let chapters = chapters
        .iter()
        .map(|chapter| ClassifiedChapter {
            index: chapter.index,
            blocks: state.classifier.classify(&chapter.raw_text),
        })
        .collect();

    Ok(Json(ClassifyResponse { chapters }))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::layout::classifier::Classifier;
    use crate::layout::fonts::FontSet;
    use crate::layout::page_config::default_layout_config;
    use crate::routes::build_router;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "report-test-boundary";

    fn state(config: Config) -> AppState {
        AppState {
            config,
            fonts: Arc::new(FontSet::builtin()),
            layout: Arc::new(default_layout_config()),
            classifier: Arc::new(Classifier::default()),
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::RgbImage::from_pixel(width, height, image::Rgb([1, 2, 3]))
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn multipart_body(manifest: Option<&Value>, images: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(manifest) = manifest {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"manifest\"\r\n\r\n{manifest}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, bytes) in images {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{name}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn report_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/reports")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn error_code(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        value["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(state(Config::default()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["service"], "report-api");
    }

    #[tokio::test]
    async fn test_create_report_returns_pdf() {
        let manifest = json!({
            "customer": {"name": "홍길동", "generated_on": "2024-03-01"},
            "chapters": [{"index": 1, "raw_text": "제1장 테스트\n본문입니다.\n{{IMG:05_오행분석}}"}]
        });
        let body = multipart_body(Some(&manifest), &[("05_오행분석.png", png(64, 48))]);

        let app = build_router(state(Config::default()));
        let response = app.oneshot(report_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        assert_eq!(response.headers().get("x-page-count").unwrap(), "4");
        assert!(response.headers().contains_key("x-report-id"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_rejected() {
        let body = multipart_body(None, &[("a.png", png(2, 2))]);
        let app = build_router(state(Config::default()));
        let response = app.oneshot(report_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_rejected() {
        let manifest = json!({"chapters": []});
        let body = multipart_body(Some(&manifest), &[]);
        let app = build_router(state(Config::default()));
        let response = app.oneshot(report_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_destination_requires_output_dir() {
        let manifest = json!({"customer": {"name": "Kim"}, "destination": "kim.pdf"});
        let body = multipart_body(Some(&manifest), &[]);
        let app = build_router(state(Config::default()));
        let response = app.oneshot(report_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_destination_written_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let manifest = json!({
            "customer": {"name": "Kim"},
            "chapters": [{"index": 1, "raw_text": "body"}],
            "destination": "kim.pdf"
        });
        let body = multipart_body(Some(&manifest), &[]);
        let app = build_router(state(config));
        let response = app.oneshot(report_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let written = std::fs::read(dir.path().join("kim.pdf")).unwrap();
        assert!(written.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_traversal_destination_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let manifest = json!({"customer": {"name": "Kim"}, "destination": "../escape.pdf"});
        let body = multipart_body(Some(&manifest), &[]);
        let app = build_router(state(config));
        let response = app.oneshot(report_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let app = build_router(state(Config::default()));
        let payload = json!({
            "chapters": [
                {"index": 2, "raw_text": "본문"},
                {"index": 1, "raw_text": "제1장 시작\n▶ 소제목\n{{IMG:표}}\n"}
            ]
        });
        let response = app
            .oneshot(
                Request::post("/api/v1/reports/classify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let first = &value["chapters"][0];
        assert_eq!(first["index"], 1);
        assert_eq!(first["blocks"][0]["type"], "chapter_title");
        assert_eq!(first["blocks"][1]["type"], "subtitle");
        assert_eq!(first["blocks"][2]["type"], "image_placeholder");
        assert_eq!(first["blocks"][2]["tag"], "표");
        assert_eq!(value["chapters"][1]["blocks"][0]["type"], "paragraph");
    }
}
