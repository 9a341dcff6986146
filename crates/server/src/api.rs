use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use billscan_core::ExtractionConfig;
use billscan_ocr::{ExtractionResult, Extractor, PageInput};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared across requests. Extraction is stateless, so one extractor serves all.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self { extractor: Arc::new(Extractor::new(config)) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Kept in the response for clients that also talk to model-backed
/// extractors. Always zero here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExtractBillRequest {
    #[serde(default)]
    pub pages: Vec<PageInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractBillResponse {
    pub is_success: bool,
    pub token_usage: TokenUsage,
    pub data: Option<ExtractionResult>,
    pub error: Option<String>,
}

impl ExtractBillResponse {
    pub fn success(data: ExtractionResult) -> Self {
        Self { is_success: true, token_usage: TokenUsage::default(), data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            token_usage: TokenUsage::default(),
            data: None,
            error: Some(error.into()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/extract-bill-data", post(extract_bill_data))
        // Enforced by the JSON extractor so oversized bodies still get an envelope.
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %uuid::Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Bill Extraction API is running".to_string(),
    })
}

async fn extract_bill_data(
    State(state): State<AppState>,
    payload: Result<Json<ExtractBillRequest>, JsonRejection>,
) -> (StatusCode, Json<ExtractBillResponse>) {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!("Rejected request body: {}", rejection.body_text());
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            return (status, Json(ExtractBillResponse::failure(rejection.body_text())));
        }
    };

    match state.extractor.extract_document(&request.pages) {
        Ok(outcome) => {
            for report in outcome.reports.iter().filter(|r| !r.issues.is_empty()) {
                tracing::debug!("Page {}: {} rows skipped", report.page_no, report.issues.len());
            }
            tracing::info!(
                "Extracted {} items, total {}",
                outcome.result.total_item_count,
                outcome.result.reconciled_amount
            );
            (StatusCode::OK, Json(ExtractBillResponse::success(outcome.result)))
        }
        Err(e) => {
            tracing::warn!("Extraction failed: {e}");
            (StatusCode::OK, Json(ExtractBillResponse::failure(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::new(&ExtractionConfig::default()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::post("/extract-bill-data")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn fragment(text: &str, x: f64, confidence: f64) -> Value {
        json!({
            "text": text,
            "box": {"x": x, "y": 100.0, "w": 40.0, "h": 12.0},
            "confidence": confidence,
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "message": "Bill Extraction API is running"}));
    }

    #[tokio::test]
    async fn extracts_consultation_row() {
        let request = json!({
            "pages": [{
                "page_no": "1",
                "fragments": [
                    fragment("Consultation Fee", 0.0, 0.95),
                    fragment("1", 180.0, 0.99),
                    fragment("500.00", 240.0, 0.97),
                    fragment("500.00", 300.0, 0.98),
                ],
            }]
        });
        let (status, body) = send(post_json(request.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_success"], json!(true));
        assert_eq!(body["error"], Value::Null);
        assert_eq!(
            body["token_usage"],
            json!({"total_tokens": 0, "input_tokens": 0, "output_tokens": 0})
        );
        assert_eq!(
            body["data"],
            json!({
                "pagewise_line_items": [{
                    "page_no": "1",
                    "page_type": "Bill Detail",
                    "bill_items": [{
                        "item_name": "Consultation Fee",
                        "item_amount": 500.0,
                        "item_rate": 500.0,
                        "item_quantity": 1.0,
                        "confidence": 0.95,
                    }],
                }],
                "total_item_count": 1,
                "reconciled_amount": 500.0,
            })
        );
    }

    #[tokio::test]
    async fn empty_document_is_one_empty_page() {
        let (status, body) = send(post_json(r#"{"pages":[]}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagewise_line_items"][0]["bill_items"], json!([]));
        assert_eq!(body["data"]["total_item_count"], json!(0));
    }

    #[tokio::test]
    async fn malformed_json_gets_failure_envelope() {
        let (status, body) = send(post_json("{not json")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["is_success"], json!(false));
        assert_eq!(body["data"], Value::Null);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn invalid_fragment_gets_failure_envelope() {
        let request = json!({"pages": [{"fragments": [fragment("Gauze", 0.0, 1.5)]}]});
        let (status, body) = send(post_json(request.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_success"], json!(false));
        assert_eq!(
            body["error"],
            json!("page 1: fragment 0 is malformed: confidence 1.5 is outside [0, 1]")
        );
    }

    #[tokio::test]
    async fn oversized_body_gets_failure_envelope() {
        let (status, body) = send(post_json(vec![b' '; MAX_BODY_BYTES + 1])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["is_success"], json!(false));
        assert_eq!(body["data"], Value::Null);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app()
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
