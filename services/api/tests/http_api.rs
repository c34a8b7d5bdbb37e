//! End-to-end tests of the HTTP surface, driven through the axum router with
//! the in-memory store and a canned text generator.

use api_lib::{
    adapters::MemoryStore,
    config::Config,
    web::{build_router, AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use research_assistant_core::{
    domain::Completion,
    ports::{PortResult, ReportGenerationService},
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BOUNDARY: &str = "research-test-boundary";

/// Returns a fixed completion and remembers what it was asked.
struct StubGenerator {
    total_tokens: Option<u32>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubGenerator {
    fn with_tokens(total_tokens: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            total_tokens,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ReportGenerationService for StubGenerator {
    async fn generate_report(&self, question: &str, context: &str) -> PortResult<Completion> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok(Completion {
            text: "Coffee is mostly fine. ".repeat(40),
            total_tokens: self.total_tokens,
        })
    }
}

fn test_config(max_upload_bytes: usize) -> Config {
    Config {
        max_upload_bytes,
        ..Config::from_lookup(|_| None).unwrap()
    }
}

fn app_with(generator: Option<Arc<StubGenerator>>, max_upload_bytes: usize) -> Router {
    let report_adapter = generator.map(|g| g as Arc<dyn ReportGenerationService>);
    build_router(Arc::new(AppState {
        store: Arc::new(MemoryStore::new()),
        config: Arc::new(test_config(max_upload_bytes)),
        report_adapter,
    }))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

enum Part<'a> {
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

async fn upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::post("/api/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app_with(None, 1024);
    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn usage_is_created_with_the_default_ceiling() {
    let app = app_with(None, 1024);
    let (status, body) = get(&app, "/api/usage?userId=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "alice");
    assert_eq!(body["totalQuestions"], 0);
    assert_eq!(body["totalCreditsUsed"], 0);
    assert_eq!(body["totalCreditsAvailable"], 100);

    let (_, anonymous) = get(&app, "/api/usage").await;
    assert_eq!(anonymous["userId"], "default");
}

#[tokio::test]
async fn text_upload_stores_decoded_content() {
    let app = app_with(None, 10 * 1024);
    let text = "x".repeat(500);
    let (status, body) = upload(
        &app,
        &[
            Part::File {
                filename: "a.txt",
                content_type: "text/plain",
                data: text.as_bytes(),
            },
            Part::Text {
                name: "userId",
                value: "alice",
            },
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let file = &body["files"][0];
    assert_eq!(file["name"], "a.txt");
    assert_eq!(file["size"], 500);
    assert_eq!(file["type"], "text/plain");
    assert_eq!(file["content"], text.as_str());
    assert_eq!(file["userId"], "alice");
}

#[tokio::test]
async fn binary_upload_stores_a_placeholder() {
    let app = app_with(None, 10 * 1024);
    let (status, body) = upload(
        &app,
        &[Part::File {
            filename: "scan.pdf",
            content_type: "application/pdf",
            data: &[0x25, 0x50, 0x44, 0x46, 0x00, 0xff],
        }],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["content"], "Binary file: scan.pdf (6 bytes)");
    assert_eq!(body["files"][0]["userId"], Value::Null);
}

#[tokio::test]
async fn empty_text_upload_has_no_content() {
    let app = app_with(None, 1024);
    let (status, body) = upload(
        &app,
        &[Part::File {
            filename: "empty.txt",
            content_type: "text/plain",
            data: b"",
        }],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["size"], 0);
    assert_eq!(body["files"][0]["content"], Value::Null);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = app_with(None, 1024);
    let data = vec![b'a'; 2048];
    let (status, body) = upload(
        &app,
        &[Part::File {
            filename: "big.txt",
            content_type: "text/plain",
            data: &data,
        }],
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("big.txt"));
}

#[tokio::test]
async fn upload_without_files_is_a_validation_error() {
    let app = app_with(None, 1024);
    let (status, body) = upload(
        &app,
        &[Part::Text {
            name: "userId",
            value: "alice",
        }],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request data");
    assert_eq!(body["details"], json!(["files: No files uploaded"]));
}

#[tokio::test]
async fn generate_validates_the_question() {
    let app = app_with(Some(StubGenerator::with_tokens(Some(100))), 1024);

    let (status, body) =
        post_json(&app, "/api/research/generate", json!({ "question": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(["question: Question is required"]));

    let (status, _) = post_json(&app, "/api/research/generate", json!({ "userId": 7 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_without_provider_is_unavailable() {
    let app = app_with(None, 1024);
    let (status, body) = post_json(
        &app,
        "/api/research/generate",
        json!({ "question": "Is coffee healthy?" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "OpenAI API key not configured");
}

#[tokio::test]
async fn generated_report_is_saved_cited_and_charged() {
    let generator = StubGenerator::with_tokens(Some(250));
    let app = app_with(Some(generator.clone()), 10 * 1024);

    let (_, uploaded) = upload(
        &app,
        &[
            Part::File {
                filename: "notes.txt",
                content_type: "text/plain",
                data: b"caffeine study results",
            },
            Part::Text {
                name: "userId",
                value: "alice",
            },
        ],
    )
    .await;
    let file_id = uploaded["files"][0]["id"].as_str().unwrap().to_string();

    let (status, report) = post_json(
        &app,
        "/api/research/generate",
        json!({ "question": "Is coffee healthy?", "userId": "alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["question"], "Is coffee healthy?");
    assert_eq!(report["creditsUsed"], 3);
    assert_eq!(report["userId"], "alice");
    assert_eq!(report["keyTakeaways"].as_array().unwrap().len(), 4);
    assert!(report["insights"].as_str().unwrap().ends_with("..."));

    let citations = report["citations"].as_array().unwrap();
    assert_eq!(citations.len(), 2);
    assert_eq!(citations[0]["id"], format!("{file_id}-0"));
    assert_eq!(citations[0]["title"], "notes.txt");
    assert_eq!(citations[0]["type"], "document");
    assert_eq!(citations[1]["id"], "live-data-1");
    assert_eq!(citations[1]["type"], "live-data");

    {
        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Is coffee healthy?");
        assert_eq!(
            calls[0].1,
            "Document: notes.txt\nContent: caffeine study results..."
        );
    }

    let (_, usage) = get(&app, "/api/usage?userId=alice").await;
    assert_eq!(usage["totalQuestions"], 1);
    assert_eq!(usage["totalReports"], 1);
    assert_eq!(usage["totalCreditsUsed"], 3);

    let id = report["id"].as_str().unwrap();
    let (status, fetched) = get(&app, &format!("/api/reports/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, report);
}

#[tokio::test]
async fn explicit_file_ids_limit_the_context() {
    let generator = StubGenerator::with_tokens(None);
    let app = app_with(Some(generator.clone()), 10 * 1024);

    let (_, first) = upload(
        &app,
        &[Part::File {
            filename: "first.txt",
            content_type: "text/plain",
            data: b"one",
        }],
    )
    .await;
    upload(
        &app,
        &[Part::File {
            filename: "second.txt",
            content_type: "text/plain",
            data: b"two",
        }],
    )
    .await;

    let first_id = first["files"][0]["id"].clone();
    let (status, report) = post_json(
        &app,
        "/api/research/generate",
        json!({ "question": "Compare", "fileIds": [first_id] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // No token usage reported: charged as 1000 tokens.
    assert_eq!(report["creditsUsed"], 10);
    assert_eq!(report["citations"].as_array().unwrap().len(), 2);
    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls[0].1, "Document: first.txt\nContent: one...");
}

#[tokio::test]
async fn over_quota_generation_is_refused_and_not_saved() {
    let app = app_with(Some(StubGenerator::with_tokens(Some(15_000))), 1024);

    let (status, body) = post_json(
        &app,
        "/api/research/generate",
        json!({ "question": "Summarize everything", "userId": "fresh" }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["needed"], 150);
    assert_eq!(body["remaining"], 100);

    let (_, usage) = get(&app, "/api/usage?userId=fresh").await;
    assert_eq!(usage["totalQuestions"], 0);
    assert_eq!(usage["totalReports"], 0);
    assert_eq!(usage["totalCreditsUsed"], 0);

    let (_, reports) = get(&app, "/api/reports?userId=fresh").await;
    assert_eq!(reports, json!([]));
}

#[tokio::test]
async fn unknown_reports_are_not_found() {
    let app = app_with(None, 1024);
    let (status, _) = get(&app, "/api/reports/6c1f1a52-3a0e-4b0a-9a55-0f5d3f6a1b2c").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/reports/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_listing_respects_user_and_limit() {
    let app = app_with(Some(StubGenerator::with_tokens(Some(100))), 1024);
    for user in ["alice", "alice", "alice", "bob"] {
        let (status, _) = post_json(
            &app,
            "/api/research/generate",
            json!({ "question": "Q", "userId": user }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, reports) = get(&app, "/api/reports?userId=alice&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r["userId"] == "alice"));

    let (_, everyone) = get(&app, "/api/reports").await;
    assert_eq!(everyone.as_array().unwrap().len(), 4);

    let (status, _) = get(&app, "/api/reports?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_combines_usage_reports_and_freshness() {
    let app = app_with(Some(StubGenerator::with_tokens(Some(100))), 1024);
    for _ in 0..6 {
        post_json(
            &app,
            "/api/research/generate",
            json!({ "question": "Q", "userId": "alice" }),
        )
        .await;
    }

    let (status, stats) = get(&app, "/api/dashboard/stats?userId=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalQuestions"], 6);
    assert_eq!(stats["totalReports"], 6);
    assert_eq!(stats["totalCreditsUsed"], 6);
    assert_eq!(stats["totalCreditsAvailable"], 100);
    assert_eq!(stats["recentReports"].as_array().unwrap().len(), 5);
    assert!(stats["recentReports"][0]["generatedAt"].is_string());

    let statuses: Vec<_> = stats["dataFreshness"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, ["fresh", "updating", "stale"]);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = app_with(None, 1024);
    let (status, doc) = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/research/generate"].is_object());
}
