//! Submit-and-poll behavior against a mock analysis service.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docindex_analysis::{
    AnalysisError, DocumentAnalysisClient, DocumentProcessor, DocumentSource, HttpAnalysisClient,
    HttpAnalysisConfig,
};

const KEY: &str = "di-key";
const ANALYZE_PATH: &str = "/documentintelligence/documentModels/prebuilt-layout:analyze";
const RESULT_PATH: &str = "/documentintelligence/documentModels/prebuilt-layout/analyzeResults/op-1";

fn client(server: &MockServer, max_poll: Duration) -> HttpAnalysisClient {
    let config = HttpAnalysisConfig::new(server.uri(), KEY)
        .with_polling(Duration::from_millis(10), max_poll);
    HttpAnalysisClient::new(config).unwrap()
}

async fn mount_submit(server: &MockServer) {
    let operation = format!("{}{}?api-version=2024-11-30", server.uri(), RESULT_PATH);
    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .and(query_param("api-version", "2024-11-30"))
        .and(header("Ocp-Apim-Subscription-Key", KEY))
        .respond_with(ResponseTemplate::new(202).insert_header("Operation-Location", operation))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, body: serde_json::Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(RESULT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

fn succeeded() -> serde_json::Value {
    json!({
        "status": "succeeded",
        "analyzeResult": {
            "modelId": "prebuilt-layout",
            "content": "Invoice\nTotal 10",
            "pages": [{
                "pageNumber": 1, "width": 8.5, "height": 11,
                "lines": [{"content": "Invoice"}, {"content": "Total 10"}]
            }],
            "tables": [{
                "rowCount": 1, "columnCount": 2,
                "cells": [
                    {"rowIndex": 0, "columnIndex": 0, "content": "Total"},
                    {"rowIndex": 0, "columnIndex": 1, "content": "10"}
                ],
                "boundingRegions": [{"pageNumber": 1, "polygon": []}]
            }]
        }
    })
}

#[tokio::test]
async fn test_polls_until_succeeded() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_status(&server, json!({"status": "running"}), Some(2)).await;
    mount_status(&server, succeeded(), None).await;

    let result = client(&server, Duration::from_secs(5))
        .analyze(
            "prebuilt-layout",
            &DocumentSource::Url("https://example.com/invoice.pdf".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(result.content.as_deref(), Some("Invoice\nTotal 10"));
    assert_eq!(result.pages.len(), 1);

    let requests = server.received_requests().await.unwrap();
    let polls = requests
        .iter()
        .filter(|r| r.url.path() == RESULT_PATH)
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn test_bytes_are_sent_base64() {
    let server = MockServer::start().await;
    let operation = format!("{}{}", server.uri(), RESULT_PATH);
    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .and(body_json(json!({"base64Source": "JVBERg=="})))
        .respond_with(ResponseTemplate::new(202).insert_header("Operation-Location", operation))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, succeeded(), None).await;

    let processor = DocumentProcessor::new(client(&server, Duration::from_secs(5)), "prebuilt-layout");
    let doc = processor
        .process(&DocumentSource::Bytes(b"%PDF".to_vec()))
        .await
        .unwrap();

    assert_eq!(doc.metadata.page_count, 1);
    assert_eq!(doc.pages[0].content, "Invoice\nTotal 10");
    assert_eq!(doc.tables()[0].cells, vec![vec!["Total", "10"]]);
    assert_eq!(doc.tables()[0].page_number, Some(1));
}

#[tokio::test]
async fn test_failed_job_surfaces_message() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_status(
        &server,
        json!({
            "status": "failed",
            "error": {"code": "InvalidContent", "message": "The file is corrupted"}
        }),
        None,
    )
    .await;

    let err = client(&server, Duration::from_secs(5))
        .analyze("prebuilt-layout", &DocumentSource::Url("u".to_string()))
        .await
        .unwrap_err();
    match err {
        AnalysisError::JobFailed(message) => {
            assert_eq!(message, "InvalidContent: The file is corrupted");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_gives_up_after_budget() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_status(&server, json!({"status": "running"}), None).await;

    let err = client(&server, Duration::from_millis(100))
        .analyze("prebuilt-layout", &DocumentSource::Url("u".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Timeout { .. }));
}

#[tokio::test]
async fn test_missing_operation_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(1))
        .analyze("prebuilt-layout", &DocumentSource::Url("u".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::MissingOperationLocation));
}

#[tokio::test]
async fn test_rejected_submit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ANALYZE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "401", "message": "Access denied due to invalid subscription key."}
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(1))
        .analyze("prebuilt-layout", &DocumentSource::Url("u".to_string()))
        .await
        .unwrap_err();
    match err {
        AnalysisError::Backend { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid subscription key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
