//! HTTP-level tests for the ledger client against a mock server.

use mockito::Matcher;
use recal_core::clients::LedgerStore;
use recal_core::config::{EngineConfig, LedgerConfig};
use recal_core::RecordPatch;
use recal_ledger::LedgerClient;

fn client(server: &mockito::Server) -> LedgerClient {
    let ledger = LedgerConfig {
        base_url: server.url(),
        api_token: "test-token".to_string(),
    };
    LedgerClient::new(&ledger, &EngineConfig::default().without_delays()).unwrap()
}

#[tokio::test]
async fn test_fetch_unprocessed_filters_server_side() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/records")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("processed".into(), "false".into()),
            Matcher::UrlEncoded("calendarKey".into(), "crew-a".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "records": [
                    {"id": "rec1", "fields": {
                        "title": "Install",
                        "start": "2025-01-10T14:00:00Z",
                        "end": "2025-01-10T15:00:00Z",
                        "calendarKey": "crew-a"
                    }}
                ]
            }"#,
        )
        .create_async()
        .await;

    let records = client(&server)
        .fetch_unprocessed(Some("crew-a"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "rec1");
    assert!(!records[0].processed);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_all_follows_offset_pagination() {
    let mut server = mockito::Server::new_async().await;

    let page_one = server
        .mock("GET", "/records")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "records": [
                    {"id": "rec1", "fields": {
                        "title": "Install",
                        "start": "2025-01-10T14:00:00Z",
                        "end": "2025-01-10T15:00:00Z",
                        "calendarKey": "crew-a"
                    }}
                ],
                "offset": "page2"
            }"#,
        )
        .create_async()
        .await;

    let page_two = server
        .mock("GET", "/records")
        .match_query(Matcher::UrlEncoded("offset".into(), "page2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "records": [
                    {"id": "rec2", "fields": {
                        "title": "Repair",
                        "start": "2025-01-11T14:00:00Z",
                        "end": "2025-01-11T15:00:00Z",
                        "calendarKey": "crew-a",
                        "processed": true
                    }},
                    {"id": "rec3", "fields": {"title": "No dates"}}
                ]
            }"#,
        )
        .create_async()
        .await;

    let records = client(&server).fetch_all().await.unwrap();

    // rec3 has no instants and is dropped by the wire conversion
    let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["rec1", "rec2"]);
    assert!(records[1].processed);

    page_one.assert_async().await;
    page_two.assert_async().await;
}

#[tokio::test]
async fn test_update_record_patches_only_touched_fields() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PATCH", "/records/rec1")
        .match_body(Matcher::Json(serde_json::json!({
            "fields": { "processed": true, "googleEventId": "ev1" }
        })))
        .with_status(200)
        .with_body(r#"{"id": "rec1"}"#)
        .create_async()
        .await;

    client(&server)
        .update_record("rec1", &RecordPatch::synced("ev1"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_reset_patch_clears_event_id_with_explicit_null() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PATCH", "/records/rec1")
        .match_body(Matcher::Json(serde_json::json!({
            "fields": { "processed": false, "googleEventId": null }
        })))
        .with_status(200)
        .with_body(r#"{"id": "rec1"}"#)
        .create_async()
        .await;

    client(&server)
        .update_record("rec1", &RecordPatch::reset())
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_patch_sends_nothing() {
    let server = mockito::Server::new_async().await;
    // no mock registered: any request would fail the test
    client(&server)
        .update_record("rec1", &RecordPatch::default())
        .await
        .unwrap();
}
