//! Server end-to-end tests
//!
//! Runs the router on a real socket and talks to it with reqwest.

mod common;

use std::time::Duration;

use common::{zip_entries, TestHarness, FAKE_MP3_HEADER};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

fn file_part(name: &str, content: &'static [u8]) -> Part {
    Part::bytes(content).file_name(name.to_string())
}

/// Wait for a path to disappear; removal happens once the server drops the
/// response body, which may trail the client finishing its read.
async fn wait_until_gone(path: &std::path::Path) -> bool {
    for _ in 0..50 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !path.exists()
}

#[tokio::test]
async fn test_server_health() {
    let (_harness, addr) = TestHarness::with_server().await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_server_single_file_download() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let form = Form::new().part("files[]", file_part("voice memo.caf", b"recording"));
    let response = client
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"voice_memo.mp3\""
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body = response.bytes().await.unwrap();
    assert!(body.starts_with(FAKE_MP3_HEADER));

    assert!(wait_until_gone(&harness.output_dir.join("voice_memo.mp3")).await);
    assert!(harness.upload_root_is_empty());
}

#[tokio::test]
async fn test_server_batch_download() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .part("files[]", file_part("a.caf", b"alpha"))
        .part("files[]", file_part("b.txt", b"not audio"))
        .part("files[]", file_part("c.caf", b"BROKEN"))
        .part("files[]", file_part("a.caf", b"again"));
    let response = client
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");

    let entries = zip_entries(&response.bytes().await.unwrap());
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a.mp3", "a_1.mp3"]);
    assert!(entries[1].1.ends_with(b"again"));

    assert!(harness.upload_root_is_empty());
    assert!(harness.output_dir_is_empty());
}

#[tokio::test]
async fn test_server_concurrent_same_name_batches() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let requests = (0..4).map(|_| {
        let client = client.clone();
        async move {
            let form = Form::new()
                .part("files[]", file_part("take.caf", b"one"))
                .part("files[]", file_part("take2.caf", b"two"));
            let response = client
                .post(format!("http://{addr}/convert"))
                .multipart(form)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            zip_entries(&response.bytes().await.unwrap()).len()
        }
    });

    let counts = futures::future::join_all(requests).await;
    assert!(counts.iter().all(|&n| n == 2));
    assert!(harness.upload_root_is_empty());
}

#[tokio::test]
async fn test_server_rejects_wrong_extension() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let form = Form::new().part("files[]", file_part("song.wav", b"RIFF"));
    let response = client
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["code"], "ineligible_input");
    assert!(harness.upload_root_is_empty());
}
