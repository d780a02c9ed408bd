//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] around an
//! in-process [`FakeTranscoder`] and private temporary directories, so no
//! ffmpeg installation is needed. [`TestHarness::with_server`] starts Axum on
//! a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use cafconvert::server::{build_router, AppContext};
use cafconvert_av::{ToolRegistry, Transcoder};
use cafconvert_core::config::{BatchPolicy, Config};
use cafconvert_core::{Error, Result};
use tempfile::TempDir;

/// Prefix of the bytes every fake MP3 starts with.
pub const FAKE_MP3_HEADER: &[u8] = b"ID3";

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "cafconvert-test-boundary";

/// Converter stand-in driven by the content of the input file:
///
/// - content starting with `BROKEN` fails after writing a partial output
/// - content starting with `EMPTY` "succeeds" but writes an empty file
/// - anything else produces `ID3` followed by the input bytes
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    calls: AtomicUsize,
}

impl FakeTranscoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = tokio::fs::read(input).await?;

        if data.starts_with(b"BROKEN") {
            tokio::fs::write(output, b"partial").await?;
            return Err(Error::transcode(
                "Invalid data found when processing input",
            ));
        }
        if data.starts_with(b"EMPTY") {
            tokio::fs::write(output, b"").await?;
            return Ok(());
        }

        let mut mp3 = FAKE_MP3_HEADER.to_vec();
        mp3.extend_from_slice(&data);
        tokio::fs::write(output, mp3).await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub transcoder: Arc<FakeTranscoder>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    _root: TempDir,
}

impl TestHarness {
    /// Create a harness with the default (permissive) policy.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness with the given batch policy.
    pub fn with_policy(policy: BatchPolicy) -> Self {
        Self::with_config(|config| config.conversion.batch_policy = policy)
    }

    /// Create a harness, letting the caller adjust the configuration. The
    /// storage directories always point into a private temp dir.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let upload_dir = root.path().join("uploads");
        let output_dir = root.path().join("downloads");

        let mut config = Config::default();
        adjust(&mut config);
        config.storage.upload_dir = upload_dir.clone();
        config.storage.output_dir = output_dir.clone();

        let transcoder = Arc::new(FakeTranscoder::default());
        let ctx = AppContext::new(config, ToolRegistry::default(), transcoder.clone());

        Self {
            ctx,
            transcoder,
            upload_dir,
            output_dir,
            _root: root,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Whether the transient upload root holds nothing (or does not exist).
    pub fn upload_root_is_empty(&self) -> bool {
        dir_is_empty(&self.upload_dir)
    }

    /// Whether the deliverable directory holds nothing (or does not exist).
    pub fn output_dir_is_empty(&self) -> bool {
        dir_is_empty(&self.output_dir)
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

/// Build a `multipart/form-data` body. Each part is
/// `(field name, file name, content)`.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (field, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Names and contents of every entry in a zip archive.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("response is not a zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("unreadable zip entry");
            let mut data = Vec::new();
            file.read_to_end(&mut data).expect("unreadable zip entry");
            (file.name().to_string(), data)
        })
        .collect()
}
