//! Coverage for the curl transport against a stub executable.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use osmload_core::OnDuplicate;
use osmload_data::transport::{
    CurlTransport, CurlTransportConfig, StoreEndpoint, UploadOptions, UploadTransport,
    encode_ldjson,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

mod support;

use support::named_point;

/// A directory holding a stub `curl` and the files it records.
struct StubCurl {
    dir: TempDir,
}

impl StubCurl {
    fn install(&self, body: &str) -> PathBuf {
        let program = self.dir.path().join("curl");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{args}'\ncat > '{stdin}'\n{body}\n",
            args = self.args_path().display(),
            stdin = self.stdin_path().display(),
        );
        fs::write(&program, script).expect("write stub script");
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755))
            .expect("mark stub executable");
        program
    }

    fn args_path(&self) -> PathBuf {
        self.dir.path().join("args")
    }

    fn stdin_path(&self) -> PathBuf {
        self.dir.path().join("stdin")
    }

    fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_path())
            .expect("stub recorded its arguments")
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

#[fixture]
fn stub() -> StubCurl {
    StubCurl {
        dir: TempDir::new().expect("failed to create temporary directory"),
    }
}

fn transport(program: &Path) -> CurlTransport {
    let endpoint = StoreEndpoint::new("http://db.example:8529")
        .with_database("osm")
        .with_credentials("root", "secret");
    CurlTransport::new(
        endpoint,
        CurlTransportConfig::default()
            .with_program(program.display().to_string())
            .with_extra_args(["--max-time", "60"]),
    )
}

#[rstest]
#[tokio::test]
async fn pipes_the_body_and_parses_the_trailer(stub: StubCurl) {
    let program = stub.install(r#"printf '{"created":2,"errors":0,"empty":0}\n201'"#);
    let documents = [named_point("node_1", "a"), named_point("node_2", "b")];
    let options = UploadOptions {
        on_duplicate: Some(OnDuplicate::Ignore),
    };

    let result = transport(&program)
        .upload_batch("features", &documents, &options)
        .await
        .expect("upload succeeds");
    assert_eq!(result.created, 2);

    let body = encode_ldjson(&documents).expect("encode documents");
    let content_length = format!("content-length: {}", body.len());
    assert_eq!(fs::read(stub.stdin_path()).expect("stub recorded stdin"), body);
    assert_eq!(
        stub.recorded_args(),
        [
            "-sS",
            "-X",
            "POST",
            "http://db.example:8529/_db/osm/_api/import?collection=features&type=documents&onDuplicate=ignore",
            "-H",
            "authorization: Basic cm9vdDpzZWNyZXQ=",
            "-H",
            "accept: application/json",
            "-H",
            "content-type: application/x-ldjson",
            "-H",
            content_length.as_str(),
            "--data-binary",
            "@-",
            "-w",
            "\\n%{http_code}",
            "--max-time",
            "60",
        ]
    );
}

#[rstest]
#[tokio::test]
async fn error_status_uses_the_store_message(stub: StubCurl) {
    let program = stub.install(
        r#"printf '{"error":true,"errorNum":1203,"errorMessage":"collection or view not found"}\n404'"#,
    );
    let err = transport(&program)
        .upload_batch("missing", &[named_point("node_1", "a")], &UploadOptions::default())
        .await
        .expect_err("store rejects the request");
    assert_eq!(err.status, 404);
    assert_eq!(err.provider_code, Some(1203));
    assert_eq!(err.message, "collection or view not found");
}

#[rstest]
#[tokio::test]
async fn failed_exit_reports_stderr(stub: StubCurl) {
    let program = stub.install("echo 'curl: (7) Failed to connect' >&2\nexit 7");
    let err = transport(&program)
        .upload_batch("features", &[named_point("node_1", "a")], &UploadOptions::default())
        .await
        .expect_err("curl failed");
    assert_eq!(err.status, 0);
    assert!(err.message.contains("Failed to connect"), "{err}");
}

#[rstest]
#[tokio::test]
async fn missing_trailer_is_an_error(stub: StubCurl) {
    let program = stub.install("printf 'garbage'");
    let err = transport(&program)
        .upload_batch("features", &[named_point("node_1", "a")], &UploadOptions::default())
        .await
        .expect_err("no status line");
    assert_eq!(err.status, 0);
}

#[rstest]
#[tokio::test]
async fn missing_program_is_an_error(stub: StubCurl) {
    let program = stub.dir.path().join("no-such-curl");
    let err = transport(&program)
        .upload_batch("features", &[named_point("node_1", "a")], &UploadOptions::default())
        .await
        .expect_err("program absent");
    assert_eq!(err.status, 0);
    assert!(err.message.contains("failed to start"), "{err}");
}
