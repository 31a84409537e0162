//! End-to-end API tests against the in-process router

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use vv_common::VvConfig;
use vv_server::{app, AppState};

const BOUNDARY: &str = "vv-test-boundary";

struct TestApp {
    app: NormalizePath<Router>,
    dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_python_exit(0)
    }

    /// App whose interpreter is a shell stub exiting with `code`
    fn with_python_exit(code: i32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VvConfig::for_data_dir(dir.path().join("data"));
        config.execution.python = fake_python(dir.path(), code);
        config.execution.timeout_secs = 30;
        let state = Arc::new(AppState::new(config).unwrap());
        Self {
            app: app(state).unwrap(),
            dir,
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.raw(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    async fn upload(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/srs/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let (status, bytes) = self.raw(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// SRS -> two mock test cases -> one script each; returns script ids
    async fn seed_scripts(&self) -> Vec<i64> {
        let (_, srs) = self
            .post("/api/srs", json!({"title": "My App", "content": "Login must work"}))
            .await;
        let (_, cases) = self
            .post("/api/testcases/generate", json!({"id": srs["id"]}))
            .await;

        let mut ids = Vec::new();
        for case in cases.as_array().unwrap() {
            let (status, script) = self
                .post("/api/scripts/generate", json!({"test_case_id": case["id"]}))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(script["id"].as_i64().unwrap());
        }
        ids
    }
}

/// Shell stand-in for `python -m pytest`: logs its arguments, writes one
/// passing testcase per script into the junit file and exits with `code`.
fn fake_python(dir: &Path, code: i32) -> String {
    let path = dir.join("fake-python");
    let script = format!(
        r#"#!/bin/sh
out=""
cases=""
for arg in "$@"; do
  case "$arg" in
    --junitxml=*) out="${{arg#--junitxml=}}" ;;
    *.py)
      cls=$(echo "$arg" | sed -e 's#^/##' -e 's#\.py$##' -e 's#/#.#g')
      cases="$cases<testcase classname=\"$cls\" name=\"test_case\" time=\"0.25\"/>"
      ;;
  esac
done
echo "pytest args: $*"
if [ -n "$out" ]; then
  echo "<testsuites><testsuite>$cases</testsuite></testsuites>" > "$out"
fi
exit {code}
"#,
        code = code
    );
    std::fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path.to_string_lossy().to_string()
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    data: &'a [u8],
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// ============================================================================
// Health, docs, routing
// ============================================================================

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Healthy"}));
}

#[tokio::test]
async fn trailing_slash_is_tolerated() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/srs/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found");
}

#[tokio::test]
async fn docs_are_served() {
    let app = TestApp::new();

    let (status, html) = app
        .raw(Request::get("/docs").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(html).unwrap().contains("/docs/openapi.json"));

    let (status, doc) = app.get("/docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["openapi"], "3.0.3");
    assert_eq!(doc["info"]["title"], "V&V Automation API");
    assert_eq!(doc["info"]["version"], "v1");
    assert!(doc["paths"]["/api/runs/{id}/logs"].is_object());
}

// ============================================================================
// SRS
// ============================================================================

#[tokio::test]
async fn srs_lifecycle() {
    let app = TestApp::new();

    let (status, srs) = app
        .post(
            "/api/srs",
            json!({"title": "Checkout", "description": "cart flow", "content": "Users can pay"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srs["title"], "Checkout");
    assert_eq!(srs["content"], "Users can pay");
    let id = srs["id"].as_i64().unwrap();

    let (status, fetched) = app.get(&format!("/api/srs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["description"], "cart flow");

    let (_, list) = app.get("/api/srs").await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/srs/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/srs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found");
}

#[tokio::test]
async fn srs_requires_title() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/srs", json!({"content": "no title"})).await;
    assert!(status.is_client_error());
    assert!(body["message"].as_str().unwrap().contains("title"));

    let (status, body) = app.post("/api/srs", json!({"title": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "title must not be empty");
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn upload_csv_creates_normalized_srs() {
    let app = TestApp::new();
    let (status, srs) = app
        .upload(&[
            Part {
                name: "file",
                filename: Some("my reqs.csv"),
                data: b"id,requirement\n1,Login works\n2,Logout\n",
            },
            Part {
                name: "description",
                filename: None,
                data: b"from spreadsheet",
            },
        ])
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srs["title"], "my_reqs.csv");
    assert_eq!(srs["description"], "from spreadsheet");
    assert_eq!(
        srs["content"],
        "id | requirement\n--- | ---\n1 | Login works\n2 | Logout"
    );
    assert!(app.data_dir().join("uploads/my_reqs.csv").is_file());
}

#[tokio::test]
async fn upload_text_with_custom_title() {
    let app = TestApp::new();
    let (status, srs) = app
        .upload(&[
            Part {
                name: "title",
                filename: None,
                data: b"Portal SRS",
            },
            Part {
                name: "file",
                filename: Some("portal.md"),
                data: b"# Portal\nMust load fast",
            },
        ])
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srs["title"], "Portal SRS");
    assert_eq!(srs["content"], "# Portal\nMust load fast");
}

#[tokio::test]
async fn upload_validation_messages() {
    let app = TestApp::new();

    let (status, body) = app
        .upload(&[Part {
            name: "title",
            filename: None,
            data: b"only a title",
        }])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file part");

    let (status, body) = app
        .upload(&[Part {
            name: "file",
            filename: Some(""),
            data: b"",
        }])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No selected file");

    let (status, body) = app
        .upload(&[Part {
            name: "file",
            filename: Some("design.pdf"),
            data: b"%PDF",
        }])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported file type: .pdf");
}

#[tokio::test]
async fn upload_without_multipart_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/srs/upload", json!({"file": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file part");
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn generate_test_cases_is_idempotent() {
    let app = TestApp::new();
    let (_, srs) = app.post("/api/srs", json!({"title": "My App"})).await;

    let (status, cases) = app
        .post("/api/testcases/generate", json!({"id": srs["id"]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let cases = cases.as_array().unwrap().clone();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0]["name"], "Verify title presence: My App");
    assert_eq!(cases[0]["priority"], "P1");
    assert_eq!(cases[1]["name"], "Check login flow");
    assert_eq!(cases[1]["tags"], "auth,critical");

    let (_, again) = app
        .post("/api/testcases/generate", json!({"srs_id": srs["id"]}))
        .await;
    assert_eq!(again.as_array().unwrap()[0]["id"], cases[0]["id"]);

    let (_, listed) = app
        .get(&format!("/api/testcases?srs_id={}", srs["id"]))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (_, other) = app.get("/api/testcases?srs_id=999").await;
    assert_eq!(other, json!([]));
}

#[tokio::test]
async fn generate_test_cases_for_missing_srs() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/testcases/generate", json!({"id": 42})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "SRS not found");
}

#[tokio::test]
async fn generate_script_writes_file() {
    let app = TestApp::new();
    let (_, srs) = app.post("/api/srs", json!({"title": "My App"})).await;
    let (_, cases) = app
        .post("/api/testcases/generate", json!({"id": srs["id"]}))
        .await;
    let tc_id = cases[1]["id"].as_i64().unwrap();

    let (status, script) = app
        .post("/api/scripts/generate", json!({"test_case_id": tc_id}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(script["language"], "python");
    assert_eq!(script["framework"], "pytest-playwright");

    let path = PathBuf::from(script["file_path"].as_str().unwrap());
    assert!(path.ends_with(format!("scripts/tc_{}/test_check_login_flow.py", tc_id)));
    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert_eq!(on_disk, script["content"].as_str().unwrap());
    assert!(on_disk.contains("def test_check_login_flow"));

    let (_, listed) = app
        .get(&format!("/api/scripts?test_case_id={}", tc_id))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, body) = app
        .post("/api/scripts/generate", json!({"test_case_id": 9999}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "TestCase not found");
}

// ============================================================================
// Runs and reports
// ============================================================================

#[tokio::test]
async fn run_request_validation() {
    let app = TestApp::new();

    let (status, _) = app.post("/api/runs", json!({"script_ids": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/api/runs", json!({"script_ids": [404, 405]})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No scripts found");

    let (status, body) = app.get("/api/runs/77").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Run not found");

    let (status, body) = app.get("/api/runs/77/logs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Log not found");

    let (status, body) = app.get("/api/reports/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No runs");
}

#[cfg(unix)]
#[tokio::test]
async fn successful_run_records_results_and_report() {
    let app = TestApp::new();
    let ids = app.seed_scripts().await;

    let (status, run) = app
        .post(
            "/api/runs",
            json!({"label": "smoke", "script_ids": [ids[0], ids[1], ids[0], 9999]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(run["status"], "completed");
    assert_eq!(run["label"], "smoke");
    assert_eq!(run["triggered_by"], "api");
    assert!(run["finished_at"].is_string());
    let run_id = run["id"].as_i64().unwrap();

    let (_, results) = app.get(&format!("/api/runs/{}/results", run_id)).await;
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result["outcome"], "passed");
        assert_eq!(result["duration_ms"], 250);
        assert!(result["message"]
            .as_str()
            .unwrap()
            .starts_with("See junit: "));
        assert!(result["artifacts_path"]
            .as_str()
            .unwrap()
            .ends_with(&format!("run_{}/run.log", run_id)));
    }

    let (status, logs) = app.get(&format!("/api/runs/{}/logs", run_id)).await;
    assert_eq!(status, StatusCode::OK);
    let tail = logs["tail"].as_str().unwrap();
    assert!(tail.contains("pytest args: -m pytest -q --junitxml="));
    assert!(tail.contains("test_check_login_flow.py"));

    let (status, report) = app.get("/api/reports/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        report,
        json!({
            "run_id": run_id, "status": "completed",
            "passed": 2, "failed": 0, "skipped": 0, "errors": 0, "total": 2
        })
    );

    let (_, runs) = app.get("/api/runs").await;
    assert_eq!(runs.as_array().unwrap().len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn failing_pytest_marks_run_failed() {
    let app = TestApp::with_python_exit(1);
    let ids = app.seed_scripts().await;

    let (status, run) = app.post("/api/runs", json!({"script_ids": ids})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(run["status"], "failed");

    let (_, fetched) = app.get(&format!("/api/runs/{}", run["id"])).await;
    assert_eq!(fetched["status"], "failed");
}

#[tokio::test]
async fn missing_interpreter_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VvConfig::for_data_dir(dir.path().join("data"));
    config.execution.python = dir.path().join("no-such-python").to_string_lossy().to_string();
    let app = TestApp {
        app: app(Arc::new(AppState::new(config).unwrap())).unwrap(),
        dir,
    };
    let ids = app.seed_scripts().await;

    let (status, run) = app.post("/api/runs", json!({"script_ids": ids})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(run["status"], "failed");

    let (_, report) = app.get("/api/reports/latest").await;
    assert_eq!(report["errors"], 2);
    assert_eq!(report["total"], 2);
}
