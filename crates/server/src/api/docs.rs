//! OpenAPI document and Swagger UI

use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::server::AppState;

pub const API_TITLE: &str = "V&V Automation API";
pub const API_VERSION: &str = "v1";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs", get(swagger_ui_handler))
        .route("/docs/openapi.json", get(openapi_handler))
}

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>V&amp;V Automation API</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: "/docs/openapi.json", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##;

async fn swagger_ui_handler() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

async fn openapi_handler() -> Json<Value> {
    Json(openapi_document())
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", name) })
}

fn json_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn json_body(schema: Value) -> Value {
    json!({
        "required": true,
        "content": { "application/json": { "schema": schema } }
    })
}

fn array_of(name: &str) -> Value {
    json!({ "type": "array", "items": schema_ref(name) })
}

fn id_param(name: &str) -> Value {
    json!({ "name": name, "in": "path", "required": true, "schema": { "type": "integer" } })
}

fn query_param(name: &str) -> Value {
    json!({ "name": name, "in": "query", "required": false, "schema": { "type": "integer" } })
}

/// OpenAPI 3.0.3 description of every route
pub fn openapi_document() -> Value {
    let message = schema_ref("Message");
    let not_found = json_response("Not found", message.clone());
    let bad_request = json_response("Invalid request", message.clone());

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "version": API_VERSION,
            "description": "SRS intake, LLM test case and script generation, pytest/Playwright execution and reporting"
        },
        "paths": {
            "/": {
                "get": { "tags": ["Health"], "summary": "Health check",
                         "responses": { "200": json_response("Healthy", message.clone()) } }
            },
            "/api/srs": {
                "get": { "tags": ["SRS"], "summary": "List SRS documents",
                         "responses": { "200": json_response("SRS documents", array_of("SRS")) } },
                "post": { "tags": ["SRS"], "summary": "Create an SRS from JSON",
                          "requestBody": json_body(schema_ref("SRSCreate")),
                          "responses": { "201": json_response("Created", schema_ref("SRS")) } }
            },
            "/api/srs/{id}": {
                "parameters": [id_param("id")],
                "get": { "tags": ["SRS"], "summary": "Get an SRS",
                         "responses": { "200": json_response("SRS", schema_ref("SRS")), "404": not_found.clone() } },
                "delete": { "tags": ["SRS"], "summary": "Delete an SRS and everything generated from it",
                            "responses": { "204": { "description": "Deleted" }, "404": not_found.clone() } }
            },
            "/api/srs/upload": {
                "post": {
                    "tags": ["Upload"],
                    "summary": "Upload an SRS file (.txt, .md, .json, .csv, .xlsx, .xls)",
                    "requestBody": {
                        "required": true,
                        "content": { "multipart/form-data": { "schema": {
                            "type": "object",
                            "required": ["file"],
                            "properties": {
                                "file": { "type": "string", "format": "binary" },
                                "title": { "type": "string" },
                                "description": { "type": "string" }
                            }
                        } } }
                    },
                    "responses": { "201": json_response("Created", schema_ref("SRS")), "400": bad_request.clone() }
                }
            },
            "/api/testcases": {
                "get": { "tags": ["Test cases"], "summary": "List test cases",
                         "parameters": [query_param("srs_id")],
                         "responses": { "200": json_response("Test cases", array_of("TestCase")) } }
            },
            "/api/testcases/generate": {
                "post": { "tags": ["Test cases"], "summary": "Generate test cases for an SRS",
                          "requestBody": json_body(json!({
                              "type": "object", "required": ["id"],
                              "properties": { "id": { "type": "integer" } }
                          })),
                          "responses": { "200": json_response("Generated test cases", array_of("TestCase")), "404": not_found.clone() } }
            },
            "/api/scripts": {
                "get": { "tags": ["Scripts"], "summary": "List scripts",
                         "parameters": [query_param("test_case_id")],
                         "responses": { "200": json_response("Scripts", array_of("Script")) } }
            },
            "/api/scripts/generate": {
                "post": { "tags": ["Scripts"], "summary": "Generate a pytest/Playwright script for a test case",
                          "requestBody": json_body(json!({
                              "type": "object", "required": ["test_case_id"],
                              "properties": { "test_case_id": { "type": "integer" } }
                          })),
                          "responses": { "201": json_response("Created", schema_ref("Script")), "404": not_found.clone() } }
            },
            "/api/runs": {
                "get": { "tags": ["Runs"], "summary": "List runs, newest first",
                         "responses": { "200": json_response("Runs", array_of("Run")) } },
                "post": { "tags": ["Runs"], "summary": "Execute scripts with pytest",
                          "requestBody": json_body(schema_ref("RunCreate")),
                          "responses": {
                              "201": json_response("Finished run", schema_ref("Run")),
                              "400": bad_request.clone(),
                              "404": not_found.clone()
                          } }
            },
            "/api/runs/{id}": {
                "parameters": [id_param("id")],
                "get": { "tags": ["Runs"], "summary": "Get a run",
                         "responses": { "200": json_response("Run", schema_ref("Run")), "404": not_found.clone() } }
            },
            "/api/runs/{id}/results": {
                "parameters": [id_param("id")],
                "get": { "tags": ["Runs"], "summary": "Per-script results of a run",
                         "responses": { "200": json_response("Results", array_of("TestResult")) } }
            },
            "/api/runs/{id}/logs": {
                "parameters": [id_param("id")],
                "get": { "tags": ["Runs"], "summary": "Run log path and last 100 lines",
                         "responses": { "200": json_response("Log tail", schema_ref("RunLogs")), "404": not_found.clone() } }
            },
            "/api/reports/latest": {
                "get": { "tags": ["Reports"], "summary": "Summary of the latest run",
                         "responses": { "200": json_response("Summary", schema_ref("LatestReport")), "404": not_found } }
            }
        },
        "components": { "schemas": schemas() }
    })
}

fn schemas() -> Value {
    let int = json!({ "type": "integer" });
    let string = json!({ "type": "string" });
    let nullable_string = json!({ "type": "string", "nullable": true });
    let timestamp = json!({ "type": "string", "format": "date-time" });
    let nullable_timestamp = json!({ "type": "string", "format": "date-time", "nullable": true });

    json!({
        "Message": {
            "type": "object",
            "properties": { "message": string }
        },
        "SRSCreate": {
            "type": "object",
            "required": ["title"],
            "properties": { "title": string, "description": nullable_string, "content": nullable_string }
        },
        "SRS": {
            "type": "object",
            "properties": {
                "id": int, "title": string, "description": nullable_string, "content": nullable_string,
                "created_at": timestamp, "updated_at": timestamp
            }
        },
        "TestCase": {
            "type": "object",
            "properties": {
                "id": int, "srs_id": int, "name": string, "description": nullable_string,
                "priority": nullable_string, "tags": nullable_string,
                "created_at": timestamp, "updated_at": timestamp
            }
        },
        "Script": {
            "type": "object",
            "properties": {
                "id": int, "test_case_id": int, "language": string, "framework": string,
                "content": nullable_string, "file_path": nullable_string,
                "created_at": timestamp, "updated_at": timestamp
            }
        },
        "RunCreate": {
            "type": "object",
            "required": ["script_ids"],
            "properties": {
                "label": nullable_string,
                "script_ids": { "type": "array", "items": int },
                "triggered_by": { "type": "string", "default": "api" }
            }
        },
        "Run": {
            "type": "object",
            "properties": {
                "id": int, "label": nullable_string,
                "status": { "type": "string", "enum": ["pending", "running", "completed", "failed"] },
                "started_at": nullable_timestamp, "finished_at": nullable_timestamp,
                "triggered_by": nullable_string,
                "created_at": timestamp, "updated_at": timestamp
            }
        },
        "TestResult": {
            "type": "object",
            "properties": {
                "id": int, "run_id": int, "script_id": int,
                "outcome": { "type": "string", "enum": ["passed", "failed", "skipped", "error", "pending"] },
                "duration_ms": { "type": "integer", "nullable": true },
                "message": nullable_string, "artifacts_path": nullable_string,
                "created_at": timestamp, "updated_at": timestamp
            }
        },
        "RunLogs": {
            "type": "object",
            "properties": { "log_path": string, "tail": string }
        },
        "LatestReport": {
            "type": "object",
            "properties": {
                "run_id": int, "status": string, "passed": int, "failed": int,
                "skipped": int, "errors": int, "total": int
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_header() {
        let doc = openapi_document();
        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["info"]["title"], API_TITLE);
        assert_eq!(doc["info"]["version"], API_VERSION);
    }

    #[test]
    fn test_every_schema_reference_resolves() {
        let doc = openapi_document();
        let text = doc.to_string();
        for piece in text.split("#/components/schemas/").skip(1) {
            let name: String = piece.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
            assert!(
                doc["components"]["schemas"].get(&name).is_some(),
                "unresolved schema {}",
                name
            );
        }
    }
}
