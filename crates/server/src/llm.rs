//! LLM providers for test case and script generation
//!
//! The mock provider is the default and returns canned, deterministic output
//! suitable for tests. An OpenAI-compatible provider is used when explicitly
//! configured with an API key; anything else gets placeholder output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use vv_common::{Error, LlmConfig, Result, TestCaseDraft};

use crate::scripts::slugify;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Structured test cases for an SRS
    async fn generate_test_cases(&self, srs_title: &str, srs_content: &str)
        -> Result<Vec<TestCaseDraft>>;

    /// pytest + Playwright module source for one test case
    async fn generate_script(&self, test_case: &TestCaseDraft) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

/// Pick the provider described by the configuration
pub fn select_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    let provider: Arc<dyn LlmProvider> = if config.mock || config.provider == "mock" {
        Arc::new(MockProvider)
    } else if config.provider == "openai" {
        match &config.api_key {
            Some(key) => Arc::new(OpenAiProvider::new(
                key.clone(),
                config.base_url.clone(),
                config.model.clone(),
            )),
            None => {
                warn!("LLM_PROVIDER=openai without LLM_API_KEY; using placeholder output");
                Arc::new(PlaceholderProvider)
            }
        }
    } else {
        warn!("Unknown LLM provider '{}'; using placeholder output", config.provider);
        Arc::new(PlaceholderProvider)
    };
    info!("LLM provider: {}", provider.provider_name());
    provider
}

// ============================================================================
// Mock
// ============================================================================

/// Deterministic canned output
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

#[async_trait]
impl LlmProvider for MockProvider {
    async fn generate_test_cases(
        &self,
        srs_title: &str,
        _srs_content: &str,
    ) -> Result<Vec<TestCaseDraft>> {
        Ok(vec![
            TestCaseDraft {
                name: format!("Verify title presence: {}", srs_title),
                description: Some(
                    "Ensure the application displays the correct title on the homepage."
                        .to_string(),
                ),
                priority: Some("P1".to_string()),
                tags: Some("ui,smoke".to_string()),
            },
            TestCaseDraft {
                name: "Check login flow".to_string(),
                description: Some(
                    "User can login with valid credentials and reach dashboard.".to_string(),
                ),
                priority: Some("P0".to_string()),
                tags: Some("auth,critical".to_string()),
            },
        ])
    }

    async fn generate_script(&self, test_case: &TestCaseDraft) -> Result<String> {
        Ok(format!(
            r#"import pytest
from playwright.sync_api import sync_playwright


@pytest.mark.parametrize("url", ["https://example.com"])
def test_{slug}(url):
    with sync_playwright() as p:
        browser = p.chromium.launch()
        page = browser.new_page()
        page.goto(url)
        assert page.title() is not None
        browser.close()
"#,
            slug = slugify(&test_case.name)
        ))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Placeholder
// ============================================================================

/// Output used when no real provider is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProvider;

#[async_trait]
impl LlmProvider for PlaceholderProvider {
    async fn generate_test_cases(
        &self,
        _srs_title: &str,
        _srs_content: &str,
    ) -> Result<Vec<TestCaseDraft>> {
        Ok(vec![TestCaseDraft {
            name: "Sample LLM Case".to_string(),
            description: Some("LLM provider not configured; returning placeholder.".to_string()),
            priority: Some("P2".to_string()),
            tags: Some("placeholder".to_string()),
        }])
    }

    async fn generate_script(&self, test_case: &TestCaseDraft) -> Result<String> {
        let name = if test_case.name.is_empty() {
            "Unnamed"
        } else {
            test_case.name.as_str()
        };
        Ok(format!("# Placeholder script for: {}\n", name))
    }

    fn provider_name(&self) -> &'static str {
        "placeholder"
    }
}

// ============================================================================
// OpenAI-compatible chat completions
// ============================================================================

const TEST_CASE_SYSTEM_PROMPT: &str = "You are a QA engineer. Read the software requirements \
specification and answer with ONLY a JSON array of test cases. Each element has the keys \
\"name\" (short, unique), \"description\", \"priority\" (P0-P3) and \"tags\" (comma-separated).";

const SCRIPT_SYSTEM_PROMPT: &str = "You write Python UI tests with pytest and Playwright's sync \
API. Answer with ONLY the source of one pytest module; every test function name starts with \
test_.";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        debug!("POST {} (model {})", url, self.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("{} returned {}: {}", url, status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("invalid completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("completion contained no content".to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_test_cases(
        &self,
        srs_title: &str,
        srs_content: &str,
    ) -> Result<Vec<TestCaseDraft>> {
        let prompt = format!("Title: {}\n\n{}", srs_title, srs_content);
        let reply = self.complete(TEST_CASE_SYSTEM_PROMPT, &prompt).await?;
        parse_test_cases(&reply)
    }

    async fn generate_script(&self, test_case: &TestCaseDraft) -> Result<String> {
        let prompt = format!(
            "Test case: {}\nDescription: {}\nPriority: {}\nTags: {}",
            test_case.name,
            test_case.description.as_deref().unwrap_or(""),
            test_case.priority.as_deref().unwrap_or(""),
            test_case.tags.as_deref().unwrap_or(""),
        );
        let reply = self.complete(SCRIPT_SYSTEM_PROMPT, &prompt).await?;
        let mut script = strip_code_fence(&reply).to_string();
        if !script.ends_with('\n') {
            script.push('\n');
        }
        Ok(script)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Body of a fenced code block, or the trimmed text when there is none
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (```json, ```python)
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a model reply into test case drafts.
///
/// Accepts a bare JSON array or an object wrapping it under `test_cases`;
/// `tags` may be a string or a list of strings. Entries without a name are
/// dropped.
pub fn parse_test_cases(reply: &str) -> Result<Vec<TestCaseDraft>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| Error::Llm(format!("reply is not JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("test_cases") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Err(Error::Llm("reply has no test_cases array".to_string())),
        },
        _ => return Err(Error::Llm("reply is not a JSON array".to_string())),
    };

    let text = |v: Option<&serde_json::Value>| -> Option<String> {
        match v? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Array(parts) => {
                let joined = parts
                    .iter()
                    .filter_map(|p| p.as_str())
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(",");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            _ => None,
        }
    };

    let drafts: Vec<TestCaseDraft> = items
        .iter()
        .filter_map(|item| {
            let name = text(item.get("name"))?;
            Some(TestCaseDraft {
                name,
                description: text(item.get("description")),
                priority: text(item.get("priority")),
                tags: text(item.get("tags")),
            })
        })
        .collect();

    if drafts.is_empty() {
        return Err(Error::Llm("reply contained no usable test cases".to_string()));
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, mock: bool, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            mock,
            api_key: key.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_selection() {
        assert_eq!(select_provider(&config("mock", false, None)).provider_name(), "mock");
        assert_eq!(
            select_provider(&config("openai", true, Some("k"))).provider_name(),
            "mock"
        );
        assert_eq!(
            select_provider(&config("openai", false, Some("k"))).provider_name(),
            "openai"
        );
        assert_eq!(
            select_provider(&config("openai", false, None)).provider_name(),
            "placeholder"
        );
        assert_eq!(
            select_provider(&config("anthropic", false, Some("k"))).provider_name(),
            "placeholder"
        );
    }

    #[tokio::test]
    async fn test_mock_cases_are_deterministic() {
        let first = MockProvider.generate_test_cases("Shop", "anything").await.unwrap();
        let second = MockProvider.generate_test_cases("Shop", "other").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "Verify title presence: Shop");
        assert_eq!(first[0].priority.as_deref(), Some("P1"));
        assert_eq!(first[1].name, "Check login flow");
        assert_eq!(first[1].tags.as_deref(), Some("auth,critical"));
    }

    #[tokio::test]
    async fn test_mock_script_uses_slug() {
        let draft = TestCaseDraft {
            name: "Verify title presence: Shop".to_string(),
            ..Default::default()
        };
        let script = MockProvider.generate_script(&draft).await.unwrap();
        assert!(script.contains("def test_verify_title_presence_shop(url):"));
        assert!(script.contains("from playwright.sync_api import sync_playwright"));
        assert!(script.contains("\"https://example.com\""));
    }

    #[tokio::test]
    async fn test_placeholder_output() {
        let cases = PlaceholderProvider.generate_test_cases("t", "c").await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "Sample LLM Case");

        let script = PlaceholderProvider
            .generate_script(&TestCaseDraft::default())
            .await
            .unwrap();
        assert_eq!(script, "# Placeholder script for: Unnamed\n");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  plain  "), "plain");
        assert_eq!(strip_code_fence("```\nimport pytest\n```\n"), "import pytest");
    }

    #[test]
    fn test_parse_test_cases() {
        let reply = r#"```json
[
  {"name": "Add to cart", "description": "Item appears", "priority": "P1", "tags": ["cart", "ui"]},
  {"description": "nameless"},
  {"name": "Remove item", "tags": "cart"}
]
```"#;
        let drafts = parse_test_cases(reply).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].tags.as_deref(), Some("cart,ui"));
        assert_eq!(drafts[1].name, "Remove item");
        assert!(drafts[1].priority.is_none());
    }

    #[test]
    fn test_parse_wrapped_and_invalid() {
        let wrapped = r#"{"test_cases": [{"name": "A"}]}"#;
        assert_eq!(parse_test_cases(wrapped).unwrap()[0].name, "A");
        assert!(parse_test_cases("not json").is_err());
        assert!(parse_test_cases("[]").is_err());
        assert!(parse_test_cases(r#"{"cases": []}"#).is_err());
    }

    mod chat_completions {
        use super::super::*;
        use crate::error::ApiError;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::{json, Value};

        async fn ok_handler(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer sk-test");
            if !authorized || body["model"] != "gpt-test" || body["messages"][0]["role"] != "system" {
                return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad request"})));
            }
            let reply = "```json\n[{\"name\": \"Login works\", \"priority\": \"P0\", \"tags\": [\"auth\"]}]\n```";
            (
                StatusCode::OK,
                Json(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]})),
            )
        }

        async fn down_handler() -> (StatusCode, &'static str) {
            (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
        }

        async fn empty_handler() -> Json<Value> {
            Json(json!({"choices": []}))
        }

        /// Serves three fake endpoints on an ephemeral port; returns the base URL
        async fn spawn_stub() -> String {
            let app = Router::new()
                .route("/ok/chat/completions", post(ok_handler))
                .route("/down/chat/completions", post(down_handler))
                .route("/empty/chat/completions", post(empty_handler));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        fn provider(base_url: String) -> OpenAiProvider {
            OpenAiProvider::new("sk-test".to_string(), base_url, "gpt-test".to_string())
        }

        #[tokio::test]
        async fn test_successful_completion() {
            let base = spawn_stub().await;
            let drafts = provider(format!("{}/ok/", base))
                .generate_test_cases("Shop", "Users log in")
                .await
                .unwrap();
            assert_eq!(drafts.len(), 1);
            assert_eq!(drafts[0].name, "Login works");
            assert_eq!(drafts[0].priority.as_deref(), Some("P0"));
            assert_eq!(drafts[0].tags.as_deref(), Some("auth"));
        }

        #[tokio::test]
        async fn test_error_status_is_bad_gateway() {
            let base = spawn_stub().await;
            let err = provider(format!("{}/down", base))
                .generate_test_cases("Shop", "Users log in")
                .await
                .unwrap_err();
            match &err {
                Error::Llm(message) => {
                    assert!(message.contains("503"), "{}", message);
                    assert!(message.contains("overloaded"), "{}", message);
                }
                other => panic!("expected Llm error, got {:?}", other),
            }
            assert_eq!(ApiError::from(err).status, StatusCode::BAD_GATEWAY);
        }

        #[tokio::test]
        async fn test_empty_choices() {
            let base = spawn_stub().await;
            let err = provider(format!("{}/empty", base))
                .generate_script(&TestCaseDraft::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Llm(ref m) if m == "completion contained no content"));
        }
    }
}
