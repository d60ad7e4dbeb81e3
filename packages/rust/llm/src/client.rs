//! Chat-completion transport for the OpenRouter API.

use async_trait::async_trait;
use hireflow_shared::{HireflowError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default timeout in seconds for completion requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Hireflow/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message in a role-tagged conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Conversation role tags, serialized the way the API expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Trait for the language-model collaborator.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a conversation and return the assistant's reply.
    ///
    /// Returns `None` on any transport or provider failure; the caller
    /// retries on a later tick.
    async fn complete(&self, messages: &[Message]) -> Option<String>;
}

// ---------------------------------------------------------------------------
// OpenRouterClient
// ---------------------------------------------------------------------------

/// Options for the OpenRouter client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout for completion requests in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Create a client for `base_url` (no trailing slash) using `model`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        opts: &ClientOptions,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| HireflowError::Llm(format!("client build: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    async fn try_complete(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| HireflowError::Llm(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(HireflowError::Llm(format!("{url}: HTTP {status}: {snippet}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| HireflowError::Llm(format!("{url}: invalid response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| HireflowError::Llm("completion contained no choices".into()))
    }
}

#[async_trait]
impl ChatClient for OpenRouterClient {
    async fn complete(&self, messages: &[Message]) -> Option<String> {
        match self.try_complete(messages).await {
            Ok(content) => {
                debug!(model = %self.model, chars = content.len(), "completion received");
                Some(content)
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "completion failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new(
            format!("{}/api/v1", server.uri()),
            "test/model",
            "sk-test",
            &ClientOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::system("hi")).unwrap();
        assert!(json.contains(r#""role":"system""#));
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }

    #[tokio::test]
    async fn complete_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test/model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "[1. Q?]"}}]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[Message::user("hello")])
            .await;
        assert_eq!(reply.as_deref(), Some("[1. Q?]"));
    }

    #[tokio::test]
    async fn complete_returns_none_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[Message::user("hello")])
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn complete_returns_none_on_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[Message::user("hello")])
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn complete_returns_none_on_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[Message::user("hello")])
            .await;
        assert!(reply.is_none());
    }
}
