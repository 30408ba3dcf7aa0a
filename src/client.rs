//! Completion client.
//!
//! One blocking HTTP call per [`CompletionClient::complete`]; nothing is
//! retried, streamed or cached.

use crate::config::Config;
use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument};

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const ORGANIZATION_VAR: &str = "OPENAI_ORGANIZATION";
const PROJECT_VAR: &str = "OPENAI_PROJECT";
const QUOTA_ERROR_CODE: &str = "insufficient_quota";

/// Anything that turns a prompt into a completion.
pub trait CompletionClient {
    /// Sends `prompt` and returns the generated text.
    ///
    /// # Errors
    ///
    /// Returns a provider error (authentication, network, rate limit, quota,
    /// API or malformed response).
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: CompletionClient + ?Sized> CompletionClient for &T {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

impl<T: CompletionClient + ?Sized> CompletionClient for Box<T> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// Provider model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Creates a model identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as sent to the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self(DEFAULT_MODEL.to_string())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Provider credentials.
///
/// The API key is a [`SecretString`]; it is only exposed when building the
/// `Authorization` header and is redacted from `Debug` output.
#[derive(Debug, Default)]
pub struct Credentials {
    /// API key
    pub api_key: Option<SecretString>,
    /// Organization id, sent as `OpenAI-Organization`
    pub organization: Option<String>,
    /// Project id, sent as `OpenAI-Project`
    pub project: Option<String>,
}

impl Credentials {
    /// Reads credentials from `OPENAI_API_KEY`, `OPENAI_ORGANIZATION` and
    /// `OPENAI_PROJECT`. Empty variables count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var(API_KEY_VAR).map(SecretString::from),
            organization: non_empty_var(ORGANIZATION_VAR),
            project: non_empty_var(PROJECT_VAR),
        }
    }

    /// Credentials with only an API key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(SecretString::from(api_key.into())),
            ..Self::default()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    credentials: Credentials,
    api_base: String,
    model: ModelId,
    temperature: f32,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Creates a client for the configured model and endpoint.
    ///
    /// `OPENAI_BASE_URL`, when set, overrides the configured API base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be initialised.
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("failed to create HTTP client: {e}")))?;

        let api_base = non_empty_var("OPENAI_BASE_URL").unwrap_or_else(|| config.api_base.clone());

        Ok(Self {
            http,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Creates a client using credentials from the environment.
    ///
    /// A missing API key is not an error here; it is reported by the first
    /// call to [`CompletionClient::complete`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be initialised.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::new(config, Credentials::from_env())
    }

    /// Model used for completions.
    #[must_use]
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.credentials.api_key.as_ref().ok_or_else(|| {
            Error::authentication(format!("{API_KEY_VAR} is not set"))
        })?;

        let body = ChatRequest {
            model: self.model.as_str(),
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut request = self
            .http
            .post(self.url())
            .bearer_auth(api_key.expose_secret())
            .json(&body);

        if let Some(ref organization) = self.credentials.organization {
            request = request.header("OpenAI-Organization", organization);
        }
        if let Some(ref project) = self.credentials.project {
            request = request.header("OpenAI-Project", project);
        }

        info!("Sending prompt to {}", self.model);
        let response = request
            .send()
            .map_err(|e| Error::network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::network(format!("failed to read response body: {e}")))?;

        debug!("Provider answered HTTP {} ({} bytes)", status.as_u16(), text.len());

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }

        extract_completion(&text)
    }
}

/// Maps a non-success HTTP status and body to an error.
fn classify_failure(status: u16, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    let is_quota = parsed.as_ref().is_some_and(|e| {
        e.error.code.as_deref() == Some(QUOTA_ERROR_CODE)
            || e.error.kind.as_deref() == Some(QUOTA_ERROR_CODE)
    });

    match status {
        401 | 403 => Error::Authentication { message },
        429 if is_quota => Error::Quota { message },
        429 => Error::RateLimit { message },
        _ => Error::Api { status, message },
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions body.
fn extract_completion(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::malformed("response has no choices"))?
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| Error::malformed("first choice has no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Two sentences."}, "finish_reason": "stop"}
            ]
        }"#;

        assert_eq!(extract_completion(body).unwrap(), "Two sentences.");
    }

    #[test]
    fn test_extract_completion_without_choices() {
        let err = extract_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));

        let err = extract_completion(r#"{"object": "chat.completion"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn test_extract_completion_null_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;

        let err = extract_completion(body).unwrap_err();
        assert!(err.to_string().contains("no message content"));
    }

    #[test]
    fn test_extract_completion_not_json() {
        let err = extract_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn test_classify_authentication() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}}"#;

        let err = classify_failure(401, body);
        assert!(matches!(err, Error::Authentication { ref message } if message == "Incorrect API key provided"));
    }

    #[test]
    fn test_classify_quota_vs_rate_limit() {
        let quota = r#"{"error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}}"#;
        let rate = r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#;

        assert!(matches!(classify_failure(429, quota), Error::Quota { .. }));
        assert!(matches!(classify_failure(429, rate), Error::RateLimit { .. }));
    }

    #[test]
    fn test_classify_other_status_keeps_raw_body() {
        let err = classify_failure(502, "upstream unavailable\n");

        assert!(matches!(
            err,
            Error::Api { status: 502, ref message } if message == "upstream unavailable"
        ));
    }

    #[test]
    fn test_missing_api_key_fails_before_request() {
        let config = Config::builder()
            .api_base("http://127.0.0.1:9")
            .build()
            .unwrap();
        let client = OpenAiClient::new(&config, Credentials::default()).unwrap();

        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [ChatMessage {
                role: "user",
                content: "prompt",
            }],
            temperature: 0.0,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "prompt"}],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn test_debug_hides_credentials() {
        let config = Config::builder().build().unwrap();
        let client = OpenAiClient::new(&config, Credentials::with_api_key("sk-secret")).unwrap();

        assert!(!format!("{client:?}").contains("sk-secret"));
        assert!(!format!("{:?}", Credentials::with_api_key("sk-secret")).contains("sk-secret"));
    }

    #[test]
    fn test_model_id_defaults() {
        assert_eq!(ModelId::default().as_str(), DEFAULT_MODEL);
        assert_eq!(ModelId::from("gpt-4o").to_string(), "gpt-4o");
    }

    mod http {
        use super::*;
        use mockito::{Matcher, Server, ServerGuard};

        const COMPLETION_BODY: &str = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello back."}}]}"#;

        fn client_for(url: &str, credentials: Credentials) -> OpenAiClient {
            let config = Config::builder()
                .api_base(url)
                .model("gpt-4o-mini")
                .build()
                .unwrap();
            OpenAiClient::new(&config, credentials).unwrap()
        }

        fn failing_with(server: &mut ServerGuard, status: usize, body: &str) -> Error {
            let mock = server
                .mock("POST", "/chat/completions")
                .with_status(status)
                .with_header("content-type", "application/json")
                .with_body(body)
                .create();

            let err = client_for(&server.url(), Credentials::with_api_key("sk-test"))
                .complete("hello")
                .unwrap_err();
            mock.assert();
            err
        }

        #[test]
        fn test_complete_sends_headers_and_extracts_content() {
            let mut server = Server::new();
            let mock = server
                .mock("POST", "/chat/completions")
                .match_header("authorization", "Bearer sk-test")
                .match_header("openai-organization", "org-1")
                .match_header("openai-project", "proj-1")
                .match_body(Matcher::PartialJson(serde_json::json!({
                    "model": "gpt-4o-mini",
                    "messages": [{"role": "user", "content": "hello"}],
                    "temperature": 0.0
                })))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(COMPLETION_BODY)
                .create();
            let credentials = Credentials {
                organization: Some("org-1".to_string()),
                project: Some("proj-1".to_string()),
                ..Credentials::with_api_key("sk-test")
            };

            let completion = client_for(&server.url(), credentials)
                .complete("hello")
                .unwrap();

            assert_eq!(completion, "Hello back.");
            mock.assert();
        }

        #[test]
        fn test_optional_headers_omitted_when_unset() {
            let mut server = Server::new();
            let mock = server
                .mock("POST", "/chat/completions")
                .match_header("openai-organization", Matcher::Missing)
                .match_header("openai-project", Matcher::Missing)
                .with_status(200)
                .with_body(COMPLETION_BODY)
                .create();

            client_for(&server.url(), Credentials::with_api_key("sk-test"))
                .complete("hello")
                .unwrap();

            mock.assert();
        }

        #[test]
        fn test_unauthorized_is_authentication() {
            let mut server = Server::new();
            let err = failing_with(
                &mut server,
                401,
                r#"{"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}"#,
            );

            assert!(matches!(err, Error::Authentication { ref message } if message == "Incorrect API key provided"));
            assert_eq!(err.exit_code(), 4);
        }

        #[test]
        fn test_too_many_requests_quota_and_rate_limit() {
            let mut server = Server::new();
            let quota = failing_with(
                &mut server,
                429,
                r#"{"error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}}"#,
            );
            let rate = failing_with(
                &mut server,
                429,
                r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#,
            );

            assert!(matches!(quota, Error::Quota { .. }));
            assert!(matches!(rate, Error::RateLimit { .. }));
        }

        #[test]
        fn test_success_with_unexpected_body_is_malformed() {
            let mut server = Server::new();
            let mock = server
                .mock("POST", "/chat/completions")
                .with_status(200)
                .with_body(r#"{"choices": []}"#)
                .create();

            let err = client_for(&server.url(), Credentials::with_api_key("sk-test"))
                .complete("hello")
                .unwrap_err();

            assert!(matches!(err, Error::MalformedResponse { .. }));
            mock.assert();
        }

        #[test]
        fn test_refused_connection_is_network() {
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap()
                .local_addr()
                .unwrap()
                .port();

            let err = client_for(&format!("http://127.0.0.1:{port}"), Credentials::with_api_key("sk-test"))
                .complete("hello")
                .unwrap_err();

            assert!(matches!(err, Error::Network { .. }));
            assert_eq!(err.exit_code(), 5);
        }
    }
}
