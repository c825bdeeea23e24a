use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{StorageError, UpstreamError};
use crate::models::{ChatMessage, Provider};
use crate::registry::{is_valid, ProviderRegistry};
use crate::telemetry;
use crate::token::resolve_token;

pub const NO_PROVIDER_CONTENT: &str = "no valid provider found for selected model";
pub const UPSTREAM_FAILURE_CONTENT: &str = "request could not complete — check URL and token";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/**
 * \brief Outbound side of the relay: one JSON POST, one JSON reply.
 */
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_json(&self, url: &str, token: &str, body: &Value)
        -> Result<Value, UpstreamError>;
}

/**
 * \brief reqwest-backed transport with a per-request timeout.
 */
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, UpstreamError> {
        Client::builder()
            .build()
            .map(|client| Self::new(client, timeout))
            .map_err(|err| UpstreamError::Transport(format!("failed to create client: {err}")))
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }
        let bytes = resp.bytes().await.map_err(classify)?;
        serde_json::from_slice(&bytes).map_err(UpstreamError::Decode)
    }
}

type Extractor = fn(&Value) -> Option<&Value>;

fn openai_message_content(v: &Value) -> Option<&Value> {
    v.get("choices")?.get(0)?.get("message")?.get("content")
}

fn completion_text(v: &Value) -> Option<&Value> {
    v.get("choices")?.get(0)?.get("text")
}

fn output_text(v: &Value) -> Option<&Value> {
    v.get("output_text")
}

/** \brief Response shapes tried in order; the first non-null hit wins. */
const EXTRACTORS: &[Extractor] = &[openai_message_content, completion_text, output_text];

fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}

/**
 * \brief Pull the assistant text out of a provider reply.
 * \details Falls back to the whole body, pretty printed, when no extractor matches.
 *          A matched non-string value is pretty printed as well.
 */
pub fn extract_content(body: &Value) -> String {
    let hit = EXTRACTORS
        .iter()
        .find_map(|extract| extract(body).filter(|v| !v.is_null()));
    match hit {
        Some(Value::String(text)) => text.clone(),
        Some(other) => pretty(other),
        None => pretty(body),
    }
}

pub fn build_payload(model: &str, user_text: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "user", "content": user_text }
        ]
    })
}

#[derive(Debug)]
pub enum RelayFailure {
    /** \brief Requested model is missing from the registry or fails validation. */
    ProviderUnavailable,
    Upstream(UpstreamError),
}

/**
 * \brief Result of a relay call. Both variants carry a displayable assistant message.
 */
#[derive(Debug)]
pub enum RelayOutcome {
    Reply(ChatMessage),
    Degraded {
        failure: RelayFailure,
        message: ChatMessage,
    },
}

impl RelayOutcome {
    pub fn into_message(self) -> ChatMessage {
        match self {
            RelayOutcome::Reply(message) | RelayOutcome::Degraded { message, .. } => message,
        }
    }

    pub fn failure(&self) -> Option<&RelayFailure> {
        match self {
            RelayOutcome::Reply(_) => None,
            RelayOutcome::Degraded { failure, .. } => Some(failure),
        }
    }
}

/**
 * \brief Sends one user message to a registered provider and normalizes the reply.
 */
#[derive(Clone)]
pub struct ChatRelay {
    registry: ProviderRegistry,
    transport: Arc<dyn ChatTransport>,
}

impl ChatRelay {
    pub fn new(registry: ProviderRegistry, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /**
     * \brief Relay `user_text` to the provider registered as `provider_name`.
     * \details Only a provider-store failure is an error; missing providers and upstream
     *          failures come back as `RelayOutcome::Degraded`.
     */
    pub async fn send_message(
        &self,
        provider_name: &str,
        user_text: &str,
    ) -> Result<RelayOutcome, StorageError> {
        let provider = match self.registry.find(provider_name)? {
            Some(p) if is_valid(&p) => p,
            _ => {
                telemetry::log_warn(
                    "relay",
                    &format!("no valid provider for model={}", provider_name),
                );
                return Ok(RelayOutcome::Degraded {
                    failure: RelayFailure::ProviderUnavailable,
                    message: ChatMessage::assistant(NO_PROVIDER_CONTENT, provider_name),
                });
            }
        };
        Ok(self.call(&provider, user_text).await)
    }

    async fn call(&self, provider: &Provider, user_text: &str) -> RelayOutcome {
        let token = resolve_token(&provider.token);
        let payload = build_payload(&provider.model, user_text);
        telemetry::log_event(
            "relay",
            &format!(
                "request -> model={} url={} prompt_len={}",
                provider.model,
                provider.url,
                user_text.len()
            ),
        );

        match self.transport.post_json(&provider.url, &token, &payload).await {
            Ok(body) => RelayOutcome::Reply(ChatMessage::assistant(
                extract_content(&body),
                provider.model.as_str(),
            )),
            Err(err) => {
                telemetry::log_error(
                    "relay",
                    &format!("model={} failed: {}", provider.model, err),
                );
                RelayOutcome::Degraded {
                    failure: RelayFailure::Upstream(err),
                    message: ChatMessage::assistant(
                        UPSTREAM_FAILURE_CONTENT,
                        provider.model.as_str(),
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    const URL: &str = "https://api.example.com/v1/chat/completions";

    #[derive(Debug, Clone)]
    struct Captured {
        url: String,
        token: String,
        body: Value,
    }

    /// Returns a canned reply and records every request it sees.
    struct FakeTransport {
        reply: Mutex<Option<Result<Value, UpstreamError>>>,
        calls: Mutex<Vec<Captured>>,
    }

    impl FakeTransport {
        fn replying(reply: Result<Value, UpstreamError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Captured> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn post_json(
            &self,
            url: &str,
            token: &str,
            body: &Value,
        ) -> Result<Value, UpstreamError> {
            self.calls.lock().unwrap().push(Captured {
                url: url.to_string(),
                token: token.to_string(),
                body: body.clone(),
            });
            self.reply
                .lock()
                .unwrap()
                .take()
                .expect("fake transport called more than once")
        }
    }

    fn relay_with(providers: Vec<Provider>, transport: Arc<FakeTransport>) -> ChatRelay {
        let registry = ProviderRegistry::new(Arc::new(MemoryStore::with_records(providers)));
        ChatRelay::new(registry, transport)
    }

    fn gpt(token: &str) -> Provider {
        Provider {
            model: "gpt-4o".to_string(),
            url: URL.to_string(),
            token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_degrades_without_network_call() {
        let transport = FakeTransport::replying(Ok(json!({})));
        let relay = relay_with(vec![gpt("sk")], transport.clone());

        let outcome = relay.send_message("missing-model", "hello").await.expect("send");
        assert!(matches!(
            outcome.failure(),
            Some(RelayFailure::ProviderUnavailable)
        ));
        let message = outcome.into_message();
        assert_eq!(message.content, NO_PROVIDER_CONTENT);
        assert_eq!(message.provider, "missing-model");
        assert_eq!(message.role, Role::Assistant);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_stored_provider_degrades() {
        std::env::remove_var("CHATRELAY_LLM_UNSET");
        let transport = FakeTransport::replying(Ok(json!({})));
        let relay = relay_with(vec![gpt("env:CHATRELAY_LLM_UNSET")], transport.clone());

        let message = relay
            .send_message("gpt-4o", "hello")
            .await
            .expect("send")
            .into_message();
        assert_eq!(message.content, NO_PROVIDER_CONTENT);
        assert_eq!(message.provider, "gpt-4o");
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_openai_shape_is_extracted() {
        let transport =
            FakeTransport::replying(Ok(json!({"choices": [{"message": {"content": "hi"}}]})));
        let relay = relay_with(vec![gpt("sk-live")], transport.clone());

        let outcome = relay.send_message("gpt-4o", "hello").await.expect("send");
        assert!(outcome.failure().is_none());
        let message = outcome.into_message();
        assert_eq!(message.content, "hi");
        assert_eq!(message.provider, "gpt-4o");
        assert_eq!(message.role, Role::Assistant);

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, URL);
        assert_eq!(calls[0].token, "sk-live");
        assert_eq!(
            calls[0].body,
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hello"}]})
        );
    }

    #[tokio::test]
    async fn test_output_text_shape_is_extracted() {
        let transport = FakeTransport::replying(Ok(json!({"output_text": "ok"})));
        let relay = relay_with(vec![gpt("sk")], transport);
        let message = relay
            .send_message("gpt-4o", "hello")
            .await
            .expect("send")
            .into_message();
        assert_eq!(message.content, "ok");
    }

    #[tokio::test]
    async fn test_env_reference_token_is_sent_resolved() {
        std::env::set_var("CHATRELAY_LLM_KEY", "abc123");
        let transport = FakeTransport::replying(Ok(json!({"output_text": "ok"})));
        let relay = relay_with(vec![gpt("${CHATRELAY_LLM_KEY}")], transport.clone());
        relay.send_message("gpt-4o", "hello").await.expect("send");
        assert_eq!(transport.calls()[0].token, "abc123");
        std::env::remove_var("CHATRELAY_LLM_KEY");
    }

    #[tokio::test]
    async fn test_upstream_failures_degrade() {
        let failures = [
            UpstreamError::Transport("connection refused".to_string()),
            UpstreamError::Timeout,
            UpstreamError::Status {
                status: 500,
                body: "boom".to_string(),
            },
        ];
        for failure in failures {
            let transport = FakeTransport::replying(Err(failure));
            let relay = relay_with(vec![gpt("sk")], transport);
            let outcome = relay.send_message("gpt-4o", "hello").await.expect("send");
            assert!(matches!(outcome.failure(), Some(RelayFailure::Upstream(_))));
            let message = outcome.into_message();
            assert_eq!(message.content, UPSTREAM_FAILURE_CONTENT);
            assert_eq!(message.provider, "gpt-4o");
        }
    }

    #[test]
    fn test_extractors_run_in_order() {
        let both = json!({
            "choices": [{"message": {"content": "chat"}, "text": "legacy"}],
            "output_text": "plain"
        });
        assert_eq!(extract_content(&both), "chat");

        let legacy = json!({"choices": [{"text": "legacy"}], "output_text": "plain"});
        assert_eq!(extract_content(&legacy), "legacy");

        let null_content = json!({"choices": [{"message": {"content": null}, "text": "legacy"}]});
        assert_eq!(extract_content(&null_content), "legacy");
    }

    #[test]
    fn test_unknown_shape_falls_back_to_pretty_body() {
        let body = json!({"result": "x"});
        assert_eq!(extract_content(&body), "{\n  \"result\": \"x\"\n}");
    }

    #[test]
    fn test_fallback_keeps_upstream_key_order() {
        let body: Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"mid": true, "beta": null}}"#)
                .expect("parse body");
        assert_eq!(
            extract_content(&body),
            "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"mid\": true,\n    \"beta\": null\n  }\n}"
        );
    }

    #[test]
    fn test_non_string_hit_is_pretty_printed() {
        let body = json!({"choices": [{"message": {"content": [{"type": "text"}]}}]});
        assert_eq!(
            extract_content(&body),
            "[\n  {\n    \"type\": \"text\"\n  }\n]"
        );
    }
}
