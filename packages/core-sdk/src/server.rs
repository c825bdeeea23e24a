use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, get_service, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::services::ServeDir;

use crate::{
    config::Config,
    error::{RegistryError, StorageError},
    history::HistoryStore,
    llm::{ChatRelay, ReqwestTransport},
    models::{ChatMessage, Provider, ProviderSummary},
    registry::ProviderRegistry,
    store::JsonFileStore,
    telemetry,
};

/**
 * \brief Shared handler state.
 */
#[derive(Clone)]
pub struct AppState {
    pub registry: ProviderRegistry,
    pub history: HistoryStore,
    pub relay: ChatRelay,
}

impl AppState {
    /**
     * \brief Wire file-backed stores and the reqwest transport from `config`.
     */
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = ProviderRegistry::new(Arc::new(JsonFileStore::<Provider>::new(
            config.providers_path(),
        )));
        let history = HistoryStore::new(Arc::new(JsonFileStore::<ChatMessage>::new(
            config.history_path(),
        )));
        let transport = ReqwestTransport::with_timeout(config.request_timeout)
            .context("build http client failed")?;
        let relay = ChatRelay::new(registry.clone(), Arc::new(transport));
        Ok(Self {
            registry,
            history,
            relay,
        })
    }
}

/**
 * \brief API routes, plus the static UI as fallback when `ui_dir` exists.
 */
pub fn build_app(state: AppState, ui_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/api/providers", get(get_providers).post(create_provider))
        .route("/api/history", get(get_history).post(save_history))
        .route("/api/message", post(append_message))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health_check))
        .with_state(state);

    match ui_dir.filter(|dir| dir.exists()) {
        Some(dir) => app.fallback_service(get_service(
            ServeDir::new(dir).append_index_html_on_directories(true),
        )),
        None => app,
    }
}

/**
 * \brief Start the HTTP API described by `config` and serve until the process exits.
 */
pub async fn run(config: &Config) -> Result<()> {
    telemetry::configure(config.telemetry_enabled, &config.log_dir);
    let state = AppState::from_config(config)?;
    let app = build_app(state, config.ui_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("bind {} failed", config.addr))?;
    println!("API server running on http://{}", listener.local_addr()?);
    telemetry::log_event("server", &format!("listening addr={}", config.addr));
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief Reads a string field, mapping null and non-string values to `""`.
 * \details Keeps malformed bodies on the validation / degraded-reply paths instead of
 *          failing the extractor.
 */
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

#[derive(Deserialize, Debug)]
struct ProviderInput {
    #[serde(default, deserialize_with = "lenient_string")]
    model: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    token: String,
}

#[derive(Serialize, Debug)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ProviderResponse {
    Ok { provider: ProviderSummary },
    Error { message: String },
}

#[derive(Deserialize, Debug)]
struct AppendRequest {
    message: ChatMessage,
}

#[derive(Deserialize, Debug)]
struct ChatRequest {
    /** \brief Model name of the selected provider */
    #[serde(default, deserialize_with = "lenient_string")]
    provider: String,
    #[serde(default, deserialize_with = "lenient_string")]
    message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

async fn get_providers(State(state): State<AppState>) -> ApiResult<Vec<ProviderSummary>> {
    let providers = state.registry.list_valid_providers().map_err(internal_err)?;
    Ok(Json(providers))
}

async fn create_provider(
    State(state): State<AppState>,
    Json(input): Json<ProviderInput>,
) -> ApiResult<ProviderResponse> {
    match state
        .registry
        .add_provider(&input.model, &input.url, &input.token)
    {
        Ok(provider) => {
            telemetry::log_event(
                "server.provider",
                &format!("saved model={} url={}", provider.model, provider.url),
            );
            Ok(Json(ProviderResponse::Ok { provider }))
        }
        Err(RegistryError::Validation(err)) => {
            telemetry::log_warn(
                "server.provider",
                &format!("rejected model={}: {}", input.model, err),
            );
            Ok(Json(ProviderResponse::Error {
                message: err.message,
            }))
        }
        Err(RegistryError::Storage(err)) => Err(internal_err(err)),
    }
}

async fn get_history(State(state): State<AppState>) -> ApiResult<Vec<ChatMessage>> {
    let history = state.history.load().map_err(internal_err)?;
    Ok(Json(history))
}

async fn save_history(
    State(state): State<AppState>,
    Json(history): Json<Vec<ChatMessage>>,
) -> ApiResult<serde_json::Value> {
    state.history.save(&history).map_err(internal_err)?;
    telemetry::log_event("server.history", &format!("saved messages={}", history.len()));
    Ok(Json(serde_json::json!({"status": "ok"})))
}

async fn append_message(
    State(state): State<AppState>,
    Json(request): Json<AppendRequest>,
) -> ApiResult<serde_json::Value> {
    let history = state.history.append(request.message).map_err(internal_err)?;
    Ok(Json(serde_json::json!({"status": "ok", "history": history})))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatMessage> {
    telemetry::log_event(
        "server.chat",
        &format!(
            "provider={} prompt_len={}",
            request.provider,
            request.message.len()
        ),
    );
    let outcome = state
        .relay
        .send_message(&request.provider, &request.message)
        .await
        .map_err(internal_err)?;
    Ok(Json(outcome.into_message()))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

fn internal_err(e: StorageError) -> (StatusCode, String) {
    telemetry::log_error("server", &e.to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_non_string_fields_read_as_empty() {
        let input: ProviderInput =
            serde_json::from_value(json!({"model": null, "url": 42, "token": "sk"}))
                .expect("provider input");
        assert_eq!(input.model, "");
        assert_eq!(input.url, "");
        assert_eq!(input.token, "sk");

        let request: ChatRequest =
            serde_json::from_value(json!({"provider": null, "message": ["hi"]}))
                .expect("chat request");
        assert_eq!(request.provider, "");
        assert_eq!(request.message, "");

        let missing: ChatRequest = serde_json::from_value(json!({})).expect("empty request");
        assert_eq!(missing.provider, "");
    }
}
