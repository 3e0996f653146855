//! HTTP routes.
//!
//! | Route                      | Legacy alias                  |
//! |----------------------------|-------------------------------|
//! | `GET /api/settings`        | `GET /api/visa/load-settings` |
//! | `POST /api/settings`       | `POST /api/visa/save-settings`|
//! | `POST /api/settings/clear` |                               |
//! | `POST /api/proxy`          | `POST /api/visa/transaction`  |
//! | `POST /api/decrypt`        | `POST /api/visa/decrypt`      |
//! | `GET /api/health`          |                               |

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use vdp_sandbox::{
    CredentialBundle, ProxyFailure, ProxyRequest, SandboxError, keys::KeyRole,
};

use crate::{
    config::ServerConfig,
    error::{ApiError, ConfigError},
    observability::{HealthCheck, HealthReport},
    state::AppState,
};

/// Builds the application router.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if a CORS origin is not a valid header value.
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router, ConfigError> {
    let origins = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| ConfigError::Invalid(format!("invalid CORS origin {origin:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/settings", get(load_settings).post(save_settings))
        .route("/api/settings/clear", post(clear_settings))
        .route("/api/proxy", post(proxy))
        .route("/api/decrypt", post(decrypt))
        .route("/api/health", get(health))
        .route("/api/visa/load-settings", get(load_settings))
        .route("/api/visa/save-settings", post(save_settings))
        .route("/api/visa/transaction", post(proxy))
        .route("/api/visa/decrypt", post(decrypt))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

async fn load_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let settings = state.orchestrator.load_settings().await.map_err(|error| {
        tracing::error!(%error, "failed to load settings");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load settings")
    })?;

    Ok(Json(json!({
        "settingsSaved": settings.is_some(),
        "settings": settings,
        "mleAvailable": state.orchestrator.mle_available(),
    })))
}

async fn save_settings(
    State(state): State<AppState>,
    body: Result<Json<CredentialBundle>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(bundle) = body?;
    state.orchestrator.save_settings(bundle).await?;

    Ok(Json(json!({
        "message": "Settings saved successfully",
        "mleAvailable": state.orchestrator.mle_available(),
    })))
}

async fn clear_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.orchestrator.clear_settings().await?;
    Ok(Json(json!({ "message": "Settings cleared" })))
}

async fn proxy(
    State(state): State<AppState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;

    match state.orchestrator.execute(request).await {
        Ok(outcome) => Ok(Json(outcome).into_response()),
        Err(failure) => Err(ApiError::from(&failure)),
    }
}

impl From<&ProxyFailure> for ApiError {
    fn from(failure: &ProxyFailure) -> Self {
        let status =
            StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::from_body(status, failure_body(failure))
    }
}

/// JSON body for a failed proxy call.
///
/// Upstream failures carry the raw body in `details` and the decrypted body,
/// when there is one, in `data`.
pub fn failure_body(failure: &ProxyFailure) -> Value {
    match failure {
        ProxyFailure::Rejected(error) => json!({ "error": error.to_string() }),
        ProxyFailure::Upstream(outcome) => json!({
            "error": failure.to_string(),
            "requestId": outcome.request_id,
            "details": outcome.data,
            "status": outcome.status,
            "data": outcome.decrypted_data.as_ref().unwrap_or(&outcome.data),
            "decryptedData": outcome.decrypted_data,
            "isEncrypted": outcome.is_encrypted,
            "headers": outcome.headers,
            "errorCode": outcome.error_code,
            "errorMapping": outcome.error_mapping,
            "decryptionError": outcome.decryption_error,
        }),
        ProxyFailure::NoResponse { details } | ProxyFailure::Setup { details } => json!({
            "error": failure.to_string(),
            "details": details,
            "status": 500,
            "data": null,
            "decryptedData": null,
            "isEncrypted": false,
            "headers": null,
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptRequest {
    #[serde(default)]
    encrypted_data: Value,
}

async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;

    match state.orchestrator.decrypt_stored(&request.encrypted_data).await {
        Ok(decrypted) => Ok(Json(json!({ "decryptedData": decrypted }))),
        Err(SandboxError::MissingField("encryptedData")) => {
            Err(ApiError::new(StatusCode::BAD_REQUEST, "No encrypted data provided"))
        }
        Err(SandboxError::SettingsNotFound) => Err(no_decryption_key()),
        Err(SandboxError::MissingField(field)) if field == KeyRole::MlePrivateKey.field_name() => {
            Err(no_decryption_key())
        }
        Err(SandboxError::SettingsError(details)) => {
            Err(ApiError::with_details(StatusCode::INTERNAL_SERVER_ERROR, "Server error", &details))
        }
        Err(error) => Err(ApiError::with_details(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to decrypt data",
            &error.to_string(),
        )),
    }
}

fn no_decryption_key() -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "MLE Client Key not available for decryption")
}

async fn health(State(state): State<AppState>) -> Response {
    let mle_available = state.orchestrator.mle_available();

    let (settings_saved, store_check) = match state.orchestrator.load_settings().await {
        Ok(Some(bundle)) => {
            (true, HealthCheck::pass("settings_store", format!("{} credentials saved", bundle.auth_method)))
        }
        Ok(None) => (false, HealthCheck::pass("settings_store", "no credentials saved")),
        Err(error) => (false, HealthCheck::fail("settings_store", error.to_string())),
    };
    let mle_check = if mle_available {
        HealthCheck::pass("mle", "message level encryption available")
    } else {
        HealthCheck::warn("mle", "message level encryption disabled")
    };

    let report =
        HealthReport::new(state.uptime_secs(), mle_available, settings_saved, vec![store_check, mle_check]);
    let status = if report.is_serving() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;
    use vdp_sandbox::ProxyOutcome;

    use super::*;

    fn outcome(status: u16) -> ProxyOutcome {
        ProxyOutcome {
            request_id: Uuid::nil(),
            status,
            data: json!({"encData": "a.b.c.d.e"}),
            decrypted_data: Some(json!({"responseStatus": {"code": "96"}})),
            headers: BTreeMap::from([("content-type".to_owned(), "application/json".to_owned())]),
            is_encrypted: true,
            error_code: Some("96".to_owned()),
            error_mapping: None,
            decryption_error: None,
        }
    }

    #[test]
    fn test_upstream_failure_body() {
        let body = failure_body(&ProxyFailure::Upstream(Box::new(outcome(503))));

        assert_eq!(body["error"], "Visa API request failed");
        assert_eq!(body["status"], 503);
        assert_eq!(body["details"], json!({"encData": "a.b.c.d.e"}));
        assert_eq!(body["data"], json!({"responseStatus": {"code": "96"}}));
        assert_eq!(body["isEncrypted"], true);
        assert_eq!(body["errorCode"], "96");
        assert_eq!(body["headers"]["content-type"], "application/json");
    }

    #[test]
    fn test_no_response_failure_body() {
        let failure = ProxyFailure::NoResponse { details: "connection refused".to_owned() };
        let body = failure_body(&failure);

        assert_eq!(body["error"], "No response received from Visa API");
        assert_eq!(body["details"], "connection refused");
        assert_eq!(body["status"], 500);
        assert_eq!(body["data"], Value::Null);
        assert_eq!(body["headers"], Value::Null);
        assert_eq!(body["isEncrypted"], false);
    }

    #[test]
    fn test_setup_failure_body() {
        let failure = ProxyFailure::Setup { details: "bad identity".to_owned() };
        assert_eq!(failure_body(&failure)["error"], "Error setting up Visa API request");
    }

    #[test]
    fn test_rejected_failure_body() {
        let failure = ProxyFailure::Rejected(SandboxError::MissingField("apiKey"));
        assert_eq!(failure_body(&failure), json!({"error": "Missing required field: apiKey"}));
    }

    #[test]
    fn test_proxy_failure_status() {
        let error = ApiError::from(&ProxyFailure::Upstream(Box::new(outcome(503))));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);

        let error = ApiError::from(&ProxyFailure::Upstream(Box::new(outcome(502))));
        assert_eq!(error.status(), StatusCode::BAD_GATEWAY);

        let error = ApiError::from(&ProxyFailure::NoResponse { details: "timed out".to_owned() });
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = ApiError::from(&ProxyFailure::Rejected(SandboxError::MissingField("apiKey")));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_cors_origin_rejected() {
        let config =
            ServerConfig { cors_origins: vec!["http://bad\norigin".to_owned()], ..ServerConfig::default() };
        let state = AppState::new(vdp_sandbox::RequestOrchestrator::new(
            vdp_sandbox::settings::FileSettingsRepository::new("unused.json"),
            vdp_sandbox::transport::HttpTransport::new().unwrap(),
            vdp_sandbox::mle::EnvelopeEngine::new(true),
        ));

        assert!(matches!(router(state, &config), Err(ConfigError::Invalid(_))));
    }
}
