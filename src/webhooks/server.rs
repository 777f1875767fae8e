//! Webhook HTTP server handlers
//!
//! Implements the ValidatingAdmissionWebhook endpoint for DocumentDB.

use axum::{Json, Router, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::policies::{ValidationContext, validate_all};
use crate::crd::DocumentDB;

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    pub operation: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<serde_json::Value>,
    pub old_object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// AdmissionReview response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Create the webhook router
pub(crate) fn create_webhook_router() -> Router {
    Router::new().route("/validate", post(validate_documentdb))
}

/// Validate DocumentDB admission webhook handler
pub(crate) async fn validate_documentdb(
    Json(review): Json<AdmissionReview>,
) -> (StatusCode, Json<AdmissionReviewResponse>) {
    let Some(request) = review.request else {
        error!("Admission review missing request");
        return (
            StatusCode::BAD_REQUEST,
            Json(create_response(
                "",
                false,
                "Missing request in AdmissionReview",
                None,
            )),
        );
    };

    let uid = request.uid.clone();
    info!(
        uid = %uid,
        operation = %request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    if request.operation == "DELETE" {
        return (StatusCode::OK, Json(create_response(&uid, true, "", None)));
    }

    let db: DocumentDB = match request.object.map(serde_json::from_value) {
        Some(Ok(db)) => db,
        Some(Err(e)) => {
            error!(error = %e, "Failed to parse DocumentDB");
            return (
                StatusCode::OK,
                Json(create_response(
                    &uid,
                    false,
                    &format!("Failed to parse object: {}", e),
                    None,
                )),
            );
        }
        None => {
            return (
                StatusCode::OK,
                Json(create_response(
                    &uid,
                    false,
                    "Missing object in request",
                    None,
                )),
            );
        }
    };

    let old_db: Option<DocumentDB> = match request.old_object.map(serde_json::from_value) {
        Some(Ok(old)) => Some(old),
        Some(Err(e)) => {
            warn!(error = %e, "Failed to parse old DocumentDB, treating as CREATE");
            None
        }
        None => None,
    };

    let ctx = ValidationContext::new(&db, old_db.as_ref());
    let result = validate_all(&ctx);

    if !result.allowed {
        let reason = result
            .reason
            .unwrap_or_else(|| "ValidationFailed".to_string());
        let message = result
            .message
            .unwrap_or_else(|| "Validation failed".to_string());
        warn!(uid = %uid, reason = %reason, message = %message, "Admission request denied");
        return (
            StatusCode::OK,
            Json(create_response(&uid, false, &message, Some(&reason))),
        );
    }

    info!(uid = %uid, "Admission request allowed");
    (StatusCode::OK, Json(create_response(&uid, true, "", None)))
}

/// Create an AdmissionReview response
fn create_response(
    uid: &str,
    allowed: bool,
    message: &str,
    reason: Option<&str>,
) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed,
            status: if allowed {
                None
            } else {
                Some(AdmissionStatus {
                    code: 403,
                    message: message.to_string(),
                    reason: reason.map(String::from),
                })
            },
        },
    }
}

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Run the webhook server with TLS on `WEBHOOK_PORT`
///
/// Certificates are PEM files, typically mounted from a Secret.
pub async fn run_webhook_server(cert_path: &str, key_path: &str) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router();

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Webhook server error: {0}")]
    Server(String),
}
