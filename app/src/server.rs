//! The two proxy endpoints plus a health probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::mail::{EmailData, MailError, MailTransport};
use crate::models::{Client, Company, Invoice, SmtpSettings, APP_VERSION};
use crate::pdf::{self, PdfError};

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub mailer: Arc<dyn MailTransport>,
}

impl AppState {
    pub fn new(mailer: Arc<dyn MailTransport>) -> Self {
        Self { mailer }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("{message}")]
    BadRequest { message: String, details: Option<String> },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn bad_request(message: impl Into<String>, details: impl std::fmt::Display) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, error, details) = match self {
            ApiError::Pdf(e) if e.is_invalid_input() => (StatusCode::BAD_REQUEST, e.to_string(), None),
            ApiError::Pdf(e) => {
                tracing::error!(error = %e, "pdf generation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate PDF".to_string(), None)
            }
            ApiError::Mail(MailError::Incomplete) => {
                (StatusCode::BAD_REQUEST, MailError::Incomplete.to_string(), None)
            }
            ApiError::Mail(e) => {
                tracing::error!(error = %e, "email send failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send email".to_string(),
                    Some(e.to_string()),
                )
            }
            ApiError::BadRequest { message, details } => (StatusCode::BAD_REQUEST, message, details),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Missing and `null` fields both read as absent.
fn optional_field<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Option<T>, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("Invalid {key}"), e)),
    }
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))
}

async fn generate_pdf(body: Result<Json<Value>, JsonRejection>) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    let invoice: Option<Invoice> = optional_field(&body, "invoice")?;
    let client: Option<Client> = optional_field(&body, "client")?;
    let company: Option<Company> = optional_field(&body, "company")?;

    let (invoice, client, company) = pdf::validate_request(invoice.as_ref(), client.as_ref(), company.as_ref())
        .map(|(i, c, co)| (i.clone(), c.clone(), co.clone()))?;

    let filename = invoice.pdf_file_name();
    let bytes = tokio::task::spawn_blocking(move || pdf::render_invoice_pdf(&invoice, &client, &company))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(file = %filename, bytes = bytes.len(), "pdf generated");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

async fn send_email(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let smtp: SmtpSettings = optional_field(&body, "smtpSettings")?.ok_or(MailError::Incomplete)?;
    if !smtp.is_complete() {
        return Err(MailError::Incomplete.into());
    }
    let email: EmailData = optional_field(&body, "emailData")?
        .ok_or_else(|| ApiError::bad_request("Invalid emailData", "missing field"))?;

    let message_id = state.mailer.send(&smtp, email).await?;
    Ok(Json(json!({ "success": true, "messageId": message_id })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": APP_VERSION }))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/generate-pdf", post(generate_pdf))
        .route("/api/send-email", post(send_email))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;
    use crate::test_support::{sample_client, sample_company, sample_invoice, sample_smtp};
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app_with(mailer: Arc<MemoryMailer>) -> Router {
        router(AppState::new(mailer))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_of(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn email_data() -> Value {
        json!({
            "to": "ap@acme.test",
            "subject": "Invoice INV-202610-0001",
            "html": "<p>Hi</p>",
            "attachments": [{"filename": "invoice-INV-202610-0001.pdf", "content": "JVBERg=="}]
        })
    }

    #[tokio::test]
    async fn health_reports_version() {
        let res = app_with(Arc::new(MemoryMailer::new()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_of(res).await, json!({"status": "ok", "version": APP_VERSION}));
    }

    #[tokio::test]
    async fn generate_pdf_returns_attachment() {
        let body = json!({
            "invoice": sample_invoice(),
            "client": sample_client(),
            "company": sample_company(),
        });
        let res = app_with(Arc::new(MemoryMailer::new()))
            .oneshot(post_json("/api/generate-pdf", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"invoice-INV-202610-0001.pdf\""
        );
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn generate_pdf_reports_validation_messages() {
        let app = app_with(Arc::new(MemoryMailer::new()));

        let res = app
            .clone()
            .oneshot(post_json("/api/generate-pdf", json!({"invoice": sample_invoice()})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_of(res).await,
            json!({"error": "Missing required data: invoice, client, or company"})
        );

        let mut company = sample_company();
        company.name.clear();
        let body = json!({"invoice": sample_invoice(), "client": sample_client(), "company": company});
        let res = app.oneshot(post_json("/api/generate-pdf", body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(res).await["error"], "Company must have a name");
    }

    #[tokio::test]
    async fn send_email_relays_through_transport() {
        let mailer = Arc::new(MemoryMailer::new());
        let body = json!({"smtpSettings": sample_smtp(), "emailData": email_data()});
        let res = app_with(mailer.clone())
            .oneshot(post_json("/api/send-email", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_of(res).await;
        assert_eq!(v["success"], true);
        assert!(v["messageId"].as_str().unwrap().ends_with("@byteworks.test>"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachments[0].content_type_or_default(), "application/pdf");
    }

    #[tokio::test]
    async fn send_email_rejects_incomplete_settings() {
        let mailer = Arc::new(MemoryMailer::new());
        let mut smtp = sample_smtp();
        smtp.host.clear();
        let body = json!({"smtpSettings": smtp, "emailData": email_data()});
        let res = app_with(mailer.clone())
            .oneshot(post_json("/api/send-email", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(res).await, json!({"error": "SMTP configuration is incomplete"}));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn send_email_failure_carries_details() {
        let mailer = Arc::new(MemoryMailer::failing("connection refused"));
        let body = json!({"smtpSettings": sample_smtp(), "emailData": email_data()});
        let res = app_with(mailer)
            .oneshot(post_json("/api/send-email", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_of(res).await,
            json!({"error": "Failed to send email", "details": "connection refused"})
        );
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/send-email")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app_with(Arc::new(MemoryMailer::new())).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(res).await["error"], "Invalid request body");
    }
}
