//! SMTP relay behind the send-email endpoint.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine as _;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};

use crate::models::SmtpSettings;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP configuration is incomplete")]
    Incomplete,
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailData {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

/// A string `content` is UTF-8 text unless `encoding` is `"base64"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    pub filename: String,
    pub content: AttachmentContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl EmailAttachment {
    pub fn pdf(filename: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: AttachmentContent::Text(base64::engine::general_purpose::STANDARD.encode(bytes)),
            content_type: Some(mime::APPLICATION_PDF.to_string()),
            encoding: Some("base64".to_string()),
        }
    }

    fn is_base64(&self) -> bool {
        self.encoding
            .as_deref()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case("base64"))
    }

    /// Raw attachment bytes, decoding base64 text when `encoding` asks for it.
    pub fn decoded_content(&self) -> Result<Vec<u8>, MailError> {
        match &self.content {
            AttachmentContent::Text(s) if self.is_base64() => base64::engine::general_purpose::STANDARD
                .decode(s.trim())
                .map_err(|e| MailError::Build(format!("attachment {} is not valid base64: {e}", self.filename))),
            other => Ok(other.clone().into_bytes()),
        }
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("application/pdf")
    }
}

/// Attachment payloads arrive as a string, a plain byte array, or a
/// serialized Node buffer (`{"type":"Buffer","data":[...]}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentContent {
    Buffer {
        #[serde(rename = "type")]
        kind: String,
        data: Vec<u8>,
    },
    Bytes(Vec<u8>),
    Text(String),
}

impl AttachmentContent {
    /// Text is taken as-is, as UTF-8.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            AttachmentContent::Buffer { data, .. } => data,
            AttachmentContent::Bytes(data) => data,
            AttachmentContent::Text(s) => s.into_bytes(),
        }
    }
}

pub fn validate_smtp_settings(s: &SmtpSettings) -> Result<(), MailError> {
    if s.is_complete() {
        Ok(())
    } else {
        Err(MailError::Incomplete)
    }
}

/// `secure` selects implicit TLS; otherwise the connection upgrades with
/// STARTTLS when the server offers it.
pub fn build_smtp_transport(s: &SmtpSettings) -> Result<SmtpTransport, MailError> {
    validate_smtp_settings(s)?;
    let host = s.host.trim();
    let tls_params = TlsParameters::new(host.to_string())
        .map_err(|e| MailError::Transport(format!("Failed to configure TLS parameters: {e}")))?;
    let tls = if s.secure {
        Tls::Wrapper(tls_params)
    } else {
        Tls::Opportunistic(tls_params)
    };

    Ok(SmtpTransport::builder_dangerous(host)
        .port(s.port)
        .tls(tls)
        .credentials(Credentials::new(s.username.clone(), s.password.clone()))
        .build())
}

fn parse_address(raw: &str) -> Result<Address, MailError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| MailError::InvalidAddress(raw.trim().to_string()))
}

/// `"{fromName}" <{fromEmail}>`
pub fn sender_mailbox(s: &SmtpSettings) -> Result<Mailbox, MailError> {
    let address = parse_address(&s.from_email)?;
    let name = Some(s.from_name.trim().to_string()).filter(|n| !n.is_empty());
    Ok(Mailbox::new(name, address))
}

/// Builds the MIME message and returns it with its Message-ID.
pub fn build_message(smtp: &SmtpSettings, email: EmailData) -> Result<(Message, String), MailError> {
    let from = sender_mailbox(smtp)?;
    let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), from.email.domain());

    let mut builder = Message::builder()
        .from(from)
        .subject(email.subject.clone())
        .message_id(Some(message_id.clone()));

    let mut recipients = 0;
    for raw in email.to.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mailbox: Mailbox = raw
            .parse()
            .map_err(|_| MailError::InvalidAddress(raw.to_string()))?;
        builder = builder.to(mailbox);
        recipients += 1;
    }
    if recipients == 0 {
        return Err(MailError::InvalidAddress(email.to));
    }

    let html_part = SinglePart::html(email.html);
    let built = if email.attachments.is_empty() {
        builder.singlepart(html_part)
    } else {
        let mut mixed = MultiPart::mixed().singlepart(html_part);
        for attachment in email.attachments {
            let content_type = ContentType::parse(attachment.content_type_or_default())
                .map_err(|e| MailError::Build(format!("invalid attachment content type: {e}")))?;
            let body = attachment.decoded_content()?;
            mixed = mixed.singlepart(Attachment::new(attachment.filename).body(body, content_type));
        }
        builder.multipart(mixed)
    };
    let message = built.map_err(|e| MailError::Build(e.to_string()))?;

    Ok((message, message_id))
}

/// Delivers one email and returns its message id.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, smtp: &SmtpSettings, email: EmailData) -> Result<String, MailError>;
}

pub struct SmtpRelay;

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn send(&self, smtp: &SmtpSettings, email: EmailData) -> Result<String, MailError> {
        validate_smtp_settings(smtp)?;
        let to = email.to.clone();
        let attachment_count = email.attachments.len();
        let (message, message_id) = build_message(smtp, email)?;
        let settings = smtp.clone();

        tokio::task::spawn_blocking(move || {
            let transport = build_smtp_transport(&settings)?;
            match transport.test_connection() {
                Ok(true) => {}
                Ok(false) => {
                    return Err(MailError::Transport(
                        "SMTP server rejected the connection".to_string(),
                    ))
                }
                Err(e) => return Err(MailError::Transport(e.to_string())),
            }
            transport.send(&message).map_err(|e| {
                tracing::error!(host = %settings.host, port = settings.port, error = %e, "smtp send failed");
                MailError::Transport(e.to_string())
            })?;
            Ok(())
        })
        .await
        .map_err(|e| MailError::Transport(e.to_string()))??;

        tracing::info!(to = %to, attachments = attachment_count, message_id = %message_id, "email sent");
        Ok(message_id)
    }
}

/// Keeps every accepted email in memory instead of sending it.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailData>>,
    fail_with: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<EmailData> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for MemoryMailer {
    async fn send(&self, smtp: &SmtpSettings, email: EmailData) -> Result<String, MailError> {
        validate_smtp_settings(smtp)?;
        if let Some(reason) = &self.fail_with {
            return Err(MailError::Transport(reason.clone()));
        }
        let (_, message_id) = build_message(smtp, email.clone())?;
        tracing::info!(to = %email.to, subject = %email.subject, "email recorded");
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("mailer mutex poisoned".to_string()))?
            .push(email);
        Ok(message_id)
    }
}
