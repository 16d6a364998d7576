//! HTTP client for the proxy endpoints and the send-then-record workflows.

use serde_json::json;
use time::{Date, OffsetDateTime};

use crate::db::{DbState, EmailOutcome, StoreError};
use crate::mail::{EmailAttachment, EmailData};
use crate::models::{Client, Company, EmailTemplate, Invoice, InvoiceStatus, SmtpSettings, TemplateType};
use crate::templates;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
}

#[derive(Clone)]
pub struct EmailService {
    client: reqwest::Client,
    base_url: String,
}

impl EmailService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `true` on a 2xx response; transport errors are logged and read as failure.
    pub async fn send_email(&self, smtp: &SmtpSettings, email: &EmailData) -> bool {
        let url = format!("{}/api/send-email", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&json!({ "smtpSettings": smtp, "emailData": email }))
            .send()
            .await;
        match res {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                tracing::error!(%url, %status, body = %body, "send-email rejected");
                false
            }
            Err(e) => {
                tracing::error!(%url, error = %e, "send-email request failed");
                false
            }
        }
    }

    pub async fn generate_invoice_pdf(&self, invoice: &Invoice, client: &Client, company: &Company) -> Option<Vec<u8>> {
        let url = format!("{}/api/generate-pdf", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&json!({ "invoice": invoice, "client": client, "company": company }))
            .send()
            .await;
        let res = match res {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%url, error = %e, "generate-pdf request failed");
                return None;
            }
        };
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            tracing::error!(invoice = %invoice.display_number(), %status, body = %body, "pdf generation rejected");
            return None;
        }
        match res.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::error!(%url, error = %e, "failed to read pdf body");
                None
            }
        }
    }

    /// Sends the invoice email with its PDF attached when the PDF can be
    /// generated, and without it otherwise.
    pub async fn send_invoice(
        &self,
        invoice: &Invoice,
        client: &Client,
        company: &Company,
        smtp: &SmtpSettings,
        template: Option<&EmailTemplate>,
    ) -> bool {
        if !client.email.contains('@') {
            tracing::error!(email = %client.email, "invalid client email address");
            return false;
        }
        if !smtp.is_complete() {
            tracing::error!("incomplete SMTP settings");
            return false;
        }

        let vars = templates::invoice_variables(invoice, client, company);
        let rendered = templates::render_email(TemplateType::Invoice, template, invoice.status, &vars);
        let mut email = EmailData {
            to: client.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            attachments: Vec::new(),
        };

        match self.generate_invoice_pdf(invoice, client, company).await {
            Some(pdf) => email.attachments.push(EmailAttachment::pdf(invoice.pdf_file_name(), &pdf)),
            None => tracing::warn!(invoice = %invoice.display_number(), "sending without pdf attachment"),
        }

        self.send_email(smtp, &email).await
    }

    pub async fn send_reminder(
        &self,
        invoice: &Invoice,
        client: &Client,
        company: &Company,
        smtp: &SmtpSettings,
        template: Option<&EmailTemplate>,
    ) -> bool {
        let vars = templates::invoice_variables(invoice, client, company);
        let email = plain_email(client, TemplateType::Reminder, template, invoice.status, &vars);
        self.send_email(smtp, &email).await
    }

    pub async fn send_overdue_notice(
        &self,
        invoice: &Invoice,
        client: &Client,
        company: &Company,
        smtp: &SmtpSettings,
        template: Option<&EmailTemplate>,
        today: Date,
    ) -> bool {
        let vars = templates::overdue_variables(invoice, client, company, today);
        let email = plain_email(client, TemplateType::Overdue, template, invoice.status, &vars);
        self.send_email(smtp, &email).await
    }
}

fn plain_email(
    client: &Client,
    kind: TemplateType,
    template: Option<&EmailTemplate>,
    status: InvoiceStatus,
    vars: &templates::TemplateVariables,
) -> EmailData {
    let rendered = templates::render_email(kind, template, status, vars);
    EmailData {
        to: client.email.clone(),
        subject: rendered.subject,
        html: rendered.html,
        attachments: Vec::new(),
    }
}

/// Loads everything a send needs, sends the `kind` email and records the
/// outcome on the invoice. Returns whether the email went out.
pub async fn send_and_mark(
    store: &DbState,
    service: &EmailService,
    invoice_id: &str,
    kind: TemplateType,
    now: OffsetDateTime,
) -> Result<bool, SendError> {
    let invoice = store
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| SendError::NotFound {
            kind: "invoice",
            id: invoice_id.to_string(),
        })?;
    let client = store
        .get_client(&invoice.client_id)
        .await?
        .ok_or_else(|| SendError::NotFound {
            kind: "client",
            id: invoice.client_id.clone(),
        })?;
    let company = store.get_company().await?;
    let settings = store.get_settings().await?;
    let template = settings.template_for(kind);

    let sent = match kind {
        TemplateType::Invoice => {
            service
                .send_invoice(&invoice, &client, &company, &settings.smtp, template)
                .await
        }
        TemplateType::Reminder => {
            service
                .send_reminder(&invoice, &client, &company, &settings.smtp, template)
                .await
        }
        TemplateType::Overdue => {
            service
                .send_overdue_notice(&invoice, &client, &company, &settings.smtp, template, now.date())
                .await
        }
    };
    if !sent {
        return Ok(false);
    }

    let outcome = match kind {
        TemplateType::Invoice => EmailOutcome::InvoiceSent,
        TemplateType::Reminder | TemplateType::Overdue => EmailOutcome::ReminderSent(now),
    };
    store.record_email_outcome(invoice_id, outcome).await?;
    tracing::info!(invoice = %invoice.display_number(), to = %client.email, "invoice email recorded");
    Ok(true)
}

/// Sends the invoice; on success sets `emailSent` and moves a draft to sent.
pub async fn send_invoice_and_mark(
    store: &DbState,
    service: &EmailService,
    invoice_id: &str,
    now: OffsetDateTime,
) -> Result<bool, SendError> {
    send_and_mark(store, service, invoice_id, TemplateType::Invoice, now).await
}

/// Sends a payment reminder; on success records `lastReminderSent`.
pub async fn send_reminder_and_mark(
    store: &DbState,
    service: &EmailService,
    invoice_id: &str,
    now: OffsetDateTime,
) -> Result<bool, SendError> {
    send_and_mark(store, service, invoice_id, TemplateType::Reminder, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_client, sample_company, sample_invoice, sample_smtp};
    use time::macros::datetime;

    /// Nothing listens on port 9 of localhost.
    fn unreachable() -> EmailService {
        EmailService::new("http://127.0.0.1:9/")
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        assert_eq!(unreachable().base_url(), "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn send_invoice_rejects_bad_client_email_before_any_request() {
        let mut client = sample_client();
        client.email = "acme.test".to_string();
        let ok = unreachable()
            .send_invoice(&sample_invoice(), &client, &sample_company(), &sample_smtp(), None)
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn transport_failures_read_as_false() {
        let svc = unreachable();
        assert!(svc
            .generate_invoice_pdf(&sample_invoice(), &sample_client(), &sample_company())
            .await
            .is_none());
        let ok = svc
            .send_reminder(&sample_invoice(), &sample_client(), &sample_company(), &sample_smtp(), None)
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn failed_send_leaves_invoice_untouched() {
        let store = DbState::open_in_memory().unwrap();
        store.add_client(sample_client()).await.unwrap();
        store
            .add_invoice(sample_invoice(), time::macros::date!(2026 - 10 - 01))
            .await
            .unwrap();
        let now = datetime!(2026-10-14 10:00:00 UTC);

        let sent = send_invoice_and_mark(&store, &unreachable(), "inv-1", now).await.unwrap();
        assert!(!sent);
        let inv = store.get_invoice("inv-1").await.unwrap().unwrap();
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert_eq!(inv.email_sent, None);

        let missing = send_reminder_and_mark(&store, &unreachable(), "nope", now).await;
        assert!(matches!(missing, Err(SendError::NotFound { kind: "invoice", .. })));
    }
}
