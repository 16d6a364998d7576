//! `{{variable}}` email templates.

use std::collections::BTreeMap;

use time::Date;

use crate::dates;
use crate::models::{Client, Company, EmailTemplate, Invoice, InvoiceStatus, TemplateType};
use crate::status;

pub type TemplateVariables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Replaces every occurrence of `{{key}}` for each known key. Placeholders
/// without a matching key are left in place.
pub fn replace_template_variables(template: &str, vars: &TemplateVariables) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{key}}}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

pub struct StatusPresentation {
    pub message: &'static str,
    pub color: &'static str,
    pub urgency: &'static str,
}

pub fn status_presentation(status: InvoiceStatus) -> StatusPresentation {
    match status {
        InvoiceStatus::Paid => StatusPresentation {
            message: "Thank you for your payment! This invoice has been marked as paid.",
            color: "#16a34a",
            urgency: "confirmation",
        },
        InvoiceStatus::Overdue => StatusPresentation {
            message: "This invoice is now overdue. Please arrange payment as soon as possible to avoid any service interruptions.",
            color: "#dc2626",
            urgency: "urgent",
        },
        InvoiceStatus::Sent => StatusPresentation {
            message: "This invoice is awaiting payment. Please review the details and process payment by the due date.",
            color: "#ea580c",
            urgency: "normal",
        },
        InvoiceStatus::Draft => StatusPresentation {
            message: "Please review the attached invoice and process payment by the due date.",
            color: "#2563eb",
            urgency: "normal",
        },
    }
}

pub fn invoice_variables(invoice: &Invoice, client: &Client, company: &Company) -> TemplateVariables {
    let presentation = status_presentation(invoice.status);
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let pairs: [(&str, String); 15] = [
        ("invoiceNumber", invoice.display_number().to_string()),
        ("clientName", non_empty(&client.name, "Valued Customer").to_string()),
        ("companyName", non_empty(&company.name, "Your Company").to_string()),
        ("total", format!("{:.2}", invoice.total)),
        ("dueDate", dates::format_display(invoice.due_date)),
        ("issueDate", dates::format_display(invoice.issue_date)),
        ("clientEmail", client.email.clone()),
        ("companyEmail", company.email.clone()),
        ("companyPhone", opt(&company.phone)),
        ("companyAddress", company.address.clone()),
        ("companyWebsite", opt(&company.website)),
        ("invoiceStatus", invoice.status.label().to_string()),
        ("statusMessage", presentation.message.to_string()),
        ("statusColor", presentation.color.to_string()),
        ("urgencyLevel", presentation.urgency.to_string()),
    ];

    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub fn overdue_variables(
    invoice: &Invoice,
    client: &Client,
    company: &Company,
    today: Date,
) -> TemplateVariables {
    let mut vars = invoice_variables(invoice, client, company);
    vars.insert(
        "daysOverdue".to_string(),
        status::days_overdue(invoice.due_date, today).to_string(),
    );
    vars
}

pub fn default_subject(kind: TemplateType, status: InvoiceStatus) -> &'static str {
    match (kind, status) {
        (TemplateType::Invoice, InvoiceStatus::Paid) => {
            "Payment Confirmation - Invoice {{invoiceNumber}} from {{companyName}}"
        }
        (TemplateType::Invoice, InvoiceStatus::Overdue) => {
            "OVERDUE: Invoice {{invoiceNumber}} - Immediate Action Required"
        }
        (TemplateType::Invoice, _) => "Invoice {{invoiceNumber}} from {{companyName}} - Due {{dueDate}}",
        (TemplateType::Reminder, _) => "Friendly Reminder: Invoice {{invoiceNumber}} Payment Due",
        (TemplateType::Overdue, _) => {
            "URGENT: Overdue Payment - Invoice {{invoiceNumber}} Requires Immediate Attention"
        }
    }
}

pub fn default_body(kind: TemplateType) -> &'static str {
    match kind {
        TemplateType::Invoice => DEFAULT_INVOICE_BODY,
        TemplateType::Reminder => DEFAULT_REMINDER_BODY,
        TemplateType::Overdue => DEFAULT_OVERDUE_BODY,
    }
}

/// Subject and HTML body for `kind`, using the stored template when given.
/// Values substituted into the body are HTML-escaped.
pub fn render_email(
    kind: TemplateType,
    template: Option<&EmailTemplate>,
    status: InvoiceStatus,
    vars: &TemplateVariables,
) -> RenderedEmail {
    let subject_src = template
        .map(|t| t.subject.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_subject(kind, status));
    let body_src = template
        .map(|t| t.body.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_body(kind));

    let escaped: TemplateVariables = vars
        .iter()
        .map(|(k, v)| (k.clone(), escape_html(v)))
        .collect();

    RenderedEmail {
        subject: replace_template_variables(subject_src, vars),
        html: replace_template_variables(body_src, &escaped),
    }
}

pub fn initial_email_templates() -> Vec<EmailTemplate> {
    vec![
        EmailTemplate {
            id: "default-invoice".to_string(),
            name: "Default Invoice Email".to_string(),
            subject: "Invoice {{invoiceNumber}} from {{companyName}}".to_string(),
            body: "<h2>Invoice {{invoiceNumber}}</h2>\n<p>Dear {{clientName}},</p>\n<p>Please find attached your invoice for the amount of ${{total}}.</p>\n<p>Due date: {{dueDate}}</p>\n<p>Thank you for your business!</p>\n<br>\n<p>Best regards,<br>{{companyName}}</p>".to_string(),
            kind: TemplateType::Invoice,
        },
        EmailTemplate {
            id: "default-reminder".to_string(),
            name: "Default Payment Reminder".to_string(),
            subject: "Payment Reminder - Invoice {{invoiceNumber}}".to_string(),
            body: "<h2>Payment Reminder</h2>\n<p>Dear {{clientName}},</p>\n<p>This is a friendly reminder that invoice {{invoiceNumber}} for ${{total}} is still pending payment.</p>\n<p>Due date: {{dueDate}}</p>\n<p>Please process the payment at your earliest convenience.</p>\n<br>\n<p>Best regards,<br>{{companyName}}</p>".to_string(),
            kind: TemplateType::Reminder,
        },
        EmailTemplate {
            id: "default-overdue".to_string(),
            name: "Default Overdue Notice".to_string(),
            subject: "OVERDUE: Invoice {{invoiceNumber}}".to_string(),
            body: "<h2>Overdue Payment Notice</h2>\n<p>Dear {{clientName}},</p>\n<p><strong>URGENT:</strong> Invoice {{invoiceNumber}} for ${{total}} is now overdue.</p>\n<p>Original due date: {{dueDate}}</p>\n<p>Please contact us immediately to resolve this matter.</p>\n<br>\n<p>Best regards,<br>{{companyName}}</p>".to_string(),
            kind: TemplateType::Overdue,
        },
    ]
}

const DEFAULT_INVOICE_BODY: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Invoice {{invoiceNumber}}</title></head>
<body style="margin:0;padding:0;background:#f9fafb;font-family:-apple-system,'Segoe UI',Roboto,sans-serif;color:#374151;line-height:1.6;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr><td align="center" style="padding:24px 12px;">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:12px;overflow:hidden;">
<tr><td style="background:{{statusColor}};color:#ffffff;padding:32px 24px;text-align:center;">
<h1 style="margin:0 0 8px 0;font-size:28px;">Invoice {{invoiceNumber}}</h1>
<p style="margin:0;font-size:16px;">from {{companyName}}</p>
</td></tr>
<tr><td style="padding:32px 24px;">
<p style="font-size:18px;color:#1f2937;">Dear {{clientName}},</p>
<p style="display:inline-block;padding:6px 14px;border-radius:20px;border:2px solid {{statusColor}};color:{{statusColor}};font-weight:600;text-transform:uppercase;">{{invoiceStatus}}</p>
<p style="background:#f8fafc;border-left:4px solid {{statusColor}};padding:16px;">{{statusMessage}}</p>
<table role="presentation" width="100%" cellpadding="6" cellspacing="0" style="background:#f8fafc;border-radius:8px;">
<tr><td style="color:#6b7280;">Invoice Number</td><td align="right"><strong>{{invoiceNumber}}</strong></td></tr>
<tr><td style="color:#6b7280;">Issue Date</td><td align="right">{{issueDate}}</td></tr>
<tr><td style="color:#6b7280;">Due Date</td><td align="right">{{dueDate}}</td></tr>
<tr><td style="color:#6b7280;border-top:2px solid #e5e7eb;"><strong>Amount Due</strong></td><td align="right" style="border-top:2px solid #e5e7eb;font-size:18px;"><strong>${{total}}</strong></td></tr>
</table>
<p>The invoice is attached to this email as a PDF. If you have any questions, reply to this message or contact us at {{companyEmail}}.</p>
<p>Thank you for your business!</p>
</td></tr>
<tr><td style="background:#f9fafb;padding:20px 24px;text-align:center;font-size:13px;color:#6b7280;">
<p style="margin:0;"><strong>{{companyName}}</strong></p>
<p style="margin:0;">{{companyAddress}}</p>
<p style="margin:0;">{{companyEmail}} | {{companyPhone}} | {{companyWebsite}}</p>
</td></tr>
</table>
</td></tr></table>
</body>
</html>"#;

const DEFAULT_REMINDER_BODY: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Payment Reminder - Invoice {{invoiceNumber}}</title></head>
<body style="margin:0;padding:0;background:#f9fafb;font-family:-apple-system,'Segoe UI',Roboto,sans-serif;color:#374151;line-height:1.6;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr><td align="center" style="padding:24px 12px;">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:12px;overflow:hidden;">
<tr><td style="background:#f59e0b;color:#ffffff;padding:32px 24px;text-align:center;">
<h1 style="margin:0 0 8px 0;font-size:26px;">Friendly Payment Reminder</h1>
<p style="margin:0;">Invoice {{invoiceNumber}}</p>
</td></tr>
<tr><td style="padding:32px 24px;">
<p style="font-size:18px;color:#1f2937;">Dear {{clientName}},</p>
<p>This is a friendly reminder that the invoice below is still awaiting payment.</p>
<table role="presentation" width="100%" cellpadding="6" cellspacing="0" style="background:#fffbeb;border-left:4px solid #f59e0b;">
<tr><td style="color:#6b7280;">Invoice Number</td><td align="right"><strong>{{invoiceNumber}}</strong></td></tr>
<tr><td style="color:#6b7280;">Issue Date</td><td align="right">{{issueDate}}</td></tr>
<tr><td style="color:#6b7280;">Due Date</td><td align="right">{{dueDate}}</td></tr>
<tr><td style="color:#6b7280;"><strong>Amount Due</strong></td><td align="right"><strong>${{total}}</strong></td></tr>
</table>
<p>If you have already processed this payment, please disregard this message, and thank you!</p>
<p>If you have any questions about this invoice or would like to discuss payment arrangements, please reach out.</p>
</td></tr>
<tr><td style="background:#f9fafb;padding:20px 24px;text-align:center;font-size:13px;color:#6b7280;">
<p style="margin:0;"><strong>{{companyName}}</strong></p>
<p style="margin:0;">{{companyEmail}} | {{companyPhone}}</p>
</td></tr>
</table>
</td></tr></table>
</body>
</html>"#;

const DEFAULT_OVERDUE_BODY: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Overdue Notice - Invoice {{invoiceNumber}}</title></head>
<body style="margin:0;padding:0;background:#fef2f2;font-family:-apple-system,'Segoe UI',Roboto,sans-serif;color:#374151;line-height:1.6;">
<table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr><td align="center" style="padding:24px 12px;">
<table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:12px;overflow:hidden;border:2px solid #dc2626;">
<tr><td style="background:#dc2626;color:#ffffff;padding:32px 24px;text-align:center;">
<h1 style="margin:0 0 8px 0;font-size:26px;">Overdue Payment Notice</h1>
<p style="margin:0;">Invoice {{invoiceNumber}} is {{daysOverdue}} days past due</p>
</td></tr>
<tr><td style="padding:32px 24px;">
<p style="font-size:18px;color:#1f2937;">Dear {{clientName}},</p>
<p><strong>URGENT:</strong> our records show that payment for the invoice below has not been received.</p>
<table role="presentation" width="100%" cellpadding="6" cellspacing="0" style="background:#fef2f2;border-left:4px solid #dc2626;">
<tr><td style="color:#6b7280;">Invoice Number</td><td align="right"><strong>{{invoiceNumber}}</strong></td></tr>
<tr><td style="color:#6b7280;">Original Due Date</td><td align="right">{{dueDate}}</td></tr>
<tr><td style="color:#6b7280;">Days Overdue</td><td align="right"><strong>{{daysOverdue}} days</strong></td></tr>
<tr><td style="color:#6b7280;"><strong>Amount Due</strong></td><td align="right"><strong>${{total}}</strong></td></tr>
</table>
<p>Please arrange payment immediately or contact us to discuss this matter.</p>
</td></tr>
<tr><td style="background:#f9fafb;padding:20px 24px;text-align:center;font-size:13px;color:#6b7280;">
<p style="margin:0;"><strong>{{companyName}}</strong></p>
<p style="margin:0;">{{companyEmail}} | {{companyPhone}}</p>
</td></tr>
</table>
</td></tr></table>
</body>
</html>"#;
