use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use validator::Validate;

use crate::calculations;
use crate::dates;
use crate::templates;

pub const APP_VERSION: &str = "1.0.0";
pub const DEFAULT_DUE_DAYS: i64 = 30;
pub const DEFAULT_TAX_RATE: f64 = 0.0;
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.0;
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[validate(length(min = 1, code = "required"))]
    pub name: String,
    #[validate(length(min = 1, code = "required"))]
    pub address: String,
    #[validate(length(min = 1, code = "required"))]
    pub city: String,
    #[validate(length(min = 1, code = "required"))]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[validate(length(min = 1, code = "required"))]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(email(code = "email"))]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// `data:image/*;base64,...`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    #[validate(length(min = 1, code = "required"))]
    pub name: String,
    #[validate(email(code = "email"))]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(length(min = 1, code = "required"))]
    pub address: String,
    #[validate(length(min = 1, code = "required"))]
    pub city: String,
    #[validate(length(min = 1, code = "required"))]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[validate(length(min = 1, code = "required"))]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, code = "positive"))]
    pub advance_payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[validate(length(min = 1, code = "required"))]
    pub name: String,
    #[validate(length(min = 1, code = "required"))]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, code = "positive"))]
    pub price: Option<f64>,
    #[validate(length(min = 1, code = "required"))]
    pub sku: String,
    #[validate(length(min = 1, code = "required"))]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    #[validate(length(min = 1, code = "required"))]
    pub product_id: String,
    #[validate(length(min = 1, code = "required"))]
    pub product_name: String,
    #[validate(length(min = 1, code = "required"))]
    pub description: String,
    #[validate(range(min = 1.0, code = "min_quantity"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, code = "positive"))]
    pub unit_price: f64,
    #[serde(default)]
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Sent => "Sent",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown invoice status: {wanted}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    #[validate(length(min = 1, code = "required"))]
    pub client_id: String,
    pub client_name: String,
    #[serde(with = "dates::ymd")]
    pub issue_date: Date,
    #[serde(with = "dates::ymd")]
    pub due_date: Date,
    #[validate(length(min = 1, code = "min_items"))]
    #[validate(nested)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[validate(range(min = 0.0, max = 100.0, code = "max_percentage"))]
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[validate(range(min = 0.0, max = 100.0, code = "max_percentage"))]
    #[serde(default)]
    pub discount_rate: f64,
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "dates::rfc3339_option"
    )]
    pub last_reminder_sent: Option<OffsetDateTime>,
}

impl Invoice {
    /// Rewrites every line total and the derived amounts from quantities,
    /// prices and rates.
    pub fn recalculate(&mut self) {
        for item in self.items.iter_mut() {
            item.total = calculations::calculate_item_total(item.quantity, item.unit_price);
        }
        let totals = calculations::calculate_totals(&self.items, self.tax_rate, self.discount_rate);
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.tax_amount = totals.tax_amount;
        self.total = totals.total;
    }

    /// The invoice number, the id when the number is blank, or `N/A`.
    pub fn display_number(&self) -> &str {
        let number = self.invoice_number.trim();
        if !number.is_empty() {
            return number;
        }
        let id = self.id.trim();
        if !id.is_empty() {
            return id;
        }
        "N/A"
    }

    pub fn pdf_file_name(&self) -> String {
        format!("invoice-{}.pdf", self.display_number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub from_email: String,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            secure: false,
            username: String::new(),
            password: String::new(),
            from_name: String::new(),
            from_email: String::new(),
        }
    }
}

impl SmtpSettings {
    /// Host, username and password are all set.
    pub fn is_complete(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Invoice,
    Reminder,
    Overdue,
}

impl std::str::FromStr for TemplateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" => Ok(TemplateType::Invoice),
            "reminder" => Ok(TemplateType::Reminder),
            "overdue" => Ok(TemplateType::Overdue),
            other => Err(format!("unknown template type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: TemplateType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default = "templates::initial_email_templates")]
    pub email_templates: Vec<EmailTemplate>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            smtp: SmtpSettings::default(),
            email_templates: templates::initial_email_templates(),
        }
    }
}

impl AppSettings {
    /// First stored template of the given kind.
    pub fn template_for(&self, kind: TemplateType) -> Option<&EmailTemplate> {
        self.email_templates.iter().find(|t| t.kind == kind)
    }
}

/// The export/import document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub company: Company,
    pub clients: Vec<Client>,
    pub products: Vec<Product>,
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub settings: AppSettings,
    pub version: String,
    #[serde(with = "dates::rfc3339")]
    pub export_date: OffsetDateTime,
}
