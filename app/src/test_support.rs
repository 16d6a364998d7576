use time::macros::date;

use crate::models::{Client, Company, Invoice, InvoiceItem, InvoiceStatus, Product, SmtpSettings};

pub fn sample_company() -> Company {
    Company {
        name: "Byte Works".to_string(),
        address: "1 Market St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: Some("62701".to_string()),
        country: "USA".to_string(),
        phone: Some("+1 555 0100".to_string()),
        email: "billing@byteworks.test".to_string(),
        website: Some("https://byteworks.test".to_string()),
        tax_id: Some("TX-42".to_string()),
        logo: None,
    }
}

pub fn sample_client() -> Client {
    Client {
        id: "c-1".to_string(),
        name: "Acme".to_string(),
        email: "ap@acme.test".to_string(),
        phone: None,
        address: "9 Elm Rd".to_string(),
        city: "Shelbyville".to_string(),
        state: "IL".to_string(),
        zip_code: None,
        country: "USA".to_string(),
        advance_payment: None,
    }
}

pub fn sample_product() -> Product {
    Product {
        id: "p-1".to_string(),
        name: "Consulting".to_string(),
        description: "Hourly consulting".to_string(),
        price: Some(50.0),
        sku: "SER-CON-101".to_string(),
        category: "Services".to_string(),
    }
}

pub fn sample_invoice() -> Invoice {
    Invoice {
        id: "inv-1".to_string(),
        invoice_number: "INV-202610-0001".to_string(),
        client_id: "c-1".to_string(),
        client_name: "Acme".to_string(),
        issue_date: date!(2026 - 10 - 01),
        due_date: date!(2026 - 10 - 31),
        items: vec![InvoiceItem {
            product_id: "p-1".to_string(),
            product_name: "Consulting".to_string(),
            description: "Hourly consulting".to_string(),
            quantity: 2.0,
            unit_price: 50.0,
            total: 0.0,
        }],
        subtotal: 0.0,
        tax_rate: 10.0,
        tax_amount: 0.0,
        discount_rate: 0.0,
        discount_amount: 0.0,
        total: 0.0,
        status: InvoiceStatus::Draft,
        notes: None,
        email_sent: None,
        last_reminder_sent: None,
    }
}

pub fn sample_smtp() -> SmtpSettings {
    SmtpSettings {
        host: "smtp.byteworks.test".to_string(),
        port: 587,
        secure: false,
        username: "mailer".to_string(),
        password: "secret".to_string(),
        from_name: "Byte Works".to_string(),
        from_email: "billing@byteworks.test".to_string(),
    }
}
