//! Local document store.
//!
//! Every entity is kept as a JSON document (`data_json`) next to a few
//! indexed columns. Row order follows insertion order, which is the order the
//! export file lists entities in.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::dates;
use crate::generators;
use crate::models::{AppData, AppSettings, Client, Company, Invoice, InvoiceStatus, Product, APP_VERSION};
use crate::status;
use crate::validation::{self, InvalidInput};

const SINGLETON_ID: &str = "default";
const SCHEMA_VERSION: i64 = 1;

/// What a delivered email leaves on its invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOutcome {
    /// `emailSent = true`, and a draft becomes sent.
    InvoiceSent,
    /// `lastReminderSent` is stamped.
    ReminderSent(OffsetDateTime),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}", sqlite_error_string(.0))]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid stored document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(#[from] InvalidInput),
    #[error("{kind} {id} already exists")]
    Duplicate { kind: &'static str, id: String },
    #[error("patch must be a JSON object")]
    InvalidPatch,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

fn sqlite_error_string(err: &rusqlite::Error) -> String {
    let rusqlite::Error::SqliteFailure(failure, msg) = err else {
        return err.to_string();
    };
    format!(
        "sqlite {:?} ({}): {}",
        failure.code,
        failure.extended_code,
        msg.as_deref().unwrap_or("no message")
    )
}

/// WAL only applies to file-backed stores.
fn configure_sqlite(conn: &Connection, file_backed: bool) -> Result<(), rusqlite::Error> {
    if file_backed {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    }
    conn.busy_timeout(Duration::from_secs(5))
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS app_meta (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS company (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            data_json TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY NOT NULL,
            data_json TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            data_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            sku TEXT NOT NULL,
            category TEXT NOT NULL,
            data_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY NOT NULL,
            invoiceNumber TEXT NOT NULL,
            clientId TEXT NOT NULL,
            status TEXT NOT NULL,
            issueDate TEXT NOT NULL,
            dueDate TEXT NOT NULL,
            total REAL NOT NULL,
            data_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_invoices_clientId ON invoices(clientId);
        CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status);
        CREATE INDEX IF NOT EXISTS idx_invoices_issueDate ON invoices(issueDate);
        "#,
    )
}

fn apply_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    // v=0 is a fresh file: init_schema already created the latest tables.
    if v < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    Ok(())
}

fn meta_get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM app_meta WHERE key = ?1", [key], |r| r.get(0))
        .optional()
}

fn meta_set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute("INSERT OR REPLACE INTO app_meta (key, value) VALUES (?1, ?2)", [key, value])
        .map(drop)
}

/// A collection entity stored one row per document.
trait Document: Serialize + DeserializeOwned + Send + 'static {
    const TABLE: &'static str;
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn write(&self, conn: &Connection) -> Result<(), StoreError>;

    fn check_fields(&self) -> Result<(), InvalidInput>;

    /// Runs before every add or update.
    fn normalize(&mut self) {}
}

impl Document for Client {
    const TABLE: &'static str = "clients";
    const KIND: &'static str = "client";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn write(&self, conn: &Connection) -> Result<(), StoreError> {
        let json = serde_json::to_string(self)?;
        conn.execute(
            r#"INSERT INTO clients (id, name, email, data_json) VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email, data_json = excluded.data_json"#,
            params![self.id, self.name, self.email, json],
        )?;
        Ok(())
    }

    fn check_fields(&self) -> Result<(), InvalidInput> {
        validation::check(self)
    }
}

impl Document for Product {
    const TABLE: &'static str = "products";
    const KIND: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn write(&self, conn: &Connection) -> Result<(), StoreError> {
        let json = serde_json::to_string(self)?;
        conn.execute(
            r#"INSERT INTO products (id, name, sku, category, data_json) VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name, sku = excluded.sku,
                   category = excluded.category, data_json = excluded.data_json"#,
            params![self.id, self.name, self.sku, self.category, json],
        )?;
        Ok(())
    }

    fn check_fields(&self) -> Result<(), InvalidInput> {
        validation::check(self)
    }
}

impl Document for Invoice {
    const TABLE: &'static str = "invoices";
    const KIND: &'static str = "invoice";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn write(&self, conn: &Connection) -> Result<(), StoreError> {
        let json = serde_json::to_string(self)?;
        conn.execute(
            r#"INSERT INTO invoices (id, invoiceNumber, clientId, status, issueDate, dueDate, total, data_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(id) DO UPDATE SET invoiceNumber = excluded.invoiceNumber,
                   clientId = excluded.clientId, status = excluded.status,
                   issueDate = excluded.issueDate, dueDate = excluded.dueDate,
                   total = excluded.total, data_json = excluded.data_json"#,
            params![
                self.id,
                self.invoice_number,
                self.client_id,
                self.status.as_str(),
                dates::format_ymd(self.issue_date),
                dates::format_ymd(self.due_date),
                self.total,
                json,
            ],
        )?;
        Ok(())
    }

    fn check_fields(&self) -> Result<(), InvalidInput> {
        validation::check(self)
    }

    fn normalize(&mut self) {
        self.recalculate();
    }
}

fn read_doc<T: Document>(conn: &Connection, id: &str) -> Result<Option<T>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            &format!("SELECT data_json FROM {} WHERE id = ?1", T::TABLE),
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

fn list_docs<T: Document>(conn: &Connection) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT id, data_json FROM {} ORDER BY rowid ASC", T::TABLE))?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let json: String = row.get(1)?;
        match serde_json::from_str::<T>(&json) {
            Ok(doc) => out.push(doc),
            Err(e) => tracing::warn!(table = T::TABLE, id = %id, error = %e, "skipping unreadable document"),
        }
    }
    Ok(out)
}

fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT 1 FROM {table} WHERE id = ?1"),
        params![id],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
}

/// `{...existing, ...patch}`; the id is kept.
fn merge_patch<T: Document>(existing: &T, patch: &serde_json::Value) -> Result<T, StoreError> {
    let src = patch.as_object().ok_or(StoreError::InvalidPatch)?;
    let mut doc = serde_json::to_value(existing)?;
    let target = doc.as_object_mut().ok_or(StoreError::InvalidPatch)?;
    for (key, value) in src {
        if key == "id" {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
    Ok(serde_json::from_value(doc)?)
}

fn read_singleton<T: DeserializeOwned>(conn: &Connection, table: &str) -> Result<Option<T>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            &format!("SELECT data_json FROM {table} WHERE id = ?1"),
            params![SINGLETON_ID],
            |r| r.get(0),
        )
        .optional()?;
    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

fn write_company(conn: &Connection, company: &Company) -> Result<(), StoreError> {
    let json = serde_json::to_string(company)?;
    conn.execute(
        r#"INSERT INTO company (id, name, data_json, updatedAt) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(id) DO UPDATE SET name = excluded.name, data_json = excluded.data_json,
               updatedAt = excluded.updatedAt"#,
        params![SINGLETON_ID, company.name, json, dates::now_iso()],
    )?;
    Ok(())
}

fn write_settings(conn: &Connection, settings: &AppSettings) -> Result<(), StoreError> {
    let json = serde_json::to_string(settings)?;
    conn.execute(
        r#"INSERT INTO settings (id, data_json, updatedAt) VALUES (?1, ?2, ?3)
           ON CONFLICT(id) DO UPDATE SET data_json = excluded.data_json, updatedAt = excluded.updatedAt"#,
        params![SINGLETON_ID, json, dates::now_iso()],
    )?;
    Ok(())
}

fn clear_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "DELETE FROM invoices;\n\
         DELETE FROM products;\n\
         DELETE FROM clients;\n\
         DELETE FROM company;\n\
         DELETE FROM settings;\n",
    )
}

#[derive(Clone)]
pub struct DbState {
    conn: Arc<Mutex<Connection>>,
    write_lock: Arc<Mutex<()>>,
}

impl DbState {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?, true)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, false)
    }

    fn init(conn: Connection, file_backed: bool) -> Result<Self, StoreError> {
        configure_sqlite(&conn, file_backed)?;
        init_schema(&conn)?;
        apply_migrations(&conn)?;
        if meta_get(&conn, "createdWithVersion")?.is_none() {
            meta_set(&conn, "createdWithVersion", APP_VERSION)?;
        }
        meta_set(&conn, "lastOpenedAt", &dates::now_iso())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn with_read<T, F>(&self, op_name: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Internal("db mutex poisoned".to_string()))?;
            f(&guard).map_err(|e| {
                tracing::error!(op = op_name, error = %e, "store read failed");
                e
            })
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
    }

    async fn with_write<T, F>(&self, op_name: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        let write_lock = self.write_lock.clone();
        tokio::task::spawn_blocking(move || {
            let _wg = write_lock
                .lock()
                .map_err(|_| StoreError::Internal("write mutex poisoned".to_string()))?;
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Internal("db mutex poisoned".to_string()))?;
            f(&mut guard).map_err(|e| {
                tracing::error!(op = op_name, error = %e, "store write failed");
                e
            })
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
    }

    pub async fn meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.with_read("meta", move |conn| Ok(meta_get(conn, &key)?))
            .await
    }

    // --- company / settings -------------------------------------------------

    pub async fn get_company(&self) -> Result<Company, StoreError> {
        self.with_read("get_company", |conn| {
            Ok(read_singleton::<Company>(conn, "company")?.unwrap_or_default())
        })
        .await
    }

    pub async fn set_company(&self, company: Company) -> Result<Company, StoreError> {
        validation::check(&company)?;
        self.with_write("set_company", move |conn| {
            write_company(conn, &company)?;
            Ok(company)
        })
        .await
    }

    pub async fn get_settings(&self) -> Result<AppSettings, StoreError> {
        self.with_read("get_settings", |conn| {
            Ok(read_singleton::<AppSettings>(conn, "settings")?.unwrap_or_default())
        })
        .await
    }

    pub async fn set_settings(&self, settings: AppSettings) -> Result<AppSettings, StoreError> {
        self.with_write("set_settings", move |conn| {
            write_settings(conn, &settings)?;
            Ok(settings)
        })
        .await
    }

    // --- collections ----------------------------------------------------------

    async fn list<T: Document>(&self, op: &'static str) -> Result<Vec<T>, StoreError> {
        self.with_read(op, |conn| list_docs::<T>(conn)).await
    }

    async fn get<T: Document>(&self, op: &'static str, id: &str) -> Result<Option<T>, StoreError> {
        let id = id.to_string();
        self.with_read(op, move |conn| read_doc::<T>(conn, &id)).await
    }

    async fn add<T: Document>(&self, op: &'static str, mut doc: T) -> Result<T, StoreError> {
        if doc.id().trim().is_empty() {
            doc.set_id(generators::generate_id());
        }
        doc.normalize();
        doc.check_fields()?;
        self.with_write(op, move |conn| {
            if exists(conn, T::TABLE, doc.id())? {
                return Err(StoreError::Duplicate {
                    kind: T::KIND,
                    id: doc.id().to_string(),
                });
            }
            doc.write(conn)?;
            Ok(doc)
        })
        .await
    }

    async fn update<T: Document>(
        &self,
        op: &'static str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Option<T>, StoreError> {
        let id = id.to_string();
        self.with_write(op, move |conn| {
            let Some(existing) = read_doc::<T>(conn, &id)? else {
                return Ok(None);
            };
            let mut updated = merge_patch(&existing, &patch)?;
            updated.normalize();
            updated.check_fields()?;
            updated.write(conn)?;
            Ok(Some(updated))
        })
        .await
    }

    async fn delete<T: Document>(&self, op: &'static str, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_write(op, move |conn| {
            let n = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", T::TABLE), params![id])?;
            Ok(n > 0)
        })
        .await
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        self.list("list_clients").await
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<Client>, StoreError> {
        self.get("get_client", id).await
    }

    pub async fn add_client(&self, client: Client) -> Result<Client, StoreError> {
        self.add("add_client", client).await
    }

    pub async fn update_client(&self, id: &str, patch: serde_json::Value) -> Result<Option<Client>, StoreError> {
        self.update("update_client", id, patch).await
    }

    pub async fn delete_client(&self, id: &str) -> Result<bool, StoreError> {
        self.delete::<Client>("delete_client", id).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.list("list_products").await
    }

    pub async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.get("get_product", id).await
    }

    pub async fn add_product(&self, product: Product) -> Result<Product, StoreError> {
        self.add("add_product", product).await
    }

    pub async fn update_product(&self, id: &str, patch: serde_json::Value) -> Result<Option<Product>, StoreError> {
        self.update("update_product", id, patch).await
    }

    pub async fn delete_product(&self, id: &str) -> Result<bool, StoreError> {
        self.delete::<Product>("delete_product", id).await
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        self.list("list_invoices").await
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        self.get("get_invoice", id).await
    }

    /// Fills a blank invoice number from the running count and a blank
    /// client name from the stored client.
    pub async fn add_invoice(&self, mut invoice: Invoice, today: Date) -> Result<Invoice, StoreError> {
        if invoice.invoice_number.trim().is_empty() {
            invoice.invoice_number = self.next_invoice_number(today).await?;
        }
        if invoice.client_name.trim().is_empty() {
            if let Some(client) = self.get_client(&invoice.client_id).await? {
                invoice.client_name = client.name;
            }
        }
        self.add("add_invoice", invoice).await
    }

    pub async fn update_invoice(&self, id: &str, patch: serde_json::Value) -> Result<Option<Invoice>, StoreError> {
        self.update("update_invoice", id, patch).await
    }

    pub async fn delete_invoice(&self, id: &str) -> Result<bool, StoreError> {
        self.delete::<Invoice>("delete_invoice", id).await
    }

    pub async fn next_invoice_number(&self, today: Date) -> Result<String, StoreError> {
        self.with_read("next_invoice_number", move |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM invoices", [], |r| r.get(0))?;
            Ok(generators::generate_invoice_number(count.max(0) as usize, today))
        })
        .await
    }

    /// Persists `sent -> overdue` for every invoice past due and returns the
    /// ids that changed.
    pub async fn mark_overdue_invoices(&self, today: Date) -> Result<Vec<String>, StoreError> {
        self.with_write("mark_overdue_invoices", move |conn| {
            let tx = conn.transaction()?;
            let mut changed = Vec::new();
            for mut invoice in list_docs::<Invoice>(&tx)? {
                let derived = status::derive_status(&invoice, today);
                if derived != invoice.status {
                    invoice.status = derived;
                    invoice.write(&tx)?;
                    changed.push(invoice.id);
                }
            }
            tx.commit()?;
            if !changed.is_empty() {
                tracing::info!(count = changed.len(), "invoices marked overdue");
            }
            Ok(changed)
        })
        .await
    }

    /// Stamps a delivered email on the stored invoice. Form rules are not
    /// re-checked; only the outcome fields change.
    pub async fn record_email_outcome(
        &self,
        id: &str,
        outcome: EmailOutcome,
    ) -> Result<Option<Invoice>, StoreError> {
        let id = id.to_string();
        self.with_write("record_email_outcome", move |conn| {
            let Some(mut invoice) = read_doc::<Invoice>(conn, &id)? else {
                return Ok(None);
            };
            match outcome {
                EmailOutcome::InvoiceSent => {
                    invoice.email_sent = Some(true);
                    if invoice.status == InvoiceStatus::Draft {
                        invoice.status = InvoiceStatus::Sent;
                    }
                }
                EmailOutcome::ReminderSent(at) => invoice.last_reminder_sent = Some(at),
            }
            invoice.write(conn)?;
            Ok(Some(invoice))
        })
        .await
    }

    // --- export / import -----------------------------------------------------

    pub async fn export_data(&self, now: OffsetDateTime) -> Result<AppData, StoreError> {
        self.with_read("export_data", move |conn| {
            Ok(AppData {
                company: read_singleton::<Company>(conn, "company")?.unwrap_or_default(),
                clients: list_docs(conn)?,
                products: list_docs(conn)?,
                invoices: list_docs(conn)?,
                settings: read_singleton::<AppSettings>(conn, "settings")?.unwrap_or_default(),
                version: APP_VERSION.to_string(),
                export_date: now,
            })
        })
        .await
    }

    /// Replaces everything with `data` in one transaction.
    pub async fn import_data(&self, data: AppData) -> Result<(), StoreError> {
        self.with_write("import_data", move |conn| {
            let tx = conn.transaction()?;
            clear_tables(&tx)?;
            write_company(&tx, &data.company)?;
            write_settings(&tx, &data.settings)?;
            for client in &data.clients {
                client.write(&tx)?;
            }
            for product in &data.products {
                product.write(&tx)?;
            }
            for invoice in &data.invoices {
                invoice.write(&tx)?;
            }
            meta_set(&tx, "lastImportAt", &dates::now_iso())?;
            tx.commit()?;
            tracing::info!(
                clients = data.clients.len(),
                products = data.products.len(),
                invoices = data.invoices.len(),
                version = %data.version,
                "data imported"
            );
            Ok(())
        })
        .await
    }

    pub async fn clear_all_data(&self) -> Result<(), StoreError> {
        self.with_write("clear_all_data", |conn| {
            clear_tables(conn)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceStatus, TemplateType};
    use crate::test_support::{sample_client, sample_company, sample_invoice, sample_product};
    use serde_json::json;
    use time::macros::{date, datetime};

    async fn seeded() -> DbState {
        let db = DbState::open_in_memory().unwrap();
        db.set_company(sample_company()).await.unwrap();
        db.add_client(sample_client()).await.unwrap();
        db.add_product(sample_product()).await.unwrap();
        db.add_invoice(sample_invoice(), date!(2026 - 10 - 01)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn empty_store_returns_initial_company_and_settings() {
        let db = DbState::open_in_memory().unwrap();
        assert_eq!(db.get_company().await.unwrap(), Company::default());
        let settings = db.get_settings().await.unwrap();
        assert_eq!(settings.smtp.port, 587);
        assert!(settings.template_for(TemplateType::Reminder).is_some());
        assert_eq!(db.meta("createdWithVersion").await.unwrap().as_deref(), Some(APP_VERSION));
    }

    #[tokio::test]
    async fn add_invoice_recalculates_totals() {
        let db = seeded().await;
        let stored = db.get_invoice("inv-1").await.unwrap().unwrap();
        assert_eq!(stored.items[0].total, 100.0);
        assert_eq!(stored.subtotal, 100.0);
        assert_eq!(stored.tax_amount, 10.0);
        assert_eq!(stored.total, 110.0);
    }

    #[tokio::test]
    async fn add_fills_blank_ids_and_numbers() {
        let db = seeded().await;
        let mut next = sample_invoice();
        next.id.clear();
        next.invoice_number.clear();
        next.client_name.clear();
        let created = db.add_invoice(next, date!(2026 - 10 - 14)).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.invoice_number, "INV-202610-0002");
        assert_eq!(created.client_name, "Acme");
    }

    #[tokio::test]
    async fn add_rejects_invalid_and_duplicate_documents() {
        let db = seeded().await;
        let mut bad = sample_client();
        bad.id = "c-2".to_string();
        bad.email = "nope".to_string();
        assert!(matches!(db.add_client(bad).await, Err(StoreError::Invalid(_))));
        assert!(matches!(
            db.add_client(sample_client()).await,
            Err(StoreError::Duplicate { kind: "client", .. })
        ));
    }

    #[tokio::test]
    async fn update_merges_patch_and_keeps_id() {
        let db = seeded().await;
        let updated = db
            .update_client("c-1", json!({"id": "other", "phone": "+1 555 0199", "name": "Acme Corp"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, "c-1");
        assert_eq!(updated.name, "Acme Corp");
        assert_eq!(updated.phone.as_deref(), Some("+1 555 0199"));
        assert_eq!(updated.email, "ap@acme.test");
        assert!(db.update_client("missing", json!({"name": "x"})).await.unwrap().is_none());
        assert!(matches!(
            db.update_client("c-1", json!(["not", "an", "object"])).await,
            Err(StoreError::InvalidPatch)
        ));
        assert!(matches!(
            db.update_client("c-1", json!({"email": "broken"})).await,
            Err(StoreError::Invalid(_))
        ));
        assert_eq!(db.get_client("c-1").await.unwrap().unwrap().email, "ap@acme.test");
    }

    #[tokio::test]
    async fn invoice_update_recomputes_amounts() {
        let db = seeded().await;
        let updated = db
            .update_invoice("inv-1", json!({"discountRate": 50, "status": "sent"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, InvoiceStatus::Sent);
        assert_eq!(updated.discount_amount, 50.0);
        assert_eq!(updated.tax_amount, 5.0);
        assert_eq!(updated.total, 55.0);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let db = seeded().await;
        assert!(db.delete_product("p-1").await.unwrap());
        assert!(!db.delete_product("p-1").await.unwrap());
        assert!(db.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_overdue_only_touches_sent_invoices_past_due() {
        let db = seeded().await;
        db.update_invoice("inv-1", json!({"status": "sent"})).await.unwrap();
        let mut paid = sample_invoice();
        paid.id = "inv-2".to_string();
        paid.invoice_number = "INV-202610-0002".to_string();
        paid.status = InvoiceStatus::Paid;
        db.add_invoice(paid, date!(2026 - 10 - 01)).await.unwrap();

        let changed = db.mark_overdue_invoices(date!(2026 - 11 - 05)).await.unwrap();
        assert_eq!(changed, vec!["inv-1".to_string()]);
        let again = db.mark_overdue_invoices(date!(2026 - 11 - 05)).await.unwrap();
        assert!(again.is_empty());
        let inv2 = db.get_invoice("inv-2").await.unwrap().unwrap();
        assert_eq!(inv2.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn recording_an_outcome_skips_form_rules() {
        let db = seeded().await;
        let mut data = db.export_data(datetime!(2026-10-14 09:00:00 UTC)).await.unwrap();
        let id = data.invoices[0].id.clone();
        data.invoices[0].items[0].quantity = 0.5;
        data.invoices[0].status = InvoiceStatus::Draft;
        db.import_data(data).await.unwrap();
        assert!(matches!(
            db.update_invoice(&id, json!({ "notes": "x" })).await,
            Err(StoreError::Invalid(_))
        ));

        let sent = db.record_email_outcome(&id, EmailOutcome::InvoiceSent).await.unwrap().unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        assert_eq!(sent.email_sent, Some(true));
        assert_eq!(sent.items[0].quantity, 0.5);

        let at = datetime!(2026-10-20 08:30:00 UTC);
        db.record_email_outcome(&id, EmailOutcome::ReminderSent(at)).await.unwrap();
        let stored = db.get_invoice(&id).await.unwrap().unwrap();
        assert_eq!(stored.last_reminder_sent, Some(at));
        assert_eq!(stored.status, InvoiceStatus::Sent);

        assert!(db
            .record_email_outcome("missing", EmailOutcome::InvoiceSent)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn export_then_import_reproduces_entities() {
        let source = seeded().await;
        let mut second = sample_client();
        second.id = "c-2".to_string();
        second.name = "Globex".to_string();
        second.email = "ap@globex.test".to_string();
        source.add_client(second).await.unwrap();

        let now = datetime!(2026-10-14 09:00:00 UTC);
        let exported = source.export_data(now).await.unwrap();
        assert_eq!(exported.version, APP_VERSION);

        let target = DbState::open_in_memory().unwrap();
        target.add_product(sample_product()).await.unwrap();
        target.import_data(exported.clone()).await.unwrap();
        let reexported = target.export_data(now).await.unwrap();
        assert_eq!(reexported, exported);
        assert_eq!(
            reexported.clients.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["c-1", "c-2"]
        );
    }

    #[tokio::test]
    async fn clear_all_data_resets_to_defaults() {
        let db = seeded().await;
        db.clear_all_data().await.unwrap();
        assert!(db.list_clients().await.unwrap().is_empty());
        assert!(db.list_invoices().await.unwrap().is_empty());
        assert_eq!(db.get_company().await.unwrap(), Company::default());
        assert_eq!(db.get_settings().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn file_backed_store_persists_between_opens() {
        let dir = std::env::temp_dir().join(format!("byte-invoice-test-{}", generators::generate_id()));
        let path = dir.join("nested").join("store.db");
        {
            let db = DbState::open(&path).unwrap();
            db.add_client(sample_client()).await.unwrap();
        }
        let reopened = DbState::open(&path).unwrap();
        assert_eq!(reopened.list_clients().await.unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }
}
