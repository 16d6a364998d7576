use std::path::PathBuf;

use anyhow::Context;
use byte_invoice_lib::calculations::{self, format_currency, format_percentage};
use byte_invoice_lib::email_service::{self, EmailService};
use byte_invoice_lib::models::{InvoiceItem, TemplateType, DEFAULT_DISCOUNT_RATE, DEFAULT_TAX_RATE};
use byte_invoice_lib::stats::{self, RevenuePeriod, StatusFilter};
use byte_invoice_lib::{dates, logging, pdf, transfer, AppConfig, DbState};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "byte-invoice-cli", version, about = "Byte Invoice command line")]
struct Cli {
  /// SQLite store; overrides BYTE_INVOICE_DB_PATH.
  #[arg(long, global = true, env = "BYTE_INVOICE_DB")]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Compute invoice totals without touching the store.
  Totals {
    /// QTY:PRICE, repeatable
    #[arg(long = "item", value_parser = parse_item, required = true)]
    items: Vec<InvoiceItem>,

    #[arg(long, default_value_t = DEFAULT_TAX_RATE)]
    tax: f64,

    #[arg(long, default_value_t = DEFAULT_DISCOUNT_RATE)]
    discount: f64,
  },

  #[command(flatten)]
  Store(StoreCommand),
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
  /// Write a JSON backup of every entity.
  Export {
    #[arg(long)]
    out: Option<PathBuf>,
  },

  /// Replace all data with a backup file.
  Import { path: PathBuf },

  /// Delete every entity.
  Clear {
    #[arg(long)]
    yes: bool,
  },

  /// Dashboard totals and the monthly revenue series.
  Stats {
    /// 1m, 3m, 6m, 12m, lifetime or START..END
    #[arg(long, default_value = "12m", value_parser = parse_period)]
    period: RevenuePeriod,
  },

  /// List invoices, newest first.
  Invoices {
    #[arg(long, default_value = "")]
    search: String,

    #[arg(long, default_value = "all", value_parser = parse_status_filter)]
    status: StatusFilter,

    #[arg(long, default_value_t = 20)]
    limit: usize,
  },

  /// Persist sent -> overdue for invoices past due.
  MarkOverdue,

  /// Preview the next invoice number.
  NextNumber,

  /// Render an invoice PDF locally.
  Pdf {
    invoice_id: String,

    #[arg(long)]
    out: Option<PathBuf>,
  },

  /// Email an invoice through the proxy and record the result.
  Send {
    invoice_id: String,

    #[arg(long, value_enum, default_value_t = SendKind::Invoice)]
    kind: SendKind,

    #[arg(long)]
    api_url: Option<String>,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SendKind {
  Invoice,
  Reminder,
  Overdue,
}

impl From<SendKind> for TemplateType {
  fn from(kind: SendKind) -> Self {
    match kind {
      SendKind::Invoice => TemplateType::Invoice,
      SendKind::Reminder => TemplateType::Reminder,
      SendKind::Overdue => TemplateType::Overdue,
    }
  }
}

fn parse_period(s: &str) -> Result<RevenuePeriod, String> {
  s.parse()
}

fn parse_status_filter(s: &str) -> Result<StatusFilter, String> {
  s.parse()
}

fn parse_item(s: &str) -> Result<InvoiceItem, String> {
  let (qty, price) = s
    .split_once(':')
    .ok_or_else(|| format!("expected QTY:PRICE, got {s:?}"))?;
  let quantity: f64 = qty.trim().parse().map_err(|e| format!("invalid quantity {qty:?}: {e}"))?;
  let unit_price: f64 = price.trim().parse().map_err(|e| format!("invalid price {price:?}: {e}"))?;
  Ok(InvoiceItem {
    product_id: String::new(),
    product_name: String::new(),
    description: String::new(),
    quantity,
    unit_price,
    total: calculations::calculate_item_total(quantity, unit_price),
  })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let mut config = AppConfig::load()?;
  if let Some(db) = cli.db {
    config.db_path = db;
  }
  logging::init(config.log_format, &format!("{},byte_invoice_cli=info", config.log_filter));

  match cli.command {
    Command::Totals { items, tax, discount } => print_totals(&items, tax, discount),
    Command::Store(command) => {
      let db = DbState::open(&config.db_path)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
      run_store_command(&db, &config, command).await?;
    }
  }

  Ok(())
}

fn print_totals(items: &[InvoiceItem], tax: f64, discount: f64) {
  let totals = calculations::calculate_totals(items, tax, discount);
  println!("Subtotal:          {}", format_currency(totals.subtotal));
  println!("Discount ({:>5}): -{}", format_percentage(discount), format_currency(totals.discount_amount));
  println!("Tax ({:>5}):      {}", format_percentage(tax), format_currency(totals.tax_amount));
  println!("Total:             {}", format_currency(totals.total));
}

async fn run_store_command(db: &DbState, config: &AppConfig, command: StoreCommand) -> anyhow::Result<()> {
  match command {
    StoreCommand::Export { out } => {
      let data = db.export_data(dates::now_utc()).await?;
      let path = out.unwrap_or_else(|| PathBuf::from(transfer::backup_file_name(dates::today())));
      tokio::fs::write(&path, transfer::export_json(&data)?)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
      println!("{}", path.display());
    }

    StoreCommand::Import { path } => {
      let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
      let data = transfer::parse_import(&text)?;
      let counts = (data.clients.len(), data.products.len(), data.invoices.len());
      db.import_data(data).await?;
      println!(
        "imported {} clients, {} products, {} invoices",
        counts.0, counts.1, counts.2
      );
    }

    StoreCommand::Clear { yes } => {
      if !yes {
        anyhow::bail!("refusing to delete all data without --yes");
      }
      db.clear_all_data().await?;
      println!("all data cleared");
    }

    StoreCommand::Stats { period } => {
      let clients = db.list_clients().await?;
      let products = db.list_products().await?;
      let invoices = db.list_invoices().await?;
      let summary = stats::dashboard_stats(&clients, &products, &invoices, dates::today());
      let revenue = stats::revenue_series(&invoices, period, dates::today());
      println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "stats": summary, "revenue": revenue }))?
      );
    }

    StoreCommand::Invoices { search, status, limit } => {
      let invoices = db.list_invoices().await?;
      let matching: Vec<_> = stats::filter_invoices(&invoices, &search, status)
        .into_iter()
        .cloned()
        .collect();
      for inv in stats::recent_invoices(&matching, limit) {
        println!(
          "{:<18} {:<10} {:<24} {:>12} {:<8}",
          inv.display_number(),
          dates::format_ymd(inv.issue_date),
          inv.client_name,
          format_currency(inv.total),
          inv.status.label()
        );
      }
    }

    StoreCommand::MarkOverdue => {
      let changed = db.mark_overdue_invoices(dates::today()).await?;
      if changed.is_empty() {
        println!("no invoices became overdue");
      }
      for id in changed {
        println!("{id}");
      }
    }

    StoreCommand::NextNumber => {
      println!("{}", db.next_invoice_number(dates::today()).await?);
    }

    StoreCommand::Pdf { invoice_id, out } => {
      let invoice = db
        .get_invoice(&invoice_id)
        .await?
        .with_context(|| format!("invoice {invoice_id} not found"))?;
      let client = db
        .get_client(&invoice.client_id)
        .await?
        .with_context(|| format!("client {} not found", invoice.client_id))?;
      let company = db.get_company().await?;
      let bytes = pdf::render_invoice_pdf(&invoice, &client, &company)?;
      let path = out.unwrap_or_else(|| PathBuf::from(invoice.pdf_file_name()));
      tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
      tracing::info!(bytes = bytes.len(), "pdf written");
      println!("{}", path.display());
    }

    StoreCommand::Send {
      invoice_id,
      kind,
      api_url,
    } => {
      let service = EmailService::new(api_url.unwrap_or_else(|| config.api_base_url.clone()));
      let sent =
        email_service::send_and_mark(db, &service, &invoice_id, kind.into(), dates::now_utc()).await?;
      if !sent {
        anyhow::bail!("email for invoice {invoice_id} was not sent; see the log for details");
      }
      println!("sent");
    }
  }

  Ok(())
}
