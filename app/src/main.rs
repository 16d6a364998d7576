use byte_invoice_lib::{logging, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init(config.log_format, &config.log_filter);
    byte_invoice_lib::run(config).await
}
