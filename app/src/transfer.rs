//! Backup file format.

use serde_json::Value;
use time::Date;

use crate::dates;
use crate::models::AppData;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to parse import file: {0}")]
    Parse(String),
}

impl ImportError {
    fn parse(msg: impl Into<String>) -> Self {
        ImportError::Parse(msg.into())
    }
}

pub fn backup_file_name(today: Date) -> String {
    format!("byte-invoice-backup-{}.json", dates::format_ymd(today))
}

pub fn export_json(data: &AppData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

pub fn parse_import(text: &str) -> Result<AppData, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ImportError::parse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ImportError::parse("expected a JSON object"))?;

    if obj.get("company").map_or(true, Value::is_null) {
        return Err(ImportError::parse("missing company"));
    }
    for key in ["clients", "products", "invoices"] {
        if !obj.get(key).is_some_and(Value::is_array) {
            return Err(ImportError::parse(format!("{key} must be an array")));
        }
    }
    for key in ["version", "exportDate"] {
        if obj.get(key).map_or(true, Value::is_null) {
            return Err(ImportError::parse(format!("missing {key}")));
        }
    }

    serde_json::from_value(value).map_err(|e| ImportError::parse(e.to_string()))
}
