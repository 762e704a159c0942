//! Structured logging for TokenVault
//!
//! - Never logs private keys or signatures
//! - Truncates identifiers (addresses, transaction ids) in structured params
//! - Categorizes log events by context
//! - Provides both human-readable and JSON output
//!
//! # Usage
//!
//! ```
//! use tokenvault_common::logging::{self, LogConfig, LogLevel};
//! use serde_json::json;
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//!
//! logging::log_transaction(
//!     LogLevel::Info,
//!     "broadcast",
//!     Some(json!({ "txid": "9dcbf5a86b4e70be97fc5c953ad4111dfe0a94ea6768286e5efd6c35fd9ec9d1" })),
//! );
//! ```

use chrono::Local;
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write as IoWrite;
use std::sync::Once;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Log context categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogContext {
    /// Token lifecycle planning
    Contract,
    /// Wallet adapter operations (listing, signing)
    Wallet,
    /// Transaction broadcasting
    Transaction,
    /// Persisted token records
    Storage,
}

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level for all contexts
    pub level: LogLevel,
    /// Path to log file (None for console-only)
    pub log_file: Option<String>,
    /// Whether to include timestamps in log messages
    pub include_timestamps: bool,
    /// Whether to include source location in log messages
    pub include_source_location: bool,
    /// Whether to use JSON format for logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_file: None,
            include_timestamps: true,
            include_source_location: false,
            json_format: false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

static LOGGING_INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Safe to call more than once; only the first call configures the logger.
/// An error is returned when the first call cannot open the log file.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    let include_timestamps = config.include_timestamps;
    let include_source_location = config.include_source_location;
    let json_format = config.json_format;
    let log_file = config.log_file.clone();
    let level = config.level;

    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level.into());

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            let source_location = if include_source_location {
                format!(" [{}:{}]", record.file().unwrap_or("unknown"), record.line().unwrap_or(0))
            } else {
                String::new()
            };

            if json_format {
                let line = json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "location": source_location,
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            } else {
                let mut style = buf.style();
                style.set_bold(true);
                if include_timestamps {
                    write!(buf, "{} ", timestamp)?;
                }
                writeln!(
                    buf,
                    "[{}{}] {}",
                    style.value(record.level()),
                    source_location,
                    record.args()
                )
            }
        });

        if let Some(file_path) = &log_file {
            match OpenOptions::new().create(true).append(true).open(file_path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    result = Err(format!("Failed to open log file {}: {}", file_path, e));
                    return;
                }
            }
        }

        // Tests may install their own logger first
        if let Err(e) = builder.try_init() {
            debug!("Logger already initialized: {}", e);
        }
    });

    result
}

/// Update the log level dynamically
pub fn set_log_level(level: LogLevel) {
    log::set_max_level(level.into());
}

/// Truncate an identifier for logging, keeping the first and last 4 characters
pub fn sanitize_for_logging(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "*****".to_string();
    }

    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", first, last)
}

/// Parameter keys whose values identify wallets, addresses or transactions
const IDENTIFIER_KEYS: &[&str] = &[
    "txid",
    "address",
    "wallet",
    "wallet_id",
    "pool",
    "caller",
    "color_id",
    "color",
];

/// Truncate identifier values of a JSON object; everything else passes through
pub fn sanitize_params(params: serde_json::Value) -> serde_json::Value {
    match params {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) if IDENTIFIER_KEYS.contains(&k.as_str()) => {
                        let sanitized = json!(sanitize_for_logging(&s));
                        (k, sanitized)
                    }
                    other => (k, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn sanitize_and_log(
    level: LogLevel,
    context: LogContext,
    message: &str,
    params: Option<serde_json::Value>,
) {
    let level: log::Level = level.into();
    match params.map(sanitize_params) {
        Some(params) => log::log!(level, "[{:?}] {} {}", context, message, params),
        None => log::log!(level, "[{:?}] {}", context, message),
    }
}

/// Log a token lifecycle event
pub fn log_contract(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    sanitize_and_log(level, LogContext::Contract, message, params);
}

/// Log a wallet adapter event
pub fn log_wallet(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    sanitize_and_log(level, LogContext::Wallet, message, params);
}

/// Log a transaction event with appropriate sanitization
pub fn log_transaction(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    sanitize_and_log(level, LogContext::Transaction, message, params);
}

/// Log a storage event
pub fn log_storage(level: LogLevel, message: &str, params: Option<serde_json::Value>) {
    sanitize_and_log(level, LogContext::Storage, message, params);
}
