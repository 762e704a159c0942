//! Persisted scripts of reissuable tokens
//!
//! A reissuable color is the hash of the script that controls it. The script
//! itself cannot be recovered from the color, so it is recorded at issuance
//! and looked up on every reissue. Records are write-once: saving a
//! different script for a known color is rejected.

use bitcoin::blockdata::script::ScriptBuf;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tokenvault_common::color::ColorIdentifier;
use tokenvault_common::error::{ContractError, ContractResult};
use tokenvault_common::logging::{log_storage, LogLevel};

/// Storage of (color id → script) records for reissuable tokens
pub trait ReissuableTokenStore: Send + Sync {
    /// The script recorded for `color_id`, if any
    fn script_pubkey(&self, color_id: &ColorIdentifier) -> ContractResult<Option<ScriptBuf>>;

    /// Record `script` for `color_id`
    ///
    /// Saving the same pair again is a no-op.
    fn save(&self, color_id: &ColorIdentifier, script: &ScriptBuf) -> ContractResult<()>;
}

fn insert_once(
    records: &mut BTreeMap<ColorIdentifier, ScriptBuf>,
    color_id: &ColorIdentifier,
    script: &ScriptBuf,
) -> ContractResult<bool> {
    match records.get(color_id) {
        Some(existing) if existing == script => Ok(false),
        Some(_) => Err(ContractError::InvariantViolation(format!(
            "script of {} is already recorded",
            color_id
        ))),
        None => {
            records.insert(color_id.clone(), script.clone());
            Ok(true)
        }
    }
}

/// Store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<BTreeMap<ColorIdentifier, ScriptBuf>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReissuableTokenStore for MemoryTokenStore {
    fn script_pubkey(&self, color_id: &ColorIdentifier) -> ContractResult<Option<ScriptBuf>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(color_id).cloned())
    }

    fn save(&self, color_id: &ColorIdentifier, script: &ScriptBuf) -> ContractResult<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        insert_once(&mut records, color_id, script)?;
        Ok(())
    }
}

/// Store persisted as a JSON object mapping color hex to script hex
#[derive(Debug)]
pub struct JsonFileTokenStore {
    path: PathBuf,
    records: RwLock<BTreeMap<ColorIdentifier, ScriptBuf>>,
}

impl JsonFileTokenStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub fn open(path: impl AsRef<Path>) -> ContractResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut records = BTreeMap::new();
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                ContractError::invalid_argument(format!("Failed to read token store: {}", e))
            })?;
            let raw: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
                ContractError::invalid_argument(format!("Failed to parse token store: {}", e))
            })?;
            for (color, script) in raw {
                let color_id = ColorIdentifier::from_hex(&color)?;
                let script = ScriptBuf::from_bytes(hex::decode(script)?);
                records.insert(color_id, script);
            }
        }
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    fn persist(&self, records: &BTreeMap<ColorIdentifier, ScriptBuf>) -> ContractResult<()> {
        let raw: BTreeMap<String, String> = records
            .iter()
            .map(|(color, script)| (color.to_hex(), hex::encode(script.as_bytes())))
            .collect();
        let content = serde_json::to_string_pretty(&raw).map_err(|e| {
            ContractError::invalid_argument(format!("Failed to serialize token store: {}", e))
        })?;
        fs::write(&self.path, content).map_err(|e| {
            ContractError::invalid_argument(format!("Failed to write token store: {}", e))
        })
    }
}

impl ReissuableTokenStore for JsonFileTokenStore {
    fn script_pubkey(&self, color_id: &ColorIdentifier) -> ContractResult<Option<ScriptBuf>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(color_id).cloned())
    }

    fn save(&self, color_id: &ColorIdentifier, script: &ScriptBuf) -> ContractResult<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = records.clone();
        if insert_once(&mut updated, color_id, script)? {
            // Memory only reflects what reached the file
            self.persist(&updated)?;
            *records = updated;
            log_storage(
                LogLevel::Debug,
                "reissuable token recorded",
                Some(json!({ "color_id": color_id.to_hex() })),
            );
        }
        Ok(())
    }
}
