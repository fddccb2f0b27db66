use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::TokenError;
use crate::key::{Key, KeyResolver};

/// Fields every registry record must carry
const REQUIRED_FIELDS: [&str; 3] = ["id", "key", "revoked"];

/// A key registry loaded from a JSON array of key records
///
/// Each record looks like:
///
/// ```json
/// { "id": "k1", "key": "secret", "revoked": false, "expires": "2030-01-01T00:00:00Z" }
/// ```
///
/// Records that are not objects, lack a required field, carry a field of the
/// wrong type, or have an unparseable `expires` are skipped. They do not stop
/// the rest of the registry from loading.
#[derive(Debug, Clone, Default)]
pub struct JsonKeyStore {
    keys: HashMap<String, Key>,
}

impl JsonKeyStore {
    /// Load a registry from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let path = path.as_ref();
        let contents = read_to_string(path).map_err(|e| {
            TokenError::key_store(format!(
                "Failed to read key file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&contents)
    }

    /// Load a registry from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, TokenError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| TokenError::key_store(format!("Failed to parse key file: {e}")))?;

        let records = value
            .as_array()
            .ok_or_else(|| TokenError::key_store("Key file must contain a JSON array"))?;

        let mut keys = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            match parse_record(record) {
                Some(key) => {
                    keys.insert(key.id().to_string(), key);
                }
                None => warn!(index, "skipping invalid key record"),
            }
        }

        info!(
            loaded = keys.len(),
            records = records.len(),
            "key registry loaded"
        );

        Ok(Self { keys })
    }

    /// Build a registry from keys already in memory
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|key| (key.id().to_string(), key))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }
}

impl KeyResolver for JsonKeyStore {
    fn get_key_by_id(&self, id: &str) -> Result<Key, TokenError> {
        self.keys
            .get(id)
            .cloned()
            .ok_or_else(|| TokenError::key_not_found(id))
    }
}

fn parse_record(record: &Value) -> Option<Key> {
    let fields = record.as_object()?;
    if !has_required_fields(fields) {
        return None;
    }

    let id = fields.get("id")?.as_str()?;
    let value = fields.get("key")?.as_str()?;
    let revoked = fields.get("revoked")?.as_bool()?;

    let expires = match fields.get("expires") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(parse_expires(s)?),
        Some(_) => return None,
    };

    Some(Key::new(id, expires, value, revoked))
}

fn has_required_fields(fields: &Map<String, Value>) -> bool {
    REQUIRED_FIELDS.iter().all(|name| fields.contains_key(*name))
}

/// Parse the `expires` value of a registry record.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`; the latter two
/// are read as UTC.
pub fn parse_expires(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Some(at.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}
