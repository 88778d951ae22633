//! Allowlist entries and the decision type shared by docs and sheets.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// A resource the policy file approves by id. `name` is informational and
/// used in messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl AllowlistEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of an allowlist check. Denials carry the reason to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Deserializes an allowlist array entry by entry. Entries that do not fit
/// the entry shape are logged and skipped so the rest of the list still
/// applies. The field itself must still be an array.
pub(crate) fn lenient_entries<'de, D, E>(deserializer: D) -> Result<Vec<E>, D::Error>
where
    D: Deserializer<'de>,
    E: DeserializeOwned,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let entries = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match E::deserialize(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping malformed allowlist entry #{}: {}", index, e);
                None
            }
        })
        .collect();
    Ok(entries)
}

/// Finds the entry with the given id.
pub(crate) fn find<'a, E>(
    entries: &'a [E],
    id: &str,
    key: impl Fn(&E) -> &str,
) -> Option<&'a E> {
    entries.iter().find(|entry| key(entry) == id)
}
