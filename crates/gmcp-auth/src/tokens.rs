//! The persisted credential record and its file-backed store.
//!
//! The token file holds exactly one [`CredentialRecord`]. Writes go through a
//! temp file and a rename so a crash mid-write leaves the previous record in
//! place, and the file is created owner-read/write only.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};

/// A token is treated as stale this long before its actual expiry.
pub const EXPIRY_SKEW_MS: i64 = 60_000;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Tokens returned by the provider's token endpoint.
///
/// Refresh responses usually omit `refresh_token`, so every field except the
/// access token is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Anything else the provider sent (e.g. `id_token`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The session credentials of the single principal this process serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Access token expiry, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    /// Provider fields we do not interpret, kept across rewrites.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CredentialRecord {
    /// Builds a record from a fresh grant received at `now_ms`.
    pub fn from_grant(grant: TokenGrant, now_ms: i64) -> Self {
        Self {
            expiry_date: grant.expires_in.map(|secs| now_ms + secs * 1000),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            scope: grant.scope,
            token_type: grant.token_type,
            extra: grant.extra,
        }
    }

    /// Merges a refresh grant onto this record.
    ///
    /// Fields absent from the grant keep their previous values; in particular
    /// a stored refresh token is never replaced by nothing. The expiry always
    /// follows the new access token.
    pub fn merge(&mut self, grant: TokenGrant, now_ms: i64) {
        self.access_token = grant.access_token;
        self.expiry_date = grant.expires_in.map(|secs| now_ms + secs * 1000);
        if let Some(refresh_token) = grant.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = grant.scope {
            self.scope = Some(scope);
        }
        if let Some(token_type) = grant.token_type {
            self.token_type = Some(token_type);
        }
        self.extra.extend(grant.extra);
    }

    /// Returns true if the access token is missing, expired, or about to
    /// expire. Tokens without a known expiry are assumed valid.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        self.expiry_date
            .is_some_and(|expiry| now_ms >= expiry - EXPIRY_SKEW_MS)
    }

    /// The granted scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Destination for merged credential snapshots.
///
/// The authenticated client calls this after every silent refresh.
pub trait TokenPersistence: Send + Sync {
    /// Writes a full snapshot of the record.
    fn persist(&self, record: &CredentialRecord) -> AuthResult<()>;
}

/// File-backed credential storage.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store for the given token file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted record.
    ///
    /// A missing, unreadable or corrupt file means "no prior session" and
    /// yields `None`.
    pub fn load(&self) -> Option<CredentialRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no usable token file at {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => {
                info!("loaded tokens from {:?}", self.path);
                Some(record)
            }
            Err(e) => {
                warn!("ignoring corrupt token file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Writes the record, creating parent directories as needed.
    pub fn save(&self, record: &CredentialRecord) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::storage(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| AuthError::internal(format!("failed to serialize tokens: {}", e)))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            AuthError::storage(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            AuthError::storage(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        debug!("saved tokens to {:?}", self.path);
        Ok(())
    }
}

impl TokenPersistence for TokenStore {
    fn persist(&self, record: &CredentialRecord) -> AuthResult<()> {
        self.save(record)
    }
}

/// Writes `bytes` to a fresh file readable and writable by the owner only.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // mode() only applies on creation; tighten a pre-existing temp file too
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenGrant {
        TokenGrant {
            access_token: access.to_string(),
            refresh_token: refresh.map(String::from),
            scope: Some("scope-a scope-b".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn record_from_grant_computes_expiry() {
        let record = CredentialRecord::from_grant(grant("a1", Some("r1"), Some(3600)), 1_000);
        assert_eq!(record.access_token, "a1");
        assert_eq!(record.refresh_token.as_deref(), Some("r1"));
        assert_eq!(record.expiry_date, Some(1_000 + 3_600_000));
        assert_eq!(record.scopes(), vec!["scope-a", "scope-b"]);
    }

    #[test]
    fn merge_keeps_refresh_token_when_omitted() {
        let mut record = CredentialRecord::from_grant(grant("a1", Some("r1"), Some(3600)), 0);
        let refresh = TokenGrant {
            access_token: "a2".to_string(),
            expires_in: Some(1800),
            ..TokenGrant::default()
        };

        record.merge(refresh, 10_000);

        assert_eq!(record.access_token, "a2");
        assert_eq!(record.refresh_token.as_deref(), Some("r1"));
        assert_eq!(record.scope.as_deref(), Some("scope-a scope-b"));
        assert_eq!(record.token_type.as_deref(), Some("Bearer"));
        assert_eq!(record.expiry_date, Some(10_000 + 1_800_000));
    }

    #[test]
    fn merge_replaces_rotated_refresh_token() {
        let mut record = CredentialRecord::from_grant(grant("a1", Some("r1"), None), 0);
        record.merge(grant("a2", Some("r2"), None), 0);
        assert_eq!(record.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn staleness_uses_skew() {
        let record = CredentialRecord::from_grant(grant("a", None, Some(3600)), 0);
        assert!(!record.is_stale(0));
        assert!(!record.is_stale(3_600_000 - EXPIRY_SKEW_MS - 1));
        assert!(record.is_stale(3_600_000 - EXPIRY_SKEW_MS));

        let no_expiry = CredentialRecord::from_grant(grant("a", None, None), 0);
        assert!(!no_expiry.is_stale(i64::MAX));

        let empty = CredentialRecord::from_grant(grant("", None, None), 0);
        assert!(empty.is_stale(0));
    }

    #[test]
    fn parses_provider_shaped_file() {
        let json = r#"{
            "access_token": "ya29.a0",
            "refresh_token": "1//0g",
            "scope": "https://www.googleapis.com/auth/calendar.events",
            "token_type": "Bearer",
            "expiry_date": 1760000000000,
            "id_token": "eyJ"
        }"#;
        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.expiry_date, Some(1_760_000_000_000));
        assert_eq!(record.extra.get("id_token"), Some(&Value::from("eyJ")));

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["id_token"], "eyJ");
        assert_eq!(out["refresh_token"], "1//0g");
    }

    #[test]
    fn store_roundtrip_preserves_refresh_token_across_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("tokens.json"));

        let record = CredentialRecord::from_grant(grant("a1", Some("r1"), Some(3600)), 0);
        store.save(&record).unwrap();

        let mut reloaded = store.load().unwrap();
        assert_eq!(reloaded, record);

        reloaded.merge(
            TokenGrant {
                access_token: "a2".to_string(),
                expires_in: Some(3600),
                ..TokenGrant::default()
            },
            5_000,
        );
        store.persist(&reloaded).unwrap();

        let final_record = store.load().unwrap();
        assert_eq!(final_record.access_token, "a2");
        assert_eq!(final_record.refresh_token.as_deref(), Some("r1"));
        assert!(!dir.path().join("nested").join("tokens.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn store_writes_owner_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::new(&path);
        store
            .save(&CredentialRecord::from_grant(grant("a", None, None), 0))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_or_corrupt_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = TokenStore::new(&path);
        assert!(store.load().is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_none());

        fs::write(&path, r#"{"refresh_token": "r"}"#).unwrap();
        assert!(store.load().is_none());
    }
}
