//! Process settings, assembled once from the environment at startup.
//!
//! Components never read the environment themselves; the entry point builds
//! a [`Settings`] and passes the pieces each constructor needs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::paths::resolve_path;

/// Environment variable naming the OAuth client credentials file.
pub const CREDENTIALS_VAR: &str = "GOOGLE_OAUTH_CREDENTIALS";
/// Environment variable overriding the token file location.
pub const TOKENS_VAR: &str = "GOOGLE_OAUTH_TOKENS";
/// Environment variable naming the optional policy file.
pub const POLICY_VAR: &str = "GOOGLE_MCP_CONFIG";

/// Errors raised while assembling settings. Always fatal.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required variable is unset or empty.
    #[error("{name} is not set: {hint}")]
    MissingVariable {
        name: &'static str,
        hint: &'static str,
    },

    /// The credentials file does not exist.
    #[error(
        "credentials file not found: {}; download the OAuth client JSON from the \
         Google Cloud Console and point GOOGLE_OAUTH_CREDENTIALS at it",
        path.display()
    )]
    CredentialsNotFound { path: PathBuf },

    /// Unknown service name.
    #[error("unknown service '{0}' (expected calendar, docs, sheets or gmail)")]
    UnknownService(String),
}

/// The resource domain a process brokers access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Calendar,
    Docs,
    Sheets,
    Gmail,
}

impl Service {
    /// Every service, in display order.
    pub const ALL: [Service; 4] = [Self::Calendar, Self::Docs, Self::Sheets, Self::Gmail];

    /// Short name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Docs => "docs",
            Self::Sheets => "sheets",
            Self::Gmail => "gmail",
        }
    }

    /// OAuth scopes the service requests.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Calendar => &[
                "https://www.googleapis.com/auth/calendar.readonly",
                "https://www.googleapis.com/auth/calendar.events",
            ],
            Self::Docs => &["https://www.googleapis.com/auth/drive.readonly"],
            Self::Sheets => &["https://www.googleapis.com/auth/spreadsheets"],
            Self::Gmail => &["https://www.googleapis.com/auth/gmail.modify"],
        }
    }

    /// Directory name under `~/.config` holding the service's tokens.
    pub fn config_dir_name(&self) -> &'static str {
        match self {
            Self::Calendar => "google-calendar-mcp",
            Self::Docs => "google-docs-mcp",
            Self::Sheets => "google-sheets-mcp",
            Self::Gmail => "gmail-mcp",
        }
    }

    /// Default token file: `~/.config/<service dir>/tokens.json`.
    pub fn default_tokens_path(&self) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(self.config_dir_name())
            .join("tokens.json")
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SettingsError::UnknownService(s.to_string()))
    }
}

/// Settings for one broker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Which resource domain this process serves.
    pub service: Service,
    /// OAuth client credentials file.
    pub credentials_path: PathBuf,
    /// Persisted token file.
    pub tokens_path: PathBuf,
    /// Optional policy document.
    pub policy_path: Option<PathBuf>,
}

impl Settings {
    /// Assembles settings from the process environment.
    pub fn from_env(service: Service) -> Result<Self, SettingsError> {
        Self::from_lookup(service, |name| std::env::var(name).ok())
    }

    /// Assembles settings from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. Paths get `~` expansion.
    pub fn from_lookup<F>(service: Service, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials_path = get(CREDENTIALS_VAR)
            .map(|p| resolve_path(&p))
            .ok_or(SettingsError::MissingVariable {
                name: CREDENTIALS_VAR,
                hint: "set it to the path of the OAuth client credentials JSON file",
            })?;

        let tokens_path = get(TOKENS_VAR)
            .map(|p| resolve_path(&p))
            .unwrap_or_else(|| service.default_tokens_path());

        let policy_path = get(POLICY_VAR).map(|p| resolve_path(&p));

        Ok(Self {
            service,
            credentials_path,
            tokens_path,
            policy_path,
        })
    }

    /// Builder: override the token path.
    pub fn with_tokens_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokens_path = path.into();
        self
    }

    /// Builder: override the policy path.
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = Some(path.into());
        self
    }

    /// Checks that the credentials file exists.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.credentials_path.is_file() {
            return Err(SettingsError::CredentialsNotFound {
                path: self.credentials_path.clone(),
            });
        }
        Ok(())
    }

    /// The OAuth scopes for the configured service.
    pub fn scopes(&self) -> Vec<String> {
        self.service.scopes().iter().map(|s| s.to_string()).collect()
    }

    /// The policy file path, if any.
    pub fn policy_path(&self) -> Option<&Path> {
        self.policy_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_credentials_is_fatal() {
        let err = Settings::from_lookup(Service::Calendar, lookup(&[])).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::MissingVariable {
                name: CREDENTIALS_VAR,
                ..
            }
        ));
        assert!(err.to_string().contains("GOOGLE_OAUTH_CREDENTIALS"));
    }

    #[test]
    fn empty_credentials_counts_as_missing() {
        let err = Settings::from_lookup(Service::Docs, lookup(&[(CREDENTIALS_VAR, "  ")]));
        assert!(err.is_err());
    }

    #[test]
    fn defaults_tokens_path_per_service() {
        let settings =
            Settings::from_lookup(Service::Sheets, lookup(&[(CREDENTIALS_VAR, "/c.json")]))
                .unwrap();
        assert_eq!(settings.credentials_path, PathBuf::from("/c.json"));
        assert!(settings.tokens_path.ends_with("google-sheets-mcp/tokens.json"));
        assert!(settings.policy_path.is_none());
    }

    #[test]
    fn explicit_paths_win() {
        let settings = Settings::from_lookup(
            Service::Calendar,
            lookup(&[
                (CREDENTIALS_VAR, "/c.json"),
                (TOKENS_VAR, "/t/tokens.json"),
                (POLICY_VAR, "/p.json"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.tokens_path, PathBuf::from("/t/tokens.json"));
        assert_eq!(settings.policy_path(), Some(Path::new("/p.json")));
    }

    #[test]
    fn validate_reports_missing_file() {
        let settings = Settings::from_lookup(
            Service::Gmail,
            lookup(&[(CREDENTIALS_VAR, "/definitely/not/here.json")]),
        )
        .unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn service_parsing_and_scopes() {
        assert_eq!("Calendar".parse::<Service>().unwrap(), Service::Calendar);
        assert!("drive".parse::<Service>().is_err());
        assert_eq!(Service::Calendar.scopes().len(), 2);
        assert_eq!(
            Service::Docs.scopes(),
            &["https://www.googleapis.com/auth/drive.readonly"]
        );
    }
}
