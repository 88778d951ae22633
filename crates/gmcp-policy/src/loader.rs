//! Policy configuration file loading.
//!
//! The policy file is a single JSON object keyed by domain name:
//!
//! ```json
//! {
//!   "calendar": { "internalDomain": "example.com", "permissions": { ... } },
//!   "docs": { "allowedDocuments": [...], "allowedFolders": [...] },
//!   "sheets": { "allowedSpreadsheets": [...] }
//! }
//! ```
//!
//! Nothing here fails. A missing path, a missing file, unparseable JSON or a
//! missing section come back as `None`, and each domain maps `None` to its
//! own default. A section that is present but of the wrong shape is handled
//! per domain: [`section_from`] drops it, [`restrictive_section_from`]
//! replaces it with the domain's empty (deny-all) policy.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

/// The resource domains that carry a section in the policy file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyDomain {
    Calendar,
    Docs,
    Sheets,
}

impl PolicyDomain {
    pub const ALL: [PolicyDomain; 3] = [Self::Calendar, Self::Docs, Self::Sheets];

    /// The top-level key of this domain's section.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Docs => "docs",
            Self::Sheets => "sheets",
        }
    }
}

impl fmt::Display for PolicyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Reads the whole policy document.
pub fn read_document(path: Option<&Path>) -> Option<Value> {
    let Some(path) = path else {
        debug!("no policy file configured");
        return None;
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("policy file not found: {:?}", path);
            return None;
        }
        Err(e) => {
            warn!("failed to read policy file {:?}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(document) => {
            info!("loaded policy file {:?}", path);
            Some(document)
        }
        Err(e) => {
            warn!("failed to parse policy file {:?}: {}", path, e);
            None
        }
    }
}

/// Extracts one domain's section from an already-parsed document.
pub fn section_from<T: DeserializeOwned>(
    document: &Value,
    domain: PolicyDomain,
) -> Option<T> {
    let Some(section) = document.get(domain.key()) else {
        debug!("policy file has no {} section", domain);
        return None;
    };

    match T::deserialize(section) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring malformed {} policy section: {}", domain, e);
            None
        }
    }
}

/// Like [`section_from`], but a present section that fails to deserialize
/// yields `T::default()` instead of `None`. Used by the allowlist domains,
/// where `None` means unrestricted.
pub fn restrictive_section_from<T: DeserializeOwned + Default>(
    document: &Value,
    domain: PolicyDomain,
) -> Option<T> {
    let Some(section) = document.get(domain.key()) else {
        debug!("policy file has no {} section", domain);
        return None;
    };

    match T::deserialize(section) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("malformed {} policy section, denying all access: {}", domain, e);
            Some(T::default())
        }
    }
}

/// Reads the policy file and extracts one domain's section.
pub fn load_section<T: DeserializeOwned>(
    path: Option<&Path>,
    domain: PolicyDomain,
) -> Option<T> {
    read_document(path).and_then(|document| section_from(&document, domain))
}

/// Reads the policy file and extracts one allowlist domain's section.
pub fn load_restrictive_section<T: DeserializeOwned + Default>(
    path: Option<&Path>,
    domain: PolicyDomain,
) -> Option<T> {
    read_document(path).and_then(|document| restrictive_section_from(&document, domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Section {
        value: u32,
    }

    fn policy_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn no_path_yields_none() {
        assert_eq!(load_section::<Section>(None, PolicyDomain::Docs), None);
    }

    #[test]
    fn missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert_eq!(
            load_section::<Section>(Some(path.as_path()), PolicyDomain::Docs),
            None
        );
    }

    #[test]
    fn unparseable_file_yields_none() {
        let file = policy_file("{ not json");
        assert_eq!(
            load_section::<Section>(Some(file.path()), PolicyDomain::Docs),
            None
        );
    }

    #[test]
    fn missing_section_yields_none() {
        let file = policy_file(r#"{"sheets": {"value": 1}}"#);
        assert_eq!(
            load_section::<Section>(Some(file.path()), PolicyDomain::Docs),
            None
        );
    }

    #[test]
    fn malformed_section_yields_none() {
        let file = policy_file(r#"{"docs": {"value": "one"}}"#);
        assert_eq!(
            load_section::<Section>(Some(file.path()), PolicyDomain::Docs),
            None
        );
    }

    #[test]
    fn malformed_restrictive_section_yields_default() {
        let file = policy_file(r#"{"docs": {"value": "one"}}"#);
        assert_eq!(
            load_restrictive_section::<Section>(Some(file.path()), PolicyDomain::Docs),
            Some(Section::default())
        );
    }

    #[test]
    fn missing_restrictive_section_yields_none() {
        let file = policy_file(r#"{"sheets": {"value": 1}}"#);
        assert_eq!(
            load_restrictive_section::<Section>(Some(file.path()), PolicyDomain::Docs),
            None
        );
    }

    #[test]
    fn present_section_is_extracted() {
        let file = policy_file(r#"{"docs": {"value": 7}, "sheets": {"value": 8}}"#);
        assert_eq!(
            load_section::<Section>(Some(file.path()), PolicyDomain::Sheets),
            Some(Section { value: 8 })
        );
    }
}
