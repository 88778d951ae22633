//! Sheets policy: allowlisted spreadsheets with an access level each.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::allowlist::{AccessDecision, find, lenient_entries};
use crate::loader::{PolicyDomain, load_restrictive_section};

/// Access level granted to an allowlisted spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetAccess {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for SheetAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "readonly",
            Self::ReadWrite => "readwrite",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub access: SheetAccess,
}

/// The `sheets` section of the policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsPolicy {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub allowed_spreadsheets: Vec<SpreadsheetEntry>,
}

impl SheetsPolicy {
    /// Loads the `sheets` section, or `None` for unrestricted access. A
    /// section that is present but unreadable denies everything.
    pub fn load(path: Option<&Path>) -> Option<Self> {
        load_restrictive_section(path, PolicyDomain::Sheets)
    }
}

/// Checks a spreadsheet operation. `require_write` marks operations that
/// modify the spreadsheet.
pub fn check_access(
    policy: Option<&SheetsPolicy>,
    spreadsheet_id: &str,
    require_write: bool,
) -> AccessDecision {
    let Some(policy) = policy else {
        return AccessDecision::allow();
    };

    let entry = find(&policy.allowed_spreadsheets, spreadsheet_id, |entry| {
        entry.id.as_str()
    });
    let Some(entry) = entry else {
        return AccessDecision::deny(format!(
            "spreadsheet ({}) is not in the allowlist. Add it to allowedSpreadsheets.",
            spreadsheet_id
        ));
    };

    if require_write && entry.access == SheetAccess::ReadOnly {
        return AccessDecision::deny(format!("spreadsheet \"{}\" is read-only.", entry.name));
    }

    AccessDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SheetsPolicy {
        serde_json::from_str(
            r#"{"allowedSpreadsheets": [
                {"id": "ro", "name": "Budget", "access": "readonly"},
                {"id": "rw", "name": "Tracker", "access": "readwrite"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn readonly_entry_allows_reads_only() {
        let policy = policy();
        assert!(check_access(Some(&policy), "ro", false).allowed);

        let decision = check_access(Some(&policy), "ro", true);
        assert!(!decision.allowed);
        insta::assert_snapshot!(decision.reason.unwrap(), @r#"spreadsheet "Budget" is read-only."#);
    }

    #[test]
    fn readwrite_entry_allows_writes() {
        assert!(check_access(Some(&policy()), "rw", true).allowed);
    }

    #[test]
    fn unregistered_spreadsheet_is_denied() {
        let decision = check_access(Some(&policy()), "other", false);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("not in the allowlist"));
    }

    #[test]
    fn unconfigured_policy_allows_everything() {
        assert!(check_access(None, "anything", true).allowed);
    }

    #[test]
    fn entry_with_unknown_access_level_is_skipped() {
        let policy: SheetsPolicy = serde_json::from_str(
            r#"{"allowedSpreadsheets": [
                {"id": "x", "access": "owner"},
                {"id": "ro", "name": "Budget", "access": "readonly"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(policy.allowed_spreadsheets.len(), 1);
        assert!(!check_access(Some(&policy), "x", false).allowed);
        assert!(!check_access(Some(&policy), "ro", true).allowed);
    }

    #[test]
    fn non_array_allowlist_is_rejected() {
        let result =
            serde_json::from_str::<SheetsPolicy>(r#"{"allowedSpreadsheets": {"id": "x"}}"#);
        assert!(result.is_err());
    }
}
