//! Offline policy commands.

use std::fmt;

use serde::Serialize;

use gmcp_policy::{
    PolicySet, RelationshipTier, check_access, check_document_access, check_folder_access,
    is_file_in_allowed_folder, union_parties,
};

use crate::cli::CheckTarget;
use crate::error::CliResult;

/// Prints the effective policy of every domain.
pub fn show(policies: &PolicySet) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(policies)?);
    Ok(())
}

/// Evaluates and prints one decision. A denial is a normal outcome.
pub fn check(policies: &PolicySet, target: &CheckTarget) -> CliResult<()> {
    println!("{}", evaluate(policies, target));
    Ok(())
}

/// Result of an offline check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<RelationshipTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.allowed { "allow" } else { "deny" })?;
        if let Some(tier) = self.tier {
            write!(f, " (tier: {})", tier)?;
        }
        if let Some(ref reason) = self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// Runs the check described by `target` against `policies`.
pub fn evaluate(policies: &PolicySet, target: &CheckTarget) -> CheckOutcome {
    match target {
        CheckTarget::Calendar {
            operation,
            self_id,
            parties,
            existing,
        } => {
            let parties = union_parties(existing, parties);
            let decision = policies.calendar.decide(*operation, &parties, self_id);
            CheckOutcome {
                allowed: decision.is_allowed(),
                tier: Some(decision.tier),
                reason: decision.reason(),
            }
        }
        CheckTarget::Docs {
            document: Some(document),
            parents,
            ..
        } => {
            let docs = policies.docs.as_ref();
            let mut decision = check_document_access(docs, document);
            if !decision.allowed && is_file_in_allowed_folder(docs, parents) {
                decision = gmcp_policy::AccessDecision::allow();
            }
            CheckOutcome {
                allowed: decision.allowed,
                tier: None,
                reason: decision.reason,
            }
        }
        CheckTarget::Docs { folder, .. } => {
            let folder = folder.as_deref().unwrap_or_default();
            let decision = check_folder_access(policies.docs.as_ref(), folder);
            CheckOutcome {
                allowed: decision.allowed,
                tier: None,
                reason: decision.reason,
            }
        }
        CheckTarget::Sheets { spreadsheet, write } => {
            let decision = check_access(policies.sheets.as_ref(), spreadsheet, *write);
            CheckOutcome {
                allowed: decision.allowed,
                tier: None,
                reason: decision.reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmcp_policy::OperationKind;

    fn policies() -> PolicySet {
        PolicySet::from_document(&serde_json::json!({
            "calendar": {
                "internalDomain": "example.com",
                "permissions": {
                    "update": {"self_only": "allow", "internal": "allow", "external": "deny"}
                }
            },
            "docs": {
                "allowedDocuments": [{"id": "doc-1", "name": "Plan"}],
                "allowedFolders": [{"id": "folder-1", "name": "Team"}]
            },
            "sheets": {
                "allowedSpreadsheets": [{"id": "s1", "name": "Budget", "access": "readonly"}]
            }
        }))
    }

    fn calendar(operation: OperationKind, parties: &[&str], existing: &[&str]) -> CheckTarget {
        CheckTarget::Calendar {
            operation,
            self_id: "me@example.com".to_string(),
            parties: parties.iter().map(|s| s.to_string()).collect(),
            existing: existing.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn update_cannot_drop_existing_external_party() {
        let outcome = evaluate(
            &policies(),
            &calendar(OperationKind::Update, &["me@example.com"], &["partner@other.org"]),
        );
        assert!(!outcome.allowed);
        assert_eq!(outcome.tier, Some(RelationshipTier::External));
        assert_eq!(
            outcome.to_string(),
            "deny (tier: external): update of events involving external participants is not permitted"
        );
    }

    #[test]
    fn internal_update_is_allowed() {
        let target = calendar(OperationKind::Update, &["alice@example.com"], &[]);
        let outcome = evaluate(&policies(), &target);
        assert_eq!(outcome.to_string(), "allow (tier: internal)");
    }

    #[test]
    fn document_reached_through_direct_parent() {
        let target = CheckTarget::Docs {
            document: Some("doc-9".to_string()),
            folder: None,
            parents: vec!["folder-1".to_string()],
        };
        assert!(evaluate(&policies(), &target).allowed);

        let target = CheckTarget::Docs {
            document: Some("doc-9".to_string()),
            folder: None,
            parents: vec![],
        };
        assert!(!evaluate(&policies(), &target).allowed);
    }

    #[test]
    fn folder_check_uses_folder_allowlist() {
        let target = CheckTarget::Docs {
            document: None,
            folder: Some("folder-2".to_string()),
            parents: vec![],
        };
        let outcome = evaluate(&policies(), &target);
        assert!(!outcome.allowed);
        assert!(outcome.reason.unwrap().contains("folder-2"));
    }

    #[test]
    fn sheet_write_on_readonly_entry_is_denied() {
        let target = CheckTarget::Sheets {
            spreadsheet: "s1".to_string(),
            write: true,
        };
        let outcome = evaluate(&policies(), &target);
        assert_eq!(outcome.to_string(), "deny: spreadsheet \"Budget\" is read-only.");
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let outcome = evaluate(&PolicySet::default(), &calendar(OperationKind::Read, &[], &[]));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"allowed": true, "tier": "self_only"})
        );
    }
}
