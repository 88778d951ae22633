//! End-to-end checks of the policy engine against policy files on disk.

use std::collections::HashMap;
use std::io::Write;

use gmcp_policy::{
    BoxFuture, ContainerDirectory, DocsPolicy, HierarchyError, OperationKind, ParentLookup,
    PolicySet, RelationshipTier, SheetsPolicy, Verdict, check_access, check_document_access,
    check_folder_access, classify, resolve_document_access, resolve_folder_access,
};

const SELF: &str = "me@example.com";

fn policy_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Folder tree where each id maps to its parents; children are derived.
struct Drive {
    parents: HashMap<&'static str, Vec<&'static str>>,
}

impl Drive {
    fn new(edges: &[(&'static str, &'static str)]) -> Self {
        let mut parents: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for (child, parent) in edges {
            parents.entry(*child).or_default().push(*parent);
        }
        Self { parents }
    }
}

impl ParentLookup for Drive {
    fn parents<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<String>, HierarchyError>> {
        Box::pin(async move {
            self.parents
                .get(id)
                .map(|parents| parents.iter().map(|p| p.to_string()).collect())
                .ok_or_else(|| HierarchyError::NotFound(id.to_string()))
        })
    }
}

impl ContainerDirectory for Drive {
    fn list_child_containers<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, HierarchyError>> {
        Box::pin(async move {
            let mut children: Vec<String> = self
                .parents
                .iter()
                .filter(|(_, parents)| parents.iter().any(|parent| *parent == id))
                .map(|(child, _)| child.to_string())
                .collect();
            children.sort();
            Ok(children)
        })
    }
}

#[test]
fn empty_domain_never_classifies_as_internal() {
    let party_sets: [&[&str]; 4] = [
        &["alice@example.com"],
        &[SELF, "bob@example.com"],
        &["carol@other.org", "dave@example.com"],
        &["ME@example.com", "eve@example.com"],
    ];
    for parties in party_sets {
        assert_eq!(
            classify(parties, SELF, ""),
            RelationshipTier::External,
            "{:?}",
            parties
        );
    }
}

#[test]
fn only_self_classifies_as_self_only() {
    for parties in [&[SELF][..], &["ME@EXAMPLE.COM", "Me@Example.com"][..], &[][..]] {
        assert_eq!(classify(parties, SELF, "example.com"), RelationshipTier::SelfOnly);
        assert_eq!(classify(parties, SELF, ""), RelationshipTier::SelfOnly);
    }
}

#[test]
fn configured_internal_delete_is_denied() {
    let file = policy_file(
        r#"{"calendar": {
            "internalDomain": "example.com",
            "permissions": {
                "delete": {"self_only": "allow", "internal": "deny", "external": "deny"}
            }
        }}"#,
    );
    let policies = PolicySet::load(Some(file.path()));

    let decision = policies
        .calendar
        .decide(OperationKind::Delete, &["colleague@example.com"], SELF);

    assert_eq!(decision.verdict, Verdict::Deny);
    assert_eq!(decision.tier, RelationshipTier::Internal);
    assert!(decision.reason().unwrap().contains("internal members"));
}

#[test]
fn missing_file_gives_restrictive_calendar_and_open_allowlists() {
    let dir = tempfile::tempdir().unwrap();
    let policies = PolicySet::load(Some(dir.path().join("absent.json").as_path()));

    assert_eq!(policies, PolicySet::default());
    let decision = policies.calendar.decide::<&str>(OperationKind::Delete, &[], SELF);
    assert_eq!(decision.verdict, Verdict::Deny);
    assert!(policies.docs.is_none());
    assert!(policies.sheets.is_none());
}

#[test]
fn no_docs_section_allows_every_id() {
    let file = policy_file(r#"{"calendar": {"internalDomain": "example.com"}}"#);
    let policies = PolicySet::load(Some(file.path()));

    assert!(policies.docs.is_none());
    for id in ["doc", "folder", ""] {
        assert!(check_document_access(policies.docs.as_ref(), id).allowed);
        assert!(check_folder_access(policies.docs.as_ref(), id).allowed);
    }
}

#[test]
fn malformed_file_degrades_every_domain() {
    let file = policy_file("calendar: yes");
    assert_eq!(PolicySet::load(Some(file.path())), PolicySet::default());
}

#[test]
fn readonly_spreadsheet_denies_writes_by_name() {
    let file = policy_file(
        r#"{"sheets": {"allowedSpreadsheets": [
            {"id": "s1", "name": "Quarterly numbers", "access": "readonly"}
        ]}}"#,
    );
    let policies = PolicySet::load(Some(file.path()));
    let sheets = policies.sheets.as_ref();

    assert!(check_access(sheets, "s1", false).allowed);
    let denied = check_access(sheets, "s1", true);
    assert!(!denied.allowed);
    assert!(denied.reason.unwrap().contains("Quarterly numbers"));
}

#[test]
fn malformed_spreadsheet_entry_keeps_the_rest_enforced() {
    let file = policy_file(
        r#"{"sheets": {"allowedSpreadsheets": [
            {"id": "s1", "name": "Budget", "access": "readonly"},
            {"id": "s2", "name": "Tracker", "access": "read-write"}
        ]}}"#,
    );
    let policies = PolicySet::load(Some(file.path()));
    let sheets = policies.sheets.as_ref();

    assert!(sheets.is_some());
    assert!(check_access(sheets, "s1", false).allowed);
    assert!(!check_access(sheets, "s1", true).allowed);
    assert!(!check_access(sheets, "s2", false).allowed);
    assert!(!check_access(sheets, "zzz", true).allowed);
    assert_eq!(SheetsPolicy::load(Some(file.path())), policies.sheets);
}

#[test]
fn document_entry_without_id_keeps_the_rest_enforced() {
    let file = policy_file(
        r#"{"docs": {"allowedDocuments": [
            {"name": "No id"},
            {"id": "doc-1", "name": "Plan"}
        ]}}"#,
    );
    let policies = PolicySet::load(Some(file.path()));
    let docs = policies.docs.as_ref();

    assert!(docs.is_some());
    assert!(check_document_access(docs, "doc-1").allowed);
    assert!(!check_document_access(docs, "unlisted").allowed);
    assert!(!check_folder_access(docs, "any-folder").allowed);
    assert_eq!(DocsPolicy::load(Some(file.path())), policies.docs);
}

#[test]
fn malformed_allowlist_sections_deny_everything() {
    let file = policy_file(
        r#"{
            "docs": {"allowedDocuments": "doc-1"},
            "sheets": ["s1"]
        }"#,
    );
    let policies = PolicySet::load(Some(file.path()));

    assert_eq!(policies.docs, Some(DocsPolicy::default()));
    assert_eq!(policies.sheets, Some(SheetsPolicy::default()));
    assert!(!check_document_access(policies.docs.as_ref(), "doc-1").allowed);
    assert!(!check_access(policies.sheets.as_ref(), "s1", false).allowed);
}

#[tokio::test]
async fn document_in_nested_folder_is_reachable() {
    let file = policy_file(r#"{"docs": {"allowedFolders": [{"id": "root", "name": "Shared"}]}}"#);
    let policies = PolicySet::load(Some(file.path()));
    let drive = Drive::new(&[("grandparent", "parent"), ("parent", "root")]);

    let docs = policies.docs.as_ref();

    let decision = resolve_document_access(docs, "doc", &["grandparent"], &drive).await;
    assert!(decision.allowed);

    let decision = resolve_document_access(docs, "doc", &["elsewhere"], &drive).await;
    assert!(!decision.allowed);
    assert!(decision.reason.unwrap().contains("allowedDocuments"));
}

#[tokio::test]
async fn nested_folder_is_reachable_through_listing() {
    let file = policy_file(r#"{"docs": {"allowedFolders": [{"id": "root", "name": "Shared"}]}}"#);
    let policies = PolicySet::load(Some(file.path()));
    let drive = Drive::new(&[("team", "root"), ("notes", "team"), ("private", "home")]);

    let docs = policies.docs.as_ref();

    let notes = resolve_folder_access(docs, "notes", &drive).await.unwrap();
    assert!(notes.allowed);
    let private = resolve_folder_access(docs, "private", &drive).await.unwrap();
    assert!(!private.allowed);
}

#[tokio::test]
async fn cyclic_parent_graph_terminates() {
    let file = policy_file(r#"{"docs": {"allowedFolders": [{"id": "root", "name": "Shared"}]}}"#);
    let policies = PolicySet::load(Some(file.path()));
    let drive = Drive::new(&[("X", "Y"), ("Y", "Z"), ("Z", "X")]);

    let decision = resolve_document_access(policies.docs.as_ref(), "doc", &["X"], &drive).await;
    assert!(!decision.allowed);
}

#[test]
fn repeated_decisions_are_identical() {
    let policies = PolicySet::default();
    let parties = ["partner@other.org"];
    for op in OperationKind::ALL {
        assert_eq!(
            policies.calendar.decide(op, &parties, SELF),
            policies.calendar.decide(op, &parties, SELF)
        );
    }
}
