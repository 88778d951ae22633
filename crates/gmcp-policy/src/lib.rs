//! Access-control engine gating every operation an agent attempts.
//!
//! - [`classify`] - Relationship tier of an operation's other parties
//! - [`CalendarPolicy`] - Verdict tables by operation and tier, restrictive by default
//! - [`DocsPolicy`] / [`SheetsPolicy`] - Allowlists, unrestricted when unconfigured
//! - [`hierarchy`] - Cycle-safe walks over the folder graph
//! - [`PolicySet`] - All domains loaded from one policy file
//!
//! Denials are ordinary values ([`Decision`], [`AccessDecision`]) carrying a
//! human-readable reason, never errors.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Serialize;

pub mod allowlist;
pub mod calendar;
pub mod docs;
pub mod hierarchy;
pub mod loader;
pub mod sheets;
pub mod tier;

pub use allowlist::{AccessDecision, AllowlistEntry};
pub use calendar::{
    CalendarPolicy, Decision, OperationKind, Permissions, TierTable, Verdict, deny_message,
};
pub use docs::{
    AllowedItems, DocsPolicy, check_document_access, check_folder_access, is_file_in_allowed_folder,
    list_allowed, resolve_document_access, resolve_folder_access,
};
pub use hierarchy::{
    ContainerDirectory, HierarchyError, ParentLookup, enumerate_descendant_containers,
    is_descendant_of_any_allowed_root,
};
pub use loader::{PolicyDomain, load_restrictive_section, load_section};
pub use sheets::{SheetAccess, SheetsPolicy, SpreadsheetEntry, check_access};
pub use tier::{RelationshipTier, classify, union_parties};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Effective policy for every domain, read once at startup and immutable
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySet {
    pub calendar: CalendarPolicy,
    /// `None` means unrestricted.
    pub docs: Option<DocsPolicy>,
    /// `None` means unrestricted.
    pub sheets: Option<SheetsPolicy>,
}

impl PolicySet {
    /// Reads the policy file once and extracts every domain section.
    pub fn load(path: Option<&Path>) -> Self {
        match loader::read_document(path) {
            Some(document) => Self::from_document(&document),
            None => Self::default(),
        }
    }

    /// Extracts every domain section from a parsed document.
    pub fn from_document(document: &serde_json::Value) -> Self {
        Self {
            calendar: loader::section_from(document, PolicyDomain::Calendar)
                .unwrap_or_default(),
            docs: loader::restrictive_section_from(document, PolicyDomain::Docs),
            sheets: loader::restrictive_section_from(document, PolicyDomain::Sheets),
        }
    }
}
