//! Docs policy: allowlisted documents and folders.
//!
//! `None` means no `docs` section was configured, and then every check
//! allows. With a policy present, a document is reachable if it is listed
//! itself or sits anywhere below an allowlisted folder; a folder is
//! reachable if it is listed or nested below one.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allowlist::{AccessDecision, AllowlistEntry, find, lenient_entries};
use crate::hierarchy::{
    ContainerDirectory, HierarchyError, ParentLookup, enumerate_descendant_containers,
    is_descendant_of_any_allowed_root,
};
use crate::loader::{PolicyDomain, load_restrictive_section};

/// The `docs` section of the policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocsPolicy {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub allowed_documents: Vec<AllowlistEntry>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub allowed_folders: Vec<AllowlistEntry>,
}

impl DocsPolicy {
    /// Loads the `docs` section, or `None` for unrestricted access. A
    /// section that is present but unreadable denies everything.
    pub fn load(path: Option<&Path>) -> Option<Self> {
        load_restrictive_section(path, PolicyDomain::Docs)
    }

    fn folder_ids(&self) -> Vec<&str> {
        self.allowed_folders.iter().map(|folder| folder.id.as_str()).collect()
    }
}

fn document_not_registered(document_id: &str) -> AccessDecision {
    AccessDecision::deny(format!(
        "document ({}) is not in the allowlist. Add it to allowedDocuments, \
         or use a document inside one of the allowedFolders.",
        document_id
    ))
}

fn folder_not_registered(folder_id: &str) -> AccessDecision {
    AccessDecision::deny(format!("folder ({}) is not in the allowlist.", folder_id))
}

/// Checks a document against the document allowlist only.
pub fn check_document_access(policy: Option<&DocsPolicy>, document_id: &str) -> AccessDecision {
    let Some(policy) = policy else {
        return AccessDecision::allow();
    };
    match find(&policy.allowed_documents, document_id, |entry| entry.id.as_str()) {
        Some(_) => AccessDecision::allow(),
        None => document_not_registered(document_id),
    }
}

/// Checks a folder against the folder allowlist only.
pub fn check_folder_access(policy: Option<&DocsPolicy>, folder_id: &str) -> AccessDecision {
    let Some(policy) = policy else {
        return AccessDecision::allow();
    };
    match find(&policy.allowed_folders, folder_id, |entry| entry.id.as_str()) {
        Some(_) => AccessDecision::allow(),
        None => folder_not_registered(folder_id),
    }
}

/// Returns true if one of a file's direct parents is an allowlisted folder.
pub fn is_file_in_allowed_folder<S: AsRef<str>>(
    policy: Option<&DocsPolicy>,
    parent_ids: &[S],
) -> bool {
    let Some(policy) = policy else {
        return true;
    };
    parent_ids
        .iter()
        .any(|parent| {
            find(&policy.allowed_folders, parent.as_ref(), |entry| {
                entry.id.as_str()
            })
            .is_some()
        })
}

/// Full document check: the document allowlist, then its direct parents,
/// then every ancestor folder.
///
/// Parent lookup failures along the way are dead ends, not errors.
pub async fn resolve_document_access<S: AsRef<str>>(
    policy: Option<&DocsPolicy>,
    document_id: &str,
    parent_ids: &[S],
    lookup: &dyn ParentLookup,
) -> AccessDecision {
    let direct = check_document_access(policy, document_id);
    let Some(policy) = policy else {
        return direct;
    };
    if direct.is_allowed() || is_file_in_allowed_folder(Some(policy), parent_ids) {
        return AccessDecision::allow();
    }

    if is_descendant_of_any_allowed_root(lookup, parent_ids, &policy.folder_ids()).await {
        debug!("document {} reached through an allowlisted ancestor", document_id);
        return AccessDecision::allow();
    }
    direct
}

/// Full folder check: the folder allowlist, then the subfolders of every
/// allowlisted folder.
pub async fn resolve_folder_access(
    policy: Option<&DocsPolicy>,
    folder_id: &str,
    directory: &dyn ContainerDirectory,
) -> Result<AccessDecision, HierarchyError> {
    let direct = check_folder_access(policy, folder_id);
    let Some(policy) = policy else {
        return Ok(direct);
    };
    if direct.is_allowed() {
        return Ok(direct);
    }

    for root in &policy.allowed_folders {
        let descendants = enumerate_descendant_containers(directory, &root.id).await?;
        if descendants.contains(folder_id) {
            debug!("folder {} is nested below allowlisted folder {}", folder_id, root.id);
            return Ok(AccessDecision::allow());
        }
    }
    Ok(direct)
}

/// What the policy lets a listing tool show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllowedItems {
    /// No `docs` section, nothing to enumerate.
    Unrestricted,
    Listed {
        documents: Vec<AllowlistEntry>,
        folders: Vec<AllowlistEntry>,
    },
}

impl AllowedItems {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Listed { documents, folders } => documents.is_empty() && folders.is_empty(),
        }
    }
}

/// Lists the allowlisted documents and folders.
pub fn list_allowed(policy: Option<&DocsPolicy>) -> AllowedItems {
    match policy {
        None => AllowedItems::Unrestricted,
        Some(policy) => AllowedItems::Listed {
            documents: policy.allowed_documents.clone(),
            folders: policy.allowed_folders.clone(),
        },
    }
}
