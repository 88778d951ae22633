//! Walks over the container graph of a tree-shaped resource domain.
//!
//! The graph is only reachable through two injected capabilities: listing
//! the child containers of a container, and looking up the parents of any
//! resource. Both walks use an explicit worklist and a visited set, so deep
//! or cyclic graphs neither overflow the stack nor loop.

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::BoxFuture;

/// Failure reported by a graph capability.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("resource {0} not found")]
    NotFound(String),
    #[error("lookup of {id} failed: {message}")]
    Lookup { id: String, message: String },
}

/// Lists the containers directly inside a container.
pub trait ContainerDirectory: Send + Sync {
    fn list_child_containers<'a>(
        &'a self,
        container_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, HierarchyError>>;
}

/// Looks up the parent containers of a resource.
pub trait ParentLookup: Send + Sync {
    fn parents<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, HierarchyError>>;
}

/// Collects every container reachable below `root_id`.
///
/// Each container is expanded at most once. A container met again as the
/// child of another container is still reported, so in a cycle
/// `A -> B -> C -> A` walked from `A` the result is `{A, B, C}`: `A` shows up
/// as a child of `C` but is not listed a second time. `root_id` itself is
/// only in the result when it is reached that way.
///
/// A listing failure aborts the walk.
pub async fn enumerate_descendant_containers(
    directory: &dyn ContainerDirectory,
    root_id: &str,
) -> Result<BTreeSet<String>, HierarchyError> {
    let mut found = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root_id.to_string()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let children = directory.list_child_containers(&id).await?;
        for child in children.into_iter().rev() {
            found.insert(child.clone());
            stack.push(child);
        }
    }

    debug!("found {} containers below {}", found.len(), root_id);
    Ok(found)
}

/// Returns true if any of `parent_ids`, or any of their ancestors, is one of
/// `allowed_roots`.
///
/// The ascent stops as soon as an allowed id is visited. A lookup failure
/// only ends that branch. Ids are visited at most once across the whole
/// ascent.
pub async fn is_descendant_of_any_allowed_root<P, R>(
    lookup: &dyn ParentLookup,
    parent_ids: &[P],
    allowed_roots: &[R],
) -> bool
where
    P: AsRef<str>,
    R: AsRef<str>,
{
    let allowed: HashSet<&str> = allowed_roots.iter().map(|root| root.as_ref()).collect();
    let mut visited = HashSet::new();
    let mut stack: Vec<String> = parent_ids
        .iter()
        .rev()
        .map(|id| id.as_ref().to_string())
        .collect();

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if allowed.contains(id.as_str()) {
            return true;
        }
        match lookup.parents(&id).await {
            Ok(parents) => stack.extend(parents.into_iter().rev()),
            Err(e) => debug!("parent lookup dead end at {}: {}", id, e),
        }
    }

    false
}
