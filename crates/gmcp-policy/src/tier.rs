//! Relationship tiers: who else an operation touches.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Blast radius of an operation relative to the acting principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipTier {
    /// Nobody but the principal.
    SelfOnly,
    /// Only members of the configured internal domain.
    Internal,
    /// At least one party outside the internal domain.
    External,
}

impl RelationshipTier {
    pub const ALL: [RelationshipTier; 3] = [Self::SelfOnly, Self::Internal, Self::External];

    /// The configuration key for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfOnly => "self_only",
            Self::Internal => "internal",
            Self::External => "external",
        }
    }

    /// Human-readable description used in denial messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SelfOnly => "only yourself",
            Self::Internal => "internal members",
            Self::External => "external participants",
        }
    }
}

impl fmt::Display for RelationshipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the parties of an operation.
///
/// The principal is removed from `parties` (case-insensitively). Nobody
/// left means [`RelationshipTier::SelfOnly`]. If everyone left has an
/// address ending in `@internal_domain` the tier is
/// [`RelationshipTier::Internal`], but only when `internal_domain` is
/// non-empty; otherwise it is [`RelationshipTier::External`].
pub fn classify<S: AsRef<str>>(
    parties: &[S],
    self_id: &str,
    internal_domain: &str,
) -> RelationshipTier {
    let self_id = self_id.to_lowercase();
    let others: Vec<String> = parties
        .iter()
        .map(|party| party.as_ref().to_lowercase())
        .filter(|party| *party != self_id)
        .collect();

    if others.is_empty() {
        return RelationshipTier::SelfOnly;
    }

    if internal_domain.is_empty() {
        return RelationshipTier::External;
    }

    let suffix = format!("@{}", internal_domain.to_lowercase());
    if others.iter().all(|party| party.ends_with(&suffix)) {
        RelationshipTier::Internal
    } else {
        RelationshipTier::External
    }
}

/// Parties to classify for an update: everyone already on the resource plus
/// everyone the update would add, deduplicated case-insensitively.
///
/// Classifying only the proposed list would let an update drop an external
/// attendee from the request and slip through as self-only.
pub fn union_parties<E: AsRef<str>, P: AsRef<str>>(existing: &[E], proposed: &[P]) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .map(|party| party.as_ref())
        .chain(proposed.iter().map(|party| party.as_ref()))
        .filter(|party| seen.insert(party.to_lowercase()))
        .map(String::from)
        .collect()
}
