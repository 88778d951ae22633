//! Calendar policy: verdict tables keyed by operation and relationship tier.
//!
//! Unlike docs and sheets, an absent calendar policy is not "unrestricted".
//! It falls back to [`CalendarPolicy::default`], which allows reads, allows
//! writes that touch only the principal, and denies every delete. A file that
//! configures only part of the table keeps the defaults for the rest.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::loader::{PolicyDomain, load_section};
use crate::tier::{RelationshipTier, classify};

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// Kind of calendar operation being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown operation '{}' (expected read, create, update or delete)", s)
            })
    }
}

/// One verdict per relationship tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierTable {
    pub self_only: Verdict,
    pub internal: Verdict,
    pub external: Verdict,
}

impl TierTable {
    pub const fn new(self_only: Verdict, internal: Verdict, external: Verdict) -> Self {
        Self {
            self_only,
            internal,
            external,
        }
    }

    /// The verdict for `tier`.
    pub fn get(&self, tier: RelationshipTier) -> Verdict {
        match tier {
            RelationshipTier::SelfOnly => self.self_only,
            RelationshipTier::Internal => self.internal,
            RelationshipTier::External => self.external,
        }
    }

    fn overlay(self, partial: Option<PartialTierTable>) -> Self {
        let Some(partial) = partial else {
            return self;
        };
        Self {
            self_only: partial.self_only.unwrap_or(self.self_only),
            internal: partial.internal.unwrap_or(self.internal),
            external: partial.external.unwrap_or(self.external),
        }
    }
}

/// One tier table per operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub read: TierTable,
    pub create: TierTable,
    pub update: TierTable,
    pub delete: TierTable,
}

impl Permissions {
    /// The tier table for `operation`.
    pub fn table(&self, operation: OperationKind) -> &TierTable {
        match operation {
            OperationKind::Read => &self.read,
            OperationKind::Create => &self.create,
            OperationKind::Update => &self.update,
            OperationKind::Delete => &self.delete,
        }
    }
}

/// Effective calendar policy. Every operation resolves to exactly one
/// verdict for every tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PartialCalendarPolicy")]
pub struct CalendarPolicy {
    /// Domain suffix whose members count as internal. Empty disables the
    /// internal tier.
    pub internal_domain: String,
    pub permissions: Permissions,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        use Verdict::{Allow, Deny};
        Self {
            internal_domain: String::new(),
            permissions: Permissions {
                read: TierTable::new(Allow, Allow, Allow),
                create: TierTable::new(Allow, Deny, Deny),
                update: TierTable::new(Allow, Deny, Deny),
                delete: TierTable::new(Deny, Deny, Deny),
            },
        }
    }
}

impl CalendarPolicy {
    /// Loads the `calendar` section of the policy file, falling back to the
    /// default policy.
    pub fn load(path: Option<&Path>) -> Self {
        load_section(path, PolicyDomain::Calendar).unwrap_or_default()
    }

    /// Decides an operation touching `parties` on behalf of `self_id`.
    pub fn decide<S: AsRef<str>>(
        &self,
        operation: OperationKind,
        parties: &[S],
        self_id: &str,
    ) -> Decision {
        let tier = classify(parties, self_id, &self.internal_domain);
        Decision {
            operation,
            tier,
            verdict: self.permissions.table(operation).get(tier),
        }
    }
}

/// Outcome of a calendar policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub operation: OperationKind,
    pub tier: RelationshipTier,
    pub verdict: Verdict,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict.is_allow()
    }

    /// The denial reason, or `None` when the operation is allowed.
    pub fn reason(&self) -> Option<String> {
        (!self.is_allowed()).then(|| deny_message(self.operation, self.tier))
    }
}

/// Explains which relationship tier blocked an operation.
pub fn deny_message(operation: OperationKind, tier: RelationshipTier) -> String {
    format!("{} of events involving {} is not permitted", operation, tier.label())
}

// Shape of the calendar section as written in the policy file.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialCalendarPolicy {
    internal_domain: Option<String>,
    permissions: Option<PartialPermissions>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPermissions {
    read: Option<PartialTierTable>,
    create: Option<PartialTierTable>,
    update: Option<PartialTierTable>,
    delete: Option<PartialTierTable>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialTierTable {
    self_only: Option<Verdict>,
    internal: Option<Verdict>,
    external: Option<Verdict>,
}

impl From<PartialCalendarPolicy> for CalendarPolicy {
    fn from(partial: PartialCalendarPolicy) -> Self {
        let defaults = CalendarPolicy::default();
        let permissions = partial.permissions.unwrap_or_default();
        Self {
            internal_domain: partial.internal_domain.unwrap_or(defaults.internal_domain),
            permissions: Permissions {
                read: defaults.permissions.read.overlay(permissions.read),
                create: defaults.permissions.create.overlay(permissions.create),
                update: defaults.permissions.update.overlay(permissions.update),
                delete: defaults.permissions.delete.overlay(permissions.delete),
            },
        }
    }
}
