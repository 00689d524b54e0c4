//! Owned vs permanent naming of listener destinations and indication filters.
//!
//! Owned objects carry a synthesized `Name` of the form
//! `pywbem{kind}:{submgr_id}:{identity}`. Anything else is a permanent object
//! whose `Name` is the user supplied identity itself.

use std::fmt;
use thiserror::Error;

/// Subscription manager id used when none is configured.
pub const DEFAULT_SUBMGR_ID: &str = "defaultpywbemcliSubMgr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Destination,
    Filter,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Destination => "destination",
            ObjectKind::Filter => "filter",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{kind} identity must not be empty")]
    Empty { kind: ObjectKind },

    #[error("owned {kind} identity '{identity}' must not contain ':'")]
    ContainsColon { kind: ObjectKind, identity: String },

    #[error("subscription manager id '{0}' must be non-empty and must not contain ':'")]
    InvalidSubmgrId(String),

    #[error("permanent {kind} Name '{name}' uses the reserved owned prefix '{prefix}'")]
    ReservedPrefix {
        kind: ObjectKind,
        name: String,
        prefix: String,
    },
}

/// Leading part of every owned `Name` of `kind` for this manager.
pub fn owned_prefix(kind: ObjectKind, submgr_id: &str) -> String {
    format!("pywbem{}:{submgr_id}:", kind.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedIdentity {
    kind: ObjectKind,
    submgr_id: String,
    local: String,
}

impl OwnedIdentity {
    pub fn new(
        kind: ObjectKind,
        submgr_id: impl Into<String>,
        local: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let submgr_id = submgr_id.into();
        let local = local.into();
        if submgr_id.is_empty() || submgr_id.contains(':') {
            return Err(IdentityError::InvalidSubmgrId(submgr_id));
        }
        if local.is_empty() {
            return Err(IdentityError::Empty { kind });
        }
        if local.contains(':') {
            return Err(IdentityError::ContainsColon {
                kind,
                identity: local,
            });
        }
        Ok(OwnedIdentity {
            kind,
            submgr_id,
            local,
        })
    }

    /// Parse an owned `Name`. `None` unless it carries exactly this kind's
    /// prefix for `submgr_id` followed by a non-empty identity without ':'.
    pub fn parse(kind: ObjectKind, submgr_id: &str, name: &str) -> Option<Self> {
        let local = name.strip_prefix(&owned_prefix(kind, submgr_id))?;
        OwnedIdentity::new(kind, submgr_id, local).ok()
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OwnedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", owned_prefix(self.kind, &self.submgr_id), self.local)
    }
}

/// Classification of an existing object's `Name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Owned(OwnedIdentity),
    Permanent(String),
}

impl Identity {
    /// Names that do not parse as owned for this kind and manager are permanent.
    pub fn classify(kind: ObjectKind, submgr_id: &str, name: &str) -> Identity {
        match OwnedIdentity::parse(kind, submgr_id, name) {
            Some(owned) => Identity::Owned(owned),
            None => Identity::Permanent(name.to_string()),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Identity::Owned(_))
    }

    /// The identity a user would type: the local part for owned objects.
    pub fn display_identity(&self) -> &str {
        match self {
            Identity::Owned(o) => o.local(),
            Identity::Permanent(name) => name,
        }
    }
}
