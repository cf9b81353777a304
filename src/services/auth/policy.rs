//! Authorization policy engine.
//!
//! A pure function of (identity, requirement). No I/O, no state, total over
//! its inputs.
use crate::services::auth::error::AuthError;
use crate::services::auth::identity::Identity;

/// What a route demands of the caller. Declared statically per route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any successfully assembled, non-disabled identity.
    Authenticated,
    /// At least one listed role/permission.
    AnyOf(Vec<String>),
    /// Every listed role/permission.
    AllOf(Vec<String>),
    /// Reading one's own account status; the only requirement a disabled
    /// identity can satisfy.
    OwnStatus,
}

impl Requirement {
    pub fn any_of<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(entries.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllOf(entries.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    AccountDisabled,
    /// `required` is the first entry, in declaration order, that the identity lacks.
    InsufficientScope { required: Option<String> },
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::AccountDisabled => "account_disabled",
            DenyReason::InsufficientScope { .. } => "insufficient_scope",
        }
    }
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::AccountDisabled => AuthError::AccountDisabled,
            DenyReason::InsufficientScope { required } => AuthError::InsufficientScope { required },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

pub fn authorize(identity: &Identity, requirement: &Requirement) -> Decision {
    if let Requirement::OwnStatus = requirement {
        return Decision::Allow;
    }
    if identity.disabled() {
        return Decision::Deny(DenyReason::AccountDisabled);
    }

    match requirement {
        Requirement::Authenticated | Requirement::OwnStatus => Decision::Allow,
        Requirement::AnyOf(accepted) => {
            if accepted.iter().any(|entry| identity.holds(entry)) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::InsufficientScope {
                    required: accepted.first().cloned(),
                })
            }
        }
        Requirement::AllOf(required) => match required.iter().find(|e| !identity.holds(e)) {
            None => Decision::Allow,
            Some(missing) => Decision::Deny(DenyReason::InsufficientScope {
                required: Some(missing.clone()),
            }),
        },
    }
}
