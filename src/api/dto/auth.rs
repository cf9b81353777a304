/*
 * Responsibility
 * - Request/response DTOs for /api/auth
 * - validate() turns the wire shape into domain inputs (UserLookup, RoleSet)
 */
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::auth::{ClaimsChange, Identity, RoleSet, scopes};
use crate::services::idp::UserLookup;

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub username: Option<String>,
    pub disabled: bool,
    /// First role, for clients that still read a single role.
    pub role: Option<String>,
    pub roles: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Identity> for IdentityResponse {
    fn from(id: &Identity) -> Self {
        Self {
            uid: id.subject_id().to_string(),
            email: id.email().map(str::to_string),
            email_verified: id.email_verified(),
            display_name: id.display_name().map(str::to_string),
            photo_url: id.photo_url().map(str::to_string),
            username: id.username().map(str::to_string),
            disabled: id.disabled(),
            role: id.roles().iter().next().cloned(),
            roles: id.roles().clone(),
            scopes: id.permissions().clone(),
            is_admin: id.roles().contains(scopes::ROLE_ADMIN),
            created_at: id.created_at(),
            last_login: id.last_login(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountStatusResponse {
    pub uid: String,
    pub disabled: bool,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetUserRoleRequest {
    pub uid: Option<String>,
    pub email: Option<String>,
    /// Legacy single-role form.
    pub role: Option<String>,
    pub roles: Option<Vec<String>>,
}

impl SetUserRoleRequest {
    pub fn validate(self) -> Result<(UserLookup, RoleSet), &'static str> {
        let uid = self.uid.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let email = self.email.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let target = match (uid, email) {
            (Some(uid), _) => {
                if uid.len() > 128 || uid.chars().any(|c| c.is_control() || c == '/') {
                    return Err("uid is malformed");
                }
                UserLookup::Uid(uid)
            }
            (None, Some(email)) => {
                let well_formed = email
                    .split_once('@')
                    .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
                if !well_formed || email.len() > 254 {
                    return Err("email is malformed");
                }
                UserLookup::Email(email)
            }
            (None, None) => return Err("either uid or email must be provided"),
        };

        let requested = match (self.roles, self.role) {
            (Some(_), Some(_)) => return Err("provide either role or roles, not both"),
            (Some(roles), None) => roles,
            (None, Some(role)) => vec![role],
            (None, None) => return Err("role or roles is required"),
        };
        let roles = RoleSet::parse(requested)
            .map_err(|_| "roles must match [a-z0-9_:-] and be at most 64 chars")?;

        Ok((target, roles))
    }
}

#[derive(Debug, Serialize)]
pub struct SetUserRoleResponse {
    pub message: String,
    pub uid: String,
    pub old_roles: Vec<String>,
    pub new_roles: Vec<String>,
    pub audit_id: Uuid,
}

impl From<ClaimsChange> for SetUserRoleResponse {
    fn from(change: ClaimsChange) -> Self {
        Self {
            message: format!(
                "Roles updated to {:?} for user {}. User needs to re-authenticate to get the new ID token.",
                change.new_roles, change.target_subject
            ),
            uid: change.target_subject,
            old_roles: change.old_roles,
            new_roles: change.new_roles,
            audit_id: change.audit_id,
        }
    }
}
