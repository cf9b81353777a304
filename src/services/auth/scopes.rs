//! API scope catalog and role → scope derivation.
use std::collections::BTreeSet;

pub const METADATA_READ: &str = "metadata:read";
pub const METADATA_WRITE: &str = "metadata:write";
pub const QC_READ: &str = "qc:read";
pub const QC_WRITE: &str = "qc:write";
pub const ADMIN: &str = "admin";
pub const CLAIMS_MANAGE: &str = "claims:manage";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_USER: &str = "user";

/// Every scope the API declares, with a human-readable description.
pub const API_SCOPES: &[(&str, &str)] = &[
    (METADATA_READ, "Allows reading station metadata."),
    (METADATA_WRITE, "Allows writing/modifying station metadata."),
    (QC_READ, "Allows reading Quality Control (QC) results."),
    (QC_WRITE, "Allows writing/modifying Quality Control (QC) results."),
    (ADMIN, "Grants full administrative access."),
    (CLAIMS_MANAGE, "Allows changing role claims of other subjects."),
];

const MANAGER_SCOPES: &[&str] = &[METADATA_READ, METADATA_WRITE, QC_READ, QC_WRITE];
const USER_SCOPES: &[&str] = &[METADATA_READ, QC_READ];

/// Scopes granted by a single role. Unknown roles grant nothing.
pub fn scopes_for_role(role: &str) -> Vec<&'static str> {
    match role {
        ROLE_ADMIN => API_SCOPES.iter().map(|(name, _)| *name).collect(),
        ROLE_MANAGER => MANAGER_SCOPES.to_vec(),
        ROLE_USER => USER_SCOPES.to_vec(),
        _ => Vec::new(),
    }
}

/// Union of the scopes granted by `roles`.
pub fn derive_permissions<'a, I>(roles: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    roles
        .into_iter()
        .flat_map(|role| scopes_for_role(role))
        .map(str::to_string)
        .collect()
}
