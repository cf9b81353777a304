pub mod audit;
pub mod bypass;
pub mod credential;
pub mod error;
pub mod factory;
pub mod identity;
pub mod mutator;
pub mod pipeline;
pub mod policy;
pub mod profile;
pub mod scopes;
pub mod verifier;

pub use audit::{AuditEntry, AuditError, AuditSink, AuditStatus};
pub use error::AuthError;
pub use factory::{AuthComponents, build_auth_components};
pub use identity::Identity;
pub use mutator::{ClaimsChange, ClaimsMutator, RoleSet};
pub use pipeline::Authenticator;
pub use policy::{Decision, DenyReason, Requirement, authorize};
