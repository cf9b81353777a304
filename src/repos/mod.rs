pub mod audit_repo;
pub mod error;

pub use audit_repo::ClaimsAuditRepo;
