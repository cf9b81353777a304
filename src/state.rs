/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Cheap to clone (everything behind Arc); built once at startup, never mutated
 */
use std::sync::Arc;
use std::time::Instant;

use crate::services::auth::{Authenticator, ClaimsMutator, Requirement};
use crate::services::health::HealthService;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn Authenticator>,
    pub mutator: Arc<ClaimsMutator>,
    pub health: Arc<HealthService>,
    /// Requirement guarding the privileged admin surface.
    pub admin_requirement: Requirement,
    pub app_name: String,
    pub app_version: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        mutator: Arc<ClaimsMutator>,
        health: Arc<HealthService>,
        admin_scope_name: &str,
    ) -> Self {
        Self {
            auth,
            mutator,
            health,
            admin_requirement: Requirement::any_of([admin_scope_name]),
            app_name: "SQES Data API".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn with_app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }
}
