/*
 * Responsibility
 * - Response DTOs for / and /api/health
 */
use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::health::{ComponentStatus, ServiceState};

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub service: String,
    pub message: &'static str,
    pub version: String,
    pub status: &'static str,
    pub links: RootLinks,
}

#[derive(Debug, Serialize)]
pub struct RootLinks {
    pub modules: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub service: String,
    pub status: &'static str,
    pub version: String,
    pub timestamp_utc: String,
    pub uptime_seconds: u64,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub service: String,
    pub status: ServiceState,
    pub version: String,
    pub timestamp_utc: String,
    pub response_time_ms: f64,
    pub uptime_seconds: u64,
    pub cached: bool,
    pub components: BTreeMap<&'static str, ComponentStatus>,
}
