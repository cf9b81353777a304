//! Dependency readiness checks with a short-lived result cache.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{MySqlPool, PgPool};
use tokio::sync::Mutex;

#[async_trait]
pub trait DependencyProbe: Send + Sync + 'static {
    fn component(&self) -> &'static str;

    async fn ping(&self) -> Result<(), String>;
}

pub struct PgProbe(pub PgPool);

#[async_trait]
impl DependencyProbe for PgProbe {
    fn component(&self) -> &'static str {
        "postgresql_database"
    }

    async fn ping(&self) -> Result<(), String> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.0)
            .await
            .map(|_| ())
            .map_err(|e| first_line(&e.to_string()))
    }
}

pub struct MySqlProbe(pub MySqlPool);

#[async_trait]
impl DependencyProbe for MySqlProbe {
    fn component(&self) -> &'static str {
        "mysql_database"
    }

    async fn ping(&self) -> Result<(), String> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.0)
            .await
            .map(|_| ())
            .map_err(|e| first_line(&e.to_string()))
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentState {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub status: ComponentState,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    Up,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: ServiceState,
    pub components: BTreeMap<&'static str, ComponentStatus>,
    #[serde(skip)]
    pub checked_at: Instant,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == ServiceState::Up
    }
}

pub struct HealthService {
    probes: Vec<Arc<dyn DependencyProbe>>,
    timeout: Duration,
    cache_ttl: Option<Duration>,
    cached: Mutex<Option<ReadinessReport>>,
}

impl HealthService {
    /// `cache_ttl = None` disables caching.
    pub fn new(
        probes: Vec<Arc<dyn DependencyProbe>>,
        timeout: Duration,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            probes,
            timeout,
            cache_ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the report and whether it came from the cache.
    pub async fn readiness(&self) -> (ReadinessReport, bool) {
        // Held across the probes so concurrent callers share one round of checks.
        let mut cached = self.cached.lock().await;

        if let (Some(ttl), Some(report)) = (self.cache_ttl, cached.as_ref())
            && report.checked_at.elapsed() < ttl
        {
            tracing::debug!("returning cached readiness report");
            return (report.clone(), true);
        }

        let report = self.check().await;
        *cached = Some(report.clone());
        (report, false)
    }

    async fn check(&self) -> ReadinessReport {
        let mut status = ServiceState::Up;
        let mut components = BTreeMap::new();

        for probe in &self.probes {
            let name = probe.component();
            let outcome = match tokio::time::timeout(self.timeout, probe.ping()).await {
                Ok(result) => result,
                Err(_) => Err(format!("timed out after {} ms", self.timeout.as_millis())),
            };

            let component = match outcome {
                Ok(()) => {
                    tracing::debug!(component = name, "dependency check: UP");
                    ComponentStatus {
                        status: ComponentState::Up,
                        message: format!("Successfully connected to {name}."),
                    }
                }
                Err(error) => {
                    tracing::error!(component = name, %error, "dependency check: DOWN");
                    status = ServiceState::Degraded;
                    ComponentStatus {
                        status: ComponentState::Down,
                        message: format!("Failed to connect to {name}: {error}"),
                    }
                }
            };
            components.insert(name, component);
        }

        ReadinessReport {
            status,
            components,
            checked_at: Instant::now(),
        }
    }
}
