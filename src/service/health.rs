//! Health check model
//!
//! Readiness and liveness probes for the lobby bot. The probe holds only the
//! shared handles it inspects, so the health server never needs the whole
//! application state.

use crate::lobby::{LobbyManager, LobbyScheduler};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `service_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Fold a component status into an overall status
    fn merge(self, component: &HealthStatus) -> HealthStatus {
        match (self, component) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Lobbies currently in the registry
    pub active_lobbies: usize,
    pub lobbies_created: u64,
    pub lobbies_stopped: u64,
    pub lobbies_expired: u64,
    pub activations: u64,
    pub uptime_seconds: u64,
}

/// Shared handles inspected by health checks
#[derive(Clone)]
pub struct HealthProbe {
    service_name: String,
    manager: Arc<LobbyManager>,
    scheduler: Arc<LobbyScheduler>,
    gateway_ready: Arc<AtomicBool>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl HealthProbe {
    pub fn new(
        service_name: impl Into<String>,
        manager: Arc<LobbyManager>,
        scheduler: Arc<LobbyScheduler>,
        gateway_ready: Arc<AtomicBool>,
        is_running: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            manager,
            scheduler,
            gateway_ready,
            is_running,
            started_at: Instant::now(),
        }
    }

    pub fn manager(&self) -> Arc<LobbyManager> {
        self.manager.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Perform a full health check of the bot
    pub async fn check(&self) -> Result<HealthCheck> {
        let checks = vec![
            self.check_service_running().await,
            self.check_gateway(),
            self.check_scheduler(),
            self.check_lobby_manager().await,
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, c| overall.merge(&c.status));

        Ok(HealthCheck {
            status,
            service: self.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: self.gather_service_stats().await,
        })
    }

    /// Liveness only requires the service loop to be running
    pub async fn liveness_check(&self) -> Result<HealthStatus> {
        if self.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Ready once the gateway session is up; degraded while the sweeps are not running
    pub async fn readiness_check(&self) -> Result<HealthStatus> {
        if !self.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let gateway = self.check_gateway().status;
        if gateway != HealthStatus::Healthy {
            return Ok(gateway);
        }

        let scheduler = self.check_scheduler().status;
        let manager = self.check_lobby_manager().await.status;
        Ok(scheduler.merge(&manager))
    }

    async fn check_service_running(&self) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = if self.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };
        component("service_running", status, message, start)
    }

    fn check_gateway(&self) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = if self.gateway_ready.load(Ordering::SeqCst) {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Gateway session not ready".to_string()),
            )
        };
        component("discord_gateway", status, message, start)
    }

    fn check_scheduler(&self) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = if self.scheduler.is_started() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some("Lobby sweeps not started".to_string()),
            )
        };
        component("lobby_scheduler", status, message, start)
    }

    async fn check_lobby_manager(&self) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = match self.manager.get_stats().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Lobby manager stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };
        component("lobby_manager", status, message, start)
    }

    async fn gather_service_stats(&self) -> ServiceStats {
        match self.manager.get_stats().await {
            Ok(stats) => ServiceStats {
                active_lobbies: stats.active_lobbies,
                lobbies_created: stats.lobbies_created,
                lobbies_stopped: stats.lobbies_stopped,
                lobbies_expired: stats.lobbies_expired,
                activations: stats.activations,
                uptime_seconds: self.uptime_seconds(),
            },
            Err(e) => {
                debug!("Failed to get lobby stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds: self.uptime_seconds(),
                    ..ServiceStats::default()
                }
            }
        }
    }
}

fn component(
    name: &str,
    status: HealthStatus,
    message: Option<String>,
    start: Instant,
) -> ComponentCheck {
    ComponentCheck {
        name: name.to_string(),
        status,
        message,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
