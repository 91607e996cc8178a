//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the lobby bot: lobby
//! lifecycle counters, command outcomes, sweep timings and rendering sink
//! failures.

use crate::lobby::manager::LobbyManagerStats;
use crate::types::RemovalReason;
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lobby bot
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Lobby lifecycle metrics
    lobby_metrics: LobbyMetrics,

    /// Command surface metrics
    command_metrics: CommandMetrics,

    /// Sweep and sink performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Lobby lifecycle metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Lobbies currently in the registry
    pub active_lobbies: IntGauge,

    /// Total lobbies created
    pub lobbies_created_total: IntCounter,

    /// Total lobbies removed, by reason
    pub lobbies_removed_total: IntCounterVec,

    /// Total activations (start-time pings)
    pub activations_total: IntCounter,

    /// Roster joins and leaves
    pub roster_changes_total: IntCounterVec,
}

/// Command surface metrics
#[derive(Clone)]
pub struct CommandMetrics {
    /// Commands handled, by command and outcome
    pub commands_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of each sweep pass
    pub sweep_duration_seconds: HistogramVec,

    /// Failed or timed out rendering sink calls
    pub sink_failures_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let command_metrics = CommandMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            command_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get lobby metrics
    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    /// Get command metrics
    pub fn command(&self) -> &CommandMetrics {
        &self.command_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Sync the active-lobby gauge from manager stats
    pub fn update_from_lobby_stats(&self, stats: &LobbyManagerStats) {
        self.lobby_metrics
            .active_lobbies
            .set(stats.active_lobbies as i64);
    }

    /// Record a lobby being created
    pub fn record_lobby_created(&self) {
        self.lobby_metrics.lobbies_created_total.inc();
        self.lobby_metrics.active_lobbies.inc();
    }

    /// Record a lobby leaving the registry
    pub fn record_lobby_removed(&self, reason: RemovalReason) {
        self.lobby_metrics
            .lobbies_removed_total
            .with_label_values(&[reason.as_str()])
            .inc();
        self.lobby_metrics.active_lobbies.dec();
    }

    /// Record a lobby activation
    pub fn record_activation(&self) {
        self.lobby_metrics.activations_total.inc();
    }

    /// Record a roster join (`true`) or leave (`false`)
    pub fn record_roster_change(&self, joined: bool) {
        let action = if joined { "join" } else { "leave" };
        self.lobby_metrics
            .roster_changes_total
            .with_label_values(&[action])
            .inc();
    }

    /// Record a handled command
    pub fn record_command(&self, command: &str, success: bool) {
        let status = if success { "ok" } else { "error" };
        self.command_metrics
            .commands_total
            .with_label_values(&[command, status])
            .inc();
    }

    /// Record how long a sweep pass took
    pub fn record_sweep(&self, sweep: &str, duration: Duration) {
        self.performance_metrics
            .sweep_duration_seconds
            .with_label_values(&[sweep])
            .observe(duration.as_secs_f64());
    }

    /// Record a failed rendering sink call
    pub fn record_sink_failure(&self, operation: &str) {
        self.performance_metrics
            .sink_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("lobby_bot_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "lobby_bot_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("lobby_bot_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_lobbies =
            IntGauge::new("lobby_bot_active_lobbies", "Number of lobbies in the registry")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        let lobbies_created_total =
            IntCounter::new("lobby_bot_lobbies_created_total", "Total lobbies created")?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let lobbies_removed_total = IntCounterVec::new(
            Opts::new("lobby_bot_lobbies_removed_total", "Total lobbies removed"),
            &["reason"],
        )?;
        registry.register(Box::new(lobbies_removed_total.clone()))?;

        let activations_total = IntCounter::new(
            "lobby_bot_activations_total",
            "Total lobbies activated at their start time",
        )?;
        registry.register(Box::new(activations_total.clone()))?;

        let roster_changes_total = IntCounterVec::new(
            Opts::new("lobby_bot_roster_changes_total", "Roster joins and leaves"),
            &["action"],
        )?;
        registry.register(Box::new(roster_changes_total.clone()))?;

        Ok(Self {
            active_lobbies,
            lobbies_created_total,
            lobbies_removed_total,
            activations_total,
            roster_changes_total,
        })
    }
}

impl CommandMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("lobby_bot_commands_total", "Commands handled"),
            &["command", "status"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        Ok(Self { commands_total })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sweep_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lobby_bot_sweep_duration_seconds",
                "Duration of scheduler sweep passes",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["sweep"],
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        let sink_failures_total = IntCounterVec::new(
            Opts::new(
                "lobby_bot_sink_failures_total",
                "Failed or timed out rendering sink calls",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(sink_failures_total.clone()))?;

        Ok(Self {
            sweep_duration_seconds,
            sink_failures_total,
        })
    }
}
