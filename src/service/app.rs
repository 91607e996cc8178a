//! Main application state and service coordination
//!
//! Builds the lobby core, the command surface and the gateway client from
//! the configuration, runs them, and tears them down in order.

use crate::command::{CommandDispatcher, DispatcherSettings};
use crate::config::AppConfig;
use crate::discord::{build_client, LobbyBotHandler, LobbyNotifier, SerenityNotifier};
use crate::lobby::{LobbyManager, LobbyScheduler, ManagerSettings};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::health::{HealthProbe, HealthStatus};
use crate::types::ChannelRef;
use serenity::all::{Client, ShardManager};
use serenity::http::Http;
use std::future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Gateway error: {message}")]
    Gateway { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    lobby_manager: Arc<LobbyManager>,

    /// Owns the activation and idle sweeps; started on the first ready event
    scheduler: Arc<LobbyScheduler>,

    metrics_service: Arc<MetricsService>,

    probe: HealthProbe,

    /// Gateway client until `start` moves it into its task
    client: Option<Client>,

    shard_manager: Arc<ShardManager>,

    gateway_task: Option<JoinHandle<Result<(), serenity::Error>>>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing lobby bot");
        info!(
            "Configuration: service={}, prefix='{}', idle_timeout={}s",
            config.service.name, config.bot.command_prefix, config.scheduler.idle_timeout_seconds
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let http = Arc::new(Http::new(&config.bot.token));
        let notifier: Arc<dyn LobbyNotifier> =
            Arc::new(SerenityNotifier::new(http, config.request_timeout()));

        let lobby_manager = Arc::new(LobbyManager::with_metrics(
            notifier,
            ManagerSettings::from_config(&config),
            metrics_collector.clone(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            lobby_manager.clone(),
            DispatcherSettings::from_config(&config),
        ));
        let scheduler = Arc::new(LobbyScheduler::new(
            lobby_manager.clone(),
            config.activation_interval(),
            config.idle_sweep_interval(),
        ));

        let gateway_ready = Arc::new(AtomicBool::new(false));
        let is_running = Arc::new(RwLock::new(false));

        let handler = LobbyBotHandler::new(
            lobby_manager.clone(),
            dispatcher,
            scheduler.clone(),
            config.bot.standby_channel_id.map(ChannelRef),
            gateway_ready.clone(),
        );
        let client = build_client(&config.bot.token, handler)
            .await
            .map_err(|e| ServiceError::Gateway {
                message: format!("Failed to build gateway client: {}", e),
            })?;
        let shard_manager = client.shard_manager.clone();

        let probe = HealthProbe::new(
            config.service.name.clone(),
            lobby_manager.clone(),
            scheduler.clone(),
            gateway_ready,
            is_running.clone(),
        );
        let metrics_service = Self::initialize_metrics(&config, metrics_collector, probe.clone());

        Ok(Self {
            config,
            lobby_manager,
            scheduler,
            metrics_service,
            probe,
            client: Some(client),
            shard_manager,
            gateway_task: None,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    /// Start the health endpoints, background tasks and the gateway session
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting lobby bot");

        let mut client = self.client.take().ok_or_else(|| ServiceError::Initialization {
            message: "Service already started".to_string(),
        })?;

        *self.is_running.write().await = true;

        if self.config.service.enable_health_server {
            self.start_metrics_service().await;
        } else {
            info!("Health server disabled by configuration");
        }

        self.start_background_tasks();

        info!("Connecting to the Discord gateway...");
        self.gateway_task = Some(tokio::spawn(async move { client.start().await }));

        info!("✅ Lobby bot started");
        Ok(())
    }

    /// Resolves when the gateway session ends on its own
    ///
    /// Pending forever when the client was never started.
    pub async fn gateway_closed(&mut self) -> Result<(), ServiceError> {
        let Some(task) = self.gateway_task.as_mut() else {
            return future::pending().await;
        };

        let outcome = task.await;
        self.gateway_task = None;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Gateway {
                message: e.to_string(),
            }),
            Err(e) => Err(ServiceError::BackgroundTask {
                message: format!("Gateway task failed: {}", e),
            }),
        }
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of lobby bot");

        *self.is_running.write().await = false;

        // Sweeps first, so no tick runs against a closing gateway
        if let Err(e) = self.scheduler.shutdown(self.config.shutdown_timeout()).await {
            warn!("Failed to stop lobby scheduler: {}", e);
        } else {
            info!("✅ Lobby sweeps stopped");
        }

        self.shard_manager.shutdown_all().await;
        if let Some(task) = self.gateway_task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout(), task).await {
                Ok(Ok(Ok(()))) => info!("✅ Gateway session closed"),
                Ok(Ok(Err(e))) => warn!("Gateway session ended with error: {}", e),
                Ok(Err(e)) => warn!("Gateway task failed: {}", e),
                Err(_) => warn!("Timed out waiting for the gateway session to close"),
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        let final_stats =
            self.lobby_manager
                .get_stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Lobby bot shutdown completed");

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn lobby_manager(&self) -> Arc<LobbyManager> {
        self.lobby_manager.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn probe(&self) -> HealthProbe {
        self.probe.clone()
    }

    fn initialize_metrics(
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
        probe: HealthProbe,
    ) -> Arc<MetricsService> {
        info!(
            "Initializing metrics service on port {}",
            config.service.health_port
        );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server =
            Arc::new(HealthServer::new(health_config, metrics_collector.clone()).with_probe(probe));

        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    async fn start_metrics_service(&mut self) {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
    }

    /// Periodically refresh uptime, health and lobby gauges
    fn start_background_tasks(&mut self) {
        info!("Starting health metrics task (60s interval)...");

        let probe = self.probe.clone();
        let metrics_collector = self.metrics_service.collector();
        let is_running = self.is_running.clone();

        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            info!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;

                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(probe.uptime_seconds() as i64);

                match probe.check().await {
                    Ok(health) => {
                        metrics_collector.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            metrics_collector.update_component_health(
                                &check.name,
                                check.status != HealthStatus::Unhealthy,
                            );
                        }
                        debug!(
                            "Health: {} - {} active lobbies, uptime {}s",
                            health.status, health.stats.active_lobbies, health.stats.uptime_seconds
                        );
                    }
                    Err(e) => warn!("Health check failed: {}", e),
                }
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.push(health_metrics_task);
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            debug!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
