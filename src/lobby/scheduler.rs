//! Periodic sweep tasks
//!
//! Each sweep runs in its own task driven by a tokio interval. Shutdown is a
//! broadcast signal observed only between ticks, so a pass that has started
//! always runs to completion.

use crate::error::{LobbyError, Result};
use crate::lobby::manager::LobbyManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    Activation,
    Idle,
}

impl Sweep {
    fn name(self) -> &'static str {
        match self {
            Sweep::Activation => "activation",
            Sweep::Idle => "idle",
        }
    }
}

/// Owns the activation and idle-expiry sweep tasks
pub struct LobbyScheduler {
    manager: Arc<LobbyManager>,
    activation_interval: Duration,
    idle_sweep_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl LobbyScheduler {
    pub fn new(
        manager: Arc<LobbyManager>,
        activation_interval: Duration,
        idle_sweep_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            manager,
            activation_interval,
            idle_sweep_interval,
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Spawn both sweep tasks; returns false if they were already running
    pub fn start(&self) -> Result<bool> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already running, ignoring start");
            return Ok(false);
        }

        let activation = self.spawn_sweep(Sweep::Activation, self.activation_interval);
        let idle = self.spawn_sweep(Sweep::Idle, self.idle_sweep_interval);

        let mut handles = self
            .handles
            .lock()
            .map_err(|_| LobbyError::lock_poisoned("scheduler handles"))?;
        handles.push(activation);
        handles.push(idle);

        info!(
            "Lobby scheduler started (activation every {}s, idle check every {}s)",
            self.activation_interval.as_secs(),
            self.idle_sweep_interval.as_secs()
        );
        Ok(true)
    }

    fn spawn_sweep(&self, sweep: Sweep, period: Duration) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("{} sweep task started", sweep.name());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.recv() => break,
                }

                // Runs outside the select so shutdown never cuts a pass short
                match sweep {
                    Sweep::Activation => match manager.run_activation_sweep().await {
                        Ok(activated) if !activated.is_empty() => {
                            info!("Activated {} lobby(ies)", activated.len());
                        }
                        Ok(_) => {}
                        Err(e) => error!("Activation sweep failed: {}", e),
                    },
                    Sweep::Idle => match manager.run_idle_sweep().await {
                        Ok(removed) if !removed.is_empty() => {
                            info!("Retired {} idle lobby(ies)", removed.len());
                        }
                        Ok(_) => debug!("Idle sweep completed - nothing to retire"),
                        Err(e) => error!("Idle sweep failed: {}", e),
                    },
                }
            }

            info!("{} sweep task stopped", sweep.name());
        })
    }

    /// Signal both tasks and wait for them, bounded by `timeout`
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let handles: Vec<JoinHandle<()>> = {
            let mut handles = self
                .handles
                .lock()
                .map_err(|_| LobbyError::lock_poisoned("scheduler handles"))?;
            handles.drain(..).collect()
        };
        if handles.is_empty() {
            return Ok(());
        }

        // No receivers only means the tasks are already gone
        let _ = self.shutdown_tx.send(());

        let join_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Sweep task ended abnormally: {}", e);
                }
            }
        };

        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!(
                "Sweep tasks did not stop within {}s",
                timeout.as_secs()
            );
        } else {
            info!("Lobby scheduler stopped");
        }
        Ok(())
    }
}
