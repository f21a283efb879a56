//! Startup orchestration and supervision.
//!
//! # Responsibilities
//! - Bring every configured instance up in config order
//! - Keep one serving task per instance for the life of the process
//! - Stop everything on a shutdown signal, or fail fast when a listener dies
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, no partially started process
//! - Certificates and bind happen before the task is spawned
//! - Instances share nothing; each has its own route table and backend pool

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{Id, JoinSet};

use crate::config::{BackendConfig, Config};
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::server::{InstanceError, InstanceServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;

/// Fatal errors while starting or supervising instances.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("instance {instance}: failed to create backend client: {source}")]
    Forwarder {
        instance: usize,
        source: ForwardError,
    },
    #[error("instance {instance}: {source}")]
    Instance {
        instance: usize,
        source: InstanceError,
    },
    #[error("instance {instance}: failed to run webserver: {source}")]
    Serve {
        instance: usize,
        source: std::io::Error,
    },
    #[error("instance {instance}: webserver task aborted: {source}")]
    Task {
        instance: usize,
        source: tokio::task::JoinError,
    },
}

/// Owns the serving tasks of all instances.
pub struct Supervisor {
    shutdown: Shutdown,
    tasks: JoinSet<(usize, std::io::Result<()>)>,
    task_instances: HashMap<Id, usize>,
    local_addrs: Vec<SocketAddr>,
}

impl Supervisor {
    /// Start every instance in configuration order.
    pub async fn launch(
        config: &Config,
        backend: &BackendConfig,
        grace: Duration,
    ) -> Result<Self, StartupError> {
        let mut supervisor = Self {
            shutdown: Shutdown::new(),
            tasks: JoinSet::new(),
            task_instances: HashMap::new(),
            local_addrs: Vec::with_capacity(config.instances.len()),
        };

        for (position, instance_config) in config.instances.iter().enumerate() {
            let instance = position + 1;
            tracing::info!(instance, "Initializing webserver");

            let forwarder = Forwarder::new(backend)
                .map_err(|source| StartupError::Forwarder { instance, source })?;
            let server = InstanceServer::new(instance, instance_config.clone(), forwarder);
            let bound = server
                .bind()
                .await
                .map_err(|source| StartupError::Instance { instance, source })?;

            supervisor.local_addrs.push(bound.local_addr());
            let shutdown_rx = supervisor.shutdown.subscribe();
            let handle = supervisor
                .tasks
                .spawn(async move { (instance, bound.serve(shutdown_rx, grace).await) });
            supervisor.task_instances.insert(handle.id(), instance);
        }

        tracing::info!(
            instances = supervisor.local_addrs.len(),
            backend = %backend.authority(),
            "All webservers started"
        );
        Ok(supervisor)
    }

    /// Bound addresses, in instance order.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), StartupError> {
        self.run_until(async {
            let signal = wait_for_signal().await;
            tracing::info!(%signal, "Shutdown signal received");
        })
        .await
    }

    /// Serve until `stop` completes or a listener fails.
    pub async fn run_until<F>(mut self, stop: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(joined) = self.tasks.join_next_with_id() => {
                    match joined {
                        Ok((_, (instance, Ok(())))) => {
                            tracing::warn!(instance, "Webserver stopped without a shutdown signal");
                        }
                        Ok((_, (instance, Err(source)))) => {
                            tracing::error!(instance, error = %source, "Failed to run webserver");
                            return Err(StartupError::Serve { instance, source });
                        }
                        Err(source) => {
                            let instance = self.task_instances.get(&source.id()).copied().unwrap_or(0);
                            tracing::error!(instance, error = %source, "Webserver task aborted");
                            return Err(StartupError::Task { instance, source });
                        }
                    }
                }
            }
        }

        self.shutdown.trigger();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((instance, Err(e))) => {
                    tracing::warn!(instance, error = %e, "Webserver exited with error during shutdown");
                }
                Err(e) => tracing::warn!(error = %e, "Webserver task failed during shutdown"),
                Ok(_) => {}
            }
        }
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
