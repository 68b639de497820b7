use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::core::Application;
use crate::app::trigger::CycleTrigger;
use crate::infrastructure::k8s::PodWatcher;

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, app: &Application) {
        let (trigger, trigger_receiver) = CycleTrigger::channel();

        // Pod events only request cycles; the control loop stays the single consumer
        if let Some(pod_watcher) = app.pod_watcher() {
            let pod_watcher_task = self.spawn_pod_watcher_task(pod_watcher.clone(), trigger);
            self.tasks.push(pod_watcher_task);
        } else {
            tracing::info!("Pod watching disabled, scaling on the fixed interval only");
        }

        let control_loop_task = self.spawn_control_loop_task(app, trigger_receiver);
        self.tasks.push(control_loop_task);
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        // Set up signal handling for graceful shutdown
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            // Wait for shutdown signal
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();
            }
            // Wait for any task to complete unexpectedly
            result = futures::future::select_all(self.tasks.iter_mut()) => {
                let (result, index, remaining) = result;
                drop(remaining);
                // a finished handle must not be awaited again
                self.tasks.remove(index);
                if let Err(e) = result {
                    tracing::error!("Task completed with error: {e}");
                    return Err(e.into());
                }
                tracing::warn!("Task completed unexpectedly");
            }
        }

        Ok(())
    }

    /// Cancel every task and wait for them to stop.
    ///
    /// Returns `false` if some task was still running after `timeout`.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        self.cancellation_token.cancel();

        let tasks = std::mem::take(&mut self.tasks);
        let stopped = tokio::time::timeout(timeout, async {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if stopped.is_err() {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        }
        stopped.is_ok()
    }

    fn spawn_pod_watcher_task(
        &self,
        pod_watcher: Arc<PodWatcher>,
        trigger: CycleTrigger,
    ) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting Kubernetes pod watcher task");
            if let Err(e) = pod_watcher.run(trigger, token).await {
                tracing::error!("Kubernetes pod watcher failed: {e:?}");
            } else {
                tracing::info!("Kubernetes pod watcher completed");
            }
        })
    }

    fn spawn_control_loop_task(
        &self,
        app: &Application,
        trigger_receiver: mpsc::Receiver<()>,
    ) -> JoinHandle<()> {
        let control_loop = app.control_loop().clone();
        let interval = app.run_args().interval();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting scaling control loop task");
            control_loop.run(interval, trigger_receiver, token).await;
            tracing::info!("Scaling control loop task completed");
        })
    }
}
