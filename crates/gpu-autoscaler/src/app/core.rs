use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::app::control_loop::ControlLoop;
use crate::app::tasks::Tasks;
use crate::config::RunArgs;
use crate::infrastructure::k8s::PodWatcher;

/// Application core structure, managing all components
pub struct Application {
    control_loop: Arc<ControlLoop>,
    pod_watcher: Option<Arc<PodWatcher>>,
    run_args: RunArgs,
    tasks: Mutex<Tasks>,
}

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl Application {
    pub fn new(
        control_loop: Arc<ControlLoop>,
        pod_watcher: Option<Arc<PodWatcher>>,
        run_args: RunArgs,
    ) -> Self {
        Self {
            control_loop,
            pod_watcher,
            run_args,
            tasks: Mutex::new(Tasks::new()),
        }
    }

    pub fn control_loop(&self) -> &Arc<ControlLoop> {
        &self.control_loop
    }

    pub fn pod_watcher(&self) -> Option<&Arc<PodWatcher>> {
        self.pod_watcher.as_ref()
    }

    pub fn run_args(&self) -> &RunArgs {
        &self.run_args
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = self.tasks.lock().await;
        tasks.spawn_all_tasks(self);

        tracing::info!("All application tasks started successfully");

        // Wait for tasks to complete or receive shutdown signal
        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }

    /// Gracefully shutdown application: cancel the remaining tasks and wait for them
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application...");

        let mut tasks = self.tasks.lock().await;
        if !tasks.shutdown(SHUTDOWN_TIMEOUT).await {
            anyhow::bail!("Application tasks did not stop within {SHUTDOWN_TIMEOUT:?}");
        }

        tracing::info!("Application shutdown completed");
        Ok(())
    }
}
