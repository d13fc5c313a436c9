use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::BackendError;

pub const OFFLINE_WARNING: &str = "Serveur hors ligne. Vérifiez que le backend est démarré.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityStatus {
    /// No probe has resolved yet
    #[default]
    Unknown,
    Connected,
    /// Reachable but answering with errors
    Degraded,
    Unreachable,
}

impl ConnectivityStatus {
    pub fn from_probe(result: &Result<(), BackendError>) -> Self {
        match result {
            Ok(()) => ConnectivityStatus::Connected,
            Err(e) if e.is_connectivity() => ConnectivityStatus::Unreachable,
            Err(_) => ConnectivityStatus::Degraded,
        }
    }
}

/// Single check against the health endpoint. Never fails.
pub async fn probe(backend: &dyn Backend) -> ConnectivityStatus {
    let result = backend.health().await;
    let status = ConnectivityStatus::from_probe(&result);
    match &result {
        Ok(()) => tracing::info!(backend = %backend.describe(), "health probe ok"),
        Err(e) => {
            tracing::warn!(backend = %backend.describe(), ?status, error = %e, "health probe failed")
        }
    }
    status
}

/// Owns the connectivity status; the only writer of it
#[derive(Debug, Default)]
pub struct HealthMonitor {
    status: ConnectivityStatus,
    probe_task: Option<JoinHandle<ConnectivityStatus>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    pub fn is_probing(&self) -> bool {
        self.probe_task.is_some()
    }

    /// Probe in the background; pick the result up with [`poll`](Self::poll).
    /// A probe already running is replaced.
    pub fn start_probe(&mut self, backend: Arc<dyn Backend>) {
        self.cancel_running();
        self.probe_task = Some(tokio::spawn(async move { probe(backend.as_ref()).await }));
    }

    /// Collect a finished background probe without waiting. Returns true when
    /// the status was updated.
    pub async fn poll(&mut self) -> bool {
        match &self.probe_task {
            Some(task) if task.is_finished() => {}
            _ => return false,
        }

        let Some(task) = self.probe_task.take() else {
            return false;
        };
        self.status = match task.await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "health probe task failed");
                ConnectivityStatus::Unreachable
            }
        };
        true
    }

    /// Wait for the background probe, if any
    pub async fn wait(&mut self) -> ConnectivityStatus {
        if let Some(task) = self.probe_task.take() {
            self.status = task.await.unwrap_or(ConnectivityStatus::Unreachable);
        }
        self.status
    }

    /// Advisory banner text, shown only when the backend cannot be reached
    pub fn warning(&self) -> Option<&'static str> {
        match self.status {
            ConnectivityStatus::Unreachable => Some(OFFLINE_WARNING),
            _ => None,
        }
    }

    fn cancel_running(&mut self) {
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
    }
}
