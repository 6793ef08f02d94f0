use std::sync::Arc;

use analytics_core::blob::LocalBlobStore;
use analytics_db::Store;
use analytics_pipeline::AdmissionQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Job catalog, submissions and results.
    pub store: Arc<dyn Store>,
    /// Input and result blobs.
    pub blobs: LocalBlobStore,
    /// Admission queue drained by the worker pool.
    pub queue: AdmissionQueue,
    pub config: Arc<ServerConfig>,
}
