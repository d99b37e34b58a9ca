use crate::config::StrategyKind;
use crate::queue::WorkQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the work queue; handlers only ever enqueue and read depth.
    pub queue: WorkQueue,
    /// Reported by `GET /`.
    pub strategy: StrategyKind,
}
