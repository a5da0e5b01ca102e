use serde::Serialize;
use utoipa::ToSchema;

/// Health summary returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status, `ok` or `degraded`.
    pub status: &'static str,
    /// True while no storage backend is installed.
    pub degraded: bool,
}

impl HealthResponse {
    /// The system is operational.
    pub fn ok() -> Self {
        Self {
            status: "ok",
            degraded: false,
        }
    }

    /// The system is serving without a storage backend.
    pub fn degraded() -> Self {
        Self {
            status: "degraded",
            degraded: true,
        }
    }
}
