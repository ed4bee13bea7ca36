use sqlx::PgPool;

use crate::{config::Config, repos::Repos, stores::Stores};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Raw database handle, used by the health check.
    pub database: PgPool,
    /// Raw Redis handle, used by the health check.
    pub redis: redis::Client,
    /// Database repositories and gates.
    pub repos: Repos,
    /// Ephemeral stores (Redis).
    pub stores: Stores,
}
