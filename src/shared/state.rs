use crate::config::AppConfig;
use crate::shared::error::ApiError;
use crate::shared::utils::DbPool;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::PgConnection;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        Self { conn, config }
    }

    /// Checks out a pooled connection, mapping pool exhaustion to the
    /// generic database error.
    pub fn db(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, ApiError> {
        Ok(self.conn.get()?)
    }
}
