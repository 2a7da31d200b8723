use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use trackmirror_core::config::PostgresConfig;

/// Create a PostgreSQL connection pool.
pub async fn connect(cfg: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.connection_string())
        .await?;
    info!("PostgreSQL connected: {}:{}/{}", cfg.host, cfg.port, cfg.database);
    Ok(pool)
}
