//! Database module - PostgreSQL connection and schema

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multiple statements: must go through the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Every classified observation
CREATE TABLE IF NOT EXISTS network_traffic (
    id UUID PRIMARY KEY,
    timestamp TIMESTAMPTZ NOT NULL,
    source_ip VARCHAR(64) NOT NULL,
    destination_ip VARCHAR(64) NOT NULL,
    protocol VARCHAR(16) NOT NULL,
    bytes BIGINT NOT NULL CHECK (bytes >= 0),
    status VARCHAR(16) NOT NULL,
    severity VARCHAR(16),
    CHECK ((status = 'Normal') = (severity IS NULL))
);

-- Incidents derived from Anomalous/Blocked traffic
CREATE TABLE IF NOT EXISTS threat_incidents (
    id UUID PRIMARY KEY,
    traffic_id UUID NOT NULL,
    source_ip VARCHAR(64) NOT NULL,
    destination_ip VARCHAR(64) NOT NULL,
    threat_type VARCHAR(16) NOT NULL,
    severity VARCHAR(16) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'Open',
    description TEXT NOT NULL,
    confidence SMALLINT NOT NULL CHECK (confidence BETWEEN 0 AND 100),
    created_at TIMESTAMPTZ NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_traffic_timestamp ON network_traffic(timestamp);
CREATE INDEX IF NOT EXISTS idx_traffic_status ON network_traffic(status);
CREATE INDEX IF NOT EXISTS idx_incidents_status ON threat_incidents(status);
CREATE INDEX IF NOT EXISTS idx_incidents_created ON threat_incidents(created_at);
"#;
