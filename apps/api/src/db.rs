use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent DDL for the lead document collection and its change trigger.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS lead_documents (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        collection_path TEXT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ DEFAULT now(),
        updated_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS lead_documents_collection_idx ON lead_documents (collection_path)",
    r#"
    CREATE OR REPLACE FUNCTION notify_lead_documents() RETURNS trigger AS $$
    BEGIN
        PERFORM pg_notify('lead_documents', COALESCE(NEW.collection_path, OLD.collection_path));
        RETURN NULL;
    END;
    $$ LANGUAGE plpgsql
    "#,
    "DROP TRIGGER IF EXISTS lead_documents_notify ON lead_documents",
    r#"
    CREATE TRIGGER lead_documents_notify
        AFTER INSERT OR UPDATE OR DELETE ON lead_documents
        FOR EACH ROW EXECUTE FUNCTION notify_lead_documents()
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the document table and change trigger if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Schema statement failed: {}", statement.trim()))?;
    }
    info!("Lead document schema ready");
    Ok(())
}
