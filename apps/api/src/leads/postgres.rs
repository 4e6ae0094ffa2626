//! Postgres-backed document collection.
//!
//! Documents live in `lead_documents` as JSONB keyed by collection path. A row
//! trigger (see `db::ensure_schema`) issues `NOTIFY lead_documents, '<path>'` on
//! every insert, update and delete; subscribers answer each notification with a
//! single `SELECT` of the whole collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::leads::collection::{
    CollectionPath, DocumentCollection, SnapshotReceiver, SnapshotSender, StoreError,
    SNAPSHOT_BUFFER,
};
use crate::leads::models::{Lead, LeadFields, LeadStatus};

pub const CHANGE_CHANNEL: &str = "lead_documents";

#[derive(Debug, FromRow)]
struct LeadRow {
    id: Uuid,
    data: Json<LeadFields>,
    created_at: Option<DateTime<Utc>>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            fields: row.data.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCollection {
    pool: PgPool,
}

impl PgCollection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_snapshot(pool: &PgPool, path: &CollectionPath) -> Result<Vec<Lead>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LeadRow>(
        "SELECT id, data, created_at FROM lead_documents WHERE collection_path = $1",
    )
    .bind(path.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Lead::from).collect())
}

/// What a listener wake-up means for one subscribed collection.
#[derive(Debug, PartialEq, Eq)]
enum Notification {
    Changed,
    Unrelated,
    ListenerLost,
}

/// `None` is a dropped listener connection; the channel is shared by every
/// collection, so only a payload equal to `path` is a change.
fn classify(payload: Option<&str>, path: &CollectionPath) -> Notification {
    match payload {
        Some(changed) if changed == path.as_str() => Notification::Changed,
        Some(_) => Notification::Unrelated,
        None => Notification::ListenerLost,
    }
}

/// Source of change notifications and collection reads for one subscription.
#[async_trait]
trait ChangeFeed: Send {
    /// Next notification payload. `Ok(None)` means the connection was lost.
    async fn next_payload(&mut self) -> Result<Option<String>, String>;

    async fn snapshot(&mut self, path: &CollectionPath) -> Result<Vec<Lead>, String>;
}

struct PgFeed {
    listener: PgListener,
    pool: PgPool,
}

#[async_trait]
impl ChangeFeed for PgFeed {
    async fn next_payload(&mut self) -> Result<Option<String>, String> {
        self.listener
            .try_recv()
            .await
            .map(|n| n.map(|n| n.payload().to_string()))
            .map_err(|e| e.to_string())
    }

    async fn snapshot(&mut self, path: &CollectionPath) -> Result<Vec<Lead>, String> {
        fetch_snapshot(&self.pool, path)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Forwards one snapshot per matching notification until the receiver is dropped
/// or the feed fails. A lost listener connection ends the subscription:
/// notifications sent while disconnected are gone, so reconnecting silently
/// would leave the view stale.
async fn forward_changes<F: ChangeFeed>(mut feed: F, path: CollectionPath, tx: SnapshotSender) {
    loop {
        let next = tokio::select! {
            _ = tx.closed() => break,
            n = feed.next_payload() => n,
        };

        let failure = match next {
            Err(e) => e,
            Ok(payload) => match classify(payload.as_deref(), &path) {
                Notification::Unrelated => continue,
                Notification::ListenerLost => "listener connection lost".to_string(),
                Notification::Changed => match feed.snapshot(&path).await {
                    Ok(snapshot) => {
                        if tx.send(Ok(snapshot)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Err(e) => format!("snapshot query failed: {e}"),
                },
            },
        };

        error!("Change subscription for {path} ended: {failure}");
        let _ = tx.send(Err(StoreError::Subscription(failure))).await;
        break;
    }
    debug!("Change listener for {path} stopped");
}

#[async_trait]
impl DocumentCollection for PgCollection {
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotReceiver, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))?;

        // LISTEN is active before the initial read, so no change falls between.
        let initial = fetch_snapshot(&self.pool, path)
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))?;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let _ = tx.send(Ok(initial)).await;
        info!("Listening for changes on {path}");

        let feed = PgFeed {
            listener,
            pool: self.pool.clone(),
        };
        tokio::spawn(forward_changes(feed, path.clone(), tx));
        Ok(rx)
    }

    async fn add(&self, path: &CollectionPath, fields: &LeadFields) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO lead_documents (collection_path, data) VALUES ($1, $2) RETURNING id",
        )
        .bind(path.as_str())
        .bind(Json(fields))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE lead_documents
            SET data = jsonb_set(data, '{status}', to_jsonb($1::text)),
                updated_at = now()
            WHERE id = $2 AND collection_path = $3
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .bind(path.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn toggle_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
    ) -> Result<LeadStatus, StoreError> {
        // Row lock on UPDATE serializes concurrent toggles of the same lead.
        let written: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE lead_documents
            SET data = jsonb_set(
                    data,
                    '{status}',
                    to_jsonb(CASE
                        WHEN upper(COALESCE(data->>'status', 'ACTIVE')) = 'ACTIVE' THEN 'CLOSED'::text
                        ELSE 'ACTIVE'::text
                    END)
                ),
                updated_at = now()
            WHERE id = $1 AND collection_path = $2
            RETURNING data->>'status'
            "#,
        )
        .bind(id)
        .bind(path.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let written = written.ok_or(StoreError::NotFound(id))?;
        Ok(if written == LeadStatus::Closed.as_str() {
            LeadStatus::Closed
        } else {
            LeadStatus::Active
        })
    }
}
