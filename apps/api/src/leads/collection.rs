//! Document collection abstraction behind the lead store.
//!
//! A backend delivers the full current document set of a collection on every
//! change. Each delivered set is one consistent snapshot.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::identity::OwnerId;
use crate::leads::models::{Lead, LeadFields, LeadStatus};

/// Buffered snapshots per subscription before the backend waits on the listener.
pub const SNAPSHOT_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lead store is not ready: owner identity has not been resolved")]
    NotReady,

    #[error("lead {0} not found")]
    NotFound(Uuid),

    #[error("change subscription failed: {0}")]
    Subscription(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Full document sets, or the error that ended the subscription.
pub type SnapshotReceiver = mpsc::Receiver<Result<Vec<Lead>, StoreError>>;
pub type SnapshotSender = mpsc::Sender<Result<Vec<Lead>, StoreError>>;

/// `artifacts/{namespace}/users/{owner}/job_leads`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn for_owner(namespace: &str, owner: &OwnerId) -> Self {
        Self(format!("artifacts/{namespace}/users/{owner}/job_leads"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Opens a change stream. The current set is delivered first, then one full
    /// set per change. Dropping the receiver ends the subscription.
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotReceiver, StoreError>;

    /// Appends a document; the store assigns id and creation time.
    async fn add(&self, path: &CollectionPath, fields: &LeadFields) -> Result<Uuid, StoreError>;

    async fn update_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), StoreError>;

    /// Flips ACTIVE and CLOSED in one atomic write against the stored document
    /// and returns the status written.
    async fn toggle_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
    ) -> Result<LeadStatus, StoreError>;
}
