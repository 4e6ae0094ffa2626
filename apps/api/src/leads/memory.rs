//! In-process document collection, for local development (`DOCUMENT_BACKEND=memory`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::leads::collection::{
    CollectionPath, DocumentCollection, SnapshotReceiver, StoreError, SNAPSHOT_BUFFER,
};
use crate::leads::models::{Lead, LeadFields, LeadStatus};

const CHANGE_CAPACITY: usize = 256;

type Change = (CollectionPath, Vec<Lead>);

#[derive(Clone)]
pub struct MemoryCollection {
    inner: Arc<Inner>,
}

struct Inner {
    documents: Mutex<HashMap<CollectionPath, Vec<Lead>>>,
    changes: broadcast::Sender<Change>,
}

impl Inner {
    async fn snapshot(&self, path: &CollectionPath) -> Vec<Lead> {
        self.documents
            .lock()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::with_capacity(CHANGE_CAPACITY)
    }

    /// `capacity` bounds the changes a slow subscriber can fall behind by before
    /// it re-reads the collection.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                documents: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotReceiver, StoreError> {
        // Subscribe before reading so no change between the two is lost.
        let mut changes = self.inner.changes.subscribe();
        let initial = self.inner.snapshot(path).await;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let _ = tx.send(Ok(initial)).await;

        let inner = Arc::clone(&self.inner);
        let path = path.clone();
        tokio::spawn(async move {
            loop {
                let snapshot = tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok((changed, snapshot)) if changed == path => snapshot,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Change listener for {path} lagged by {missed}; re-reading");
                            inner.snapshot(&path).await
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = tx
                                .send(Err(StoreError::Subscription(
                                    "collection change feed closed".to_string(),
                                )))
                                .await;
                            break;
                        }
                    },
                };
                if tx.send(Ok(snapshot)).await.is_err() {
                    break;
                }
            }
            debug!("Change listener for {path} stopped");
        });

        Ok(rx)
    }

    async fn add(&self, path: &CollectionPath, fields: &LeadFields) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let mut documents = self.inner.documents.lock().await;
        let collection = documents.entry(path.clone()).or_default();
        collection.push(Lead {
            id,
            fields: fields.clone(),
            created_at: Some(Utc::now()),
        });
        // Sent under the lock so notifications follow write order.
        let _ = self.inner.changes.send((path.clone(), collection.clone()));
        Ok(id)
    }

    async fn update_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), StoreError> {
        let mut documents = self.inner.documents.lock().await;
        let collection = documents.get_mut(path).ok_or(StoreError::NotFound(id))?;
        let lead = collection
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or(StoreError::NotFound(id))?;
        lead.fields.status = status;
        let _ = self.inner.changes.send((path.clone(), collection.clone()));
        Ok(())
    }

    async fn toggle_status(
        &self,
        path: &CollectionPath,
        id: Uuid,
    ) -> Result<LeadStatus, StoreError> {
        let mut documents = self.inner.documents.lock().await;
        let collection = documents.get_mut(path).ok_or(StoreError::NotFound(id))?;
        let lead = collection
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let status = lead.fields.status.toggled();
        lead.fields.status = status;
        let _ = self.inner.changes.send((path.clone(), collection.clone()));
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OwnerId;
    use crate::leads::test_support::fields;

    fn path(owner: &str) -> CollectionPath {
        CollectionPath::for_owner("test-app", &OwnerId::new(owner))
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_then_changes() {
        let collection = MemoryCollection::new();
        let p = path("a");
        let first = collection.add(&p, &fields("first")).await.unwrap();

        let mut rx = collection.subscribe(&p).await.unwrap();
        let initial = rx.recv().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].id, first);
        assert!(initial[0].created_at.is_some());

        collection.add(&p, &fields("second")).await.unwrap();
        let next = rx.recv().await.unwrap().unwrap();
        assert_eq!(next.len(), 2);
    }

    #[tokio::test]
    async fn test_other_owner_changes_are_not_delivered() {
        let collection = MemoryCollection::new();
        let mut rx = collection.subscribe(&path("a")).await.unwrap();
        assert!(rx.recv().await.unwrap().unwrap().is_empty());

        collection.add(&path("b"), &fields("elsewhere")).await.unwrap();
        collection.add(&path("a"), &fields("mine")).await.unwrap();

        let next = rx.recv().await.unwrap().unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].fields.title, "mine");
    }

    #[tokio::test]
    async fn test_update_status_notifies_and_unknown_id_fails() {
        let collection = MemoryCollection::new();
        let p = path("a");
        let id = collection.add(&p, &fields("t")).await.unwrap();
        let mut rx = collection.subscribe(&p).await.unwrap();
        rx.recv().await.unwrap().unwrap();

        collection
            .update_status(&p, id, LeadStatus::Closed)
            .await
            .unwrap();
        let next = rx.recv().await.unwrap().unwrap();
        assert_eq!(next[0].fields.status, LeadStatus::Closed);

        let missing = Uuid::new_v4();
        let err = collection
            .update_status(&p, missing, LeadStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_concurrent_toggles_both_apply() {
        let collection = MemoryCollection::new();
        let p = path("a");
        let id = collection.add(&p, &fields("t")).await.unwrap();

        let first = collection.toggle_status(&p, id).await.unwrap();
        let second = collection.toggle_status(&p, id).await.unwrap();

        assert_eq!(first, LeadStatus::Closed);
        assert_eq!(second, LeadStatus::Active);
        let stored = collection.inner.snapshot(&p).await;
        assert_eq!(stored[0].fields.status, LeadStatus::Active);

        let err = collection.toggle_status(&p, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_converges_to_latest() {
        let collection = MemoryCollection::with_capacity(1);
        let p = path("a");
        let mut rx = collection.subscribe(&p).await.unwrap();
        assert!(rx.recv().await.unwrap().unwrap().is_empty());

        // More writes than the change buffer holds, with no chance to drain it.
        for i in 0..4 {
            collection.add(&p, &fields(&format!("lead {i}"))).await.unwrap();
        }

        let latest = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                let snapshot = rx.recv().await.unwrap().unwrap();
                if snapshot.len() == 4 {
                    return snapshot;
                }
            }
        })
        .await
        .expect("subscriber never caught up");
        assert_eq!(latest.len(), 4);

        // The subscription is still live afterwards.
        collection.add(&p, &fields("lead 4")).await.unwrap();
        let next = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                let snapshot = rx.recv().await.unwrap().unwrap();
                if snapshot.len() == 5 {
                    return snapshot;
                }
            }
        })
        .await
        .expect("subscription ended after lagging");
        assert_eq!(next.len(), 5);
    }
}
