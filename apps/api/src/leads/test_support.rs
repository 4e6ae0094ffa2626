//! Fakes and fixtures shared by lead tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::leads::collection::{
    CollectionPath, DocumentCollection, SnapshotReceiver, SnapshotSender, StoreError,
    SNAPSHOT_BUFFER,
};
use crate::leads::models::{Lead, LeadFields, LeadStatus, DEFAULT_PILLAR};

pub fn fields(title: &str) -> LeadFields {
    LeadFields {
        title: title.to_string(),
        company: "Co".to_string(),
        description: "desc".to_string(),
        status: LeadStatus::Active,
        pillar: DEFAULT_PILLAR.to_string(),
        relevance_score: 5,
        justification: String::new(),
        owner_id: "owner".to_string(),
    }
}

pub fn lead(title: &str, created_at: Option<DateTime<Utc>>) -> Lead {
    lead_with_id(Uuid::new_v4(), fields(title), created_at)
}

pub fn lead_with_id(id: Uuid, fields: LeadFields, created_at: Option<DateTime<Utc>>) -> Lead {
    Lead {
        id,
        fields,
        created_at,
    }
}

/// A collection whose change streams are driven by the test.
///
/// Every `subscribe` call gets its own stream, addressed by call order in `push`.
#[derive(Default)]
pub struct ScriptedCollection {
    fail_subscribe: Option<String>,
    subscribers: Mutex<Vec<(CollectionPath, SnapshotSender)>>,
    added: Mutex<Vec<(CollectionPath, LeadFields)>>,
    updates: Mutex<Vec<(Uuid, LeadStatus)>>,
}

impl ScriptedCollection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_subscribe: Some(message.to_string()),
            ..Self::default()
        })
    }

    /// Delivers an event on the `index`-th subscription. Ignored if it was torn down.
    pub async fn push(&self, index: usize, event: Result<Vec<Lead>, StoreError>) {
        let tx = self.subscribers.lock().unwrap()[index].1.clone();
        let _ = tx.send(event).await;
    }

    pub fn subscriber_paths(&self) -> Vec<CollectionPath> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn added(&self) -> Vec<(CollectionPath, LeadFields)> {
        self.added.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(Uuid, LeadStatus)> {
        self.updates.lock().unwrap().clone()
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> usize {
        self.subscribers.lock().unwrap().len()
            + self.added.lock().unwrap().len()
            + self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentCollection for ScriptedCollection {
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotReceiver, StoreError> {
        if let Some(message) = &self.fail_subscribe {
            return Err(StoreError::Subscription(message.clone()));
        }
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        self.subscribers.lock().unwrap().push((path.clone(), tx));
        Ok(rx)
    }

    async fn add(&self, path: &CollectionPath, fields: &LeadFields) -> Result<Uuid, StoreError> {
        self.added
            .lock()
            .unwrap()
            .push((path.clone(), fields.clone()));
        Ok(Uuid::new_v4())
    }

    async fn update_status(
        &self,
        _path: &CollectionPath,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), StoreError> {
        self.updates.lock().unwrap().push((id, status));
        Ok(())
    }

    /// Always reports CLOSED; the flip itself is a backend concern.
    async fn toggle_status(
        &self,
        _path: &CollectionPath,
        id: Uuid,
    ) -> Result<LeadStatus, StoreError> {
        self.updates.lock().unwrap().push((id, LeadStatus::Closed));
        Ok(LeadStatus::Closed)
    }
}
