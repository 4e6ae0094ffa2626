//! Lead Synchronization Store.
//!
//! Owns the session's collection address and a live, sorted view of the leads in
//! it. Writes go straight to the collection; the view changes only when the
//! collection's change stream delivers a new snapshot.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::identity::OwnerId;
use crate::leads::collection::{CollectionPath, DocumentCollection, SnapshotReceiver, StoreError};
use crate::leads::models::{sort_newest_first, Lead, LeadStatus, NewLead};

/// What readers see. Replaced wholesale per snapshot, never patched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadView {
    pub owner_id: Option<String>,
    pub leads: Vec<Lead>,
    /// Set when the change subscription fails. Cleared only by resolving identity again.
    pub error: Option<String>,
    /// Bumped whenever the subscription is replaced or torn down.
    #[serde(skip)]
    generation: u64,
}

enum Subscription {
    Idle,
    Active(JoinHandle<()>),
    Failed,
}

struct Session {
    owner: OwnerId,
    path: CollectionPath,
    subscription: Subscription,
}

impl Session {
    fn teardown(self) {
        if let Subscription::Active(handle) = self.subscription {
            handle.abort();
        }
        info!("Closed lead subscription for owner {}", self.owner);
    }
}

pub struct LeadStore {
    collection: Arc<dyn DocumentCollection>,
    namespace: String,
    session: Mutex<Option<Session>>,
    view: Arc<watch::Sender<LeadView>>,
}

impl LeadStore {
    pub fn new(collection: Arc<dyn DocumentCollection>, config: &Config) -> Self {
        let (view, _) = watch::channel(LeadView::default());
        Self {
            collection,
            namespace: config.app_namespace.clone(),
            session: Mutex::new(None),
            view: Arc::new(view),
        }
    }

    /// Binds the store to `owner`, replacing any previous identity, and subscribes
    /// to the owner's collection. The previous subscription delivers nothing after
    /// this returns.
    pub async fn resolve_identity(&self, owner: OwnerId) {
        {
            let mut session = self.session.lock().await;
            if let Some(previous) = session.take() {
                previous.teardown();
            }

            let owner_id = owner.to_string();
            self.view.send_modify(|view| {
                view.generation += 1;
                view.owner_id = Some(owner_id);
                view.leads.clear();
                view.error = None;
            });

            *session = Some(Session {
                path: CollectionPath::for_owner(&self.namespace, &owner),
                owner,
                subscription: Subscription::Idle,
            });
        }

        if let Err(e) = self.subscribe().await {
            warn!("Identity released before it could subscribe: {e}");
        }
    }

    /// Opens the change subscription for the resolved owner. Does nothing if one
    /// was already opened for this identity, including one that has since failed.
    pub async fn subscribe(&self) -> Result<(), StoreError> {
        let mut session = self.session.lock().await;
        let session = session.as_mut().ok_or(StoreError::NotReady)?;
        self.open_subscription(session).await;
        Ok(())
    }

    async fn open_subscription(&self, session: &mut Session) {
        if !matches!(session.subscription, Subscription::Idle) {
            return;
        }

        let generation = self.view.borrow().generation;
        match self.collection.subscribe(&session.path).await {
            Ok(rx) => {
                info!("Subscribed to {}", session.path);
                let handle = tokio::spawn(apply_snapshots(
                    rx,
                    Arc::clone(&self.view),
                    generation,
                    session.path.clone(),
                ));
                session.subscription = Subscription::Active(handle);
            }
            Err(e) => {
                error!("Failed to subscribe to {}: {e}", session.path);
                record_error(&self.view, generation, e.to_string());
                session.subscription = Subscription::Failed;
            }
        }
    }

    /// Adds a lead to the owner's collection. The view picks it up from the
    /// next change notification.
    pub async fn create(&self, lead: NewLead) -> Result<Uuid, StoreError> {
        let (owner, path) = self.address().await?;
        let fields = lead.into_fields(owner.as_str());
        let id = self.collection.add(&path, &fields).await?;
        info!("Created lead {id} ('{}') in {path}", fields.title);
        Ok(id)
    }

    pub async fn update_status(&self, id: Uuid, status: LeadStatus) -> Result<(), StoreError> {
        let (_, path) = self.address().await?;
        self.collection.update_status(&path, id, status).await?;
        info!("Set lead {id} to {}", status.as_str());
        Ok(())
    }

    /// Flips ACTIVE and CLOSED against the stored document, not the view.
    pub async fn toggle_status(&self, id: Uuid) -> Result<LeadStatus, StoreError> {
        let (_, path) = self.address().await?;
        let status = self.collection.toggle_status(&path, id).await?;
        info!("Toggled lead {id} to {}", status.as_str());
        Ok(status)
    }

    async fn address(&self) -> Result<(OwnerId, CollectionPath), StoreError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| (s.owner.clone(), s.path.clone()))
            .ok_or(StoreError::NotReady)
    }

    pub async fn is_ready(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// A receiver that observes every view replacement.
    pub fn view(&self) -> watch::Receiver<LeadView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> LeadView {
        self.view.borrow().clone()
    }

    /// Tears down the subscription and forgets the identity.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            previous.teardown();
        }
        // View reset happens under the session lock, as in `resolve_identity`.
        self.view.send_modify(|view| {
            view.generation += 1;
            view.owner_id = None;
            view.leads.clear();
        });
    }
}

impl Drop for LeadStore {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.teardown();
        }
    }
}

/// The single writer of the view's lead list.
async fn apply_snapshots(
    mut rx: SnapshotReceiver,
    view: Arc<watch::Sender<LeadView>>,
    generation: u64,
    path: CollectionPath,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Ok(mut leads) => {
                sort_newest_first(&mut leads);
                let count = leads.len();
                let applied = view.send_if_modified(|current| {
                    if current.generation != generation {
                        return false;
                    }
                    current.leads = leads;
                    true
                });
                if !applied {
                    debug!("Dropping snapshot for {path}: subscription superseded");
                    return;
                }
                debug!("Applied snapshot of {count} leads for {path}");
            }
            Err(e) => {
                error!("Lead subscription for {path} failed: {e}");
                record_error(&view, generation, e.to_string());
                return;
            }
        }
    }
    warn!("Change stream for {path} closed");
    record_error(&view, generation, "change stream closed".to_string());
}

fn record_error(view: &watch::Sender<LeadView>, generation: u64, message: String) {
    view.send_if_modified(|current| {
        if current.generation != generation {
            return false;
        }
        current.error = Some(message);
        true
    });
}
