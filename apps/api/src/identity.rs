use std::fmt;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Identifier of the session that owns a lead collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the owner identity for a session.
///
/// A bootstrap token always maps to the same owner (UUIDv5 of the token), so a
/// restart with the same token sees the same collection. Without a token an
/// anonymous owner is created.
pub fn resolve_owner(token: Option<&str>) -> OwnerId {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => {
            let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, token.as_bytes());
            info!("Resolved owner {id} from bootstrap token");
            OwnerId::new(id.to_string())
        }
        None => {
            let id = Uuid::new_v4();
            info!("No bootstrap token; using anonymous owner {id}");
            OwnerId::new(id.to_string())
        }
    }
}
