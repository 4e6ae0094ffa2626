use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PILLAR: &str = "Other";

fn default_pillar() -> String {
    DEFAULT_PILLAR.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[default]
    #[serde(alias = "Active")]
    Active,
    #[serde(alias = "Closed")]
    Closed,
    /// Display-only. Read from legacy documents, never written by this service.
    #[serde(alias = "Pending")]
    Pending,
}

impl LeadStatus {
    /// ACTIVE ↔ CLOSED. A pending lead is activated.
    pub fn toggled(self) -> Self {
        match self {
            LeadStatus::Active => LeadStatus::Closed,
            LeadStatus::Closed | LeadStatus::Pending => LeadStatus::Active,
        }
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, LeadStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::Active => "ACTIVE",
            LeadStatus::Closed => "CLOSED",
            LeadStatus::Pending => "PENDING",
        }
    }
}

/// Mission-alignment result of the scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadAnalysis {
    #[serde(default = "default_pillar")]
    pub pillar: String,
    /// Model-reported 1-10. Out-of-range values are kept as reported.
    pub relevance_score: i64,
    pub justification: String,
}

impl LeadAnalysis {
    pub fn score_in_range(&self) -> bool {
        (1..=10).contains(&self.relevance_score)
    }
}

/// One posting returned by the grounded search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub summary: String,
    pub url: String,
}

/// Document body as stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadFields {
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default = "default_pillar")]
    pub pillar: String,
    pub relevance_score: i64,
    #[serde(default)]
    pub justification: String,
    pub owner_id: String,
}

/// A stored lead as delivered by change notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: LeadFields,
    /// Assigned by the store. Documents written without one sort last.
    pub created_at: Option<DateTime<Utc>>,
}

/// Newest first; leads without a timestamp go last.
pub fn sort_newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Caller-supplied content of a lead about to be created.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(flatten)]
    pub analysis: LeadAnalysis,
}

impl NewLead {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("title", &self.title),
            ("company", &self.company),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} cannot be empty"));
            }
        }
        Ok(())
    }

    /// New leads always start ACTIVE.
    pub fn into_fields(self, owner_id: &str) -> LeadFields {
        LeadFields {
            title: self.title,
            company: self.company,
            description: self.description,
            status: LeadStatus::Active,
            pillar: self.analysis.pillar,
            relevance_score: self.analysis.relevance_score,
            justification: self.analysis.justification,
            owner_id: owner_id.to_string(),
        }
    }
}
