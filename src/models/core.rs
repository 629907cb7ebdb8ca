// src/models/core.rs

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------

/// Strongly typed identifier for Contact records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

/// Strongly typed identifier for the user that owns a contact book
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        ContactId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the pair with the smaller id first, so an unordered pair has one key.
pub fn ordered_pair(a: &ContactId, b: &ContactId) -> (ContactId, ContactId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

//------------------------------------------------------------------------------
// CONTACT SOURCE
//------------------------------------------------------------------------------

/// Ingestion pipeline a contact record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Manual,
    Network,
    Calendar,
    Email,
    Import,
    Unknown,
}

impl ContactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSource::Manual => "manual",
            ContactSource::Network => "network",
            ContactSource::Calendar => "calendar",
            ContactSource::Email => "email",
            ContactSource::Import => "import",
            ContactSource::Unknown => "unknown",
        }
    }

    /// Lenient parse of stored source labels; unrecognized labels map to `Unknown`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "manual" => ContactSource::Manual,
            "network" | "linkedin" => ContactSource::Network,
            "calendar" => ContactSource::Calendar,
            "email" | "gmail" => ContactSource::Email,
            "import" | "csv" => ContactSource::Import,
            _ => ContactSource::Unknown,
        }
    }
}

impl Default for ContactSource {
    fn default() -> Self {
        ContactSource::Unknown
    }
}

impl fmt::Display for ContactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//------------------------------------------------------------------------------
// CORE DOMAIN MODELS
//------------------------------------------------------------------------------

/// A single person in a user's contact book.
///
/// Contacts are owned by exactly one user. Archived contacts are the losing
/// side of a completed merge; they are kept for auditability and excluded
/// from matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    pub company: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,

    /// Professional-network profile URL
    pub network_profile_url: Option<String>,

    /// Score produced by the relationship-scoring subsystem
    pub relationship_strength: f64,
    pub last_interaction_at: Option<NaiveDateTime>,
    pub interaction_frequency: Option<String>,
    pub contact_source: ContactSource,

    pub tags: BTreeSet<String>,
    pub notes: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,

    pub is_archived: bool,
    /// Set on an archived contact to the id of the contact it was merged into
    pub merged_into_id: Option<ContactId>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Contact {
    /// An empty, active contact with both timestamps set to `now`.
    pub fn new(id: ContactId, user_id: UserId, now: NaiveDateTime) -> Self {
        Contact {
            id,
            user_id,
            email: None,
            phone: None,
            full_name: None,
            first_name: None,
            last_name: None,
            company: None,
            job_title: None,
            location: None,
            network_profile_url: None,
            relationship_strength: 0.0,
            last_interaction_at: None,
            interaction_frequency: None,
            contact_source: ContactSource::Unknown,
            tags: BTreeSet::new(),
            notes: None,
            bio: None,
            avatar_url: None,
            is_archived: false,
            merged_into_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A logged touchpoint (meeting, email thread, call) with a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub contact_id: ContactId,
    pub user_id: UserId,
    pub interaction_type: String,
    pub subject: Option<String>,
    pub occurred_at: NaiveDateTime,
}

/// A topic of interest extracted for a contact.
///
/// `contact_id` is `None` for an interest left unassigned by a merge
/// collision; those rows are removed by the orphan cleanup pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub id: String,
    pub contact_id: Option<ContactId>,
    pub user_id: UserId,
    pub category: String,
    pub topic: String,
    pub confidence_score: f64,
    pub created_at: NaiveDateTime,
}

impl Interest {
    /// Collision key used when two contacts' interests are combined.
    pub fn key(&self) -> (String, String) {
        (self.category.clone(), self.topic.clone())
    }

    pub fn is_orphaned(&self) -> bool {
        self.contact_id.is_none()
    }
}
