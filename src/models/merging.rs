// src/models/merging.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DedupError;
use crate::models::core::{Contact, ContactId, ContactSource};

/// The closed set of contact fields the conflict analyzer merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Email,
    Phone,
    NetworkProfileUrl,
    FullName,
    FirstName,
    LastName,
    Bio,
    AvatarUrl,
    Company,
    JobTitle,
    Location,
    LastInteractionAt,
    RelationshipStrength,
    InteractionFrequency,
    ContactSource,
    Tags,
    Notes,
}

impl ContactField {
    pub const ALL: [ContactField; 17] = [
        ContactField::Email,
        ContactField::Phone,
        ContactField::NetworkProfileUrl,
        ContactField::FullName,
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Bio,
        ContactField::AvatarUrl,
        ContactField::Company,
        ContactField::JobTitle,
        ContactField::Location,
        ContactField::LastInteractionAt,
        ContactField::RelationshipStrength,
        ContactField::InteractionFrequency,
        ContactField::ContactSource,
        ContactField::Tags,
        ContactField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::NetworkProfileUrl => "network_profile_url",
            ContactField::FullName => "full_name",
            ContactField::FirstName => "first_name",
            ContactField::LastName => "last_name",
            ContactField::Bio => "bio",
            ContactField::AvatarUrl => "avatar_url",
            ContactField::Company => "company",
            ContactField::JobTitle => "job_title",
            ContactField::Location => "location",
            ContactField::LastInteractionAt => "last_interaction_at",
            ContactField::RelationshipStrength => "relationship_strength",
            ContactField::InteractionFrequency => "interaction_frequency",
            ContactField::ContactSource => "contact_source",
            ContactField::Tags => "tags",
            ContactField::Notes => "notes",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase();
        match key.as_str() {
            "linkedin_url" => Some(ContactField::NetworkProfileUrl),
            "title" => Some(ContactField::JobTitle),
            _ => ContactField::ALL.iter().copied().find(|f| f.as_str() == key),
        }
    }

    /// Fields whose two values can be combined instead of chosen between.
    pub fn is_concatenable(&self) -> bool {
        matches!(self, ContactField::Tags | ContactField::Notes | ContactField::Bio)
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A present (non-empty) field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
    Tags(BTreeSet<String>),
    Source(ContactSource),
}

impl FieldValue {
    /// Character count for text values; other kinds have no completeness.
    pub fn completeness(&self) -> Option<usize> {
        match self {
            FieldValue::Text(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Equality that ignores case and surrounding whitespace for text.
    pub fn equivalent(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => {
                a.trim().to_lowercase() == b.trim().to_lowercase()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Tags(tags) => {
                let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                f.write_str(&joined.join(", "))
            }
            FieldValue::Source(source) => f.write_str(source.as_str()),
        }
    }
}

fn text_value(value: &Option<String>) -> Option<FieldValue> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| FieldValue::Text(s.to_string()))
}

impl Contact {
    /// The present value of a mergeable field, `None` when absent or empty.
    pub fn field_value(&self, field: ContactField) -> Option<FieldValue> {
        match field {
            ContactField::Email => text_value(&self.email),
            ContactField::Phone => text_value(&self.phone),
            ContactField::NetworkProfileUrl => text_value(&self.network_profile_url),
            ContactField::FullName => text_value(&self.full_name),
            ContactField::FirstName => text_value(&self.first_name),
            ContactField::LastName => text_value(&self.last_name),
            ContactField::Bio => text_value(&self.bio),
            ContactField::AvatarUrl => text_value(&self.avatar_url),
            ContactField::Company => text_value(&self.company),
            ContactField::JobTitle => text_value(&self.job_title),
            ContactField::Location => text_value(&self.location),
            ContactField::InteractionFrequency => text_value(&self.interaction_frequency),
            ContactField::Notes => text_value(&self.notes),
            ContactField::LastInteractionAt => self.last_interaction_at.map(FieldValue::Timestamp),
            ContactField::RelationshipStrength => Some(self.relationship_strength)
                .filter(|s| *s > 0.0)
                .map(FieldValue::Number),
            ContactField::ContactSource => Some(FieldValue::Source(self.contact_source)),
            ContactField::Tags => Some(self.tags.clone())
                .filter(|t| !t.is_empty())
                .map(FieldValue::Tags),
        }
    }

    /// Writes a mergeable field. A value of the wrong kind is ignored.
    pub fn set_field(&mut self, field: ContactField, value: Option<FieldValue>) {
        let slot = match field {
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
            ContactField::NetworkProfileUrl => &mut self.network_profile_url,
            ContactField::FullName => &mut self.full_name,
            ContactField::FirstName => &mut self.first_name,
            ContactField::LastName => &mut self.last_name,
            ContactField::Bio => &mut self.bio,
            ContactField::AvatarUrl => &mut self.avatar_url,
            ContactField::Company => &mut self.company,
            ContactField::JobTitle => &mut self.job_title,
            ContactField::Location => &mut self.location,
            ContactField::InteractionFrequency => &mut self.interaction_frequency,
            ContactField::Notes => &mut self.notes,
            ContactField::LastInteractionAt => {
                match value {
                    None => self.last_interaction_at = None,
                    Some(FieldValue::Timestamp(ts)) => self.last_interaction_at = Some(ts),
                    Some(other) => warn!("Ignoring {:?} written to {}", other, field),
                }
                return;
            }
            ContactField::RelationshipStrength => {
                match value {
                    None => self.relationship_strength = 0.0,
                    Some(FieldValue::Number(n)) => self.relationship_strength = n,
                    Some(other) => warn!("Ignoring {:?} written to {}", other, field),
                }
                return;
            }
            ContactField::ContactSource => {
                match value {
                    None => self.contact_source = ContactSource::Unknown,
                    Some(FieldValue::Source(s)) => self.contact_source = s,
                    Some(other) => warn!("Ignoring {:?} written to {}", other, field),
                }
                return;
            }
            ContactField::Tags => {
                match value {
                    None => self.tags.clear(),
                    Some(FieldValue::Tags(tags)) => self.tags = tags,
                    Some(other) => warn!("Ignoring {:?} written to {}", other, field),
                }
                return;
            }
        };
        match value {
            None => *slot = None,
            Some(FieldValue::Text(s)) => *slot = Some(s),
            Some(other) => warn!("Ignoring {:?} written to {}", other, field),
        }
    }

    /// Snapshot of every present mergeable field.
    pub fn field_snapshot(&self) -> BTreeMap<ContactField, FieldValue> {
        ContactField::ALL
            .iter()
            .filter_map(|f| self.field_value(*f).map(|v| (*f, v)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    TakePrimary,
    TakeSecondary,
    TakeMostComplete,
    TakeMostRecent,
    Concatenate,
    ManualReview,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::TakePrimary => "take_primary",
            MergeStrategy::TakeSecondary => "take_secondary",
            MergeStrategy::TakeMostComplete => "take_most_complete",
            MergeStrategy::TakeMostRecent => "take_most_recent",
            MergeStrategy::Concatenate => "concatenate",
            MergeStrategy::ManualReview => "manual_review",
        }
    }
}

/// Caller-supplied decision for one conflicting field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Primary,
    Secondary,
    Concatenate,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Primary => "primary",
            Resolution::Secondary => "secondary",
            Resolution::Concatenate => "concatenate",
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(Resolution::Primary),
            "secondary" => Ok(Resolution::Secondary),
            "concatenate" => Ok(Resolution::Concatenate),
            other => Err(format!("unknown resolution '{}'", other)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Resolutions = BTreeMap<ContactField, Resolution>;

/// Parses a raw `field -> primary|secondary|concatenate` map.
pub fn parse_resolutions(raw: &HashMap<String, String>) -> Result<Resolutions, DedupError> {
    let mut resolutions = Resolutions::new();
    for (field_name, value) in raw {
        let invalid = || DedupError::InvalidResolution {
            field: field_name.clone(),
            value: value.clone(),
        };
        let field = ContactField::from_str(field_name).ok_or_else(invalid)?;
        let resolution = value.parse::<Resolution>().map_err(|_| invalid())?;
        resolutions.insert(field, resolution);
    }
    Ok(resolutions)
}

/// A field where primary and secondary disagree, with the proposed outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    pub field: ContactField,
    pub primary_value: FieldValue,
    pub secondary_value: FieldValue,
    pub recommended_strategy: MergeStrategy,
    pub confidence: f64,
    pub reason: String,
    /// Value written to the merged record. For an unresolved manual-review
    /// conflict this is the primary value, which the merge will refuse to commit.
    pub resolved_value: FieldValue,
}

impl MergeConflict {
    pub fn is_blocking(&self) -> bool {
        self.recommended_strategy == MergeStrategy::ManualReview
    }

    /// What this resolution throws away, if anything. For tags only the
    /// entries missing from the resolved set count.
    pub fn discarded_value(&self) -> Option<FieldValue> {
        if self.recommended_strategy == MergeStrategy::Concatenate {
            return None;
        }
        if let (FieldValue::Tags(p), FieldValue::Tags(s), FieldValue::Tags(kept)) =
            (&self.primary_value, &self.secondary_value, &self.resolved_value)
        {
            let lost: BTreeSet<String> = p
                .union(s)
                .filter(|tag| !kept.contains(*tag))
                .cloned()
                .collect();
            return (!lost.is_empty()).then_some(FieldValue::Tags(lost));
        }
        if self.resolved_value == self.primary_value {
            Some(self.secondary_value.clone())
        } else if self.resolved_value == self.secondary_value {
            Some(self.primary_value.clone())
        } else {
            None
        }
    }

    pub fn data_loss_message(&self) -> Option<String> {
        self.discarded_value()
            .map(|v| format!("{}: '{}' will be lost", self.field, v))
    }
}

/// Read-only description of what a merge would do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergePreview {
    pub primary_contact_id: ContactId,
    pub secondary_contact_id: ContactId,
    pub conflicts: Vec<MergeConflict>,
    pub merged_fields: BTreeMap<ContactField, FieldValue>,
    pub interactions_to_merge: usize,
    pub interests_to_merge: usize,
    pub interest_collisions: usize,
    pub estimated_data_loss: Vec<String>,
    /// Manual-review fields with no caller resolution
    pub blocking_fields: Vec<ContactField>,
}

impl MergePreview {
    pub fn is_blocked(&self) -> bool {
        !self.blocking_fields.is_empty()
    }
}

/// Outcome of a merge attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    pub merge_id: Option<Uuid>,
    pub success: bool,
    pub merged_contact_id: ContactId,
    pub archived_contact_id: ContactId,
    pub conflicts_resolved: Vec<MergeConflict>,
    pub data_preserved: BTreeMap<ContactField, FieldValue>,
    pub interactions_merged: usize,
    pub interests_merged: usize,
    pub dry_run: bool,
    /// The secondary was already archived; nothing was written
    pub skipped: bool,
    pub error_message: Option<String>,
    pub merged_at: Option<NaiveDateTime>,
}

impl MergeResult {
    fn empty(primary: &ContactId, secondary: &ContactId) -> Self {
        MergeResult {
            merge_id: None,
            success: false,
            merged_contact_id: primary.clone(),
            archived_contact_id: secondary.clone(),
            conflicts_resolved: Vec::new(),
            data_preserved: BTreeMap::new(),
            interactions_merged: 0,
            interests_merged: 0,
            dry_run: false,
            skipped: false,
            error_message: None,
            merged_at: None,
        }
    }

    pub fn failed(primary: &ContactId, secondary: &ContactId, message: impl Into<String>) -> Self {
        MergeResult {
            error_message: Some(message.into()),
            ..MergeResult::empty(primary, secondary)
        }
    }

    pub fn already_merged(primary: &ContactId, secondary: &ContactId) -> Self {
        MergeResult {
            success: true,
            skipped: true,
            ..MergeResult::empty(primary, secondary)
        }
    }

    pub fn blocked(
        primary: &ContactId,
        secondary: &ContactId,
        conflicts: Vec<MergeConflict>,
    ) -> Self {
        let fields: Vec<&str> = conflicts
            .iter()
            .filter(|c| c.is_blocking())
            .map(|c| c.field.as_str())
            .collect();
        let message = format!("Manual review required for fields: {}", fields.join(", "));
        MergeResult {
            conflicts_resolved: conflicts,
            ..MergeResult::failed(primary, secondary, message)
        }
    }

    pub fn from_preview(preview: MergePreview) -> Self {
        let blocked = preview.is_blocked();
        let mut result = if blocked {
            MergeResult::blocked(
                &preview.primary_contact_id,
                &preview.secondary_contact_id,
                preview.conflicts,
            )
        } else {
            MergeResult {
                success: true,
                conflicts_resolved: preview.conflicts,
                ..MergeResult::empty(&preview.primary_contact_id, &preview.secondary_contact_id)
            }
        };
        result.dry_run = true;
        result.data_preserved = preview.merged_fields;
        result.interactions_merged = preview.interactions_to_merge;
        result.interests_merged = preview.interests_to_merge;
        result
    }

    pub fn completed(
        primary: &ContactId,
        secondary: &ContactId,
        conflicts: Vec<MergeConflict>,
        data_preserved: BTreeMap<ContactField, FieldValue>,
        interactions_merged: usize,
        interests_merged: usize,
        merged_at: NaiveDateTime,
    ) -> Self {
        MergeResult {
            merge_id: Some(Uuid::new_v4()),
            success: true,
            conflicts_resolved: conflicts,
            data_preserved,
            interactions_merged,
            interests_merged,
            merged_at: Some(merged_at),
            ..MergeResult::empty(primary, secondary)
        }
    }
}
