// src/models/matching.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::core::{ordered_pair, ContactId, ContactSource};

/// Comparable, canonical view of a contact. Derived on every scan and never
/// persisted. Absent values are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedContact {
    pub contact_id: ContactId,
    pub email: String,
    pub email_domain: String,
    pub phone: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub network_handle: String,
    pub source: ContactSource,
    pub relationship_strength: f64,
    pub last_interaction_at: Option<NaiveDateTime>,
    pub interaction_count: u32,
}

/// Rule that produced a duplicate match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
    ExactEmail,
    ExactPhone,
    ExactNetworkProfile,
    FuzzyNameCompany,
    FuzzyNameEmailDomain,
    FuzzyNameOnly,
    PartialEmail,
}

impl MatchingStrategy {
    /// Confidence ceiling on the 0-100 scale.
    pub fn base_confidence(&self) -> f64 {
        match self {
            MatchingStrategy::ExactEmail => 100.0,
            MatchingStrategy::ExactPhone => 95.0,
            MatchingStrategy::ExactNetworkProfile => 90.0,
            MatchingStrategy::FuzzyNameCompany => 85.0,
            MatchingStrategy::FuzzyNameEmailDomain => 80.0,
            MatchingStrategy::FuzzyNameOnly => 70.0,
            MatchingStrategy::PartialEmail => 60.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStrategy::ExactEmail => "exact_email",
            MatchingStrategy::ExactPhone => "exact_phone",
            MatchingStrategy::ExactNetworkProfile => "exact_network_profile",
            MatchingStrategy::FuzzyNameCompany => "fuzzy_name_company",
            MatchingStrategy::FuzzyNameEmailDomain => "fuzzy_name_email_domain",
            MatchingStrategy::FuzzyNameOnly => "fuzzy_name_only",
            MatchingStrategy::PartialEmail => "partial_email",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    AutoMerge,
    ManualReview,
    Ignore,
}

/// Which contact of a matched pair should survive as the primary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePriority {
    APrimary,
    BPrimary,
    ManualSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Email,
    EmailDomain,
    EmailPartial,
    Phone,
    NetworkProfile,
    Name,
    Company,
}

/// Every metric the matcher computed for a pair, whichever strategy won.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchEvidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_network_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_email_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score_a: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score_b: Option<f64>,
}

/// A scored, evidenced assertion that two contacts denote the same person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub contact_a_id: ContactId,
    pub contact_b_id: ContactId,
    /// Always within [0, 1]
    pub confidence: f64,
    pub strategy: MatchingStrategy,
    pub matching_fields: Vec<MatchField>,
    pub conflicting_fields: Vec<MatchField>,
    pub recommended_action: RecommendedAction,
    pub merge_priority: MergePriority,
    pub evidence: MatchEvidence,
}

impl DuplicateMatch {
    pub fn pair_key(&self) -> (ContactId, ContactId) {
        ordered_pair(&self.contact_a_id, &self.contact_b_id)
    }

    pub fn involves(&self, contact_id: &ContactId) -> bool {
        &self.contact_a_id == contact_id || &self.contact_b_id == contact_id
    }

    /// (primary, secondary) as decided by `merge_priority`; ties keep contact A.
    pub fn merge_order(&self) -> (ContactId, ContactId) {
        match self.merge_priority {
            MergePriority::BPrimary => (self.contact_b_id.clone(), self.contact_a_id.clone()),
            MergePriority::APrimary | MergePriority::ManualSelect => {
                (self.contact_a_id.clone(), self.contact_b_id.clone())
            }
        }
    }
}
