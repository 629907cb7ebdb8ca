// src/matching/quality.rs

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::matching::{MergePriority, NormalizedContact};
use crate::utils::config::{DedupConfig, SourceWeights};

const EMAIL_BONUS: f64 = 20.0;
const PHONE_BONUS: f64 = 15.0;
const NAME_BONUS: f64 = 15.0;
const COMPANY_BONUS: f64 = 10.0;
const NETWORK_HANDLE_BONUS: f64 = 10.0;
const RELATIONSHIP_MULTIPLIER: f64 = 20.0;
const MAX_INTERACTION_BONUS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub source_weight: f64,
    pub completeness: f64,
    pub relationship: f64,
    pub recency: f64,
    pub interactions: f64,
}

impl QualityBreakdown {
    pub fn total(&self) -> f64 {
        self.source_weight + self.completeness + self.relationship + self.recency + self.interactions
    }
}

/// Relative completeness/reliability score, only meaningful when two
/// contacts are compared against each other.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    weights: SourceWeights,
    count_interactions: bool,
}

impl QualityScorer {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            weights: config.source_weights.clone(),
            count_interactions: config.count_interactions,
        }
    }

    /// Per-component view of [`QualityScorer::score`].
    pub fn breakdown(&self, contact: &NormalizedContact, now: NaiveDateTime) -> QualityBreakdown {
        let completeness = [
            (&contact.email, EMAIL_BONUS),
            (&contact.phone, PHONE_BONUS),
            (&contact.name, NAME_BONUS),
            (&contact.company, COMPANY_BONUS),
            (&contact.network_handle, NETWORK_HANDLE_BONUS),
        ]
        .iter()
        .filter(|(value, _)| !value.is_empty())
        .map(|(_, bonus)| bonus)
        .sum::<f64>();

        let recency = match contact.last_interaction_at.map(|last| (now - last).num_days()) {
            Some(days) if days < 30 => 10.0,
            Some(days) if days < 90 => 5.0,
            _ => 0.0,
        };

        let count = if self.count_interactions {
            contact.interaction_count
        } else {
            0
        };

        QualityBreakdown {
            source_weight: self.weights.weight_for(contact.source),
            completeness,
            relationship: contact.relationship_strength * RELATIONSHIP_MULTIPLIER,
            recency,
            interactions: (f64::from(count) * 2.0).min(MAX_INTERACTION_BONUS),
        }
    }

    pub fn score(&self, contact: &NormalizedContact, now: NaiveDateTime) -> f64 {
        self.breakdown(contact, now).total()
    }

    /// Higher score survives; equal scores are left to the caller.
    pub fn merge_priority(
        &self,
        a: &NormalizedContact,
        b: &NormalizedContact,
        now: NaiveDateTime,
    ) -> (MergePriority, f64, f64) {
        let score_a = self.score(a, now);
        let score_b = self.score(b, now);
        let priority = if (score_a - score_b).abs() < 1e-9 {
            MergePriority::ManualSelect
        } else if score_a > score_b {
            MergePriority::APrimary
        } else {
            MergePriority::BPrimary
        };
        (priority, score_a, score_b)
    }
}
