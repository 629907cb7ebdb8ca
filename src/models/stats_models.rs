// src/models/stats_models.rs

use serde::Serialize;

use crate::models::core::UserId;
use crate::models::matching::{DuplicateMatch, RecommendedAction};
use crate::models::merging::{MergePreview, MergeResult};

/// Result of a full duplicate scan with a per-band breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub user_id: UserId,
    pub total_contacts_scanned: usize,
    pub pairs_evaluated: usize,
    pub duplicates_found: usize,
    pub auto_merge_count: usize,
    pub manual_review_count: usize,
    pub ignore_count: usize,
    pub duration_secs: f64,
    pub matches: Vec<DuplicateMatch>,
}

impl ScanReport {
    pub fn count_action(matches: &[DuplicateMatch], action: RecommendedAction) -> usize {
        matches
            .iter()
            .filter(|m| m.recommended_action == action)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeduplicationStats {
    pub user_id: UserId,
    pub total_contacts: usize,
    pub potential_duplicates: usize,
    pub auto_merge_candidates: usize,
    pub manual_review_candidates: usize,
    pub duplicate_rate: f64,
    pub data_quality_score: f64,
}

impl DeduplicationStats {
    pub fn from_matches(user_id: &UserId, total_contacts: usize, matches: &[DuplicateMatch]) -> Self {
        let auto_merge_candidates = ScanReport::count_action(matches, RecommendedAction::AutoMerge);
        let manual_review_candidates =
            ScanReport::count_action(matches, RecommendedAction::ManualReview);
        let duplicate_rate = if total_contacts > 0 {
            matches.len() as f64 / total_contacts as f64
        } else {
            0.0
        };
        DeduplicationStats {
            user_id: user_id.clone(),
            total_contacts,
            potential_duplicates: matches.len(),
            auto_merge_candidates,
            manual_review_candidates,
            duplicate_rate,
            data_quality_score: (1.0 - duplicate_rate).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AutoMergeSummary {
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_contacts_merged: usize,
}

impl AutoMergeSummary {
    pub fn from_results(results: &[MergeResult]) -> Self {
        let successful = results.iter().filter(|r| r.success && !r.skipped).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        let failed = results.iter().filter(|r| !r.success).count();
        AutoMergeSummary {
            attempted: results.len(),
            successful,
            failed,
            skipped,
            total_contacts_merged: successful * 2,
        }
    }
}

/// A manual-review candidate paired with the merge it would perform.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSuggestion {
    pub duplicate: DuplicateMatch,
    pub preview: MergePreview,
}
