// src/merging/auto_merge.rs

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::error::DedupError;
use crate::matching::manager::DuplicateScanner;
use crate::merging::executor::MergeExecutor;
use crate::models::core::{ContactId, UserId};
use crate::models::merging::{MergeResult, Resolutions};
use crate::models::stats_models::{AutoMergeSummary, MergeSuggestion};
use crate::utils::config::DedupConfig;
use crate::utils::logging::log_auto_merge_summary;

/// Drives the merge executor over the scanner's high-confidence matches.
#[derive(Clone)]
pub struct AutoMergeOrchestrator {
    scanner: DuplicateScanner,
    executor: MergeExecutor,
    config: Arc<DedupConfig>,
}

impl AutoMergeOrchestrator {
    pub fn new(scanner: DuplicateScanner, executor: MergeExecutor, config: Arc<DedupConfig>) -> Self {
        Self {
            scanner,
            executor,
            config,
        }
    }

    /// Merges up to `max_merges` auto-merge candidates, one transaction each.
    /// Never fails as a whole: each candidate's outcome, including errors and
    /// pairs skipped because an earlier merge in the batch absorbed one side,
    /// is one entry of the returned list.
    pub async fn auto_merge_high_confidence(
        &self,
        user_id: &UserId,
        max_merges: usize,
    ) -> Vec<MergeResult> {
        let candidates = match self.scanner.get_auto_merge_candidates(user_id).await {
            Ok(c) => c,
            Err(e) => {
                error!("[AUTO-MERGE] 🤖 ❌ Candidate scan failed for user {}: {}", user_id, e);
                return Vec::new();
            }
        };
        let threshold = self.config.auto_merge_threshold;
        info!(
            "[AUTO-MERGE] 🤖 🚀 {} candidates at or above {:.2} for user {} (cap {})",
            candidates.len(),
            threshold,
            user_id,
            max_merges
        );

        let no_overrides = Resolutions::new();
        let mut consumed: HashSet<ContactId> = HashSet::new();
        let mut results = Vec::new();

        for candidate in candidates
            .into_iter()
            .filter(|c| c.confidence >= threshold)
            .take(max_merges)
        {
            let (primary, secondary) = candidate.merge_order();
            if consumed.contains(&primary) || consumed.contains(&secondary) {
                debug!(
                    "[AUTO-MERGE] 🤖 ⏭️  Skipping {} / {}: already merged in this batch",
                    primary, secondary
                );
                results.push(MergeResult::already_merged(&primary, &secondary));
                continue;
            }

            let result = match self
                .executor
                .merge_contacts(user_id, &primary, &secondary, &no_overrides, false)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        "[AUTO-MERGE] 🤖 ⚠️  Merge {} → {} failed: {}",
                        secondary, primary, e
                    );
                    MergeResult::failed(&primary, &secondary, e.to_string())
                }
            };
            if result.success {
                consumed.insert(secondary);
            }
            results.push(result);
        }

        log_auto_merge_summary(user_id, &AutoMergeSummary::from_results(&results));
        results
    }

    /// Manual-review candidates, strongest first, each with its merge preview.
    pub async fn get_merge_suggestions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MergeSuggestion>, DedupError> {
        let candidates = self.scanner.get_manual_review_candidates(user_id).await?;
        let mut suggestions = Vec::new();
        for duplicate in candidates.into_iter().take(limit) {
            let (primary, secondary) = duplicate.merge_order();
            match self
                .executor
                .preview_merge(user_id, &primary, &secondary, &Resolutions::new())
                .await
            {
                Ok(preview) => suggestions.push(MergeSuggestion { duplicate, preview }),
                Err(e) if e.is_not_found() => {
                    warn!("Skipping suggestion {} / {}: {}", primary, secondary, e)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(suggestions)
    }
}
