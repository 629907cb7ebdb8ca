// src/utils/logging.rs - phase-timed logging helpers for scans and merges
use log::{debug, error, info, warn};
use std::time::Instant;

use crate::models::core::{ContactId, UserId};
use crate::models::stats_models::AutoMergeSummary;

#[derive(Clone)]
pub struct ScanLogger {
    operation: &'static str,
    user_id: String,
    start_time: Instant,
}

impl ScanLogger {
    pub fn new(operation: &'static str, user_id: &UserId) -> Self {
        Self {
            operation,
            user_id: user_id.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, include_low_confidence: bool) {
        info!(
            "[{}] 🔍 🚀 Starting duplicate scan for user {}{}",
            self.operation,
            self.user_id,
            if include_low_confidence {
                " (including low-confidence matches)"
            } else {
                ""
            }
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        match details {
            Some(details) => info!(
                "[{}] 🔍 🔄 Phase: {} - {} [+{:.1}s]",
                self.operation, phase, details, elapsed
            ),
            None => info!("[{}] 🔍 🔄 Phase: {} [+{:.1}s]", self.operation, phase, elapsed),
        }
    }

    pub fn log_data_loaded(&self, count: usize) {
        info!(
            "[{}] 🔍 📊 Loaded {} active contacts for user {}",
            self.operation, count, self.user_id
        );
    }

    pub fn log_batch_progress(&self, batch: usize, total_batches: usize, matches_so_far: usize) {
        debug!(
            "[{}] 🔍 📦 Batch {}/{} done, {} matches so far",
            self.operation, batch, total_batches, matches_so_far
        );
    }

    pub fn log_target_missing(&self, contact_id: &ContactId) {
        warn!(
            "[{}] 🔍 ⚠️  Contact {} not found for user {} - returning no matches",
            self.operation, contact_id, self.user_id
        );
    }

    pub fn log_complete(&self, pairs_evaluated: usize, auto: usize, manual: usize, ignored: usize) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        info!(
            "[{}] 🔍 ✅ Completed in {:.2}s: {} pairs evaluated → {} auto-merge, {} manual-review, {} ignored",
            self.operation, elapsed, pairs_evaluated, auto, manual, ignored
        );
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

#[derive(Clone)]
pub struct MergeLogger {
    primary: String,
    secondary: String,
    start_time: Instant,
}

impl MergeLogger {
    pub fn new(primary: &ContactId, secondary: &ContactId) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, dry_run: bool) {
        info!(
            "[MERGE] 🔗 🚀 Merging {} into {}{}",
            self.secondary,
            self.primary,
            if dry_run { " (dry run)" } else { "" }
        );
    }

    pub fn log_already_archived(&self) {
        info!(
            "[MERGE] 🔗 ⏭️  Contact {} is already archived - nothing to do",
            self.secondary
        );
    }

    pub fn log_blocked(&self, fields: &[&str]) {
        warn!(
            "[MERGE] 🔗 🛑 Merge {} → {} blocked: manual review required for {}",
            self.secondary,
            self.primary,
            fields.join(", ")
        );
    }

    pub fn log_committed(&self, conflicts: usize, interactions: usize, interests: usize) {
        info!(
            "[MERGE] 🔗 ✅ Committed in {:.2}s: {} conflicts resolved, {} interactions and {} interests moved",
            self.start_time.elapsed().as_secs_f32(),
            conflicts,
            interactions,
            interests
        );
    }

    pub fn log_rolled_back(&self, err: &anyhow::Error) {
        error!(
            "[MERGE] 🔗 ❌ Merge {} → {} rolled back: {:#}",
            self.secondary, self.primary, err
        );
    }
}

pub fn log_auto_merge_summary(user_id: &UserId, summary: &AutoMergeSummary) {
    info!(
        "[AUTO-MERGE] 🤖 User {}: {} attempted, {} successful, {} skipped, {} failed ({} contacts consolidated)",
        user_id,
        summary.attempted,
        summary.successful,
        summary.skipped,
        summary.failed,
        summary.total_contacts_merged
    );
}
