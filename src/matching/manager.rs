// src/matching/manager.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::db::ContactRepository;
use crate::error::DedupError;
use crate::matching::matcher::ContactMatcher;
use crate::matching::normalizer::ContactNormalizer;
use crate::models::core::{ordered_pair, Contact, ContactId, UserId};
use crate::models::matching::{DuplicateMatch, NormalizedContact, RecommendedAction};
use crate::models::stats_models::{DeduplicationStats, ScanReport};
use crate::utils::config::DedupConfig;
use crate::utils::logging::ScanLogger;

/// Read-only duplicate detection over a user's active contacts.
#[derive(Clone)]
pub struct DuplicateScanner {
    repo: Arc<dyn ContactRepository>,
    config: Arc<DedupConfig>,
    normalizer: ContactNormalizer,
    matcher: ContactMatcher,
}

/// Raw output of one full pass, before it is shaped for a caller.
struct ScanOutcome {
    contacts_scanned: usize,
    pairs_evaluated: usize,
    matches: Vec<DuplicateMatch>,
}

fn sort_by_confidence(matches: &mut [DuplicateMatch]) {
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

impl DuplicateScanner {
    pub fn new(repo: Arc<dyn ContactRepository>, config: Arc<DedupConfig>) -> Self {
        Self {
            normalizer: ContactNormalizer::new(config.default_phone_region.clone()),
            matcher: ContactMatcher::new(&config),
            repo,
            config,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    async fn normalize_all(
        &self,
        user_id: &UserId,
        contacts: &[Contact],
    ) -> Result<Vec<NormalizedContact>, DedupError> {
        let counts: HashMap<ContactId, u32> = if self.config.count_interactions {
            self.repo.interaction_counts(user_id).await?
        } else {
            HashMap::new()
        };
        Ok(contacts
            .iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                self.normalizer.normalize(c, count)
            })
            .collect())
    }

    fn keep(&self, m: &DuplicateMatch, include_low_confidence: bool) -> bool {
        include_low_confidence || m.recommended_action != RecommendedAction::Ignore
    }

    /// Matches between one contact and every other active contact of the user,
    /// strongest first. An unknown, foreign or archived target yields no matches.
    pub async fn find_duplicates_for_contact(
        &self,
        user_id: &UserId,
        contact_id: &ContactId,
        include_low_confidence: bool,
    ) -> Result<Vec<DuplicateMatch>, DedupError> {
        let logger = ScanLogger::new("FIND", user_id);
        logger.log_start(include_low_confidence);

        let target = match self.repo.load_contact(user_id, contact_id).await? {
            Some(c) if !c.is_archived => c,
            _ => {
                logger.log_target_missing(contact_id);
                return Ok(Vec::new());
            }
        };

        let others: Vec<Contact> = self
            .repo
            .load_contacts(user_id, true)
            .await?
            .into_iter()
            .filter(|c| c.id != target.id)
            .collect();
        logger.log_data_loaded(others.len() + 1);

        let now = Utc::now().naive_utc();
        let mut all = vec![target];
        all.extend(others);
        let normalized = self.normalize_all(user_id, &all).await?;
        let (target_norm, rest) = normalized.split_first().ok_or_else(|| {
            DedupError::InvalidRequest("target contact vanished during normalization".into())
        })?;

        let mut matches: Vec<DuplicateMatch> = rest
            .iter()
            .filter_map(|other| self.matcher.compare(target_norm, other, now))
            .filter(|m| self.keep(m, include_low_confidence))
            .collect();
        sort_by_confidence(&mut matches);

        logger.log_complete(
            rest.len(),
            ScanReport::count_action(&matches, RecommendedAction::AutoMerge),
            ScanReport::count_action(&matches, RecommendedAction::ManualReview),
            ScanReport::count_action(&matches, RecommendedAction::Ignore),
        );
        Ok(matches)
    }

    async fn scan(
        &self,
        user_id: &UserId,
        batch_size: usize,
        include_low_confidence: bool,
        logger: &ScanLogger,
    ) -> Result<ScanOutcome, DedupError> {
        logger.log_start(include_low_confidence);
        logger.log_phase("Loading contacts", Some("active contacts only"));
        let contacts = self.repo.load_contacts(user_id, true).await?;
        logger.log_data_loaded(contacts.len());

        if contacts.len() < 2 {
            logger.log_complete(0, 0, 0, 0);
            return Ok(ScanOutcome {
                contacts_scanned: contacts.len(),
                pairs_evaluated: 0,
                matches: Vec::new(),
            });
        }

        logger.log_phase("Normalizing", None);
        let normalized = self.normalize_all(user_id, &contacts).await?;
        let now = Utc::now().naive_utc();

        logger.log_phase("Pairwise comparison", None);
        let batch_size = batch_size.max(1);
        let total_batches = normalized.len().div_ceil(batch_size);
        let mut seen: HashSet<(ContactId, ContactId)> = HashSet::new();
        let mut matches = Vec::new();
        let mut pairs_evaluated = 0usize;

        for (batch_idx, chunk_start) in (0..normalized.len()).step_by(batch_size).enumerate() {
            let chunk_end = (chunk_start + batch_size).min(normalized.len());
            for i in chunk_start..chunk_end {
                let a = &normalized[i];
                for b in &normalized[i + 1..] {
                    if a.contact_id == b.contact_id {
                        continue;
                    }
                    if !seen.insert(ordered_pair(&a.contact_id, &b.contact_id)) {
                        continue;
                    }
                    pairs_evaluated += 1;
                    if let Some(m) = self.matcher.compare(a, b, now) {
                        if self.keep(&m, include_low_confidence) {
                            matches.push(m);
                        }
                    }
                }
            }
            logger.log_batch_progress(batch_idx + 1, total_batches, matches.len());
            tokio::task::yield_now().await;
        }

        sort_by_confidence(&mut matches);
        logger.log_complete(
            pairs_evaluated,
            ScanReport::count_action(&matches, RecommendedAction::AutoMerge),
            ScanReport::count_action(&matches, RecommendedAction::ManualReview),
            ScanReport::count_action(&matches, RecommendedAction::Ignore),
        );
        Ok(ScanOutcome {
            contacts_scanned: contacts.len(),
            pairs_evaluated,
            matches,
        })
    }

    /// Every duplicate pair among the user's active contacts, each unordered
    /// pair at most once, strongest first. `batch_size` only paces the work.
    pub async fn scan_all_duplicates(
        &self,
        user_id: &UserId,
        batch_size: usize,
        include_low_confidence: bool,
    ) -> Result<Vec<DuplicateMatch>, DedupError> {
        let logger = ScanLogger::new("SCAN", user_id);
        Ok(self
            .scan(user_id, batch_size, include_low_confidence, &logger)
            .await?
            .matches)
    }

    pub async fn get_auto_merge_candidates(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<DuplicateMatch>, DedupError> {
        let threshold = self.config.auto_merge_threshold;
        let matches = self
            .scan_all_duplicates(user_id, self.config.default_batch_size, false)
            .await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.confidence >= threshold)
            .collect())
    }

    pub async fn get_manual_review_candidates(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<DuplicateMatch>, DedupError> {
        let auto = self.config.auto_merge_threshold;
        let manual = self.config.manual_review_threshold;
        let matches = self
            .scan_all_duplicates(user_id, self.config.default_batch_size, false)
            .await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.confidence >= manual && m.confidence < auto)
            .collect())
    }

    /// Full scan with a per-band breakdown and timing.
    pub async fn scan_report(
        &self,
        user_id: &UserId,
        batch_size: usize,
        include_low_confidence: bool,
    ) -> Result<ScanReport, DedupError> {
        let logger = ScanLogger::new("REPORT", user_id);
        let outcome = self
            .scan(user_id, batch_size, include_low_confidence, &logger)
            .await?;
        let matches = outcome.matches;
        Ok(ScanReport {
            user_id: user_id.clone(),
            total_contacts_scanned: outcome.contacts_scanned,
            pairs_evaluated: outcome.pairs_evaluated,
            duplicates_found: matches.len(),
            auto_merge_count: ScanReport::count_action(&matches, RecommendedAction::AutoMerge),
            manual_review_count: ScanReport::count_action(&matches, RecommendedAction::ManualReview),
            ignore_count: ScanReport::count_action(&matches, RecommendedAction::Ignore),
            duration_secs: logger.elapsed_secs(),
            matches,
        })
    }

    pub async fn get_deduplication_stats(
        &self,
        user_id: &UserId,
    ) -> Result<DeduplicationStats, DedupError> {
        let logger = ScanLogger::new("STATS", user_id);
        let outcome = self
            .scan(user_id, self.config.default_batch_size, false, &logger)
            .await?;
        debug!(
            "Stats for {}: {} contacts, {} matches",
            user_id,
            outcome.contacts_scanned,
            outcome.matches.len()
        );
        Ok(DeduplicationStats::from_matches(
            user_id,
            outcome.contacts_scanned,
            &outcome.matches,
        ))
    }
}
