// src/utils/config.rs

use std::collections::BTreeMap;
use std::env;

use log::{info, warn};

use crate::models::core::ContactSource;
use crate::models::matching::RecommendedAction;
use crate::models::merging::{ContactField, MergeStrategy};

/// Source-reliability weights used by the quality scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWeights {
    pub manual: f64,
    pub network: f64,
    pub calendar: f64,
    pub email: f64,
    pub import: f64,
    pub unknown: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            manual: 100.0,
            network: 90.0,
            calendar: 80.0,
            email: 70.0,
            import: 60.0,
            unknown: 50.0,
        }
    }
}

impl SourceWeights {
    pub fn weight_for(&self, source: ContactSource) -> f64 {
        match source {
            ContactSource::Manual => self.manual,
            ContactSource::Network => self.network,
            ContactSource::Calendar => self.calendar,
            ContactSource::Email => self.email,
            ContactSource::Import => self.import,
            ContactSource::Unknown => self.unknown,
        }
    }
}

/// Default merge strategy per mergeable field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStrategyTable {
    strategies: BTreeMap<ContactField, MergeStrategy>,
}

impl Default for FieldStrategyTable {
    fn default() -> Self {
        let mut strategies = BTreeMap::new();
        let groups = [
            (
                MergeStrategy::TakeMostComplete,
                &[
                    ContactField::Email,
                    ContactField::Phone,
                    ContactField::NetworkProfileUrl,
                    ContactField::FullName,
                    ContactField::FirstName,
                    ContactField::LastName,
                    ContactField::Bio,
                    ContactField::AvatarUrl,
                ][..],
            ),
            (
                MergeStrategy::TakeMostRecent,
                &[
                    ContactField::Company,
                    ContactField::JobTitle,
                    ContactField::Location,
                    ContactField::LastInteractionAt,
                ][..],
            ),
            (
                MergeStrategy::TakePrimary,
                &[
                    ContactField::RelationshipStrength,
                    ContactField::InteractionFrequency,
                    ContactField::ContactSource,
                ][..],
            ),
            (
                MergeStrategy::Concatenate,
                &[ContactField::Tags, ContactField::Notes][..],
            ),
        ];
        for (strategy, fields) in groups {
            for field in fields {
                strategies.insert(*field, strategy);
            }
        }
        Self { strategies }
    }
}

impl FieldStrategyTable {
    pub fn strategy_for(&self, field: ContactField) -> MergeStrategy {
        self.strategies
            .get(&field)
            .copied()
            .unwrap_or(MergeStrategy::TakePrimary)
    }

    pub fn with_strategy(mut self, field: ContactField, strategy: MergeStrategy) -> Self {
        self.strategies.insert(field, strategy);
        self
    }
}

/// Immutable tuning for the whole engine, injected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Matches at or above this confidence are merged automatically
    pub auto_merge_threshold: f64,
    /// Matches below this confidence are ignored
    pub manual_review_threshold: f64,
    pub name_similarity_threshold: f64,
    pub company_similarity_threshold: f64,
    pub partial_email_threshold: f64,
    pub default_phone_region: String,
    pub source_weights: SourceWeights,
    pub field_strategies: FieldStrategyTable,
    /// Feed real interaction counts into the quality score. When false the
    /// interaction-count bonus is always zero.
    pub count_interactions: bool,
    pub default_batch_size: usize,
    pub default_max_merges: usize,
    pub default_suggestion_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 0.90,
            manual_review_threshold: 0.30,
            name_similarity_threshold: 85.0,
            company_similarity_threshold: 80.0,
            partial_email_threshold: 70.0,
            default_phone_region: "US".to_string(),
            source_weights: SourceWeights::default(),
            field_strategies: FieldStrategyTable::default(),
            count_interactions: true,
            default_batch_size: 100,
            default_max_merges: 50,
            default_suggestion_limit: 20,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("Ignoring unparseable value '{}' for {}", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

impl DedupConfig {
    /// Default configuration overlaid with `DEDUP_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let weights = &defaults.source_weights;
        let config = Self {
            auto_merge_threshold: env_or("DEDUP_AUTO_MERGE_THRESHOLD", defaults.auto_merge_threshold),
            manual_review_threshold: env_or(
                "DEDUP_MANUAL_REVIEW_THRESHOLD",
                defaults.manual_review_threshold,
            ),
            name_similarity_threshold: env_or(
                "DEDUP_NAME_SIMILARITY_THRESHOLD",
                defaults.name_similarity_threshold,
            ),
            company_similarity_threshold: env_or(
                "DEDUP_COMPANY_SIMILARITY_THRESHOLD",
                defaults.company_similarity_threshold,
            ),
            partial_email_threshold: env_or(
                "DEDUP_PARTIAL_EMAIL_THRESHOLD",
                defaults.partial_email_threshold,
            ),
            default_phone_region: env::var("DEDUP_PHONE_REGION")
                .unwrap_or_else(|_| defaults.default_phone_region.clone()),
            source_weights: SourceWeights {
                manual: env_or("DEDUP_SOURCE_WEIGHT_MANUAL", weights.manual),
                network: env_or("DEDUP_SOURCE_WEIGHT_NETWORK", weights.network),
                calendar: env_or("DEDUP_SOURCE_WEIGHT_CALENDAR", weights.calendar),
                email: env_or("DEDUP_SOURCE_WEIGHT_EMAIL", weights.email),
                import: env_or("DEDUP_SOURCE_WEIGHT_IMPORT", weights.import),
                unknown: env_or("DEDUP_SOURCE_WEIGHT_UNKNOWN", weights.unknown),
            },
            field_strategies: FieldStrategyTable::default(),
            count_interactions: env_or("DEDUP_COUNT_INTERACTIONS", defaults.count_interactions),
            default_batch_size: env_or("DEDUP_BATCH_SIZE", defaults.default_batch_size),
            default_max_merges: env_or("DEDUP_MAX_MERGES", defaults.default_max_merges),
            default_suggestion_limit: env_or(
                "DEDUP_SUGGESTION_LIMIT",
                defaults.default_suggestion_limit,
            ),
        };
        config.validated()
    }

    /// Falls back to the default bands if the thresholds are out of range or inverted.
    pub fn validated(mut self) -> Self {
        let in_range = |t: f64| (0.0..=1.0).contains(&t);
        if !in_range(self.auto_merge_threshold)
            || !in_range(self.manual_review_threshold)
            || self.manual_review_threshold > self.auto_merge_threshold
        {
            let defaults = Self::default();
            warn!(
                "Invalid confidence bands (manual_review={}, auto_merge={}); using {} / {}",
                self.manual_review_threshold,
                self.auto_merge_threshold,
                defaults.manual_review_threshold,
                defaults.auto_merge_threshold
            );
            self.auto_merge_threshold = defaults.auto_merge_threshold;
            self.manual_review_threshold = defaults.manual_review_threshold;
        }
        if self.default_batch_size == 0 {
            self.default_batch_size = 1;
        }
        self
    }

    /// Confidence band for a [0, 1] confidence.
    pub fn action_for(&self, confidence: f64) -> RecommendedAction {
        if confidence >= self.auto_merge_threshold {
            RecommendedAction::AutoMerge
        } else if confidence >= self.manual_review_threshold {
            RecommendedAction::ManualReview
        } else {
            RecommendedAction::Ignore
        }
    }

    pub fn log_config(&self) {
        info!("🧬 Contact deduplication configuration");
        info!(
            "   Confidence bands: ignore < {:.2} <= manual_review < {:.2} <= auto_merge",
            self.manual_review_threshold, self.auto_merge_threshold
        );
        info!(
            "   Similarity thresholds: name {:.0}, company {:.0}, partial email {:.0}",
            self.name_similarity_threshold,
            self.company_similarity_threshold,
            self.partial_email_threshold
        );
        info!("   Default phone region: {}", self.default_phone_region);
        if self.count_interactions {
            info!("   Quality score: interaction-count bonus ENABLED");
        } else {
            info!("   Quality score: interaction-count bonus DISABLED (always 0)");
        }
        info!(
            "   Defaults: batch size {}, max merges {}, suggestion limit {}",
            self.default_batch_size, self.default_max_merges, self.default_suggestion_limit
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_split_at_thresholds() {
        let config = DedupConfig::default();
        assert_eq!(config.action_for(1.0), RecommendedAction::AutoMerge);
        assert_eq!(config.action_for(0.90), RecommendedAction::AutoMerge);
        assert_eq!(config.action_for(0.8999), RecommendedAction::ManualReview);
        assert_eq!(config.action_for(0.30), RecommendedAction::ManualReview);
        assert_eq!(config.action_for(0.2999), RecommendedAction::Ignore);
    }

    #[test]
    fn inverted_bands_fall_back_to_defaults() {
        let config = DedupConfig {
            auto_merge_threshold: 0.2,
            manual_review_threshold: 0.5,
            ..DedupConfig::default()
        }
        .validated();
        assert_eq!(config.auto_merge_threshold, 0.90);
        assert_eq!(config.manual_review_threshold, 0.30);
    }

    #[test]
    fn field_strategy_defaults_follow_field_groups() {
        let table = FieldStrategyTable::default();
        assert_eq!(table.strategy_for(ContactField::Email), MergeStrategy::TakeMostComplete);
        assert_eq!(table.strategy_for(ContactField::Company), MergeStrategy::TakeMostRecent);
        assert_eq!(table.strategy_for(ContactField::Notes), MergeStrategy::Concatenate);
        assert_eq!(
            table.strategy_for(ContactField::InteractionFrequency),
            MergeStrategy::TakePrimary
        );
    }

    #[test]
    fn field_strategy_can_be_overridden_per_field() {
        let table = FieldStrategyTable::default()
            .with_strategy(ContactField::Company, MergeStrategy::ManualReview);
        assert_eq!(table.strategy_for(ContactField::Company), MergeStrategy::ManualReview);
        assert_eq!(table.strategy_for(ContactField::JobTitle), MergeStrategy::TakeMostRecent);
    }

    #[test]
    fn source_weights_rank_manual_highest() {
        let weights = SourceWeights::default();
        assert!(weights.weight_for(ContactSource::Manual) > weights.weight_for(ContactSource::Network));
        assert_eq!(weights.weight_for(ContactSource::Unknown), 50.0);
    }
}
