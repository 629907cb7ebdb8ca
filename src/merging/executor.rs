// src/merging/executor.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use log::{info, warn};

use crate::db::{ContactRepository, MergeTransaction};
use crate::error::DedupError;
use crate::merging::conflicts::{build_merged_contact, ConflictAnalyzer};
use crate::models::core::{Contact, ContactId, Interest, UserId};
use crate::models::merging::{
    ContactField, FieldValue, MergeConflict, MergePreview, MergeResult, Resolutions,
};
use crate::utils::config::DedupConfig;
use crate::utils::logging::MergeLogger;

/// How the secondary's interests land on the primary.
#[derive(Debug, Default)]
struct InterestPlan {
    /// Secondary interests repointed at the primary
    moves: Vec<Interest>,
    /// Secondary interests whose (category, topic) the primary already holds;
    /// they are left with no contact
    orphans: Vec<Interest>,
    /// Primary interests that take a higher confidence from a colliding duplicate
    upgrades: Vec<Interest>,
}

fn plan_interest_moves(
    primary_id: &ContactId,
    primary_interests: Vec<Interest>,
    secondary_interests: Vec<Interest>,
) -> InterestPlan {
    let original_keys: HashSet<(String, String)> =
        primary_interests.iter().map(Interest::key).collect();
    let mut held: HashMap<(String, String), Interest> = primary_interests
        .into_iter()
        .map(|i| (i.key(), i))
        .collect();
    let mut moved_keys = Vec::new();
    let mut upgraded_keys = HashSet::new();
    let mut plan = InterestPlan::default();

    for mut interest in secondary_interests {
        let key = interest.key();
        if let Some(existing) = held.get_mut(&key) {
            if interest.confidence_score > existing.confidence_score {
                existing.confidence_score = interest.confidence_score;
                if original_keys.contains(&key) {
                    upgraded_keys.insert(key);
                }
            }
            interest.contact_id = None;
            plan.orphans.push(interest);
        } else {
            interest.contact_id = Some(primary_id.clone());
            moved_keys.push(key.clone());
            held.insert(key, interest);
        }
    }

    plan.moves = moved_keys
        .iter()
        .filter_map(|k| held.get(k).cloned())
        .collect();
    plan.upgrades = upgraded_keys
        .iter()
        .filter_map(|k| held.get(k).cloned())
        .collect();
    plan
}

enum MergeOutcome {
    Merged {
        conflicts: Vec<MergeConflict>,
        data_preserved: std::collections::BTreeMap<ContactField, FieldValue>,
        interactions: usize,
        interests: usize,
        merged_at: NaiveDateTime,
    },
    AlreadyArchived,
    Blocked(Vec<MergeConflict>),
}

/// Applies approved merges: resolved fields onto the primary, dependent
/// records moved across, secondary archived, all in one transaction.
#[derive(Clone)]
pub struct MergeExecutor {
    repo: Arc<dyn ContactRepository>,
    analyzer: ConflictAnalyzer,
}

impl MergeExecutor {
    pub fn new(repo: Arc<dyn ContactRepository>, config: Arc<DedupConfig>) -> Self {
        Self {
            analyzer: ConflictAnalyzer::new(config.field_strategies.clone()),
            repo,
        }
    }

    async fn load_active(
        &self,
        user_id: &UserId,
        contact_id: &ContactId,
    ) -> Result<Contact, DedupError> {
        self.repo
            .load_contact(user_id, contact_id)
            .await?
            .filter(|c| !c.is_archived)
            .ok_or_else(|| DedupError::not_found(user_id, contact_id))
    }

    fn reject_self_merge(primary_id: &ContactId, secondary_id: &ContactId) -> Result<(), DedupError> {
        if primary_id == secondary_id {
            return Err(DedupError::InvalidRequest(format!(
                "cannot merge contact {} into itself",
                primary_id
            )));
        }
        Ok(())
    }

    /// Read-only: what merging `secondary_id` into `primary_id` would do.
    pub async fn preview_merge(
        &self,
        user_id: &UserId,
        primary_id: &ContactId,
        secondary_id: &ContactId,
        resolutions: &Resolutions,
    ) -> Result<MergePreview, DedupError> {
        Self::reject_self_merge(primary_id, secondary_id)?;
        let primary = self.load_active(user_id, primary_id).await?;
        let secondary = self
            .repo
            .load_contact(user_id, secondary_id)
            .await?
            .ok_or_else(|| DedupError::not_found(user_id, secondary_id))?;
        self.build_preview(&primary, &secondary, resolutions).await
    }

    async fn build_preview(
        &self,
        primary: &Contact,
        secondary: &Contact,
        resolutions: &Resolutions,
    ) -> Result<MergePreview, DedupError> {
        let conflicts = self.analyzer.analyze(primary, secondary, resolutions)?;
        let merged = build_merged_contact(primary, secondary, &conflicts);

        let interactions = self
            .repo
            .load_interactions_for_contact(&secondary.id)
            .await?;
        let plan = plan_interest_moves(
            &primary.id,
            self.repo.load_interests_for_contact(&primary.id).await?,
            self.repo.load_interests_for_contact(&secondary.id).await?,
        );

        Ok(MergePreview {
            primary_contact_id: primary.id.clone(),
            secondary_contact_id: secondary.id.clone(),
            estimated_data_loss: conflicts
                .iter()
                .filter_map(MergeConflict::data_loss_message)
                .collect(),
            blocking_fields: conflicts
                .iter()
                .filter(|c| c.is_blocking())
                .map(|c| c.field)
                .collect(),
            merged_fields: merged.field_snapshot(),
            interactions_to_merge: interactions.len(),
            interests_to_merge: plan.moves.len(),
            interest_collisions: plan.orphans.len(),
            conflicts,
        })
    }

    /// Merges `secondary_id` into `primary_id`.
    ///
    /// Unknown ids, foreign contacts and an archived primary are errors. An
    /// archived secondary is a successful no-op. Unresolved manual-review
    /// conflicts and storage failures come back as a failed `MergeResult`
    /// with nothing persisted.
    pub async fn merge_contacts(
        &self,
        user_id: &UserId,
        primary_id: &ContactId,
        secondary_id: &ContactId,
        resolutions: &Resolutions,
        dry_run: bool,
    ) -> Result<MergeResult, DedupError> {
        let logger = MergeLogger::new(primary_id, secondary_id);
        logger.log_start(dry_run);
        Self::reject_self_merge(primary_id, secondary_id)?;

        let secondary = self
            .repo
            .load_contact(user_id, secondary_id)
            .await?
            .ok_or_else(|| DedupError::not_found(user_id, secondary_id))?;
        if secondary.is_archived {
            logger.log_already_archived();
            return Ok(MergeResult::already_merged(primary_id, secondary_id));
        }
        let primary = self.load_active(user_id, primary_id).await?;

        if dry_run {
            let preview = self.build_preview(&primary, &secondary, resolutions).await?;
            return Ok(MergeResult::from_preview(preview));
        }

        let conflicts = self.analyzer.analyze(&primary, &secondary, resolutions)?;
        if conflicts.iter().any(MergeConflict::is_blocking) {
            return Ok(self.blocked(&logger, primary_id, secondary_id, conflicts));
        }

        match self
            .execute(user_id, primary_id, secondary_id, resolutions)
            .await
        {
            Ok(MergeOutcome::Merged {
                conflicts,
                data_preserved,
                interactions,
                interests,
                merged_at,
            }) => {
                logger.log_committed(conflicts.len(), interactions, interests);
                Ok(MergeResult::completed(
                    primary_id,
                    secondary_id,
                    conflicts,
                    data_preserved,
                    interactions,
                    interests,
                    merged_at,
                ))
            }
            Ok(MergeOutcome::AlreadyArchived) => {
                logger.log_already_archived();
                Ok(MergeResult::already_merged(primary_id, secondary_id))
            }
            Ok(MergeOutcome::Blocked(conflicts)) => {
                Ok(self.blocked(&logger, primary_id, secondary_id, conflicts))
            }
            Err(e) => {
                logger.log_rolled_back(&e);
                Ok(MergeResult::failed(
                    primary_id,
                    secondary_id,
                    format!("{:#}", e),
                ))
            }
        }
    }

    fn blocked(
        &self,
        logger: &MergeLogger,
        primary_id: &ContactId,
        secondary_id: &ContactId,
        conflicts: Vec<MergeConflict>,
    ) -> MergeResult {
        let fields: Vec<&str> = conflicts
            .iter()
            .filter(|c| c.is_blocking())
            .map(|c| c.field.as_str())
            .collect();
        logger.log_blocked(&fields);
        MergeResult::blocked(primary_id, secondary_id, conflicts)
    }

    async fn execute(
        &self,
        user_id: &UserId,
        primary_id: &ContactId,
        secondary_id: &ContactId,
        resolutions: &Resolutions,
    ) -> anyhow::Result<MergeOutcome> {
        let mut tx = self.repo.begin().await?;
        let applied = self
            .apply(tx.as_mut(), user_id, primary_id, secondary_id, resolutions)
            .await;
        match applied {
            Ok(outcome @ MergeOutcome::Merged { .. }) => {
                tx.commit().await.context("Merge: commit failed")?;
                Ok(outcome)
            }
            Ok(outcome) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed merge also failed: {:#}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn MergeTransaction,
        user_id: &UserId,
        primary_id: &ContactId,
        secondary_id: &ContactId,
        resolutions: &Resolutions,
    ) -> anyhow::Result<MergeOutcome> {
        // lock in id order so two merges over the same pair cannot deadlock
        let (first, second) = if primary_id <= secondary_id {
            (primary_id, secondary_id)
        } else {
            (secondary_id, primary_id)
        };
        let first_row = tx.lock_contact(user_id, first).await?;
        let second_row = tx.lock_contact(user_id, second).await?;
        let (primary, secondary) = if first == primary_id {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let primary = primary
            .filter(|c| !c.is_archived)
            .with_context(|| format!("Merge: primary contact {} is no longer active", primary_id))?;
        let secondary = secondary
            .with_context(|| format!("Merge: secondary contact {} disappeared", secondary_id))?;
        if secondary.is_archived {
            return Ok(MergeOutcome::AlreadyArchived);
        }

        let conflicts = self.analyzer.analyze(&primary, &secondary, resolutions)?;
        if conflicts.iter().any(MergeConflict::is_blocking) {
            return Ok(MergeOutcome::Blocked(conflicts));
        }

        let now = Utc::now().naive_utc();
        let mut merged = build_merged_contact(&primary, &secondary, &conflicts);
        merged.updated_at = now;
        tx.persist_contact(&merged).await?;

        let mut interactions_moved = 0;
        for mut interaction in tx.interactions_for_contact(&secondary.id).await? {
            interaction.contact_id = primary.id.clone();
            tx.persist_interaction(&interaction).await?;
            interactions_moved += 1;
        }

        let primary_interests = tx.interests_for_contact(&primary.id).await?;
        let secondary_interests = tx.interests_for_contact(&secondary.id).await?;
        let plan = plan_interest_moves(&primary.id, primary_interests, secondary_interests);
        for interest in plan
            .upgrades
            .iter()
            .chain(plan.moves.iter())
            .chain(plan.orphans.iter())
        {
            tx.persist_interest(interest).await?;
        }

        let mut archived = secondary;
        archived.is_archived = true;
        archived.merged_into_id = Some(primary.id.clone());
        archived.updated_at = now;
        tx.persist_contact(&archived).await?;

        Ok(MergeOutcome::Merged {
            conflicts,
            data_preserved: merged.field_snapshot(),
            interactions: interactions_moved,
            interests: plan.moves.len(),
            merged_at: now,
        })
    }

    /// Deletes interests left without a contact by earlier merge collisions.
    pub async fn cleanup_orphaned_interests(&self, user_id: &UserId) -> Result<u64, DedupError> {
        let removed = self.repo.purge_orphaned_interests(user_id).await?;
        if removed > 0 {
            info!("🧹 Removed {} orphaned interests for user {}", removed, user_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn interest(id: &str, contact: &str, topic: &str, score: f64) -> Interest {
        Interest {
            id: id.into(),
            contact_id: Some(ContactId::new(contact)),
            user_id: UserId::new("u1"),
            category: "tech".into(),
            topic: topic.into(),
            confidence_score: score,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn colliding_interest_is_orphaned_and_upgrades_primary() {
        let primary = ContactId::new("p");
        let plan = plan_interest_moves(
            &primary,
            vec![interest("i1", "p", "rust", 0.4)],
            vec![
                interest("i2", "s", "rust", 0.9),
                interest("i3", "s", "go", 0.5),
            ],
        );
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].id, "i3");
        assert_eq!(plan.moves[0].contact_id.as_ref(), Some(&primary));
        assert_eq!(plan.orphans.len(), 1);
        assert!(plan.orphans[0].is_orphaned());
        assert_eq!(plan.upgrades.len(), 1);
        assert_eq!(plan.upgrades[0].confidence_score, 0.9);
    }

    #[test]
    fn lower_confidence_duplicate_leaves_primary_untouched() {
        let plan = plan_interest_moves(
            &ContactId::new("p"),
            vec![interest("i1", "p", "rust", 0.8)],
            vec![interest("i2", "s", "rust", 0.3)],
        );
        assert!(plan.moves.is_empty());
        assert!(plan.upgrades.is_empty());
        assert_eq!(plan.orphans.len(), 1);
    }

    #[test]
    fn duplicate_keys_within_secondary_move_once() {
        let plan = plan_interest_moves(
            &ContactId::new("p"),
            Vec::new(),
            vec![
                interest("i1", "s", "rust", 0.3),
                interest("i2", "s", "rust", 0.6),
            ],
        );
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].confidence_score, 0.6);
        assert_eq!(plan.orphans.len(), 1);
        assert!(plan.upgrades.is_empty());
    }
}
