// src/merging/conflicts.rs

use std::collections::BTreeMap;

use crate::error::DedupError;
use crate::models::core::Contact;
use crate::models::merging::{
    ContactField, FieldValue, MergeConflict, MergeStrategy, Resolution, Resolutions,
};
use crate::utils::config::FieldStrategyTable;

pub const NOTES_MERGE_MARKER: &str = "--- Merged from duplicate contact ---";

/// Field-by-field comparison of a primary and a secondary contact.
#[derive(Debug, Clone)]
pub struct ConflictAnalyzer {
    strategies: FieldStrategyTable,
}

fn combine(field: ContactField, primary: &FieldValue, secondary: &FieldValue) -> Option<FieldValue> {
    match (field, primary, secondary) {
        (_, FieldValue::Tags(p), FieldValue::Tags(s)) => {
            Some(FieldValue::Tags(p.union(s).cloned().collect()))
        }
        (ContactField::Notes, FieldValue::Text(p), FieldValue::Text(s)) => Some(FieldValue::Text(
            format!("{}\n\n{}\n{}", p, NOTES_MERGE_MARKER, s),
        )),
        (_, FieldValue::Text(p), FieldValue::Text(s)) => {
            Some(FieldValue::Text(format!("{}\n\n{}", p, s)))
        }
        _ => None,
    }
}

impl ConflictAnalyzer {
    pub fn new(strategies: FieldStrategyTable) -> Self {
        Self { strategies }
    }

    /// Conflicts between `primary` and `secondary`, with caller resolutions
    /// applied. Fields that are equal or absent on either side are skipped.
    pub fn analyze(
        &self,
        primary: &Contact,
        secondary: &Contact,
        resolutions: &Resolutions,
    ) -> Result<Vec<MergeConflict>, DedupError> {
        for (field, resolution) in resolutions {
            if *resolution == Resolution::Concatenate && !field.is_concatenable() {
                return Err(DedupError::InvalidResolution {
                    field: field.as_str().to_string(),
                    value: resolution.as_str().to_string(),
                });
            }
        }

        let mut conflicts = Vec::new();
        for field in ContactField::ALL {
            let (Some(p), Some(s)) = (primary.field_value(field), secondary.field_value(field))
            else {
                continue;
            };
            if p.equivalent(&s) {
                continue;
            }
            let mut conflict = self.recommend(field, p, s, primary, secondary);
            if let Some(resolution) = resolutions.get(&field) {
                apply_override(&mut conflict, *resolution);
            }
            conflicts.push(conflict);
        }
        Ok(conflicts)
    }

    fn recommend(
        &self,
        field: ContactField,
        p: FieldValue,
        s: FieldValue,
        primary: &Contact,
        secondary: &Contact,
    ) -> MergeConflict {
        let default = self.strategies.strategy_for(field);
        let conflict = |strategy, confidence, reason: &str, resolved: FieldValue| MergeConflict {
            field,
            primary_value: p.clone(),
            secondary_value: s.clone(),
            recommended_strategy: strategy,
            confidence,
            reason: reason.to_string(),
            resolved_value: resolved,
        };

        if default == MergeStrategy::Concatenate {
            if let Some(combined) = combine(field, &p, &s) {
                return conflict(MergeStrategy::Concatenate, 0.9, "Combining both values", combined);
            }
        }

        if let (FieldValue::Number(pn), FieldValue::Number(sn)) = (&p, &s) {
            return if pn >= sn {
                conflict(MergeStrategy::TakePrimary, 0.95, "Taking the higher value", p.clone())
            } else {
                conflict(MergeStrategy::TakeSecondary, 0.95, "Taking the higher value", s.clone())
            };
        }

        match (p.completeness(), s.completeness()) {
            (Some(lp), Some(ls)) if lp > ls => {
                return conflict(
                    MergeStrategy::TakeMostComplete,
                    0.8,
                    "Primary value is more complete",
                    p.clone(),
                )
            }
            (Some(lp), Some(ls)) if ls > lp => {
                return conflict(
                    MergeStrategy::TakeMostComplete,
                    0.8,
                    "Secondary value is more complete",
                    s.clone(),
                )
            }
            _ => {}
        }

        match default {
            MergeStrategy::TakeMostRecent => {
                let secondary_newer = match (&p, &s) {
                    (FieldValue::Timestamp(pt), FieldValue::Timestamp(st)) => st > pt,
                    _ => secondary.updated_at > primary.updated_at,
                };
                if secondary_newer {
                    conflict(
                        MergeStrategy::TakeMostRecent,
                        0.7,
                        "Secondary value is more recent",
                        s.clone(),
                    )
                } else {
                    conflict(
                        MergeStrategy::TakeMostRecent,
                        0.7,
                        "Primary value is more recent",
                        p.clone(),
                    )
                }
            }
            MergeStrategy::TakePrimary => conflict(
                MergeStrategy::TakePrimary,
                0.6,
                "Keeping the primary contact's value",
                p.clone(),
            ),
            MergeStrategy::TakeSecondary => conflict(
                MergeStrategy::TakeSecondary,
                0.6,
                "Taking the secondary contact's value",
                s.clone(),
            ),
            MergeStrategy::TakeMostComplete
            | MergeStrategy::Concatenate
            | MergeStrategy::ManualReview => conflict(
                MergeStrategy::ManualReview,
                0.5,
                "Values differ significantly",
                p.clone(),
            ),
        }
    }
}

fn apply_override(conflict: &mut MergeConflict, resolution: Resolution) {
    let (strategy, value) = match resolution {
        Resolution::Primary => (MergeStrategy::TakePrimary, Some(conflict.primary_value.clone())),
        Resolution::Secondary => (
            MergeStrategy::TakeSecondary,
            Some(conflict.secondary_value.clone()),
        ),
        Resolution::Concatenate => (
            MergeStrategy::Concatenate,
            combine(conflict.field, &conflict.primary_value, &conflict.secondary_value),
        ),
    };
    // combine only fails for non-text kinds, rejected before analysis
    if let Some(value) = value {
        conflict.recommended_strategy = strategy;
        conflict.resolved_value = value;
        conflict.confidence = 1.0;
        conflict.reason = format!("Resolved by caller: {}", resolution);
    }
}

/// The primary with every resolved conflict written onto it and gaps filled
/// from the secondary.
pub fn build_merged_contact(
    primary: &Contact,
    secondary: &Contact,
    conflicts: &[MergeConflict],
) -> Contact {
    let resolved: BTreeMap<ContactField, &FieldValue> = conflicts
        .iter()
        .map(|c| (c.field, &c.resolved_value))
        .collect();

    let mut merged = primary.clone();
    for field in ContactField::ALL {
        if let Some(value) = resolved.get(&field) {
            merged.set_field(field, Some((*value).clone()));
        } else if primary.field_value(field).is_none() {
            if let Some(value) = secondary.field_value(field) {
                merged.set_field(field, Some(value));
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::{ContactId, ContactSource, UserId};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn contact(id: &str, updated_day: u32) -> Contact {
        let mut c = Contact::new(ContactId::new(id), UserId::new("u1"), at(1));
        c.updated_at = at(updated_day);
        c
    }

    fn analyzer() -> ConflictAnalyzer {
        ConflictAnalyzer::new(FieldStrategyTable::default())
    }

    fn find(conflicts: &[MergeConflict], field: ContactField) -> &MergeConflict {
        conflicts
            .iter()
            .find(|c| c.field == field)
            .expect("conflict present")
    }

    #[test]
    fn equal_or_absent_fields_are_not_conflicts() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.email = Some("Sam@Acme.com".into());
        s.email = Some("sam@acme.com".into());
        s.phone = Some("555-0100".into());

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        assert!(conflicts
            .iter()
            .all(|c| c.field != ContactField::Email && c.field != ContactField::Phone));
    }

    #[test]
    fn tags_union_and_notes_are_joined_with_marker() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.tags = ["vip".to_string()].into_iter().collect();
        s.tags = ["investor".to_string(), "vip".to_string()].into_iter().collect();
        p.notes = Some("Met at conf".into());
        s.notes = Some("Prefers email".into());

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let tags = find(&conflicts, ContactField::Tags);
        assert_eq!(tags.recommended_strategy, MergeStrategy::Concatenate);
        assert_eq!(tags.confidence, 0.9);
        match &tags.resolved_value {
            FieldValue::Tags(t) => assert_eq!(t.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        let notes = find(&conflicts, ContactField::Notes);
        assert_eq!(
            notes.resolved_value,
            FieldValue::Text(format!("Met at conf\n\n{}\nPrefers email", NOTES_MERGE_MARKER))
        );
        assert!(notes.data_loss_message().is_none());
    }

    #[test]
    fn tag_union_covering_the_secondary_loses_nothing() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.tags = ["vip".to_string(), "investor".to_string()].into_iter().collect();
        s.tags = ["vip".to_string()].into_iter().collect();

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let tags = find(&conflicts, ContactField::Tags);
        assert_eq!(tags.resolved_value, tags.primary_value);
        assert!(tags.data_loss_message().is_none());

        // keeping only the primary still drops nothing the secondary had
        let mut keep_primary = Resolutions::new();
        keep_primary.insert(ContactField::Tags, Resolution::Primary);
        let conflicts = analyzer().analyze(&p, &s, &keep_primary).unwrap();
        assert!(find(&conflicts, ContactField::Tags).discarded_value().is_none());
    }

    #[test]
    fn taking_one_side_of_tags_reports_only_missing_entries() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.tags = ["vip".to_string()].into_iter().collect();
        s.tags = ["vip".to_string(), "advisor".to_string()].into_iter().collect();

        let mut keep_primary = Resolutions::new();
        keep_primary.insert(ContactField::Tags, Resolution::Primary);
        let conflicts = analyzer().analyze(&p, &s, &keep_primary).unwrap();
        assert_eq!(
            find(&conflicts, ContactField::Tags).data_loss_message().as_deref(),
            Some("tags: 'advisor' will be lost")
        );
    }

    #[test]
    fn higher_relationship_strength_wins() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.relationship_strength = 0.2;
        s.relationship_strength = 0.7;

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let c = find(&conflicts, ContactField::RelationshipStrength);
        assert_eq!(c.recommended_strategy, MergeStrategy::TakeSecondary);
        assert_eq!(c.confidence, 0.95);
        assert_eq!(c.resolved_value, FieldValue::Number(0.7));
    }

    #[test]
    fn longer_value_wins_then_recency_breaks_ties() {
        let mut p = contact("p", 2);
        let mut s = contact("s", 5);
        p.full_name = Some("Jon Doe".into());
        s.full_name = Some("Jonathan Doe".into());
        p.company = Some("Globex".into());
        s.company = Some("Vandel".into());

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let name = find(&conflicts, ContactField::FullName);
        assert_eq!(name.confidence, 0.8);
        assert_eq!(name.resolved_value, FieldValue::Text("Jonathan Doe".into()));

        let company = find(&conflicts, ContactField::Company);
        assert_eq!(company.recommended_strategy, MergeStrategy::TakeMostRecent);
        assert_eq!(company.confidence, 0.7);
        assert_eq!(company.resolved_value, FieldValue::Text("Vandel".into()));
        assert_eq!(
            company.data_loss_message().as_deref(),
            Some("company: 'Globex' will be lost")
        );
    }

    #[test]
    fn same_length_identity_values_need_manual_review() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.email = Some("ann@acme.com".into());
        s.email = Some("bob@acme.com".into());

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let email = find(&conflicts, ContactField::Email);
        assert!(email.is_blocking());
        assert_eq!(email.confidence, 0.5);
        assert_eq!(email.reason, "Values differ significantly");
    }

    #[test]
    fn later_last_interaction_is_kept() {
        let mut p = contact("p", 9);
        let mut s = contact("s", 1);
        p.last_interaction_at = Some(at(3));
        s.last_interaction_at = Some(at(3) + Duration::days(10));

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let c = find(&conflicts, ContactField::LastInteractionAt);
        assert_eq!(c.resolved_value, FieldValue::Timestamp(at(13)));
    }

    #[test]
    fn overrides_replace_strategy_with_full_confidence() {
        let mut p = contact("p", 9);
        let mut s = contact("s", 1);
        p.company = Some("Acme Corporation".into());
        s.company = Some("Acme".into());
        p.email = Some("ann@acme.com".into());
        s.email = Some("bob@acme.com".into());
        p.contact_source = ContactSource::Manual;
        s.contact_source = ContactSource::Import;

        let mut resolutions = Resolutions::new();
        resolutions.insert(ContactField::Company, Resolution::Secondary);
        resolutions.insert(ContactField::Email, Resolution::Primary);

        let conflicts = analyzer().analyze(&p, &s, &resolutions).unwrap();
        let company = find(&conflicts, ContactField::Company);
        assert_eq!(company.recommended_strategy, MergeStrategy::TakeSecondary);
        assert_eq!(company.confidence, 1.0);
        assert_eq!(company.resolved_value, FieldValue::Text("Acme".into()));
        assert!(!find(&conflicts, ContactField::Email).is_blocking());

        let source = find(&conflicts, ContactField::ContactSource);
        assert_eq!(source.recommended_strategy, MergeStrategy::TakePrimary);
        assert_eq!(source.resolved_value, FieldValue::Source(ContactSource::Manual));
    }

    #[test]
    fn concatenate_override_on_identity_field_is_rejected() {
        let p = contact("p", 1);
        let s = contact("s", 1);
        let mut resolutions = Resolutions::new();
        resolutions.insert(ContactField::Email, Resolution::Concatenate);
        let err = analyzer().analyze(&p, &s, &resolutions).unwrap_err();
        assert!(matches!(err, DedupError::InvalidResolution { .. }));
    }

    #[test]
    fn merged_contact_fills_gaps_from_secondary() {
        let mut p = contact("p", 1);
        let mut s = contact("s", 1);
        p.email = Some("sam@acme.com".into());
        s.phone = Some("+14155552671".into());
        s.job_title = Some("CTO".into());

        let conflicts = analyzer().analyze(&p, &s, &Resolutions::new()).unwrap();
        let merged = build_merged_contact(&p, &s, &conflicts);
        assert_eq!(merged.id, p.id);
        assert_eq!(merged.email.as_deref(), Some("sam@acme.com"));
        assert_eq!(merged.phone.as_deref(), Some("+14155552671"));
        assert_eq!(merged.job_title.as_deref(), Some("CTO"));
    }
}
