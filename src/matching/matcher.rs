// src/matching/matcher.rs

use chrono::NaiveDateTime;
use log::trace;

use crate::matching::email::local_part_similarity;
use crate::matching::name::{partial_ratio, token_ratio};
use crate::matching::quality::QualityScorer;
use crate::models::matching::{
    DuplicateMatch, MatchEvidence, MatchField, MatchingStrategy, NormalizedContact,
};
use crate::utils::config::DedupConfig;

/// Pairwise comparison of normalized contacts.
///
/// Exact identity signals (email, phone, profile handle) are tried in order
/// and the first hit short-circuits the weaker ones. Fuzzy name matching runs
/// only when no exact signal fired. The partial-email signal is always
/// evaluated when both emails are present and differ.
#[derive(Debug, Clone)]
pub struct ContactMatcher {
    config: DedupConfig,
    scorer: QualityScorer,
}

struct Candidate {
    strategy: MatchingStrategy,
    score: f64,
}

impl Candidate {
    /// Scores are capped at the strategy's base confidence.
    fn new(strategy: MatchingStrategy, raw_score: f64) -> Self {
        Candidate {
            strategy,
            score: raw_score.min(strategy.base_confidence()),
        }
    }
}

fn keep_max(best: &mut Option<f64>, score: f64) {
    *best = Some(best.map_or(score, |b| b.max(score)));
}

/// Best name similarity over the comparisons both contacts support.
fn name_similarity(a: &NormalizedContact, b: &NormalizedContact) -> Option<f64> {
    let mut best = None;
    if !a.name.is_empty() && !b.name.is_empty() {
        keep_max(&mut best, token_ratio(&a.name, &b.name));
    }
    let has_parts = |c: &NormalizedContact| !c.first_name.is_empty() && !c.last_name.is_empty();
    if has_parts(a) && has_parts(b) {
        keep_max(
            &mut best,
            token_ratio(
                &format!("{} {}", a.first_name, a.last_name),
                &format!("{} {}", b.first_name, b.last_name),
            ),
        );
    }
    if !a.first_name.is_empty() && !b.name.is_empty() {
        keep_max(&mut best, partial_ratio(&a.first_name, &b.name));
    }
    if !b.first_name.is_empty() && !a.name.is_empty() {
        keep_max(&mut best, partial_ratio(&b.first_name, &a.name));
    }
    best
}

fn differs(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && a != b
}

impl ContactMatcher {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            config: config.clone(),
            scorer: QualityScorer::new(config),
        }
    }

    /// The single best match between `a` and `b`, or `None` if no strategy fired.
    pub fn compare(
        &self,
        a: &NormalizedContact,
        b: &NormalizedContact,
        now: NaiveDateTime,
    ) -> Option<DuplicateMatch> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut matching_fields: Vec<MatchField> = Vec::new();
        let mut evidence = MatchEvidence::default();

        if !a.email.is_empty() && a.email == b.email {
            candidates.push(Candidate::new(MatchingStrategy::ExactEmail, 100.0));
            matching_fields.push(MatchField::Email);
            evidence.exact_email = Some(a.email.clone());
        } else if !a.phone.is_empty() && a.phone == b.phone {
            candidates.push(Candidate::new(MatchingStrategy::ExactPhone, 95.0));
            matching_fields.push(MatchField::Phone);
            evidence.exact_phone = Some(a.phone.clone());
        } else if !a.network_handle.is_empty() && a.network_handle == b.network_handle {
            candidates.push(Candidate::new(MatchingStrategy::ExactNetworkProfile, 90.0));
            matching_fields.push(MatchField::NetworkProfile);
            evidence.exact_network_handle = Some(a.network_handle.clone());
        } else if let Some(name_sim) = name_similarity(a, b) {
            evidence.name_similarity = Some(name_sim);
            if name_sim >= self.config.name_similarity_threshold {
                matching_fields.push(MatchField::Name);
                self.fuzzy_name_candidate(a, b, name_sim, &mut candidates, &mut matching_fields, &mut evidence);
            }
        }

        if differs(&a.email, &b.email) {
            if let Some(email_sim) = local_part_similarity(&a.email, &b.email) {
                evidence.email_similarity = Some(email_sim);
                if email_sim > self.config.partial_email_threshold {
                    candidates.push(Candidate::new(MatchingStrategy::PartialEmail, email_sim * 0.7));
                    matching_fields.push(MatchField::EmailPartial);
                }
            }
        }

        let mut best: Option<Candidate> = None;
        for candidate in candidates {
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        let Some(best) = best else {
            trace!("No match between {} and {}", a.contact_id, b.contact_id);
            return None;
        };

        let confidence = (best.score / 100.0).clamp(0.0, 1.0);
        let (merge_priority, score_a, score_b) = self.scorer.merge_priority(a, b, now);
        evidence.quality_score_a = Some(score_a);
        evidence.quality_score_b = Some(score_b);

        Some(DuplicateMatch {
            contact_a_id: a.contact_id.clone(),
            contact_b_id: b.contact_id.clone(),
            confidence,
            strategy: best.strategy,
            conflicting_fields: conflicting_fields(a, b, &matching_fields),
            matching_fields,
            recommended_action: self.config.action_for(confidence),
            merge_priority,
            evidence,
        })
    }

    fn fuzzy_name_candidate(
        &self,
        a: &NormalizedContact,
        b: &NormalizedContact,
        name_sim: f64,
        candidates: &mut Vec<Candidate>,
        matching_fields: &mut Vec<MatchField>,
        evidence: &mut MatchEvidence,
    ) {
        let company_sim = (!a.company.is_empty() && !b.company.is_empty())
            .then(|| token_ratio(&a.company, &b.company));
        evidence.company_similarity = company_sim;

        if let Some(company_sim) =
            company_sim.filter(|s| *s >= self.config.company_similarity_threshold)
        {
            matching_fields.push(MatchField::Company);
            candidates.push(Candidate::new(
                MatchingStrategy::FuzzyNameCompany,
                (name_sim + company_sim) / 2.0,
            ));
        } else if !a.email_domain.is_empty() && a.email_domain == b.email_domain {
            matching_fields.push(MatchField::EmailDomain);
            evidence.shared_email_domain = Some(a.email_domain.clone());
            candidates.push(Candidate::new(
                MatchingStrategy::FuzzyNameEmailDomain,
                name_sim * 0.9,
            ));
        } else {
            candidates.push(Candidate::new(MatchingStrategy::FuzzyNameOnly, name_sim * 0.8));
        }
    }
}

/// Identity fields both contacts carry with different normalized values.
fn conflicting_fields(
    a: &NormalizedContact,
    b: &NormalizedContact,
    matching_fields: &[MatchField],
) -> Vec<MatchField> {
    [
        (MatchField::Email, &a.email, &b.email),
        (MatchField::Phone, &a.phone, &b.phone),
        (MatchField::NetworkProfile, &a.network_handle, &b.network_handle),
        (MatchField::Company, &a.company, &b.company),
    ]
    .into_iter()
    .filter(|(field, va, vb)| !matching_fields.contains(field) && differs(va, vb))
    .map(|(field, _, _)| field)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::normalizer::ContactNormalizer;
    use crate::models::core::{Contact, ContactId, UserId};
    use crate::models::matching::{MergePriority, RecommendedAction};
    use chrono::Utc;

    fn contact(id: &str) -> Contact {
        Contact::new(ContactId::new(id), UserId::new("u1"), Utc::now().naive_utc())
    }

    fn compare(a: &Contact, b: &Contact) -> Option<DuplicateMatch> {
        let config = DedupConfig::default();
        let normalizer = ContactNormalizer::new("US");
        ContactMatcher::new(&config).compare(
            &normalizer.normalize(a, 0),
            &normalizer.normalize(b, 0),
            Utc::now().naive_utc(),
        )
    }

    #[test]
    fn gmail_alias_is_an_exact_email_match() {
        let mut a = contact("a");
        a.email = Some("j.doe+x@gmail.com".into());
        let mut b = contact("b");
        b.email = Some("jdoe@gmail.com".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::ExactEmail);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.recommended_action, RecommendedAction::AutoMerge);
        assert_eq!(m.evidence.exact_email.as_deref(), Some("jdoe@gmail.com"));
        assert!(m.evidence.email_similarity.is_none());
    }

    #[test]
    fn exact_email_skips_name_comparison() {
        let mut a = contact("a");
        a.email = Some("x@acme.com".into());
        a.full_name = Some("Alice".into());
        let mut b = contact("b");
        b.email = Some("X@Acme.com".into());
        b.full_name = Some("Bob".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::ExactEmail);
        assert!(m.evidence.name_similarity.is_none());
    }

    #[test]
    fn phone_match_ignores_formatting() {
        let mut a = contact("a");
        a.phone = Some("(415) 555-2671".into());
        a.email = Some("a@one.com".into());
        let mut b = contact("b");
        b.phone = Some("+1 415 555 2671".into());
        b.email = Some("b@two.com".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::ExactPhone);
        assert!((m.confidence - 0.95).abs() < 1e-9);
        assert!(m.conflicting_fields.contains(&MatchField::Email));
    }

    #[test]
    fn profile_handle_match() {
        let mut a = contact("a");
        a.network_profile_url = Some("https://www.linkedin.com/in/jdoe/".into());
        let mut b = contact("b");
        b.network_profile_url = Some("linkedin.com/in/JDoe".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::ExactNetworkProfile);
        assert!((m.confidence - 0.90).abs() < 1e-9);
        assert_eq!(m.recommended_action, RecommendedAction::AutoMerge);
    }

    #[test]
    fn honorifics_and_company_suffix_give_fuzzy_name_company() {
        let mut a = contact("a");
        a.full_name = Some("Dr. John Smith Jr.".into());
        a.company = Some("Acme Inc.".into());
        let mut b = contact("b");
        b.full_name = Some("John Smith".into());
        b.company = Some("Acme".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::FuzzyNameCompany);
        assert!((m.confidence - 0.85).abs() < 1e-9);
        assert_eq!(m.recommended_action, RecommendedAction::ManualReview);
        assert_eq!(m.evidence.name_similarity, Some(100.0));
        assert_eq!(m.evidence.company_similarity, Some(100.0));
        assert!(m.conflicting_fields.is_empty());
    }

    #[test]
    fn different_companies_fall_through_to_email_domain() {
        let mut a = contact("a");
        a.full_name = Some("Jane Roe".into());
        a.company = Some("Globex".into());
        a.email = Some("jane@initech.com".into());
        let mut b = contact("b");
        b.full_name = Some("Jane Roe".into());
        b.company = Some("Umbrella".into());
        b.email = Some("roe.j@initech.com".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::FuzzyNameEmailDomain);
        assert!((m.confidence - 0.80).abs() < 1e-9);
        assert!(m.conflicting_fields.contains(&MatchField::Company));
        assert_eq!(m.evidence.shared_email_domain.as_deref(), Some("initech.com"));
    }

    #[test]
    fn name_only_match_is_capped_at_seventy() {
        let mut a = contact("a");
        a.full_name = Some("Maria Garcia".into());
        let mut b = contact("b");
        b.full_name = Some("Garcia Maria".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::FuzzyNameOnly);
        assert!((m.confidence - 0.70).abs() < 1e-9);
    }

    #[test]
    fn dissimilar_names_do_not_match() {
        let mut a = contact("a");
        a.full_name = Some("Maria Garcia".into());
        let mut b = contact("b");
        b.full_name = Some("Tom Baker".into());

        assert!(compare(&a, &b).is_none());
    }

    #[test]
    fn partial_email_is_reported_independently() {
        let mut a = contact("a");
        a.email = Some("john_doe@acme.com".into());
        let mut b = contact("b");
        b.email = Some("john.doe42@personal.net".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::PartialEmail);
        assert!((m.confidence - 0.60).abs() < 1e-9);
        assert_eq!(m.evidence.email_similarity, Some(90.0));
        assert!(m.matching_fields.contains(&MatchField::EmailPartial));
    }

    #[test]
    fn stronger_fuzzy_candidate_beats_partial_email() {
        let mut a = contact("a");
        a.full_name = Some("John Doe".into());
        a.company = Some("Acme".into());
        a.email = Some("john.doe@acme.com".into());
        let mut b = contact("b");
        b.full_name = Some("John Doe".into());
        b.company = Some("Acme Corp".into());
        b.email = Some("johndoe@gmail.com".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.strategy, MatchingStrategy::FuzzyNameCompany);
        assert_eq!(m.evidence.email_similarity, Some(90.0));
        assert!(m.matching_fields.contains(&MatchField::EmailPartial));
    }

    #[test]
    fn richer_contact_is_preferred_as_primary() {
        let mut a = contact("a");
        a.email = Some("sam@acme.com".into());
        let mut b = contact("b");
        b.email = Some("sam@acme.com".into());
        b.phone = Some("(415) 555-2671".into());
        b.company = Some("Acme".into());

        let m = compare(&a, &b).expect("match");
        assert_eq!(m.merge_priority, MergePriority::BPrimary);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let mut a = contact("a");
        a.email = Some("same@x.com".into());
        a.phone = Some("4155552671".into());
        let b = a.clone();
        let m = compare(&a, &b).expect("match");
        assert!((0.0..=1.0).contains(&m.confidence));
    }
}
