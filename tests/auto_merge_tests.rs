// tests/auto_merge_tests.rs

mod common;

use common::*;
use dedupe_lib::db::FailPoint;
use dedupe_lib::models::core::Contact;
use dedupe_lib::models::stats_models::AutoMergeSummary;

fn mixed_contacts() -> Vec<Contact> {
    let mut contacts = gmail_pair();
    contacts.push(contact("b1", |c| c.phone = Some("(415) 555-2671".into())));
    contacts.push(contact("b2", |c| c.phone = Some("415.555.2671".into())));
    contacts.extend(fuzzy_pair());
    contacts
}

#[tokio::test]
async fn only_high_confidence_pairs_are_merged() {
    let (repo, engine) = seeded(mixed_contacts()).await;

    let results = engine
        .auto_merger()
        .auto_merge_high_confidence(&user(), 50)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success && !r.skipped));
    let summary = AutoMergeSummary::from_results(&results);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.total_contacts_merged, 4);

    // the 0.85 fuzzy pair is left for manual review
    assert!(!repo.get_contact(&id("f1")).await.unwrap().is_archived);
    assert!(!repo.get_contact(&id("f2")).await.unwrap().is_archived);

    let archived = ["a1", "a2", "b1", "b2"];
    let mut count = 0;
    for raw in archived {
        if repo.get_contact(&id(raw)).await.unwrap().is_archived {
            count += 1;
        }
    }
    assert_eq!(count, 2);
}

#[tokio::test]
async fn max_merges_caps_the_batch() {
    let (_repo, engine) = seeded(mixed_contacts()).await;
    let results = engine
        .auto_merger()
        .auto_merge_high_confidence(&user(), 1)
        .await;
    assert_eq!(results.len(), 1);
    // strongest candidate goes first
    assert!(results[0].merged_contact_id.as_str().starts_with('a'));
}

#[tokio::test]
async fn one_failed_merge_does_not_stop_the_batch() {
    let (repo, engine) = seeded(mixed_contacts()).await;
    repo.inject_failure(Some(FailPoint::Commit)).await;

    let results = engine
        .auto_merger()
        .auto_merge_high_confidence(&user(), 50)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success && r.error_message.is_some()));
    for raw in ["a1", "a2", "b1", "b2"] {
        assert!(!repo.get_contact(&id(raw)).await.unwrap().is_archived);
    }
}

#[tokio::test]
async fn suggestions_cover_manual_review_pairs_with_previews() {
    let (_repo, engine) = seeded(mixed_contacts()).await;

    let suggestions = engine
        .auto_merger()
        .get_merge_suggestions(&user(), 20)
        .await
        .unwrap();

    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    assert!(s.duplicate.involves(&id("f1")) && s.duplicate.involves(&id("f2")));
    let (primary, secondary) = s.duplicate.merge_order();
    assert_eq!(s.preview.primary_contact_id, primary);
    assert_eq!(s.preview.secondary_contact_id, secondary);

    let none = engine
        .auto_merger()
        .get_merge_suggestions(&user(), 0)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn pairs_absorbed_earlier_in_the_batch_are_reported_as_skipped() {
    let (repo, engine) = seeded(vec![
        contact("x1", |c| c.email = Some("kim@example.com".into())),
        contact("x2", |c| c.email = Some("Kim@Example.com".into())),
        contact("x3", |c| c.email = Some("kim@example.com ".into())),
    ])
    .await;

    let results = engine
        .auto_merger()
        .auto_merge_high_confidence(&user(), 50)
        .await;

    // three candidate pairs, one per entry
    assert_eq!(results.len(), 3);
    let summary = AutoMergeSummary::from_results(&results);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let skipped = results.iter().find(|r| r.skipped).unwrap();
    assert!(skipped.success);
    assert_eq!(skipped.interactions_merged, 0);
    assert!(skipped.merge_id.is_none());

    let mut active = 0;
    for raw in ["x1", "x2", "x3"] {
        if !repo.get_contact(&id(raw)).await.unwrap().is_archived {
            active += 1;
        }
    }
    assert_eq!(active, 1);
}
