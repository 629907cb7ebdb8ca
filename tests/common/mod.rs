// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use dedupe_lib::db::InMemoryRepository;
use dedupe_lib::models::core::{Contact, ContactId, Interaction, Interest, UserId};
use dedupe_lib::utils::config::DedupConfig;
use dedupe_lib::DedupEngine;

pub const USER: &str = "user-1";

pub fn user() -> UserId {
    UserId::new(USER)
}

pub fn id(raw: &str) -> ContactId {
    ContactId::new(raw)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn contact(raw_id: &str, build: impl FnOnce(&mut Contact)) -> Contact {
    let mut c = Contact::new(id(raw_id), user(), now());
    build(&mut c);
    c
}

pub fn interaction(raw_id: &str, contact_id: &str) -> Interaction {
    Interaction {
        id: raw_id.to_string(),
        contact_id: id(contact_id),
        user_id: user(),
        interaction_type: "meeting".to_string(),
        subject: None,
        occurred_at: now(),
    }
}

pub fn interest(raw_id: &str, contact_id: &str, category: &str, topic: &str, score: f64) -> Interest {
    Interest {
        id: raw_id.to_string(),
        contact_id: Some(id(contact_id)),
        user_id: user(),
        category: category.to_string(),
        topic: topic.to_string(),
        confidence_score: score,
        created_at: now(),
    }
}

pub async fn seeded(contacts: Vec<Contact>) -> (InMemoryRepository, DedupEngine) {
    let repo = InMemoryRepository::new();
    for c in contacts {
        repo.insert_contact(c).await;
    }
    let engine = DedupEngine::new(Arc::new(repo.clone()), DedupConfig::default());
    (repo, engine)
}

/// Two contacts sharing a gmail address up to alias folding.
pub fn gmail_pair() -> Vec<Contact> {
    vec![
        contact("a1", |c| c.email = Some("j.doe+x@gmail.com".into())),
        contact("a2", |c| c.email = Some("jdoe@gmail.com".into())),
    ]
}

/// Same person with a title, a suffix and a corporate suffix on one side.
pub fn fuzzy_pair() -> Vec<Contact> {
    vec![
        contact("f1", |c| {
            c.full_name = Some("Dr. John Smith Jr.".into());
            c.company = Some("Acme Inc.".into());
        }),
        contact("f2", |c| {
            c.full_name = Some("John Smith".into());
            c.company = Some("Acme".into());
        }),
    ]
}
