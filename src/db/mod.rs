// src/db/mod.rs

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::core::{Contact, ContactId, Interaction, Interest, UserId};

pub use memory::{FailPoint, InMemoryRepository};
pub use postgres::PgContactRepository;

/// Persistence boundary for contacts and their dependent records.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn load_contacts(&self, user_id: &UserId, exclude_archived: bool) -> Result<Vec<Contact>>;

    /// `None` when the contact does not exist or belongs to another user.
    async fn load_contact(&self, user_id: &UserId, contact_id: &ContactId)
        -> Result<Option<Contact>>;

    async fn load_interactions_for_contact(&self, contact_id: &ContactId)
        -> Result<Vec<Interaction>>;

    async fn load_interests_for_contact(&self, contact_id: &ContactId) -> Result<Vec<Interest>>;

    /// Number of interactions per contact for one user.
    async fn interaction_counts(&self, user_id: &UserId) -> Result<HashMap<ContactId, u32>>;

    /// Deletes the user's interests with no contact; returns how many went.
    async fn purge_orphaned_interests(&self, user_id: &UserId) -> Result<u64>;

    /// Opens the transactional scope for one merge.
    async fn begin(&self) -> Result<Box<dyn MergeTransaction>>;
}

/// Writes staged by a single merge. Nothing is visible to other readers
/// until `commit`; dropping without committing discards everything.
#[async_trait]
pub trait MergeTransaction: Send {
    /// Re-reads a contact inside the transaction, locking it against other merges.
    async fn lock_contact(&mut self, user_id: &UserId, contact_id: &ContactId)
        -> Result<Option<Contact>>;

    async fn interactions_for_contact(&mut self, contact_id: &ContactId)
        -> Result<Vec<Interaction>>;

    async fn interests_for_contact(&mut self, contact_id: &ContactId) -> Result<Vec<Interest>>;

    async fn persist_contact(&mut self, contact: &Contact) -> Result<()>;

    async fn persist_interaction(&mut self, interaction: &Interaction) -> Result<()>;

    async fn persist_interest(&mut self, interest: &Interest) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
