// src/db/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{ContactRepository, MergeTransaction};
use crate::models::core::{Contact, ContactId, Interaction, Interest, UserId};

/// Operation at which an in-memory transaction should fail, for exercising
/// rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    PersistContact,
    PersistInteraction,
    PersistInterest,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    contacts: BTreeMap<ContactId, Contact>,
    interactions: BTreeMap<String, Interaction>,
    interests: BTreeMap<String, Interest>,
    fail_point: Option<FailPoint>,
}

impl MemoryState {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            bail!("injected failure at {:?}", point);
        }
        Ok(())
    }

    fn contact_for_user(&self, user_id: &UserId, contact_id: &ContactId) -> Option<Contact> {
        self.contacts
            .get(contact_id)
            .filter(|c| &c.user_id == user_id)
            .cloned()
    }

    fn interactions_for(&self, contact_id: &ContactId) -> Vec<Interaction> {
        self.interactions
            .values()
            .filter(|i| &i.contact_id == contact_id)
            .cloned()
            .collect()
    }

    fn interests_for(&self, contact_id: &ContactId) -> Vec<Interest> {
        self.interests
            .values()
            .filter(|i| i.contact_id.as_ref() == Some(contact_id))
            .cloned()
            .collect()
    }
}

/// Process-local repository. Merges are serialized: a transaction holds the
/// store lock from `begin` until it commits, rolls back or is dropped.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.state
            .lock()
            .await
            .contacts
            .insert(contact.id.clone(), contact);
    }

    pub async fn insert_interaction(&self, interaction: Interaction) {
        self.state
            .lock()
            .await
            .interactions
            .insert(interaction.id.clone(), interaction);
    }

    pub async fn insert_interest(&self, interest: Interest) {
        self.state
            .lock()
            .await
            .interests
            .insert(interest.id.clone(), interest);
    }

    /// Looks a contact up regardless of owner or archive state.
    pub async fn get_contact(&self, contact_id: &ContactId) -> Option<Contact> {
        self.state.lock().await.contacts.get(contact_id).cloned()
    }

    pub async fn all_interactions(&self) -> Vec<Interaction> {
        self.state.lock().await.interactions.values().cloned().collect()
    }

    pub async fn all_interests(&self) -> Vec<Interest> {
        self.state.lock().await.interests.values().cloned().collect()
    }

    /// Makes every later transaction fail at `point` until cleared with `None`.
    pub async fn inject_failure(&self, point: Option<FailPoint>) {
        self.state.lock().await.fail_point = point;
    }
}

#[async_trait]
impl ContactRepository for InMemoryRepository {
    async fn load_contacts(&self, user_id: &UserId, exclude_archived: bool) -> Result<Vec<Contact>> {
        let state = self.state.lock().await;
        Ok(state
            .contacts
            .values()
            .filter(|c| &c.user_id == user_id && !(exclude_archived && c.is_archived))
            .cloned()
            .collect())
    }

    async fn load_contact(
        &self,
        user_id: &UserId,
        contact_id: &ContactId,
    ) -> Result<Option<Contact>> {
        Ok(self.state.lock().await.contact_for_user(user_id, contact_id))
    }

    async fn load_interactions_for_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Vec<Interaction>> {
        Ok(self.state.lock().await.interactions_for(contact_id))
    }

    async fn load_interests_for_contact(&self, contact_id: &ContactId) -> Result<Vec<Interest>> {
        Ok(self.state.lock().await.interests_for(contact_id))
    }

    async fn interaction_counts(&self, user_id: &UserId) -> Result<HashMap<ContactId, u32>> {
        let state = self.state.lock().await;
        let mut counts = HashMap::new();
        for interaction in state.interactions.values().filter(|i| &i.user_id == user_id) {
            *counts.entry(interaction.contact_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn purge_orphaned_interests(&self, user_id: &UserId) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.interests.len();
        state
            .interests
            .retain(|_, i| !(i.is_orphaned() && &i.user_id == user_id));
        Ok((before - state.interests.len()) as u64)
    }

    async fn begin(&self) -> Result<Box<dyn MergeTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl MergeTransaction for InMemoryTransaction {
    async fn lock_contact(
        &mut self,
        user_id: &UserId,
        contact_id: &ContactId,
    ) -> Result<Option<Contact>> {
        Ok(self.staged.contact_for_user(user_id, contact_id))
    }

    async fn interactions_for_contact(
        &mut self,
        contact_id: &ContactId,
    ) -> Result<Vec<Interaction>> {
        Ok(self.staged.interactions_for(contact_id))
    }

    async fn interests_for_contact(&mut self, contact_id: &ContactId) -> Result<Vec<Interest>> {
        Ok(self.staged.interests_for(contact_id))
    }

    async fn persist_contact(&mut self, contact: &Contact) -> Result<()> {
        self.staged.check(FailPoint::PersistContact)?;
        self.staged
            .contacts
            .insert(contact.id.clone(), contact.clone());
        Ok(())
    }

    async fn persist_interaction(&mut self, interaction: &Interaction) -> Result<()> {
        self.staged.check(FailPoint::PersistInteraction)?;
        self.staged
            .interactions
            .insert(interaction.id.clone(), interaction.clone());
        Ok(())
    }

    async fn persist_interest(&mut self, interest: &Interest) -> Result<()> {
        self.staged.check(FailPoint::PersistInterest)?;
        self.staged
            .interests
            .insert(interest.id.clone(), interest.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.staged.check(FailPoint::Commit)?;
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // staged writes are dropped with the transaction
        Ok(())
    }
}
