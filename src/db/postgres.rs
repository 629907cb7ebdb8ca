// src/db/postgres.rs

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::PooledConnection;
use bb8_postgres::PostgresConnectionManager;
use log::{debug, info, warn};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use crate::db::{ContactRepository, MergeTransaction};
use crate::models::core::{Contact, ContactId, ContactSource, Interaction, Interest, UserId};
use crate::utils::db_connect::PgPool;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS contacts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        full_name TEXT,
        first_name TEXT,
        last_name TEXT,
        company TEXT,
        job_title TEXT,
        location TEXT,
        network_profile_url TEXT,
        relationship_strength DOUBLE PRECISION NOT NULL DEFAULT 0,
        last_interaction_at TIMESTAMP,
        interaction_frequency TEXT,
        contact_source TEXT NOT NULL DEFAULT 'unknown',
        tags TEXT[] NOT NULL DEFAULT '{}',
        notes TEXT,
        bio TEXT,
        avatar_url TEXT,
        is_archived BOOLEAN NOT NULL DEFAULT FALSE,
        merged_into_id TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP NOT NULL DEFAULT NOW()
    );
    CREATE INDEX IF NOT EXISTS idx_contacts_user_active ON contacts (user_id, is_archived);

    CREATE TABLE IF NOT EXISTS interactions (
        id TEXT PRIMARY KEY,
        contact_id TEXT NOT NULL REFERENCES contacts(id),
        user_id TEXT NOT NULL,
        interaction_type TEXT NOT NULL,
        subject TEXT,
        occurred_at TIMESTAMP NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_interactions_contact ON interactions (contact_id);

    CREATE TABLE IF NOT EXISTS interests (
        id TEXT PRIMARY KEY,
        contact_id TEXT REFERENCES contacts(id),
        user_id TEXT NOT NULL,
        category TEXT NOT NULL,
        topic TEXT NOT NULL,
        confidence_score DOUBLE PRECISION NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    );
    CREATE INDEX IF NOT EXISTS idx_interests_contact ON interests (contact_id);
";

const CONTACT_COLUMNS: &str = "id, user_id, email, phone, full_name, first_name, last_name, \
    company, job_title, location, network_profile_url, relationship_strength, \
    last_interaction_at, interaction_frequency, contact_source, tags, notes, bio, avatar_url, \
    is_archived, merged_into_id, created_at, updated_at";

const UPSERT_CONTACT: &str = "
    INSERT INTO contacts (id, user_id, email, phone, full_name, first_name, last_name,
        company, job_title, location, network_profile_url, relationship_strength,
        last_interaction_at, interaction_frequency, contact_source, tags, notes, bio, avatar_url,
        is_archived, merged_into_id, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19,
        $20, $21, $22, $23)
    ON CONFLICT (id) DO UPDATE SET
        email = EXCLUDED.email,
        phone = EXCLUDED.phone,
        full_name = EXCLUDED.full_name,
        first_name = EXCLUDED.first_name,
        last_name = EXCLUDED.last_name,
        company = EXCLUDED.company,
        job_title = EXCLUDED.job_title,
        location = EXCLUDED.location,
        network_profile_url = EXCLUDED.network_profile_url,
        relationship_strength = EXCLUDED.relationship_strength,
        last_interaction_at = EXCLUDED.last_interaction_at,
        interaction_frequency = EXCLUDED.interaction_frequency,
        contact_source = EXCLUDED.contact_source,
        tags = EXCLUDED.tags,
        notes = EXCLUDED.notes,
        bio = EXCLUDED.bio,
        avatar_url = EXCLUDED.avatar_url,
        is_archived = EXCLUDED.is_archived,
        merged_into_id = EXCLUDED.merged_into_id,
        updated_at = EXCLUDED.updated_at";

const UPSERT_INTERACTION: &str = "
    INSERT INTO interactions (id, contact_id, user_id, interaction_type, subject, occurred_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (id) DO UPDATE SET contact_id = EXCLUDED.contact_id";

const UPSERT_INTEREST: &str = "
    INSERT INTO interests (id, contact_id, user_id, category, topic, confidence_score, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (id) DO UPDATE SET
        contact_id = EXCLUDED.contact_id,
        confidence_score = EXCLUDED.confidence_score";

fn contact_from_row(row: &Row) -> Result<Contact> {
    let tags: Vec<String> = row.try_get("tags").context("Contacts: bad tags column")?;
    let source: String = row.try_get("contact_source")?;
    let merged_into: Option<String> = row.try_get("merged_into_id")?;
    Ok(Contact {
        id: ContactId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        full_name: row.try_get("full_name")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        company: row.try_get("company")?,
        job_title: row.try_get("job_title")?,
        location: row.try_get("location")?,
        network_profile_url: row.try_get("network_profile_url")?,
        relationship_strength: row.try_get("relationship_strength")?,
        last_interaction_at: row.try_get("last_interaction_at")?,
        interaction_frequency: row.try_get("interaction_frequency")?,
        contact_source: ContactSource::from_str(&source),
        tags: tags.into_iter().collect::<BTreeSet<_>>(),
        notes: row.try_get("notes")?,
        bio: row.try_get("bio")?,
        avatar_url: row.try_get("avatar_url")?,
        is_archived: row.try_get("is_archived")?,
        merged_into_id: merged_into.map(ContactId),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn interaction_from_row(row: &Row) -> Result<Interaction> {
    Ok(Interaction {
        id: row.try_get("id")?,
        contact_id: ContactId(row.try_get("contact_id")?),
        user_id: UserId(row.try_get("user_id")?),
        interaction_type: row.try_get("interaction_type")?,
        subject: row.try_get("subject")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}

fn interest_from_row(row: &Row) -> Result<Interest> {
    let contact_id: Option<String> = row.try_get("contact_id")?;
    Ok(Interest {
        id: row.try_get("id")?,
        contact_id: contact_id.map(ContactId),
        user_id: UserId(row.try_get("user_id")?),
        category: row.try_get("category")?,
        topic: row.try_get("topic")?,
        confidence_score: row.try_get("confidence_score")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_contact(
    client: &Client,
    user_id: &UserId,
    contact_id: &ContactId,
    for_update: bool,
) -> Result<Option<Contact>> {
    let query = format!(
        "SELECT {} FROM contacts WHERE id = $1 AND user_id = $2{}",
        CONTACT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = client
        .query_opt(&query, &[&contact_id.0, &user_id.0])
        .await
        .context("Contacts: Failed to load contact")?;
    row.as_ref().map(contact_from_row).transpose()
}

async fn fetch_interactions(client: &Client, contact_id: &ContactId) -> Result<Vec<Interaction>> {
    let rows = client
        .query(
            "SELECT id, contact_id, user_id, interaction_type, subject, occurred_at
             FROM interactions WHERE contact_id = $1 ORDER BY occurred_at",
            &[&contact_id.0],
        )
        .await
        .context("Interactions: Failed to load interactions for contact")?;
    rows.iter().map(interaction_from_row).collect()
}

async fn fetch_interests(client: &Client, contact_id: &ContactId) -> Result<Vec<Interest>> {
    let rows = client
        .query(
            "SELECT id, contact_id, user_id, category, topic, confidence_score, created_at
             FROM interests WHERE contact_id = $1 ORDER BY created_at, id",
            &[&contact_id.0],
        )
        .await
        .context("Interests: Failed to load interests for contact")?;
    rows.iter().map(interest_from_row).collect()
}

/// `ContactRepository` over a bb8 pool of tokio-postgres connections.
#[derive(Clone)]
pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the contacts, interactions and interests tables if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .await
            .context("Schema: Failed to get DB connection")?;
        conn.batch_execute(SCHEMA)
            .await
            .context("Schema: Failed to create tables")?;
        info!("Contact deduplication schema is in place");
        Ok(())
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn load_contacts(&self, user_id: &UserId, exclude_archived: bool) -> Result<Vec<Contact>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Contacts: Failed to get DB connection")?;
        let query = format!(
            "SELECT {} FROM contacts WHERE user_id = $1 AND (NOT $2 OR is_archived = FALSE)
             ORDER BY created_at, id",
            CONTACT_COLUMNS
        );
        let rows = conn
            .query(&query, &[&user_id.0, &exclude_archived])
            .await
            .context("Contacts: Failed to load contacts for user")?;
        debug!("Loaded {} contacts for user {}", rows.len(), user_id);
        rows.iter().map(contact_from_row).collect()
    }

    async fn load_contact(
        &self,
        user_id: &UserId,
        contact_id: &ContactId,
    ) -> Result<Option<Contact>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Contacts: Failed to get DB connection")?;
        fetch_contact(&conn, user_id, contact_id, false).await
    }

    async fn load_interactions_for_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Vec<Interaction>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Interactions: Failed to get DB connection")?;
        fetch_interactions(&conn, contact_id).await
    }

    async fn load_interests_for_contact(&self, contact_id: &ContactId) -> Result<Vec<Interest>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Interests: Failed to get DB connection")?;
        fetch_interests(&conn, contact_id).await
    }

    async fn interaction_counts(&self, user_id: &UserId) -> Result<HashMap<ContactId, u32>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Interactions: Failed to get DB connection")?;
        let rows = conn
            .query(
                "SELECT contact_id, COUNT(*) AS n FROM interactions
                 WHERE user_id = $1 GROUP BY contact_id",
                &[&user_id.0],
            )
            .await
            .context("Interactions: Failed to count interactions")?;
        let mut counts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let contact_id: String = row.try_get("contact_id")?;
            let n: i64 = row.try_get("n")?;
            counts.insert(ContactId(contact_id), u32::try_from(n).unwrap_or(u32::MAX));
        }
        Ok(counts)
    }

    async fn purge_orphaned_interests(&self, user_id: &UserId) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Interests: Failed to get DB connection")?;
        conn.execute(
            "DELETE FROM interests WHERE contact_id IS NULL AND user_id = $1",
            &[&user_id.0],
        )
        .await
        .context("Interests: Failed to purge orphaned interests")
    }

    async fn begin(&self) -> Result<Box<dyn MergeTransaction>> {
        let conn = self
            .pool
            .get_owned()
            .await
            .context("Merge: Failed to get DB connection for transaction")?;
        conn.batch_execute("BEGIN")
            .await
            .context("Merge: Failed to begin transaction")?;
        Ok(Box::new(PgMergeTransaction { conn: Some(conn) }))
    }
}

type OwnedConn = PooledConnection<'static, PostgresConnectionManager<NoTls>>;

/// A merge transaction pinned to one pooled connection.
struct PgMergeTransaction {
    conn: Option<OwnedConn>,
}

impl PgMergeTransaction {
    fn client(&self) -> Result<&Client> {
        self.conn
            .as_deref()
            .context("Merge: transaction already finished")
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .context("Merge: transaction already finished")?;
        conn.batch_execute(statement)
            .await
            .with_context(|| format!("Merge: {} failed", statement))
    }
}

impl Drop for PgMergeTransaction {
    fn drop(&mut self) {
        // never hand a connection back to the pool mid-transaction
        if let Some(conn) = self.conn.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = conn.batch_execute("ROLLBACK").await {
                            warn!("Rollback of abandoned merge transaction failed: {}", e);
                        }
                    });
                }
                Err(_) => warn!("Merge transaction dropped outside a runtime; connection discarded"),
            }
        }
    }
}

#[async_trait]
impl MergeTransaction for PgMergeTransaction {
    async fn lock_contact(
        &mut self,
        user_id: &UserId,
        contact_id: &ContactId,
    ) -> Result<Option<Contact>> {
        fetch_contact(self.client()?, user_id, contact_id, true).await
    }

    async fn interactions_for_contact(
        &mut self,
        contact_id: &ContactId,
    ) -> Result<Vec<Interaction>> {
        fetch_interactions(self.client()?, contact_id).await
    }

    async fn interests_for_contact(&mut self, contact_id: &ContactId) -> Result<Vec<Interest>> {
        fetch_interests(self.client()?, contact_id).await
    }

    async fn persist_contact(&mut self, contact: &Contact) -> Result<()> {
        let tags: Vec<String> = contact.tags.iter().cloned().collect();
        let merged_into = contact.merged_into_id.as_ref().map(|id| id.0.clone());
        let source = contact.contact_source.as_str();
        let params: [&(dyn ToSql + Sync); 23] = [
            &contact.id.0,
            &contact.user_id.0,
            &contact.email,
            &contact.phone,
            &contact.full_name,
            &contact.first_name,
            &contact.last_name,
            &contact.company,
            &contact.job_title,
            &contact.location,
            &contact.network_profile_url,
            &contact.relationship_strength,
            &contact.last_interaction_at,
            &contact.interaction_frequency,
            &source,
            &tags,
            &contact.notes,
            &contact.bio,
            &contact.avatar_url,
            &contact.is_archived,
            &merged_into,
            &contact.created_at,
            &contact.updated_at,
        ];
        self.client()?
            .execute(UPSERT_CONTACT, &params)
            .await
            .with_context(|| format!("Merge: Failed to persist contact {}", contact.id))?;
        Ok(())
    }

    async fn persist_interaction(&mut self, interaction: &Interaction) -> Result<()> {
        self.client()?
            .execute(
                UPSERT_INTERACTION,
                &[
                    &interaction.id,
                    &interaction.contact_id.0,
                    &interaction.user_id.0,
                    &interaction.interaction_type,
                    &interaction.subject,
                    &interaction.occurred_at,
                ],
            )
            .await
            .with_context(|| format!("Merge: Failed to persist interaction {}", interaction.id))?;
        Ok(())
    }

    async fn persist_interest(&mut self, interest: &Interest) -> Result<()> {
        let contact_id = interest.contact_id.as_ref().map(|id| id.0.clone());
        self.client()?
            .execute(
                UPSERT_INTEREST,
                &[
                    &interest.id,
                    &contact_id,
                    &interest.user_id.0,
                    &interest.category,
                    &interest.topic,
                    &interest.confidence_score,
                    &interest.created_at,
                ],
            )
            .await
            .with_context(|| format!("Merge: Failed to persist interest {}", interest.id))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}
