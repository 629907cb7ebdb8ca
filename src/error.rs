// src/error.rs

use thiserror::Error;

use crate::models::core::{ContactId, UserId};

/// Caller-visible failures of the deduplication engine.
///
/// Unresolved merge conflicts and mid-merge transaction failures are not
/// errors: they come back as a failed `MergeResult`.
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("contact {contact_id} not found for user {user_id}")]
    ContactNotFound {
        user_id: UserId,
        contact_id: ContactId,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid resolution '{value}' for field '{field}'")]
    InvalidResolution { field: String, value: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl DedupError {
    pub fn not_found(user_id: &UserId, contact_id: &ContactId) -> Self {
        DedupError::ContactNotFound {
            user_id: user_id.clone(),
            contact_id: contact_id.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DedupError::ContactNotFound { .. })
    }
}
