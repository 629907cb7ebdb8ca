// src/matching/normalizer.rs

use crate::matching::email::{email_domain, normalize_email};
use crate::matching::name::{normalize_company, normalize_name};
use crate::matching::phone::normalize_phone;
use crate::matching::url::normalize_network_handle;
use crate::models::core::Contact;
use crate::models::matching::NormalizedContact;

/// Builds the comparable view of a contact.
#[derive(Debug, Clone)]
pub struct ContactNormalizer {
    default_region: String,
}

impl ContactNormalizer {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
        }
    }

    pub fn normalize(&self, contact: &Contact, interaction_count: u32) -> NormalizedContact {
        let field = |v: &Option<String>| v.as_deref().unwrap_or("").to_string();

        let email = normalize_email(&field(&contact.email));
        let first_name = normalize_name(&field(&contact.first_name));
        let last_name = normalize_name(&field(&contact.last_name));
        let mut name = normalize_name(&field(&contact.full_name));
        if name.is_empty() {
            name = [first_name.as_str(), last_name.as_str()]
                .iter()
                .filter(|p| !p.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
        }

        NormalizedContact {
            contact_id: contact.id.clone(),
            email_domain: email_domain(&email),
            email,
            phone: normalize_phone(&field(&contact.phone), &self.default_region),
            name,
            first_name,
            last_name,
            company: normalize_company(&field(&contact.company)),
            network_handle: normalize_network_handle(&field(&contact.network_profile_url)),
            source: contact.contact_source,
            relationship_strength: contact.relationship_strength,
            last_interaction_at: contact.last_interaction_at,
            interaction_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::{ContactId, UserId};
    use chrono::Utc;

    #[test]
    fn composes_name_from_parts_when_full_name_missing() {
        let mut contact = Contact::new(
            ContactId::new("c1"),
            UserId::new("u1"),
            Utc::now().naive_utc(),
        );
        contact.first_name = Some("Jane".into());
        contact.last_name = Some("Doe".into());
        contact.email = Some("Jane.Doe+crm@gmail.com".into());

        let normalized = ContactNormalizer::new("US").normalize(&contact, 3);
        assert_eq!(normalized.name, "jane doe");
        assert_eq!(normalized.email, "janedoe@gmail.com");
        assert_eq!(normalized.email_domain, "gmail.com");
        assert_eq!(normalized.phone, "");
        assert_eq!(normalized.interaction_count, 3);
    }
}
