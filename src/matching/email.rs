// src/matching/email.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::name::ratio;

static LOCAL_PART_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[._0-9]").expect("valid local-part pattern"));

/// Lowercases and trims an address. For gmail.com the local part has its
/// dots removed and any `+alias` suffix dropped.
pub fn normalize_email(email: &str) -> String {
    let email_trimmed = email.trim().to_lowercase();
    let Some((local_part, domain_part)) = email_trimmed.split_once('@') else {
        return email_trimmed;
    };
    if domain_part != "gmail.com" {
        return email_trimmed;
    }

    let local_no_plus = local_part.split('+').next().unwrap_or("");
    let final_local = local_no_plus.replace('.', "");
    if final_local.is_empty() {
        // nothing left to identify the mailbox
        String::new()
    } else {
        format!("{}@{}", final_local, domain_part)
    }
}

/// Domain of an already-normalized email, empty if there is none.
pub fn email_domain(normalized_email: &str) -> String {
    normalized_email
        .split_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default()
}

fn local_part(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}

/// Similarity (0-100) of two addresses' local parts once dots, underscores
/// and digits are removed. Identical cleaned parts score 90. `None` when
/// either cleaned part is empty.
pub fn local_part_similarity(email_a: &str, email_b: &str) -> Option<f64> {
    let clean_a = LOCAL_PART_NOISE.replace_all(local_part(email_a), "");
    let clean_b = LOCAL_PART_NOISE.replace_all(local_part(email_b), "");
    if clean_a.is_empty() || clean_b.is_empty() {
        return None;
    }
    if clean_a == clean_b {
        Some(90.0)
    } else {
        Some(ratio(&clean_a, &clean_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmail_aliases_fold_together() {
        assert_eq!(
            normalize_email("john.doe+newsletter@gmail.com"),
            normalize_email("johndoe@gmail.com")
        );
        assert_eq!(normalize_email(" J.Doe+x@Gmail.com "), "jdoe@gmail.com");
    }

    #[test]
    fn other_domains_keep_dots_and_plus() {
        assert_eq!(
            normalize_email("John.Doe+work@Example.com"),
            "john.doe+work@example.com"
        );
    }

    #[test]
    fn malformed_input_degrades_gracefully() {
        assert_eq!(normalize_email(""), "");
        assert_eq!(normalize_email("   "), "");
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
        assert_eq!(normalize_email("+only@gmail.com"), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "john.doe+newsletter@gmail.com",
            "A.B@Example.org",
            "weird@@gmail.com",
            "no-at-sign",
            "",
        ] {
            let once = normalize_email(raw);
            assert_eq!(normalize_email(&once), once, "input {:?}", raw);
        }
    }

    #[test]
    fn local_part_similarity_ignores_separators_and_digits() {
        assert_eq!(
            local_part_similarity("john_doe1@acme.com", "john.doe@other.org"),
            Some(90.0)
        );
        assert_eq!(local_part_similarity("123@acme.com", "john@acme.com"), None);
        let score = local_part_similarity("jonathan@a.com", "johnathan@b.com").unwrap();
        assert!(score > 70.0 && score < 90.0);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(email_domain("jdoe@acme.com"), "acme.com");
        assert_eq!(email_domain("no-domain"), "");
    }
}
