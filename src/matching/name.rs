// src/matching/name.rs

use strsim::normalized_levenshtein;

const NAME_PREFIXES: [&str; 5] = ["mr", "mrs", "ms", "dr", "prof"];
const NAME_SUFFIXES: [&str; 5] = ["jr", "sr", "ii", "iii", "iv"];
const CORPORATE_SUFFIXES: [&str; 5] = ["inc", "llc", "ltd", "corp", "co"];

fn is_listed(token: &str, list: &[&str]) -> bool {
    list.contains(&token.trim_end_matches('.'))
}

fn tokens(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(',').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Lowercases, collapses whitespace and drops leading honorifics
/// (Mr., Dr., Prof. ...) and trailing generational suffixes (Jr., III ...).
pub fn normalize_name(name: &str) -> String {
    let words = tokens(name);
    let mut start = 0;
    let mut end = words.len();
    while start < end && is_listed(&words[start], &NAME_PREFIXES) {
        start += 1;
    }
    while end > start && is_listed(&words[end - 1], &NAME_SUFFIXES) {
        end -= 1;
    }
    words[start..end].join(" ")
}

/// Lowercases and drops trailing corporate-suffix words ("Acme Widgets Inc."
/// becomes "acme widgets"). A single remaining word is always kept.
pub fn normalize_company(company: &str) -> String {
    let mut words = tokens(company);
    while words.len() > 1
        && words
            .last()
            .map_or(false, |w| is_listed(w, &CORPORATE_SUFFIXES))
    {
        words.pop();
    }
    words.join(" ")
}

/// Edit-distance similarity on a 0-100 scale.
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Best of the plain ratio and the ratio over alphabetically sorted tokens,
/// so "smith john" and "john smith" compare equal.
pub fn token_ratio(a: &str, b: &str) -> f64 {
    let sort = |s: &str| {
        let mut parts: Vec<&str> = s.split_whitespace().collect();
        parts.sort_unstable();
        parts.join(" ")
    };
    ratio(a, b).max(ratio(&sort(a), &sort(b)))
}

/// Best ratio of the shorter value against any run of the same number of
/// consecutive words in the longer one. "john" vs "john smith" scores 100.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let (short, long) = if words_a.len() <= words_b.len() {
        (words_a, words_b)
    } else {
        (words_b, words_a)
    };
    let needle = short.join(" ");
    long.windows(short.len())
        .map(|window| ratio(&needle, &window.join(" ")))
        .fold(ratio(a, b), f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_honorifics_and_suffixes() {
        assert_eq!(normalize_name("Dr. John Smith Jr."), "john smith");
        assert_eq!(normalize_name("  MRS   Jane   Doe III "), "jane doe");
        assert_eq!(normalize_name("Smith, Jr."), "smith");
        assert_eq!(normalize_name("Prof."), "");
    }

    #[test]
    fn keeps_honorific_words_in_the_middle() {
        assert_eq!(normalize_name("Ali Dr Ahmed"), "ali dr ahmed");
    }

    #[test]
    fn strips_trailing_corporate_suffixes() {
        assert_eq!(normalize_company("Acme Inc."), "acme");
        assert_eq!(normalize_company("Acme, LLC"), "acme");
        assert_eq!(normalize_company("Acme Co Inc"), "acme");
        assert_eq!(normalize_company("Inc. Magazine"), "inc. magazine");
        assert_eq!(normalize_company("Co"), "co");
    }

    #[test]
    fn normalizers_are_idempotent() {
        for raw in ["Dr. John Smith Jr.", "Mr. Mr. Bond", "  ", "Dr. Jr."] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "name {:?}", raw);
        }
        for raw in ["Acme Co Inc", "Acme, Inc.", "Co Ltd", "", "Big Corp. Holdings"] {
            let once = normalize_company(raw);
            assert_eq!(normalize_company(&once), once, "company {:?}", raw);
        }
    }

    #[test]
    fn token_ratio_ignores_word_order() {
        assert_eq!(token_ratio("smith john", "john smith"), 100.0);
        assert!(token_ratio("jon smith", "john smith") >= 85.0);
        assert!(token_ratio("alice walker", "bob jones") < 50.0);
    }

    #[test]
    fn partial_ratio_finds_first_name_inside_full_name() {
        assert_eq!(partial_ratio("john", "john smith"), 100.0);
        assert_eq!(partial_ratio("john smith", "john"), 100.0);
        assert!(partial_ratio("mary", "john smith") < 50.0);
        assert_eq!(partial_ratio("", "john"), 0.0);
    }
}
