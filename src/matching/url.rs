// src/matching/url.rs

use url::Url;

/// Hosts and path prefixes recognized as professional-network profile URLs.
const PROFILE_HOSTS: [&str; 1] = ["linkedin.com"];
const PROFILE_PATH_PREFIXES: [&str; 2] = ["in", "pub"];

fn is_profile_host(host: &str) -> bool {
    let host = host.trim_start_matches("www.");
    PROFILE_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}

/// Profile slug from `linkedin.com/in/<slug>` or `linkedin.com/pub/<slug>`,
/// otherwise the lowercased, trimmed URL unchanged.
pub fn normalize_network_handle(url_s: &str) -> String {
    let lowered = url_s.trim().to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }

    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        lowered.clone()
    } else {
        format!("https://{}", lowered)
    };

    let Ok(parsed) = Url::parse(&with_scheme) else {
        return lowered;
    };
    let Some(host) = parsed.host_str() else {
        return lowered;
    };
    if !is_profile_host(host) {
        return lowered;
    }

    let mut segments = parsed.path_segments().into_iter().flatten();
    match (segments.next(), segments.next()) {
        (Some(prefix), Some(slug)) if PROFILE_PATH_PREFIXES.contains(&prefix) && !slug.is_empty() => {
            slug.to_string()
        }
        _ => lowered,
    }
}
