use url::Url;

use crate::models::Settings;

/// Normalize a URL to the bare hostname used as the tracking/blocking key.
///
/// Strips scheme, path, query and a leading "www."; returns `None` for
/// anything that does not parse as a URL with a host (about:blank, raw text).
pub fn extract_domain(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// True iff some enabled tracked-domain entry is a substring of `domain`.
///
/// Substring match is intentional so subdomains and related TLDs match
/// ("old.reddit.com" matches "reddit.com"). It also over-matches: "x.com"
/// matches "xyz.com".
pub fn is_tracked(domain: &str, settings: &Settings) -> bool {
    settings
        .tracked_domains
        .iter()
        .any(|entry| entry.enabled && domain.contains(&entry.domain))
}
