//! Address normalization
//!
//! Policy:
//! - Addresses without a scheme are read as `https://`.
//! - Only `http` and `https` addresses are gateable; anything else yields `None`.
//! - The key is `host[:port]` + path (trailing `/` removed) + `?query` when present.
//!   Fragments are dropped.
//! - Leading `www.` labels are removed as long as a dotted name remains.

use std::borrow::Cow;
use std::net::IpAddr;

use url::Url;

/// Second-level labels that sit under a two-letter country suffix
/// (`co.uk`, `com.au`, `ne.jp`).
const GENERIC_SECOND_LEVEL: &[&str] = &[
    "co", "com", "net", "org", "gov", "edu", "ac", "or", "ne", "go",
];

/// Parse an address into a gateable URL
pub fn parse_address(address: &str) -> Option<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate: Cow<'_, str> = if has_scheme(trimmed) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("https://{}", trimmed))
    };

    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return None,
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

/// A `scheme://` prefix, not a `://` inside the path, query or fragment
fn has_scheme(address: &str) -> bool {
    address
        .find("://")
        .is_some_and(|idx| !address[..idx].contains(['/', '?', '#']))
}

/// Comparison key for an address, or `None` if it cannot be gated.
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(address: &str) -> Option<String> {
    let url = parse_address(address)?;

    let mut key = host_with_port(&url)?;
    key.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }

    Some(key)
}

/// Lowercased host with `www.` removed, plus a non-default port
pub fn canonical_host(url: &Url) -> Option<String> {
    host_with_port(url)
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    let mut host = host.as_str();

    while let Some(rest) = host.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        host = rest;
    }

    if host.is_empty() {
        return None;
    }

    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Fold regional suffix variants of one name together.
///
/// The top-level label is removed, and a generic second-level label under a
/// two-letter country suffix goes with it: `facebook.com`, `facebook.se` and
/// `facebook.co.uk` all fold to `facebook`. IP literals and single-label hosts
/// are returned unchanged. A `:port` suffix is kept.
pub fn fold_suffix(host: &str) -> String {
    let (name, port) = split_port(host);

    if is_ip_literal(name) || !name.contains('.') {
        return host.to_string();
    }

    let mut labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return host.to_string();
    }

    let tld = labels.pop().unwrap_or_default();
    if tld.len() == 2 && labels.len() >= 2 {
        if let Some(second) = labels.last() {
            if GENERIC_SECOND_LEVEL.contains(second) {
                labels.pop();
            }
        }
    }

    let mut folded = labels.join(".");
    if let Some(port) = port {
        folded.push(':');
        folded.push_str(port);
    }
    folded
}

fn split_port(host: &str) -> (&str, Option<&str>) {
    if host.starts_with('[') {
        // [v6]:port
        return match host.rfind("]:") {
            Some(idx) => (&host[..=idx], Some(&host[idx + 2..])),
            None => (host, None),
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => (name, Some(port)),
        _ => (host, None),
    }
}

fn is_ip_literal(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok()
}
