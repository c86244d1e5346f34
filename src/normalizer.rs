//! Canonical comparison keys for loosely formatted URLs.
//!
//! The key is `host + path [+ ? + query]`: scheme, `www.`, default ports,
//! tracking parameters, fragments and trailing slashes are all dropped so that
//! the many spellings an LLM produces for one page collapse together.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("SCHEME_RE should compile"));

/// Query keys starting with any of these are dropped.
const TRACKING_PREFIXES: [&str; 6] = ["utm_", "fbclid", "gclid", "mc_cid", "mc_eid", "vero_id"];

/// Corporate domain variants folded onto one canonical host.
const HOST_ALIASES: &[(&str, &str)] = &[("agfa.com", "agfahealthcare.com")];

const DEFAULT_PORTS: [u16; 2] = [80, 443];

/// Upper bound on re-normalizing a key until it stops changing.
const MAX_PASSES: usize = 8;

/// Map any URL-like string to its canonical key. Never fails: input that
/// cannot be parsed comes back cleaned but otherwise untouched.
///
/// The result is a fixed point: `normalize(&normalize(x)) == normalize(x)`.
/// Dropping a fragment or trailing `/` can expose punctuation that one pass
/// would not strip, so the key is run through again until it is stable.
pub fn normalize(raw: &str) -> String {
    let mut key = normalize_once(raw);
    for _ in 0..MAX_PASSES {
        let next = normalize_once(&key);
        if next == key {
            break;
        }
        key = next;
    }
    key
}

fn normalize_once(raw: &str) -> String {
    let cleaned = strip_decorations(raw);
    let candidate = if has_scheme(cleaned) {
        cleaned.to_string()
    } else {
        format!("http://{cleaned}")
    };

    let parsed = match Url::parse(&candidate) {
        Ok(parsed) => parsed,
        Err(_) => {
            let fallback = candidate.replace(['[', ']'], "");
            let Ok(parsed) = Url::parse(&fallback) else {
                return fallback;
            };
            parsed
        }
    };

    canonical_key(&parsed)
}

/// Trim whitespace, markdown emphasis wrappers and punctuation that tends to
/// trail a link in prose.
fn strip_decorations(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches(['*', '_'])
        .trim_end_matches(['*', '_'])
        .trim_end_matches([')', '.', ',', ';'])
}

fn has_scheme(candidate: &str) -> bool {
    SCHEME_RE.is_match(candidate)
}

fn canonical_key(parsed: &Url) -> String {
    let mut key = canonical_host(parsed);
    key.push_str(&canonical_path(parsed.path()));

    if let Some(query) = parsed.query() {
        let kept = strip_tracking(query);
        if !kept.is_empty() {
            key.push('?');
            key.push_str(&kept);
        }
    }

    key
}

fn canonical_host(parsed: &Url) -> String {
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = HOST_ALIASES
        .iter()
        .find(|(alias, _)| *alias == host)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(host);

    match parsed.port() {
        Some(port) if !DEFAULT_PORTS.contains(&port) => format!("{host}:{port}"),
        _ => host.to_string(),
    }
}

fn canonical_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(ch);
    }
    if collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed.to_lowercase()
}

/// Drop tracking pairs, keeping the rest in their original order.
fn strip_tracking(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .filter(|(key, _)| !TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
        .map(|(key, value)| {
            if value.is_empty() {
                key.to_string()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
