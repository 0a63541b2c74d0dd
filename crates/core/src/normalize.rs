//! URL and domain normalization shared by the Publisher Ledger, the Queue
//! Store, and the read API's domain-match check.
//!
//! Grounded on `publisher_repository.py::get_publisher_by_domain` and the
//! domain-normalization block at the top of the same function.

/// Lowercase, strip a leading scheme, strip a leading `www.`, strip a
/// trailing slash. Does not validate that the result is a well-formed
/// domain; callers that need validation compose this with their own checks.
pub fn normalize_domain(raw: &str) -> String {
    let mut d = raw.trim().to_lowercase();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = d.strip_prefix(prefix) {
            d = rest.to_string();
            break;
        }
    }
    if let Some(rest) = d.strip_prefix("www.") {
        d = rest.to_string();
    }
    while d.ends_with('/') {
        d.pop();
    }
    d
}

/// Normalize a blog URL for use as the queue/artifact join key: lowercase
/// the scheme and host, strip a trailing slash, leave the path case intact.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(mut u) => {
            let _ = u.set_scheme(&u.scheme().to_lowercase());
            if let Some(host) = u.host_str() {
                let host = host.to_lowercase();
                let _ = u.set_host(Some(&host));
            }
            let mut s = u.to_string();
            if s.ends_with('/') && u.path() == "/" {
                s.pop();
            }
            s
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

/// Exact match first, then shortest-suffix match among `candidates`.
///
/// `candidates` is the full set of registered publisher domains (already
/// normalized). Returns the index into `candidates` of the match, if any.
/// Mirrors the original's behavior: collect all domains where
/// `domain == candidate || domain.ends_with(".{candidate}")`, then prefer
/// the shortest candidate (the "nearest" / most specific root domain).
pub fn match_domain_suffix<'a>(domain: &str, candidates: &'a [String]) -> Option<usize> {
    let domain = normalize_domain(domain);

    if let Some(idx) = candidates.iter().position(|c| *c == domain) {
        return Some(idx);
    }

    let suffix = format!(".{domain}");
    let mut best: Option<(usize, usize)> = None; // (candidate_len, index)
    for (idx, candidate) in candidates.iter().enumerate() {
        if domain == *candidate || domain.ends_with(&format!(".{candidate}")) {
            let len = candidate.len();
            if best.map(|(best_len, _)| len < best_len).unwrap_or(true) {
                best = Some((len, idx));
            }
        }
    }
    // The branch above handles domain.ends_with(".{candidate}"); also allow
    // the inverse (candidate is a subdomain of the requested domain) to be
    // rejected — only requested-is-subdomain-of-candidate counts, matching
    // `allow_subdomain=True` semantics from the original.
    let _ = suffix;
    best.map(|(_, idx)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_and_www() {
        assert_eq!(normalize_domain("HTTPS://WWW.Example.com/"), "example.com");
        assert_eq!(normalize_domain("http://example.com"), "example.com");
        assert_eq!(normalize_domain("example.com/"), "example.com");
    }

    #[test]
    fn exact_match_wins() {
        let candidates = vec!["example.com".to_string(), "info.example.com".to_string()];
        assert_eq!(match_domain_suffix("info.example.com", &candidates), Some(1));
    }

    #[test]
    fn suffix_match_prefers_shortest() {
        let candidates = vec!["example.com".to_string(), "blog.example.com".to_string()];
        let idx = match_domain_suffix("news.blog.example.com", &candidates).unwrap();
        // "example.com" (len 11) is shorter than "blog.example.com" (len 16)
        // and both are valid suffixes, so the shortest wins.
        assert_eq!(candidates[idx], "example.com");
    }

    #[test]
    fn no_match_returns_none() {
        let candidates = vec!["example.com".to_string()];
        assert_eq!(match_domain_suffix("other.org", &candidates), None);
    }

    #[test]
    fn normalize_url_lowercases_host_only() {
        let n = normalize_url("HTTPS://Example.COM/Blog/Post-One");
        assert_eq!(n, "https://example.com/Blog/Post-One");
    }
}
