//! The cookie jar held by a [`crate::client::Client`].
//!
//! One flat bucket of cookies per `Client`, matched against a URL by
//! domain, path, and scheme, and filtered against wall-clock expiry.

use std::collections::HashMap;

use http::{HeaderMap, header::SET_COOKIE};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use super::cookie::{Cookie, CookieSource};

/// A set of cookies indexed for domain/path matching.
///
/// Invariant: `for_url` yields at most one cookie per name for a given
/// URL — `update` enforces this by replacing, rather than appending,
/// any existing cookie with the same (name, domain, path) identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieJar {
    entries: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `sources` into the jar. Returns the cookies that were
    /// actually installed (malformed sources are silently dropped, per
    /// the crate's cookie-parse error handling).
    ///
    /// Later entries in `sources` with the same (name, domain, path)
    /// replace earlier ones already in the jar.
    pub fn update<I>(&mut self, sources: I) -> Vec<Cookie>
    where
        I: IntoIterator<Item = CookieSource>,
    {
        let mut installed = Vec::new();
        for source in sources {
            let Some(cookie) = source.resolve() else {
                continue;
            };
            self.entries.retain(|existing| !existing.same_identity(&cookie));
            self.entries.push(cookie.clone());
            installed.push(cookie);
        }
        installed
    }

    /// Parses every `Set-Cookie` header in `headers` against `url` and
    /// merges the results, returning the cookies installed.
    pub fn update_from_response_headers(&mut self, url: &Url, headers: &HeaderMap) -> Vec<Cookie> {
        let request_host = url.host_str().unwrap_or_default().to_string();
        let request_path = default_path_for(url.path());
        let sources = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(|header| CookieSource::SetCookieHeader {
                header: header.to_string(),
                request_host: request_host.clone(),
                request_path: request_path.clone(),
            })
            .collect::<Vec<_>>();
        self.update(sources)
    }

    /// The applicable cookie subset for `url`: matching domain and
    /// path, not expired, and (for `Secure` cookies) only over HTTPS.
    pub fn for_url(&self, url: &Url) -> HashMap<String, String> {
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let is_https = url.scheme() == "https";
        let now = OffsetDateTime::now_utc();

        self.entries
            .iter()
            .filter(|c| !c.is_expired(now))
            .filter(|c| c.matches_domain(host))
            .filter(|c| c.matches_path(path))
            .filter(|c| c.matches_scheme(is_https))
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    /// Full enumeration of every cookie currently held, expired or not.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn deep_clone(&self) -> CookieJar {
        self.clone()
    }

    /// Drops cookies whose expiry has passed. Not required by any
    /// invariant on its own (`for_url` already filters expired
    /// cookies), but keeps a long-lived jar from growing unboundedly.
    pub fn prune_expired(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.entries.retain(|c| !c.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_path_for(request_path: &str) -> String {
    match request_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_value(name: &str, value: &str, domain: &str) -> CookieSource {
        CookieSource::NameValue {
            name: name.to_string(),
            value: value.to_string(),
            default_domain: domain.to_string(),
        }
    }

    #[test]
    fn for_url_yields_at_most_one_cookie_per_name() {
        let mut jar = CookieJar::new();
        jar.update([name_value("a", "1", "h")]);
        jar.update([name_value("a", "2", "h")]);

        let url: Url = "http://h/p".parse().unwrap();
        let cookies = jar.for_url(&url);
        assert_eq!(cookies.get("a"), Some(&"2".to_string()));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn secure_cookie_not_sent_over_plain_http() {
        let mut jar = CookieJar::new();
        jar.update([CookieSource::Cookie(Cookie {
            name: "s".to_string(),
            value: "1".to_string(),
            domain: "h".to_string(),
            host_only: true,
            path: "/".to_string(),
            secure: true,
            http_only: false,
            same_site: None,
            expires: None,
        })]);

        let http_url: Url = "http://h/p".parse().unwrap();
        let https_url: Url = "https://h/p".parse().unwrap();
        assert!(jar.for_url(&http_url).is_empty());
        assert!(jar.for_url(&https_url).contains_key("s"));
    }

    #[test]
    fn expired_cookie_is_excluded() {
        let mut jar = CookieJar::new();
        jar.update([CookieSource::Cookie(Cookie {
            name: "old".to_string(),
            value: "1".to_string(),
            domain: "h".to_string(),
            host_only: true,
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
            expires: Some(OffsetDateTime::now_utc() - time::Duration::days(1)),
        })]);

        let url: Url = "http://h/p".parse().unwrap();
        assert!(jar.for_url(&url).is_empty());
    }

    #[test]
    fn non_host_only_cookie_matches_subdomains() {
        let mut jar = CookieJar::new();
        jar.update_from_response_headers(
            &"https://www.example.com/".parse().unwrap(),
            &{
                let mut h = HeaderMap::new();
                h.append(SET_COOKIE, "a=1; Domain=.example.com".parse().unwrap());
                h
            },
        );

        let sub: Url = "https://accounts.example.com/login".parse().unwrap();
        assert_eq!(jar.for_url(&sub).get("a"), Some(&"1".to_string()));
    }

    #[test]
    fn deep_clone_is_independent() {
        let mut jar = CookieJar::new();
        jar.update([name_value("a", "1", "h")]);
        let clone = jar.deep_clone();
        jar.clear();
        assert!(jar.is_empty());
        assert_eq!(clone.len(), 1);
    }
}
