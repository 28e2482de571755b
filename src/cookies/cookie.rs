//! A single parsed cookie, and the shapes [`CookieJar::update`](super::CookieJar::update)
//! accepts it in.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// `SameSite` attribute, normalized to the three legal values. Anything
/// else observed on the wire is treated as absent rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A cookie as held by the jar and (de)serialized for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Domain this cookie scopes to. Always populated: if the response
    /// that set it had no `Domain` attribute, this is the request host
    /// and `host_only` is `true`.
    pub domain: String,
    /// `true` if the cookie must match `domain` exactly rather than any
    /// subdomain of it (no explicit `Domain` attribute was present).
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// Wall-clock expiry. `None` means a session cookie that never
    /// expires on its own (it still loses to an explicit `update` that
    /// replaces it).
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,
}

impl Cookie {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|expiry| expiry <= now)
    }

    pub(crate) fn matches_domain(&self, host: &str) -> bool {
        if self.host_only {
            self.domain.eq_ignore_ascii_case(host)
        } else {
            host.eq_ignore_ascii_case(&self.domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", self.domain.to_ascii_lowercase()))
        }
    }

    pub(crate) fn matches_path(&self, path: &str) -> bool {
        path.starts_with(&self.path)
    }

    pub(crate) fn matches_scheme(&self, is_https: bool) -> bool {
        !self.secure || is_https
    }

    /// Identity used by `update`'s "later entry replaces earlier" rule.
    fn key(&self) -> (&str, &str, &str) {
        (&self.name, &self.domain, &self.path)
    }

    pub(crate) fn same_identity(&self, other: &Cookie) -> bool {
        self.key() == other.key()
    }
}

/// One of the shapes `CookieJar::update` accepts: an already-parsed
/// cookie, a bare name/value pair, or a raw `Set-Cookie` header string.
pub enum CookieSource {
    Cookie(Cookie),
    /// A bare name/value pair with no scoping information. Installed as
    /// a non-secure, non-host-only cookie scoped to `default_domain`
    /// and path `/` — used for caller-supplied default cookies that
    /// were never actually seen on the wire.
    NameValue {
        name: String,
        value: String,
        default_domain: String,
    },
    /// A raw `Set-Cookie` header value, parsed with `request_host` and
    /// `request_path` supplying the defaults for absent `Domain`/`Path`
    /// attributes.
    SetCookieHeader {
        header: String,
        request_host: String,
        request_path: String,
    },
}

impl CookieSource {
    /// Resolves this source into a concrete [`Cookie`], or `None` if the
    /// header was malformed. Parse failures are never raised to
    /// callers — the caller logs and drops them.
    pub(crate) fn resolve(self) -> Option<Cookie> {
        match self {
            CookieSource::Cookie(cookie) => Some(cookie),
            CookieSource::NameValue {
                name,
                value,
                default_domain,
            } => Some(Cookie {
                name,
                value,
                domain: default_domain,
                host_only: true,
                path: "/".to_string(),
                secure: false,
                http_only: false,
                same_site: None,
                expires: None,
            }),
            CookieSource::SetCookieHeader {
                header,
                request_host,
                request_path,
            } => parse_set_cookie(&header, &request_host, &request_path),
        }
    }
}

fn parse_set_cookie(header: &str, request_host: &str, request_path: &str) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        domain: request_host.to_string(),
        host_only: true,
        path: request_path.to_string(),
        secure: false,
        http_only: false,
        same_site: None,
        expires: None,
    };

    for attr in parts {
        let attr = attr.trim();
        if let Some((k, v)) = attr.split_once('=') {
            let v = v.trim();
            match k.trim().to_ascii_lowercase().as_str() {
                "domain" => {
                    let domain = v.trim_start_matches('.');
                    if !domain.is_empty() {
                        cookie.domain = domain.to_ascii_lowercase();
                        cookie.host_only = false;
                    }
                }
                "path" => {
                    if !v.is_empty() {
                        cookie.path = v.to_string();
                    }
                }
                "expires" => {
                    if let Ok(parsed) = parse_http_date(v) {
                        cookie.expires = Some(parsed);
                    } else {
                        log::debug!("cookie {name}: unparseable Expires value {v:?}, treating as session cookie");
                    }
                }
                "max-age" => {
                    if let Ok(seconds) = v.parse::<i64>() {
                        cookie.expires = Some(OffsetDateTime::now_utc() + time::Duration::seconds(seconds));
                    }
                }
                "samesite" => {
                    cookie.same_site = match v.to_ascii_lowercase().as_str() {
                        "strict" => Some(SameSite::Strict),
                        "lax" => Some(SameSite::Lax),
                        "none" => Some(SameSite::None),
                        _ => None,
                    };
                }
                _ => {}
            }
        } else {
            match attr.to_ascii_lowercase().as_str() {
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }
    }

    if cookie.path.is_empty() {
        cookie.path = "/".to_string();
    }

    Some(cookie)
}

fn parse_http_date(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    use time::format_description::well_known::Rfc2822;
    OffsetDateTime::parse(value, &Rfc2822)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_set_cookie() {
        let cookie = parse_set_cookie("session=abc123; Path=/app; HttpOnly", "h.example", "/x")
            .unwrap();
        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.http_only);
        assert_eq!(cookie.domain, "h.example");
        assert!(cookie.host_only);
    }

    #[test]
    fn explicit_domain_clears_host_only() {
        let cookie = parse_set_cookie("a=1; Domain=.example.com", "sub.example.com", "/").unwrap();
        assert_eq!(cookie.domain, "example.com");
        assert!(!cookie.host_only);
    }

    #[test]
    fn malformed_header_yields_none() {
        assert!(parse_set_cookie("not-a-cookie-at-all", "h", "/").is_none());
    }

    #[test]
    fn unparseable_expires_falls_back_to_session_cookie() {
        let cookie = parse_set_cookie("a=1; Expires=not-a-date", "h", "/").unwrap();
        assert!(cookie.expires.is_none());
    }

    #[test]
    fn max_age_produces_an_expiry_in_the_future() {
        let cookie = parse_set_cookie("a=1; Max-Age=3600", "h", "/").unwrap();
        assert!(cookie.expires.unwrap() > OffsetDateTime::now_utc());
    }
}
