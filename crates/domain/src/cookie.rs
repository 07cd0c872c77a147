//! Cookie jar types.
//!
//! Cookies are keyed by `(domain, path, name)`. The jar keeps insertion
//! order and never expires entries on its own.

use serde::{Deserialize, Serialize};

/// A single stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Domain the cookie belongs to, without a leading dot.
    pub domain: String,
    /// Path prefix the cookie applies to.
    #[serde(default = "default_path")]
    pub path: String,
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Creates a cookie scoped to `domain` with path `/`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            domain: normalize_domain(&domain.into()),
            path: default_path(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Sets the path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns true if this cookie should be sent to `host` + `path`.
    ///
    /// The cookie domain must equal the host or be a dot-separated suffix
    /// of it, and the cookie path must prefix the request path.
    #[must_use]
    pub fn matches(&self, host: &str, path: &str) -> bool {
        domain_matches(&self.domain, host) && path.starts_with(&self.path)
    }

    /// Returns true if both cookies share the `(domain, path, name)` key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.domain == other.domain && self.path == other.path && self.name == other.name
    }

    /// Format as a `name=value` pair.
    #[must_use]
    pub fn to_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Parses a `Set-Cookie` header value observed for `request_host`.
    ///
    /// Only `Domain` and `Path` attributes are kept; everything else
    /// (expiry, flags) is not modeled by the jar.
    #[must_use]
    pub fn from_set_cookie(header: &str, request_host: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Self::new(name, value.trim(), request_host);
        for part in parts {
            if let Some((attr, val)) = part.split_once('=') {
                match attr.trim().to_ascii_lowercase().as_str() {
                    "domain" if !val.trim().is_empty() => cookie.domain = normalize_domain(val),
                    "path" if val.trim().starts_with('/') => cookie.path = val.trim().to_string(),
                    _ => {}
                }
            }
        }
        Some(cookie)
    }
}

/// In-memory cookie store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cookies: Vec::new(),
        }
    }

    /// Merges cookies observed for `host`. Last write wins per key.
    ///
    /// Cookies with an empty domain are scoped to `host`. A replaced
    /// cookie keeps its original position in the jar.
    pub fn upsert(&mut self, cookies: impl IntoIterator<Item = Cookie>, host: &str) {
        for mut cookie in cookies {
            if cookie.domain.is_empty() {
                cookie.domain = normalize_domain(host);
            }
            if cookie.path.is_empty() {
                cookie.path = default_path();
            }
            match self.cookies.iter_mut().find(|c| c.same_key(&cookie)) {
                Some(existing) => *existing = cookie,
                None => self.cookies.push(cookie),
            }
        }
    }

    /// Returns cookies applicable to `host` + `path`, in insertion order.
    #[must_use]
    pub fn select(&self, host: &str, path: &str) -> Vec<&Cookie> {
        self.cookies.iter().filter(|c| c.matches(host, path)).collect()
    }

    /// Builds a `Cookie` header value for `host` + `path`, if any cookie matches.
    #[must_use]
    pub fn header_value(&self, host: &str, path: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .select(host, path)
            .into_iter()
            .map(Cookie::to_pair)
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Removes every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Returns all cookies in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Returns the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true if the jar is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Checks if a cookie domain matches a request host.
fn domain_matches(cookie_domain: &str, request_host: &str) -> bool {
    let request_host = request_host.to_ascii_lowercase();
    if cookie_domain.is_empty() {
        return false;
    }
    request_host == cookie_domain
        || request_host
            .strip_suffix(cookie_domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
