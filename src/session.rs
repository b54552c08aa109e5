// Explicit cookie jar for one domain. The SheepIt session is nothing more
// than the cookies the site sets at login, so we keep them in a plain
// name -> value map that can round-trip through JSON for persistence.
// Attributes like path or expiry are not modeled; the server re-issues
// cookies whenever it cares.

use std::collections::HashMap;

/// All cookies the client holds for the configured domain. Every cookie in
/// here belongs to that one domain by construction.
#[derive(Debug, Clone)]
pub struct CookieJar {
    domain: String,
    cookies: HashMap<String, String>,
}

impl CookieJar {
    pub fn new(domain: impl Into<String>) -> Self {
        CookieJar {
            domain: domain.into(),
            cookies: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Drop every cookie. Used by logout, which must clear local state even
    /// when the remote request fails.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Render the `Cookie` request header, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }

    /// Record a single `Set-Cookie` response header. Only the name=value
    /// pair before the first `;` matters to us.
    pub fn store_set_cookie(&mut self, header: &str) {
        let pair = header.split(';').next().unwrap_or("");
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                self.cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }

    /// Export all cookies as a flat mapping, suitable for JSON persistence.
    pub fn export(&self) -> HashMap<String, String> {
        self.cookies.clone()
    }

    /// Install a previously exported mapping on this jar's domain.
    pub fn import(&mut self, cookies: HashMap<String, String>) {
        for (name, value) in cookies {
            self.cookies.insert(name, value);
        }
    }
}
