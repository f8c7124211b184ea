//! HTTP Basic authentication of scrape requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Credentials a scraper must present.
#[derive(Clone)]
pub struct BasicAuth {
    user: String,
    password: String,
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        BasicAuth {
            user: user.into(),
            password: password.into(),
        }
    }

    /// True when either expected value is empty.
    pub fn is_weak(&self) -> bool {
        self.user.is_empty() || self.password.is_empty()
    }

    /// Checks an `Authorization` header value.
    ///
    /// Anything that is not a well formed `Basic` credential is denied.
    /// The password may itself contain colons; the user may not.
    pub fn verify(&self, header: &str) -> bool {
        let (scheme, payload) = match header.trim().split_once(char::is_whitespace) {
            Some(parts) => parts,
            None => return false,
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }

        let decoded = match STANDARD.decode(payload.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let decoded = match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => return false,
        };
        let (user, password) = match decoded.split_once(':') {
            Some(parts) => parts,
            None => return false,
        };

        // Both comparisons always run.
        let user_ok = constant_time_eq(user.as_bytes(), self.user.as_bytes());
        let password_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & password_ok
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && openssl::memcmp::eq(a, b)
}
