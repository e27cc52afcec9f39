//! API key authentication.
//!
//! The key is optional: a request without `X-API-Key` (or with an empty
//! value) is anonymous and only subject to the per-IP quota. A key that is
//! present must be on the whitelist.

use axum::http::HeaderMap;
use std::collections::HashSet;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Result of inspecting a request's key header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// No key supplied.
    Anonymous,
    /// A whitelisted key.
    Key(String),
    /// A key that is not on the whitelist. Non-UTF-8 values land here too.
    Rejected(String),
}

impl Credential {
    /// The raw key for logging and rate limiting; empty when anonymous.
    pub fn key(&self) -> &str {
        match self {
            Credential::Anonymous => "",
            Credential::Key(k) | Credential::Rejected(k) => k,
        }
    }
}

/// Set of accepted API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Classify the key header of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Credential {
        let Some(value) = headers.get(API_KEY_HEADER) else {
            return Credential::Anonymous;
        };

        match value.to_str() {
            Ok("") => Credential::Anonymous,
            Ok(key) if self.contains(key) => Credential::Key(key.to_string()),
            Ok(key) => Credential::Rejected(key.to_string()),
            Err(_) => Credential::Rejected(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(key: Option<HeaderValue>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(value) = key {
            map.insert(API_KEY_HEADER, value);
        }
        map
    }

    #[test]
    fn test_authenticate() {
        let keys = ApiKeys::new(["key-admin"]);

        assert_eq!(keys.authenticate(&headers(None)), Credential::Anonymous);
        assert_eq!(
            keys.authenticate(&headers(Some(HeaderValue::from_static("")))),
            Credential::Anonymous
        );
        assert_eq!(
            keys.authenticate(&headers(Some(HeaderValue::from_static("key-admin")))),
            Credential::Key("key-admin".into())
        );
        assert_eq!(
            keys.authenticate(&headers(Some(HeaderValue::from_static("bogus")))),
            Credential::Rejected("bogus".into())
        );
    }

    #[test]
    fn test_non_utf8_key_is_rejected() {
        let keys = ApiKeys::new(["key-admin"]);
        let value = HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap();
        assert!(matches!(
            keys.authenticate(&headers(Some(value))),
            Credential::Rejected(_)
        ));
    }
}
