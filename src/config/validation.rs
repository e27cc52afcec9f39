//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the semantics. Every
//! violation is collected so an operator can fix a file in one pass.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("at least one backend must be configured")]
    NoBackends,

    #[error("invalid backend URL '{url}': {reason}")]
    BackendUrl { url: String, reason: String },

    #[error("backend '{0}' is configured more than once")]
    DuplicateBackend(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("API keys must not be empty")]
    EmptyApiKey,
}

/// Check a configuration, returning every violation found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        match parse_backend_url(backend) {
            Ok(url) => {
                if !seen.insert(url) {
                    errors.push(ValidationError::DuplicateBackend(backend.clone()));
                }
            }
            Err(reason) => errors.push(ValidationError::BackendUrl {
                url: backend.clone(),
                reason,
            }),
        }
    }

    let positive = [
        ("rate_limit.per_ip_per_minute", u64::from(config.rate_limit.per_ip_per_minute)),
        ("rate_limit.per_key_per_minute", u64::from(config.rate_limit.per_key_per_minute)),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.read_secs", config.timeouts.read_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.auth.api_keys.iter().any(|k| k.trim().is_empty()) {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a backend base URL. Only plain `http://host[:port]` is accepted.
pub fn parse_backend_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.path() != "/" || url.query().is_some() {
        return Err("must not contain a path or query".to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.backends = vec![
            "https://secure:443".into(),
            "http://a:1".into(),
            "http://a:1/".into(),
        ];
        config.rate_limit.per_ip_per_minute = 0;
        config.auth.api_keys.push(" ".into());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::BackendUrl { .. })));
        assert!(errors.contains(&ValidationError::DuplicateBackend("http://a:1/".into())));
        assert!(errors.contains(&ValidationError::Zero("rate_limit.per_ip_per_minute")));
        assert!(errors.contains(&ValidationError::EmptyApiKey));
    }

    #[test]
    fn test_rejects_empty_backend_list() {
        let mut config = GatewayConfig::default();
        config.backends.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoBackends]));
    }

    #[test]
    fn test_backend_url_rules() {
        assert!(parse_backend_url("http://127.0.0.1:8081").is_ok());
        assert!(parse_backend_url("http://backend.internal").is_ok());
        assert!(parse_backend_url("http://127.0.0.1:8081/api").is_err());
        assert!(parse_backend_url("127.0.0.1:8081").is_err());
    }
}
