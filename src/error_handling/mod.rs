//! Error handling.
//!
//! This module provides:
//! - The check outcome taxonomy ([`CheckErrorKind`])
//! - Fault types for the store, the site catalog and startup
//!
//! Check outcomes are categorized into:
//! - **transport**: the endpoint could not be reached in time
//! - **protocol**: the endpoint answered with an unexpected status
//! - **trust**: the certificate is expired or issued for another host
//! - **content**: the page no longer contains the expected text

mod types;

// Re-export public API
pub use types::{CheckErrorKind, ConfigError, InitializationError, StoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_error_kind_identifiers_round_trip() {
        for kind in CheckErrorKind::iter() {
            assert_eq!(CheckErrorKind::from_str(kind.as_str()), Ok(kind));
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_error_kind_identifiers_are_stable() {
        let ids: Vec<&str> = CheckErrorKind::iter().map(|k| k.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "timeout",
                "no_response",
                "wrong_code",
                "ssl_expired",
                "ssl_mismatch",
                "keyword_missing"
            ]
        );
    }

    #[test]
    fn test_unknown_error_kind_rejected() {
        assert!(CheckErrorKind::from_str("dns_failure").is_err());
    }

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::MalformedTimestamp {
            column: "started_at",
            value: "yesterday".into(),
        };
        assert_eq!(err.to_string(), "Malformed timestamp 'yesterday' in started_at");

        let err = StoreError::MissingIncident {
            site_id: "shop".into(),
            incident_id: 42,
        };
        assert!(err.to_string().contains("missing incident 42"));
    }
}
