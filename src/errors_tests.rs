// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    fn lookup_error() -> CacheError {
        CacheError::Lookup {
            kind: ResourceKind::Zone,
            key: "default/example".to_string(),
            reason: "store unavailable".to_string(),
        }
    }

    #[test]
    fn test_malformed_key_display() {
        let err = KeyError::Malformed {
            key: "no-namespace-name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid resource key 'no-namespace-name': expected 'namespace/name'"
        );
    }

    #[test]
    fn test_cache_lookup_display_mentions_kind() {
        let err = lookup_error();
        assert!(err.to_string().contains("Zone"));
        assert!(err.to_string().contains("default/example"));
    }

    #[test]
    fn test_only_cache_retry_is_retrying() {
        let retrying = ReconcileError::CacheLookupRetrying {
            key: "default/example".to_string(),
            attempt: 1,
            source: lookup_error(),
        };
        assert!(retrying.is_retrying());

        let exhausted = ReconcileError::CacheLookupExhausted {
            key: "default/example".to_string(),
            attempts: 5,
            source: lookup_error(),
        };
        assert!(!exhausted.is_retrying());

        let unresolvable = ReconcileError::DeletionUnresolvable {
            key: "default/example".to_string(),
        };
        assert!(!unresolvable.is_retrying());
    }

    #[test]
    fn test_categories_are_distinct() {
        let errors = [
            ReconcileError::MalformedKey(KeyError::MissingName),
            ReconcileError::CacheLookupRetrying {
                key: String::new(),
                attempt: 1,
                source: lookup_error(),
            },
            ReconcileError::CacheLookupExhausted {
                key: String::new(),
                attempts: 5,
                source: lookup_error(),
            },
            ReconcileError::DeletionUnresolvable { key: String::new() },
            ReconcileError::Listing {
                key: String::new(),
                source: lookup_error(),
            },
            ReconcileError::Handler {
                key: String::new(),
                source: HandlerError::Template {
                    reason: "bad".to_string(),
                },
            },
        ];

        let mut categories: Vec<_> = errors.iter().map(ReconcileError::category).collect();
        categories.sort_unstable();
        categories.dedup();
        assert_eq!(categories.len(), errors.len());
    }

    #[test]
    fn test_handler_io_error_mentions_path() {
        let err = HandlerError::Io {
            path: std::path::PathBuf::from("/tmp/zones/default_example.zone"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/zones/default_example.zone"));
    }
}
