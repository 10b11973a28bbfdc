// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the agilekey vault engine.
//!
//! This crate provides the error taxonomy, shared types, and the two
//! collaborator traits the vault is built against: [`VaultFs`] for file
//! access and [`KeyAgent`] for holding unlocked keys.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{KeychainError, Result};
pub use traits::{KeyAgent, VaultFs};
pub use types::{ChangeSource, CryptoAlgorithm, CryptoParams, FileInfo, WriteOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates_match_variants() {
        assert!(KeychainError::NotFound { path: "a".into() }.is_not_found());
        assert!(KeychainError::Conflict { path: "a".into() }.is_conflict());
        assert!(KeychainError::IncorrectPassword.is_incorrect_password());
        assert!(!KeychainError::State("locked".into()).is_conflict());
    }

    #[test]
    fn errors_are_cloneable_for_shared_results() {
        let err = KeychainError::MissingKey { level: "SL5".into() };
        let copy = err.clone();
        assert_eq!(err, copy);
        assert_eq!(copy.to_string(), "no unlocked key found for security level `SL5`");
    }

    #[test]
    fn json_errors_become_format_errors() {
        let err: KeychainError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, KeychainError::Format(_)));
    }

    #[test]
    fn crypto_algorithm_display_round_trip() {
        use std::str::FromStr;

        let alg = CryptoAlgorithm::Aes128OpenSslKey;
        let s = alg.to_string();
        assert_eq!(s, "aes128-openssl-key");
        assert_eq!(CryptoAlgorithm::from_str(&s).expect("should parse back"), alg);
    }

    #[test]
    fn crypto_params_serialization() {
        let params = CryptoParams::default();
        let json = serde_json::to_string(&params).expect("should serialize");
        assert_eq!(json, r#"{"algorithm":"aes128-openssl-key"}"#);
        let parsed: CryptoParams = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(parsed, params);
    }

    #[test]
    fn write_options_with_parent() {
        let opts = WriteOptions::with_parent("rev-1");
        assert_eq!(opts.parent_revision.as_deref(), Some("rev-1"));
        assert_eq!(WriteOptions::default().parent_revision, None);
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _assert_fs(_: &dyn VaultFs) {}
        fn _assert_agent(_: &dyn KeyAgent) {}
    }
}
