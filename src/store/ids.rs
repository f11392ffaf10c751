//! Identifier helpers for stored records.
//!
//! Token and verifier ids follow the `<prefix>_<millis>_<suffix>` shape so they
//! can be produced without asking the backing store for a sequence. The suffix
//! only guards against same-millisecond collisions inside one process; it is
//! not a secret and not globally unique.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

/// Id carried by degraded records that were never persisted.
pub const PLACEHOLDER_ID: &str = "mock";

/// Prefix for customer token ids.
pub const TOKEN_PREFIX: &str = "token";

/// Prefix for code verifier ids.
pub const VERIFIER_PREFIX: &str = "verifier";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 9;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Build a `<prefix>_<millis>_<suffix>` id for the given instant.
#[must_use]
pub fn prefixed_id(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}_{}", at.timestamp_millis(), random_suffix())
}

/// Generate a fresh customer token id.
#[must_use]
pub fn token_id() -> String {
    prefixed_id(TOKEN_PREFIX, Utc::now())
}

/// Generate a fresh code verifier id.
#[must_use]
pub fn verifier_id() -> String {
    prefixed_id(VERIFIER_PREFIX, Utc::now())
}

/// Generate a random row id for messages and account URLs.
#[inline]
#[must_use]
pub fn row_id() -> String {
    Uuid::new_v4().to_string()
}

/// Whether an id marks a record that was never persisted.
#[inline]
#[must_use]
pub fn is_placeholder(id: &str) -> bool {
    id == PLACEHOLDER_ID
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_prefixed_id_shape() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = prefixed_id("token", at);

        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "token");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn test_generated_ids_use_their_prefix() {
        assert!(token_id().starts_with("token_"));
        assert!(verifier_id().starts_with("verifier_"));
    }

    #[test]
    fn test_same_millisecond_ids_differ() {
        let at = Utc::now();
        assert_ne!(prefixed_id("token", at), prefixed_id("token", at));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(PLACEHOLDER_ID));
        assert!(!is_placeholder(&row_id()));
    }
}
