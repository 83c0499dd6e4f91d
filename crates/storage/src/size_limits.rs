//! Key and value size validation for cache backends.
//!
//! Distributed caches reject oversized entries (memcached, for instance,
//! caps keys at 250 bytes and items at 1 MiB). Backends accept a
//! [`SizeLimits`] at construction time and call [`validate_sizes`] on every
//! write path so that oversized tickets fail fast with
//! [`StorageError::SizeLimitExceeded`] instead of being silently dropped by
//! the cache.
//!
//! # Defaults
//!
//! | Limit | Default |
//! |-------|---------|
//! | `max_key_size` | 250 bytes |
//! | `max_value_size` | 1 048 576 bytes (1 MiB) |

use crate::{ConfigError, StorageError};

/// Default maximum key size in bytes.
pub const DEFAULT_MAX_KEY_SIZE: usize = 250;

/// Default maximum value size in bytes (1 MiB).
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Upper bounds on key and value length, both at least one byte.
///
/// # Example
///
/// ```
/// use ticketry_storage::SizeLimits;
///
/// let limits = SizeLimits::new(128, 64 * 1024).unwrap();
/// assert_eq!(limits.max_key_size(), 128);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    max_key_size: usize,
    max_value_size: usize,
}

impl SizeLimits {
    /// Limits of `max_key_size` and `max_value_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if either limit is zero.
    pub fn new(max_key_size: usize, max_value_size: usize) -> Result<Self, ConfigError> {
        if max_key_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_key_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if max_value_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_value_size",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(Self { max_key_size, max_value_size })
    }

    /// Longest key accepted, in bytes.
    #[must_use]
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Largest value accepted, in bytes.
    #[must_use]
    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self { max_key_size: DEFAULT_MAX_KEY_SIZE, max_value_size: DEFAULT_MAX_VALUE_SIZE }
    }
}

/// Checks a write against `limits`, key first.
///
/// # Errors
///
/// Returns [`StorageError::SizeLimitExceeded`] identifying which limit was
/// violated.
pub fn validate_sizes(key: &[u8], value: &[u8], limits: &SizeLimits) -> Result<(), StorageError> {
    validate_key_size(key, limits)?;
    if value.len() > limits.max_value_size {
        return Err(StorageError::size_limit_exceeded("value", value.len(), limits.max_value_size));
    }
    Ok(())
}

/// Validates key size only, for reads and deletes.
///
/// # Errors
///
/// Returns [`StorageError::SizeLimitExceeded`] when the key is too long.
pub fn validate_key_size(key: &[u8], limits: &SizeLimits) -> Result<(), StorageError> {
    if key.len() > limits.max_key_size {
        return Err(StorageError::size_limit_exceeded("key", key.len(), limits.max_key_size));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_follow_memcached() {
        assert_eq!(
            SizeLimits::default(),
            SizeLimits::new(DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE).unwrap()
        );
        assert_eq!(SizeLimits::default().max_key_size(), 250);
    }

    #[rstest]
    #[case::key(0, 1024, "max_key_size")]
    #[case::value(64, 0, "max_value_size")]
    fn zero_limits_are_rejected(
        #[case] max_key_size: usize,
        #[case] max_value_size: usize,
        #[case] field: &str,
    ) {
        match SizeLimits::new(max_key_size, max_value_size) {
            Err(ConfigError::BelowMinimum { field: named, .. }) => assert_eq!(named, field),
            other => panic!("expected BelowMinimum for {field}, got {other:?}"),
        }
    }

    #[rstest]
    #[case::at_both_limits(b"ST-1-abc".as_slice(), 64, None)]
    #[case::key_one_over(b"ST-1-abcd".as_slice(), 64, Some("key"))]
    #[case::value_one_over(b"ST-1".as_slice(), 65, Some("value"))]
    #[case::key_checked_first(b"ST-1-abcd".as_slice(), 65, Some("key"))]
    fn write_validation(
        #[case] key: &[u8],
        #[case] value_len: usize,
        #[case] violated: Option<&str>,
    ) {
        let limits = SizeLimits::new(8, 64).unwrap();
        let result = validate_sizes(key, &vec![b'x'; value_len], &limits);
        match (result, violated) {
            (Ok(()), None) => {},
            (Err(StorageError::SizeLimitExceeded { kind, .. }), Some(expected)) => {
                assert_eq!(kind, expected);
            },
            (other, _) => panic!("unexpected outcome {other:?} for {violated:?}"),
        }
    }

    #[test]
    fn read_validation_ignores_values() {
        let limits = SizeLimits::new(8, 1).unwrap();
        assert!(validate_key_size(b"TGT-1", &limits).is_ok());
        let err = validate_key_size(b"TGT-123456", &limits).unwrap_err();
        assert!(matches!(
            err,
            StorageError::SizeLimitExceeded { kind: "key", actual: 10, limit: 8 }
        ));
    }
}
