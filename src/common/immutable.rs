//! Helper functions for content-addressed values.

use crate::{Error, Id, Result};

/// Returns `true` if `key` is the digest of `value`.
pub fn validate_immutable(value: &[u8], key: &Id) -> bool {
    Id::hash(value) == *key
}

/// Like [validate_immutable] but returns the mismatch as an [Error::InvalidValue].
pub fn check_immutable(value: &[u8], key: &Id) -> Result<()> {
    let digest = Id::hash(value);

    if digest != *key {
        return Err(Error::InvalidValue { key: *key, digest });
    }

    Ok(())
}
