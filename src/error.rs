//! Main Crate Error

use crate::common::Id;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Kadstore crate error enum.
pub enum Error {
    /// The key of a store request is not the digest of its value.
    ///
    /// Content-addressing failures are terminal and never retried,
    /// and no peer state is mutated before this is returned.
    #[error("Key {key} does not match the value digest {digest}")]
    InvalidValue {
        /// The key the caller asked to store under.
        key: Id,
        /// The actual digest of the value.
        digest: Id,
    },

    /// Id is expected to be 20 bytes.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string is not 40 hex characters.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
