//! Digest used both as a peer identifier and as a content address.
use rand::Rng;
use sha1_smol::Sha1;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{Error, Result};

/// The size of digests in bytes.
pub const ID_SIZE: usize = 20;
/// Number of buckets in every routing table.
pub const NUM_BUCKETS: usize = 160;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// 20-byte SHA-1 digest.
pub struct Id([u8; ID_SIZE]);

impl Id {
    /// Hash arbitrary content into an [Id].
    pub fn hash<T: AsRef<[u8]>>(content: T) -> Id {
        let mut hasher = Sha1::new();
        hasher.update(content.as_ref());

        Id(hasher.digest().bytes())
    }

    /// Random Id drawn from `rng`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Id {
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Bucket index of this Id's bytes, see [bucket_index].
    pub fn bucket_index(&self) -> usize {
        bucket_index(self.0)
    }
}

/// Index of the bucket an identifier belongs to.
///
/// Hashes the identifier, folds every digest byte together with XOR and
/// reduces the result modulo [NUM_BUCKETS].
///
/// Unlike canonical Kademlia, the index depends on the identifier alone and
/// is the same in every peer's routing table, regardless of the owner's own id.
pub fn bucket_index<T: AsRef<[u8]>>(identifier: T) -> usize {
    let digest = Id::hash(identifier);
    let folded = digest.0.iter().fold(0_u8, |acc, byte| acc ^ byte);

    folded as usize % NUM_BUCKETS
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.len() != ID_SIZE * 2 || !s.is_ascii() {
            return Err(Error::InvalidIdEncoding(s.to_string()));
        }

        let mut bytes = [0_u8; ID_SIZE];

        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidIdEncoding(s.to_string()))?;
        }

        Ok(Id(bytes))
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
