//! Keyed message authentication.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Hash algorithm backing an HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

/// Returned when a configured algorithm name is not supported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported hash algorithm {0:?} (expected sha1, sha256 or sha512)")]
pub struct UnknownAlgorithm(pub String);

/// The MAC implementation refused the key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid MAC key length")]
pub struct InvalidKey;

impl HashAlgorithm {
    /// Lowercase name, as used in configuration and signature headers.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Compute the MAC of the concatenation of `parts` under `key`.
    pub fn mac(&self, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, InvalidKey> {
        match self {
            HashAlgorithm::Sha1 => compute::<Hmac<Sha1>>(key, parts),
            HashAlgorithm::Sha256 => compute::<Hmac<Sha256>>(key, parts),
            HashAlgorithm::Sha512 => compute::<Hmac<Sha512>>(key, parts),
        }
    }

    /// Recompute the MAC and compare it to `tag` in constant time.
    pub fn verify(&self, key: &[u8], parts: &[&[u8]], tag: &[u8]) -> bool {
        match self.mac(key, parts) {
            Ok(expected) => expected.as_slice().ct_eq(tag).into(),
            Err(_) => false,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

fn compute<M: Mac + hmac::digest::KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, InvalidKey> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| InvalidKey)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("SHA1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(" sha512 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn mac_lengths_follow_algorithm() {
        assert_eq!(HashAlgorithm::Sha1.mac(b"k", &[b"m"]).unwrap().len(), 20);
        assert_eq!(HashAlgorithm::Sha256.mac(b"k", &[b"m"]).unwrap().len(), 32);
        assert_eq!(HashAlgorithm::Sha512.mac(b"k", &[b"m"]).unwrap().len(), 64);
    }

    #[test]
    fn parts_are_concatenated() {
        let split = HashAlgorithm::Sha256.mac(b"key", &[b"ab", b"cd"]).unwrap();
        let joined = HashAlgorithm::Sha256.mac(b"key", &[b"abcd"]).unwrap();
        assert_eq!(split, joined);
    }

    #[test]
    fn verify_rejects_other_key_and_short_tags() {
        let tag = HashAlgorithm::Sha256.mac(b"key", &[b"message"]).unwrap();
        assert!(HashAlgorithm::Sha256.verify(b"key", &[b"message"], &tag));
        assert!(!HashAlgorithm::Sha256.verify(b"other", &[b"message"], &tag));
        assert!(!HashAlgorithm::Sha256.verify(b"key", &[b"message"], &tag[..16]));
    }

    #[test]
    fn empty_and_long_keys_are_accepted() {
        assert!(HashAlgorithm::Sha256.mac(b"", &[b"m"]).is_ok());
        assert!(HashAlgorithm::Sha512.mac(&[7u8; 300], &[b"m"]).is_ok());
    }
}
