//! Streaming content hashing
//!
//! Every object write rolls MD5 and SHA-512 over the raw stream, plus
//! SHA-256 when a signature verifier has to be invoked at EOF. The read
//! path rolls MD5 and SHA-512 again and compares against the stored hex
//! digests.

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

/// Hex digests of a fully consumed stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDigest {
    /// MD5 digest, lowercase hex
    pub md5_hex: String,
    /// SHA-512 digest, lowercase hex
    pub sha512_hex: String,
    /// SHA-256 digest, lowercase hex; present only when requested
    pub sha256_hex: Option<String>,
}

/// Rolling hasher fed block by block as a stream is consumed
pub struct ContentHasher {
    md5: Md5,
    sha512: Sha512,
    sha256: Option<Sha256>,
}

impl ContentHasher {
    /// Create a hasher rolling MD5 and SHA-512
    #[must_use]
    pub fn new() -> Self {
        Self {
            md5: Md5::new(),
            sha512: Sha512::new(),
            sha256: None,
        }
    }

    /// Create a hasher that additionally rolls SHA-256 (signature path)
    #[must_use]
    pub fn with_sha256() -> Self {
        Self {
            md5: Md5::new(),
            sha512: Sha512::new(),
            sha256: Some(Sha256::new()),
        }
    }

    /// Feed a block of raw stream bytes
    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha512.update(data);
        if let Some(ref mut sha256) = self.sha256 {
            sha256.update(data);
        }
    }

    /// Finalize and return the hex digests
    #[must_use]
    pub fn finalize(self) -> ContentDigest {
        ContentDigest {
            md5_hex: hex::encode(self.md5.finalize()),
            sha512_hex: hex::encode(self.sha512.finalize()),
            sha256_hex: self.sha256.map(|h| hex::encode(h.finalize())),
        }
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Constant-time comparison of two hex digests
///
/// Case-insensitive; digests of different lengths never match.
#[must_use]
pub fn digest_eq(expected: &str, computed: &str) -> bool {
    let expected = expected.to_ascii_lowercase();
    let computed = computed.to_ascii_lowercase();
    if expected.len() != computed.len() {
        return false;
    }
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), computed.as_bytes()).is_ok()
}
