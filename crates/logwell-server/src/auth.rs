//! Shared-secret authorization.
//!
//! Every query surface gates on a single `pwd` query parameter. The
//! configured secret is hashed once at startup; candidates are hashed and
//! compared in constant time so the comparison leaks neither content nor
//! length.

use std::fmt;

/// The configured shared secret, stored as a blake3 hash.
#[derive(Clone)]
pub struct SharedSecret {
    hash: [u8; 32],
}

impl SharedSecret {
    /// Hashes a plaintext secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            hash: *blake3::hash(secret.as_bytes()).as_bytes(),
        }
    }

    /// Verifies a candidate in constant time.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        use subtle::ConstantTimeEq;
        let other = blake3::hash(candidate.as_bytes());
        self.hash.ct_eq(other.as_bytes()).into()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the hash in debug output.
        f.debug_struct("SharedSecret")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}
