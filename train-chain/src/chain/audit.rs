//! Tamper-evident log of chain mutations.
//!
//! Each token is folded into a running SHA-256 digest:
//! `state' = SHA256(state || token)`. Two chains that went through the same
//! mutations in the same order end up with the same digest; any difference
//! in history shows up as a different digest.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of allocated train identifiers, in hex digits.
const IDENTIFIER_LENGTH: usize = 6;

/// A running hash over every committed mutation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuditLog {
    state: [u8; 32],
}

impl AuditLog {
    /// A log that has seen nothing yet (all zero digest).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a log from its hex digest.
    pub fn from_hex(digest: &str) -> Result<Self, hex::FromHexError> {
        let mut state = [0u8; 32];
        hex::decode_to_slice(digest, &mut state)?;
        Ok(Self { state })
    }

    /// The current digest as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.state)
    }

    /// Folds tokens into the digest, one at a time.
    pub fn record(&mut self, tokens: &[&str]) {
        for token in tokens {
            let mut hasher = Sha256::new();
            hasher.update(self.state);
            hasher.update(token.as_bytes());
            self.state.copy_from_slice(&hasher.finalize());
        }
    }

    /// Records an identifier allocation and derives the identifier from the
    /// new digest.
    pub fn allocate_identifier(&mut self) -> String {
        self.record(&["identifier"]);
        self.to_hex()[..IDENTIFIER_LENGTH].to_string()
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuditLog({})", self.to_hex())
    }
}

impl fmt::Display for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
