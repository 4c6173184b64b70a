use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of bytes in a [`DocumentId`].
pub const DOCUMENT_ID_LEN: usize = 12;

/// Reserved document key holding the document identity.
pub const ID_KEY: &str = "_id";

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

/// Store-generated identity of a persisted document.
///
/// Layout: 4 bytes of big-endian seconds since the Unix epoch, 5 bytes of
/// per-process randomness and a 3-byte wrapping counter. The identity
/// carries no content; it is assigned once at first insert and never
/// changes, even when the document is later replaced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId([u8; DOCUMENT_ID_LEN]);

impl DocumentId {
    /// Generate a fresh identity.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let unique = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; DOCUMENT_ID_LEN];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Wrap raw identity bytes.
    pub const fn from_bytes(bytes: [u8; DOCUMENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw 12 bytes.
    pub fn as_bytes(&self) -> &[u8; DOCUMENT_ID_LEN] {
        &self.0
    }

    /// Creation time embedded in the identity, in seconds since the epoch.
    pub fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Hex-encoded string representation (24 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Trailing 8 hex characters; the counter bytes make this the most
    /// distinguishing part within one process.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[8..])
    }

    /// Parse from a 24-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DOCUMENT_ID_LEN {
            return Err(TypeError::InvalidLength {
                expected: DOCUMENT_ID_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DOCUMENT_ID_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.to_hex())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DOCUMENT_ID_LEN]> for DocumentId {
    fn from(bytes: [u8; DOCUMENT_ID_LEN]) -> Self {
        Self(bytes)
    }
}
