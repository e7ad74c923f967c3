//! Request signing for the ingest API.
use sha2::{Digest, Sha256};
use std::fmt::Write;

const BLOCK_SIZE: usize = 64;
const DIGEST_SIZE: usize = 32;

/// HMAC-SHA256, as described in RFC 2104.
#[derive(Clone)]
pub struct HmacSha256 {
    inner: Sha256,
    outer_key: [u8; BLOCK_SIZE],
}

/// Signs request bodies on behalf of one device.
#[derive(Clone)]
pub struct Signer {
    key: heapless::String<{ DIGEST_SIZE * 2 }>,
}

/// Formats bytes as lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // writing to a `String` can't fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// === impl HmacSha256 ===

impl HmacSha256 {
    pub fn new(key: &[u8]) -> Self {
        let mut key_block = [0u8; BLOCK_SIZE];
        if key.len() > BLOCK_SIZE {
            key_block[..DIGEST_SIZE].copy_from_slice(&Sha256::digest(key));
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut inner_key = [0u8; BLOCK_SIZE];
        let mut outer_key = [0u8; BLOCK_SIZE];
        for (i, byte) in key_block.iter().enumerate() {
            inner_key[i] = byte ^ 0x36;
            outer_key[i] = byte ^ 0x5c;
        }

        let mut inner = Sha256::new();
        inner.update(inner_key);
        Self { inner, outer_key }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; DIGEST_SIZE] {
        let inner_hash = self.inner.finalize();
        let mut outer = Sha256::new();
        outer.update(self.outer_key);
        outer.update(inner_hash);
        outer.finalize().into()
    }

    pub fn mac(key: &[u8], data: &[u8]) -> [u8; DIGEST_SIZE] {
        let mut hmac = Self::new(key);
        hmac.update(data);
        hmac.finalize()
    }
}

// === impl Signer ===

impl Signer {
    /// The signing key is the hex-encoded SHA-256 of the device secret, as
    /// ASCII. It is exactly one block long, so HMAC uses it as-is.
    pub fn new(device_secret: &[u8]) -> Self {
        let mut key = heapless::String::new();
        for byte in Sha256::digest(device_secret) {
            // 32 bytes of digest is exactly 64 hex digits.
            let _ = write!(key, "{byte:02x}");
        }
        Self { key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the hex HMAC-SHA256 of `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        hex(&HmacSha256::mac(self.key.as_bytes(), body))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("key", &"<redacted>").finish()
    }
}
