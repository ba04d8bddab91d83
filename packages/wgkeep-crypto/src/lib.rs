pub(crate) mod error;

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

pub use crate::error::CryptoError;

pub type CryptoResult<T> = core::result::Result<T, CryptoError>;

pub const KEY_LEN: usize = 32;

fn random_key() -> CryptoResult<[u8; KEY_LEN]> {
    let mut bytes = [0u8; KEY_LEN];
    rand::rngs::OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

fn decode_key(s: &str) -> CryptoResult<[u8; KEY_LEN]> {
    let bytes = general_purpose::STANDARD.decode(s.trim())?;
    let bytes: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".to_string()))?;
    Ok(bytes)
}

/// An X25519 identity in the WireGuard key format: 32-byte keys,
/// base64-encoded for storage and display.
pub struct Keypair {
    private: StaticSecret,
    public: PublicKey,
}

impl core::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keypair")
            .field("private", &"<redacted>")
            .field("public", &self.public)
            .finish()
    }
}

impl Keypair {
    pub fn generate() -> CryptoResult<Self> {
        let private = StaticSecret::from(random_key()?);
        let public = PublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Rebuild the pair from a stored private key, deriving the public half.
    pub fn from_private_b64(s: &str) -> CryptoResult<Self> {
        let private = StaticSecret::from(decode_key(s)?);
        let public = PublicKey::from(&private);
        Ok(Self { private, public })
    }

    pub fn private_b64(&self) -> String {
        general_purpose::STANDARD.encode(self.private.to_bytes())
    }

    pub fn public_b64(&self) -> String {
        general_purpose::STANDARD.encode(self.public.as_bytes())
    }
}

pub fn derive_public_key(private_b64: &str) -> CryptoResult<String> {
    Ok(Keypair::from_private_b64(private_b64)?.public_b64())
}

#[derive(Clone)]
pub struct PresharedKey([u8; KEY_LEN]);

impl PresharedKey {
    pub fn generate() -> CryptoResult<Self> {
        Ok(Self(random_key()?))
    }

    pub fn from_b64(s: &str) -> CryptoResult<Self> {
        Ok(Self(decode_key(s)?))
    }

    pub fn to_b64(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }
}
