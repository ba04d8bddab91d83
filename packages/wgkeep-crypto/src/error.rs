use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(e: base64::DecodeError) -> Self {
        CryptoError::InvalidKey(e.to_string())
    }
}
