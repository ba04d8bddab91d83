use ipnet::Ipv4Net;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use wgkeep_lib::types::PeerName;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("AddrParseError: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("SubnetParseError: {0}")]
    SubnetParse(#[from] ipnet::AddrParseError),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] wgkeep_crypto::CryptoError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid peer name: {0}")]
    InvalidName(String),

    #[error("Peer already exists: {0}")]
    DuplicateName(PeerName),

    #[error("No such peer: {0}")]
    NotFound(PeerName),

    #[error("No free address left in {0}")]
    PoolExhausted(Ipv4Net),

    #[error("Malformed config at line {line}: {reason}")]
    MalformedConfig { line: usize, reason: String },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Reload timed out after {0:?}")]
    ReloadTimeout(Duration),

    #[error("Reload failed: {0}")]
    ReloadFailed(String),

    #[error("Status query timed out after {0:?}")]
    StatusTimeout(Duration),

    #[error("Status query failed: {0}")]
    StatusFailed(String),

    #[error("Payload too large for QR encoding: {0}")]
    PayloadTooLarge(String),
}
