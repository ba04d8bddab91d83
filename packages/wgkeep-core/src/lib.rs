pub(crate) mod conf;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod ip;
pub(crate) mod manager;
pub(crate) mod profile;
pub(crate) mod service;

pub type CoreResult<T> = core::result::Result<T, error::CoreError>;

pub use conf::{write_atomic, ConfigDocument, Section, SectionKind, NAME_MARKER};
pub use config::Config;
pub use error::CoreError;
pub use ip::next_free_address;
pub use manager::{
    AddPeerOutcome, PeerIdentity, PeerManager, PeerStatus, PeerSummary, ReloadOutcome,
    RemovePeerOutcome, ServerStatus,
};
pub use profile::{render_profile, render_scan_image, ServerInfo};
pub use service::{parse_status_dump, PeerStats, ServiceController, WgQuickController};
