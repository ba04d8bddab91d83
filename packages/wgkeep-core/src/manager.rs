use crate::{
    conf::{self, ConfigDocument},
    config::Config,
    error::CoreError,
    ip,
    profile::{self, ServerInfo},
    service::{self, ServiceController, WgQuickController},
    CoreResult,
};
use std::{
    fs,
    net::Ipv4Addr,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::Mutex;
use wgkeep_crypto::{derive_public_key, Keypair, PresharedKey};
use wgkeep_lib::{
    constant::{PEER_NAME_MAX_LEN, PROFILE_EXTENSION},
    types::PeerName,
};

/// Full identity of a freshly created peer, returned once so the caller can
/// hand it to the client. The private half is never read back out of the
/// server config afterwards.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    pub name: PeerName,
    pub address: Ipv4Addr,
    pub private_key: String,
    pub public_key: String,
    pub preshared_key: String,
}

#[derive(Debug, Clone)]
pub struct PeerSummary {
    pub name: PeerName,
    pub address: Ipv4Addr,
    pub public_key: String,
}

/// Whether the persisted change reached the running interface. `Deferred`
/// is the explicit partial-failure state: the peer exists in config but a
/// manual reload may be required.
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    Applied,
    Deferred { reason: String },
}

#[derive(Debug)]
pub struct AddPeerOutcome {
    pub peer: PeerIdentity,
    pub reload: ReloadOutcome,
}

#[derive(Debug)]
pub struct RemovePeerOutcome {
    pub reload: ReloadOutcome,
}

#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub name: Option<PeerName>,
    pub public_key: String,
    pub endpoint: Option<String>,
    /// Time since the last completed handshake; `None` means never
    /// connected.
    pub handshake_age: Option<Duration>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub interface: String,
    pub peers: Vec<PeerStatus>,
}

/// Orchestrates add/remove/list/status/export over the shared config file.
/// One mutation lock serializes re-parse, allocation, persist and reload;
/// readers go lock-free and rely on the atomic-rename write discipline.
pub struct PeerManager {
    config: Config,
    service: Box<dyn ServiceController>,
    write_lock: Mutex<()>,
}

impl PeerManager {
    pub fn new(config: Config, service: Box<dyn ServiceController>) -> Self {
        Self {
            config,
            service,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_wg_quick(config: Config) -> Self {
        let service = Box::new(WgQuickController::new(&config));
        Self::new(config, service)
    }

    fn validate_name(name: &str) -> CoreResult<PeerName> {
        if name.is_empty() || name != name.trim() {
            return Err(CoreError::InvalidName(format!(
                "name must be non-empty without surrounding whitespace: {name:?}"
            )));
        }
        if name.len() > PEER_NAME_MAX_LEN {
            return Err(CoreError::InvalidName(format!(
                "name exceeds {PEER_NAME_MAX_LEN} bytes"
            )));
        }
        if name
            .chars()
            .any(|c| c.is_control() || matches!(c, '#' | '[' | ']' | '=' | '/' | '\\'))
        {
            return Err(CoreError::InvalidName(format!(
                "name contains reserved characters: {name:?}"
            )));
        }
        Ok(PeerName::from(name))
    }

    fn read_document(&self) -> CoreResult<ConfigDocument> {
        let raw = fs::read_to_string(self.config.conf_path())?;
        ConfigDocument::try_from(raw.as_str())
    }

    fn profile_path(&self, name: &PeerName) -> PathBuf {
        self.config
            .profile_dir()
            .join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    fn server_info(&self, doc: &ConfigDocument) -> CoreResult<ServerInfo> {
        let public_key = derive_public_key(doc.interface_private_key()?)?;
        Ok(ServerInfo {
            public_key,
            endpoint: self.config.endpoint(),
            dns: self.config.dns().to_vec(),
        })
    }

    async fn apply(&self) -> ReloadOutcome {
        match self.service.reload().await {
            Ok(()) => ReloadOutcome::Applied,
            Err(e) => {
                tracing::warn!("Config persisted but reload failed: {e}");
                ReloadOutcome::Deferred {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub async fn add_peer(&self, name: &str) -> CoreResult<AddPeerOutcome> {
        let name = Self::validate_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut doc = self.read_document()?;
        if doc.find_peer(name.as_str()).is_some() {
            return Err(CoreError::DuplicateName(name));
        }

        let keypair = Keypair::generate()?;
        let psk = PresharedKey::generate()?;
        let reserved = doc.reserved_addresses();
        let address = ip::next_free_address(
            self.config.subnet(),
            &reserved,
            self.config.host_offset(),
        )?;

        doc.push_peer(
            name.as_str(),
            &keypair.public_b64(),
            Some(&psk.to_b64()),
            address,
        );
        conf::write_atomic(self.config.conf_path(), &doc.to_string())?;
        tracing::info!("Added peer {name} at {address}");

        let peer = PeerIdentity {
            name: name.clone(),
            address,
            private_key: keypair.private_b64(),
            public_key: keypair.public_b64(),
            preshared_key: psk.to_b64(),
        };

        let server = self.server_info(&doc)?;
        let text = profile::render_profile(&peer, &server);
        fs::create_dir_all(self.config.profile_dir())?;
        conf::write_atomic(&self.profile_path(&name), &text)?;

        let reload = self.apply().await;
        Ok(AddPeerOutcome { peer, reload })
    }

    pub async fn remove_peer(&self, name: &str) -> CoreResult<RemovePeerOutcome> {
        let name = Self::validate_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut doc = self.read_document()?;
        if !doc.remove_peer(name.as_str()) {
            return Err(CoreError::NotFound(name));
        }
        conf::write_atomic(self.config.conf_path(), &doc.to_string())?;

        let profile_path = self.profile_path(&name);
        if profile_path.exists() {
            fs::remove_file(&profile_path)?;
        }
        tracing::info!("Removed peer {name}");

        let reload = self.apply().await;
        Ok(RemovePeerOutcome { reload })
    }

    pub fn list_peers(&self) -> CoreResult<Vec<PeerSummary>> {
        let doc = self.read_document()?;
        let mut peers = Vec::new();
        for section in doc.peers() {
            let Some(name) = section.name() else {
                continue;
            };
            peers.push(PeerSummary {
                name: PeerName::from(name),
                address: section.assigned_address()?,
                public_key: section.public_key()?.to_string(),
            });
        }
        Ok(peers)
    }

    /// Live view of every config peer. Running-state peers missing from the
    /// config are stale and omitted; config peers missing from running state
    /// have never connected.
    pub async fn status(&self) -> CoreResult<ServerStatus> {
        let doc = self.read_document()?;
        let raw = self.service.query_status().await?;
        let stats = service::parse_status_dump(&raw);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut peers = Vec::new();
        for section in doc.peers() {
            let public_key = section.public_key()?.to_string();
            let live = stats.iter().find(|s| s.public_key == public_key);
            let (endpoint, handshake_age, rx_bytes, tx_bytes) = match live {
                Some(s) => (
                    s.endpoint.clone(),
                    s.latest_handshake
                        .map(|ts| Duration::from_secs(now.saturating_sub(ts))),
                    s.rx_bytes,
                    s.tx_bytes,
                ),
                None => (None, None, 0, 0),
            };
            peers.push(PeerStatus {
                name: section.name().map(PeerName::from),
                public_key,
                endpoint,
                handshake_age,
                rx_bytes,
                tx_bytes,
            });
        }

        Ok(ServerStatus {
            interface: self.config.interface().to_string(),
            peers,
        })
    }

    /// Stored client profile plus its QR rendering. Lock-free read.
    pub fn export(&self, name: &str) -> CoreResult<(String, Vec<u8>)> {
        let name = Self::validate_name(name)?;
        let path = self.profile_path(&name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound(name));
            }
            Err(e) => return Err(e.into()),
        };
        let image = profile::render_scan_image(&text)?;
        Ok((text, image))
    }
}
