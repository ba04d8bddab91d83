use crate::{error::CoreError, CoreResult};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};
use wgkeep_lib::{constant::WIREGUARD_INTERFACE, types::Endpoint};

fn default_interface() -> String {
    WIREGUARD_INTERFACE.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WireGuard {
    #[serde(default = "default_interface")]
    interface: String,
    config: PathBuf,
    profiles: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Network {
    subnet: Ipv4Net,
    host_offset: u32,
    endpoint: String,
    listen_port: u16,
    dns: Vec<Ipv4Addr>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Service {
    reload_timeout: u64,
    container: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    wireguard: WireGuard,
    network: Network,
    service: Service,
}

impl Config {
    pub fn interface(&self) -> &str {
        &self.wireguard.interface
    }

    pub fn conf_path(&self) -> &Path {
        &self.wireguard.config
    }

    pub fn profile_dir(&self) -> &Path {
        &self.wireguard.profiles
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.network.subnet
    }

    pub fn host_offset(&self) -> u32 {
        self.network.host_offset
    }

    /// Client-facing endpoint, `host:port`.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.network.endpoint, self.network.listen_port)
    }

    pub fn listen_port(&self) -> u16 {
        self.network.listen_port
    }

    pub fn dns(&self) -> &[Ipv4Addr] {
        &self.network.dns
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.service.reload_timeout)
    }

    pub fn container(&self) -> Option<&str> {
        self.service.container.as_deref()
    }
}

impl TryFrom<&PathBuf> for Config {
    type Error = CoreError;
    fn try_from(p: &PathBuf) -> CoreResult<Self> {
        let file = File::open(p)?;
        let content: serde_yaml::Value = serde_yaml::from_reader(file)?;
        let config: Config = serde_yaml::from_value(content)?;
        Ok(config)
    }
}

impl TryFrom<&Path> for Config {
    type Error = CoreError;
    fn try_from(p: &Path) -> CoreResult<Self> {
        let file = File::open(p)?;
        let content: serde_yaml::Value = serde_yaml::from_reader(file)?;
        let config: Config = serde_yaml::from_value(content)?;
        Ok(config)
    }
}

impl TryFrom<&str> for Config {
    type Error = CoreError;
    fn try_from(s: &str) -> CoreResult<Self> {
        let content: serde_yaml::Value = serde_yaml::from_str(s)?;
        let config: Config = serde_yaml::from_value(content)?;
        Ok(config)
    }
}
