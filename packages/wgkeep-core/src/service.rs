use crate::{config::Config, error::CoreError, CoreResult};
use async_trait::async_trait;
use std::{path::PathBuf, process::Output, time::Duration};
use tokio::{process::Command, time};

/// Seam between the lifecycle manager and the mechanism that applies config
/// to the running interface. Live reload and container restart are both
/// valid implementations; the manager does not care which one it holds.
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Applies the current on-disk config to the running interface. Blocks
    /// until done or the bounded timeout elapses. Never retried here; retry
    /// is a caller decision.
    async fn reload(&self) -> CoreResult<()>;

    /// Raw per-peer statistics text from the running interface.
    async fn query_status(&self) -> CoreResult<String>;
}

/// Drives `wg-quick` and `wg show` through a shell, optionally inside a
/// docker container when the interface is hosted there.
pub struct WgQuickController {
    interface: String,
    conf_path: PathBuf,
    timeout: Duration,
    container: Option<String>,
}

impl WgQuickController {
    pub fn new(config: &Config) -> Self {
        Self {
            interface: config.interface().to_string(),
            conf_path: config.conf_path().to_path_buf(),
            timeout: config.reload_timeout(),
            container: config.container().map(str::to_string),
        }
    }

    fn command(&self, shell_cmd: &str) -> Command {
        match &self.container {
            Some(container) => {
                let mut cmd = Command::new("docker");
                cmd.args(["exec", container, "bash", "-c", shell_cmd]);
                cmd
            }
            None => {
                let mut cmd = Command::new("bash");
                cmd.args(["-c", shell_cmd]);
                cmd
            }
        }
    }

    fn failure_text(output: &Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        }
    }
}

#[async_trait]
impl ServiceController for WgQuickController {
    async fn reload(&self) -> CoreResult<()> {
        let conf = self.conf_path.display();
        let shell_cmd = format!("wg-quick down {conf} && wg-quick up {conf}");
        tracing::info!("Reloading interface {}", self.interface);

        let output = match time::timeout(self.timeout, self.command(&shell_cmd).output()).await
        {
            Err(_) => return Err(CoreError::ReloadTimeout(self.timeout)),
            Ok(result) => result?,
        };

        if !output.status.success() {
            return Err(CoreError::ReloadFailed(Self::failure_text(&output)));
        }

        tracing::info!("Interface {} reloaded", self.interface);
        Ok(())
    }

    async fn query_status(&self) -> CoreResult<String> {
        let shell_cmd = format!("wg show {} dump", self.interface);

        let output = match time::timeout(self.timeout, self.command(&shell_cmd).output()).await
        {
            Err(_) => return Err(CoreError::StatusTimeout(self.timeout)),
            Ok(result) => result?,
        };

        if !output.status.success() {
            return Err(CoreError::StatusFailed(Self::failure_text(&output)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One peer's live counters as reported by `wg show <iface> dump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStats {
    pub public_key: String,
    pub endpoint: Option<String>,
    /// Epoch seconds of the last completed handshake; `None` means never.
    pub latest_handshake: Option<u64>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Tolerant parser for `wg show <iface> dump` output: tab-separated, one
/// peer per line after the interface line. Lines that do not look like peer
/// records and fields beyond the ones we read are ignored.
pub fn parse_status_dump(raw: &str) -> Vec<PeerStats> {
    let mut stats = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        // Interface line carries 4 fields, peer lines 8.
        if fields.len() < 7 {
            continue;
        }
        let public_key = fields[0].trim();
        if public_key.is_empty() {
            continue;
        }
        let endpoint = match fields[2].trim() {
            "" | "(none)" => None,
            e => Some(e.to_string()),
        };
        let latest_handshake = match fields[4].trim().parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(ts) => Some(ts),
        };
        let rx_bytes = fields[5].trim().parse().unwrap_or(0);
        let tx_bytes = fields[6].trim().parse().unwrap_or(0);
        stats.push(PeerStats {
            public_key: public_key.to_string(),
            endpoint,
            latest_handshake,
            rx_bytes,
            tx_bytes,
        });
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
aGlkZGVuX3NlcnZlcl9rZXlfbWF0ZXJpYWxfXzAwMQ==\tc2VydmVyX3B1YmxpY19rZXlfbWF0ZXJpYWxfXzAwMQ==\t51820\toff
cGhvbmVfcHVibGljX2tleV9tYXRlcmlhbF9fMDAwMQ==\t(none)\t203.0.113.9:33612\t10.8.0.2/32\t1722260000\t1048576\t2097152\t25
bGFwdG9wX3B1YmxpY19rZXlfbWF0ZXJpYWxfMDAz\t(none)\t(none)\t10.8.0.3/32\t0\t0\t0\toff
";

    #[test]
    fn parses_peer_lines_and_skips_the_interface_line() {
        let stats = parse_status_dump(DUMP);
        assert_eq!(stats.len(), 2);

        let phone = &stats[0];
        assert_eq!(
            phone.public_key,
            "cGhvbmVfcHVibGljX2tleV9tYXRlcmlhbF9fMDAwMQ=="
        );
        assert_eq!(phone.endpoint.as_deref(), Some("203.0.113.9:33612"));
        assert_eq!(phone.latest_handshake, Some(1722260000));
        assert_eq!(phone.rx_bytes, 1048576);
        assert_eq!(phone.tx_bytes, 2097152);
    }

    #[test]
    fn zero_handshake_means_never_connected() {
        let stats = parse_status_dump(DUMP);
        let laptop = &stats[1];
        assert_eq!(laptop.latest_handshake, None);
        assert_eq!(laptop.endpoint, None);
    }

    #[test]
    fn garbage_lines_are_ignored() {
        let raw = format!("warning: something\n{DUMP}\nshort\tline\n");
        assert_eq!(parse_status_dump(&raw).len(), 2);
    }
}
