use crate::{error::CoreError, manager::PeerIdentity, CoreResult};
use qrcode::QrCode;
use std::net::Ipv4Addr;
use wgkeep_lib::types::Endpoint;

/// Server-side facts a client profile embeds.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub public_key: String,
    pub endpoint: Endpoint,
    pub dns: Vec<Ipv4Addr>,
}

/// Complete standalone client configuration for one peer: its own identity
/// plus everything needed to reach the server.
pub fn render_profile(peer: &PeerIdentity, server: &ServerInfo) -> String {
    let mut out = String::new();
    out.push_str("[Interface]\n");
    out.push_str(&format!("PrivateKey = {}\n", peer.private_key));
    out.push_str(&format!("Address = {}/32\n", peer.address));
    if !server.dns.is_empty() {
        let dns = server
            .dns
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("DNS = {dns}\n"));
    }
    out.push('\n');
    out.push_str("[Peer]\n");
    out.push_str(&format!("PublicKey = {}\n", server.public_key));
    out.push_str(&format!("PresharedKey = {}\n", peer.preshared_key));
    out.push_str(&format!("Endpoint = {}\n", server.endpoint));
    out.push_str("AllowedIPs = 0.0.0.0/0\n");
    out.push_str("PersistentKeepalive = 25\n");
    out
}

/// Encodes a profile into a scannable QR PNG for mobile import. Pure; the
/// only failure mode is exceeding the QR payload capacity.
pub fn render_scan_image(profile: &str) -> CoreResult<Vec<u8>> {
    let code = QrCode::new(profile.as_bytes())
        .map_err(|e| CoreError::PayloadTooLarge(e.to_string()))?;
    let img = code.render::<image::Luma<u8>>().build();
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgkeep_lib::types::PeerName;

    fn identity() -> PeerIdentity {
        PeerIdentity {
            name: PeerName::from("phone"),
            address: Ipv4Addr::new(10, 8, 0, 2),
            private_key: "cGhvbmVfcHJpdmF0ZV9rZXlfbWF0ZXJpYWxfMDAwMQ==".to_string(),
            public_key: "cGhvbmVfcHVibGljX2tleV9tYXRlcmlhbF9fMDAwMQ==".to_string(),
            preshared_key: "cGhvbmVfcHNrX21hdGVyaWFsX19fX19fXzAwMDE=".to_string(),
        }
    }

    fn server() -> ServerInfo {
        ServerInfo {
            public_key: "c2VydmVyX3B1YmxpY19rZXlfbWF0ZXJpYWxfXzAwMQ==".to_string(),
            endpoint: Endpoint::new("vpn.example.com", 51820),
            dns: vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(8, 8, 8, 8)],
        }
    }

    #[test]
    fn profile_is_a_complete_client_config() {
        let text = render_profile(&identity(), &server());
        assert!(text.starts_with("[Interface]\n"));
        assert!(text.contains("Address = 10.8.0.2/32"));
        assert!(text.contains("DNS = 1.1.1.1, 8.8.8.8"));
        assert!(text.contains("PublicKey = c2VydmVyX3B1YmxpY19rZXlfbWF0ZXJpYWxfXzAwMQ=="));
        assert!(text.contains("Endpoint = vpn.example.com:51820"));
        assert!(text.contains("AllowedIPs = 0.0.0.0/0"));
        assert!(text.contains("PersistentKeepalive = 25"));
    }

    #[test]
    fn dns_is_omitted_when_unset() {
        let mut server = server();
        server.dns.clear();
        let text = render_profile(&identity(), &server);
        assert!(!text.contains("DNS"));
    }

    #[test]
    fn qr_image_is_png_encoded() {
        let text = render_profile(&identity(), &server());
        let bytes = render_scan_image(&text).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let huge = "x".repeat(4096);
        let err = render_scan_image(&huge).unwrap_err();
        assert!(matches!(err, CoreError::PayloadTooLarge(_)));
    }
}
