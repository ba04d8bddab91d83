#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::{
        fs,
        net::Ipv4Addr,
        path::Path,
        sync::{Arc, Mutex},
        time::{SystemTime, UNIX_EPOCH},
    };
    use wgkeep_core::{
        Config, ConfigDocument, CoreError, CoreResult, PeerManager, ReloadOutcome,
        ServiceController,
    };
    use wgkeep_crypto::Keypair;

    #[derive(Default)]
    struct StubState {
        reloads: usize,
        fail_reload: bool,
        status: String,
    }

    struct StubController(Arc<Mutex<StubState>>);

    #[async_trait]
    impl ServiceController for StubController {
        async fn reload(&self) -> CoreResult<()> {
            let mut state = self.0.lock().unwrap();
            state.reloads += 1;
            if state.fail_reload {
                return Err(CoreError::ReloadFailed("wg-quick exited with 1".to_string()));
            }
            Ok(())
        }

        async fn query_status(&self) -> CoreResult<String> {
            Ok(self.0.lock().unwrap().status.clone())
        }
    }

    fn config_for(dir: &Path) -> Config {
        let content = format!(
            r#"
wireguard:
  interface: "wg0"
  config: "{conf}"
  profiles: "{profiles}"

network:
  subnet: "10.10.1.0/24"
  host_offset: 2
  endpoint: "vpn.example.com"
  listen_port: 51820
  dns:
    - "1.1.1.1"

service:
  reload_timeout: 5
  container: ~
"#,
            conf = dir.join("wg0.conf").display(),
            profiles = dir.join("clients").display(),
        );
        Config::try_from(content.as_str()).unwrap()
    }

    fn seed_interface(dir: &Path) -> Keypair {
        let server = Keypair::generate().unwrap();
        let conf = format!(
            "[Interface]\nPrivateKey = {}\nAddress = 10.10.1.1/24\nListenPort = 51820\n",
            server.private_b64()
        );
        fs::write(dir.join("wg0.conf"), conf).unwrap();
        server
    }

    fn manager_with_stub(dir: &Path) -> (PeerManager, Arc<Mutex<StubState>>) {
        let state = Arc::new(Mutex::new(StubState::default()));
        let manager = PeerManager::new(
            config_for(dir),
            Box::new(StubController(Arc::clone(&state))),
        );
        (manager, state)
    }

    fn read_conf(dir: &Path) -> String {
        fs::read_to_string(dir.join("wg0.conf")).unwrap()
    }

    #[tokio::test]
    async fn add_peer_allocates_first_free_address_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, state) = manager_with_stub(dir.path());

        let outcome = manager.add_peer("phone").await.unwrap();
        assert_eq!(outcome.peer.address, Ipv4Addr::new(10, 10, 1, 2));
        assert!(matches!(outcome.reload, ReloadOutcome::Applied));
        assert_eq!(state.lock().unwrap().reloads, 1);

        // Returned keys are a real 32-byte pair.
        let derived = Keypair::from_private_b64(&outcome.peer.private_key).unwrap();
        assert_eq!(derived.public_b64(), outcome.peer.public_key);

        // Exactly two sections on disk, and the persisted key matches.
        let raw = read_conf(dir.path());
        let doc = ConfigDocument::try_from(raw.as_str()).unwrap();
        assert_eq!(doc.peers().count(), 1);
        let peer = doc.find_peer("phone").unwrap();
        assert_eq!(peer.public_key().unwrap(), outcome.peer.public_key);
        assert_eq!(peer.assigned_address().unwrap(), outcome.peer.address);
    }

    #[tokio::test]
    async fn addresses_grow_monotonically_and_names_stay_unique() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, _) = manager_with_stub(dir.path());

        let first = manager.add_peer("phone").await.unwrap();
        let second = manager.add_peer("laptop").await.unwrap();
        assert_eq!(first.peer.address, Ipv4Addr::new(10, 10, 1, 2));
        assert_eq!(second.peer.address, Ipv4Addr::new(10, 10, 1, 3));
        assert_ne!(first.peer.public_key, second.peer.public_key);

        let err = manager.add_peer("phone").await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateName(_)));

        let peers = manager.list_peers().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].name.as_str(), "phone");
        assert_eq!(peers[1].name.as_str(), "laptop");
    }

    #[tokio::test]
    async fn concurrent_adds_receive_distinct_addresses() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, _) = manager_with_stub(dir.path());
        let manager = Arc::new(manager);

        let a = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.add_peer("phone").await })
        };
        let b = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.add_peer("laptop").await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_ne!(a.peer.address, b.peer.address);
        let mut addresses = vec![a.peer.address, b.peer.address];
        addresses.sort();
        assert_eq!(
            addresses,
            vec![Ipv4Addr::new(10, 10, 1, 2), Ipv4Addr::new(10, 10, 1, 3)]
        );
    }

    #[tokio::test]
    async fn removing_an_unknown_peer_leaves_the_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, state) = manager_with_stub(dir.path());

        manager.add_peer("phone").await.unwrap();
        let before = read_conf(dir.path());

        let err = manager.remove_peer("ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(read_conf(dir.path()), before);
        // Only the add triggered a reload.
        assert_eq!(state.lock().unwrap().reloads, 1);
    }

    #[tokio::test]
    async fn remove_deletes_the_section_and_the_stored_profile() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, _) = manager_with_stub(dir.path());

        manager.add_peer("phone").await.unwrap();
        let profile_path = dir.path().join("clients").join("phone.conf");
        assert!(profile_path.exists());

        manager.remove_peer("phone").await.unwrap();
        assert!(!profile_path.exists());

        let raw = read_conf(dir.path());
        let doc = ConfigDocument::try_from(raw.as_str()).unwrap();
        assert_eq!(doc.peers().count(), 0);

        let err = manager.export("phone").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_reload_is_reported_as_deferred_after_persisting() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, state) = manager_with_stub(dir.path());
        state.lock().unwrap().fail_reload = true;

        let outcome = manager.add_peer("phone").await.unwrap();
        match outcome.reload {
            ReloadOutcome::Deferred { reason } => {
                assert!(reason.contains("wg-quick"));
            }
            ReloadOutcome::Applied => panic!("reload should have been deferred"),
        }

        // The peer is on disk regardless of the reload failure.
        let raw = read_conf(dir.path());
        assert!(raw.contains("# Name: phone"));
    }

    #[tokio::test]
    async fn export_returns_profile_text_and_qr_png() {
        let dir = tempfile::tempdir().unwrap();
        let server = seed_interface(dir.path());
        let (manager, _) = manager_with_stub(dir.path());

        let outcome = manager.add_peer("phone").await.unwrap();
        let (profile, image) = manager.export("phone").unwrap();

        assert!(profile.contains(&format!("PrivateKey = {}", outcome.peer.private_key)));
        assert!(profile.contains("Address = 10.10.1.2/32"));
        assert!(profile.contains(&format!("PublicKey = {}", server.public_b64())));
        assert!(profile.contains("Endpoint = vpn.example.com:51820"));
        assert_eq!(&image[1..4], b"PNG");
    }

    #[tokio::test]
    async fn status_merges_config_with_live_counters() {
        let dir = tempfile::tempdir().unwrap();
        seed_interface(dir.path());
        let (manager, state) = manager_with_stub(dir.path());

        let phone = manager.add_peer("phone").await.unwrap();
        manager.add_peer("laptop").await.unwrap();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let stale_key = Keypair::generate().unwrap().public_b64();
        state.lock().unwrap().status = format!(
            "{}\t(none)\t203.0.113.9:33612\t10.10.1.2/32\t{}\t1111\t2222\t25\n\
             {stale_key}\t(none)\t(none)\t10.10.1.9/32\t0\t0\t0\toff\n",
            phone.peer.public_key,
            now - 30,
        );

        let status = manager.status().await.unwrap();
        assert_eq!(status.interface, "wg0");
        assert_eq!(status.peers.len(), 2);

        let live = &status.peers[0];
        assert_eq!(live.public_key, phone.peer.public_key);
        assert_eq!(live.endpoint.as_deref(), Some("203.0.113.9:33612"));
        let age = live.handshake_age.unwrap().as_secs();
        assert!((30..120).contains(&age));
        assert_eq!(live.rx_bytes, 1111);

        // Config peer that never completed a handshake.
        let idle = &status.peers[1];
        assert_eq!(idle.handshake_age, None);
        assert_eq!(idle.endpoint, None);

        // Running-state peer absent from config is omitted as stale.
        assert!(status.peers.iter().all(|p| p.public_key != stale_key));
    }
}
