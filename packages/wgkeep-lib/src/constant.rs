pub const WIREGUARD_INTERFACE: &str = "wg0";

pub const PROFILE_EXTENSION: &str = "conf";

pub const PEER_NAME_MAX_LEN: usize = 64;
