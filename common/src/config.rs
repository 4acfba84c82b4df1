use std::path::PathBuf;

/// Control socket the IKE daemon listens on by default
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/charon.vici";

/// Base directory of the daemon's configuration tree
pub const IPSEC_CONFIG_DIR: &str = "/etc/ipsec.d";

const CERTS_SUBDIR: &str = "certs";

/// Largest packet either side accepts, excluding the length prefix
pub const MAX_PACKET_SIZE: usize = 512 * 1024;

/// Directory relative certificate filenames are resolved against by default
pub fn default_certs_dir() -> PathBuf {
    PathBuf::from(IPSEC_CONFIG_DIR).join(CERTS_SUBDIR)
}

/// Default socket location as a path
pub fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}
