use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use locker_core::{EphemeralSnapshotStore, FileSnapshotStore, SnapshotStore};

/// Configuration for the locker-server.
#[derive(Parser, Debug, Clone)]
#[command(name = "locker-server")]
#[command(about = "HTTP service granting exclusive locks over hierarchical resource paths")]
pub struct Config {
    /// IP address to bind to
    #[arg(long, default_value = "127.0.0.1", env = "LOCKER_IP")]
    pub ip: IpAddr,

    /// Port to bind to
    #[arg(long, default_value = "8765", env = "LOCKER_PORT")]
    pub port: u16,

    /// Snapshot file holding the lock table between restarts
    #[arg(long, default_value = "locks.db", env = "LOCKER_FILE")]
    pub file: PathBuf,

    /// Keep locks in memory only (--file is ignored)
    #[arg(long, env = "LOCKER_EPHEMERAL")]
    pub ephemeral: bool,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Build the snapshot store selected by `--ephemeral` / `--file`.
    pub fn snapshot_store(&self) -> Arc<dyn SnapshotStore> {
        if self.ephemeral {
            Arc::new(EphemeralSnapshotStore::new())
        } else {
            Arc::new(FileSnapshotStore::new(&self.file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["locker-server"]).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8765".parse().unwrap());
        assert_eq!(config.file, PathBuf::from("locks.db"));
        assert!(!config.ephemeral);
        assert_eq!(config.snapshot_store().store_type(), "file");
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "locker-server",
            "--ip",
            "::1",
            "--port",
            "9000",
            "--file",
            "/tmp/other.db",
            "--ephemeral",
        ])
        .unwrap();
        assert_eq!(config.bind_addr(), "[::1]:9000".parse().unwrap());
        assert!(config.ephemeral);
        assert!(!config.snapshot_store().is_persistent());
    }

    #[test]
    fn test_rejects_bad_ip() {
        assert!(Config::try_parse_from(["locker-server", "--ip", "localhost"]).is_err());
    }
}
