//! Peer list read from a file

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use peermux_core::{PeerAddr, PeerResolver};

/// Parse one peer per line. Blank lines and `#` comments are skipped.
pub fn parse_peers(contents: &str) -> Vec<PeerAddr> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PeerAddr::from)
        .collect()
}

/// Re-reads a peers file on every resolution.
///
/// A read failure keeps the last successfully read list so a briefly
/// missing file does not stop every worker.
pub struct FilePeerResolver {
    path: PathBuf,
    last: Mutex<Vec<PeerAddr>>,
}

impl FilePeerResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePeerResolver {
            path: path.into(),
            last: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PeerResolver for FilePeerResolver {
    fn resolve(&self) -> Vec<PeerAddr> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let peers = parse_peers(&contents);
                *self.last.lock() = peers.clone();
                peers
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "peers file unreadable, keeping last list"
                );
                self.last.lock().clone()
            }
        }
    }
}
