//! Peer identity and resolution

use std::fmt;

/// Peer address - opaque identifier of one data source.
///
/// Two addresses are the same peer iff their strings are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr(String);

impl PeerAddr {
    #[inline]
    pub fn new(addr: impl Into<String>) -> Self {
        PeerAddr(addr.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddr {
    fn from(addr: &str) -> Self {
        PeerAddr(addr.to_string())
    }
}

impl From<String> for PeerAddr {
    fn from(addr: String) -> Self {
        PeerAddr(addr)
    }
}

impl AsRef<str> for PeerAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of the current desired peer list.
///
/// Called synchronously once at startup and then once per tick, so it must
/// not block for long. Order and duplicates are the resolver's concern.
pub trait PeerResolver: Send + Sync {
    fn resolve(&self) -> Vec<PeerAddr>;
}

impl<F> PeerResolver for F
where
    F: Fn() -> Vec<PeerAddr> + Send + Sync,
{
    fn resolve(&self) -> Vec<PeerAddr> {
        self()
    }
}

/// A fixed peer list
#[derive(Clone, Debug, Default)]
pub struct StaticPeers(Vec<PeerAddr>);

impl StaticPeers {
    pub fn new<I, A>(peers: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<PeerAddr>,
    {
        StaticPeers(peers.into_iter().map(Into::into).collect())
    }

    pub fn peers(&self) -> &[PeerAddr] {
        &self.0
    }
}

impl PeerResolver for StaticPeers {
    fn resolve(&self) -> Vec<PeerAddr> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_addr_exact_equality() {
        assert_eq!(PeerAddr::from("10.0.0.1:80"), PeerAddr::new("10.0.0.1:80"));
        assert_ne!(PeerAddr::from("10.0.0.1:80"), PeerAddr::from("10.0.0.1:80 "));
        assert_ne!(PeerAddr::from("Host"), PeerAddr::from("host"));
    }

    #[test]
    fn test_peer_addr_display() {
        let addr = PeerAddr::from("node-a:7000");
        assert_eq!(addr.to_string(), "node-a:7000");
        assert_eq!(format!("{:?}", addr), "Peer(node-a:7000)");
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = || vec![PeerAddr::from("a"), PeerAddr::from("b")];
        assert_eq!(resolver.resolve().len(), 2);
    }

    #[test]
    fn test_static_peers_preserve_order() {
        let peers = StaticPeers::new(["b", "a", "c"]);
        let resolved: Vec<String> = peers
            .resolve()
            .into_iter()
            .map(PeerAddr::into_string)
            .collect();
        assert_eq!(resolved, vec!["b", "a", "c"]);
    }
}
