//! Typed identity for a cross-process "shape" (terminal, documents,
//! editors, …). The core only ever sees the name at registration time;
//! it never interprets the methods behind it.

/// Identifies one RPC endpoint shared by both sides of the bridge.
/// Identity is the numeric id alone (stable across a session and what
/// `locals`/`proxies` key on); `name` rides along for diagnostics only.
/// `nid` is a `u8` because the wire's inner request frame carries
/// `rpcId` as a single byte (§6) — at most 256 distinct proxies per
/// session, which comfortably covers the fixed set of service shapes
/// registered at startup.
#[derive(Debug, Clone, Copy)]
pub struct ProxyIdentifier {
    pub nid: u8,
    pub name: &'static str,
}

impl ProxyIdentifier {
    #[must_use]
    pub const fn new(nid: u8, name: &'static str) -> Self {
        Self { nid, name }
    }
}

impl PartialEq for ProxyIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.nid == other.nid
    }
}

impl Eq for ProxyIdentifier {}

impl std::hash::Hash for ProxyIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.nid.hash(state);
    }
}

impl std::fmt::Display for ProxyIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.nid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_nid_based_name_is_cosmetic() {
        let a = ProxyIdentifier::new(3, "documents");
        let b = ProxyIdentifier::new(3, "documents-renamed-in-debug-build");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_nids_are_distinct_identifiers() {
        assert_ne!(ProxyIdentifier::new(1, "terminal"), ProxyIdentifier::new(2, "terminal"));
    }
}
