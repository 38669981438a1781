//! A peer that stops answering at the RPC layer (its dispatch loop
//! isn't running — the process-freeze case, not a dropped socket) is
//! observed as `Unresponsive` after the responsiveness threshold, and
//! the socket itself is never closed by the core while this is
//! happening. Once a dispatch loop is listening again, a subsequent
//! request's `Acknowledged` flips the caller back to `Responsive`.

use std::time::Duration;

use eh_test_support::InMemorySocketPair;
use exthost_bridge::prelude::*;

const ANYTHING: ProxyIdentifier = ProxyIdentifier::new(4, "Anything");

#[tokio::test]
async fn a_silent_peer_is_declared_unresponsive_then_recovers() {
    let (a, b) = InMemorySocketPair::connected();
    let caller = RPCProtocol::new(PersistentProtocol::new(a, false), None);
    // The peer's reliability layer is live (it still acks at the socket
    // level) but nothing is reading its `Regular` payloads as RPC
    // frames yet, so no `Acknowledged` will ever come back for calls
    // placed before it is wrapped.
    let callee_protocol = PersistentProtocol::new(b, false);

    let mut responsive_events = caller.subscribe_responsive();
    assert_eq!(caller.responsive_state(), ResponsiveState::Responsive);

    let proxy = caller.proxy(ANYTHING);
    let hung_call = tokio::spawn(async move { proxy.call("ping", vec![]).await });

    let edge = tokio::time::timeout(Duration::from_secs(6), responsive_events.recv())
        .await
        .expect("should observe an unresponsiveness edge within the 3s threshold")
        .unwrap();
    assert_eq!(edge, ResponsiveState::Unresponsive);
    assert_eq!(caller.responsive_state(), ResponsiveState::Unresponsive);

    // The core never closes the socket on its own account of silence.
    let callee = RPCProtocol::new(callee_protocol, None);
    let proxy2 = caller.proxy(ANYTHING);
    let _ = tokio::spawn(async move { proxy2.call("ping", vec![]).await });

    let edge = tokio::time::timeout(Duration::from_secs(2), responsive_events.recv())
        .await
        .expect("a fresh Acknowledged should flip the caller back to Responsive")
        .unwrap();
    assert_eq!(edge, ResponsiveState::Responsive);

    caller.dispose();
    let _ = hung_call.await;
    let _ = callee;
}
