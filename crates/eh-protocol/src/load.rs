//! Pluggable load signal consulted before declaring a peer unresponsive.

/// A single predicate the reliability layer polls before firing an
/// unresponsiveness timeout. High load defers the declaration, on the
/// theory that a busy local event loop, not a dead peer, explains the
/// silence.
pub trait LoadEstimator: Send + Sync + 'static {
    fn has_high_load(&self) -> bool;
}

/// Always reports idle. The right default for a host that has no
/// cheaper signal to sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysIdleLoadEstimator;

impl LoadEstimator for AlwaysIdleLoadEstimator {
    fn has_high_load(&self) -> bool {
        false
    }
}

impl<F> LoadEstimator for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn has_high_load(&self) -> bool {
        self()
    }
}
