use std::time::Duration;

/// A point-in-time snapshot of the reliability layer's bookkeeping,
/// useful for a status pane or a support bundle; not part of the wire
/// protocol itself.
#[derive(Debug, Clone)]
pub struct ProtocolStatus {
    pub next_out_id: u32,
    pub out_ack: u32,
    pub unacked_count: usize,
    pub next_in_id: u32,
    pub in_ack: u32,
    pub is_reconnecting: bool,
    pub time_since_last_incoming: Option<Duration>,
}
