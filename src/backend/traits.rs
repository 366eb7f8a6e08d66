//! Radio backend seams

use crate::backend::types::{Capabilities, RawPacket};
use crate::scanner::error::ScanResult;
use async_trait::async_trait;

/// A source of raw packets from one radio
#[async_trait]
pub trait RadioBackend: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Start receiving; fails before yielding anything if the radio cannot start
    async fn scan(&self) -> ScanResult<Box<dyn PacketSource>>;
}

/// Lazily produced, non-restartable packet sequence
///
/// `None` from [`PacketSource::next_packet`] means the sequence has ended for
/// good. [`PacketSource::close`] releases every resource (including external
/// processes) before it returns and may be called more than once.
#[async_trait]
pub trait PacketSource: Send {
    async fn next_packet(&mut self) -> Option<RawPacket>;

    async fn close(&mut self);
}
