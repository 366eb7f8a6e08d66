//! Public API for radio backends

pub use crate::backend::native::{DiscoveredDevice, DiscoveryAdapter, NativeBackend};
pub use crate::backend::parsers::{
    channel_for_frequency, parse_btlejack_line, parse_nrf_line, parse_ubertooth_line,
};
pub use crate::backend::subprocess::{SnifferTool, SubprocessBackend, SubprocessSource};
pub use crate::backend::traits::{PacketSource, RadioBackend};
pub use crate::backend::types::{Capabilities, Phy, RawPacket};
pub use crate::backend::{create_backend, BackendKind, BackendOptions};
