//! Public API for the device registry

pub use crate::registry::address::{display_address, normalize_address, oui_prefix};
pub use crate::registry::category::infer_category;
pub use crate::registry::error::{RegistryError, RegistryResult};
pub use crate::registry::locks::AddressGuard;
pub use crate::registry::manager::{DeviceRegistry, Page, RegistrySettings, SweepReport};
pub use crate::registry::record::{
    DeviceCategory, DeviceRecord, Observation, RssiSample, DEFAULT_HISTORY_DEPTH,
};
pub use crate::registry::sqlite::SqliteDeviceStore;
pub use crate::registry::store::{DeviceStore, MemoryDeviceStore};
