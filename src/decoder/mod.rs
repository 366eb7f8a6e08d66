//! Manufacturer payload decoders
//!
//! Pure functions from advertisement payload bytes to beacon records. A
//! payload that does not match the layout yields `None`; decoding never fails
//! loudly because malformed advertisements are routine on a busy channel.

pub mod eddystone;
mod hex;
pub mod ibeacon;

pub use eddystone::{parse_eddystone, Eddystone};
pub use ibeacon::{parse_ibeacon, IBeacon};

/// Bluetooth SIG company identifier assigned to Apple (iBeacon carrier)
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// 16-bit service identifier carrying Eddystone frames
pub const EDDYSTONE_SERVICE_ID: u16 = 0xFEAA;

/// Beacon records found in one advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPayloads {
    pub ibeacon: Option<IBeacon>,
    pub eddystone: Option<Eddystone>,
}

/// Decode every known manufacturer entry of an advertisement
///
/// Unknown company identifiers are ignored. When an identifier appears more
/// than once the first successfully decoded entry wins.
pub fn decode_manufacturer_data<'a, I>(entries: I) -> DecodedPayloads
where
    I: IntoIterator<Item = (u16, &'a [u8])>,
{
    let mut decoded = DecodedPayloads::default();
    for (company_id, bytes) in entries {
        match company_id {
            APPLE_COMPANY_ID if decoded.ibeacon.is_none() => {
                decoded.ibeacon = parse_ibeacon(bytes);
            }
            EDDYSTONE_SERVICE_ID if decoded.eddystone.is_none() => {
                decoded.eddystone = parse_eddystone(bytes);
            }
            _ => {}
        }
    }
    decoded
}
