//! iBeacon frame decoding

use serde::{Deserialize, Serialize};
use std::fmt;

const IBEACON_MIN_LEN: usize = 23;

/// Proximity beacon identity carried in Apple manufacturer data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IBeacon {
    #[serde(with = "super::hex")]
    pub uuid: [u8; 16],
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

impl IBeacon {
    /// Canonical 8-4-4-4-12 form of the proximity UUID
    pub fn uuid_string(&self) -> String {
        let hex = super::hex::encode(&self.uuid);
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl fmt::Display for IBeacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iBeacon {} major={} minor={} tx={}",
            self.uuid_string(),
            self.major,
            self.minor,
            self.tx_power
        )
    }
}

/// Decode an iBeacon frame from Apple manufacturer data
///
/// Layout: two prefix bytes (`02 15`), UUID at 2..18, major at 18..20 and
/// minor at 20..22 (big-endian), signed calibrated tx power at 22. Shorter
/// input yields `None`.
pub fn parse_ibeacon(data: &[u8]) -> Option<IBeacon> {
    if data.len() < IBEACON_MIN_LEN {
        return None;
    }

    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&data[2..18]);

    Some(IBeacon {
        uuid,
        major: u16::from_be_bytes([data[18], data[19]]),
        minor: u16::from_be_bytes([data[20], data[21]]),
        tx_power: data[22] as i8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(uuid: [u8; 16], major: u16, minor: u16, tx: i8) -> Vec<u8> {
        let mut data = vec![0x02, 0x15];
        data.extend_from_slice(&uuid);
        data.extend_from_slice(&major.to_be_bytes());
        data.extend_from_slice(&minor.to_be_bytes());
        data.push(tx as u8);
        data
    }

    #[test]
    fn test_zeroed_frame() {
        let mut data = vec![0x02, 0x15];
        data.extend_from_slice(&[0u8; 21]);

        let beacon = parse_ibeacon(&data).expect("23 bytes decode");
        assert_eq!(beacon.uuid, [0u8; 16]);
        assert_eq!(beacon.major, 0);
        assert_eq!(beacon.minor, 0);
        assert_eq!(beacon.tx_power, 0);
    }

    #[test]
    fn test_fields_are_big_endian_and_signed() {
        let uuid = [
            0xE2, 0xC5, 0x6D, 0xB5, 0xDF, 0xFB, 0x48, 0xD2, 0xB0, 0x60, 0xD0, 0xF5, 0xA7, 0x10,
            0x96, 0xE0,
        ];
        let beacon = parse_ibeacon(&frame(uuid, 0x0102, 0xBEEF, -59)).unwrap();

        assert_eq!(beacon.major, 258);
        assert_eq!(beacon.minor, 0xBEEF);
        assert_eq!(beacon.tx_power, -59);
        assert_eq!(beacon.uuid_string(), "e2c56db5-dffb-48d2-b060-d0f5a71096e0");
    }

    #[test]
    fn test_short_input_is_rejected() {
        assert!(parse_ibeacon(&[]).is_none());
        assert!(parse_ibeacon(&[0x02, 0x15, 0x00]).is_none());
        assert!(parse_ibeacon(&[0u8; 22]).is_none());
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut data = frame([7u8; 16], 1, 2, -4);
        data.extend_from_slice(&[0xAA, 0xBB]);
        let beacon = parse_ibeacon(&data).unwrap();
        assert_eq!((beacon.major, beacon.minor, beacon.tx_power), (1, 2, -4));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let data = frame([9u8; 16], 10, 20, -70);
        assert_eq!(parse_ibeacon(&data), parse_ibeacon(&data));
    }

    #[test]
    fn test_serializes_uuid_as_hex() {
        let beacon = parse_ibeacon(&frame([0xAB; 16], 1, 1, 0)).unwrap();
        let json = serde_json::to_value(beacon).unwrap();
        assert_eq!(json["uuid"], "abababababababababababababababab");

        let back: IBeacon = serde_json::from_value(json).unwrap();
        assert_eq!(back, beacon);
    }
}
