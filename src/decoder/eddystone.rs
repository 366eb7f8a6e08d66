//! Eddystone frame decoding (UID and URL frames)

use serde::{Deserialize, Serialize};
use std::fmt;

const FRAME_UID: u8 = 0x00;
const FRAME_URL: u8 = 0x10;
const UID_MIN_LEN: usize = 18;
const URL_MIN_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Eddystone {
    Uid {
        tx_power: i8,
        #[serde(with = "super::hex")]
        namespace: [u8; 10],
        #[serde(with = "super::hex")]
        instance: [u8; 6],
    },
    Url {
        tx_power: i8,
        url: String,
    },
}

impl Eddystone {
    pub fn tx_power(&self) -> i8 {
        match self {
            Eddystone::Uid { tx_power, .. } | Eddystone::Url { tx_power, .. } => *tx_power,
        }
    }
}

impl fmt::Display for Eddystone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eddystone::Uid {
                tx_power,
                namespace,
                instance,
            } => write!(
                f,
                "Eddystone-UID {}/{} tx={}",
                super::hex::encode(namespace),
                super::hex::encode(instance),
                tx_power
            ),
            Eddystone::Url { tx_power, url } => write!(f, "Eddystone-URL {} tx={}", url, tx_power),
        }
    }
}

/// Decode an Eddystone service-data frame
///
/// The first byte selects the frame type. UID frames need 18 bytes, URL
/// frames 4; the URL text is everything after the tx power byte with invalid
/// UTF-8 sequences replaced by U+FFFD. Any other frame type yields `None`.
pub fn parse_eddystone(data: &[u8]) -> Option<Eddystone> {
    let (&frame_type, rest) = data.split_first()?;

    match frame_type {
        FRAME_UID if data.len() >= UID_MIN_LEN => {
            let mut namespace = [0u8; 10];
            let mut instance = [0u8; 6];
            namespace.copy_from_slice(&data[2..12]);
            instance.copy_from_slice(&data[12..18]);
            Some(Eddystone::Uid {
                tx_power: rest[0] as i8,
                namespace,
                instance,
            })
        }
        FRAME_URL if data.len() >= URL_MIN_LEN => Some(Eddystone::Url {
            tx_power: rest[0] as i8,
            url: String::from_utf8_lossy(&data[2..]).into_owned(),
        }),
        _ => None,
    }
}
