//! Serde adapter writing fixed byte arrays as lowercase hex strings

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use std::fmt::Write as _;

pub(crate) fn encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

pub(crate) fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode(bytes))
}

pub(crate) fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let digits: String = text.chars().filter(|c| *c != '-').collect();
    if !digits.is_ascii() || digits.len() != N * 2 {
        return Err(D::Error::custom(format!(
            "expected {} hex digits, got {}",
            N * 2,
            digits.len()
        )));
    }

    let mut out = [0u8; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(D::Error::custom)?;
    }
    Ok(out)
}
