//! Line parsers for external sniffer output
//!
//! Each parser turns one stdout line into a packet. A line the parser does
//! not recognise still produces a packet: the raw text becomes the payload
//! and address and RSSI stay empty.

use crate::backend::types::RawPacket;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static NRF_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f:]{11,17}).*?(-?\d+)").expect("static nrf regex is valid")
});

static COLON_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})\b").expect("static address regex is valid")
});

static RSSI_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rssi=(-?\d+)").expect("static rssi regex is valid"));

static TRAILING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s(-?\d+)\s*$").expect("static trailing regex is valid"));

static FREQ_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"freq=(\d{4})").expect("static freq regex is valid"));

static ACCESS_ADDRESS_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\baddr=([0-9A-Fa-f]{8})\b").expect("static aa regex is valid"));

/// `btlejack`: first whitespace token is the address, last token the RSSI
pub fn parse_btlejack_line(line: &str, now: DateTime<Utc>) -> RawPacket {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return RawPacket::unparsed(now, line);
    }

    match parts[parts.len() - 1].parse::<i16>() {
        Ok(rssi) => RawPacket::new(now).with_address(parts[0]).with_rssi(rssi),
        Err(_) => RawPacket::unparsed(now, line),
    }
}

/// `nrf`: first address-like run followed by the next integer
pub fn parse_nrf_line(line: &str, now: DateTime<Utc>) -> RawPacket {
    let Some(caps) = NRF_LINE.captures(line) else {
        return RawPacket::unparsed(now, line);
    };

    match caps[2].parse::<i16>() {
        Ok(rssi) => RawPacket::new(now).with_address(&caps[1]).with_rssi(rssi),
        Err(_) => RawPacket::unparsed(now, line),
    }
}

/// `ubertooth`: a colon address plus `rssi=<n>` or a trailing integer
///
/// `freq=<MHz>` sets the channel and `addr=<hex>` the access address when
/// present. A line missing the address or the RSSI keeps its raw text.
pub fn parse_ubertooth_line(line: &str, now: DateTime<Utc>) -> RawPacket {
    let address = COLON_ADDRESS.captures(line).map(|c| c[1].to_string());
    let rssi = RSSI_FIELD
        .captures(line)
        .or_else(|| TRAILING_INT.captures(line))
        .and_then(|c| c[1].parse::<i16>().ok());

    if address.is_none() && rssi.is_none() {
        return RawPacket::unparsed(now, line);
    }

    let mut packet = if address.is_some() && rssi.is_some() {
        RawPacket::new(now)
    } else {
        RawPacket::unparsed(now, line)
    };
    packet.address = address;
    packet.rssi = rssi;
    packet.channel = FREQ_FIELD
        .captures(line)
        .and_then(|c| c[1].parse::<u16>().ok())
        .and_then(channel_for_frequency);
    packet.access_address = ACCESS_ADDRESS_FIELD
        .captures(line)
        .map(|c| c[1].to_ascii_lowercase());
    packet
}

/// BLE channel index for a centre frequency in MHz
pub fn channel_for_frequency(mhz: u16) -> Option<u8> {
    match mhz {
        2402 => Some(37),
        2426 => Some(38),
        2480 => Some(39),
        2404..=2424 if mhz % 2 == 0 => Some(((mhz - 2404) / 2) as u8),
        2428..=2478 if mhz % 2 == 0 => Some(((mhz - 2428) / 2 + 11) as u8),
        _ => None,
    }
}
