//! Hardware address normalization

/// Normalize a device address to 12 uppercase hex digits without separators
///
/// Accepts `:`, `-` and `.` separated forms as well as bare hex. Anything
/// that does not reduce to exactly 12 hex digits yields `None`.
pub fn normalize_address(address: &str) -> Option<String> {
    let digits: String = address
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if digits.len() == 12 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

/// Colon-separated form (`AA:BB:CC:DD:EE:FF`) of a normalized address
pub fn display_address(normalized: &str) -> String {
    normalized
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// First three octets of a normalized address
pub fn oui_prefix(normalized: &str) -> &str {
    &normalized[..normalized.len().min(6)]
}
