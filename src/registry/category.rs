//! Rule-based device category inference
//!
//! Name and vendor keywords decide first. Devices nothing matches fall back
//! to signal heuristics over the RSSI history.

use crate::registry::record::DeviceCategory;

/// Fewer samples than this say nothing about signal stability
const MIN_SAMPLES_FOR_STABILITY: usize = 3;

const WEARABLE_VENDORS: &[&str] = &["fitbit", "garmin", "samsung"];
const AUDIO_NAMES: &[&str] = &["speaker", "headphone", "airpod", "buds"];
const IOT_VENDORS: &[&str] = &["raspberry", "arduino", "espressif"];
const COMPUTER_NAMES: &[&str] = &["macbook", "imac", "laptop", "thinkpad", "desktop"];
const COMPUTER_VENDORS: &[&str] = &["intel", "dell", "lenovo", "hewlett"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn infer_category<I>(name: Option<&str>, vendor: Option<&str>, rssi: I) -> DeviceCategory
where
    I: IntoIterator<Item = i16>,
{
    let name = name.unwrap_or_default().to_lowercase();
    let vendor = vendor.unwrap_or_default().to_lowercase();

    if contains_any(&vendor, &["apple", "iphone", "ipad"]) {
        if name.contains("watch") {
            return DeviceCategory::Wearable;
        }
        if contains_any(&name, AUDIO_NAMES) {
            return DeviceCategory::Audio;
        }
        if contains_any(&name, COMPUTER_NAMES) {
            return DeviceCategory::Computer;
        }
        return DeviceCategory::Smartphone;
    }

    if contains_any(&vendor, WEARABLE_VENDORS) || name.contains("watch") {
        return DeviceCategory::Wearable;
    }
    if contains_any(&name, AUDIO_NAMES) {
        return DeviceCategory::Audio;
    }
    if contains_any(&vendor, IOT_VENDORS) {
        return DeviceCategory::IoT;
    }
    if contains_any(&name, COMPUTER_NAMES) || contains_any(&vendor, COMPUTER_VENDORS) {
        return DeviceCategory::Computer;
    }

    signal_heuristic(rssi)
}

fn signal_heuristic<I>(rssi: I) -> DeviceCategory
where
    I: IntoIterator<Item = i16>,
{
    let samples: Vec<f64> = rssi.into_iter().map(f64::from).collect();
    if samples.is_empty() {
        return DeviceCategory::Unknown;
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let std_dev = variance.sqrt();

    if samples.len() >= MIN_SAMPLES_FOR_STABILITY && std_dev < 5.0 {
        DeviceCategory::IoT
    } else if (-60.0..=-30.0).contains(&mean) {
        DeviceCategory::Smartphone
    } else if std_dev > 10.0 {
        DeviceCategory::Wearable
    } else {
        DeviceCategory::Unknown
    }
}
