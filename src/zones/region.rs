//! Zone regions over the (RSSI, movement) plane

use crate::zones::error::{ZoneError, ZoneResult};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ZONE: &str = "unknown";

/// Closed rectangle in (RSSI dBm, movement score) space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRegion {
    pub name: String,
    /// `[low, high]` RSSI bounds, inclusive
    pub rssi: [f64; 2],
    /// `[low, high]` movement bounds, inclusive
    pub movement: [f64; 2],
}

impl ZoneRegion {
    pub fn new(name: &str, rssi: [f64; 2], movement: [f64; 2]) -> Self {
        Self {
            name: name.to_string(),
            rssi,
            movement,
        }
    }

    pub fn contains(&self, rssi: f64, movement: f64) -> bool {
        self.rssi[0] <= rssi
            && rssi <= self.rssi[1]
            && self.movement[0] <= movement
            && movement <= self.movement[1]
    }

    fn overlaps(&self, other: &ZoneRegion) -> bool {
        fn intersect(a: [f64; 2], b: [f64; 2]) -> bool {
            a[0] <= b[1] && b[0] <= a[1]
        }
        intersect(self.rssi, other.rssi) && intersect(self.movement, other.movement)
    }

    fn validate(&self) -> ZoneResult<()> {
        let invalid = |message: &str| ZoneError::InvalidRegion {
            name: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("zone name is empty"));
        }
        if self.name.eq_ignore_ascii_case(UNKNOWN_ZONE) {
            return Err(invalid("'unknown' is reserved for unmatched readings"));
        }
        let finite = self
            .rssi
            .iter()
            .chain(self.movement.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(invalid("bounds must be finite numbers"));
        }
        if self.rssi[0] > self.rssi[1] || self.movement[0] > self.movement[1] {
            return Err(invalid("lower bound exceeds upper bound"));
        }
        Ok(())
    }
}

/// Validated, ordered set of non-overlapping regions
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMap {
    regions: Vec<ZoneRegion>,
}

impl Default for ZoneMap {
    fn default() -> Self {
        Self {
            regions: default_regions(),
        }
    }
}

impl ZoneMap {
    pub fn new(regions: Vec<ZoneRegion>) -> ZoneResult<Self> {
        for (i, region) in regions.iter().enumerate() {
            region.validate()?;
            for other in &regions[..i] {
                if other.name == region.name {
                    return Err(ZoneError::DuplicateName {
                        name: region.name.clone(),
                    });
                }
                if other.overlaps(region) {
                    return Err(ZoneError::Overlap {
                        first: other.name.clone(),
                        second: region.name.clone(),
                    });
                }
            }
        }
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[ZoneRegion] {
        &self.regions
    }

    /// Name of the region containing the point, or `unknown`
    pub fn classify(&self, rssi: f64, movement: f64) -> &str {
        self.regions
            .iter()
            .find(|region| region.contains(rssi, movement))
            .map(|region| region.name.as_str())
            .unwrap_or(UNKNOWN_ZONE)
    }
}

pub fn default_regions() -> Vec<ZoneRegion> {
    vec![
        ZoneRegion::new("entrance", [-70.0, -50.0], [2.0, 5.0]),
        ZoneRegion::new("living_room", [-65.0, -45.0], [8.0, 12.0]),
        ZoneRegion::new("bedroom", [-75.0, -55.0], [15.0, 18.0]),
    ]
}

/// Mean absolute change between consecutive readings; 0 with fewer than two
pub fn movement_score(samples: &[i16]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let total: f64 = samples
        .windows(2)
        .map(|pair| (f64::from(pair[1]) - f64::from(pair[0])).abs())
        .sum();
    total / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regions_are_valid() {
        let map = ZoneMap::new(default_regions()).unwrap();
        assert_eq!(map, ZoneMap::default());
        assert_eq!(map.regions().len(), 3);
    }

    #[test]
    fn test_classify_default_zones() {
        let map = ZoneMap::default();
        assert_eq!(map.classify(-60.0, 3.0), "entrance");
        assert_eq!(map.classify(-50.0, 10.0), "living_room");
        assert_eq!(map.classify(-70.0, 16.0), "bedroom");
        assert_eq!(map.classify(-60.0, 0.0), UNKNOWN_ZONE);
        assert_eq!(map.classify(-20.0, 3.0), UNKNOWN_ZONE);
    }

    #[test]
    fn test_bounds_are_closed() {
        let map = ZoneMap::default();
        assert_eq!(map.classify(-70.0, 2.0), "entrance");
        assert_eq!(map.classify(-50.0, 5.0), "entrance");
        assert_eq!(map.classify(-50.01, 5.01), UNKNOWN_ZONE);
    }

    #[test]
    fn test_overlapping_regions_are_rejected() {
        let result = ZoneMap::new(vec![
            ZoneRegion::new("a", [-70.0, -50.0], [0.0, 5.0]),
            ZoneRegion::new("b", [-50.0, -40.0], [5.0, 9.0]),
        ]);
        assert!(matches!(result, Err(ZoneError::Overlap { .. })));
    }

    #[test]
    fn test_invalid_regions_are_rejected() {
        assert!(ZoneMap::new(vec![ZoneRegion::new("x", [-40.0, -60.0], [0.0, 1.0])]).is_err());
        assert!(ZoneMap::new(vec![ZoneRegion::new(" ", [-60.0, -40.0], [0.0, 1.0])]).is_err());
        assert!(
            ZoneMap::new(vec![ZoneRegion::new("unknown", [-60.0, -40.0], [0.0, 1.0])]).is_err()
        );
        assert!(matches!(
            ZoneMap::new(vec![
                ZoneRegion::new("x", [-60.0, -40.0], [0.0, 1.0]),
                ZoneRegion::new("x", [-60.0, -40.0], [5.0, 6.0]),
            ]),
            Err(ZoneError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_movement_score() {
        assert_eq!(movement_score(&[]), 0.0);
        assert_eq!(movement_score(&[-50]), 0.0);
        assert_eq!(movement_score(&[-50, -54, -50]), 4.0);
        assert_eq!(movement_score(&[-60, -60, -63, -60]), 2.0);
    }
}
