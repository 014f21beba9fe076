use zwom::Zone;

/// Identifies the band mapping below. Bump it when the table changes.
pub const ZONE_TABLE_VERSION: &str = "zwift-2023";

// Representative percent of FTP for each zone.
const ZONE_TABLE: [(Zone, u32); 8] = [
    (Zone::Numbered(1), 50),
    (Zone::Numbered(2), 65),
    (Zone::Numbered(3), 81),
    (Zone::SweetSpot, 90),
    (Zone::Numbered(4), 95),
    (Zone::Numbered(5), 109),
    (Zone::Numbered(6), 125),
    (Zone::Numbered(7), 150),
];

/// Percent of FTP a zone resolves to, if the zone is defined.
pub fn zone_percent(zone: Zone) -> Option<u32> {
    ZONE_TABLE
        .iter()
        .find(|(z, _)| *z == zone)
        .map(|(_, pct)| *pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_zones_resolve() {
        for n in 1..=7 {
            assert!(zone_percent(Zone::Numbered(n)).is_some(), "Z{}", n);
        }
        assert_eq!(zone_percent(Zone::SweetSpot), Some(90));
        assert_eq!(zone_percent(Zone::Numbered(8)), None);
        assert_eq!(zone_percent(Zone::Numbered(0)), None);
    }

    #[test]
    fn table_is_monotonic() {
        let mut order = vec![Zone::Numbered(1), Zone::Numbered(2), Zone::Numbered(3), Zone::SweetSpot];
        order.extend((4..=7).map(Zone::Numbered));
        let pcts: Vec<u32> = order.into_iter().filter_map(zone_percent).collect();
        assert!(pcts.windows(2).all(|w| w[0] < w[1]));
    }
}
