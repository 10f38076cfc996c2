use uuid::Uuid;

/// Mean Earth radius in meters, per the haversine convention.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic point in IEEE double-precision degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A candidate unit location for nearest-unit resolution.
#[derive(Debug, Clone)]
pub struct UnitSite {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
}

/// Great-circle distance in meters between two points (haversine).
/// Pure and symmetric; injected wherever distance is needed so tests
/// can exercise it directly.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h past 1.0 near antipodal points; clamp so asin
    // stays defined.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Result of roaming detection for a reported sale coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct RoamingOutcome {
    pub roaming: bool,
    /// Set only when the nearest unit differs from the seller's own;
    /// becomes the sale's override unit name.
    pub override_unit_name: Option<String>,
}

impl RoamingOutcome {
    fn local() -> Self {
        Self { roaming: false, override_unit_name: None }
    }
}

/// Detects whether a reported sale location is roaming relative to the
/// seller's home unit, and if so which known unit is nearest.
#[derive(Debug, Clone, Copy)]
pub struct RoamingDetector {
    threshold_meters: f64,
}

impl RoamingDetector {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    /// A sale within the threshold of the seller's home coordinate is never
    /// roaming, regardless of candidate units. Beyond it, the nearest
    /// candidate is found by a stable scan (strict `<` on the running
    /// minimum, so the first minimal unit wins ties); the sale is roaming
    /// iff that unit is not the seller's own.
    pub fn detect(
        &self,
        reported: GeoPoint,
        home: GeoPoint,
        home_unit_id: Uuid,
        candidates: &[UnitSite],
    ) -> RoamingOutcome {
        if distance_meters(reported, home) <= self.threshold_meters {
            return RoamingOutcome::local();
        }

        let nearest = Self::closest_unit(reported, candidates);

        match nearest {
            Some(unit) if unit.id != home_unit_id => RoamingOutcome {
                roaming: true,
                override_unit_name: Some(unit.name.clone()),
            },
            // Far from home but still closest to the own unit's registered
            // coordinate: not roaming, no override.
            _ => RoamingOutcome::local(),
        }
    }

    fn closest_unit(point: GeoPoint, candidates: &[UnitSite]) -> Option<&UnitSite> {
        let mut min_distance: Option<f64> = None;
        let mut min_unit: Option<&UnitSite> = None;

        for unit in candidates {
            let d = distance_meters(point, unit.location);
            if min_distance.map_or(true, |best| d < best) {
                min_distance = Some(d);
                min_unit = Some(unit);
            }
        }

        min_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(name: &str, lat: f64, lon: f64) -> UnitSite {
        UnitSite { id: Uuid::new_v4(), name: name.to_string(), location: GeoPoint::new(lat, lon) }
    }

    // Roughly 1 degree of latitude = 111.19 km at this radius.
    const ONE_LAT_DEGREE_M: f64 = 111_194.9;

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(-23.5505, -46.6333);
        let b = GeoPoint::new(-22.9068, -43.1729);
        assert!((distance_meters(a, b) - distance_meters(b, a)).abs() < 1e-6);
    }

    #[test]
    fn distance_of_identical_points_is_zero() {
        let p = GeoPoint::new(40.0, -74.0);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn distance_one_latitude_degree() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = distance_meters(a, b);
        assert!((d - ONE_LAT_DEGREE_M).abs() < 50.0, "got {}", d);
    }

    #[test]
    fn distance_stays_finite_for_antipodal_points() {
        let half_circumference = std::f64::consts::PI * 6_371_000.0;

        let exact = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(exact.is_finite());
        assert!((exact - half_circumference).abs() < 1.0, "got {}", exact);

        // Slightly off the exact antipode, where rounding in the haversine
        // term is most likely to overshoot 1.0.
        let near = distance_meters(
            GeoPoint::new(10.0, -45.0),
            GeoPoint::new(-10.0, 135.0 - 1e-9),
        );
        assert!(near.is_finite());
        assert!(near <= half_circumference + 1.0);
    }

    #[test]
    fn within_threshold_is_never_roaming() {
        let detector = RoamingDetector::new(100.0);
        let home = GeoPoint::new(0.0, 0.0);
        // ~55m north of home.
        let reported = GeoPoint::new(0.0005, 0.0);
        let far_unit = site("Far Unit", 10.0, 10.0);

        let outcome = detector.detect(reported, home, Uuid::new_v4(), &[far_unit]);
        assert!(!outcome.roaming);
        assert_eq!(outcome.override_unit_name, None);
    }

    #[test]
    fn picks_nearest_unit_beyond_threshold() {
        let detector = RoamingDetector::new(100.0);
        let home = GeoPoint::new(0.0, 0.0);
        // ~500m from home.
        let reported = GeoPoint::new(0.0045, 0.0);
        // ~150m and ~90m from the reported point.
        let unit_150m = site("150m Unit", 0.0045 + 0.00135, 0.0);
        let unit_90m = site("90m Unit", 0.0045 - 0.00081, 0.0);

        let outcome = detector.detect(
            reported,
            home,
            Uuid::new_v4(),
            &[unit_150m, unit_90m.clone()],
        );
        assert!(outcome.roaming);
        assert_eq!(outcome.override_unit_name.as_deref(), Some("90m Unit"));
    }

    #[test]
    fn ties_resolve_to_first_candidate_in_input_order() {
        let detector = RoamingDetector::new(100.0);
        let home = GeoPoint::new(0.0, 0.0);
        let reported = GeoPoint::new(0.01, 0.0);
        // Two candidates at the exact same coordinate.
        let first = site("First", 0.02, 0.0);
        let second = site("Second", 0.02, 0.0);

        let outcome = detector.detect(reported, home, Uuid::new_v4(), &[first, second]);
        assert_eq!(outcome.override_unit_name.as_deref(), Some("First"));
    }

    #[test]
    fn nearest_equals_home_unit_is_not_roaming() {
        let detector = RoamingDetector::new(100.0);
        let home_unit = site("Home Unit", 0.0, 0.0);
        let home = home_unit.location;
        // Far from home but the home unit is still the closest candidate.
        let reported = GeoPoint::new(0.01, 0.0);
        let other = site("Other", 1.0, 1.0);

        let outcome =
            detector.detect(reported, home, home_unit.id, &[home_unit.clone(), other]);
        assert!(!outcome.roaming);
        assert_eq!(outcome.override_unit_name, None);
    }

    #[test]
    fn no_candidates_beyond_threshold_is_not_roaming() {
        let detector = RoamingDetector::new(100.0);
        let outcome = detector.detect(
            GeoPoint::new(0.01, 0.0),
            GeoPoint::new(0.0, 0.0),
            Uuid::new_v4(),
            &[],
        );
        assert!(!outcome.roaming);
        assert_eq!(outcome.override_unit_name, None);
    }
}
