use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        distance_meters(self.lat, self.lng, other.lat, other.lng)
    }

    /// True when `other` lies inside the geofence of `radius_meters` around `self`.
    /// A point exactly on the boundary is inside.
    pub fn within_radius(&self, other: &Coordinates, radius_meters: f64) -> bool {
        self.distance_to(other) <= radius_meters
    }
}

/// Great-circle distance in meters between two points (Haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_meters(40.7128, -74.0060, 40.7128, -74.0060), 0.0);
        assert_eq!(distance_meters(-33.8688, 151.2093, -33.8688, 151.2093), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((40.7128, -74.0060), (51.5074, -0.1278)),
            ((-33.8688, 151.2093), (-37.8136, 144.9631)),
            ((1.0, 10.0), (-1.0, -10.0)),
        ];
        for ((a_lat, a_lng), (b_lat, b_lng)) in pairs {
            assert_eq!(
                distance_meters(a_lat, a_lng, b_lat, b_lng),
                distance_meters(b_lat, b_lng, a_lat, a_lng)
            );
        }
    }

    #[test]
    fn short_distance_is_accurate() {
        // 0.001 degrees of latitude is roughly 111 m.
        assert_close(distance_meters(40.0, -74.0, 40.001, -74.0), 111.19, 0.5);
    }

    #[test]
    fn long_distance_is_accurate() {
        // New York to London.
        assert_close(
            distance_meters(40.7128, -74.0060, 51.5074, -0.1278),
            5_570_000.0,
            10_000.0,
        );
    }

    #[test]
    fn crosses_equator_and_southern_hemisphere() {
        assert_close(distance_meters(1.0, 0.0, -1.0, 0.0), 222_390.0, 50.0);
        // Sydney to Melbourne.
        assert_close(
            distance_meters(-33.8688, 151.2093, -37.8136, 144.9631),
            713_000.0,
            5_000.0,
        );
    }

    #[test]
    fn geofence_includes_boundary() {
        let center = Coordinates::new(40.0, -74.0);
        let nearby = Coordinates::new(40.001, -74.0);
        let d = center.distance_to(&nearby);

        assert!(center.within_radius(&nearby, d));
        assert!(center.within_radius(&nearby, 150.0));
        assert!(!center.within_radius(&nearby, 50.0));
    }
}
