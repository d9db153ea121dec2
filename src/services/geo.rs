//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average urban shuttle speed in km/h for travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 30.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimate road distance from straight-line distance
pub fn road_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    haversine_distance(from, to) * ROAD_COEFFICIENT
}

/// Estimate travel time in minutes
pub fn travel_time_minutes(from: &Coordinates, to: &Coordinates) -> f64 {
    let distance = road_distance(from, to);
    (distance / AVERAGE_SPEED_KMH) * 60.0
}

/// Initial great-circle bearing from `from` to `to`, in degrees.
/// 0 = north, clockwise, normalized to [0, 360).
pub fn bearing(from: &Coordinates, to: &Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let degrees = y.atan2(x).to_degrees();
    (degrees + 360.0) % 360.0
}

/// Smallest angle between two bearings, in [0, 180].
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Index and Haversine distance (km) of the point furthest from `origin`.
/// Ties resolve to the earliest point.
pub fn furthest_from(origin: &Coordinates, points: &[Coordinates]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in points.iter().enumerate() {
        let d = haversine_distance(origin, point);
        match best {
            Some((_, best_d)) if d <= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hq() -> Coordinates {
        Coordinates { lat: 9.016465390275195, lng: 38.76856893855111 }
    }

    fn bole_airport() -> Coordinates {
        Coordinates { lat: 8.9779, lng: 38.7993 }
    }

    fn piazza() -> Coordinates {
        Coordinates { lat: 9.0349, lng: 38.7527 }
    }

    #[test]
    fn test_haversine_addis_to_adama() {
        let adama = Coordinates { lat: 8.5400, lng: 39.2700 };
        let distance = haversine_distance(&hq(), &adama);

        // Addis Ababa to Adama is roughly 76 km as the crow flies
        assert!((distance - 76.0).abs() < 5.0, "got {}", distance);
    }

    #[test]
    fn test_haversine_same_point() {
        let distance = haversine_distance(&hq(), &hq());
        assert!((distance - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_road_distance() {
        let distance = road_distance(&hq(), &bole_airport());
        let straight = haversine_distance(&hq(), &bole_airport());
        assert!((distance / straight - ROAD_COEFFICIENT).abs() < 0.01);
    }

    #[test]
    fn test_travel_time() {
        let time = travel_time_minutes(&hq(), &bole_airport());
        assert!(time > 0.0);
        assert!(time < 60.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinates { lat: 0.0, lng: 0.0 };
        let north = Coordinates { lat: 1.0, lng: 0.0 };
        let east = Coordinates { lat: 0.0, lng: 1.0 };
        let south = Coordinates { lat: -1.0, lng: 0.0 };
        let west = Coordinates { lat: 0.0, lng: -1.0 };

        assert!((bearing(&origin, &north) - 0.0).abs() < 1e-9);
        assert!((bearing(&origin, &east) - 90.0).abs() < 1e-9);
        assert!((bearing(&origin, &south) - 180.0).abs() < 1e-9);
        assert!((bearing(&origin, &west) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_is_normalized() {
        let b = bearing(&hq(), &piazza());
        assert!((0.0..360.0).contains(&b));
        // Piazza lies north-west of HQ
        assert!(b > 270.0 && b < 360.0, "got {}", b);
    }

    #[test]
    fn test_bearing_difference_wraps() {
        assert!((bearing_difference(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((bearing_difference(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((bearing_difference(90.0, 270.0) - 180.0).abs() < 1e-9);
        assert!((bearing_difference(45.0, 45.0)).abs() < 1e-9);
    }

    #[test]
    fn test_furthest_from() {
        let points = vec![piazza(), bole_airport(), hq()];
        let (index, distance) = furthest_from(&hq(), &points).unwrap();
        assert_eq!(index, 1);
        assert!(distance > 5.0);
    }

    #[test]
    fn test_furthest_from_tie_keeps_first() {
        let points = vec![piazza(), piazza()];
        let (index, _) = furthest_from(&hq(), &points).unwrap();
        assert_eq!(index, 0);
        assert!(furthest_from(&hq(), &[]).is_none());
    }
}
