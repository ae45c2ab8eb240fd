use crate::types::Coordinates;

/// Mean Earth radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Haversine great-circle distance in miles, rounded to one decimal place.
pub fn distance_miles(origin_lat: f64, origin_lng: f64, point_lat: f64, point_lng: f64) -> f64 {
    let d_lat = (point_lat - origin_lat).to_radians();
    let d_lng = (point_lng - origin_lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + origin_lat.to_radians().cos() * point_lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    (EARTH_RADIUS_MILES * c * 10.0).round() / 10.0
}

pub fn distance_between(origin: &Coordinates, point: &Coordinates) -> f64 {
    distance_miles(origin.lat, origin.lng, point.lat, point.lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_miles(41.8781, -87.6298, 41.8781, -87.6298), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_miles(40.7128, -74.0060, 41.8781, -87.6298);
        let ba = distance_miles(41.8781, -87.6298, 40.7128, -74.0060);
        assert_eq!(ab, ba);
    }

    #[test]
    fn new_york_to_los_angeles() {
        let d = distance_miles(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((d - 2445.0).abs() <= 2445.0 * 0.01, "got {}", d);
    }

    #[test]
    fn rounded_to_one_decimal() {
        let d = distance_miles(40.7128, -74.0060, 40.7580, -73.9855);
        assert_eq!(d, (d * 10.0).round() / 10.0);
        assert!(d > 0.0 && d < 5.0);
    }
}
