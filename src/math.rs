/// Mean earth radius in meters.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS-84 coordinates given in
/// radians.
pub fn surface_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let lat = 41.185_f64.to_radians();
        let lon = (-8.704_f64).to_radians();

        assert_eq!(surface_distance(lat, lon, lat, lon), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = surface_distance(0.0, 0.0, 1.0_f64.to_radians(), 0.0);

        // One degree of latitude is close to 111 km.
        assert!((d - 111_195.0).abs() < 100.0);
    }
}
